#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

pub const OPEN: &str = r#"0{"sid":"mock-engine-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// How the mock answers a Socket.IO `CONNECT`.
#[derive(Debug, Clone, Copy)]
pub enum Handshake {
    Accept,
    Reject(&'static str),
    /// Never answer the `CONNECT`
    Silent,
}

#[derive(Debug, Clone)]
enum Outgoing {
    Text(String),
    Close,
}

/// Mock Socket.IO server speaking Engine.IO v4 over WebSocket only.
pub struct MockSocketIoServer {
    addr: SocketAddr,
    /// Frames sent to ALL connected clients
    outgoing: broadcast::Sender<Outgoing>,
    /// Text frames received from any client
    received: mpsc::UnboundedReceiver<String>,
    /// Number of Socket.IO `CONNECT` packets received
    handshakes: Arc<AtomicUsize>,
}

impl MockSocketIoServer {
    pub async fn start() -> Self {
        Self::with_handshake(Handshake::Accept).await
    }

    pub async fn with_handshake(handshake: Handshake) -> Self {
        Self::with_open(handshake, OPEN).await
    }

    /// Start a server that greets clients with the Engine.IO `open` packet `open`.
    pub async fn with_open(handshake: Handshake, open: &str) -> Self {
        let open = open.to_owned();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (outgoing, _) = broadcast::channel::<Outgoing>(100);
        let (received_tx, received) = mpsc::unbounded_channel::<String>();
        let handshakes = Arc::new(AtomicUsize::new(0));

        let outgoing_tx = outgoing.clone();
        let handshake_count = Arc::clone(&handshakes);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };

                let received_tx = received_tx.clone();
                let handshake_count = Arc::clone(&handshake_count);
                let mut outgoing_rx = outgoing_tx.subscribe();
                let open = open.clone();

                tokio::spawn(async move {
                    let (mut write, mut read) = ws_stream.split();

                    if write.send(Message::Text(open.into())).await.is_err() {
                        return;
                    }

                    // Wait for the namespace CONNECT
                    loop {
                        match read.next().await {
                            Some(Ok(Message::Text(text))) => {
                                let is_connect = text.starts_with("40");
                                drop(received_tx.send(text.to_string()));
                                if is_connect {
                                    break;
                                }
                            }
                            Some(Ok(_)) => {}
                            _ => return,
                        }
                    }
                    handshake_count.fetch_add(1, Ordering::SeqCst);

                    match handshake {
                        Handshake::Accept => {
                            let ack = r#"40{"sid":"mock-socket-sid"}"#;
                            if write.send(Message::Text(ack.into())).await.is_err() {
                                return;
                            }
                        }
                        Handshake::Reject(message) => {
                            let error = format!("44{}", json!({ "message": message }));
                            drop(write.send(Message::Text(error.into())).await);
                            return;
                        }
                        Handshake::Silent => {}
                    }

                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(received_tx.send(text.to_string()));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = outgoing_rx.recv() => {
                                match msg {
                                    Ok(Outgoing::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outgoing::Close) | Err(_) => {
                                        drop(write.send(Message::Close(None)).await);
                                        break;
                                    }
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            outgoing,
            received,
            handshakes,
        }
    }

    /// HTTP endpoint, as the dashboard would configure it.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// Send a raw Engine.IO frame to all connected clients.
    pub fn send(&self, text: &str) {
        drop(self.outgoing.send(Outgoing::Text(text.to_owned())));
    }

    /// Emit a Socket.IO event on the root namespace.
    pub fn emit(&self, name: &str, payload: &Value) {
        self.send(&format!("42{}", json!([name, payload])));
    }

    /// Drop every connection at the WebSocket level, without a Socket.IO disconnect.
    pub fn close_transport(&self) {
        drop(self.outgoing.send(Outgoing::Close));
    }

    /// Receive the next text frame sent by a client.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.received.recv())
            .await
            .ok()
            .flatten()
    }

    /// Receive frames until one equals `expected`.
    pub async fn recv_until(&mut self, expected: &str) -> bool {
        while let Some(text) = self.recv().await {
            if text == expected {
                return true;
            }
        }
        false
    }
}

/// Sample payloads as emitted by the backend.
pub mod payloads {
    use serde_json::{Value, json};

    pub const DEVICE_ID: &str = "dev-river-01";

    #[must_use]
    pub fn sensor_data(level: f64) -> Value {
        json!({
            "device_id": DEVICE_ID,
            "timestamp": "2025-03-01T10:15:00Z",
            "water_level_cm": level,
            "raw_distance_cm": 200.0 - level,
            "tds": null,
            "turbidity": "4.5",
            "ph": 7.2,
            "temperature": 18.5,
            "rainfall": 0,
            "rainfall_category": "none"
        })
    }

    #[must_use]
    pub fn flood_alert() -> Value {
        json!({
            "device_id": DEVICE_ID,
            "location": "Old Mill Bridge",
            "water_level": 182.0,
            "sensor_height": 200,
            "threshold_percentage": 90,
            "alert_type": "percentage_threshold",
            "timestamp": "2025-03-01T10:15:00Z",
            "detected_at": "2025-03-01T10:15:01Z",
            "message": "Water level has reached 91% of sensor height",
            "isActive": true
        })
    }

    #[must_use]
    pub fn device_status(offline: bool) -> Value {
        json!({
            "device_id": DEVICE_ID,
            "is_offline": offline,
            "name": "River gauge 1",
            "last_seen": "2025-03-01T10:10:00Z"
        })
    }
}
