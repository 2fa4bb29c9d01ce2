use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::serde_as;

use crate::Result;
use crate::serde_helpers::{F64FromAny, StringFromAny, deserialize_with_warnings};
use crate::types::{DateTime, Utc};

pub const NEW_SENSOR_DATA: &str = "new_sensor_data";
pub const FLOOD_ALERT: &str = "flood_alert";
pub const RAPID_RISE_ALERT: &str = "rapid_rise_alert";
pub const RAINFALL_UPDATE: &str = "rainfall_update";
pub const DEVICE_UPDATED: &str = "device_updated";
pub const DEVICE_STATUS_UPDATE: &str = "device_status_update";
pub const WATER_QUALITY_UPDATE: &str = "water_quality_update";
pub const CRITICAL_WATER_QUALITY_ALERT: &str = "critical_water_quality_alert";

/// An inbound telemetry event, decoded by event name.
///
/// Events whose name is not recognized are kept as [`TelemetryEvent::Other`]
/// with their raw payload.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    SensorData(SensorData),
    FloodAlert(FloodAlert),
    RapidRiseAlert(RapidRiseAlert),
    RainfallUpdate(RainfallUpdate),
    DeviceUpdated(Device),
    DeviceStatus(DeviceStatusUpdate),
    WaterQuality(WaterQualityUpdate),
    CriticalWaterQualityAlert(CriticalWaterQualityAlert),
    Other { name: String, payload: Value },
}

impl TelemetryEvent {
    /// Decode the first argument of the event called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload of a known event does not match its schema.
    pub fn parse(name: &str, args: Vec<Value>) -> Result<Self> {
        let payload = args.into_iter().next().unwrap_or(Value::Null);

        let event = match name {
            NEW_SENSOR_DATA => Self::SensorData(deserialize_with_warnings(payload)?),
            FLOOD_ALERT => Self::FloodAlert(deserialize_with_warnings(payload)?),
            RAPID_RISE_ALERT => Self::RapidRiseAlert(deserialize_with_warnings(payload)?),
            RAINFALL_UPDATE => Self::RainfallUpdate(deserialize_with_warnings(payload)?),
            DEVICE_UPDATED => Self::DeviceUpdated(deserialize_with_warnings(payload)?),
            DEVICE_STATUS_UPDATE => Self::DeviceStatus(deserialize_with_warnings(payload)?),
            WATER_QUALITY_UPDATE => Self::WaterQuality(deserialize_with_warnings(payload)?),
            CRITICAL_WATER_QUALITY_ALERT => {
                Self::CriticalWaterQualityAlert(deserialize_with_warnings(payload)?)
            }
            other => Self::Other {
                name: other.to_owned(),
                payload,
            },
        };

        Ok(event)
    }

    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SensorData(_) => NEW_SENSOR_DATA,
            Self::FloodAlert(_) => FLOOD_ALERT,
            Self::RapidRiseAlert(_) => RAPID_RISE_ALERT,
            Self::RainfallUpdate(_) => RAINFALL_UPDATE,
            Self::DeviceUpdated(_) => DEVICE_UPDATED,
            Self::DeviceStatus(_) => DEVICE_STATUS_UPDATE,
            Self::WaterQuality(_) => WATER_QUALITY_UPDATE,
            Self::CriticalWaterQualityAlert(_) => CRITICAL_WATER_QUALITY_ALERT,
            Self::Other { name, .. } => name,
        }
    }

    /// Device the event concerns, when the payload names one.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::SensorData(e) => Some(&e.device_id),
            Self::FloodAlert(e) => Some(&e.device_id),
            Self::RapidRiseAlert(e) => Some(&e.device_id),
            Self::RainfallUpdate(e) => Some(&e.device_id),
            Self::DeviceUpdated(e) => Some(&e.id),
            Self::DeviceStatus(e) => Some(&e.device_id),
            Self::WaterQuality(e) => Some(&e.device_id),
            Self::CriticalWaterQualityAlert(e) => Some(&e.device_id),
            Self::Other { .. } => None,
        }
    }
}

/// Periodic sensor reading (`new_sensor_data`).
///
/// Every reading is optional; sensors that are not fitted report `null` or
/// leave the field out.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct SensorData {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// Water level in centimeters
    #[serde_as(as = "Option<F64FromAny>")]
    pub water_level_cm: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    #[serde(rename = "waterLevelCm")]
    pub water_level_cm_camel: Option<f64>,
    /// Distance from the ultrasonic sensor to the water surface
    #[serde_as(as = "Option<F64FromAny>")]
    pub raw_distance_cm: Option<f64>,
    /// Total dissolved solids, in ppm
    #[serde_as(as = "Option<F64FromAny>")]
    pub tds: Option<f64>,
    /// Turbidity, in NTU
    #[serde_as(as = "Option<F64FromAny>")]
    pub turbidity: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub ph: Option<f64>,
    /// Water temperature in degrees Celsius
    #[serde_as(as = "Option<F64FromAny>")]
    pub temperature: Option<f64>,
    /// Raw rain gauge value
    #[serde_as(as = "Option<F64FromAny>")]
    pub rainfall: Option<f64>,
    #[serde(default)]
    pub rainfall_category: Option<String>,
    #[serde(default)]
    pub water_quality_category: Option<String>,
}

impl SensorData {
    /// Water level, whichever naming the backend used.
    #[must_use]
    pub fn water_level(&self) -> Option<f64> {
        self.water_level_cm.or(self.water_level_cm_camel)
    }
}

/// How a [`FloodAlert`] threshold was crossed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Water level crossed a percentage of the sensor height
    PercentageThreshold,
    /// Water level crossed a fixed level in centimeters
    AbsoluteThreshold,
    /// Alert type this client does not know yet
    #[serde(untagged)]
    Unknown(String),
}

/// Water level crossed a device threshold (`flood_alert`).
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct FloodAlert {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde_as(as = "F64FromAny")]
    pub water_level: f64,
    #[serde_as(as = "Option<F64FromAny>")]
    pub sensor_height: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub threshold_percentage: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub critical_level: Option<f64>,
    pub alert_type: AlertType,
    /// When the sensor took the reading
    pub timestamp: DateTime<Utc>,
    /// When the server detected the crossing
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
    pub message: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, rename = "isActive")]
    pub is_active_camel: Option<bool>,
}

impl FloodAlert {
    /// Whether the alert is still in effect. Alerts without a flag are active.
    #[must_use]
    pub fn active(&self) -> bool {
        resolve_active(self.is_active, self.is_active_camel)
    }
}

/// Water level is rising faster than the configured rate (`rapid_rise_alert`).
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct RapidRiseAlert {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    pub message: String,
    #[serde_as(as = "F64FromAny")]
    pub current_level: f64,
    #[serde_as(as = "F64FromAny")]
    pub previous_level: f64,
    /// Centimeters per minute
    #[serde_as(as = "F64FromAny")]
    pub rate_of_change: f64,
    /// Seconds between the two compared readings
    #[serde_as(as = "F64FromAny")]
    pub check_interval: f64,
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub rise_amount: Option<f64>,
    /// Minutes over which `rise_amount` was measured
    #[serde_as(as = "Option<F64FromAny>")]
    pub rise_period: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, rename = "isActive")]
    pub is_active_camel: Option<bool>,
}

impl RapidRiseAlert {
    #[must_use]
    pub fn active(&self) -> bool {
        resolve_active(self.is_active, self.is_active_camel)
    }
}

#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct RainfallUpdate {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    #[serde_as(as = "Option<F64FromAny>")]
    pub raw_value: Option<f64>,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

/// A monitoring device record (`device_updated`).
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct Device {
    #[serde_as(as = "StringFromAny")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Mounting height of the sensor above the channel bed, in centimeters
    #[serde_as(as = "Option<F64FromAny>")]
    pub sensor_height: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub threshold_cm: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    #[serde(rename = "thresholdCm")]
    pub threshold_cm_camel: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub threshold_percentage: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub critical_level: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub latitude: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, rename = "isActive")]
    pub is_active_camel: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Alert threshold in centimeters, whichever naming the backend used.
    #[must_use]
    pub fn threshold(&self) -> Option<f64> {
        self.threshold_cm.or(self.threshold_cm_camel)
    }

    #[must_use]
    pub fn active(&self) -> bool {
        resolve_active(self.is_active, self.is_active_camel)
    }
}

#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct DeviceStatusUpdate {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    pub is_offline: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct WaterQualityUpdate {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    #[serde_as(as = "Option<F64FromAny>")]
    pub ph: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub turbidity: Option<f64>,
    pub quality_category: String,
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub tds: Option<f64>,
}

/// Water quality reached a critical level (`critical_water_quality_alert`).
///
/// The notification fields are the web-push content the backend suggests
/// for this alert.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct CriticalWaterQualityAlert {
    #[serde_as(as = "StringFromAny")]
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub message: String,
    /// Which reading is critical, e.g. `"ph"` or `"turbidity"`
    #[serde(default)]
    pub critical_parameter: Option<String>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub critical_value: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub ph: Option<f64>,
    #[serde_as(as = "Option<F64FromAny>")]
    pub turbidity: Option<f64>,
    pub quality_category: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Page to open when the notification is clicked
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub server_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, rename = "isActive")]
    pub is_active_camel: Option<bool>,
}

impl CriticalWaterQualityAlert {
    #[must_use]
    pub fn active(&self) -> bool {
        resolve_active(self.is_active, self.is_active_camel)
    }
}

// `false` under either name wins.
fn resolve_active(snake: Option<bool>, camel: Option<bool>) -> bool {
    match (snake, camel) {
        (Some(false), _) | (_, Some(false)) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sensor_data_with_sparse_readings() {
        let event = TelemetryEvent::parse(
            NEW_SENSOR_DATA,
            vec![json!({
                "device_id": "dev-7",
                "timestamp": "2025-03-01T10:15:00Z",
                "water_level_cm": 42.5,
                "tds": null,
                "ph": "7.1",
                "rainfall_category": "light"
            })],
        )
        .unwrap();

        let TelemetryEvent::SensorData(data) = event else {
            panic!("expected sensor data, got {event:?}");
        };
        assert_eq!(data.device_id, "dev-7");
        assert_eq!(data.water_level(), Some(42.5));
        assert_eq!(data.tds, None);
        assert_eq!(data.ph, Some(7.1));
        assert_eq!(data.turbidity, None);
        assert_eq!(data.rainfall_category.as_deref(), Some("light"));
    }

    #[test]
    fn sensor_data_camel_case_water_level() {
        let data: SensorData = serde_json::from_value(json!({
            "device_id": 12,
            "timestamp": "2025-03-01T10:15:00+08:00",
            "waterLevelCm": 30
        }))
        .unwrap();

        assert_eq!(data.device_id, "12");
        assert_eq!(data.water_level_cm, None);
        assert_eq!(data.water_level(), Some(30.0));
    }

    #[test]
    fn flood_alert_types_and_flags() {
        let alert: FloodAlert = serde_json::from_value(json!({
            "device_id": "dev-1",
            "location": "Bridge 4",
            "water_level": 180,
            "threshold_percentage": 80,
            "alert_type": "percentage_threshold",
            "timestamp": "2025-03-01T10:15:00Z",
            "detected_at": "2025-03-01T10:15:02Z",
            "message": "Water level at 80% of sensor height",
            "isActive": true
        }))
        .unwrap();

        assert_eq!(alert.alert_type, AlertType::PercentageThreshold);
        assert_eq!(alert.is_active, None);
        assert!(alert.active());

        let future: AlertType = serde_json::from_value(json!("rate_threshold")).unwrap();
        assert_eq!(future, AlertType::Unknown("rate_threshold".to_owned()));
    }

    #[test]
    fn both_active_spellings_are_kept() {
        let alert: RapidRiseAlert = serde_json::from_value(json!({
            "device_id": "dev-1",
            "message": "Rapid rise",
            "current_level": 120.0,
            "previous_level": 100.0,
            "rate_of_change": 4.0,
            "check_interval": 300,
            "timestamp": "2025-03-01T10:15:00Z",
            "is_active": true,
            "isActive": false
        }))
        .unwrap();

        assert_eq!(alert.is_active, Some(true));
        assert_eq!(alert.is_active_camel, Some(false));
        assert!(!alert.active());
    }

    #[test]
    fn device_threshold_variants() {
        let snake: Device =
            serde_json::from_value(json!({"id": 3, "name": "North", "threshold_cm": 150})).unwrap();
        let camel: Device =
            serde_json::from_value(json!({"id": "4", "name": "South", "thresholdCm": "90"}))
                .unwrap();

        assert_eq!(snake.id, "3");
        assert_eq!(snake.threshold(), Some(150.0));
        assert_eq!(camel.threshold(), Some(90.0));
        assert!(camel.active());
    }

    #[test]
    fn critical_water_quality_alert_with_notification() {
        let event = TelemetryEvent::parse(
            CRITICAL_WATER_QUALITY_ALERT,
            vec![json!({
                "device_id": "dev-9",
                "device_name": "Canal",
                "message": "pH critical",
                "critical_parameter": "ph",
                "critical_value": 4.2,
                "timestamp": "2025-03-01T10:15:00Z",
                "ph": 4.2,
                "turbidity": null,
                "quality_category": "critical",
                "title": "Water quality alert",
                "url": "/devices/dev-9",
                "is_active": true
            })],
        )
        .unwrap();

        assert_eq!(event.name(), CRITICAL_WATER_QUALITY_ALERT);
        assert_eq!(event.device_id(), Some("dev-9"));
        let TelemetryEvent::CriticalWaterQualityAlert(alert) = event else {
            panic!("expected critical alert");
        };
        assert_eq!(alert.critical_value, Some(4.2));
        assert_eq!(alert.turbidity, None);
        assert_eq!(alert.url.as_deref(), Some("/devices/dev-9"));
    }

    #[test]
    fn unknown_event_is_kept_raw() {
        let event = TelemetryEvent::parse("maintenance_window", vec![json!({"minutes": 5})]).unwrap();

        assert_eq!(
            event,
            TelemetryEvent::Other {
                name: "maintenance_window".to_owned(),
                payload: json!({"minutes": 5}),
            }
        );
        assert_eq!(event.device_id(), None);
    }

    #[test]
    fn malformed_known_event_is_an_error() {
        TelemetryEvent::parse(FLOOD_ALERT, vec![json!({"device_id": "dev-1"})]).unwrap_err();
        TelemetryEvent::parse(DEVICE_STATUS_UPDATE, vec![]).unwrap_err();
    }

    #[test]
    fn device_status_offline_flag() {
        let event = TelemetryEvent::parse(
            DEVICE_STATUS_UPDATE,
            vec![json!({"device_id": "dev-2", "is_offline": true, "last_seen": "2025-03-01T09:00:00Z"})],
        )
        .unwrap();

        let TelemetryEvent::DeviceStatus(status) = event else {
            panic!("expected device status");
        };
        assert!(status.is_offline);
        assert!(status.last_seen.is_some());
    }

    #[test]
    fn device_status_numeric_device_id() {
        let event = TelemetryEvent::parse(
            DEVICE_STATUS_UPDATE,
            vec![json!({"device_id": 42, "is_offline": false, "name": "Weir"})],
        )
        .unwrap();

        let expected = DeviceStatusUpdate::builder()
            .device_id("42".to_owned())
            .is_offline(false)
            .name("Weir".to_owned())
            .build();
        assert_eq!(event, TelemetryEvent::DeviceStatus(expected));
        assert_eq!(event.device_id(), Some("42"));
    }
}
