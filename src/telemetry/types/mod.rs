pub mod response;

pub use response::{
    AlertType, CriticalWaterQualityAlert, Device, DeviceStatusUpdate, FloodAlert, RainfallUpdate,
    RapidRiseAlert, SensorData, TelemetryEvent, WaterQualityUpdate,
};
