//! Fan Remote
//!
//! Client for a networked temperature/humidity sensor with an attached cooling
//! fan. Polls the sensor over HTTP, derives a fan speed from the temperature in
//! auto mode and pushes it back to the device.

pub mod args;
pub mod cli;
pub mod config;
pub mod device;
pub mod errors;
pub mod fan_control;
pub mod fan_monitor;
pub mod logging;
pub mod poller;
pub mod reading;
pub mod sensor_client;
pub mod speed_table;

// Re-export commonly used types
pub use config::FanRemoteConfig;
pub use errors::{ControlError, FanRemoteError, NetworkError, Result};
pub use fan_control::{ControlMode, FanController};
pub use fan_monitor::{FanMonitor, MonitorEvent, MonitorHandle, MonitorStatus};
pub use reading::{FanSetpoint, SensorReading};
pub use sensor_client::{HttpSensorClient, SensorClient};
pub use speed_table::SpeedTable;
