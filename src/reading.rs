//! Sensor readings and fan setpoints exchanged with the device

use crate::errors::ControlError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One snapshot of the device's DHT sensor.
///
/// The heat index is computed by the device and carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "humidity")]
    pub humidity_percent: f32,
    #[serde(rename = "temperatureC")]
    pub temperature_c: f32,
    #[serde(rename = "heatIndexC")]
    pub heat_index_c: f32,
}

impl SensorReading {
    pub fn new(humidity_percent: f32, temperature_c: f32, heat_index_c: f32) -> Self {
        Self {
            humidity_percent,
            temperature_c,
            heat_index_c,
        }
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Humidity: {:.1}% | Temperature: {:.1}°C | Heat Index: {:.1}°C",
            self.humidity_percent, self.temperature_c, self.heat_index_c
        )
    }
}

/// Normalized fan speed in `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct FanSetpoint(pub(crate) f32);

impl FanSetpoint {
    pub const OFF: FanSetpoint = FanSetpoint(0.0);
    pub const FULL: FanSetpoint = FanSetpoint(1.0);

    /// Validate a raw speed. NaN and anything outside `[0, 1]` is rejected.
    pub fn new(speed: f32) -> Result<Self, ControlError> {
        if (0.0..=1.0).contains(&speed) {
            Ok(Self(speed))
        } else {
            Err(ControlError::InvalidSpeed(speed))
        }
    }

    pub fn speed(self) -> f32 {
        self.0
    }

    /// Motor duty the device derives from this setpoint (0-255)
    pub fn motor_duty(self) -> u8 {
        (self.0 * 255.0) as u8
    }
}

impl fmt::Display for FanSetpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}

/// Body of `POST /set_speed`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetSpeedRequest {
    #[serde(rename = "fanSpeed")]
    pub fan_speed: f32,
}

impl From<FanSetpoint> for SetSpeedRequest {
    fn from(setpoint: FanSetpoint) -> Self {
        Self {
            fan_speed: setpoint.speed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_wire_names() {
        let json = r#"{"humidity": 41.0, "temperatureC": 21.5, "heatIndexC": 21.2}"#;
        let reading: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading, SensorReading::new(41.0, 21.5, 21.2));
    }

    #[test]
    fn test_reading_missing_field_is_rejected() {
        let json = r#"{"humidity": 41.0, "temperatureC": 21.5}"#;
        assert!(serde_json::from_str::<SensorReading>(json).is_err());

        let json = r#"{"humidity": "wet", "temperatureC": 21.5, "heatIndexC": 21.2}"#;
        assert!(serde_json::from_str::<SensorReading>(json).is_err());
    }

    #[test]
    fn test_setpoint_bounds() {
        assert_eq!(FanSetpoint::new(0.0).unwrap(), FanSetpoint::OFF);
        assert_eq!(FanSetpoint::new(1.0).unwrap(), FanSetpoint::FULL);
        assert_eq!(FanSetpoint::new(1.01), Err(ControlError::InvalidSpeed(1.01)));
        assert_eq!(FanSetpoint::new(-0.1), Err(ControlError::InvalidSpeed(-0.1)));
        assert!(FanSetpoint::new(f32::NAN).is_err());
    }

    #[test]
    fn test_set_speed_body() {
        let body = serde_json::to_string(&SetSpeedRequest::from(FanSetpoint::FULL)).unwrap();
        assert_eq!(body, r#"{"fanSpeed":1.0}"#);
    }

    #[test]
    fn test_motor_duty() {
        assert_eq!(FanSetpoint::OFF.motor_duty(), 0);
        assert_eq!(FanSetpoint::new(0.5).unwrap().motor_duty(), 127);
        assert_eq!(FanSetpoint::FULL.motor_duty(), 255);
    }
}
