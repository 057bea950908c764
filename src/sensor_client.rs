//! HTTP client for the sensor device

use crate::config::FanRemoteConfig;
use crate::errors::{FanRemoteError, NetworkError, Result};
use crate::reading::{FanSetpoint, SensorReading, SetSpeedRequest};
use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;

pub const DATA_PATH: &str = "/data";
pub const SET_SPEED_PATH: &str = "/set_speed";

/// The two calls the controller makes against the device.
///
/// Implementations never retry; each failure is reported once to the caller.
#[async_trait]
pub trait SensorClient: Send + Sync {
    /// `GET /data`
    async fn fetch_reading(&self) -> std::result::Result<SensorReading, NetworkError>;

    /// `POST /set_speed`
    async fn push_setpoint(&self, setpoint: FanSetpoint) -> std::result::Result<(), NetworkError>;
}

/// reqwest-backed device client
#[derive(Debug, Clone)]
pub struct HttpSensorClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSensorClient {
    /// Create a client for the device at `base_url`. Without a timeout a hung
    /// request never completes.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| FanRemoteError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("Sensor device at {}", base_url);
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &FanRemoteConfig) -> Result<Self> {
        Self::new(&config.device_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SensorClient for HttpSensorClient {
    async fn fetch_reading(&self) -> std::result::Result<SensorReading, NetworkError> {
        let response = self.http.get(self.endpoint(DATA_PATH)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::BadStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let reading: SensorReading = serde_json::from_slice(&body)
            .map_err(|e| NetworkError::MalformedBody(e.to_string()))?;

        debug!("Fetched reading: {}", reading);
        Ok(reading)
    }

    async fn push_setpoint(&self, setpoint: FanSetpoint) -> std::result::Result<(), NetworkError> {
        debug!("Sending fan speed: {}", setpoint.speed());

        let response = self
            .http
            .post(self.endpoint(SET_SPEED_PATH))
            .json(&SetSpeedRequest::from(setpoint))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::BadStatus(status.as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = HttpSensorClient::new("http://192.168.4.1/", None).unwrap();
        assert_eq!(client.base_url(), "http://192.168.4.1");
        assert_eq!(client.endpoint(DATA_PATH), "http://192.168.4.1/data");
        assert_eq!(client.endpoint(SET_SPEED_PATH), "http://192.168.4.1/set_speed");
    }

    #[tokio::test]
    async fn test_unreachable_device_is_transport_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine
        let client = HttpSensorClient::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        let err = client.fetch_reading().await.unwrap_err();
        assert!(matches!(err, NetworkError::Transport(_)), "got {:?}", err);
    }
}
