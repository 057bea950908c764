//! Simulated sensor device
//!
//! Serves the same two endpoints as the ESP32 firmware so the client can be
//! exercised without hardware: `GET /data` and `POST /set_speed`.

use crate::errors::Result;
use crate::reading::{FanSetpoint, SensorReading};
use crate::sensor_client::{DATA_PATH, SET_SPEED_PATH};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// How often the firmware samples the DHT sensor
pub const SENSOR_PERIOD: Duration = Duration::from_secs(5);

/// Value the firmware reports for humidity and temperature after a failed read
pub const FAILED_READ: f32 = -1.0;

/// Default odds that one sensor sample fails, as a flaky DHT22 does
pub const FAILED_READ_CHANCE: f64 = 0.02;

/// Heat index in °C using the NOAA Rothfusz regression with Steadman's
/// approximation below 80°F, as done by the DHT sensor library.
pub fn heat_index_c(temperature_c: f32, humidity_percent: f32) -> f32 {
    let t = temperature_c * 1.8 + 32.0;
    let rh = humidity_percent;

    let mut hi = 0.5 * (t + 61.0 + ((t - 68.0) * 1.2) + (rh * 0.094));

    if hi > 79.0 {
        hi = -42.379 + 2.049_015_2 * t + 10.143_331 * rh
            - 0.224_755_41 * t * rh
            - 0.006_837_83 * t * t
            - 0.054_817_17 * rh * rh
            + 0.001_228_74 * t * t * rh
            + 0.000_852_82 * t * rh * rh
            - 0.000_001_99 * t * t * rh * rh;

        if rh < 13.0 && (80.0..=112.0).contains(&t) {
            hi -= ((13.0 - rh) * 0.25) * ((17.0 - (t - 95.0).abs()) * 0.058_82).sqrt();
        } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
            hi += ((rh - 85.0) * 0.1) * ((87.0 - t) * 0.2);
        }
    }

    (hi - 32.0) * 0.555_555_6
}

#[derive(Debug)]
struct DeviceState {
    /// What the room is actually like; drift walks this
    conditions: SensorReading,
    /// What `GET /data` reports
    reading: SensorReading,
    fan_speed: FanSetpoint,
    data_failure: Option<StatusCode>,
}

/// In-memory stand-in for the sensor board
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Mutex<DeviceState>,
}

impl SimulatedDevice {
    pub fn new(temperature_c: f32, humidity_percent: f32) -> Arc<Self> {
        let reading = SensorReading::new(
            humidity_percent,
            temperature_c,
            heat_index_c(temperature_c, humidity_percent),
        );
        Arc::new(Self {
            state: Mutex::new(DeviceState {
                conditions: reading,
                reading,
                fan_speed: crate::fan_control::INITIAL_SPEED,
                data_failure: None,
            }),
        })
    }

    pub async fn reading(&self) -> SensorReading {
        self.state.lock().await.reading
    }

    pub async fn fan_speed(&self) -> FanSetpoint {
        self.state.lock().await.fan_speed
    }

    /// Replace the sensed conditions
    pub async fn set_conditions(&self, temperature_c: f32, humidity_percent: f32) {
        let mut state = self.state.lock().await;
        state.conditions = SensorReading::new(
            humidity_percent,
            temperature_c,
            heat_index_c(temperature_c, humidity_percent),
        );
        state.reading = state.conditions;
    }

    /// A failed DHT read. The heat index keeps its previous value.
    pub async fn record_failed_read(&self) {
        let mut state = self.state.lock().await;
        state.reading.humidity_percent = FAILED_READ;
        state.reading.temperature_c = FAILED_READ;
    }

    /// Make `GET /data` answer with `status` until cleared with `None`.
    /// The firmware never does this; it lets callers exercise client error paths.
    pub async fn fail_data_with(&self, status: Option<StatusCode>) {
        self.state.lock().await.data_failure = status;
    }

    /// Take one sensor sample. With probability `failed_read_chance` the read
    /// fails; otherwise the conditions drift a little and are reported.
    async fn sample(&self, failed_read_chance: f64) {
        let (failed, dt, dh) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_bool(failed_read_chance),
                rng.gen_range(-0.3..=0.3),
                rng.gen_range(-1.0..=1.0),
            )
        };

        if failed {
            warn!("Failed to read from DHT sensor!");
            self.record_failed_read().await;
            return;
        }

        let mut state = self.state.lock().await;
        let temperature_c = (state.conditions.temperature_c + dt).clamp(5.0, 35.0);
        let humidity_percent = (state.conditions.humidity_percent + dh).clamp(20.0, 90.0);
        state.conditions = SensorReading::new(
            humidity_percent,
            temperature_c,
            heat_index_c(temperature_c, humidity_percent),
        );
        state.reading = state.conditions;
    }
}

/// Sample the simulated sensor every `period`, forever.
///
/// `failed_read_chance` must lie in `[0, 1]`.
pub async fn run_sensor_task(
    device: Arc<SimulatedDevice>,
    period: Duration,
    failed_read_chance: f64,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        device.sample(failed_read_chance).await;
        info!("Sensor: {}", device.reading().await);
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum StatusResponse {
    Success,
    Error { message: String },
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(StatusResponse::Error {
            message: message.to_string(),
        }),
    )
        .into_response()
}

pub fn router(device: Arc<SimulatedDevice>) -> Router {
    Router::new()
        .route(DATA_PATH, get(data))
        .route(SET_SPEED_PATH, post(set_speed))
        .with_state(device)
}

async fn data(State(device): State<Arc<SimulatedDevice>>) -> Response {
    let state = device.state.lock().await;
    match state.data_failure {
        Some(status) => status.into_response(),
        None => Json(state.reading).into_response(),
    }
}

async fn set_speed(State(device): State<Arc<SimulatedDevice>>, body: Bytes) -> Response {
    let doc: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("JSON parse error: {}", e);
            return bad_request("Invalid JSON");
        }
    };

    let Some(value) = doc.get("fanSpeed") else {
        return bad_request("Missing fanSpeed key");
    };

    let setpoint = value
        .as_f64()
        .and_then(|speed| FanSetpoint::new(speed as f32).ok());

    match setpoint {
        Some(setpoint) => {
            device.state.lock().await.fan_speed = setpoint;
            info!(
                "Fan Speed set to: {} (motor duty {})",
                setpoint.speed(),
                setpoint.motor_duty()
            );
            (StatusCode::OK, Json(StatusResponse::Success)).into_response()
        }
        None => {
            warn!("Invalid fanSpeed value. It must be between 0.0 and 1.0.");
            bad_request("Invalid fanSpeed value")
        }
    }
}

/// Serve the simulator on an already bound listener
pub async fn serve(listener: TcpListener, device: Arc<SimulatedDevice>) -> Result<()> {
    info!("Simulated device listening on {}", listener.local_addr()?);
    axum::serve(listener, router(device)).await?;
    Ok(())
}
