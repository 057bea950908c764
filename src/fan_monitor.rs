//! Fan monitor: the single task that owns all controller state
//!
//! Operator commands, network completions and poller ticks are all funnelled
//! into one `select!` loop, so the [`FanController`] is only ever touched from
//! this task. Network calls run on their own spawned tasks and report back
//! through a channel; the loop never waits on the device.

use crate::config::FanRemoteConfig;
use crate::errors::{ControlError, FanRemoteError, NetworkError, Result};
use crate::fan_control::{ControlMode, FanController};
use crate::poller::Poller;
use crate::reading::{FanSetpoint, SensorReading};
use crate::sensor_client::SensorClient;
use crate::speed_table::SpeedTable;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 64;

/// Monitor behaviour knobs, usually taken from [`FanRemoteConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub fetch_on_tick: bool,
    pub discard_stale_completions: bool,
}

impl From<&FanRemoteConfig> for MonitorSettings {
    fn from(config: &FanRemoteConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            fetch_on_tick: config.fetch_on_tick,
            discard_stale_completions: config.discard_stale_completions,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&FanRemoteConfig::default())
    }
}

/// What the presentation layer can see
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorStatus {
    pub reading: Option<SensorReading>,
    pub mode: ControlMode,
    pub current_speed: FanSetpoint,
    pub last_error: Option<String>,
    pub polling: bool,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reading {
            Some(reading) => write!(f, "{}", reading)?,
            None => write!(f, "Loading data...")?,
        }
        let mode = match self.mode {
            ControlMode::Auto => "Auto Mode ON",
            ControlMode::Manual => "Auto Mode OFF",
        };
        write!(f, " | Fan: {} | {}", self.current_speed, mode)?;
        if let Some(error) = &self.last_error {
            write!(f, " | Error: {}", error)?;
        }
        Ok(())
    }
}

/// Notifications pushed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Reading(SensorReading),
    SpeedApplied(FanSetpoint),
    Error(String),
}

enum MonitorCommand {
    SetAutoMode(bool),
    SetManualSpeed(f32, oneshot::Sender<std::result::Result<FanSetpoint, ControlError>>),
    Refresh,
    Status(oneshot::Sender<MonitorStatus>),
    Shutdown,
}

enum Completion {
    Fetched {
        seq: u64,
        result: std::result::Result<SensorReading, NetworkError>,
    },
    Pushed {
        seq: u64,
        setpoint: FanSetpoint,
        result: std::result::Result<(), NetworkError>,
    },
}

/// Cloneable front door to a running [`FanMonitor`]
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    events: broadcast::Sender<MonitorEvent>,
}

impl fmt::Debug for MonitorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorCommand::SetAutoMode(enabled) => write!(f, "SetAutoMode({})", enabled),
            MonitorCommand::SetManualSpeed(speed, _) => write!(f, "SetManualSpeed({})", speed),
            MonitorCommand::Refresh => write!(f, "Refresh"),
            MonitorCommand::Status(_) => write!(f, "Status"),
            MonitorCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl MonitorHandle {
    async fn send(&self, command: MonitorCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FanRemoteError::MonitorStopped)
    }

    pub async fn set_auto_mode(&self, enabled: bool) -> Result<()> {
        self.send(MonitorCommand::SetAutoMode(enabled)).await
    }

    /// Set the fan speed by hand and push it to the device
    pub async fn set_manual_speed(&self, speed: f32) -> Result<FanSetpoint> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::SetManualSpeed(speed, tx)).await?;
        let setpoint = rx.await.map_err(|_| FanRemoteError::MonitorStopped)??;
        Ok(setpoint)
    }

    /// Fetch a fresh reading now
    pub async fn refresh(&self) -> Result<()> {
        self.send(MonitorCommand::Refresh).await
    }

    pub async fn status(&self) -> Result<MonitorStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorCommand::Status(tx)).await?;
        rx.await.map_err(|_| FanRemoteError::MonitorStopped)
    }

    /// Latest reading, `None` until the first fetch succeeds
    pub async fn current_reading(&self) -> Result<Option<SensorReading>> {
        Ok(self.status().await?.reading)
    }

    pub async fn last_error(&self) -> Result<Option<String>> {
        Ok(self.status().await?.last_error)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(MonitorCommand::Shutdown).await
    }
}

/// Fan monitoring system
pub struct FanMonitor {
    client: Arc<dyn SensorClient>,
    controller: FanController,
    settings: MonitorSettings,
    poller: Poller,
    reading: Option<SensorReading>,
    last_error: Option<String>,
    fetch_seq: u64,
    push_seq: u64,
    applied_fetch_seq: u64,
    applied_push_seq: u64,
    completions: mpsc::UnboundedSender<Completion>,
    completion_rx: Option<mpsc::UnboundedReceiver<Completion>>,
    events: broadcast::Sender<MonitorEvent>,
}

impl FanMonitor {
    /// Create a monitor with the standard speed table
    pub fn new(client: Arc<dyn SensorClient>, config: &FanRemoteConfig) -> Self {
        let controller = FanController::new(SpeedTable::standard(), config.debounce_threshold_c);
        Self::with_controller(client, controller, MonitorSettings::from(config))
    }

    pub fn with_controller(
        client: Arc<dyn SensorClient>,
        controller: FanController,
        settings: MonitorSettings,
    ) -> Self {
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_QUEUE);

        Self {
            client,
            controller,
            poller: Poller::new(settings.poll_interval),
            settings,
            reading: None,
            last_error: None,
            fetch_seq: 0,
            push_seq: 0,
            applied_fetch_seq: 0,
            applied_push_seq: 0,
            completions,
            completion_rx: Some(completion_rx),
            events,
        }
    }

    /// Run the monitor on its own task
    pub fn spawn(self) -> (MonitorHandle, JoinHandle<()>) {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let handle = MonitorHandle {
            commands,
            events: self.events.clone(),
        };
        let task = tokio::spawn(self.run(command_rx));
        (handle, task)
    }

    /// Run monitoring loop until shutdown or until every handle is dropped
    async fn run(mut self, mut commands: mpsc::Receiver<MonitorCommand>) {
        let Some(mut completion_rx) = self.completion_rx.take() else {
            warn!("Fan monitor started twice");
            return;
        };

        info!("Starting fan monitor");
        self.start_fetch();
        if self.settings.fetch_on_tick {
            self.poller.start();
        }

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(MonitorCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = completion_rx.recv() => self.handle_completion(completion),
                _ = self.poller.tick() => self.on_tick(),
            }
        }

        self.poller.stop();
        info!("Stopped fan monitor");
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            reading: self.reading,
            mode: self.controller.mode(),
            current_speed: self.controller.current_speed(),
            last_error: self.last_error.clone(),
            polling: self.poller.is_running(),
        }
    }

    fn handle_command(&mut self, command: MonitorCommand) {
        debug!("Command: {:?}", command);

        match command {
            MonitorCommand::SetAutoMode(enabled) => self.set_auto_mode(enabled),
            MonitorCommand::SetManualSpeed(speed, reply) => {
                let result = self.controller.set_manual_speed(speed);
                match result {
                    Ok(setpoint) => self.start_push(setpoint),
                    Err(ref e) => warn!("Rejected manual speed: {}", e),
                }
                let _ = reply.send(result);
            }
            MonitorCommand::Refresh => self.start_fetch(),
            MonitorCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            MonitorCommand::Shutdown => {}
        }
    }

    fn set_auto_mode(&mut self, enabled: bool) {
        let setpoint = self.controller.set_auto_mode(enabled, self.reading.as_ref());

        if enabled {
            self.poller.start();
        } else if !self.settings.fetch_on_tick && self.poller.stop() {
            info!("Stopped continuous polling");
        }

        if let Some(setpoint) = setpoint {
            self.start_push(setpoint);
        }
    }

    fn on_tick(&mut self) {
        if self.settings.fetch_on_tick {
            self.start_fetch();
        }

        if !self.controller.is_auto() {
            return;
        }

        if let Some(reading) = self.reading {
            if let Some(setpoint) = self.controller.evaluate(reading.temperature_c) {
                self.start_push(setpoint);
            }
        }
    }

    fn start_fetch(&mut self) {
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();

        debug!("Fetch #{} started", seq);
        tokio::spawn(async move {
            let result = client.fetch_reading().await;
            let _ = completions.send(Completion::Fetched { seq, result });
        });
    }

    fn start_push(&mut self, setpoint: FanSetpoint) {
        self.push_seq += 1;
        let seq = self.push_seq;
        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();

        info!("Sending fan speed: {} (push #{})", setpoint, seq);
        tokio::spawn(async move {
            let result = client.push_setpoint(setpoint).await;
            let _ = completions.send(Completion::Pushed {
                seq,
                setpoint,
                result,
            });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched { seq, result } => {
                let discard = self.settings.discard_stale_completions;
                if !accept_completion(discard, "fetch", seq, &mut self.applied_fetch_seq) {
                    return;
                }

                match result {
                    Ok(reading) => {
                        debug!("Fetch #{} returned {}", seq, reading);
                        self.reading = Some(reading);
                        self.last_error = None;
                        let _ = self.events.send(MonitorEvent::Reading(reading));

                        if let Some(setpoint) = self.controller.on_reading(&reading) {
                            self.start_push(setpoint);
                        }
                    }
                    Err(e) => self.report_error(format!("Failed to fetch data: {}", e)),
                }
            }
            Completion::Pushed {
                seq,
                setpoint,
                result,
            } => {
                let discard = self.settings.discard_stale_completions;
                if !accept_completion(discard, "push", seq, &mut self.applied_push_seq) {
                    return;
                }

                match result {
                    Ok(()) => {
                        debug!("Push #{} applied {}", seq, setpoint);
                        let _ = self.events.send(MonitorEvent::SpeedApplied(setpoint));
                    }
                    Err(e) => self.report_error(format!("Failed to send speed: {}", e)),
                }
            }
        }
    }

    fn report_error(&mut self, message: String) {
        warn!("{}", message);
        self.last_error = Some(message.clone());
        let _ = self.events.send(MonitorEvent::Error(message));
    }
}

/// A completion is stale when a newer one of the same kind was already
/// applied. Otherwise `applied` advances to `seq`.
fn accept_completion(discard_stale: bool, kind: &str, seq: u64, applied: &mut u64) -> bool {
    if discard_stale && seq <= *applied {
        warn!("Discarding stale {} #{} (already applied #{})", kind, seq, applied);
        return false;
    }
    *applied = (*applied).max(seq);
    true
}
