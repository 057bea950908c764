//! Command handlers for the fan remote binary

use crate::{
    args::{Args, Commands, ConfigCommands},
    config::FanRemoteConfig,
    device::{self, SimulatedDevice},
    fan_monitor::{FanMonitor, MonitorEvent, MonitorHandle},
    reading::FanSetpoint,
    sensor_client::{HttpSensorClient, SensorClient},
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

const CONSOLE_HELP: &str = "Commands: auto on | auto off | speed <0.0-1.0> | refresh | status | help | quit";

/// A line typed into the `run` console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Auto(bool),
    Speed(f32),
    Refresh,
    Status,
    Help,
    Quit,
}

impl std::str::FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("auto"), Some("on")) => ConsoleCommand::Auto(true),
            (Some("auto"), Some("off")) => ConsoleCommand::Auto(false),
            (Some("speed"), Some(value)) => ConsoleCommand::Speed(
                value
                    .parse()
                    .map_err(|_| format!("Not a number: {}", value))?,
            ),
            (Some("refresh"), None) => ConsoleCommand::Refresh,
            (Some("status"), None) => ConsoleCommand::Status,
            (Some("help"), None) => ConsoleCommand::Help,
            (Some("quit" | "exit"), None) => ConsoleCommand::Quit,
            _ => return Err(format!("Unknown command: {}", line.trim())),
        };

        if words.next().is_some() {
            return Err(format!("Unexpected arguments: {}", line.trim()));
        }
        Ok(command)
    }
}

/// Handle CLI commands
pub async fn handle_args(args: Args) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(FanRemoteConfig::get_config_path);
    let config = effective_config(&args, &config_path)?;

    match args.command {
        Commands::Read => read_once(&config).await,
        Commands::SetSpeed { speed } => set_speed(&config, speed).await,
        Commands::Run { auto } => run_monitor(&config, auto).await,
        Commands::Simulate {
            bind,
            temperature,
            humidity,
            failed_read_chance,
        } => simulate(bind, temperature, humidity, failed_read_chance).await,
        Commands::Config { command } => config_command(command, &config, &config_path),
    }
}

/// Config file, then environment, then command line
fn effective_config(args: &Args, path: &Path) -> Result<FanRemoteConfig> {
    let mut config = FanRemoteConfig::load_or_default(path)?;
    config.apply_env();
    if let Some(url) = &args.device_url {
        config.device_url = url.clone();
    }
    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

async fn read_once(config: &FanRemoteConfig) -> Result<()> {
    let client = HttpSensorClient::from_config(config)?;
    let reading = client
        .fetch_reading()
        .await
        .context("Failed to fetch data")?;
    println!("{}", reading);
    Ok(())
}

async fn set_speed(config: &FanRemoteConfig, speed: f32) -> Result<()> {
    let setpoint = FanSetpoint::new(speed)?;
    let client = HttpSensorClient::from_config(config)?;
    client
        .push_setpoint(setpoint)
        .await
        .context("Failed to send speed")?;
    println!("Fan speed set to {}", setpoint);
    Ok(())
}

async fn run_monitor(config: &FanRemoteConfig, auto: bool) -> Result<()> {
    let client = Arc::new(HttpSensorClient::from_config(config)?);
    let (handle, task) = FanMonitor::new(client, config).spawn();
    let mut events = handle.subscribe();

    if auto {
        handle.set_auto_mode(true).await?;
    }

    println!("{}", CONSOLE_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => execute(&handle, command).await?,
                    Err(message) => println!("{}", message),
                }
            }
            event = events.recv() => match event {
                Ok(MonitorEvent::Reading(_)) => println!("{}", handle.status().await?),
                Ok(MonitorEvent::SpeedApplied(setpoint)) => println!("Fan speed applied: {}", setpoint),
                Ok(MonitorEvent::Error(message)) => println!("Error: {}", message),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} monitor events", missed),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await?;
    task.await.context("Fan monitor task failed")?;
    Ok(())
}

async fn execute(handle: &MonitorHandle, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::Auto(enabled) => handle.set_auto_mode(enabled).await?,
        ConsoleCommand::Speed(speed) => match handle.set_manual_speed(speed).await {
            Ok(setpoint) => println!("Sending fan speed: {}", setpoint),
            Err(e) => println!("{}", e),
        },
        ConsoleCommand::Refresh => handle.refresh().await?,
        ConsoleCommand::Status => println!("{}", handle.status().await?),
        ConsoleCommand::Help => println!("{}", CONSOLE_HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

async fn simulate(
    bind: SocketAddr,
    temperature: f32,
    humidity: f32,
    failed_read_chance: f64,
) -> Result<()> {
    if !(0.0..=1.0).contains(&failed_read_chance) {
        anyhow::bail!("--failed-read-chance must be between 0.0 and 1.0");
    }

    let device = SimulatedDevice::new(temperature, humidity);
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tokio::spawn(device::run_sensor_task(
        device.clone(),
        device::SENSOR_PERIOD,
        failed_read_chance,
    ));

    tokio::select! {
        result = device::serve(listener, device) => result?,
        _ = tokio::signal::ctrl_c() => info!("Simulated device stopped"),
    }
    Ok(())
}

fn config_command(command: ConfigCommands, config: &FanRemoteConfig, path: &Path) -> Result<()> {
    match command {
        ConfigCommands::Init => {
            config.save_to_file(path)?;
            println!("Configuration written to {}", path.display());
        }
        ConfigCommands::Show => {
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}
