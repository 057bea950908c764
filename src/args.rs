//! Command line argument parsing for the fan remote

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Fan Remote
///
/// Monitor a networked temperature/humidity sensor and drive its cooling fan.
#[derive(Parser, Debug)]
#[command(name = "fan-remote")]
#[command(about = "Sensor monitor and fan controller")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device base URL, overrides the config file and FAN_REMOTE_DEVICE_URL
    #[arg(long, global = true)]
    pub device_url: Option<String>,

    /// Config file path (default: ~/.fan_remote/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and print the current reading
    Read,
    /// Send a fan speed between 0.0 and 1.0
    SetSpeed {
        /// Normalized fan speed
        speed: f32,
    },
    /// Run the monitor, reading commands from stdin
    Run {
        /// Start in auto mode
        #[arg(long)]
        auto: bool,
    },
    /// Serve a simulated sensor device
    Simulate {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
        /// Initial temperature in Celsius
        #[arg(long, default_value_t = 21.0, allow_negative_numbers = true)]
        temperature: f32,
        /// Initial relative humidity in percent
        #[arg(long, default_value_t = 45.0)]
        humidity: f32,
        /// Probability (0.0-1.0) that a sensor sample fails and reports -1
        #[arg(long, default_value_t = crate::device::FAILED_READ_CHANCE)]
        failed_read_chance: f64,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the effective configuration to the config file
    Init,
    /// Print the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_speed() {
        let args = Args::parse_from(["fan-remote", "-vv", "set-speed", "0.75"]);
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, Commands::SetSpeed { speed } if speed == 0.75));
    }

    #[test]
    fn test_parse_global_device_url_after_subcommand() {
        let args = Args::parse_from(["fan-remote", "run", "--auto", "--device-url", "http://10.0.0.9"]);
        assert_eq!(args.device_url.as_deref(), Some("http://10.0.0.9"));
        assert!(matches!(args.command, Commands::Run { auto: true }));
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let args = Args::parse_from(["fan-remote", "simulate"]);
        match args.command {
            Commands::Simulate {
                bind,
                temperature,
                humidity,
                failed_read_chance,
            } => {
                assert_eq!(bind.port(), 8080);
                assert_eq!(temperature, 21.0);
                assert_eq!(humidity, 45.0);
                assert_eq!(failed_read_chance, crate::device::FAILED_READ_CHANCE);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
