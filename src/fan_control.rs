//! Auto/manual fan speed controller
//!
//! Pure state machine: it never performs I/O. Every operation that decides the
//! device should receive a new setpoint returns it, and the caller is
//! responsible for pushing it.

use crate::errors::ControlError;
use crate::reading::{FanSetpoint, SensorReading};
use crate::speed_table::SpeedTable;
use log::{debug, info};

/// Default minimum temperature change (°C) before the setpoint is recomputed
pub const DEFAULT_DEBOUNCE_THRESHOLD_C: f32 = 0.05;

/// Speed the device boots with
pub const INITIAL_SPEED: FanSetpoint = FanSetpoint(0.5);

/// Controller operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Speed changes only on explicit operator commands
    #[default]
    Manual,
    /// Speed follows the measured temperature
    Auto,
}

/// Fan controller state
#[derive(Debug, Clone)]
pub struct FanController {
    mode: ControlMode,
    table: SpeedTable,
    debounce_threshold_c: f32,
    last_applied_temperature_c: f32,
    current_speed: FanSetpoint,
}

impl FanController {
    /// Create a controller in manual mode
    pub fn new(table: SpeedTable, debounce_threshold_c: f32) -> Self {
        Self {
            mode: ControlMode::Manual,
            table,
            debounce_threshold_c,
            last_applied_temperature_c: 0.0,
            current_speed: INITIAL_SPEED,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_auto(&self) -> bool {
        self.mode == ControlMode::Auto
    }

    pub fn current_speed(&self) -> FanSetpoint {
        self.current_speed
    }

    pub fn last_applied_temperature_c(&self) -> f32 {
        self.last_applied_temperature_c
    }

    /// Switch between manual and auto mode.
    ///
    /// Entering auto mode with a reading at hand evaluates it straight away.
    /// The last applied temperature is kept, so this can be a no-op when the
    /// temperature has not moved past the debounce gate.
    pub fn set_auto_mode(
        &mut self,
        enabled: bool,
        latest: Option<&SensorReading>,
    ) -> Option<FanSetpoint> {
        let target = if enabled {
            ControlMode::Auto
        } else {
            ControlMode::Manual
        };

        if self.mode == target {
            debug!("Controller already in {:?} mode", target);
            return None;
        }

        info!("Controller mode {:?} -> {:?}", self.mode, target);
        self.mode = target;

        match (target, latest) {
            (ControlMode::Auto, Some(reading)) => self.evaluate(reading.temperature_c),
            _ => None,
        }
    }

    /// Feed a fresh reading. Only auto mode reacts to it.
    pub fn on_reading(&mut self, reading: &SensorReading) -> Option<FanSetpoint> {
        if self.is_auto() {
            self.evaluate(reading.temperature_c)
        } else {
            None
        }
    }

    /// Debounce-gated recomputation of the setpoint.
    ///
    /// Returns the setpoint to push when the temperature passed the gate and
    /// falls into a bracket. Even an unchanged speed is returned again.
    pub fn evaluate(&mut self, temperature_c: f32) -> Option<FanSetpoint> {
        if !temperature_c.is_finite() {
            debug!("Ignoring non-finite temperature {}", temperature_c);
            return None;
        }

        if (temperature_c - self.last_applied_temperature_c).abs() < self.debounce_threshold_c {
            debug!(
                "Debounced {:.2}°C (last applied {:.2}°C)",
                temperature_c, self.last_applied_temperature_c
            );
            return None;
        }

        self.last_applied_temperature_c = temperature_c;

        match self.table.lookup(temperature_c) {
            Some(speed) => {
                info!("Auto speed for {:.2}°C: {}", temperature_c, speed);
                self.current_speed = speed;
                Some(speed)
            }
            None => {
                debug!(
                    "No speed bracket covers {:.2}°C, keeping {}",
                    temperature_c, self.current_speed
                );
                None
            }
        }
    }

    /// Set the speed by hand. Rejected while auto mode owns the fan.
    pub fn set_manual_speed(&mut self, speed: f32) -> Result<FanSetpoint, ControlError> {
        if self.is_auto() {
            return Err(ControlError::AutoModeActive);
        }

        let setpoint = FanSetpoint::new(speed)?;
        info!("Manual speed set to {}", setpoint);
        self.current_speed = setpoint;
        Ok(setpoint)
    }
}

impl Default for FanController {
    fn default() -> Self {
        Self::new(SpeedTable::standard(), DEFAULT_DEBOUNCE_THRESHOLD_C)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto_controller() -> FanController {
        let mut controller = FanController::default();
        controller.set_auto_mode(true, None);
        controller
    }

    fn reading(temperature_c: f32) -> SensorReading {
        SensorReading::new(40.0, temperature_c, temperature_c)
    }

    #[test]
    fn test_starts_manual_at_half_speed() {
        let controller = FanController::default();
        assert_eq!(controller.mode(), ControlMode::Manual);
        assert_eq!(controller.current_speed(), INITIAL_SPEED);
        assert_eq!(controller.last_applied_temperature_c(), 0.0);
    }

    #[test]
    fn test_debounce_suppresses_small_changes() {
        let mut controller = auto_controller();

        assert_eq!(controller.evaluate(19.5).map(FanSetpoint::speed), Some(0.25));
        assert_eq!(controller.evaluate(19.52), None);
        assert_eq!(controller.evaluate(19.46), None);
        assert_eq!(controller.last_applied_temperature_c(), 19.5);
    }

    #[test]
    fn test_same_speed_is_pushed_again_after_gate() {
        let mut controller = auto_controller();

        assert_eq!(controller.evaluate(20.1).map(FanSetpoint::speed), Some(0.5));
        assert_eq!(controller.evaluate(20.6).map(FanSetpoint::speed), Some(0.5));
    }

    #[test]
    fn test_bracket_speeds() {
        for (t, expected) in [(5.0, 0.0), (19.5, 0.25), (20.5, 0.5), (21.5, 0.75), (30.0, 1.0)] {
            let mut controller = auto_controller();
            assert_eq!(controller.evaluate(t).map(FanSetpoint::speed), Some(expected));
            assert_eq!(controller.current_speed().speed(), expected);
        }
    }

    #[test]
    fn test_gap_keeps_speed_without_push() {
        let mut controller = auto_controller();
        controller.evaluate(21.5);

        assert_eq!(controller.evaluate(15.0), None);
        assert_eq!(controller.current_speed().speed(), 0.75);
        // The gate still moved
        assert_eq!(controller.last_applied_temperature_c(), 15.0);

        assert_eq!(controller.evaluate(22.5), None);
        assert_eq!(controller.evaluate(-3.0), None);
        assert_eq!(controller.current_speed().speed(), 0.75);
    }

    #[test]
    fn test_near_zero_is_debounced_from_initial_state() {
        // last applied temperature starts at 0.0
        let mut controller = auto_controller();
        assert_eq!(controller.evaluate(0.02), None);
        assert_eq!(controller.current_speed(), INITIAL_SPEED);
    }

    #[test]
    fn test_reading_scenario() {
        let mut controller = auto_controller();

        assert_eq!(controller.on_reading(&reading(19.5)).map(FanSetpoint::speed), Some(0.25));
        assert_eq!(controller.on_reading(&reading(19.52)), None);
        assert_eq!(controller.on_reading(&reading(20.6)).map(FanSetpoint::speed), Some(0.5));
    }

    #[test]
    fn test_heat_index_is_ignored() {
        let mut controller = auto_controller();
        let humid = SensorReading::new(95.0, 19.5, 30.0);
        assert_eq!(controller.on_reading(&humid).map(FanSetpoint::speed), Some(0.25));
    }

    #[test]
    fn test_manual_mode_ignores_readings() {
        let mut controller = FanController::default();
        assert_eq!(controller.on_reading(&reading(30.0)), None);
        assert_eq!(controller.current_speed(), INITIAL_SPEED);
        assert_eq!(controller.last_applied_temperature_c(), 0.0);
    }

    #[test]
    fn test_entering_auto_evaluates_latest_reading() {
        let mut controller = FanController::default();
        let latest = reading(21.2);

        let pushed = controller.set_auto_mode(true, Some(&latest));
        assert_eq!(pushed.map(FanSetpoint::speed), Some(0.75));
        assert!(controller.is_auto());
    }

    #[test]
    fn test_reentering_auto_keeps_debounce_state() {
        let mut controller = auto_controller();
        let latest = reading(21.2);
        controller.on_reading(&latest);

        controller.set_auto_mode(false, Some(&latest));
        controller.set_manual_speed(0.1).unwrap();

        // Temperature did not move, so the gate holds and the manual speed stays
        assert_eq!(controller.set_auto_mode(true, Some(&latest)), None);
        assert_eq!(controller.current_speed().speed(), 0.1);
    }

    #[test]
    fn test_leaving_auto_never_pushes() {
        let mut controller = auto_controller();
        controller.evaluate(21.5);
        assert_eq!(controller.set_auto_mode(false, Some(&reading(30.0))), None);
        assert_eq!(controller.current_speed().speed(), 0.75);
    }

    #[test]
    fn test_manual_speed() {
        let mut controller = FanController::default();

        for x in [0.0, 0.33, 1.0] {
            assert_eq!(controller.set_manual_speed(x).map(FanSetpoint::speed), Ok(x));
            assert_eq!(controller.current_speed().speed(), x);
        }

        assert_eq!(controller.set_manual_speed(1.5), Err(ControlError::InvalidSpeed(1.5)));
        assert_eq!(controller.set_manual_speed(-0.5), Err(ControlError::InvalidSpeed(-0.5)));
        assert_eq!(controller.current_speed().speed(), 1.0);
    }

    #[test]
    fn test_manual_speed_rejected_in_auto() {
        let mut controller = auto_controller();
        assert_eq!(controller.set_manual_speed(0.3), Err(ControlError::AutoModeActive));
        assert_eq!(controller.current_speed(), INITIAL_SPEED);
    }

    #[test]
    fn test_non_finite_temperature_is_ignored() {
        let mut controller = auto_controller();
        controller.evaluate(20.5);
        assert_eq!(controller.evaluate(f32::NAN), None);
        assert_eq!(controller.last_applied_temperature_c(), 20.5);
        assert_eq!(controller.evaluate(20.5), None);
    }
}
