//! Temperature to fan speed lookup

use crate::reading::FanSetpoint;

/// A half-open temperature bracket `[min, max)` mapped to a fixed speed.
/// `max == None` means the bracket is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedBracket {
    pub min: f32,
    pub max: Option<f32>,
    pub speed: FanSetpoint,
}

impl SpeedBracket {
    pub fn contains(&self, temperature: f32) -> bool {
        temperature >= self.min && self.max.map_or(true, |max| temperature < max)
    }
}

/// Ordered list of brackets, first match wins.
///
/// Temperatures that fall between brackets have no speed at all; callers keep
/// whatever speed they already had.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTable {
    brackets: Vec<SpeedBracket>,
}

impl SpeedTable {
    pub fn new() -> Self {
        Self {
            brackets: Vec::new(),
        }
    }

    pub fn brackets(&self) -> &[SpeedBracket] {
        &self.brackets
    }

    pub fn add_bracket(&mut self, min: f32, max: Option<f32>, speed: FanSetpoint) {
        self.brackets.push(SpeedBracket { min, max, speed });
    }

    /// Speed for `temperature`, or `None` when no bracket covers it
    pub fn lookup(&self, temperature: f32) -> Option<FanSetpoint> {
        self.brackets
            .iter()
            .find(|b| b.contains(temperature))
            .map(|b| b.speed)
    }

    /// The room-fan table the device ships with.
    ///
    /// 10-19°C, 22-23°C and anything below 0°C are deliberately left
    /// uncovered. The owner has not decided what the fan should do there.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.add_bracket(0.0, Some(10.0), FanSetpoint::OFF);
        table.add_bracket(19.0, Some(20.0), FanSetpoint(0.25));
        table.add_bracket(20.0, Some(21.0), FanSetpoint(0.5));
        table.add_bracket(21.0, Some(22.0), FanSetpoint(0.75));
        table.add_bracket(23.0, None, FanSetpoint::FULL);
        table
    }
}

impl Default for SpeedTable {
    fn default() -> Self {
        Self::standard()
    }
}
