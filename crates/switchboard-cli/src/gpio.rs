//! rppal adapter: owns the physical output pins behind the
//! [`OutputBank`] trait.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use rppal::gpio::{Gpio, OutputPin};
use switchboard_core::config::GpioConfig;
use switchboard_core::error::LineError;
use switchboard_core::executor::{Level, OutputBank};
use tracing::debug;

struct Line {
    pin: OutputPin,
    active_low: bool,
}

/// Returns true when the line should be driven electrically high for the
/// requested logical level.
fn electrical_high(level: Level, active_low: bool) -> bool {
    match level {
        Level::Active => !active_low,
        Level::Inactive => active_low,
    }
}

/// GPIO-backed output bank. Every configured pin is claimed up front and
/// driven to its inactive level; pins revert to inputs when the bank is
/// dropped, after [`RppalBank::shutdown`] has quieted them.
pub struct RppalBank {
    lines: Mutex<HashMap<String, Line>>,
}

impl RppalBank {
    pub fn new(config: &GpioConfig) -> anyhow::Result<Self> {
        let gpio = Gpio::new().context("failed to open the gpio controller")?;
        let mut lines = HashMap::new();
        for (name, line) in &config.lines {
            let pin = gpio.get(line.pin).with_context(|| {
                format!("failed to claim gpio pin {} for line '{name}'", line.pin)
            })?;
            let pin = if electrical_high(Level::Inactive, line.active_low) {
                pin.into_output_high()
            } else {
                pin.into_output_low()
            };
            debug!(line = %name, pin = line.pin, "claimed output line");
            lines.insert(
                name.clone(),
                Line {
                    pin,
                    active_low: line.active_low,
                },
            );
        }
        Ok(Self {
            lines: Mutex::new(lines),
        })
    }

    /// Drive every line to its inactive level.
    pub fn shutdown(&self) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        for (name, line) in lines.iter_mut() {
            apply(line, Level::Inactive);
            debug!(line = %name, "released output line");
        }
    }
}

fn apply(line: &mut Line, level: Level) {
    if electrical_high(level, line.active_low) {
        line.pin.set_high();
    } else {
        line.pin.set_low();
    }
}

impl OutputBank for RppalBank {
    fn set(&self, line: &str, level: Level) -> Result<(), LineError> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let entry = lines
            .get_mut(line)
            .ok_or_else(|| LineError::new(line, "line not configured"))?;
        apply(entry, level);
        Ok(())
    }

    fn lines(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = lines.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Drop for RppalBank {
    fn drop(&mut self) {
        // The hardware must be quiet even on a panic unwind.
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
