use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::{ActionMap, ActionSequence, AggregationPolicy, Binding};
use crate::debounce::BatchSettings;
use crate::error::{Result, SwitchboardError};
use crate::step::Step;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
    warnings.iter().any(|w| w.level == WarnLevel::Error)
}

// ---------------------------------------------------------------------------
// DeviceConfig
// ---------------------------------------------------------------------------

/// Which input device to read. `path` wins over `name`; with neither set
/// the daemon falls back to the first key-capable device it finds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// EncoderConfig
// ---------------------------------------------------------------------------

/// Rotary encoder bindings. Key-pair encoders set `up`/`down`; encoders
/// on a relative axis set `rel`. All clicks feed `family`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<u16>,
    pub family: String,
}

impl EncoderConfig {
    pub fn codes(&self) -> Vec<u16> {
        [self.up, self.down, self.rel].into_iter().flatten().collect()
    }
}

// ---------------------------------------------------------------------------
// ActionConfig / BatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default)]
    pub policy: AggregationPolicy,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub topic: String,
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,
    #[serde(default = "default_unit")]
    pub unit: i64,
}

fn default_quiet_ms() -> u64 {
    300
}

fn default_unit() -> i64 {
    1
}

impl BatchConfig {
    pub fn settings(&self) -> BatchSettings {
        BatchSettings {
            topic: self.topic.clone(),
            quiet: Duration::from_millis(self.quiet_ms),
            unit: self.unit,
        }
    }
}

// ---------------------------------------------------------------------------
// GpioConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// BCM pin number.
    pub pin: u8,
    #[serde(default)]
    pub active_low: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_gpio_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub lines: HashMap<String, LineConfig>,
}

fn default_gpio_enabled() -> bool {
    true
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            enabled: default_gpio_enabled(),
            lines: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// MqttConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "switchboard".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// ProbeConfig
// ---------------------------------------------------------------------------

/// Optional startup read-back: run a command once, scan its stdout for
/// the first matching substring, and log the label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub matches: Vec<ProbeMatch>,
}

fn default_probe_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeMatch {
    pub contains: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub device: DeviceConfig,
    /// Key code → action name.
    #[serde(default)]
    pub buttons: HashMap<u16, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<EncoderConfig>,
    #[serde(default)]
    pub actions: HashMap<String, ActionConfig>,
    /// Batch family → flush settings.
    #[serde(default)]
    pub batches: HashMap<String, BatchConfig>,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeConfig>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SwitchboardError::ConfigNotFound(
                path.display().to_string(),
            ));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Build the immutable event-code lookup. Fails on dangling action
    /// references or doubly-bound codes.
    pub fn action_map(&self) -> Result<ActionMap> {
        let mut map = ActionMap::new();

        for (code, action_name) in &self.buttons {
            let action = self
                .actions
                .get(action_name)
                .ok_or_else(|| SwitchboardError::UnknownAction(action_name.clone()))?;
            let sequence =
                ActionSequence::new(action_name.clone(), action.policy, action.steps.clone());
            map.bind(*code, Binding::Run(sequence))?;
        }

        if let Some(encoder) = &self.encoder {
            for code in encoder.codes() {
                map.bind(
                    code,
                    Binding::Adjust {
                        family: encoder.family.clone(),
                    },
                )?;
            }
        }

        Ok(map)
    }

    pub fn batch_settings(&self) -> HashMap<String, BatchSettings> {
        self.batches
            .iter()
            .map(|(family, b)| (family.clone(), b.settings()))
            .collect()
    }

    /// Every distinct external program the config can invoke, for the
    /// `check` command's PATH verification.
    pub fn programs(&self) -> Vec<String> {
        let mut programs: Vec<String> = Vec::new();
        for action in self.actions.values() {
            for step in &action.steps {
                if let Step::Command(c) = step {
                    programs.push(c.program.clone());
                }
            }
        }
        if let Some(probe) = &self.probe {
            programs.push(probe.program.clone());
        }
        programs.sort();
        programs.dedup();
        programs
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. Button bindings must reference defined actions
        for (code, action_name) in &self.buttons {
            if !self.actions.contains_key(action_name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "button {code} references undefined action '{action_name}'"
                    ),
                });
            }
        }

        // 2. Encoder: needs at least one event code, distinct codes, and a
        //    defined batch family; encoder codes must not collide with buttons
        if let Some(encoder) = &self.encoder {
            let codes = encoder.codes();
            if codes.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "encoder has no event codes (set up, down, or rel)".to_string(),
                });
            }
            let mut seen = HashSet::new();
            for code in &codes {
                if !seen.insert(*code) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("encoder binds code {code} more than once"),
                    });
                }
                if self.buttons.contains_key(code) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("code {code} is bound as both a button and the encoder"),
                    });
                }
            }
            if !self.batches.contains_key(&encoder.family) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "encoder references undefined batch family '{}'",
                        encoder.family
                    ),
                });
            }
        }

        // 3. Batches publish over MQTT, so they need a broker
        if !self.batches.is_empty() && self.mqtt.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "batches are configured but the mqtt section is missing".to_string(),
            });
        }
        if self.batches.is_empty() && self.mqtt.is_some() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "mqtt is configured but no batches use it".to_string(),
            });
        }

        // 4. Steps: pulses must reference declared lines, commands need a program
        let mut any_pulse = false;
        for (action_name, action) in &self.actions {
            if action.steps.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("action '{action_name}' has no steps"),
                });
            }
            for step in &action.steps {
                match step {
                    Step::Pulse(p) => {
                        any_pulse = true;
                        if !self.gpio.lines.contains_key(&p.line) {
                            warnings.push(ConfigWarning {
                                level: WarnLevel::Error,
                                message: format!(
                                    "action '{action_name}' pulses undeclared line '{}'",
                                    p.line
                                ),
                            });
                        }
                    }
                    Step::Command(c) => {
                        if c.program.trim().is_empty() {
                            warnings.push(ConfigWarning {
                                level: WarnLevel::Error,
                                message: format!(
                                    "action '{action_name}' has a command step with an empty program"
                                ),
                            });
                        }
                    }
                }
            }
        }

        if any_pulse && !self.gpio.enabled {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "pulse steps are configured but gpio is disabled; \
                          non-required pulses will be skipped"
                    .to_string(),
            });
        }

        // 5. Unreferenced definitions
        let bound_actions: HashSet<&String> = self.buttons.values().collect();
        for action_name in self.actions.keys() {
            if !bound_actions.contains(action_name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("action '{action_name}' is not bound to any button"),
                });
            }
        }
        let encoder_family = self.encoder.as_ref().map(|e| e.family.as_str());
        for family in self.batches.keys() {
            if encoder_family != Some(family.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("batch family '{family}' is not fed by any encoder"),
                });
            }
        }

        // 6. A zero quiet period publishes on every click
        for (family, batch) in &self.batches {
            if batch.quiet_ms == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "batch family '{family}' has quiet_ms=0; every click publishes immediately"
                    ),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
