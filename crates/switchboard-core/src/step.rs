use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One side effect inside an action sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Run an external command and judge it by exit code.
    Command(CommandStep),
    /// Hold a digital output line active, then release it.
    Pulse(PulseStep),
}

impl Step {
    /// Human-readable label for logs. Uses the configured name when
    /// present, otherwise derives one from the step's target.
    pub fn label(&self) -> String {
        match self {
            Step::Command(c) => c
                .name
                .clone()
                .unwrap_or_else(|| c.program.clone()),
            Step::Pulse(p) => p
                .name
                .clone()
                .unwrap_or_else(|| format!("pulse {}", p.line)),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Hard wall-clock limit. A step that outlives it is killed and
    /// counted as failed.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub expected_exit: i32,
    /// A best-effort step is always attempted but its failure counts as
    /// success for sequence aggregation (logged at warn level).
    #[serde(default)]
    pub best_effort: bool,
}

fn default_timeout_secs() -> u64 {
    10
}

impl CommandStep {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: None,
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: default_timeout_secs(),
            expected_exit: 0,
            best_effort: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PulseStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of a line declared in the gpio section.
    pub line: String,
    /// How long the line stays active. The optocoupler input needs a real
    /// hold window, so the executing task sleeps for this duration.
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    /// When the output bank is disabled: a required pulse fails, a
    /// non-required one is skipped and counted as vacuously true.
    #[serde(default)]
    pub required: bool,
}

fn default_hold_ms() -> u64 {
    100
}

impl PulseStep {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            name: None,
            line: line.into(),
            hold_ms: default_hold_ms(),
            required: false,
        }
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Outcome of executing one step. `skipped` implies `ok`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub ok: bool,
    pub skipped: bool,
    pub detail: String,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn pass(detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            ok: true,
            skipped: false,
            detail: detail.into(),
            duration_ms,
        }
    }

    pub fn fail(detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            ok: false,
            skipped: false,
            detail: detail.into(),
            duration_ms,
        }
    }

    pub fn skip(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            skipped: true,
            detail: detail.into(),
            duration_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
