use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::LineError;
use crate::step::{CommandStep, PulseStep, Step, StepResult};

// ---------------------------------------------------------------------------
// Output bank
// ---------------------------------------------------------------------------

/// Logical level of a digital output line. Polarity (active-high vs
/// active-low) is the bank's concern; callers only speak in these terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Active,
    Inactive,
}

/// A bank of named digital output lines. Writes are synchronous and
/// idempotent; writing the level a line already holds is a no-op.
pub trait OutputBank: Send + Sync {
    fn set(&self, line: &str, level: Level) -> Result<(), LineError>;

    /// Names of the configured lines, for startup logging and smoke tests.
    fn lines(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// StepExecutor
// ---------------------------------------------------------------------------

/// Executes single steps. Holds the (optional) output bank; when no bank
/// is available pulse steps are skipped or failed according to their
/// `required` flag.
#[derive(Clone)]
pub struct StepExecutor {
    bank: Option<Arc<dyn OutputBank>>,
}

impl StepExecutor {
    pub fn new(bank: Option<Arc<dyn OutputBank>>) -> Self {
        Self { bank }
    }

    pub fn without_bank() -> Self {
        Self { bank: None }
    }

    pub async fn execute(&self, step: &Step) -> StepResult {
        match step {
            Step::Command(c) => {
                let start = Instant::now();
                let outcome = run_command(c).await;
                let duration_ms = start.elapsed().as_millis() as u64;
                if outcome.ok {
                    StepResult::pass(outcome.detail, duration_ms)
                } else {
                    StepResult::fail(outcome.detail, duration_ms)
                }
            }
            Step::Pulse(p) => self.pulse(p).await,
        }
    }

    async fn pulse(&self, step: &PulseStep) -> StepResult {
        let Some(bank) = &self.bank else {
            return if step.required {
                StepResult::fail("output bank disabled", 0)
            } else {
                StepResult::skip("output bank disabled")
            };
        };

        let start = Instant::now();
        let raised = bank.set(&step.line, Level::Active);
        if raised.is_ok() {
            tokio::time::sleep(Duration::from_millis(step.hold_ms)).await;
        }
        // The line must never be left asserted, so the release is
        // attempted even when the activating write failed.
        let released = bank.set(&step.line, Level::Inactive);
        let duration_ms = start.elapsed().as_millis() as u64;

        match (raised, released) {
            (Ok(()), Ok(())) => StepResult::pass(
                format!("held {} active for {}ms", step.line, step.hold_ms),
                duration_ms,
            ),
            (Err(e), _) => StepResult::fail(format!("activate failed: {e}"), duration_ms),
            (_, Err(e)) => StepResult::fail(format!("release failed: {e}"), duration_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Outcome of one external command. `stdout` is preserved for callers
/// that parse it (the startup probe); `detail` is log-ready.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub ok: bool,
    pub detail: String,
    pub stdout: String,
}

impl CommandOutcome {
    fn failed(detail: String) -> Self {
        Self {
            ok: false,
            detail,
            stdout: String::new(),
        }
    }
}

/// Run an external command with captured output and a hard wall-clock
/// timeout. On timeout the child is killed (`kill_on_drop`) and the
/// outcome reads "timed out after Ns". `timeout_secs == 0` waits
/// indefinitely.
pub async fn run_command(step: &CommandStep) -> CommandOutcome {
    if step.program.trim().is_empty() {
        return CommandOutcome::failed("command program is empty".to_string());
    }

    let mut cmd = Command::new(&step.program);
    cmd.args(&step.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return CommandOutcome::failed(format!("failed to spawn {}: {e}", step.program));
        }
    };

    let wait = child.wait_with_output();
    let output = if step.timeout_secs == 0 {
        wait.await
    } else {
        match timeout(Duration::from_secs(step.timeout_secs), wait).await {
            Ok(result) => result,
            Err(_) => {
                // Dropping the wait future drops the child, which kills it.
                return CommandOutcome::failed(format!(
                    "timed out after {}s",
                    step.timeout_secs
                ));
            }
        }
    };

    let output = match output {
        Ok(o) => o,
        Err(e) => return CommandOutcome::failed(format!("wait failed: {e}")),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code();
    let ok = code == Some(step.expected_exit);

    let detail = if ok {
        format!("exit {}", step.expected_exit)
    } else {
        match code {
            Some(c) => format!(
                "exit {c} (expected {}){}",
                step.expected_exit,
                stderr_suffix(&stderr)
            ),
            None => format!("killed by signal{}", stderr_suffix(&stderr)),
        }
    };

    CommandOutcome { ok, detail, stdout }
}

/// Format a failure suffix from stderr, capped to the last 2KB.
fn stderr_suffix(stderr: &str) -> String {
    const MAX_STDERR: usize = 2 * 1024;
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut start = trimmed.len().saturating_sub(MAX_STDERR);
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!(": {}", &trimmed[start..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
