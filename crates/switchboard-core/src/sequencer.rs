use tracing::{info, warn};

use crate::action::{ActionSequence, AggregationPolicy};
use crate::executor::StepExecutor;
use crate::step::Step;

/// Run a sequence's steps in order and fold their outcomes into one
/// verdict.
///
/// An outcome "counts" toward the verdict unless the step was skipped
/// (disabled subsystem) or is marked best-effort; non-counting outcomes
/// contribute true. Under `FirstFailure` the first counted failure ends
/// the sequence and later steps are never attempted; under `AllSteps`
/// every step is attempted exactly once and the verdict is the AND of
/// the counted outcomes.
pub async fn run_sequence(executor: &StepExecutor, sequence: &ActionSequence) -> bool {
    let mut all_ok = true;

    for step in &sequence.steps {
        let label = step.label();
        let result = executor.execute(step).await;

        if result.skipped {
            info!(
                action = %sequence.name,
                step = %label,
                detail = %result.detail,
                "step skipped"
            );
            continue;
        }

        if result.ok {
            info!(
                action = %sequence.name,
                step = %label,
                duration_ms = result.duration_ms,
                "step ok"
            );
            continue;
        }

        if is_best_effort(step) {
            warn!(
                action = %sequence.name,
                step = %label,
                duration_ms = result.duration_ms,
                detail = %result.detail,
                "best-effort step failed, continuing"
            );
            continue;
        }

        warn!(
            action = %sequence.name,
            step = %label,
            duration_ms = result.duration_ms,
            detail = %result.detail,
            "step failed"
        );
        all_ok = false;

        if sequence.policy == AggregationPolicy::FirstFailure {
            warn!(action = %sequence.name, "aborting after failed step");
            return false;
        }
    }

    if all_ok {
        info!(action = %sequence.name, "action completed");
    } else {
        warn!(action = %sequence.name, "action completed with failures");
    }
    all_ok
}

fn is_best_effort(step: &Step) -> bool {
    matches!(step, Step::Command(c) if c.best_effort)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
