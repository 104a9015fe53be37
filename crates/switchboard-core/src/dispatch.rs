//! Routes input events to their configured effect.
//!
//! ```text
//!   device ──pump──▶ mpsc ──consume──▶ Dispatcher
//!                                        ├─ Run(sequence)   → sequencer (blocks the loop)
//!                                        ├─ Adjust(family)  → debouncer (returns at once)
//!                                        └─ unbound         → ignored
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::action::{ActionMap, Binding};
use crate::debounce::Debouncer;
use crate::event::{EventKind, InputEvent};
use crate::executor::StepExecutor;
use crate::sequencer::run_sequence;

/// What became of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A sequence ran to its verdict.
    Completed(bool),
    /// The adjustment was handed to the debouncer.
    Batched,
    /// Unbound or malformed; nothing external was touched.
    Ignored,
}

pub struct Dispatcher {
    map: ActionMap,
    executor: StepExecutor,
    debouncer: Debouncer,
}

impl Dispatcher {
    pub fn new(map: ActionMap, executor: StepExecutor, debouncer: Debouncer) -> Self {
        Self {
            map,
            executor,
            debouncer,
        }
    }

    pub fn map(&self) -> &ActionMap {
        &self.map
    }

    pub async fn dispatch(&self, event: InputEvent) -> DispatchOutcome {
        let Some(binding) = self.map.resolve(event.code) else {
            debug!(code = event.code, "ignoring unbound event");
            return DispatchOutcome::Ignored;
        };

        match binding {
            Binding::Run(sequence) => {
                info!(code = event.code, action = %sequence.name, "dispatching action");
                let ok = run_sequence(&self.executor, sequence).await;
                DispatchOutcome::Completed(ok)
            }
            Binding::Adjust { family } => match event.kind {
                EventKind::Incremental { direction } => {
                    self.debouncer.record(family, i64::from(direction));
                    DispatchOutcome::Batched
                }
                EventKind::Discrete => {
                    warn!(
                        code = event.code,
                        family = %family,
                        "event without direction bound to batch family, ignoring"
                    );
                    DispatchOutcome::Ignored
                }
            },
        }
    }
}

/// The single-consumer dispatch loop. Events arrive in source order; a
/// discrete action blocks the loop until its sequence finishes, while
/// batch flushes run on their own timers. Returns once the channel
/// closes, which happens exactly when the pump ends.
pub async fn consume(mut rx: mpsc::Receiver<InputEvent>, dispatcher: &Dispatcher) {
    while let Some(event) = rx.recv().await {
        dispatcher.dispatch(event).await;
    }
    debug!("event channel closed, dispatch loop ending");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionSequence, AggregationPolicy};
    use crate::debounce::{BatchSettings, PublishSink};
    use crate::step::{CommandStep, Step};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingSink {
        published: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }

        fn published(&self) -> Vec<(String, String)> {
            self.published.lock().unwrap().clone()
        }
    }

    impl PublishSink for RecordingSink {
        fn publish(&self, topic: &str, payload: &str) {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
        }
    }

    fn append_sequence(name: &str, path: &Path, token: &str) -> ActionSequence {
        ActionSequence::new(
            name,
            AggregationPolicy::AllSteps,
            vec![Step::Command(CommandStep::new(
                "sh",
                &["-c", &format!("echo {token} >> {}", path.display())],
            ))],
        )
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn dispatcher_with(
        map: ActionMap,
        settings: HashMap<String, BatchSettings>,
        sink: Arc<RecordingSink>,
    ) -> Dispatcher {
        Dispatcher::new(
            map,
            StepExecutor::without_bank(),
            Debouncer::new(settings, sink),
        )
    }

    #[tokio::test]
    async fn unbound_event_is_ignored_without_side_effects() {
        let sink = RecordingSink::new();
        let dispatcher = dispatcher_with(ActionMap::new(), HashMap::new(), sink.clone());

        let outcome = dispatcher.dispatch(InputEvent::discrete(42)).await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(sink.published().is_empty());
    }

    #[tokio::test]
    async fn discrete_event_runs_its_sequence() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let mut map = ActionMap::new();
        map.bind(193, Binding::Run(append_sequence("switch-to-a", &marker, "a")))
            .unwrap();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher_with(map, HashMap::new(), sink);

        let outcome = dispatcher.dispatch(InputEvent::discrete(193)).await;
        assert_eq!(outcome, DispatchOutcome::Completed(true));
        assert_eq!(lines(&marker), vec!["a"]);
    }

    #[tokio::test]
    async fn failed_sequence_reports_false() {
        let mut map = ActionMap::new();
        map.bind(
            192,
            Binding::Run(ActionSequence::new(
                "standby",
                AggregationPolicy::FirstFailure,
                vec![Step::Command(CommandStep::new("false", &[]))],
            )),
        )
        .unwrap();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher_with(map, HashMap::new(), sink);

        let outcome = dispatcher.dispatch(InputEvent::discrete(192)).await;
        assert_eq!(outcome, DispatchOutcome::Completed(false));
    }

    #[tokio::test]
    async fn incremental_event_is_batched_and_flushed() {
        let mut map = ActionMap::new();
        map.bind(
            225,
            Binding::Adjust {
                family: "brightness".to_string(),
            },
        )
        .unwrap();
        let mut settings = HashMap::new();
        settings.insert(
            "brightness".to_string(),
            BatchSettings {
                topic: "desk/brightness".to_string(),
                quiet: Duration::from_millis(60),
                unit: 5,
            },
        );
        let sink = RecordingSink::new();
        let dispatcher = dispatcher_with(map, settings, sink.clone());

        let outcome = dispatcher.dispatch(InputEvent::incremental(225, 1)).await;
        assert_eq!(outcome, DispatchOutcome::Batched);
        assert!(sink.published().is_empty(), "publish must wait for the quiet period");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(
            sink.published(),
            vec![("desk/brightness".to_string(), "5".to_string())]
        );
    }

    #[tokio::test]
    async fn directionless_event_on_batch_binding_is_ignored() {
        let mut map = ActionMap::new();
        map.bind(
            225,
            Binding::Adjust {
                family: "brightness".to_string(),
            },
        )
        .unwrap();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher_with(map, HashMap::new(), sink.clone());

        let outcome = dispatcher.dispatch(InputEvent::discrete(225)).await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.published().is_empty());
    }

    #[tokio::test]
    async fn consume_handles_events_in_order_until_close() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let mut map = ActionMap::new();
        map.bind(193, Binding::Run(append_sequence("switch-to-a", &marker, "a")))
            .unwrap();
        map.bind(194, Binding::Run(append_sequence("switch-to-b", &marker, "b")))
            .unwrap();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher_with(map, HashMap::new(), sink);

        let (tx, rx) = mpsc::channel(16);
        for code in [193, 194, 193] {
            tx.send(InputEvent::discrete(code)).await.unwrap();
        }
        drop(tx);

        consume(rx, &dispatcher).await;
        assert_eq!(lines(&marker), vec!["a", "b", "a"]);
    }
}
