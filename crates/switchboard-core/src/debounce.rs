//! Coalesces bursts of incremental events into one delayed publish.
//!
//! Each batch family owns a signed accumulator and a quiet-period timer.
//! Recording an adjustment adds to the accumulator and restarts the
//! timer; when a full quiet period passes with no new adjustment, the
//! accumulated sum is scaled by the family's unit and published once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// PublishSink
// ---------------------------------------------------------------------------

/// Fire-and-forget message publisher. No acknowledgment is awaited and
/// the call must not block on network progress.
pub trait PublishSink: Send + Sync {
    fn publish(&self, topic: &str, payload: &str);
}

// ---------------------------------------------------------------------------
// Batcher
// ---------------------------------------------------------------------------

/// Settings for one batch family.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub topic: String,
    /// How long the family must stay quiet before the sum is flushed.
    pub quiet: Duration,
    /// Multiplier applied to the accumulated click count at flush time.
    pub unit: i64,
}

impl BatchSettings {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            quiet: Duration::from_millis(300),
            unit: 1,
        }
    }
}

struct BatchState {
    accumulated: i64,
    /// Bumped on every record. A flush task captures the epoch it was
    /// armed with and gives up if the state has moved on, so a timer
    /// whose abort races its firing can never flush a superseded window.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

/// One family's accumulator and timer. Cheap to clone; all clones share
/// state. `record` must be called from within a tokio runtime.
#[derive(Clone)]
pub struct Batcher {
    inner: Arc<BatcherInner>,
}

struct BatcherInner {
    family: String,
    settings: BatchSettings,
    sink: Arc<dyn PublishSink>,
    state: Mutex<BatchState>,
}

impl Batcher {
    pub fn new(
        family: impl Into<String>,
        settings: BatchSettings,
        sink: Arc<dyn PublishSink>,
    ) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                family: family.into(),
                settings,
                sink,
                state: Mutex::new(BatchState {
                    accumulated: 0,
                    epoch: 0,
                    timer: None,
                }),
            }),
        }
    }

    /// Add a signed adjustment and restart the quiet timer from zero.
    pub fn record(&self, delta: i64) {
        let inner = self.inner.clone();
        let mut state = self.inner.lock_state();

        state.accumulated += delta;
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let epoch = state.epoch;
        let quiet = self.inner.settings.quiet;
        debug!(
            family = %self.inner.family,
            delta,
            accumulated = state.accumulated,
            "recorded adjustment"
        );
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            inner.flush(epoch);
        }));
    }
}

impl BatcherInner {
    /// A poisoned mutex only means a flush task panicked mid-update; the
    /// accumulator itself is still coherent, so keep going.
    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, armed_epoch: u64) {
        // Capture and reset under the guard; publish only after it drops.
        let total = {
            let mut state = self.lock_state();
            if state.epoch != armed_epoch {
                return;
            }
            state.timer = None;
            std::mem::take(&mut state.accumulated)
        };

        if total == 0 {
            debug!(family = %self.family, "batch cancelled out to zero, nothing to publish");
            return;
        }

        let payload = (total * self.settings.unit).to_string();
        info!(
            family = %self.family,
            clicks = total,
            payload = %payload,
            topic = %self.settings.topic,
            "publishing batched adjustment"
        );
        self.sink.publish(&self.settings.topic, &payload);
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Routes adjustments to their family's [`Batcher`]. Families are fixed
/// at construction; an unknown family drops the adjustment with a
/// warning.
pub struct Debouncer {
    families: HashMap<String, Batcher>,
}

impl Debouncer {
    pub fn new(settings: HashMap<String, BatchSettings>, sink: Arc<dyn PublishSink>) -> Self {
        let families = settings
            .into_iter()
            .map(|(family, s)| {
                let batcher = Batcher::new(family.clone(), s, sink.clone());
                (family, batcher)
            })
            .collect();
        Self { families }
    }

    pub fn record(&self, family: &str, delta: i64) {
        match self.families.get(family) {
            Some(batcher) => batcher.record(delta),
            None => warn!(family, delta, "adjustment for unknown batch family dropped"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.families.keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
