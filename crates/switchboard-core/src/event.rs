use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Input events
// ---------------------------------------------------------------------------

/// A single hardware input event as delivered by an [`EventSource`].
///
/// `code` is the raw key code from the device. Events carry no payload
/// beyond their kind and are consumed exactly once, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub code: u16,
    pub kind: EventKind,
}

/// How an event participates in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// One-shot trigger (button press). Resolves to an action sequence.
    Discrete,
    /// One click of a relative control (rotary encoder). The direction is
    /// a signed unit, +1 or -1.
    Incremental { direction: i8 },
}

impl InputEvent {
    pub fn discrete(code: u16) -> Self {
        Self {
            code,
            kind: EventKind::Discrete,
        }
    }

    pub fn incremental(code: u16, direction: i8) -> Self {
        Self {
            code,
            kind: EventKind::Incremental { direction },
        }
    }

    pub fn direction(&self) -> Option<i8> {
        match self.kind {
            EventKind::Discrete => None,
            EventKind::Incremental { direction } => Some(direction),
        }
    }
}

// ---------------------------------------------------------------------------
// Event sources
// ---------------------------------------------------------------------------

/// A blocking producer of input events.
///
/// `next_event` blocks until an event arrives. `Ok(None)` means the device
/// was closed; `Err` is a read failure. Both are terminal: a source is
/// never restarted once it ends.
pub trait EventSource: Send {
    fn next_event(&mut self) -> std::io::Result<Option<InputEvent>>;
}

/// Why [`pump_events`] stopped.
#[derive(Debug)]
pub enum PumpEnd {
    /// The source reported end of stream.
    Closed,
    /// A device read failed.
    Failed(std::io::Error),
    /// The consumer dropped its receiver.
    Disconnected,
}

/// Drain `source` into `tx` until the source ends or the consumer drops.
///
/// Runs on a blocking thread; the dispatch loop receives from the paired
/// channel. Event order is preserved.
pub fn pump_events<S: EventSource>(mut source: S, tx: mpsc::Sender<InputEvent>) -> PumpEnd {
    loop {
        match source.next_event() {
            Ok(Some(event)) => {
                if tx.blocking_send(event).is_err() {
                    return PumpEnd::Disconnected;
                }
            }
            Ok(None) => return PumpEnd::Closed,
            Err(e) => return PumpEnd::Failed(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
