pub mod action;
pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod executor;
pub mod sequencer;
pub mod step;

pub use error::{Result, SwitchboardError};
