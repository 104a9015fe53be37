use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwitchboardError {
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("event code {code} is bound more than once")]
    DuplicateBinding { code: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, SwitchboardError>;

/// Failure writing a digital output line. Carried by [`crate::executor::OutputBank`]
/// implementations so step results can name the line that misbehaved.
#[derive(Debug, Error)]
#[error("output line '{line}': {message}")]
pub struct LineError {
    pub line: String,
    pub message: String,
}

impl LineError {
    pub fn new(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            message: message.into(),
        }
    }
}
