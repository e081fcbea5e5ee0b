use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearnError {
    #[error("No template registered for task type: {0}")]
    UnknownTaskType(String),
    #[error("No strategy registered for category: {0}")]
    UnknownCategory(String),
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
    #[error("Snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("State I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl LearnError {
    /// Missing catalog or registry entry, as opposed to I/O or snapshot trouble.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownTaskType(_)
                | Self::UnknownCategory(_)
                | Self::UnknownTemplate(_)
                | Self::UnknownStrategy(_)
                | Self::UnknownAgent(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LearnError>;
