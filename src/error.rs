// --------------------------------------------------
// Error types for the task widget.
// -------------------------------------------------

// Why a task form was rejected.
//
// The `Display` text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a task.")]
    EmptyContent,

    #[error("Please select a valid priority, got {0}.")]
    InvalidPriority(u8),

    #[error("Please enter a valid due date, got {0:?}.")]
    InvalidDueDate(String),

    #[error("Please enter a valid due time, got {0:?}.")]
    InvalidDueTime(String),

    #[error("Please select a future date and time.")]
    DueNotInFuture,

    // A reminder was requested for a task without any deadline.
    #[error("Please select a time first.")]
    NotificationWithoutDue,

    #[error("Please select a valid notification time.")]
    NotificationInPast,
}

// Persistence backend failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

// Configuration file failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct UnknownStatus(pub String);
