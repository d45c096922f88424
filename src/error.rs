use thiserror::Error;

/// Failures the expansion engine can run into
#[derive(Debug, Error)]
pub enum EngineError {
    /// The platform refused the keyboard hook (missing permission, no devices)
    #[error("failed to subscribe to key events: {0}")]
    Subscription(String),

    /// Sending synthetic input failed
    #[error("failed to send synthetic input: {0}")]
    Output(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    /// The snippet store could not produce its snippet list
    #[error("snippet store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
