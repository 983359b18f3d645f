use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Write verification failed: {0}")]
    WriteVerificationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Challenge timed out: {0}")]
    ChallengeTimedOut(String),

    #[error("Session cancelled: {0}")]
    SessionCancelled(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Process store error: {0}")]
    StoreError(String),
}

impl AutomationError {
    /// Cancellation is reported by drivers when the underlying session or
    /// window is torn down externally. It is handled differently from every
    /// other error (benign during the challenge hold), so callers need a
    /// cheap way to test for it.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AutomationError::SessionCancelled(_))
    }
}
