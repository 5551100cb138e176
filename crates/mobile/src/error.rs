#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum TrackerError {
    #[error("Failed to start runtime: {reason}")]
    Runtime { reason: String },
    #[error("Failed to build HTTP client: {reason}")]
    Http { reason: String },
    #[error("Location unavailable: {reason}")]
    Location { reason: String },
    #[error("Route storage failed: {reason}")]
    Storage { reason: String },
    #[error("Callback failed: {reason}")]
    Callback { reason: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for TrackerError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Callback { reason: e.reason }
    }
}
