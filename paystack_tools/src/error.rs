use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PaystackApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The gateway rejected the request parameters. {0}")]
    InvalidRequest(String),
    #[error("The gateway rejected our credentials.")]
    Unauthorized,
    #[error("The gateway refused the request. {0}")]
    Forbidden(String),
    #[error("No transaction matches the given reference or id.")]
    NotFound,
    #[error("The gateway could not be reached, or did not answer in time. {0}")]
    Unavailable(String),
    #[error("Could not deserialize the gateway response: {0}")]
    JsonError(String),
    #[error("The gateway reported a failure. {0}")]
    QueryError(String),
}

impl PaystackApiError {
    /// Maps a non-success HTTP status onto the error taxonomy. The body text is carried where it helps diagnosis.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest(message),
            401 => Self::Unauthorized,
            403 => Self::Forbidden(message),
            404 => Self::NotFound,
            s if s >= 500 => Self::Unavailable(format!("Gateway returned {s}. {message}")),
            s => Self::QueryError(format!("Unexpected status {s}. {message}")),
        }
    }
}
