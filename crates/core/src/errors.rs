use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("affiliate gateway timed out")]
    Timeout,
    #[error("could not connect to affiliate gateway: {0}")]
    ConnectionFailed(String),
    #[error("unexpected affiliate gateway failure: {0}")]
    Unexpected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteFailure {
    #[error("affiliate gateway rejected the request: {message}")]
    Rejected { code: Option<String>, message: String },
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl RemoteFailure {
    pub fn rejected(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Rejected { code, message: message.into() }
    }

    /// Transient failures may succeed on a later, separate resolution.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("input is not a supported marketplace link")]
    InvalidUrl,
    #[error("no product id could be recovered and the affiliate gateway failed: {cause}")]
    Unresolvable { cause: RemoteFailure },
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

impl ResolutionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidUrl => {
                "This is not a supported marketplace link. Send a product link from the marketplace."
            }
            Self::Unresolvable { .. } => {
                "The purchase link could not be created. Open the link in a browser and send the full expanded product link."
            }
            Self::Remote(RemoteFailure::Rejected { .. }) => {
                "The affiliate service rejected the request. Check the API credentials."
            }
            Self::Remote(RemoteFailure::Network(_)) => {
                "The affiliate service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::Unresolvable { .. } => "unresolvable",
            Self::Remote(RemoteFailure::Rejected { .. }) => "remote_rejected",
            Self::Remote(RemoteFailure::Network(NetworkError::Timeout)) => "network_timeout",
            Self::Remote(RemoteFailure::Network(NetworkError::ConnectionFailed(_))) => {
                "network_connection_failed"
            }
            Self::Remote(RemoteFailure::Network(NetworkError::Unexpected(_))) => {
                "network_unexpected"
            }
        }
    }
}
