use crate::errors::ResolutionError;

/// Result of one resolution. Failures are values, never panics or `Err`s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Affiliate link generated (or served from cache) by the gateway.
    Success(String),
    /// Plain purchase link built locally; commission attribution is not guaranteed.
    FallbackSuccess(String),
    Failure(ResolutionError),
}

impl Outcome {
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Success(link) | Self::FallbackSuccess(link) => Some(link),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResolutionError> {
        match self {
            Self::Failure(error) => Some(error),
            _ => None,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::FallbackSuccess(_) => OutcomeKind::Fallback,
            Self::Failure(_) => OutcomeKind::Failure,
        }
    }
}

impl From<ResolutionError> for Outcome {
    fn from(value: ResolutionError) -> Self {
        Self::Failure(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Fallback,
    Failure,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fallback => "fallback",
            Self::Failure => "failure",
        }
    }
}
