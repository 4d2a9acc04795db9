use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MasterError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl MasterError {
    /// Stable snake_case code, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::UnknownKind(_) => "unknown_kind",
            Self::Unavailable(_) => "unavailable",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MasterError>;

impl<T> From<std::sync::PoisonError<T>> for MasterError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Unavailable(err.to_string())
    }
}
