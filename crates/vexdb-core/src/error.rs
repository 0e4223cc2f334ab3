use thiserror::Error;

use crate::ids::Timestamp;

/// Canonical error type for catalog and replica operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Request timestamp did not advance past the barrier watermark.
    #[error("timestamp {ts} is stale or duplicated (watermark {watermark})")]
    StaleOrDuplicateTimestamp {
        /// Timestamp carried by the rejected request.
        ts: Timestamp,
        /// Last accepted timestamp at the time of rejection.
        watermark: Timestamp,
    },

    /// Entity was not found.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"collection"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Entity already exists and cannot be created again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name (e.g. `"partition"`).
        entity: &'static str,
        /// Identifier that conflicts.
        id: String,
    },

    /// Malformed schema, request, or configuration value.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable explanation.
        message: String,
    },

    /// Persistence-layer or other unexpected failure.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },
}

impl CoreError {
    /// Creates a `StaleOrDuplicateTimestamp` variant.
    #[must_use]
    pub const fn stale_timestamp(ts: Timestamp, watermark: Timestamp) -> Self {
        Self::StaleOrDuplicateTimestamp { ts, watermark }
    }

    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an `InvalidArgument` variant.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for barrier rejections.
    #[must_use]
    pub const fn is_stale_timestamp(&self) -> bool {
        matches!(self, Self::StaleOrDuplicateTimestamp { .. })
    }

    /// Short label used for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StaleOrDuplicateTimestamp { .. } => "stale_timestamp",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("codec: {err}"))
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CoreError::not_found("segment", 7).to_string(),
            "segment `7` was not found"
        );
        assert_eq!(
            CoreError::stale_timestamp(3, 4).to_string(),
            "timestamp 3 is stale or duplicated (watermark 4)"
        );
    }

    #[test]
    fn test_kind_labels() {
        assert!(CoreError::stale_timestamp(1, 1).is_stale_timestamp());
        assert_eq!(CoreError::already_exists("partition", "p1").kind(), "already_exists");
        assert_eq!(CoreError::internal("boom").kind(), "internal");
    }
}
