//! Enhanced client errors.

use std::fmt;

use ruststack_dynamodb_model::error::{DynamoDBError, DynamoDBErrorCode};
use ruststack_dynamodb_model::types::CancellationReason;

/// Operation that needed a mapped table resource but had none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableResourcePurpose {
    /// Deriving a key from a key item.
    KeyDerivation,
    /// Materializing the write requests of a write batch.
    WriteBatchRequests,
    /// Materializing the read requests of a read batch.
    ReadBatchRequests,
}

impl fmt::Display for TableResourcePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeyDerivation => {
                "A mappedTableResource is required to derive a key from the given keyItem"
            }
            Self::WriteBatchRequests => {
                "A mappedTableResource is required when generating the write requests for WriteBatch"
            }
            Self::ReadBatchRequests => {
                "A mappedTableResource is required when generating the read requests for ReadBatch"
            }
        })
    }
}

/// Errors raised by the enhanced client.
#[derive(Debug, thiserror::Error)]
pub enum EnhancedError {
    /// An item-level operation was used without a bound table.
    #[error("{0}")]
    MissingTableResource(TableResourcePurpose),

    /// The caller supplied an unusable value.
    #[error("{0}")]
    InvalidArgument(String),

    /// Two expressions bind the same placeholder to different values.
    #[error("{0}")]
    ExpressionConflict(String),

    /// An item does not fit the table schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// The service rejected a request.
    #[error(transparent)]
    Service(#[from] DynamoDBError),

    /// Internal error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EnhancedError {
    /// Service error code, if the service produced this error.
    #[must_use]
    pub fn service_code(&self) -> Option<DynamoDBErrorCode> {
        match self {
            Self::Service(err) => Some(err.code),
            _ => None,
        }
    }

    /// Whether a condition expression evaluated to false.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        self.service_code() == Some(DynamoDBErrorCode::ConditionalCheckFailedException)
    }

    /// Per-action reasons of a canceled transaction; empty otherwise.
    #[must_use]
    pub fn cancellation_reasons(&self) -> &[CancellationReason] {
        match self {
            Self::Service(err) => &err.cancellation_reasons,
            _ => &[],
        }
    }
}

/// Convenience alias.
pub type EnhancedResult<T> = Result<T, EnhancedError>;
