//! DynamoDB service errors as seen by a client.
//!
//! Error responses carry a `__type` field holding the fully-qualified error
//! type, e.g. `com.amazonaws.dynamodb.v20120810#ResourceNotFoundException`.

use std::fmt;

use crate::types::CancellationReason;

const ERROR_TYPE_PREFIX: &str = "com.amazonaws.dynamodb.v20120810#";

/// DynamoDB error codes a client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum DynamoDBErrorCode {
    ResourceNotFoundException,
    ResourceInUseException,
    ConditionalCheckFailedException,
    TransactionCanceledException,
    TransactionConflictException,
    TransactionInProgressException,
    IdempotentParameterMismatchException,
    ItemCollectionSizeLimitExceededException,
    ProvisionedThroughputExceededException,
    RequestLimitExceeded,
    ThrottlingException,
    #[default]
    ValidationException,
    InternalServerError,
    /// Any code this crate does not know about.
    Unknown,
}

impl DynamoDBErrorCode {
    const KNOWN: [Self; 13] = [
        Self::ResourceNotFoundException,
        Self::ResourceInUseException,
        Self::ConditionalCheckFailedException,
        Self::TransactionCanceledException,
        Self::TransactionConflictException,
        Self::TransactionInProgressException,
        Self::IdempotentParameterMismatchException,
        Self::ItemCollectionSizeLimitExceededException,
        Self::ProvisionedThroughputExceededException,
        Self::RequestLimitExceeded,
        Self::ThrottlingException,
        Self::ValidationException,
        Self::InternalServerError,
    ];

    /// Short error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ResourceInUseException => "ResourceInUseException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::TransactionCanceledException => "TransactionCanceledException",
            Self::TransactionConflictException => "TransactionConflictException",
            Self::TransactionInProgressException => "TransactionInProgressException",
            Self::IdempotentParameterMismatchException => "IdempotentParameterMismatchException",
            Self::ItemCollectionSizeLimitExceededException => {
                "ItemCollectionSizeLimitExceededException"
            }
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ThrottlingException => "ThrottlingException",
            Self::ValidationException => "ValidationException",
            Self::InternalServerError => "InternalServerError",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a `__type` value. Both the qualified and the short form are
    /// accepted; anything else maps to [`DynamoDBErrorCode::Unknown`].
    #[must_use]
    pub fn from_error_type(error_type: &str) -> Self {
        let short = error_type
            .rsplit_once('#')
            .map_or(error_type, |(_, code)| code);
        Self::KNOWN
            .into_iter()
            .find(|code| code.as_str() == short)
            .unwrap_or(Self::Unknown)
    }

    /// Fully-qualified `__type` value.
    #[must_use]
    pub fn error_type(&self) -> String {
        match self {
            Self::ValidationException => "com.amazon.coral.validate#ValidationException".to_owned(),
            other => format!("{ERROR_TYPE_PREFIX}{}", other.as_str()),
        }
    }

    /// Whether the service is asking the client to slow down.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceededException
                | Self::RequestLimitExceeded
                | Self::ThrottlingException
                | Self::TransactionInProgressException
        )
    }

    /// HTTP status the service answers with.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::InternalServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
            _ => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for DynamoDBErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DynamoDB error response.
#[derive(Debug)]
pub struct DynamoDBError {
    pub code: DynamoDBErrorCode,
    pub message: String,
    pub status_code: http::StatusCode,
    /// One entry per transaction action, for `TransactionCanceledException`.
    pub cancellation_reasons: Vec<CancellationReason>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DynamoDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DynamoDBError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl DynamoDBError {
    /// An error with a custom message.
    #[must_use]
    pub fn with_message(code: DynamoDBErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            cancellation_reasons: Vec::new(),
            source: None,
        }
    }

    /// Build an error from a response's `__type` and message.
    #[must_use]
    pub fn from_wire(error_type: &str, message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::from_error_type(error_type), message)
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// A canceled transaction, with one reason per action.
    #[must_use]
    pub fn transaction_canceled(reasons: Vec<CancellationReason>) -> Self {
        let codes: Vec<&str> = reasons
            .iter()
            .map(|r| r.code.as_deref().unwrap_or("None"))
            .collect();
        let mut err = Self::with_message(
            DynamoDBErrorCode::TransactionCanceledException,
            format!(
                "Transaction cancelled, please refer cancellation reasons for specific reasons [{}]",
                codes.join(", ")
            ),
        );
        err.cancellation_reasons = reasons;
        err
    }

    /// Condition expression evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ConditionalCheckFailedException, message)
    }

    /// Table not found.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ResourceNotFoundException, message)
    }

    /// Invalid request.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ValidationException, message)
    }

    /// Full `__type` value of the error.
    #[must_use]
    pub fn error_type(&self) -> String {
        self.code.error_type()
    }
}

/// Create a `DynamoDBError` from an error code and message.
///
/// # Examples
///
/// ```
/// use ruststack_dynamodb_model::dynamodb_error;
/// use ruststack_dynamodb_model::error::DynamoDBErrorCode;
///
/// let err = dynamodb_error!(ResourceNotFoundException, "Table not found");
/// assert_eq!(err.code, DynamoDBErrorCode::ResourceNotFoundException);
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! dynamodb_error {
    ($code:ident, $msg:expr) => {
        $crate::error::DynamoDBError::with_message($crate::error::DynamoDBErrorCode::$code, $msg)
    };
}
