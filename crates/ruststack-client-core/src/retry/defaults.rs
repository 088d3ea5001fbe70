//! Default retry predicates and strategy composition.
//!
//! Two default groups exist: generic SDK predicates and service (AWS-wide)
//! predicates. Each group carries a marker so it is injected at most once, and
//! service predicates are always evaluated before SDK predicates.

use super::mode::RetryMode;
use super::predicate::{PredicateOrigin, RetryFailure, RetryPredicate};
use super::strategy::RetryStrategy;

/// Marker of the generic SDK default group.
pub const SDK_DEFAULTS_MARKER: &str = "sdk";

/// Marker of the service default group.
pub const SERVICE_DEFAULTS_MARKER: &str = "service";

const TRANSIENT_STATUS_CODES: &[u16] = &[500, 502, 503, 504];
const THROTTLING_STATUS_CODES: &[u16] = &[429];
const CLOCK_SKEW_ERROR_CODES: &[&str] = &[
    "RequestTimeTooSkewed",
    "RequestExpired",
    "InvalidSignatureException",
    "SignatureDoesNotMatch",
    "AuthFailure",
    "RequestInTheFuture",
];
/// Throttling codes every AWS-style service may answer with.
const SDK_THROTTLING_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "RequestThrottled",
    "SlowDown",
];
const THROTTLING_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "RequestTimeout",
    "RequestTimeoutException",
    "InternalError",
    "IDPCommunicationError",
];
/// Status codes that are only retried together with the paired error code.
const RETRYABLE_STATUS_WITH_CODES: &[(u16, &str)] = &[
    (500, "InternalFailure"),
    (500, "InternalServerError"),
    (502, "BadGateway"),
    (503, "ServiceUnavailable"),
    (503, "ServiceUnavailableException"),
    (504, "GatewayTimeout"),
];

/// Generic SDK predicates.
#[must_use]
pub fn sdk_default_predicates() -> Vec<RetryPredicate> {
    vec![
        RetryPredicate::new("retryable-flag", |f: &RetryFailure| f.retryable),
        RetryPredicate::on_status_codes("transient-status-code", TRANSIENT_STATUS_CODES),
        RetryPredicate::on_status_codes("throttling-status-code", THROTTLING_STATUS_CODES),
        RetryPredicate::on_error_codes("clock-skew", CLOCK_SKEW_ERROR_CODES),
        RetryPredicate::on_error_codes("throttling-error-code", SDK_THROTTLING_ERROR_CODES),
        RetryPredicate::new("io-error", |f: &RetryFailure| f.io_error),
    ]
}

/// AWS-wide service predicates.
#[must_use]
pub fn service_default_predicates() -> Vec<RetryPredicate> {
    vec![
        RetryPredicate::on_error_codes("aws-transient-error-code", TRANSIENT_ERROR_CODES),
        RetryPredicate::on_error_codes("aws-throttling-error-code", THROTTLING_ERROR_CODES),
        RetryPredicate::on_status_with_codes(
            "aws-retryable-status-code",
            RETRYABLE_STATUS_WITH_CODES,
        ),
    ]
}

/// Predicate recognising throttling failures.
#[must_use]
pub fn throttling_predicate() -> RetryPredicate {
    RetryPredicate::new("throttling", |f: &RetryFailure| {
        f.throttling
            || f.has_status_code(THROTTLING_STATUS_CODES)
            || f.has_error_code(THROTTLING_ERROR_CODES)
    })
}

/// Inject the default groups into `strategy`.
///
/// A strategy that opted out of client defaults is returned unchanged. Each
/// group is otherwise added only when its marker is absent, so composing twice
/// is a no-op.
#[must_use]
pub fn compose_retry_strategy(
    strategy: RetryStrategy,
    service_predicates: Vec<RetryPredicate>,
    sdk_predicates: Vec<RetryPredicate>,
) -> RetryStrategy {
    if !strategy.use_client_defaults() {
        return strategy;
    }
    strategy
        .to_builder()
        .add_defaults(
            SERVICE_DEFAULTS_MARKER,
            PredicateOrigin::Service,
            service_predicates,
        )
        .add_defaults(SDK_DEFAULTS_MARKER, PredicateOrigin::Sdk, sdk_predicates)
        .finish()
}

/// The SDK's strategy for `mode`, with both default groups already applied.
#[must_use]
pub fn default_retry_strategy(mode: RetryMode) -> RetryStrategy {
    let strategy = RetryStrategy::builder(mode)
        .treat_as_throttling(throttling_predicate())
        .finish();
    compose_retry_strategy(
        strategy,
        service_default_predicates(),
        sdk_default_predicates(),
    )
}
