//! Retry strategies: classification, backoff, and the retry quota.

mod backoff;
mod defaults;
mod mode;
mod predicate;
mod strategy;
mod token_bucket;

pub use backoff::BackoffStrategy;
pub use defaults::{
    SDK_DEFAULTS_MARKER, SERVICE_DEFAULTS_MARKER, compose_retry_strategy, default_retry_strategy,
    sdk_default_predicates, service_default_predicates, throttling_predicate,
};
pub use mode::RetryMode;
pub use predicate::{PredicateOrigin, RetryFailure, RetryPredicate};
pub use strategy::{
    DEFAULT_EXCEPTION_COST, RefreshRetryTokenResponse, RetryError, RetryStrategy,
    RetryStrategyBuilder, RetryToken, RetryTokenState,
};
pub use token_bucket::{
    AcquireResponse, DEFAULT_TOKEN_BUCKET_CAPACITY, TokenBucket, TokenBucketStore,
};
