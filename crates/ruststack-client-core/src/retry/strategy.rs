//! Token-bucket retry strategy.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::backoff::BackoffStrategy;
use super::mode::RetryMode;
use super::predicate::{PredicateOrigin, RetryFailure, RetryPredicate};
use super::token_bucket::TokenBucketStore;
use crate::error::{ClientConfigError, ClientConfigResult};

/// Default cost of a retry in token bucket capacity.
pub const DEFAULT_EXCEPTION_COST: u32 = 5;

/// Lifecycle of a retry token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTokenState {
    /// Attempts are in progress.
    InProgress,
    /// The request eventually succeeded.
    Succeeded,
    /// The strategy refused to retry.
    Failed,
}

/// Tracks the attempts of one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryToken {
    scope: String,
    attempt: u32,
    capacity_acquired: u32,
    capacity_remaining: u32,
    state: RetryTokenState,
    last_failure: Option<RetryFailure>,
}

impl RetryToken {
    /// Token bucket scope the token draws from.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Attempt number, starting at 1.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Capacity taken by the most recent retry.
    #[must_use]
    pub fn capacity_acquired(&self) -> u32 {
        self.capacity_acquired
    }

    /// Bucket capacity observed by the most recent operation.
    #[must_use]
    pub fn capacity_remaining(&self) -> u32 {
        self.capacity_remaining
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RetryTokenState {
        self.state
    }

    /// The failure that triggered the most recent refresh.
    #[must_use]
    pub fn last_failure(&self) -> Option<&RetryFailure> {
        self.last_failure.as_ref()
    }
}

/// A granted retry: the caller sleeps for `delay` and tries again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRetryTokenResponse {
    /// Token to use for the next attempt.
    pub token: RetryToken,
    /// Delay before the next attempt.
    pub delay: Duration,
}

/// Why the strategy refused to retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError {
    /// No retry predicate matched the failure.
    #[error("Request attempt {} encountered non-retryable failure", .token.attempt())]
    NonRetryableException {
        /// The token in its final state.
        token: RetryToken,
    },

    /// All attempts were used.
    #[error("Request will not be retried. Retries have been exhausted ({} attempts)", .token.attempt())]
    MaxRetriesReached {
        /// The token in its final state.
        token: RetryToken,
    },

    /// The retry quota is exhausted.
    #[error(
        "Request will not be retried to protect the caller and downstream service. \
         The cost of retrying ({cost}) exceeds the available retry capacity ({})",
        .token.capacity_remaining()
    )]
    TokenAcquisitionFailed {
        /// Capacity the retry would have cost.
        cost: u32,
        /// The token in its final state.
        token: RetryToken,
    },
}

impl RetryError {
    /// The token in its final state.
    #[must_use]
    pub fn token(&self) -> &RetryToken {
        match self {
            Self::NonRetryableException { token }
            | Self::MaxRetriesReached { token }
            | Self::TokenAcquisitionFailed { token, .. } => token,
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Decides whether and when a failed attempt is retried.
///
/// A strategy is immutable; use [`RetryStrategy::to_builder`] to derive a
/// modified copy. Copies share the token bucket store.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    mode: RetryMode,
    predicates: Vec<RetryPredicate>,
    max_attempts: u32,
    circuit_breaker_enabled: bool,
    backoff: BackoffStrategy,
    throttling_backoff: BackoffStrategy,
    treat_as_throttling: Option<RetryPredicate>,
    exception_cost: u32,
    throttling_exception_cost: u32,
    token_bucket_store: Arc<TokenBucketStore>,
    defaults_added: BTreeSet<String>,
    use_client_defaults: bool,
}

impl RetryStrategy {
    /// Start a builder preconfigured for `mode`, without any predicates.
    #[must_use]
    pub fn builder(mode: RetryMode) -> RetryStrategyBuilder {
        RetryStrategyBuilder::new(mode)
    }

    /// Builder holding the current settings.
    #[must_use]
    pub fn to_builder(&self) -> RetryStrategyBuilder {
        RetryStrategyBuilder {
            inner: self.clone(),
        }
    }

    /// Mode the strategy was created for.
    #[must_use]
    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    /// Retry predicates in evaluation order.
    #[must_use]
    pub fn predicates(&self) -> &[RetryPredicate] {
        &self.predicates
    }

    /// Maximum number of attempts, including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether client-level default predicates may be injected.
    #[must_use]
    pub fn use_client_defaults(&self) -> bool {
        self.use_client_defaults
    }

    /// Whether the named default group should still be added.
    #[must_use]
    pub fn should_add_defaults(&self, marker: &str) -> bool {
        self.use_client_defaults && !self.defaults_added.contains(marker)
    }

    /// Markers of the default groups already applied.
    #[must_use]
    pub fn defaults_added(&self) -> &BTreeSet<String> {
        &self.defaults_added
    }

    /// Returns the token bucket store shared by copies of this strategy.
    #[must_use]
    pub fn token_bucket_store(&self) -> &Arc<TokenBucketStore> {
        &self.token_bucket_store
    }

    /// Name of the first predicate matching `failure`, if any.
    #[must_use]
    pub fn classify(&self, failure: &RetryFailure) -> Option<&str> {
        self.predicates
            .iter()
            .find(|p| p.test(failure))
            .map(RetryPredicate::name)
    }

    fn is_throttling(&self, failure: &RetryFailure) -> bool {
        failure.throttling
            || self
                .treat_as_throttling
                .as_ref()
                .is_some_and(|p| p.test(failure))
    }

    /// Start a request. The first attempt never waits.
    #[must_use]
    pub fn acquire_initial_token(&self, scope: &str) -> RetryToken {
        let bucket = self.token_bucket_store.token_bucket(scope);
        RetryToken {
            scope: scope.to_owned(),
            attempt: 1,
            capacity_acquired: 0,
            capacity_remaining: bucket.current_capacity(),
            state: RetryTokenState::InProgress,
            last_failure: None,
        }
    }

    /// Decide whether the attempt that failed with `failure` is retried.
    ///
    /// The checks run in order: the failure must be retryable, attempts must
    /// remain, and the retry quota must cover the retry cost. A granted retry
    /// waits for the larger of the computed backoff and `suggested_delay`.
    pub fn refresh_retry_token(
        &self,
        token: RetryToken,
        failure: RetryFailure,
        suggested_delay: Option<Duration>,
    ) -> Result<RefreshRetryTokenResponse, RetryError> {
        let mut token = token;
        let matched = self.classify(&failure).map(str::to_owned);
        let throttling = self.is_throttling(&failure);
        token.last_failure = Some(failure);

        let Some(predicate) = matched else {
            token.state = RetryTokenState::Failed;
            debug!(attempt = token.attempt, "failure is not retryable");
            return Err(RetryError::NonRetryableException { token });
        };

        if token.attempt >= self.max_attempts {
            token.state = RetryTokenState::Failed;
            debug!(attempt = token.attempt, "retries exhausted");
            return Err(RetryError::MaxRetriesReached { token });
        }

        let cost = if !self.circuit_breaker_enabled {
            0
        } else if throttling {
            self.throttling_exception_cost
        } else {
            self.exception_cost
        };
        let bucket = self.token_bucket_store.token_bucket(&token.scope);
        let acquired = bucket.try_acquire(cost);
        token.capacity_remaining = acquired.capacity_remaining;
        if acquired.acquisition_failed {
            token.state = RetryTokenState::Failed;
            debug!(
                attempt = token.attempt,
                cost,
                remaining = acquired.capacity_remaining,
                "retry quota exhausted"
            );
            return Err(RetryError::TokenAcquisitionFailed { cost, token });
        }

        token.capacity_acquired = acquired.capacity_acquired;
        let backoff = if throttling {
            self.throttling_backoff
        } else {
            self.backoff
        };
        let delay = backoff
            .compute_delay(token.attempt)
            .max(suggested_delay.unwrap_or_default());
        token.attempt += 1;

        debug!(
            attempt = token.attempt,
            predicate = %predicate,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying request"
        );
        Ok(RefreshRetryTokenResponse { token, delay })
    }

    /// Record a successful attempt, returning capacity to the bucket.
    #[must_use]
    pub fn record_success(&self, token: RetryToken) -> RetryToken {
        let mut token = token;
        let bucket = self.token_bucket_store.token_bucket(&token.scope);
        token.capacity_remaining = bucket.release(token.capacity_acquired.max(1));
        token.state = RetryTokenState::Succeeded;
        token
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`RetryStrategy`].
#[derive(Debug, Clone)]
pub struct RetryStrategyBuilder {
    inner: RetryStrategy,
}

impl RetryStrategyBuilder {
    fn new(mode: RetryMode) -> Self {
        let (backoff, throttling_backoff, throttling_exception_cost) = match mode {
            RetryMode::Legacy => (
                BackoffStrategy::exponential_with_jitter(
                    Duration::from_millis(100),
                    Duration::from_secs(20),
                ),
                BackoffStrategy::exponential_with_jitter(
                    Duration::from_millis(500),
                    Duration::from_secs(20),
                ),
                0,
            ),
            RetryMode::Standard | RetryMode::Adaptive => (
                BackoffStrategy::exponential_with_jitter(
                    Duration::from_millis(100),
                    Duration::from_secs(20),
                ),
                BackoffStrategy::exponential_with_jitter(
                    Duration::from_secs(1),
                    Duration::from_secs(20),
                ),
                DEFAULT_EXCEPTION_COST,
            ),
        };

        Self {
            inner: RetryStrategy {
                mode,
                predicates: Vec::new(),
                max_attempts: mode.max_attempts(),
                circuit_breaker_enabled: true,
                backoff,
                throttling_backoff,
                treat_as_throttling: None,
                exception_cost: DEFAULT_EXCEPTION_COST,
                throttling_exception_cost,
                token_bucket_store: Arc::new(TokenBucketStore::default()),
                defaults_added: BTreeSet::new(),
                use_client_defaults: true,
            },
        }
    }

    /// Retry failures matching `predicate`.
    #[must_use]
    pub fn retry_on_exception(mut self, predicate: RetryPredicate) -> Self {
        self.inner.predicates.push(predicate);
        self
    }

    /// Retry failures with any of the given error codes.
    #[must_use]
    pub fn retry_on_error_codes(self, name: &'static str, codes: &'static [&'static str]) -> Self {
        self.retry_on_exception(RetryPredicate::on_error_codes(name, codes))
    }

    /// Maximum number of attempts, including the first one.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.inner.max_attempts = max_attempts;
        self
    }

    /// Whether retries draw from the token bucket.
    #[must_use]
    pub fn circuit_breaker_enabled(mut self, enabled: bool) -> Self {
        self.inner.circuit_breaker_enabled = enabled;
        self
    }

    /// Backoff for non-throttling failures.
    #[must_use]
    pub fn backoff_strategy(mut self, backoff: BackoffStrategy) -> Self {
        self.inner.backoff = backoff;
        self
    }

    /// Backoff for throttling failures.
    #[must_use]
    pub fn throttling_backoff_strategy(mut self, backoff: BackoffStrategy) -> Self {
        self.inner.throttling_backoff = backoff;
        self
    }

    /// Treat failures matching `predicate` as throttling.
    #[must_use]
    pub fn treat_as_throttling(mut self, predicate: RetryPredicate) -> Self {
        self.inner.treat_as_throttling = Some(predicate);
        self
    }

    /// Capacity a retry costs.
    #[must_use]
    pub fn token_bucket_exception_cost(mut self, cost: u32) -> Self {
        self.inner.exception_cost = cost;
        self.inner.throttling_exception_cost = match self.inner.mode {
            RetryMode::Legacy => 0,
            RetryMode::Standard | RetryMode::Adaptive => cost,
        };
        self
    }

    /// Store the token buckets are taken from.
    #[must_use]
    pub fn token_bucket_store(mut self, store: Arc<TokenBucketStore>) -> Self {
        self.inner.token_bucket_store = store;
        self
    }

    /// Whether client-level default predicates may be injected.
    #[must_use]
    pub fn use_client_defaults(mut self, use_client_defaults: bool) -> Self {
        self.inner.use_client_defaults = use_client_defaults;
        self
    }

    /// Apply a default predicate group and mark it as added.
    ///
    /// The group is skipped when it was already applied or when the strategy
    /// opted out of client defaults.
    #[must_use]
    pub fn add_defaults(
        mut self,
        marker: &str,
        origin: PredicateOrigin,
        predicates: impl IntoIterator<Item = RetryPredicate>,
    ) -> Self {
        if !self.inner.should_add_defaults(marker) {
            return self;
        }
        self.inner
            .predicates
            .extend(predicates.into_iter().map(|p| p.with_origin(origin)));
        self.inner.defaults_added.insert(marker.to_owned());
        self
    }

    /// Finish the strategy.
    pub fn build(self) -> ClientConfigResult<RetryStrategy> {
        if self.inner.max_attempts == 0 {
            return Err(ClientConfigError::InvalidRetryConfiguration(
                "maxAttempts must be positive".to_owned(),
            ));
        }
        Ok(self.finish())
    }

    /// Finish a strategy whose attempts are known to be positive.
    ///
    /// Predicates are ordered by origin; the sort is stable so insertion order
    /// is kept within a group.
    pub(super) fn finish(mut self) -> RetryStrategy {
        debug_assert!(self.inner.max_attempts > 0);
        self.inner.predicates.sort_by_key(RetryPredicate::origin);
        self.inner
    }
}
