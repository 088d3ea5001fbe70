//! Failure descriptions and the predicates that classify them.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use typed_builder::TypedBuilder;

/// What a request attempt failed with, as seen by the retry layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct RetryFailure {
    /// HTTP status code of the response, if one was received.
    #[builder(default, setter(strip_option))]
    pub status_code: Option<u16>,
    /// Service error code, e.g. `ThrottlingException`.
    #[builder(default, setter(strip_option, into))]
    pub error_code: Option<String>,
    /// The failure was explicitly flagged as retryable by the pipeline.
    #[builder(default)]
    pub retryable: bool,
    /// The failure was explicitly flagged as throttling by the pipeline.
    #[builder(default)]
    pub throttling: bool,
    /// The request never produced a response (connection reset, timeout, ...).
    #[builder(default)]
    pub io_error: bool,
    /// Human-readable failure description.
    #[builder(default, setter(into))]
    pub message: String,
}

impl RetryFailure {
    /// Returns `true` if the failure carries one of `codes` as its error code.
    #[must_use]
    pub fn has_error_code(&self, codes: &[&str]) -> bool {
        self.error_code
            .as_deref()
            .is_some_and(|code| codes.contains(&code))
    }

    /// Returns `true` if the failure carries one of `codes` as its status code.
    #[must_use]
    pub fn has_status_code(&self, codes: &[u16]) -> bool {
        self.status_code.is_some_and(|code| codes.contains(&code))
    }

    /// Returns `true` if the status code and the error code together match
    /// one of `pairs`.
    #[must_use]
    pub fn has_status_with_code(&self, pairs: &[(u16, &str)]) -> bool {
        match (self.status_code, self.error_code.as_deref()) {
            (Some(status), Some(code)) => pairs.contains(&(status, code)),
            _ => false,
        }
    }
}

/// Which layer contributed a predicate. Evaluation order follows this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PredicateOrigin {
    /// Supplied by the caller.
    Explicit,
    /// Contributed by the service (or AWS-wide) defaults.
    Service,
    /// Contributed by the generic SDK defaults.
    Sdk,
}

type PredicateFn = dyn Fn(&RetryFailure) -> bool + Send + Sync;

/// A named retry classification.
#[derive(Clone)]
pub struct RetryPredicate {
    name: Cow<'static, str>,
    origin: PredicateOrigin,
    test: Arc<PredicateFn>,
}

impl RetryPredicate {
    /// Create a caller-supplied predicate.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, test: F) -> Self
    where
        F: Fn(&RetryFailure) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            origin: PredicateOrigin::Explicit,
            test: Arc::new(test),
        }
    }

    /// Predicate matching any of the given service error codes.
    #[must_use]
    pub fn on_error_codes(name: &'static str, codes: &'static [&'static str]) -> Self {
        Self::new(name, move |failure| failure.has_error_code(codes))
    }

    /// Predicate matching any of the given HTTP status codes.
    #[must_use]
    pub fn on_status_codes(name: &'static str, codes: &'static [u16]) -> Self {
        Self::new(name, move |failure| failure.has_status_code(codes))
    }

    /// Predicate matching a status code only together with a given error
    /// code.
    #[must_use]
    pub fn on_status_with_codes(
        name: &'static str,
        pairs: &'static [(u16, &'static str)],
    ) -> Self {
        Self::new(name, move |failure| failure.has_status_with_code(pairs))
    }

    /// Re-tag the predicate with the layer that contributed it.
    #[must_use]
    pub fn with_origin(mut self, origin: PredicateOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Predicate name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer that contributed the predicate.
    #[must_use]
    pub fn origin(&self) -> PredicateOrigin {
        self.origin
    }

    /// Evaluate the predicate.
    #[must_use]
    pub fn test(&self, failure: &RetryFailure) -> bool {
        (self.test)(failure)
    }
}

impl fmt::Debug for RetryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPredicate")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
