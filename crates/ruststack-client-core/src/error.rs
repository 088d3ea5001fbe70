//! Error types for client configuration resolution.

/// Errors raised while resolving a client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ClientConfigError {
    /// No region could be resolved.
    #[error("{0}")]
    MissingRegion(String),

    /// No credentials provider was configured.
    #[error("a credentials provider is required to build a client")]
    MissingCredentials,

    /// Both an HTTP client and an HTTP client builder were configured.
    #[error("The httpClient and the httpClientBuilder can't both be configured.")]
    ConflictingHttpClients,

    /// The endpoint override is not a usable URI.
    #[error("invalid endpoint override {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as supplied by the caller.
        endpoint: String,
        /// Why the endpoint was rejected.
        reason: String,
    },

    /// The retry configuration cannot be satisfied.
    #[error("invalid retry configuration: {0}")]
    InvalidRetryConfiguration(String),

    /// An environment or builder setting holds an unrecognised value.
    #[error("invalid value {value:?} for setting {name}")]
    InvalidSetting {
        /// Setting name (environment variable or builder option).
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for configuration resolution.
pub type ClientConfigResult<T> = Result<T, ClientConfigError>;
