//! Client configuration resolution for RustStack service clients.
//!
//! This crate turns user input, environment settings and service defaults into
//! an immutable [`ClientConfiguration`]: region and FIPS normalization,
//! defaults-mode tables, HTTP settings, endpoint resolution and token-bucket
//! retry strategies. Transports, credential chains and signing are consumed
//! through narrow traits.

pub mod client;
pub mod config;
pub mod credentials;
pub mod defaults_mode;
pub mod endpoint;
mod error;
pub mod http;
pub mod region;
pub mod retry;

pub use client::{
    ClientBuilder, ClientConfiguration, ClientOverrideConfiguration,
    EffectiveRequestConfiguration, RequestOverrideConfiguration, ServiceDefaults,
};
pub use config::EnvironmentSettings;
pub use credentials::{
    Credentials, CredentialsProvider, RequestSigner, SigningParams, StaticCredentialsProvider,
};
pub use defaults_mode::{DefaultsMode, DefaultsModeDiscovery, EnvironmentDefaultsModeDiscovery};
pub use endpoint::{DefaultEndpointProvider, EndpointParams, EndpointProvider};
pub use error::{ClientConfigError, ClientConfigResult};
pub use http::{HttpClientHandle, HttpConfiguration};
pub use region::{FipsState, Region};
pub use retry::{RetryError, RetryMode, RetryStrategy};
