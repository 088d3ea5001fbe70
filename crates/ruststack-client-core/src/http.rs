//! HTTP client configuration and the narrow transport interfaces the client
//! core consumes.
//!
//! The transport itself lives outside this crate. The core only resolves the
//! [`HttpConfiguration`] a transport should be built with and hands it to an
//! [`SdkHttpClientBuilder`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use typed_builder::TypedBuilder;

/// An HTTP request as handed to the transport.
pub type SdkHttpRequest = http::Request<Bytes>;

/// An HTTP response as returned by the transport.
pub type SdkHttpResponse = http::Response<Bytes>;

/// Connection-level settings for an HTTP client.
///
/// Every field is optional so that layers can be merged with
/// [`HttpConfiguration::merge`]: a value set on a higher layer always wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfiguration {
    /// Time allowed to establish a TCP connection.
    #[builder(default, setter(strip_option))]
    pub connection_timeout: Option<Duration>,
    /// Time allowed to complete the TLS handshake.
    #[builder(default, setter(strip_option))]
    pub tls_negotiation_timeout: Option<Duration>,
    /// Socket read timeout.
    #[builder(default, setter(strip_option))]
    pub read_timeout: Option<Duration>,
    /// Socket write timeout.
    #[builder(default, setter(strip_option))]
    pub write_timeout: Option<Duration>,
    /// Time allowed to lease a pooled connection.
    #[builder(default, setter(strip_option))]
    pub connection_acquire_timeout: Option<Duration>,
    /// Idle time after which pooled connections are closed.
    #[builder(default, setter(strip_option))]
    pub connection_max_idle_time: Option<Duration>,
    /// Maximum number of pooled connections.
    #[builder(default, setter(strip_option))]
    pub max_connections: Option<u32>,
}

impl HttpConfiguration {
    /// Global SDK defaults, the lowest precedence layer.
    #[must_use]
    pub fn global_defaults() -> Self {
        Self {
            connection_timeout: Some(Duration::from_secs(2)),
            tls_negotiation_timeout: Some(Duration::from_secs(5)),
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
            connection_acquire_timeout: Some(Duration::from_secs(10)),
            connection_max_idle_time: Some(Duration::from_secs(60)),
            max_connections: Some(50),
        }
    }

    /// Fill unset fields of `self` from `lower`.
    ///
    /// Values already present on `self` are kept.
    #[must_use]
    pub fn merge(&self, lower: &Self) -> Self {
        Self {
            connection_timeout: self.connection_timeout.or(lower.connection_timeout),
            tls_negotiation_timeout: self
                .tls_negotiation_timeout
                .or(lower.tls_negotiation_timeout),
            read_timeout: self.read_timeout.or(lower.read_timeout),
            write_timeout: self.write_timeout.or(lower.write_timeout),
            connection_acquire_timeout: self
                .connection_acquire_timeout
                .or(lower.connection_acquire_timeout),
            connection_max_idle_time: self
                .connection_max_idle_time
                .or(lower.connection_max_idle_time),
            max_connections: self.max_connections.or(lower.max_connections),
        }
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Merge service-declared HTTP defaults over defaults-mode HTTP defaults.
///
/// When both layers set the same field the service value wins.
#[must_use]
pub fn merge_http_service_defaults(
    service_defaults: &HttpConfiguration,
    defaults_mode_defaults: &HttpConfiguration,
) -> HttpConfiguration {
    service_defaults.merge(defaults_mode_defaults)
}

// ---------------------------------------------------------------------------
// Transport interfaces
// ---------------------------------------------------------------------------

/// A blocking HTTP transport.
pub trait SdkHttpClient: Send + Sync + fmt::Debug {
    /// Execute a request.
    fn send(&self, request: SdkHttpRequest) -> anyhow::Result<SdkHttpResponse>;

    /// Name reported in logs and user agents.
    fn client_name(&self) -> &str;
}

/// A non-blocking HTTP transport.
#[async_trait]
pub trait SdkAsyncHttpClient: Send + Sync + fmt::Debug {
    /// Execute a request.
    async fn send(&self, request: SdkHttpRequest) -> anyhow::Result<SdkHttpResponse>;

    /// Name reported in logs and user agents.
    fn client_name(&self) -> &str;
}

/// Factory that builds a transport from the resolved HTTP configuration.
pub trait SdkHttpClientBuilder: Send + Sync + fmt::Debug {
    /// Build a client honoring `defaults` for every setting the builder itself
    /// leaves unset.
    fn build_with_defaults(&self, defaults: &HttpConfiguration) -> Arc<dyn SdkHttpClient>;
}

/// The transport a client ends up using.
#[derive(Debug, Clone, Default)]
pub enum HttpClientHandle {
    /// No transport was supplied; the caller provides one per request.
    #[default]
    None,
    /// A blocking transport.
    Sync(Arc<dyn SdkHttpClient>),
    /// A non-blocking transport.
    Async(Arc<dyn SdkAsyncHttpClient>),
}

impl HttpClientHandle {
    /// Name of the configured transport, if any.
    #[must_use]
    pub fn client_name(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Sync(client) => Some(client.client_name()),
            Self::Async(client) => Some(client.client_name()),
        }
    }
}
