//! Endpoint resolution.

use std::fmt;

use http::Uri;

use crate::error::{ClientConfigError, ClientConfigResult};
use crate::region::{Region, normalize_region};

/// Inputs to per-request endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointParams {
    /// Canonical region.
    pub region: Region,
    /// Whether FIPS endpoints are required.
    pub use_fips: bool,
    /// Whether dualstack endpoints are required.
    pub use_dualstack: bool,
    /// Caller-supplied endpoint, used verbatim when present.
    pub endpoint: Option<Uri>,
}

/// Resolves the endpoint a request is sent to.
pub trait EndpointProvider: Send + Sync + fmt::Debug {
    /// Resolve the endpoint for `params`.
    fn resolve_endpoint(&self, params: &EndpointParams) -> ClientConfigResult<Uri>;
}

/// Endpoint provider for the standard `amazonaws.com` partition layout.
#[derive(Debug, Clone)]
pub struct DefaultEndpointProvider {
    endpoint_prefix: String,
}

impl DefaultEndpointProvider {
    /// Create a provider for a service endpoint prefix such as `dynamodb`.
    #[must_use]
    pub fn new(endpoint_prefix: impl Into<String>) -> Self {
        Self {
            endpoint_prefix: endpoint_prefix.into(),
        }
    }
}

impl EndpointProvider for DefaultEndpointProvider {
    fn resolve_endpoint(&self, params: &EndpointParams) -> ClientConfigResult<Uri> {
        if let Some(endpoint) = &params.endpoint {
            return Ok(endpoint.clone());
        }
        let prefix = &self.endpoint_prefix;
        let fips = if params.use_fips { "-fips" } else { "" };
        let domain = if params.use_dualstack {
            "api.aws"
        } else {
            "amazonaws.com"
        };
        parse_endpoint(&format!("https://{prefix}{fips}.{}.{domain}", params.region))
    }
}

/// `https://{prefix}.{region}.amazonaws.com`.
pub fn default_endpoint(endpoint_prefix: &str, region: &Region) -> ClientConfigResult<Uri> {
    parse_endpoint(&format!("https://{endpoint_prefix}.{region}.amazonaws.com"))
}

/// Parse a caller-supplied endpoint. The URI must carry a scheme.
pub fn parse_endpoint(endpoint: &str) -> ClientConfigResult<Uri> {
    let uri: Uri = endpoint
        .parse()
        .map_err(|e: http::uri::InvalidUri| ClientConfigError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        })?;
    if uri.scheme().is_none() {
        return Err(ClientConfigError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason: "The URI scheme of endpointOverride must not be null.".to_owned(),
        });
    }
    Ok(uri)
}

/// Region and endpoint resolved for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEndpoint {
    /// Region with FIPS markers removed.
    pub region: Region,
    /// Client endpoint.
    pub endpoint: Uri,
    /// Whether `endpoint` came from the caller.
    pub endpoint_overridden: bool,
    /// Marker found in the region OR the explicit flag.
    pub fips_enabled: bool,
}

/// Normalize `raw_region` and pick the client endpoint.
///
/// An override is used verbatim. Otherwise the endpoint is synthesized from the
/// service prefix and the canonical region.
pub fn resolve_region_and_endpoint(
    raw_region: &str,
    endpoint_override: Option<&str>,
    endpoint_prefix: &str,
    explicit_fips: bool,
) -> ClientConfigResult<RegionEndpoint> {
    let normalized = normalize_region(raw_region);
    let (endpoint, endpoint_overridden) = match endpoint_override {
        Some(endpoint) => (parse_endpoint(endpoint)?, true),
        None => (default_endpoint(endpoint_prefix, &normalized.region)?, false),
    };
    Ok(RegionEndpoint {
        fips_enabled: normalized.fips_marker_found || explicit_fips,
        region: normalized.region,
        endpoint,
        endpoint_overridden,
    })
}
