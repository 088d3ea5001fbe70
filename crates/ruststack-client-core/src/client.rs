//! Client builder and the resolved, immutable client configuration.
//!
//! [`ClientBuilder::build`] merges four layers, highest first: per-request
//! overrides (applied later through [`ClientConfiguration::effective_for`]),
//! explicit builder options, defaults-mode derived values and global SDK
//! defaults. Environment settings sit between the builder and the
//! defaults-mode table.

use std::sync::Arc;
use std::time::Duration;

use http::Uri;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::config::EnvironmentSettings;
use crate::credentials::{CredentialsProvider, SigningParams};
use crate::defaults_mode::{
    DefaultsMode, DefaultsModeDiscovery, ResolvedModeSettings, apply_defaults_mode_table,
    mode_http_defaults, resolve_defaults_mode,
};
use crate::endpoint::{
    DefaultEndpointProvider, EndpointParams, EndpointProvider, resolve_region_and_endpoint,
};
use crate::error::{ClientConfigError, ClientConfigResult};
use crate::http::{
    HttpClientHandle, HttpConfiguration, SdkAsyncHttpClient, SdkHttpClient,
    SdkHttpClientBuilder, merge_http_service_defaults,
};
use crate::region::{FipsState, Region, fips_transition, normalize_region};
use crate::retry::{
    RetryMode, RetryPredicate, RetryStrategy, compose_retry_strategy, sdk_default_predicates,
    service_default_predicates, throttling_predicate,
};

const REGION_DETECTION_DISABLED: &str =
    "No region was configured, and use-region-provider-chain was disabled.";
const REGION_NOT_FOUND: &str = "Unable to load region from any of the providers in the chain";

// ---------------------------------------------------------------------------
// Service defaults
// ---------------------------------------------------------------------------

/// Settings a service client contributes before any user input.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceDefaults {
    /// Service name, e.g. `DynamoDB`.
    #[builder(setter(into))]
    pub service_name: String,
    /// Name used when signing requests, e.g. `dynamodb`.
    #[builder(setter(into))]
    pub signing_name: String,
    /// Host prefix of the service endpoint, e.g. `dynamodb`.
    #[builder(setter(into))]
    pub endpoint_prefix: String,
    /// HTTP settings the service declares; they win over defaults-mode values.
    #[builder(default)]
    pub http_defaults: HttpConfiguration,
    /// Service-level retry predicates injected into every strategy.
    #[builder(default = service_default_predicates())]
    pub retry_predicates: Vec<RetryPredicate>,
}

// ---------------------------------------------------------------------------
// Override configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum RetryOverride {
    Strategy(RetryStrategy),
    Mode(RetryMode),
}

/// Client-wide overrides.
///
/// A retry strategy and a retry mode replace each other: the setter called
/// last wins.
#[derive(Debug, Clone, Default)]
pub struct ClientOverrideConfiguration {
    retry: Option<RetryOverride>,
    api_call_timeout: Option<Duration>,
    api_call_attempt_timeout: Option<Duration>,
}

impl ClientOverrideConfiguration {
    /// Create an empty override configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `strategy` for every request, replacing any retry mode.
    #[must_use]
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry = Some(RetryOverride::Strategy(strategy));
        self
    }

    /// Use the SDK strategy for `mode`, replacing any retry strategy.
    #[must_use]
    pub fn retry_mode(mut self, mode: RetryMode) -> Self {
        self.retry = Some(RetryOverride::Mode(mode));
        self
    }

    /// Total time allowed for an API call, retries included.
    #[must_use]
    pub fn api_call_timeout(mut self, timeout: Duration) -> Self {
        self.api_call_timeout = Some(timeout);
        self
    }

    /// Time allowed for a single attempt.
    #[must_use]
    pub fn api_call_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.api_call_attempt_timeout = Some(timeout);
        self
    }

    /// The configured strategy, if the strategy setter was called last.
    #[must_use]
    pub fn configured_retry_strategy(&self) -> Option<&RetryStrategy> {
        match &self.retry {
            Some(RetryOverride::Strategy(strategy)) => Some(strategy),
            _ => None,
        }
    }

    /// The retry mode implied by the last retry setter.
    #[must_use]
    pub fn configured_retry_mode(&self) -> Option<RetryMode> {
        match &self.retry {
            Some(RetryOverride::Strategy(strategy)) => Some(strategy.mode()),
            Some(RetryOverride::Mode(mode)) => Some(*mode),
            None => None,
        }
    }

    /// Total API call timeout.
    #[must_use]
    pub fn configured_api_call_timeout(&self) -> Option<Duration> {
        self.api_call_timeout
    }

    /// Per-attempt timeout.
    #[must_use]
    pub fn configured_api_call_attempt_timeout(&self) -> Option<Duration> {
        self.api_call_attempt_timeout
    }
}

/// Overrides for a single request.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct RequestOverrideConfiguration {
    /// Total time allowed for this call.
    #[builder(default, setter(strip_option))]
    pub api_call_timeout: Option<Duration>,
    /// Time allowed for a single attempt of this call.
    #[builder(default, setter(strip_option))]
    pub api_call_attempt_timeout: Option<Duration>,
    /// Strategy used for this call instead of the client's.
    #[builder(default, setter(strip_option))]
    pub retry_strategy: Option<RetryStrategy>,
}

/// Settings in force for one request after per-request overrides.
#[derive(Debug, Clone)]
pub struct EffectiveRequestConfiguration {
    /// Total time allowed for the call.
    pub api_call_timeout: Option<Duration>,
    /// Time allowed for a single attempt.
    pub api_call_attempt_timeout: Option<Duration>,
    /// Strategy driving retries of the call.
    pub retry_strategy: RetryStrategy,
}

// ---------------------------------------------------------------------------
// Client builder
// ---------------------------------------------------------------------------

/// Collects user input for a client and resolves it into a
/// [`ClientConfiguration`].
#[derive(Debug)]
pub struct ClientBuilder {
    service: ServiceDefaults,
    region: Option<Region>,
    fips: FipsState,
    dualstack: Option<bool>,
    endpoint_override: Option<String>,
    endpoint_provider: Option<Arc<dyn EndpointProvider>>,
    credentials_provider: Option<Arc<dyn CredentialsProvider>>,
    http_client: HttpClientHandle,
    http_client_builder: Option<Arc<dyn SdkHttpClientBuilder>>,
    http_configuration: HttpConfiguration,
    override_configuration: ClientOverrideConfiguration,
    defaults_mode: Option<DefaultsMode>,
    defaults_mode_discovery: Option<Arc<dyn DefaultsModeDiscovery>>,
    environment: EnvironmentSettings,
    region_detection: bool,
}

impl ClientBuilder {
    /// Start a builder for a service. Environment settings are empty until
    /// [`ClientBuilder::environment`] or [`ClientBuilder::from_env`] is used.
    #[must_use]
    pub fn new(service: ServiceDefaults) -> Self {
        Self {
            service,
            region: None,
            fips: FipsState::Unset,
            dualstack: None,
            endpoint_override: None,
            endpoint_provider: None,
            credentials_provider: None,
            http_client: HttpClientHandle::None,
            http_client_builder: None,
            http_configuration: HttpConfiguration::default(),
            override_configuration: ClientOverrideConfiguration::default(),
            defaults_mode: None,
            defaults_mode_discovery: None,
            environment: EnvironmentSettings::default(),
            region_detection: true,
        }
    }

    /// Start a builder that reads settings from the process environment.
    #[must_use]
    pub fn from_env(service: ServiceDefaults) -> Self {
        Self::new(service).environment(EnvironmentSettings::from_env())
    }

    /// Target region. A FIPS pseudo-region enables FIPS; later regions without
    /// a marker keep it enabled.
    #[must_use]
    pub fn region(mut self, region: impl Into<Region>) -> Self {
        let raw: Region = region.into();
        self.fips = fips_transition(self.fips, Some(raw.as_str()), None);
        self.region = Some(normalize_region(raw.as_str()).region);
        self
    }

    /// Explicitly enable or disable FIPS endpoints.
    #[must_use]
    pub fn fips_enabled(mut self, enabled: bool) -> Self {
        self.fips = fips_transition(self.fips, None, Some(enabled));
        self
    }

    /// Explicitly enable or disable dualstack endpoints.
    #[must_use]
    pub fn dualstack_enabled(mut self, enabled: bool) -> Self {
        self.dualstack = Some(enabled);
        self
    }

    /// Send requests to `endpoint` instead of the synthesized one.
    #[must_use]
    pub fn endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// Resolve per-request endpoints with `provider`.
    #[must_use]
    pub fn endpoint_provider(mut self, provider: Arc<dyn EndpointProvider>) -> Self {
        self.endpoint_provider = Some(provider);
        self
    }

    /// Credentials used to sign requests.
    #[must_use]
    pub fn credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// A ready-made blocking transport.
    #[must_use]
    pub fn http_client(mut self, client: Arc<dyn SdkHttpClient>) -> Self {
        self.http_client = HttpClientHandle::Sync(client);
        self
    }

    /// A ready-made non-blocking transport.
    #[must_use]
    pub fn async_http_client(mut self, client: Arc<dyn SdkAsyncHttpClient>) -> Self {
        self.http_client = HttpClientHandle::Async(client);
        self
    }

    /// A transport factory, invoked with the merged HTTP configuration.
    #[must_use]
    pub fn http_client_builder(mut self, builder: Arc<dyn SdkHttpClientBuilder>) -> Self {
        self.http_client_builder = Some(builder);
        self
    }

    /// Explicit HTTP settings, the highest HTTP layer.
    #[must_use]
    pub fn http_configuration(mut self, configuration: HttpConfiguration) -> Self {
        self.http_configuration = configuration;
        self
    }

    /// Client-wide overrides.
    #[must_use]
    pub fn override_configuration(mut self, configuration: ClientOverrideConfiguration) -> Self {
        self.override_configuration = configuration;
        self
    }

    /// Defaults mode to resolve against.
    #[must_use]
    pub fn defaults_mode(mut self, mode: DefaultsMode) -> Self {
        self.defaults_mode = Some(mode);
        self
    }

    /// Collaborator resolving `AUTO`.
    #[must_use]
    pub fn defaults_mode_discovery(mut self, discovery: Arc<dyn DefaultsModeDiscovery>) -> Self {
        self.defaults_mode_discovery = Some(discovery);
        self
    }

    /// Environment settings layered under the builder options.
    #[must_use]
    pub fn environment(mut self, environment: EnvironmentSettings) -> Self {
        self.environment = environment;
        self
    }

    /// Whether a missing region may be looked up in the environment.
    #[must_use]
    pub fn region_detection(mut self, enabled: bool) -> Self {
        self.region_detection = enabled;
        self
    }

    /// Resolve the configuration.
    pub fn build(self) -> ClientConfigResult<ClientConfiguration> {
        let Self {
            service,
            region,
            mut fips,
            dualstack,
            endpoint_override,
            endpoint_provider,
            credentials_provider,
            http_client,
            http_client_builder,
            http_configuration,
            override_configuration,
            defaults_mode,
            defaults_mode_discovery,
            environment,
            region_detection,
        } = self;

        let region = match region {
            Some(region) => region,
            None if !region_detection => {
                return Err(ClientConfigError::MissingRegion(
                    REGION_DETECTION_DISABLED.to_owned(),
                ));
            }
            None => {
                let detected = environment
                    .region
                    .clone()
                    .ok_or_else(|| ClientConfigError::MissingRegion(REGION_NOT_FOUND.to_owned()))?;
                fips = fips_transition(fips, Some(detected.as_str()), None);
                normalize_region(detected.as_str()).region
            }
        };

        let dualstack_enabled = dualstack
            .or(environment.use_dualstack_endpoint)
            .unwrap_or(false);
        let fips_enabled = fips
            .as_option()
            .or(environment.use_fips_endpoint)
            .unwrap_or(false);

        let requested_mode = defaults_mode
            .or(environment.defaults_mode)
            .unwrap_or_default();
        let defaults_mode =
            resolve_defaults_mode(requested_mode, &region, defaults_mode_discovery.as_deref());

        let mode_settings = apply_defaults_mode_table(
            defaults_mode,
            ResolvedModeSettings {
                retry_mode: override_configuration
                    .configured_retry_mode()
                    .or(environment.retry_mode),
                s3_us_east_1_regional_endpoint: None,
                api_call_timeout: override_configuration.configured_api_call_timeout(),
            },
        );
        let retry_mode = mode_settings.retry_mode.unwrap_or_default();
        let s3_us_east_1_regional_endpoint =
            mode_settings.s3_us_east_1_regional_endpoint.unwrap_or(false);

        let credentials_provider =
            credentials_provider.ok_or(ClientConfigError::MissingCredentials)?;

        let resolved = resolve_region_and_endpoint(
            region.as_str(),
            endpoint_override.as_deref(),
            &service.endpoint_prefix,
            fips_enabled,
        )?;
        let endpoint_provider = endpoint_provider.unwrap_or_else(|| {
            Arc::new(DefaultEndpointProvider::new(service.endpoint_prefix.clone()))
        });

        let http_configuration = http_configuration
            .merge(&merge_http_service_defaults(
                &service.http_defaults,
                &mode_http_defaults(defaults_mode),
            ))
            .merge(&HttpConfiguration::global_defaults());

        let base_strategy = match override_configuration.configured_retry_strategy() {
            Some(strategy) => strategy.clone(),
            None => {
                let mut builder =
                    RetryStrategy::builder(retry_mode).treat_as_throttling(throttling_predicate());
                if let Some(max_attempts) = environment.max_attempts {
                    builder = builder.max_attempts(max_attempts);
                }
                builder.build()?
            }
        };
        let retry_strategy = compose_retry_strategy(
            base_strategy,
            service.retry_predicates.clone(),
            sdk_default_predicates(),
        );

        let http_client = match (http_client, http_client_builder) {
            (HttpClientHandle::None, Some(builder)) => {
                HttpClientHandle::Sync(builder.build_with_defaults(&http_configuration))
            }
            (HttpClientHandle::None, None) => HttpClientHandle::None,
            (_, Some(_)) => return Err(ClientConfigError::ConflictingHttpClients),
            (client, None) => client,
        };

        info!(
            service = %service.service_name,
            region = %resolved.region,
            endpoint = %resolved.endpoint,
            defaults_mode = %defaults_mode,
            retry_mode = %retry_mode,
            fips = resolved.fips_enabled,
            dualstack = dualstack_enabled,
            "resolved client configuration"
        );

        Ok(ClientConfiguration {
            signing_region: resolved.region.clone(),
            region: resolved.region,
            endpoint: resolved.endpoint,
            endpoint_overridden: resolved.endpoint_overridden,
            endpoint_provider,
            fips_enabled: resolved.fips_enabled,
            dualstack_enabled,
            retry_strategy,
            retry_mode,
            http_client,
            http_configuration,
            defaults_mode,
            signing_name: service.signing_name,
            service_name: service.service_name,
            service_retry_predicates: service.retry_predicates,
            s3_us_east_1_regional_endpoint,
            credentials_provider,
            api_call_timeout: mode_settings.api_call_timeout,
            api_call_attempt_timeout: override_configuration.configured_api_call_attempt_timeout(),
        })
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Resolved client settings. Immutable once built.
#[derive(Debug, Clone)]
pub struct ClientConfiguration {
    region: Region,
    endpoint: Uri,
    endpoint_overridden: bool,
    endpoint_provider: Arc<dyn EndpointProvider>,
    fips_enabled: bool,
    dualstack_enabled: bool,
    retry_strategy: RetryStrategy,
    retry_mode: RetryMode,
    http_client: HttpClientHandle,
    http_configuration: HttpConfiguration,
    defaults_mode: DefaultsMode,
    signing_name: String,
    signing_region: Region,
    service_name: String,
    service_retry_predicates: Vec<RetryPredicate>,
    s3_us_east_1_regional_endpoint: bool,
    credentials_provider: Arc<dyn CredentialsProvider>,
    api_call_timeout: Option<Duration>,
    api_call_attempt_timeout: Option<Duration>,
}

impl ClientConfiguration {
    /// Canonical region.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Client endpoint: the override, or the synthesized base endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Whether the endpoint was supplied by the caller.
    #[must_use]
    pub fn endpoint_overridden(&self) -> bool {
        self.endpoint_overridden
    }

    /// Provider resolving per-request endpoints.
    #[must_use]
    pub fn endpoint_provider(&self) -> &Arc<dyn EndpointProvider> {
        &self.endpoint_provider
    }

    /// Whether FIPS endpoints are used.
    #[must_use]
    pub fn fips_enabled(&self) -> bool {
        self.fips_enabled
    }

    /// Whether dualstack endpoints are used.
    #[must_use]
    pub fn dualstack_enabled(&self) -> bool {
        self.dualstack_enabled
    }

    /// Composed retry strategy.
    #[must_use]
    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }

    /// Resolved retry mode.
    #[must_use]
    pub fn retry_mode(&self) -> RetryMode {
        self.retry_mode
    }

    /// Transport, if one was configured.
    #[must_use]
    pub fn http_client(&self) -> &HttpClientHandle {
        &self.http_client
    }

    /// Fully merged HTTP settings.
    #[must_use]
    pub fn http_configuration(&self) -> &HttpConfiguration {
        &self.http_configuration
    }

    /// Concrete defaults mode.
    #[must_use]
    pub fn defaults_mode(&self) -> DefaultsMode {
        self.defaults_mode
    }

    /// Service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Whether S3 requests to `us-east-1` use the regional endpoint.
    #[must_use]
    pub fn s3_us_east_1_regional_endpoint(&self) -> bool {
        self.s3_us_east_1_regional_endpoint
    }

    /// Credentials source.
    #[must_use]
    pub fn credentials_provider(&self) -> &Arc<dyn CredentialsProvider> {
        &self.credentials_provider
    }

    /// Client-wide API call timeout.
    #[must_use]
    pub fn api_call_timeout(&self) -> Option<Duration> {
        self.api_call_timeout
    }

    /// Client-wide attempt timeout.
    #[must_use]
    pub fn api_call_attempt_timeout(&self) -> Option<Duration> {
        self.api_call_attempt_timeout
    }

    /// Signing name and region.
    #[must_use]
    pub fn signing_params(&self) -> SigningParams {
        SigningParams {
            signing_name: self.signing_name.clone(),
            signing_region: self.signing_region.clone(),
        }
    }

    /// Resolve the endpoint a request is sent to.
    pub fn resolve_endpoint(&self) -> ClientConfigResult<Uri> {
        self.endpoint_provider.resolve_endpoint(&EndpointParams {
            region: self.region.clone(),
            use_fips: self.fips_enabled,
            use_dualstack: self.dualstack_enabled,
            endpoint: self.endpoint_overridden.then(|| self.endpoint.clone()),
        })
    }

    /// Apply per-request overrides on top of the client settings.
    #[must_use]
    pub fn effective_for(
        &self,
        request: &RequestOverrideConfiguration,
    ) -> EffectiveRequestConfiguration {
        let retry_strategy = match &request.retry_strategy {
            Some(strategy) => {
                debug!(mode = %strategy.mode(), "using per-request retry strategy");
                compose_retry_strategy(
                    strategy.clone(),
                    self.service_retry_predicates.clone(),
                    sdk_default_predicates(),
                )
            }
            None => self.retry_strategy.clone(),
        };
        EffectiveRequestConfiguration {
            api_call_timeout: request.api_call_timeout.or(self.api_call_timeout),
            api_call_attempt_timeout: request
                .api_call_attempt_timeout
                .or(self.api_call_attempt_timeout),
            retry_strategy,
        }
    }
}
