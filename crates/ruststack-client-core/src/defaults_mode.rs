//! Defaults modes and their configuration tables.
//!
//! A defaults mode is a named bundle of defaults tuned for a deployment
//! topology. `AUTO` is not a concrete mode: it is resolved through a
//! [`DefaultsModeDiscovery`] collaborator before any table lookup.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EnvironmentSettings;
use crate::error::ClientConfigError;
use crate::http::HttpConfiguration;
use crate::region::Region;
use crate::retry::RetryMode;

/// Named bundle of client defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum DefaultsMode {
    /// Pre-defaults-mode behavior; contributes no defaults.
    #[default]
    #[serde(rename = "legacy")]
    Legacy,
    /// Safe defaults for most applications.
    #[serde(rename = "standard")]
    Standard,
    /// Tuned for callers in the same region as the service.
    #[serde(rename = "in-region")]
    InRegion,
    /// Tuned for callers in a different region than the service.
    #[serde(rename = "cross-region")]
    CrossRegion,
    /// Tuned for mobile applications with high-latency networks.
    #[serde(rename = "mobile")]
    Mobile,
    /// Resolved to a concrete mode by inspecting the environment.
    #[serde(rename = "auto")]
    Auto,
}

impl DefaultsMode {
    /// Returns the external name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Standard => "standard",
            Self::InRegion => "in-region",
            Self::CrossRegion => "cross-region",
            Self::Mobile => "mobile",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for DefaultsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefaultsMode {
    type Err = ClientConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "standard" => Ok(Self::Standard),
            "in-region" => Ok(Self::InRegion),
            "cross-region" => Ok(Self::CrossRegion),
            "mobile" => Ok(Self::Mobile),
            "auto" => Ok(Self::Auto),
            _ => Err(ClientConfigError::InvalidSetting {
                name: "defaults_mode",
                value: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration tables
// ---------------------------------------------------------------------------

/// Non-HTTP defaults contributed by a concrete mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeDefaults {
    /// Retry mode to use when none is configured explicitly.
    pub retry_mode: Option<RetryMode>,
    /// Whether S3 requests to `us-east-1` use the regional endpoint.
    pub s3_us_east_1_regional_endpoint: Option<bool>,
    /// Upper bound on a whole call, retries included.
    pub api_call_timeout: Option<Duration>,
}

const STANDARD_TIMEOUT: Duration = Duration::from_millis(3100);
const IN_REGION_TIMEOUT: Duration = Duration::from_millis(1100);
const MOBILE_TIMEOUT: Duration = Duration::from_millis(30_000);

const STANDARD_API_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const IN_REGION_API_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const MOBILE_API_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Non-HTTP defaults for `mode`. `LEGACY` and `AUTO` contribute nothing.
#[must_use]
pub fn mode_defaults(mode: DefaultsMode) -> ModeDefaults {
    let api_call_timeout = match mode {
        DefaultsMode::Legacy | DefaultsMode::Auto => return ModeDefaults::default(),
        DefaultsMode::Standard | DefaultsMode::CrossRegion => STANDARD_API_CALL_TIMEOUT,
        DefaultsMode::InRegion => IN_REGION_API_CALL_TIMEOUT,
        DefaultsMode::Mobile => MOBILE_API_CALL_TIMEOUT,
    };
    ModeDefaults {
        retry_mode: Some(RetryMode::Standard),
        s3_us_east_1_regional_endpoint: Some(true),
        api_call_timeout: Some(api_call_timeout),
    }
}

/// HTTP defaults for `mode`. `LEGACY` and `AUTO` contribute nothing.
#[must_use]
pub fn mode_http_defaults(mode: DefaultsMode) -> HttpConfiguration {
    let timeout = match mode {
        DefaultsMode::Legacy | DefaultsMode::Auto => return HttpConfiguration::default(),
        DefaultsMode::Standard | DefaultsMode::CrossRegion => STANDARD_TIMEOUT,
        DefaultsMode::InRegion => IN_REGION_TIMEOUT,
        DefaultsMode::Mobile => MOBILE_TIMEOUT,
    };
    HttpConfiguration::builder()
        .connection_timeout(timeout)
        .tls_negotiation_timeout(timeout)
        .build()
}

/// Values an explicit configuration may already carry before the table is
/// applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedModeSettings {
    /// Effective retry mode, if any layer decided one.
    pub retry_mode: Option<RetryMode>,
    /// Effective S3 regional endpoint flag, if any layer decided one.
    pub s3_us_east_1_regional_endpoint: Option<bool>,
    /// Effective api-call timeout, if any layer decided one.
    pub api_call_timeout: Option<Duration>,
}

/// Merge the table for `mode` under the explicit values.
///
/// Explicit values always win; the table only fills gaps.
#[must_use]
pub fn apply_defaults_mode_table(
    mode: DefaultsMode,
    explicit: ResolvedModeSettings,
) -> ResolvedModeSettings {
    let table = mode_defaults(mode);
    ResolvedModeSettings {
        retry_mode: explicit.retry_mode.or(table.retry_mode),
        s3_us_east_1_regional_endpoint: explicit
            .s3_us_east_1_regional_endpoint
            .or(table.s3_us_east_1_regional_endpoint),
        api_call_timeout: explicit.api_call_timeout.or(table.api_call_timeout),
    }
}

// ---------------------------------------------------------------------------
// AUTO discovery
// ---------------------------------------------------------------------------

/// Resolves `AUTO` to a concrete mode.
pub trait DefaultsModeDiscovery: Send + Sync + fmt::Debug {
    /// Pick a concrete mode for a client targeting `region`, or `None` when the
    /// environment gives no usable signal.
    fn discover(&self, region: &Region) -> Option<DefaultsMode>;
}

/// Discovery based on the execution environment variables.
///
/// Inside a managed AWS runtime (`AWS_EXECUTION_ENV` is set) the client is
/// in-region when the runtime region matches the target region and
/// cross-region otherwise.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentDefaultsModeDiscovery {
    settings: EnvironmentSettings,
}

impl EnvironmentDefaultsModeDiscovery {
    /// Create a discovery over the given settings.
    #[must_use]
    pub fn new(settings: EnvironmentSettings) -> Self {
        Self { settings }
    }

    /// Create a discovery over the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(EnvironmentSettings::from_env())
    }
}

impl DefaultsModeDiscovery for EnvironmentDefaultsModeDiscovery {
    fn discover(&self, region: &Region) -> Option<DefaultsMode> {
        self.settings.execution_environment.as_ref()?;
        let current = self.settings.region.as_ref()?;
        if current == region {
            Some(DefaultsMode::InRegion)
        } else {
            Some(DefaultsMode::CrossRegion)
        }
    }
}

/// Resolve the requested mode to a concrete one.
///
/// `AUTO` is delegated to `discovery`; when no collaborator is available, or it
/// cannot decide, the mode falls back to `LEGACY` so that client construction
/// never fails when the environment cannot be inspected.
#[must_use]
pub fn resolve_defaults_mode(
    requested: DefaultsMode,
    region: &Region,
    discovery: Option<&dyn DefaultsModeDiscovery>,
) -> DefaultsMode {
    if requested != DefaultsMode::Auto {
        return requested;
    }

    match discovery.and_then(|d| d.discover(region)) {
        Some(DefaultsMode::Auto) | None => {
            warn!(region = %region, "unable to discover defaults mode, falling back to legacy");
            DefaultsMode::Legacy
        }
        Some(mode) => {
            debug!(region = %region, mode = %mode, "discovered defaults mode");
            mode
        }
    }
}
