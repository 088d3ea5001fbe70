//! Environment-driven client settings.
//!
//! Settings follow the AWS SDK environment variable conventions. They sit below
//! explicit builder options and above the built-in defaults.

use typed_builder::TypedBuilder;

use crate::defaults_mode::DefaultsMode;
use crate::error::{ClientConfigError, ClientConfigResult};
use crate::region::Region;
use crate::retry::RetryMode;

/// Client settings read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSettings {
    /// Region from `AWS_REGION`, falling back to `AWS_DEFAULT_REGION`.
    #[builder(default, setter(strip_option, into))]
    pub region: Option<Region>,
    /// Defaults mode from `AWS_DEFAULTS_MODE`.
    #[builder(default, setter(strip_option))]
    pub defaults_mode: Option<DefaultsMode>,
    /// Retry mode from `AWS_RETRY_MODE`.
    #[builder(default, setter(strip_option))]
    pub retry_mode: Option<RetryMode>,
    /// Maximum attempts from `AWS_MAX_ATTEMPTS`.
    #[builder(default, setter(strip_option))]
    pub max_attempts: Option<u32>,
    /// FIPS flag from `AWS_USE_FIPS_ENDPOINT`.
    #[builder(default, setter(strip_option))]
    pub use_fips_endpoint: Option<bool>,
    /// Dualstack flag from `AWS_USE_DUALSTACK_ENDPOINT`.
    #[builder(default, setter(strip_option))]
    pub use_dualstack_endpoint: Option<bool>,
    /// Execution environment from `AWS_EXECUTION_ENV`.
    #[builder(default, setter(strip_option, into))]
    pub execution_environment: Option<String>,
}

impl EnvironmentSettings {
    /// Load settings from environment variables.
    ///
    /// Unparseable values are logged and ignored so that a stray variable never
    /// prevents a client from being built.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring invalid AWS environment settings");
            Self::default()
        })
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ClientConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut settings = Self {
            region: get("AWS_REGION")
                .or_else(|| get("AWS_DEFAULT_REGION"))
                .map(Region::new),
            execution_environment: get("AWS_EXECUTION_ENV"),
            ..Self::default()
        };

        if let Some(v) = get("AWS_DEFAULTS_MODE") {
            settings.defaults_mode = Some(v.parse()?);
        }
        if let Some(v) = get("AWS_RETRY_MODE") {
            settings.retry_mode = Some(v.parse()?);
        }
        if let Some(v) = get("AWS_MAX_ATTEMPTS") {
            let attempts = v
                .trim()
                .parse::<u32>()
                .map_err(|_| ClientConfigError::InvalidSetting {
                    name: "AWS_MAX_ATTEMPTS",
                    value: v.clone(),
                })?;
            settings.max_attempts = Some(attempts);
        }
        if let Some(v) = get("AWS_USE_FIPS_ENDPOINT") {
            settings.use_fips_endpoint = Some(parse_bool(&v));
        }
        if let Some(v) = get("AWS_USE_DUALSTACK_ENDPOINT") {
            settings.use_dualstack_endpoint = Some(parse_bool(&v));
        }

        Ok(settings)
    }
}

/// Parse a boolean flag, accepting `1` and `true` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}
