//! Retry modes.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientConfigError;

/// Named retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum RetryMode {
    /// Original retry behavior: four attempts, throttling retries are free.
    #[default]
    #[serde(rename = "legacy")]
    Legacy,
    /// Three attempts with a shared retry quota.
    #[serde(rename = "standard")]
    Standard,
    /// Standard behavior tuned for throttling-heavy workloads.
    #[serde(rename = "adaptive")]
    Adaptive,
}

impl RetryMode {
    /// Returns the external name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Standard => "standard",
            Self::Adaptive => "adaptive",
        }
    }

    /// Default maximum number of attempts, including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::Legacy => 4,
            Self::Standard | Self::Adaptive => 3,
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryMode {
    type Err = ClientConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "standard" => Ok(Self::Standard),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(ClientConfigError::InvalidSetting {
                name: "retry_mode",
                value: s.to_owned(),
            }),
        }
    }
}
