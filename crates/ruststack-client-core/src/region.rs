//! Region identifiers and FIPS pseudo-region normalization.
//!
//! A raw region token may carry FIPS markers (`fips-` or `-fips`) anywhere in
//! the string, e.g. `fips-us-west-2`, `us-west-2-fips` or
//! `rekognition-fips.us-west-2`. The markers are stripped to produce the
//! canonical region used for endpoints and signing, and their presence turns
//! the FIPS flag on.

use std::fmt;

use tracing::info;

const FIPS_MARKERS: [&str; 2] = ["fips-", "-fips"];

/// AWS Region identifier.
///
/// The value is opaque: apart from FIPS marker scanning no validation is
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Region(String);

impl Region {
    /// Region used when a caller asks for a sensible default.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Region {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl From<&str> for Region {
    fn from(region: &str) -> Self {
        Self::new(region)
    }
}

impl From<String> for Region {
    fn from(region: String) -> Self {
        Self(region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of scanning a raw region token for FIPS markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRegion {
    /// Region with every FIPS marker removed.
    pub region: Region,
    /// Whether at least one marker was removed.
    pub fips_marker_found: bool,
}

/// Remove FIPS markers from a raw region token.
///
/// The scan runs left to right. At each step the earliest occurrence of either
/// marker is removed and scanning resumes after it, so doubled markers such as
/// `fips-fips-us-west-2` collapse to `us-west-2`.
#[must_use]
pub fn strip_fips_markers(raw: &str) -> NormalizedRegion {
    let mut normalized = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut found = false;

    loop {
        let next = FIPS_MARKERS
            .iter()
            .filter_map(|marker| rest.find(marker).map(|idx| (idx, marker.len())))
            .min_by_key(|(idx, _)| *idx);

        match next {
            Some((idx, len)) => {
                normalized.push_str(&rest[..idx]);
                rest = &rest[idx + len..];
                found = true;
            }
            None => {
                normalized.push_str(rest);
                break;
            }
        }
    }

    NormalizedRegion {
        region: Region(normalized),
        fips_marker_found: found,
    }
}

/// Normalize a raw region token, logging when a FIPS pseudo-region was used.
#[must_use]
pub fn normalize_region(raw: &str) -> NormalizedRegion {
    let normalized = strip_fips_markers(raw);
    if normalized.fips_marker_found {
        info!(
            input = raw,
            region = %normalized.region,
            "Replacing input region {raw} with {} and setting fipsEnabled to true",
            normalized.region
        );
    }
    normalized
}

// ---------------------------------------------------------------------------
// Sticky FIPS state
// ---------------------------------------------------------------------------

/// FIPS setting accumulated by a client builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FipsState {
    /// Neither a FIPS region nor an explicit flag was supplied.
    #[default]
    Unset,
    /// FIPS endpoints are enabled.
    Enabled,
    /// FIPS endpoints were explicitly disabled.
    Disabled,
}

impl FipsState {
    /// The effective flag, if one was decided.
    #[must_use]
    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Enabled => Some(true),
            Self::Disabled => Some(false),
        }
    }

    /// Resolve the flag, falling back to `default` when unset.
    #[must_use]
    pub fn resolve(self, default: bool) -> bool {
        self.as_option().unwrap_or(default)
    }
}

impl From<bool> for FipsState {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

/// Compute the FIPS state after a builder call.
///
/// A region token carrying a marker enables FIPS. A token without a marker
/// leaves the current state untouched, so a previously enabled flag survives.
/// An explicit flag is applied last and is the only way to clear the state.
#[must_use]
pub fn fips_transition(
    current: FipsState,
    region_token: Option<&str>,
    explicit: Option<bool>,
) -> FipsState {
    let mut next = current;
    if let Some(token) = region_token {
        if strip_fips_markers(token).fips_marker_found {
            next = FipsState::Enabled;
        }
    }
    if let Some(flag) = explicit {
        next = FipsState::from(flag);
    }
    next
}
