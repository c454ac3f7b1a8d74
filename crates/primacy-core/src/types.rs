//! Shared domain types: instances, groups, election state, credentials.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Default profile name for externally-resolved credentials.
pub const DEFAULT_PROFILE: &str = "default";

/// Default region for externally-resolved credentials.
pub const DEFAULT_REGION: &str = "us-east-1";

/// A snapshot of one group member's launch metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    /// Launch time in epoch seconds.
    pub launched_at: u64,
}

impl Instance {
    pub fn new(id: impl Into<String>, launched_at: u64) -> Self {
        Self {
            id: id.into(),
            launched_at,
        }
    }
}

/// A named, horizontally-scaled set of interchangeable instances.
///
/// Member order matters: it is the iteration order used to break ties
/// between members launched at the same second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

/// Return the first group whose name starts with `prefix`.
///
/// Group names are frequently suffixed with deployment tokens
/// (`fleet-a-20240101-abcd`), so callers configure only the stable prefix.
pub fn select_group<'a>(groups: &'a [Group], prefix: &str) -> Option<&'a Group> {
    groups.iter().find(|g| g.name.starts_with(prefix))
}

/// Cached outcome of the most recently completed election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElectionState {
    pub is_primary: bool,
    /// Epoch seconds at which the verdict was computed. `None` until the
    /// first round completes.
    pub last_evaluated: Option<u64>,
}

impl ElectionState {
    /// State computed at `now`.
    pub fn evaluated(is_primary: bool, now: u64) -> Self {
        Self {
            is_primary,
            last_evaluated: Some(now),
        }
    }
}

impl Default for ElectionState {
    /// Permissive placeholder used before the first round completes.
    fn default() -> Self {
        Self {
            is_primary: true,
            last_evaluated: None,
        }
    }
}

/// How a [`Credential`] authorizes against a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// API key passed as a query parameter.
    ApiKeyParam,
    /// API key passed in a named header.
    ApiKeyHeader,
    /// Named profile resolved outside the process, plus a region.
    ExternalProfile,
    /// No authorization.
    NoOp,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::ApiKeyParam => write!(f, "API_KEY_PARAM"),
            CredentialKind::ApiKeyHeader => write!(f, "API_KEY_HEADER"),
            CredentialKind::ExternalProfile => write!(f, "EXTERNAL_PROFILE"),
            CredentialKind::NoOp => write!(f, "NO_OP"),
        }
    }
}

/// Authorization descriptor used to select (and cache) a remote-service
/// client. Equality and hashing cover every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub kind: CredentialKind,
    pub key: Option<String>,
    pub key_name: Option<String>,
    pub value: Option<String>,
}

impl Credential {
    pub fn api_key_param(key: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::ApiKeyParam,
            key: Some(key.into()),
            key_name: None,
            value: None,
        }
    }

    pub fn api_key_header(key: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::ApiKeyHeader,
            key: Some(key.into()),
            key_name: Some(key_name.into()),
            value: None,
        }
    }

    /// Profile-based credential. The profile is stored in `key`, the
    /// region in `value`.
    pub fn external_profile(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::ExternalProfile,
            key: Some(profile.into()),
            key_name: None,
            value: Some(region.into()),
        }
    }

    pub fn no_op() -> Self {
        Self {
            kind: CredentialKind::NoOp,
            key: None,
            key_name: None,
            value: None,
        }
    }

    /// The `default` profile in the default region.
    pub fn default_profile() -> Self {
        Self::external_profile(DEFAULT_PROFILE, DEFAULT_REGION)
    }

    /// Credential for a caller-named profile. A missing, blank, or
    /// `default` profile yields [`Credential::default_profile`]; a missing
    /// region falls back to [`DEFAULT_REGION`].
    pub fn for_profile(profile: Option<&str>, region: Option<&str>) -> Self {
        let named = profile
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(DEFAULT_PROFILE));
        match named {
            Some(profile) => {
                let region = region
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_REGION);
                Self::external_profile(profile, region)
            }
            None => Self::default_profile(),
        }
    }

    /// Profile name for [`CredentialKind::ExternalProfile`] credentials.
    pub fn profile(&self) -> Option<&str> {
        match self.kind {
            CredentialKind::ExternalProfile => self.key.as_deref(),
            _ => None,
        }
    }

    /// Region for [`CredentialKind::ExternalProfile`] credentials.
    pub fn region(&self) -> Option<&str> {
        match self.kind {
            CredentialKind::ExternalProfile => self.value.as_deref(),
            _ => None,
        }
    }

    /// Name of the first field required by this credential's kind that is
    /// missing or blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        let blank = |f: &Option<String>| f.as_deref().is_none_or(|s| s.trim().is_empty());
        match self.kind {
            CredentialKind::ApiKeyParam if blank(&self.key) => Some("key"),
            CredentialKind::ApiKeyHeader if blank(&self.key) => Some("key"),
            CredentialKind::ApiKeyHeader if blank(&self.key_name) => Some("key_name"),
            CredentialKind::ExternalProfile if blank(&self.key) => Some("profile"),
            CredentialKind::ExternalProfile if blank(&self.value) => Some("region"),
            _ => None,
        }
    }
}

impl fmt::Display for Credential {
    /// Renders kind and key only; `value` may be secret and is never shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Credential{{{}({})}}",
            self.kind,
            self.key.as_deref().unwrap_or("")
        )
    }
}

/// Current wall-clock time in epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
