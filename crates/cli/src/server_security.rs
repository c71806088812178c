use crate::config::AccessConfig;
use crate::rate_limit::{MinuteWindowLimiter, RateDecision, RateLimiter};
use std::sync::Arc;

/// Short query parameter carrying the API key.
pub const KEY_QUERY_PARAM: &str = "key";
/// Older clients still send the key under this name.
pub const LEGACY_KEY_QUERY_PARAM: &str = "api_key";

/// Why a request was turned away before reaching the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// No key set is configured at all.
    NotConfigured,
    MissingCredential,
    InvalidCredential,
    RateLimited { retry_after_secs: u64 },
}

impl AccessDenied {
    pub fn message(self) -> &'static str {
        match self {
            Self::NotConfigured => "API access is not configured",
            Self::MissingCredential => "API key required",
            Self::InvalidCredential => "invalid API key",
            Self::RateLimited { .. } => "rate limit exceeded",
        }
    }
}

/// Where a request may carry its credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialSources<'a> {
    pub authorization: Option<&'a str>,
    pub key_param: Option<&'a str>,
    pub legacy_key_param: Option<&'a str>,
}

impl<'a> CredentialSources<'a> {
    /// Bearer header first, then `key`, then `api_key`. Blank values count as absent.
    pub fn resolve(&self) -> Option<&'a str> {
        self.authorization
            .and_then(bearer_token)
            .or_else(|| non_blank(self.key_param))
            .or_else(|| non_blank(self.legacy_key_param))
    }
}

fn bearer_token(header_value: &str) -> Option<&str> {
    // Accept only RFC6750-ish "Bearer <token>".
    let rest = header_value.trim().strip_prefix("Bearer ")?;
    non_blank(Some(rest))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Static key check followed by the per-key rate window.
pub struct AccessGate {
    valid_keys: Option<Vec<String>>,
    limiter: Arc<dyn RateLimiter>,
}

impl AccessGate {
    pub fn new(valid_keys: Option<Vec<String>>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            valid_keys,
            limiter,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(
            config.valid_keys.clone(),
            Arc::new(MinuteWindowLimiter::new(config.rate_per_minute)),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.valid_keys.is_some()
    }

    /// Returns the accepted key, or why the request must be rejected.
    pub fn admit<'a>(&self, sources: CredentialSources<'a>) -> Result<&'a str, AccessDenied> {
        let Some(valid_keys) = &self.valid_keys else {
            return Err(AccessDenied::NotConfigured);
        };
        let credential = sources.resolve().ok_or(AccessDenied::MissingCredential)?;

        let known = valid_keys
            .iter()
            .fold(false, |found, key| constant_time_eq(key, credential) | found);
        if !known {
            return Err(AccessDenied::InvalidCredential);
        }

        match self.limiter.check(credential) {
            RateDecision::Allowed => Ok(credential),
            RateDecision::Limited { retry_after_secs } => {
                Err(AccessDenied::RateLimited { retry_after_secs })
            }
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
