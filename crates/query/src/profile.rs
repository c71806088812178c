use dtm_protocol::ProfileResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_DISPLAY_TITLE: &str = "PC4 drive-time matrix";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Demo,
    #[default]
    Pro,
    Enterprise,
}

impl Plan {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

/// Presentation metadata attached to a credential. Never influences lookup results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    #[serde(default)]
    pub plan: Plan,
    #[serde(default = "default_title", alias = "title")]
    pub display_title: String,
    #[serde(default)]
    pub row_cap: Option<u32>,
}

fn default_title() -> String {
    DEFAULT_DISPLAY_TITLE.to_string()
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            plan: Plan::Pro,
            display_title: default_title(),
            row_cap: None,
        }
    }
}

impl From<&ClientProfile> for ProfileResponse {
    fn from(profile: &ClientProfile) -> Self {
        Self {
            plan: profile.plan.as_str().to_string(),
            display_title: profile.display_title.clone(),
            row_cap: profile.row_cap,
        }
    }
}

/// Credential → profile table loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct ClientProfiles {
    by_key: HashMap<String, ClientProfile>,
    fallback: ClientProfile,
}

impl ClientProfiles {
    pub fn new(by_key: HashMap<String, ClientProfile>) -> Self {
        Self {
            by_key,
            fallback: ClientProfile::default(),
        }
    }

    /// Registered profile for `key`, or the unrestricted `pro` profile.
    pub fn resolve(&self, key: &str) -> &ClientProfile {
        self.by_key.get(key).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
