//! Service configuration.
//!
//! Layers, lowest to highest precedence: built-in defaults, the optional TOML file, `DTM_*`
//! environment variables, command-line flags.

use anyhow::{Context as AnyhowContext, Result};
use dtm_ingest::{DEFAULT_FETCH_TIMEOUT, DEFAULT_SOURCE_URL};
use dtm_matrix_store::PostalCode;
use dtm_query::{ClientProfile, ClientProfiles, Plan};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SOURCE_URL_ENV: &str = "DTM_SOURCE_URL";
pub const DATA_DIR_ENV: &str = "DTM_DATA_DIR";
pub const API_KEYS_ENV: &str = "DTM_API_KEYS";
pub const RATE_LIMIT_ENV: &str = "DTM_RATE_LIMIT_PER_MINUTE";
pub const DEFAULT_ORIGIN_ENV: &str = "DTM_DEFAULT_ORIGIN";
pub const FETCH_TIMEOUT_ENV: &str = "DTM_FETCH_TIMEOUT_SECS";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_RATE_PER_MINUTE: i64 = 60;
/// Fixed shop location used by the nearest-location endpoint.
pub const DEFAULT_ORIGIN_PC4: &str = "3521";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub fetch_timeout_secs: Option<u64>,
    pub default_origin: Option<String>,
    #[serde(default)]
    pub access: FileAccessConfig,
    #[serde(default)]
    pub clients: Vec<FileClient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileAccessConfig {
    pub keys: Option<Vec<String>>,
    pub rate_per_minute: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileClient {
    pub key: String,
    pub plan: Option<Plan>,
    pub title: Option<String>,
    pub row_cap: Option<u32>,
}

impl FileClient {
    fn into_profile(self) -> (String, ClientProfile) {
        let defaults = ClientProfile::default();
        let profile = ClientProfile {
            plan: self.plan.unwrap_or(defaults.plan),
            display_title: self.title.unwrap_or(defaults.display_title),
            row_cap: self.row_cap,
        };
        (self.key.trim().to_string(), profile)
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Values taken from command-line flags.
#[derive(Debug, Default, Clone)]
pub struct FlagOverrides {
    pub data_dir: Option<PathBuf>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    /// `None` means no key set was configured; gated routes then answer 503.
    pub valid_keys: Option<Vec<String>>,
    /// Requests per key per epoch minute. Zero or negative disables limiting.
    pub rate_per_minute: i64,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub source_url: String,
    pub data_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub default_origin: String,
    pub access: AccessConfig,
    pub clients: HashMap<String, ClientProfile>,
}

impl ServiceConfig {
    /// Resolves the process configuration from the real environment.
    pub fn load(config_path: Option<&Path>, flags: FlagOverrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |name| std::env::var(name).ok(), flags)
    }

    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        flags: FlagOverrides,
    ) -> Result<Self> {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let source_url = flags
            .source_url
            .or_else(|| env(SOURCE_URL_ENV))
            .or(file.source_url)
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());

        let data_dir = flags
            .data_dir
            .or_else(|| env(DATA_DIR_ENV).map(PathBuf::from))
            .or(file.data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let fetch_timeout = match env(FETCH_TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{FETCH_TIMEOUT_ENV} must be whole seconds"))?,
            ),
            None => file
                .fetch_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT),
        };

        let default_origin = env(DEFAULT_ORIGIN_ENV)
            .or(file.default_origin)
            .unwrap_or_else(|| DEFAULT_ORIGIN_PC4.to_string());
        let default_origin = PostalCode::parse(&default_origin)
            .with_context(|| format!("{DEFAULT_ORIGIN_ENV} / default_origin is not a postal code"))?
            .into_string();

        let valid_keys = env(API_KEYS_ENV)
            .map(|raw| raw.split(',').map(str::to_string).collect::<Vec<_>>())
            .or(file.access.keys)
            .map(clean_keys)
            .filter(|keys| !keys.is_empty());

        let rate_per_minute = match env(RATE_LIMIT_ENV) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{RATE_LIMIT_ENV} must be an integer"))?,
            None => file.access.rate_per_minute.unwrap_or(DEFAULT_RATE_PER_MINUTE),
        };

        let mut clients = HashMap::new();
        for client in file.clients {
            let (key, profile) = client.into_profile();
            if key.is_empty() {
                anyhow::bail!("client profile with an empty key in config file");
            }
            clients.insert(key, profile);
        }

        Ok(Self {
            source_url,
            data_dir,
            fetch_timeout,
            default_origin,
            access: AccessConfig {
                valid_keys,
                rate_per_minute,
            },
            clients,
        })
    }

    pub fn client_profiles(&self) -> ClientProfiles {
        ClientProfiles::new(self.clients.clone())
    }
}

fn clean_keys(keys: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = keys
        .into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_file_env_or_flags() {
        let cfg = ServiceConfig::resolve(FileConfig::default(), no_env, FlagOverrides::default())
            .unwrap();
        assert_eq!(cfg.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
        assert_eq!(cfg.default_origin, "3521");
        assert_eq!(
            cfg.access,
            AccessConfig {
                valid_keys: None,
                rate_per_minute: 60
            }
        );
        assert!(cfg.clients.is_empty());
    }

    #[test]
    fn file_values_are_read() {
        let file: FileConfig = toml::from_str(
            r#"
            data_dir = "/srv/dtm"
            fetch_timeout_secs = 30
            default_origin = "1012"

            [access]
            keys = ["alpha", " beta ", ""]
            rate_per_minute = 5

            [[clients]]
            key = "alpha"
            plan = "demo"
            title = "Demo shop"
            row_cap = 25
            "#,
        )
        .unwrap();
        let cfg = ServiceConfig::resolve(file, no_env, FlagOverrides::default()).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/dtm"));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(30));
        assert_eq!(cfg.default_origin, "1012");
        assert_eq!(
            cfg.access.valid_keys,
            Some(vec!["alpha".to_string(), "beta".to_string()])
        );
        assert_eq!(cfg.access.rate_per_minute, 5);

        let profiles = cfg.client_profiles();
        let alpha = profiles.resolve("alpha");
        assert_eq!(alpha.plan, Plan::Demo);
        assert_eq!(alpha.display_title, "Demo shop");
        assert_eq!(alpha.row_cap, Some(25));
        assert_eq!(profiles.resolve("beta").plan, Plan::Pro);
    }

    #[test]
    fn env_beats_file_and_flags_beat_env() {
        let file: FileConfig = toml::from_str(
            r#"
            data_dir = "/from/file"
            [access]
            keys = ["file-key"]
            rate_per_minute = 5
            "#,
        )
        .unwrap();
        let env = |name: &str| match name {
            DATA_DIR_ENV => Some("/from/env".to_string()),
            API_KEYS_ENV => Some("k1, k2".to_string()),
            RATE_LIMIT_ENV => Some("0".to_string()),
            _ => None,
        };
        let flags = FlagOverrides {
            data_dir: Some(PathBuf::from("/from/flag")),
            source_url: None,
        };
        let cfg = ServiceConfig::resolve(file, env, flags).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/from/flag"));
        assert_eq!(
            cfg.access.valid_keys,
            Some(vec!["k1".to_string(), "k2".to_string()])
        );
        assert_eq!(cfg.access.rate_per_minute, 0);
    }

    #[test]
    fn blank_key_list_counts_as_unconfigured() {
        let env = |name: &str| (name == API_KEYS_ENV).then(|| " , ".to_string());
        let cfg = ServiceConfig::resolve(FileConfig::default(), env, FlagOverrides::default())
            .unwrap();
        assert_eq!(cfg.access.valid_keys, None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let env = |name: &str| (name == RATE_LIMIT_ENV).then(|| "lots".to_string());
        let err = ServiceConfig::resolve(FileConfig::default(), env, FlagOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains(RATE_LIMIT_ENV), "{err}");
    }

    #[test]
    fn default_origin_is_validated_and_padded() {
        let env = |name: &str| (name == DEFAULT_ORIGIN_ENV).then(|| "abc".to_string());
        let err = ServiceConfig::resolve(FileConfig::default(), env, FlagOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains(DEFAULT_ORIGIN_ENV), "{err}");

        let file: FileConfig = toml::from_str(r#"default_origin = "21""#).unwrap();
        let cfg = ServiceConfig::resolve(file, no_env, FlagOverrides::default()).unwrap();
        assert_eq!(cfg.default_origin, "0021");
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("bind = \"0.0.0.0:80\"").is_err());
    }
}
