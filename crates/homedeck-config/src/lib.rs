//! Shared configuration for homedeck front ends.
//!
//! TOML profiles merged with environment overrides, translated to a
//! `homedeck_core::ConsoleConfig`. The core never reads config files --
//! everything on-disk funnels through this crate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homedeck_api::transport::TlsMode;
use homedeck_core::ConsoleConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            profiles: HashMap::new(),
        }
    }
}

/// A named backend profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "https://homedeck.local:8443").
    pub backend: String,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification (self-signed backends).
    pub insecure: Option<bool>,

    /// Request timeout in seconds.
    pub timeout: Option<u64>,

    /// Enable the push event stream.
    #[serde(default = "default_events")]
    pub events: bool,

    /// Override the store snapshot path. `false`-like absence means
    /// the platform data dir; see [`snapshot_path`].
    pub snapshot_path: Option<PathBuf>,
}

fn default_events() -> bool {
    true
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "homedeck", "homedeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the persisted store snapshot for a profile.
pub fn snapshot_path(profile_name: &str) -> PathBuf {
    ProjectDirs::from("io", "homedeck", "homedeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push(format!("{profile_name}.store.json"));
            p
        },
        |dirs| dirs.data_dir().join(format!("{profile_name}.store.json")),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homedeck");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load a Config from an explicit file (tests, alternate locations).
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMEDECK_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Pick a profile by name, falling back to the config's default.
pub fn select_profile<'a>(
    config: &'a Config,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = name
        .or(config.default_profile.as_deref())
        .unwrap_or("default");
    config
        .profiles
        .get(name)
        .map(|profile| (name, profile))
        .ok_or_else(|| ConfigError::UnknownProfile {
            profile: name.to_owned(),
        })
}

/// Build a `ConsoleConfig` from a profile.
pub fn profile_to_console_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConsoleConfig, ConfigError> {
    let url: url::Url = profile
        .backend
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "backend".into(),
            reason: format!("invalid URL: {}", profile.backend),
        })?;

    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::DangerAcceptInvalid // homelab backends are typically self-signed
    };

    Ok(ConsoleConfig {
        url,
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(30)),
        events_enabled: profile.events,
        snapshot_path: Some(
            profile
                .snapshot_path
                .clone()
                .unwrap_or_else(|| snapshot_path(profile_name)),
        ),
        ..ConsoleConfig::default()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_profile = "lab"

[profiles.lab]
backend = "https://homedeck.local:8443"
insecure = true
timeout = 10

[profiles.remote]
backend = "https://deck.example.com"
events = false
"#;

    fn sample_config() -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn loads_profiles_from_toml() {
        let config = sample_config();
        assert_eq!(config.default_profile.as_deref(), Some("lab"));
        assert_eq!(config.profiles.len(), 2);
        assert!(!config.profiles["remote"].events);
    }

    #[test]
    fn select_profile_falls_back_to_default() {
        let config = sample_config();
        let (name, profile) = select_profile(&config, None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(profile.timeout, Some(10));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = sample_config();
        assert!(matches!(
            select_profile(&config, Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translates_to_console_config() {
        let config = sample_config();
        let (name, profile) = select_profile(&config, Some("lab")).unwrap();
        let console = profile_to_console_config(profile, name).unwrap();

        assert_eq!(console.url.as_str(), "https://homedeck.local:8443/");
        assert_eq!(console.timeout, Duration::from_secs(10));
        assert!(console.events_enabled);
        assert!(console.snapshot_path.is_some());
    }

    #[test]
    fn invalid_backend_url_is_rejected() {
        let profile = Profile {
            backend: "not a url".into(),
            ca_cert: None,
            insecure: None,
            timeout: None,
            events: true,
            snapshot_path: None,
        };
        assert!(matches!(
            profile_to_console_config(&profile, "x"),
            Err(ConfigError::Validation { .. })
        ));
    }
}
