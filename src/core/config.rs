//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{CrvError, Result};
use crate::core::paths::resolve_absolute_path;
use crate::session::Role;
use crate::triage::model::Tab;

/// Full crv configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub endpoints: EndpointsConfig,
    pub session: SessionConfig,
    pub view: ViewConfig,
    pub paths: PathsConfig,
}

/// Backend location, credentials, and transport knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Bearer token. Takes precedence over `token_file`.
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Executable used for HTTP calls.
    pub curl_bin: String,
}

/// Relative endpoint paths. `{id}` is substituted with the request id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub all_requests: String,
    pub requests_by_me: String,
    pub requests_from_me: String,
    pub accept: String,
    pub decline: String,
}

/// Session overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Force a role instead of decoding it from the token.
    pub role: Option<Role>,
}

/// Triage view behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ViewConfig {
    pub start_tab: Tab,
    /// Re-fetch the list after a successful accept/decline.
    pub refresh_after_action: bool,
}

/// Filesystem paths used by crv.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub preferences_file: PathBuf,
    pub activity_log: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            token_file: None,
            timeout_secs: 10,
            curl_bin: "curl".to_string(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            all_requests: "/api/request/all".to_string(),
            requests_by_me: "/api/request/by-me".to_string(),
            requests_from_me: "/api/request/from-me".to_string(),
            accept: "/api/request/accept/{id}".to_string(),
            decline: "/api/request/deny/{id}".to_string(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            start_tab: Tab::Pending,
            refresh_after_action: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[CRV-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("crv");
        let data = home_dir.join(".local").join("share").join("crv");
        Self {
            config_file: cfg.join("config.toml"),
            preferences_file: cfg.join("preferences.json"),
            activity_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| CrvError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(CrvError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for diagnostics.
    ///
    /// FNV-1a over the canonical JSON form; the token is excluded.
    pub fn stable_hash(&self) -> Result<String> {
        let mut redacted = self.clone();
        redacted.server.token = None;
        let canonical = serde_json::to_string(&redacted)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Resolve the bearer token from `server.token` or `server.token_file`.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = self.server.token.as_deref() {
            return Ok(Some(token.trim().to_string()));
        }
        let Some(path) = self.server.token_file.as_deref() else {
            return Ok(None);
        };
        let raw = fs::read_to_string(path).map_err(|source| CrvError::io(path, source))?;
        let token = raw.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // server
        if let Some(raw) = lookup("CRV_SERVER_BASE_URL") {
            self.server.base_url = raw;
        }
        if let Some(raw) = lookup("CRV_SERVER_TOKEN") {
            self.server.token = Some(raw);
        }
        if let Some(raw) = lookup("CRV_SERVER_TOKEN_FILE") {
            self.server.token_file = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("CRV_SERVER_TIMEOUT_SECS") {
            self.server.timeout_secs = parse_env_u64("CRV_SERVER_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("CRV_CURL_BIN") {
            self.server.curl_bin = raw;
        }

        // session
        if let Some(raw) = lookup("CRV_SESSION_ROLE") {
            let role = raw.parse::<Role>().map_err(|details| CrvError::ConfigParse {
                context: "env",
                details: format!("CRV_SESSION_ROLE={raw:?}: {details}"),
            })?;
            self.session.role = Some(role);
        }

        // view
        if let Some(raw) = lookup("CRV_VIEW_START_TAB") {
            self.view.start_tab = raw.parse::<Tab>().map_err(|details| CrvError::ConfigParse {
                context: "env",
                details: format!("CRV_VIEW_START_TAB={raw:?}: {details}"),
            })?;
        }
        if let Some(raw) = lookup("CRV_VIEW_REFRESH_AFTER_ACTION") {
            self.view.refresh_after_action =
                parse_env_bool("CRV_VIEW_REFRESH_AFTER_ACTION", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("CRV_PREFERENCES_FILE") {
            self.paths.preferences_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("CRV_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn normalize(&mut self) {
        let trimmed = self.server.base_url.trim().trim_end_matches('/').to_string();
        self.server.base_url = trimmed;
        self.server.token_file = self.server.token_file.as_deref().map(resolve_absolute_path);
        self.paths.preferences_file = resolve_absolute_path(&self.paths.preferences_file);
        self.paths.activity_log = resolve_absolute_path(&self.paths.activity_log);
    }

    fn validate(&self) -> Result<()> {
        let base = &self.server.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(CrvError::InvalidConfig {
                details: format!("server.base_url must start with http:// or https://, got {base:?}"),
            });
        }

        if !(1..=300).contains(&self.server.timeout_secs) {
            return Err(CrvError::InvalidConfig {
                details: format!(
                    "server.timeout_secs must be in [1, 300], got {}",
                    self.server.timeout_secs
                ),
            });
        }

        if self.server.curl_bin.trim().is_empty() {
            return Err(CrvError::InvalidConfig {
                details: "server.curl_bin must not be empty".to_string(),
            });
        }

        for (name, value) in [
            ("all_requests", &self.endpoints.all_requests),
            ("requests_by_me", &self.endpoints.requests_by_me),
            ("requests_from_me", &self.endpoints.requests_from_me),
            ("accept", &self.endpoints.accept),
            ("decline", &self.endpoints.decline),
        ] {
            if !value.starts_with('/') {
                return Err(CrvError::InvalidConfig {
                    details: format!("endpoints.{name} must start with '/', got {value:?}"),
                });
            }
        }

        for (name, value) in [
            ("accept", &self.endpoints.accept),
            ("decline", &self.endpoints.decline),
        ] {
            if !value.contains("{id}") {
                return Err(CrvError::InvalidConfig {
                    details: format!("endpoints.{name} must contain an {{id}} placeholder"),
                });
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| CrvError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| CrvError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
