//! Precedence resolution for settings and credentials.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`FTRACK_SERVER`, `FTRACK_API_USER`, `FTRACK_API_KEY`)
//! 3. config.kdl / state.kdl
//! 4. Built-in defaults
//!
//! Empty values at any level are treated as unset.

use crate::config::schema::{TrackrigConfig, TrackrigState, mask_secret, read_config, read_state};
use crate::rigs::DEFAULT_MANIFEST_URL;
use crate::rigs::download::DEFAULT_RIG_SUBDIR;
use crate::{Error, Result};

pub const SERVER_ENV: &str = "FTRACK_SERVER";
pub const USER_ENV: &str = "FTRACK_API_USER";
pub const API_KEY_ENV: &str = "FTRACK_API_KEY";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl or state.kdl
    File,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::File => write!(f, "file"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub manifest_url: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = Some(url.into());
        self
    }
}

/// Everything trk needs, resolved across all sources.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub server_url: Option<Resolved<String>>,
    pub username: Option<Resolved<String>>,
    pub api_key: Option<Resolved<String>>,
    pub manifest_url: Resolved<String>,
    pub rig_subdir: Resolved<String>,
}

/// ftrack login details, all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server_url: String,
    pub username: String,
    pub api_key: String,
}

impl ResolvedSettings {
    /// Credentials for the ftrack API.
    ///
    /// Fails with every missing field named, so one run tells the user
    /// everything they need to set.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut missing = Vec::new();
        if self.server_url.is_none() {
            missing.push("server-url");
        }
        if self.username.is_none() {
            missing.push("username");
        }
        if self.api_key.is_none() {
            missing.push("api-key");
        }

        match (&self.server_url, &self.username, &self.api_key) {
            (Some(server_url), Some(username), Some(api_key)) => Ok(Credentials {
                server_url: server_url.value.clone(),
                username: username.value.clone(),
                api_key: api_key.value.clone(),
            }),
            _ => Err(Error::MissingCredentials(missing)),
        }
    }

    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|r| mask_secret(&r.value))
    }
}

/// Resolve settings from the config files, the environment and `overrides`.
pub fn resolve_settings(overrides: &ConfigOverrides) -> Result<ResolvedSettings> {
    let config = read_config()?;
    let state = read_state()?;
    Ok(resolve_from(overrides, &config, &state, |name| {
        std::env::var(name).ok()
    }))
}

/// Resolution over explicit inputs. `env` looks up an environment variable.
pub fn resolve_from(
    overrides: &ConfigOverrides,
    config: &TrackrigConfig,
    state: &TrackrigState,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedSettings {
    let pick = |cli: &Option<String>, env_name: Option<&str>, file: &Option<String>| {
        if let Some(value) = non_empty(cli) {
            return Some(Resolved::new(value, ValueSource::CliFlag));
        }
        if let Some(name) = env_name {
            if let Some(value) = non_empty(&env(name)) {
                return Some(Resolved::new(value, ValueSource::EnvVar(name.to_string())));
            }
        }
        non_empty(file).map(|value| Resolved::new(value, ValueSource::File))
    };

    let server_url = pick(&overrides.server_url, Some(SERVER_ENV), &config.server_url).map(|r| {
        Resolved::new(r.value.trim_end_matches('/').to_string(), r.source)
    });
    let username = pick(&overrides.username, Some(USER_ENV), &config.username);
    let api_key = pick(&None, Some(API_KEY_ENV), &state.api_key);

    let manifest_url = pick(&overrides.manifest_url, None, &config.manifest_url)
        .unwrap_or_else(|| Resolved::new(DEFAULT_MANIFEST_URL.to_string(), ValueSource::Default));
    let rig_subdir = pick(&None, None, &config.rig_subdir)
        .unwrap_or_else(|| Resolved::new(DEFAULT_RIG_SUBDIR.to_string(), ValueSource::Default));

    ResolvedSettings {
        server_url,
        username,
        api_key,
        manifest_url,
        rig_subdir,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
