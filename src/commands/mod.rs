//! Command implementations for the trk CLI.
//!
//! This module contains the business logic for each CLI command.
//! Commands are organized by area:
//! - [`tracker`] - ftrack projects, tasks and uploads
//! - [`rig`] - manifest browsing and linked rig maintenance
//! - config - showing and editing settings (below)
//!
//! Every command returns a result type implementing [`Output`], which `main`
//! prints as JSON or, with `-H`, as text.

pub mod rig;
pub mod tracker;

pub use rig::{
    rig_download, rig_inspect, rig_link, rig_list, rig_status, rig_switch, rig_update,
    rig_versions,
};
pub use tracker::{projects, task_url, tasks, upload};

use serde::Serialize;

use crate::config::{
    ConfigKey, Resolved, ResolvedSettings, config_kdl_path, set_value, state_kdl_path,
    unset_value,
};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output: Serialize {
    /// Serialize to a single-line JSON string.
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

// === Config Commands ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: Option<String>,
    pub source: Option<String>,
}

#[derive(Serialize)]
pub struct ConfigShowResult {
    pub entries: Vec<ConfigEntry>,
    pub config_path: Option<String>,
    pub state_path: Option<String>,
}

impl Output for ConfigShowResult {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for entry in &self.entries {
            match (&entry.value, &entry.source) {
                (Some(value), Some(source)) => {
                    lines.push(format!("{:<13} {}  ({})", entry.key, value, source))
                }
                _ => lines.push(format!("{:<13} (not set)", entry.key)),
            }
        }
        if let Some(ref path) = self.config_path {
            lines.push(format!("\nconfig: {}", path));
        }
        if let Some(ref path) = self.state_path {
            lines.push(format!("state:  {}", path));
        }
        lines.join("\n")
    }
}

/// Show every resolved setting with its source. The API key is masked.
pub fn config_show(settings: &ResolvedSettings) -> ConfigShowResult {
    let entry = |key: ConfigKey, resolved: Option<(String, String)>| {
        let (value, source) = match resolved {
            Some((value, source)) => (Some(value), Some(source)),
            None => (None, None),
        };
        ConfigEntry {
            key: key.as_str(),
            value,
            source,
        }
    };

    let plain = |r: &Option<Resolved<String>>| {
        r.as_ref().map(|r| (r.value.clone(), r.source.to_string()))
    };

    let entries = vec![
        entry(ConfigKey::ServerUrl, plain(&settings.server_url)),
        entry(ConfigKey::Username, plain(&settings.username)),
        entry(
            ConfigKey::ApiKey,
            settings.masked_api_key().zip(
                settings.api_key.as_ref().map(|r| r.source.to_string()),
            ),
        ),
        entry(
            ConfigKey::ManifestUrl,
            Some((
                settings.manifest_url.value.clone(),
                settings.manifest_url.source.to_string(),
            )),
        ),
        entry(
            ConfigKey::RigSubdir,
            Some((
                settings.rig_subdir.value.clone(),
                settings.rig_subdir.source.to_string(),
            )),
        ),
    ];

    ConfigShowResult {
        entries,
        config_path: config_kdl_path().map(|p| p.display().to_string()),
        state_path: state_kdl_path().map(|p| p.display().to_string()),
    }
}

#[derive(Serialize)]
pub struct ConfigSetResult {
    pub key: &'static str,
    pub set: bool,
    pub path: String,
}

impl Output for ConfigSetResult {
    fn to_human(&self) -> String {
        if self.set {
            format!("Set {} in {}", self.key, self.path)
        } else {
            format!("Unset {} in {}", self.key, self.path)
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey> {
    ConfigKey::parse(key).ok_or_else(|| {
        let known: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
        Error::InvalidInput(format!(
            "unknown config key '{}' (expected one of: {})",
            key,
            known.join(", ")
        ))
    })
}

/// Store a setting. Secrets go to state.kdl, everything else to config.kdl.
pub fn config_set(key: &str, value: &str) -> Result<ConfigSetResult> {
    let key = parse_key(key)?;
    let path = set_value(key, value)?;
    tracing::info!(key = %key, path = %path.display(), "config value set");
    Ok(ConfigSetResult {
        key: key.as_str(),
        set: true,
        path: path.display().to_string(),
    })
}

pub fn config_unset(key: &str) -> Result<ConfigSetResult> {
    let key = parse_key(key)?;
    let path = unset_value(key)?;
    Ok(ConfigSetResult {
        key: key.as_str(),
        set: false,
        path: path.display().to_string(),
    })
}

/// Settings from explicit values only, for command tests.
#[cfg(test)]
pub(crate) fn test_settings(
    server: Option<&str>,
    user: Option<&str>,
    key: Option<&str>,
    manifest: &str,
) -> ResolvedSettings {
    use crate::config::{ConfigOverrides, TrackrigConfig, TrackrigState, resolve_from};

    let config = TrackrigConfig {
        server_url: server.map(str::to_string),
        username: user.map(str::to_string),
        manifest_url: Some(manifest.to_string()),
        rig_subdir: None,
    };
    let state = TrackrigState {
        api_key: key.map(str::to_string),
    };
    resolve_from(&ConfigOverrides::new(), &config, &state, |_| None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_show_masks_api_key() {
        let settings = test_settings(
            Some("https://s.example"),
            Some("artist"),
            Some("0123456789abcdef"),
            "/tmp/rigs.json",
        );
        let result = config_show(&settings);

        let api_key = result.entries.iter().find(|e| e.key == "api-key").unwrap();
        assert_eq!(api_key.value.as_deref(), Some("0123...cdef"));
        assert_eq!(api_key.source.as_deref(), Some("file"));
        assert!(!result.to_json().contains("0123456789abcdef"));
    }

    #[test]
    fn test_config_show_unset_values() {
        let settings = test_settings(None, None, None, "/tmp/rigs.json");
        let result = config_show(&settings);

        let server = result.entries.iter().find(|e| e.key == "server-url").unwrap();
        assert!(server.value.is_none());
        assert!(result.to_human().contains("server-url    (not set)"));

        let subdir = result.entries.iter().find(|e| e.key == "rig-subdir").unwrap();
        assert_eq!(subdir.value.as_deref(), Some("0_IN/3_RIGs"));
        assert_eq!(subdir.source.as_deref(), Some("default"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        match config_set("editor", "vim") {
            Err(Error::InvalidInput(message)) => {
                assert!(message.contains("unknown config key 'editor'"));
                assert!(message.contains("server-url"));
            }
            other => panic!("Expected InvalidInput, got: {:?}", other.map(|r| r.key)),
        }
    }
}
