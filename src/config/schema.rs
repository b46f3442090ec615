//! KDL schema definitions for config.kdl and state.kdl.
//!
//! This module provides:
//! - Rust structs representing the KDL schema
//! - Serialization/deserialization to/from KDL format
//! - Validation and merging
//! - Reading and writing the files with the right permissions

use std::fs;
use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Overrides the directory holding config.kdl
pub const CONFIG_DIR_ENV: &str = "TRK_CONFIG_DIR";

/// Overrides the directory holding state.kdl
pub const DATA_DIR_ENV: &str = "TRK_DATA_DIR";

const APP_DIR: &str = "trackrig";
const CONFIG_FILE: &str = "config.kdl";
const STATE_FILE: &str = "state.kdl";

/// Required permissions for state.kdl (Unix: 0600, owner read/write only).
#[cfg(unix)]
pub const STATE_FILE_MODE: u32 = 0o600;

/// Required permissions for config.kdl (Unix: 0644, readable by all).
#[cfg(unix)]
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// Keys accepted by `trk config set` / `trk config unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServerUrl,
    Username,
    ManifestUrl,
    RigSubdir,
    ApiKey,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::ServerUrl,
        ConfigKey::Username,
        ConfigKey::ManifestUrl,
        ConfigKey::RigSubdir,
        ConfigKey::ApiKey,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ServerUrl => "server-url",
            ConfigKey::Username => "username",
            ConfigKey::ManifestUrl => "manifest-url",
            ConfigKey::RigSubdir => "rig-subdir",
            ConfigKey::ApiKey => "api-key",
        }
    }

    /// Whether the value is a secret kept in state.kdl.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::ApiKey)
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl.
///
/// File permissions: 0644 (rw-r--r--)
///
/// # KDL Schema
///
/// ```kdl
/// server-url "https://studio.ftrackapp.com"
/// username "artist@studio.com"
/// manifest-url "https://cdn.example/rigs.json"
/// rig-subdir "0_IN/3_RIGs"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackrigConfig {
    /// ftrack server base URL
    pub server_url: Option<String>,

    /// ftrack login
    pub username: Option<String>,

    /// Rig manifest URL or local path
    pub manifest_url: Option<String>,

    /// Rig folder relative to the document's grandparent
    pub rig_subdir: Option<String>,
}

impl TrackrigConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ref url) = self.server_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("server-url must start with http(s)://, got {}", url));
            }
        }
        if let Some(ref subdir) = self.rig_subdir {
            if Path::new(subdir).is_absolute() {
                return Err(format!("rig-subdir must be relative, got {}", subdir));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            server_url: string_node(doc, "server-url"),
            username: string_node(doc, "username"),
            manifest_url: string_node(doc, "manifest-url"),
            rig_subdir: string_node(doc, "rig-subdir"),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        push_string_node(&mut doc, "server-url", self.server_url.as_deref());
        push_string_node(&mut doc, "username", self.username.as_deref());
        push_string_node(&mut doc, "manifest-url", self.manifest_url.as_deref());
        push_string_node(&mut doc, "rig-subdir", self.rig_subdir.as_deref());
        doc
    }

    fn field_mut(&mut self, key: ConfigKey) -> Option<&mut Option<String>> {
        match key {
            ConfigKey::ServerUrl => Some(&mut self.server_url),
            ConfigKey::Username => Some(&mut self.username),
            ConfigKey::ManifestUrl => Some(&mut self.manifest_url),
            ConfigKey::RigSubdir => Some(&mut self.rig_subdir),
            ConfigKey::ApiKey => None,
        }
    }
}

/// Machine-specific state stored in state.kdl.
///
/// **MUST be created with 0600 permissions (owner read/write only)**.
///
/// ```kdl
/// api-key "7f3c...."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackrigState {
    /// ftrack API key (sensitive!)
    pub api_key: Option<String>,
}

impl TrackrigState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            api_key: string_node(doc, "api-key"),
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        push_string_node(&mut doc, "api-key", self.api_key.as_deref());
        doc
    }
}

/// Mask a secret for display, keeping the first and last 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        let head: String = chars.iter().take(4).collect();
        format!("{}...", head)
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

fn string_node(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_string())
        .map(str::to_string)
}

fn push_string_node(doc: &mut KdlDocument, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let mut node = KdlNode::new(name);
        node.push(KdlEntry::new(KdlValue::String(value.to_string())));
        doc.nodes_mut().push(node);
    }
}

// ==================== File locations ====================

/// Directory holding config.kdl.
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_DIR)),
    }
}

/// Directory holding state.kdl.
pub fn data_dir() -> Option<PathBuf> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::data_local_dir().map(|d| d.join(APP_DIR)),
    }
}

pub fn config_kdl_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}

pub fn state_kdl_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join(STATE_FILE))
}

// ==================== Reading and writing ====================

fn read_kdl(path: &Path) -> Result<KdlDocument> {
    if !path.exists() {
        return Ok(KdlDocument::new());
    }
    let content = fs::read_to_string(path)?;
    content
        .parse::<KdlDocument>()
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
}

fn write_kdl(path: &Path, doc: &KdlDocument, #[allow(unused)] mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = create_with_mode(path, mode)?;
        // The creation mode only applies to new files.
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        file.write_all(doc.to_string().as_bytes())?;
    }

    #[cfg(not(unix))]
    fs::write(path, doc.to_string())?;

    Ok(())
}

/// Open `path` for writing. A newly created file gets `mode` from the start.
#[cfg(unix)]
fn create_with_mode(path: &Path, mode: u32) -> Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?)
}

fn require(path: Option<PathBuf>, what: &str) -> Result<PathBuf> {
    path.ok_or_else(|| Error::Config(format!("cannot determine {} directory", what)))
}

/// Read config.kdl, or an empty config if it does not exist.
pub fn read_config() -> Result<TrackrigConfig> {
    match config_kdl_path() {
        Some(path) => Ok(TrackrigConfig::from_kdl(&read_kdl(&path)?)),
        None => Ok(TrackrigConfig::default()),
    }
}

/// Read state.kdl, or an empty state if it does not exist.
pub fn read_state() -> Result<TrackrigState> {
    match state_kdl_path() {
        Some(path) => Ok(TrackrigState::from_kdl(&read_kdl(&path)?)),
        None => Ok(TrackrigState::default()),
    }
}

pub fn write_config(config: &TrackrigConfig) -> Result<PathBuf> {
    config.validate().map_err(Error::Config)?;
    let path = require(config_kdl_path(), "config")?;
    write_kdl(&path, &config.to_kdl(), mode_for(false))?;
    Ok(path)
}

pub fn write_state(state: &TrackrigState) -> Result<PathBuf> {
    let path = require(state_kdl_path(), "data")?;
    write_kdl(&path, &state.to_kdl(), mode_for(true))?;
    Ok(path)
}

#[cfg(unix)]
fn mode_for(secret: bool) -> u32 {
    if secret { STATE_FILE_MODE } else { CONFIG_FILE_MODE }
}

#[cfg(not(unix))]
fn mode_for(_secret: bool) -> u32 {
    0
}

/// Store `value` under `key` in whichever file owns the key.
pub fn set_value(key: ConfigKey, value: &str) -> Result<PathBuf> {
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", key)));
    }
    update_value(key, Some(value.to_string()))
}

/// Remove `key` from whichever file owns it.
pub fn unset_value(key: ConfigKey) -> Result<PathBuf> {
    update_value(key, None)
}

fn update_value(key: ConfigKey, value: Option<String>) -> Result<PathBuf> {
    if key.is_secret() {
        let mut state = read_state()?;
        state.api_key = value;
        return write_state(&state);
    }

    let mut config = read_config()?;
    if let Some(field) = config.field_mut(key) {
        *field = value;
    }
    write_config(&config)
}
