//! Configuration and state management for trackrig.
//!
//! ## config.kdl - User preferences (safe to sync across machines)
//!
//! Located at `$TRK_CONFIG_DIR/config.kdl` or `~/.config/trackrig/config.kdl`.
//!
//! Contains:
//! - `server-url` - ftrack server base URL
//! - `username` - ftrack login
//! - `manifest-url` - rig manifest URL or local path
//! - `rig-subdir` - rig folder under the document's grandparent
//!
//! ## state.kdl - Secrets (machine-specific)
//!
//! Located at `$TRK_DATA_DIR/state.kdl` or `~/.local/share/trackrig/state.kdl`.
//!
//! Contains:
//! - `api-key` - ftrack API key
//!
//! **CRITICAL**: `state.kdl` is written with 0600 permissions.
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    API_KEY_ENV, ConfigOverrides, Credentials, Resolved, ResolvedSettings, SERVER_ENV, USER_ENV,
    ValueSource, resolve_from, resolve_settings,
};
pub use schema::{
    CONFIG_DIR_ENV, ConfigKey, DATA_DIR_ENV, TrackrigConfig, TrackrigState, config_kdl_path,
    mask_secret, read_config, read_state, set_value, state_kdl_path, unset_value,
};
#[cfg(unix)]
pub use schema::{CONFIG_FILE_MODE, STATE_FILE_MODE};
