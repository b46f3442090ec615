//! Common test utilities for trackrig integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.config/trackrig/` or `~/.local/share/trackrig/`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A rig manifest served from a local file.
pub const MANIFEST: &str = r#"{
    "rigs": {
        "chr_hero_rig": {
            "latest_version": 5,
            "download_url": "https://cdn.invalid/chr_hero_rig_v5.blend",
            "versions": {
                "3": "https://cdn.invalid/chr_hero_rig_v3.blend",
                "5": "https://cdn.invalid/chr_hero_rig_v5.blend"
            },
            "description": "Main character"
        },
        "chr_Sidekick_rig": {
            "latest_version": 2,
            "download_url": "https://cdn.invalid/chr_Sidekick_rig_v2.blend"
        }
    }
}"#;

/// A test environment with isolated config and data directories.
///
/// - `work_dir`: current directory for commands (link tables, documents)
/// - `config_dir`: holds config.kdl (via `TRK_CONFIG_DIR`)
/// - `data_dir`: holds state.kdl (via `TRK_DATA_DIR`)
///
/// The `trk()` method sets the variables per-invocation, making tests
/// parallel-safe. ftrack credential variables are cleared so the host
/// environment cannot leak in.
pub struct TestEnv {
    pub work_dir: TempDir,
    pub config_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the trk binary with isolated directories.
    pub fn trk(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_trk"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("TRK_CONFIG_DIR", self.config_dir.path());
        cmd.env("TRK_DATA_DIR", self.data_dir.path());
        cmd.env_remove("FTRACK_SERVER");
        cmd.env_remove("FTRACK_API_USER");
        cmd.env_remove("FTRACK_API_KEY");
        cmd.env_remove("TRK_LOG");
        cmd
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Write the test manifest into the work dir and return its path.
    pub fn write_manifest(&self) -> PathBuf {
        let path = self.work_dir.path().join("rigs.json");
        fs::write(&path, MANIFEST).unwrap();
        path
    }

    /// Write a link table next to a saved document at `3_ANIM/sh010.blend`.
    pub fn write_links(&self, libraries: &[&str]) -> PathBuf {
        let document = self.work_dir.path().join("3_ANIM").join("sh010.blend");
        let entries: Vec<serde_json::Value> = libraries
            .iter()
            .map(|path| serde_json::json!({"filepath": path, "collections": ["chr.hero_rig"]}))
            .collect();
        let table = serde_json::json!({"document": document, "libraries": entries});

        let path = self.work_dir.path().join("links.json");
        fs::write(&path, serde_json::to_string_pretty(&table).unwrap()).unwrap();
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
