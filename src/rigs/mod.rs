//! Rig manifest and version bookkeeping.
//!
//! Rigs are published as versioned files listed in a JSON manifest:
//!
//! ```json
//! {
//!   "rigs": {
//!     "chr_hero_rig": {
//!       "latest_version": 5,
//!       "download_url": "https://cdn.example/chr_hero_rig_v5.blend",
//!       "versions": { "4": "https://...v4.blend", "5": "https://...v5.blend" },
//!       "description": "Main character"
//!     }
//!   }
//! }
//! ```
//!
//! The manifest is fetched on every use. A linked file is tied to a rig by
//! substring match of the rig id against the file's base name, and its
//! version is read from the `_v<N>` suffix of the file name.

pub mod download;

use std::collections::BTreeMap;
use std::io::Read;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::http::Transport;

/// Published location of the studio rig manifest
pub const DEFAULT_MANIFEST_URL: &str = "https://igormunizart.github.io/HIA/pes/rigs.json";

/// The whole manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigManifest {
    /// Rigs in document order, which decides matching
    #[serde(default)]
    pub rigs: IndexMap<String, RigEntry>,
}

/// One published rig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigEntry {
    pub latest_version: u32,
    pub download_url: String,

    /// Version string to download URL
    #[serde(default)]
    pub versions: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RigManifest {
    /// The first rig, in manifest order, whose id occurs in `base_name`.
    pub fn find_for_base_name(&self, base_name: &str) -> Option<(&str, &RigEntry)> {
        self.rigs
            .iter()
            .find(|(id, _)| base_name.contains(id.as_str()))
            .map(|(id, entry)| (id.as_str(), entry))
    }

    /// The rig a linked file belongs to, judged by its file name.
    pub fn find_for_file(&self, filename: &str) -> Option<(&str, &RigEntry)> {
        let (base_name, _) = get_version_from_filename(filename);
        self.find_for_base_name(&base_name)
    }
}

impl RigEntry {
    /// Published versions, newest first.
    ///
    /// Numeric version keys sort numerically; any non-numeric keys follow in
    /// reverse lexical order.
    pub fn versions_descending(&self) -> Vec<(&str, &str)> {
        let mut versions: Vec<(&str, &str)> = self
            .versions
            .iter()
            .map(|(v, url)| (v.as_str(), url.as_str()))
            .collect();
        versions.sort_by(|(a, _), (b, _)| match (a.parse::<u32>(), b.parse::<u32>()) {
            (Ok(a), Ok(b)) => b.cmp(&a),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => b.cmp(a),
        });
        versions
    }
}

/// Fetch the manifest from `source`.
///
/// `source` is an `http(s)://` URL or a local file path. Any failure is
/// logged and yields an empty manifest.
pub fn load_rigs_database<T: Transport>(transport: &T, source: &str) -> RigManifest {
    match fetch_manifest(transport, source) {
        Ok(manifest) => {
            tracing::debug!(count = manifest.rigs.len(), %source, "rig manifest loaded");
            manifest
        }
        Err(e) => {
            tracing::warn!(error = %e, %source, "failed to load rig manifest");
            RigManifest::default()
        }
    }
}

fn fetch_manifest<T: Transport>(transport: &T, source: &str) -> Result<RigManifest> {
    let mut body = String::new();
    if source.starts_with("http://") || source.starts_with("https://") {
        transport.get(source)?.read_to_string(&mut body)?;
    } else {
        let path = source.strip_prefix("file://").unwrap_or(source);
        body = std::fs::read_to_string(path)?;
    }
    Ok(serde_json::from_str(&body)?)
}

/// Split a rig file name into its base name and version.
///
/// `chr_hero_v3.blend` gives `("chr_hero", 3)`. Without a parseable `_v<N>`
/// suffix the whole file name is returned with version 0.
pub fn get_version_from_filename(filename: &str) -> (String, u32) {
    if let Some((base, rest)) = filename.rsplit_once("_v") {
        let digits = rest.split('.').next().unwrap_or("");
        if let Ok(version) = digits.parse::<u32>() {
            return (base.to_string(), version);
        }
    }
    (filename.to_string(), 0)
}

/// Whether a rig at `current` should be offered `latest`.
pub fn needs_update(latest: u32, current: u32) -> bool {
    latest > current
}

/// Character name embedded in a rig id (`chr_hero_rig` -> `hero`).
///
/// This is the second-to-last `_` segment; ids with no `_` are returned
/// whole.
pub fn character_name(rig_id: &str) -> &str {
    let parts: Vec<&str> = rig_id.split('_').collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2]
    } else {
        rig_id
    }
}

/// Name of the collection a rig file exposes for linking.
pub fn collection_name(rig_id: &str) -> String {
    format!("chr.{}_rig", character_name(rig_id).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeTransport;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "rigs": {
            "chr_hero_rig": {
                "latest_version": 5,
                "download_url": "https://cdn.example/chr_hero_rig_v5.blend",
                "versions": {
                    "3": "https://cdn.example/chr_hero_rig_v3.blend",
                    "10": "https://cdn.example/chr_hero_rig_v10.blend",
                    "5": "https://cdn.example/chr_hero_rig_v5.blend"
                },
                "description": "Main character"
            },
            "chr_Sidekick_rig": {
                "latest_version": 2,
                "download_url": "https://cdn.example/chr_Sidekick_rig_v2.blend"
            }
        }
    }"#;

    // ==================== Filename Parsing Tests ====================

    #[test]
    fn test_version_from_filename() {
        assert_eq!(
            get_version_from_filename("chr_hero_v3.blend"),
            ("chr_hero".to_string(), 3)
        );
        assert_eq!(
            get_version_from_filename("plain.blend"),
            ("plain.blend".to_string(), 0)
        );
    }

    #[test]
    fn test_version_uses_last_separator() {
        assert_eq!(
            get_version_from_filename("chr_vera_v12.blend"),
            ("chr_vera".to_string(), 12)
        );
    }

    #[test]
    fn test_non_numeric_version_degrades_to_zero() {
        assert_eq!(
            get_version_from_filename("chr_hero_vfinal.blend"),
            ("chr_hero_vfinal.blend".to_string(), 0)
        );
        assert_eq!(
            get_version_from_filename("chr_hero_v.blend"),
            ("chr_hero_v.blend".to_string(), 0)
        );
    }

    #[test]
    fn test_unparseable_version_always_outdated() {
        let (_, current) = get_version_from_filename("chr_hero_vwip.blend");
        assert!(needs_update(1, current));
    }

    // ==================== Update Decision Tests ====================

    #[test]
    fn test_needs_update() {
        assert!(needs_update(5, 3));
        assert!(!needs_update(3, 3));
        assert!(!needs_update(3, 4));
    }

    // ==================== Naming Tests ====================

    #[test]
    fn test_character_and_collection_names() {
        assert_eq!(character_name("chr_hero_rig"), "hero");
        assert_eq!(collection_name("chr_Sidekick_rig"), "chr.sidekick_rig");
        assert_eq!(character_name("standalone"), "standalone");
    }

    // ==================== Manifest Tests ====================

    #[test]
    fn test_manifest_parse_optional_fields() {
        let manifest: RigManifest = serde_json::from_str(MANIFEST).unwrap();
        let sidekick = &manifest.rigs["chr_Sidekick_rig"];
        assert!(sidekick.versions.is_empty());
        assert!(sidekick.description.is_none());
        assert_eq!(
            manifest.rigs["chr_hero_rig"].description.as_deref(),
            Some("Main character")
        );
    }

    #[test]
    fn test_find_for_file_matches_substring() {
        let manifest: RigManifest = serde_json::from_str(MANIFEST).unwrap();
        let (id, entry) = manifest.find_for_file("chr_hero_rig_v3.blend").unwrap();
        assert_eq!(id, "chr_hero_rig");
        assert_eq!(entry.latest_version, 5);
        assert!(manifest.find_for_file("prop_chair_v1.blend").is_none());
    }

    #[test]
    fn test_find_uses_manifest_order() {
        let manifest: RigManifest = serde_json::from_str(
            r#"{"rigs": {
                "chr_hero_rig": {"latest_version": 7, "download_url": "https://cdn.example/a.blend"},
                "chr_hero": {"latest_version": 2, "download_url": "https://cdn.example/b.blend"}
            }}"#,
        )
        .unwrap();
        let (id, entry) = manifest.find_for_file("chr_hero_rig_v3.blend").unwrap();
        assert_eq!(id, "chr_hero_rig");
        assert_eq!(entry.latest_version, 7);

        let reversed: RigManifest = serde_json::from_str(
            r#"{"rigs": {
                "chr_hero": {"latest_version": 2, "download_url": "https://cdn.example/b.blend"},
                "chr_hero_rig": {"latest_version": 7, "download_url": "https://cdn.example/a.blend"}
            }}"#,
        )
        .unwrap();
        let (id, _) = reversed.find_for_file("chr_hero_rig_v3.blend").unwrap();
        assert_eq!(id, "chr_hero");
    }

    #[test]
    fn test_versions_descending_is_numeric() {
        let manifest: RigManifest = serde_json::from_str(MANIFEST).unwrap();
        let order: Vec<&str> = manifest.rigs["chr_hero_rig"]
            .versions_descending()
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        assert_eq!(order, vec!["10", "5", "3"]);
    }

    #[test]
    fn test_load_from_http() {
        let url = "https://cdn.example/rigs.json";
        let transport = FakeTransport::new().serve(url, MANIFEST);
        let manifest = load_rigs_database(&transport, url);
        assert_eq!(manifest.rigs.len(), 2);
    }

    #[test]
    fn test_load_failure_is_empty() {
        let transport = FakeTransport::new().serve("https://cdn.example/bad.json", "{not json");
        assert!(load_rigs_database(&transport, "https://cdn.example/bad.json")
            .rigs
            .is_empty());
        assert!(load_rigs_database(&transport, "https://cdn.example/missing.json")
            .rigs
            .is_empty());
    }

    #[test]
    fn test_load_from_local_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rigs.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let transport = FakeTransport::new();
        let manifest = load_rigs_database(&transport, path.to_str().unwrap());

        assert_eq!(manifest.rigs.len(), 2);
        assert_eq!(transport.total_requests(), 0);
    }
}
