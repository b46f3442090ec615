//! The host document's linked libraries.
//!
//! The editor that owns the document decides how libraries are stored and
//! reloaded. [`LinkHost`] is the seam trackrig needs from it; [`LinkTable`]
//! implements it on top of a JSON sidecar file so the CLI can drive the same
//! workflows:
//!
//! ```json
//! {
//!   "document": "/projects/alpha/3_ANIM/sh010.blend",
//!   "libraries": [
//!     { "filepath": "//../0_IN/3_RIGs/chr_hero_rig_v3.blend", "collections": ["chr.hero_rig"] }
//!   ]
//! }
//! ```
//!
//! Stored paths starting with `//` are relative to the document directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rigs::download::RELATIVE_PREFIX;
use crate::{Error, Result};

/// Operations trackrig needs from the document that links rig files.
pub trait LinkHost {
    /// Where the document is saved, or `None` if it never was.
    fn document_path(&self) -> Option<&Path>;

    /// Stored paths of every linked library, by index.
    fn libraries(&self) -> Vec<String>;

    /// Point the library at `index` to a new stored path.
    fn set_library_path(&mut self, index: usize, path: &str) -> Result<()>;

    /// Re-read the library at `index` from disk.
    fn reload_library(&mut self, index: usize) -> Result<()>;

    /// Link `collection` from the file at `path`, adding the library if new.
    fn link_library(&mut self, path: &str, collection: &str) -> Result<()>;

    /// Directory the document lives in.
    fn document_dir(&self) -> Option<PathBuf> {
        self.document_path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }

    /// Turn a stored path into a filesystem path.
    fn resolve_path(&self, stored: &str) -> PathBuf {
        match (stored.strip_prefix(RELATIVE_PREFIX), self.document_dir()) {
            (Some(relative), Some(dir)) => dir.join(relative),
            _ => PathBuf::from(stored),
        }
    }
}

/// A library entry in a [`LinkTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedLibrary {
    /// Path as stored by the document (absolute or `//`-relative)
    pub filepath: String,

    /// Collections linked from this file
    #[serde(default)]
    pub collections: Vec<String>,

    /// When the library was last reloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reloaded_at: Option<DateTime<Utc>>,
}

/// JSON-backed [`LinkHost`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,

    #[serde(default)]
    pub libraries: Vec<LinkedLibrary>,

    #[serde(skip)]
    path: PathBuf,
}

impl LinkTable {
    /// An empty table that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>, document: Option<PathBuf>) -> Self {
        Self {
            document,
            libraries: Vec::new(),
            path: path.into(),
        }
    }

    /// Load a table, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::new(path, None));
        }

        let content = fs::read_to_string(&path)?;
        let mut table: LinkTable = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("invalid link table {}: {}", path.display(), e))
        })?;
        table.path = path;
        Ok(table)
    }

    /// Write the table back to where it was opened from.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record where the document is saved.
    pub fn set_document(&mut self, document: PathBuf) {
        self.document = Some(document);
    }

    fn library_mut(&mut self, index: usize) -> Result<&mut LinkedLibrary> {
        self.libraries
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("library #{}", index)))
    }
}

impl LinkHost for LinkTable {
    fn document_path(&self) -> Option<&Path> {
        self.document.as_deref()
    }

    fn libraries(&self) -> Vec<String> {
        self.libraries.iter().map(|l| l.filepath.clone()).collect()
    }

    fn set_library_path(&mut self, index: usize, path: &str) -> Result<()> {
        self.library_mut(index)?.filepath = path.to_string();
        Ok(())
    }

    fn reload_library(&mut self, index: usize) -> Result<()> {
        let stored = self.library_mut(index)?.filepath.clone();
        let resolved = self.resolve_path(&stored);
        if !resolved.is_file() {
            return Err(Error::NotFound(format!(
                "linked file {} ({})",
                stored,
                resolved.display()
            )));
        }
        self.library_mut(index)?.reloaded_at = Some(Utc::now());
        tracing::debug!(library = %stored, "library reloaded");
        Ok(())
    }

    fn link_library(&mut self, path: &str, collection: &str) -> Result<()> {
        if let Some(library) = self.libraries.iter_mut().find(|l| l.filepath == path) {
            if !library.collections.iter().any(|c| c == collection) {
                library.collections.push(collection.to_string());
            }
            return Ok(());
        }

        self.libraries.push(LinkedLibrary {
            filepath: path.to_string(),
            collections: vec![collection.to_string()],
            reloaded_at: None,
        });
        Ok(())
    }
}
