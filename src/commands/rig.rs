//! Rig commands: manifest browsing and linked rig maintenance.
//!
//! Commands that change links take any [`LinkHost`]; persisting the host is
//! left to the caller.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use super::Output;
use crate::config::ResolvedSettings;
use crate::host::LinkHost;
use crate::http::Transport;
use crate::rigs::download::{RELATIVE_PREFIX, download, relativize, repoint, rig_download_dir};
use crate::rigs::{
    RigEntry, RigManifest, character_name, collection_name, get_version_from_filename,
    load_rigs_database, needs_update,
};
use crate::{Error, Result};

/// File name part of a stored library path.
fn file_name_of(stored: &str) -> &str {
    stored.rsplit(['/', '\\']).next().unwrap_or(stored)
}

/// Look up the manifest entry for a linked path.
fn rig_for_path(manifest: &RigManifest, stored: &str) -> Result<(String, RigEntry)> {
    manifest
        .find_for_file(file_name_of(stored))
        .map(|(id, entry)| (id.to_string(), entry.clone()))
        .ok_or_else(|| Error::NotFound(format!("rig matching {}", stored)))
}

fn require_linked<H: LinkHost + ?Sized>(host: &H, stored: &str) -> Result<()> {
    if host.libraries().iter().any(|l| l == stored) {
        Ok(())
    } else {
        Err(Error::NotFound(format!("linked path {}", stored)))
    }
}

/// Directory holding the file a library points at.
fn linked_file_dir<H: LinkHost + ?Sized>(host: &H, stored: &str) -> Result<PathBuf> {
    if stored.starts_with(RELATIVE_PREFIX) && host.document_path().is_none() {
        return Err(Error::DocumentNotSaved);
    }
    let resolved = host.resolve_path(stored);
    Ok(resolved
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Download `url` next to the linked file and point the library at it.
fn replace_linked<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    host: &mut H,
    stored: &str,
    url: &str,
) -> Result<(String, usize)> {
    let dest = linked_file_dir(host, stored)?;
    let downloaded = download(transport, url, &dest)?;
    let new_stored = relativize(&downloaded, host.document_dir().as_deref());
    let count = repoint(host, stored, &new_stored)?;
    Ok((new_stored, count))
}

// === List ===

#[derive(Serialize)]
pub struct RigSummary {
    pub id: String,
    pub character: String,
    pub latest_version: u32,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct RigListResult {
    pub rigs: Vec<RigSummary>,
}

impl Output for RigListResult {
    fn to_human(&self) -> String {
        if self.rigs.is_empty() {
            return "No rigs found".to_string();
        }
        let mut lines = vec![format!("{} rig(s):", self.rigs.len())];
        for rig in &self.rigs {
            let mut line = format!("  {}  v{}  ({})", rig.id, rig.latest_version, rig.character);
            if let Some(ref description) = rig.description {
                line.push_str(&format!("  {}", description));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Every rig in the manifest.
pub fn rig_list<T: Transport>(transport: &T, settings: &ResolvedSettings) -> RigListResult {
    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let rigs = manifest
        .rigs
        .iter()
        .map(|(id, entry)| RigSummary {
            id: id.clone(),
            character: character_name(id).to_string(),
            latest_version: entry.latest_version,
            description: entry.description.clone(),
        })
        .collect();
    RigListResult { rigs }
}

// === Download ===

#[derive(Serialize)]
pub struct RigDownloadResult {
    pub rig_id: String,
    pub version: u32,
    pub path: String,
}

impl Output for RigDownloadResult {
    fn to_human(&self) -> String {
        format!("Downloaded {} v{} to {}", self.rig_id, self.version, self.path)
    }
}

/// Download the latest version of a rig into the document's rig folder.
pub fn rig_download<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    settings: &ResolvedSettings,
    host: &H,
    rig_id: &str,
) -> Result<RigDownloadResult> {
    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let entry = manifest
        .rigs
        .get(rig_id)
        .ok_or_else(|| Error::NotFound(format!("rig {}", rig_id)))?;

    let dest = rig_download_dir(host.document_path(), &settings.rig_subdir.value)
        .ok_or(Error::DocumentNotSaved)?;
    let path = download(transport, &entry.download_url, &dest)?;

    Ok(RigDownloadResult {
        rig_id: rig_id.to_string(),
        version: entry.latest_version,
        path: path.display().to_string(),
    })
}

// === Link ===

#[derive(Serialize)]
pub struct RigLinkResult {
    pub rig_id: String,
    pub version: u32,
    pub collection: String,
    pub library: String,
    pub downloaded: String,
}

impl Output for RigLinkResult {
    fn to_human(&self) -> String {
        format!(
            "Linked {} from {} v{} ({})",
            self.collection, self.rig_id, self.version, self.library
        )
    }
}

/// Download the latest version of a rig and link its character collection.
pub fn rig_link<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    settings: &ResolvedSettings,
    host: &mut H,
    rig_id: &str,
) -> Result<RigLinkResult> {
    let dest = rig_download_dir(host.document_path(), &settings.rig_subdir.value)
        .ok_or(Error::DocumentNotSaved)?;

    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let entry = manifest
        .rigs
        .get(rig_id)
        .ok_or_else(|| Error::NotFound(format!("rig {}", rig_id)))?;

    let downloaded = download(transport, &entry.download_url, &dest)?;
    let library = relativize(&downloaded, host.document_dir().as_deref());
    let collection = collection_name(rig_id);
    host.link_library(&library, &collection)?;

    tracing::info!(rig = %rig_id, %collection, %library, "rig linked");
    Ok(RigLinkResult {
        rig_id: rig_id.to_string(),
        version: entry.latest_version,
        collection,
        library,
        downloaded: downloaded.display().to_string(),
    })
}

// === Status ===

#[derive(Serialize)]
pub struct RigStatus {
    pub path: String,
    pub rig_id: String,
    pub current_version: u32,
    pub latest_version: u32,
    pub update_available: bool,
}

#[derive(Serialize)]
pub struct RigStatusResult {
    pub rigs: Vec<RigStatus>,
}

impl Output for RigStatusResult {
    fn to_human(&self) -> String {
        if self.rigs.is_empty() {
            return "No linked rigs".to_string();
        }
        let mut lines = Vec::new();
        for rig in &self.rigs {
            let state = if rig.update_available {
                format!("update available: v{}", rig.latest_version)
            } else {
                "up to date".to_string()
            };
            lines.push(format!(
                "{}  v{}  {}  ({})",
                rig.rig_id, rig.current_version, state, rig.path
            ));
        }
        lines.join("\n")
    }
}

/// Linked rigs with their current and latest versions.
///
/// Each distinct stored path is reported once, in sorted order. Paths that
/// match no manifest rig are skipped.
pub fn rig_status<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    settings: &ResolvedSettings,
    host: &H,
) -> RigStatusResult {
    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let paths: BTreeSet<String> = host.libraries().into_iter().collect();

    let rigs = paths
        .into_iter()
        .filter_map(|path| {
            let filename = file_name_of(&path);
            let (_, current) = get_version_from_filename(filename);
            let (rig_id, entry) = manifest.find_for_file(filename)?;
            Some(RigStatus {
                rig_id: rig_id.to_string(),
                current_version: current,
                latest_version: entry.latest_version,
                update_available: needs_update(entry.latest_version, current),
                path,
            })
        })
        .collect();

    RigStatusResult { rigs }
}

// === Update / Switch ===

#[derive(Serialize)]
pub struct RigReplaceResult {
    pub path: String,
    pub rig_id: String,
    pub from_version: u32,
    pub to_version: String,
    pub updated: bool,
    pub new_path: Option<String>,
    pub repointed: usize,
}

impl Output for RigReplaceResult {
    fn to_human(&self) -> String {
        match self.new_path {
            Some(ref new_path) => format!(
                "{} v{} -> v{} ({} link(s) now point to {})",
                self.rig_id, self.from_version, self.to_version, self.repointed, new_path
            ),
            None => format!("{} v{} is already up to date", self.rig_id, self.from_version),
        }
    }
}

/// Replace a linked rig with the latest published version.
pub fn rig_update<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    settings: &ResolvedSettings,
    host: &mut H,
    stored: &str,
) -> Result<RigReplaceResult> {
    require_linked(host, stored)?;
    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let (rig_id, entry) = rig_for_path(&manifest, stored)?;
    let (_, current) = get_version_from_filename(file_name_of(stored));

    if !needs_update(entry.latest_version, current) {
        return Ok(RigReplaceResult {
            path: stored.to_string(),
            rig_id,
            from_version: current,
            to_version: current.to_string(),
            updated: false,
            new_path: None,
            repointed: 0,
        });
    }

    let (new_path, repointed) = replace_linked(transport, host, stored, &entry.download_url)?;
    Ok(RigReplaceResult {
        path: stored.to_string(),
        rig_id,
        from_version: current,
        to_version: entry.latest_version.to_string(),
        updated: true,
        new_path: Some(new_path),
        repointed,
    })
}

/// Switch a linked rig to a specific published version.
pub fn rig_switch<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    settings: &ResolvedSettings,
    host: &mut H,
    stored: &str,
    version: &str,
) -> Result<RigReplaceResult> {
    require_linked(host, stored)?;
    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let (rig_id, entry) = rig_for_path(&manifest, stored)?;
    let (_, current) = get_version_from_filename(file_name_of(stored));

    let url = entry
        .versions
        .get(version)
        .ok_or_else(|| Error::NotFound(format!("version {} of {}", version, rig_id)))?;

    let (new_path, repointed) = replace_linked(transport, host, stored, url)?;
    Ok(RigReplaceResult {
        path: stored.to_string(),
        rig_id,
        from_version: current,
        to_version: version.to_string(),
        updated: true,
        new_path: Some(new_path),
        repointed,
    })
}

// === Versions ===

#[derive(Serialize)]
pub struct RigVersion {
    pub version: String,
    pub url: String,
    pub current: bool,
}

#[derive(Serialize)]
pub struct RigVersionsResult {
    pub path: String,
    pub rig_id: String,
    pub current_version: u32,
    pub versions: Vec<RigVersion>,
}

impl Output for RigVersionsResult {
    fn to_human(&self) -> String {
        if self.versions.is_empty() {
            return format!("No published versions for {}", self.rig_id);
        }
        let mut lines = vec![format!("{} versions:", self.rig_id)];
        for v in &self.versions {
            let marker = if v.current { "*" } else { " " };
            lines.push(format!("{} v{}", marker, v.version));
        }
        lines.join("\n")
    }
}

/// Published versions of a linked rig, newest first.
pub fn rig_versions<T: Transport, H: LinkHost + ?Sized>(
    transport: &T,
    settings: &ResolvedSettings,
    host: &H,
    stored: &str,
) -> Result<RigVersionsResult> {
    require_linked(host, stored)?;
    let manifest = load_rigs_database(transport, &settings.manifest_url.value);
    let (rig_id, entry) = rig_for_path(&manifest, stored)?;
    let (_, current) = get_version_from_filename(file_name_of(stored));

    let versions = entry
        .versions_descending()
        .into_iter()
        .map(|(version, url)| RigVersion {
            current: version.parse::<u32>().ok() == Some(current),
            version: version.to_string(),
            url: url.to_string(),
        })
        .collect();

    Ok(RigVersionsResult {
        path: stored.to_string(),
        rig_id,
        current_version: current,
        versions,
    })
}

// === Inspect ===

#[derive(Serialize)]
pub struct RigInspectResult {
    pub filename: String,
    pub base_name: String,
    pub version: u32,
}

impl Output for RigInspectResult {
    fn to_human(&self) -> String {
        format!("{}: base {} version {}", self.filename, self.base_name, self.version)
    }
}

/// Split a rig file name into base name and version.
pub fn rig_inspect(filename: &str) -> RigInspectResult {
    let (base_name, version) = get_version_from_filename(file_name_of(filename));
    RigInspectResult {
        filename: filename.to_string(),
        base_name,
        version,
    }
}
