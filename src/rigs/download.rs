//! Fetching rig files and rewriting linked paths.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::host::LinkHost;
use crate::http::Transport;
use crate::{Error, Result};

/// Prefix marking a stored path as relative to the document directory
pub const RELATIVE_PREFIX: &str = "//";

/// Where rigs land, relative to the folder above the document's folder
pub const DEFAULT_RIG_SUBDIR: &str = "0_IN/3_RIGs";

const CHUNK_SIZE: usize = 8192;

/// Last path segment of a URL, without the query string.
pub fn filename_from_url(url: &str) -> &str {
    let last = url.rsplit('/').next().unwrap_or(url);
    last.split('?').next().unwrap_or(last)
}

/// Download `url` into `dest_dir`, overwriting any file of the same name.
///
/// The directory is created if needed. The response is streamed to disk in
/// 8 KiB chunks, and the target file is not touched if the request fails.
pub fn download<T: Transport + ?Sized>(transport: &T, url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let filename = filename_from_url(url);
    if filename.is_empty() {
        return Err(Error::InvalidInput(format!(
            "download URL has no file name: {}",
            url
        )));
    }

    fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(filename);

    tracing::info!(%url, dest = %path.display(), "downloading rig");
    let mut reader = transport.get(url)?;
    let mut file = File::create(&path)?;

    let mut buf = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(&buf[..n])?;
        written += n as u64;
    }
    file.flush()?;

    tracing::debug!(bytes = written, path = %path.display(), "download complete");
    Ok(path)
}

/// Folder a document's rigs are downloaded into.
///
/// This is `subdir` under the grandparent of the document. `None` when the
/// document has not been saved.
pub fn rig_download_dir(document: Option<&Path>, subdir: &str) -> Option<PathBuf> {
    let parent = document?.parent()?;
    let base = parent.parent().unwrap_or(parent);
    Some(base.join(subdir))
}

/// Express `path` relative to `reference_dir` with the `//` prefix.
///
/// The path is returned unchanged when there is no reference directory or
/// when the two cannot be related (different drives, empty input).
/// Separators in the result are always `/`.
pub fn relativize(path: &Path, reference_dir: Option<&Path>) -> String {
    let unchanged = || path.to_string_lossy().into_owned();

    let Some(reference_dir) = reference_dir else {
        return unchanged();
    };
    let (Ok(target), Ok(base)) = (std::path::absolute(path), std::path::absolute(reference_dir))
    else {
        return unchanged();
    };

    let target = normalize(&target);
    let base = normalize(&base);
    if root_of(&target) != root_of(&base) {
        return unchanged();
    }

    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat_n("..".to_string(), base.len() - common));
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let relative = if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    };
    format!("{}{}", RELATIVE_PREFIX, relative)
}

/// Remove `.` and fold `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn root_of(path: &Path) -> Option<Component<'_>> {
    path.components()
        .find(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
}

/// Point every library stored exactly as `old_path` to `new_path` and
/// reload it. Returns how many libraries changed.
pub fn repoint<H: LinkHost + ?Sized>(host: &mut H, old_path: &str, new_path: &str) -> Result<usize> {
    let matching: Vec<usize> = host
        .libraries()
        .iter()
        .enumerate()
        .filter(|(_, stored)| stored.as_str() == old_path)
        .map(|(index, _)| index)
        .collect();

    for &index in &matching {
        host.set_library_path(index, new_path)?;
        host.reload_library(index)?;
    }

    tracing::info!(count = matching.len(), from = %old_path, to = %new_path, "libraries repointed");
    Ok(matching.len())
}
