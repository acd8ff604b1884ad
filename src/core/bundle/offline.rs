use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::archive::{
    base_game_entry, version_descriptor_entry, InstallerArchive, OFFLINE_MARKER,
};
use crate::core::downloader::{ArtifactStore, DownloadSpec};
use crate::core::error::{InstallerError, InstallerResult};

/// Base game files embedded under fixed `minecraft/...` names.
#[derive(Debug, Clone)]
pub struct BaseGameFiles {
    pub minecraft_version: String,
    pub version_descriptor: PathBuf,
    pub client_jar: PathBuf,
    pub server_jar: PathBuf,
}

/// Everything an offline bundle is assembled from.
pub struct OfflineBundle<'a> {
    /// The installer archive currently running.
    pub source: &'a Path,
    pub store: &'a ArtifactStore,
    pub libraries: &'a [DownloadSpec],
    pub base_game: &'a BaseGameFiles,
    pub generated_files: &'a BTreeSet<PathBuf>,
}

impl OfflineBundle<'_> {
    /// Write the bundle to `output`.
    ///
    /// A missing source file fails the whole build. The partially written
    /// output is left where it is.
    #[instrument(skip(self), fields(source = ?self.source))]
    pub fn build(&self, output: &Path) -> InstallerResult<PathBuf> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
        }
        if same_file(output, self.source) {
            return Err(InstallerError::Packaging(format!(
                "Refusing to overwrite the running installer {:?}",
                output
            )));
        }

        let source_file =
            File::open(self.source).map_err(|e| InstallerError::io(self.source, e))?;
        let mut source = ZipArchive::new(source_file)?;
        let prefix_len = archive_prefix_len(&mut source)?;

        let mut out = File::create(output).map_err(|e| InstallerError::io(output, e))?;
        // Executable stub in front of the archive
        if prefix_len > 0 {
            let mut stub = File::open(self.source)
                .map_err(|e| InstallerError::io(self.source, e))?
                .take(prefix_len);
            std::io::copy(&mut stub, &mut out).map_err(|e| InstallerError::io(output, e))?;
            debug!("Copied {} byte launcher stub", prefix_len);
        }

        let mut writer = BundleWriter {
            zip: ZipWriter::new(out),
            embedded: HashSet::new(),
        };

        // 1. The running installer itself
        for index in 0..source.len() {
            let entry = source.by_index_raw(index)?;
            let name = entry.name().to_string();
            if !writer.embedded.insert(name.clone()) {
                warn!("Duplicate entry {} in installer archive, keeping the first", name);
                continue;
            }
            writer.zip.raw_copy_file(entry)?;
        }
        info!("Copied {} installer entries", writer.embedded.len());

        // 2. Downloaded libraries
        for spec in self.libraries {
            let name = InstallerArchive::library_entry(&spec.relative_path());
            if writer.embedded.contains(&name) {
                debug!("Already embedded: {}", name);
                continue;
            }
            if spec.url.is_none() {
                warn!(
                    "Skipping {}: no download URL, assumed installer-generated",
                    spec.coordinate
                );
                continue;
            }
            writer.add_file(&name, &self.store.path_of(&spec.coordinate))?;
        }

        // 3. Base game files
        let version = &self.base_game.minecraft_version;
        writer.add_file(
            &version_descriptor_entry(version),
            &self.base_game.version_descriptor,
        )?;
        writer.add_file(
            &base_game_entry(version, "client.jar"),
            &self.base_game.client_jar,
        )?;
        writer.add_file(
            &base_game_entry(version, "server.jar"),
            &self.base_game.server_jar,
        )?;

        // 4. Processor outputs that live in the library repository
        for path in self.generated_files {
            let Some(relative) = library_relative_name(self.store.root(), path) else {
                warn!("Skipping generated file outside the library root: {:?}", path);
                continue;
            };
            writer.add_file(&InstallerArchive::library_entry(&relative), path)?;
        }

        // 5. Offline marker
        if writer.embedded.insert(OFFLINE_MARKER.to_string()) {
            writer
                .zip
                .start_file(OFFLINE_MARKER, SimpleFileOptions::default())?;
        }

        writer.zip.finish()?;
        info!("Offline installer written to {:?}", output);
        Ok(output.to_path_buf())
    }
}

struct BundleWriter {
    zip: ZipWriter<File>,
    embedded: HashSet<String>,
}

impl BundleWriter {
    /// Append `path` as `name` unless that name is already present.
    fn add_file(&mut self, name: &str, path: &Path) -> InstallerResult<()> {
        if self.embedded.contains(name) {
            debug!("Already embedded: {}", name);
            return Ok(());
        }
        if !path.is_file() {
            return Err(InstallerError::Packaging(format!(
                "Missing file {:?} for {}",
                path, name
            )));
        }

        let mut file = File::open(path).map_err(|e| InstallerError::io(path, e))?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(name, options)?;
        std::io::copy(&mut file, &mut self.zip).map_err(|e| InstallerError::io(path, e))?;
        self.zip.flush().map_err(|e| InstallerError::io(path, e))?;
        self.embedded.insert(name.to_string());
        debug!("Embedded {:?} as {}", path, name);
        Ok(())
    }
}

/// Bytes in front of the first local header, i.e. the executable an
/// installer archive is appended to.
fn archive_prefix_len(archive: &mut ZipArchive<File>) -> InstallerResult<u64> {
    let mut first = None::<u64>;
    for index in 0..archive.len() {
        let start = archive.by_index_raw(index)?.header_start();
        first = Some(first.map_or(start, |current| current.min(start)));
    }
    Ok(first.unwrap_or_else(|| archive.offset()))
}

/// Whether two paths name the same file once `..`, relative segments and
/// symlinks are resolved. Paths that cannot be resolved compare as written.
fn same_file(a: &Path, b: &Path) -> bool {
    match (resolve_path(a), resolve_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn resolve_path(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return Some(resolved);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(std::fs::canonicalize(parent).ok()?.join(path.file_name()?))
}

/// `/`-joined path of `path` below `root`, if it is below it.
fn library_relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
