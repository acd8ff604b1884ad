use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::MavenArtifact;

/// Entry whose presence forces every run of the archive into offline mode.
pub const OFFLINE_MARKER: &str = "offline.txt";
/// Archive entry holding the install manifest.
pub const INSTALL_PROFILE_ENTRY: &str = "install_profile.json";
/// Prefix under which library artifacts are embedded.
pub const MAVEN_PREFIX: &str = "maven/";

/// Read-only view of the installer bundle.
///
/// The entry listing is captured once; each read reopens the file, so the
/// handle can be shared by reference without interior mutability.
#[derive(Debug, Clone)]
pub struct InstallerArchive {
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl InstallerArchive {
    pub fn open(path: &Path) -> InstallerResult<Self> {
        let archive = open_zip(path)?;
        let entries: BTreeSet<String> = archive.file_names().map(str::to_string).collect();
        debug!("Opened installer archive {:?} ({} entries)", path, entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(normalize_entry(name))
    }

    /// Whether this archive was produced as an offline bundle.
    pub fn is_offline_forced(&self) -> bool {
        self.contains(OFFLINE_MARKER)
    }

    pub fn read_string(&self, name: &str) -> InstallerResult<String> {
        let mut archive = open_zip(&self.path)?;
        let mut file = archive.by_name(normalize_entry(name)).map_err(|e| {
            InstallerError::Parse(format!("Missing {} in installer archive: {}", name, e))
        })?;
        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| InstallerError::io(&self.path, e))?;
        Ok(text)
    }

    /// Copy an entry to `dest`, creating parent directories.
    ///
    /// Returns `false` when the archive has no such entry.
    pub fn extract_to(&self, name: &str, dest: &Path) -> InstallerResult<bool> {
        let name = normalize_entry(name);
        if !self.entries.contains(name) {
            return Ok(false);
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
        }

        let mut archive = open_zip(&self.path)?;
        let mut zipped = archive.by_name(name)?;
        let mut out = File::create(dest).map_err(|e| InstallerError::io(dest, e))?;
        if let Err(e) = std::io::copy(&mut zipped, &mut out) {
            drop(out);
            let _ = std::fs::remove_file(dest);
            return Err(InstallerError::io(dest, e));
        }

        debug!("Extracted {} -> {:?}", name, dest);
        Ok(true)
    }

    /// Embedded copy of a library artifact, if any.
    pub fn library_entry(relative_path: &str) -> String {
        format!("{}{}", MAVEN_PREFIX, relative_path.trim_start_matches('/'))
    }

    /// Copy out the embedded copy of `artifact`.
    pub fn extract_artifact(&self, artifact: &MavenArtifact, dest: &Path) -> InstallerResult<bool> {
        self.extract_to(&Self::library_entry(&artifact.relative_path()), dest)
    }
}

/// Fixed archive names used for the base game files of an offline bundle.
pub fn base_game_entry(minecraft_version: &str, file: &str) -> String {
    format!("minecraft/{}/{}", minecraft_version, file)
}

pub fn version_descriptor_entry(minecraft_version: &str) -> String {
    format!("minecraft/{}.json", minecraft_version)
}

fn normalize_entry(name: &str) -> &str {
    name.trim_start_matches('/')
}

fn open_zip(path: &Path) -> InstallerResult<zip::ZipArchive<File>> {
    let file = File::open(path).map_err(|e| InstallerError::io(path, e))?;
    Ok(zip::ZipArchive::new(file)?)
}
