use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::maven::MavenArtifact;

/// A library the installer needs on disk.
///
/// `url == None` means there is no network source: the file has to come from
/// the installer bundle or be produced by a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
    pub coordinate: MavenArtifact,
    pub url: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    /// Declared repository-relative path, overriding the derived one.
    pub path: Option<String>,
}

impl DownloadSpec {
    /// Repository-relative path, `/`-separated.
    pub fn relative_path(&self) -> String {
        match &self.path {
            Some(path) => path.trim_start_matches('/').to_string(),
            None => self.coordinate.relative_path(),
        }
    }

    /// Target file under a library root.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .fold(root.to_path_buf(), |acc, segment| acc.join(segment)),
            None => self.coordinate.local_path(root),
        }
    }
}

/// Coordinate → local file mapping for one run.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    entries: HashMap<MavenArtifact, PathBuf>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: HashMap::new(),
        }
    }

    /// Library root the store lays files out under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn insert(&mut self, artifact: MavenArtifact, path: PathBuf) {
        self.entries.insert(artifact, path);
    }

    /// Recorded location, falling back to the derived repository layout.
    pub fn path_of(&self, artifact: &MavenArtifact) -> PathBuf {
        self.entries
            .get(artifact)
            .cloned()
            .unwrap_or_else(|| artifact.local_path(&self.root))
    }
}

/// Outcome of the download phase plus anything processors generated.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunResult {
    pub succeeded: Vec<MavenArtifact>,
    pub failed: Vec<MavenArtifact>,
    pub skipped: Vec<MavenArtifact>,
    pub generated_files: BTreeSet<PathBuf>,
}

impl RunResult {
    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(MavenArtifact::to_descriptor).collect()
    }
}
