use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::downloader::DownloadSpec;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::MavenArtifact;
use crate::core::version::LibraryEntry;

/// Which half of the game is being installed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `install_profile.json` as shipped inside the installer bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallProfile {
    #[serde(default)]
    pub spec: u32,
    /// Launcher profile name.
    pub profile: String,
    /// Version id the loader installs as (`1.17.1-forge-37.0.0`).
    pub version: String,
    /// Base game version the loader sits on.
    pub minecraft: String,
    /// Main loader artifact, also embedded under `maven/`.
    pub path: Option<MavenArtifact>,
    /// Archive path of the loader version JSON.
    pub json: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub welcome: Option<String>,
    #[serde(default)]
    pub mirror_list: Option<String>,
    #[serde(default)]
    pub server_jar_path: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub processors: Vec<ProcessorSpec>,
    #[serde(default)]
    pub data: BTreeMap<String, DataEntry>,
}

/// A single post-install tool invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorSpec {
    pub jar: MavenArtifact,
    #[serde(default)]
    pub classpath: Vec<MavenArtifact>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Output template → expected sha1 template.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub sides: Option<Vec<Side>>,
}

impl ProcessorSpec {
    pub fn applies_to(&self, side: Side) -> bool {
        self.sides
            .as_ref()
            .map_or(true, |sides| sides.contains(&side))
    }
}

/// Raw data token, either shared by both sides or split per side.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataEntry {
    Sided { client: String, server: String },
    Shared(String),
}

impl DataEntry {
    pub fn for_side(&self, side: Side) -> &str {
        match self {
            DataEntry::Sided { client, server } => match side {
                Side::Client => client,
                Side::Server => server,
            },
            DataEntry::Shared(value) => value,
        }
    }
}

/// Loader version JSON (the file named by `InstallProfile::json`).
///
/// Only the parts the installer needs; the raw text is written to disk as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderVersionJson {
    pub id: String,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
}

impl InstallProfile {
    pub fn parse(raw: &str) -> InstallerResult<Self> {
        serde_json::from_str(raw).map_err(InstallerError::from)
    }

    /// Download specs for the libraries the profile itself declares.
    pub fn library_specs(&self) -> InstallerResult<Vec<DownloadSpec>> {
        self.libraries
            .iter()
            .map(LibraryEntry::to_download_spec)
            .collect()
    }

    /// Data tokens resolved to the raw template for `side`.
    pub fn data_for(&self, side: Side) -> BTreeMap<String, String> {
        self.data
            .iter()
            .map(|(key, entry)| (key.clone(), entry.for_side(side).to_string()))
            .collect()
    }

    /// Archive entry name of the loader version JSON.
    pub fn json_entry(&self) -> &str {
        self.json.trim_start_matches('/')
    }

    /// Server jar location template, relative tokens allowed.
    pub fn server_jar_template(&self) -> &str {
        self.server_jar_path
            .as_deref()
            .unwrap_or("{ROOT}/minecraft_server.{MINECRAFT_VERSION}.jar")
    }
}

impl LoaderVersionJson {
    pub fn parse(raw: &str) -> InstallerResult<Self> {
        serde_json::from_str(raw).map_err(InstallerError::from)
    }

    pub fn library_specs(&self) -> InstallerResult<Vec<DownloadSpec>> {
        self.libraries
            .iter()
            .map(LibraryEntry::to_download_spec)
            .collect()
    }
}

/// Merge library lists, keeping the first occurrence of each coordinate.
pub fn merge_library_specs(lists: Vec<Vec<DownloadSpec>>) -> Vec<DownloadSpec> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for spec in lists.into_iter().flatten() {
        if seen.insert(spec.coordinate.clone()) {
            merged.push(spec);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"{
        "spec": 1,
        "profile": "forge",
        "version": "1.17.1-forge-37.0.0",
        "icon": "data:image/png;base64,AAAA",
        "json": "/version.json",
        "path": "net.minecraftforge:forge:1.17.1-37.0.0",
        "logo": "/big_logo.png",
        "minecraft": "1.17.1",
        "welcome": "Welcome to the simple Forge installer.",
        "mirrorList": "https://files.minecraftforge.net/mirrors-2.0.json",
        "data": {
            "MAPPINGS": {
                "client": "[de.oceanlabs.mcp:mcp_config:1.17.1-20210706.113038:mappings@txt]",
                "server": "[de.oceanlabs.mcp:mcp_config:1.17.1-20210706.113038:mappings@txt]"
            },
            "BINPATCH": {"client": "/data/client.lzma", "server": "/data/server.lzma"},
            "MCP_VERSION": "'20210706.113038'"
        },
        "processors": [
            {
                "sides": ["server"],
                "jar": "net.minecraftforge:installertools:1.2.6",
                "classpath": ["net.md-5:SpecialSource:1.9.1"],
                "args": ["--task", "EXTRACT_FILES", "--archive", "{INSTALLER}"]
            },
            {
                "jar": "net.minecraftforge:binarypatcher:1.0.12",
                "classpath": [],
                "args": ["--clean", "{MC_SRG}", "--output", "{PATCHED}"],
                "outputs": {"{PATCHED}": "{PATCHED_SHA}"}
            }
        ],
        "libraries": [
            {
                "name": "net.minecraftforge:installertools:1.2.6",
                "downloads": {"artifact": {
                    "path": "net/minecraftforge/installertools/1.2.6/installertools-1.2.6.jar",
                    "url": "https://maven.minecraftforge.net/net/minecraftforge/installertools/1.2.6/installertools-1.2.6.jar",
                    "sha1": "8ae6a3dde2e1ff7bbd0e2ec4a43e4b4cac7ae9ee",
                    "size": 1
                }}
            }
        ]
    }"#;

    #[test]
    fn parses_install_profile() {
        let profile = InstallProfile::parse(PROFILE).unwrap();
        assert_eq!(profile.minecraft, "1.17.1");
        assert_eq!(profile.json_entry(), "version.json");
        assert_eq!(
            profile.path.as_ref().unwrap().to_descriptor(),
            "net.minecraftforge:forge:1.17.1-37.0.0"
        );
        assert_eq!(profile.library_specs().unwrap().len(), 1);
    }

    #[test]
    fn data_selects_side_value_or_shared() {
        let profile = InstallProfile::parse(PROFILE).unwrap();
        let client = profile.data_for(Side::Client);
        let server = profile.data_for(Side::Server);
        assert_eq!(client["BINPATCH"], "/data/client.lzma");
        assert_eq!(server["BINPATCH"], "/data/server.lzma");
        assert_eq!(client["MCP_VERSION"], "'20210706.113038'");
    }

    #[test]
    fn processors_are_filtered_by_side() {
        let profile = InstallProfile::parse(PROFILE).unwrap();
        let client: Vec<_> = profile
            .processors
            .iter()
            .filter(|p| p.applies_to(Side::Client))
            .collect();
        let server = profile
            .processors
            .iter()
            .filter(|p| p.applies_to(Side::Server))
            .count();
        assert_eq!(client.len(), 1);
        assert_eq!(server, 2);
        assert_eq!(client[0].outputs["{PATCHED}"], "{PATCHED_SHA}");
    }

    #[test]
    fn server_jar_template_has_default() {
        let profile = InstallProfile::parse(PROFILE).unwrap();
        assert_eq!(
            profile.server_jar_template(),
            "{ROOT}/minecraft_server.{MINECRAFT_VERSION}.jar"
        );
    }

    #[test]
    fn merge_keeps_first_occurrence() {
        let spec = |name: &str, url: Option<&str>| DownloadSpec {
            coordinate: MavenArtifact::parse(name).unwrap(),
            url: url.map(str::to_string),
            sha1: None,
            size: None,
            path: None,
        };
        let merged = merge_library_specs(vec![
            vec![spec("a:b:1.0", Some("https://one"))],
            vec![spec("a:b:1.0@jar", Some("https://two")), spec("c:d:2.0", None)],
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url.as_deref(), Some("https://one"));
    }
}
