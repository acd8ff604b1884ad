use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::{InstallerError, InstallerResult};

const DEFAULT_EXTENSION: &str = "jar";

/// Represents a fully parsed Maven coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version:classifier@extension`
///   `groupId:artifactId:version@extension`
///
/// Equality and hashing ignore whether the extension was spelled out, so
/// `a:b:1.0` and `a:b:1.0@jar` address the same file.
#[derive(Debug, Clone)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension. Defaults to `"jar"`.
    pub extension: String,
    /// Whether the descriptor carried an explicit `@extension`.
    explicit_extension: bool,
}

impl MavenArtifact {
    /// Parse a Maven coordinate string.
    ///
    /// # Examples
    /// ```
    /// use installer_lib::core::maven::MavenArtifact;
    ///
    /// let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(a.group_id, "net.sf.jopt-simple");
    /// ```
    pub fn parse(coord: &str) -> InstallerResult<Self> {
        // Split off @extension first
        let (coord_part, extension) = match coord.rfind('@') {
            Some(idx) => (&coord[..idx], Some(&coord[idx + 1..])),
            None => (coord, None),
        };

        if extension.is_some_and(|ext| ext.is_empty() || ext.contains(':')) {
            return Err(InstallerError::InvalidCoordinate(coord.to_string()));
        }

        let parts: Vec<&str> = coord_part.split(':').collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(InstallerError::InvalidCoordinate(coord.to_string()));
        }

        Ok(Self {
            group_id: parts[0].to_string(),
            artifact_id: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
            extension: extension.unwrap_or(DEFAULT_EXTENSION).to_string(),
            explicit_extension: extension.is_some(),
        })
    }

    /// Serialize back to descriptor form. Lossless for anything `parse` accepts.
    pub fn to_descriptor(&self) -> String {
        let mut out = format!("{}:{}:{}", self.group_id, self.artifact_id, self.version);
        if let Some(classifier) = &self.classifier {
            out.push(':');
            out.push_str(classifier);
        }
        if self.explicit_extension || self.extension != DEFAULT_EXTENSION {
            out.push('@');
            out.push_str(&self.extension);
        }
        out
    }

    /// Construct the group path portion (`net/sf/jopt-simple`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// Build the artifact filename.
    ///
    /// `artifactId-version[-classifier].extension`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    /// Repository-relative path, always `/`-separated.
    ///
    /// Used for URLs and for archive entry names.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_path(),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// Construct the full URL for this artifact under the given repository base.
    pub fn url(&self, repo_base: &str) -> String {
        format!("{}/{}", repo_base.trim_end_matches('/'), self.relative_path())
    }

    /// Location of this artifact inside a local repository rooted at `root`.
    ///
    /// Mirrors Maven's local repo layout:
    /// `<root>/<group_path>/<artifact_id>/<version>/<filename>`
    pub fn local_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.group_id.split('.') {
            path.push(segment);
        }
        path.join(&self.artifact_id)
            .join(&self.version)
            .join(self.filename())
    }
}

impl PartialEq for MavenArtifact {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.version == other.version
            && self.classifier == other.classifier
            && self.extension == other.extension
    }
}

impl Eq for MavenArtifact {}

impl Hash for MavenArtifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group_id.hash(state);
        self.artifact_id.hash(state);
        self.version.hash(state);
        self.classifier.hash(state);
        self.extension.hash(state);
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_descriptor())
    }
}

impl std::str::FromStr for MavenArtifact {
    type Err = InstallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MavenArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_descriptor())
    }
}

impl<'de> Deserialize<'de> for MavenArtifact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_coordinate() {
        let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(a.group_id, "net.sf.jopt-simple");
        assert_eq!(a.artifact_id, "jopt-simple");
        assert_eq!(a.version, "5.0.4");
        assert_eq!(a.classifier, None);
        assert_eq!(a.extension, "jar");
    }

    #[test]
    fn parse_with_classifier() {
        let a = MavenArtifact::parse("net.minecraft:client:1.17.1-20210706.113038:mappings@txt")
            .unwrap();
        assert_eq!(a.classifier.as_deref(), Some("mappings"));
        assert_eq!(a.extension, "txt");
    }

    #[test]
    fn parse_rejects_short_and_long_descriptors() {
        assert!(MavenArtifact::parse("only:two").is_err());
        assert!(MavenArtifact::parse("a:b:c:d:e").is_err());
        assert!(MavenArtifact::parse("a::1.0").is_err());
        assert!(MavenArtifact::parse("a:b:1.0@").is_err());
    }

    #[test]
    fn descriptor_round_trip_is_lossless() {
        for descriptor in [
            "org.example:foo:1.0",
            "org.example:foo:1.0@jar",
            "org.example:foo:1.0@zip",
            "de.oceanlabs.mcp:mcp_config:1.17.1-20210706.113038@zip",
            "net.minecraftforge:forge:1.17.1-37.0.0:universal",
            "net.minecraft:client:1.17.1:slim@jar",
        ] {
            let parsed = MavenArtifact::parse(descriptor).unwrap();
            assert_eq!(parsed.to_descriptor(), descriptor);
            assert_eq!(parsed.to_string(), descriptor);
        }
    }

    #[test]
    fn explicit_default_extension_is_same_artifact() {
        let implicit = MavenArtifact::parse("org.example:foo:1.0").unwrap();
        let explicit = MavenArtifact::parse("org.example:foo:1.0@jar").unwrap();
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn url_construction() {
        let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        let url = a.url("https://libraries.minecraft.net/");
        assert_eq!(
            url,
            "https://libraries.minecraft.net/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar"
        );
    }

    #[test]
    fn local_path_construction() {
        let a = MavenArtifact::parse("org.lwjgl:lwjgl:3.3.3:natives-windows").unwrap();
        let p = a.local_path(Path::new("libraries"));
        assert_eq!(
            p,
            Path::new("libraries")
                .join("org")
                .join("lwjgl")
                .join("lwjgl")
                .join("3.3.3")
                .join("lwjgl-3.3.3-natives-windows.jar")
        );
        assert_eq!(
            a.relative_path(),
            "org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-windows.jar"
        );
    }

    #[test]
    fn deserializes_from_descriptor_string() {
        let a: MavenArtifact = serde_json::from_str("\"org.example:foo:1.0:extra@zip\"").unwrap();
        assert_eq!(a.filename(), "foo-1.0-extra.zip");
    }
}
