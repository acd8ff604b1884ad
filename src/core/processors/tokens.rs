use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::core::bundle::InstallerArchive;
use crate::core::downloader::ArtifactStore;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::maven::MavenArtifact;
use crate::core::Side;

/// Expand `{KEY}`, `'literal'` and `\x` escapes in `template`.
///
/// An unknown key is a [`InstallerError::MissingToken`]; a dangling escape or
/// an unclosed `{`/`'` is a [`InstallerError::Parse`].
pub fn replace_tokens(template: &str, tokens: &BTreeMap<String, String>) -> InstallerResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(escaped(&mut chars, template)?),
            '{' | '\'' => {
                let close = if c == '{' { '}' } else { '\'' };
                let mut key = String::new();
                let mut closed = false;
                while let Some(d) = chars.next() {
                    if d == '\\' {
                        key.push(escaped(&mut chars, template)?);
                    } else if d == close {
                        closed = true;
                        break;
                    } else {
                        key.push(d);
                    }
                }
                if !closed {
                    return Err(InstallerError::Parse(format!(
                        "Unclosed {} in {:?}",
                        c, template
                    )));
                }

                if c == '\'' {
                    out.push_str(&key);
                } else {
                    let value = tokens.get(&key).ok_or_else(|| InstallerError::MissingToken {
                        key: key.clone(),
                        template: template.to_string(),
                    })?;
                    out.push_str(value);
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn escaped(chars: &mut std::str::Chars<'_>, template: &str) -> InstallerResult<char> {
    chars
        .next()
        .ok_or_else(|| InstallerError::Parse(format!("Trailing escape in {:?}", template)))
}

/// `[group:name:version]` written as a whole argument.
fn bracketed_coordinate(raw: &str) -> Option<&str> {
    raw.strip_prefix('[').and_then(|s| s.strip_suffix(']'))
}

/// Absolute path of an artifact reference through the store, or `None` if
/// `raw` is not a `[coordinate]`.
pub fn artifact_reference(raw: &str, store: &ArtifactStore) -> InstallerResult<Option<PathBuf>> {
    match bracketed_coordinate(raw) {
        Some(coord) => Ok(Some(store.path_of(&MavenArtifact::parse(coord)?))),
        None => Ok(None),
    }
}

/// Fixed values every pipeline run sees regardless of the profile.
#[derive(Debug, Clone)]
pub struct FixedTokens<'a> {
    pub side: Side,
    pub minecraft_jar: &'a Path,
    pub minecraft_version: &'a str,
    pub root: &'a Path,
    pub installer: &'a Path,
    pub library_dir: &'a Path,
}

/// Materialized data tokens for one pipeline run.
///
/// Bundled resources referenced by the profile data are extracted into a
/// scratch directory that lives as long as the table.
#[derive(Debug)]
pub struct TokenTable {
    values: BTreeMap<String, String>,
    _scratch: Option<TempDir>,
}

impl TokenTable {
    /// Plain table, no bundle resources involved.
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            _scratch: None,
        }
    }

    /// Resolve every raw data value and add the fixed tokens.
    ///
    /// `[coordinate]` becomes an artifact path, `'literal'` is unquoted and
    /// anything else names a resource inside the installer archive.
    pub fn materialize(
        data: &BTreeMap<String, String>,
        archive: &InstallerArchive,
        store: &ArtifactStore,
        fixed: &FixedTokens<'_>,
    ) -> InstallerResult<Self> {
        let mut values = BTreeMap::new();
        let mut scratch: Option<TempDir> = None;

        for (key, raw) in data {
            let value = if let Some(path) = artifact_reference(raw, store)? {
                path_string(&path)
            } else if let Some(literal) = raw
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
            {
                literal.to_string()
            } else {
                let dir = match &scratch {
                    Some(dir) => dir.path().to_path_buf(),
                    None => {
                        let created = tempfile::Builder::new()
                            .prefix("installer-data")
                            .tempdir()
                            .map_err(|e| InstallerError::io(std::env::temp_dir(), e))?;
                        let path = created.path().to_path_buf();
                        scratch = Some(created);
                        path
                    }
                };
                let mut target = dir;
                for segment in raw.split('/') {
                    match segment {
                        "" => {}
                        ".." => {
                            return Err(InstallerError::Parse(format!(
                                "Data token {} path {} leaves the extraction directory",
                                key, raw
                            )))
                        }
                        _ => target.push(segment),
                    }
                }
                if !archive.extract_to(raw, &target)? {
                    return Err(InstallerError::Other(format!(
                        "Data token {} refers to {} which is not in the installer",
                        key, raw
                    )));
                }
                path_string(&target)
            };
            debug!("Token {} = {}", key, value);
            values.insert(key.clone(), value);
        }

        values.insert("SIDE".into(), fixed.side.as_str().to_string());
        values.insert("MINECRAFT_JAR".into(), path_string(fixed.minecraft_jar));
        values.insert("MINECRAFT_VERSION".into(), fixed.minecraft_version.to_string());
        values.insert("ROOT".into(), path_string(fixed.root));
        values.insert("INSTALLER".into(), path_string(fixed.installer));
        values.insert("LIBRARY_DIR".into(), path_string(fixed.library_dir));

        Ok(Self {
            values,
            _scratch: scratch,
        })
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Substitute one processor argument or output template.
    pub fn substitute(&self, raw: &str, store: &ArtifactStore) -> InstallerResult<String> {
        match artifact_reference(raw, store)? {
            Some(path) => Ok(path_string(&path)),
            None => replace_tokens(raw, &self.values),
        }
    }
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
