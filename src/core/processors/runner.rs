use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::core::error::{InstallerError, InstallerResult};

/// A fully resolved tool call: nothing left to substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Descriptor of the tool jar, used in logs and errors.
    pub tool: String,
    pub main_class: String,
    /// Tool jar first, then its declared classpath. Nothing else.
    pub classpath: Vec<PathBuf>,
    pub args: Vec<String>,
}

/// Executes post-install tools.
pub trait ToolRunner {
    /// Run to completion. A non-success outcome is
    /// [`InstallerError::ToolExecution`].
    fn run(&self, invocation: &ToolInvocation) -> InstallerResult<()>;
}

/// Runs tools as `java -cp <classpath> <Main-Class> args...` subprocesses.
#[derive(Debug, Clone)]
pub struct JavaToolRunner {
    java: PathBuf,
    working_dir: Option<PathBuf>,
}

impl JavaToolRunner {
    pub fn new(java: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ToolRunner for JavaToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> InstallerResult<()> {
        let classpath = invocation
            .classpath
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(if cfg!(windows) { ";" } else { ":" });

        info!(
            "Running processor {} with main class {}",
            invocation.tool, invocation.main_class
        );
        debug!("Processor args: {:?}", invocation.args);

        let mut command = Command::new(&self.java);
        command
            .env_remove("CLASSPATH")
            .arg("-cp")
            .arg(&classpath)
            .arg(&invocation.main_class)
            .args(&invocation.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| InstallerError::ToolExecution {
            tool: invocation.tool.clone(),
            message: format!("Could not start {:?}: {}", self.java, e),
        })?;

        if !output.status.success() {
            return Err(InstallerError::ToolExecution {
                tool: invocation.tool.clone(),
                message: format!(
                    "exit code {:?}\nSTDOUT:\n{}\nSTDERR:\n{}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(())
    }
}

/// Entry point declared by a jar's `META-INF/MANIFEST.MF`.
pub fn read_main_class_from_jar(path: &Path) -> InstallerResult<String> {
    let file = std::fs::File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut manifest = archive.by_name("META-INF/MANIFEST.MF").map_err(|e| {
        InstallerError::Parse(format!("Manifest not found in {}: {}", path.display(), e))
    })?;

    let mut text = String::new();
    manifest
        .read_to_string(&mut text)
        .map_err(|e| InstallerError::io(path, e))?;

    main_class_from_manifest(&text).ok_or_else(|| {
        InstallerError::Parse(format!("Main-Class missing in {}", path.display()))
    })
}

fn main_class_from_manifest(text: &str) -> Option<String> {
    let mut main_class: Option<String> = None;
    let mut in_main_class = false;
    for line in text.lines() {
        // Continuation lines start with a single space.
        if let Some(rest) = line.strip_prefix(' ') {
            if in_main_class {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        in_main_class = false;
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "Main-Class" {
                in_main_class = true;
                main_class = Some(value.trim().to_string());
            }
        }
    }
    main_class.filter(|value| !value.is_empty())
}

/// Java launcher named by `explicit`, else `$JAVA_HOME/bin/java`, else `java`
/// from `PATH`.
pub fn resolve_java_binary(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(home) = std::env::var_os("JAVA_HOME") {
        let candidate = PathBuf::from(home).join("bin").join(java_exe());
        if candidate.is_file() {
            return candidate;
        }
    }
    PathBuf::from(java_exe())
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bundle::archive::tests::create_test_zip;

    #[test]
    fn reads_main_class_with_continuation() {
        let manifest = "Manifest-Version: 1.0\r\nMain-Class: net.minecraftforge.install\r\n er.SimpleInstaller\r\nCreated-By: test\r\n";
        assert_eq!(
            main_class_from_manifest(manifest).as_deref(),
            Some("net.minecraftforge.installer.SimpleInstaller")
        );
    }

    #[test]
    fn manifest_without_main_class() {
        assert_eq!(main_class_from_manifest("Manifest-Version: 1.0\n"), None);
    }

    #[test]
    fn main_class_is_read_from_jar() {
        let temp = tempfile::TempDir::new().unwrap();
        let jar = temp.path().join("tool.jar");
        create_test_zip(
            &jar,
            &[(
                "META-INF/MANIFEST.MF",
                b"Manifest-Version: 1.0\nMain-Class: org.example.Tool\n",
            )],
        );
        assert_eq!(read_main_class_from_jar(&jar).unwrap(), "org.example.Tool");

        let bare = temp.path().join("bare.jar");
        create_test_zip(&bare, &[("a.txt", b"x")]);
        assert!(matches!(
            read_main_class_from_jar(&bare),
            Err(InstallerError::Parse(_))
        ));
    }

    #[test]
    fn explicit_java_wins() {
        let explicit = Path::new("/opt/jdk/bin/java");
        assert_eq!(resolve_java_binary(Some(explicit)), explicit);
    }

    #[test]
    fn missing_java_binary_is_tool_execution_error() {
        let runner = JavaToolRunner::new("/definitely/not/a/java/binary");
        let invocation = ToolInvocation {
            tool: "org.example:tool:1.0".into(),
            main_class: "org.example.Tool".into(),
            classpath: vec![PathBuf::from("tool.jar")],
            args: vec![],
        };
        match runner.run(&invocation) {
            Err(InstallerError::ToolExecution { tool, .. }) => {
                assert_eq!(tool, "org.example:tool:1.0")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
