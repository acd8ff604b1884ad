use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use super::runner::{read_main_class_from_jar, ToolInvocation, ToolRunner};
use super::tokens::{artifact_reference, path_string, replace_tokens, TokenTable};
use crate::core::downloader::checksum::{existing_file_is_valid, verify_or_delete};
use crate::core::downloader::ArtifactStore;
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::profile::ProcessorSpec;
use crate::core::Side;

/// Runs post-install processors in declared order, stopping at the first
/// failure. Nothing already written is rolled back.
pub struct ProcessorPipeline<'a> {
    runner: &'a dyn ToolRunner,
    store: &'a ArtifactStore,
    tokens: &'a TokenTable,
    cancel: &'a AtomicBool,
}

impl<'a> ProcessorPipeline<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        store: &'a ArtifactStore,
        tokens: &'a TokenTable,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            runner,
            store,
            tokens,
            cancel,
        }
    }

    /// Returns every file the processors produced.
    #[instrument(skip_all, fields(side = %side, count = processors.len()))]
    pub fn run(&self, processors: &[ProcessorSpec], side: Side) -> InstallerResult<BTreeSet<PathBuf>> {
        let mut generated = BTreeSet::new();
        let total = processors.len();

        for (index, processor) in processors.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(InstallerError::Cancelled);
            }
            if !processor.applies_to(side) {
                debug!("Processor {} does not run on {}", processor.jar, side);
                continue;
            }

            info!("Processor {}/{}: {}", index + 1, total, processor.jar);
            self.run_one(processor, &mut generated)?;
        }

        info!("Processors finished, {} generated files", generated.len());
        Ok(generated)
    }

    fn run_one(
        &self,
        processor: &ProcessorSpec,
        generated: &mut BTreeSet<PathBuf>,
    ) -> InstallerResult<()> {
        let tool = processor.jar.to_descriptor();

        let mut outputs = Vec::with_capacity(processor.outputs.len());
        for (key, sha1) in &processor.outputs {
            outputs.push((
                PathBuf::from(self.tokens.substitute(key, self.store)?),
                self.tokens.substitute(sha1, self.store)?,
            ));
        }

        if !outputs.is_empty() {
            let mut current = true;
            for (path, sha1) in &outputs {
                // Checks every output so stale ones are all removed.
                current &= existing_file_is_valid(path, Some(sha1))?;
            }
            if current {
                info!("Processor {} is up to date", tool);
                generated.extend(outputs.into_iter().map(|(path, _)| path));
                return Ok(());
            }
        }

        let jar = self.store.path_of(&processor.jar);
        if !jar.is_file() {
            return Err(InstallerError::MissingDependency { tool, path: jar });
        }
        let mut classpath = vec![jar.clone()];
        for entry in &processor.classpath {
            let path = self.store.path_of(entry);
            if !path.is_file() {
                return Err(InstallerError::MissingDependency { tool, path });
            }
            classpath.push(path);
        }
        let main_class = read_main_class_from_jar(&jar)?;

        let mut args = Vec::with_capacity(processor.args.len());
        let mut referenced = Vec::new();
        for raw in &processor.args {
            match artifact_reference(raw, self.store)? {
                Some(path) => {
                    args.push(path_string(&path));
                    let existed = path.exists();
                    referenced.push((path, existed));
                }
                None => args.push(replace_tokens(raw, self.tokens.values())?),
            }
        }

        self.runner.run(&ToolInvocation {
            tool: tool.clone(),
            main_class,
            classpath,
            args,
        })?;

        let mut invalid = Vec::new();
        for (path, sha1) in &outputs {
            if !path.is_file() {
                invalid.push(format!("{} was not created", path.display()));
            } else if let Err(e) = verify_or_delete(path, sha1) {
                warn!("Processor {} produced a bad output: {}", tool, e);
                invalid.push(e.to_string());
            }
        }
        if !invalid.is_empty() {
            return Err(InstallerError::ToolExecution {
                tool,
                message: format!("invalid outputs: {}", invalid.join("; ")),
            });
        }

        generated.extend(outputs.into_iter().map(|(path, _)| path));
        generated.extend(
            referenced
                .into_iter()
                .filter(|(path, existed)| !existed && path.exists())
                .map(|(path, _)| path),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bundle::archive::tests::create_test_zip;
    use crate::core::downloader::checksum::sha1_bytes;
    use crate::core::maven::MavenArtifact;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    /// Records calls; fails for one tool, writes files for `[coordinate]`
    /// arguments.
    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<String>>,
        fail_tool: Option<String>,
        write: Option<(PathBuf, Vec<u8>)>,
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, invocation: &ToolInvocation) -> InstallerResult<()> {
            self.calls.borrow_mut().push(invocation.tool.clone());
            if self.fail_tool.as_deref() == Some(invocation.tool.as_str()) {
                return Err(InstallerError::ToolExecution {
                    tool: invocation.tool.clone(),
                    message: "exit code Some(1)".into(),
                });
            }
            if let Some((path, bytes)) = &self.write {
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, bytes).unwrap();
            }
            Ok(())
        }
    }

    fn install_tool(store: &ArtifactStore, coord: &str) {
        let path = store.path_of(&MavenArtifact::parse(coord).unwrap());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        create_test_zip(
            &path,
            &[(
                "META-INF/MANIFEST.MF",
                b"Manifest-Version: 1.0\nMain-Class: org.example.Main\n",
            )],
        );
    }

    fn processor(jar: &str) -> ProcessorSpec {
        ProcessorSpec {
            jar: MavenArtifact::parse(jar).unwrap(),
            classpath: vec![],
            args: vec!["--side".into(), "{SIDE}".into()],
            outputs: BTreeMap::new(),
            sides: None,
        }
    }

    fn table() -> TokenTable {
        TokenTable::from_values(BTreeMap::from([("SIDE".to_string(), "client".to_string())]))
    }

    fn store(temp: &TempDir) -> ArtifactStore {
        ArtifactStore::new(temp.path().join("libraries"))
    }

    #[test]
    fn stops_at_first_failing_processor() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        for tool in ["org.example:one:1.0", "org.example:two:1.0", "org.example:three:1.0"] {
            install_tool(&store, tool);
        }
        let runner = RecordingRunner {
            fail_tool: Some("org.example:two:1.0".into()),
            ..Default::default()
        };
        let tokens = table();
        let cancel = AtomicBool::new(false);
        let processors = vec![
            processor("org.example:one:1.0"),
            processor("org.example:two:1.0"),
            processor("org.example:three:1.0"),
        ];

        let err = ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&processors, Side::Client)
            .unwrap_err();

        match err {
            InstallerError::ToolExecution { tool, .. } => assert_eq!(tool, "org.example:two:1.0"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            *runner.calls.borrow(),
            vec!["org.example:one:1.0".to_string(), "org.example:two:1.0".to_string()]
        );
    }

    #[test]
    fn other_side_processors_are_skipped() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_tool(&store, "org.example:one:1.0");
        let runner = RecordingRunner::default();
        let tokens = table();
        let cancel = AtomicBool::new(false);
        let mut server_only = processor("org.example:one:1.0");
        server_only.sides = Some(vec![Side::Server]);

        ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&[server_only], Side::Client)
            .unwrap();
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn up_to_date_outputs_skip_the_processor() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_tool(&store, "org.example:one:1.0");
        let output = temp.path().join("out.jar");
        std::fs::write(&output, b"patched").unwrap();

        let mut spec = processor("org.example:one:1.0");
        spec.outputs.insert(
            path_string(&output),
            format!("'{}'", sha1_bytes(b"patched")),
        );
        let runner = RecordingRunner::default();
        let tokens = table();
        let cancel = AtomicBool::new(false);

        let generated = ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&[spec], Side::Client)
            .unwrap();
        assert!(runner.calls.borrow().is_empty());
        assert!(generated.contains(&output));
    }

    #[test]
    fn bad_output_is_deleted_and_reported() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_tool(&store, "org.example:one:1.0");
        let output = temp.path().join("out.jar");

        let mut spec = processor("org.example:one:1.0");
        spec.outputs.insert(
            path_string(&output),
            format!("'{}'", sha1_bytes(b"expected")),
        );
        let runner = RecordingRunner {
            write: Some((output.clone(), b"something else".to_vec())),
            ..Default::default()
        };
        let tokens = table();
        let cancel = AtomicBool::new(false);

        let err = ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&[spec], Side::Client)
            .unwrap_err();
        assert!(matches!(err, InstallerError::ToolExecution { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn missing_classpath_entry_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_tool(&store, "org.example:one:1.0");
        let mut spec = processor("org.example:one:1.0");
        spec.classpath
            .push(MavenArtifact::parse("org.example:absent:1.0").unwrap());
        let runner = RecordingRunner::default();
        let tokens = table();
        let cancel = AtomicBool::new(false);

        let err = ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&[spec], Side::Client)
            .unwrap_err();
        match err {
            InstallerError::MissingDependency { tool, path } => {
                assert_eq!(tool, "org.example:one:1.0");
                assert!(path.ends_with(Path::new("absent-1.0.jar")));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn new_coordinate_arguments_are_generated_files() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_tool(&store, "org.example:one:1.0");
        let target = store.path_of(&MavenArtifact::parse("org.example:patched:1.0:client").unwrap());

        let mut spec = processor("org.example:one:1.0");
        spec.args = vec!["--output".into(), "[org.example:patched:1.0:client]".into()];
        let runner = RecordingRunner {
            write: Some((target.clone(), b"patched".to_vec())),
            ..Default::default()
        };
        let tokens = table();
        let cancel = AtomicBool::new(false);

        let generated = ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&[spec], Side::Client)
            .unwrap();
        assert_eq!(generated.into_iter().collect::<Vec<_>>(), vec![target]);
    }

    #[test]
    fn cancellation_is_checked_between_processors() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        install_tool(&store, "org.example:one:1.0");
        let runner = RecordingRunner::default();
        let tokens = table();
        let cancel = AtomicBool::new(true);

        let err = ProcessorPipeline::new(&runner, &store, &tokens, &cancel)
            .run(&[processor("org.example:one:1.0")], Side::Client)
            .unwrap_err();
        assert!(matches!(err, InstallerError::Cancelled));
        assert!(runner.calls.borrow().is_empty());
    }
}
