use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use tracing::{debug, error, info, instrument, warn};

use crate::core::bundle::{
    base_game_entry, BaseGameFiles, InstallerArchive, OfflineBundle, INSTALL_PROFILE_ENTRY,
};
use crate::core::config::InstallerConfig;
use crate::core::downloader::{ArtifactStore, DownloadEngine, DownloadSpec, Resolution, RunResult};
use crate::core::error::{InstallerError, InstallerResult};
use crate::core::http::build_http_client;
use crate::core::processors::{
    replace_tokens, FixedTokens, JavaToolRunner, ProcessorPipeline, TokenTable,
};
use crate::core::profile::{merge_library_specs, select_mirror, InstallProfile, LoaderVersionJson};
use crate::core::version::VersionJson;
use crate::core::Side;

/// What a run of the installer does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    InstallClient { target: PathBuf },
    InstallServer { target: PathBuf },
    Extract { target: PathBuf },
    MakeOffline { output: PathBuf },
}

/// Load the bundle and run one workflow to completion.
pub async fn execute(workflow: &Workflow, config: &InstallerConfig) -> InstallerResult<RunResult> {
    let session = InstallSession::open(config).await?;
    match workflow {
        Workflow::InstallClient { target } => session.install_client(target).await,
        Workflow::InstallServer { target } => session.install_server(target).await,
        Workflow::Extract { target } => session.extract(target),
        Workflow::MakeOffline { output } => session.make_offline(output).await,
    }
}

/// Everything loaded once from the installer bundle.
struct InstallSession<'a> {
    config: &'a InstallerConfig,
    archive: InstallerArchive,
    profile: InstallProfile,
    loader_json: String,
    loader: LoaderVersionJson,
    engine: DownloadEngine,
}

impl<'a> InstallSession<'a> {
    #[instrument(skip_all, fields(bundle = ?config.bundle))]
    async fn open(config: &'a InstallerConfig) -> InstallerResult<Self> {
        let archive = InstallerArchive::open(&config.bundle)?;
        let offline = config.offline || archive.is_offline_forced();
        if offline && !config.offline {
            info!("Offline marker present, network access disabled");
        }

        let profile = InstallProfile::parse(&archive.read_string(INSTALL_PROFILE_ENTRY)?)?;
        let loader_json = archive.read_string(profile.json_entry())?;
        let loader = LoaderVersionJson::parse(&loader_json)?;
        info!(
            "Installing {} for Minecraft {} ({} processors)",
            profile.version,
            profile.minecraft,
            profile.processors.len()
        );

        let client = build_http_client(config.connect_timeout, config.read_timeout)?;
        let mirror = match (&profile.mirror_list, offline || !config.use_mirror) {
            (Some(list_url), false) => select_mirror(&client, list_url).await,
            _ => None,
        };

        let engine = DownloadEngine::new(client)
            .offline(offline)
            .with_mirror(mirror)
            .with_archive(archive.clone())
            .with_version_manifest_url(config.version_manifest_url.clone());

        Ok(Self {
            config,
            archive,
            profile,
            loader_json,
            loader,
            engine,
        })
    }

    // ── Workflows ───────────────────────────────────────

    #[instrument(skip(self))]
    async fn install_client(&self, target: &Path) -> InstallerResult<RunResult> {
        if !target.is_dir() {
            return Err(InstallerError::Other(format!(
                "Game directory {:?} does not exist, run the game launcher once first",
                target
            )));
        }

        let mc = &self.profile.minecraft;
        let versions = target.join("versions");
        let client_jar = versions.join(mc).join(format!("{}.jar", mc));
        let (version, raw_version) = self.fetch_base_game(Side::Client, &client_jar).await?;

        let vanilla_json = versions.join(mc).join(format!("{}.json", mc));
        if !vanilla_json.exists() {
            write_file(&vanilla_json, raw_version.as_bytes())?;
        }
        let loader_dir = versions.join(&self.profile.version);
        write_file(
            &loader_dir.join(format!("{}.json", self.profile.version)),
            self.loader_json.as_bytes(),
        )?;
        debug!("Base game descriptor {} ready", version.id);

        let mut store = ArtifactStore::new(target.join("libraries"));
        let mut result = RunResult::default();
        let specs = merge_library_specs(vec![
            self.profile.library_specs()?,
            self.loader.library_specs()?,
        ]);
        self.download_libraries(&specs, &mut store, &mut result).await?;
        self.run_processors(Side::Client, &store, &client_jar, target, &mut result)?;

        info!("Client install of {} complete", self.profile.version);
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn install_server(&self, target: &Path) -> InstallerResult<RunResult> {
        std::fs::create_dir_all(target).map_err(|e| InstallerError::io(target, e))?;
        let libraries = target.join("libraries");

        let server_jar = PathBuf::from(replace_tokens(
            self.profile.server_jar_template(),
            &[
                ("ROOT".to_string(), path_string(target)),
                ("MINECRAFT_VERSION".to_string(), self.profile.minecraft.clone()),
                ("LIBRARY_DIR".to_string(), path_string(&libraries)),
            ]
            .into_iter()
            .collect(),
        )?);
        let (version, _) = self.fetch_base_game(Side::Server, &server_jar).await?;

        let mut store = ArtifactStore::new(libraries);
        let mut result = RunResult::default();
        let specs = merge_library_specs(vec![
            self.profile.library_specs()?,
            self.loader.library_specs()?,
            version.library_specs()?,
        ]);
        self.download_libraries(&specs, &mut store, &mut result).await?;
        self.copy_main_artifact(&store, target)?;
        self.run_processors(Side::Server, &store, &server_jar, target, &mut result)?;

        info!("Server install of {} complete", self.profile.version);
        Ok(result)
    }

    #[instrument(skip(self))]
    fn extract(&self, target: &Path) -> InstallerResult<RunResult> {
        let artifact = self.profile.path.as_ref().ok_or_else(|| {
            InstallerError::Other("The installer declares no main artifact to extract".into())
        })?;
        let dest = target.join(artifact.filename());
        if !self.archive.extract_artifact(artifact, &dest)? {
            return Err(InstallerError::Other(format!(
                "Main artifact {} is not bundled in the installer",
                artifact
            )));
        }

        info!("Extracted {} to {:?}", artifact, dest);
        Ok(RunResult {
            succeeded: vec![artifact.clone()],
            ..Default::default()
        })
    }

    #[instrument(skip(self))]
    async fn make_offline(&self, output: &Path) -> InstallerResult<RunResult> {
        let work = tempfile::Builder::new()
            .prefix("installer-offline")
            .tempdir()
            .map_err(|e| InstallerError::io(std::env::temp_dir(), e))?;
        let root = work.path();
        let mc = &self.profile.minecraft;

        let base_dir = root.join("minecraft");
        let base_game = BaseGameFiles {
            minecraft_version: mc.clone(),
            version_descriptor: base_dir.join(format!("{}.json", mc)),
            client_jar: base_dir.join(mc).join("client.jar"),
            server_jar: base_dir.join(mc).join("server.jar"),
        };
        let (version, raw_version) = self
            .fetch_base_game(Side::Client, &base_game.client_jar)
            .await?;
        write_file(&base_game.version_descriptor, raw_version.as_bytes())?;
        self.fetch_main_artifact(&version, Side::Server, &base_game.server_jar)
            .await?;

        let mut store = ArtifactStore::new(root.join("libraries"));
        let mut result = RunResult::default();
        let specs = merge_library_specs(vec![
            self.profile.library_specs()?,
            self.loader.library_specs()?,
            version.library_specs()?,
        ]);
        self.download_libraries(&specs, &mut store, &mut result).await?;
        self.run_processors(Side::Client, &store, &base_game.client_jar, root, &mut result)?;

        OfflineBundle {
            source: self.archive.path(),
            store: &store,
            libraries: &specs,
            base_game: &base_game,
            generated_files: &result.generated_files,
        }
        .build(output)?;

        Ok(result)
    }

    // ── Steps ───────────────────────────────────────────

    /// Version descriptor plus the base game jar for `side` at `dest`.
    async fn fetch_base_game(&self, side: Side, dest: &Path) -> InstallerResult<(VersionJson, String)> {
        let raw = self
            .engine
            .fetch_version_descriptor(&self.profile.minecraft)
            .await?;
        let version = VersionJson::parse(&raw)?;
        self.fetch_main_artifact(&version, side, dest).await?;
        Ok((version, raw))
    }

    async fn fetch_main_artifact(
        &self,
        version: &VersionJson,
        side: Side,
        dest: &Path,
    ) -> InstallerResult<()> {
        let download = version.download_for(side).ok_or_else(|| {
            InstallerError::Other(format!(
                "Minecraft {} publishes no {} download",
                version.id, side
            ))
        })?;
        let entry = base_game_entry(&self.profile.minecraft, &format!("{}.jar", side));
        let resolution = self
            .engine
            .download_main_artifact(&download.url, download.sha1.as_deref(), Some(entry.as_str()), dest)
            .await?;
        debug!("Base game {} jar: {:?}", side, resolution);
        Ok(())
    }

    /// Resolve every library, collecting failures so they are reported together.
    async fn download_libraries(
        &self,
        specs: &[DownloadSpec],
        store: &mut ArtifactStore,
        result: &mut RunResult,
    ) -> InstallerResult<()> {
        info!("Resolving {} libraries into {:?}", specs.len(), store.root());

        for spec in specs {
            if self.config.cancel.load(Ordering::SeqCst) {
                return Err(InstallerError::Cancelled);
            }

            match self.engine.resolve(spec, store.root()).await {
                Ok(Resolution::Resolved { path, origin }) => {
                    debug!("{} resolved from {:?}", spec.coordinate, origin);
                    store.insert(spec.coordinate.clone(), path);
                    result.succeeded.push(spec.coordinate.clone());
                }
                Ok(Resolution::Skipped { reason }) => {
                    info!("Skipping: {}", reason);
                    store.insert(spec.coordinate.clone(), spec.local_path(store.root()));
                    result.skipped.push(spec.coordinate.clone());
                }
                Err(e) => {
                    error!("Failed to resolve {}: {}", spec.coordinate, e);
                    result.failed.push(spec.coordinate.clone());
                }
            }
        }

        info!(
            "Libraries: {} ok, {} skipped, {} failed",
            result.succeeded.len(),
            result.skipped.len(),
            result.failed.len()
        );
        if !result.failed.is_empty() {
            return Err(InstallerError::LibrariesFailed(result.failed_names()));
        }
        Ok(())
    }

    fn run_processors(
        &self,
        side: Side,
        store: &ArtifactStore,
        minecraft_jar: &Path,
        root: &Path,
        result: &mut RunResult,
    ) -> InstallerResult<()> {
        let tokens = TokenTable::materialize(
            &self.profile.data_for(side),
            &self.archive,
            store,
            &FixedTokens {
                side,
                minecraft_jar,
                minecraft_version: &self.profile.minecraft,
                root,
                installer: self.archive.path(),
                library_dir: store.root(),
            },
        )?;
        let runner = JavaToolRunner::new(&self.config.java).with_working_dir(root);

        let generated = ProcessorPipeline::new(&runner, store, &tokens, &self.config.cancel)
            .run(&self.profile.processors, side)?;
        result.generated_files.extend(generated);
        Ok(())
    }

    /// Put the loader's own jar next to the server.
    fn copy_main_artifact(&self, store: &ArtifactStore, target: &Path) -> InstallerResult<()> {
        let Some(artifact) = &self.profile.path else {
            debug!("No main artifact declared");
            return Ok(());
        };
        let dest = target.join(artifact.filename());
        let source = store.path_of(artifact);

        if source.is_file() {
            std::fs::copy(&source, &dest).map_err(|e| InstallerError::io(&dest, e))?;
        } else if !self.archive.extract_artifact(artifact, &dest)? {
            warn!("Main artifact {} is neither installed nor bundled", artifact);
            return Ok(());
        }
        info!("Copied {} to {:?}", artifact, dest);
        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> InstallerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| InstallerError::io(path, e))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
