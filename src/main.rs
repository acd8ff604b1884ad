use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use installer_lib::core::config::{default_client_dir, default_working_dir, ConfigOverrides};
use installer_lib::Workflow;

#[derive(Parser)]
#[command(name = "installer")]
#[command(about = "Install a mod loader onto a Minecraft client or server")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["install_client", "install_server", "extract", "make_offline"])
))]
struct Cli {
    /// Install the client into DIR (default: the launcher's game directory)
    #[arg(long, value_name = "DIR")]
    install_client: Option<Option<PathBuf>>,
    /// Install a server into DIR (default: current directory)
    #[arg(long, value_name = "DIR")]
    install_server: Option<Option<PathBuf>>,
    /// Extract the main loader jar into DIR (default: current directory)
    #[arg(long, value_name = "DIR")]
    extract: Option<Option<PathBuf>>,
    /// Build a self-contained offline installer at OUT
    #[arg(long, value_name = "OUT")]
    make_offline: Option<PathBuf>,
    /// Never touch the network
    #[arg(long)]
    offline: bool,
    /// Installer archive to read (default: this executable)
    #[arg(long, value_name = "ARCHIVE")]
    bundle: Option<PathBuf>,
    /// Java binary used to run processors
    #[arg(long, value_name = "PATH")]
    java: Option<PathBuf>,
    /// Ignore the profile's mirror list
    #[arg(long)]
    no_mirror: bool,
    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

impl Cli {
    fn workflow(&self) -> Option<Workflow> {
        if let Some(dir) = &self.install_client {
            return Some(Workflow::InstallClient {
                target: dir.clone().unwrap_or_else(default_client_dir),
            });
        }
        if let Some(dir) = &self.install_server {
            return Some(Workflow::InstallServer {
                target: dir.clone().unwrap_or_else(default_working_dir),
            });
        }
        if let Some(dir) = &self.extract {
            return Some(Workflow::Extract {
                target: dir.clone().unwrap_or_else(default_working_dir),
            });
        }
        self.make_offline.clone().map(|output| Workflow::MakeOffline { output })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(workflow) = cli.workflow() else {
        eprintln!("No action given");
        return ExitCode::from(1);
    };
    let overrides = ConfigOverrides {
        offline: cli.offline,
        no_mirror: cli.no_mirror,
        bundle: cli.bundle.clone(),
        java: cli.java.clone(),
    };

    match installer_lib::run(workflow, overrides, cli.settings.as_deref()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}", e);
            ExitCode::from(1)
        }
    }
}
