pub mod checksum;
mod engine;
mod store;

pub use engine::{DownloadEngine, Origin, Resolution};
pub use store::{ArtifactStore, DownloadSpec, RunResult};
