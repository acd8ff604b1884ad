// ─── Mod loader installer core ───
//
// Architecture:
//   core/
//     maven/      — Artifact coordinates and repository layout
//     version/    — Base game version manifest + descriptor + OS rules
//     profile/    — install_profile.json model, mirror list
//     bundle/     — Installer archive access + offline bundle builder
//     downloader/ — Sequential cache/bundle/network resolution with SHA-1 checks
//     processors/ — Token substitution + post-install tool pipeline
//     config/     — Settings file + immutable run configuration
//     http/       — Shared reqwest client

pub mod bundle;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod maven;
pub mod processors;
pub mod profile;
pub mod version;

pub use profile::Side;
