pub mod archive;
mod offline;

pub use archive::{
    base_game_entry, version_descriptor_entry, InstallerArchive, INSTALL_PROFILE_ENTRY,
    MAVEN_PREFIX, OFFLINE_MARKER,
};
pub use offline::{BaseGameFiles, OfflineBundle};
