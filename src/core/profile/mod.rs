pub mod install_profile;
pub mod mirror;

pub use install_profile::{
    merge_library_specs, DataEntry, InstallProfile, LoaderVersionJson, ProcessorSpec, Side,
};
pub use mirror::{select_mirror, Mirror};
