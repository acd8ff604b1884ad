mod artifact;

pub use artifact::MavenArtifact;

/// Official library host. Declared URLs under it are never rewritten to a mirror.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net/";
