mod channel;
mod layout;
mod manifest;
mod titles;

pub use channel::{Channel, ChannelOverride, BUILD_CHANNEL};
pub use layout::{default_user_root, LauncherLayout};
pub use manifest::{ManifestFile, UpdateManifest, MANIFEST_SCHEMA_VERSION};
pub use titles::{Title, TitleCatalog};

#[cfg(test)]
mod tests;
