use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Well-known per-user paths shared by every process of the launcher family.
///
/// Independently started processes (primary instance, relaunched instances,
/// helper subprocesses) all derive the same paths from the same root, so the
/// property document and the lock files land in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherLayout {
    root: PathBuf,
}

impl LauncherLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self) -> PathBuf {
        self.root.join("user")
    }

    /// The persisted property document.
    pub fn properties_file(&self) -> PathBuf {
        self.user_dir().join("properties.json")
    }

    /// Optional title catalog override.
    pub fn titles_file(&self) -> PathBuf {
        self.user_dir().join("titles.toml")
    }

    /// Optional channel endpoint override.
    pub fn channels_file(&self) -> PathBuf {
        self.user_dir().join("channels.toml")
    }

    /// Directory holding the cross-process lock files.
    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run")
    }

    /// Root of the launcher-managed file tree kept in sync with the remote
    /// channel.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Synced tree of one named runtime component.
    pub fn component_dir(&self, component: &str) -> PathBuf {
        self.data_dir().join(component)
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.user_dir(), self.run_dir(), self.data_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user root")?;
        return Ok(PathBuf::from(app_data).join("Gantry"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user root")?;
    Ok(PathBuf::from(home).join(".gantry"))
}
