use std::collections::HashSet;
use std::path::{Component, Path};

use anyhow::{anyhow, Context};
use semver::VersionReq;
use serde::{Deserialize, Serialize};

/// Manifest schema revision understood by this launcher.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// One expected file of an update channel: relative path plus content
/// fingerprint. Immutable once constructed for a given update pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// The remote, authoritative file listing for one channel/scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateManifest {
    pub version: u32,
    /// Oldest launcher version this manifest can be applied by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_launcher: Option<VersionReq>,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
}

impl UpdateManifest {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse update manifest")?;
        if manifest.version != MANIFEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported manifest schema version {} (expected {})",
                manifest.version,
                MANIFEST_SCHEMA_VERSION
            ));
        }

        let mut seen_paths = HashSet::new();
        for file in &manifest.files {
            validate_relative_path(&file.path)?;
            validate_sha256(&file.sha256)
                .with_context(|| format!("invalid fingerprint for '{}'", file.path))?;
            if !seen_paths.insert(file.path.as_str()) {
                return Err(anyhow!("duplicate manifest entry: {}", file.path));
            }
        }

        Ok(manifest)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("failed to serialize update manifest")
    }
}

fn validate_relative_path(path: &str) -> anyhow::Result<()> {
    let relative = Path::new(path);
    if relative.as_os_str().is_empty() {
        return Err(anyhow!("manifest path must not be empty"));
    }
    if relative.is_absolute() {
        return Err(anyhow!("manifest path must be relative: {path}"));
    }
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(anyhow!("manifest path must not escape the target: {path}"));
    }
    Ok(())
}

fn validate_sha256(value: &str) -> anyhow::Result<()> {
    if value.len() != 64 {
        return Err(anyhow!("sha256 must be 64 hex characters, got {}", value.len()));
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch))
    {
        return Err(anyhow!("sha256 must be lowercase hex: {value}"));
    }
    Ok(())
}
