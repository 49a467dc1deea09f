use std::collections::BTreeMap;
use std::fs;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LauncherLayout;

/// The catalog shipped with the launcher; `titles.toml` in the user dir
/// overrides it wholesale.
const BUILTIN_CATALOG: &str = r#"
[[titles]]
id = "harrier"
name = "Harrier"
executable = "harrier"
runtime = "harrier-client"

[titles.variants]
singleplayer = "-singleplayer"
multiplayer = "-multiplayer"

[[titles]]
id = "kestrel"
name = "Kestrel"
executable = "kestrel"

[titles.variants]
campaign = "-campaign"
coop = "-coop"
"#;

/// One launchable game title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Title {
    pub id: String,
    pub name: String,
    /// Executable base name inside the install directory; the platform
    /// suffix is applied at launch time.
    pub executable: String,
    /// Runtime component synced into the install directory before launch.
    pub runtime: Option<String>,
    /// Variant id mapped to the argument passed to the executable.
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

impl Title {
    /// Property-store key holding this title's installation path.
    pub fn install_key(&self) -> String {
        format!("{}-install", self.id)
    }

    /// Environment variable carrying the resolved install path into the
    /// launched child.
    pub fn env_var(&self) -> String {
        format!(
            "GANTRY_{}_INSTALL",
            self.id.to_ascii_uppercase().replace('-', "_")
        )
    }

    pub fn executable_file_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.executable)
        } else {
            self.executable.clone()
        }
    }

    pub fn variant_argument(&self, variant: &str) -> Option<&str> {
        self.variants.get(variant).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleCatalog {
    #[serde(default)]
    pub titles: Vec<Title>,
}

impl TitleCatalog {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(input).context("failed to parse title catalog")?;
        let mut seen = std::collections::HashSet::new();
        for title in &catalog.titles {
            if title.id.trim().is_empty() {
                return Err(anyhow!("title id must not be empty"));
            }
            if !seen.insert(title.id.as_str()) {
                return Err(anyhow!("duplicate title id: {}", title.id));
            }
        }
        Ok(catalog)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG).context("builtin title catalog is invalid")
    }

    /// Loads the user override when present, otherwise the builtin catalog.
    pub fn load(layout: &LauncherLayout) -> Result<Self> {
        let path = layout.titles_file();
        if !path.exists() {
            return Self::builtin();
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed reading title catalog: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed parsing title catalog: {}", path.display()))
    }

    pub fn find(&self, id: &str) -> Option<&Title> {
        self.titles.iter().find(|title| title.id == id)
    }
}
