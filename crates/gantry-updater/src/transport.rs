use std::fmt;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use gantry_core::{Channel, LauncherLayout, ManifestFile, UpdateManifest};
use serde::{Deserialize, Serialize};

use crate::engine::UpdateError;

pub const DEFAULT_MAIN_ENDPOINT: &str = "https://updates.gantry.dev/main";
pub const DEFAULT_DEVELOP_ENDPOINT: &str = "https://updates.gantry.dev/develop";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which file tree a pass synchronizes: the launcher's own tree or one
/// named runtime component. Both run the identical engine; only the remote
/// prefix and the local target differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateScope {
    Launcher,
    Component(String),
}

impl UpdateScope {
    pub fn dir_name(&self) -> &str {
        match self {
            Self::Launcher => "launcher",
            Self::Component(name) => name,
        }
    }
}

impl fmt::Display for UpdateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Remote base URLs per channel. `channels.toml` in the user dir overrides
/// the compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelEndpoints {
    pub main: String,
    pub develop: String,
}

impl Default for ChannelEndpoints {
    fn default() -> Self {
        Self {
            main: DEFAULT_MAIN_ENDPOINT.to_string(),
            develop: DEFAULT_DEVELOP_ENDPOINT.to_string(),
        }
    }
}

impl ChannelEndpoints {
    pub fn endpoint(&self, channel: Channel) -> &str {
        match channel {
            Channel::Main => &self.main,
            Channel::Develop => &self.develop,
        }
    }

    pub fn load(layout: &LauncherLayout) -> Result<Self> {
        let path = layout.channels_file();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed reading channel endpoints: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed parsing channel endpoints: {}", path.display()))
    }
}

/// The pluggable fetch collaborator: supplies the channel's file listing
/// and byte streams for individual files. The engine owns chunking,
/// progress, and cancellation, so `open_file` returns a plain reader.
pub trait UpdateTransport {
    fn fetch_manifest(
        &self,
        channel: Channel,
        scope: &UpdateScope,
    ) -> Result<UpdateManifest, UpdateError>;

    fn open_file(
        &self,
        channel: Channel,
        scope: &UpdateScope,
        entry: &ManifestFile,
    ) -> Result<Box<dyn Read>, UpdateError>;
}

/// HTTP transport over the per-channel endpoints. Layout on the remote:
/// `<endpoint>/<scope>/manifest.toml` and `<endpoint>/<scope>/files/<path>`.
pub struct HttpTransport {
    endpoints: ChannelEndpoints,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(endpoints: ChannelEndpoints) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;

        Ok(Self { endpoints, client })
    }

    fn scope_url(&self, channel: Channel, scope: &UpdateScope) -> String {
        format!(
            "{}/{}",
            self.endpoints.endpoint(channel).trim_end_matches('/'),
            scope.dir_name()
        )
    }
}

impl UpdateTransport for HttpTransport {
    fn fetch_manifest(
        &self,
        channel: Channel,
        scope: &UpdateScope,
    ) -> Result<UpdateManifest, UpdateError> {
        let url = format!("{}/manifest.toml", self.scope_url(channel, scope));
        let manifest_err = |reason: String| UpdateError::Manifest { channel, reason };

        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| manifest_err(err.to_string()))?;
        let body = response
            .text()
            .map_err(|err| manifest_err(err.to_string()))?;

        UpdateManifest::from_toml_str(&body).map_err(|err| manifest_err(format!("{err:#}")))
    }

    fn open_file(
        &self,
        channel: Channel,
        scope: &UpdateScope,
        entry: &ManifestFile,
    ) -> Result<Box<dyn Read>, UpdateError> {
        let url = format!(
            "{}/files/{}",
            self.scope_url(channel, scope),
            entry.path
        );
        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| UpdateError::Transport {
                path: entry.path.clone(),
                reason: err.to_string(),
            })?;

        Ok(Box::new(response))
    }
}

/// Filesystem-rooted transport mirroring the remote layout under
/// `<root>/<channel>/<scope>/`. Serves offline mirrors and the test suite.
pub struct DirTransport {
    root: PathBuf,
}

impl DirTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scope_dir(&self, channel: Channel, scope: &UpdateScope) -> PathBuf {
        self.root.join(channel.as_str()).join(scope.dir_name())
    }
}

impl UpdateTransport for DirTransport {
    fn fetch_manifest(
        &self,
        channel: Channel,
        scope: &UpdateScope,
    ) -> Result<UpdateManifest, UpdateError> {
        let path = self.scope_dir(channel, scope).join("manifest.toml");
        let manifest_err = |reason: String| UpdateError::Manifest { channel, reason };

        let content = fs::read_to_string(&path)
            .map_err(|err| manifest_err(format!("{}: {err}", path.display())))?;
        UpdateManifest::from_toml_str(&content).map_err(|err| manifest_err(format!("{err:#}")))
    }

    fn open_file(
        &self,
        channel: Channel,
        scope: &UpdateScope,
        entry: &ManifestFile,
    ) -> Result<Box<dyn Read>, UpdateError> {
        let path = self
            .scope_dir(channel, scope)
            .join("files")
            .join(&entry.path);
        let file = fs::File::open(&path).map_err(|err| UpdateError::Transport {
            path: entry.path.clone(),
            reason: format!("{}: {err}", path.display()),
        })?;
        Ok(Box::new(file))
    }
}
