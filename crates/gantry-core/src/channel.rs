use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Update channel baked into the build. Release builds carry "main";
/// CI can inject "develop" via `GANTRY_BUILD_CHANNEL`.
pub const BUILD_CHANNEL: Option<&str> = option_env!("GANTRY_BUILD_CHANNEL");

/// Remote update feed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Main,
    Develop,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Develop => "develop",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "main" => Ok(Self::Main),
            "develop" | "dev" => Ok(Self::Develop),
            _ => Err(anyhow!("invalid channel: {value}")),
        }
    }

    /// The one-shot command-line flag that forces this channel on the next
    /// process image.
    pub fn override_flag(self) -> &'static str {
        match self {
            Self::Main => "--channel-main",
            Self::Develop => "--channel-develop",
        }
    }

    /// Resolves the active channel from build provenance plus the one-shot
    /// override flags. A develop override always wins over a main override,
    /// matching the behavior when both are somehow present on the command
    /// line of a relaunched instance.
    pub fn resolve(build_channel: Option<&str>, overrides: ChannelOverride) -> Self {
        if overrides.develop {
            return Self::Develop;
        }
        if overrides.main {
            return Self::Main;
        }
        match build_channel {
            Some("develop") => Self::Develop,
            _ => Self::Main,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutually exclusive channel override flags as parsed from the command
/// line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOverride {
    pub main: bool,
    pub develop: bool,
}

impl ChannelOverride {
    pub fn from_flags(main: bool, develop: bool) -> Self {
        Self { main, develop }
    }

    pub fn is_set(self) -> bool {
        self.main || self.develop
    }
}
