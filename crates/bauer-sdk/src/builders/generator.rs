//! Build systems and their CMake generators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::BauerError;

/// A build system bauer can prepare a build tree for.
///
/// The [`as_str`](BuildSystem::as_str) name is also the folder name of the
/// build tree below `<platform>/<arch>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Make,
    Ninja,
    Xcode,
    Vs2017,
    Vs2019,
    #[serde(rename = "AndroidStudio")]
    AndroidStudio,
}

impl BuildSystem {
    pub const ALL: [BuildSystem; 6] = [
        BuildSystem::Make,
        BuildSystem::Ninja,
        BuildSystem::Xcode,
        BuildSystem::Vs2017,
        BuildSystem::Vs2019,
        BuildSystem::AndroidStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSystem::Make => "make",
            BuildSystem::Ninja => "ninja",
            BuildSystem::Xcode => "xcode",
            BuildSystem::Vs2017 => "vs2017",
            BuildSystem::Vs2019 => "vs2019",
            BuildSystem::AndroidStudio => "AndroidStudio",
        }
    }

    /// Generator name passed in the handshake.
    ///
    /// Android Studio projects are generated from a temporary makefile tree.
    pub fn cmake_generator(&self) -> &'static str {
        match self {
            BuildSystem::Make | BuildSystem::AndroidStudio => "Unix Makefiles",
            BuildSystem::Ninja => "Ninja",
            BuildSystem::Xcode => "Xcode",
            BuildSystem::Vs2017 => "Visual Studio 15 2017",
            BuildSystem::Vs2019 => "Visual Studio 16 2019",
        }
    }

    /// Whether a build tree holds exactly one configuration
    /// (`CMAKE_BUILD_TYPE`), as opposed to all of them.
    pub fn is_single_config(&self) -> bool {
        matches!(self, BuildSystem::Make | BuildSystem::Ninja)
    }

    pub fn is_visual_studio(&self) -> bool {
        matches!(self, BuildSystem::Vs2017 | BuildSystem::Vs2019)
    }

    /// Build systems available on the current host.
    pub fn available() -> Vec<BuildSystem> {
        BuildSystem::ALL
            .into_iter()
            .filter(|system| match system {
                BuildSystem::Xcode => cfg!(target_os = "macos"),
                BuildSystem::Vs2017 | BuildSystem::Vs2019 => cfg!(windows),
                _ => true,
            })
            .collect()
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildSystem {
    type Err = BauerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildSystem::ALL
            .into_iter()
            .find(|system| system.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = BuildSystem::ALL.iter().map(BuildSystem::as_str).collect();
                BauerError::Config(format!(
                    "unknown build system '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}
