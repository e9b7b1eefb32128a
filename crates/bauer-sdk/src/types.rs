//! Core types for bauer-sdk.
//!
//! - [`BauerError`] - Error type for build orchestration
//! - [`Platform`] - Target platform of a build tree
//! - [`BuildConfiguration`] - One prepared (or to be prepared) build tree

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::builders::BuildSystem;
use crate::cmake::ServerError;

/// Error types for bauer-sdk operations.
///
/// Errors of the CMake server session are wrapped in [`BauerError::Server`];
/// use [`ServerError::ends_session`] to find out whether the session can be
/// reused.
#[derive(Debug, thiserror::Error)]
pub enum BauerError {
    /// The CMake server session failed.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// An I/O error occurred.
    ///
    /// Common causes include missing build folders or permission issues.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed while writing a model dump.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration, from `bauer.toml` or CLI flags.
    #[error("configuration error: {0}. Check bauer.toml or CLI flags")]
    Config(String),

    /// The architecture is not supported by the platform / build system.
    #[error("invalid architecture '{arch}' for platform '{platform}'")]
    InvalidArchitecture { platform: String, arch: String },

    /// An external tool exited with a non-zero status.
    #[error("'{command}' failed with exit code {exit_code}")]
    ToolFailed { command: String, exit_code: i32 },

    /// A build step failed before a tool could report an exit status.
    #[error("build error: {0}")]
    Build(String),
}

impl BauerError {
    /// Process exit code for this error.
    ///
    /// Tool failures propagate the tool's exit code, everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BauerError::ToolFailed { exit_code, .. } if *exit_code != 0 => *exit_code,
            _ => 1,
        }
    }
}

/// Target platform.
///
/// # Example
///
/// ```
/// use bauer_sdk::Platform;
///
/// let platform: Platform = "android".parse().unwrap();
/// assert_eq!(platform, Platform::Android);
/// assert_eq!(platform.as_str(), "android");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Mac,
    Linux,
    Windows,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Android,
        Platform::Ios,
        Platform::Mac,
        Platform::Linux,
        Platform::Windows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Mac => "mac",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = BauerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str() == s)
            .ok_or_else(|| BauerError::Config(format!("unknown platform '{s}'")))
    }
}

/// Default architecture name, meaning "whatever the toolchain picks".
pub const STD_ARCH: &str = "std";

/// One build tree, identified by the path components under the build folder.
///
/// `config` is only set for single-configuration build systems; multi-config
/// build systems keep every configuration in the same tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub platform: Platform,
    pub arch: String,
    pub buildsystem: BuildSystem,
    pub config: Option<String>,
}

impl BuildConfiguration {
    pub fn new(platform: Platform, arch: impl Into<String>, buildsystem: BuildSystem) -> Self {
        Self {
            platform,
            arch: arch.into(),
            buildsystem,
            config: None,
        }
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Path components below the build folder.
    pub fn components(&self) -> Vec<&str> {
        let mut components = vec![
            self.platform.as_str(),
            self.arch.as_str(),
            self.buildsystem.as_str(),
        ];
        if let Some(config) = &self.config {
            components.push(config);
        }
        components
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components().join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmake::ProtocolError;

    #[test]
    fn test_platform_parse() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert!(matches!(
            "amiga".parse::<Platform>(),
            Err(BauerError::Config(_))
        ));
    }

    #[test]
    fn test_build_configuration_components() {
        let single = BuildConfiguration::new(Platform::Linux, "std", BuildSystem::Make).with_config("Debug");
        assert_eq!(single.components(), ["linux", "std", "make", "Debug"]);
        assert_eq!(single.to_string(), "linux/std/make/Debug");

        let multi = BuildConfiguration::new(Platform::Ios, "device", BuildSystem::Xcode);
        assert_eq!(multi.to_string(), "ios/device/xcode");
    }

    #[test]
    fn test_exit_codes() {
        let failed = BauerError::ToolFailed {
            command: "cmake --build build".to_string(),
            exit_code: 2,
        };
        assert_eq!(failed.exit_code(), 2);
        assert!(failed.to_string().contains("exit code 2"));

        let server = BauerError::from(ServerError::from(ProtocolError::SessionUnusable));
        assert_eq!(server.exit_code(), 1);
    }
}
