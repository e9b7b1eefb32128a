//! Configuration file support for bauer.
//!
//! `bauer.toml` holds per-project settings so they don't have to be passed
//! as CLI flags on every call.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. Current working directory (`./bauer.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [cmake]
//! executable = "/usr/local/bin/cmake"
//! receive_timeout_secs = 600
//!
//! [build]
//! folder = "build"
//! options = ["BDN_BUILD_TESTS=Off"]
//! toolchain_dir = "cmake/toolchains"
//! jobs = 8
//!
//! [macos]
//! min_version = "10.14"
//!
//! [android]
//! home = "/opt/android-sdk"
//! api_level = "28"
//!
//! [env]
//! CCACHE_DIR = "/tmp/ccache"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "bauer.toml";

/// Root configuration structure for `bauer.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BauerConfig {
    pub cmake: CmakeConfig,
    pub build: BuildSettings,
    pub macos: MacosConfig,
    pub android: AndroidConfig,
    /// Extra environment for the CMake server process.
    pub env: BTreeMap<String, String>,
}

/// CMake executable and server session settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CmakeConfig {
    /// Path or name of the cmake executable. Defaults to `cmake` on PATH.
    pub executable: PathBuf,

    /// Upper bound for any single wait on the server. Unset waits forever,
    /// which suits configure runs of large projects.
    pub receive_timeout_secs: Option<u64>,
}

impl Default for CmakeConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("cmake"),
            receive_timeout_secs: None,
        }
    }
}

impl CmakeConfig {
    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Build folder, relative to the source directory. Defaults to `build`.
    pub folder: Option<PathBuf>,

    /// `KEY=VALUE` cache options added to every configure.
    pub options: Vec<String>,

    /// Directory containing bundled toolchain files (iOS without Xcode).
    pub toolchain_dir: Option<PathBuf>,

    /// Default parallel jobs for `build`.
    pub jobs: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MacosConfig {
    pub sdk_path: Option<String>,
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Android SDK root. Falls back to `$ANDROID_HOME`.
    pub home: Option<PathBuf>,

    /// `ANDROID_NATIVE_API_LEVEL` (default: 28).
    pub api_level: String,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            home: None,
            api_level: bauer_sdk::builders::arguments::DEFAULT_ANDROID_API_LEVEL.to_string(),
        }
    }
}

impl BauerConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: BauerConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Searches `start_dir` and its parents for `bauer.toml`.
    ///
    /// The search stops at a directory containing `.git` or at the
    /// filesystem root.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }
}

/// Merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    pub config: BauerConfig,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Discovers configuration starting at `start_dir`, or loads `explicit`.
    pub fn load(start_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self {
                config: BauerConfig::load_from_file(path)?,
                config_path: Some(path.to_path_buf()),
            });
        }

        Ok(match BauerConfig::discover_from(start_dir)? {
            Some((config, path)) => Self {
                config,
                config_path: Some(path),
            },
            None => Self::default(),
        })
    }

    /// Resolves a CLI value, using config as fallback.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&BauerConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| config_getter(&self.config))
            .unwrap_or(default)
    }

    pub fn cmake_executable(&self, cli_value: Option<PathBuf>) -> PathBuf {
        self.resolve(
            cli_value,
            |c| Some(c.cmake.executable.clone()),
            PathBuf::from("cmake"),
        )
    }

    /// Config options first, then the CLI ones, so CLI values win in CMake.
    pub fn cmake_options(&self, cli_options: &[String]) -> Vec<String> {
        self.config
            .build
            .options
            .iter()
            .chain(cli_options)
            .cloned()
            .collect()
    }

    pub fn jobs(&self, cli_value: Option<u32>) -> Option<u32> {
        cli_value.or(self.config.build.jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BauerConfig::default();
        assert_eq!(config.cmake.executable, PathBuf::from("cmake"));
        assert_eq!(config.cmake.receive_timeout(), None);
        assert_eq!(config.android.api_level, "28");
        assert!(config.build.options.is_empty());
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        let toml_content = r#"
[cmake]
executable = "/opt/cmake/bin/cmake"
receive_timeout_secs = 120

[build]
folder = "out"
options = ["BDN_BUILD_TESTS=Off", "FOO=1"]
jobs = 4

[android]
home = "/opt/android-sdk"
api_level = "29"

[env]
CCACHE_DIR = "/tmp/ccache"
"#;
        std::fs::write(&config_path, toml_content).unwrap();

        let config = BauerConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.cmake.executable, PathBuf::from("/opt/cmake/bin/cmake"));
        assert_eq!(config.cmake.receive_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.build.folder, Some(PathBuf::from("out")));
        assert_eq!(config.build.options, ["BDN_BUILD_TESTS=Off", "FOO=1"]);
        assert_eq!(config.build.jobs, Some(4));
        assert_eq!(config.android.home, Some(PathBuf::from("/opt/android-sdk")));
        assert_eq!(config.android.api_level, "29");
        assert_eq!(config.env.get("CCACHE_DIR").map(String::as_str), Some("/tmp/ccache"));
        assert_eq!(config.macos, MacosConfig::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[build]\njobs = \"many\"\n").unwrap();

        let err = BauerConfig::load_from_file(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn test_discover_config() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[build]\nfolder = \"discovered\"\n",
        )
        .unwrap();

        let sub_dir = temp_dir.path().join("sub").join("dir");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let (config, path) = BauerConfig::discover_from(&sub_dir).unwrap().unwrap();
        assert_eq!(config.build.folder, Some(PathBuf::from("discovered")));
        assert_eq!(path, temp_dir.path().join(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_discover_stops_at_git_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        let repo = temp_dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();

        assert!(BauerConfig::discover_from(&repo).unwrap().is_none());
    }

    #[test]
    fn test_resolver_prefers_cli() {
        let mut resolver = ConfigResolver::default();
        resolver.config.build.jobs = Some(4);
        resolver.config.build.options = vec!["FROM_CONFIG=1".to_string()];
        resolver.config.cmake.executable = PathBuf::from("/opt/cmake");

        assert_eq!(resolver.jobs(None), Some(4));
        assert_eq!(resolver.jobs(Some(16)), Some(16));
        assert_eq!(resolver.cmake_executable(None), PathBuf::from("/opt/cmake"));
        assert_eq!(
            resolver.cmake_executable(Some(PathBuf::from("cmake3"))),
            PathBuf::from("cmake3")
        );
        assert_eq!(
            resolver.cmake_options(&["FROM_CLI=1".to_string()]),
            ["FROM_CONFIG=1", "FROM_CLI=1"]
        );
        assert_eq!(resolver.resolve(None, |_| None, 7), 7);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[android]\napi_level = \"30\"\n").unwrap();

        let resolver = ConfigResolver::load(Path::new("/"), Some(&path)).unwrap();
        assert_eq!(resolver.config.android.api_level, "30");
        assert_eq!(resolver.config_path, Some(path));
    }
}
