//! Layout of build trees below the build folder.
//!
//! Every build tree lives at
//! `<build folder>/<platform>/<arch>/<buildsystem>[/<config>]`, where the
//! config level only exists for single-configuration build systems. A tree
//! counts as prepared once its [`STATE_FILE`] exists.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::generator::BuildSystem;
use crate::types::{BauerError, BuildConfiguration, Platform, STD_ARCH};

/// Marker file written into a build tree after a successful prepare.
pub const STATE_FILE: &str = ".generateProjects.state";

/// Contents of the [`STATE_FILE`] of a prepared build tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedState {
    pub configuration: BuildConfiguration,
    pub generator: String,
    /// Configuration names reported by the code model (`""` for
    /// single-config generators).
    pub configurations: Vec<String>,
}

impl PreparedState {
    pub fn new(configuration: &BuildConfiguration, configurations: Vec<String>) -> Self {
        Self {
            configuration: configuration.clone(),
            generator: configuration.buildsystem.cmake_generator().to_string(),
            configurations,
        }
    }
}

/// Configuration selected on the command line; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub platform: Option<Platform>,
    pub arch: Option<String>,
    pub build_system: Option<BuildSystem>,
    pub config: Option<String>,
}

impl Selection {
    pub fn matches(&self, configuration: &BuildConfiguration) -> bool {
        if self.platform.is_some_and(|p| p != configuration.platform) {
            return false;
        }
        if self.arch.as_ref().is_some_and(|a| *a != configuration.arch) {
            return false;
        }
        if self
            .build_system
            .is_some_and(|b| b != configuration.buildsystem)
        {
            return false;
        }
        match (&self.config, &configuration.config) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

/// The folder holding all build trees of a source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFolder {
    base: PathBuf,
}

impl BuildFolder {
    /// `<source_directory>/build` unless `build_folder` is given; relative
    /// folders are resolved against `source_directory`.
    pub fn new(source_directory: &Path, build_folder: Option<&Path>) -> Self {
        let base = match build_folder {
            Some(folder) if folder.is_absolute() => folder.to_path_buf(),
            Some(folder) => source_directory.join(folder),
            None => source_directory.join("build"),
        };
        debug!("Build folder: {}", base.display());
        Self { base }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn build_dir(&self, configuration: &BuildConfiguration) -> PathBuf {
        configuration
            .components()
            .into_iter()
            .fold(self.base.clone(), |path, component| path.join(component))
    }

    pub fn is_prepared(&self, configuration: &BuildConfiguration) -> bool {
        self.build_dir(configuration).join(STATE_FILE).is_file()
    }

    /// Writes the state marker of `state.configuration` as JSON.
    pub fn mark_prepared(&self, state: &PreparedState) -> Result<(), BauerError> {
        let dir = self.build_dir(&state.configuration);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(STATE_FILE), serde_json::to_string_pretty(state)?)?;
        Ok(())
    }

    pub fn read_state(&self, configuration: &BuildConfiguration) -> Result<PreparedState, BauerError> {
        let path = self.build_dir(configuration).join(STATE_FILE);
        let contents = fs::read_to_string(&path).map_err(|e| {
            BauerError::Build(format!(
                "Build tree {} is not prepared ({}: {}).\n\n\
                 Run 'bauer prepare' for this configuration first.",
                configuration,
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Scans the build folder for prepared build trees.
    ///
    /// Directories that are not a known platform or build system are
    /// skipped.
    pub fn existing_configurations(&self) -> Result<Vec<BuildConfiguration>, BauerError> {
        let mut prepared = Vec::new();
        if !self.base.is_dir() {
            return Ok(prepared);
        }

        for platform_name in subdirectories(&self.base)? {
            let Ok(platform) = platform_name.parse::<Platform>() else {
                continue;
            };
            let platform_dir = self.base.join(&platform_name);

            for arch in subdirectories(&platform_dir)? {
                let arch_dir = platform_dir.join(&arch);

                for system_name in subdirectories(&arch_dir)? {
                    let Ok(buildsystem) = system_name.parse::<BuildSystem>() else {
                        continue;
                    };
                    let system_dir = arch_dir.join(&system_name);
                    let configuration = BuildConfiguration::new(platform, arch.clone(), buildsystem);

                    if buildsystem.is_single_config() {
                        for config in subdirectories(&system_dir)? {
                            if system_dir.join(&config).join(STATE_FILE).is_file() {
                                prepared.push(configuration.clone().with_config(config));
                            }
                        }
                    } else if system_dir.join(STATE_FILE).is_file() {
                        prepared.push(configuration);
                    }
                }
            }
        }

        prepared.sort();
        Ok(prepared)
    }

    /// Build trees a command should operate on.
    ///
    /// When platform and build system are both selected, a tree that does not
    /// exist yet is returned as well (arch defaults to `std`), unless the
    /// build system is single-config and no config was selected.
    pub fn configurations_for_command(
        &self,
        selection: &Selection,
    ) -> Result<Vec<BuildConfiguration>, BauerError> {
        let existing = self.existing_configurations()?;
        debug!("Existing configurations:");
        for configuration in &existing {
            debug!("* {}", configuration);
        }

        let matched: Vec<_> = existing
            .into_iter()
            .filter(|configuration| selection.matches(configuration))
            .collect();

        if let (Some(platform), Some(build_system)) = (selection.platform, selection.build_system) {
            if !matched.is_empty() && selection.arch.is_none() {
                return Ok(matched);
            }

            let single_config = build_system.is_single_config();
            if !single_config || selection.config.is_some() {
                let arch = selection.arch.clone().unwrap_or_else(|| STD_ARCH.to_string());
                let mut configuration = BuildConfiguration::new(platform, arch, build_system);
                if single_config {
                    configuration.config = selection.config.clone();
                }
                return Ok(vec![configuration]);
            }
        }

        Ok(matched)
    }
}

fn subdirectories(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn folder_with(prepared: &[BuildConfiguration]) -> (TempDir, BuildFolder) {
        let dir = TempDir::new().unwrap();
        let folder = BuildFolder::new(dir.path(), None);
        for configuration in prepared {
            folder
                .mark_prepared(&PreparedState::new(configuration, vec![String::new()]))
                .unwrap();
        }
        (dir, folder)
    }

    fn linux_make(config: &str) -> BuildConfiguration {
        BuildConfiguration::new(Platform::Linux, "std", BuildSystem::Make).with_config(config)
    }

    #[test]
    fn test_build_dir_layout() {
        let folder = BuildFolder::new(Path::new("/src/app"), None);
        assert_eq!(folder.base_dir(), Path::new("/src/app/build"));
        assert_eq!(
            folder.build_dir(&linux_make("Debug")),
            Path::new("/src/app/build/linux/std/make/Debug")
        );

        let xcode = BuildConfiguration::new(Platform::Ios, "device", BuildSystem::Xcode);
        assert_eq!(
            folder.build_dir(&xcode),
            Path::new("/src/app/build/ios/device/xcode")
        );
    }

    #[test]
    fn test_custom_build_folder() {
        let relative = BuildFolder::new(Path::new("/src/app"), Some(Path::new("out")));
        assert_eq!(relative.base_dir(), Path::new("/src/app/out"));

        let absolute = BuildFolder::new(Path::new("/src/app"), Some(Path::new("/tmp/b")));
        assert_eq!(absolute.base_dir(), Path::new("/tmp/b"));
    }

    #[test]
    fn test_existing_configurations() {
        let xcode = BuildConfiguration::new(Platform::Ios, "std", BuildSystem::Xcode);
        let (dir, folder) = folder_with(&[linux_make("Debug"), linux_make("Release"), xcode.clone()]);

        // Unprepared trees and unknown folders are ignored.
        fs::create_dir_all(dir.path().join("build/linux/std/make/MinSizeRel")).unwrap();
        fs::create_dir_all(dir.path().join("build/amiga/std/make/Debug")).unwrap();
        fs::create_dir_all(dir.path().join("build/linux/std/scons")).unwrap();

        let existing = folder.existing_configurations().unwrap();
        assert_eq!(existing, vec![xcode, linux_make("Debug"), linux_make("Release")]);
        assert!(folder.is_prepared(&linux_make("Debug")));
        assert!(!folder.is_prepared(&linux_make("MinSizeRel")));
    }

    #[test]
    fn test_state_round_trip() {
        let xcode = BuildConfiguration::new(Platform::Mac, "std", BuildSystem::Xcode);
        let (_dir, folder) = folder_with(&[]);
        assert!(matches!(folder.read_state(&xcode), Err(BauerError::Build(_))));

        let state = PreparedState::new(&xcode, vec!["Debug".to_string(), "Release".to_string()]);
        folder.mark_prepared(&state).unwrap();

        let read = folder.read_state(&xcode).unwrap();
        assert_eq!(read.generator, "Xcode");
        assert_eq!(read.configurations, ["Debug", "Release"]);
        assert_eq!(read, state);
    }

    #[test]
    fn test_missing_build_folder_has_no_configurations() {
        let dir = TempDir::new().unwrap();
        let folder = BuildFolder::new(dir.path(), None);
        assert!(folder.existing_configurations().unwrap().is_empty());
    }

    #[test]
    fn test_selection_matches() {
        let selection = Selection {
            platform: Some(Platform::Linux),
            config: Some("Debug".to_string()),
            ..Selection::default()
        };
        assert!(selection.matches(&linux_make("Debug")));
        assert!(!selection.matches(&linux_make("Release")));

        // Multi-config trees match any config.
        let vs = BuildConfiguration::new(Platform::Linux, "std", BuildSystem::Vs2019);
        assert!(selection.matches(&vs));
        assert!(Selection::default().matches(&vs));
    }

    #[test]
    fn test_configurations_for_command_existing() {
        let (_dir, folder) = folder_with(&[linux_make("Debug"), linux_make("Release")]);

        let all = folder.configurations_for_command(&Selection::default()).unwrap();
        assert_eq!(all.len(), 2);

        let selection = Selection {
            platform: Some(Platform::Linux),
            build_system: Some(BuildSystem::Make),
            ..Selection::default()
        };
        assert_eq!(folder.configurations_for_command(&selection).unwrap().len(), 2);
    }

    #[test]
    fn test_configurations_for_command_new_tree() {
        let (_dir, folder) = folder_with(&[]);

        let selection = Selection {
            platform: Some(Platform::Android),
            build_system: Some(BuildSystem::Make),
            arch: Some("x86_64".to_string()),
            config: Some("Release".to_string()),
        };
        assert_eq!(
            folder.configurations_for_command(&selection).unwrap(),
            vec![
                BuildConfiguration::new(Platform::Android, "x86_64", BuildSystem::Make)
                    .with_config("Release")
            ]
        );

        let xcode = Selection {
            platform: Some(Platform::Ios),
            build_system: Some(BuildSystem::Xcode),
            config: Some("Release".to_string()),
            ..Selection::default()
        };
        assert_eq!(
            folder.configurations_for_command(&xcode).unwrap(),
            vec![BuildConfiguration::new(Platform::Ios, "std", BuildSystem::Xcode)]
        );

        // A single-config build system needs a config for a new tree.
        let no_config = Selection {
            platform: Some(Platform::Linux),
            build_system: Some(BuildSystem::Ninja),
            ..Selection::default()
        };
        assert!(folder.configurations_for_command(&no_config).unwrap().is_empty());
    }
}
