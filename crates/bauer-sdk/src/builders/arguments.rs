//! Composition of the `configure` cache arguments for a build tree.

use std::path::{Path, PathBuf};

use super::generator::BuildSystem;
use crate::types::{BauerError, BuildConfiguration, Platform, STD_ARCH};

/// Toolchain file for non-Xcode iOS builds, looked up in the toolchain dir.
pub const IOS_TOOLCHAIN_FILE: &str = "ios.make.toolchain.cmake";

/// Android API level used when none is configured.
pub const DEFAULT_ANDROID_API_LEVEL: &str = "28";

/// ABI of the temporary makefile tree when Android Studio targets every ABI.
const ANDROID_STUDIO_FALLBACK_ABI: &str = "x86";

/// Builder for the `-D` arguments of a configure request.
///
/// # Example
///
/// ```
/// use bauer_sdk::builders::{BuildSystem, CacheArguments};
/// use bauer_sdk::{BuildConfiguration, Platform};
/// use std::path::Path;
///
/// let configuration = BuildConfiguration::new(Platform::Linux, "std", BuildSystem::Make)
///     .with_config("Debug");
/// let args = CacheArguments::new(&configuration, Path::new("/src/build"))
///     .cmake_options(vec!["BUILD_TESTING=Off".to_string()])
///     .compose()
///     .unwrap();
/// assert_eq!(args, ["-DCMAKE_BUILD_TYPE=Debug", "-DBUILD_TESTING=Off"]);
/// ```
#[derive(Debug, Clone)]
pub struct CacheArguments<'a> {
    configuration: &'a BuildConfiguration,
    base_build_dir: &'a Path,
    package_generator: Option<String>,
    package_folder: Option<PathBuf>,
    macos_sdk_path: Option<String>,
    macos_min_version: Option<String>,
    toolchain_dir: Option<PathBuf>,
    android_home: Option<PathBuf>,
    android_api_level: String,
    cmake_options: Vec<String>,
}

impl<'a> CacheArguments<'a> {
    pub fn new(configuration: &'a BuildConfiguration, base_build_dir: &'a Path) -> Self {
        Self {
            configuration,
            base_build_dir,
            package_generator: None,
            package_folder: None,
            macos_sdk_path: None,
            macos_min_version: None,
            toolchain_dir: None,
            android_home: None,
            android_api_level: DEFAULT_ANDROID_API_LEVEL.to_string(),
            cmake_options: Vec::new(),
        }
    }

    /// CPack generator, e.g. `ZIP` or `productbuild`.
    pub fn package_generator(mut self, generator: Option<String>) -> Self {
        self.package_generator = generator;
        self
    }

    /// Output folder for packages; relative paths are below the build folder.
    pub fn package_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.package_folder = folder;
        self
    }

    pub fn macos_sdk_path(mut self, path: Option<String>) -> Self {
        self.macos_sdk_path = path;
        self
    }

    pub fn macos_min_version(mut self, version: Option<String>) -> Self {
        self.macos_min_version = version;
        self
    }

    /// Directory containing bundled CMake toolchain files.
    pub fn toolchain_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.toolchain_dir = dir;
        self
    }

    pub fn android_home(mut self, home: Option<PathBuf>) -> Self {
        self.android_home = home;
        self
    }

    pub fn android_api_level(mut self, level: impl Into<String>) -> Self {
        self.android_api_level = level.into();
        self
    }

    /// User `KEY=VALUE` options, passed on as `-DKEY=VALUE`.
    pub fn cmake_options(mut self, options: Vec<String>) -> Self {
        self.cmake_options = options;
        self
    }

    pub fn compose(&self) -> Result<Vec<String>, BauerError> {
        let configuration = self.configuration;
        let mut args = Vec::new();

        match configuration.platform {
            Platform::Mac => self.mac_arguments(&mut args)?,
            Platform::Ios => self.ios_arguments(&mut args)?,
            Platform::Android => self.android_arguments(&mut args)?,
            Platform::Linux | Platform::Windows => {}
        }

        if configuration.buildsystem.is_visual_studio() && configuration.arch != STD_ARCH {
            args.push(format!("-DCMAKE_GENERATOR_PLATFORM={}", configuration.arch));
        }

        if let Some(config) = &configuration.config {
            args.push(format!("-DCMAKE_BUILD_TYPE={config}"));
        }

        args.extend(self.cmake_options.iter().map(|option| format!("-D{option}")));

        if let Some(generator) = &self.package_generator {
            args.push(format!("-DCPACK_GENERATOR={generator}"));
        }
        if let Some(folder) = &self.package_folder {
            let folder = if folder.is_absolute() {
                folder.clone()
            } else {
                self.base_build_dir.join(folder)
            };
            args.push(format!("-DCPACK_OUTPUT_FILE_PREFIX={}", folder.display()));
        }

        Ok(args)
    }

    fn mac_arguments(&self, args: &mut Vec<String>) -> Result<(), BauerError> {
        if self.configuration.arch != STD_ARCH {
            return Err(self.invalid_architecture());
        }
        if let Some(sdk) = &self.macos_sdk_path {
            args.push(format!("-DCMAKE_OSX_SYSROOT={sdk}"));
        }
        if let Some(version) = &self.macos_min_version {
            args.push(format!("-DCMAKE_OSX_DEPLOYMENT_TARGET={version}"));
        }
        Ok(())
    }

    fn ios_arguments(&self, args: &mut Vec<String>) -> Result<(), BauerError> {
        let arch = self.configuration.arch.as_str();
        if self.configuration.buildsystem == BuildSystem::Xcode && arch == STD_ARCH {
            args.push("-DCMAKE_SYSTEM_NAME=iOS".to_string());
            return Ok(());
        }

        let platform = match arch {
            "std" | "simulator" => "SIMULATOR64",
            "device" => "OS64",
            _ => return Err(self.invalid_architecture()),
        };
        args.push(format!("-DPLATFORM={platform}"));

        let toolchain_dir = self.toolchain_dir.as_ref().ok_or_else(|| {
            BauerError::Config(
                "iOS builds without Xcode need a toolchain directory ([build] toolchain_dir)"
                    .to_string(),
            )
        })?;
        let toolchain = toolchain_dir.join(IOS_TOOLCHAIN_FILE);
        if !toolchain.is_file() {
            return Err(BauerError::Config(format!(
                "Required CMake toolchain file not found: {}",
                toolchain.display()
            )));
        }
        args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.display()));
        Ok(())
    }

    fn android_arguments(&self, args: &mut Vec<String>) -> Result<(), BauerError> {
        let home = self.android_home.as_ref().ok_or_else(|| {
            BauerError::Config(
                "ANDROID_HOME is not set. Point it to the root of the Android SDK installation"
                    .to_string(),
            )
        })?;
        let home = home.to_string_lossy().replace('\\', "/");
        args.push(format!(
            "-DCMAKE_TOOLCHAIN_FILE={home}/ndk-bundle/build/cmake/android.toolchain.cmake"
        ));

        let arch = self.configuration.arch.as_str();
        if self.configuration.buildsystem == BuildSystem::AndroidStudio {
            let abi = if arch == STD_ARCH {
                ANDROID_STUDIO_FALLBACK_ABI
            } else {
                arch
            };
            args.push("-DCMAKE_SYSTEM_NAME=Android".to_string());
            args.push(format!("-DANDROID_ABI={abi}"));
            args.push(format!("-DANDROID_NATIVE_API_LEVEL={}", self.android_api_level));
            args.push("-DBAUER_RUN=Yes".to_string());
        } else {
            if arch == STD_ARCH {
                return Err(BauerError::InvalidArchitecture {
                    platform: Platform::Android.as_str().to_string(),
                    arch: format!(
                        "{arch} (an explicit ABI is required for {})",
                        self.configuration.buildsystem
                    ),
                });
            }
            args.push(format!("-DANDROID_ABI={arch}"));
            args.push(format!("-DANDROID_NATIVE_API_LEVEL={}", self.android_api_level));
            args.push("-DBDN_BUILD_TESTS=Off".to_string());
            args.push("-DBDN_BUILD_EXAMPLES=Off".to_string());
        }
        Ok(())
    }

    fn invalid_architecture(&self) -> BauerError {
        BauerError::InvalidArchitecture {
            platform: self.configuration.platform.as_str().to_string(),
            arch: self.configuration.arch.clone(),
        }
    }
}
