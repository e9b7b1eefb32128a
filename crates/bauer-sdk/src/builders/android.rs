//! Android project description.
//!
//! After an Android configure cycle the main project's targets, the per-app
//! metadata from the code model and the Android settings from the CMake
//! cache are gathered into an [`AndroidProject`]. Gradle tooling consumes the
//! JSON written by [`AndroidProject::write`].

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::cmake::{ConfigureResult, GlobalSettings};
use crate::dependencies::DependencyGraph;
use crate::model::{TargetType, from_defines};
use crate::types::BauerError;

pub const ANDROID_VERSION_KEY: &str = "ANDROID_VERSION";
pub const ANDROID_VERSION_ID_KEY: &str = "ANDROID_VERSION_ID";
pub const ANDROID_APP_ID_KEY: &str = "ANDROID_APP_ID";

pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_VERSION_ID: &str = "1";
pub const DEFAULT_APP_ID: &str = "io.boden.android.notset";

const TARGET_SDK_CACHE_KEY: &str = "BDN_ANDROID_TARGET_SDK_VERSION";
const MIN_SDK_CACHE_KEY: &str = "BDN_ANDROID_MIN_SDK_VERSION";
const DEPENDENCIES_CACHE_KEY: &str = "BAUER_ANDROID_DEPENDENCIES";
const EXTRA_JAVA_CACHE_KEY: &str = "BAUER_ANDROID_EXTRA_JAVA_DIRECTORIES";

/// File name of the description inside the build tree.
pub const DESCRIPTION_FILE: &str = "android-project.json";

/// An executable target packaged as an Android app module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidApp {
    pub name: String,
    pub version: String,
    pub version_id: String,
    pub app_id: String,
    pub source_directory: String,
    pub build_directory: String,
    /// Targets this app links against.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidProject {
    pub name: String,
    pub source_directory: String,
    /// SHARED_LIBRARY, STATIC_LIBRARY and EXECUTABLE targets of the project.
    pub target_names: Vec<String>,
    pub apps: Vec<AndroidApp>,
    pub libraries: Vec<String>,
    pub abi: Option<String>,
    pub target_sdk_version: Option<String>,
    pub min_sdk_version: Option<String>,
    /// Gradle `implementation` dependencies.
    pub dependencies: Vec<String>,
    pub extra_java_directories: Vec<String>,
    pub cmake_version: Option<String>,
    pub target_dependencies: DependencyGraph,
}

impl AndroidProject {
    /// Describes the main project of `result`.
    ///
    /// `app_filter` restricts the apps to one executable target.
    pub fn describe(
        result: &ConfigureResult,
        global_settings: &GlobalSettings,
        abi: Option<&str>,
        app_filter: Option<&str>,
    ) -> Result<Self, BauerError> {
        let configuration = result.configuration().map_err(crate::cmake::ServerError::from)?;
        let target_dependencies = DependencyGraph::from_configuration(configuration);

        let project = configuration.main_project().ok_or_else(|| {
            BauerError::Build(
                "No project in the code model matches the source directory.\n\n\
                 Run bauer from the directory containing the top-level CMakeLists.txt."
                    .to_string(),
            )
        })?;
        debug!("Found project: {}", project.name);

        let mut target_names = Vec::new();
        let mut apps = Vec::new();
        let mut libraries = Vec::new();

        for target in &project.targets {
            if !matches!(
                target.target_type,
                TargetType::SharedLibrary | TargetType::StaticLibrary | TargetType::Executable
            ) {
                continue;
            }
            debug!("Found target: {}", target.name);
            target_names.push(target.name.clone());

            if target.target_type != TargetType::Executable {
                libraries.push(target.name.clone());
                continue;
            }
            if app_filter.is_some_and(|wanted| wanted != target.name) {
                continue;
            }

            let defines = target.defines();
            apps.push(AndroidApp {
                name: target.name.clone(),
                version: from_defines(&defines, ANDROID_VERSION_KEY, DEFAULT_VERSION),
                version_id: from_defines(&defines, ANDROID_VERSION_ID_KEY, DEFAULT_VERSION_ID),
                app_id: from_defines(&defines, ANDROID_APP_ID_KEY, DEFAULT_APP_ID),
                source_directory: target.source_directory.clone(),
                build_directory: target.build_directory.clone(),
                dependencies: target_dependencies
                    .get(&target.name)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default(),
            });
        }

        let dependencies = split_list(result.cache_value(DEPENDENCIES_CACHE_KEY));
        let extra_java_directories = split_list(result.cache_value(EXTRA_JAVA_CACHE_KEY));
        debug!("Dependencies: {:?}", dependencies);
        debug!("Extra Java Directories: {:?}", extra_java_directories);

        Ok(Self {
            name: project.name.clone(),
            source_directory: project.source_directory.clone(),
            target_names,
            apps,
            libraries,
            abi: abi.map(str::to_string),
            target_sdk_version: result.cache_value(TARGET_SDK_CACHE_KEY).map(str::to_string),
            min_sdk_version: result.cache_value(MIN_SDK_CACHE_KEY).map(str::to_string),
            dependencies,
            extra_java_directories,
            cmake_version: global_settings.version_string().map(str::to_string),
            target_dependencies,
        })
    }

    /// Writes the description as pretty JSON into `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, BauerError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(DESCRIPTION_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// `;` separated CMake list, without empty elements.
fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(';')
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Locates the Android SDK.
///
/// Order: `configured`, then `$ANDROID_HOME`, then the default SDK location
/// of the host if it exists.
pub fn android_home(configured: Option<&Path>) -> Option<PathBuf> {
    let user_home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"));
    resolve_android_home(configured, env::var_os("ANDROID_HOME"), user_home)
}

fn resolve_android_home(
    configured: Option<&Path>,
    env_value: Option<OsString>,
    user_home: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }

    let relative = if cfg!(target_os = "macos") {
        "Library/Android/sdk"
    } else if cfg!(windows) {
        "AppData/Local/Android/SDK"
    } else {
        "Android/Sdk"
    };
    let candidate = PathBuf::from(user_home?).join(relative);
    if candidate.is_dir() {
        info!("Android home directory automatically detected as: {}", candidate.display());
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeModel, Configuration, FileGroup, Project, Target};
    use std::collections::BTreeMap;

    fn target(name: &str, target_type: TargetType, defines: &[&str]) -> Target {
        Target {
            name: name.to_string(),
            target_type,
            artifacts: vec![format!("/build/lib{name}.so")],
            file_groups: vec![FileGroup {
                language: Some("CXX".to_string()),
                defines: defines.iter().map(|d| d.to_string()).collect(),
            }],
            ..Target::default()
        }
    }

    fn result(cache: &[(&str, &str)]) -> ConfigureResult {
        let mut app = target(
            "demo",
            TargetType::Executable,
            &["ANDROID_APP_ID=com.example.demo", "ANDROID_VERSION=2.1"],
        );
        app.link_libraries = "/build/libui.so -llog".to_string();

        let project = Project {
            name: "demo-project".to_string(),
            source_directory: "/src".to_string(),
            is_main: true,
            targets: vec![
                target("ui", TargetType::SharedLibrary, &[]),
                app,
                target("tool", TargetType::Executable, &[]),
                target("assets", TargetType::Other, &[]),
            ],
            ..Project::default()
        };
        ConfigureResult {
            code_model: CodeModel {
                configurations: vec![Configuration {
                    name: String::new(),
                    projects: vec![project],
                }],
            },
            cache: cache
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_describe_app_metadata() {
        let settings: GlobalSettings = serde_json::from_value(serde_json::json!({
            "capabilities": {"version": {"string": "3.14.5"}}
        }))
        .unwrap();
        let result = result(&[
            (TARGET_SDK_CACHE_KEY, "28"),
            (MIN_SDK_CACHE_KEY, "21"),
            (DEPENDENCIES_CACHE_KEY, "androidx.appcompat:appcompat:1.0.2;"),
            (EXTRA_JAVA_CACHE_KEY, ""),
        ]);

        let project = AndroidProject::describe(&result, &settings, Some("x86"), None).unwrap();
        assert_eq!(project.name, "demo-project");
        assert_eq!(project.target_names, ["ui", "demo", "tool"]);
        assert_eq!(project.libraries, ["ui"]);
        assert_eq!(project.apps.len(), 2);

        let demo = &project.apps[0];
        assert_eq!(demo.app_id, "com.example.demo");
        assert_eq!(demo.version, "2.1");
        assert_eq!(demo.version_id, DEFAULT_VERSION_ID);
        assert_eq!(demo.dependencies, ["ui"]);

        let tool = &project.apps[1];
        assert_eq!(tool.app_id, DEFAULT_APP_ID);
        assert_eq!(tool.version, DEFAULT_VERSION);

        assert_eq!(project.target_sdk_version.as_deref(), Some("28"));
        assert_eq!(project.min_sdk_version.as_deref(), Some("21"));
        assert_eq!(project.dependencies, ["androidx.appcompat:appcompat:1.0.2"]);
        assert!(project.extra_java_directories.is_empty());
        assert_eq!(project.cmake_version.as_deref(), Some("3.14.5"));
        assert_eq!(project.abi.as_deref(), Some("x86"));
    }

    #[test]
    fn test_app_filter() {
        let project =
            AndroidProject::describe(&result(&[]), &GlobalSettings::default(), None, Some("tool"))
                .unwrap();
        let names: Vec<_> = project.apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["tool"]);
        assert_eq!(project.target_sdk_version, None);
    }

    #[test]
    fn test_no_main_project() {
        let mut result = result(&[]);
        result.code_model.configurations[0].projects[0].is_main = false;
        let err = AndroidProject::describe(&result, &GlobalSettings::default(), None, None)
            .unwrap_err();
        assert!(matches!(err, BauerError::Build(_)));
    }

    #[test]
    fn test_write_description() {
        let dir = tempfile::tempdir().unwrap();
        let project =
            AndroidProject::describe(&result(&[]), &GlobalSettings::default(), None, None).unwrap();
        let path = project.write(dir.path()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["apps"][0]["app_id"], "com.example.demo");
        assert_eq!(json["target_dependencies"]["demo"], serde_json::json!(["ui"]));
    }

    #[test]
    fn test_resolve_android_home() {
        assert_eq!(
            resolve_android_home(Some(Path::new("/cfg")), Some("/env".into()), None),
            Some(PathBuf::from("/cfg"))
        );
        assert_eq!(
            resolve_android_home(None, Some("/env".into()), None),
            Some(PathBuf::from("/env"))
        );

        let home = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_android_home(None, Some("".into()), Some(home.path().into())),
            None
        );
    }
}
