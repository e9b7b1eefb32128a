//! Typed project model extracted from the CMake server `codemodel` reply.
//!
//! The tree mirrors the reply: [`CodeModel`] → [`Configuration`] →
//! [`Project`] → [`Target`]. Fields the server may omit default to empty
//! values, and target types outside the four kinds the orchestrator cares
//! about collapse to [`TargetType::Other`].

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cmake::ModelError;

/// Kind of a CMake target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    Executable,
    SharedLibrary,
    StaticLibrary,
    #[default]
    #[serde(other)]
    Other,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Executable => "EXECUTABLE",
            TargetType::SharedLibrary => "SHARED_LIBRARY",
            TargetType::StaticLibrary => "STATIC_LIBRARY",
            TargetType::Other => "OTHER",
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(self, TargetType::SharedLibrary | TargetType::StaticLibrary)
    }
}

/// A group of sources sharing compile settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileGroup {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub defines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub name: String,
    /// File name of the primary output, e.g. `libfoo.so` or `app.exe`.
    #[serde(default)]
    pub full_name: String,
    #[serde(rename = "type", default)]
    pub target_type: TargetType,
    #[serde(default)]
    pub source_directory: String,
    #[serde(default)]
    pub build_directory: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Raw linker arguments as reported by the server.
    #[serde(default)]
    pub link_libraries: String,
    #[serde(default)]
    pub file_groups: Vec<FileGroup>,
}

impl Target {
    /// The artifact whose file name equals [`Target::full_name`].
    pub fn artifact_path(&self) -> Option<&Path> {
        let full_name = OsStr::new(&self.full_name);
        self.artifacts
            .iter()
            .map(Path::new)
            .find(|artifact| artifact.file_name() == Some(full_name))
    }

    /// Like [`Target::artifact_path`], but a missing artifact is a [`ModelError`].
    pub fn require_artifact_path(&self) -> Result<&Path, ModelError> {
        self.artifact_path()
            .ok_or_else(|| ModelError::ArtifactNotFound(self.name.clone()))
    }

    /// All preprocessor definitions of all file groups, in order.
    pub fn defines(&self) -> Vec<&str> {
        self.file_groups
            .iter()
            .flat_map(|group| group.defines.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub source_directory: String,
    #[serde(default)]
    pub build_directory: String,
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Set by the client for the project rooted at the session's source directory.
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Empty for single-configuration generators.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Configuration {
    pub fn main_project(&self) -> Option<&Project> {
        self.projects.iter().find(|project| project.is_main)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.projects.iter().flat_map(|project| project.targets.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeModel {
    #[serde(default)]
    pub configurations: Vec<Configuration>,
}

impl CodeModel {
    /// Decodes the payload fields of a `codemodel` reply.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(payload))
    }

    /// The only configuration of the model.
    pub fn single_configuration(&self) -> Result<&Configuration, ModelError> {
        match self.configurations.as_slice() {
            [configuration] => Ok(configuration),
            other => Err(ModelError::ConfigurationCount(other.len())),
        }
    }

    /// Names of all configurations, in reply order.
    pub fn configuration_names(&self) -> Vec<&str> {
        self.configurations
            .iter()
            .map(|configuration| configuration.name.as_str())
            .collect()
    }

    /// Flags, per configuration, the first project whose source directory
    /// resolves to `source_directory`.
    pub fn mark_main_projects(&mut self, source_directory: &Path) {
        let wanted = real_path(source_directory);
        debug!("comparing project directories against {}", wanted.display());

        for configuration in &mut self.configurations {
            let mut found = false;
            for project in &mut configuration.projects {
                let candidate = real_path(Path::new(&project.source_directory));
                debug!("  with {}", candidate.display());
                project.is_main = !found && candidate == wanted;
                if project.is_main {
                    found = true;
                    debug!(
                        "main project for '{}': {}",
                        configuration.name, project.name
                    );
                }
            }
        }
    }

    /// Finds the executable target `target_name` in configuration
    /// `config_name`.
    ///
    /// Configurations named `""` (single-configuration generators) match any
    /// `config_name`. When several targets match, the last one scanned wins.
    pub fn find_executable_target(
        &self,
        config_name: &str,
        target_name: &str,
    ) -> Result<&Target, ModelError> {
        let mut found = None;

        for configuration in &self.configurations {
            if !configuration.name.is_empty() && configuration.name != config_name {
                continue;
            }
            debug!("found config: {}", configuration.name);

            for project in &configuration.projects {
                debug!(" found project: {}", project.name);
                for target in &project.targets {
                    debug!("  found target: {}", target.name);
                    if target.name == target_name {
                        found = Some(target);
                    }
                }
            }
        }

        let target = found.ok_or_else(|| ModelError::TargetNotFound(target_name.to_string()))?;
        if target.target_type != TargetType::Executable {
            return Err(ModelError::NotExecutable(target_name.to_string()));
        }
        Ok(target)
    }
}

/// Looks up `key=value` in a list of preprocessor definitions.
///
/// Returns the value of the first definition starting with `key=`, or
/// `default` when there is none.
pub fn from_defines<S: AsRef<str>>(defines: &[S], key: &str, default: &str) -> String {
    let Ok(pattern) = Regex::new(&format!("^{}=(.*)", regex::escape(key))) else {
        return default.to_string();
    };

    defines
        .iter()
        .find_map(|define| {
            pattern
                .captures(define.as_ref())
                .and_then(|captures| captures.get(1))
                .map(|value| value.as_str().to_string())
        })
        .unwrap_or_else(|| default.to_string())
}

fn real_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
