//! Inter-target dependency inference.
//!
//! CMake's server protocol reports a target's link line only as raw text.
//! The graph is inferred by looking for the file names of library artifacts
//! inside that text: a target depends on a library when any of the library's
//! artifact basenames occurs as a substring of the target's `linkLibraries`.
//!
//! This is a heuristic. A basename that happens to be a substring of an
//! unrelated token produces a false dependency (`foo.a` is found inside
//! `libfoo.a`). Duplicates are kept when a library has several matching
//! artifacts.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::cmake::ModelError;
use crate::model::{CodeModel, Configuration};

/// Target name → names of the targets it links against.
///
/// Every target of the configuration is a key, with an empty list when it
/// has no dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyGraph(BTreeMap<String, Vec<String>>);

impl DependencyGraph {
    /// Builds the graph for the only configuration of `model`.
    pub fn from_model(model: &CodeModel) -> Result<Self, ModelError> {
        Ok(Self::from_configuration(model.single_configuration()?))
    }

    pub fn from_configuration(configuration: &Configuration) -> Self {
        // Library name → artifact basenames, in model order.
        let mut producers: Vec<(&str, Vec<&str>)> = Vec::new();
        for target in configuration.targets() {
            if !target.target_type.is_library() || target.artifacts.is_empty() {
                continue;
            }
            let basenames = target
                .artifacts
                .iter()
                .map(|artifact| {
                    Path::new(artifact)
                        .file_name()
                        .and_then(|name| name.to_str())
                        .unwrap_or(artifact.as_str())
                })
                .collect();
            producers.push((target.name.as_str(), basenames));
        }

        let mut graph = BTreeMap::new();
        for target in configuration.targets() {
            let mut dependencies = Vec::new();
            if !target.link_libraries.is_empty() {
                for (producer, basenames) in &producers {
                    for basename in basenames {
                        if target.link_libraries.contains(basename) {
                            dependencies.push(producer.to_string());
                        }
                    }
                }
            }
            graph.insert(target.name.clone(), dependencies);
        }

        Self(graph)
    }

    /// Dependencies of `target`, or `None` for an unknown target.
    pub fn get(&self, target: &str) -> Option<&[String]> {
        self.0.get(target).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, dependencies)| (name.as_str(), dependencies.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
