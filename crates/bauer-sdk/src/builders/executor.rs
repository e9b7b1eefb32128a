//! Running `cmake --build` on prepared build trees.
//!
//! Command lines are computed up front as [`BuildInvocation`]s so they can be
//! logged, inspected and tested without starting a tool.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use super::generator::BuildSystem;
use crate::types::BauerError;

/// One external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables added to the tool's environment.
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
}

impl BuildInvocation {
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.working_dir);
        cmd
    }
}

impl fmt::Display for BuildInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "\"{}\"", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Builds targets in a build tree with `cmake --build`.
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    cmake: PathBuf,
    jobs: Option<u32>,
}

impl BuildExecutor {
    pub fn new(cmake: impl Into<PathBuf>) -> Self {
        Self {
            cmake: cmake.into(),
            jobs: None,
        }
    }

    /// Parallel jobs. Visual Studio gets `CL=/MP<N>`, Xcode ignores it.
    pub fn jobs(mut self, jobs: Option<u32>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Command lines building `target` (or the default target).
    ///
    /// Single-config build systems get one invocation without `--config`;
    /// multi-config build systems get one per entry of `configs`.
    pub fn build_commands(
        &self,
        build_dir: &Path,
        buildsystem: BuildSystem,
        target: Option<&str>,
        configs: &[String],
    ) -> Result<Vec<BuildInvocation>, BauerError> {
        if buildsystem == BuildSystem::AndroidStudio {
            return Err(BauerError::Build(format!(
                "{} trees are built with Gradle, not with cmake --build.\n\n\
                 Prepare a 'make' build tree to build native targets from the command line.",
                buildsystem
            )));
        }

        if buildsystem.is_single_config() {
            return Ok(vec![self.invocation(build_dir, buildsystem, target, None)]);
        }

        if configs.is_empty() {
            return Err(BauerError::Build(format!(
                "No configuration to build in {}",
                build_dir.display()
            )));
        }
        Ok(configs
            .iter()
            .map(|config| self.invocation(build_dir, buildsystem, target, Some(config)))
            .collect())
    }

    fn invocation(
        &self,
        build_dir: &Path,
        buildsystem: BuildSystem,
        target: Option<&str>,
        config: Option<&str>,
    ) -> BuildInvocation {
        let mut args = vec!["--build".to_string(), build_dir.display().to_string()];
        let mut env = Vec::new();

        if let Some(target) = target {
            args.extend(["--target".to_string(), target.to_string()]);
        }
        if let Some(config) = config {
            args.extend(["--config".to_string(), config.to_string()]);
        }
        if let Some(jobs) = self.jobs {
            if buildsystem.is_visual_studio() {
                env.push(("CL".to_string(), format!("/MP{jobs}")));
            } else if buildsystem != BuildSystem::Xcode {
                args.extend(["--".to_string(), format!("-j{jobs}")]);
            }
        }

        BuildInvocation {
            program: self.cmake.clone(),
            args,
            env,
            working_dir: build_dir.to_path_buf(),
        }
    }

    /// Runs every invocation in order, stopping at the first failure.
    pub fn run_all(&self, invocations: &[BuildInvocation]) -> Result<(), BauerError> {
        invocations.iter().try_for_each(run)
    }
}

/// Runs one invocation with inherited stdio.
///
/// A non-zero exit status is reported as [`BauerError::ToolFailed`].
pub fn run(invocation: &BuildInvocation) -> Result<(), BauerError> {
    let command_line = invocation.to_string();
    info!("Calling: {}", command_line);

    let status = invocation.to_command().status().map_err(|e| {
        BauerError::Build(format!(
            "Failed to start {}.\n\n\
             Error: {}\n\n\
             Ensure the tool is installed and available on PATH.",
            invocation.program.display(),
            e
        ))
    })?;

    if !status.success() {
        return Err(BauerError::ToolFailed {
            command: command_line,
            exit_code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_single_config_command() {
        let executor = BuildExecutor::new("cmake").jobs(Some(8));
        let commands = executor
            .build_commands(Path::new("/b/linux/std/make/Debug"), BuildSystem::Make, Some("app"), &[])
            .unwrap();

        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].args,
            ["--build", "/b/linux/std/make/Debug", "--target", "app", "--", "-j8"]
        );
        assert!(commands[0].env.is_empty());
        assert_eq!(commands[0].working_dir, Path::new("/b/linux/std/make/Debug"));
    }

    #[test]
    fn test_multi_config_commands() {
        let executor = BuildExecutor::new("cmake").jobs(Some(4));
        let commands = executor
            .build_commands(
                Path::new("/b/ios/std/xcode"),
                BuildSystem::Xcode,
                None,
                &configs(&["Debug", "Release"]),
            )
            .unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[1].args,
            ["--build", "/b/ios/std/xcode", "--config", "Release"]
        );
    }

    #[test]
    fn test_visual_studio_jobs_use_env() {
        let executor = BuildExecutor::new("cmake").jobs(Some(6));
        let commands = executor
            .build_commands(
                Path::new("/b/windows/std/vs2019"),
                BuildSystem::Vs2019,
                Some("package"),
                &configs(&["Debug"]),
            )
            .unwrap();

        assert_eq!(commands[0].env, [("CL".to_string(), "/MP6".to_string())]);
        assert!(!commands[0].args.iter().any(|a| a.starts_with("-j")));
        assert_eq!(
            commands[0].to_string(),
            "CL=/MP6 \"cmake\" --build /b/windows/std/vs2019 --target package --config Debug"
        );
    }

    #[test]
    fn test_multi_config_needs_configs() {
        let executor = BuildExecutor::new("cmake");
        assert!(executor
            .build_commands(Path::new("/b"), BuildSystem::Ninja, None, &[])
            .is_ok());
        assert!(executor
            .build_commands(Path::new("/b"), BuildSystem::Xcode, None, &[])
            .is_err());
        assert!(executor
            .build_commands(Path::new("/b"), BuildSystem::AndroidStudio, None, &configs(&["Debug"]))
            .is_err());
    }

    #[test]
    fn test_run_not_found() {
        let invocation = BuildInvocation {
            program: PathBuf::from("nonexistent-command-12345"),
            args: vec![],
            env: vec![],
            working_dir: std::env::temp_dir(),
        };
        let err = run(&invocation).unwrap_err();
        assert!(err.to_string().contains("Failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit() {
        let invocation = BuildInvocation {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            env: vec![],
            working_dir: std::env::temp_dir(),
        };
        match run(&invocation) {
            Err(BauerError::ToolFailed { exit_code, command }) => {
                assert_eq!(exit_code, 3);
                assert!(command.contains("exit 3"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
