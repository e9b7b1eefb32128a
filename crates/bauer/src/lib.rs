//! # bauer
//!
//! Command-line tool for preparing and building CMake projects across
//! desktop, iOS and Android.
//!
//! ## Quick Start
//!
//! ```bash
//! # Configure a debug makefile tree for Linux
//! bauer prepare --platform linux --build-system make --config Debug
//!
//! # Build it with 8 jobs
//! bauer build -j 8
//!
//! # Android, one ABI
//! bauer prepare -p android -b make -a arm64-v8a -c Release
//!
//! # Inspect the targets and their link dependencies
//! bauer targets -p linux
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prepare` | Configure and generate build trees through a CMake server session |
//! | `build` | Run `cmake --build` on prepared trees |
//! | `clean` | Build the `clean` target |
//! | `package` | Build the `package` target (CPack) |
//! | `targets` | Print code model and dependency graph as JSON |
//! | `list` | List prepared build trees |
//!
//! ## Build Folder
//!
//! ```text
//! build/
//! └── <platform>/<arch>/<buildsystem>[/<config>]/
//!     ├── .generateProjects.state
//!     ├── codemodel.debug.json     (with -d)
//!     ├── cache.debug.json         (with -d)
//!     └── android-project.json     (android only)
//! ```
//!
//! Set `RUST_LOG` to tune log output; `-d` switches to debug level.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bauer_sdk::builders::{
    AndroidProject, BuildExecutor, BuildFolder, BuildSystem, CacheArguments, PreparedState,
    Selection, android_home,
};
use bauer_sdk::cmake::{ServerClient, SessionOptions};
use bauer_sdk::{BuildConfiguration, Platform, STD_ARCH};

pub mod config;

use config::ConfigResolver;

/// Configuration kept by multi-config trees when none is selected.
const DEFAULT_MULTI_CONFIG: &str = "Debug";

/// Sub-folder of Android Studio trees holding the temporary makefile tree.
const ANDROID_STUDIO_CMAKE_DIR: &str = "tmp-cmake-gen";

/// Cross-platform CMake build orchestrator.
#[derive(Parser, Debug)]
#[command(name = "bauer", author, version, about = "Cross-platform CMake build orchestrator", long_about = None)]
struct Cli {
    /// Log debug output and write code model / cache dumps
    #[arg(long = "enable-debug-output", short = 'd', global = true)]
    debug: bool,

    /// Path to the config file (default: discover bauer.toml)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// cmake executable to use
    #[arg(long, global = true)]
    cmake: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Which build trees a command applies to.
#[derive(Args, Debug, Clone, Default)]
struct SelectionArgs {
    #[arg(long, short = 'p')]
    platform: Option<Platform>,

    #[arg(long, short = 'a', help = "Architecture / ABI, 'std' for the toolchain default")]
    arch: Option<String>,

    #[arg(long, short = 'b')]
    build_system: Option<BuildSystem>,

    #[arg(long, short = 'c', help = "Build configuration, e.g. Debug or Release")]
    config: Option<String>,

    #[arg(long, help = "Build folder (default: ./build)")]
    build_folder: Option<PathBuf>,
}

impl SelectionArgs {
    fn selection(&self) -> Selection {
        Selection {
            platform: self.platform,
            arch: self.arch.clone(),
            build_system: self.build_system,
            config: self.config.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct PrepareArgs {
    /// Extra CMake cache option (KEY=VALUE), repeatable
    #[arg(long = "cmake-option", short = 'D')]
    cmake_option: Vec<String>,

    #[arg(long, help = "CPack generator, e.g. ZIP")]
    package_generator: Option<String>,

    #[arg(long, help = "Package output folder, relative to the build folder")]
    package_folder: Option<PathBuf>,

    #[arg(long)]
    macos_sdk_path: Option<String>,

    #[arg(long)]
    macos_min_version: Option<String>,

    #[arg(long, short = 't', help = "Only describe this Android app target")]
    target: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Configure and generate build trees.
    Prepare {
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        options: PrepareArgs,
    },
    /// Build prepared trees.
    Build {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, short = 't')]
        target: Option<String>,
        #[arg(long, short = 'j')]
        jobs: Option<u32>,
    },
    /// Build the clean target of prepared trees.
    Clean {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Build the package target of prepared trees.
    Package {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, short = 'j')]
        jobs: Option<u32>,
    },
    /// Print the code model and target dependencies of prepared trees as JSON.
    Targets {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List prepared build trees.
    List {
        #[arg(long, help = "Build folder (default: ./build)")]
        build_folder: Option<PathBuf>,
    },
}

/// State shared by all commands of one invocation.
struct Workspace {
    source_dir: PathBuf,
    resolver: ConfigResolver,
    cmake: PathBuf,
    debug_output: bool,
}

impl Workspace {
    fn build_folder(&self, cli_folder: Option<&Path>) -> BuildFolder {
        let folder = cli_folder.or(self.resolver.config.build.folder.as_deref());
        BuildFolder::new(&self.source_dir, folder)
    }

    fn session_options(
        &self,
        configuration: &BuildConfiguration,
        cmake_build_dir: &Path,
        android_home: Option<&Path>,
    ) -> SessionOptions {
        let mut options = SessionOptions::new(
            &self.source_dir,
            cmake_build_dir,
            configuration.buildsystem.cmake_generator(),
        )
        .envs(self.resolver.config.env.clone());

        if let Some(home) = android_home {
            options = options.env("ANDROID_HOME", home.to_string_lossy().replace('\\', "/"));
        }
        if let Some(timeout) = self.resolver.config.cmake.receive_timeout() {
            options = options.receive_timeout(timeout);
        }
        options
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let source_dir = std::env::current_dir().context("Failed to get current directory")?;
    let resolver = ConfigResolver::load(&source_dir, cli.config_file.as_deref())?;
    if let Some(path) = &resolver.config_path {
        debug!("Using config file {}", path.display());
    }

    let workspace = Workspace {
        cmake: resolver.cmake_executable(cli.cmake.clone()),
        source_dir,
        resolver,
        debug_output: cli.debug,
    };
    debug!("CMake: {}", workspace.cmake.display());

    match cli.command {
        Command::Prepare { selection, options } => cmd_prepare(&workspace, &selection, &options),
        Command::Build {
            selection,
            target,
            jobs,
        } => cmd_build(&workspace, &selection, target.as_deref(), jobs),
        Command::Clean { selection } => cmd_build(&workspace, &selection, Some("clean"), None),
        Command::Package { selection, jobs } => {
            cmd_build(&workspace, &selection, Some("package"), jobs)
        }
        Command::Targets { selection } => cmd_targets(&workspace, &selection),
        Command::List { build_folder } => cmd_list(&workspace, build_folder.as_deref()),
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_env_filter(filter)
        .init();
}

fn selected_configurations(
    folder: &BuildFolder,
    selection: &SelectionArgs,
) -> Result<Vec<BuildConfiguration>> {
    let configurations = folder.configurations_for_command(&selection.selection())?;
    if configurations.is_empty() {
        bail!(
            "No matching build configuration in {}.\n\n\
             Pass --platform and --build-system (plus --config for make or ninja) \
             or run 'bauer list' to see prepared trees.",
            folder.base_dir().display()
        );
    }
    Ok(configurations)
}

/// Directory the CMake server configures for `configuration`.
fn cmake_build_dir(folder: &BuildFolder, configuration: &BuildConfiguration) -> PathBuf {
    let dir = folder.build_dir(configuration);
    if configuration.buildsystem == BuildSystem::AndroidStudio {
        dir.join(ANDROID_STUDIO_CMAKE_DIR)
    } else {
        dir
    }
}

/// Cache arguments for one prepare, including the config file options.
fn prepare_arguments(
    workspace: &Workspace,
    folder: &BuildFolder,
    configuration: &BuildConfiguration,
    selected_config: Option<&str>,
    options: &PrepareArgs,
    android_home: Option<PathBuf>,
) -> Result<Vec<String>> {
    let config = &workspace.resolver.config;
    let mut args = CacheArguments::new(configuration, folder.base_dir())
        .package_generator(options.package_generator.clone())
        .package_folder(options.package_folder.clone())
        .macos_sdk_path(options.macos_sdk_path.clone().or(config.macos.sdk_path.clone()))
        .macos_min_version(
            options
                .macos_min_version
                .clone()
                .or(config.macos.min_version.clone()),
        )
        .toolchain_dir(config.build.toolchain_dir.as_ref().map(|dir| workspace.source_dir.join(dir)))
        .android_home(android_home)
        .android_api_level(config.android.api_level.clone())
        .cmake_options(workspace.resolver.cmake_options(&options.cmake_option))
        .compose()?;

    // One session reports exactly one configuration, so multi-config
    // generators are limited to the selected one.
    let buildsystem = configuration.buildsystem;
    if !buildsystem.is_single_config() && buildsystem != BuildSystem::AndroidStudio {
        let config = selected_config.unwrap_or(DEFAULT_MULTI_CONFIG);
        args.push(format!("-DCMAKE_CONFIGURATION_TYPES={config}"));
    }
    Ok(args)
}

fn cmd_prepare(workspace: &Workspace, selection: &SelectionArgs, options: &PrepareArgs) -> Result<()> {
    let folder = workspace.build_folder(selection.build_folder.as_deref());
    for configuration in selected_configurations(&folder, selection)? {
        prepare_configuration(workspace, &folder, &configuration, selection, options)
            .with_context(|| format!("Failed to prepare {}", configuration))?;
    }
    Ok(())
}

fn prepare_configuration(
    workspace: &Workspace,
    folder: &BuildFolder,
    configuration: &BuildConfiguration,
    selection: &SelectionArgs,
    options: &PrepareArgs,
) -> Result<()> {
    info!("Preparing {}", configuration);

    let build_dir = folder.build_dir(configuration);
    let cmake_dir = cmake_build_dir(folder, configuration);
    let android_home = match configuration.platform {
        Platform::Android => android_home(workspace.resolver.config.android.home.as_deref()),
        _ => None,
    };

    let args = prepare_arguments(
        workspace,
        folder,
        configuration,
        selection.config.as_deref(),
        options,
        android_home.clone(),
    )?;
    let session = workspace.session_options(configuration, &cmake_dir, android_home.as_deref());

    debug!("Starting configure ...");
    debug!(" Source Directory: {}", workspace.source_dir.display());
    debug!(" Output Directory: {}", cmake_dir.display());
    debug!(" Arguments: {:?}", args);
    debug!(" Generator: {}", session.generator);

    let mut client = ServerClient::open(&workspace.cmake, session)?;
    let result = client.configure(&args)?;

    if workspace.debug_output {
        result
            .write_debug_dump(&build_dir)
            .with_context(|| format!("Failed to write debug dumps to {:?}", build_dir))?;
    }

    if configuration.platform == Platform::Android {
        let abi = (configuration.arch != STD_ARCH).then_some(configuration.arch.as_str());
        let project = AndroidProject::describe(
            &result,
            client.global_settings(),
            abi,
            options.target.as_deref(),
        )?;
        let path = project.write(&build_dir)?;
        info!("Android project description: {}", path.display());
    }

    let names = result
        .code_model
        .configuration_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    folder.mark_prepared(&PreparedState::new(configuration, names))?;
    info!("Prepared {}", build_dir.display());
    Ok(())
}

fn cmd_build(
    workspace: &Workspace,
    selection: &SelectionArgs,
    target: Option<&str>,
    jobs: Option<u32>,
) -> Result<()> {
    let folder = workspace.build_folder(selection.build_folder.as_deref());
    let executor = BuildExecutor::new(&workspace.cmake).jobs(workspace.resolver.jobs(jobs));

    for configuration in selected_configurations(&folder, selection)? {
        let state = folder.read_state(&configuration)?;
        let configs = match &selection.config {
            Some(config) if !configuration.buildsystem.is_single_config() => vec![config.clone()],
            _ => state.configurations,
        };

        let invocations = executor.build_commands(
            &folder.build_dir(&configuration),
            configuration.buildsystem,
            target,
            &configs,
        )?;
        executor
            .run_all(&invocations)
            .with_context(|| format!("Failed to build {}", configuration))?;
    }
    Ok(())
}

fn cmd_targets(workspace: &Workspace, selection: &SelectionArgs) -> Result<()> {
    let folder = workspace.build_folder(selection.build_folder.as_deref());
    let mut trees = Vec::new();

    for configuration in selected_configurations(&folder, selection)? {
        folder.read_state(&configuration)?;

        let cmake_dir = cmake_build_dir(&folder, &configuration);
        let session = workspace.session_options(&configuration, &cmake_dir, None);
        let mut client = ServerClient::open(&workspace.cmake, session)?;
        let result = client
            .configure(&[])
            .with_context(|| format!("Failed to read the code model of {}", configuration))?;
        let graph = result.dependency_graph()?;

        trees.push(json!({
            "configuration": configuration,
            "buildDirectory": folder.build_dir(&configuration),
            "codemodel": result.code_model,
            "dependencies": graph,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&trees)?);
    Ok(())
}

fn cmd_list(workspace: &Workspace, build_folder: Option<&Path>) -> Result<()> {
    let folder = workspace.build_folder(build_folder);
    let existing = folder.existing_configurations()?;

    if existing.is_empty() {
        println!("No prepared build trees in {}.", folder.base_dir().display());
        println!("\nTo prepare one:");
        println!("  bauer prepare --platform <platform> --build-system <system> [--config <config>]");
        return Ok(());
    }

    println!("Found {} prepared build tree(s):", existing.len());
    for configuration in existing {
        println!("  - {:<32} {}", configuration.to_string(), folder.build_dir(&configuration).display());
    }
    Ok(())
}
