//! Build-model SDK for CMake projects
//!
//! `bauer-sdk` drives CMake in server mode (`cmake -E server`) to configure a
//! build tree and read back what CMake knows about it: projects, targets,
//! artifacts, compile definitions and the cache. On top of that it infers the
//! link dependencies between targets and orchestrates cross-platform build
//! trees for desktop, iOS and Android.
//!
//! # Architecture
//!
//! - **cmake**: framed JSON transport, typed protocol messages and the session
//!   state machine ([`cmake::ServerClient`])
//! - **model**: the code model (configurations → projects → targets)
//! - **dependencies**: target → linked library targets
//! - **builders**: build folders, generators, cache arguments, `cmake --build`
//!   and Android project descriptions
//!
//! # Example
//!
//! ```ignore
//! use bauer_sdk::cmake::{ServerClient, SessionOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), bauer_sdk::BauerError> {
//!     let options = SessionOptions::new("/src/app", "/src/app/build/linux/std/make/Debug", "Unix Makefiles");
//!     let mut client = ServerClient::open(Path::new("cmake"), options)?;
//!     let result = client.configure(&["-DCMAKE_BUILD_TYPE=Debug".to_string()])?;
//!
//!     for (target, dependencies) in result.dependency_graph().map_err(bauer_sdk::cmake::ServerError::from)?.iter() {
//!         println!("{target}: {dependencies:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod builders;
pub mod cmake;
pub mod dependencies;
pub mod model;
pub mod types;

pub use cmake::{ConfigureResult, ServerClient, ServerError, SessionOptions};
pub use dependencies::DependencyGraph;
pub use model::{CodeModel, Configuration, Project, Target, TargetType, from_defines};
pub use types::{BauerError, BuildConfiguration, Platform, STD_ARCH};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
