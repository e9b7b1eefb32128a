//! Build orchestration on top of the CMake server client.
//!
//! ## Overview
//!
//! A `prepare` turns a [`BuildConfiguration`](crate::BuildConfiguration) into
//! a configured build tree:
//!
//! 1. **Layout** - [`BuildFolder`] maps the configuration to
//!    `<build folder>/<platform>/<arch>/<buildsystem>[/<config>]`
//! 2. **Generator** - [`BuildSystem`] picks the CMake generator
//! 3. **Cache arguments** - [`CacheArguments`] adds toolchain, ABI, SDK and
//!    packaging settings plus the user's `-D` options
//! 4. **Configure** - a [`ServerClient`](crate::cmake::ServerClient) session
//!    configures and generates the tree
//!
//! `build`, `clean` and `package` then run `cmake --build` through
//! [`BuildExecutor`]. Android trees additionally get an [`AndroidProject`]
//! description.
//!
//! ## Builders
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`BuildFolder`] | Build tree paths and discovery of prepared trees |
//! | [`CacheArguments`] | `configure` cache arguments per platform |
//! | [`BuildExecutor`] | `cmake --build` command lines |
//! | [`AndroidProject`] | Android app/module description |

pub mod android;
pub mod arguments;
pub mod executor;
pub mod folder;
pub mod generator;

pub use android::{AndroidApp, AndroidProject, android_home};
pub use arguments::CacheArguments;
pub use executor::{BuildExecutor, BuildInvocation};
pub use folder::{BuildFolder, PreparedState, STATE_FILE, Selection};
pub use generator::BuildSystem;
