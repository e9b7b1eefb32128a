//! CMake server-mode protocol client.
//!
//! ## Layers
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`transport`] | `cmake -E server` subprocess and the marker-delimited framing |
//! | [`messages`] | Typed requests and server messages |
//! | [`client`] | Session state machine and the configure cycle |
//! | [`error`] | Transport / protocol / configure / model errors |
//!
//! ## Example
//!
//! ```ignore
//! use bauer_sdk::cmake::{ServerClient, SessionOptions};
//! use std::path::Path;
//!
//! let options = SessionOptions::new("/src/app", "/src/app/build/linux/std/make/Debug", "Unix Makefiles");
//! let mut client = ServerClient::open(Path::new("cmake"), options)?;
//! let result = client.configure(&["-DCMAKE_BUILD_TYPE=Debug".to_string()])?;
//!
//! for target in result.configuration()?.targets() {
//!     println!("{} ({})", target.name, target.target_type.as_str());
//! }
//! # Ok::<(), bauer_sdk::cmake::ServerError>(())
//! ```

pub mod client;
pub mod error;
pub mod messages;
pub mod transport;

pub use client::{ConfigureResult, ServerClient, SessionOptions, SessionState};
pub use error::{ConfigureError, ModelError, ProtocolError, ServerError, TransportError};
pub use messages::{GlobalSettings, ProtocolVersion};
pub use transport::{CancelToken, ServerProcess, Transport, Wait};
