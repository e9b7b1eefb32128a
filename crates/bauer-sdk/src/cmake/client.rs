//! Session with a CMake server.
//!
//! A [`ServerClient`] walks the server through a fixed sequence:
//!
//! 1. wait for `hello` and pick the first offered protocol version
//! 2. `handshake` with the source/build directories and generator
//! 3. `globalSettings`
//! 4. per [`ServerClient::configure`] call: `configure`, `compute`,
//!    `codemodel` and `cache`
//!
//! Exactly one request is outstanding at a time. Every message received
//! while waiting must correlate to that request; anything else ends the
//! session. Each successful `configure` returns a fresh [`ConfigureResult`]
//! and nothing in the client is updated in place.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, trace};

use super::error::{ConfigureError, ProtocolError, ServerError, TransportError};
use super::messages::{
    CACHE_COOKIE, CODEMODEL_COOKIE, COMPUTE_COOKIE, CONFIGURE_COOKIE, CacheReply, GlobalSettings,
    HANDSHAKE_COOKIE, ProtocolVersion, Request, ServerMessage,
};
use super::transport::{CancelToken, ServerProcess, Transport, Wait};
use crate::cmake::ModelError;
use crate::dependencies::DependencyGraph;
use crate::model::{CodeModel, Configuration};

/// Progress of a session through the protocol sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    HelloReceived,
    HandshakeAcknowledged,
    SettingsAcknowledged,
    Configured,
    Computed,
    ModelReady,
    CacheReady,
    /// A transport or protocol error occurred; the session must be reopened.
    Failed,
}

/// Parameters of a session.
///
/// # Example
///
/// ```
/// use bauer_sdk::cmake::SessionOptions;
/// use std::time::Duration;
///
/// let options = SessionOptions::new("/src/app", "/src/app/build", "Ninja")
///     .env("ANDROID_HOME", "/opt/android")
///     .receive_timeout(Duration::from_secs(600));
/// assert_eq!(options.generator, "Ninja");
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub source_directory: PathBuf,
    pub build_directory: PathBuf,
    pub generator: String,
    pub extra_generator: String,
    /// Variables added to the server's environment.
    pub extra_env: BTreeMap<String, String>,
    /// Upper bound for every wait on the server; `None` waits indefinitely.
    pub receive_timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl SessionOptions {
    pub fn new(
        source_directory: impl Into<PathBuf>,
        build_directory: impl Into<PathBuf>,
        generator: impl Into<String>,
    ) -> Self {
        Self {
            source_directory: source_directory.into(),
            build_directory: build_directory.into(),
            generator: generator.into(),
            extra_generator: String::new(),
            extra_env: BTreeMap::new(),
            receive_timeout: None,
            cancel: CancelToken::default(),
        }
    }

    pub fn extra_generator(mut self, extra_generator: impl Into<String>) -> Self {
        self.extra_generator = extra_generator.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: BTreeMap<String, String>) -> Self {
        self.extra_env.extend(vars);
        self
    }

    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn wait(&self) -> Wait {
        let wait = match self.receive_timeout {
            Some(timeout) => Wait::bounded(timeout),
            None => Wait::forever(),
        };
        wait.with_cancel(self.cancel.clone())
    }
}

/// Outcome of one configure cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureResult {
    pub code_model: CodeModel,
    /// Cache variables, replacing those of any earlier cycle.
    pub cache: BTreeMap<String, String>,
}

impl ConfigureResult {
    /// The only configuration of the model.
    pub fn configuration(&self) -> Result<&Configuration, ModelError> {
        self.code_model.single_configuration()
    }

    pub fn dependency_graph(&self) -> Result<DependencyGraph, ModelError> {
        DependencyGraph::from_model(&self.code_model)
    }

    pub fn cache_value(&self, key: &str) -> Option<&str> {
        self.cache.get(key).map(String::as_str)
    }

    /// Writes `codemodel.debug.json` and `cache.debug.json` into `dir`.
    pub fn write_debug_dump(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let code_model = serde_json::to_string_pretty(&self.code_model)?;
        fs::write(dir.join("codemodel.debug.json"), code_model)?;
        let cache = serde_json::to_string_pretty(&self.cache)?;
        fs::write(dir.join("cache.debug.json"), cache)?;
        Ok(())
    }
}

/// Client side of one CMake server session.
pub struct ServerClient<T: Transport = ServerProcess> {
    transport: T,
    source_directory: PathBuf,
    build_directory: PathBuf,
    protocol_version: ProtocolVersion,
    global_settings: GlobalSettings,
    state: SessionState,
    wait: Wait,
}

impl ServerClient<ServerProcess> {
    /// Starts `cmake` in server mode and performs the handshake.
    ///
    /// The server process is terminated if any step fails.
    pub fn open(cmake: &Path, options: SessionOptions) -> Result<Self, ServerError> {
        let process = ServerProcess::spawn(cmake, &options.extra_env)?;
        debug!("cmake server started (pid {})", process.id());
        Self::with_transport(process, options)
    }
}

impl<T: Transport> ServerClient<T> {
    /// Performs the opening sequence over an already connected transport.
    pub fn with_transport(mut transport: T, options: SessionOptions) -> Result<Self, ServerError> {
        let wait = options.wait();
        let protocol_version = receive_hello(&mut transport, &wait)?;
        debug!(
            "server protocol version: {}.{}",
            protocol_version.major, protocol_version.minor
        );

        let mut client = Self {
            transport,
            source_directory: options.source_directory,
            build_directory: options.build_directory,
            protocol_version,
            global_settings: GlobalSettings::default(),
            state: SessionState::HelloReceived,
            wait,
        };

        let handshake = Request::Handshake {
            protocol_version,
            cookie: HANDSHAKE_COOKIE.to_string(),
            source_directory: forward_slashes(&client.source_directory),
            build_directory: forward_slashes(&client.build_directory),
            generator: options.generator,
            extra_generator: options.extra_generator,
        };
        client.round_trip(&handshake)?;
        client.state = SessionState::HandshakeAcknowledged;

        let payload = client.round_trip(&Request::GlobalSettings)?;
        client.global_settings = GlobalSettings(payload);
        client.state = SessionState::SettingsAcknowledged;
        debug!(
            "VERSION: {}",
            client.global_settings.version_string().unwrap_or("unknown")
        );

        Ok(client)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn global_settings(&self) -> &GlobalSettings {
        &self.global_settings
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    pub fn build_directory(&self) -> &Path {
        &self.build_directory
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Configures and generates the build tree, then fetches the code model
    /// and the cache.
    ///
    /// `cache_arguments` are `-D<key>=<value>` style overrides. A
    /// [`ServerError::Configure`] or [`ServerError::Model`] leaves the
    /// session ready for another call; any other error ends it.
    pub fn configure(&mut self, cache_arguments: &[String]) -> Result<ConfigureResult, ServerError> {
        if self.state == SessionState::Failed {
            return Err(ProtocolError::SessionUnusable.into());
        }

        let result = self.configure_cycle(cache_arguments);
        self.state = match &result {
            Ok(_) => SessionState::CacheReady,
            Err(e) if e.ends_session() => SessionState::Failed,
            Err(_) => SessionState::SettingsAcknowledged,
        };
        result
    }

    fn configure_cycle(&mut self, cache_arguments: &[String]) -> Result<ConfigureResult, ServerError> {
        info!("Configuring ...");
        self.round_trip(&Request::Configure {
            cache_arguments: cache_arguments.to_vec(),
            cookie: CONFIGURE_COOKIE.to_string(),
        })?;
        self.state = SessionState::Configured;
        info!("Done.");

        info!("Generating ...");
        self.round_trip(&Request::Compute {
            cookie: COMPUTE_COOKIE.to_string(),
        })?;
        self.state = SessionState::Computed;

        let payload = self.round_trip(&Request::Codemodel {
            cookie: CODEMODEL_COOKIE.to_string(),
        })?;
        let mut code_model = CodeModel::from_payload(payload).map_err(|source| {
            ProtocolError::InvalidPayload {
                request: "codemodel",
                source,
            }
        })?;
        code_model.single_configuration()?;
        code_model.mark_main_projects(&self.source_directory);
        self.state = SessionState::ModelReady;

        let payload = self.round_trip(&Request::Cache {
            cookie: CACHE_COOKIE.to_string(),
        })?;
        let reply: CacheReply =
            serde_json::from_value(Value::Object(payload)).map_err(|source| {
                ProtocolError::InvalidPayload {
                    request: "cache",
                    source,
                }
            })?;
        let cache = reply
            .cache
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();

        Ok(ConfigureResult { code_model, cache })
    }

    /// Sends `request` and waits for its reply, returning the reply payload.
    ///
    /// `codemodel` and `cache` replies are correlated by cookie alone; all
    /// other requests by `inReplyTo` and cookie.
    fn round_trip(&mut self, request: &Request) -> Result<Map<String, Value>, ServerError> {
        if let Err(e) = self.transport.send(&request.to_value()) {
            self.state = SessionState::Failed;
            return Err(e.into());
        }
        let result = self.wait_for_reply(request);
        if matches!(&result, Err(e) if e.ends_session()) {
            self.state = SessionState::Failed;
        }
        result
    }

    fn wait_for_reply(&mut self, request: &Request) -> Result<Map<String, Value>, ServerError> {
        let expected_reply = request.kind();
        let expected_cookie = request.cookie();
        let check_reply = !matches!(request, Request::Codemodel { .. } | Request::Cache { .. });

        loop {
            let value = self.transport.receive(&self.wait)?;
            let message = decode(&value)?;

            let Some((in_reply_to, cookie)) = message.correlation() else {
                return Err(ProtocolError::UnexpectedMessage(format!(
                    "'{}' while waiting for a reply to '{}'",
                    message.kind(),
                    expected_reply
                ))
                .into());
            };
            if (check_reply && in_reply_to != expected_reply) || cookie != expected_cookie {
                return Err(ProtocolError::Mismatch {
                    expected_reply: expected_reply.to_string(),
                    expected_cookie: expected_cookie.to_string(),
                    actual_reply: in_reply_to.to_string(),
                    actual_cookie: cookie.to_string(),
                }
                .into());
            }

            match message {
                ServerMessage::Reply { payload, .. } => return Ok(payload),
                ServerMessage::Message { message, .. } => info!("-- {}", message),
                ServerMessage::Progress {
                    progress_message, ..
                } => trace!("progress: {}", progress_message),
                ServerMessage::Error { error_message, .. } => {
                    return Err(ConfigureError {
                        message: error_message,
                    }
                    .into());
                }
                ServerMessage::Hello { .. } => {
                    return Err(ProtocolError::UnexpectedMessage("repeated hello".to_string()).into());
                }
            }
        }
    }
}

fn receive_hello<T: Transport>(
    transport: &mut T,
    wait: &Wait,
) -> Result<ProtocolVersion, ServerError> {
    let value = transport.receive(wait).map_err(|e| match e {
        TransportError::Closed => ServerError::from(ProtocolError::BadGreeting(
            "no message received, maybe cmake does not support server mode".to_string(),
        )),
        other => other.into(),
    })?;

    match ServerMessage::deserialize(&value) {
        Ok(ServerMessage::Hello {
            supported_protocol_versions,
        }) => supported_protocol_versions.first().copied().ok_or_else(|| {
            ProtocolError::BadGreeting("hello lists no supported protocol versions".to_string())
                .into()
        }),
        Ok(other) => Err(ProtocolError::BadGreeting(format!(
            "first message was '{}' instead of 'hello'",
            other.kind()
        ))
        .into()),
        Err(_) => Err(ProtocolError::BadGreeting(format!("first message was {value}")).into()),
    }
}

fn decode(value: &Value) -> Result<ServerMessage, ProtocolError> {
    ServerMessage::deserialize(value)
        .map_err(|e| ProtocolError::UnexpectedMessage(format!("{value} ({e})")))
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
