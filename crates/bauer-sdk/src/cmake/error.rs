//! Error taxonomy for a CMake server session.
//!
//! Errors are split by what they mean for the session that produced them:
//!
//! | Error | Session after the error |
//! |-------|-------------------------|
//! | [`TransportError`] | unusable, reopen |
//! | [`ProtocolError`] | unusable, reopen |
//! | [`ConfigureError`] | alive, `configure` may be issued again |
//! | [`ModelError`] | alive, the request was rejected |
//!
//! [`ServerError::ends_session`] answers the question mechanically.

use std::path::PathBuf;
use std::time::Duration;

/// Failures of the framed byte channel to the server process.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server process could not be started.
    #[error("failed to start cmake server '{}': {source}. Ensure cmake is installed and supports server mode", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the server pipes failed.
    #[error("cmake server pipe error: {0}")]
    Io(#[from] std::io::Error),

    /// A non-empty line appeared where a frame start marker was expected.
    #[error("malformed frame: expected start marker, got {0:?}")]
    MissingStartMarker(String),

    /// The stream ended inside a frame.
    #[error("malformed frame: stream ended before the end marker")]
    UnexpectedEof,

    /// The frame body is not valid JSON.
    #[error("malformed frame: invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The server closed its output between frames.
    #[error("cmake server closed the connection")]
    Closed,

    /// No message arrived within the bounded wait.
    #[error("no message from cmake server within {0:?}")]
    Timeout(Duration),

    /// The wait was cancelled through a [`CancelToken`](super::transport::CancelToken).
    #[error("wait for cmake server cancelled")]
    Cancelled,
}

/// Violations of the handshake or of request/reply correlation.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("server did not greet as expected: {0}")]
    BadGreeting(String),

    /// A message correlated to something other than the outstanding request.
    #[error(
        "invalid packet received: expected inReplyTo={expected_reply:?} cookie={expected_cookie:?}, \
         got inReplyTo={actual_reply:?} cookie={actual_cookie:?}"
    )]
    Mismatch {
        expected_reply: String,
        expected_cookie: String,
        actual_reply: String,
        actual_cookie: String,
    },

    /// A message of a kind that cannot appear at this point of the exchange.
    #[error("unexpected message from server: {0}")]
    UnexpectedMessage(String),

    /// A reply whose payload does not have the documented shape.
    #[error("invalid {request} reply payload: {source}")]
    InvalidPayload {
        request: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The session already failed fatally and must be reopened.
    #[error("cmake server session is unusable after an earlier failure")]
    SessionUnusable,
}

/// The server reported an error while configuring or generating.
#[derive(Debug, thiserror::Error)]
#[error("error occurred during configure: {message}")]
pub struct ConfigureError {
    /// Raw `errorMessage` text from the server.
    pub message: String,
}

/// A request rejected against a valid project model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Number of configurations is not 1 (got {0})")]
    ConfigurationCount(usize),

    #[error("couldn't find target '{0}'")]
    TargetNotFound(String),

    #[error("target '{0}' is not an executable")]
    NotExecutable(String),

    #[error("no artifact of target '{0}' matches its full name")]
    ArtifactNotFound(String),
}

/// Any error surfaced by [`ServerClient`](super::client::ServerClient).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Configure(#[from] ConfigureError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ServerError {
    /// Returns `true` when the session must be discarded and reopened.
    pub fn ends_session(&self) -> bool {
        matches!(self, ServerError::Transport(_) | ServerError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ends_session() {
        assert!(ServerError::from(TransportError::Closed).ends_session());
        assert!(ServerError::from(ProtocolError::SessionUnusable).ends_session());
        assert!(
            !ServerError::from(ConfigureError {
                message: "boom".to_string()
            })
            .ends_session()
        );
        assert!(!ServerError::from(ModelError::ConfigurationCount(2)).ends_session());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ServerError::from(ConfigureError {
            message: "CMake Error at CMakeLists.txt:3".to_string(),
        });
        assert!(err.to_string().contains("CMakeLists.txt:3"));

        let err = ProtocolError::Mismatch {
            expected_reply: "configure".to_string(),
            expected_cookie: "CONFIGURE".to_string(),
            actual_reply: "compute".to_string(),
            actual_cookie: "COMPUTE".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"configure\""));
        assert!(msg.contains("\"COMPUTE\""));

        let err = ModelError::ConfigurationCount(0);
        assert!(err.to_string().contains("Number of configurations is not 1"));
    }
}
