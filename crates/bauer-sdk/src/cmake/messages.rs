//! Typed messages of the CMake server protocol.
//!
//! Requests sent by the client are modelled by [`Request`], everything the
//! server can send by [`ServerMessage`]. Both are internally tagged on the
//! `type` field, so an unknown message type fails to decode instead of being
//! silently ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HANDSHAKE_COOKIE: &str = "OPEN_HANDSHAKE";
pub const CONFIGURE_COOKIE: &str = "CONFIGURE";
pub const COMPUTE_COOKIE: &str = "COMPUTE";
pub const CODEMODEL_COOKIE: &str = "CODEMODEL";
pub const CACHE_COOKIE: &str = "CACHE";

/// A `{major, minor}` protocol version offered by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

/// Client to server requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    Handshake {
        protocol_version: ProtocolVersion,
        cookie: String,
        source_directory: String,
        build_directory: String,
        generator: String,
        extra_generator: String,
    },
    GlobalSettings,
    Configure {
        cache_arguments: Vec<String>,
        cookie: String,
    },
    Compute {
        cookie: String,
    },
    Codemodel {
        cookie: String,
    },
    Cache {
        cookie: String,
    },
}

impl Request {
    /// The `type` string, which the server echoes back as `inReplyTo`.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Handshake { .. } => "handshake",
            Request::GlobalSettings => "globalSettings",
            Request::Configure { .. } => "configure",
            Request::Compute { .. } => "compute",
            Request::Codemodel { .. } => "codemodel",
            Request::Cache { .. } => "cache",
        }
    }

    /// The correlation cookie, empty for requests that carry none.
    pub fn cookie(&self) -> &str {
        match self {
            Request::GlobalSettings => "",
            Request::Handshake { cookie, .. }
            | Request::Configure { cookie, .. }
            | Request::Compute { cookie }
            | Request::Codemodel { cookie }
            | Request::Cache { cookie } => cookie,
        }
    }

    pub fn to_value(&self) -> Value {
        // Serializing a plain enum of strings into a Value cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Server to client messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent once, right after the server starts.
    Hello {
        #[serde(default)]
        supported_protocol_versions: Vec<ProtocolVersion>,
    },
    /// Successful completion of a request, with type-specific payload fields.
    Reply {
        #[serde(default)]
        in_reply_to: String,
        #[serde(default)]
        cookie: String,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },
    /// Informational text while a request is running.
    Message {
        #[serde(default)]
        in_reply_to: String,
        #[serde(default)]
        cookie: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        title: Option<String>,
    },
    /// Progress report while a request is running.
    Progress {
        #[serde(default)]
        in_reply_to: String,
        #[serde(default)]
        cookie: String,
        #[serde(default)]
        progress_message: String,
        #[serde(default)]
        progress_current: Option<i64>,
        #[serde(default)]
        progress_maximum: Option<i64>,
    },
    /// The request failed on the server side.
    Error {
        #[serde(default)]
        in_reply_to: String,
        #[serde(default)]
        cookie: String,
        #[serde(default)]
        error_message: String,
    },
}

impl ServerMessage {
    /// `(inReplyTo, cookie)` of a correlated message; `None` for `hello`.
    pub fn correlation(&self) -> Option<(&str, &str)> {
        match self {
            ServerMessage::Hello { .. } => None,
            ServerMessage::Reply {
                in_reply_to,
                cookie,
                ..
            }
            | ServerMessage::Message {
                in_reply_to,
                cookie,
                ..
            }
            | ServerMessage::Progress {
                in_reply_to,
                cookie,
                ..
            }
            | ServerMessage::Error {
                in_reply_to,
                cookie,
                ..
            } => Some((in_reply_to, cookie)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Hello { .. } => "hello",
            ServerMessage::Reply { .. } => "reply",
            ServerMessage::Message { .. } => "message",
            ServerMessage::Progress { .. } => "progress",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// The reply to `globalSettings`, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalSettings(pub Map<String, Value>);

impl GlobalSettings {
    /// `capabilities.version.string`, e.g. `"3.14.5"`.
    pub fn version_string(&self) -> Option<&str> {
        self.0
            .get("capabilities")?
            .get("version")?
            .get("string")?
            .as_str()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// One `{key, value}` entry of the `cache` reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Payload of the `cache` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheReply {
    #[serde(default)]
    pub cache: Vec<CacheEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_wire_shape() {
        let request = Request::Handshake {
            protocol_version: ProtocolVersion { major: 1, minor: 2 },
            cookie: HANDSHAKE_COOKIE.to_string(),
            source_directory: "C:/src".to_string(),
            build_directory: "C:/build".to_string(),
            generator: "Unix Makefiles".to_string(),
            extra_generator: String::new(),
        };
        assert_eq!(
            request.to_value(),
            json!({
                "type": "handshake",
                "protocolVersion": {"major": 1, "minor": 2},
                "cookie": "OPEN_HANDSHAKE",
                "sourceDirectory": "C:/src",
                "buildDirectory": "C:/build",
                "generator": "Unix Makefiles",
                "extraGenerator": ""
            })
        );
        assert_eq!(request.kind(), "handshake");
        assert_eq!(request.cookie(), "OPEN_HANDSHAKE");
    }

    #[test]
    fn test_configure_and_global_settings_wire_shape() {
        let request = Request::Configure {
            cache_arguments: vec!["-DCMAKE_BUILD_TYPE=Debug".to_string()],
            cookie: CONFIGURE_COOKIE.to_string(),
        };
        assert_eq!(
            request.to_value(),
            json!({
                "type": "configure",
                "cacheArguments": ["-DCMAKE_BUILD_TYPE=Debug"],
                "cookie": "CONFIGURE"
            })
        );
        assert_eq!(
            Request::GlobalSettings.to_value(),
            json!({"type": "globalSettings"})
        );
        assert_eq!(Request::GlobalSettings.cookie(), "");
    }

    #[test]
    fn test_decode_reply_keeps_payload() {
        let message: ServerMessage = serde_json::from_value(json!({
            "type": "reply",
            "inReplyTo": "cache",
            "cookie": "CACHE",
            "cache": [{"key": "A", "value": "1"}]
        }))
        .unwrap();

        assert_eq!(message.correlation(), Some(("cache", "CACHE")));
        match message {
            ServerMessage::Reply { payload, .. } => {
                assert!(payload.contains_key("cache"));
                assert!(!payload.contains_key("type"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_and_message() {
        let error: ServerMessage = serde_json::from_value(json!({
            "type": "error",
            "inReplyTo": "configure",
            "cookie": "CONFIGURE",
            "errorMessage": "Configuration failed."
        }))
        .unwrap();
        assert!(matches!(
            error,
            ServerMessage::Error { ref error_message, .. } if error_message == "Configuration failed."
        ));

        let message: ServerMessage = serde_json::from_value(json!({
            "type": "message",
            "inReplyTo": "configure",
            "cookie": "CONFIGURE",
            "message": "The C compiler identification is GNU"
        }))
        .unwrap();
        assert_eq!(message.kind(), "message");
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let result = serde_json::from_value::<ServerMessage>(json!({
            "type": "signal",
            "name": "dirty"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_global_settings_version() {
        let settings: GlobalSettings = serde_json::from_value(json!({
            "capabilities": {"version": {"string": "3.14.5", "major": 3}},
            "generator": "Ninja"
        }))
        .unwrap();
        assert_eq!(settings.version_string(), Some("3.14.5"));
        assert_eq!(settings.get("generator"), Some(&json!("Ninja")));
        assert_eq!(GlobalSettings::default().version_string(), None);
    }
}
