//! Wire-level structures for the line-delimited JSON-RPC protocol.
//!
//! Every frame is one JSON object. Requests carry `id` and `method`;
//! notifications carry `method` only; responses echo the request `id` and
//! carry exactly one of `result` or `error`.

use std::fmt;

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tool_primitives::RequestId;
use tool_registry::ToolDescriptor;

/// Protocol version tag written on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// Session protocol version reported when the client does not ask for one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// A decoded request that expects exactly one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: RequestId,
    method: String,
    params: Option<Value>,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Returns the caller-supplied correlation id.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Returns the method name exactly as received.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the raw parameters, if any were sent.
    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }
}

/// A decoded message that carries no id and is never answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    method: String,
    params: Option<Value>,
}

impl Notification {
    /// Returns the notification method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the raw parameters, if any were sent.
    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }
}

/// Classification of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Needs a correlated response.
    Request(Request),
    /// Fire-and-forget.
    Notification(Notification),
}

/// Frames that cannot be correlated to a request id.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The bytes were not valid JSON, or a field had an unsupported type.
    #[error("malformed frame: {reason}")]
    Malformed {
        /// Decoder diagnostic.
        reason: String,
    },
    /// The frame was valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// The frame carried neither `id` nor `method`.
    #[error("frame has neither an id nor a method")]
    Uncorrelated,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<Value>,
    #[serde(default)]
    params: Option<Value>,
}

/// Decodes one frame.
///
/// A frame with a usable `id` always decodes to a [`Request`], even when its
/// method is missing or not a string, so the caller can still answer it.
///
/// # Errors
///
/// Returns [`FrameError`] when no response can be correlated to the frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Incoming, FrameError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| FrameError::Malformed {
        reason: err.to_string(),
    })?;
    if !value.is_object() {
        return Err(FrameError::NotAnObject);
    }

    let raw: RawFrame = serde_json::from_value(value).map_err(|err| FrameError::Malformed {
        reason: err.to_string(),
    })?;

    match (raw.id, raw.method) {
        (Some(id), method) => Ok(Incoming::Request(Request {
            id,
            method: method_name(method),
            params: raw.params,
        })),
        (None, Some(Value::String(method))) => Ok(Incoming::Notification(Notification {
            method,
            params: raw.params,
        })),
        (None, _) => Err(FrameError::Uncorrelated),
    }
}

fn method_name(method: Option<Value>) -> String {
    match method {
        Some(Value::String(name)) => name,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Closed set of error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Unrecognized top-level method.
    MethodNotFound,
    /// Requested tool is not registered.
    ToolNotFound,
    /// Arguments missing, mistyped, or not shaped as expected.
    InvalidArguments,
    /// Handler ran but its underlying operation did not succeed.
    ToolExecutionFailed,
}

impl ErrorCode {
    /// Returns the wire spelling of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MethodNotFound => "MethodNotFound",
            Self::ToolNotFound => "ToolNotFound",
            Self::InvalidArguments => "InvalidArguments",
            Self::ToolExecutionFailed => "ToolExecutionFailed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload carried by failed responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine readable error code.
    #[serde(rename = "errorCode")]
    pub code: ErrorCode,
    /// Human readable error message.
    #[serde(rename = "errorMessage")]
    pub message: String,
}

/// Outcome of a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Success payload.
    Result(Value),
    /// Failure payload.
    Error(ErrorBody),
}

/// Response correlated to a [`Request`] by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    id: RequestId,
    outcome: Outcome,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(id: RequestId, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Error(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Returns the outcome.
    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns the success payload, if any.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Returns the error payload, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorBody> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(body) => Some(body),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    jsonrpc: &'static str,
    id: &'a RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorBody>,
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Envelope {
            jsonrpc: JSONRPC_VERSION,
            id: &self.id,
            result: self.result(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

/// Encodes a response as a single line of JSON, without the terminator.
///
/// # Errors
///
/// Returns the serializer error if the payload cannot be encoded.
pub fn encode_response(response: &Response) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(response)
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Raw, unvalidated arguments.
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// Result payload of a `tools/list` request.
#[derive(Debug, Serialize)]
pub struct ListToolsResult<'a> {
    /// Registered tools in registration order.
    pub tools: Vec<&'a ToolDescriptor>,
}

/// Name and version advertised during `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server info.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Parameters of an `initialize` request; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeParams {
    /// Protocol version requested by the client.
    #[serde(default, rename = "protocolVersion")]
    pub protocol_version: Option<Value>,
}

/// Result payload of an `initialize` request.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeResult {
    /// Negotiated protocol version.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Advertised capabilities.
    pub capabilities: ServerCapabilities,
    /// Server identity.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Capability block of [`InitializeResult`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool capability flags; currently always empty.
    pub tools: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_request_with_params() {
        let frame = br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"calculate_sum"}}"#;
        let Incoming::Request(request) = decode_frame(frame).unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.id(), &RequestId::from(1_i64));
        assert_eq!(request.method(), "tools/call");
        assert_eq!(request.params().unwrap()["name"], "calculate_sum");
    }

    #[test]
    fn decodes_notification_without_id() {
        let frame = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let Incoming::Notification(note) = decode_frame(frame).unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(note.method(), "notifications/initialized");
    }

    #[test]
    fn request_without_method_is_still_correlated() {
        let Incoming::Request(request) = decode_frame(br#"{"id":"x"}"#).unwrap() else {
            panic!("expected request");
        };
        assert_eq!(request.method(), "");

        let Incoming::Request(request) = decode_frame(br#"{"id":"y","method":5}"#).unwrap()
        else {
            panic!("expected request");
        };
        assert_eq!(request.method(), "5");
    }

    #[test]
    fn rejects_uncorrelatable_frames() {
        assert!(matches!(
            decode_frame(b"not json"),
            Err(FrameError::Malformed { .. })
        ));
        assert!(matches!(decode_frame(b"[1,2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(
            decode_frame(br#"{"id":true,"method":"ping"}"#),
            Err(FrameError::Malformed { .. })
        ));
        assert!(matches!(
            decode_frame(br#"{"result":{}}"#),
            Err(FrameError::Uncorrelated)
        ));
    }

    #[test]
    fn encodes_success_envelope() {
        let response = Response::success(RequestId::from("a"), json!({ "toolResult": 5 }));
        let value: Value = serde_json::from_slice(&encode_response(&response).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "jsonrpc": "2.0", "id": "a", "result": { "toolResult": 5 } })
        );
    }

    #[test]
    fn encodes_error_envelope() {
        let response = Response::failure(RequestId::from(9_i64), ErrorCode::ToolNotFound, "nope");
        let value: Value = serde_json::from_slice(&encode_response(&response).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 9,
                "error": { "errorCode": "ToolNotFound", "errorMessage": "nope" }
            })
        );
    }

    #[test]
    fn numeric_ids_outside_i64_are_echoed_exactly() {
        for (frame, id) in [
            (&br#"{"id":9223372036854775808,"method":"ping"}"#[..], "9223372036854775808"),
            (&br#"{"id":1.5,"method":"ping"}"#[..], "1.5"),
        ] {
            let Incoming::Request(request) = decode_frame(frame).unwrap() else {
                panic!("expected request for id {id}");
            };
            let response = Response::success(request.id().clone(), json!({}));
            let encoded = String::from_utf8(encode_response(&response).unwrap()).unwrap();
            assert_eq!(encoded, format!(r#"{{"jsonrpc":"2.0","id":{id},"result":{{}}}}"#));
        }
    }

    #[test]
    fn error_code_wire_spelling_matches_serde() {
        for code in [
            ErrorCode::MethodNotFound,
            ErrorCode::ToolNotFound,
            ErrorCode::InvalidArguments,
            ErrorCode::ToolExecutionFailed,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
        }
    }
}
