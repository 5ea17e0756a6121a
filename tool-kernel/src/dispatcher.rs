//! Request handler backed by a static [`ToolRegistry`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tool_registry::{ToolError, ToolRegistry};
use tracing::debug;

use crate::handlers::{DispatchError, DispatchResult, RequestContext, RequestHandler};
use crate::protocol::{
    CallToolParams, DEFAULT_PROTOCOL_VERSION, InitializeParams, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo,
};

/// Routes `tools/list` and `tools/call` to a registry and answers the
/// session handshake.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    server_info: ServerInfo,
    protocol_version: String,
    listing: Value,
}

impl fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("registry", &self.registry)
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

impl ToolDispatcher {
    /// Creates a dispatcher over the supplied registry.
    ///
    /// The tool listing is encoded once here; the registry is immutable, so
    /// every `tools/list` answer is identical.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if a descriptor cannot be encoded.
    pub fn new(registry: Arc<ToolRegistry>, server_info: ServerInfo) -> serde_json::Result<Self> {
        let listing = serde_json::to_value(ListToolsResult {
            tools: registry.list(),
        })?;

        Ok(Self {
            registry,
            server_info,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_owned(),
            listing,
        })
    }

    /// Overrides the protocol version reported when the client does not
    /// request one.
    #[must_use]
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Returns the registry served by this dispatcher.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Returns the encoded `tools/list` result.
    #[must_use]
    pub fn listing(&self) -> &Value {
        &self.listing
    }
}

#[async_trait]
impl RequestHandler for ToolDispatcher {
    async fn handle_initialize(&self, ctx: &RequestContext) -> DispatchResult {
        let params: InitializeParams = match ctx.request().params() {
            None | Some(Value::Null) => InitializeParams::default(),
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|err| {
                DispatchError::invalid_arguments(format!("invalid initialize params: {err}"))
            })?,
        };

        let protocol_version = match params.protocol_version {
            Some(Value::String(requested)) => requested,
            _ => self.protocol_version.clone(),
        };
        debug!(%protocol_version, "session initialized");

        let result = InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities::default(),
            server_info: self.server_info.clone(),
        };
        serde_json::to_value(result).map_err(|err| {
            DispatchError::invalid_arguments(format!("cannot encode initialize result: {err}"))
        })
    }

    async fn handle_ping(&self, _ctx: &RequestContext) -> DispatchResult {
        Ok(Value::Object(Map::new()))
    }

    async fn handle_list_tools(&self, _ctx: &RequestContext) -> DispatchResult {
        Ok(self.listing.clone())
    }

    async fn handle_call_tool(&self, ctx: &RequestContext) -> DispatchResult {
        let params = parse_call_params(ctx.request().params())?;

        let handle = self
            .registry
            .find(&params.name)
            .ok_or_else(|| DispatchError::ToolNotFound {
                name: params.name.clone(),
            })?;

        let arguments = handle.validate(params.arguments.unwrap_or_default())?;

        let started = Instant::now();
        let value = handle
            .invoke(arguments)
            .await
            .map_err(|err| DispatchError::ToolExecutionFailed {
                name: params.name.clone(),
                reason: summarize(err),
            })?;
        debug!(
            tool = %params.name,
            elapsed_ms = started.elapsed().as_millis(),
            "tool completed"
        );

        let mut result = Map::new();
        result.insert("toolResult".to_owned(), value);
        Ok(Value::Object(result))
    }
}

fn parse_call_params(params: Option<&Value>) -> DispatchResult<CallToolParams> {
    let Some(params) = params else {
        return Err(DispatchError::invalid_arguments(
            "tools/call requires params with a tool name",
        ));
    };
    serde_json::from_value(params.clone())
        .map_err(|err| DispatchError::invalid_arguments(format!("invalid tools/call params: {err}")))
}

fn summarize(err: ToolError) -> String {
    match err {
        ToolError::Execution { reason } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::dispatch_request;
    use crate::protocol::{ErrorCode, Request, Response};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tool_primitives::{RequestId, SessionId};
    use tool_registry::{FieldType, InputSchema, ToolDescriptor, ValidatedArguments};

    fn registry(calls: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
        let schema = InputSchema::builder()
            .required("a", FieldType::Number)
            .required("b", FieldType::Number)
            .build()
            .unwrap();
        let failing = ToolDescriptor::new("always_fails", "Fails every time").unwrap();

        let registry = ToolRegistry::builder()
            .register(
                ToolDescriptor::new("add", "Adds").unwrap().with_input_schema(schema),
                move |args: ValidatedArguments| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let total = args.number("a").unwrap_or_default()
                            + args.number("b").unwrap_or_default();
                        Ok::<_, ToolError>(json!(total))
                    }
                },
            )
            .unwrap()
            .register(failing, |_args: ValidatedArguments| async move {
                Err::<Value, _>(ToolError::execution("upstream returned 502"))
            })
            .unwrap()
            .build();
        Arc::new(registry)
    }

    fn dispatcher(calls: Arc<AtomicUsize>) -> ToolDispatcher {
        ToolDispatcher::new(registry(calls), ServerInfo::new("test-server", "0.0.1")).unwrap()
    }

    async fn call(dispatcher: &ToolDispatcher, id: &str, method: &str, params: Value) -> Response {
        let request = Request::new(RequestId::from(id), method, Some(params));
        let ctx = RequestContext::from_request(SessionId::random(), request);
        dispatch_request(dispatcher, ctx).await
    }

    #[tokio::test]
    async fn call_tool_wraps_result() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let response = call(
            &dispatcher,
            "1",
            "tools/call",
            json!({ "name": "add", "arguments": { "a": 1.5, "b": 2 } }),
        )
        .await;
        assert_eq!(response.result(), Some(&json!({ "toolResult": 3.5 })));
    }

    #[tokio::test]
    async fn missing_argument_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(Arc::clone(&calls));
        let response = call(
            &dispatcher,
            "2",
            "tools/call",
            json!({ "name": "add", "arguments": { "a": 1 } }),
        )
        .await;

        let error = response.error().expect("should fail");
        assert_eq!(error.code, ErrorCode::InvalidArguments);
        assert!(error.message.contains("`b`"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_by_name() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let response = call(
            &dispatcher,
            "3",
            "tools/call",
            json!({ "name": "unknown_tool", "arguments": {} }),
        )
        .await;

        assert_eq!(response.id(), &RequestId::from("3"));
        let error = response.error().expect("should fail");
        assert_eq!(error.code, ErrorCode::ToolNotFound);
        assert!(error.message.contains("unknown_tool"));
    }

    #[tokio::test]
    async fn handler_failure_is_reported_as_data() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let response = call(&dispatcher, "4", "tools/call", json!({ "name": "always_fails" })).await;

        let error = response.error().expect("should fail");
        assert_eq!(error.code, ErrorCode::ToolExecutionFailed);
        assert_eq!(error.message, "tool `always_fails` failed: upstream returned 502");
    }

    #[tokio::test]
    async fn malformed_call_params_are_invalid_arguments() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        for params in [
            json!({ "arguments": {} }),
            json!({ "name": "add", "arguments": [1, 2] }),
            json!("add"),
        ] {
            let response = call(&dispatcher, "5", "tools/call", params).await;
            assert_eq!(response.error().unwrap().code, ErrorCode::InvalidArguments);
        }

        let request = Request::new(RequestId::from("6"), "tools/call", None);
        let response =
            dispatch_request(&dispatcher, RequestContext::from_request(SessionId::random(), request))
                .await;
        assert_eq!(response.error().unwrap().code, ErrorCode::InvalidArguments);
    }

    #[tokio::test]
    async fn list_tools_is_stable() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let first = call(&dispatcher, "7", "tools/list", Value::Null).await;
        let second = call(&dispatcher, "8", "tools/list", json!({ "ignored": true })).await;

        let first = serde_json::to_vec(first.result().unwrap()).unwrap();
        let second = serde_json::to_vec(second.result().unwrap()).unwrap();
        assert_eq!(first, second);

        let listing: Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(listing["tools"][0]["name"], "add");
        assert_eq!(listing["tools"][0]["inputSchema"]["required"], json!(["a", "b"]));
        assert_eq!(listing["tools"][1]["name"], "always_fails");
    }

    #[tokio::test]
    async fn initialize_echoes_requested_version() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let response = call(
            &dispatcher,
            "9",
            "initialize",
            json!({ "protocolVersion": "2025-06-18", "clientInfo": { "name": "cli" } }),
        )
        .await;
        let result = response.result().unwrap();
        assert_eq!(result["protocolVersion"], "2025-06-18");
        assert_eq!(result["serverInfo"], json!({ "name": "test-server", "version": "0.0.1" }));
        assert_eq!(result["capabilities"], json!({ "tools": {} }));

        let response = call(&dispatcher, "10", "initialize", Value::Null).await;
        assert_eq!(
            response.result().unwrap()["protocolVersion"],
            DEFAULT_PROTOCOL_VERSION
        );
    }

    #[tokio::test]
    async fn ping_returns_empty_object() {
        let dispatcher = dispatcher(Arc::new(AtomicUsize::new(0)));
        let response = call(&dispatcher, "11", "ping", Value::Null).await;
        assert_eq!(response.result(), Some(&json!({})));
    }
}
