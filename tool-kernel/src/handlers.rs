//! Routing of decoded requests to method handlers.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tool_primitives::SessionId;
use tool_registry::SchemaError;
use tracing::{debug, warn};

use crate::protocol::{ErrorCode, Request, Response};

/// Methods understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `initialize`: session handshake.
    Initialize,
    /// `ping`: liveness probe.
    Ping,
    /// `tools/list`: capability listing.
    ListTools,
    /// `tools/call`: capability invocation.
    CallTool,
}

impl Method {
    /// Parses a wire method name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "ping" => Some(Self::Ping),
            "tools/list" => Some(Self::ListTools),
            "tools/call" => Some(Self::CallTool),
            _ => None,
        }
    }

    /// Returns the wire method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Ping => "ping",
            Self::ListTools => "tools/list",
            Self::CallTool => "tools/call",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context provided to request handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    session_id: SessionId,
    received_at: Instant,
    request: Arc<Request>,
}

impl RequestContext {
    /// Constructs a context from an owned request.
    #[must_use]
    pub fn from_request(session_id: SessionId, request: Request) -> Self {
        Self::from_shared(session_id, Arc::new(request))
    }

    /// Constructs a context from a shared request instance.
    #[must_use]
    pub fn from_shared(session_id: SessionId, request: Arc<Request>) -> Self {
        Self {
            session_id,
            received_at: Instant::now(),
            request,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the time the request was received.
    #[must_use]
    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Returns the underlying request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// Errors surfaced to callers as structured error responses.
///
/// Every variant maps onto exactly one [`ErrorCode`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The method is not one the server understands.
    #[error("method `{method}` is not supported")]
    MethodNotFound {
        /// Method name as received.
        method: String,
    },
    /// No tool is registered under the requested name.
    #[error("tool `{name}` is not registered")]
    ToolNotFound {
        /// Requested tool name.
        name: String,
    },
    /// Parameters or arguments did not satisfy the declared shape.
    #[error("{reason}")]
    InvalidArguments {
        /// Which fields were wrong and why.
        reason: String,
    },
    /// The tool ran but its underlying operation failed.
    #[error("tool `{name}` failed: {reason}")]
    ToolExecutionFailed {
        /// Tool that failed.
        name: String,
        /// Summarized cause.
        reason: String,
    },
}

impl DispatchError {
    /// Creates an invalid-arguments error from a string-like reason.
    #[must_use]
    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            reason: reason.into(),
        }
    }

    /// Returns the error code reported on the wire.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            Self::ToolNotFound { .. } => ErrorCode::ToolNotFound,
            Self::InvalidArguments { .. } => ErrorCode::InvalidArguments,
            Self::ToolExecutionFailed { .. } => ErrorCode::ToolExecutionFailed,
        }
    }
}

impl From<SchemaError> for DispatchError {
    fn from(err: SchemaError) -> Self {
        Self::invalid_arguments(err.to_string())
    }
}

/// Result alias for handler operations.
pub type DispatchResult<T = Value> = Result<T, DispatchError>;

/// Trait implemented by request handlers.
///
/// Every method defaults to [`RequestHandler::handle_unhandled`], so an
/// implementation only overrides the methods it supports.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Called for `initialize` requests.
    async fn handle_initialize(&self, ctx: &RequestContext) -> DispatchResult {
        self.handle_unhandled(ctx, Method::Initialize).await
    }

    /// Called for `ping` requests.
    async fn handle_ping(&self, ctx: &RequestContext) -> DispatchResult {
        self.handle_unhandled(ctx, Method::Ping).await
    }

    /// Called for `tools/list` requests.
    async fn handle_list_tools(&self, ctx: &RequestContext) -> DispatchResult {
        self.handle_unhandled(ctx, Method::ListTools).await
    }

    /// Called for `tools/call` requests.
    async fn handle_call_tool(&self, ctx: &RequestContext) -> DispatchResult {
        self.handle_unhandled(ctx, Method::CallTool).await
    }

    /// Fallback invoked when a specialized handler is not implemented.
    async fn handle_unhandled(&self, ctx: &RequestContext, method: Method) -> DispatchResult {
        let _ = ctx;
        Err(DispatchError::MethodNotFound {
            method: method.as_str().to_owned(),
        })
    }
}

/// Dispatches a request to the appropriate handler and builds its response.
///
/// Exactly one response is produced, tagged with the request's id; handler
/// errors are folded into error responses instead of being propagated.
pub async fn dispatch_request<H>(handler: &H, ctx: RequestContext) -> Response
where
    H: RequestHandler + ?Sized,
{
    let id = ctx.request().id().clone();

    let outcome = match Method::parse(ctx.request().method()) {
        Some(Method::Initialize) => handler.handle_initialize(&ctx).await,
        Some(Method::Ping) => handler.handle_ping(&ctx).await,
        Some(Method::ListTools) => handler.handle_list_tools(&ctx).await,
        Some(Method::CallTool) => handler.handle_call_tool(&ctx).await,
        None => Err(DispatchError::MethodNotFound {
            method: ctx.request().method().to_owned(),
        }),
    };

    let elapsed_ms = ctx.received_at().elapsed().as_millis();
    match outcome {
        Ok(result) => {
            debug!(request_id = %id, elapsed_ms, "request succeeded");
            Response::success(id, result)
        }
        Err(err) => {
            let code = err.code();
            match code {
                ErrorCode::ToolExecutionFailed => {
                    warn!(request_id = %id, %code, error = %err, elapsed_ms, "request failed");
                }
                _ => debug!(request_id = %id, %code, error = %err, elapsed_ms, "request rejected"),
            }
            Response::failure(id, code, err.to_string())
        }
    }
}
