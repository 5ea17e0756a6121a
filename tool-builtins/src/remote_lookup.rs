//! `remote_lookup`: fetches a JSON document from a fixed endpoint.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tool_adapters::traits::JsonFetcher;
use tool_registry::{
    FieldSpec, FieldType, InputSchema, Tool, ToolDescriptor, ToolError, ToolResult,
    ValidatedArguments,
};
use tracing::warn;

/// Registered name of the tool.
pub const NAME: &str = "remote_lookup";

/// Endpoint queried when no other URL is configured.
pub const DEFAULT_REMOTE_URL: &str = "https://httpbin.org/json";

/// Tool that performs one outbound GET per invocation.
pub struct RemoteLookup {
    fetcher: Arc<dyn JsonFetcher>,
    url: String,
}

impl fmt::Debug for RemoteLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLookup")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RemoteLookup {
    /// Creates the tool over the supplied fetcher and endpoint.
    #[must_use]
    pub fn new(fetcher: Arc<dyn JsonFetcher>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }

    /// Returns the endpoint queried on each invocation.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Descriptor advertised in tool listings.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the static metadata is invalid.
    pub fn descriptor() -> ToolResult<ToolDescriptor> {
        let schema = InputSchema::builder()
            .field(
                FieldSpec::optional("id", FieldType::Number)
                    .with_description("Record identifier (currently not forwarded)"),
            )
            .build()?;
        Ok(ToolDescriptor::new(
            NAME,
            "Fetch the JSON document served by the configured remote endpoint",
        )?
        .with_input_schema(schema))
    }
}

#[async_trait]
impl Tool for RemoteLookup {
    async fn invoke(&self, _arguments: ValidatedArguments) -> ToolResult<Value> {
        self.fetcher.get_json(&self.url).await.map_err(|err| {
            warn!(url = %self.url, error = %err, "remote lookup failed");
            ToolError::execution(format!("remote lookup failed: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use std::sync::Mutex;
    use tool_adapters::traits::{AdapterError, AdapterResult};

    struct ScriptedFetcher {
        seen: Mutex<Vec<String>>,
        reply: fn() -> AdapterResult<Value>,
    }

    #[async_trait]
    impl JsonFetcher for ScriptedFetcher {
        async fn get_json(&self, uri: &str) -> AdapterResult<Value> {
            self.seen.lock().unwrap().push(uri.to_owned());
            (self.reply)()
        }
    }

    fn tool(reply: fn() -> AdapterResult<Value>) -> (RemoteLookup, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher {
            seen: Mutex::new(Vec::new()),
            reply,
        });
        let tool = RemoteLookup::new(fetcher.clone(), "https://example.test/json");
        (tool, fetcher)
    }

    #[tokio::test]
    async fn returns_decoded_body() {
        let (tool, fetcher) = tool(|| Ok(json!({ "slideshow": { "author": "Yours Truly" } })));
        let result = tool.invoke(ValidatedArguments::default()).await.unwrap();

        assert_eq!(result["slideshow"]["author"], "Yours Truly");
        assert_eq!(
            fetcher.seen.lock().unwrap().as_slice(),
            ["https://example.test/json"]
        );
    }

    #[tokio::test]
    async fn adapter_failure_becomes_execution_error() {
        let (tool, _) = tool(|| Err(AdapterError::Status { status: 500 }));
        let err = tool
            .invoke(ValidatedArguments::default())
            .await
            .expect_err("status 500 should fail");

        assert!(matches!(&err, ToolError::Execution { reason } if reason.contains("500")));
    }

    #[test]
    fn id_is_optional_but_typed() {
        let descriptor = RemoteLookup::descriptor().unwrap();
        assert!(descriptor.input_schema().validate(Map::new()).is_ok());

        let mut map = Map::new();
        map.insert("id".into(), json!("seven"));
        assert!(descriptor.input_schema().validate(map).is_err());
    }
}
