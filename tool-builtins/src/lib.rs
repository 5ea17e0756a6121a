//! Tools shipped with the server.
//!
//! [`calculate_sum`] is a pure local computation; [`remote_lookup`] suspends
//! on an outbound HTTP call. Together they cover both handler shapes the
//! dispatcher has to support.

#![warn(missing_docs, clippy::pedantic)]

pub mod calculate_sum;
pub mod remote_lookup;

use std::sync::Arc;

use tool_adapters::traits::JsonFetcher;
use tool_registry::{ToolRegistry, ToolResult};

pub use calculate_sum::CalculateSum;
pub use remote_lookup::{DEFAULT_REMOTE_URL, RemoteLookup};

/// Builds the registry of built-in tools, in listing order.
///
/// # Errors
///
/// Returns [`tool_registry::ToolError`] if a built-in descriptor is invalid.
pub fn builtin_registry(
    fetcher: Arc<dyn JsonFetcher>,
    remote_url: impl Into<String>,
) -> ToolResult<ToolRegistry> {
    let registry = ToolRegistry::builder()
        .register(CalculateSum::descriptor()?, CalculateSum)?
        .register(
            RemoteLookup::descriptor()?,
            RemoteLookup::new(fetcher, remote_url),
        )?
        .build();
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use tool_adapters::traits::AdapterResult;

    struct NullFetcher;

    #[async_trait]
    impl JsonFetcher for NullFetcher {
        async fn get_json(&self, _uri: &str) -> AdapterResult<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn registers_both_tools_in_order() {
        let registry = builtin_registry(Arc::new(NullFetcher), DEFAULT_REMOTE_URL).unwrap();
        let names: Vec<_> = registry.list().iter().map(|d| d.name().as_str()).collect();
        assert_eq!(names, ["calculate_sum", "remote_lookup"]);
    }
}
