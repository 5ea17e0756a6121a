//! Static registry of tool descriptors and their handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tool_primitives::ToolName;

use crate::schema::{InputSchema, SchemaError, ValidatedArguments};

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Immutable description of a registered tool, as advertised to callers.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    name: ToolName,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
}

impl ToolDescriptor {
    /// Creates a descriptor with an empty input schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if the name is not a valid tool
    /// name or the description is blank.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> ToolResult<Self> {
        let name = ToolName::new(name)?;

        let description = description.into();
        if description.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: format!("tool `{name}` needs a description"),
            });
        }

        Ok(Self {
            name,
            description,
            input_schema: InputSchema::empty(),
        })
    }

    /// Sets the declared input schema.
    #[must_use]
    pub fn with_input_schema(mut self, input_schema: InputSchema) -> Self {
        self.input_schema = input_schema;
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &ToolName {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared input schema.
    #[must_use]
    pub fn input_schema(&self) -> &InputSchema {
        &self.input_schema
    }
}

/// Trait implemented by tool executors.
///
/// Handlers receive arguments that have already passed the tool's schema.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool, returning its JSON result.
    async fn invoke(&self, arguments: ValidatedArguments) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(ValidatedArguments) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, arguments: ValidatedArguments) -> ToolResult<Value> {
        (self)(arguments).await
    }
}

/// A registered tool: its descriptor bound to its executor.
#[derive(Clone)]
pub struct ToolHandle {
    descriptor: ToolDescriptor,
    executor: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

impl ToolHandle {
    /// Returns the associated descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Checks raw arguments against the tool's declared schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] naming every offending field.
    pub fn validate(&self, arguments: Map<String, Value>) -> Result<ValidatedArguments, SchemaError> {
        self.descriptor.input_schema.validate(arguments)
    }

    /// Executes the underlying tool implementation.
    ///
    /// # Errors
    ///
    /// Propagates any [`ToolError`] returned by the implementation.
    pub async fn invoke(&self, arguments: ValidatedArguments) -> ToolResult<Value> {
        self.executor.invoke(arguments).await
    }
}

/// Read-only registry of tools, keyed by unique name.
///
/// Built once through [`ToolRegistry::builder`]; there is no way to add or
/// remove tools afterwards, so the registry can be shared without locking.
pub struct ToolRegistry {
    entries: Vec<ToolHandle>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.descriptor.name.as_str())
            .collect();
        f.debug_struct("ToolRegistry")
            .field("registered", &names)
            .finish()
    }
}

impl ToolRegistry {
    /// Starts assembling a registry.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Lists the descriptors of all registered tools in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.entries.iter().map(ToolHandle::descriptor).collect()
    }

    /// Returns the tool registered under `name`, if any.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ToolHandle> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Startup-time builder for [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    entries: Vec<ToolHandle>,
    index: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    /// Registers a tool implementation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present.
    pub fn register<T>(mut self, descriptor: ToolDescriptor, tool: T) -> ToolResult<Self>
    where
        T: Tool + 'static,
    {
        let name = descriptor.name.as_str().to_owned();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        self.index.insert(name, self.entries.len());
        self.entries.push(ToolHandle {
            descriptor,
            executor: Arc::new(tool),
        });

        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Errors produced by tool registration and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool metadata failed validation.
    #[error("invalid tool metadata: {reason}")]
    InvalidMetadata {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }
}

impl From<tool_primitives::Error> for ToolError {
    fn from(err: tool_primitives::Error) -> Self {
        Self::InvalidMetadata {
            reason: err.to_string(),
        }
    }
}
