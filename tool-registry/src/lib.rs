//! Tool descriptors, argument schemas, and the static tool registry.
//!
//! A registry is assembled once at startup through [`ToolRegistryBuilder`] and
//! is read-only afterwards. Every call goes through two strictly ordered
//! steps: the raw argument map is checked against the tool's
//! [`InputSchema`], producing [`ValidatedArguments`], and only then is the
//! handler invoked.

#![warn(missing_docs, clippy::pedantic)]

pub mod registry;
pub mod schema;

pub use registry::{
    Tool, ToolDescriptor, ToolError, ToolHandle, ToolRegistry, ToolRegistryBuilder, ToolResult,
};
pub use schema::{
    FieldSpec, FieldType, FieldViolation, InputSchema, InputSchemaBuilder, SchemaError,
    ValidatedArguments, ViolationKind,
};
