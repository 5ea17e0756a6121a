//! Declared input schemas and argument validation.

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::{ToolError, ToolResult};

/// Primitive type tag attached to every declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part that fits in 64 bits.
    Integer,
    /// A JSON string.
    String,
    /// A JSON boolean.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldType {
    /// Returns the JSON Schema spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Returns `true` if the value satisfies this type tag.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_))
            | (Self::Boolean, Value::Bool(_))
            | (Self::Object, Value::Object(_))
            | (Self::Array, Value::Array(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named field of an [`InputSchema`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    required: bool,
    description: Option<String>,
}

impl FieldSpec {
    /// Declares a field the caller must supply.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            description: None,
        }
    }

    /// Declares a field the caller may omit.
    #[must_use]
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type tag.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns `true` if the field must be present.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn check(&self, arguments: &Map<String, Value>) -> Option<FieldViolation> {
        let kind = match arguments.get(&self.name) {
            None if self.required => ViolationKind::Missing,
            None | Some(Value::Null) if !self.required => return None,
            Some(value) if !self.field_type.matches(value) => ViolationKind::WrongType {
                expected: self.field_type,
                found: json_type_name(value),
            },
            _ => return None,
        };

        Some(FieldViolation {
            field: self.name.clone(),
            kind,
        })
    }
}

/// Structural description of the arguments a tool accepts.
///
/// Serializes as a JSON Schema object so clients can render it directly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    /// Creates a schema that declares no fields.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> InputSchemaBuilder {
        InputSchemaBuilder { fields: Vec::new() }
    }

    /// Returns the declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Checks the supplied arguments against the declared fields.
    ///
    /// Undeclared arguments are kept and passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] listing every field that is missing or has the
    /// wrong type.
    pub fn validate(&self, arguments: Map<String, Value>) -> Result<ValidatedArguments, SchemaError> {
        let violations: Vec<_> = self
            .fields
            .iter()
            .filter_map(|field| field.check(&arguments))
            .collect();

        if violations.is_empty() {
            Ok(ValidatedArguments { values: arguments })
        } else {
            Err(SchemaError { violations })
        }
    }
}

impl Serialize for InputSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                let mut property = Map::new();
                property.insert("type".into(), Value::from(field.field_type.as_str()));
                if let Some(description) = &field.description {
                    property.insert("description".into(), Value::from(description.as_str()));
                }
                (field.name.clone(), Value::Object(property))
            })
            .collect();

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
            .collect();

        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &properties)?;
        map.serialize_entry("required", &required)?;
        map.end()
    }
}

/// Builder for [`InputSchema`].
#[derive(Debug)]
pub struct InputSchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl InputSchemaBuilder {
    /// Adds a field declaration.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a required field without a description.
    #[must_use]
    pub fn required(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(FieldSpec::required(name, field_type))
    }

    /// Adds an optional field without a description.
    #[must_use]
    pub fn optional(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(FieldSpec::optional(name, field_type))
    }

    /// Finalises the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if a field name is empty or
    /// declared twice.
    pub fn build(self) -> ToolResult<InputSchema> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ToolError::InvalidMetadata {
                    reason: "schema field name cannot be empty".into(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ToolError::InvalidMetadata {
                    reason: format!("schema field `{}` is declared twice", field.name),
                });
            }
        }

        Ok(InputSchema {
            fields: self.fields,
        })
    }
}

/// Why a single field failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field was absent.
    Missing,
    /// The field was present with a value of another JSON type.
    WrongType {
        /// Declared type.
        expected: FieldType,
        /// JSON type actually supplied.
        found: &'static str,
    },
}

/// A field that failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    field: String,
    kind: ViolationKind,
}

impl FieldViolation {
    /// Returns the offending field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the violation kind.
    #[must_use]
    pub fn kind(&self) -> &ViolationKind {
        &self.kind
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "`{}` is required", self.field),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "`{}` must be {expected}, found {found}", self.field)
            }
        }
    }
}

/// Arguments rejected by an [`InputSchema`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid arguments: {}", join_violations(.violations))]
pub struct SchemaError {
    violations: Vec<FieldViolation>,
}

impl SchemaError {
    /// Returns every offending field, in schema declaration order.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Arguments that passed schema validation.
///
/// Handlers only ever receive this type, never the raw request map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidatedArguments {
    values: Map<String, Value>,
}

impl ValidatedArguments {
    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns a numeric field as `f64`.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Returns an integer field.
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Returns a string field.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns a boolean field.
    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Number of arguments, including undeclared ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deserializes the arguments into a handler-specific structure.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Execution`] when the arguments do not fit `T`,
    /// which means the handler's structure disagrees with its own schema.
    pub fn parse<T>(&self) -> ToolResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(Value::Object(self.values.clone())).map_err(|err| {
            ToolError::execution(format!("arguments do not match handler shape: {err}"))
        })
    }

    /// Consumes the wrapper, returning the underlying map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
