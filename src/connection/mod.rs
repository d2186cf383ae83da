// ABOUTME: Connection config resolution between URL, structured and canonical forms
// ABOUTME: Exposes ConnectionConfigResolver, which carries the ambient resolver defaults

pub mod canonical;
pub mod descriptor;
pub mod dialect;
pub mod url;

pub use canonical::{to_canonical, CanonicalConfig, CanonicalFields, ResolverDefaults};
pub use descriptor::ConnectionDescriptor;
pub use dialect::{Dialect, Family};

use serde_json::Value;
use std::fmt;

use crate::error::{DiffError, Result};

/// Fully-qualified table name used on one side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub schema: Option<String>,
    pub table: String,
}

impl TableReference {
    /// Splits `schema.table` on the last dot; a bare name has no schema.
    /// Surrounding quotes and brackets are stripped from each part.
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let (schema, table) = match trimmed.rsplit_once('.') {
            Some((schema, table)) => (Some(unquote(schema)), unquote(table)),
            None => (None, unquote(trimmed)),
        };
        if table.is_empty() {
            return Err(DiffError::MissingTable(format!(
                "'{}' does not name a table",
                name
            )));
        }
        Ok(Self {
            schema: schema.filter(|s| !s.is_empty()),
            table,
        })
    }

    /// Qualifies the reference with `schema` when it has none of its own.
    pub fn qualified_with(&self, schema: &str) -> TableReference {
        TableReference {
            schema: self.schema.clone().or_else(|| Some(schema.to_string())),
            table: self.table.clone(),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

fn unquote(part: &str) -> String {
    part.trim()
        .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_string()
}

/// Converts between URL strings, structured field-sets and the backend's
/// canonical config.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigResolver {
    defaults: ResolverDefaults,
}

impl ConnectionConfigResolver {
    pub fn new(defaults: ResolverDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ResolverDefaults {
        &self.defaults
    }

    /// Accepts a URL string (the scheme names the dialect) or a structured object.
    pub fn parse(&self, input: &Value) -> Result<ConnectionDescriptor> {
        match input {
            Value::String(text) => self.parse_url(text),
            Value::Object(object) => ConnectionDescriptor::from_object(object),
            other => Err(DiffError::MalformedConnection(format!(
                "expected a connection URL or object, got {}",
                json_kind(other)
            ))),
        }
    }

    pub fn parse_url(&self, text: &str) -> Result<ConnectionDescriptor> {
        url::parse_url(text)
    }

    pub fn to_canonical(&self, descriptor: &ConnectionDescriptor) -> Result<CanonicalConfig> {
        canonical::to_canonical(descriptor, &self.defaults)
    }

    pub fn to_url(&self, descriptor: &ConnectionDescriptor) -> Result<String> {
        url::to_url(descriptor)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
