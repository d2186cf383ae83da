// ABOUTME: Dialect-tagged connection descriptor with template-normalized field names
// ABOUTME: Folds upstream field aliases onto one spelling per dialect family

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::dialect::{Dialect, Family};
use crate::error::{DiffError, Result};

/// Keys that carry the dialect tag on structured input, in lookup order.
pub const DIALECT_KEYS: &[&str] = &["database_type", "db_type", "dialect", "type", "driver"];

const SECRET_FIELDS: &[&str] = &["password", "access_token"];

/// A request-scoped description of one database connection.
///
/// The dialect tag is kept as given when it is not a known dialect so that the
/// failure surfaces from [`to_canonical`](super::canonical::to_canonical) with the
/// offending tag rather than being lost during parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    dialect: String,
    fields: BTreeMap<String, String>,
}

impl ConnectionDescriptor {
    pub fn new(dialect: &str) -> Self {
        let dialect = match Dialect::from_tag(dialect) {
            Some(known) => known.as_str().to_string(),
            None => dialect.trim().to_ascii_lowercase(),
        };
        Self {
            dialect,
            fields: BTreeMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.dialect.is_empty() && self.fields.is_empty()
    }

    pub fn dialect_tag(&self) -> &str {
        &self.dialect
    }

    pub fn dialect(&self) -> Result<Dialect> {
        self.dialect.parse()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Sets a field, folding aliases onto the dialect's template name.
    /// Empty values are dropped so that "missing" has a single representation.
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        let name = normalize_field_name(Dialect::from_tag(&self.dialect), field);
        let value = if name == "http_path" && !value.starts_with('/') {
            format!("/{}", value)
        } else {
            value
        };
        self.fields.insert(name, value);
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    /// Builds a descriptor from a structured field-set. Scalar values are
    /// stringified; nested objects, arrays and nulls are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        let tag = DIALECT_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .ok_or_else(|| {
                DiffError::MalformedConnection(
                    "structured connection has no database_type/type/dialect field".to_string(),
                )
            })?;

        let mut descriptor = ConnectionDescriptor::new(tag);
        for (key, value) in object {
            if DIALECT_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(text) = scalar_to_string(value) {
                descriptor.set(key, text);
            }
        }
        Ok(descriptor)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty connection>");
        }
        write!(f, "{}(", self.dialect)?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if SECRET_FIELDS.contains(&key.as_str()) {
                write!(f, "{}=***", key)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        write!(f, ")")
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Maps an upstream field name onto the template spelling for `dialect`.
fn normalize_field_name(dialect: Option<Dialect>, raw: &str) -> String {
    let snake = to_snake_case(raw);
    let named = match snake.as_str() {
        "hostname" | "server" | "host_name" => "host",
        "pwd" | "pass" | "passwd" => "password",
        "db" | "dbname" | "database_name" | "db_name" => "database",
        "virtualcluster" | "virtual_cluster" | "vc" => "vcluster",
        "token" | "access_key" | "personal_access_token" => "access_token",
        "server_host_name" | "workspace_url" => "server_hostname",
        "project_id" => "project",
        "dataset_id" => "dataset",
        "credentials_path" | "key_file" | "credentials_file" => "keyfile",
        "schema_name" => "schema",
        "instance_id" => "instance",
        "warehouse_name" => "warehouse",
        "account_identifier" | "account_name" => "account",
        other => other,
    };

    let family = dialect.map(|d| d.family());
    match (named, family) {
        ("username", Some(Family::Host | Family::Snowflake)) => "user".to_string(),
        ("user", Some(Family::Federated | Family::ClusterLakehouse)) => "username".to_string(),
        ("path" | "file" | "filepath" | "file_path", Some(Family::File)) => "database".to_string(),
        ("username", None) => "user".to_string(),
        (name, _) => name.to_string(),
    }
}

fn to_snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for (i, ch) in raw.trim().chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}
