// ABOUTME: Canonical backend connection config, one typed field set per dialect family
// ABOUTME: Validates required fields and fills default ports and schemas

use serde::{Deserialize, Serialize};

use super::descriptor::ConnectionDescriptor;
use super::dialect::{Dialect, Family};
use crate::error::{DiffError, Result};

/// Ambient defaults applied while resolving descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverDefaults {
    /// Used when a descriptor names no schema; takes precedence over the
    /// dialect's own default.
    pub default_schema: Option<String>,
}

/// The connection body the comparison backend accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalConfig {
    pub database_type: Dialect,
    #[serde(flatten)]
    pub fields: CanonicalFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalFields {
    Host(HostFields),
    Snowflake(SnowflakeFields),
    File(FileFields),
    Serverless(ServerlessFields),
    ManagedLakehouse(ManagedLakehouseFields),
    Federated(FederatedFields),
    ClusterLakehouse(ClusterLakehouseFields),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostFields {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnowflakeFields {
    pub account: String,
    pub user: String,
    pub password: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFields {
    pub database: String,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerlessFields {
    pub project: String,
    pub dataset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyfile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedLakehouseFields {
    pub access_token: String,
    pub server_hostname: String,
    pub http_path: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederatedFields {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub catalog: String,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterLakehouseFields {
    pub username: String,
    pub password: String,
    pub instance: String,
    pub service: String,
    pub workspace: String,
    pub vcluster: String,
    pub schema: String,
}

impl CanonicalConfig {
    /// Schema the comparison runs against on this connection.
    pub fn schema(&self) -> &str {
        match &self.fields {
            CanonicalFields::Host(f) => &f.schema,
            CanonicalFields::Snowflake(f) => &f.schema,
            CanonicalFields::File(f) => &f.schema,
            CanonicalFields::Serverless(f) => &f.dataset,
            CanonicalFields::ManagedLakehouse(f) => &f.schema,
            CanonicalFields::Federated(f) => &f.schema,
            CanonicalFields::ClusterLakehouse(f) => &f.schema,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain strings and integers cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

struct FieldReader<'a> {
    descriptor: &'a ConnectionDescriptor,
    dialect: Dialect,
}

impl<'a> FieldReader<'a> {
    fn required(&self, field: &str) -> Result<String> {
        self.descriptor
            .get(field)
            .map(str::to_string)
            .ok_or_else(|| DiffError::missing_field(self.dialect.as_str(), field))
    }

    fn optional(&self, field: &str) -> Option<String> {
        self.descriptor.get(field).map(str::to_string)
    }

    fn port(&self) -> Result<u16> {
        match self.descriptor.get("port") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                DiffError::MalformedConnection(format!(
                    "{} port '{}' is not a valid port number",
                    self.dialect, raw
                ))
            }),
            None => self
                .dialect
                .default_port()
                .ok_or_else(|| DiffError::missing_field(self.dialect.as_str(), "port")),
        }
    }

    fn ssl(&self) -> Result<Option<bool>> {
        let Some(raw) = self.descriptor.get("ssl") else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "require" | "required" => Ok(Some(true)),
            "false" | "0" | "no" | "disable" | "disabled" => Ok(Some(false)),
            other => Err(DiffError::MalformedConnection(format!(
                "{} ssl flag '{}' is not a boolean",
                self.dialect, other
            ))),
        }
    }

    fn schema(&self, defaults: &ResolverDefaults, derived: Option<String>) -> Result<String> {
        if let Some(schema) = self.optional("schema") {
            return Ok(schema);
        }
        if let Some(schema) = &defaults.default_schema {
            return Ok(schema.clone());
        }
        if let Some(schema) = self.dialect.default_schema() {
            return Ok(schema.to_string());
        }
        derived.ok_or_else(|| DiffError::missing_field(self.dialect.as_str(), "schema"))
    }
}

/// Maps a descriptor onto the backend's canonical config. Pure: performs no I/O,
/// so a missing required field is reported before any request is made.
pub fn to_canonical(
    descriptor: &ConnectionDescriptor,
    defaults: &ResolverDefaults,
) -> Result<CanonicalConfig> {
    if descriptor.dialect_tag().is_empty() {
        return Err(DiffError::MalformedConnection(
            "connection has no dialect".to_string(),
        ));
    }
    let dialect = descriptor.dialect()?;
    let reader = FieldReader { descriptor, dialect };
    for field in dialect.required_fields() {
        reader.required(field)?;
    }

    let fields = match dialect.family() {
        Family::Host => {
            let user = reader.required("user")?;
            let database = reader.required("database")?;
            let derived = match dialect {
                Dialect::Mysql => Some(database.clone()),
                Dialect::Oracle => Some(user.to_ascii_uppercase()),
                _ => None,
            };
            CanonicalFields::Host(HostFields {
                host: reader.required("host")?,
                port: reader.port()?,
                password: reader.optional("password").unwrap_or_default(),
                schema: reader.schema(defaults, derived)?,
                ssl: reader.ssl()?,
                user,
                database,
            })
        }
        Family::Snowflake => CanonicalFields::Snowflake(SnowflakeFields {
            account: reader.required("account")?,
            user: reader.required("user")?,
            password: reader.optional("password").unwrap_or_default(),
            warehouse: reader.required("warehouse")?,
            database: reader.required("database")?,
            schema: reader.schema(defaults, None)?,
            role: reader.optional("role"),
        }),
        Family::File => CanonicalFields::File(FileFields {
            database: reader.required("database")?,
            schema: reader.schema(defaults, None)?,
        }),
        Family::Serverless => CanonicalFields::Serverless(ServerlessFields {
            project: reader.required("project")?,
            dataset: reader.required("dataset")?,
            keyfile: reader.optional("keyfile"),
        }),
        Family::ManagedLakehouse => CanonicalFields::ManagedLakehouse(ManagedLakehouseFields {
            access_token: reader.required("access_token")?,
            server_hostname: reader.required("server_hostname")?,
            http_path: reader.required("http_path")?,
            schema: reader.schema(defaults, None)?,
            catalog: reader.optional("catalog"),
        }),
        Family::Federated => CanonicalFields::Federated(FederatedFields {
            host: reader.required("host")?,
            port: reader.port()?,
            username: reader.required("username")?,
            password: reader.optional("password"),
            catalog: reader.required("catalog")?,
            schema: reader.schema(defaults, None)?,
        }),
        Family::ClusterLakehouse => CanonicalFields::ClusterLakehouse(ClusterLakehouseFields {
            username: reader.required("username")?,
            password: reader.required("password")?,
            instance: reader.required("instance")?,
            service: reader.required("service")?,
            workspace: reader.required("workspace")?,
            vcluster: reader.required("vcluster")?,
            schema: reader.schema(defaults, None)?,
        }),
    };

    Ok(CanonicalConfig {
        database_type: dialect,
        fields,
    })
}
