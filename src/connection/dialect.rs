// ABOUTME: Catalogue of supported database dialects and their field templates
// ABOUTME: Maps tags and URL schemes to dialects, default ports and required fields

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DiffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgresql,
    Mysql,
    Oracle,
    Sqlserver,
    Redshift,
    Vertica,
    Clickhouse,
    Snowflake,
    Duckdb,
    Bigquery,
    Databricks,
    Trino,
    Presto,
    Clickzetta,
}

/// Dialects sharing one connection field template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// host, port, user, password, database, schema, ssl
    Host,
    /// account, user, password, warehouse, database, schema, role
    Snowflake,
    /// a local database file
    File,
    /// project, dataset
    Serverless,
    /// access_token, server_hostname, http_path, catalog, schema
    ManagedLakehouse,
    /// host, port, username, password, catalog, schema
    Federated,
    /// username, password, instance, service, workspace, vcluster, schema
    ClusterLakehouse,
}

impl Dialect {
    pub const ALL: [Dialect; 14] = [
        Dialect::Postgresql,
        Dialect::Mysql,
        Dialect::Oracle,
        Dialect::Sqlserver,
        Dialect::Redshift,
        Dialect::Vertica,
        Dialect::Clickhouse,
        Dialect::Snowflake,
        Dialect::Duckdb,
        Dialect::Bigquery,
        Dialect::Databricks,
        Dialect::Trino,
        Dialect::Presto,
        Dialect::Clickzetta,
    ];

    /// Looks up a dialect by tag or URL scheme, accepting the common aliases
    /// upstream nodes emit.
    pub fn from_tag(tag: &str) -> Option<Dialect> {
        let dialect = match tag.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" | "pgsql" => Dialect::Postgresql,
            "mysql" | "mariadb" => Dialect::Mysql,
            "oracle" | "oracledb" => Dialect::Oracle,
            "sqlserver" | "mssql" | "sql_server" | "sql-server" => Dialect::Sqlserver,
            "redshift" => Dialect::Redshift,
            "vertica" => Dialect::Vertica,
            "clickhouse" => Dialect::Clickhouse,
            "snowflake" => Dialect::Snowflake,
            "duckdb" => Dialect::Duckdb,
            "bigquery" | "bq" => Dialect::Bigquery,
            "databricks" => Dialect::Databricks,
            "trino" => Dialect::Trino,
            "presto" => Dialect::Presto,
            "clickzetta" | "lakehouse" => Dialect::Clickzetta,
            _ => return None,
        };
        Some(dialect)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgresql => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::Oracle => "oracle",
            Dialect::Sqlserver => "sqlserver",
            Dialect::Redshift => "redshift",
            Dialect::Vertica => "vertica",
            Dialect::Clickhouse => "clickhouse",
            Dialect::Snowflake => "snowflake",
            Dialect::Duckdb => "duckdb",
            Dialect::Bigquery => "bigquery",
            Dialect::Databricks => "databricks",
            Dialect::Trino => "trino",
            Dialect::Presto => "presto",
            Dialect::Clickzetta => "clickzetta",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Dialect::Postgresql
            | Dialect::Mysql
            | Dialect::Oracle
            | Dialect::Sqlserver
            | Dialect::Redshift
            | Dialect::Vertica
            | Dialect::Clickhouse => Family::Host,
            Dialect::Snowflake => Family::Snowflake,
            Dialect::Duckdb => Family::File,
            Dialect::Bigquery => Family::Serverless,
            Dialect::Databricks => Family::ManagedLakehouse,
            Dialect::Trino | Dialect::Presto => Family::Federated,
            Dialect::Clickzetta => Family::ClusterLakehouse,
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Dialect::Postgresql => Some(5432),
            Dialect::Mysql => Some(3306),
            Dialect::Oracle => Some(1521),
            Dialect::Sqlserver => Some(1433),
            Dialect::Redshift => Some(5439),
            Dialect::Vertica => Some(5433),
            Dialect::Clickhouse => Some(8123),
            Dialect::Trino | Dialect::Presto => Some(8080),
            _ => None,
        }
    }

    /// Schema used when neither the descriptor nor the resolver defaults name one.
    /// `None` means the schema is derived from another field (see `canonical`).
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgresql | Dialect::Redshift | Dialect::Vertica | Dialect::Clickzetta => {
                Some("public")
            }
            Dialect::Sqlserver => Some("dbo"),
            Dialect::Clickhouse | Dialect::Databricks | Dialect::Trino | Dialect::Presto => {
                Some("default")
            }
            Dialect::Snowflake => Some("PUBLIC"),
            Dialect::Duckdb => Some("main"),
            Dialect::Mysql | Dialect::Oracle | Dialect::Bigquery => None,
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self.family() {
            Family::Host => &["host", "user", "database"],
            Family::Snowflake => &["account", "user", "warehouse", "database"],
            Family::File => &["database"],
            Family::Serverless => &["project", "dataset"],
            Family::ManagedLakehouse => &["access_token", "server_hostname", "http_path"],
            Family::Federated => &["host", "username", "catalog"],
            Family::ClusterLakehouse => &[
                "username",
                "password",
                "instance",
                "service",
                "workspace",
                "vcluster",
            ],
        }
    }

    /// Whether the template for this dialect names the login field `username`
    /// rather than `user`.
    pub fn uses_username(&self) -> bool {
        matches!(self.family(), Family::Federated | Family::ClusterLakehouse)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = DiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::from_tag(s).ok_or_else(|| DiffError::UnsupportedDialect(s.to_string()))
    }
}
