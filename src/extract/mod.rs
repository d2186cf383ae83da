// ABOUTME: Recovers connection descriptors and table names from arbitrary upstream payloads
// ABOUTME: Rules are ordered lists of tagged matchers; the first rule that matches wins

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::connection::descriptor::{scalar_to_string, DIALECT_KEYS};
use crate::connection::{ConnectionConfigResolver, ConnectionDescriptor, Dialect};
use crate::error::{DiffError, Result, Side};

const READY_MARKERS: &[&str] = &["ready_for_comparison", "comparison_ready"];
const READY_CONFIG_KEYS: &[&str] = &["config", "canonical_config", "connection_config"];
const CONFIG_OBJECT_KEYS: &[&str] = &[
    "connection_config",
    "connectionConfig",
    "connection",
    "config",
    "database_config",
    "db_config",
];
const URL_KEYS: &[&str] = &[
    "connection_url",
    "connectionUrl",
    "connection_string",
    "connectionString",
    "url",
    "dsn",
    "uri",
    "connection",
];
const ALTERNATE_FIELDS: &[&str] = &[
    "host",
    "hostname",
    "server",
    "port",
    "user",
    "username",
    "password",
    "database",
    "db",
    "dbname",
    "schema",
    "project",
    "dataset",
    "account",
    "warehouse",
    "role",
    "instance",
    "service",
    "workspace",
    "vcluster",
    "virtualcluster",
    "access_token",
    "token",
    "server_hostname",
    "http_path",
    "catalog",
    "ssl",
    "keyfile",
    "path",
];
const TABLE_KEYS: &[&str] = &["table_name", "tableName", "table"];
const METADATA_KEYS: &[&str] = &["metadata", "meta", "_metadata"];
const QUERY_KEYS: &[&str] = &["query", "sql", "sql_query"];
const TABLE_LIST_KEYS: &[&str] = &["tables", "table_list"];

static FROM_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bfrom\s+((?:[`"\[]?[\w$]+[`"\]]?\s*\.\s*)*[`"\[]?[\w$]+[`"\]]?)"#)
        .expect("FROM clause pattern is valid")
});

/// Connection recovery rules in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRule {
    /// An explicit ready marker with an embedded canonical config.
    ReadyMarker,
    /// A nested structured connection object.
    ConfigObject,
    /// A connection URL string.
    ConnectionUrl,
    /// Loose top-level connection fields plus a dialect field.
    AlternateFields,
}

pub const CONNECTION_RULES: [ConnectionRule; 4] = [
    ConnectionRule::ReadyMarker,
    ConnectionRule::ConfigObject,
    ConnectionRule::ConnectionUrl,
    ConnectionRule::AlternateFields,
];

/// Table-name recovery rules in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRule {
    ExplicitField,
    Metadata,
    QueryFromClause,
    TableList,
}

pub const TABLE_RULES: [TableRule; 4] = [
    TableRule::ExplicitField,
    TableRule::Metadata,
    TableRule::QueryFromClause,
    TableRule::TableList,
];

impl ConnectionRule {
    /// Returns `Ok(None)` when the rule does not apply to the payload.
    pub fn apply(
        &self,
        payload: &Map<String, Value>,
        resolver: &ConnectionConfigResolver,
    ) -> Result<Option<ConnectionDescriptor>> {
        match self {
            ConnectionRule::ReadyMarker => {
                let ready = READY_MARKERS
                    .iter()
                    .any(|key| payload.get(*key).and_then(Value::as_bool) == Some(true));
                if !ready {
                    return Ok(None);
                }
                match first_object(payload, READY_CONFIG_KEYS) {
                    Some(config) => ConnectionDescriptor::from_object(config).map(Some),
                    None => Err(DiffError::InvalidPayload(
                        "payload is marked ready but carries no connection config".to_string(),
                    )),
                }
            }
            ConnectionRule::ConfigObject => {
                let Some(config) = CONFIG_OBJECT_KEYS
                    .iter()
                    .filter_map(|key| payload.get(*key).and_then(Value::as_object))
                    .find(|object| has_dialect(object))
                else {
                    return Ok(None);
                };
                ConnectionDescriptor::from_object(config).map(Some)
            }
            ConnectionRule::ConnectionUrl => {
                let Some(url) = URL_KEYS
                    .iter()
                    .filter_map(|key| payload.get(*key).and_then(Value::as_str))
                    .find(|text| text.contains("://"))
                else {
                    return Ok(None);
                };
                resolver.parse_url(url).map(Some)
            }
            ConnectionRule::AlternateFields => {
                let Some(tag) = DIALECT_KEYS
                    .iter()
                    .filter_map(|key| payload.get(*key).and_then(Value::as_str))
                    .find(|tag| Dialect::from_tag(tag).is_some())
                else {
                    return Ok(None);
                };
                let mut descriptor = ConnectionDescriptor::new(tag);
                for key in ALTERNATE_FIELDS {
                    if let Some(value) = payload.get(*key).and_then(scalar_to_string) {
                        descriptor.set(key, value);
                    }
                }
                if descriptor.fields().is_empty() {
                    return Ok(None);
                }
                Ok(Some(descriptor))
            }
        }
    }
}

impl TableRule {
    pub fn apply(&self, payload: &Map<String, Value>) -> Option<String> {
        match self {
            TableRule::ExplicitField => table_field(payload),
            TableRule::Metadata => METADATA_KEYS
                .iter()
                .filter_map(|key| payload.get(*key).and_then(Value::as_object))
                .find_map(table_field),
            TableRule::QueryFromClause => QUERY_KEYS
                .iter()
                .filter_map(|key| payload.get(*key).and_then(Value::as_str))
                .find_map(table_from_query),
            TableRule::TableList => TABLE_LIST_KEYS
                .iter()
                .filter_map(|key| payload.get(*key).and_then(Value::as_array))
                .find_map(|list| list.first().and_then(table_name_of)),
        }
    }
}

fn first_object<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter().find_map(|key| payload.get(*key).and_then(Value::as_object))
}

fn has_dialect(object: &Map<String, Value>) -> bool {
    DIALECT_KEYS
        .iter()
        .any(|key| object.get(*key).and_then(Value::as_str).is_some())
}

fn table_name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
        Value::Object(object) => ["name", "table_name", "table"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        _ => None,
    }
}

fn table_field(payload: &Map<String, Value>) -> Option<String> {
    TABLE_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(table_name_of)
}

/// Pulls the first table named in a `FROM` clause, with identifier quotes removed.
pub fn table_from_query(query: &str) -> Option<String> {
    let captures = FROM_CLAUSE.captures(query)?;
    let raw = captures.get(1)?.as_str();
    let name = raw
        .split('.')
        .map(|part| {
            part.trim()
                .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        })
        .collect::<Vec<_>>()
        .join(".");
    Some(name)
}

/// What could be recovered from one upstream payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub descriptor: ConnectionDescriptor,
    pub table: Option<String>,
    pub tables: Vec<String>,
    pub connection_rule: Option<ConnectionRule>,
    pub table_rule: Option<TableRule>,
}

impl Extraction {
    pub fn is_resolved(&self) -> bool {
        !self.descriptor.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamConfigExtractor {
    resolver: ConnectionConfigResolver,
}

impl UpstreamConfigExtractor {
    pub fn new(resolver: ConnectionConfigResolver) -> Self {
        Self { resolver }
    }

    /// Runs both rule cascades over one payload. An unmatched payload yields an
    /// empty descriptor; a rule that matches but cannot be parsed is an error.
    pub fn extract(&self, payload: &Value) -> Result<Extraction> {
        let layers = item_layers(payload);
        let mut extraction = Extraction::default();

        'connection: for object in &layers {
            for rule in CONNECTION_RULES {
                if let Some(descriptor) = rule.apply(object, &self.resolver)? {
                    debug!("Upstream connection resolved by {:?}: {}", rule, descriptor);
                    extraction.descriptor = descriptor;
                    extraction.connection_rule = Some(rule);
                    break 'connection;
                }
            }
        }

        'table: for object in &layers {
            for rule in TABLE_RULES {
                if let Some(table) = rule.apply(object) {
                    debug!("Upstream table '{}' resolved by {:?}", table, rule);
                    extraction.table = Some(table);
                    extraction.table_rule = Some(rule);
                    break 'table;
                }
            }
        }

        extraction.tables = layers
            .iter()
            .map(|object| {
                TABLE_LIST_KEYS
                    .iter()
                    .filter_map(|key| object.get(*key).and_then(Value::as_array))
                    .flat_map(|list| list.iter().filter_map(table_name_of))
                    .collect::<Vec<_>>()
            })
            .find(|tables| !tables.is_empty())
            .unwrap_or_default();
        Ok(extraction)
    }

    /// Extracts from a list of upstream items: the connection comes from the
    /// first item that resolves one, the table from the first item naming one.
    pub fn extract_items(&self, items: &[Value]) -> Result<Extraction> {
        let mut merged = Extraction::default();
        for item in items {
            let extraction = self.extract(item)?;
            if !merged.is_resolved() && extraction.is_resolved() {
                merged.descriptor = extraction.descriptor;
                merged.connection_rule = extraction.connection_rule;
                if merged.tables.is_empty() {
                    merged.tables = extraction.tables.clone();
                }
            }
            if merged.table.is_none() && extraction.table.is_some() {
                merged.table = extraction.table;
                merged.table_rule = extraction.table_rule;
            }
            if merged.is_resolved() && merged.table.is_some() {
                break;
            }
        }
        Ok(merged)
    }

    /// Resolves both sides of a comparison, reporting which side failed when
    /// either payload yields no connection.
    pub fn resolve_pair(&self, source: &Value, target: &Value) -> Result<(Extraction, Extraction)> {
        let source = self.extract(source)?;
        let target = self.extract(target)?;
        match (source.is_resolved(), target.is_resolved()) {
            (true, true) => Ok((source, target)),
            (false, false) => Err(DiffError::UnresolvedUpstream { side: Side::Both }),
            (false, true) => Err(DiffError::UnresolvedUpstream { side: Side::Source }),
            (true, false) => Err(DiffError::UnresolvedUpstream { side: Side::Target }),
        }
    }
}

/// Workflow items wrap their data in a `json` object next to any number of
/// sibling keys. The wrapped object is searched first, then the item itself.
fn item_layers(payload: &Value) -> Vec<&Map<String, Value>> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };
    match object.get("json").and_then(Value::as_object) {
        Some(inner) => vec![inner, object],
        None => vec![object],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> UpstreamConfigExtractor {
        UpstreamConfigExtractor::default()
    }

    #[test]
    fn test_ready_marker_has_highest_priority() {
        let payload = json!({
            "ready_for_comparison": true,
            "config": {"database_type": "postgresql", "host": "ready-host", "user": "u", "database": "db"},
            "connection_url": "mysql://u:p@other/db",
            "tables": ["orders", "customers"],
        });
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.connection_rule, Some(ConnectionRule::ReadyMarker));
        assert_eq!(extraction.descriptor.get("host"), Some("ready-host"));
        assert_eq!(extraction.table.as_deref(), Some("orders"));
        assert_eq!(extraction.tables, vec!["orders", "customers"]);
    }

    #[test]
    fn test_ready_marker_without_config_is_rejected() {
        let payload = json!({"ready_for_comparison": true});
        assert!(matches!(
            extractor().extract(&payload),
            Err(DiffError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_config_object_beats_url() {
        let payload = json!({
            "connection_config": {"type": "mysql", "host": "obj-host", "user": "u", "database": "db"},
            "url": "postgresql://u:p@url-host/db",
        });
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.connection_rule, Some(ConnectionRule::ConfigObject));
        assert_eq!(extraction.descriptor.dialect_tag(), "mysql");
    }

    #[test]
    fn test_connection_url_rule() {
        let payload = json!({"json": {"connectionUrl": "postgresql://u:p@h:5432/db", "table": "public.orders"}});
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.connection_rule, Some(ConnectionRule::ConnectionUrl));
        assert_eq!(extraction.descriptor.get("host"), Some("h"));
        assert_eq!(extraction.table.as_deref(), Some("public.orders"));
        assert_eq!(extraction.table_rule, Some(TableRule::ExplicitField));
    }

    #[test]
    fn test_malformed_url_surfaces_error() {
        let payload = json!({"url": "postgresql://u:p@h:notaport/db"});
        assert!(matches!(
            extractor().extract(&payload),
            Err(DiffError::MalformedConnection(_))
        ));
    }

    #[test]
    fn test_alternate_fields_rule() {
        let payload = json!({
            "db_type": "snowflake",
            "account": "acme",
            "username": "u",
            "warehouse": "WH",
            "database": "DB",
            "rows": 10,
        });
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.connection_rule, Some(ConnectionRule::AlternateFields));
        assert_eq!(extraction.descriptor.get("user"), Some("u"));
        assert_eq!(extraction.descriptor.get("rows"), None);
    }

    #[test]
    fn test_alternate_fields_ignore_non_dialect_type() {
        let payload = json!({"type": "table", "host": "h"});
        let extraction = extractor().extract(&payload).unwrap();
        assert!(!extraction.is_resolved());
    }

    #[test]
    fn test_table_from_metadata() {
        let payload = json!({"metadata": {"tableName": "orders"}});
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.table.as_deref(), Some("orders"));
        assert_eq!(extraction.table_rule, Some(TableRule::Metadata));
    }

    #[test]
    fn test_table_from_query() {
        assert_eq!(
            table_from_query("select id, total from \"sales\".\"orders\" where id > 3").as_deref(),
            Some("sales.orders")
        );
        assert_eq!(
            table_from_query("SELECT * FROM `events` LIMIT 10").as_deref(),
            Some("events")
        );
        assert_eq!(table_from_query("SELECT 1"), None);
    }

    #[test]
    fn test_query_rule_comes_before_table_list() {
        let payload = json!({"sql": "SELECT * FROM audit_log", "tables": [{"name": "first"}]});
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.table.as_deref(), Some("audit_log"));
        assert_eq!(extraction.table_rule, Some(TableRule::QueryFromClause));
    }

    #[test]
    fn test_extract_items_merges_first_matches() {
        let items = vec![
            json!({"json": {"note": "nothing here"}}),
            json!({"json": {"url": "mysql://u:p@h/db"}}),
            json!({"json": {"table_name": "orders"}}),
        ];
        let extraction = extractor().extract_items(&items).unwrap();
        assert_eq!(extraction.descriptor.dialect_tag(), "mysql");
        assert_eq!(extraction.table.as_deref(), Some("orders"));
    }

    #[test]
    fn test_resolve_pair_reports_failing_side() {
        let good = json!({"url": "postgresql://u:p@h/db"});
        let bad = json!({"something": "else"});
        let ex = extractor();

        assert!(matches!(
            ex.resolve_pair(&good, &bad),
            Err(DiffError::UnresolvedUpstream { side: Side::Target })
        ));
        assert!(matches!(
            ex.resolve_pair(&bad, &good),
            Err(DiffError::UnresolvedUpstream { side: Side::Source })
        ));
        assert!(matches!(
            ex.resolve_pair(&bad, &bad),
            Err(DiffError::UnresolvedUpstream { side: Side::Both })
        ));
        assert!(ex.resolve_pair(&good, &good).is_ok());
    }

    #[test]
    fn test_wrapped_item_with_sibling_keys() {
        let payload = json!({
            "json": {"connection_url": "postgresql://u:p@wrapped/db", "table": "t"},
            "pairedItem": {"item": 0},
            "binary": {},
            "url": "mysql://u:p@outer/db",
        });
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.connection_rule, Some(ConnectionRule::ConnectionUrl));
        assert_eq!(extraction.descriptor.dialect_tag(), "postgresql");
        assert_eq!(extraction.descriptor.get("host"), Some("wrapped"));
        assert_eq!(extraction.table.as_deref(), Some("t"));
    }

    #[test]
    fn test_outer_item_keys_used_when_wrapped_object_is_silent() {
        let payload = json!({
            "json": {"note": "no connection here"},
            "pairedItem": {"item": 0},
            "connection_url": "mysql://u:p@outer/db",
            "table_name": "events",
        });
        let extraction = extractor().extract(&payload).unwrap();
        assert_eq!(extraction.descriptor.get("host"), Some("outer"));
        assert_eq!(extraction.table.as_deref(), Some("events"));
    }

    #[test]
    fn test_non_object_payload_is_empty() {
        let extraction = extractor().extract(&json!("just text")).unwrap();
        assert!(!extraction.is_resolved());
        assert_eq!(extraction.table, None);
    }
}
