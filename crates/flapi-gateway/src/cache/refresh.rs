//! The cache refresh procedure (spec §4.5): read the last snapshot,
//! render the cache SQL template against the endpoint's cache parameters,
//! filter to new rows for incremental modes, write them per `CacheMode`,
//! apply retention, and record a sync event.
//!
//! Each refresh cycle stamps written rows with a `_captured_at` column;
//! retention keeps the newest N captures or drops captures older than a
//! max age, whichever `RetentionConfig` specifies.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use flapi_error::GatewayError;

use crate::cache::snapshot::SnapshotCatalog;
use crate::cache::sync_event::{SyncEvent, SyncEventLog, SyncStatus};
use crate::cache::CacheMode;
use crate::endpoint::{CacheConfig, RetentionConfig};
use crate::executor::QueryExecutor;

const DEFAULT_CATALOG: &str = "postgres";

#[derive(Debug, Clone)]
pub struct CacheRefreshOutcome {
    pub mode: CacheMode,
    pub rows_written: usize,
    pub cursor_value: Option<Value>,
    pub captured_at: DateTime<Utc>,
}

pub struct CacheRefresher {
    executor: Arc<QueryExecutor>,
    snapshots: Arc<SnapshotCatalog>,
    sync_log: Arc<SyncEventLog>,
}

impl CacheRefresher {
    #[must_use]
    pub fn new(executor: Arc<QueryExecutor>, snapshots: Arc<SnapshotCatalog>, sync_log: Arc<SyncEventLog>) -> Self {
        Self { executor, snapshots, sync_log }
    }

    /// Runs one refresh cycle for `endpoint_key`: reads the last snapshot,
    /// renders `template` against the cache parameters, executes it, writes
    /// the result into the cache table, applies retention, and records a
    /// sync event. The sync event is recorded regardless of outcome; only a
    /// failure to run the refresh itself is propagated to the caller.
    pub async fn refresh(
        &self,
        endpoint_key: &str,
        cache: &CacheConfig,
        template: &str,
    ) -> Result<CacheRefreshOutcome, GatewayError> {
        let mode = crate::cache::select_mode(!cache.primary_keys.is_empty(), cache.cursor.is_some());
        let last = self.snapshots.last_snapshot(endpoint_key);

        let result = self.refresh_inner(cache, mode, template, last.cursor_value.as_ref()).await;

        match &result {
            Ok(outcome) => {
                self.snapshots.record(endpoint_key, outcome.cursor_value.clone(), outcome.captured_at);
                self.sync_log.record(SyncEvent {
                    endpoint: endpoint_key.to_string(),
                    mode,
                    status: SyncStatus::Success,
                    message: format!("wrote {} rows", outcome.rows_written),
                    occurred_at: outcome.captured_at,
                });
            }
            Err(e) => {
                self.sync_log.record(SyncEvent {
                    endpoint: endpoint_key.to_string(),
                    mode,
                    status: SyncStatus::Error,
                    message: e.to_string(),
                    occurred_at: Utc::now(),
                });
            }
        }

        result
    }

    async fn refresh_inner(
        &self,
        cache: &CacheConfig,
        mode: CacheMode,
        template: &str,
        last_cursor: Option<&Value>,
    ) -> Result<CacheRefreshOutcome, GatewayError> {
        let params = build_cache_params(cache, mode);
        let sql = render_cache_template(template, &params)?;

        let source = self.executor.execute(&sql, &[]).await?;
        let captured_at = Utc::now();

        let rows: Vec<Value> = if mode == CacheMode::Append {
            let cursor_column = cache.cursor.as_ref().map(|c| c.column.as_str());
            filter_rows_after_cursor(&source.rows, cursor_column, last_cursor)
        } else {
            source.rows.clone()
        };

        let rows_written = match mode {
            CacheMode::Full => self.write_full(cache, &rows, captured_at).await?,
            CacheMode::Append => self.write_rows(cache, &rows, captured_at, None).await?,
            CacheMode::Merge => self.write_rows(cache, &rows, captured_at, Some(&cache.primary_keys)).await?,
        };

        self.apply_retention(cache, captured_at).await?;

        let cursor_value = cache
            .cursor
            .as_ref()
            .and_then(|cursor| rows.iter().filter_map(|row| row.get(&cursor.column)).max_by(|a, b| compare_values(a, b)).cloned())
            .or_else(|| last_cursor.cloned());

        tracing::info!(
            schema = %cache.schema,
            table = %cache.table,
            mode = ?mode,
            rows_written,
            "cache refresh complete"
        );

        Ok(CacheRefreshOutcome { mode, rows_written, cursor_value, captured_at })
    }

    async fn write_full(
        &self,
        cache: &CacheConfig,
        rows: &[Value],
        captured_at: DateTime<Utc>,
    ) -> Result<usize, GatewayError> {
        let truncate = format!("DELETE FROM \"{}\".\"{}\"", cache.schema, cache.table);
        self.executor.execute(&truncate, &[]).await?;
        self.write_rows(cache, rows, captured_at, None).await
    }

    async fn write_rows(
        &self,
        cache: &CacheConfig,
        rows: &[Value],
        captured_at: DateTime<Utc>,
        on_conflict_keys: Option<&[String]>,
    ) -> Result<usize, GatewayError> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let Value::Object(first_map) = first else {
            return Err(GatewayError::database("cache refresh rows must be JSON objects"));
        };
        let columns: Vec<String> = first_map.keys().cloned().collect();

        for row in rows {
            let Value::Object(map) = row else {
                return Err(GatewayError::database("cache refresh rows must be JSON objects"));
            };
            let mut values: Vec<Value> = columns.iter().map(|c| map.get(c).cloned().unwrap_or(Value::Null)).collect();
            values.push(Value::String(captured_at.to_rfc3339()));

            let sql = build_insert_sql(&cache.schema, &cache.table, &columns, on_conflict_keys);
            self.executor.execute(&sql, &values).await?;
        }

        Ok(rows.len())
    }

    async fn apply_retention(&self, cache: &CacheConfig, captured_at: DateTime<Utc>) -> Result<(), GatewayError> {
        if let Some(sql) = build_retention_sql(&cache.schema, &cache.table, &cache.retention, captured_at) {
            self.executor.execute(&sql, &[]).await?;
        }
        Ok(())
    }
}

/// Builds the `cacheCatalog`/`cacheSchema`/... parameter map a cache SQL
/// template is rendered against (spec §4.5 step 2).
fn build_cache_params(cache: &CacheConfig, mode: CacheMode) -> std::collections::HashMap<String, String> {
    let mut params = std::collections::HashMap::new();
    params.insert("cacheCatalog".to_string(), cache.catalog.clone().unwrap_or_else(|| DEFAULT_CATALOG.to_string()));
    params.insert("cacheSchema".to_string(), cache.schema.clone());
    params.insert("cacheTable".to_string(), cache.table.clone());
    params.insert("cacheMode".to_string(), mode.as_str().to_string());

    if let Some(schedule) = &cache.schedule {
        params.insert("cacheSchedule".to_string(), schedule.clone());
    }
    if let Some(cursor) = &cache.cursor {
        params.insert("cursorColumn".to_string(), cursor.column.clone());
        params.insert("cursorType".to_string(), cursor.column_type.clone());
    }
    if !cache.primary_keys.is_empty() {
        params.insert("primaryKeys".to_string(), cache.primary_keys.join(", "));
    }

    params
}

fn cache_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"))
}

/// Substitutes `:cacheSchema`-style placeholders in a cache SQL template
/// with the literal parameter values. Unlike [`crate::rest::render_template`]
/// these are structural identifiers, not user-supplied data, so they are
/// spliced in directly rather than bound positionally.
fn render_cache_template(template: &str, params: &std::collections::HashMap<String, String>) -> Result<String, GatewayError> {
    let mut error = None;
    let rendered = cache_param_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let Some(value) = params.get(name) else {
                error = Some(GatewayError::configuration(format!("cache template references undeclared parameter ':{name}'")));
                return String::new();
            };
            value.clone()
        })
        .into_owned();

    if let Some(e) = error {
        return Err(e);
    }
    Ok(rendered)
}

/// Keeps only rows whose cursor-column value is strictly greater than the
/// last recorded cursor, enforcing the Append-mode bookmark filter (spec
/// §4.5 step 3). Rows pass through unfiltered when there is no cursor
/// column or no prior snapshot to compare against.
fn filter_rows_after_cursor(rows: &[Value], cursor_column: Option<&str>, last_cursor: Option<&Value>) -> Vec<Value> {
    let (Some(column), Some(last)) = (cursor_column, last_cursor) else {
        return rows.to_vec();
    };

    rows.iter()
        .filter(|row| row.get(column).is_some_and(|v| compare_values(v, last) == std::cmp::Ordering::Greater))
        .cloned()
        .collect()
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .map_or(std::cmp::Ordering::Equal, |(a, b)| a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    }
}

/// Builds `INSERT INTO "schema"."table" (cols..., _captured_at) VALUES (...)`,
/// adding an `ON CONFLICT` upsert clause when `on_conflict_keys` is given.
fn build_insert_sql(schema: &str, table: &str, columns: &[String], on_conflict_keys: Option<&[String]>) -> String {
    let mut all_columns: Vec<String> = columns.to_vec();
    all_columns.push("_captured_at".to_string());

    let placeholders: Vec<String> = (1..=all_columns.len()).map(|i| format!("${i}")).collect();
    let column_list = all_columns.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", ");

    let mut sql = format!(
        "INSERT INTO \"{schema}\".\"{table}\" ({column_list}) VALUES ({})",
        placeholders.join(", ")
    );

    if let Some(keys) = on_conflict_keys {
        if !keys.is_empty() {
            let conflict_cols = keys.iter().map(|k| format!("\"{k}\"")).collect::<Vec<_>>().join(", ");
            let updates = all_columns
                .iter()
                .filter(|c| !keys.contains(c))
                .map(|c| format!("\"{c}\" = EXCLUDED.\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ON CONFLICT ({conflict_cols}) DO UPDATE SET {updates}"));
        }
    }

    sql
}

/// Builds the retention-pruning `DELETE` for a cache table, or `None` when
/// no retention policy is configured.
fn build_retention_sql(
    schema: &str,
    table: &str,
    retention: &RetentionConfig,
    captured_at: DateTime<Utc>,
) -> Option<String> {
    if let Some(max_age) = retention.max_snapshot_age {
        let cutoff = captured_at - chrono::Duration::seconds(max_age);
        return Some(format!(
            "DELETE FROM \"{schema}\".\"{table}\" WHERE _captured_at < '{}'",
            cutoff.to_rfc3339()
        ));
    }

    if let Some(keep) = retention.keep_last_snapshots {
        return Some(format!(
            "DELETE FROM \"{schema}\".\"{table}\" WHERE _captured_at NOT IN (\
                SELECT DISTINCT _captured_at FROM \"{schema}\".\"{table}\" \
                ORDER BY _captured_at DESC LIMIT {keep})"
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::CursorConfig;

    fn cache_config() -> CacheConfig {
        CacheConfig {
            enabled: true,
            catalog: None,
            schema: "public".to_string(),
            table: "orders_cache".to_string(),
            schedule: Some("5m".to_string()),
            cursor: Some(CursorConfig { column: "updated_at".to_string(), column_type: "timestamp".to_string() }),
            primary_keys: vec!["id".to_string()],
            retention: RetentionConfig::default(),
        }
    }

    #[test]
    fn insert_sql_without_conflict_keys_is_a_plain_insert() {
        let sql = build_insert_sql("public", "orders_cache", &["id".to_string(), "total".to_string()], None);
        assert!(sql.starts_with("INSERT INTO \"public\".\"orders_cache\" (\"id\", \"total\", \"_captured_at\")"));
        assert!(!sql.contains("ON CONFLICT"));
    }

    #[test]
    fn insert_sql_with_conflict_keys_upserts_non_key_columns() {
        let sql = build_insert_sql(
            "public",
            "orders_cache",
            &["id".to_string(), "total".to_string()],
            Some(&["id".to_string()]),
        );
        assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE SET"));
        assert!(sql.contains("\"total\" = EXCLUDED.\"total\""));
        assert!(!sql.contains("\"id\" = EXCLUDED.\"id\""));
    }

    #[test]
    fn retention_sql_prefers_max_age_over_keep_last() {
        let retention = RetentionConfig { keep_last_snapshots: Some(5), max_snapshot_age: Some(3600) };
        let sql = build_retention_sql("public", "t", &retention, Utc::now()).unwrap();
        assert!(sql.contains("_captured_at <"));
    }

    #[test]
    fn retention_sql_falls_back_to_keep_last_snapshots() {
        let retention = RetentionConfig { keep_last_snapshots: Some(3), max_snapshot_age: None };
        let sql = build_retention_sql("public", "t", &retention, Utc::now()).unwrap();
        assert!(sql.contains("LIMIT 3"));
    }

    #[test]
    fn no_retention_policy_yields_no_sql() {
        let retention = RetentionConfig { keep_last_snapshots: None, max_snapshot_age: None };
        assert!(build_retention_sql("public", "t", &retention, Utc::now()).is_none());
    }

    #[test]
    fn build_cache_params_includes_catalog_default_and_cursor_fields() {
        let cache = cache_config();
        let params = build_cache_params(&cache, CacheMode::Merge);
        assert_eq!(params.get("cacheCatalog").unwrap(), "postgres");
        assert_eq!(params.get("cacheSchema").unwrap(), "public");
        assert_eq!(params.get("cursorColumn").unwrap(), "updated_at");
        assert_eq!(params.get("primaryKeys").unwrap(), "id");
    }

    #[test]
    fn render_cache_template_substitutes_known_placeholders() {
        let cache = cache_config();
        let params = build_cache_params(&cache, CacheMode::Full);
        let sql = render_cache_template("SELECT * FROM :cacheSchema.:cacheTable", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM public.orders_cache");
    }

    #[test]
    fn render_cache_template_rejects_unknown_placeholder() {
        let cache = cache_config();
        let params = build_cache_params(&cache, CacheMode::Full);
        assert!(render_cache_template("SELECT * FROM :ghostTable", &params).is_err());
    }

    #[test]
    fn filter_rows_after_cursor_keeps_only_strictly_newer_rows() {
        let rows = vec![
            serde_json::json!({"id": 1, "updated_at": 10}),
            serde_json::json!({"id": 2, "updated_at": 20}),
            serde_json::json!({"id": 3, "updated_at": 30}),
        ];
        let last = Value::from(20);
        let kept = filter_rows_after_cursor(&rows, Some("updated_at"), Some(&last));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["id"], 3);
    }

    #[test]
    fn filter_rows_after_cursor_passes_through_without_prior_cursor() {
        let rows = vec![serde_json::json!({"id": 1, "updated_at": 10})];
        let kept = filter_rows_after_cursor(&rows, Some("updated_at"), None);
        assert_eq!(kept.len(), 1);
    }
}
