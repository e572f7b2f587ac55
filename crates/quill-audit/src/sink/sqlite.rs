// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::sink::AuditSink;

pub use quill_audit_config::DEFAULT_TABLE;

#[derive(Debug, Clone)]
pub struct SqliteSinkOptions {
	pub table: String,
	/// Provision the table with `CREATE TABLE IF NOT EXISTS` before the first insert.
	pub auto_create_table: bool,
}

impl Default for SqliteSinkOptions {
	fn default() -> Self {
		Self {
			table: DEFAULT_TABLE.to_string(),
			auto_create_table: true,
		}
	}
}

/// Relational sink: one row per entry.
pub struct SqliteAuditSink {
	pool: SqlitePool,
	options: SqliteSinkOptions,
	provisioned: OnceCell<()>,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool, options: SqliteSinkOptions) -> AuditResult<Self> {
		validate_table_name(&options.table)?;
		Ok(Self {
			pool,
			options,
			provisioned: OnceCell::new(),
		})
	}

	pub fn table(&self) -> &str {
		&self.options.table
	}

	async fn ensure_table(&self) {
		if !self.options.auto_create_table {
			return;
		}

		// A failed attempt leaves the cell empty so the next save tries again.
		let provisioned = self
			.provisioned
			.get_or_try_init(|| async {
				if self.create_table().await? {
					info!(table = %self.options.table, "created audit table");
				}
				Ok::<(), sqlx::Error>(())
			})
			.await;
		if let Err(e) = provisioned {
			warn!(table = %self.options.table, error = %e, "failed to provision audit table");
		}
	}

	/// Returns whether the table had to be created.
	async fn create_table(&self) -> Result<bool, sqlx::Error> {
		let exists: Option<(String,)> =
			sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
				.bind(&self.options.table)
				.fetch_optional(&self.pool)
				.await?;
		if exists.is_some() {
			return Ok(false);
		}

		let ddl = format!(
			r#"
			CREATE TABLE IF NOT EXISTS "{}" (
				"ID" TEXT PRIMARY KEY,
				"timestamp" TEXT NOT NULL,
				"user" TEXT NOT NULL,
				"operation" TEXT NOT NULL,
				"entity" TEXT NOT NULL,
				"data" TEXT,
				"originalData" TEXT,
				"changes" TEXT,
				"result" TEXT,
				"success" INTEGER NOT NULL
			)
			"#,
			self.options.table
		);
		sqlx::query(&ddl).execute(&self.pool).await?;
		Ok(true)
	}
}

fn validate_table_name(table: &str) -> AuditResult<()> {
	let valid = !table.is_empty()
		&& table
			.chars()
			.next()
			.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
		&& table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
	if !valid {
		return Err(AuditError::Configuration(format!(
			"invalid table name '{table}': use letters, digits and underscores"
		)));
	}
	Ok(())
}

fn payload_json(value: &Option<Value>, field: &str) -> Result<String, AuditSinkError> {
	serde_json::to_string(value.as_ref().unwrap_or(&Value::Null))
		.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize {field}: {e}")))
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		"sqlite"
	}

	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		self.ensure_table().await;

		let data_json = payload_json(&entry.data, "data")?;
		let original_json = payload_json(&entry.original_data, "originalData")?;
		let changes_json = payload_json(&entry.changes, "changes")?;
		let result_json = payload_json(&entry.result, "result")?;

		let id = entry
			.id
			.clone()
			.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
		let timestamp = entry.timestamp.unwrap_or_else(Utc::now);

		let sql = format!(
			r#"
			INSERT INTO "{}" (
				"ID", "timestamp", "user", "operation", "entity",
				"data", "originalData", "changes", "result", "success"
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
			self.options.table
		);

		sqlx::query(&sql)
			.bind(id)
			.bind(timestamp.to_rfc3339())
			.bind(&entry.user)
			.bind(entry.operation.as_str())
			.bind(&entry.entity)
			.bind(data_json)
			.bind(original_json)
			.bind(changes_json)
			.bind(result_json)
			.bind(entry.success)
			.execute(&self.pool)
			.await
			.map_err(|e| {
				if is_transient_error(&e) {
					AuditSinkError::Transient(format!("database error: {e}"))
				} else {
					AuditSinkError::Permanent(format!("database error: {e}"))
				}
			})?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entry::Operation;
	use serde_json::json;
	use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
	use sqlx::Row;
	use std::str::FromStr;

	async fn create_test_pool() -> SqlitePool {
		let options = SqliteConnectOptions::from_str(":memory:").unwrap();
		SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await
			.expect("Failed to create test pool")
	}

	fn sample_entry() -> AuditEntry {
		let mut entry = AuditEntry::new(Operation::Update, "Orders", "alice");
		entry.changes = Some(json!({"amount": 12}));
		entry.original_data = Some(json!({"ID": 1, "amount": 10}));
		entry.result = Some(json!({"ID": 1, "amount": 12}));
		entry
	}

	#[test]
	fn test_validate_table_name() {
		assert!(validate_table_name("AuditLogs").is_ok());
		assert!(validate_table_name("audit_logs_2").is_ok());
		assert!(validate_table_name("").is_err());
		assert!(validate_table_name("2logs").is_err());
		assert!(validate_table_name("logs\"; DROP TABLE x; --").is_err());
	}

	#[tokio::test]
	async fn test_save_provisions_table_and_inserts_row() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), SqliteSinkOptions::default()).unwrap();

		sink.save_log(&sample_entry()).await.unwrap();

		let row = sqlx::query(
			r#"SELECT "ID", "timestamp", "user", "operation", "entity", "data",
				"originalData", "changes", "result", "success" FROM "AuditLogs""#,
		)
		.fetch_one(&pool)
		.await
		.unwrap();

		let id: String = row.get("ID");
		assert!(uuid::Uuid::parse_str(&id).is_ok());
		let timestamp: String = row.get("timestamp");
		assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
		assert_eq!(row.get::<String, _>("user"), "alice");
		assert_eq!(row.get::<String, _>("operation"), "UPDATE");
		assert_eq!(row.get::<String, _>("entity"), "Orders");
		assert_eq!(row.get::<String, _>("data"), "null");
		let original: Value = serde_json::from_str(&row.get::<String, _>("originalData")).unwrap();
		assert_eq!(original["amount"], 10);
		let changes: Value = serde_json::from_str(&row.get::<String, _>("changes")).unwrap();
		assert_eq!(changes, json!({"amount": 12}));
		assert!(row.get::<bool, _>("success"));
	}

	#[tokio::test]
	async fn test_existing_id_and_timestamp_are_kept() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), SqliteSinkOptions::default()).unwrap();

		let mut entry = sample_entry();
		entry.id = Some("fixed-id".to_string());
		let stamp = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
			.unwrap()
			.with_timezone(&Utc);
		entry.timestamp = Some(stamp);
		sink.save_log(&entry).await.unwrap();

		let row = sqlx::query(r#"SELECT "ID", "timestamp" FROM "AuditLogs""#)
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(row.get::<String, _>("ID"), "fixed-id");
		assert_eq!(row.get::<String, _>("timestamp"), stamp.to_rfc3339());
	}

	#[tokio::test]
	async fn test_custom_table_and_multiple_saves() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(
			pool.clone(),
			SqliteSinkOptions {
				table: "order_audit".to_string(),
				auto_create_table: true,
			},
		)
		.unwrap();

		for _ in 0..3 {
			sink.save_log(&sample_entry()).await.unwrap();
		}

		let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "order_audit""#)
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(count.0, 3);
	}

	#[tokio::test]
	async fn test_missing_table_without_provisioning_is_permanent() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(
			pool,
			SqliteSinkOptions {
				table: "AuditLogs".to_string(),
				auto_create_table: false,
			},
		)
		.unwrap();

		let err = sink.save_log(&sample_entry()).await.unwrap_err();
		assert!(matches!(err, AuditSinkError::Permanent(_)));
		assert!(err.to_string().contains("database error"));
	}

	#[tokio::test]
	async fn test_failed_provisioning_is_retried_on_next_save() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), SqliteSinkOptions::default()).unwrap();

		sqlx::query("PRAGMA query_only = ON")
			.execute(&pool)
			.await
			.unwrap();
		let err = sink.save_log(&sample_entry()).await.unwrap_err();
		assert!(err.to_string().contains("database error"));

		sqlx::query("PRAGMA query_only = OFF")
			.execute(&pool)
			.await
			.unwrap();
		sink.save_log(&sample_entry()).await.unwrap();

		let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "AuditLogs""#)
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(count.0, 1);
	}

	#[tokio::test]
	async fn test_health_check() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool, SqliteSinkOptions::default()).unwrap();
		assert!(sink.health_check().await.is_ok());
	}
}
