// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use quill_audit_config::SinkConfig;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};
pub use crate::error::AuditSinkError;

#[async_trait]
pub trait AuditSink: Send + Sync {
	/// Unique name for this sink (used in logs).
	fn name(&self) -> &str;

	/// Persist or deliver one entry. A rejected save is reported, never retried here.
	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError>;

	/// Health check (optional, default: Ok).
	async fn health_check(&self) -> Result<(), AuditSinkError> {
		Ok(())
	}
}

pub mod fanout;
pub mod retry;

#[cfg(feature = "sink-sqlite")]
pub mod sqlite;

#[cfg(feature = "sink-file")]
pub mod file;

#[cfg(feature = "sink-webhook")]
pub mod webhook;

/// Builds the sink described by a resolved configuration.
pub async fn from_config(config: &SinkConfig) -> AuditResult<Arc<dyn AuditSink>> {
	match config {
		#[cfg(feature = "sink-sqlite")]
		SinkConfig::Sqlite(c) => {
			use std::str::FromStr;

			let options = sqlx::sqlite::SqliteConnectOptions::from_str(&c.url)
				.map_err(|e| AuditError::Configuration(format!("invalid sqlite url: {e}")))?
				.create_if_missing(true);
			let pool = sqlx::sqlite::SqlitePoolOptions::new().connect_lazy_with(options);

			let sink = sqlite::SqliteAuditSink::new(
				pool,
				sqlite::SqliteSinkOptions {
					table: c.table.clone(),
					auto_create_table: c.auto_create_table,
				},
			)?;
			Ok(Arc::new(sink))
		}
		#[cfg(feature = "sink-file")]
		SinkConfig::File(c) => {
			let sink = file::FileAuditSink::new(file::FileSinkOptions {
				path: c.path.clone().into(),
				pretty: c.pretty,
				append: c.append,
			})?;
			Ok(Arc::new(sink))
		}
		#[cfg(feature = "sink-webhook")]
		SinkConfig::Webhook(c) => {
			let sink = webhook::WebhookAuditSink::new(webhook::WebhookSinkOptions {
				url: c.url.clone(),
				headers: c
					.headers
					.iter()
					.map(|(k, v)| (k.clone(), v.clone()))
					.collect(),
				timeout_ms: c.timeout_ms,
				validate_status: c.validate_status,
			})?;
			Ok(Arc::new(sink))
		}
		#[allow(unreachable_patterns)]
		other => Err(AuditError::Configuration(format!(
			"sink '{:?}' is not compiled into this build",
			other.kind()
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use quill_audit_config::{FileSinkConfig, SqliteSinkConfig, WebhookSinkConfig};

	#[cfg(feature = "sink-file")]
	#[tokio::test]
	async fn test_from_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let config = SinkConfig::File(FileSinkConfig {
			path: dir.path().join("audit.json").display().to_string(),
			pretty: false,
			append: true,
		});
		let sink = from_config(&config).await.unwrap();
		assert_eq!(sink.name(), "file");
	}

	#[cfg(feature = "sink-file")]
	#[tokio::test]
	async fn test_from_config_file_requires_path() {
		let config = SinkConfig::File(FileSinkConfig {
			path: String::new(),
			pretty: false,
			append: true,
		});
		let err = from_config(&config).await.err().unwrap();
		assert!(matches!(err, AuditError::Configuration(_)));
	}

	#[cfg(feature = "sink-webhook")]
	#[tokio::test]
	async fn test_from_config_webhook_rejects_bad_url() {
		let config = SinkConfig::Webhook(WebhookSinkConfig {
			url: "ftp://example.com".to_string(),
			headers: Default::default(),
			timeout_ms: 5000,
			validate_status: true,
		});
		let err = from_config(&config).await.err().unwrap();
		assert!(err.to_string().contains("http://"));
	}

	#[cfg(feature = "sink-sqlite")]
	#[tokio::test]
	async fn test_from_config_sqlite_rejects_bad_table() {
		let config = SinkConfig::Sqlite(SqliteSinkConfig {
			url: "sqlite::memory:".to_string(),
			table: "Audit Logs; DROP".to_string(),
			auto_create_table: true,
		});
		let err = from_config(&config).await.err().unwrap();
		assert!(err.to_string().contains("invalid table name"));
	}
}
