// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sink configuration: exactly one sink backs an interceptor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::merge_option;
use crate::error::ConfigError;

pub const DEFAULT_TABLE: &str = "AuditLogs";
pub const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_WEBHOOK_CONTENT_TYPE: &str = "application/json";

/// Header name to value, read from a TOML table.
pub type WebhookHeaders = BTreeMap<String, String>;

fn has_header(headers: &WebhookHeaders, name: &str) -> bool {
	headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
	Sqlite,
	File,
	Webhook,
}

impl std::str::FromStr for SinkKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"sqlite" | "database" | "db" => Ok(SinkKind::Sqlite),
			"file" | "json" => Ok(SinkKind::File),
			"webhook" | "http" => Ok(SinkKind::Webhook),
			other => Err(ConfigError::InvalidValue {
				key: "sink.kind".to_string(),
				message: format!("unknown sink kind '{other}'"),
			}),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SinkConfigLayer {
	pub kind: Option<SinkKind>,
	pub sqlite: Option<SqliteSinkConfigLayer>,
	pub file: Option<FileSinkConfigLayer>,
	pub webhook: Option<WebhookSinkConfigLayer>,
}

impl SinkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.kind.is_some() {
			self.kind = other.kind;
		}
		merge_option(&mut self.sqlite, other.sqlite, SqliteSinkConfigLayer::merge);
		merge_option(&mut self.file, other.file, FileSinkConfigLayer::merge);
		merge_option(&mut self.webhook, other.webhook, WebhookSinkConfigLayer::merge);
	}

	/// Resolve the selected sink. `Ok(None)` when no kind was chosen.
	pub fn finalize(self) -> Result<Option<SinkConfig>, ConfigError> {
		let Some(kind) = self.kind else {
			return Ok(None);
		};

		let sink = match kind {
			SinkKind::Sqlite => SinkConfig::Sqlite(self.sqlite.unwrap_or_default().finalize()?),
			SinkKind::File => SinkConfig::File(self.file.unwrap_or_default().finalize()?),
			SinkKind::Webhook => SinkConfig::Webhook(self.webhook.unwrap_or_default().finalize()?),
		};

		Ok(Some(sink))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkConfig {
	Sqlite(SqliteSinkConfig),
	File(FileSinkConfig),
	Webhook(WebhookSinkConfig),
}

impl SinkConfig {
	pub fn kind(&self) -> SinkKind {
		match self {
			SinkConfig::Sqlite(_) => SinkKind::Sqlite,
			SinkConfig::File(_) => SinkKind::File,
			SinkConfig::Webhook(_) => SinkKind::Webhook,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SqliteSinkConfigLayer {
	pub url: Option<String>,
	pub table: Option<String>,
	pub auto_create_table: Option<bool>,
}

impl SqliteSinkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.table.is_some() {
			self.table = other.table;
		}
		if other.auto_create_table.is_some() {
			self.auto_create_table = other.auto_create_table;
		}
	}

	pub fn finalize(self) -> Result<SqliteSinkConfig, ConfigError> {
		let url = self
			.url
			.ok_or_else(|| ConfigError::Validation("sqlite sink requires a database url".to_string()))?;

		Ok(SqliteSinkConfig {
			url,
			table: self.table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
			auto_create_table: self.auto_create_table.unwrap_or(true),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqliteSinkConfig {
	pub url: String,
	pub table: String,
	pub auto_create_table: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileSinkConfigLayer {
	pub path: Option<String>,
	pub pretty: Option<bool>,
	pub append: Option<bool>,
}

impl FileSinkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.path.is_some() {
			self.path = other.path;
		}
		if other.pretty.is_some() {
			self.pretty = other.pretty;
		}
		if other.append.is_some() {
			self.append = other.append;
		}
	}

	pub fn finalize(self) -> Result<FileSinkConfig, ConfigError> {
		let path = self
			.path
			.filter(|p| !p.trim().is_empty())
			.ok_or_else(|| ConfigError::Validation("file sink requires a path".to_string()))?;

		Ok(FileSinkConfig {
			path,
			pretty: self.pretty.unwrap_or(false),
			append: self.append.unwrap_or(true),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSinkConfig {
	pub path: String,
	pub pretty: bool,
	pub append: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebhookSinkConfigLayer {
	pub url: Option<String>,
	pub headers: Option<WebhookHeaders>,
	pub timeout_ms: Option<u64>,
	pub validate_status: Option<bool>,
}

impl WebhookSinkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if let Some(headers) = other.headers {
			// Headers accumulate so an env-supplied Authorization does not wipe file headers.
			let merged = self.headers.get_or_insert_with(WebhookHeaders::new);
			for (key, value) in headers {
				merged.retain(|k, _| !k.eq_ignore_ascii_case(&key));
				merged.insert(key, value);
			}
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
		if other.validate_status.is_some() {
			self.validate_status = other.validate_status;
		}
	}

	pub fn finalize(self) -> Result<WebhookSinkConfig, ConfigError> {
		let url = self
			.url
			.filter(|u| !u.trim().is_empty())
			.ok_or_else(|| ConfigError::Validation("webhook sink requires a url".to_string()))?;

		// Configured headers replace the sink's default set, so keep the JSON
		// content type unless one was configured.
		let mut headers = self.headers.unwrap_or_default();
		if !headers.is_empty() && !has_header(&headers, "Content-Type") {
			headers.insert(
				"Content-Type".to_string(),
				DEFAULT_WEBHOOK_CONTENT_TYPE.to_string(),
			);
		}

		Ok(WebhookSinkConfig {
			url,
			headers,
			timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_MS),
			validate_status: self.validate_status.unwrap_or(true),
		})
	}
}

/// Webhook sink configuration.
///
/// `headers` may carry bearer tokens or API keys, so `Debug` only reports how
/// many there are.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookSinkConfig {
	pub url: String,
	pub headers: WebhookHeaders,
	pub timeout_ms: u64,
	pub validate_status: bool,
}

impl std::fmt::Debug for WebhookSinkConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WebhookSinkConfig")
			.field("url", &self.url)
			.field(
				"headers",
				&format!("[{} header(s) REDACTED]", self.headers.len()),
			)
			.field("timeout_ms", &self.timeout_ms)
			.field("validate_status", &self.validate_status)
			.finish()
	}
}
