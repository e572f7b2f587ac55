// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::sections::{
	AuditConfigLayer, FileSinkConfigLayer, SinkConfigLayer, SinkKind, SqliteSinkConfigLayer,
	WebhookHeaders, WebhookSinkConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<AuditConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<AuditConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(AuditConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/quill/audit.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<AuditConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AuditConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: AuditConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: QUILL_AUDIT_<FIELD> and QUILL_AUDIT_<SINK>_<FIELD>.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<AuditConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_audit_from(&env_var)
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn lookup_bool(lookup: Lookup<'_>, name: &str) -> Option<bool> {
	lookup(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn lookup_u64(lookup: Lookup<'_>, name: &str) -> Result<Option<u64>, ConfigError> {
	match lookup(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Splits a comma-separated list, dropping blanks.
pub(crate) fn split_list(value: &str) -> Vec<String> {
	value
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.collect()
}

fn load_audit_from(lookup: Lookup<'_>) -> Result<AuditConfigLayer, ConfigError> {
	let kind = lookup("QUILL_AUDIT_SINK")
		.map(|v| v.parse::<SinkKind>())
		.transpose()?;

	let sqlite = SqliteSinkConfigLayer {
		url: lookup("QUILL_AUDIT_SQLITE_URL"),
		table: lookup("QUILL_AUDIT_SQLITE_TABLE"),
		auto_create_table: lookup_bool(lookup, "QUILL_AUDIT_SQLITE_AUTO_CREATE_TABLE"),
	};

	let file = FileSinkConfigLayer {
		path: lookup("QUILL_AUDIT_FILE_PATH"),
		pretty: lookup_bool(lookup, "QUILL_AUDIT_FILE_PRETTY"),
		append: lookup_bool(lookup, "QUILL_AUDIT_FILE_APPEND"),
	};

	let webhook = WebhookSinkConfigLayer {
		url: lookup("QUILL_AUDIT_WEBHOOK_URL"),
		headers: lookup("QUILL_AUDIT_WEBHOOK_AUTHORIZATION")
			.map(|token| WebhookHeaders::from([("Authorization".to_string(), token)])),
		timeout_ms: lookup_u64(lookup, "QUILL_AUDIT_WEBHOOK_TIMEOUT_MS")?,
		validate_status: lookup_bool(lookup, "QUILL_AUDIT_WEBHOOK_VALIDATE_STATUS"),
	};

	Ok(AuditConfigLayer {
		enabled: lookup_bool(lookup, "QUILL_AUDIT_ENABLED"),
		entities: lookup("QUILL_AUDIT_ENTITIES").map(|v| split_list(&v)),
		operations: lookup("QUILL_AUDIT_OPERATIONS").map(|v| split_list(&v)),
		log_payload: lookup_bool(lookup, "QUILL_AUDIT_LOG_PAYLOAD"),
		sink: Some(SinkConfigLayer {
			kind,
			sqlite: Some(sqlite),
			file: Some(file),
			webhook: Some(webhook),
		}),
	})
}
