// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for quill audit interception.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Validation of sink selection and audited operations
//! - Consistent environment variable naming (`QUILL_AUDIT_*`)
//!
//! # Usage
//!
//! ```ignore
//! use quill_audit_config::load_config_with_file;
//!
//! let config = load_config_with_file("./audit.toml")?;
//! println!("auditing {:?} via {:?}", config.operations, config.sink);
//! ```

pub mod error;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`QUILL_AUDIT_*`)
/// 2. Config file (`/etc/quill/audit.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<AuditConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<AuditConfig, ConfigError> {
	load_from(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<AuditConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuditConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuditConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: AuditConfigLayer) -> Result<AuditConfig, ConfigError> {
	let config = layer.finalize()?;
	validate_config(&config)?;

	info!(
		enabled = config.enabled,
		entities = config.entities.len(),
		operations = ?config.operations,
		log_payload = config.log_payload,
		sink = ?config.sink.as_ref().map(SinkConfig::kind),
		"Audit configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &AuditConfig) -> Result<(), ConfigError> {
	if config.enabled && config.sink.is_none() {
		return Err(ConfigError::Validation(
			"audit is enabled but no sink is configured; set sink.kind (or QUILL_AUDIT_SINK) \
			 to sqlite, file or webhook"
				.to_string(),
		));
	}

	Ok(())
}
