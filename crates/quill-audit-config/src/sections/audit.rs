// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interception configuration: what gets audited and where it goes.

use serde::{Deserialize, Serialize};

use super::merge_option;
use super::sink::{SinkConfig, SinkConfigLayer};
use crate::error::ConfigError;

pub const DEFAULT_OPERATIONS: [&str; 3] = ["CREATE", "UPDATE", "DELETE"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	pub enabled: Option<bool>,
	pub entities: Option<Vec<String>>,
	pub operations: Option<Vec<String>>,
	pub log_payload: Option<bool>,
	pub sink: Option<SinkConfigLayer>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.entities.is_some() {
			self.entities = other.entities;
		}
		if other.operations.is_some() {
			self.operations = other.operations;
		}
		if other.log_payload.is_some() {
			self.log_payload = other.log_payload;
		}
		merge_option(&mut self.sink, other.sink, SinkConfigLayer::merge);
	}

	pub fn finalize(self) -> Result<AuditConfig, ConfigError> {
		let operations = match self.operations {
			Some(ops) => normalize_operations(ops)?,
			None => DEFAULT_OPERATIONS.iter().map(|s| s.to_string()).collect(),
		};

		let sink = match self.sink {
			Some(layer) => layer.finalize()?,
			None => None,
		};

		Ok(AuditConfig {
			enabled: self.enabled.unwrap_or(true),
			entities: self.entities.unwrap_or_default(),
			operations,
			log_payload: self.log_payload.unwrap_or(true),
			sink,
		})
	}
}

fn normalize_operations(ops: Vec<String>) -> Result<Vec<String>, ConfigError> {
	let mut normalized: Vec<String> = Vec::with_capacity(ops.len());
	for op in ops {
		let upper = op.trim().to_uppercase();
		if !DEFAULT_OPERATIONS.contains(&upper.as_str()) {
			return Err(ConfigError::InvalidValue {
				key: "operations".to_string(),
				message: format!("unknown operation '{op}'"),
			});
		}
		if !normalized.contains(&upper) {
			normalized.push(upper);
		}
	}
	Ok(normalized)
}

/// Resolved interception configuration.
///
/// An empty `entities` list audits every entity. `operations` holds upper-case
/// operation names in the order they were configured.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
	pub enabled: bool,
	pub entities: Vec<String>,
	pub operations: Vec<String>,
	pub log_payload: bool,
	pub sink: Option<SinkConfig>,
}

impl Default for AuditConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			entities: Vec::new(),
			operations: DEFAULT_OPERATIONS.iter().map(|s| s.to_string()).collect(),
			log_payload: true,
			sink: None,
		}
	}
}
