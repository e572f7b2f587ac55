// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The unit of record.
//!
//! - [`Operation`]: the mutating operation kinds that can be audited
//! - [`AuditEntry`]: one persisted record of a completed operation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuditError;

/// Sentinel identity used whenever no user can be resolved.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Mutating operations the interceptor can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
	Create,
	Update,
	Delete,
}

impl Operation {
	/// All operations, in registration order.
	pub fn all() -> &'static [Operation] {
		&[Operation::Create, Operation::Update, Operation::Delete]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::Create => "CREATE",
			Operation::Update => "UPDATE",
			Operation::Delete => "DELETE",
		}
	}

	/// Whether the operation reads prior state before it runs.
	pub fn reads_original(&self) -> bool {
		matches!(self, Operation::Update | Operation::Delete)
	}

	/// Whether the operation's return value is recorded as `result`.
	pub fn records_result(&self) -> bool {
		matches!(self, Operation::Create | Operation::Update)
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operation {
	type Err = AuditError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_uppercase().as_str() {
			"CREATE" => Ok(Operation::Create),
			"UPDATE" => Ok(Operation::Update),
			"DELETE" => Ok(Operation::Delete),
			other => Err(AuditError::Configuration(format!(
				"unknown operation '{other}'"
			))),
		}
	}
}

/// A record of one successful create, update or delete.
///
/// Payload fields are `None` when payload logging is disabled or, for
/// `original_data`, when the prior-state lookup found nothing or failed.
/// Anything a before-log hook stamps onto the entry lives in `extra` and is
/// serialized as top-level fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
	/// Opaque identifier. Sinks assign one when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub operation: Operation,
	/// Fully-qualified entity name the operation targeted.
	pub entity: String,
	pub user: String,
	/// Persistence time, stamped by sinks that track it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub original_data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub changes: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	pub success: bool,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl AuditEntry {
	pub fn new(operation: Operation, entity: impl Into<String>, user: impl Into<String>) -> Self {
		Self {
			id: None,
			operation,
			entity: entity.into(),
			user: user.into(),
			timestamp: None,
			data: None,
			original_data: None,
			changes: None,
			result: None,
			success: true,
			extra: Map::new(),
		}
	}

	/// Returns the entry's id, generating a v4 UUID first if it has none.
	pub fn ensure_id(&mut self) -> &str {
		self.id.get_or_insert_with(|| Uuid::new_v4().to_string())
	}

	/// Clone of this entry guaranteed to carry an id.
	pub fn with_id(&self) -> AuditEntry {
		let mut entry = self.clone();
		entry.ensure_id();
		entry
	}

	/// Attach an additional top-level field.
	pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.extra.insert(key.into(), value.into());
	}
}
