// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request correlation between the pre-hook and the post-hook.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::warn;

use crate::entry::{AuditEntry, Operation};
use crate::host::RequestId;

/// Contexts older than this are treated as belonging to operations that
/// failed and never reached the post-hook. An operation that outlives it
/// produces no entry.
pub const DEFAULT_CONTEXT_MAX_AGE: Duration = Duration::from_secs(300);

/// State captured before an operation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationContext {
	pub operation: Operation,
	pub entity: String,
	pub user: String,
	pub data: Option<Value>,
	pub changes: Option<Value>,
	pub original_data: Option<Value>,
}

impl CorrelationContext {
	pub fn new(operation: Operation, entity: impl Into<String>, user: impl Into<String>) -> Self {
		Self {
			operation,
			entity: entity.into(),
			user: user.into(),
			data: None,
			changes: None,
			original_data: None,
		}
	}

	/// Completes the context into an entry for a successful operation.
	pub fn into_entry(self, result: Option<Value>) -> AuditEntry {
		let mut entry = AuditEntry::new(self.operation, self.entity, self.user);
		entry.data = self.data;
		entry.changes = self.changes;
		entry.original_data = self.original_data;
		entry.result = result;
		entry.success = true;
		entry
	}
}

/// Contexts of in-flight requests, keyed by request token.
///
/// A context is removed when taken, so each is read by at most one
/// post-hook. Entries whose operation failed are swept on later inserts.
#[derive(Debug)]
pub struct CorrelationStore {
	entries: Mutex<HashMap<RequestId, (Instant, CorrelationContext)>>,
	max_age: Duration,
}

impl Default for CorrelationStore {
	fn default() -> Self {
		Self::new(DEFAULT_CONTEXT_MAX_AGE)
	}
}

impl CorrelationStore {
	pub fn new(max_age: Duration) -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
			max_age,
		}
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, (Instant, CorrelationContext)>> {
		self.entries
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Stores a context and sweeps stale ones. Returns how many were swept.
	pub fn insert(&self, id: RequestId, context: CorrelationContext) -> usize {
		let now = Instant::now();
		let mut entries = self.lock();

		let max_age = self.max_age;
		let mut swept = 0;
		entries.retain(|request_id, (created, stale)| {
			let keep = now.duration_since(*created) < max_age;
			if !keep {
				swept += 1;
				warn!(
					request_id = %request_id,
					operation = %stale.operation,
					entity = %stale.entity,
					max_age_secs = max_age.as_secs(),
					"dropped correlation context older than max age, its operation will not be audited"
				);
			}
			keep
		});

		entries.insert(id, (now, context));
		swept
	}

	pub fn take(&self, id: &RequestId) -> Option<CorrelationContext> {
		self.lock().remove(id).map(|(_, context)| context)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
