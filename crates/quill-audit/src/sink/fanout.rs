// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::entry::AuditEntry;
use crate::error::AuditSinkError;
use crate::sink::AuditSink;

/// Writes every entry to all inner sinks concurrently.
///
/// Fails when any inner sink fails, after all of them were attempted.
pub struct FanoutSink {
	sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutSink {
	pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		Self { sinks }
	}

	pub fn len(&self) -> usize {
		self.sinks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sinks.is_empty()
	}
}

#[async_trait]
impl AuditSink for FanoutSink {
	fn name(&self) -> &str {
		"fanout"
	}

	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		// One id for every copy of the entry.
		let entry = entry.with_id();
		let results = join_all(self.sinks.iter().map(|sink| sink.save_log(&entry))).await;

		let mut first_error = None;
		for (sink, result) in self.sinks.iter().zip(results) {
			if let Err(e) = result {
				warn!(sink = sink.name(), error = %e, "fan-out sink save failed");
				first_error.get_or_insert(e);
			}
		}

		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		for sink in &self.sinks {
			sink.health_check().await?;
		}
		Ok(())
	}
}
