// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use quill_common_http::{retry, RetryConfig};

use crate::entry::AuditEntry;
use crate::error::AuditSinkError;
use crate::sink::AuditSink;

/// Retries transient failures of the wrapped sink with backoff.
///
/// The entry id is fixed before the first attempt so every attempt carries
/// the same identity.
pub struct RetryingSink {
	inner: Arc<dyn AuditSink>,
	config: RetryConfig,
	name: String,
}

impl RetryingSink {
	pub fn new(inner: Arc<dyn AuditSink>, config: RetryConfig) -> Self {
		let name = format!("retry({})", inner.name());
		Self {
			inner,
			config,
			name,
		}
	}
}

#[async_trait]
impl AuditSink for RetryingSink {
	fn name(&self) -> &str {
		&self.name
	}

	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		let entry = entry.with_id();
		retry(&self.config, || self.inner.save_log(&entry)).await
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		self.inner.health_check().await
	}
}
