// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![cfg(feature = "sink-webhook")]

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use quill_common_http::RetryableError;
use reqwest::Client;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::sink::AuditSink;

pub use quill_audit_config::DEFAULT_WEBHOOK_TIMEOUT_MS;

/// Response bodies quoted in delivery errors are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Clone)]
pub struct WebhookSinkOptions {
	pub url: String,
	/// Sent as-is. Empty means `Content-Type: application/json`.
	pub headers: Vec<(String, String)>,
	pub timeout_ms: u64,
	/// Treat non-2xx responses as failures.
	pub validate_status: bool,
}

impl WebhookSinkOptions {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			headers: Vec::new(),
			timeout_ms: DEFAULT_WEBHOOK_TIMEOUT_MS,
			validate_status: true,
		}
	}
}

impl fmt::Debug for WebhookSinkOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
		f.debug_struct("WebhookSinkOptions")
			.field("url", &self.url)
			.field("headers", &header_names)
			.field("timeout_ms", &self.timeout_ms)
			.field("validate_status", &self.validate_status)
			.finish()
	}
}

/// POSTs each entry as JSON to a remote endpoint.
///
/// Header values may carry credentials, so they never appear in `Debug`
/// output or error messages. Each save makes exactly one attempt; wrap the
/// sink in [`RetryingSink`](crate::sink::retry::RetryingSink) for retries.
pub struct WebhookAuditSink {
	options: WebhookSinkOptions,
	client: Client,
}

impl fmt::Debug for WebhookAuditSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebhookAuditSink")
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

impl WebhookAuditSink {
	pub fn new(options: WebhookSinkOptions) -> AuditResult<Self> {
		validate_options(&options)?;

		let client = quill_common_http::new_client_with_timeout(Duration::from_millis(
			options.timeout_ms,
		))
		.map_err(|e| AuditError::Configuration(format!("failed to create HTTP client: {e}")))?;

		Ok(Self { options, client })
	}
}

pub fn validate_options(options: &WebhookSinkOptions) -> AuditResult<()> {
	if options.url.is_empty() {
		return Err(AuditError::Configuration(
			"webhook url cannot be empty".to_string(),
		));
	}
	if !options.url.starts_with("http://") && !options.url.starts_with("https://") {
		return Err(AuditError::Configuration(
			"webhook url must start with http:// or https://".to_string(),
		));
	}
	if options.timeout_ms == 0 {
		return Err(AuditError::Configuration(
			"timeout_ms must be greater than 0".to_string(),
		));
	}
	Ok(())
}

#[async_trait]
impl AuditSink for WebhookAuditSink {
	fn name(&self) -> &str {
		"webhook"
	}

	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		let body = serde_json::to_vec(&entry.with_id())
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize entry: {e}")))?;

		let mut request = self.client.post(&self.options.url);
		if self.options.headers.is_empty() {
			request = request.header("Content-Type", "application/json");
		}
		for (key, value) in &self.options.headers {
			request = request.header(key, value);
		}

		let response = request.body(body).send().await.map_err(|e| {
			if e.is_timeout() {
				AuditSinkError::Timeout(self.options.timeout_ms)
			} else if e.is_retryable() {
				AuditSinkError::Transient(format!("request failed: {e}"))
			} else {
				AuditSinkError::Permanent(format!("request failed: {e}"))
			}
		})?;

		let status = response.status();
		if status.is_success() || !self.options.validate_status {
			return Ok(());
		}

		// Truncated: the body may reflect parts of the request back.
		let body = response.text().await.unwrap_or_default();
		Err(AuditSinkError::Delivery {
			status: status.as_u16(),
			body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
		})
	}
}
