// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client construction with a consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Creates a new HTTP client builder with the standard quill User-Agent header.
///
/// Sinks customize the builder (timeouts, default headers) before building,
/// so construction failures surface as their own configuration errors.
///
/// # Example
/// ```ignore
/// let client = quill_common_http::builder()
///     .timeout(Duration::from_millis(3000))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

/// Returns the standard quill User-Agent string.
///
/// Format: `quill/{version}/{os}-{arch}`
pub fn user_agent() -> String {
	format!(
		"quill/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
