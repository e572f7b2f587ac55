// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use quill_common_http::StatusCode;
use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
	/// Missing or invalid setting. Only raised while constructing sinks or
	/// the interceptor.
	#[error("configuration error: {0}")]
	Configuration(String),

	#[error("sink '{sink}' error: {source}")]
	Sink {
		sink: String,
		#[source]
		source: AuditSinkError,
	},

	#[error("transform error: {0}")]
	Transform(String),
}

impl From<quill_audit_config::ConfigError> for AuditError {
	fn from(e: quill_audit_config::ConfigError) -> Self {
		AuditError::Configuration(e.to_string())
	}
}

/// Failure to persist or deliver one entry.
#[derive(Error, Debug)]
pub enum AuditSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),

	#[error("delivery failed with HTTP {status}{}", format_body(.body))]
	Delivery { status: u16, body: String },

	#[error("request timed out after {0}ms")]
	Timeout(u64),
}

fn format_body(body: &str) -> String {
	if body.is_empty() {
		String::new()
	} else {
		format!(": {body}")
	}
}

impl AuditSinkError {
	/// Whether another attempt could succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			AuditSinkError::Transient(_) | AuditSinkError::Timeout(_) => true,
			AuditSinkError::Permanent(_) => false,
			AuditSinkError::Delivery { status, .. } => StatusCode::from_u16(*status)
				.is_ok_and(quill_common_http::is_retryable_status),
		}
	}
}

impl quill_common_http::RetryableError for AuditSinkError {
	fn is_retryable(&self) -> bool {
		self.is_transient()
	}
}

/// Prior-state lookup failure. Never escapes the pre-hook.
#[derive(Error, Debug)]
pub enum LookupError {
	#[error("request carries no key predicate")]
	MissingPredicate,

	#[error("query failed: {0}")]
	Query(String),
}

/// User resolver failure. Degrades to the anonymous identity.
#[derive(Error, Debug)]
#[error("failed to resolve user: {0}")]
pub struct ResolveError(pub String);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_delivery_display_includes_body() {
		let err = AuditSinkError::Delivery {
			status: 500,
			body: "boom".to_string(),
		};
		assert_eq!(err.to_string(), "delivery failed with HTTP 500: boom");

		let err = AuditSinkError::Delivery {
			status: 404,
			body: String::new(),
		};
		assert_eq!(err.to_string(), "delivery failed with HTTP 404");
	}

	#[test]
	fn test_transient_classification() {
		assert!(AuditSinkError::Transient("io".to_string()).is_transient());
		assert!(AuditSinkError::Timeout(5000).is_transient());
		assert!(!AuditSinkError::Permanent("bad".to_string()).is_transient());

		let delivery = |status| AuditSinkError::Delivery {
			status,
			body: String::new(),
		};
		assert!(delivery(503).is_transient());
		assert!(delivery(429).is_transient());
		assert!(!delivery(400).is_transient());
		assert!(!delivery(401).is_transient());
		assert!(!delivery(501).is_transient());
		assert!(!delivery(999).is_transient());
	}

	#[test]
	fn test_config_error_maps_to_configuration() {
		let err: AuditError =
			quill_audit_config::ConfigError::Validation("file sink requires a path".to_string()).into();
		assert!(matches!(err, AuditError::Configuration(ref m) if m.contains("requires a path")));
	}
}
