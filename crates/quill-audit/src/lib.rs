// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for create, update and delete operations of a data service.
//!
//! An [`AuditInterceptor`] registers lifecycle hooks on a host service
//! ([`HookRegistry`]), correlates each operation's pre- and post-hook and
//! writes one [`AuditEntry`] per successful operation to an [`AuditSink`]:
//! SQLite, a JSON file or a webhook.
//!
//! ```ignore
//! use std::sync::Arc;
//! use quill_audit::{AuditInterceptor, FileAuditSink, FileSinkOptions};
//!
//! let sink = Arc::new(FileAuditSink::new(FileSinkOptions::new("./logs/audit-logs.json"))?);
//! let interceptor = Arc::new(
//!     AuditInterceptor::builder()
//!         .sink(sink)
//!         .entities(["Orders"])
//!         .build()?,
//! );
//! interceptor.initialize(&mut service);
//! ```

pub mod context;
pub mod entry;
pub mod error;
pub mod filter;
pub mod host;
pub mod identity;
pub mod interceptor;
pub mod sink;
pub mod transform;

pub use context::{CorrelationContext, CorrelationStore};
pub use entry::{AuditEntry, Operation, ANONYMOUS_USER};
pub use error::{AuditError, AuditResult, AuditSinkError, LookupError, ResolveError};
pub use filter::AuditFilter;
pub use host::{
	AfterHook, BeforeHook, HookRegistry, Predicate, QueryExecutor, Request, RequestId, ALL_ENTITIES,
};
pub use identity::{resolve_user, DefaultUserResolver, UserResolver};
pub use interceptor::{lookup_outcome, AuditInterceptor, AuditInterceptorBuilder};
pub use sink::fanout::FanoutSink;
pub use sink::retry::RetryingSink;
pub use sink::AuditSink;
pub use transform::{BeforeLog, RedactFields};

pub use quill_audit_config::{load_config, load_config_with_file, AuditConfig, SinkConfig};
pub use quill_common_http::RetryConfig;

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::{SqliteAuditSink, SqliteSinkOptions};

#[cfg(feature = "sink-file")]
pub use sink::file::{FileAuditSink, FileSinkOptions};

#[cfg(feature = "sink-webhook")]
pub use sink::webhook::{WebhookAuditSink, WebhookSinkOptions};
