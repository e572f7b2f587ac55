// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod audit;
mod sink;

pub use audit::{AuditConfig, AuditConfigLayer, DEFAULT_OPERATIONS};
pub use sink::{
	FileSinkConfig, FileSinkConfigLayer, SinkConfig, SinkConfigLayer, SinkKind, SqliteSinkConfig,
	SqliteSinkConfigLayer, WebhookHeaders, WebhookSinkConfig, WebhookSinkConfigLayer,
	DEFAULT_TABLE, DEFAULT_WEBHOOK_CONTENT_TYPE, DEFAULT_WEBHOOK_TIMEOUT_MS,
};

pub(crate) fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
