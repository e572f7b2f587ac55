// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::entry::AuditEntry;
use crate::error::AuditResult;
use crate::host::Request;

/// Last chance to redact, enrich or reshape an entry before it is saved.
///
/// Runs after the entry is assembled and before the sink sees it. Returning
/// an error drops the entry.
#[async_trait]
pub trait BeforeLog: Send + Sync {
	async fn before_log(&self, entry: &mut AuditEntry, request: &Request) -> AuditResult<()>;
}

#[async_trait]
impl<F> BeforeLog for F
where
	F: Fn(&mut AuditEntry, &Request) -> AuditResult<()> + Send + Sync,
{
	async fn before_log(&self, entry: &mut AuditEntry, request: &Request) -> AuditResult<()> {
		self(entry, request)
	}
}

/// Removes the named keys from every payload field of the entry.
pub struct RedactFields {
	fields: Vec<String>,
}

impl RedactFields {
	pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			fields: fields.into_iter().map(Into::into).collect(),
		}
	}
}

#[async_trait]
impl BeforeLog for RedactFields {
	async fn before_log(&self, entry: &mut AuditEntry, _request: &Request) -> AuditResult<()> {
		let payloads = [
			&mut entry.data,
			&mut entry.original_data,
			&mut entry.changes,
			&mut entry.result,
		];
		for payload in payloads.into_iter().flatten() {
			if let Some(object) = payload.as_object_mut() {
				for field in &self.fields {
					object.remove(field);
				}
			}
		}
		Ok(())
	}
}
