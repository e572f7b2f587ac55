// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The surface of the host data-service framework the interceptor consumes.
//!
//! The host owns routing and query execution. It exposes:
//! - [`HookRegistry`]: registration of before/after lifecycle hooks
//! - [`QueryExecutor`]: a single-row, predicate-filtered read
//!
//! and hands each hook a [`Request`] describing the operation in flight.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entry::Operation;
use crate::error::LookupError;

/// Entity pattern matching every entity of a service.
pub const ALL_ENTITIES: &str = "*";

/// Key/value equality predicate identifying the affected row(s).
pub type Predicate = Map<String, Value>;

/// Request-unique token correlating a pre-hook with its post-hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for RequestId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// One operation in flight, as seen by lifecycle hooks.
#[derive(Debug, Clone)]
pub struct Request {
	pub id: RequestId,
	pub operation: Operation,
	/// Fully-qualified name of the target entity, if the host resolved one.
	pub target: Option<String>,
	/// Submitted payload (CREATE and UPDATE).
	pub data: Option<Value>,
	/// Key predicate extracted from the request's query (UPDATE and DELETE).
	pub predicate: Option<Predicate>,
	/// Authenticated identity attached by the host, if any.
	pub user: Option<String>,
}

impl Request {
	pub fn new(operation: Operation, target: impl Into<String>) -> Self {
		Self {
			id: RequestId::new(),
			operation,
			target: Some(target.into()),
			data: None,
			predicate: None,
			user: None,
		}
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	pub fn with_predicate(mut self, predicate: Predicate) -> Self {
		self.predicate = Some(predicate);
		self
	}

	pub fn with_user(mut self, user: impl Into<String>) -> Self {
		self.user = Some(user.into());
		self
	}
}

/// Runs before the host executes an operation.
#[async_trait]
pub trait BeforeHook: Send + Sync {
	async fn call(&self, request: &Request);
}

/// Runs after the host executed an operation successfully.
#[async_trait]
pub trait AfterHook: Send + Sync {
	async fn call(&self, result: Option<&Value>, request: &Request);
}

/// Generic query execution offered by the host.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
	/// Reads at most one row of `entity` matching `predicate`.
	async fn select_one(
		&self,
		entity: &str,
		predicate: &Predicate,
	) -> Result<Option<Value>, LookupError>;
}

/// Lifecycle-hook registration on one host service.
pub trait HookRegistry: Send + Sync {
	/// Stable name of the service; registration is tracked per name.
	fn service_name(&self) -> &str;

	fn before(&mut self, operation: Operation, pattern: &str, hook: Arc<dyn BeforeHook>);

	fn after(&mut self, operation: Operation, pattern: &str, hook: Arc<dyn AfterHook>);

	/// Query access used for prior-state lookups.
	fn executor(&self) -> Arc<dyn QueryExecutor>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_request_ids_are_unique() {
		let a = Request::new(Operation::Create, "Orders");
		let b = Request::new(Operation::Create, "Orders");
		assert_ne!(a.id, b.id);
	}

	#[test]
	fn test_request_builders() {
		let mut predicate = Predicate::new();
		predicate.insert("ID".to_string(), json!(7));

		let request = Request::new(Operation::Update, "Orders")
			.with_data(json!({"amount": 12}))
			.with_predicate(predicate)
			.with_user("alice");

		assert_eq!(request.target.as_deref(), Some("Orders"));
		assert_eq!(request.user.as_deref(), Some("alice"));
		assert_eq!(request.predicate.unwrap()["ID"], 7);
	}
}
