// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory host service used to drive the interceptor end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quill_audit::{
	AfterHook, AuditEntry, AuditSink, AuditSinkError, BeforeHook, HookRegistry, LookupError,
	Operation, Predicate, QueryExecutor, Request, ALL_ENTITIES,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

/// Routes interceptor logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Rows per entity, each row an object with a numeric `ID`.
#[derive(Default)]
pub struct MemoryStore {
	tables: Mutex<HashMap<String, Vec<Value>>>,
	next_id: AtomicI64,
	pub fail_lookups: AtomicBool,
}

impl MemoryStore {
	pub fn rows(&self, entity: &str) -> Vec<Value> {
		self.tables
			.lock()
			.unwrap()
			.get(entity)
			.cloned()
			.unwrap_or_default()
	}
}

fn matches(row: &Value, predicate: &Predicate) -> bool {
	predicate.iter().all(|(k, v)| row.get(k) == Some(v))
}

#[async_trait]
impl QueryExecutor for MemoryStore {
	async fn select_one(
		&self,
		entity: &str,
		predicate: &Predicate,
	) -> Result<Option<Value>, LookupError> {
		if self.fail_lookups.load(Ordering::SeqCst) {
			return Err(LookupError::Query("connection reset".to_string()));
		}
		let tables = self.tables.lock().unwrap();
		Ok(tables
			.get(entity)
			.and_then(|rows| rows.iter().find(|row| matches(row, predicate)))
			.cloned())
	}
}

/// A data service that runs registered hooks around in-memory CRUD.
/// After-hooks only run when the operation succeeded.
pub struct MemoryService {
	name: String,
	pub store: Arc<MemoryStore>,
	before: Vec<(Operation, String, Arc<dyn BeforeHook>)>,
	after: Vec<(Operation, String, Arc<dyn AfterHook>)>,
}

impl MemoryService {
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_string(),
			store: Arc::new(MemoryStore::default()),
			before: Vec::new(),
			after: Vec::new(),
		}
	}

	pub fn hook_count(&self) -> usize {
		self.before.len() + self.after.len()
	}

	fn applies(op: Operation, pattern: &str, request: &Request) -> bool {
		request.operation == op
			&& (pattern == ALL_ENTITIES || request.target.as_deref() == Some(pattern))
	}

	async fn run_before(&self, request: &Request) {
		for (op, pattern, hook) in &self.before {
			if Self::applies(*op, pattern, request) {
				hook.call(request).await;
			}
		}
	}

	async fn run_after(&self, result: Option<&Value>, request: &Request) {
		for (op, pattern, hook) in &self.after {
			if Self::applies(*op, pattern, request) {
				hook.call(result, request).await;
			}
		}
	}

	pub async fn create(&self, entity: &str, data: Value, user: Option<&str>) -> Value {
		let mut request = Request::new(Operation::Create, entity).with_data(data.clone());
		request.user = user.map(str::to_string);
		self.run_before(&request).await;

		let mut row = data;
		if row.get("ID").is_none() {
			let id = self.store.next_id.fetch_add(1, Ordering::SeqCst) + 1;
			row["ID"] = json!(id);
		}
		self.store
			.tables
			.lock()
			.unwrap()
			.entry(entity.to_string())
			.or_default()
			.push(row.clone());

		self.run_after(Some(&row), &request).await;
		row
	}

	pub async fn update(
		&self,
		entity: &str,
		id: i64,
		changes: Value,
		user: Option<&str>,
	) -> Result<Value, String> {
		let request = Self::keyed(Operation::Update, entity, id, user).with_data(changes.clone());
		self.run_before(&request).await;

		let updated = {
			let mut tables = self.store.tables.lock().unwrap();
			let row = tables
				.get_mut(entity)
				.and_then(|rows| rows.iter_mut().find(|row| row["ID"] == id))
				.ok_or_else(|| format!("{entity} {id} not found"))?;
			if let (Some(target), Some(patch)) = (row.as_object_mut(), changes.as_object()) {
				for (k, v) in patch {
					target.insert(k.clone(), v.clone());
				}
			}
			row.clone()
		};

		self.run_after(Some(&updated), &request).await;
		Ok(updated)
	}

	pub async fn delete(&self, entity: &str, id: i64, user: Option<&str>) -> Result<(), String> {
		let request = Self::keyed(Operation::Delete, entity, id, user);
		self.run_before(&request).await;

		{
			let mut tables = self.store.tables.lock().unwrap();
			let rows = tables
				.get_mut(entity)
				.ok_or_else(|| format!("{entity} {id} not found"))?;
			let before = rows.len();
			rows.retain(|row| row["ID"] != id);
			if rows.len() == before {
				return Err(format!("{entity} {id} not found"));
			}
		}

		self.run_after(Some(&json!(1)), &request).await;
		Ok(())
	}

	fn keyed(op: Operation, entity: &str, id: i64, user: Option<&str>) -> Request {
		let mut predicate = Predicate::new();
		predicate.insert("ID".to_string(), json!(id));
		let mut request = Request::new(op, entity).with_predicate(predicate);
		request.user = user.map(str::to_string);
		request
	}
}

impl HookRegistry for MemoryService {
	fn service_name(&self) -> &str {
		&self.name
	}

	fn before(&mut self, operation: Operation, pattern: &str, hook: Arc<dyn BeforeHook>) {
		self.before.push((operation, pattern.to_string(), hook));
	}

	fn after(&mut self, operation: Operation, pattern: &str, hook: Arc<dyn AfterHook>) {
		self.after.push((operation, pattern.to_string(), hook));
	}

	fn executor(&self) -> Arc<dyn QueryExecutor> {
		self.store.clone()
	}
}

/// Keeps every saved entry in memory.
#[derive(Default)]
pub struct RecordingSink {
	entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingSink {
	pub fn entries(&self) -> Vec<AuditEntry> {
		self.entries.lock().unwrap().clone()
	}
}

#[async_trait]
impl AuditSink for RecordingSink {
	fn name(&self) -> &str {
		"recording"
	}

	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		self.entries.lock().unwrap().push(entry.clone());
		Ok(())
	}
}
