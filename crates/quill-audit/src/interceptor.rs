// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle hooks that turn create, update and delete operations into
//! audit entries.
//!
//! For every enabled operation the interceptor registers one pre-hook and one
//! post-hook against all entities of a service. The pre-hook captures the
//! acting user and the prior state of the row into a [`CorrelationContext`]
//! keyed by the request token. The post-hook takes that context, merges in
//! the operation's result, runs the optional [`BeforeLog`] hook and hands the
//! entry to the sink. Audit failures are logged and never reach the host
//! operation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quill_audit_config::AuditConfig;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::context::{CorrelationContext, CorrelationStore, DEFAULT_CONTEXT_MAX_AGE};
use crate::entry::Operation;
use crate::error::{AuditError, AuditResult, LookupError};
use crate::filter::AuditFilter;
use crate::host::{
	AfterHook, BeforeHook, HookRegistry, QueryExecutor, Request, ALL_ENTITIES,
};
use crate::identity::{resolve_user, DefaultUserResolver, UserResolver};
use crate::sink::{self, AuditSink};
use crate::transform::BeforeLog;

pub struct AuditInterceptor {
	sink: Arc<dyn AuditSink>,
	filter: AuditFilter,
	resolver: Arc<dyn UserResolver>,
	log_payload: bool,
	before_log: Option<Arc<dyn BeforeLog>>,
	contexts: CorrelationStore,
	registered: Mutex<HashSet<String>>,
}

pub struct AuditInterceptorBuilder {
	sink: Option<Arc<dyn AuditSink>>,
	filter: AuditFilter,
	resolver: Arc<dyn UserResolver>,
	log_payload: bool,
	before_log: Option<Arc<dyn BeforeLog>>,
	context_max_age: Duration,
}

impl Default for AuditInterceptorBuilder {
	fn default() -> Self {
		Self {
			sink: None,
			filter: AuditFilter::default(),
			resolver: Arc::new(DefaultUserResolver),
			log_payload: true,
			before_log: None,
			context_max_age: DEFAULT_CONTEXT_MAX_AGE,
		}
	}
}

impl AuditInterceptorBuilder {
	pub fn sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Entities to audit. Empty audits all.
	pub fn entities<I, S>(mut self, entities: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let operations = self.filter.operations().to_vec();
		self.filter = AuditFilter::new(entities.into_iter().map(Into::into), &operations);
		self
	}

	pub fn operations(mut self, operations: &[Operation]) -> Self {
		self.filter = self.filter.with_operations(operations);
		self
	}

	pub fn filter(mut self, filter: AuditFilter) -> Self {
		self.filter = filter;
		self
	}

	pub fn user_resolver(mut self, resolver: impl UserResolver + 'static) -> Self {
		self.resolver = Arc::new(resolver);
		self
	}

	pub fn log_payload(mut self, enabled: bool) -> Self {
		self.log_payload = enabled;
		self
	}

	pub fn before_log(mut self, hook: impl BeforeLog + 'static) -> Self {
		self.before_log = Some(Arc::new(hook));
		self
	}

	/// How long a context may wait for its post-hook before it is dropped.
	pub fn context_max_age(mut self, max_age: Duration) -> Self {
		self.context_max_age = max_age;
		self
	}

	pub fn build(self) -> AuditResult<AuditInterceptor> {
		let sink = self.sink.ok_or_else(|| {
			AuditError::Configuration("an audit sink is required".to_string())
		})?;

		Ok(AuditInterceptor {
			sink,
			filter: self.filter,
			resolver: self.resolver,
			log_payload: self.log_payload,
			before_log: self.before_log,
			contexts: CorrelationStore::new(self.context_max_age),
			registered: Mutex::new(HashSet::new()),
		})
	}
}

impl AuditInterceptor {
	pub fn builder() -> AuditInterceptorBuilder {
		AuditInterceptorBuilder::default()
	}

	/// Builder preloaded with the configured sink, entities, operations and
	/// payload flag. Custom resolvers and hooks can still be added.
	pub async fn builder_from_config(config: &AuditConfig) -> AuditResult<AuditInterceptorBuilder> {
		let sink_config = config.sink.as_ref().ok_or_else(|| {
			AuditError::Configuration("an audit sink is required".to_string())
		})?;
		let sink = sink::from_config(sink_config).await?;
		let filter = AuditFilter::from_names(&config.entities, &config.operations)?;

		Ok(Self::builder()
			.sink(sink)
			.filter(filter)
			.log_payload(config.log_payload))
	}

	/// Interceptor for a loaded configuration, `None` when auditing is disabled.
	pub async fn from_config(config: &AuditConfig) -> AuditResult<Option<Arc<Self>>> {
		if !config.enabled {
			info!("audit interception disabled by configuration");
			return Ok(None);
		}
		let interceptor = Self::builder_from_config(config).await?.build()?;
		Ok(Some(Arc::new(interceptor)))
	}

	pub fn filter(&self) -> &AuditFilter {
		&self.filter
	}

	pub fn sink(&self) -> &Arc<dyn AuditSink> {
		&self.sink
	}

	/// Registers the hooks on a service. Returns `false` if this interceptor
	/// was already registered on a service with the same name.
	///
	/// Registration is keyed by [`HookRegistry::service_name`], so service
	/// names must be unique per interceptor: a second, distinct service that
	/// shares a name is not audited.
	pub fn initialize(self: &Arc<Self>, registry: &mut dyn HookRegistry) -> bool {
		let service = registry.service_name().to_string();
		{
			let mut registered = self
				.registered
				.lock()
				.unwrap_or_else(|poisoned| poisoned.into_inner());
			if !registered.insert(service.clone()) {
				warn!(
					service = %service,
					"audit hooks already registered for this service name, skipping"
				);
				return false;
			}
		}

		let executor = registry.executor();
		for operation in self.filter.operations() {
			registry.before(
				*operation,
				ALL_ENTITIES,
				Arc::new(PreHook {
					interceptor: Arc::clone(self),
					executor: Arc::clone(&executor),
				}),
			);
			registry.after(
				*operation,
				ALL_ENTITIES,
				Arc::new(PostHook {
					interceptor: Arc::clone(self),
				}),
			);
		}

		info!(
			service = %service,
			operations = ?self.filter.operations(),
			"audit hooks registered"
		);
		true
	}

	/// Pre-hook body: captures the correlation context for an audited request.
	#[instrument(skip(self, request, executor), fields(request_id = %request.id, operation = %request.operation))]
	pub async fn before(&self, request: &Request, executor: &dyn QueryExecutor) {
		let Some(entity) = request.target.as_deref() else {
			debug!("request has no target entity, skipping");
			return;
		};
		if !self.filter.audits(request.operation) || !self.filter.should_audit(entity) {
			debug!(entity = %entity, "entity not audited, skipping");
			return;
		}

		let user = resolve_user(self.resolver.as_ref(), request);
		let mut context = CorrelationContext::new(request.operation, entity, user);

		if self.log_payload {
			match request.operation {
				Operation::Create => context.data = request.data.clone(),
				Operation::Update => context.changes = request.data.clone(),
				Operation::Delete => {}
			}
			if request.operation.reads_original() {
				context.original_data = self.original_state(entity, request, executor).await;
			}
		}

		self.contexts.insert(request.id, context);
	}

	/// Post-hook body: completes the entry and saves it.
	#[instrument(skip(self, result, request), fields(request_id = %request.id, operation = %request.operation))]
	pub async fn after(&self, result: Option<&Value>, request: &Request) {
		let Some(context) = self.contexts.take(&request.id) else {
			debug!("no correlation context for request");
			return;
		};

		let result = if self.log_payload && context.operation.records_result() {
			result.cloned()
		} else {
			None
		};
		let mut entry = context.into_entry(result);

		if let Some(hook) = &self.before_log {
			if let Err(e) = hook.before_log(&mut entry, request).await {
				warn!(entity = %entry.entity, error = %e, "before-log hook failed, entry dropped");
				return;
			}
		}

		if let Err(e) = self.sink.save_log(&entry).await {
			warn!(sink = self.sink.name(), entity = %entry.entity, error = %e, "audit sink save failed");
		}
	}

	pub async fn health_check(&self) -> AuditResult<()> {
		self.sink
			.health_check()
			.await
			.map_err(|source| AuditError::Sink {
				sink: self.sink.name().to_string(),
				source,
			})
	}

	/// Number of requests whose post-hook has not run yet.
	pub fn pending_contexts(&self) -> usize {
		self.contexts.len()
	}

	async fn original_state(
		&self,
		entity: &str,
		request: &Request,
		executor: &dyn QueryExecutor,
	) -> Option<Value> {
		let outcome = match &request.predicate {
			Some(predicate) => executor.select_one(entity, predicate).await,
			None => Err(LookupError::MissingPredicate),
		};
		lookup_outcome(entity, outcome)
	}
}

/// Prior state is best effort: not-found and failures both mean absent.
pub fn lookup_outcome(entity: &str, outcome: Result<Option<Value>, LookupError>) -> Option<Value> {
	match outcome {
		Ok(Some(row)) => Some(row),
		Ok(None) => {
			debug!(entity = %entity, "no prior state found");
			None
		}
		Err(e) => {
			warn!(entity = %entity, error = %e, "prior state lookup failed");
			None
		}
	}
}

struct PreHook {
	interceptor: Arc<AuditInterceptor>,
	executor: Arc<dyn QueryExecutor>,
}

#[async_trait]
impl BeforeHook for PreHook {
	async fn call(&self, request: &Request) {
		self.interceptor.before(request, self.executor.as_ref()).await;
	}
}

struct PostHook {
	interceptor: Arc<AuditInterceptor>,
}

#[async_trait]
impl AfterHook for PostHook {
	async fn call(&self, result: Option<&Value>, request: &Request) {
		self.interceptor.after(result, request).await;
	}
}
