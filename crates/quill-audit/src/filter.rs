// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;

use crate::entry::Operation;
use crate::error::AuditResult;

/// Decides which entities and operations produce entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFilter {
	entities: HashSet<String>,
	operations: Vec<Operation>,
}

impl Default for AuditFilter {
	fn default() -> Self {
		Self {
			entities: HashSet::new(),
			operations: Operation::all().to_vec(),
		}
	}
}

impl AuditFilter {
	/// An empty entity set audits every entity.
	pub fn new(entities: impl IntoIterator<Item = String>, operations: &[Operation]) -> Self {
		let mut ops = Vec::with_capacity(operations.len());
		for op in operations {
			if !ops.contains(op) {
				ops.push(*op);
			}
		}

		Self {
			entities: entities.into_iter().collect(),
			operations: ops,
		}
	}

	/// Same entities, different operations.
	pub fn with_operations(self, operations: &[Operation]) -> Self {
		Self::new(self.entities, operations)
	}

	/// Builds a filter from configured operation names.
	pub fn from_names(entities: &[String], operations: &[String]) -> AuditResult<Self> {
		let ops = operations
			.iter()
			.map(|name| name.parse::<Operation>())
			.collect::<AuditResult<Vec<_>>>()?;
		Ok(Self::new(entities.iter().cloned(), &ops))
	}

	/// Exact name match against the configured set. No patterns or prefixes.
	pub fn should_audit(&self, entity: &str) -> bool {
		self.entities.is_empty() || self.entities.contains(entity)
	}

	pub fn audits(&self, operation: Operation) -> bool {
		self.operations.contains(&operation)
	}

	/// Enabled operations, in the order hooks are registered.
	pub fn operations(&self) -> &[Operation] {
		&self.operations
	}
}
