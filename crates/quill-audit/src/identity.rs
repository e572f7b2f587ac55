// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing::warn;

use crate::entry::ANONYMOUS_USER;
use crate::error::ResolveError;
use crate::host::Request;

/// Extracts the acting user from a request.
pub trait UserResolver: Send + Sync {
	fn resolve(&self, request: &Request) -> Result<String, ResolveError>;
}

impl<F> UserResolver for F
where
	F: Fn(&Request) -> Result<String, ResolveError> + Send + Sync,
{
	fn resolve(&self, request: &Request) -> Result<String, ResolveError> {
		self(request)
	}
}

/// Reads the authenticated identity the host attached to the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUserResolver;

impl UserResolver for DefaultUserResolver {
	fn resolve(&self, request: &Request) -> Result<String, ResolveError> {
		Ok(request
			.user
			.clone()
			.unwrap_or_else(|| ANONYMOUS_USER.to_string()))
	}
}

/// Resolves the user, degrading failures and blank identities to the
/// anonymous sentinel. Never empty.
pub fn resolve_user(resolver: &dyn UserResolver, request: &Request) -> String {
	match resolver.resolve(request) {
		Ok(user) if !user.trim().is_empty() => user,
		Ok(_) => ANONYMOUS_USER.to_string(),
		Err(e) => {
			warn!(request_id = %request.id, error = %e, "user resolution failed, using anonymous");
			ANONYMOUS_USER.to_string()
		}
	}
}
