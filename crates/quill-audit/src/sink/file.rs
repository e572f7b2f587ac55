// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![cfg(feature = "sink-file")]

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult, AuditSinkError};
use crate::sink::AuditSink;

#[derive(Debug, Clone)]
pub struct FileSinkOptions {
	pub path: PathBuf,
	pub pretty: bool,
	/// Append to one JSON array at `path`; otherwise write one file per entry.
	pub append: bool,
}

impl FileSinkOptions {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			pretty: false,
			append: true,
		}
	}
}

/// Locks shared by every file sink in the process, one per canonical target.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
	static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
	let locks = LOCKS.get_or_init(|| StdMutex::new(HashMap::new()));
	let mut locks = locks
		.lock()
		.unwrap_or_else(|poisoned| poisoned.into_inner());
	locks
		.entry(path.to_path_buf())
		.or_insert_with(|| Arc::new(Mutex::new(())))
		.clone()
}

/// JSON file sink.
///
/// Append mode keeps a single JSON array and rewrites it on every save.
/// Rotation mode writes `<path>.<YYYY-MM-DD>.<unique>.json`, one object per file.
pub struct FileAuditSink {
	options: FileSinkOptions,
	dir_ready: OnceCell<()>,
	target: OnceCell<(PathBuf, Arc<Mutex<()>>)>,
}

impl FileAuditSink {
	pub fn new(options: FileSinkOptions) -> AuditResult<Self> {
		if options.path.as_os_str().is_empty() {
			return Err(AuditError::Configuration(
				"file sink requires a path".to_string(),
			));
		}

		Ok(Self {
			options,
			dir_ready: OnceCell::new(),
			target: OnceCell::new(),
		})
	}

	pub fn path(&self) -> &Path {
		&self.options.path
	}

	async fn ensure_dir(&self) -> Result<(), AuditSinkError> {
		let Some(parent) = self.options.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
			return Ok(());
		};

		self.dir_ready
			.get_or_try_init(|| async {
				tokio::fs::create_dir_all(parent).await.map_err(|e| {
					AuditSinkError::Transient(format!(
						"failed to create directory {}: {e}",
						parent.display()
					))
				})
			})
			.await?;
		Ok(())
	}

	/// Canonical file path and its lock. Resolved once the directory exists,
	/// so every alias of the same file shares one lock.
	async fn target(&self) -> Result<&(PathBuf, Arc<Mutex<()>>), AuditSinkError> {
		self.target
			.get_or_try_init(|| async {
				let path = canonical_target(&self.options.path).await?;
				let lock = path_lock(&path);
				Ok::<_, AuditSinkError>((path, lock))
			})
			.await
	}

	fn render(&self, value: &impl serde::Serialize) -> Result<Vec<u8>, AuditSinkError> {
		let rendered = if self.options.pretty {
			serde_json::to_vec_pretty(value)
		} else {
			serde_json::to_vec(value)
		};
		rendered.map_err(|e| AuditSinkError::Permanent(format!("JSON serialization failed: {e}")))
	}

	async fn append(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		let (path, lock) = self.target().await?;
		let _guard = lock.lock().await;

		let mut entries = read_entries(path).await?;
		let value = serde_json::to_value(entry)
			.map_err(|e| AuditSinkError::Permanent(format!("JSON serialization failed: {e}")))?;
		entries.push(value);

		let bytes = self.render(&entries)?;
		write_replace(path, bytes).await
	}

	async fn rotate(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		let path = rotated_path(&self.options.path, &Utc::now().format("%Y-%m-%d").to_string());
		let bytes = self.render(entry)?;
		tokio::fs::write(&path, bytes).await.map_err(|e| {
			AuditSinkError::Transient(format!("failed to write {}: {e}", path.display()))
		})
	}
}

/// Existing entries at `path`. Missing, empty, corrupt and non-array
/// contents all read as an empty list.
async fn read_entries(path: &Path) -> Result<Vec<Value>, AuditSinkError> {
	let bytes = match tokio::fs::read(path).await {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(e) => {
			return Err(AuditSinkError::Transient(format!(
				"failed to read {}: {e}",
				path.display()
			)))
		}
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Vec::new());
	}

	match serde_json::from_slice::<Value>(&bytes) {
		Ok(Value::Array(entries)) => Ok(entries),
		Ok(_) => {
			warn!(path = %path.display(), "audit file does not hold an array, starting a new one");
			Ok(Vec::new())
		}
		Err(e) => {
			warn!(path = %path.display(), error = %e, "audit file is corrupt, starting a new one");
			Ok(Vec::new())
		}
	}
}

/// `path` with symlinks and relative components resolved. A file that does
/// not exist yet resolves through its parent directory.
async fn canonical_target(path: &Path) -> Result<PathBuf, AuditSinkError> {
	let unresolvable = |e: std::io::Error| {
		AuditSinkError::Transient(format!("failed to resolve {}: {e}", path.display()))
	};

	match tokio::fs::canonicalize(path).await {
		Ok(resolved) => return Ok(resolved),
		Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(unresolvable(e)),
		Err(_) => {}
	}

	let file_name = path.file_name().ok_or_else(|| {
		AuditSinkError::Permanent(format!("{} does not name a file", path.display()))
	})?;
	let parent = path
		.parent()
		.filter(|p| !p.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."));
	let dir = tokio::fs::canonicalize(parent).await.map_err(unresolvable)?;
	Ok(dir.join(file_name))
}

/// Writes through a uniquely named temp file in the same directory and
/// renames it over `path`.
async fn write_replace(path: &Path, bytes: Vec<u8>) -> Result<(), AuditSinkError> {
	let path = path.to_path_buf();
	tokio::task::spawn_blocking(move || {
		let dir = path.parent().unwrap_or_else(|| Path::new("."));
		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
			AuditSinkError::Transient(format!("failed to create temp file in {}: {e}", dir.display()))
		})?;
		tmp.write_all(&bytes).map_err(|e| {
			AuditSinkError::Transient(format!("failed to write {}: {e}", tmp.path().display()))
		})?;
		tmp.persist(&path).map_err(|e| {
			AuditSinkError::Transient(format!("failed to replace {}: {e}", path.display()))
		})?;
		Ok(())
	})
	.await
	.map_err(|e| AuditSinkError::Transient(format!("file write task failed: {e}")))?
}

fn rotated_path(path: &Path, date: &str) -> PathBuf {
	let mut name = OsString::from(path.as_os_str());
	name.push(format!(".{date}.{}.json", Uuid::new_v4().simple()));
	PathBuf::from(name)
}

#[async_trait]
impl AuditSink for FileAuditSink {
	fn name(&self) -> &str {
		"file"
	}

	async fn save_log(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
		self.ensure_dir().await?;
		let entry = entry.with_id();

		let written = if self.options.append {
			self.append(&entry).await
		} else {
			self.rotate(&entry).await
		};
		written?;

		debug!(path = %self.options.path.display(), entity = %entry.entity, "audit entry written");
		Ok(())
	}
}
