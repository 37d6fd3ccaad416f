// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! SQLite connection utilities.

use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use reifydb_bulk_type::{BackendError, Result};
use rusqlite::{Connection, ErrorCode, OpenFlags};

use super::config::SqliteConfig;

/// Open a connection and apply the per-connection settings.
pub(super) fn connect(path: &Path, config: &SqliteConfig, timeout: Duration) -> Result<Connection> {
	let connection_failed = |e: rusqlite::Error| BackendError::ConnectionFailed {
		target: path.display().to_string(),
		reason: e.to_string(),
	};

	let conn = Connection::open_with_flags(path, open_flags(config)).map_err(connection_failed)?;
	conn.busy_timeout(timeout).map_err(connection_failed)?;
	conn.pragma_update_and_check(None, "journal_mode", config.journal_mode.as_str(), |row| row.get::<_, String>(0))
		.map_err(connection_failed)?;
	conn.pragma_update(None, "synchronous", config.synchronous_mode.as_str()).map_err(connection_failed)?;

	Ok(conn)
}

/// Resolve the database path, creating directories as needed.
pub(super) fn resolve_db_path(config_path: PathBuf) -> PathBuf {
	let is_uri = config_path.to_string_lossy().contains(':');
	if is_uri {
		config_path
	} else if config_path.extension().is_none() {
		std::fs::create_dir_all(&config_path).ok();
		config_path.join("bulk.db")
	} else {
		if let Some(parent) = config_path.parent() {
			std::fs::create_dir_all(parent).ok();
		}
		config_path
	}
}

/// A connection is only ever used by one load unit at a time; SQLite's own
/// mutexes and the shared cache stay off.
pub(super) fn open_flags(config: &SqliteConfig) -> OpenFlags {
	let mut flags =
		OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_PRIVATE_CACHE;
	if config.create {
		flags |= OpenFlags::SQLITE_OPEN_CREATE;
	}
	flags
}

/// Map a failed write; a busy database after `busy_timeout` is a timeout.
pub(super) fn write_failed(target: &str, timeout: Duration, err: rusqlite::Error) -> BackendError {
	match &err {
		rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DatabaseBusy => BackendError::Timeout {
			target: target.to_string(),
			timeout,
		},
		_ => BackendError::WriteFailed {
			target: target.to_string(),
			reason: err.to_string(),
		},
	}
}
