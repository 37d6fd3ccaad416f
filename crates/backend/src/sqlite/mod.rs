// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! SQLite bulk-load backend.
//!
//! Tabular batches are written with one prepared `INSERT` inside a single
//! immediate transaction. Columnar batches treat the procedure as a
//! parameterized statement and execute it once per array index, again inside
//! one transaction, which is how array binding is expressed on SQLite.

mod config;
mod connection;
mod value;

use std::{
	path::{Path, PathBuf},
	time::Duration,
};

pub use config::{JournalMode, SqliteConfig, SynchronousMode};
use connection::{connect, resolve_db_path, write_failed};
use reifydb_bulk_type::{BackendError, Result};
use rusqlite::{TransactionBehavior, params_from_iter};
use tracing::{debug, trace};
use value::SqlValue;

use crate::{ArrayBatch, Backend, Connection, ProcedureTarget, Table, TableTarget};

pub struct SqliteBackend {
	path: PathBuf,
	config: SqliteConfig,
}

impl SqliteBackend {
	pub fn new(config: SqliteConfig) -> Self {
		let path = resolve_db_path(config.path.clone());
		Self {
			path,
			config,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Runs `sql` on a short-lived connection, e.g. to create the target table.
	pub fn execute_batch(&self, sql: &str) -> Result<()> {
		let conn = connect(&self.path, &self.config, Duration::from_secs(5))?;
		conn.execute_batch(sql).map_err(|e| BackendError::WriteFailed {
			target: self.path.display().to_string(),
			reason: e.to_string(),
		})?;
		Ok(())
	}
}

impl Backend for SqliteBackend {
	type Connection = SqliteConnection;

	fn connect(&self, timeout: Duration) -> Result<SqliteConnection> {
		debug!(path = %self.path.display(), "opening sqlite connection");
		Ok(SqliteConnection {
			conn: connect(&self.path, &self.config, timeout)?,
			path: self.path.display().to_string(),
			timeout,
		})
	}
}

pub struct SqliteConnection {
	conn: rusqlite::Connection,
	path: String,
	timeout: Duration,
}

impl Connection for SqliteConnection {
	fn bulk_copy(&mut self, target: &TableTarget, table: &Table) -> Result<usize> {
		let timeout = self.timeout;
		let failed = |e: rusqlite::Error| write_failed(&target.table, timeout, e);

		let sql = insert_statement(target);
		let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(failed)?;
		{
			let mut stmt = tx.prepare_cached(&sql).map_err(failed)?;
			for row in table.rows() {
				stmt.execute(params_from_iter(
					target.columns.iter().map(|mapping| SqlValue(row[mapping.source].as_ref())),
				))
				.map_err(failed)?;
			}
		}
		tx.commit().map_err(failed)?;

		trace!(table = %target.table, rows = table.len(), "bulk copy committed");
		Ok(table.len())
	}

	fn execute_array(&mut self, target: &ProcedureTarget, batch: &ArrayBatch<'_>) -> Result<usize> {
		let timeout = self.timeout;
		let failed = |e: rusqlite::Error| write_failed(&target.procedure, timeout, e);

		let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate).map_err(failed)?;
		{
			let mut stmt = tx.prepare_cached(&target.procedure).map_err(failed)?;
			for index in 0..batch.len() {
				stmt.execute(params_from_iter(batch.row(index).map(|v| SqlValue(Some(v)))))
					.map_err(failed)?;
			}
		}
		tx.commit().map_err(failed)?;

		trace!(procedure = %target.procedure, rows = batch.len(), "array execute committed");
		Ok(batch.len())
	}

	fn close(self) -> Result<()> {
		let path = self.path;
		self.conn.close().map_err(|(_, e)| BackendError::CloseFailed {
			target: path,
			reason: e.to_string(),
		})?;
		Ok(())
	}
}

fn quote_identifier(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_statement(target: &TableTarget) -> String {
	let columns: Vec<String> = target.columns.iter().map(|c| quote_identifier(&c.destination)).collect();
	let placeholders: Vec<String> = (1..=target.columns.len()).map(|i| format!("?{}", i)).collect();
	format!(
		"INSERT INTO {} ({}) VALUES ({})",
		quote_identifier(&target.table),
		columns.join(", "),
		placeholders.join(", ")
	)
}

#[cfg(test)]
mod tests {
	use reifydb_bulk_testing::tempdir::temp_dir;
	use reifydb_bulk_type::{Type, Value};

	use super::*;
	use crate::{ColumnMapping, ParamSpec};

	const CREATE_PEOPLE: &str = "CREATE TABLE people (id INTEGER NOT NULL, name TEXT)";

	fn count(backend: &SqliteBackend, sql: &str) -> i64 {
		let conn = rusqlite::Connection::open(backend.path()).unwrap();
		conn.query_row(sql, [], |row| row.get(0)).unwrap()
	}

	#[test]
	fn test_insert_statement_quotes_identifiers() {
		let target = TableTarget::new("my \"table\"", ["id", "name"]);
		assert_eq!(
			insert_statement(&target),
			"INSERT INTO \"my \"\"table\"\"\" (\"id\", \"name\") VALUES (?1, ?2)"
		);
	}

	#[test]
	fn test_bulk_copy() {
		temp_dir(|dir| {
			let backend = SqliteBackend::new(SqliteConfig::new(dir.join("people.db")));
			backend.execute_batch(CREATE_PEOPLE).unwrap();

			let target = TableTarget::new("people", ["id", "name"]);
			let mut table = Table::with_capacity(2, 3);
			table.push_row(vec![Some(Value::int8(1)), Some(Value::utf8("alice"))]);
			table.push_row(vec![Some(Value::int8(2)), None]);

			let mut conn = backend.connect(Duration::from_secs(1)).unwrap();
			assert_eq!(conn.bulk_copy(&target, &table).unwrap(), 2);
			conn.close().unwrap();

			assert_eq!(count(&backend, "SELECT COUNT(*) FROM people"), 2);
			assert_eq!(count(&backend, "SELECT COUNT(*) FROM people WHERE name IS NULL"), 1);
		});
	}

	#[test]
	fn test_bulk_copy_with_reordered_mapping() {
		temp_dir(|dir| {
			let backend = SqliteBackend::new(SqliteConfig::new(dir));
			backend.execute_batch(CREATE_PEOPLE).unwrap();

			let target = TableTarget::with_mapping(
				"people",
				vec![ColumnMapping::new(1, "id"), ColumnMapping::new(0, "name")],
			);
			let mut table = Table::with_capacity(2, 1);
			table.push_row(vec![Some(Value::utf8("bob")), Some(Value::int8(7))]);

			let mut conn = backend.connect(Duration::from_secs(1)).unwrap();
			conn.bulk_copy(&target, &table).unwrap();
			conn.close().unwrap();

			assert!(backend.path().ends_with("bulk.db"));
			assert_eq!(count(&backend, "SELECT id FROM people WHERE name = 'bob'"), 7);
		});
	}

	#[test]
	fn test_execute_array() {
		temp_dir(|dir| {
			let backend = SqliteBackend::new(SqliteConfig::new(dir.join("people.db")));
			backend.execute_batch(CREATE_PEOPLE).unwrap();

			let target = ProcedureTarget::new(
				"INSERT INTO people (id, name) VALUES (?1, ?2)",
				vec![ParamSpec::new("id", Type::Int8), ParamSpec::new("name", Type::Utf8)],
			);
			let ids = vec![Value::int8(1), Value::int8(2), Value::int8(3)];
			let names = vec![Value::utf8("a"), Value::Undefined, Value::utf8("c")];
			let batch = ArrayBatch::new(vec![&ids[..2], &names[..2]]);

			let mut conn = backend.connect(Duration::from_secs(1)).unwrap();
			assert_eq!(conn.execute_array(&target, &batch).unwrap(), 2);
			conn.close().unwrap();

			assert_eq!(count(&backend, "SELECT COUNT(*) FROM people"), 2);
			assert_eq!(count(&backend, "SELECT COUNT(*) FROM people WHERE name IS NULL"), 1);
		});
	}

	#[test]
	fn test_constraint_violation_is_write_failure() {
		temp_dir(|dir| {
			let backend = SqliteBackend::new(SqliteConfig::new(dir.join("people.db")));
			backend.execute_batch(CREATE_PEOPLE).unwrap();

			let target = TableTarget::new("people", ["id", "name"]);
			let mut table = Table::with_capacity(2, 2);
			table.push_row(vec![Some(Value::int8(1)), Some(Value::utf8("ok"))]);
			table.push_row(vec![None, Some(Value::utf8("no id"))]);

			let mut conn = backend.connect(Duration::from_secs(1)).unwrap();
			let err = conn.bulk_copy(&target, &table).unwrap_err();
			assert_eq!(err.code(), "BACKEND_002");
			conn.close().unwrap();

			// the whole batch rolled back
			assert_eq!(count(&backend, "SELECT COUNT(*) FROM people"), 0);
		});
	}

	#[test]
	fn test_missing_database_without_create() {
		temp_dir(|dir| {
			let backend = SqliteBackend::new(SqliteConfig::new(dir.join("absent.db")).create(false));
			let err = backend.connect(Duration::from_secs(1)).err().unwrap();
			assert_eq!(err.code(), "BACKEND_001");
			assert!(!dir.join("absent.db").exists());
		});
	}

	#[test]
	fn test_missing_table() {
		temp_dir(|dir| {
			let backend = SqliteBackend::new(SqliteConfig::new(dir.join("empty.db")));
			let mut table = Table::with_capacity(1, 1);
			table.push_row(vec![Some(Value::int8(1))]);

			let mut conn = backend.connect(Duration::from_secs(1)).unwrap();
			assert!(conn.bulk_copy(&TableTarget::new("nowhere", ["id"]), &table).is_err());
		});
	}
}
