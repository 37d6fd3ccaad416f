// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Backend collaborator contract consumed by load units.
//!
//! A backend knows how to open a connection; a connection knows how to write
//! one staged batch, either as a whole table handed to a set-based bulk
//! writer, or as a set of parallel arrays bound to a parameterized call.

use std::time::Duration;

pub use reifydb_bulk_type::Result;

pub mod procedure;
pub mod sqlite;
pub mod table;

pub use procedure::{ArrayBatch, ParamSpec, ProcedureTarget};
pub use table::{Cell, ColumnMapping, Table, TableTarget};

/// Opens connections to a database.
///
/// Shared by every load unit of a pipeline, so it must be callable from
/// several flush workers at once.
pub trait Backend: Send + Sync + 'static {
	type Connection: Connection;

	/// Opens a new connection; `timeout` applies to every call made on it.
	fn connect(&self, timeout: Duration) -> Result<Self::Connection>;
}

/// A single open connection, used by at most one thread at a time.
pub trait Connection: Send + 'static {
	/// Writes all rows of `table` into `target` in one set-based operation.
	fn bulk_copy(&mut self, target: &TableTarget, table: &Table) -> Result<usize>;

	/// Binds the arrays of `batch` to the parameters of `target` and executes it.
	fn execute_array(&mut self, target: &ProcedureTarget, batch: &ArrayBatch<'_>) -> Result<usize>;

	fn close(self) -> Result<()>;
}
