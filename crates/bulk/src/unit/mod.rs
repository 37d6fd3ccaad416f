// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Load units: reusable row buffers paired with backend flush logic.
//!
//! A unit accumulates rows until it reports saturation; it never flushes
//! itself. Flushing writes every staged row in one backend call, opening the
//! unit's connection on first use, and leaves the unit empty and ready for
//! reuse. A connection that failed a write is closed on the spot and reopened
//! by the next flush.

mod columnar;
mod tabular;

use std::{sync::Arc, time::Duration};

pub use columnar::ColumnarUnit;
use reifydb_bulk_backend::{Backend, Connection};
use reifydb_bulk_type::{Result, Value, internal_error};
pub use tabular::TabularUnit;
use tracing::warn;

pub enum LoadUnit<B: Backend> {
	Tabular(TabularUnit<B>),
	Columnar(ColumnarUnit<B>),
}

impl<B: Backend> LoadUnit<B> {
	/// Stages one row; `Ok(true)` exactly when this row filled the unit.
	pub fn add_row(&mut self, values: Vec<Value>) -> Result<bool> {
		match self {
			LoadUnit::Tabular(unit) => unit.add_row(values),
			LoadUnit::Columnar(unit) => unit.add_row(values),
		}
	}

	/// Writes all staged rows and returns how many were written.
	pub fn flush(&mut self) -> Result<usize> {
		match self {
			LoadUnit::Tabular(unit) => unit.flush(),
			LoadUnit::Columnar(unit) => unit.flush(),
		}
	}

	/// Flushes residual rows, then releases the connection.
	///
	/// The connection is released even if the flush fails; the flush error is
	/// reported in preference to a close error.
	pub fn close(&mut self) -> Result<()> {
		let flushed = self.flush();
		let closed = self.link_mut().close();
		flushed?;
		closed
	}

	/// Throws away staged rows and the connection without writing anything.
	///
	/// Used on a unit whose flush never returned, so neither its buffer nor its
	/// connection can be trusted.
	pub fn discard(&mut self) {
		match self {
			LoadUnit::Tabular(unit) => unit.reset(),
			LoadUnit::Columnar(unit) => unit.reset(),
		}
		if let Err(err) = self.link_mut().close() {
			warn!(code = %err.code, "failed to close connection of discarded unit: {}", err.message);
		}
	}

	pub fn len(&self) -> usize {
		match self {
			LoadUnit::Tabular(unit) => unit.len(),
			LoadUnit::Columnar(unit) => unit.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		match self {
			LoadUnit::Tabular(unit) => unit.capacity(),
			LoadUnit::Columnar(unit) => unit.capacity(),
		}
	}

	pub fn is_connected(&self) -> bool {
		match self {
			LoadUnit::Tabular(unit) => unit.link.is_open(),
			LoadUnit::Columnar(unit) => unit.link.is_open(),
		}
	}

	fn link_mut(&mut self) -> &mut BackendLink<B> {
		match self {
			LoadUnit::Tabular(unit) => &mut unit.link,
			LoadUnit::Columnar(unit) => &mut unit.link,
		}
	}
}

/// A unit's lazily opened connection.
pub(crate) struct BackendLink<B: Backend> {
	backend: Arc<B>,
	connection: Option<B::Connection>,
	timeout: Duration,
}

impl<B: Backend> BackendLink<B> {
	pub(crate) fn new(backend: Arc<B>, timeout: Duration) -> Self {
		Self {
			backend,
			connection: None,
			timeout,
		}
	}

	pub(crate) fn is_open(&self) -> bool {
		self.connection.is_some()
	}

	/// Runs `f` on the connection, opening it first if needed.
	///
	/// When `f` fails the connection is closed before the error is returned.
	pub(crate) fn with_connection<R>(&mut self, f: impl FnOnce(&mut B::Connection) -> Result<R>) -> Result<R> {
		if self.connection.is_none() {
			self.connection = Some(self.backend.connect(self.timeout)?);
		}
		let Some(connection) = self.connection.as_mut() else {
			return Err(internal_error!("connection missing right after connect"));
		};

		match f(connection) {
			Ok(result) => Ok(result),
			Err(err) => {
				if let Some(connection) = self.connection.take() {
					if let Err(close_err) = connection.close() {
						warn!(code = %close_err.code, "failed to close connection after write fault");
					}
				}
				Err(err)
			}
		}
	}

	pub(crate) fn close(&mut self) -> Result<()> {
		match self.connection.take() {
			Some(connection) => connection.close(),
			None => Ok(()),
		}
	}
}
