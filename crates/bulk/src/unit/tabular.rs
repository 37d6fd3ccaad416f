// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use reifydb_bulk_backend::{Backend, Cell, Connection, Table, TableTarget};
use reifydb_bulk_type::{ConfigError, Result, Value, internal_error, return_error};
use tracing::trace;

use super::BackendLink;

/// Stages rows in a table handed to the backend's set-based bulk writer.
pub struct TabularUnit<B: Backend> {
	target: Arc<TableTarget>,
	table: Table,
	capacity: usize,
	pub(super) link: BackendLink<B>,
}

impl<B: Backend> TabularUnit<B> {
	pub fn new(backend: Arc<B>, target: Arc<TableTarget>, capacity: usize, flush_timeout: Duration) -> Self {
		let table = Table::with_capacity(target.arity(), capacity);
		Self {
			target,
			table,
			capacity,
			link: BackendLink::new(backend, flush_timeout),
		}
	}

	pub fn add_row(&mut self, values: Vec<Value>) -> Result<bool> {
		if values.len() != self.target.arity() {
			return_error!(ConfigError::ArityMismatch {
				expected: self.target.arity(),
				actual: values.len(),
			});
		}
		if self.table.len() >= self.capacity {
			return Err(internal_error!("row added to a saturated unit of capacity {}", self.capacity));
		}

		let row: Vec<Cell> = values
			.into_iter()
			.map(|value| match value {
				Value::Undefined => None,
				value => Some(value),
			})
			.collect();
		self.table.push_row(row);

		Ok(self.table.len() == self.capacity)
	}

	pub fn flush(&mut self) -> Result<usize> {
		if self.table.is_empty() {
			return Ok(0);
		}

		let target = &self.target;
		let table = &self.table;
		let result = self.link.with_connection(|connection| connection.bulk_copy(target, table));
		trace!(table = %target.table, rows = table.len(), ok = result.is_ok(), "tabular flush");

		self.reset();
		result
	}

	/// Drops every staged row, keeping the allocation.
	pub(super) fn reset(&mut self) {
		self.table.clear();
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
