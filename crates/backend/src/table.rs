// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::HashSet;

use reifydb_bulk_type::{ConfigError, Result, Value, return_error};
use serde::{Deserialize, Serialize};

/// A staged cell; `None` is the backend null.
pub type Cell = Option<Value>;

/// Maps the value at `source` in a posted row to a destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
	pub source: usize,
	pub destination: String,
}

impl ColumnMapping {
	pub fn new(source: usize, destination: impl Into<String>) -> Self {
		Self {
			source,
			destination: destination.into(),
		}
	}
}

/// Destination of a tabular load: a table and its column mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTarget {
	pub table: String,
	pub columns: Vec<ColumnMapping>,
}

impl TableTarget {
	/// Maps posted values to `columns` in order.
	pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			table: table.into(),
			columns: columns.into_iter().enumerate().map(|(i, c)| ColumnMapping::new(i, c)).collect(),
		}
	}

	pub fn with_mapping(table: impl Into<String>, columns: Vec<ColumnMapping>) -> Self {
		Self {
			table: table.into(),
			columns,
		}
	}

	/// Number of values every posted row must carry.
	pub fn arity(&self) -> usize {
		self.columns.len()
	}

	pub fn validate(&self) -> Result<()> {
		let invalid = |reason: &str| ConfigError::InvalidTarget {
			target: self.table.clone(),
			reason: reason.to_string(),
		};

		if self.table.trim().is_empty() {
			return_error!(invalid("table name is empty"));
		}
		if self.columns.is_empty() {
			return_error!(invalid("no columns mapped"));
		}

		let mut names = HashSet::new();
		let mut sources = HashSet::new();
		for mapping in &self.columns {
			if mapping.destination.trim().is_empty() {
				return_error!(invalid("destination column name is empty"));
			}
			if !names.insert(mapping.destination.as_str()) {
				return_error!(invalid(&format!("column '{}' is mapped twice", mapping.destination)));
			}
			if mapping.source >= self.columns.len() || !sources.insert(mapping.source) {
				return_error!(invalid(&format!(
					"source ordinal {} is out of range or mapped twice",
					mapping.source
				)));
			}
		}

		Ok(())
	}
}

/// Row-oriented staging table.
#[derive(Debug, Clone)]
pub struct Table {
	columns: usize,
	rows: Vec<Vec<Cell>>,
}

impl Table {
	pub fn with_capacity(columns: usize, capacity: usize) -> Self {
		Self {
			columns,
			rows: Vec::with_capacity(capacity),
		}
	}

	pub fn push_row(&mut self, row: Vec<Cell>) {
		debug_assert_eq!(row.len(), self.columns);
		self.rows.push(row);
	}

	pub fn rows(&self) -> &[Vec<Cell>] {
		&self.rows
	}

	pub fn columns(&self) -> usize {
		self.columns
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// Drops all rows but keeps the allocation for the next batch.
	pub fn clear(&mut self) {
		self.rows.clear();
	}
}
