// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::HashSet;

use reifydb_bulk_type::{ConfigError, Result, Type, Value, return_error};
use serde::{Deserialize, Serialize};

/// A bound parameter of a procedure call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
	pub name: String,
	pub ty: Type,
}

impl ParamSpec {
	pub fn new(name: impl Into<String>, ty: Type) -> Self {
		Self {
			name: name.into(),
			ty,
		}
	}
}

/// Destination of a columnar load: a procedure taking one array per parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureTarget {
	pub procedure: String,
	pub params: Vec<ParamSpec>,
}

impl ProcedureTarget {
	pub fn new(procedure: impl Into<String>, params: Vec<ParamSpec>) -> Self {
		Self {
			procedure: procedure.into(),
			params,
		}
	}

	pub fn arity(&self) -> usize {
		self.params.len()
	}

	pub fn validate(&self) -> Result<()> {
		let invalid = |reason: String| ConfigError::InvalidTarget {
			target: self.procedure.clone(),
			reason,
		};

		if self.procedure.trim().is_empty() {
			return_error!(invalid("procedure is empty".to_string()));
		}
		if self.params.is_empty() {
			return_error!(invalid("no parameters bound".to_string()));
		}

		let mut names = HashSet::new();
		for param in &self.params {
			if param.name.trim().is_empty() {
				return_error!(invalid("parameter name is empty".to_string()));
			}
			if param.ty == Type::Undefined {
				return_error!(invalid(format!("parameter '{}' has no type", param.name)));
			}
			if !names.insert(param.name.as_str()) {
				return_error!(invalid(format!("parameter '{}' is bound twice", param.name)));
			}
		}

		Ok(())
	}
}

/// Exact-length view over the parallel arrays of a columnar unit.
///
/// Every array has the same length, which is the number of rows in the batch.
#[derive(Debug)]
pub struct ArrayBatch<'a> {
	len: usize,
	arrays: Vec<&'a [Value]>,
}

impl<'a> ArrayBatch<'a> {
	pub fn new(arrays: Vec<&'a [Value]>) -> Self {
		let len = arrays.first().map(|a| a.len()).unwrap_or(0);
		debug_assert!(arrays.iter().all(|a| a.len() == len));
		Self {
			len,
			arrays,
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn arrays(&self) -> &[&'a [Value]] {
		&self.arrays
	}

	/// Values of the `index`th row, in parameter order.
	pub fn row(&self, index: usize) -> impl Iterator<Item = &'a Value> + '_ {
		self.arrays.iter().map(move |array| {
			let array: &'a [Value] = *array;
			&array[index]
		})
	}
}
