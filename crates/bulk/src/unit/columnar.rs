// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use reifydb_bulk_backend::{ArrayBatch, Backend, Connection, ProcedureTarget};
use reifydb_bulk_type::{ConfigError, GetType, Result, Value, internal_error, return_error};
use tracing::trace;

use super::BackendLink;

/// Stages rows as parallel arrays, one per procedure parameter.
///
/// The arrays are allocated once at full capacity. A partial batch is bound
/// through views narrowed to the fill count, so the payload always has the
/// exact row count while the full-size arrays stay allocated for reuse.
pub struct ColumnarUnit<B: Backend> {
	target: Arc<ProcedureTarget>,
	arrays: Vec<Vec<Value>>,
	fill: usize,
	capacity: usize,
	pub(super) link: BackendLink<B>,
}

impl<B: Backend> ColumnarUnit<B> {
	pub fn new(backend: Arc<B>, target: Arc<ProcedureTarget>, capacity: usize, flush_timeout: Duration) -> Self {
		let arrays = target.params.iter().map(|_| vec![Value::Undefined; capacity]).collect();
		Self {
			target,
			arrays,
			fill: 0,
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
		if self.fill >= self.capacity {
			return Err(internal_error!("row added to a saturated unit of capacity {}", self.capacity));
		}
		for (param, value) in self.target.params.iter().zip(&values) {
			if !param.ty.accepts(value.get_type()) {
				return_error!(ConfigError::TypeMismatch {
					param: param.name.clone(),
					expected: param.ty,
					actual: value.get_type(),
				});
			}
		}

		for (array, value) in self.arrays.iter_mut().zip(values) {
			array[self.fill] = value;
		}
		self.fill += 1;

		Ok(self.fill == self.capacity)
	}

	pub fn flush(&mut self) -> Result<usize> {
		if self.fill == 0 {
			return Ok(0);
		}

		let fill = self.fill;
		let target = &self.target;
		let result = {
			let batch = ArrayBatch::new(self.arrays.iter().map(|array| &array[..fill]).collect());
			self.link.with_connection(|connection| connection.execute_array(target, &batch))
		};
		trace!(
			procedure = %target.procedure,
			rows = fill,
			partial = fill < self.capacity,
			ok = result.is_ok(),
			"columnar flush"
		);

		self.reset();
		result
	}

	/// Clears the filled slots and rewinds the fill index.
	pub(super) fn reset(&mut self) {
		let fill = self.fill;
		for array in &mut self.arrays {
			for slot in &mut array[..fill] {
				*slot = Value::Undefined;
			}
		}
		self.fill = 0;
	}

	pub fn len(&self) -> usize {
		self.fill
	}

	pub fn is_empty(&self) -> bool {
		self.fill == 0
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

#[cfg(test)]
mod tests {
	use reifydb_bulk_backend::ParamSpec;
	use reifydb_bulk_testing::{MemoryBackend, WriteKind};
	use reifydb_bulk_type::Type;

	use super::*;
	use crate::unit::LoadUnit;

	const PROCEDURE: &str = "load_people";

	fn unit(backend: &MemoryBackend, capacity: usize) -> ColumnarUnit<MemoryBackend> {
		ColumnarUnit::new(
			Arc::new(backend.clone()),
			Arc::new(ProcedureTarget::new(
				PROCEDURE,
				vec![ParamSpec::new("id", Type::Int8), ParamSpec::new("name", Type::Utf8)],
			)),
			capacity,
			Duration::from_secs(1),
		)
	}

	fn row(id: i64, name: &str) -> Vec<Value> {
		vec![Value::int8(id), Value::utf8(name)]
	}

	#[test]
	fn test_arrays_presized_to_capacity() {
		let backend = MemoryBackend::new();
		let unit = unit(&backend, 8);
		assert!(unit.arrays.iter().all(|array| array.len() == 8));
	}

	#[test]
	fn test_saturated_flush_binds_full_arrays() {
		let backend = MemoryBackend::new();
		let mut unit = unit(&backend, 2);

		assert!(!unit.add_row(row(1, "a")).unwrap());
		assert!(unit.add_row(row(2, "b")).unwrap());
		assert_eq!(unit.flush().unwrap(), 2);

		let writes = backend.writes();
		assert_eq!(
			writes[0].kind,
			WriteKind::ExecuteArray {
				procedure: PROCEDURE.to_string()
			}
		);
		assert_eq!(writes[0].rows, vec![row(1, "a"), row(2, "b")]);
	}

	#[test]
	fn test_partial_flush_sends_exact_length_and_keeps_arrays() {
		let backend = MemoryBackend::new();
		let mut unit = unit(&backend, 5);

		unit.add_row(row(1, "a")).unwrap();
		unit.add_row(row(2, "b")).unwrap();
		assert_eq!(unit.flush().unwrap(), 2);

		assert_eq!(backend.batch_sizes(), vec![2]);
		assert!(unit.arrays.iter().all(|array| array.len() == 5));
		assert!(unit.arrays.iter().flatten().all(Value::is_undefined));
		assert!(unit.is_empty());
	}

	#[test]
	fn test_type_mismatch_rejects_row() {
		let backend = MemoryBackend::new();
		let mut unit = unit(&backend, 2);

		let err = unit.add_row(vec![Value::utf8("one"), Value::utf8("a")]).unwrap_err();
		assert_eq!(err.code(), "CONFIG_002");
		assert!(unit.is_empty());
	}

	#[test]
	fn test_undefined_and_widening_accepted() {
		let backend = MemoryBackend::new();
		let mut unit = unit(&backend, 2);

		unit.add_row(vec![Value::int4(1), Value::Undefined]).unwrap();
		assert_eq!(unit.len(), 1);
	}

	#[test]
	fn test_arity_mismatch() {
		let backend = MemoryBackend::new();
		let mut unit = unit(&backend, 2);
		assert_eq!(unit.add_row(vec![Value::int8(1)]).unwrap_err().code(), "CONFIG_001");
	}

	#[test]
	fn test_close_through_load_unit() {
		let backend = MemoryBackend::new();
		let mut unit = LoadUnit::Columnar(unit(&backend, 4));

		unit.add_row(row(1, "a")).unwrap();
		assert_eq!(unit.capacity(), 4);
		unit.close().unwrap();

		assert_eq!(backend.rows_written(), 1);
		assert_eq!(backend.open_connections(), 0);
		assert!(!unit.is_connected());
	}

	#[test]
	fn test_discard_clears_slots() {
		let backend = MemoryBackend::new();
		let mut unit = LoadUnit::Columnar(unit(&backend, 4));

		unit.add_row(row(1, "a")).unwrap();
		unit.add_row(row(2, "b")).unwrap();
		unit.discard();

		assert!(unit.is_empty());
		let LoadUnit::Columnar(inner) = &unit else {
			unreachable!()
		};
		assert!(inner.arrays.iter().flatten().all(Value::is_undefined));
		assert_eq!(backend.write_count(), 0);
	}

	#[test]
	fn test_connect_failure_keeps_nothing_open() {
		let backend = MemoryBackend::new();
		backend.fail_connect(true);
		let mut unit = unit(&backend, 2);

		unit.add_row(row(1, "a")).unwrap();
		assert_eq!(unit.flush().unwrap_err().code(), "BACKEND_001");
		assert!(unit.is_empty());
		assert!(!unit.link.is_open());
	}
}
