// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Recording in-memory backend.
//!
//! Every write is recorded with its rows, the thread it ran on and whether it
//! succeeded. Writes can be delayed, paused, or made to fail by sequence
//! number, and the backend tracks how many writes run at the same time and
//! which connections are still open.

use std::{
	collections::HashSet,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread::{self, ThreadId},
	time::Duration,
};

use parking_lot::{Condvar, Mutex};
use reifydb_bulk_backend::{ArrayBatch, Backend, Connection, ProcedureTarget, Table, TableTarget};
use reifydb_bulk_type::{BackendError, Result, Value, return_error};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteKind {
	BulkCopy {
		table: String,
	},
	ExecuteArray {
		procedure: String,
	},
}

#[derive(Debug, Clone)]
pub struct WriteRecord {
	/// 1-based order in which writes started
	pub seq: usize,
	pub kind: WriteKind,
	/// Rows in destination column order, backend nulls as `Undefined`
	pub rows: Vec<Vec<Value>>,
	pub thread: ThreadId,
	pub connection: usize,
	pub succeeded: bool,
}

#[derive(Default)]
struct State {
	writes: Vec<WriteRecord>,
	/// Open flag per connection id
	connections: Vec<bool>,
	fail_writes: HashSet<usize>,
	panic_writes: HashSet<usize>,
	fail_connect: bool,
	fail_close: bool,
	write_delay: Duration,
}

#[derive(Default)]
struct Inner {
	state: Mutex<State>,
	paused: Mutex<bool>,
	resumed: Condvar,
	in_flight: AtomicUsize,
	peak_in_flight: AtomicUsize,
	next_write: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
	inner: Arc<Inner>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes the `seq`th write (1-based, in start order) fail.
	pub fn fail_write(&self, seq: usize) -> &Self {
		self.inner.state.lock().fail_writes.insert(seq);
		self
	}

	/// Makes the `seq`th write panic before it records anything.
	pub fn panic_write(&self, seq: usize) -> &Self {
		self.inner.state.lock().panic_writes.insert(seq);
		self
	}

	pub fn fail_connect(&self, fail: bool) -> &Self {
		self.inner.state.lock().fail_connect = fail;
		self
	}

	pub fn fail_close(&self, fail: bool) -> &Self {
		self.inner.state.lock().fail_close = fail;
		self
	}

	/// Every write sleeps this long before completing.
	pub fn write_delay(&self, delay: Duration) -> &Self {
		self.inner.state.lock().write_delay = delay;
		self
	}

	/// Writes that start after this block until [`resume`](Self::resume).
	pub fn pause(&self) {
		*self.inner.paused.lock() = true;
	}

	pub fn resume(&self) {
		*self.inner.paused.lock() = false;
		self.inner.resumed.notify_all();
	}

	pub fn writes(&self) -> Vec<WriteRecord> {
		self.inner.state.lock().writes.clone()
	}

	pub fn write_count(&self) -> usize {
		self.inner.state.lock().writes.len()
	}

	/// Row counts of the recorded writes, in completion order.
	pub fn batch_sizes(&self) -> Vec<usize> {
		self.inner.state.lock().writes.iter().map(|w| w.rows.len()).collect()
	}

	pub fn rows_written(&self) -> usize {
		self.inner.state.lock().writes.iter().filter(|w| w.succeeded).map(|w| w.rows.len()).sum()
	}

	pub fn in_flight(&self) -> usize {
		self.inner.in_flight.load(Ordering::SeqCst)
	}

	pub fn peak_in_flight(&self) -> usize {
		self.inner.peak_in_flight.load(Ordering::SeqCst)
	}

	pub fn connections_opened(&self) -> usize {
		self.inner.state.lock().connections.len()
	}

	pub fn open_connections(&self) -> usize {
		self.inner.state.lock().connections.iter().filter(|open| **open).count()
	}

	fn write(&self, connection: usize, kind: WriteKind, rows: Vec<Vec<Value>>, timeout: Duration) -> Result<usize> {
		let seq = self.inner.next_write.fetch_add(1, Ordering::SeqCst) + 1;
		if self.inner.state.lock().panic_writes.contains(&seq) {
			panic!("injected panic on write {}", seq);
		}
		let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);

		{
			let mut paused = self.inner.paused.lock();
			while *paused {
				self.inner.resumed.wait(&mut paused);
			}
		}

		let (delay, fail) = {
			let state = self.inner.state.lock();
			(state.write_delay, state.fail_writes.contains(&seq))
		};
		if !delay.is_zero() {
			thread::sleep(delay.min(timeout));
		}

		let target = match &kind {
			WriteKind::BulkCopy {
				table,
			} => table.clone(),
			WriteKind::ExecuteArray {
				procedure,
			} => procedure.clone(),
		};
		let timed_out = delay > timeout;
		let succeeded = !fail && !timed_out;
		let count = rows.len();

		trace!(seq, connection, rows = count, succeeded, "memory backend write");
		self.inner.state.lock().writes.push(WriteRecord {
			seq,
			kind,
			rows,
			thread: thread::current().id(),
			connection,
			succeeded,
		});
		self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

		if timed_out {
			return_error!(BackendError::Timeout {
				target,
				timeout,
			});
		}
		if fail {
			return_error!(BackendError::WriteFailed {
				target,
				reason: format!("injected failure on write {}", seq),
			});
		}
		Ok(count)
	}
}

impl Backend for MemoryBackend {
	type Connection = MemoryConnection;

	fn connect(&self, timeout: Duration) -> Result<MemoryConnection> {
		let mut state = self.inner.state.lock();
		if state.fail_connect {
			return_error!(BackendError::ConnectionFailed {
				target: "memory".to_string(),
				reason: "injected connect failure".to_string(),
			});
		}
		state.connections.push(true);
		Ok(MemoryConnection {
			backend: self.clone(),
			id: state.connections.len() - 1,
			timeout,
		})
	}
}

pub struct MemoryConnection {
	backend: MemoryBackend,
	id: usize,
	timeout: Duration,
}

impl Connection for MemoryConnection {
	fn bulk_copy(&mut self, target: &TableTarget, table: &Table) -> Result<usize> {
		let rows = table
			.rows()
			.iter()
			.map(|row| {
				target.columns
					.iter()
					.map(|mapping| row[mapping.source].clone().unwrap_or(Value::Undefined))
					.collect()
			})
			.collect();

		self.backend.write(
			self.id,
			WriteKind::BulkCopy {
				table: target.table.clone(),
			},
			rows,
			self.timeout,
		)
	}

	fn execute_array(&mut self, target: &ProcedureTarget, batch: &ArrayBatch<'_>) -> Result<usize> {
		let rows = (0..batch.len()).map(|index| batch.row(index).cloned().collect()).collect();

		self.backend.write(
			self.id,
			WriteKind::ExecuteArray {
				procedure: target.procedure.clone(),
			},
			rows,
			self.timeout,
		)
	}

	fn close(self) -> Result<()> {
		let mut state = self.backend.inner.state.lock();
		state.connections[self.id] = false;
		if state.fail_close {
			return_error!(BackendError::CloseFailed {
				target: "memory".to_string(),
				reason: format!("injected close failure on connection {}", self.id),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use reifydb_bulk_type::Type;

	use super::*;

	#[test]
	fn test_records_writes_and_connections() {
		let backend = MemoryBackend::new();
		let mut conn = backend.connect(Duration::from_secs(1)).unwrap();

		let mut table = Table::with_capacity(1, 2);
		table.push_row(vec![Some(Value::int8(1))]);
		table.push_row(vec![None]);
		conn.bulk_copy(&TableTarget::new("t", ["id"]), &table).unwrap();

		let writes = backend.writes();
		assert_eq!(writes.len(), 1);
		assert_eq!(writes[0].rows, vec![vec![Value::int8(1)], vec![Value::Undefined]]);
		assert_eq!(backend.open_connections(), 1);

		conn.close().unwrap();
		assert_eq!(backend.open_connections(), 0);
		assert_eq!(backend.connections_opened(), 1);
	}

	#[test]
	fn test_injected_write_failure() {
		let backend = MemoryBackend::new();
		backend.fail_write(2);
		let mut conn = backend.connect(Duration::from_secs(1)).unwrap();

		let target = ProcedureTarget::new("p", vec![reifydb_bulk_backend::ParamSpec::new("id", Type::Int8)]);
		let ids = vec![Value::int8(1)];
		let batch = ArrayBatch::new(vec![ids.as_slice()]);

		assert!(conn.execute_array(&target, &batch).is_ok());
		assert_eq!(conn.execute_array(&target, &batch).unwrap_err().code(), "BACKEND_002");
		assert!(conn.execute_array(&target, &batch).is_ok());
		assert_eq!(backend.rows_written(), 2);
	}

	#[test]
	fn test_injected_panic_records_nothing() {
		let backend = MemoryBackend::new();
		backend.panic_write(1);
		let mut conn = backend.connect(Duration::from_secs(1)).unwrap();

		let mut table = Table::with_capacity(1, 1);
		table.push_row(vec![Some(Value::int8(1))]);
		let target = TableTarget::new("t", ["id"]);
		let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| conn.bulk_copy(&target, &table)));

		assert!(panicked.is_err());
		assert_eq!(backend.write_count(), 0);
		assert_eq!(backend.in_flight(), 0);
		assert_eq!(conn.bulk_copy(&target, &table).unwrap(), 1);
	}

	#[test]
	fn test_delay_beyond_timeout() {
		let backend = MemoryBackend::new();
		backend.write_delay(Duration::from_millis(20));
		let mut conn = backend.connect(Duration::from_millis(5)).unwrap();

		let mut table = Table::with_capacity(1, 1);
		table.push_row(vec![Some(Value::int8(1))]);
		let err = conn.bulk_copy(&TableTarget::new("t", ["id"]), &table).unwrap_err();
		assert_eq!(err.code(), "BACKEND_004");
	}
}
