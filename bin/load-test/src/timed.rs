// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use reifydb_bulk_backend::{ArrayBatch, Backend, Connection, ProcedureTarget, Table, TableTarget};
use reifydb_bulk_type::Result;

use crate::metrics::Metrics;

/// Wraps a backend and times every write its connections make.
pub struct TimedBackend<B: Backend> {
	inner: B,
	metrics: Arc<Metrics>,
}

impl<B: Backend> TimedBackend<B> {
	pub fn new(inner: B, metrics: Arc<Metrics>) -> Self {
		Self {
			inner,
			metrics,
		}
	}
}

impl<B: Backend> Backend for TimedBackend<B> {
	type Connection = TimedConnection<B::Connection>;

	fn connect(&self, timeout: Duration) -> Result<Self::Connection> {
		Ok(TimedConnection {
			inner: self.inner.connect(timeout)?,
			metrics: self.metrics.clone(),
		})
	}
}

pub struct TimedConnection<C: Connection> {
	inner: C,
	metrics: Arc<Metrics>,
}

impl<C: Connection> TimedConnection<C> {
	fn record(&self, start: Instant, result: &Result<usize>) {
		match result {
			Ok(rows) => self.metrics.record_flush(*rows, start.elapsed()),
			Err(err) => self.metrics.record_error(&err.message),
		}
	}
}

impl<C: Connection> Connection for TimedConnection<C> {
	fn bulk_copy(&mut self, target: &TableTarget, table: &Table) -> Result<usize> {
		let start = Instant::now();
		let result = self.inner.bulk_copy(target, table);
		self.record(start, &result);
		result
	}

	fn execute_array(&mut self, target: &ProcedureTarget, batch: &ArrayBatch<'_>) -> Result<usize> {
		let start = Instant::now();
		let result = self.inner.execute_array(target, batch);
		self.record(start, &result);
		result
	}

	fn close(self) -> Result<()> {
		self.inner.close()
	}
}
