// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Pipeline orchestrator.
//!
//! Owns exactly one filling unit and a bounded queue of free units. Rows are
//! staged synchronously into the filling unit; when it saturates, a free unit
//! takes its place and the full one is flushed in the background through the
//! completion barrier. Taking a free unit blocks while every other unit is
//! flushing, which bounds both memory and in-flight flushes by the pool size.

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use reifydb_bulk_backend::{Backend, ProcedureTarget, TableTarget};
use reifydb_bulk_type::{Error, PipelineError, Result, Value, err, return_error};
use tracing::{debug, error, trace, warn};

use crate::{
	barrier::CompletionBarrier,
	config::PipelineConfig,
	unit::{ColumnarUnit, LoadUnit, TabularUnit},
	worker::WorkerPool,
};

/// Point-in-time counters of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
	pub rows_posted: usize,
	/// Flushes that wrote at least one row, background and inline
	pub flushes: usize,
	pub rows_flushed: usize,
	pub in_flight: usize,
	pub peak_in_flight: usize,
	pub faults: usize,
}

#[derive(Default)]
struct Counters {
	rows_posted: AtomicUsize,
	flushes: AtomicUsize,
	rows_flushed: AtomicUsize,
	in_flight: AtomicUsize,
	peak_in_flight: AtomicUsize,
	faults: AtomicUsize,
}

impl Counters {
	fn begin_flush(&self) {
		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
	}

	fn end_flush(&self) {
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
	}

	fn record(&self, result: &Result<usize>) {
		match result {
			Ok(0) => {}
			Ok(rows) => {
				self.flushes.fetch_add(1, Ordering::SeqCst);
				self.rows_flushed.fetch_add(*rows, Ordering::SeqCst);
			}
			Err(_) => {
				self.flushes.fetch_add(1, Ordering::SeqCst);
				self.faults.fetch_add(1, Ordering::SeqCst);
			}
		}
	}

	fn snapshot(&self) -> PipelineStats {
		PipelineStats {
			rows_posted: self.rows_posted.load(Ordering::SeqCst),
			flushes: self.flushes.load(Ordering::SeqCst),
			rows_flushed: self.rows_flushed.load(Ordering::SeqCst),
			in_flight: self.in_flight.load(Ordering::SeqCst),
			peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
			faults: self.faults.load(Ordering::SeqCst),
		}
	}
}

/// Hands a dispatched unit back to the free queue when dropped. A unit whose
/// flush panicked is discarded first.
struct Recycle<B: Backend> {
	unit: Option<LoadUnit<B>>,
	free: Sender<LoadUnit<B>>,
	counters: Arc<Counters>,
	/// Set once the flush returned, successfully or not.
	flushed: bool,
}

impl<B: Backend> Recycle<B> {
	fn flush(&mut self) -> Result<usize> {
		let result = match self.unit.as_mut() {
			Some(unit) => unit.flush(),
			None => Ok(0),
		};
		self.flushed = true;
		result
	}
}

impl<B: Backend> Drop for Recycle<B> {
	fn drop(&mut self) {
		// no longer in flight once it is free again
		self.counters.end_flush();
		if let Some(mut unit) = self.unit.take() {
			if !self.flushed {
				unit.discard();
			}
			if self.free.send(unit).is_err() {
				warn!("free unit queue gone, dropping recycled unit");
			}
		}
	}
}

pub struct Pipeline<B: Backend> {
	/// The filling slot; `None` once the pipeline is closed.
	filling: Mutex<Option<LoadUnit<B>>>,
	free_tx: Sender<LoadUnit<B>>,
	free_rx: Receiver<LoadUnit<B>>,
	barrier: CompletionBarrier,
	pool_size: usize,
	poisoned: AtomicBool,
	closed: AtomicBool,
	counters: Arc<Counters>,
}

impl<B: Backend> Pipeline<B> {
	/// Builds a pipeline of tabular units writing to `target`.
	pub fn tabular(backend: B, target: TableTarget, config: PipelineConfig) -> Result<Self> {
		config.validate()?;
		target.validate()?;

		let backend = Arc::new(backend);
		let target = Arc::new(target);
		Self::with_units(config, |_| {
			LoadUnit::Tabular(TabularUnit::new(
				backend.clone(),
				target.clone(),
				config.buffer_capacity,
				config.flush_timeout,
			))
		})
	}

	/// Builds a pipeline of columnar units calling `target`.
	pub fn columnar(backend: B, target: ProcedureTarget, config: PipelineConfig) -> Result<Self> {
		config.validate()?;
		target.validate()?;

		let backend = Arc::new(backend);
		let target = Arc::new(target);
		Self::with_units(config, |_| {
			LoadUnit::Columnar(ColumnarUnit::new(
				backend.clone(),
				target.clone(),
				config.buffer_capacity,
				config.flush_timeout,
			))
		})
	}

	fn with_units(config: PipelineConfig, mut make: impl FnMut(usize) -> LoadUnit<B>) -> Result<Self> {
		let (free_tx, free_rx) = bounded(config.pool_size);
		let filling = make(0);
		for index in 1..config.pool_size {
			free_tx.send(make(index)).map_err(|_| PipelineError::FreeQueueDisconnected)?;
		}

		// a single unit always flushes inline
		let barrier = CompletionBarrier::new(match config.pool_size {
			1 => None,
			size => Some(WorkerPool::new(size - 1)?),
		});
		debug!(
			pool_size = config.pool_size,
			buffer_capacity = config.buffer_capacity,
			workers = barrier.workers(),
			"bulk load pipeline started"
		);

		Ok(Self {
			filling: Mutex::new(Some(filling)),
			free_tx,
			free_rx,
			barrier,
			pool_size: config.pool_size,
			poisoned: AtomicBool::new(false),
			closed: AtomicBool::new(false),
			counters: Arc::new(Counters::default()),
		})
	}

	/// Stages one row, rotating units when the filling unit saturates.
	///
	/// Blocks while waiting for a free unit if every other unit is flushing.
	/// A row rejected for its shape leaves the pipeline usable; any backend
	/// fault poisons it.
	pub fn post(&self, row: Vec<Value>) -> Result<()> {
		self.ensure_usable()?;

		let mut slot = self.filling.lock();
		let Some(unit) = slot.as_mut() else {
			return_error!(PipelineError::Closed);
		};

		let saturated = unit.add_row(row)?;
		self.counters.rows_posted.fetch_add(1, Ordering::SeqCst);
		if !saturated {
			return Ok(());
		}

		if self.pool_size == 1 {
			let result = unit.flush();
			self.counters.record(&result);
			self.poison_on_fault(result)?;
			return Ok(());
		}

		let next = self.free_rx.recv().map_err(|_| PipelineError::FreeQueueDisconnected)?;
		let full = std::mem::replace(unit, next);
		self.dispatch(full);
		Ok(())
	}

	fn dispatch(&self, unit: LoadUnit<B>) {
		trace!(rows = unit.len(), in_flight = self.barrier.in_flight(), "dispatching flush");

		let counters = self.counters.clone();
		let mut recycle = Recycle {
			unit: Some(unit),
			free: self.free_tx.clone(),
			counters: counters.clone(),
			flushed: false,
		};

		self.barrier.run_async(move || {
			counters.begin_flush();
			let result = recycle.flush();
			counters.record(&result);

			if let Err(err) = &result {
				warn!(code = %err.code, "background flush failed: {}", err.message);
			}
			drop(recycle);
			result
		});
	}

	/// Flushes the filling unit inline and waits for every dispatched flush.
	///
	/// Reports the first background fault exactly once. Calling it again
	/// without posting in between writes nothing.
	pub fn complete(&self) -> Result<()> {
		self.ensure_usable()?;
		self.drain(None)
	}

	/// Like [`complete`](Self::complete) but fails with a drain timeout if the
	/// background flushes do not finish within `timeout`.
	pub fn complete_timeout(&self, timeout: Duration) -> Result<()> {
		self.ensure_usable()?;
		self.drain(Some(timeout))
	}

	fn drain(&self, timeout: Option<Duration>) -> Result<()> {
		let mut slot = self.filling.lock();

		let inline = match slot.as_mut() {
			Some(unit) => unit.flush(),
			None => Ok(0),
		};
		self.counters.record(&inline);

		let drained = match timeout {
			None => self.barrier.wait(),
			Some(timeout) => match self.barrier.wait_timeout(timeout) {
				Ok(true) => Ok(()),
				Ok(false) => err!(PipelineError::DrainTimeout {
					timeout,
					in_flight: self.barrier.in_flight(),
				}),
				Err(err) => Err(err),
			},
		};
		drop(slot);

		match (inline, drained) {
			(Ok(_), Ok(())) => Ok(()),
			(Err(err), Ok(())) | (Ok(_), Err(err)) => self.poison_on_fault(Err(err)),
			// the background fault rides along as the cause
			(Err(err), Err(background)) => self.poison_on_fault(Err(Error(err.0.with_cause(background.0)))),
		}
	}

	/// Drains, then closes every unit and releases the workers.
	///
	/// Every unit is closed even when draining or an earlier unit fails; the
	/// first error is reported.
	pub fn close(mut self) -> Result<()> {
		self.shutdown()
	}

	fn shutdown(&mut self) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Ok(());
		}

		let mut first_error: Option<Error> = None;
		if !self.poisoned.load(Ordering::SeqCst) {
			if let Err(err) = self.drain(None) {
				first_error = Some(err);
			}
		}
		// a poisoned pipeline may still have flushes in flight
		if let Err(err) = self.barrier.wait() {
			warn!(code = %err.code, "fault reported while closing: {}", err.message);
			first_error.get_or_insert(err);
		}
		self.closed.store(true, Ordering::SeqCst);

		let mut units: Vec<LoadUnit<B>> = self.free_rx.try_iter().collect();
		if let Some(unit) = self.filling.get_mut().take() {
			units.push(unit);
		}
		if units.len() != self.pool_size {
			warn!(expected = self.pool_size, found = units.len(), "closing with missing load units");
		}

		for mut unit in units {
			if let Err(err) = unit.close() {
				warn!(code = %err.code, "failed to close load unit: {}", err.message);
				first_error.get_or_insert(err);
			}
		}

		debug!(stats = ?self.counters.snapshot(), "bulk load pipeline closed");
		match first_error {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	pub fn stats(&self) -> PipelineStats {
		self.counters.snapshot()
	}

	pub fn pool_size(&self) -> usize {
		self.pool_size
	}

	pub fn is_poisoned(&self) -> bool {
		self.poisoned.load(Ordering::SeqCst)
	}

	fn ensure_usable(&self) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return_error!(PipelineError::Closed);
		}
		if self.poisoned.load(Ordering::SeqCst) {
			return_error!(PipelineError::Poisoned);
		}
		Ok(())
	}

	fn poison_on_fault<T>(&self, result: Result<T>) -> Result<T> {
		if result.is_err() {
			self.poisoned.store(true, Ordering::SeqCst);
		}
		result
	}
}

impl<B: Backend> Drop for Pipeline<B> {
	fn drop(&mut self) {
		if let Err(err) = self.shutdown() {
			error!(code = %err.code, "bulk load pipeline teardown failed: {}", err.message);
		}
	}
}
