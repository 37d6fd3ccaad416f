// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Background worker pool running flushes, built on rayon.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use reifydb_bulk_type::{PipelineError, Result};

/// A dedicated rayon [`ThreadPool`] the completion barrier schedules work on.
///
/// Flushes block on backend I/O, so they never run on the global rayon pool.
#[derive(Clone)]
pub struct WorkerPool {
	pool: Arc<ThreadPool>,
}

impl WorkerPool {
	pub fn new(threads: usize) -> Result<Self> {
		let pool = ThreadPoolBuilder::new()
			.num_threads(threads.max(1))
			.thread_name(|i| format!("bulk-flush-{i}"))
			.build()
			.map_err(|e| PipelineError::WorkerPool {
				reason: e.to_string(),
			})?;

		Ok(Self {
			pool: Arc::new(pool),
		})
	}

	/// Runs `f` on one of the pool's threads without waiting for it.
	pub fn spawn<F>(&self, f: F)
	where
		F: FnOnce() + Send + 'static,
	{
		self.pool.spawn(f);
	}

	pub fn threads(&self) -> usize {
		self.pool.current_num_threads()
	}
}
