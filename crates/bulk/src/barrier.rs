// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Completion barrier for background flushes.
//!
//! The barrier counts in-flight work. Its gate is open exactly when the count
//! is zero: entering work closes it on the 0 -> 1 transition and exiting work
//! opens it again on 1 -> 0, waking every waiter before `exit` returns.
//!
//! Work scheduled through [`CompletionBarrier::run_async`] always exits the
//! barrier, whether it succeeds, fails or panics. The first failure is kept
//! and handed to whichever caller of [`CompletionBarrier::wait`] next observes
//! the gate open; later failures are logged and dropped.

use std::{
	any::Any,
	panic::{self, AssertUnwindSafe},
	sync::Arc,
	time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, bounded};
use parking_lot::{Condvar, Mutex};
use reifydb_bulk_type::{Error, PipelineError, Result, err, internal_error};
use tracing::{error, trace};

use crate::worker::WorkerPool;

struct Inner {
	/// In-flight count; the gate is open when it is zero.
	count: Mutex<usize>,
	opened: Condvar,
	fault: Mutex<Option<Error>>,
}

impl Inner {
	fn enter(&self) {
		let mut count = self.count.lock();
		*count += 1;
		if *count == 1 {
			trace!("barrier gate closed");
		}
	}

	fn exit(&self) {
		let mut count = self.count.lock();
		debug_assert!(*count > 0, "barrier exit without enter");
		*count = count.saturating_sub(1);
		if *count == 0 {
			trace!("barrier gate opened");
			self.opened.notify_all();
		}
	}

	fn record_fault(&self, err: Error) {
		let mut fault = self.fault.lock();
		if fault.is_none() {
			*fault = Some(err);
		} else {
			error!(code = %err.code, "dropping additional background fault: {}", err.message);
		}
	}
}

/// Exits the barrier when dropped, including during unwinding.
struct ExitGuard(Arc<Inner>);

impl Drop for ExitGuard {
	fn drop(&mut self) {
		self.0.exit();
	}
}

/// Handle to work scheduled on the barrier; joining it is optional.
pub struct TaskHandle<R> {
	receiver: Receiver<Result<R>>,
}

impl<R> TaskHandle<R> {
	/// Blocks until the work finished and returns its outcome.
	pub fn join(self) -> Result<R> {
		self.receiver.recv().unwrap_or_else(|_| Err(internal_error!("background task dropped its result")))
	}
}

pub struct CompletionBarrier {
	inner: Arc<Inner>,
	/// `None` runs scheduled work on the calling thread.
	workers: Option<WorkerPool>,
}

impl CompletionBarrier {
	pub fn new(workers: Option<WorkerPool>) -> Self {
		Self {
			inner: Arc::new(Inner {
				count: Mutex::new(0),
				opened: Condvar::new(),
				fault: Mutex::new(None),
			}),
			workers,
		}
	}

	pub fn enter(&self) {
		self.inner.enter();
	}

	pub fn exit(&self) {
		self.inner.exit();
	}

	/// Threads available to scheduled work; zero when it runs on the caller.
	pub fn workers(&self) -> usize {
		self.workers.as_ref().map_or(0, WorkerPool::threads)
	}

	pub fn in_flight(&self) -> usize {
		*self.inner.count.lock()
	}

	pub fn is_open(&self) -> bool {
		self.in_flight() == 0
	}

	/// Schedules `work` on the worker pool inside the barrier.
	///
	/// Without a pool the work runs to completion before this returns, with the
	/// same fault handling.
	pub fn run_async<F, R>(&self, work: F) -> TaskHandle<R>
	where
		F: FnOnce() -> Result<R> + Send + 'static,
		R: Send + 'static,
	{
		self.enter();

		let (sender, receiver) = bounded(1);
		let guard = ExitGuard(self.inner.clone());

		let job = move || {
			let guard = guard;

			let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
				Ok(result) => result,
				Err(payload) => err!(PipelineError::FlushPanicked {
					message: panic_message(payload),
				}),
			};

			if let Err(err) = &result {
				guard.0.record_fault(err.clone());
			}
			let _ = sender.send(result);
		};

		match &self.workers {
			Some(workers) => workers.spawn(job),
			None => job(),
		}

		TaskHandle {
			receiver,
		}
	}

	/// Blocks until no work is in flight, then reports the first fault, if any.
	pub fn wait(&self) -> Result<()> {
		{
			let mut count = self.inner.count.lock();
			while *count > 0 {
				self.inner.opened.wait(&mut count);
			}
		}
		self.take_fault()
	}

	/// Like [`wait`](Self::wait) but gives up after `timeout`.
	///
	/// Returns `Ok(true)` when the gate was observed open and `Ok(false)` when
	/// the timeout elapsed first. A pending fault is only reported once the gate
	/// is open.
	pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
		let deadline = Instant::now() + timeout;
		{
			let mut count = self.inner.count.lock();
			while *count > 0 {
				if self.inner.opened.wait_until(&mut count, deadline).timed_out() && *count > 0 {
					return Ok(false);
				}
			}
		}
		self.take_fault().map(|_| true)
	}

	fn take_fault(&self) -> Result<()> {
		match self.inner.fault.lock().take() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic payload".to_string()
	}
}
