// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Parallel bulk-load pipeline.
//!
//! A producer posts rows one at a time into a [`Pipeline`]. Rows are staged in
//! a fixed pool of reusable [`LoadUnit`]s; full units are flushed to the
//! backend in the background while the producer keeps filling the next one.
//! [`Pipeline::complete`] drains everything and reports the first background
//! fault.

pub mod barrier;
pub mod config;
pub mod pipeline;
pub mod unit;
pub mod worker;

pub use barrier::{CompletionBarrier, TaskHandle};
pub use config::{
	DEFAULT_BUFFER_CAPACITY, DEFAULT_FLUSH_TIMEOUT, MIN_BUFFER_CAPACITY, MIN_POOL_SIZE, PipelineConfig,
	PipelineSettings,
};
pub use pipeline::{Pipeline, PipelineStats};
pub use unit::{ColumnarUnit, LoadUnit, TabularUnit};
pub use worker::WorkerPool;
