// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Fault propagation, poisoning and teardown.

use std::time::Duration;

use reifydb_bulk::{Pipeline, PipelineConfig};
use reifydb_bulk_backend::TableTarget;
use reifydb_bulk_testing::{MemoryBackend, init_tracing, util::wait::wait_for};
use reifydb_bulk_type::Value;

fn row(id: i64) -> Vec<Value> {
	vec![Value::int8(id)]
}

fn pipeline(backend: &MemoryBackend, pool_size: usize, capacity: usize) -> Pipeline<MemoryBackend> {
	Pipeline::tabular(backend.clone(), TableTarget::new("events", ["id"]), PipelineConfig::new(pool_size, capacity))
		.unwrap()
}

#[test]
fn test_second_of_five_batches_fails() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(2);
	let pipeline = pipeline(&backend, 3, 10);

	for id in 0..50 {
		pipeline.post(row(id)).unwrap();
	}

	let err = pipeline.complete().unwrap_err();
	assert_eq!(err.code(), "BACKEND_002");
	assert!(err.message.contains("write 2"));

	// siblings still ran
	assert_eq!(backend.write_count(), 5);
	assert_eq!(backend.rows_written(), 40);
	assert_eq!(pipeline.stats().faults, 1);

	// reported once; the pipeline is now poisoned
	assert!(pipeline.is_poisoned());
	assert_eq!(pipeline.complete().unwrap_err().code(), "PIPELINE_001");
	assert_eq!(pipeline.post(row(99)).unwrap_err().code(), "PIPELINE_001");

	pipeline.close().unwrap();
	assert_eq!(backend.open_connections(), 0);
}

#[test]
fn test_only_first_of_several_faults_is_reported() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(1).fail_write(2).fail_write(3);
	let pipeline = pipeline(&backend, 2, 5);

	for id in 0..15 {
		pipeline.post(row(id)).unwrap();
	}

	let err = pipeline.complete().unwrap_err();
	assert!(err.message.contains("write 1"));
	assert_eq!(pipeline.stats().faults, 3);

	// the dropped faults do not resurface on close
	pipeline.close().unwrap();
}

#[test]
fn test_inline_flush_fault_is_reported_by_complete() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(1);
	let pipeline = pipeline(&backend, 3, 100);

	pipeline.post(row(1)).unwrap();
	assert_eq!(pipeline.complete().unwrap_err().code(), "BACKEND_002");
	assert!(pipeline.is_poisoned());
	pipeline.close().unwrap();
}

#[test]
fn test_synchronous_fault_poisons_post() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(1);
	let pipeline = pipeline(&backend, 1, 2);

	pipeline.post(row(1)).unwrap();
	assert_eq!(pipeline.post(row(2)).unwrap_err().code(), "BACKEND_002");
	assert_eq!(pipeline.post(row(3)).unwrap_err().code(), "PIPELINE_001");
	pipeline.close().unwrap();
}

#[test]
fn test_connections_closed_after_faults() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(1).fail_write(4);
	let pipeline = pipeline(&backend, 4, 3);

	for id in 0..30 {
		pipeline.post(row(id)).unwrap();
	}
	assert!(pipeline.complete().is_err());
	pipeline.close().unwrap();

	assert_eq!(backend.open_connections(), 0);
}

#[test]
fn test_complete_flushes_residual_rows_before_reporting_fault() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(1);
	let pipeline = pipeline(&backend, 3, 4);

	for id in 0..4 {
		pipeline.post(row(id)).unwrap();
	}
	wait_for(|| backend.write_count() == 1, "first batch should fail in the background");
	for id in 4..6 {
		pipeline.post(row(id)).unwrap();
	}
	assert!(pipeline.complete().is_err());

	// complete flushed rows 4 and 5 inline before reporting the fault
	assert_eq!(backend.rows_written(), 2);
	pipeline.close().unwrap();
	assert_eq!(backend.open_connections(), 0);
}

#[test]
fn test_inline_fault_carries_background_fault_as_cause() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_write(1).fail_write(2);
	let pipeline = pipeline(&backend, 2, 2);

	pipeline.post(row(1)).unwrap();
	pipeline.post(row(2)).unwrap();
	wait_for(|| backend.write_count() == 1, "first batch should fail in the background");
	pipeline.post(row(3)).unwrap();

	let err = pipeline.complete().unwrap_err();
	assert!(err.message.contains("write 2"));
	let cause = err.cause.as_ref().unwrap();
	assert_eq!(cause.code, "BACKEND_002");
	assert!(cause.message.contains("write 1"));
	assert!(pipeline.is_poisoned());
	pipeline.close().unwrap();
}

#[test]
fn test_panicked_flush_does_not_leak_into_later_batches() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.panic_write(1);
	let pipeline = pipeline(&backend, 2, 2);

	pipeline.post(row(1)).unwrap();
	pipeline.post(row(2)).unwrap();
	pipeline.post(row(3)).unwrap();
	pipeline.post(row(4)).unwrap();
	// lands in the unit whose flush panicked
	pipeline.post(row(5)).unwrap();

	let err = pipeline.complete().unwrap_err();
	assert_eq!(err.code(), "PIPELINE_003");
	assert!(err.message.contains("injected panic on write 1"));

	// the panicked batch is never written again
	let writes = backend.writes();
	assert_eq!(writes.len(), 2);
	assert!(writes.iter().all(|w| !w.rows.contains(&row(1)) && !w.rows.contains(&row(2))));
	let mut sizes = backend.batch_sizes();
	sizes.sort();
	assert_eq!(sizes, vec![1, 2]);
	assert_eq!(backend.rows_written(), 3);

	assert_eq!(pipeline.complete().unwrap_err().code(), "PIPELINE_001");
	pipeline.close().unwrap();
	assert_eq!(backend.open_connections(), 0);
}

#[test]
fn test_close_failure_is_reported_but_teardown_continues() {
	init_tracing();
	let backend = MemoryBackend::new();
	let pipeline = pipeline(&backend, 3, 2);

	for id in 0..5 {
		pipeline.post(row(id)).unwrap();
	}
	pipeline.complete().unwrap();
	backend.fail_close(true);

	let err = pipeline.close().unwrap_err();
	assert_eq!(err.code(), "BACKEND_003");
	assert_eq!(backend.open_connections(), 0);
}

#[test]
fn test_connect_failure_surfaces_from_complete() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.fail_connect(true);
	let pipeline = pipeline(&backend, 3, 2);

	pipeline.post(row(1)).unwrap();
	pipeline.post(row(2)).unwrap();
	assert_eq!(pipeline.complete().unwrap_err().code(), "BACKEND_001");
	pipeline.close().unwrap();
}

#[test]
fn test_flush_timeout_surfaces_as_backend_timeout() {
	init_tracing();
	let backend = MemoryBackend::new();
	backend.write_delay(Duration::from_millis(50));
	let pipeline = Pipeline::tabular(
		backend.clone(),
		TableTarget::new("events", ["id"]),
		PipelineConfig::new(3, 2).with_flush_timeout(Duration::from_millis(5)),
	)
	.unwrap();

	pipeline.post(row(1)).unwrap();
	pipeline.post(row(2)).unwrap();
	assert_eq!(pipeline.complete().unwrap_err().code(), "BACKEND_004");
	pipeline.close().unwrap();
}

#[test]
fn test_drain_timeout_is_fatal() {
	init_tracing();
	let backend = MemoryBackend::new();
	let pipeline = pipeline(&backend, 3, 2);
	backend.pause();

	pipeline.post(row(1)).unwrap();
	pipeline.post(row(2)).unwrap();
	wait_for(|| backend.in_flight() == 1, "flush should be paused in the backend");

	let err = pipeline.complete_timeout(Duration::from_millis(10)).unwrap_err();
	assert_eq!(err.code(), "PIPELINE_002");
	assert!(pipeline.is_poisoned());

	backend.resume();
	pipeline.close().unwrap();
	assert_eq!(backend.rows_written(), 2);
	assert_eq!(backend.open_connections(), 0);
}

#[test]
fn test_complete_timeout_within_bound() {
	init_tracing();
	let backend = MemoryBackend::new();
	let pipeline = pipeline(&backend, 3, 2);

	for id in 0..7 {
		pipeline.post(row(id)).unwrap();
	}
	pipeline.complete_timeout(Duration::from_secs(5)).unwrap();
	assert_eq!(backend.rows_written(), 7);
	pipeline.close().unwrap();
}
