// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Loads synthetic rows into SQLite through the bulk-load pipeline and reports
//! flush latency and throughput.
//!
//! Usage: `reifydb-bulk-load-test [rows] [pool_size] [capacity] [path]`

mod metrics;
mod timed;

use std::{env, path::PathBuf, process::ExitCode, str::FromStr, sync::Arc};

use metrics::Metrics;
use reifydb_bulk::{Pipeline, PipelineConfig};
use reifydb_bulk_backend::{
	TableTarget,
	sqlite::{SqliteBackend, SqliteConfig, SynchronousMode},
};
use reifydb_bulk_type::Value;
use timed::TimedBackend;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS load_test (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)";

struct Args {
	rows: usize,
	pool_size: usize,
	capacity: usize,
	path: PathBuf,
}

fn parse<T: FromStr>(arg: Option<String>, default: T, name: &str) -> Result<T, String> {
	match arg {
		None => Ok(default),
		Some(value) => value.parse().map_err(|_| format!("invalid {name}: {value}")),
	}
}

fn parse_args() -> Result<Args, String> {
	let mut args = env::args().skip(1);
	Ok(Args {
		rows: parse(args.next(), 1_000_000, "rows")?,
		pool_size: parse(args.next(), 4, "pool_size")?,
		capacity: parse(args.next(), 10_000, "capacity")?,
		path: parse(args.next(), env::temp_dir().join("reifydb-bulk-load-test.db"), "path")?,
	})
}

fn run(args: Args) -> Result<(), String> {
	let metrics = Arc::new(Metrics::new()?);

	let sqlite = SqliteBackend::new(SqliteConfig::new(&args.path).synchronous_mode(SynchronousMode::Off));
	sqlite.execute_batch("DROP TABLE IF EXISTS load_test").map_err(|e| e.to_string())?;
	sqlite.execute_batch(SCHEMA).map_err(|e| e.to_string())?;
	info!(
		path = %sqlite.path().display(),
		rows = args.rows,
		pool_size = args.pool_size,
		capacity = args.capacity,
		"starting load"
	);

	let pipeline = Pipeline::tabular(
		TimedBackend::new(sqlite, metrics.clone()),
		TableTarget::new("load_test", ["id", "name", "score"]),
		PipelineConfig::new(args.pool_size, args.capacity),
	)
	.map_err(|e| e.to_string())?;

	metrics.start();
	for id in 0..args.rows {
		let score = if id % 7 == 0 {
			Value::Undefined
		} else {
			Value::float8(id as f64 / 7.0)
		};
		pipeline.post(vec![Value::int8(id as i64), Value::utf8(format!("row-{id}")), score])
			.map_err(|e| e.to_string())?;
	}
	pipeline.complete().map_err(|e| e.to_string())?;

	let stats = pipeline.stats();
	pipeline.close().map_err(|e| e.to_string())?;

	metrics.summary().print();
	println!("peak in flight: {} of {}", stats.peak_in_flight, args.pool_size.saturating_sub(1));
	Ok(())
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let result = parse_args().and_then(run);
	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("load test failed: {err}");
			ExitCode::FAILURE
		}
	}
}
