// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
	time::{Duration, Instant},
};

use hdrhistogram::Histogram;
use parking_lot::Mutex;

/// Flush latency and outcome collector, shared by every flush worker
pub struct Metrics {
	pub total_flushes: AtomicU64,
	pub successful_flushes: AtomicU64,
	pub failed_flushes: AtomicU64,
	pub rows_written: AtomicU64,

	// 1 microsecond to 60 seconds, 3 significant figures
	latency_histogram: Mutex<Histogram<u64>>,

	start_time: Mutex<Option<Instant>>,

	error_counts: Mutex<HashMap<String, u64>>,
}

impl Metrics {
	pub fn new() -> Result<Self, String> {
		let histogram = Histogram::new_with_bounds(1, 60_000_000, 3).map_err(|e| e.to_string())?;
		Ok(Self {
			total_flushes: AtomicU64::new(0),
			successful_flushes: AtomicU64::new(0),
			failed_flushes: AtomicU64::new(0),
			rows_written: AtomicU64::new(0),
			latency_histogram: Mutex::new(histogram),
			start_time: Mutex::new(None),
			error_counts: Mutex::new(HashMap::new()),
		})
	}

	/// Start the throughput timer
	pub fn start(&self) {
		*self.start_time.lock() = Some(Instant::now());
	}

	pub fn record_flush(&self, rows: usize, latency: Duration) {
		self.successful_flushes.fetch_add(1, Ordering::Relaxed);
		self.total_flushes.fetch_add(1, Ordering::Relaxed);
		self.rows_written.fetch_add(rows as u64, Ordering::Relaxed);

		let micros = (latency.as_micros() as u64).clamp(1, 60_000_000);
		self.latency_histogram.lock().saturating_record(micros);
	}

	pub fn record_error(&self, error: &str) {
		self.failed_flushes.fetch_add(1, Ordering::Relaxed);
		self.total_flushes.fetch_add(1, Ordering::Relaxed);

		// truncate long messages
		let error_key = if error.chars().count() > 100 {
			format!("{}...", error.chars().take(97).collect::<String>())
		} else {
			error.to_string()
		};

		*self.error_counts.lock().entry(error_key).or_insert(0) += 1;
	}

	pub fn summary(&self) -> MetricsSummary {
		let histogram = self.latency_histogram.lock();
		let duration = self.start_time.lock().map(|s| s.elapsed()).unwrap_or_default();
		let rows = self.rows_written.load(Ordering::Relaxed);

		let duration_secs = duration.as_secs_f64();
		let rows_per_sec = if duration_secs > 0.0 {
			rows as f64 / duration_secs
		} else {
			0.0
		};

		MetricsSummary {
			total_flushes: self.total_flushes.load(Ordering::Relaxed),
			successful_flushes: self.successful_flushes.load(Ordering::Relaxed),
			failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
			rows_written: rows,
			duration_secs,
			rows_per_sec,
			latency_min_us: histogram.min(),
			latency_max_us: histogram.max(),
			latency_avg_us: histogram.mean(),
			latency_p50_us: histogram.value_at_quantile(0.50),
			latency_p90_us: histogram.value_at_quantile(0.90),
			latency_p99_us: histogram.value_at_quantile(0.99),
			top_errors: self.top_errors(5),
		}
	}

	fn top_errors(&self, n: usize) -> Vec<(String, u64)> {
		let errors = self.error_counts.lock();
		let mut sorted: Vec<_> = errors.iter().map(|(k, v)| (k.clone(), *v)).collect();
		sorted.sort_by(|a, b| b.1.cmp(&a.1));
		sorted.truncate(n);
		sorted
	}
}

#[derive(Debug)]
pub struct MetricsSummary {
	pub total_flushes: u64,
	pub successful_flushes: u64,
	pub failed_flushes: u64,
	pub rows_written: u64,
	pub duration_secs: f64,
	pub rows_per_sec: f64,
	pub latency_min_us: u64,
	pub latency_max_us: u64,
	pub latency_avg_us: f64,
	pub latency_p50_us: u64,
	pub latency_p90_us: u64,
	pub latency_p99_us: u64,
	pub top_errors: Vec<(String, u64)>,
}

impl MetricsSummary {
	pub fn print(&self) {
		println!("flushes:      {} ok, {} failed", self.successful_flushes, self.failed_flushes);
		println!("rows written: {}", self.rows_written);
		println!("duration:     {:.3}s", self.duration_secs);
		println!("throughput:   {:.0} rows/s", self.rows_per_sec);
		println!(
			"flush latency (us): min {} avg {:.0} p50 {} p90 {} p99 {} max {}",
			self.latency_min_us,
			self.latency_avg_us,
			self.latency_p50_us,
			self.latency_p90_us,
			self.latency_p99_us,
			self.latency_max_us
		);
		for (error, count) in &self.top_errors {
			println!("  {count}x {error}");
		}
	}
}
