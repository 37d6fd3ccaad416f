// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use reifydb_bulk_type::{ConfigError, Result, return_error};
use serde::{Deserialize, Serialize};

/// Smallest pool size accepted from [`PipelineSettings`]
pub const MIN_POOL_SIZE: usize = 3;
/// Smallest buffer capacity accepted from [`PipelineSettings`]
pub const MIN_BUFFER_CAPACITY: usize = 1000;

pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Sizing of a pipeline, taken verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
	/// Number of load units; at most `pool_size - 1` flushes run at once.
	/// A pool size of 1 flushes synchronously on the producer's thread.
	pub pool_size: usize,
	/// Rows per load unit
	pub buffer_capacity: usize,
	/// Applied to every backend call
	pub flush_timeout: Duration,
}

impl PipelineConfig {
	pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
		Self {
			pool_size,
			buffer_capacity,
			flush_timeout: DEFAULT_FLUSH_TIMEOUT,
		}
	}

	pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
		self.flush_timeout = flush_timeout;
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.pool_size == 0 {
			return_error!(ConfigError::InvalidPoolSize {
				pool_size: self.pool_size
			});
		}
		if self.buffer_capacity == 0 {
			return_error!(ConfigError::InvalidBufferCapacity {
				buffer_capacity: self.buffer_capacity
			});
		}
		Ok(())
	}
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self::new(num_cpus::get().max(MIN_POOL_SIZE), DEFAULT_BUFFER_CAPACITY)
	}
}

/// User-facing settings; missing fields take defaults and sizes are raised
/// to the enforced floors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
	pub pool_size: Option<usize>,
	pub buffer_capacity: Option<usize>,
	pub flush_timeout_ms: Option<u64>,
}

impl PipelineSettings {
	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(|e| {
			ConfigError::InvalidSettings {
				reason: e.to_string(),
			}
			.into()
		})
	}

	pub fn into_config(self) -> PipelineConfig {
		let defaults = PipelineConfig::default();
		PipelineConfig {
			pool_size: self.pool_size.unwrap_or(defaults.pool_size).max(MIN_POOL_SIZE),
			buffer_capacity: self.buffer_capacity.unwrap_or(defaults.buffer_capacity).max(MIN_BUFFER_CAPACITY),
			flush_timeout: self.flush_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.flush_timeout),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default() {
		let config = PipelineConfig::default();
		assert!(config.pool_size >= MIN_POOL_SIZE);
		assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
		assert_eq!(config.flush_timeout, DEFAULT_FLUSH_TIMEOUT);
	}

	#[test]
	fn test_validate() {
		assert!(PipelineConfig::new(1, 1).validate().is_ok());
		assert_eq!(PipelineConfig::new(0, 10).validate().unwrap_err().code(), "CONFIG_004");
		assert_eq!(PipelineConfig::new(3, 0).validate().unwrap_err().code(), "CONFIG_005");
	}

	#[test]
	fn test_settings_apply_floors() {
		let config = PipelineSettings::from_json(r#"{"pool_size": 1, "buffer_capacity": 10, "flush_timeout_ms": 250}"#)
			.unwrap()
			.into_config();

		assert_eq!(config.pool_size, MIN_POOL_SIZE);
		assert_eq!(config.buffer_capacity, MIN_BUFFER_CAPACITY);
		assert_eq!(config.flush_timeout, Duration::from_millis(250));
	}

	#[test]
	fn test_settings_keep_values_above_floor() {
		let config = PipelineSettings::from_json(r#"{"pool_size": 8, "buffer_capacity": 5000}"#).unwrap().into_config();

		assert_eq!(config.pool_size, 8);
		assert_eq!(config.buffer_capacity, 5000);
		assert_eq!(config.flush_timeout, DEFAULT_FLUSH_TIMEOUT);
	}

	#[test]
	fn test_empty_settings_use_defaults() {
		let config = PipelineSettings::from_json("{}").unwrap().into_config();
		assert_eq!(config, PipelineConfig::default());
	}

	#[test]
	fn test_unknown_field_rejected() {
		let err = PipelineSettings::from_json(r#"{"parallelism": 4}"#).unwrap_err();
		assert_eq!(err.code(), "CONFIG_006");
	}
}
