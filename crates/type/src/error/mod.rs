// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{Display, Formatter},
	ops::{Deref, DerefMut},
	time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::value::Type;

mod diagnostic;
pub mod internal;
mod r#macro;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
	pub code: String,
	pub message: String,
	pub label: Option<String>,
	pub help: Option<String>,
	pub notes: Vec<String>,
	pub cause: Option<Box<Diagnostic>>,
}

impl Diagnostic {
	pub fn with_cause(mut self, cause: Diagnostic) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}
}

impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)?;
		if let Some(label) = &self.label {
			write!(f, " ({})", label)?;
		}
		if let Some(help) = &self.help {
			write!(f, "\n  help: {}", help)?;
		}
		for note in &self.notes {
			write!(f, "\n  note: {}", note)?;
		}
		if let Some(cause) = &self.cause {
			write!(f, "\n  caused by: {}", cause)?;
		}
		Ok(())
	}
}

pub trait IntoDiagnostic {
	fn into_diagnostic(self) -> Diagnostic;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Error(pub Diagnostic);

impl Deref for Error {
	type Target = Diagnostic;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for Error {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl Error {
	pub fn diagnostic(self) -> Diagnostic {
		self.0
	}

	pub fn code(&self) -> &str {
		&self.0.code
	}
}

impl std::error::Error for Error {}

/// Faults in how the pipeline or a posted row is set up.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Row has {actual} values but the load unit expects {expected}")]
	ArityMismatch {
		expected: usize,
		actual: usize,
	},

	#[error("Parameter '{param}' is declared {expected} but received {actual}")]
	TypeMismatch {
		param: String,
		expected: Type,
		actual: Type,
	},

	#[error("Invalid load target '{target}': {reason}")]
	InvalidTarget {
		target: String,
		reason: String,
	},

	#[error("Pool size must be at least 1, got {pool_size}")]
	InvalidPoolSize {
		pool_size: usize,
	},

	#[error("Buffer capacity must be at least 1, got {buffer_capacity}")]
	InvalidBufferCapacity {
		buffer_capacity: usize,
	},

	#[error("Invalid pipeline settings: {reason}")]
	InvalidSettings {
		reason: String,
	},
}

/// Faults raised by the backend driver while talking to the database.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	#[error("Failed to connect to {target}: {reason}")]
	ConnectionFailed {
		target: String,
		reason: String,
	},

	#[error("Bulk write to {target} failed: {reason}")]
	WriteFailed {
		target: String,
		reason: String,
	},

	#[error("Failed to close connection to {target}: {reason}")]
	CloseFailed {
		target: String,
		reason: String,
	},

	#[error("Backend call on {target} exceeded {timeout:?}")]
	Timeout {
		target: String,
		timeout: Duration,
	},
}

/// Faults of the pipeline machinery itself.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
	#[error("Pipeline is poisoned by an earlier fault")]
	Poisoned,

	#[error("Pipeline did not drain within {timeout:?}, {in_flight} flushes still in flight")]
	DrainTimeout {
		timeout: Duration,
		in_flight: usize,
	},

	#[error("Background flush panicked: {message}")]
	FlushPanicked {
		message: String,
	},

	#[error("Failed to start flush workers: {reason}")]
	WorkerPool {
		reason: String,
	},

	#[error("Free unit queue disconnected")]
	FreeQueueDisconnected,

	#[error("Pipeline is closed")]
	Closed,
}

impl From<Diagnostic> for Error {
	fn from(diagnostic: Diagnostic) -> Self {
		Error(diagnostic)
	}
}

impl From<ConfigError> for Error {
	fn from(err: ConfigError) -> Self {
		Error(err.into_diagnostic())
	}
}

impl From<BackendError> for Error {
	fn from(err: BackendError) -> Self {
		Error(err.into_diagnostic())
	}
}

impl From<PipelineError> for Error {
	fn from(err: PipelineError) -> Self {
		Error(err.into_diagnostic())
	}
}
