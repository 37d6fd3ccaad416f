// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use super::{BackendError, ConfigError, Diagnostic, IntoDiagnostic, PipelineError};

impl IntoDiagnostic for ConfigError {
	fn into_diagnostic(self) -> Diagnostic {
		let message = self.to_string();
		match self {
			ConfigError::ArityMismatch {
				expected,
				..
			} => Diagnostic {
				code: "CONFIG_001".to_string(),
				message,
				label: Some("row arity does not match the load target".to_string()),
				help: Some(format!("Post exactly {} values per row, in target column order", expected)),
				notes: vec!["The row was not staged".to_string()],
				cause: None,
			},
			ConfigError::TypeMismatch {
				expected,
				..
			} => Diagnostic {
				code: "CONFIG_002".to_string(),
				message,
				label: Some("value type does not match the parameter type".to_string()),
				help: Some(format!("Convert the value to {} or pass Undefined for a null", expected)),
				notes: vec![],
				cause: None,
			},
			ConfigError::InvalidTarget {
				..
			} => Diagnostic {
				code: "CONFIG_003".to_string(),
				message,
				label: None,
				help: Some(
					"A load target needs a non-empty name and at least one uniquely named column or parameter"
						.to_string(),
				),
				notes: vec![],
				cause: None,
			},
			ConfigError::InvalidPoolSize {
				..
			} => Diagnostic {
				code: "CONFIG_004".to_string(),
				message,
				label: None,
				help: Some("Use a pool size of 1 for synchronous flushing, or more for overlap".to_string()),
				notes: vec![],
				cause: None,
			},
			ConfigError::InvalidBufferCapacity {
				..
			} => Diagnostic {
				code: "CONFIG_005".to_string(),
				message,
				label: None,
				help: None,
				notes: vec![],
				cause: None,
			},
			ConfigError::InvalidSettings {
				..
			} => Diagnostic {
				code: "CONFIG_006".to_string(),
				message,
				label: None,
				help: Some("Expected fields: pool_size, buffer_capacity, flush_timeout_ms".to_string()),
				notes: vec![],
				cause: None,
			},
		}
	}
}

impl IntoDiagnostic for BackendError {
	fn into_diagnostic(self) -> Diagnostic {
		let message = self.to_string();
		let (code, label) = match &self {
			BackendError::ConnectionFailed {
				..
			} => ("BACKEND_001", "connection could not be opened"),
			BackendError::WriteFailed {
				..
			} => ("BACKEND_002", "batch was not written"),
			BackendError::CloseFailed {
				..
			} => ("BACKEND_003", "connection could not be closed cleanly"),
			BackendError::Timeout {
				..
			} => ("BACKEND_004", "backend call timed out"),
		};

		Diagnostic {
			code: code.to_string(),
			message,
			label: Some(label.to_string()),
			help: None,
			notes: vec!["Backend faults are not retried by the pipeline".to_string()],
			cause: None,
		}
	}
}

impl IntoDiagnostic for PipelineError {
	fn into_diagnostic(self) -> Diagnostic {
		let message = self.to_string();
		match self {
			PipelineError::Poisoned => Diagnostic {
				code: "PIPELINE_001".to_string(),
				message,
				label: None,
				help: Some("Close this pipeline and start a new one".to_string()),
				notes: vec!["A previous post, complete or close call reported a fault".to_string()],
				cause: None,
			},
			PipelineError::DrainTimeout {
				..
			} => Diagnostic {
				code: "PIPELINE_002".to_string(),
				message,
				label: Some("drain failure".to_string()),
				help: None,
				notes: vec!["A drain timeout is fatal; in-flight flushes cannot be cancelled".to_string()],
				cause: None,
			},
			PipelineError::FlushPanicked {
				..
			} => Diagnostic {
				code: "PIPELINE_003".to_string(),
				message,
				label: None,
				help: None,
				notes: vec![],
				cause: None,
			},
			PipelineError::WorkerPool {
				..
			} => Diagnostic {
				code: "PIPELINE_004".to_string(),
				message,
				label: None,
				help: None,
				notes: vec![],
				cause: None,
			},
			PipelineError::FreeQueueDisconnected => Diagnostic {
				code: "PIPELINE_005".to_string(),
				message,
				label: None,
				help: None,
				notes: vec![],
				cause: None,
			},
			PipelineError::Closed => Diagnostic {
				code: "PIPELINE_006".to_string(),
				message,
				label: None,
				help: None,
				notes: vec![],
				cause: None,
			},
		}
	}
}
