// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

pub mod error;
pub mod value;

pub use error::{BackendError, ConfigError, Diagnostic, Error, IntoDiagnostic, PipelineError};
pub use value::{GetType, Type, Value};

pub type Result<T> = std::result::Result<T, Error>;
