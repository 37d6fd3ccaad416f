// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Wraps a diagnostic (or anything converting into an [`Error`](crate::Error)) into `Err`
#[macro_export]
macro_rules! err {
	($err:expr) => {
		Err($crate::Error::from($err))
	};
}

/// Returns early with the given error
#[macro_export]
macro_rules! return_error {
	($err:expr) => {
		return Err($crate::Error::from($err))
	};
}

/// Creates an internal error with automatic source location capture
#[macro_export]
macro_rules! internal_error {
	($reason:expr) => {
		$crate::Error($crate::error::internal::internal_with_context($reason, file!(), line!(), column!()))
	};
	($fmt:expr, $($arg:tt)*) => {
		$crate::Error($crate::error::internal::internal_with_context(
			format!($fmt, $($arg)*),
			file!(),
			line!(),
			column!(),
		))
	};
}
