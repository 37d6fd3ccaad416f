// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{env, fs, path::Path};

use uuid::Uuid;

/// Runs `f` with a fresh directory that is removed afterwards.
pub fn temp_dir<F, R>(f: F) -> R
where
	F: FnOnce(&Path) -> R,
{
	let mut path = env::temp_dir();
	path.push(format!("reifydb-bulk-{}", Uuid::new_v4()));

	fs::create_dir(&path).expect("failed to create temp dir");
	let result = f(&path);

	let _ = fs::remove_dir_all(&path);
	result
}
