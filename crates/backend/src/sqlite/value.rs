// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use reifydb_bulk_type::Value;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// Borrowing adapter binding a staged value as a SQLite parameter.
pub(super) struct SqlValue<'a>(pub Option<&'a Value>);

impl ToSql for SqlValue<'_> {
	fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
		let value = match self.0 {
			None | Some(Value::Undefined) => ValueRef::Null,
			Some(Value::Boolean(v)) => ValueRef::Integer(*v as i64),
			Some(Value::Int4(v)) => ValueRef::Integer(*v as i64),
			Some(Value::Int8(v)) => ValueRef::Integer(*v),
			Some(Value::Float8(v)) => ValueRef::Real(*v),
			Some(Value::Utf8(v)) => ValueRef::Text(v.as_bytes()),
			Some(Value::Blob(v)) => ValueRef::Blob(v.as_slice()),
		};
		Ok(ToSqlOutput::Borrowed(value))
	}
}
