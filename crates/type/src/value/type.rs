// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// All value types a load unit can stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
	/// Value is not defined (think null in common programming languages)
	Undefined,
	Boolean,
	Int4,
	Int8,
	Float8,
	Utf8,
	Blob,
}

impl Type {
	/// Whether a value of type `other` can be bound where `self` is declared.
	///
	/// `Undefined` binds everywhere, and `Int4` widens into `Int8`.
	pub fn accepts(&self, other: Type) -> bool {
		match (self, other) {
			(_, Type::Undefined) => true,
			(Type::Int8, Type::Int4) => true,
			(lhs, rhs) => *lhs == rhs,
		}
	}
}

impl Display for Type {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Type::Undefined => f.write_str("UNDEFINED"),
			Type::Boolean => f.write_str("BOOL"),
			Type::Int4 => f.write_str("INT4"),
			Type::Int8 => f.write_str("INT8"),
			Type::Float8 => f.write_str("FLOAT8"),
			Type::Utf8 => f.write_str("UTF8"),
			Type::Blob => f.write_str("BLOB"),
		}
	}
}

pub trait GetType {
	fn get_type(&self) -> Type;
}
