/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The engine-agnostic value representation that crosses the boundary
//! between the embedded script engine (`slothlet::script`) and the rest of
//! the loader. Keeping this boundary narrow means only one module needs to
//! know about the concrete scripting engine in use.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Result;

/// A callable export: the materialized form of a module's default function,
/// or of any function-valued named export. Not `Send`/`Sync` because the
/// underlying script engine is single-threaded (spec §5, §2 of SPEC_FULL).
pub trait Callable {
	fn call(&self, this: Value, args: &[Value]) -> Result<Value>;

	/// The function's own name as declared in source, prior to sanitization.
	/// Used by the decision engine's function-name preference rule (C4).
	fn declared_name(&self) -> &str;

	/// Installs the current scope's `self`/`context`/`reference` values into
	/// whatever execution environment this callable runs in, for callables
	/// that need an explicit install step (a loaded script module reads
	/// these as globals; a bare Rust closure has no such environment and
	/// keeps the default no-op). Called by the dispatch layer (C7) right
	/// before invoking the call.
	fn install_scope(&self, _self_value: &Value, _context: &Value, _reference: &Value) {}

	/// Escape hatch back to the concrete type, for callers that need to
	/// recognize a specific implementation (e.g. `slothlet::script` checking
	/// whether a `Value::Function` it's about to hand back to the engine is
	/// already backed by a `JsObject` from the same engine instance) through
	/// however many layers of hook-wrapping sit on top of it.
	fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Callable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Callable({})", self.declared_name())
	}
}

/// A materialized export value: the payload carried by API leaves, and by
/// the properties attached to callable nodes.
#[derive(Clone)]
pub enum Value {
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	Array(Rc<Vec<Value>>),
	Object(Rc<IndexMap<String, Value>>),
	Function(Rc<dyn Callable>),
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => write!(f, "undefined"),
			Value::Null => write!(f, "null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Number(n) => write!(f, "{n}"),
			Value::String(s) => write!(f, "{s:?}"),
			Value::Array(a) => f.debug_list().entries(a.iter()).finish(),
			Value::Object(o) => f.debug_map().entries(o.iter()).finish(),
			Value::Function(fun) => write!(f, "[Function: {}]", fun.declared_name()),
		}
	}
}

impl Value {
	pub fn is_function(&self) -> bool {
		matches!(self, Value::Function(_))
	}

	pub fn as_function(&self) -> Option<&Rc<dyn Callable>> {
		match self {
			Value::Function(f) => Some(f),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
		match self {
			Value::Object(o) => Some(o),
			_ => None,
		}
	}
}
