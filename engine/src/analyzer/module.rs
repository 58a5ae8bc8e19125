/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Module analyzer (C2): loads one source file and classifies its exports.

use std::path::Path;

use indexmap::IndexMap;
use slothlet_core::{sanitize, Result, SanitizeOptions, Value};

use crate::script::{DefaultKind, ScriptEngine};

/// The output of analyzing a single source module.
pub struct ModuleDescriptor {
	pub default_kind: DefaultKind,
	pub default: Option<Value>,
	/// Declaration order, matching source casing.
	pub named_exports: IndexMap<String, Value>,
	pub is_common_js: bool,
	/// True iff exactly one named export's sanitized identifier equals
	/// `file_key`. Such modules are never flattened by rule 1 of C4 -
	/// except when their containing directory collapses via C3's
	/// `flattenSingle` (see `crate::decision`'s resolution note).
	pub self_referential: bool,
	/// True iff `default_kind == Function` and at least one named export
	/// exists: the materialized node must invoke the default and expose
	/// the named exports as properties.
	pub should_wrap_as_callable: bool,
	pub file_key: String,
}

/// Runs C2 over `path`, producing its [`ModuleDescriptor`].
pub fn analyze_module(engine: &ScriptEngine, path: &Path, opts: &SanitizeOptions) -> Result<ModuleDescriptor> {
	tracing::debug!(path = %path.display(), "analyzing module");

	let loaded = engine.load(path)?;
	let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
	let file_key = sanitize(stem, opts);

	let self_referential =
		loaded.named.len() == 1 && loaded.named.keys().next().map(|k| sanitize(k, opts)) == Some(file_key.clone());

	let should_wrap_as_callable = loaded.default_kind == DefaultKind::Function && !loaded.named.is_empty();

	let default = if loaded.default_kind == DefaultKind::Object {
		merge_named_into_object(loaded.default, &loaded.named)
	} else {
		loaded.default
	};

	tracing::trace!(
		path = %path.display(),
		file_key,
		self_referential,
		should_wrap_as_callable,
		is_common_js = loaded.is_common_js,
		"module analyzed"
	);

	Ok(ModuleDescriptor {
		default_kind: loaded.default_kind,
		default,
		named_exports: loaded.named,
		is_common_js: loaded.is_common_js,
		self_referential,
		should_wrap_as_callable,
		file_key,
	})
}

/// C2's rule: "if the default export is a plain object and there are no
/// conflicting named exports, merge named exports into the object (named
/// wins on conflict)".
fn merge_named_into_object(default: Option<Value>, named: &IndexMap<String, Value>) -> Option<Value> {
	let Some(Value::Object(obj)) = default else {
		return default;
	};
	let mut merged = (*obj).clone();
	for (key, value) in named {
		merged.insert(key.clone(), value.clone());
	}
	Some(Value::Object(std::rc::Rc::new(merged)))
}
