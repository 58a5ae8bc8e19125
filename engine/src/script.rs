/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Bridge to the embedded script engine. A module is evaluated as an ES
//! module through `boa_engine`; its exported bindings cross into
//! `slothlet_core::Value` here, and nothing downstream of this file knows
//! `boa_engine` exists.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use boa_engine::builtins::promise::PromiseState;
use boa_engine::module::SimpleModuleLoader;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsObject, JsResult, JsString, JsValue, Module, NativeFunction, Source};
use indexmap::IndexMap;
use slothlet_core::{Callable, SlothletError, Value};

/// The two ways a default export can classify, per C2's `defaultKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultKind {
	None,
	Function,
	Object,
}

/// Everything C2 needs out of one evaluated module: its default export (if
/// any), the shape that default took, and its other named exports in
/// declaration order.
pub struct LoadedModule {
	pub default: Option<Value>,
	pub default_kind: DefaultKind,
	/// Declaration order, excluding `default`.
	pub named: IndexMap<String, Value>,
	/// Best-effort textual heuristic (spec's `isCommonJs`): the module reads
	/// like a CommonJS file (assigns `module.exports`/`exports.x`) and
	/// declares no ESM `export` statements of its own. The embedded engine
	/// only executes ES modules, so a module that is genuinely CommonJS-only
	/// fails to evaluate; this flag exists for descriptor reporting on
	/// modules that mix patterns, not to execute CJS.
	pub is_common_js: bool,
}

/// One script engine per slothlet instance (§5 of SPEC_FULL.md): a single
/// `boa_engine::Context`, never shared across instances or threads.
pub struct ScriptEngine {
	context: Rc<RefCell<Context>>,
}

impl ScriptEngine {
	pub fn new(root: impl AsRef<Path>) -> Result<Self, SlothletError> {
		let loader = Rc::new(
			SimpleModuleLoader::new(root.as_ref())
				.map_err(|e| SlothletError::io(root.as_ref(), e))?,
		);
		let context = Context::builder()
			.module_loader(loader)
			.build()
			.map_err(|e| SlothletError::script(root.as_ref(), e.to_string()))?;
		Ok(ScriptEngine { context: Rc::new(RefCell::new(context)) })
	}

	/// Parses, links and evaluates `path`, returning its exports.
	pub fn load(&self, path: &Path) -> Result<LoadedModule, SlothletError> {
		let text = std::fs::read_to_string(path).map_err(|e| SlothletError::io(path, e))?;
		let named_names = scan_named_exports(&text);
		let is_common_js = looks_like_common_js(&text);

		let mut context = self.context.borrow_mut();
		let source = Source::from_bytes(text.as_bytes()).with_path(path);
		let module = Module::parse(source, None, &mut context)
			.map_err(|e| SlothletError::script(path, e.to_string()))?;

		let promise = module.load_link_evaluate(&mut context);
		context.run_jobs();

		match promise.state() {
			PromiseState::Pending => Err(SlothletError::script(path, "module evaluation did not settle")),
			PromiseState::Rejected(reason) => Err(SlothletError::script(path, reason.display().to_string())),
			PromiseState::Fulfilled(_) => {
				let namespace = module.namespace(&mut context);

				let default_js = get_property(&namespace, "default", &mut context, path)?;
				let (default, default_kind) = if default_js.is_undefined() {
					(None, DefaultKind::None)
				} else if let Some(callable) = default_js.as_callable().cloned() {
					(Some(self.wrap_function(callable, "default")), DefaultKind::Function)
				} else {
					(Some(self.to_data_value(&default_js, &mut context, path)?), DefaultKind::Object)
				};

				let mut named = IndexMap::new();
				for name in named_names {
					let js_value = get_property(&namespace, &name, &mut context, path)?;
					let value = if let Some(callable) = js_value.as_callable().cloned() {
						self.wrap_function(callable, &name)
					} else {
						self.to_data_value(&js_value, &mut context, path)?
					};
					named.insert(name, value);
				}

				Ok(LoadedModule { default, default_kind, named, is_common_js })
			}
		}
	}

	fn wrap_function(&self, object: JsObject, declared_name: &str) -> Value {
		Value::Function(Rc::new(JsFunctionHandle {
			object,
			context: Rc::clone(&self.context),
			declared_name: declared_name.to_string(),
		}))
	}

	/// Converts a non-callable export to a `Value`. Plain data (primitives,
	/// arrays) goes through the engine's own JSON serializer; a plain object
	/// is walked property-by-property instead, since `to_json` drops any
	/// property whose value is itself a function (matching real
	/// `JSON.stringify` semantics), which would otherwise silently erase
	/// nested helpers like `export const math = { add, multiply }`.
	fn to_data_value(&self, js: &JsValue, context: &mut Context, path: &Path) -> Result<Value, SlothletError> {
		self.value_from_js(js, "anonymous", context, path)
	}

	fn value_from_js(&self, js: &JsValue, name_hint: &str, context: &mut Context, path: &Path) -> Result<Value, SlothletError> {
		if js.is_undefined() {
			return Ok(Value::Undefined);
		}
		if let Some(callable) = js.as_callable().cloned() {
			return Ok(self.wrap_function(callable, name_hint));
		}
		let is_array = js.is_array().map_err(|e| SlothletError::script(path, e.to_string()))?;
		if !is_array {
			if let Some(object) = js.as_object().cloned() {
				let keys = enumerable_keys(&object, context, path)?;
				let mut out = IndexMap::new();
				for key in keys {
					let value = object.get(JsString::from(key.as_str()), context).map_err(|e| SlothletError::script(path, e.to_string()))?;
					out.insert(key.clone(), self.value_from_js(&value, &key, context, path)?);
				}
				return Ok(Value::Object(Rc::new(out)));
			}
		}
		let json = js.to_json(context).map_err(|e| SlothletError::script(path, e.to_string()))?;
		Ok(json_to_value(json))
	}
}

/// Lists `object`'s own enumerable string keys via `Object.keys`, stashing it
/// under a scratch global rather than reaching for `boa_engine`'s internal
/// own-property-enumeration APIs. The resulting key array holds only strings,
/// so running it back through `to_json` is safe even though the object
/// itself might not be (it may hold functions).
fn enumerable_keys(object: &JsObject, context: &mut Context, path: &Path) -> Result<Vec<String>, SlothletError> {
	let attr = Attribute::WRITABLE | Attribute::NON_ENUMERABLE | Attribute::CONFIGURABLE;
	context
		.register_global_property(js_string!("__slothlet_enum_tmp__"), JsValue::from(object.clone()), attr)
		.map_err(|e| SlothletError::script(path, e.to_string()))?;
	let keys_js = context
		.eval(Source::from_bytes(b"Object.keys(__slothlet_enum_tmp__)"))
		.map_err(|e| SlothletError::script(path, e.to_string()))?;
	let json = keys_js.to_json(context).map_err(|e| SlothletError::script(path, e.to_string()))?;
	match json {
		serde_json::Value::Array(items) => Ok(items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect()),
		_ => Ok(Vec::new()),
	}
}

fn get_property(object: &JsObject, name: &str, context: &mut Context, path: &Path) -> Result<JsValue, SlothletError> {
	object.get(JsString::from(name), context).map_err(|e| SlothletError::script(path, e.to_string()))
}

fn json_to_value(json: serde_json::Value) -> Value {
	match json {
		serde_json::Value::Null => Value::Null,
		serde_json::Value::Bool(b) => Value::Bool(b),
		serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
		serde_json::Value::String(s) => Value::String(Rc::from(s.as_str())),
		serde_json::Value::Array(items) => Value::Array(Rc::new(items.into_iter().map(json_to_value).collect())),
		serde_json::Value::Object(map) => {
			let mut out = IndexMap::new();
			for (k, v) in map {
				out.insert(k, json_to_value(v));
			}
			Value::Object(Rc::new(out))
		}
	}
}

/// A JS function captured at module-evaluation time. Holds the instance's
/// shared context so a call can happen later, from whatever API path the
/// orchestrator's hook pipeline eventually dispatches through.
struct JsFunctionHandle {
	object: JsObject,
	context: Rc<RefCell<Context>>,
	declared_name: String,
}

impl Callable for JsFunctionHandle {
	fn call(&self, this: Value, args: &[Value]) -> slothlet_core::Result<Value> {
		let mut context = self.context.borrow_mut();
		let js_this = value_to_js(&this, &mut context);
		let js_args: Vec<JsValue> = args.iter().map(|a| value_to_js(a, &mut context)).collect();

		let result: JsResult<JsValue> = self.object.call(&js_this, &js_args, &mut context);
		match result {
			Ok(value) => {
				if value.is_undefined() {
					Ok(Value::Undefined)
				} else if let Some(callable) = value.as_callable().cloned() {
					Ok(Value::Function(Rc::new(JsFunctionHandle {
						object: callable,
						context: Rc::clone(&self.context),
						declared_name: self.declared_name.clone(),
					})))
				} else {
					let json = value
						.to_json(&mut context)
						.map_err(|e| SlothletError::script(PathBuf::from(&self.declared_name), e.to_string()))?;
					Ok(json_to_value(json))
				}
			}
			Err(e) => Err(SlothletError::script(PathBuf::from(&self.declared_name), e.to_string())),
		}
	}

	fn declared_name(&self) -> &str {
		&self.declared_name
	}

	/// Installs `self`/`context`/`reference` as globals on this module's
	/// shared context, read fresh by the engine's module tree on every
	/// dispatched call (§4.7). A nested function reachable through `self`
	/// installs as the same live `JsObject` it already is (see
	/// `function_to_js`), so `self.math.add(a, b)` calls the real function
	/// rather than reading `undefined`.
	fn install_scope(&self, self_value: &Value, context_value: &Value, reference_value: &Value) {
		let mut context = self.context.borrow_mut();
		let self_js = value_to_js(self_value, &mut context);
		let context_js = value_to_js(context_value, &mut context);
		let reference_js = value_to_js(reference_value, &mut context);
		let attr = Attribute::WRITABLE | Attribute::NON_ENUMERABLE | Attribute::CONFIGURABLE;
		let _ = context.register_global_property(js_string!("self"), self_js, attr);
		let _ = context.register_global_property(js_string!("context"), context_js, attr);
		let _ = context.register_global_property(js_string!("reference"), reference_js, attr);
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

/// Converts a `slothlet_core::Value` back into a `JsValue` for a call's
/// receiver/arguments, or for installing `self`/`context`/`reference` as
/// globals. A bare function goes through `function_to_js`; an object or
/// array that nests one anywhere inside it (the common case for `self`,
/// whose snapshot is a whole namespace tree) is rebuilt property-by-property
/// so those nested functions stay callable. Everything else is re-hydrated
/// by evaluating its JSON rendering as a parenthesized expression,
/// sidestepping the need for a bespoke per-variant JS value constructor.
fn value_to_js(value: &Value, context: &mut Context) -> JsValue {
	match value {
		Value::Function(call) => function_to_js(call, context),
		Value::Array(items) if contains_function(value) => {
			let converted: Vec<JsValue> = items.iter().map(|v| value_to_js(v, context)).collect();
			boa_engine::builtins::array::Array::create_array_from_list(converted, context).into()
		}
		Value::Object(map) if contains_function(value) => {
			let converted: Vec<(String, JsValue)> = map.iter().map(|(k, v)| (k.clone(), value_to_js(v, context))).collect();
			let empty = context.eval(Source::from_bytes(b"({})")).unwrap_or_else(|_| JsValue::undefined());
			if let Some(object) = empty.as_object().cloned() {
				for (key, js_value) in converted {
					let _ = object.set(js_string!(key.as_str()), js_value, false, context);
				}
				object.into()
			} else {
				JsValue::undefined()
			}
		}
		other => {
			let json = value_to_json(other);
			let text = format!("({json})");
			context.eval(Source::from_bytes(text.as_bytes())).unwrap_or_else(|_| JsValue::undefined())
		}
	}
}

/// Whether `value` holds a function anywhere inside it. Drives `value_to_js`'s
/// choice between the fast JSON-round-trip path (no functions, the common
/// case for plain data) and rebuilding the object property-by-property (a
/// namespace snapshot like `self`, which routinely nests callables).
fn contains_function(value: &Value) -> bool {
	match value {
		Value::Function(_) => true,
		Value::Array(items) => items.iter().any(contains_function),
		Value::Object(map) => map.values().any(contains_function),
		_ => false,
	}
}

/// Reconstitutes a `Callable` as a JS value a script can call. A callable
/// that already wraps a `JsObject` from this same engine (however many
/// `HookedCallable` layers sit on top of it, per `Callable::as_any`'s
/// delegation) is installed as that same object directly, so calling it from
/// script never re-enters `JsFunctionHandle::call` and never double-borrows
/// the shared `Context`. A genuinely foreign `Callable` (a Rust closure with
/// no underlying `JsObject`) is bridged through a `NativeFunction` instead.
fn function_to_js(call: &Rc<dyn Callable>, context: &mut Context) -> JsValue {
	if let Some(handle) = call.as_any().downcast_ref::<JsFunctionHandle>() {
		return JsValue::from(handle.object.clone());
	}

	let name = call.declared_name().to_string();
	let bridged = Rc::clone(call);
	// SAFETY: the closure only captures `Rc`/owned data and never unwinds
	// across the FFI boundary that `NativeFunction::from_closure` requires
	// callers to uphold; `Callable::call` returns a `Result` rather than
	// panicking on ordinary script errors.
	let native = unsafe {
		NativeFunction::from_closure(move |this, args, context| {
			let this_value = js_to_value(this, context);
			let arg_values: Vec<Value> = args.iter().map(|a| js_to_value(a, context)).collect();
			match bridged.call(this_value, &arg_values) {
				Ok(result) => Ok(value_to_js(&result, context)),
				Err(e) => Err(boa_engine::JsNativeError::typ().with_message(e.to_string()).into()),
			}
		})
	};
	FunctionObjectBuilder::new(context, native).name(js_string!(name.as_str())).length(0).build().into()
}

/// Converts a `JsValue` back into a `slothlet_core::Value` for a foreign
/// callable's incoming receiver/arguments. Functions passed in this
/// direction aren't reconstituted (nothing in the loader hands a bridged
/// callable's arguments back into script), so they collapse to `Undefined`
/// like any other non-JSON-representable value.
fn js_to_value(js: &JsValue, context: &mut Context) -> Value {
	if js.is_undefined() || js.as_callable().is_some() {
		return Value::Undefined;
	}
	js.to_json(context).map(json_to_value).unwrap_or(Value::Undefined)
}

fn value_to_json(value: &Value) -> serde_json::Value {
	match value {
		Value::Undefined | Value::Function(_) => serde_json::Value::Null,
		Value::Null => serde_json::Value::Null,
		Value::Bool(b) => serde_json::Value::Bool(*b),
		Value::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
		Value::String(s) => serde_json::Value::String(s.to_string()),
		Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
		Value::Object(map) => {
			let mut out = serde_json::Map::new();
			for (k, v) in map.iter() {
				out.insert(k.clone(), value_to_json(v));
			}
			serde_json::Value::Object(out)
		}
	}
}

/// Hand-rolled textual scan for a module's named `export` identifiers
/// (everything but `default`, which is always probed directly through the
/// namespace object instead). Deliberately not built on `boa_ast`'s
/// `ExportDeclaration` shapes: good enough to find identifiers declared at
/// statement level, which is how every fixture module in this tree is
/// written; doesn't attempt to parse re-exports split across multiple lines
/// or exports inside template literals.
fn scan_named_exports(source: &str) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut names = Vec::new();

	for raw_line in source.lines() {
		let line = strip_line_comment(raw_line).trim();
		let Some(rest) = line.strip_prefix("export") else {
			continue;
		};
		let rest = rest.trim_start();
		if rest.starts_with("default") {
			continue;
		}

		if let Some(body) = rest.strip_prefix('{') {
			let end = body.find('}').unwrap_or(body.len());
			for item in body[..end].split(',') {
				let item = item.trim();
				if item.is_empty() {
					continue;
				}
				let exported_name = item.rsplit("as").next().unwrap_or(item).trim();
				push_unique(&mut names, &mut seen, exported_name);
			}
			continue;
		}

		let rest = rest.strip_prefix("async").map(str::trim_start).unwrap_or(rest);
		for keyword in ["function*", "function", "class", "const", "let", "var"] {
			if let Some(after) = rest.strip_prefix(keyword) {
				let after = after.trim_start();
				let name: String = after.chars().take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$').collect();
				if !name.is_empty() {
					push_unique(&mut names, &mut seen, &name);
				}
				break;
			}
		}
	}

	names
}

fn push_unique(names: &mut Vec<String>, seen: &mut HashSet<String>, name: &str) {
	if seen.insert(name.to_string()) {
		names.push(name.to_string());
	}
}

fn strip_line_comment(line: &str) -> &str {
	match line.find("//") {
		Some(idx) => &line[..idx],
		None => line,
	}
}

/// Best-effort CJS heuristic: assigns to `module.exports`/`exports.x` and
/// declares no ESM `export` keyword of its own.
fn looks_like_common_js(source: &str) -> bool {
	let has_esm_export = source.lines().any(|l| strip_line_comment(l).trim_start().starts_with("export"));
	if has_esm_export {
		return false;
	}
	source.contains("module.exports") || source.contains("exports.")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scans_mixed_export_forms() {
		let source = r#"
			export const add = (a, b) => a + b;
			export function subtract(a, b) { return a - b; }
			export class Thing {}
			export { add as renamedAdd, subtract };
			// export const ignored = 1;
		"#;
		let names = scan_named_exports(source);
		assert_eq!(names, vec!["add", "subtract", "Thing", "renamedAdd"]);
	}

	#[test]
	fn default_is_skipped_by_the_textual_scan() {
		let names = scan_named_exports("export default function greet() {}\nexport const shout = 1;");
		assert_eq!(names, vec!["shout"]);
	}

	#[test]
	fn detects_common_js_shape() {
		assert!(looks_like_common_js("module.exports = { add: (a, b) => a + b };"));
		assert!(!looks_like_common_js("export const add = (a, b) => a + b;"));
	}
}
