/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Shared placement logic for the eager (C5) and lazy (C6) builders: both
//! run C3 + C2 + C4 over one directory's immediate entries and differ only
//! in how a subdirectory's own node comes into being (recurse now, or defer
//! behind a [`Materializer`](slothlet_core::Materializer)). Every callable
//! a module contributes is wrapped through [`crate::dispatch`] at the point
//! it's placed, so eager and lazy nodes go through the hook pipeline
//! identically.

pub mod eager;
pub mod lazy;

use std::path::Path;
use std::rc::Rc;

use slothlet_core::{ApiNode, Callable, CollisionWarning, HookManager, Namespace, NodeKind, SlothletError, Value};

use crate::analyzer::{DirectoryDescriptor, ModuleDescriptor};
use crate::decision::{decide, preferred_key, Placement};
use crate::dispatch::{wrap_callable, DispatchContext};
use crate::script::DefaultKind;

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
	if prefix.is_empty() {
		key.to_string()
	} else {
		format!("{prefix}.{key}")
	}
}

pub(crate) fn value_to_node(value: Value, path: &str, ctx: &Rc<DispatchContext>) -> ApiNode {
	match value {
		Value::Function(call) => {
			let wrapped = wrap_callable(call, path.to_string(), Rc::clone(ctx));
			ApiNode::ready(NodeKind::Callable { call: wrapped, properties: Namespace::new() }, path.to_string(), "function")
		}
		other => ApiNode::ready(NodeKind::Leaf(other), path.to_string(), "value"),
	}
}

fn default_function_callable(module: &ModuleDescriptor, path: &str) -> Result<Rc<dyn Callable>, SlothletError> {
	module
		.default
		.as_ref()
		.and_then(Value::as_function)
		.cloned()
		.ok_or_else(|| SlothletError::Decision { path: path.to_string(), reason: "default export is not callable".to_string() })
}

/// Builds the `NodeKind` for a single module whose placement is
/// [`Placement::Namespace`] or [`Placement::Root`] (both preserve the
/// module's own shape rather than replacing it with one export's value).
fn module_to_node_kind(module: &ModuleDescriptor, path: &str, ctx: &Rc<DispatchContext>) -> Result<NodeKind, SlothletError> {
	match module.default_kind {
		DefaultKind::Function => {
			let call = default_function_callable(module, path)?;
			let wrapped = wrap_callable(call, path.to_string(), Rc::clone(ctx));
			let mut properties = Namespace::new();
			for (key, value) in &module.named_exports {
				properties.insert(key.clone(), value_to_node(value.clone(), &join_path(path, key), ctx));
			}
			Ok(NodeKind::Callable { call: wrapped, properties })
		}
		DefaultKind::Object => Ok(NodeKind::Leaf(module.default.clone().unwrap_or(Value::Undefined))),
		DefaultKind::None => {
			let mut namespace = Namespace::new();
			for (key, value) in &module.named_exports {
				namespace.insert(key.clone(), value_to_node(value.clone(), &join_path(path, key), ctx));
			}
			Ok(NodeKind::Namespace(namespace))
		}
	}
}

/// Runs C2's output through C4 and writes the result into `namespace`
/// (modules only; subdirectory placement is the caller's responsibility,
/// since only the caller knows whether to recurse eagerly or defer).
pub(crate) fn place_module_with_decision(
	namespace: &mut Namespace, root_slot: &mut Option<(Rc<dyn Callable>, Namespace)>, module: &ModuleDescriptor,
	directory: &DirectoryDescriptor, is_root: bool, path_prefix: &str, ctx: &Rc<DispatchContext>, opts: &slothlet_core::SanitizeOptions,
) -> Result<Option<NodeKind>, SlothletError> {
	let decision = decide(module, directory, is_root);
	let module_path = join_path(path_prefix, &module.file_key);

	match decision.placement {
		Placement::Root => {
			let call = default_function_callable(module, &module_path)?;
			let wrapped = wrap_callable(call, String::new(), Rc::clone(ctx));
			let mut properties = Namespace::new();
			for (key, value) in &module.named_exports {
				properties.insert(key.clone(), value_to_node(value.clone(), &join_path(path_prefix, key), ctx));
			}
			*root_slot = Some((wrapped, properties));
			Ok(None)
		}
		Placement::CollapseDirectory => Ok(Some(module_to_node_kind(module, path_prefix, ctx)?)),
		Placement::ReplaceAtFileKey => {
			let value = module.named_exports.values().next().cloned().unwrap_or(Value::Undefined);
			let declared_name = value.as_function().map(|f| f.declared_name());
			let key = preferred_key(&module.file_key, declared_name, opts);
			let path = join_path(path_prefix, &key);
			namespace.insert(key, value_to_node(value, &path, ctx));
			Ok(None)
		}
		Placement::LiftNamedToCategory => {
			for (key, value) in &module.named_exports {
				let child_path = join_path(path_prefix, key);
				namespace.insert(key.clone(), value_to_node(value.clone(), &child_path, ctx));
			}
			Ok(None)
		}
		Placement::Namespace => {
			let kind = module_to_node_kind(module, &module_path, ctx)?;
			let declared_name = if module.default_kind == DefaultKind::Function {
				module.default.as_ref().and_then(Value::as_function).map(|f| f.declared_name())
			} else {
				None
			};
			let key = preferred_key(&module.file_key, declared_name, opts);
			let path = join_path(path_prefix, &key);
			namespace.insert(key, ApiNode::ready(kind, path, "module"));
			Ok(None)
		}
	}
}

/// Inserts `child` (a subdirectory's node, however it was produced) into
/// `namespace` at `key`, applying C5's collision rule: a module export
/// already at `key` wins unless the subdirectory is non-empty, in which
/// case the directory wins and the export is dropped with a warning
/// through the hook manager's `error` channel.
pub(crate) fn place_subdir(namespace: &mut Namespace, key: String, child: ApiNode, child_is_empty: bool, hooks: &HookManager, path_prefix: &str) {
	if namespace.contains_key(&key) {
		if child_is_empty {
			return;
		}
		let warning = CollisionWarning::KeyShadowed { path: path_prefix.to_string(), key: key.clone() };
		hooks.publish_error(path_prefix, &warning.to_string(), "build");
		namespace.insert(key, child);
	} else {
		namespace.insert(key, child);
	}
}

pub(crate) fn node_is_empty(kind: &NodeKind) -> bool {
	matches!(kind, NodeKind::Namespace(ns) if ns.is_empty())
}

pub(crate) fn sanitized_key(path: &Path, opts: &slothlet_core::SanitizeOptions) -> String {
	path.file_name().and_then(|n| n.to_str()).map(|name| slothlet_core::sanitize(name, opts)).unwrap_or_default()
}
