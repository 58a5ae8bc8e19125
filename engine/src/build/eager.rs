/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Eager builder (C5): walks the whole tree depth-first at build time.

use std::path::Path;
use std::rc::Rc;

use slothlet_core::{ApiNode, HookManager, Namespace, NodeKind, Result, SanitizeOptions};

use crate::analyzer::{analyze_module, scan_directory};
use crate::build::{join_path, node_is_empty, place_module_with_decision, place_subdir, sanitized_key};
use crate::dispatch::DispatchContext;
use crate::script::{DefaultKind, ScriptEngine};

/// Runs C5 over `root`, producing the whole API tree up front.
pub fn build(
	engine: &ScriptEngine, root: &Path, opts: &SanitizeOptions, hooks: &HookManager, ctx: &Rc<DispatchContext>, api_depth: Option<usize>,
) -> Result<ApiNode> {
	let kind = build_contents(engine, root, opts, true, hooks, "", ctx, 0, api_depth)?;
	Ok(ApiNode::ready(kind, "", "directory"))
}

/// The directory-walking core of C5, also reused by `addApi` (C9) to build
/// a standalone subtree that gets merged into an existing instance's root.
/// `depth` counts directories already crossed (0 at `root`); subdirectories
/// beyond `api_depth` are scanned for their own shape but not descended
/// into, so a too-deep directory simply doesn't appear in the tree.
#[allow(clippy::too_many_arguments)]
pub fn build_contents(
	engine: &ScriptEngine, dir: &Path, opts: &SanitizeOptions, is_root: bool, hooks: &HookManager, path_prefix: &str,
	ctx: &Rc<DispatchContext>, depth: usize, api_depth: Option<usize>,
) -> Result<NodeKind> {
	let mut directory = scan_directory(dir, opts)?;

	let modules = directory.module_files.iter().map(|file| analyze_module(engine, file, opts)).collect::<Result<Vec<_>>>()?;
	directory.multi_default = modules.iter().filter(|m| m.default_kind != DefaultKind::None).count() >= 2;

	let mut namespace = Namespace::new();
	let mut root_slot = None;

	for module in &modules {
		if let Some(kind) = place_module_with_decision(&mut namespace, &mut root_slot, module, &directory, is_root, path_prefix, ctx, opts)? {
			// Placement::CollapseDirectory: this single module IS the directory.
			return Ok(kind);
		}
	}

	let depth_exhausted = api_depth.is_some_and(|limit| depth >= limit);
	if !depth_exhausted {
		for sub_dir in &directory.sub_dirs {
			let key = sanitized_key(sub_dir, opts);
			let child_path = join_path(path_prefix, &key);
			let child_kind = build_contents(engine, sub_dir, opts, false, hooks, &child_path, ctx, depth + 1, api_depth)?;
			let child_is_empty = node_is_empty(&child_kind);
			let child_node = ApiNode::ready(child_kind, child_path, "directory");
			place_subdir(&mut namespace, key, child_node, child_is_empty, hooks, path_prefix);
		}
	}

	if let Some((call, mut properties)) = root_slot {
		for (key, node) in namespace {
			properties.entry(key).or_insert(node);
		}
		return Ok(NodeKind::Callable { call, properties });
	}

	Ok(NodeKind::Namespace(namespace))
}
