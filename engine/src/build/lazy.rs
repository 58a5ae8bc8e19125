/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Lazy builder (C6): the root directory's own shape (callable vs
//! namespace) is resolved immediately, since `create()` must hand back a
//! function or a namespace synchronously (spec.md §4.10). Everything below
//! that is deferred one directory at a time: a subdirectory's node is a
//! [`Materializer`] that, on first access, loads that directory's own
//! module files and produces its concrete contents, in turn handing back
//! further deferred subdirectory proxies.
//!
//! C4's multi-default rule needs every sibling module's `defaultKind`
//! before any one of them can be placed, so laziness can't be finer than
//! "one directory's immediate modules materialize together" without
//! re-deriving that context some other way. This builder treats the
//! directory as C6's materialization boundary rather than the individual
//! module (documented in DESIGN.md).

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::rc::Rc;

use slothlet_core::{ApiNode, HookManager, Materializer, Namespace, NodeKind, Result, SanitizeOptions, SlothletError};

use crate::analyzer::{analyze_module, scan_directory};
use crate::build::{join_path, place_module_with_decision, place_subdir, sanitized_key};
use crate::dispatch::DispatchContext;
use crate::script::{DefaultKind, ScriptEngine};

/// Runs C6 over `root`: resolves the root directory's shape now, defers
/// every subdirectory behind a proxy node.
pub fn build(
	engine: &Rc<ScriptEngine>, root: &Path, opts: &SanitizeOptions, hooks: &Rc<HookManager>, ctx: &Rc<DispatchContext>, api_depth: Option<usize>,
) -> Result<ApiNode> {
	let kind = build_directory_contents(engine, root, opts, true, hooks, "", ctx, 0, api_depth)?;
	Ok(ApiNode::ready(kind, "", "directory"))
}

/// Builds one directory's own modules now (C2/C4 must see every sibling to
/// decide `multiDefault`), but hands subdirectories back as pending proxies.
/// Also reused directly by the orchestrator's `reload()`, which needs a bare
/// `NodeKind` to rebind into an existing root `ApiNode` rather than a fresh
/// top-level node. `depth` counts directories already crossed (0 at the
/// root); a subdirectory beyond `api_depth` is never even handed back as a
/// pending proxy, so it doesn't appear in the tree at all.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_directory_contents(
	engine: &Rc<ScriptEngine>, dir: &Path, opts: &SanitizeOptions, is_root: bool, hooks: &Rc<HookManager>, path_prefix: &str,
	ctx: &Rc<DispatchContext>, depth: usize, api_depth: Option<usize>,
) -> Result<NodeKind> {
	let mut directory = scan_directory(dir, opts)?;

	let modules = directory.module_files.iter().map(|file| analyze_module(engine, file, opts)).collect::<Result<Vec<_>>>()?;
	directory.multi_default = modules.iter().filter(|m| m.default_kind != DefaultKind::None).count() >= 2;

	let mut namespace = Namespace::new();
	let mut root_slot = None;

	for module in &modules {
		if let Some(kind) = place_module_with_decision(&mut namespace, &mut root_slot, module, &directory, is_root, path_prefix, ctx, opts)? {
			return Ok(kind);
		}
	}

	let depth_exhausted = api_depth.is_some_and(|limit| depth >= limit);
	if !depth_exhausted {
		for sub_dir in &directory.sub_dirs {
			let key = sanitized_key(sub_dir, opts);
			let child_path = join_path(path_prefix, &key);
			let plan: Rc<dyn Materializer> = Rc::new(DirectoryMaterializer {
				engine: Rc::clone(engine),
				dir: sub_dir.clone(),
				opts: opts.clone(),
				hooks: Rc::clone(hooks),
				path_prefix: child_path.clone(),
				ctx: Rc::clone(ctx),
				depth: depth + 1,
				api_depth,
			});
			let child_node = ApiNode::pending(plan, child_path, "directory");
			// A not-yet-materialized subdirectory can't be known to be empty
			// without loading it; treat it as non-empty so a prior module
			// export never silently shadows an unvisited directory.
			place_subdir(&mut namespace, key, child_node, false, hooks, path_prefix);
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

struct DirectoryMaterializer {
	engine: Rc<ScriptEngine>,
	dir: PathBuf,
	opts: SanitizeOptions,
	hooks: Rc<HookManager>,
	path_prefix: String,
	ctx: Rc<DispatchContext>,
	depth: usize,
	api_depth: Option<usize>,
}

impl Materializer for DirectoryMaterializer {
	fn materialize(&self) -> Pin<Box<dyn std::future::Future<Output = std::result::Result<NodeKind, SlothletError>>>> {
		let engine = Rc::clone(&self.engine);
		let dir = self.dir.clone();
		let opts = self.opts.clone();
		let hooks = Rc::clone(&self.hooks);
		let path_prefix = self.path_prefix.clone();
		let ctx = Rc::clone(&self.ctx);
		let depth = self.depth;
		let api_depth = self.api_depth;
		let debug = self.ctx.debug;
		Box::pin(async move {
			if debug {
				tracing::info!(target: "slothlet::diagnostics", dir = %dir.display(), path_prefix, "lazy materialize starting");
			}
			let result = build_directory_contents(&engine, &dir, &opts, false, &hooks, &path_prefix, &ctx, depth, api_depth);
			if debug {
				tracing::info!(target: "slothlet::diagnostics", dir = %dir.display(), ok = result.is_ok(), "lazy materialize finished");
			}
			result
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dispatch::DispatchContext;
	use slothlet_core::{HookManager, NodeKind, SanitizeOptions, Value};
	use std::io::Write;

	fn write_module(dir: &Path, name: &str, source: &str) {
		let path = dir.join(name);
		let mut file = std::fs::File::create(&path).unwrap();
		file.write_all(source.as_bytes()).unwrap();
	}

	#[tokio::test(flavor = "current_thread")]
	async fn subdirectory_materializes_on_first_access() {
		let tmp = std::env::temp_dir().join(format!("slothlet-c6-{}", std::process::id()));
		let stats_dir = tmp.join("stats");
		std::fs::create_dir_all(&stats_dir).unwrap();
		write_module(&stats_dir, "stats.mjs", "export function mean(xs) { return xs.reduce((a, b) => a + b, 0) / xs.length; }");

		let engine = Rc::new(ScriptEngine::new(&tmp).unwrap());
		let hooks = Rc::new(HookManager::disabled());
		let ctx = Rc::new(DispatchContext::new(1, Rc::clone(&hooks), Value::Undefined, Value::Undefined, crate::dispatch::Binding::Scoped));
		let root = build(&engine, &tmp, &SanitizeOptions::default(), &hooks, &ctx, None).unwrap();

		let stats_node = {
			let top = root.try_ready().unwrap();
			match &*top {
				NodeKind::Namespace(ns) => ns["stats"].clone(),
				other => panic!("expected namespace, got {other:?}"),
			}
		};
		assert!(!stats_node.is_ready());

		stats_node.materialize().await.unwrap();
		assert!(stats_node.is_ready());
		// `stats/stats.mjs` is a single-file directory whose sole module's
		// stem matches the directory name, so C3's `flatten_single` fires
		// and the module's own contents (not a further `stats` nesting)
		// become this node's namespace directly.
		stats_node.with_kind(|kind| match kind {
			NodeKind::Namespace(ns) => assert!(ns.contains_key("mean")),
			other => panic!("expected namespace, got {other:?}"),
		});

		std::fs::remove_dir_all(&tmp).ok();
	}

	#[tokio::test(flavor = "current_thread")]
	async fn api_depth_omits_proxy_below_the_limit() {
		let tmp = std::env::temp_dir().join(format!("slothlet-c6-depth-{}", std::process::id()));
		let nested = tmp.join("a").join("b");
		std::fs::create_dir_all(&nested).unwrap();
		write_module(&nested, "leaf.mjs", "export function leaf() { return 1; }");

		let engine = Rc::new(ScriptEngine::new(&tmp).unwrap());
		let hooks = Rc::new(HookManager::disabled());
		let ctx = Rc::new(DispatchContext::new(1, Rc::clone(&hooks), Value::Undefined, Value::Undefined, crate::dispatch::Binding::Scoped));
		let kind = build_directory_contents(&engine, &tmp, &SanitizeOptions::default(), true, &hooks, "", &ctx, 0, Some(1)).unwrap();

		match kind {
			NodeKind::Namespace(ns) => {
				assert!(ns.contains_key("a"), "depth 1 directory should still appear");
				let a_node = ns["a"].clone();
				a_node.materialize().await.unwrap();
				a_node.with_kind(|kind| match kind {
					NodeKind::Namespace(inner) => assert!(!inner.contains_key("b"), "`b` is past the limit and must not appear"),
					other => panic!("expected namespace, got {other:?}"),
				});
			}
			other => panic!("expected namespace, got {other:?}"),
		}

		std::fs::remove_dir_all(&tmp).ok();
	}
}
