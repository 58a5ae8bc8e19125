/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Orchestrator (C10): `create()` validates options, builds the tree via C5
//! or C6, installs the binding scope, wraps every callable through the
//! hook pipeline, and returns an [`Api`] carrying the mutation lifecycle
//! (C9) and diagnostics. The teacher's `slothlet()` entry point returns one
//! object that is simultaneously the root namespace/function and the
//! management surface with its methods hung off as non-enumerable
//! properties; a Rust-native `Api` struct plays the same role with the root
//! reachable through [`Api::root`]/[`Api::get`] and the management
//! operations as ordinary methods instead.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use slothlet_core::{ApiNode, HookManager, LiveBinding, Namespace, NodeKind, OwnershipRegistry, Result, ScopeRecord, SlothletError, Value};

use crate::build;
use crate::dispatch::{Binding, DispatchContext};
use crate::mutate::{self, AddApiOptions, MutationLog};
use crate::options::{CreateOptions, Mode, RuntimeModelOption};
use crate::script::ScriptEngine;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_instance_id() -> u64 {
	NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

fn make_dispatch_context(options: &CreateOptions, hooks: &Rc<HookManager>) -> Rc<DispatchContext> {
	let instance_id = next_instance_id();
	let binding = match options.runtime {
		RuntimeModelOption::Scoped => Binding::Scoped,
		RuntimeModelOption::Live => {
			let record = ScopeRecord {
				instance_id,
				self_: slothlet_core::Value::Undefined,
				context: options.context.clone(),
				reference: options.reference.clone(),
				hooks: Rc::clone(hooks),
			};
			Binding::Live(Rc::new(LiveBinding::new(record)))
		}
	};
	Rc::new(DispatchContext::new(instance_id, Rc::clone(hooks), options.context.clone(), options.reference.clone(), binding).with_debug(options.debug))
}

/// Spec.md §6's options table: `reference`'s keys are available both as the
/// live binding installed per call (already threaded through
/// `DispatchContext`) and merged directly into the root namespace, for any
/// key that doesn't collide with something the build already produced.
fn merge_reference(root: &ApiNode, reference: &Value, ctx: &Rc<DispatchContext>) {
	let Value::Object(map) = reference else { return };
	root.with_kind_mut(|kind| {
		let target: &mut Namespace = match kind {
			NodeKind::Namespace(ns) => ns,
			NodeKind::Callable { properties, .. } => properties,
			NodeKind::Leaf(_) => return,
		};
		for (key, value) in map.iter() {
			if !target.contains_key(key) {
				target.insert(key.clone(), build::value_to_node(value.clone(), key, ctx));
			}
		}
	});
}

fn build_root(engine: &Rc<ScriptEngine>, options: &CreateOptions, hooks: &Rc<HookManager>, ctx: &Rc<DispatchContext>) -> Result<ApiNode> {
	match options.mode {
		Mode::Eager => build::eager::build(engine, &options.dir, &options.sanitize, hooks, ctx, options.api_depth),
		Mode::Lazy => build::lazy::build(engine, &options.dir, &options.sanitize, hooks, ctx, options.api_depth),
	}
}

/// Builds the root directory's contents as a bare `NodeKind`, for `reload()`
/// to rebind into the existing root `ApiNode` (preserving I3/I4's identity).
fn build_root_contents(engine: &Rc<ScriptEngine>, options: &CreateOptions, hooks: &Rc<HookManager>, ctx: &Rc<DispatchContext>) -> Result<NodeKind> {
	match options.mode {
		Mode::Eager => build::eager::build_contents(engine, &options.dir, &options.sanitize, true, hooks, "", ctx, 0, options.api_depth),
		Mode::Lazy => build::lazy::build_directory_contents(engine, &options.dir, &options.sanitize, true, hooks, "", ctx, 0, options.api_depth),
	}
}

/// One line of [`Api::describe`]'s report.
#[derive(Debug, Clone)]
pub struct DescribeEntry {
	pub path: String,
	pub kind: &'static str,
	pub materialized: bool,
}

fn kind_label(kind: &NodeKind) -> &'static str {
	match kind {
		NodeKind::Callable { .. } => "callable",
		NodeKind::Namespace(_) => "namespace",
		NodeKind::Leaf(_) => "leaf",
	}
}

fn describe_node(node: &ApiNode, out: &mut Vec<DescribeEntry>, show_all: bool) {
	let metadata = node.metadata();
	if !node.is_ready() {
		if show_all {
			out.push(DescribeEntry { path: metadata.slothlet_path, kind: metadata.source_kind, materialized: false });
		}
		return;
	}
	node.with_kind(|kind| {
		out.push(DescribeEntry { path: metadata.slothlet_path.clone(), kind: kind_label(kind), materialized: true });
		match kind {
			NodeKind::Namespace(ns) => {
				for child in ns.values() {
					describe_node(child, out, show_all);
				}
			}
			NodeKind::Callable { properties, .. } => {
				for child in properties.values() {
					describe_node(child, out, show_all);
				}
			}
			NodeKind::Leaf(_) => {}
		}
	});
}

/// A built slothlet instance: the root API tree plus the mutation lifecycle
/// and diagnostics C10 attaches to it.
pub struct Api {
	root: ApiNode,
	registry: Rc<OwnershipRegistry>,
	log: Rc<MutationLog>,
	hooks: Rc<HookManager>,
	engine: Rc<ScriptEngine>,
	options: CreateOptions,
	ctx: Cell<Option<Rc<DispatchContext>>>,
	shutdown: Cell<bool>,
}

impl Api {
	/// The root node: a callable if the tree has a root contributor,
	/// otherwise a namespace.
	pub fn root(&self) -> &ApiNode {
		&self.root
	}

	/// The `instanceId` diagnostic attribute (spec.md §4.10).
	pub fn instance_id(&self) -> u64 {
		self.ctx().instance_id
	}

	pub fn hooks(&self) -> &HookManager {
		&self.hooks
	}

	fn ctx(&self) -> Rc<DispatchContext> {
		let ctx = self.ctx.take().expect("Api used after shutdown");
		self.ctx.set(Some(Rc::clone(&ctx)));
		ctx
	}

	fn check_alive(&self) -> Result<()> {
		if self.shutdown.get() {
			return Err(SlothletError::Config("api instance has been shut down".to_string()));
		}
		Ok(())
	}

	fn check_hot_reload(&self) -> Result<()> {
		if !self.options.hot_reload {
			return Err(SlothletError::Config("hot_reload is disabled for this instance".to_string()));
		}
		Ok(())
	}

	/// Resolves a dot-path against the root, materializing lazy nodes along
	/// the way. `None` means the path doesn't exist.
	pub async fn get(&self, path: &str) -> Result<Option<ApiNode>> {
		self.check_alive()?;
		mutate::navigate(&self.root, path).await
	}

	/// `describe(showAll?)`: a flat listing of every materialized node
	/// (plus, with `show_all`, unmaterialized proxies by their diagnostic
	/// metadata, without forcing them to load).
	pub fn describe(&self, show_all: bool) -> Vec<DescribeEntry> {
		let mut out = Vec::new();
		describe_node(&self.root, &mut out, show_all);
		out
	}

	/// `addApi(apiPath, folderPath, options?)`.
	pub async fn add_api(&self, api_path: &str, folder_path: impl Into<PathBuf>, options: AddApiOptions) -> Result<()> {
		self.check_alive()?;
		let folder_path = folder_path.into();
		if self.options.debug {
			tracing::info!(target: "slothlet::diagnostics", api_path, folder_path = %folder_path.display(), "addApi");
		}
		let ctx = self.ctx();
		mutate::add_api(&self.root, &self.registry, &self.log, &self.engine, &self.options.sanitize, &self.hooks, api_path, &folder_path, options, &ctx).await
	}

	/// `removeApi({ apiPath?, moduleId? })`.
	pub async fn remove_api(&self, api_path: Option<&str>, module_id: Option<&str>) -> Result<()> {
		self.check_alive()?;
		if self.options.debug {
			tracing::info!(target: "slothlet::diagnostics", api_path, module_id, "removeApi");
		}
		mutate::remove_api(&self.root, &self.registry, &self.log, api_path, module_id).await
	}

	/// `reloadApi(apiPath)`.
	pub async fn reload_api(&self, api_path: &str) -> Result<()> {
		self.check_alive()?;
		self.check_hot_reload()?;
		if self.options.debug {
			tracing::info!(target: "slothlet::diagnostics", api_path, "reloadApi");
		}
		let ctx = self.ctx();
		mutate::reload_api(&self.root, &self.registry, &self.log, &self.engine, &self.options.sanitize, &self.hooks, api_path, &ctx).await
	}

	/// `reload()`: regenerates `instanceId`, rebuilds the root in place
	/// (preserving I3/I4's identity at every depth a caller could hold a
	/// reference into, via [`ApiNode::rebind_tree`]), then replays every
	/// surviving `addApi` registration.
	pub async fn reload(&self) -> Result<()> {
		self.check_alive()?;
		self.check_hot_reload()?;

		if self.options.debug {
			tracing::info!(target: "slothlet::diagnostics", dir = %self.options.dir.display(), "reload: build starting");
		}

		let new_ctx = make_dispatch_context(&self.options, &self.hooks);
		let kind = build_root_contents(&self.engine, &self.options, &self.hooks, &new_ctx)?;
		let fresh = ApiNode::ready(kind, "", "directory");
		self.root.rebind_tree(&fresh);
		merge_reference(&self.root, &self.options.reference, &new_ctx);
		new_ctx.set_root(self.root.clone());
		self.ctx.set(Some(Rc::clone(&new_ctx)));

		let result = mutate::replay_all(&self.root, &self.registry, &self.log, &self.engine, &self.options.sanitize, &self.hooks, &new_ctx).await;

		if self.options.debug {
			tracing::info!(target: "slothlet::diagnostics", instance_id = new_ctx.instance_id, "reload: build finished");
		}

		result
	}

	/// Tears down the hook manager, the ownership registry, and this
	/// instance's bindings. Every management method rejects after this.
	pub fn shutdown(&self) {
		self.hooks.clear();
		self.hooks.disable();
		self.registry.clear();
		self.ctx.set(None);
		self.shutdown.set(true);
	}
}

/// Runs C10 over `options`: builds the tree via C5 or C6, installs the
/// dispatch context, returns the resulting [`Api`].
pub fn create(options: CreateOptions) -> Result<Api> {
	if !options.dir.is_dir() {
		return Err(SlothletError::Config(format!("dir `{}` is not a directory", options.dir.display())));
	}

	if options.debug {
		tracing::info!(target: "slothlet::diagnostics", dir = %options.dir.display(), mode = ?options.mode, "create: build starting");
	}

	let engine = Rc::new(ScriptEngine::new(&options.dir)?);
	let hooks = Rc::new(HookManager::new(options.hooks.enabled, options.hooks.allow_pattern.as_deref()));
	let ctx = make_dispatch_context(&options, &hooks);
	let root = build_root(&engine, &options, &hooks, &ctx)?;
	merge_reference(&root, &options.reference, &ctx);
	ctx.set_root(root.clone());

	if options.debug {
		tracing::info!(target: "slothlet::diagnostics", instance_id = ctx.instance_id, "create: build finished");
	}

	Ok(Api { root, registry: Rc::new(OwnershipRegistry::new()), log: Rc::new(MutationLog::new()), hooks, engine, options, ctx: Cell::new(Some(ctx)), shutdown: Cell::new(false) })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::options::CreateOptions;
	use std::io::Write;

	fn write_module(dir: &std::path::Path, name: &str, source: &str) {
		let path = dir.join(name);
		let mut file = std::fs::File::create(&path).unwrap();
		file.write_all(source.as_bytes()).unwrap();
	}

	#[tokio::test(flavor = "current_thread")]
	async fn create_eager_exposes_namespace_and_get_resolves_paths() {
		let tmp = std::env::temp_dir().join(format!("slothlet-c10-{}", std::process::id()));
		let math_dir = tmp.join("math");
		std::fs::create_dir_all(&math_dir).unwrap();
		write_module(&math_dir, "add.mjs", "export function add(a, b) { return a + b; }");

		let options = CreateOptions::new(&tmp).mode(Mode::Eager);
		let api = create(options).unwrap();

		let node = api.get("math.add").await.unwrap().expect("math.add should resolve");
		node.with_kind(|kind| match kind {
			NodeKind::Callable { .. } => {}
			other => panic!("expected callable, got {other:?}"),
		});

		assert!(api.get("math.missing").await.unwrap().is_none());

		std::fs::remove_dir_all(&tmp).ok();
	}

	#[tokio::test(flavor = "current_thread")]
	async fn shutdown_disables_further_mutation() {
		let tmp = std::env::temp_dir().join(format!("slothlet-c10-shutdown-{}", std::process::id()));
		std::fs::create_dir_all(&tmp).unwrap();
		write_module(&tmp, "greet.mjs", "export function greet() { return 'hi'; }");

		let options = CreateOptions::new(&tmp).mode(Mode::Eager);
		let api = create(options).unwrap();
		api.shutdown();

		let err = api.get("greet").await.unwrap_err();
		assert!(matches!(err, SlothletError::Config(_)));

		std::fs::remove_dir_all(&tmp).ok();
	}
}
