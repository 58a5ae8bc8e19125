/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Mutation lifecycle (C9): `addApi`, `removeApi`, `reloadApi`, `reload`,
//! layered on [`OwnershipRegistry`]'s arbitration rules and a replay log
//! that `reload`/`reloadApi` walk in registration order.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_recursion::async_recursion;
use slothlet_core::{ApiNode, ClaimOptions, HookManager, Namespace, NodeKind, OwnershipRegistry, Result, SanitizeOptions, SlothletError};

use crate::dispatch::DispatchContext;
use crate::script::ScriptEngine;

/// One recorded `addApi` call, replayed by `reload`/`reloadApi`.
#[derive(Clone)]
pub struct Registration {
	pub api_path: String,
	pub folder_path: PathBuf,
	pub module_id: Option<String>,
}

/// Options accepted by [`add_api`], mirroring spec.md §4.9's `addApi` rules.
#[derive(Clone)]
pub struct AddApiOptions {
	pub module_id: Option<String>,
	pub allow_overwrite: bool,
	pub force_overwrite: bool,
	pub module_ownership_enabled: bool,
}

impl Default for AddApiOptions {
	fn default() -> Self {
		AddApiOptions { module_id: None, allow_overwrite: true, force_overwrite: false, module_ownership_enabled: false }
	}
}

/// Replay log for an instance's `addApi` calls, in call order.
#[derive(Default)]
pub struct MutationLog {
	entries: RefCell<Vec<Registration>>,
}

impl MutationLog {
	pub fn new() -> Self {
		MutationLog::default()
	}

	fn record(&self, registration: Registration) {
		self.entries.borrow_mut().push(registration);
	}

	/// Drops every registration exactly at `api_path` (used by
	/// `removeApi({ apiPath })`).
	fn remove_path(&self, api_path: &str) {
		self.entries.borrow_mut().retain(|r| r.api_path != api_path);
	}

	/// Drops every registration owned by `module_id` (used by
	/// `removeApi({ moduleId })`).
	fn remove_for(&self, module_id: &Option<String>) {
		self.entries.borrow_mut().retain(|r| &r.module_id != module_id);
	}

	/// Registrations whose `api_path` is `path` or nested under it, in
	/// original registration order (`reloadApi`'s contract).
	pub fn entries_under(&self, path: &str) -> Vec<Registration> {
		self.entries
			.borrow()
			.iter()
			.filter(|r| r.api_path == path || r.api_path.starts_with(&format!("{path}.")))
			.cloned()
			.collect()
	}

	/// Every surviving registration, in original order (`reload`'s contract).
	pub fn all(&self) -> Vec<Registration> {
		self.entries.borrow().clone()
	}
}

fn split_path(path: &str) -> Vec<&str> {
	path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Walks `segments` from `node`, creating empty namespace nodes for any
/// missing intermediate segment, materializing lazy nodes it must descend
/// through along the way.
#[async_recursion(?Send)]
async fn navigate_create(node: &ApiNode, segments: &[&str]) -> Result<ApiNode> {
	if segments.is_empty() {
		return Ok(node.clone());
	}
	if !node.is_ready() {
		node.materialize().await?;
	}

	let head = segments[0];
	let rest = &segments[1..];
	let next = node
		.with_kind_mut(|kind| match kind {
			NodeKind::Namespace(ns) => {
				Some(ns.entry(head.to_string()).or_insert_with(|| empty_namespace(head)).clone())
			}
			NodeKind::Callable { properties, .. } => {
				Some(properties.entry(head.to_string()).or_insert_with(|| empty_namespace(head)).clone())
			}
			NodeKind::Leaf(_) => None,
		})
		.flatten();

	match next {
		Some(child) => navigate_create(&child, rest).await,
		None => Err(SlothletError::Config(format!("cannot add api under a leaf value (segment `{head}`)"))),
	}
}

/// Resolves `path` against `root` without creating anything, materializing
/// pending nodes along the way. `Ok(None)` means some segment doesn't exist.
pub async fn navigate(root: &ApiNode, path: &str) -> Result<Option<ApiNode>> {
	let mut current = root.clone();
	for segment in split_path(path) {
		if !current.is_ready() {
			current.materialize().await?;
		}
		let next = current
			.with_kind(|kind| match kind {
				NodeKind::Namespace(ns) => ns.get(segment).cloned(),
				NodeKind::Callable { properties, .. } => properties.get(segment).cloned(),
				NodeKind::Leaf(_) => None,
			})
			.flatten();
		match next {
			Some(child) => current = child,
			None => return Ok(None),
		}
	}
	if !current.is_ready() {
		current.materialize().await?;
	}
	Ok(Some(current))
}

fn empty_namespace(path: &str) -> ApiNode {
	ApiNode::ready(NodeKind::Namespace(Namespace::new()), path.to_string(), "namespace")
}

/// Resolves `folderPath` (the caller has already made it absolute; there is
/// no Rust analogue of "relative to the calling module"), builds its
/// subtree, and merges it into `root` at `api_path`, creating intermediate
/// namespaces as needed.
pub async fn add_api(
	root: &ApiNode, registry: &OwnershipRegistry, log: &MutationLog, engine: &ScriptEngine, sanitize_opts: &SanitizeOptions,
	hooks: &HookManager, api_path: &str, folder_path: &Path, options: AddApiOptions, ctx: &Rc<DispatchContext>,
) -> Result<()> {
	add_api_impl(root, registry, log, engine, sanitize_opts, hooks, api_path, folder_path, options, true, ctx).await
}

async fn add_api_impl(
	root: &ApiNode, registry: &OwnershipRegistry, log: &MutationLog, engine: &ScriptEngine, sanitize_opts: &SanitizeOptions,
	hooks: &HookManager, api_path: &str, folder_path: &Path, options: AddApiOptions, record: bool, ctx: &Rc<DispatchContext>,
) -> Result<()> {
	registry.claim(
		api_path,
		&ClaimOptions {
			module_id: options.module_id.clone(),
			allow_overwrite: options.allow_overwrite,
			force_overwrite: options.force_overwrite,
			module_ownership_enabled: options.module_ownership_enabled,
		},
	)?;

	// `apiDepth` bounds the root build only (C3); a folder merged in by
	// `addApi` is always built out in full regardless of where it lands.
	let kind = crate::build::eager::build_contents(engine, folder_path, sanitize_opts, false, hooks, api_path, ctx, 0, None)?;

	let segments = split_path(api_path);
	if segments.is_empty() {
		return Err(SlothletError::Config("addApi requires a non-empty apiPath".to_string()));
	}
	let (parent_segments, last) = segments.split_at(segments.len() - 1);
	let last_key = last[0];

	let parent = navigate_create(root, parent_segments).await?;
	// Wrapped in a throwaway node so a key that already exists rebinds its
	// *tree* (every surviving descendant keeps its own `ApiNode` identity,
	// not just this top-level slot — I3/I4) rather than replacing it outright.
	let fresh = ApiNode::ready(kind, api_path.to_string(), "module");
	parent.with_kind_mut(|parent_kind| match parent_kind {
		NodeKind::Namespace(ns) => match ns.get(last_key) {
			Some(existing) => existing.rebind_tree(&fresh),
			None => {
				ns.insert(last_key.to_string(), fresh.clone());
			}
		},
		NodeKind::Callable { properties, .. } => match properties.get(last_key) {
			Some(existing) => existing.rebind_tree(&fresh),
			None => {
				properties.insert(last_key.to_string(), fresh.clone());
			}
		},
		NodeKind::Leaf(_) => {}
	});

	if record {
		log.record(Registration { api_path: api_path.to_string(), folder_path: folder_path.to_path_buf(), module_id: options.module_id });
	}

	Ok(())
}

#[async_recursion(?Send)]
async fn detach(root: &ApiNode, path: &str) -> Result<()> {
	let segments = split_path(path);
	let Some((last, parent_segments)) = segments.split_last() else {
		return Ok(());
	};
	let parent = navigate_create(root, parent_segments).await?;
	parent.with_kind_mut(|kind| match kind {
		NodeKind::Namespace(ns) => {
			ns.shift_remove(*last);
		}
		NodeKind::Callable { properties, .. } => {
			properties.shift_remove(*last);
		}
		NodeKind::Leaf(_) => {}
	});
	Ok(())
}

/// Removes a subtree either by `apiPath` or by `moduleId`'s ownership rows.
pub async fn remove_api(root: &ApiNode, registry: &OwnershipRegistry, log: &MutationLog, api_path: Option<&str>, module_id: Option<&str>) -> Result<()> {
	let module_id = module_id.map(String::from);
	let paths = if let Some(path) = api_path {
		// The caller names a path, not an owner: release whichever module(s)
		// actually hold it (often different from the `module_id` argument,
		// which defaults to `None`/anonymous), so `detach()`'s deletion below
		// doesn't leave a stale ownership row behind for this path.
		for owner in registry.owners_of(path) {
			registry.release(path, &owner);
		}
		log.remove_path(path);
		vec![path.to_string()]
	} else {
		let vacated = registry.release_all(&module_id);
		log.remove_for(&module_id);
		vacated
	};

	for path in paths {
		detach(root, &path).await?;
	}
	Ok(())
}

/// Re-executes `addApi` for every registration under `api_path`, in
/// registration order, rebinding existing nodes in place (I3/I4).
pub async fn reload_api(
	root: &ApiNode, registry: &OwnershipRegistry, log: &MutationLog, engine: &ScriptEngine, sanitize_opts: &SanitizeOptions, hooks: &HookManager,
	api_path: &str, ctx: &Rc<DispatchContext>,
) -> Result<()> {
	for registration in log.entries_under(api_path) {
		let options = AddApiOptions {
			module_id: registration.module_id.clone(),
			allow_overwrite: true,
			force_overwrite: true,
			module_ownership_enabled: true,
		};
		add_api_impl(root, registry, log, engine, sanitize_opts, hooks, &registration.api_path, &registration.folder_path, options, false, ctx).await?;
	}
	Ok(())
}

/// Replays every surviving `addApi` registration against `root` (used by
/// `reload()` after the orchestrator rebuilds the root tree in place).
pub async fn replay_all(
	root: &ApiNode, registry: &OwnershipRegistry, log: &MutationLog, engine: &ScriptEngine, sanitize_opts: &SanitizeOptions, hooks: &HookManager,
	ctx: &Rc<DispatchContext>,
) -> Result<()> {
	for registration in log.all() {
		let options = AddApiOptions {
			module_id: registration.module_id.clone(),
			allow_overwrite: true,
			force_overwrite: true,
			module_ownership_enabled: true,
		};
		add_api_impl(root, registry, log, engine, sanitize_opts, hooks, &registration.api_path, &registration.folder_path, options, false, ctx).await?;
	}
	Ok(())
}
