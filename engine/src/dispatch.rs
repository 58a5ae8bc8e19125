/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! What C10 wraps every materialized callable in: a per-instance dispatch
//! context (scope record ingredients plus the hook manager) and the
//! [`Callable`] adapter that installs a scope and runs the hook pipeline
//! around the original function. Built by the orchestrator, consumed by
//! the builders (C5/C6) and the mutation lifecycle (C9) at the point each
//! one constructs a callable node, so a freshly materialized lazy node is
//! wrapped exactly the same way an eagerly built one is.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use slothlet_core::{sync_with_scope, ApiNode, Callable, HookManager, LiveBinding, NodeKind, Result, ScopeRecord, SlothletError, Value};

/// C7's two binding models: per-call scoped storage (Model A, the default),
/// or a shared cell mutated on every call and left visible until the next
/// one (Model B, `runtime = "live"` — single-instance embedders only).
pub enum Binding {
	Scoped,
	Live(Rc<LiveBinding>),
}

/// The per-instance state every dispatched call needs: which `self` /
/// `context` / `reference` record to install, and which hook manager to
/// run the call through.
pub struct DispatchContext {
	pub instance_id: u64,
	pub hooks: Rc<HookManager>,
	pub context: Value,
	pub reference: Value,
	pub binding: Binding,
	/// The instance's current root, snapshotted into `self` on every call.
	/// `None` until the orchestrator finishes the initial build (or during
	/// a `reload()` rebuild); a call dispatched in that narrow window sees
	/// `self` as `undefined`, matching §4.7's "outside any scope" fallback.
	root: RefCell<Option<ApiNode>>,
	/// Gates the `slothlet::diagnostics` `tracing::info!` events described in
	/// SPEC_FULL.md §3.2 (build start/finish, lazy materialization, mutation
	/// operations). Mirrors `CreateOptions::debug`; defaults to `false` so
	/// existing call sites that build a `DispatchContext` directly don't
	/// need updating.
	pub debug: bool,
}

impl DispatchContext {
	pub fn new(instance_id: u64, hooks: Rc<HookManager>, context: Value, reference: Value, binding: Binding) -> Self {
		DispatchContext { instance_id, hooks, context, reference, binding, root: RefCell::new(None), debug: false }
	}

	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	pub fn set_root(&self, root: ApiNode) {
		*self.root.borrow_mut() = Some(root);
	}

	/// Snapshots the already-materialized portion of the current root into a
	/// `self`-bindable `Value`. Un-materialized (lazy, not-yet-accessed)
	/// subtrees are omitted rather than forced, so this never blocks on I/O.
	fn self_snapshot(&self) -> Value {
		match &*self.root.borrow() {
			Some(root) => snapshot_node(root),
			None => Value::Undefined,
		}
	}
}

fn snapshot_node(node: &ApiNode) -> Value {
	match node.try_ready() {
		Some(kind) => match &*kind {
			NodeKind::Namespace(ns) => {
				let mut out = IndexMap::new();
				for (key, child) in ns.iter() {
					out.insert(key.clone(), snapshot_node(child));
				}
				Value::Object(Rc::new(out))
			}
			NodeKind::Callable { call, .. } => Value::Function(Rc::clone(call)),
			NodeKind::Leaf(value) => value.clone(),
		},
		None => Value::Undefined,
	}
}

/// Wraps a bare script-engine callable so that invoking it installs the
/// scope (C7) and runs the `before -> primary -> after -> always` pipeline
/// (C8) at `path`.
pub fn wrap_callable(inner: Rc<dyn Callable>, path: String, ctx: Rc<DispatchContext>) -> Rc<dyn Callable> {
	Rc::new(HookedCallable { inner, path, ctx })
}

struct HookedCallable {
	inner: Rc<dyn Callable>,
	path: String,
	ctx: Rc<DispatchContext>,
}

impl Callable for HookedCallable {
	fn call(&self, this: Value, args: &[Value]) -> Result<Value> {
		let record = ScopeRecord {
			instance_id: self.ctx.instance_id,
			self_: self.ctx.self_snapshot(),
			context: self.ctx.context.clone(),
			reference: self.ctx.reference.clone(),
			hooks: Rc::clone(&self.ctx.hooks),
		};
		self.inner.install_scope(&record.self_, &record.context, &record.reference);

		let inner = Rc::clone(&self.inner);
		let this_for_call = this.clone();
		let hooks = Rc::clone(&self.ctx.hooks);
		let path = self.path.clone();
		let run = move || hooks.dispatch(&path, args, |args| inner.call(this_for_call.clone(), args).map_err(|e| e.to_string())).map_err(SlothletError::Config);

		match &self.ctx.binding {
			Binding::Scoped => sync_with_scope(record, run),
			// Model B: the cell is mutated for every call and left as-is
			// afterward, rather than restored — single-instance embedders
			// only, per spec §4.7.
			Binding::Live(live) => {
				live.set(record);
				run()
			}
		}
	}

	fn declared_name(&self) -> &str {
		self.inner.declared_name()
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self.inner.as_any()
	}
}
