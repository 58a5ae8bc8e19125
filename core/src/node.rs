/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The API node representation shared by the eager and lazy builders (C5/C6).
//!
//! Every node is backed by an `Rc<RefCell<Slot>>`. Reload (I4) and lazy
//! materialization (I3) both work by rebinding the contents of the `RefCell`
//! in place; the outer `Rc` — and therefore every reference a caller has
//! already been handed — never changes identity.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::SlothletError;
use crate::value::{Callable, Value};

/// An insertion-ordered mapping from sanitized key to API node (I1, and the
/// "insertion-ordered namespaces" design note).
pub type Namespace = IndexMap<String, ApiNode>;

/// The concrete, materialized shape of a node.
pub enum NodeKind {
	/// A function that also carries properties (I2: call-site and
	/// property-site are disjoint, so both are meaningful).
	Callable { call: Rc<dyn Callable>, properties: Namespace },
	/// A mapping from key to further nodes.
	Namespace(Namespace),
	/// A terminal pass-through value.
	Leaf(Value),
}

impl fmt::Debug for NodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NodeKind::Callable { call, properties } => {
				f.debug_struct("Callable").field("name", &call.declared_name()).field("properties", properties).finish()
			}
			NodeKind::Namespace(ns) => f.debug_tuple("Namespace").field(ns).finish(),
			NodeKind::Leaf(v) => f.debug_tuple("Leaf").field(v).finish(),
		}
	}
}

/// What a lazy (C6) node does when its materialization boundary is first
/// crossed. Implemented by the directory/module builders in the `engine`
/// crate; `slothlet-core` only knows the trait shape.
pub trait Materializer {
	/// Run C2/C4 for this node's backing file or directory and produce its
	/// concrete contents. Called at most once successfully per node; a
	/// failure sticks (per §7's recovery policy) until explicitly cleared.
	fn materialize(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<NodeKind, SlothletError>>>>;
}

/// Diagnostic metadata a node exposes before (and after) materialization,
/// for `__metadata` / `__slothletPath` visibility and for the mutation
/// lifecycle to know where a node lives.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
	pub slothlet_path: String,
	pub source_kind: &'static str,
}

enum Slot {
	/// Lazy mode: not yet materialized.
	Pending { plan: Rc<dyn Materializer>, metadata: NodeMetadata },
	/// Lazy mode: a build is in flight; concurrent accessors await the lock
	/// rather than re-triggering a load (C6 "no double-load").
	Building { metadata: NodeMetadata },
	/// Concrete content, in either mode.
	Ready { kind: NodeKind, metadata: NodeMetadata },
	/// A materialization attempt failed; sticky until `reloadApi` clears it.
	Failed { error: Rc<SlothletError>, metadata: NodeMetadata },
}

/// A materialized (or not-yet-materialized) node in the API tree.
///
/// Cloning an `ApiNode` clones the `Rc`, not the content: two clones always
/// observe the same materialization state (I3).
#[derive(Clone)]
pub struct ApiNode(Rc<RefCell<Slot>>);

impl ApiNode {
	pub fn ready(kind: NodeKind, slothlet_path: impl Into<String>, source_kind: &'static str) -> Self {
		ApiNode(Rc::new(RefCell::new(Slot::Ready {
			kind,
			metadata: NodeMetadata { slothlet_path: slothlet_path.into(), source_kind },
		})))
	}

	pub fn pending(plan: Rc<dyn Materializer>, slothlet_path: impl Into<String>, source_kind: &'static str) -> Self {
		ApiNode(Rc::new(RefCell::new(Slot::Pending {
			plan,
			metadata: NodeMetadata { slothlet_path: slothlet_path.into(), source_kind },
		})))
	}

	pub fn metadata(&self) -> NodeMetadata {
		let slot = self.0.borrow();
		match &*slot {
			Slot::Pending { metadata, .. }
			| Slot::Building { metadata }
			| Slot::Ready { metadata, .. }
			| Slot::Failed { metadata, .. } => metadata.clone(),
		}
	}

	pub fn is_ready(&self) -> bool {
		matches!(&*self.0.borrow(), Slot::Ready { .. })
	}

	/// Cheap, non-materializing read of content if already `Ready`.
	pub fn try_ready(&self) -> Option<Ref<'_, NodeKind>> {
		let slot = self.0.borrow();
		match &*slot {
			Slot::Ready { .. } => Some(Ref::map(slot, |s| match s {
				Slot::Ready { kind, .. } => kind,
				_ => unreachable!(),
			})),
			_ => None,
		}
	}

	/// Materializes this node if it is `Pending`, awaiting any in-flight
	/// build rather than starting a second one. Returns the concrete kind.
	///
	/// `RefCell` borrow scopes are kept tight across the `.await` so that the
	/// single-threaded executor never sees an overlapping borrow panic.
	pub async fn materialize(&self) -> Result<(), SlothletError> {
		loop {
			let plan = {
				let mut slot = self.0.borrow_mut();
				match &*slot {
					Slot::Ready { .. } => return Ok(()),
					Slot::Failed { error, .. } => return Err((**error).clone_display_only()),
					Slot::Building { .. } => None,
					Slot::Pending { .. } => {
						let metadata = self.metadata();
						let Slot::Pending { plan, .. } = std::mem::replace(&mut *slot, Slot::Building { metadata }) else {
							unreachable!()
						};
						Some(plan)
					}
				}
			};

			match plan {
				None => {
					// Another accessor is building; cooperatively yield and retry.
					tokio::task::yield_now().await;
					continue;
				}
				Some(plan) => {
					let metadata = self.metadata();
					let result = plan.materialize().await;
					let mut slot = self.0.borrow_mut();
					*slot = match result {
						Ok(kind) => Slot::Ready { kind, metadata },
						Err(err) => Slot::Failed { error: Rc::new(err), metadata },
					};
					drop(slot);
					return self.materialize_result();
				}
			}
		}
	}

	fn materialize_result(&self) -> Result<(), SlothletError> {
		match &*self.0.borrow() {
			Slot::Ready { .. } => Ok(()),
			Slot::Failed { error, .. } => Err((**error).clone_display_only()),
			_ => unreachable!("materialize() always leaves Ready or Failed"),
		}
	}

	/// Rebinds this node's contents in place (used by `reload`/`reloadApi`,
	/// preserving I3/I4's identity guarantee).
	pub fn rebind(&self, kind: NodeKind) {
		let metadata = self.metadata();
		*self.0.borrow_mut() = Slot::Ready { kind, metadata };
	}

	pub fn rebind_pending(&self, plan: Rc<dyn Materializer>) {
		let metadata = self.metadata();
		*self.0.borrow_mut() = Slot::Pending { plan, metadata };
	}

	/// This node's materialization plan, if it is currently `Pending`.
	pub fn pending_plan(&self) -> Option<Rc<dyn Materializer>> {
		match &*self.0.borrow() {
			Slot::Pending { plan, .. } => Some(Rc::clone(plan)),
			_ => None,
		}
	}

	/// Recursively rebinds `self`'s tree to match `new`'s shape, preserving
	/// the `Rc` identity of every descendant whose key survives unchanged at
	/// every depth a caller could hold a reference into — not just this
	/// node's own top-level slot. `reload`/`reloadApi` pass a throwaway tree
	/// built fresh from disk; any key present in both the old and new shape
	/// keeps its original `ApiNode`, updated in place, so `api.deep.math ===
	/// mathRefTakenBeforeReload` still holds (I3/I4).
	pub fn rebind_tree(&self, new: &ApiNode) {
		if let Some(plan) = new.pending_plan() {
			self.rebind_pending(plan);
			return;
		}
		let Some(new_kind) = new.try_ready() else { return };
		let merged = self.merge_kind(&new_kind);
		drop(new_kind);
		self.rebind(merged);
	}

	fn merge_kind(&self, new_kind: &NodeKind) -> NodeKind {
		let old_kind = self.try_ready();
		match (old_kind.as_deref(), new_kind) {
			(Some(NodeKind::Namespace(old_ns)), NodeKind::Namespace(new_ns)) => NodeKind::Namespace(merge_namespace(old_ns, new_ns)),
			(Some(NodeKind::Callable { properties: old_props, .. }), NodeKind::Callable { call, properties: new_props }) => {
				NodeKind::Callable { call: Rc::clone(call), properties: merge_namespace(old_props, new_props) }
			}
			(_, NodeKind::Namespace(new_ns)) => NodeKind::Namespace(new_ns.clone()),
			(_, NodeKind::Callable { call, properties }) => NodeKind::Callable { call: Rc::clone(call), properties: properties.clone() },
			(_, NodeKind::Leaf(value)) => NodeKind::Leaf(value.clone()),
		}
	}

	pub fn with_kind<R>(&self, f: impl FnOnce(&NodeKind) -> R) -> Option<R> {
		match &*self.0.borrow() {
			Slot::Ready { kind, .. } => Some(f(kind)),
			_ => None,
		}
	}

	pub fn with_kind_mut<R>(&self, f: impl FnOnce(&mut NodeKind) -> R) -> Option<R> {
		match &mut *self.0.borrow_mut() {
			Slot::Ready { kind, .. } => Some(f(kind)),
			_ => None,
		}
	}

	pub fn ptr_eq(a: &ApiNode, b: &ApiNode) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}
}

/// Merges two namespaces key-by-key: a key present in both keeps `old`'s
/// `ApiNode` (recursively rebound to `new`'s shape for that key); a
/// new-only key is adopted as-is; an old-only key (removed on the new
/// build) is dropped.
fn merge_namespace(old: &Namespace, new: &Namespace) -> Namespace {
	let mut out = Namespace::new();
	for (key, new_child) in new.iter() {
		match old.get(key) {
			Some(old_child) => {
				old_child.rebind_tree(new_child);
				out.insert(key.clone(), old_child.clone());
			}
			None => {
				out.insert(key.clone(), new_child.clone());
			}
		}
	}
	out
}

impl fmt::Debug for ApiNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &*self.0.borrow() {
			Slot::Pending { metadata, .. } => write!(f, "Pending({})", metadata.slothlet_path),
			Slot::Building { metadata } => write!(f, "Building({})", metadata.slothlet_path),
			Slot::Ready { kind, metadata } => write!(f, "Ready({}, {:?})", metadata.slothlet_path, kind),
			Slot::Failed { metadata, .. } => write!(f, "Failed({})", metadata.slothlet_path),
		}
	}
}

// `SlothletError` does not implement `Clone` (its `Load`/`Script` variants
// carry foreign `Box<dyn Error>`/owned data); materialization failures must
// be replayable for every subsequent accessor, so we re-render the original
// as a fresh `Config`-kind error rather than requiring `Clone` everywhere.
trait CloneDisplayOnly {
	fn clone_display_only(&self) -> SlothletError;
}

impl CloneDisplayOnly for SlothletError {
	fn clone_display_only(&self) -> SlothletError {
		SlothletError::Config(format!("{self}"))
	}
}
