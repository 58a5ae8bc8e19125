/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Runtime binding layer (C7): per-instance `self` / `context` / `reference`
//! live bindings, resolved through a scoped execution store rather than
//! through shared module-scope variables (see the "Runtime 'live bindings'"
//! design note).
//!
//! The teacher repo patches a host event-emitter prototype once per process
//! so listeners re-enter the scope active at registration time. A systems
//! re-implementation instead exposes that as an explicit capturing wrapper
//! (`Scope::capture`) applied by callers at registration time — including by
//! the loader itself, wherever it installs a callback on the caller's behalf.

use std::rc::Rc;

use crate::hooks::HookManager;
use crate::value::Value;

/// The record a scope makes available to any loaded module during a
/// dispatched call (I5).
#[derive(Clone)]
pub struct ScopeRecord {
	pub instance_id: u64,
	pub self_: Value,
	pub context: Value,
	pub reference: Value,
	pub hooks: Rc<HookManager>,
}

impl ScopeRecord {
	/// The record observed when a module reads a live binding outside of any
	/// scope (e.g. at module top-level import time). Never throws (§4.7).
	pub fn neutral() -> Self {
		ScopeRecord {
			instance_id: 0,
			self_: Value::Undefined,
			context: Value::Undefined,
			reference: Value::Undefined,
			hooks: Rc::new(HookManager::disabled()),
		}
	}
}

tokio::task_local! {
	static CURRENT_SCOPE: ScopeRecord;
}

/// Runs `fut` with `record` installed as the current scope. Nested calls to
/// `with_scope` shadow the outer record only for the duration of the inner
/// future, matching "before → function → after → always" call-local scoping.
pub async fn with_scope<F, T>(record: ScopeRecord, fut: F) -> T
where
	F: std::future::Future<Output = T>,
{
	CURRENT_SCOPE.scope(record, fut).await
}

thread_local! {
	static LIVE_RECORD: std::cell::RefCell<Option<ScopeRecord>> = const { std::cell::RefCell::new(None) };
}

/// Reads the current scope's record: the task-local record installed by
/// `with_scope`/`sync_with_scope` if one is active (Model A), else the most
/// recently [`LiveBinding::set`] record (Model B), else the neutral record.
pub fn current() -> ScopeRecord {
	if let Ok(record) = CURRENT_SCOPE.try_with(|r| r.clone()) {
		return record;
	}
	if let Some(record) = LIVE_RECORD.with(|cell| cell.borrow().clone()) {
		return record;
	}
	ScopeRecord::neutral()
}

/// Synchronous counterpart of [`with_scope`]: every materialized callable's
/// `call` is a plain (non-async) function (C7's dispatch wraps it, not the
/// other way around), so the orchestrator installs the scope around that
/// synchronous call rather than around an `.await`.
pub fn sync_with_scope<T>(record: ScopeRecord, f: impl FnOnce() -> T) -> T {
	CURRENT_SCOPE.sync_scope(record, f)
}

/// Captures the scope active at the call site and returns a wrapper that
/// re-enters that same scope whenever it is invoked — the explicit
/// equivalent of the teacher's event-emitter-prototype patch. The loader
/// applies this automatically to any callback *it* installs on a module's
/// behalf (timers, the hook pipeline's internal bookkeeping); library users
/// wanting the same behavior for their own listeners call this directly.
pub fn capture<F, Fut, T>(f: F) -> impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = T>>>
where
	F: Fn() -> Fut + 'static,
	Fut: std::future::Future<Output = T> + 'static,
	T: 'static,
{
	let captured = current();
	move || {
		let record = captured.clone();
		let fut = f();
		Box::pin(with_scope(record, fut))
	}
}

/// Alternate binding model (`runtime = "live"` in `CreateOptions`): shared
/// mutation of a single cell rather than per-task scoping. Only safe for
/// single-instance embedders, per spec §4.7 Model B.
pub struct LiveBinding {
	cell: std::cell::RefCell<ScopeRecord>,
}

impl LiveBinding {
	pub fn new(record: ScopeRecord) -> Self {
		LiveBinding { cell: std::cell::RefCell::new(record) }
	}

	/// Mutates the shared cell, and mirrors the update into `current()`'s
	/// fallback slot so live-model reads don't need a handle to this binding.
	pub fn set(&self, record: ScopeRecord) {
		*self.cell.borrow_mut() = record.clone();
		LIVE_RECORD.with(|cell| *cell.borrow_mut() = Some(record));
	}

	pub fn get(&self) -> ScopeRecord {
		self.cell.borrow().clone()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeModel {
	/// Model A (default): scoped-storage, one record per concurrent call.
	Async,
	/// Model B: shared-mutation, single-instance only.
	Live,
}

impl Default for RuntimeModel {
	fn default() -> Self {
		RuntimeModel::Async
	}
}
