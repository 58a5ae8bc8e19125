/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Coverage for two things the loader-level tests can't reach directly:
//!
//! - C7's `self` snapshot and per-instance isolation as actually wired
//!   through `dispatch::wrap_callable`/`DispatchContext`, using a native
//!   `Callable` test double rather than a loaded script module. A script
//!   function invoked from inside another script function's own call would
//!   double-borrow the shared engine context (documented in DESIGN.md's C7
//!   section); a Rust closure has no such borrow, so it exercises the same
//!   scope plumbing without that limitation.
//! - C8's hook pipeline short-circuit mechanics (§8 scenario 6): a `before`
//!   hook that replaces the call outright, with `after`/`always` still
//!   observing it and the primary body never running.

use std::cell::Cell;
use std::rc::Rc;

use slothlet::dispatch::{Binding, DispatchContext};
use slothlet_core::hooks::BeforeOutcome;
use slothlet_core::{ApiNode, Callable, HookManager, NodeKind, Result, Value};

struct EchoSelf;

impl Callable for EchoSelf {
	fn call(&self, _this: Value, _args: &[Value]) -> Result<Value> {
		Ok(slothlet_core::current_scope().self_)
	}

	fn declared_name(&self) -> &str {
		"echoSelf"
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

/// Calls straight through to `inner`, then re-reads the scope afterward —
/// proving the outer scope is restored once the nested call returns.
struct CallThrough {
	inner: Rc<dyn Callable>,
}

impl Callable for CallThrough {
	fn call(&self, this: Value, args: &[Value]) -> Result<Value> {
		let nested_self = self.inner.call(this, args)?;
		let restored_self = slothlet_core::current_scope().self_;
		Ok(Value::Array(Rc::new(vec![nested_self, restored_self])))
	}

	fn declared_name(&self) -> &str {
		"callThrough"
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

fn build_ctx(instance_id: u64, self_label: &str) -> Rc<DispatchContext> {
	let hooks = Rc::new(HookManager::disabled());
	let ctx = Rc::new(DispatchContext::new(instance_id, hooks, Value::Undefined, Value::Undefined, Binding::Scoped));
	let root = ApiNode::ready(NodeKind::Leaf(Value::String(self_label.into())), "", "module");
	ctx.set_root(root);
	ctx
}

fn as_string(value: &Value) -> &str {
	match value {
		Value::String(s) => s,
		other => panic!("expected string, got {other:?}"),
	}
}

#[test]
fn hooked_callable_snapshots_its_own_instances_root_as_self() {
	let ctx_a = build_ctx(1, "A");
	let callable_a = slothlet::dispatch::wrap_callable(Rc::new(EchoSelf), "echoSelf".to_string(), ctx_a);

	let result = callable_a.call(Value::Undefined, &[]).unwrap();
	assert_eq!(as_string(&result), "A");
}

#[test]
fn a_call_through_never_leaks_the_other_instances_self() {
	let ctx_a = build_ctx(1, "A");
	let ctx_b = build_ctx(2, "B");

	let echo_b = slothlet::dispatch::wrap_callable(Rc::new(EchoSelf), "echoSelf".to_string(), ctx_b);
	let call_through_a = slothlet::dispatch::wrap_callable(Rc::new(CallThrough { inner: echo_b }), "callThrough".to_string(), ctx_a);

	let result = call_through_a.call(Value::Undefined, &[]).unwrap();
	match result {
		Value::Array(pair) => {
			assert_eq!(as_string(&pair[0]), "B", "the nested call must see instance B's own root as self");
			assert_eq!(as_string(&pair[1]), "A", "the outer call's scope must be restored once the nested call returns");
		}
		other => panic!("expected array, got {other:?}"),
	}
}

#[test]
fn before_hook_short_circuit_skips_the_primary_but_after_and_always_still_observe_it() {
	let hooks = HookManager::new(true, None);
	let primary_ran = Rc::new(Cell::new(false));
	let always_saw: Rc<Cell<Option<f64>>> = Rc::new(Cell::new(None));

	hooks.on_before(
		"math.*",
		0,
		Rc::new(|_path, _args| BeforeOutcome::ShortCircuit(Value::Number(42.0))),
	);

	hooks.on_after(
		"math.*",
		0,
		Rc::new(|_path, value| match value {
			Value::Number(n) => Some(Value::Number(n + 1.0)),
			_ => None,
		}),
	);

	let always_saw_clone = Rc::clone(&always_saw);
	hooks.on_always(
		"math.*",
		0,
		Rc::new(move |_path, result, has_error, _errors| {
			assert!(!has_error);
			if let Some(Value::Number(n)) = result {
				always_saw_clone.set(Some(*n));
			}
		}),
	);

	let primary_ran_clone = Rc::clone(&primary_ran);
	let result = hooks
		.dispatch("math.add", &[Value::Number(1.0), Value::Number(2.0)], move |_args| {
			primary_ran_clone.set(true);
			Ok(Value::Number(3.0))
		})
		.unwrap();

	assert!(!primary_ran.get(), "a short-circuiting before hook must skip the primary body entirely");
	assert!(matches!(result, Value::Number(n) if n == 43.0), "after hooks still run on the short-circuited value");
	assert_eq!(always_saw.get(), Some(43.0), "always hooks observe the post-after result even when short-circuited");
}
