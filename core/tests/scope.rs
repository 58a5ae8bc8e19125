/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::rc::Rc;

use slothlet_core::{current_scope, with_scope, HookManager, ScopeRecord, Value};

fn record(instance_id: u64, tag: &str) -> ScopeRecord {
	ScopeRecord {
		instance_id,
		self_: Value::String(Rc::from(tag)),
		context: Value::Undefined,
		reference: Value::Undefined,
		hooks: Rc::new(HookManager::disabled()),
	}
}

#[tokio::test(flavor = "current_thread")]
async fn reads_outside_any_scope_are_neutral() {
	let scope = current_scope();
	assert_eq!(scope.instance_id, 0);
	assert!(matches!(scope.self_, Value::Undefined));
}

#[tokio::test(flavor = "current_thread")]
async fn nested_scopes_restore_the_outer_record_on_exit() {
	with_scope(record(1, "outer"), async {
		assert_eq!(current_scope().instance_id, 1);
		with_scope(record(2, "inner"), async {
			assert_eq!(current_scope().instance_id, 2);
		})
		.await;
		assert_eq!(current_scope().instance_id, 1);
	})
	.await;
	assert_eq!(current_scope().instance_id, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn two_concurrent_instances_never_see_each_others_scope() {
	let local = tokio::task::LocalSet::new();
	let (ra, rb) = local
		.run_until(async {
			let a = tokio::task::spawn_local(with_scope(record(10, "A"), async {
				tokio::task::yield_now().await;
				current_scope().instance_id
			}));
			let b = tokio::task::spawn_local(with_scope(record(20, "B"), async {
				tokio::task::yield_now().await;
				current_scope().instance_id
			}));
			tokio::join!(a, b)
		})
		.await;
	assert_eq!(ra.unwrap(), 10);
	assert_eq!(rb.unwrap(), 20);
}
