/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! End-to-end coverage of C9's mutation lifecycle: `addApi`'s ownership
//! arbitration (§8 scenario 4), `removeApi`, `reloadApi`'s replay, and
//! `reload()`'s identity-preserving rebuild (§8 scenario 5).

use std::io::Write;
use std::path::Path;

use slothlet::mutate::AddApiOptions;
use slothlet::options::{CreateOptions, Mode};
use slothlet::orchestrator::create;
use slothlet_core::{ApiNode, NodeKind, SlothletError, Value};

fn write_module(dir: &Path, name: &str, source: &str) {
	std::fs::create_dir_all(dir).unwrap();
	let mut file = std::fs::File::create(dir.join(name)).unwrap();
	file.write_all(source.as_bytes()).unwrap();
}

fn call_string(node: &ApiNode) -> String {
	node.with_kind(|kind| match kind {
		NodeKind::Callable { call, .. } => match call.call(Value::Undefined, &[]).unwrap() {
			Value::String(s) => s.to_string(),
			other => panic!("expected string, got {other:?}"),
		},
		other => panic!("expected callable, got {other:?}"),
	})
	.unwrap()
}

#[tokio::test(flavor = "current_thread")]
async fn add_api_merges_a_folder_at_an_arbitrary_path() {
	let tmp = std::env::temp_dir().join(format!("slothlet-mutation-add-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	// `greet.mjs`'s named export is `sayHi`, distinct from its own file
	// stem, so it nests traditionally at `<apiPath>.greet.sayHi` rather
	// than tripping C4's self-referential rule.
	let plugin_dir = tmp.join("plugin");
	write_module(&plugin_dir, "greet.mjs", "export function sayHi() { return 'hi from plugin'; }");

	let api = create(CreateOptions::new(&tmp).mode(Mode::Eager)).unwrap();
	api.add_api("plugins.demo", &plugin_dir, AddApiOptions::default()).await.unwrap();

	let say_hi = api.get("plugins.demo.greet.sayHi").await.unwrap().expect("plugins.demo.greet.sayHi should resolve");
	assert_eq!(call_string(&say_hi), "hi from plugin");

	std::fs::remove_dir_all(&tmp).ok();
}

#[tokio::test(flavor = "current_thread")]
async fn ownership_rules_distinguish_conflict_from_misconfiguration() {
	let tmp = std::env::temp_dir().join(format!("slothlet-mutation-own-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	let folder_a = tmp.join("a");
	write_module(&folder_a, "value.mjs", "export function getValue() { return 'a'; }");
	let folder_b = tmp.join("b");
	write_module(&folder_b, "value.mjs", "export function getValue() { return 'b'; }");

	let api = create(CreateOptions::new(&tmp).mode(Mode::Eager)).unwrap();

	let owned_by_a = AddApiOptions { module_id: Some("moduleA".to_string()), ..AddApiOptions::default() };
	api.add_api("shared", &folder_a, owned_by_a).await.unwrap();

	// A different owner without `force_overwrite` is a genuine ownership
	// conflict: `SlothletError::Ownership`.
	let owned_by_b = AddApiOptions { module_id: Some("moduleB".to_string()), force_overwrite: false, ..AddApiOptions::default() };
	let err = api.add_api("shared", &folder_b, owned_by_b).await.unwrap_err();
	assert!(matches!(err, SlothletError::Ownership { .. }));

	// Forcing the overwrite without opting into module ownership is a
	// misconfiguration, not an ownership dispute: `SlothletError::Config`.
	let forced_without_ownership =
		AddApiOptions { module_id: Some("moduleB".to_string()), force_overwrite: true, module_ownership_enabled: false, ..AddApiOptions::default() };
	let err = api.add_api("shared", &folder_b, forced_without_ownership).await.unwrap_err();
	assert!(matches!(err, SlothletError::Config(_)));

	// Forcing with ownership tracking enabled succeeds and evicts `moduleA`.
	let forced_with_ownership =
		AddApiOptions { module_id: Some("moduleB".to_string()), force_overwrite: true, module_ownership_enabled: true, ..AddApiOptions::default() };
	api.add_api("shared", &folder_b, forced_with_ownership).await.unwrap();

	let value = api.get("shared.value.getValue").await.unwrap().expect("shared.value.getValue should resolve");
	assert_eq!(call_string(&value), "b");

	std::fs::remove_dir_all(&tmp).ok();
}

#[tokio::test(flavor = "current_thread")]
async fn remove_api_detaches_the_subtree() {
	let tmp = std::env::temp_dir().join(format!("slothlet-mutation-remove-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	let plugin_dir = tmp.join("plugin");
	write_module(&plugin_dir, "greet.mjs", "export function sayHi() { return 'hi'; }");

	let api = create(CreateOptions::new(&tmp).mode(Mode::Eager)).unwrap();
	api.add_api("plugins.demo", &plugin_dir, AddApiOptions::default()).await.unwrap();
	assert!(api.get("plugins.demo.greet.sayHi").await.unwrap().is_some());

	api.remove_api(Some("plugins.demo"), None).await.unwrap();
	assert!(api.get("plugins.demo.greet.sayHi").await.unwrap().is_none());

	std::fs::remove_dir_all(&tmp).ok();
}

#[tokio::test(flavor = "current_thread")]
async fn reload_api_replays_registrations_and_picks_up_folder_changes() {
	let tmp = std::env::temp_dir().join(format!("slothlet-mutation-reloadapi-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	let plugin_dir = tmp.join("plugin");
	write_module(&plugin_dir, "greet.mjs", "export function sayHi() { return 'v1'; }");

	let api = create(CreateOptions::new(&tmp).mode(Mode::Eager).hot_reload(true)).unwrap();
	api.add_api("plugins.demo", &plugin_dir, AddApiOptions::default()).await.unwrap();
	assert_eq!(call_string(&api.get("plugins.demo.greet.sayHi").await.unwrap().unwrap()), "v1");

	write_module(&plugin_dir, "greet.mjs", "export function sayHi() { return 'v2'; }");
	api.reload_api("plugins.demo").await.unwrap();
	assert_eq!(call_string(&api.get("plugins.demo.greet.sayHi").await.unwrap().unwrap()), "v2");

	std::fs::remove_dir_all(&tmp).ok();
}

#[tokio::test(flavor = "current_thread")]
async fn reload_rebuilds_in_place_and_regenerates_the_instance_id() {
	let tmp = std::env::temp_dir().join(format!("slothlet-mutation-reload-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	// A single-file directory named after its own module collapses
	// directly into the parent (C5's single-file-directory rule), so
	// `greet` resolves straight to the callable.
	write_module(&tmp.join("greet"), "greet.mjs", "export default function greet() { return 'v1'; }");

	let api = create(CreateOptions::new(&tmp).mode(Mode::Eager).hot_reload(true)).unwrap();
	let root_before = api.root().clone();
	let first_id = api.instance_id();
	assert_eq!(call_string(&api.get("greet").await.unwrap().unwrap()), "v1");

	write_module(&tmp.join("greet"), "greet.mjs", "export default function greet() { return 'v2'; }");
	api.reload().await.unwrap();

	// I3/I4: the outer `ApiNode` handle a caller already holds keeps its
	// identity across reload; only its contents rebind.
	assert!(ApiNode::ptr_eq(&root_before, api.root()));
	assert_ne!(first_id, api.instance_id());
	assert_eq!(call_string(&api.get("greet").await.unwrap().unwrap()), "v2");

	std::fs::remove_dir_all(&tmp).ok();
}
