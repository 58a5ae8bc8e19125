/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! End-to-end builds over a small fixture tree, covering §8's auto-flatten
//! and root-contributor worked examples through the public `create()` entry
//! point rather than the builder internals directly.

use std::io::Write;
use std::path::Path;

use slothlet::options::{CreateOptions, Mode};
use slothlet::orchestrator::create;
use slothlet_core::{NodeKind, Value};

fn write_module(dir: &Path, name: &str, source: &str) {
	std::fs::create_dir_all(dir).unwrap();
	let mut file = std::fs::File::create(dir.join(name)).unwrap();
	file.write_all(source.as_bytes()).unwrap();
}

fn fixture_tree(tag: &str) -> std::path::PathBuf {
	let tmp = std::env::temp_dir().join(format!("slothlet-fixtures-{tag}-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	write_module(
		&tmp,
		"index.mjs",
		r#"
		export default function greet(name) { return "Hello, " + name + "!"; }
		export function shout(name) { return name.toUpperCase(); }
		"#,
	);
	write_module(
		&tmp.join("math"),
		"math.mjs",
		"export const math = { add: (a, b) => a + b, multiply: (a, b) => a * b };",
	);
	write_module(&tmp.join("shapes"), "circle.mjs", "export const circle = { kind: 'circle' };");
	write_module(&tmp.join("shapes"), "square.mjs", "export const square = { kind: 'square' };");
	write_module(&tmp.join("advanced"), "stats.mjs", "export function mean(xs) { return xs.reduce((a, b) => a + b, 0) / xs.length; }");

	tmp
}

async fn assert_fixture_shape(mode: Mode) {
	// Best-effort: lets `RUST_LOG=slothlet=trace` surface the per-directory
	// scan/decision spans while iterating on this test; harmless if a
	// subscriber is already installed by another test in the same binary.
	let _ = tracing_subscriber::fmt::try_init();

	let tmp = fixture_tree(if mode == Mode::Eager { "eager" } else { "lazy" });
	let options = CreateOptions::new(&tmp).mode(mode);
	let api = create(options).unwrap();

	// Root contributor: `index.mjs`'s default export becomes the callable root.
	let root = api.root();
	root.with_kind(|kind| match kind {
		NodeKind::Callable { call, properties } => {
			assert!(properties.contains_key("shout"));
			let greeting = call.call(Value::Undefined, &[Value::String("World".into())]).unwrap();
			assert!(matches!(greeting, Value::String(s) if &*s == "Hello, World!"));
		}
		other => panic!("expected callable root, got {other:?}"),
	});

	// `math/math.mjs` collapses into the parent directory: `math.add`/`math.multiply`.
	let add = api.get("math.add").await.unwrap().expect("math.add should resolve");
	add.with_kind(|kind| match kind {
		NodeKind::Callable { call, .. } => {
			let sum = call.call(Value::Undefined, &[Value::Number(2.0), Value::Number(3.0)]).unwrap();
			assert!(matches!(sum, Value::Number(n) if n == 5.0));
		}
		other => panic!("expected callable, got {other:?}"),
	});

	// `shapes/circle.mjs`'s single named export matching its own file key
	// replaces the would-be nested object at `shapes.circle`.
	let circle = api.get("shapes.circle").await.unwrap().expect("shapes.circle should resolve");
	circle.with_kind(|kind| match kind {
		NodeKind::Leaf(Value::Object(obj)) => assert!(obj.contains_key("kind")),
		other => panic!("expected leaf object, got {other:?}"),
	});

	// `advanced/stats.mjs` has no name collision with its directory, so it
	// nests traditionally at `advanced.stats.mean`.
	let mean = api.get("advanced.stats.mean").await.unwrap().expect("advanced.stats.mean should resolve");
	mean.with_kind(|kind| assert!(matches!(kind, NodeKind::Callable { .. })));

	assert!(api.get("does.not.exist").await.unwrap().is_none());

	std::fs::remove_dir_all(&tmp).ok();
}

#[tokio::test(flavor = "current_thread")]
async fn eager_build_matches_the_worked_fixture_shape() {
	assert_fixture_shape(Mode::Eager).await;
}

#[tokio::test(flavor = "current_thread")]
async fn lazy_build_matches_the_worked_fixture_shape() {
	assert_fixture_shape(Mode::Lazy).await;
}

/// §8 scenario 3: a function reached through `self` stays callable from
/// script, not just readable as data. `ops.mjs`/`bridge.mjs` deliberately
/// export under a name that differs from their own file stem, so neither
/// module is self-referential and each nests traditionally under its
/// directory instead of flattening — keeping this fixture's shape
/// unambiguous regardless of how a same-named module would be decided.
#[tokio::test(flavor = "current_thread")]
async fn self_can_call_back_into_a_sibling_function() {
	let tmp = std::env::temp_dir().join(format!("slothlet-fixtures-self-call-{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&tmp);

	write_module(&tmp.join("math"), "ops.mjs", "export function add(a, b) { return a + b; }");
	write_module(
		&tmp.join("advanced"),
		"bridge.mjs",
		"export function addViaSelf(a, b) { return self.math.add(a, b); }",
	);

	let options = CreateOptions::new(&tmp).mode(Mode::Eager);
	let api = create(options).unwrap();

	let bridge = api.get("advanced.addViaSelf").await.unwrap().expect("advanced.addViaSelf should resolve");
	bridge.with_kind(|kind| match kind {
		NodeKind::Callable { call, .. } => {
			let sum = call.call(Value::Undefined, &[Value::Number(5.0), Value::Number(3.0)]).unwrap();
			assert!(matches!(sum, Value::Number(n) if n == 8.0), "self.math.add should be callable from script, not undefined");
		}
		other => panic!("expected callable, got {other:?}"),
	});

	std::fs::remove_dir_all(&tmp).ok();
}
