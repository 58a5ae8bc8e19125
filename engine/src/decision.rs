/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Decision engine (C4): per module, emits a [`FlatteningDecision`].

use crate::analyzer::{DirectoryDescriptor, ModuleDescriptor};
use crate::script::DefaultKind;
use slothlet_core::SanitizeOptions;

/// Where C5/C6 place a module's contents, driving the boolean facade below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
	/// Rule 5: the module's default function becomes the API root; its
	/// named exports become root siblings.
	Root,
	/// Rule 2's named-only branch: each named export becomes a direct
	/// sibling key in the current directory's namespace (no `fileKey`
	/// segment).
	LiftNamedToCategory,
	/// Rule 3: the single matching named export's value replaces what
	/// would otherwise be a nested object at `categoryKey.fileKey`.
	ReplaceAtFileKey,
	/// Rule 4: the whole directory collapses into its parent's entry —
	/// this module's contents become the value at `parent.categoryKey`.
	CollapseDirectory,
	/// Rules 1, 2's defaulting branch, and 6: the module's full contents
	/// become a namespace at `categoryKey.fileKey`.
	Namespace,
}

/// Exactly one of `flatten_to_root`, `flatten_to_category`,
/// `preserve_as_namespace` is effective per decision. `placement` carries
/// the detail the boolean facade can't: spec.md §4.4 distinguishes three
/// different flattening targets that all set `should_flatten`.
#[derive(Debug, Clone)]
pub struct FlatteningDecision {
	pub should_flatten: bool,
	pub flatten_to_root: bool,
	pub flatten_to_category: bool,
	pub preserve_as_namespace: bool,
	pub use_auto_flattening: bool,
	pub placement: Placement,
	pub reason: &'static str,
}

impl FlatteningDecision {
	fn namespace(reason: &'static str) -> Self {
		FlatteningDecision {
			should_flatten: false,
			flatten_to_root: false,
			flatten_to_category: false,
			preserve_as_namespace: true,
			use_auto_flattening: false,
			placement: Placement::Namespace,
			reason,
		}
	}

	fn auto_flatten(placement: Placement, reason: &'static str) -> Self {
		FlatteningDecision {
			should_flatten: true,
			flatten_to_root: false,
			flatten_to_category: true,
			preserve_as_namespace: false,
			use_auto_flattening: true,
			placement,
			reason,
		}
	}

	fn root(reason: &'static str) -> Self {
		FlatteningDecision {
			should_flatten: true,
			flatten_to_root: true,
			flatten_to_category: false,
			preserve_as_namespace: false,
			use_auto_flattening: false,
			placement: Placement::Root,
			reason,
		}
	}
}

/// Runs C4 for one module within its containing directory.
///
/// Rule order follows spec.md §4.4 (self-referential, multi-default
/// context, single named export matching fileKey, single-file-directory
/// flatten, root contributor, traditional) with one reconciling
/// precondition: when the directory collapses to a single file whose own
/// fileKey equals the directory's categoryKey (§8 scenario 1 — `math/
/// math.mjs` exporting only `math`), that collapse is decided before the
/// self-referential rule is reached, since both rules describe the same
/// module shape but only one can fire and §8's worked example requires
/// the collapse. Outside a single-file directory the self-referential
/// rule keeps its documented priority (§8's boundary-behavior paragraph:
/// a self-referential module sharing a multi-file directory with a
/// default-exporting module stays nested).
pub fn decide(module: &ModuleDescriptor, directory: &DirectoryDescriptor, is_root: bool) -> FlatteningDecision {
	if directory.flatten_single && module.file_key == directory.category_key {
		return FlatteningDecision::auto_flatten(Placement::CollapseDirectory, "single-file directory collapse");
	}

	if module.self_referential {
		return FlatteningDecision::namespace("self-referential");
	}

	if directory.multi_default {
		if module.default_kind != DefaultKind::None {
			return FlatteningDecision::namespace("multi-default context: module keeps its own default namespace");
		}
		return FlatteningDecision::auto_flatten(
			Placement::LiftNamedToCategory,
			"multi-default context: named-only module lifts to category",
		);
	}

	if module.named_exports.len() == 1 && module.named_exports.keys().next() == Some(&module.file_key) {
		return FlatteningDecision::auto_flatten(Placement::ReplaceAtFileKey, "single named export matches fileKey");
	}

	if directory.flatten_single {
		return FlatteningDecision::auto_flatten(Placement::CollapseDirectory, "single-file directory, contents lifted to parent");
	}

	if is_root && module.default_kind == DefaultKind::Function {
		return FlatteningDecision::root("root contributor");
	}

	FlatteningDecision::namespace("traditional")
}

/// Counts runs of 2+ consecutive ASCII uppercase letters (`HTTP`, `IP`, ...).
/// A higher count means a key preserves more of a declared function name's
/// acronym casing.
fn acronym_run_count(s: &str) -> usize {
	let bytes = s.as_bytes();
	let mut count = 0;
	let mut run = 0;
	for b in bytes {
		if b.is_ascii_uppercase() {
			run += 1;
		} else {
			if run >= 2 {
				count += 1;
			}
			run = 0;
		}
	}
	if run >= 2 {
		count += 1;
	}
	count
}

/// Spec.md §4.4's function-name preference: when a function's own declared
/// name sanitizes to the same key as the derived `file_key` but differs in
/// acronym casing (`autoIP` vs `autoIp`), prefer whichever spelling keeps
/// more of its acronym runs intact, rather than always deferring to the
/// sanitized file name.
pub(crate) fn preferred_key(file_key: &str, declared_name: Option<&str>, opts: &SanitizeOptions) -> String {
	let Some(declared_name) = declared_name else {
		return file_key.to_string();
	};
	let sanitized_declared = slothlet_core::sanitize(declared_name, opts);
	if sanitized_declared.eq_ignore_ascii_case(file_key) && sanitized_declared != file_key && acronym_run_count(&sanitized_declared) > acronym_run_count(file_key) {
		return sanitized_declared;
	}
	file_key.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::analyzer::Strategy;
	use indexmap::IndexMap;
	use slothlet_core::Value;

	fn module(file_key: &str, self_referential: bool, default_kind: DefaultKind, named: &[&str]) -> ModuleDescriptor {
		let mut named_exports = IndexMap::new();
		for n in named {
			named_exports.insert(n.to_string(), Value::Undefined);
		}
		ModuleDescriptor {
			default_kind,
			default: None,
			named_exports,
			is_common_js: false,
			self_referential,
			should_wrap_as_callable: default_kind == DefaultKind::Function && !named.is_empty(),
			file_key: file_key.to_string(),
		}
	}

	fn directory(strategy: Strategy, category_key: &str, flatten_single: bool, multi_default: bool) -> DirectoryDescriptor {
		DirectoryDescriptor {
			strategy,
			category_key: category_key.to_string(),
			module_files: Vec::new(),
			sub_dirs: Vec::new(),
			multi_default,
			flatten_single,
		}
	}

	#[test]
	fn math_mjs_in_math_dir_collapses_instead_of_preserving() {
		let m = module("math", true, DefaultKind::None, &["math"]);
		let d = directory(Strategy::SingleFile, "math", true, false);
		let decision = decide(&m, &d, false);
		assert!(decision.should_flatten);
		assert_eq!(decision.placement, Placement::CollapseDirectory);
	}

	#[test]
	fn self_referential_in_multi_file_directory_preserves() {
		let m = module("selfObject", true, DefaultKind::None, &["selfObject"]);
		let d = directory(Strategy::MultiFile, "advanced", false, false);
		let decision = decide(&m, &d, false);
		assert!(decision.preserve_as_namespace);
		assert_eq!(decision.reason, "self-referential");
	}

	#[test]
	fn root_function_default_becomes_root_contributor() {
		let m = module("index", false, DefaultKind::Function, &["rootFunctionShout"]);
		let d = directory(Strategy::SingleFile, "", false, false);
		let decision = decide(&m, &d, true);
		assert!(decision.flatten_to_root);
	}

	#[test]
	fn multi_default_module_with_default_keeps_own_namespace() {
		let m = module("alpha", false, DefaultKind::Function, &[]);
		let d = directory(Strategy::MultiFile, "plugins", false, true);
		let decision = decide(&m, &d, false);
		assert!(decision.preserve_as_namespace);
	}

	#[test]
	fn multi_default_named_only_module_lifts_to_category() {
		let m = module("beta", false, DefaultKind::None, &["helper"]);
		let d = directory(Strategy::MultiFile, "plugins", false, true);
		let decision = decide(&m, &d, false);
		assert!(decision.should_flatten);
		assert_eq!(decision.placement, Placement::LiftNamedToCategory);
	}

	#[test]
	fn single_named_export_matching_file_key_replaces_at_file_key() {
		let m = module("circle", false, DefaultKind::None, &["circle"]);
		let d = directory(Strategy::MultiFile, "shapes", false, false);
		let decision = decide(&m, &d, false);
		assert_eq!(decision.placement, Placement::ReplaceAtFileKey);
	}

	#[test]
	fn preferred_key_keeps_the_declared_names_acronym_casing() {
		let opts = slothlet_core::SanitizeOptions::default();
		assert_eq!(preferred_key("autoip", Some("autoIP"), &opts), "autoIP");
		// Same casing either way: no preference, file_key wins (status quo).
		assert_eq!(preferred_key("add", Some("add"), &opts), "add");
		// Genuinely different names (not just a casing mismatch): file_key wins.
		assert_eq!(preferred_key("helper", Some("doStuff"), &opts), "helper");
	}

	#[test]
	fn acronym_run_count_counts_runs_not_letters() {
		assert_eq!(acronym_run_count("autoIP"), 1);
		assert_eq!(acronym_run_count("autoip"), 0);
		assert_eq!(acronym_run_count("HTTPSUrl"), 1);
		assert_eq!(acronym_run_count("plain"), 0);
	}
}
