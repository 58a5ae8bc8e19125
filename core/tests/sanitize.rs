/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use slothlet_core::{sanitize, Rule, RuleKind, SanitizeOptions};

#[test]
fn boundary_cases_always_produce_legal_identifiers() {
	let opts = SanitizeOptions::default();
	for input in ["", "123", "-", "__", "$", "a-b-c", "9lives"] {
		let out = sanitize(input, &opts);
		assert!(!out.is_empty());
		let mut chars = out.chars();
		let first = chars.next().unwrap();
		assert!(first.is_ascii_alphabetic() || first == '_' || first == '$');
		assert!(chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'));
	}
}

#[test]
fn explicit_leave_rule_wins_over_casing() {
	let opts = SanitizeOptions {
		rules: vec![Rule { pattern: "XMLHttp".to_string(), kind: RuleKind::Leave }],
		lower_first: true,
		..Default::default()
	};
	assert_eq!(sanitize("XMLHttp", &opts), "XMLHttp");
}

#[test]
fn lower_first_only_affects_first_segment() {
	let opts = SanitizeOptions { lower_first: true, ..Default::default() };
	assert_eq!(sanitize("Auto-Flatten", &opts), "autoFlatten");
}
