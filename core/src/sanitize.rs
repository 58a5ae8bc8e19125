/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Name sanitizer (C1): turns file and directory names into legal dot-path
//! identifier segments, with configurable acronym/casing rules.

/// A single casing rule. The `pattern` may be a literal, a glob (`*`, `?`),
/// or a boundary pattern `**X**` that only matches `X` when it is both
/// preceded and followed by other segment characters.
#[derive(Debug, Clone)]
pub struct Rule {
	pub pattern: String,
	pub kind: RuleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
	/// Case-sensitive literal/glob match; the segment is replaced verbatim.
	Leave,
	/// Case-insensitive literal/glob match; the segment is replaced verbatim.
	LeaveInsensitive,
	/// Segment is upper-cased wherever the pattern matches.
	Upper,
	/// Segment is lower-cased wherever the pattern matches.
	Lower,
}

#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
	/// Applied in the precedence documented on [`Rule`]: `Leave` before
	/// `LeaveInsensitive` before `Upper` before `Lower`.
	pub rules: Vec<Rule>,
	/// Lowercase the first character of the first segment when no rule matched it.
	pub lower_first: bool,
	/// Segments that are already fully upper-case are left alone.
	pub preserve_all_upper: bool,
	/// Segments that are already fully lower-case are left alone.
	pub preserve_all_lower: bool,
}

fn is_identifier_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_legal_identifier(s: &str) -> bool {
	let mut chars = s.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
		_ => return false,
	}
	chars.all(is_identifier_char)
}

/// Matches `text` against a glob `pattern` supporting `*` and `?`, or a
/// boundary pattern `**X**` that matches `X` only when flanked by other
/// segment characters (i.e. `text` both starts before and ends after the
/// literal `X`). Matching is whole-segment.
fn glob_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
	if let Some(inner) = pattern.strip_prefix("**").and_then(|p| p.strip_suffix("**")) {
		// Boundary form: X must appear with at least one char before and after.
		let haystack = if case_insensitive { text.to_lowercase() } else { text.to_string() };
		let needle = if case_insensitive { inner.to_lowercase() } else { inner.to_string() };
		if needle.is_empty() {
			return false;
		}
		if let Some(pos) = haystack.find(&needle) {
			return pos > 0 && pos + needle.len() < haystack.len();
		}
		return false;
	}
	glob_match_simple(pattern, text, case_insensitive)
}

fn glob_match_simple(pattern: &str, text: &str, case_insensitive: bool) -> bool {
	let pat: Vec<char> = if case_insensitive {
		pattern.to_lowercase().chars().collect()
	} else {
		pattern.chars().collect()
	};
	let txt: Vec<char> = if case_insensitive { text.to_lowercase().chars().collect() } else { text.chars().collect() };
	glob_match_chars(&pat, &txt)
}

fn glob_match_chars(pat: &[char], txt: &[char]) -> bool {
	match (pat.first(), txt.first()) {
		(None, None) => true,
		(None, Some(_)) => false,
		(Some('*'), _) => {
			// Try consuming zero or more characters from txt.
			for i in 0..=txt.len() {
				if glob_match_chars(&pat[1..], &txt[i..]) {
					return true;
				}
			}
			false
		}
		(Some('?'), Some(_)) => glob_match_chars(&pat[1..], &txt[1..]),
		(Some(p), Some(t)) if p == t => glob_match_chars(&pat[1..], &txt[1..]),
		_ => false,
	}
}

fn rule_matches(rule: &Rule, segment: &str) -> bool {
	match rule.kind {
		RuleKind::Leave => glob_match(&rule.pattern, segment, false),
		RuleKind::LeaveInsensitive | RuleKind::Upper | RuleKind::Lower => glob_match(&rule.pattern, segment, true),
	}
}

fn is_all_upper(s: &str) -> bool {
	s.chars().any(|c| c.is_alphabetic()) && s.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
}

fn is_all_lower(s: &str) -> bool {
	s.chars().any(|c| c.is_alphabetic()) && s.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_lowercase())
}

fn apply_rules(segment: &str, opts: &SanitizeOptions) -> String {
	if opts.preserve_all_upper && is_all_upper(segment) {
		return segment.to_string();
	}
	if opts.preserve_all_lower && is_all_lower(segment) {
		return segment.to_string();
	}

	for kind in [RuleKind::Leave, RuleKind::LeaveInsensitive, RuleKind::Upper, RuleKind::Lower] {
		for rule in opts.rules.iter().filter(|r| r.kind == kind) {
			if rule_matches(rule, segment) {
				return match kind {
					RuleKind::Leave | RuleKind::LeaveInsensitive => segment.to_string(),
					RuleKind::Upper => segment.to_uppercase(),
					RuleKind::Lower => segment.to_lowercase(),
				};
			}
		}
	}

	segment.to_string()
}

/// Splits `input` on any run of characters outside `[A-Za-z0-9_$]`.
fn split_segments(input: &str) -> Vec<String> {
	let mut segments = Vec::new();
	let mut current = String::new();
	for c in input.chars() {
		if is_identifier_char(c) {
			current.push(c);
		} else if !current.is_empty() {
			segments.push(std::mem::take(&mut current));
		}
	}
	if !current.is_empty() {
		segments.push(current);
	}
	segments
}

/// Converts `input` into a legal JS identifier. See C1 in the design for the
/// ordered algorithm. Every input maps to *some* legal identifier; there are
/// no failure modes.
pub fn sanitize(input: &str, opts: &SanitizeOptions) -> String {
	let rules_would_touch = opts.rules.iter().any(|r| rule_matches(r, input));
	if is_legal_identifier(input) && !rules_would_touch {
		return input.to_string();
	}

	let mut segments = split_segments(input);
	if segments.is_empty() {
		return "_".to_string();
	}

	// Strip leading digits from the first segment; prepend `_` if that empties it.
	{
		let first = &mut segments[0];
		let stripped: String = first.chars().skip_while(|c| c.is_ascii_digit()).collect();
		*first = if stripped.is_empty() { format!("_{first}") } else { stripped };
	}

	let mut out_segments: Vec<String> = Vec::with_capacity(segments.len());
	for (i, segment) in segments.iter().enumerate() {
		let touched_by_rule = opts.rules.iter().any(|r| rule_matches(r, segment));
		let mut transformed = apply_rules(segment, opts);
		if !touched_by_rule {
			let mut chars: Vec<char> = transformed.chars().collect();
			if !chars.is_empty() {
				if i == 0 {
					if opts.lower_first {
						chars[0] = chars[0].to_ascii_lowercase();
					}
				} else {
					chars[0] = chars[0].to_ascii_uppercase();
				}
			}
			transformed = chars.into_iter().collect();
		}
		out_segments.push(transformed);
	}

	out_segments.join("")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn passthrough_legal_identifier() {
		let opts = SanitizeOptions::default();
		assert_eq!(sanitize("math", &opts), "math");
	}

	#[test]
	fn camel_cases_across_separators() {
		let opts = SanitizeOptions::default();
		assert_eq!(sanitize("auto-flatten-math", &opts), "autoFlattenMath");
	}

	#[test]
	fn strips_leading_digits() {
		let opts = SanitizeOptions::default();
		assert_eq!(sanitize("123", &opts), "_");
		assert_eq!(sanitize("123abc", &opts), "abc");
	}

	#[test]
	fn empty_input_is_legal() {
		let opts = SanitizeOptions::default();
		assert_eq!(sanitize("", &opts), "_");
	}

	#[test]
	fn boundary_rule_preserves_acronym() {
		let opts = SanitizeOptions {
			rules: vec![Rule { pattern: "**IP**".to_string(), kind: RuleKind::Upper }],
			..Default::default()
		};
		assert_eq!(sanitize("auto-ip-address", &opts), "autoIPAddress");
	}
}
