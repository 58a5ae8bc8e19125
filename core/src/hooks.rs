/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Hook manager (C8): a pattern-matched pipeline of `before` / `after` /
//! `always` / `error` handlers wrapping every dispatched API call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Subset {
	Before,
	Primary,
	After,
}

/// What a `before` handler returned.
pub enum BeforeOutcome {
	/// Continue to the primary function unmodified.
	Continue,
	/// Replace the call's arguments.
	ReplaceArgs(Vec<Value>),
	/// Short-circuit: skip the primary function body and use this value as
	/// the result. `after` hooks still run, observing this value (§4.8).
	ShortCircuit(Value),
}

pub type BeforeHandler = Rc<dyn Fn(&str, &[Value]) -> BeforeOutcome>;
pub type AfterHandler = Rc<dyn Fn(&str, Value) -> Option<Value>>;
pub type AlwaysHandler = Rc<dyn Fn(&str, Option<&Value>, bool, &[String])>;
pub type ErrorHandler = Rc<dyn Fn(&str, &str, &str)>;

struct Registration<H> {
	id: u64,
	pattern: CompiledPattern,
	priority: i32,
	index: u64,
	handler: H,
}

/// Compiled shell-style glob over dot-joined paths: `*` (single segment
/// wildcard within a dot-segment, matching any run of non-dot characters),
/// `**` (matches any number of whole segments, including zero), `?` (single
/// character), brace expansion `{a,b}` (bounded to 10 levels of nesting),
/// and a leading `!` for negation.
#[derive(Clone)]
pub struct CompiledPattern {
	raw: String,
	negate: bool,
	alternatives: Vec<Vec<Tok>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Tok {
	Literal(char),
	Star,
	DoubleStar,
	Question,
}

impl CompiledPattern {
	pub fn compile(pattern: &str) -> Self {
		let (negate, body) = match pattern.strip_prefix('!') {
			Some(rest) => (true, rest),
			None => (false, pattern),
		};
		let expansions = expand_braces(body, 0);
		let alternatives = expansions.iter().map(|alt| tokenize(alt)).collect();
		CompiledPattern { raw: pattern.to_string(), negate, alternatives }
	}

	pub fn raw(&self) -> &str {
		&self.raw
	}

	pub fn matches(&self, path: &str) -> bool {
		let is_match = self.alternatives.iter().any(|toks| match_tokens(toks, path));
		is_match != self.negate
	}
}

/// Expands `{a,b}` groups, bounded to 10 levels of nesting (spec §4.8).
fn expand_braces(pattern: &str, depth: u32) -> Vec<String> {
	if depth > 10 {
		return vec![pattern.to_string()];
	}
	if let Some(open) = pattern.find('{') {
		// Find the matching close brace, respecting nested braces.
		let bytes = pattern.as_bytes();
		let mut level = 0i32;
		let mut close = None;
		for (i, &b) in bytes.iter().enumerate().skip(open) {
			match b {
				b'{' => level += 1,
				b'}' => {
					level -= 1;
					if level == 0 {
						close = Some(i);
						break;
					}
				}
				_ => {}
			}
		}
		let Some(close) = close else {
			return vec![pattern.to_string()];
		};
		let prefix = &pattern[..open];
		let inner = &pattern[open + 1..close];
		let suffix = &pattern[close + 1..];
		let options = split_top_level_commas(inner);
		let mut out = Vec::new();
		for opt in options {
			let candidate = format!("{prefix}{opt}{suffix}");
			out.extend(expand_braces(&candidate, depth + 1));
		}
		out
	} else {
		vec![pattern.to_string()]
	}
}

fn split_top_level_commas(s: &str) -> Vec<String> {
	let mut parts = Vec::new();
	let mut level = 0i32;
	let mut current = String::new();
	for c in s.chars() {
		match c {
			'{' => {
				level += 1;
				current.push(c);
			}
			'}' => {
				level -= 1;
				current.push(c);
			}
			',' if level == 0 => {
				parts.push(std::mem::take(&mut current));
			}
			_ => current.push(c),
		}
	}
	parts.push(current);
	parts
}

fn tokenize(pattern: &str) -> Vec<Tok> {
	let mut toks = Vec::new();
	let chars: Vec<char> = pattern.chars().collect();
	let mut i = 0;
	while i < chars.len() {
		if chars[i] == '*' {
			if i + 1 < chars.len() && chars[i + 1] == '*' {
				toks.push(Tok::DoubleStar);
				i += 2;
			} else {
				toks.push(Tok::Star);
				i += 1;
			}
		} else if chars[i] == '?' {
			toks.push(Tok::Question);
			i += 1;
		} else {
			toks.push(Tok::Literal(chars[i]));
			i += 1;
		}
	}
	toks
}

fn match_tokens(pattern: &[Tok], text: &str) -> bool {
	let text: Vec<char> = text.chars().collect();
	match_rec(pattern, &text)
}

fn match_rec(pattern: &[Tok], text: &[char]) -> bool {
	match pattern.first() {
		None => text.is_empty(),
		Some(Tok::DoubleStar) => {
			for i in 0..=text.len() {
				if match_rec(&pattern[1..], &text[i..]) {
					return true;
				}
			}
			false
		}
		Some(Tok::Star) => {
			// Single-segment wildcard: never crosses a '.'.
			let mut i = 0;
			loop {
				if match_rec(&pattern[1..], &text[i..]) {
					return true;
				}
				if i >= text.len() || text[i] == '.' {
					return false;
				}
				i += 1;
			}
		}
		Some(Tok::Question) => {
			if text.is_empty() || text[0] == '.' {
				false
			} else {
				match_rec(&pattern[1..], &text[1..])
			}
		}
		Some(Tok::Literal(c)) => {
			if text.first() == Some(c) {
				match_rec(&pattern[1..], &text[1..])
			} else {
				false
			}
		}
	}
}

struct Lists {
	before: Vec<Registration<BeforeHandler>>,
	after: Vec<Registration<AfterHandler>>,
	always: Vec<Registration<AlwaysHandler>>,
	error: Vec<Registration<ErrorHandler>>,
	next_id: u64,
	next_index: u64,
}

impl Default for Lists {
	fn default() -> Self {
		Lists { before: Vec::new(), after: Vec::new(), always: Vec::new(), error: Vec::new(), next_id: 1, next_index: 0 }
	}
}

/// The hook manager. One instance per slothlet API.
pub struct HookManager {
	lists: RefCell<Lists>,
	enabled: RefCell<bool>,
	allow_pattern: RefCell<Option<CompiledPattern>>,
}

fn sort_stable<H>(regs: &mut [Registration<H>]) {
	regs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.index.cmp(&b.index)));
}

impl HookManager {
	pub fn new(enabled: bool, allow_pattern: Option<&str>) -> Self {
		HookManager {
			lists: RefCell::new(Lists::default()),
			enabled: RefCell::new(enabled),
			allow_pattern: RefCell::new(allow_pattern.map(CompiledPattern::compile)),
		}
	}

	pub fn disabled() -> Self {
		HookManager::new(false, None)
	}

	pub fn enable(&self) {
		*self.enabled.borrow_mut() = true;
	}

	pub fn disable(&self) {
		*self.enabled.borrow_mut() = false;
	}

	pub fn is_enabled(&self) -> bool {
		*self.enabled.borrow()
	}

	fn path_allowed(&self, path: &str) -> bool {
		match &*self.allow_pattern.borrow() {
			Some(p) => p.matches(path),
			None => true,
		}
	}

	pub fn on_before(&self, pattern: &str, priority: i32, handler: BeforeHandler) -> u64 {
		let mut lists = self.lists.borrow_mut();
		let id = lists.next_id;
		lists.next_id += 1;
		let index = lists.next_index;
		lists.next_index += 1;
		lists.before.push(Registration { id, pattern: CompiledPattern::compile(pattern), priority, index, handler });
		sort_stable(&mut lists.before);
		id
	}

	pub fn on_after(&self, pattern: &str, priority: i32, handler: AfterHandler) -> u64 {
		let mut lists = self.lists.borrow_mut();
		let id = lists.next_id;
		lists.next_id += 1;
		let index = lists.next_index;
		lists.next_index += 1;
		lists.after.push(Registration { id, pattern: CompiledPattern::compile(pattern), priority, index, handler });
		sort_stable(&mut lists.after);
		id
	}

	pub fn on_always(&self, pattern: &str, priority: i32, handler: AlwaysHandler) -> u64 {
		let mut lists = self.lists.borrow_mut();
		let id = lists.next_id;
		lists.next_id += 1;
		let index = lists.next_index;
		lists.next_index += 1;
		lists.always.push(Registration { id, pattern: CompiledPattern::compile(pattern), priority, index, handler });
		sort_stable(&mut lists.always);
		id
	}

	pub fn on_error(&self, pattern: &str, priority: i32, handler: ErrorHandler) -> u64 {
		let mut lists = self.lists.borrow_mut();
		let id = lists.next_id;
		lists.next_id += 1;
		let index = lists.next_index;
		lists.next_index += 1;
		lists.error.push(Registration { id, pattern: CompiledPattern::compile(pattern), priority, index, handler });
		sort_stable(&mut lists.error);
		id
	}

	pub fn off(&self, id: u64) -> bool {
		let mut lists = self.lists.borrow_mut();
		let before_len = lists.before.len();
		lists.before.retain(|r| r.id != id);
		let after_len = lists.after.len();
		lists.after.retain(|r| r.id != id);
		let always_len = lists.always.len();
		lists.always.retain(|r| r.id != id);
		let error_len = lists.error.len();
		lists.error.retain(|r| r.id != id);
		before_len != lists.before.len()
			|| after_len != lists.after.len()
			|| always_len != lists.always.len()
			|| error_len != lists.error.len()
	}

	pub fn clear(&self) {
		*self.lists.borrow_mut() = Lists::default();
	}

	pub fn list(&self) -> Vec<(u64, String, Subset)> {
		let lists = self.lists.borrow();
		let mut out = Vec::new();
		for r in &lists.before {
			out.push((r.id, r.pattern.raw().to_string(), Subset::Before));
		}
		for r in &lists.after {
			out.push((r.id, r.pattern.raw().to_string(), Subset::After));
		}
		out
	}

	fn run_before(&self, path: &str, args: &[Value]) -> BeforeOutcome {
		let lists = self.lists.borrow();
		let mut current_args: Vec<Value> = args.to_vec();
		for reg in lists.before.iter().filter(|r| r.pattern.matches(path)) {
			match (reg.handler)(path, &current_args) {
				BeforeOutcome::Continue => {}
				BeforeOutcome::ReplaceArgs(new_args) => current_args = new_args,
				short @ BeforeOutcome::ShortCircuit(_) => return short,
			}
		}
		BeforeOutcome::ReplaceArgs(current_args)
	}

	fn run_after(&self, path: &str, mut result: Value) -> Value {
		let lists = self.lists.borrow();
		for reg in lists.after.iter().filter(|r| r.pattern.matches(path)) {
			// `undefined` from an after-hook means "keep prior result" (open
			// question in spec §9, resolved per the documented majority case).
			if let Some(next) = (reg.handler)(path, result.clone()) {
				result = next;
			}
		}
		result
	}

	fn run_always(&self, path: &str, result: Option<&Value>, has_error: bool, errors: &[String]) {
		let lists = self.lists.borrow();
		for reg in lists.always.iter().filter(|r| r.pattern.matches(path)) {
			(reg.handler)(path, result, has_error, errors);
		}
	}

	/// Publishes a non-fatal diagnostic (`CollisionWarning`, load errors
	/// during best-effort operations) through the `error` channel. Observers
	/// only; cannot suppress the underlying condition.
	pub fn publish_error(&self, path: &str, error: &str, source: &str) {
		if !self.is_enabled() {
			return;
		}
		let lists = self.lists.borrow();
		for reg in lists.error.iter().filter(|r| r.pattern.matches(path)) {
			(reg.handler)(path, error, source);
		}
	}

	/// Runs the full `before -> primary -> after -> always` pipeline around
	/// `primary`. This is the dispatch contract every materialized callable
	/// is wrapped in by the orchestrator (C10).
	pub fn dispatch(
		&self, path: &str, args: &[Value], primary: impl FnOnce(&[Value]) -> Result<Value, String>,
	) -> Result<Value, String> {
		if !self.is_enabled() || !self.path_allowed(path) {
			return primary(args);
		}

		let before_args = match self.run_before(path, args) {
			BeforeOutcome::Continue => args.to_vec(),
			BeforeOutcome::ReplaceArgs(a) => a,
			BeforeOutcome::ShortCircuit(value) => {
				let after_value = self.run_after(path, value);
				self.run_always(path, Some(&after_value), false, &[]);
				return Ok(after_value);
			}
		};

		match primary(&before_args) {
			Ok(value) => {
				let after_value = self.run_after(path, value);
				self.run_always(path, Some(&after_value), false, &[]);
				Ok(after_value)
			}
			Err(error) => {
				self.publish_error(path, &error, "primary");
				self.run_always(path, None, true, std::slice::from_ref(&error));
				Err(error)
			}
		}
	}
}
