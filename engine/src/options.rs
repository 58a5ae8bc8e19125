/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The Rust shape of spec.md §6's options table, passed to
//! [`crate::create`].

use std::path::PathBuf;

use slothlet_core::{RuleKind, SanitizeOptions, Value};

/// Chooses C5 (eager) or C6 (lazy) at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
	Eager,
	#[default]
	Lazy,
}

/// C7's choice between scoped-storage bindings (the default, safe for any
/// number of concurrent instances) and the legacy shared-mutation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeModelOption {
	#[default]
	Scoped,
	Live,
}

/// The initial state of the hook manager (spec.md §6's `hooks` option).
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
	pub enabled: bool,
	pub allow_pattern: Option<String>,
}

impl HookConfig {
	pub fn enabled() -> Self {
		HookConfig { enabled: true, allow_pattern: None }
	}

	pub fn disabled() -> Self {
		HookConfig { enabled: false, allow_pattern: None }
	}
}

/// Options accepted by [`crate::create`]. Mirrors spec.md §6's table;
/// defaults match it exactly.
#[derive(Debug, Clone)]
pub struct CreateOptions {
	/// Source root. Relative paths are the caller's responsibility to
	/// resolve (spec.md's "relative from caller" note describes JS module
	/// resolution semantics that have no Rust analogue; callers pass an
	/// already-resolved path).
	pub dir: PathBuf,
	pub mode: Mode,
	/// Depth limit for C3. `None` means unbounded.
	pub api_depth: Option<usize>,
	pub allow_api_overwrite: bool,
	pub enable_module_ownership: bool,
	pub hot_reload: bool,
	pub hooks: HookConfig,
	pub context: Value,
	pub reference: Value,
	pub runtime: RuntimeModelOption,
	pub sanitize: SanitizeOptions,
	pub debug: bool,
}

impl CreateOptions {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		CreateOptions {
			dir: dir.into(),
			mode: Mode::default(),
			api_depth: None,
			allow_api_overwrite: true,
			enable_module_ownership: false,
			hot_reload: false,
			hooks: HookConfig::default(),
			context: Value::Undefined,
			reference: Value::Undefined,
			runtime: RuntimeModelOption::default(),
			sanitize: SanitizeOptions::default(),
			debug: false,
		}
	}

	pub fn lazy(mut self, lazy: bool) -> Self {
		self.mode = if lazy { Mode::Lazy } else { Mode::Eager };
		self
	}

	pub fn mode(mut self, mode: Mode) -> Self {
		self.mode = mode;
		self
	}

	pub fn api_depth(mut self, depth: usize) -> Self {
		self.api_depth = Some(depth);
		self
	}

	pub fn allow_api_overwrite(mut self, allow: bool) -> Self {
		self.allow_api_overwrite = allow;
		self
	}

	pub fn enable_module_ownership(mut self, enable: bool) -> Self {
		self.enable_module_ownership = enable;
		self
	}

	pub fn hot_reload(mut self, enable: bool) -> Self {
		self.hot_reload = enable;
		self
	}

	pub fn hooks(mut self, hooks: HookConfig) -> Self {
		self.hooks = hooks;
		self
	}

	pub fn context(mut self, context: Value) -> Self {
		self.context = context;
		self
	}

	pub fn reference(mut self, reference: Value) -> Self {
		self.reference = reference;
		self
	}

	pub fn runtime(mut self, runtime: RuntimeModelOption) -> Self {
		self.runtime = runtime;
		self
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	/// A sanitizer rule shorthand: `leave` an exact literal untouched
	/// regardless of casing options (spec.md §4.1's explicit-rule
	/// precedence).
	pub fn leave(mut self, literal: impl Into<String>) -> Self {
		self.sanitize.rules.push(slothlet_core::Rule { pattern: literal.into(), kind: RuleKind::Leave });
		self
	}
}
