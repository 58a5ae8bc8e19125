/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! slothlet: a filesystem-driven module loader. Materializes a directory
//! tree of script modules into a single dot-notation-navigable API,
//! eagerly or lazily, with per-instance `self`/`context`/`reference`
//! bindings, a before/after/always/error hook pipeline, and a runtime
//! mutation lifecycle (`addApi`/`removeApi`/`reloadApi`/`reload`).

pub mod analyzer;
pub mod build;
pub mod decision;
pub mod dispatch;
pub mod mutate;
pub mod options;
pub mod orchestrator;
pub mod script;

pub use mutate::AddApiOptions;
pub use options::{CreateOptions, HookConfig, Mode, RuntimeModelOption};
pub use orchestrator::{create, Api, DescribeEntry};

pub use slothlet_core::{
	current_scope, sanitize, with_scope, ApiNode, Callable, CollisionWarning, HookManager, Materializer, Namespace,
	NodeKind, NodeMetadata, OwnershipRegistry, Result, Rule, RuleKind, RuntimeModel, SanitizeOptions, ScopeRecord,
	SlothletError, Value,
};
