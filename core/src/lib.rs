/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Shared data model for slothlet: the name sanitizer (C1), the API node
//! representation used by both the eager and lazy builders (C5/C6), the
//! runtime binding layer (C7), the hook manager (C8), and the ownership
//! registry (C9's arbitration rules). The `slothlet` crate builds the
//! structural analyzer and orchestrator on top of these.

pub mod error;
pub mod hooks;
pub mod node;
pub mod ownership;
pub mod sanitize;
pub mod scope;
pub mod value;

pub use error::{CollisionWarning, Result, SlothletError};
pub use hooks::HookManager;
pub use node::{ApiNode, Materializer, Namespace, NodeKind, NodeMetadata};
pub use ownership::{ClaimOptions, OwnershipRegistry};
pub use sanitize::{sanitize, Rule, RuleKind, SanitizeOptions};
pub use scope::{current as current_scope, sync_with_scope, with_scope, LiveBinding, RuntimeModel, ScopeRecord};
pub use value::{Callable, Value};
