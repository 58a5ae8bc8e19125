/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::path::PathBuf;

use thiserror::Error;

/// The error kinds a slothlet instance can raise, per the failure taxonomy
/// of the structural analyzer, materialization engine and mutation lifecycle.
#[derive(Debug, Error)]
pub enum SlothletError {
	/// A source module failed to parse or execute. Carries the offending path.
	#[error("failed to load module `{path}`: {source}")]
	Load {
		path: PathBuf,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync + 'static>,
	},

	/// Internal inconsistency detected by the decision engine. Never expected
	/// unless configuration is contradictory; fatal for the instance.
	#[error("decision engine inconsistency at `{path}`: {reason}")]
	Decision { path: String, reason: String },

	/// An `addApi` call targeted a path owned by a different module id.
	#[error("ownership violation at `{path}`: owned by `{owner}`, rejected for `{attempted}`")]
	Ownership { path: String, owner: String, attempted: String },

	/// Invalid options passed to `create`, `reload`, or `reloadApi`.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Filesystem I/O failure while scanning a directory or reading a module.
	#[error("i/o error at `{path}`: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The embedded script engine rejected a module's source text.
	#[error("script error in `{path}`: {message}")]
	Script { path: PathBuf, message: String },
}

impl SlothletError {
	pub fn load(path: impl Into<PathBuf>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
		SlothletError::Load { path: path.into(), source: Box::new(source) }
	}

	pub fn script(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
		SlothletError::Script { path: path.into(), message: message.into() }
	}

	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		SlothletError::Io { path: path.into(), source }
	}
}

/// Non-fatal diagnostics that are reported through the hook manager's `error`
/// channel rather than returned from a fallible call (spec §4.5, §4.9, §7).
#[derive(Debug, Clone)]
pub enum CollisionWarning {
	/// A module export and a subdirectory both wanted the same key; the
	/// subdirectory won because it had non-empty modules of its own.
	KeyShadowed { path: String, key: String },
	/// An `addApi` overwrite was rejected because `allowApiOverwrite` is false.
	OverwriteRejected { path: String },
}

impl std::fmt::Display for CollisionWarning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CollisionWarning::KeyShadowed { path, key } => {
				write!(f, "key `{key}` at `{path}` shadowed by a non-empty subdirectory; export dropped")
			}
			CollisionWarning::OverwriteRejected { path } => {
				write!(f, "overwrite of `{path}` rejected (allowApiOverwrite = false)")
			}
		}
	}
}

pub type Result<T> = std::result::Result<T, SlothletError>;
