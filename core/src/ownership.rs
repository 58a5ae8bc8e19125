/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Ownership registry (C9): arbitrates which `moduleId` may overwrite a
//! given API path, per the state machine
//! `absent -> owned-anon -> owned-by-M1 -> owned-by-M2 -> absent`.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::SlothletError;

/// `None` denotes the anonymous owner (an `addApi` call with no `moduleId`).
type OwnerSet = std::collections::HashSet<Option<String>>;

#[derive(Default)]
pub struct OwnershipRegistry {
	rows: RefCell<HashMap<String, OwnerSet>>,
}

pub struct ClaimOptions {
	pub module_id: Option<String>,
	pub allow_overwrite: bool,
	pub force_overwrite: bool,
	pub module_ownership_enabled: bool,
}

impl OwnershipRegistry {
	pub fn new() -> Self {
		OwnershipRegistry::default()
	}

	/// Attempts to record `module_id` (or anonymous) as an owner of `path`,
	/// applying the rules of spec §4.9. Returns the set of owners evicted by
	/// a `forceOverwrite`, for the caller to report/clean up.
	pub fn claim(&self, path: &str, opts: &ClaimOptions) -> Result<Vec<Option<String>>, SlothletError> {
		let mut rows = self.rows.borrow_mut();
		let existing = rows.get(path).cloned().unwrap_or_default();

		if existing.is_empty() {
			rows.entry(path.to_string()).or_default().insert(opts.module_id.clone());
			return Ok(Vec::new());
		}

		// Anonymous-owned paths may always be overwritten, subject only to
		// `allowApiOverwrite`.
		let anon_only = existing.len() == 1 && existing.contains(&None);
		if anon_only {
			if !opts.allow_overwrite {
				return Err(SlothletError::Config(format!(
					"overwrite of `{path}` rejected: allowApiOverwrite is false"
				)));
			}
			rows.insert(path.to_string(), std::iter::once(opts.module_id.clone()).collect());
			return Ok(existing.into_iter().collect());
		}

		let different_owner = !existing.contains(&opts.module_id);
		if different_owner {
			if !opts.force_overwrite {
				let owner_name = existing.iter().flatten().next().cloned().unwrap_or_else(|| "<anonymous>".to_string());
				let attempted = opts.module_id.clone().unwrap_or_else(|| "<anonymous>".to_string());
				return Err(SlothletError::Ownership { path: path.to_string(), owner: owner_name, attempted });
			}
			if !opts.module_ownership_enabled {
				return Err(SlothletError::Config(
					"forceOverwrite requires enableModuleOwnership".to_string(),
				));
			}
			rows.insert(path.to_string(), std::iter::once(opts.module_id.clone()).collect());
			return Ok(existing.into_iter().collect());
		}

		rows.entry(path.to_string()).or_default().insert(opts.module_id.clone());
		Ok(Vec::new())
	}

	/// Removes `module_id`'s ownership rows. The path itself is deleted only
	/// once its owner set becomes empty; returns `true` if the path was
	/// deleted.
	pub fn release(&self, path: &str, module_id: &Option<String>) -> bool {
		let mut rows = self.rows.borrow_mut();
		let Some(owners) = rows.get_mut(path) else {
			return false;
		};
		owners.remove(module_id);
		if owners.is_empty() {
			rows.remove(path);
			true
		} else {
			false
		}
	}

	/// Removes every row owned by `module_id`, returning the paths that were
	/// fully vacated as a result.
	pub fn release_all(&self, module_id: &Option<String>) -> Vec<String> {
		let mut rows = self.rows.borrow_mut();
		let mut vacated = Vec::new();
		for (path, owners) in rows.iter_mut() {
			owners.remove(module_id);
			if owners.is_empty() {
				vacated.push(path.clone());
			}
		}
		for path in &vacated {
			rows.remove(path);
		}
		vacated
	}

	pub fn owners_of(&self, path: &str) -> Vec<Option<String>> {
		self.rows.borrow().get(path).map(|s| s.iter().cloned().collect()).unwrap_or_default()
	}

	pub fn clear(&self) {
		self.rows.borrow_mut().clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opts(module_id: Option<&str>, force: bool, enable_ownership: bool) -> ClaimOptions {
		ClaimOptions {
			module_id: module_id.map(String::from),
			allow_overwrite: true,
			force_overwrite: force,
			module_ownership_enabled: enable_ownership,
		}
	}

	#[test]
	fn anonymous_then_anonymous_overwrite_succeeds() {
		let reg = OwnershipRegistry::new();
		reg.claim("plugins.a", &opts(None, false, false)).unwrap();
		reg.claim("plugins.a", &opts(None, false, false)).unwrap();
	}

	#[test]
	fn different_owner_without_force_is_rejected() {
		let reg = OwnershipRegistry::new();
		reg.claim("plugins.a", &opts(Some("A"), true, true)).unwrap();
		let err = reg.claim("plugins.a", &opts(Some("B"), false, true));
		assert!(err.is_err());
	}

	#[test]
	fn force_overwrite_requires_ownership_enabled() {
		let reg = OwnershipRegistry::new();
		reg.claim("plugins.a", &opts(Some("A"), true, true)).unwrap();
		let err = reg.claim("plugins.a", &opts(Some("B"), true, false));
		assert!(err.is_err());
	}

	#[test]
	fn force_overwrite_evicts_prior_owner() {
		let reg = OwnershipRegistry::new();
		reg.claim("plugins.a", &opts(Some("A"), true, true)).unwrap();
		let evicted = reg.claim("plugins.a", &opts(Some("B"), true, true)).unwrap();
		assert_eq!(evicted, vec![Some("A".to_string())]);
	}

	#[test]
	fn release_deletes_path_once_empty() {
		let reg = OwnershipRegistry::new();
		reg.claim("plugins.a", &opts(Some("A"), true, true)).unwrap();
		assert!(reg.release("plugins.a", &Some("A".to_string())));
		assert!(reg.owners_of("plugins.a").is_empty());
	}
}
