/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! Directory analyzer (C3): classifies one directory's immediate entries.

use std::path::{Path, PathBuf};

use slothlet_core::{sanitize, SanitizeOptions, SlothletError};

const MODULE_EXTENSIONS: [&str; 3] = ["js", "mjs", "cjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
	Empty,
	SingleFile,
	MultiFile,
}

/// One directory's immediate children, already filtered and ordered.
pub struct DirectoryDescriptor {
	pub strategy: Strategy,
	pub category_key: String,
	/// Lexicographically ordered module file paths.
	pub module_files: Vec<PathBuf>,
	/// Lexicographically ordered subdirectory paths.
	pub sub_dirs: Vec<PathBuf>,
	/// Filled in by the caller once it has run C2 over `module_files`: true
	/// iff two or more modules expose a default export.
	pub multi_default: bool,
	/// True iff `strategy == SingleFile` and the sole file's sanitized stem
	/// equals `category_key`.
	pub flatten_single: bool,
}

/// Runs C3 over `dir`: lists entries, drops hidden files, `addapi.*`
/// convention files, and anything outside the module-file extension set.
pub fn scan_directory(dir: &Path, opts: &SanitizeOptions) -> Result<DirectoryDescriptor, SlothletError> {
	tracing::debug!(dir = %dir.display(), "scanning directory");

	let mut module_files = Vec::new();
	let mut sub_dirs = Vec::new();

	let entries = std::fs::read_dir(dir).map_err(|e| SlothletError::io(dir, e))?;
	for entry in entries {
		let entry = entry.map_err(|e| SlothletError::io(dir, e))?;
		let path = entry.path();
		let file_type = entry.file_type().map_err(|e| SlothletError::io(&path, e))?;

		let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
			continue;
		};
		if name.starts_with('.') || name.starts_with("addapi.") {
			continue;
		}

		if file_type.is_dir() {
			sub_dirs.push(path);
		} else if file_type.is_file() {
			let is_module = path.extension().and_then(|e| e.to_str()).map(|ext| MODULE_EXTENSIONS.contains(&ext)).unwrap_or(false);
			if is_module {
				module_files.push(path);
			}
		}
	}

	module_files.sort();
	sub_dirs.sort();

	let strategy = if module_files.is_empty() && sub_dirs.is_empty() {
		Strategy::Empty
	} else if module_files.len() == 1 && sub_dirs.is_empty() {
		Strategy::SingleFile
	} else {
		Strategy::MultiFile
	};

	let category_key = dir.file_name().and_then(|n| n.to_str()).map(|name| sanitize(name, opts)).unwrap_or_default();

	let flatten_single = strategy == Strategy::SingleFile
		&& module_files.first().and_then(|p| p.file_stem()).and_then(|s| s.to_str()).map(|stem| sanitize(stem, opts))
			== Some(category_key.clone());

	tracing::trace!(dir = %dir.display(), category_key, ?strategy, flatten_single, "directory scanned");

	Ok(DirectoryDescriptor {
		strategy,
		category_key,
		module_files,
		sub_dirs,
		multi_default: false,
		flatten_single,
	})
}
