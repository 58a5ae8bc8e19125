/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The structural analyzer: C2 (module analyzer) and C3 (directory
//! analyzer). C4 (decision engine) consumes both and lives in
//! `crate::decision`.

pub mod directory;
pub mod module;

pub use directory::{scan_directory, DirectoryDescriptor, Strategy};
pub use module::{analyze_module, ModuleDescriptor};
