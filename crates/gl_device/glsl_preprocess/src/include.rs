// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{
	collections::HashMap,
	env,
	fs,
	io,
	path::{Path, PathBuf},
	rc::Rc,
};

use thiserror::Error;

/// Environment variable overriding the default include search path.
pub const INCLUDE_PATH_VAR: &str = "GL_DEVICE_INCLUDE_PATH";

#[derive(Debug, Error)]
pub enum IncludeError {
	#[error("could not read include file {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("include file {0:?} is empty")]
	Empty(PathBuf),
}

/// Named include bodies that take priority over the filesystem.
#[derive(Debug, Default, Clone)]
pub struct IncludeRegistry {
	entries: HashMap<String, Rc<str>>,
}

impl IncludeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `body` under `name`, replacing any previous entry.
	pub fn insert(&mut self, name: impl Into<String>, body: impl Into<Rc<str>>) {
		self.entries.insert(name.into(), body.into());
	}

	/// Register the contents of `path` under `name`.
	///
	/// Empty files are rejected.
	pub fn insert_from_file(
		&mut self,
		name: impl Into<String>,
		path: impl AsRef<Path>,
	) -> Result<(), IncludeError> {
		let path = path.as_ref();
		let body = fs::read_to_string(path).map_err(|source| IncludeError::Io {
			path: path.to_owned(),
			source,
		})?;

		if body.is_empty() {
			return Err(IncludeError::Empty(path.to_owned()))
		}

		self.insert(name, body);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<Rc<str>> {
		self.entries.get(name).cloned()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Ordered list of directories searched for include files.
#[derive(Debug, Clone)]
pub struct IncludePaths {
	dirs: Vec<PathBuf>,
}

impl Default for IncludePaths {
	fn default() -> Self {
		Self {
			dirs: vec![PathBuf::from("."), PathBuf::from("./shaders")],
		}
	}
}

impl IncludePaths {
	pub fn new(dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
		Self {
			dirs: dirs.into_iter().map(Into::into).collect(),
		}
	}

	/// Default paths, replaced by `GL_DEVICE_INCLUDE_PATH` when it is set.
	pub fn from_env() -> Self {
		match env::var_os(INCLUDE_PATH_VAR) {
			Some(value) if !value.is_empty() => Self::new(env::split_paths(&value)),
			_ => Self::default(),
		}
	}

	pub fn push(&mut self, dir: impl Into<PathBuf>) {
		self.dirs.push(dir.into());
	}

	pub fn dirs(&self) -> &[PathBuf] {
		&self.dirs
	}

	/// First existing file named `name` in the search directories.
	pub fn find(&self, name: &str) -> Option<PathBuf> {
		self.dirs.iter().map(|dir| dir.join(name)).find(|path| path.is_file())
	}
}
