// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

//! Shader sources looked up by `Effect.Section` keys.
//!
//! An effect is a single file holding several shaders, each introduced
//! by a line starting with `--`:
//!
//! ```glsl
//! -- Vertex
//! layout(location = 0) in vec2 pos;
//! void main() { gl_Position = vec4(pos, 0.0, 1.0); }
//!
//! -- Fragment
//! out vec4 color;
//! void main() { color = vec4(1.0); }
//! ```
//!
//! With the default prefix and suffix, `Blur.Vertex` is the `Vertex`
//! section of `./shaders/Blur.glsl`.

use std::{cell::RefCell, collections::HashMap, env, fs, io, rc::Rc};

use thiserror::Error;

/// Environment variable overriding the default effect path prefix.
pub const SHADER_PREFIX_VAR: &str = "GL_DEVICE_SHADER_PREFIX";

#[derive(Debug, Error)]
pub enum LibraryError {
	#[error("invalid shader key \"{0}\", expected `Effect.Section`")]
	InvalidKey(String),
	#[error("could not read effect file \"{path}\": {source}")]
	Io {
		path: String,
		#[source]
		source: io::Error,
	},
	#[error("shader \"{key}\" not found in \"{file}\"")]
	NotFound { key: String, file: String },
}

/// A shader section, ready for preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
	pub key: String,
	/// path of the effect file the section was read from
	pub file: Rc<String>,
	/// directives matching `key`, one per line
	pub directives: String,
	pub text: String,
	/// line of `text`'s first line within `file`
	pub first_line: usize,
}

struct Section {
	text: String,
	first_line: usize,
}

struct Effect {
	file: Rc<String>,
	sections: HashMap<String, Section>,
}

pub struct ShaderLibrary {
	prefix: String,
	suffix: String,
	directives: Vec<(String, String)>,
	effects: RefCell<HashMap<String, Rc<Effect>>>,
}

impl Default for ShaderLibrary {
	fn default() -> Self {
		Self::new("./shaders/", ".glsl")
	}
}

impl ShaderLibrary {
	/// Effect `name` is read from `prefix + name + suffix`.
	pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			suffix: suffix.into(),
			directives: Vec::new(),
			effects: RefCell::new(HashMap::new()),
		}
	}

	/// Default library, with the prefix taken from `GL_DEVICE_SHADER_PREFIX` if set.
	pub fn from_env() -> Self {
		match env::var(SHADER_PREFIX_VAR) {
			Ok(prefix) if !prefix.is_empty() => Self::new(prefix, ".glsl"),
			_ => Self::default(),
		}
	}

	/// Prepend `directive` to every shader whose key starts with `token`.
	///
	/// The token `*` matches every key. Directives are emitted in the
	/// order they were added.
	pub fn add_directive(&mut self, token: impl Into<String>, directive: impl Into<String>) {
		self.directives.push((token.into(), directive.into()));
	}

	/// Forget parsed effects so the next lookup rereads them from disk.
	pub fn clear_cache(&self) {
		self.effects.borrow_mut().clear();
	}

	pub fn get_shader(&self, key: &str) -> Result<ShaderSource, LibraryError> {
		let (effect_name, section_name) = key
			.split_once('.')
			.filter(|(effect, section)| !effect.is_empty() && !section.is_empty())
			.ok_or_else(|| LibraryError::InvalidKey(key.to_owned()))?;

		let effect = self.load(effect_name)?;
		let section = effect.sections.get(section_name).ok_or_else(|| LibraryError::NotFound {
			key: key.to_owned(),
			file: effect.file.to_string(),
		})?;

		let directives = self
			.directives
			.iter()
			.filter(|(token, _)| token == "*" || key.starts_with(token.as_str()))
			.map(|(_, directive)| format!("{directive}\n"))
			.collect::<String>();

		Ok(ShaderSource {
			key: key.to_owned(),
			file: effect.file.clone(),
			directives,
			text: section.text.clone(),
			first_line: section.first_line,
		})
	}

	fn load(&self, effect_name: &str) -> Result<Rc<Effect>, LibraryError> {
		if let Some(effect) = self.effects.borrow().get(effect_name) {
			return Ok(effect.clone())
		}

		let path = format!("{}{}{}", self.prefix, effect_name, self.suffix);
		let contents = fs::read_to_string(&path).map_err(|source| LibraryError::Io {
			path: path.clone(),
			source,
		})?;

		let effect = Rc::new(parse_effect(Rc::new(path), &contents));
		self.effects.borrow_mut().insert(effect_name.to_owned(), effect.clone());
		Ok(effect)
	}
}

fn parse_effect(file: Rc<String>, contents: &str) -> Effect {
	let mut sections = HashMap::<String, Section>::new();
	let mut current = Option::<(String, Section)>::None;

	let mut finish = |current: Option<(String, Section)>| {
		if let Some((name, section)) = current {
			if sections.contains_key(&name) {
				log::warn!("{file}: duplicate section \"{name}\" ignored");
			} else {
				sections.insert(name, section);
			}
		}
	};

	for (y, line) in contents.lines().enumerate() {
		if let Some(name) = line.strip_prefix("--") {
			finish(current.take());

			let name = name.trim();
			if name.is_empty() {
				log::warn!("{file}:{}: unnamed section ignored", y + 1);
				continue
			}

			current = Some((name.to_owned(), Section {
				text: String::new(),
				first_line: y + 2,
			}));
		} else if let Some((_, section)) = &mut current {
			section.text.push_str(line);
			section.text.push('\n');
		}
	}
	finish(current);

	Effect { file, sections }
}
