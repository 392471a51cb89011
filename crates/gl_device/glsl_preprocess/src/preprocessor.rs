// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{collections::HashMap, fmt::Debug, fs, rc::Rc};

use crate::{
	include::{IncludePaths, IncludeRegistry},
	line_map::{LineId, LineMap},
};

#[cfg(test)]
mod test;

#[derive(Clone)]
pub struct SourceSpan {
	pub file: Rc<String>,
	/// 1-based
	pub line: usize,
	pub snip: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{span:?}: {ty}")]
pub struct PreprocError {
	pub ty: PreprocErrorType,
	pub span: SourceSpan,
}

#[derive(Debug, thiserror::Error)]
pub enum PreprocErrorType {
	#[error("unknown directive")]
	UnknownDirective,
	#[error("malformed directive: {0}")]
	Malformed(&'static str),
	#[error("match target undefined: {0}")]
	UndefinedTarget(String),
	#[error("case not covered: {0}")]
	MissedCase(String),
	#[error("duplicate case: {0}")]
	DuplicateCase(String),
	#[error("undefined substitution: ${0}")]
	Undefined(String),
	#[error("include not found in registry or search paths: {0}")]
	UnresolvedInclude(String),
	#[error("recursive include: {0}")]
	IncludeCycle(String),
	#[error("could not read include {name}: {source}")]
	Io {
		name: String,
		#[source]
		source: std::io::Error,
	},
	#[error("{0}")]
	Other(&'static str),
}

impl Debug for SourceSpan {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}: {}", self.file, self.line, self.snip)
	}
}

/// Expands includes and variant directives in GLSL source.
///
/// ```text
/// #include "lighting.glsl"
/// @define SAMPLES 4
/// @match quality
/// @case low
/// const int taps = 1;
/// @case high | ultra
/// const int taps = $SAMPLES;
/// @endmatch
/// ```
pub struct Preprocessor<'p> {
	registry: &'p IncludeRegistry,
	paths: &'p IncludePaths,
	defines: HashMap<String, String>,
}

enum WriteState {
	Error(&'static str),
	Skip,
	Write,
}

struct MatchBlock {
	target_case: String,
	hit_cases: Vec<String>,
	/// set when the enclosing block is being skipped
	inert: bool,
	span: SourceSpan,
	write: WriteState,
}

struct Expansion<'p> {
	registry: &'p IncludeRegistry,
	paths: &'p IncludePaths,
	defines: HashMap<String, String>,
	include_stack: Vec<String>,
	output: String,
	line_map: LineMap,
}

impl<'p> Preprocessor<'p> {
	pub fn new(registry: &'p IncludeRegistry, paths: &'p IncludePaths) -> Self {
		Self {
			registry,
			paths,
			defines: HashMap::new(),
		}
	}

	pub fn define(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
		self.defines.insert(key.into(), value.into());
		self
	}

	pub fn defines(&self) -> &HashMap<String, String> {
		&self.defines
	}

	/// Preprocess `source`, reported as `name` starting at line `first_line`.
	///
	/// `@define`s made while processing do not leak back into `self`.
	pub fn preprocess(
		&self,
		name: &str,
		source: &str,
		first_line: usize,
	) -> Result<(String, LineMap), PreprocError> {
		let mut expansion = Expansion {
			registry: self.registry,
			paths: self.paths,
			defines: self.defines.clone(),
			include_stack: Vec::new(),
			output: String::with_capacity(source.len()),
			line_map: LineMap::new(),
		};

		expansion.expand(Rc::new(name.to_owned()), source, first_line)?;
		Ok((expansion.output, expansion.line_map))
	}
}

impl Expansion<'_> {
	fn expand(
		&mut self,
		file: Rc<String>,
		source: &str,
		first_line: usize,
	) -> Result<(), PreprocError> {
		self.include_stack.push(file.to_string());
		let mut blocks = Vec::<MatchBlock>::new();

		for (y, line) in source.lines().enumerate() {
			let span = || SourceSpan {
				file: file.clone(),
				line: first_line + y,
				snip: line.to_owned(),
			};
			let error = |ty| PreprocError { ty, span: span() };

			let trimmed = line.trim_start();

			if let Some(args) = include_args(trimmed) {
				if !Self::writable(&blocks).map_err(|e| error(PreprocErrorType::Other(e)))? {
					continue
				}

				let name = parse_include_name(args).ok_or_else(|| {
					error(PreprocErrorType::Malformed("expected \"name\" or <name> after #include"))
				})?;

				if self.include_stack.iter().any(|f| f == name) {
					return Err(error(PreprocErrorType::IncludeCycle(name.to_owned())))
				}

				let body = self.resolve(name).map_err(error)?;
				self.expand(Rc::new(name.to_owned()), &body, 1)?;
			} else if let Some(directive) = trimmed.strip_prefix('@') {
				let directive = directive.trim_start();
				let (command, args) = directive
					.split_once(' ')
					.map(|(c, r)| (c, Some(r.trim())))
					.unwrap_or((directive.trim_end(), None));

				match command {
					"match" => {
						let inert = !Self::active(&blocks);
						let condition = match args {
							Some(x) if !x.is_empty() => x,
							_ => return Err(error(PreprocErrorType::Malformed("missing match target"))),
						};

						let target_case = match (self.defines.get(condition), inert) {
							(Some(x), _) => x.clone(),
							(None, true) => String::new(),
							(None, false) =>
								return Err(error(PreprocErrorType::UndefinedTarget(
									condition.to_owned(),
								))),
						};

						blocks.push(MatchBlock {
							target_case,
							hit_cases: Vec::new(),
							inert,
							span: span(),
							write: WriteState::Error(
								"code in a match block is only allowed inside case blocks",
							),
						});
					},
					"case" => {
						let block = match blocks.last_mut() {
							Some(block) => block,
							None =>
								return Err(error(PreprocErrorType::Other(
									"case directive can only exist inside match",
								))),
						};

						// `a | b | c`
						let cases = match args {
							Some(x) if !x.is_empty() => x.split('|').map(str::trim).collect::<Vec<_>>(),
							_ => return Err(error(PreprocErrorType::Malformed("missing case list"))),
						};

						for case in &cases {
							if block.hit_cases.iter().any(|h| h == case) {
								return Err(error(PreprocErrorType::DuplicateCase(case.to_string())))
							}
							block.hit_cases.push(case.to_string());
						}

						block.write =
							match !block.inert && cases.iter().any(|c| *c == block.target_case) {
								true => WriteState::Write,
								false => WriteState::Skip,
							};
					},
					"endmatch" => {
						let block = match blocks.pop() {
							Some(block) => block,
							None =>
								return Err(error(PreprocErrorType::Other(
									"endmatch directive can only exist after match",
								))),
						};

						if !block.inert && !block.hit_cases.iter().any(|h| *h == block.target_case) {
							return Err(PreprocError {
								ty: PreprocErrorType::MissedCase(block.target_case),
								span: block.span,
							})
						}
					},
					"define" => {
						let (key, val) = match args.map(|x| x.split_once(' ')) {
							Some(Some((key, val))) => (key, val.trim()),
							Some(None) =>
								return Err(error(PreprocErrorType::Malformed(
									"missing definition value",
								))),
							None => return Err(error(PreprocErrorType::Malformed("missing definition"))),
						};

						// defines follow branches, code-placement errors do not apply
						if Self::active(&blocks) {
							self.defines.insert(key.to_owned(), val.to_owned());
						}
					},
					_ => return Err(error(PreprocErrorType::UnknownDirective)),
				}
			} else if Self::writable(&blocks).map_err(|e| error(PreprocErrorType::Other(e)))? {
				self.write_line(line).map_err(error)?;
				self.line_map.push(LineId {
					line: first_line + y,
					file: file.clone(),
				});
			}
		}

		if let Some(block) = blocks.pop() {
			return Err(PreprocError {
				ty: PreprocErrorType::Other("unterminated match block"),
				span: block.span,
			})
		}

		self.include_stack.pop();
		Ok(())
	}

	/// Whether lines at the current position should be emitted.
	fn writable(blocks: &[MatchBlock]) -> Result<bool, &'static str> {
		match blocks.last() {
			None => Ok(true),
			Some(MatchBlock { inert: true, .. }) => Ok(false),
			Some(MatchBlock { write, .. }) => match write {
				WriteState::Skip => Ok(false),
				WriteState::Write => Ok(true),
				WriteState::Error(e) => Err(*e),
			},
		}
	}

	/// Like `writable`, but a match header with no case yet counts as active.
	fn active(blocks: &[MatchBlock]) -> bool {
		match blocks.last() {
			None => true,
			Some(block) => !block.inert && !matches!(block.write, WriteState::Skip),
		}
	}

	fn resolve(&self, name: &str) -> Result<Rc<str>, PreprocErrorType> {
		if let Some(body) = self.registry.get(name) {
			return Ok(body)
		}

		match self.paths.find(name) {
			Some(path) => fs::read_to_string(path).map(Into::into).map_err(|source| {
				PreprocErrorType::Io {
					name: name.to_owned(),
					source,
				}
			}),
			None => Err(PreprocErrorType::UnresolvedInclude(name.to_owned())),
		}
	}

	fn write_line(&mut self, line: &str) -> Result<(), PreprocErrorType> {
		let mut rest = line;

		while let Some(i) = rest.find('$') {
			self.output.push_str(&rest[..i]);
			rest = &rest[i + 1..];

			let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(rest.len());
			let (define, tail) = rest.split_at(end);

			if define.is_empty() {
				return Err(PreprocErrorType::Malformed("`$` must be followed by a define name"))
			}

			match self.defines.get(define) {
				Some(value) => self.output.push_str(value),
				None => return Err(PreprocErrorType::Undefined(define.to_owned())),
			}
			rest = tail;
		}

		self.output.push_str(rest);
		self.output.push('\n');
		Ok(())
	}
}

/// Arguments of an `#include` line. `#includefoo` is not an include.
fn include_args(line: &str) -> Option<&str> {
	line.strip_prefix("#include")
		.filter(|args| args.is_empty() || args.starts_with(|c: char| c.is_whitespace() || c == '"' || c == '<'))
}

fn parse_include_name(args: &str) -> Option<&str> {
	let args = args.trim();
	let (open, close) = match args.chars().next()? {
		'"' => ('"', '"'),
		'<' => ('<', '>'),
		_ => return None,
	};

	let inner = args.strip_prefix(open)?;
	let (name, _) = inner.split_once(close)?;
	match name.is_empty() {
		true => None,
		false => Some(name),
	}
}
