// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{fmt, rc::Rc};

/// Origin of a single line of preprocessed output.
#[derive(Clone, PartialEq, Eq)]
pub struct LineId {
	/// 1-based line in `file`
	pub line: usize,
	pub file: Rc<String>,
}

impl fmt::Debug for LineId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.file, self.line)
	}
}

/// Maps lines of preprocessed output back to their source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineMap {
	lines: Vec<LineId>,
}

impl LineMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn push(&mut self, id: LineId) {
		self.lines.push(id);
	}

	/// Extend with the map of text appended after this map's text.
	pub fn append(&mut self, other: LineMap) {
		self.lines.extend(other.lines);
	}

	/// Source of the 1-based output line `line`.
	pub fn get(&self, line: usize) -> Option<&LineId> {
		line.checked_sub(1).and_then(|i| self.lines.get(i))
	}

	pub fn len(&self) -> usize {
		self.lines.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &LineId> {
		self.lines.iter()
	}

	/// Rewrite line references in a compiler log to `file:line`.
	///
	/// Understands the NVIDIA `0(12) :`, Mesa `0:12(3):` and
	/// glslang `ERROR: 0:12:` styles. Lines in any other format,
	/// or referring to lines outside the map, are left untouched.
	pub fn remap_log(&self, log: &str) -> String {
		let mut out = String::with_capacity(log.len());

		for line in log.lines() {
			match parse_location(line).and_then(|(prefix, n, rest)| Some((prefix, self.get(n)?, rest)))
			{
				Some((prefix, id, rest)) => out.push_str(&format!("{prefix}{id:?}:{rest}")),
				None => out.push_str(line),
			}
			out.push('\n');
		}

		out
	}
}

/// Split a log line into (severity prefix, line number, message).
fn parse_location(line: &str) -> Option<(&str, usize, &str)> {
	let (prefix, body) = ["ERROR: ", "WARNING: "]
		.iter()
		.find_map(|p| line.strip_prefix(p).map(|body| (&line[..p.len()], body)))
		.unwrap_or(("", line));

	// source string index
	let digits = body.find(|c: char| !c.is_ascii_digit())?;
	if digits == 0 {
		return None
	}
	let body = &body[digits..];

	let (number, rest) = match body.strip_prefix('(') {
		Some(body) => {
			let (number, rest) = body.split_once(')')?;
			(number, rest.trim_start().strip_prefix(':')?)
		},
		None => {
			let body = body.strip_prefix(':')?;
			let end = body.find(|c: char| !c.is_ascii_digit())?;
			let (number, rest) = body.split_at(end);
			let rest = match rest.strip_prefix('(') {
				Some(column) => column.split_once(')')?.1,
				None => rest,
			};
			(number, rest.strip_prefix(':')?)
		},
	};

	Some((prefix, number.parse().ok()?, rest))
}

#[cfg(test)]
mod test {
	use super::*;

	fn map() -> LineMap {
		let main = Rc::new("Blur.Fragment".to_string());
		let inc = Rc::new("common.glsl".to_string());
		let mut map = LineMap::new();
		map.push(LineId { line: 40, file: main.clone() });
		map.push(LineId { line: 1, file: inc.clone() });
		map.push(LineId { line: 2, file: inc });
		map.push(LineId { line: 42, file: main });
		map
	}

	#[test]
	fn lookup_is_one_based() {
		let map = map();
		assert_eq!(map.get(0), None);
		assert_eq!(format!("{:?}", map.get(1).unwrap()), "Blur.Fragment:40");
		assert_eq!(format!("{:?}", map.get(3).unwrap()), "common.glsl:2");
		assert_eq!(map.get(5), None);
	}

	#[test]
	fn append_continues_numbering() {
		let mut map = map();
		let mut tail = LineMap::new();
		tail.push(LineId { line: 7, file: Rc::new("tail.glsl".to_string()) });
		map.append(tail);

		assert_eq!(map.len(), 5);
		assert_eq!(format!("{:?}", map.get(5).unwrap()), "tail.glsl:7");
	}

	#[test]
	fn remap_nvidia() {
		assert_eq!(
			map().remap_log("0(3) : error C0000: syntax error, unexpected '}'"),
			"common.glsl:2: error C0000: syntax error, unexpected '}'\n"
		);
	}

	#[test]
	fn remap_mesa() {
		assert_eq!(
			map().remap_log("0:4(12): error: `color' undeclared"),
			"Blur.Fragment:42: error: `color' undeclared\n"
		);
	}

	#[test]
	fn remap_glslang() {
		let log = "ERROR: 0:2: 'twice' : no matching overloaded function found\n\
		           ERROR: 1 compilation errors.  No code generated.";
		assert_eq!(
			map().remap_log(log),
			"ERROR: common.glsl:1: 'twice' : no matching overloaded function found\n\
			 ERROR: 1 compilation errors.  No code generated.\n"
		);
	}

	#[test]
	fn unknown_lines_pass_through() {
		assert_eq!(map().remap_log("0(99) : error C1: out of map"), "0(99) : error C1: out of map\n");
		assert_eq!(map().remap_log("link failed"), "link failed\n");
	}
}
