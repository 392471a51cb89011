// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{env, io, io::Write, process::Command};

use thiserror::Error;

use crate::line_map::LineMap;

#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("could not write shader for validation: {0}")]
	Io(#[from] io::Error),
	#[error("error(s) during shader validation:\n{0}")]
	Failed(String),
}

/// Validate preprocessed `source` offline with glslangValidator.
///
/// `stage` is the validator's stage name (`vert`, `frag`, `comp`, ...).
/// The validator binary can be overridden with `GLSL_VALIDATOR`.
/// If it cannot be run, a warning is logged and validation passes.
pub fn validate_shader(source: &str, stage: &str, line_map: &LineMap) -> Result<(), ValidationError> {
	let validator = env::var("GLSL_VALIDATOR").unwrap_or_else(|_| "glslangValidator".to_owned());

	let mut file = tempfile::NamedTempFile::new()?;
	file.write_all(source.as_bytes())?;
	file.flush()?;

	let output = match Command::new(&validator).arg("-S").arg(stage).arg(file.path()).output() {
		Ok(x) => x,
		Err(e) => {
			log::warn!(r#"could not run GLSL validator "{validator}": {e:#}"#);
			return Ok(())
		},
	};

	if output.status.success() {
		return Ok(())
	}

	let stdout = String::from_utf8_lossy(&output.stdout);
	// the first line names the temporary file
	let log = stdout.trim().split_once('\n').map(|(_, log)| log).unwrap_or("");

	let log = line_map
		.remap_log(log)
		.lines()
		.filter(|line| !line.contains("compilation errors"))
		.map(|line| format!("{line}\n"))
		.collect::<String>();

	Err(ValidationError::Failed(log))
}
