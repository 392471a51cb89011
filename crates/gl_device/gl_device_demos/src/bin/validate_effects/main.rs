// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

//! Preprocess effect shaders and check them with glslangValidator, no GL context needed.
//!
//! ```text
//! validate_effects [NAME=VALUE]... Effect.Section...
//! ```
//!
//! The stage is taken from the first word of the section name
//! (`Checker.Fragment` is a fragment shader). Without keys, the demo effects are checked.

use std::process::ExitCode;

use gl_device::{ShaderLibrary, ShaderType};
use gl_device_demos::SHADER_DIR;
use glsl_preprocess::{validate_shader, IncludePaths, IncludeRegistry, Preprocessor};

fn stage_of(key: &str) -> Option<ShaderType> {
	let section = key.split('.').nth(1)?;
	Some(match section {
		"Vertex" => ShaderType::Vertex,
		"Fragment" => ShaderType::Fragment,
		"Geometry" => ShaderType::Geometry,
		"TessControl" => ShaderType::TessControl,
		"TessEvaluation" => ShaderType::TessEvaluation,
		"Compute" => ShaderType::Compute,
		_ => return None,
	})
}

fn validate(
	library: &ShaderLibrary,
	preprocessor: &Preprocessor<'_>,
	key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	let stage = stage_of(key).ok_or_else(|| format!("no shader stage in \"{key}\""))?;
	let source = library.get_shader(key)?;

	let (mut text, mut line_map) = preprocessor.preprocess("<directives>", &source.directives, 1)?;
	let (body, body_map) = preprocessor.preprocess(&source.file, &source.text, source.first_line)?;
	text.push_str(&body);
	line_map.append(body_map);

	validate_shader(&text, stage.stage_name(), &line_map)?;
	Ok(())
}

fn main() -> ExitCode {
	env_logger::init();

	let (defines, mut keys) = std::env::args()
		.skip(1)
		.partition::<Vec<_>, _>(|arg| arg.contains('='));
	if keys.is_empty() {
		keys = ["Checker.Vertex", "Checker.Fragment", "Checker.Compute"].map(String::from).to_vec();
	}

	let mut library = ShaderLibrary::new(SHADER_DIR, ".glsl");
	library.add_directive("*", "#version 450 core");

	let registry = IncludeRegistry::new();
	let mut paths = IncludePaths::from_env();
	paths.push(SHADER_DIR);

	let mut preprocessor = Preprocessor::new(&registry, &paths);
	preprocessor.define("quality", "high").define("PULSE_SPEED", "2.0");
	for define in &defines {
		if let Some((name, value)) = define.split_once('=') {
			preprocessor.define(name, value);
		}
	}

	let mut failed = 0;
	for key in &keys {
		match validate(&library, &preprocessor, key) {
			Ok(()) => log::info!("{key}: ok"),
			Err(e) => {
				log::error!("{key}: {e}");
				failed += 1;
			},
		}
	}

	match failed {
		0 => ExitCode::SUCCESS,
		_ => ExitCode::FAILURE,
	}
}
