// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::marker::PhantomData;

use gl::types::{GLchar, GLenum, GLint, GLsizei, GLuint};
use glsl_preprocess::LineMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
	Vertex,
	Fragment,
	Geometry,
	TessControl,
	TessEvaluation,
	Compute,
}

pub struct Shader {
	ty: ShaderType,
	shader_object: GLuint,
	_not_send: PhantomData<*const ()>,
}

impl ShaderType {
	#[inline]
	pub fn gl_type(&self) -> GLenum {
		match self {
			Self::Vertex => gl::VERTEX_SHADER,
			Self::Fragment => gl::FRAGMENT_SHADER,
			Self::Geometry => gl::GEOMETRY_SHADER,
			Self::TessControl => gl::TESS_CONTROL_SHADER,
			Self::TessEvaluation => gl::TESS_EVALUATION_SHADER,
			Self::Compute => gl::COMPUTE_SHADER,
		}
	}

	/// Stage name understood by glslangValidator's `-S`.
	pub fn stage_name(&self) -> &'static str {
		match self {
			Self::Vertex => "vert",
			Self::Fragment => "frag",
			Self::Geometry => "geom",
			Self::TessControl => "tesc",
			Self::TessEvaluation => "tese",
			Self::Compute => "comp",
		}
	}
}

#[derive(Debug, Error)]
pub enum ShaderCompileError {
	#[error("could not create shader (glCreateShader returned 0)")]
	CouldNotCreate,
	#[error("could not compile shader - driver log:\n{0}\n")]
	Compile(String),
}

impl Shader {
	/// Compile `source` as a `ty` stage.
	///
	/// When `line_map` is given, line references in the driver log
	/// are rewritten to point at the source files.
	pub fn compile(
		ty: ShaderType,
		source: &str,
		line_map: Option<&LineMap>,
	) -> Result<Self, ShaderCompileError> {
		unsafe {
			let shader_object = gl::CreateShader(ty.gl_type());
			if shader_object == 0 {
				return Err(ShaderCompileError::CouldNotCreate)
			}

			// owned from here on, so early returns delete the object
			let shader = Shader {
				ty,
				shader_object,
				_not_send: PhantomData,
			};

			let src_ptr = source.as_bytes().as_ptr() as *const GLchar;
			let len = source.len() as GLint;
			gl::ShaderSource(shader_object, 1, &src_ptr, &len);

			gl::CompileShader(shader_object);

			let mut compile_status = 0 as GLint;
			gl::GetShaderiv(shader_object, gl::COMPILE_STATUS, &mut compile_status);

			if compile_status != gl::TRUE as GLint {
				let log = info_log(shader_object, gl::GetShaderiv, gl::GetShaderInfoLog);
				return Err(ShaderCompileError::Compile(match line_map {
					Some(line_map) => line_map.remap_log(&log),
					None => log,
				}))
			}

			Ok(shader)
		}
	}

	pub fn ty(&self) -> ShaderType {
		self.ty
	}

	pub fn shader_object(&self) -> GLuint {
		self.shader_object
	}
}

impl Drop for Shader {
	fn drop(&mut self) {
		// Reduces refcount for shader.
		// The OpenGL driver will only delete the backing shader object
		// when it is not attached to shader program.
		unsafe { gl::DeleteShader(self.shader_object) };
	}
}

/// Read a shader or program info log.
///
/// # SAFETY
/// * must be called from GL thread
/// * `object` must be valid for the passed query functions
pub(crate) unsafe fn info_log(
	object: GLuint,
	get_iv: unsafe fn(GLuint, GLenum, *mut GLint),
	get_log: unsafe fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar),
) -> String {
	let mut log_length = 0 as GLint;
	get_iv(object, gl::INFO_LOG_LENGTH, &mut log_length);
	if log_length <= 0 {
		return String::new()
	}

	let mut log = vec![0u8; log_length as usize];
	let mut written = 0 as GLsizei;
	get_log(object, log_length, &mut written, log.as_mut_ptr() as *mut GLchar);
	// `written` excludes the null terminator
	log.truncate(written.max(0) as usize);

	String::from_utf8_lossy(&log).into_owned()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn stage_names() {
		assert_eq!(ShaderType::Vertex.stage_name(), "vert");
		assert_eq!(ShaderType::TessEvaluation.stage_name(), "tese");
		assert_eq!(ShaderType::Compute.gl_type(), gl::COMPUTE_SHADER);
		assert_eq!(ShaderType::Geometry.gl_type(), gl::GEOMETRY_SHADER);
	}
}
