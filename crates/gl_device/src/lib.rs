// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

//! Owning wrappers over OpenGL devices, buffers, textures and shader programs.
//!
//! GL functions must be loaded (`gl::load_with`) and a context must be current
//! on the calling thread before any of these types are created. None of the
//! GL-owning types are `Send`.

use std::{ffi::CStr, fmt};

mod debug;
pub mod data;
pub mod device;
pub mod library;
pub mod program;
pub mod shader;
pub mod texture;
pub mod types;

pub use data::{GraphicsData, GraphicsDataDesc, GraphicsDataError, OglCoreGraphicsData, OglGraphicsData};
pub use device::{DeviceError, GraphicsDevice, GraphicsDeviceDesc, OglDevice};
pub use glsl_preprocess;
pub use library::{LibraryError, ShaderLibrary, ShaderSource};
pub use program::{ImageAccess, ProgramError, ProgramShader, Uniform};
pub use shader::{Shader, ShaderCompileError, ShaderType};
pub use texture::{BaseTexture, TextureDesc, TextureError};
pub use types::{GraphicsDataType, GraphicsDeviceType, GraphicsUsageFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlVersion {
	pub major: u32,
	pub minor: u32,
}

impl GlVersion {
	pub const fn new(major: u32, minor: u32) -> Self {
		Self { major, minor }
	}

	/// Version of the current context.
	pub fn current() -> Self {
		let (mut major, mut minor) = (0, 0);
		unsafe {
			gl::GetIntegerv(gl::MAJOR_VERSION, &mut major);
			gl::GetIntegerv(gl::MINOR_VERSION, &mut minor);
		}

		Self::new(major.max(0) as u32, minor.max(0) as u32)
	}
}

impl fmt::Display for GlVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlExtensions {
	pub arb_buffer_storage: bool,
	pub arb_compute_shader: bool,
	pub arb_direct_state_access: bool,
	pub arb_get_program_binary: bool,
	pub arb_separate_shader_objects: bool,
	pub arb_shader_image_load_store: bool,
	pub arb_texture_storage: bool,
	pub khr_debug: bool,
}

impl GlExtensions {
	pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
		let mut extensions = Self::default();

		for name in names {
			match name {
				"GL_ARB_buffer_storage" => extensions.arb_buffer_storage = true,
				"GL_ARB_compute_shader" => extensions.arb_compute_shader = true,
				"GL_ARB_direct_state_access" => extensions.arb_direct_state_access = true,
				"GL_ARB_get_program_binary" => extensions.arb_get_program_binary = true,
				"GL_ARB_separate_shader_objects" => extensions.arb_separate_shader_objects = true,
				"GL_ARB_shader_image_load_store" => extensions.arb_shader_image_load_store = true,
				"GL_ARB_texture_storage" => extensions.arb_texture_storage = true,
				"GL_KHR_debug" => extensions.khr_debug = true,
				_ => {},
			}
		}

		extensions
	}
}

/// Entry points available on a context, from its version and extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlFeatures {
	/// `glCreateBuffers`, `glNamedBufferStorage` and the other DSA buffer calls
	pub direct_state_access: bool,
	/// `glProgramParameteri` with the binary and separable hints
	pub program_parameters: bool,
	/// `glTexStorage2D`
	pub texture_storage: bool,
	/// `glBindImageTexture`
	pub image_load_store: bool,
	pub compute_shader: bool,
	/// `glDebugMessageCallback`
	pub debug_output: bool,
}

impl GlFeatures {
	pub fn new(version: GlVersion, extensions: &GlExtensions) -> Self {
		let at_least = |major, minor| version >= GlVersion::new(major, minor);

		Self {
			direct_state_access: at_least(4, 5)
				|| (extensions.arb_direct_state_access && extensions.arb_buffer_storage),
			program_parameters: at_least(4, 1)
				|| (extensions.arb_get_program_binary && extensions.arb_separate_shader_objects),
			texture_storage: at_least(4, 2) || extensions.arb_texture_storage,
			image_load_store: at_least(4, 2) || extensions.arb_shader_image_load_store,
			compute_shader: at_least(4, 3) || extensions.arb_compute_shader,
			debug_output: at_least(4, 3) || extensions.khr_debug,
		}
	}
}

/// Query the extensions of the current context.
///
/// Devices cache the result, prefer `OglDevice::extensions`.
pub fn check_gl_extensions() -> GlExtensions {
	let mut extension_count = 0;
	unsafe { gl::GetIntegerv(gl::NUM_EXTENSIONS, &mut extension_count) };

	let extensions = (0..extension_count.max(0) as u32)
		.filter_map(|i| {
			let name = unsafe { gl::GetStringi(gl::EXTENSIONS, i) };
			if name.is_null() {
				return None
			}

			// drivers should not return non-utf8 extension names, skip them if they do
			unsafe { CStr::from_ptr(name as *const _) }.to_str().ok()
		})
		.collect::<Vec<_>>();

	GlExtensions::from_names(extensions)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn version_ordering() {
		assert!(GlVersion::new(4, 5) > GlVersion::new(4, 3));
		assert!(GlVersion::new(4, 0) > GlVersion::new(3, 3));
		assert_eq!(GlVersion::new(3, 3).to_string(), "3.3");
	}

	#[test]
	fn extensions_from_names() {
		let extensions =
			GlExtensions::from_names(["GL_ARB_buffer_storage", "GL_EXT_texture_filter_anisotropic", "GL_KHR_debug"]);

		assert_eq!(extensions, GlExtensions {
			arb_buffer_storage: true,
			khr_debug: true,
			..Default::default()
		});
	}

	#[test]
	fn features_from_version() {
		let none = GlExtensions::default();

		let legacy = GlFeatures::new(GlVersion::new(3, 3), &none);
		assert_eq!(legacy, GlFeatures::default());

		let gl42 = GlFeatures::new(GlVersion::new(4, 2), &none);
		assert!(gl42.program_parameters && gl42.texture_storage && gl42.image_load_store);
		assert!(!gl42.compute_shader && !gl42.direct_state_access && !gl42.debug_output);

		let gl45 = GlFeatures::new(GlVersion::new(4, 5), &none);
		assert!(gl45.direct_state_access && gl45.compute_shader && gl45.debug_output);
	}

	#[test]
	fn features_from_extensions() {
		let extensions = GlExtensions::from_names([
			"GL_ARB_texture_storage",
			"GL_ARB_get_program_binary",
			"GL_ARB_separate_shader_objects",
			"GL_ARB_direct_state_access",
			"GL_KHR_debug",
		]);
		let features = GlFeatures::new(GlVersion::new(3, 3), &extensions);

		assert!(features.texture_storage && features.program_parameters && features.debug_output);
		assert!(!features.image_load_store);
		// DSA buffers also need immutable storage
		assert!(!features.direct_state_access);
	}
}
