// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{
	collections::HashMap,
	ffi::CString,
	path::Path,
	rc::{Rc, Weak},
};

use gl::types::{GLboolean, GLenum, GLint, GLuint};
use glsl_preprocess::{IncludeError, IncludePaths, IncludeRegistry, LineMap, PreprocError, Preprocessor};
use thiserror::Error;

use crate::{
	data::{GraphicsData, OglCoreGraphicsData, OglGraphicsData},
	device::{GraphicsDevice, OglDevice},
	library::{LibraryError, ShaderLibrary},
	shader::{info_log, Shader, ShaderCompileError, ShaderType},
	texture::BaseTexture,
	types::GraphicsDeviceType,
	GlFeatures,
};

mod uniform;

pub use uniform::Uniform;

#[derive(Debug, Error)]
pub enum ProgramError {
	#[error("program is already initialized")]
	AlreadyInitialized,
	#[error("program is not initialized")]
	NotInitialized,
	#[error("could not create program (glCreateProgram returned 0)")]
	CouldNotCreate,
	#[error("could not load shader \"{tag}\": {source}")]
	Library {
		tag: String,
		#[source]
		source: LibraryError,
	},
	#[error("could not preprocess shader: {0}")]
	Preprocess(#[from] PreprocError),
	#[error("{tag} compilation failed: {source}")]
	Compile {
		tag: String,
		#[source]
		source: ShaderCompileError,
	},
	#[error("could not link program - driver log:\n{0}\n")]
	Link(String),
	#[error("can't find uniform \"{0}\"")]
	UniformNotFound(String),
	#[error("can't find uniform block \"{0}\"")]
	BlockNotFound(String),
	#[error("name contains a nul byte: {0:?}")]
	InvalidName(String),
	#[error("no graphics device set")]
	NoDevice,
	#[error("graphics device was dropped")]
	DeviceLost,
	#[error("graphics data was not created by a {0:?} device")]
	BackendMismatch(GraphicsDeviceType),
	#[error("uniform buffers are not supported on {0:?} devices")]
	UnsupportedDevice(GraphicsDeviceType),
	#[error(transparent)]
	Include(#[from] IncludeError),
	#[error("the OpenGL context does not support {0}")]
	Unsupported(&'static str),
}

/// Access mode of an image unit binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAccess {
	ReadOnly,
	WriteOnly,
	ReadWrite,
}

impl ImageAccess {
	pub fn gl_access(self) -> GLenum {
		match self {
			Self::ReadOnly => gl::READ_ONLY,
			Self::WriteOnly => gl::WRITE_ONLY,
			Self::ReadWrite => gl::READ_WRITE,
		}
	}
}

/// Uniform block binding points, handed out in registration order.
#[derive(Debug, Default)]
struct BlockPoints {
	points: HashMap<String, GLuint>,
	next: GLuint,
}

impl BlockPoints {
	fn get(&self, name: &str) -> Option<GLuint> {
		self.points.get(name).copied()
	}

	/// Reserve the next binding point for `name`.
	fn assign(&mut self, name: &str) -> GLuint {
		let point = self.next;
		self.points.insert(name.to_owned(), point);
		self.next += 1;
		point
	}

	fn clear(&mut self) {
		self.points.clear();
		self.next = 0;
	}
}

/// A GL program assembled from tagged shader sources.
///
/// ```no_run
/// # use std::rc::Rc;
/// # use gl_device::*;
/// # fn run(device: Rc<dyn GraphicsDevice>) -> Result<(), ProgramError> {
/// let mut program = ProgramShader::new(Rc::new(ShaderLibrary::from_env()));
/// program.set_device(&device);
/// program.initialize()?;
/// program.add_shader(ShaderType::Vertex, "Blur.Vertex")?;
/// program.add_shader(ShaderType::Fragment, "Blur.Fragment")?;
/// program.link()?;
/// program.init_block_binding("Camera")?;
///
/// program.bind()?;
/// program.set_uniform("radius", 4.0f32)?;
/// # Ok(())
/// # }
/// ```
pub struct ProgramShader {
	program_object: GLuint,
	shaders: Vec<Shader>,
	linked: bool,
	block_points: BlockPoints,
	device: Option<Weak<dyn GraphicsDevice>>,
	library: Rc<ShaderLibrary>,
	includes: IncludeRegistry,
	include_paths: IncludePaths,
	defines: HashMap<String, String>,
}

impl ProgramShader {
	/// Include search paths are taken from the environment, see `IncludePaths::from_env`.
	pub fn new(library: Rc<ShaderLibrary>) -> Self {
		Self::with_include_paths(library, IncludePaths::from_env())
	}

	pub fn with_include_paths(library: Rc<ShaderLibrary>, include_paths: IncludePaths) -> Self {
		Self {
			program_object: 0,
			shaders: Vec::new(),
			linked: false,
			block_points: BlockPoints::default(),
			device: None,
			library,
			includes: IncludeRegistry::new(),
			include_paths,
			defines: HashMap::new(),
		}
	}

	pub fn program_object(&self) -> GLuint {
		self.program_object
	}

	pub fn is_initialized(&self) -> bool {
		self.program_object != 0
	}

	pub fn is_linked(&self) -> bool {
		self.linked
	}

	/// Create the GL program object.
	pub fn initialize(&mut self) -> Result<(), ProgramError> {
		if self.program_object != 0 {
			return Err(ProgramError::AlreadyInitialized)
		}

		unsafe {
			let program = gl::CreateProgram();
			if program == 0 {
				return Err(ProgramError::CouldNotCreate)
			}

			// both default to false, older contexts lack the call
			if self.supports(|f| f.program_parameters, gl::ProgramParameteri::is_loaded) {
				gl::ProgramParameteri(program, gl::PROGRAM_BINARY_RETRIEVABLE_HINT, gl::FALSE as GLint);
				gl::ProgramParameteri(program, gl::PROGRAM_SEPARABLE, gl::FALSE as GLint);
			}

			self.program_object = program;
		}

		Ok(())
	}

	/// Delete the program and forget its block bindings.
	///
	/// Does nothing if the program was never created.
	pub fn destroy(&mut self) {
		if self.program_object == 0 {
			return
		}

		// attached shaders are flagged for deletion along with the program
		self.shaders.clear();
		unsafe { gl::DeleteProgram(self.program_object) };

		self.program_object = 0;
		self.linked = false;
		self.block_points.clear();
	}

	/// Keep a weak reference to the device used to resolve `bind_buffer` data.
	pub fn set_device(&mut self, device: &Rc<dyn GraphicsDevice>) {
		self.device = Some(Rc::downgrade(device));
	}

	/// Value for `@match`/`$NAME` variant selection in shaders added afterwards.
	pub fn define(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.defines.insert(key.into(), value.into());
	}

	pub fn includes(&self) -> &IncludeRegistry {
		&self.includes
	}

	pub fn includes_mut(&mut self) -> &mut IncludeRegistry {
		&mut self.includes
	}

	/// Make `#include "include_name"` resolve to the contents of `filename`.
	pub fn set_include_from_file(
		&mut self,
		include_name: &str,
		filename: impl AsRef<Path>,
	) -> Result<(), ProgramError> {
		let filename = filename.as_ref();
		self.includes.insert_from_file(include_name, filename).map_err(|e| {
			log::warn!("ProgramShader : can't register include \"{include_name}\": {e}");
			e
		})?;

		log::debug!("include \"{include_name}\" registered from {filename:?}");
		Ok(())
	}

	/// Compile the library shader `tag` and attach it to the program.
	pub fn add_shader(&mut self, ty: ShaderType, tag: &str) -> Result<(), ProgramError> {
		self.require_program()?;

		let source = self.library.get_shader(tag).map_err(|source| {
			log::error!("shader \"{tag}\" not found, check your directory: {source}");
			ProgramError::Library {
				tag: tag.to_owned(),
				source,
			}
		})?;

		let preprocessor = self.preprocessor();
		let (mut text, mut line_map) = preprocessor.preprocess("<directives>", &source.directives, 1)?;
		let (body, body_map) = preprocessor.preprocess(&source.file, &source.text, source.first_line)?;
		text.push_str(&body);
		line_map.append(body_map);

		self.attach(ty, tag, &text, &line_map)
	}

	/// Compile `source` directly, reported as `name` in diagnostics.
	pub fn add_shader_source(
		&mut self,
		ty: ShaderType,
		name: &str,
		source: &str,
	) -> Result<(), ProgramError> {
		self.require_program()?;

		let (text, line_map) = self.preprocessor().preprocess(name, source, 1)?;
		self.attach(ty, name, &text, &line_map)
	}

	fn preprocessor(&self) -> Preprocessor<'_> {
		let mut preprocessor = Preprocessor::new(&self.includes, &self.include_paths);
		for (key, value) in &self.defines {
			preprocessor.define(key.as_str(), value.as_str());
		}
		preprocessor
	}

	fn attach(
		&mut self,
		ty: ShaderType,
		tag: &str,
		source: &str,
		line_map: &LineMap,
	) -> Result<(), ProgramError> {
		let shader = Shader::compile(ty, source, Some(line_map)).map_err(|source| {
			log::error!("{tag} compilation failed.\n{source}");
			ProgramError::Compile {
				tag: tag.to_owned(),
				source,
			}
		})?;

		log::debug!("{tag} compiled.");

		unsafe { gl::AttachShader(self.program_object, shader.shader_object()) };
		self.shaders.push(shader);
		Ok(())
	}

	/// Link the attached shaders.
	///
	/// Shaders are detached afterwards whether or not linking succeeds.
	pub fn link(&mut self) -> Result<(), ProgramError> {
		self.require_program()?;

		unsafe {
			gl::LinkProgram(self.program_object);

			// allows earlier deletion of shader objects.
			for shader in self.shaders.drain(..) {
				gl::DetachShader(self.program_object, shader.shader_object());
			}

			let mut link_status = 0;
			gl::GetProgramiv(self.program_object, gl::LINK_STATUS, &mut link_status);

			if link_status != gl::TRUE as GLint {
				let log = info_log(self.program_object, gl::GetProgramiv, gl::GetProgramInfoLog);
				log::error!("program linking failed.\n{log}");
				self.linked = false;
				return Err(ProgramError::Link(log))
			}
		}

		self.linked = true;
		Ok(())
	}

	pub fn bind(&self) -> Result<(), ProgramError> {
		self.require_program()?;
		unsafe { gl::UseProgram(self.program_object) };
		Ok(())
	}

	/// Assign the next uniform buffer binding point to block `name`.
	///
	/// A block that is already registered keeps its binding point.
	pub fn init_block_binding(&mut self, name: &str) -> Result<GLuint, ProgramError> {
		self.require_program()?;

		if let Some(point) = self.block_points.get(name) {
			return Ok(point)
		}

		let c_name = c_name(name)?;
		let block = unsafe { gl::GetUniformBlockIndex(self.program_object, c_name.as_ptr()) };
		if block == gl::INVALID_INDEX {
			log::warn!("ProgramShader : can't find uniform block \"{name}\".");
			return Err(ProgramError::BlockNotFound(name.to_owned()))
		}

		let point = self.block_points.assign(name);
		unsafe { gl::UniformBlockBinding(self.program_object, block, point) };
		Ok(point)
	}

	/// Binding point assigned to block `name` by `init_block_binding`.
	pub fn block_point(&self, name: &str) -> Option<GLuint> {
		self.block_points.get(name)
	}

	pub fn uniform_location(&self, name: &str) -> Result<GLint, ProgramError> {
		self.require_program()?;

		let c_name = c_name(name)?;
		match unsafe { gl::GetUniformLocation(self.program_object, c_name.as_ptr()) } {
			-1 => Err(ProgramError::UniformNotFound(name.to_owned())),
			location => Ok(location),
		}
	}

	/// Set uniform `name` of this program, which must be bound.
	pub fn set_uniform(&self, name: &str, value: impl Uniform) -> Result<(), ProgramError> {
		let location = self.located("uniform", name)?;

		unsafe { value.set_uniform(location) };
		Ok(())
	}

	/// Bind `texture` to `unit` and point sampler `name` at it.
	pub fn bind_texture(&self, name: &str, texture: &BaseTexture, unit: u32) -> Result<(), ProgramError> {
		let location = self.located("texture", name)?;

		texture.bind(unit);
		unsafe { gl::Uniform1i(location, unit as GLint) };
		Ok(())
	}

	/// Bind `data` to the binding point of uniform block `name`.
	///
	/// The block must have been registered with `init_block_binding`,
	/// and `data` must come from the device set with `set_device`.
	pub fn bind_buffer(&self, name: &str, data: &dyn GraphicsData) -> Result<(), ProgramError> {
		let device = self
			.device
			.as_ref()
			.ok_or(ProgramError::NoDevice)?
			.upgrade()
			.ok_or(ProgramError::DeviceLost)?;

		let point = self
			.block_points
			.get(name)
			.ok_or_else(|| ProgramError::BlockNotFound(name.to_owned()))?;

		let device_type = device.desc().device_type();
		let buffer = match device_type {
			GraphicsDeviceType::OpenGLCore =>
				data.downcast_ref::<OglCoreGraphicsData>().map(|d| d.instance_id()),
			GraphicsDeviceType::OpenGL => data.downcast_ref::<OglGraphicsData>().map(|d| d.instance_id()),
			other => return Err(ProgramError::UnsupportedDevice(other)),
		}
		.ok_or(ProgramError::BackendMismatch(device_type))?;

		unsafe { gl::BindBufferBase(gl::UNIFORM_BUFFER, point, buffer) };
		Ok(())
	}

	/// Bind `level` of `texture` to image unit `unit` and point image uniform `name` at it.
	#[allow(clippy::too_many_arguments)]
	pub fn bind_image(
		&self,
		name: &str,
		texture: &BaseTexture,
		unit: u32,
		level: u32,
		layered: bool,
		layer: u32,
		access: ImageAccess,
	) -> Result<(), ProgramError> {
		self.require_image_load_store()?;
		let location = self.located("image", name)?;

		unsafe {
			gl::BindImageTexture(
				unit,
				texture.texture_id(),
				level as GLint,
				layered as GLboolean,
				layer as GLint,
				access.gl_access(),
				texture.format(),
			);
			gl::Uniform1i(location, unit as GLint);
		}

		Ok(())
	}

	/// `uniform_location`, logging misses as `kind`.
	fn located(&self, kind: &str, name: &str) -> Result<GLint, ProgramError> {
		self.uniform_location(name).map_err(|e| {
			if let ProgramError::UniformNotFound(_) = e {
				log::warn!("ProgramShader : can't find {kind} \"{name}\".");
			}
			e
		})
	}

	/// Features of the device set with `set_device`.
	fn features(&self) -> Option<GlFeatures> {
		let device = self.device.as_ref()?.upgrade()?;
		let device = device.downcast_ref::<OglDevice>()?;
		Some(*device.features())
	}

	/// Ask the device, or the loader when there is no OpenGL device.
	fn supports(&self, feature: impl FnOnce(&GlFeatures) -> bool, loaded: fn() -> bool) -> bool {
		match self.features() {
			Some(features) => feature(&features),
			None => loaded(),
		}
	}

	fn require_image_load_store(&self) -> Result<(), ProgramError> {
		match self.supports(|f| f.image_load_store, gl::BindImageTexture::is_loaded) {
			true => Ok(()),
			false => Err(ProgramError::Unsupported("image load/store")),
		}
	}

	fn require_program(&self) -> Result<(), ProgramError> {
		match self.program_object {
			0 => Err(ProgramError::NotInitialized),
			_ => Ok(()),
		}
	}
}

impl Drop for ProgramShader {
	fn drop(&mut self) {
		// Reduces refcount for shader program.
		// The OpenGL driver will only delete the backing shader program
		// when it is not part of any rendering context.
		self.destroy();
	}
}

fn c_name(name: &str) -> Result<CString, ProgramError> {
	CString::new(name).map_err(|_| ProgramError::InvalidName(name.to_owned()))
}

#[cfg(test)]
mod test {
	use std::any::Any;

	use super::*;
	use crate::{
		data::{GraphicsDataDesc, GraphicsDataError},
		device::GraphicsDeviceDesc,
		texture::{TextureDesc, TextureError},
		types::{GraphicsDataType, GraphicsUsageFlags},
	};

	fn program() -> ProgramShader {
		ProgramShader::with_include_paths(Rc::new(ShaderLibrary::default()), IncludePaths::default())
	}

	#[test]
	fn block_points_are_sequential() {
		let mut points = BlockPoints::default();
		assert_eq!(points.assign("Camera"), 0);
		assert_eq!(points.assign("Lights"), 1);
		assert_eq!(points.get("Camera"), Some(0));
		assert_eq!(points.get("Material"), None);

		points.clear();
		assert_eq!(points.get("Lights"), None);
		assert_eq!(points.assign("Material"), 0);
	}

	#[test]
	fn image_access() {
		assert_eq!(ImageAccess::ReadOnly.gl_access(), gl::READ_ONLY);
		assert_eq!(ImageAccess::WriteOnly.gl_access(), gl::WRITE_ONLY);
		assert_eq!(ImageAccess::ReadWrite.gl_access(), gl::READ_WRITE);
	}

	#[test]
	fn nul_in_names() {
		assert!(matches!(c_name("light\0s"), Err(ProgramError::InvalidName(_))));
		assert_eq!(c_name("lights").unwrap().as_bytes(), b"lights");
	}

	// None of these reach the driver: they fail before a GL call is made.
	#[test]
	fn uninitialized_program() {
		let mut program = program();
		assert!(!program.is_initialized());
		assert!(matches!(
			program.add_shader(ShaderType::Vertex, "Blur.Vertex"),
			Err(ProgramError::NotInitialized)
		));
		assert!(matches!(
			program.add_shader_source(ShaderType::Vertex, "inline", "void main() {}"),
			Err(ProgramError::NotInitialized)
		));
		assert!(matches!(program.link(), Err(ProgramError::NotInitialized)));
		assert!(matches!(program.bind(), Err(ProgramError::NotInitialized)));
		assert!(matches!(program.init_block_binding("Camera"), Err(ProgramError::NotInitialized)));
		assert!(matches!(program.set_uniform("time", 1.0f32), Err(ProgramError::NotInitialized)));

		// no-op without a program object
		program.destroy();
	}

	struct Unbacked(GraphicsDataDesc);

	impl GraphicsData for Unbacked {
		fn desc(&self) -> &GraphicsDataDesc {
			&self.0
		}

		fn update(&self, _: usize, _: &[u8]) -> Result<(), GraphicsDataError> {
			Ok(())
		}

		fn as_any(&self) -> &dyn Any {
			self
		}
	}

	struct FakeDevice(GraphicsDeviceDesc);

	impl GraphicsDevice for FakeDevice {
		fn desc(&self) -> &GraphicsDeviceDesc {
			&self.0
		}

		fn create_graphics_data(
			&self,
			desc: GraphicsDataDesc,
		) -> Result<Rc<dyn GraphicsData>, GraphicsDataError> {
			Ok(Rc::new(Unbacked(desc)))
		}

		fn create_texture(&self, desc: TextureDesc) -> Result<Rc<BaseTexture>, TextureError> {
			Err(TextureError::ZeroSize(desc.width, desc.height))
		}

		fn as_any(&self) -> &dyn Any {
			self
		}
	}

	fn fake_device(device_type: GraphicsDeviceType) -> Rc<dyn GraphicsDevice> {
		Rc::new(FakeDevice(GraphicsDeviceDesc::new(device_type)))
	}

	#[test]
	fn bind_buffer_device_errors() {
		let mut program = program();
		let data = Unbacked(Default::default());
		assert!(matches!(program.bind_buffer("Camera", &data), Err(ProgramError::NoDevice)));

		program.set_device(&fake_device(GraphicsDeviceType::OpenGLCore));
		assert!(matches!(program.bind_buffer("Camera", &data), Err(ProgramError::DeviceLost)));
	}

	#[test]
	fn bind_buffer_checks_backend() {
		let core = fake_device(GraphicsDeviceType::OpenGLCore);
		let data = core
			.create_graphics_data(GraphicsDataDesc::new(
				GraphicsDataType::UniformBuffer,
				GraphicsUsageFlags::DYNAMIC_STORAGE,
				64,
			))
			.unwrap();

		let mut program = program();
		program.set_device(&core);
		assert!(matches!(
			program.bind_buffer("Camera", &*data),
			Err(ProgramError::BlockNotFound(name)) if name == "Camera"
		));

		// registered without GL, as init_block_binding would
		program.block_points.assign("Camera");
		assert!(matches!(
			program.bind_buffer("Camera", &*data),
			Err(ProgramError::BackendMismatch(GraphicsDeviceType::OpenGLCore))
		));

		let vulkan = fake_device(GraphicsDeviceType::Vulkan);
		program.set_device(&vulkan);
		assert!(matches!(
			program.bind_buffer("Camera", &*data),
			Err(ProgramError::UnsupportedDevice(GraphicsDeviceType::Vulkan))
		));
	}

	#[test]
	fn image_binding_needs_support() {
		// nothing loads GL in tests, and a non-OpenGL device falls back to the loader
		let mut program = program();
		assert!(matches!(
			program.require_image_load_store(),
			Err(ProgramError::Unsupported("image load/store"))
		));

		let device = fake_device(GraphicsDeviceType::OpenGLCore);
		program.set_device(&device);
		assert!(program.features().is_none());
		assert!(!program.supports(|_| true, gl::ProgramParameteri::is_loaded));
	}

	#[test]
	fn include_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("noise.glsl");
		std::fs::write(&path, "float noise(vec2 p);\n").unwrap();

		let mut program = program();
		program.set_include_from_file("noise", &path).unwrap();
		assert!(program.includes().contains("noise"));

		assert!(matches!(
			program.set_include_from_file("missing", dir.path().join("missing.glsl")),
			Err(ProgramError::Include(IncludeError::Io { .. }))
		));
	}
}
