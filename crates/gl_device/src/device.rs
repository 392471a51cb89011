// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{any::Any, marker::PhantomData, rc::Rc};

use thiserror::Error;

use crate::{
	check_gl_extensions,
	data::{GraphicsData, GraphicsDataDesc, GraphicsDataError, OglCoreGraphicsData, OglGraphicsData},
	debug,
	texture::{BaseTexture, TextureDesc, TextureError},
	types::GraphicsDeviceType,
	GlExtensions,
	GlFeatures,
	GlVersion,
};

#[derive(Debug, Error)]
pub enum DeviceError {
	#[error("{0:?} is not an OpenGL device type")]
	Unsupported(GraphicsDeviceType),
	#[error("OpenGL functions are not loaded, call gl::load_with with a current context first")]
	NotLoaded,
	#[error("{device_type:?} devices need OpenGL {required} or its extensions, the context provides {found}")]
	Version {
		device_type: GraphicsDeviceType,
		required: GlVersion,
		found: GlVersion,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsDeviceDesc {
	device_type: GraphicsDeviceType,
	debug: bool,
}

impl Default for GraphicsDeviceDesc {
	fn default() -> Self {
		Self::new(GraphicsDeviceType::OpenGLCore)
	}
}

impl GraphicsDeviceDesc {
	pub fn new(device_type: GraphicsDeviceType) -> Self {
		Self {
			device_type,
			debug: false,
		}
	}

	pub fn set_device_type(&mut self, device_type: GraphicsDeviceType) -> &mut Self {
		self.device_type = device_type;
		self
	}

	pub fn device_type(&self) -> GraphicsDeviceType {
		self.device_type
	}

	/// Route driver debug output to `log` once the device is created.
	pub fn set_debug(&mut self, debug: bool) -> &mut Self {
		self.debug = debug;
		self
	}

	pub fn debug(&self) -> bool {
		self.debug
	}

	/// Context version providing every call the device type makes.
	///
	/// `OpenGLCore` relies on direct state access, `OpenGL` on uniform buffers
	/// and `glMapBufferRange`.
	pub fn required_version(&self) -> Result<GlVersion, DeviceError> {
		match self.device_type {
			GraphicsDeviceType::OpenGLCore => Ok(GlVersion::new(4, 5)),
			GraphicsDeviceType::OpenGL => Ok(GlVersion::new(3, 3)),
			other => Err(DeviceError::Unsupported(other)),
		}
	}

	/// A core device also runs on a 3.3 context with the direct state access
	/// and buffer storage extensions.
	pub fn check_context(&self, found: GlVersion, features: &GlFeatures) -> Result<(), DeviceError> {
		let required = self.required_version()?;
		let supported = match self.device_type {
			GraphicsDeviceType::OpenGLCore =>
				found >= required || (found >= GlVersion::new(3, 3) && features.direct_state_access),
			_ => found >= required,
		};

		match supported {
			true => Ok(()),
			false => Err(DeviceError::Version {
				device_type: self.device_type,
				required,
				found,
			}),
		}
	}
}

/// Creates GPU resources for one backend.
pub trait GraphicsDevice: Any {
	fn desc(&self) -> &GraphicsDeviceDesc;
	fn create_graphics_data(
		&self,
		desc: GraphicsDataDesc,
	) -> Result<Rc<dyn GraphicsData>, GraphicsDataError>;
	fn create_texture(&self, desc: TextureDesc) -> Result<Rc<BaseTexture>, TextureError>;
	fn as_any(&self) -> &dyn Any;
}

impl dyn GraphicsDevice {
	pub fn downcast_ref<T: GraphicsDevice>(&self) -> Option<&T> {
		self.as_any().downcast_ref::<T>()
	}
}

/// OpenGL device, backing both the legacy and the core device types.
///
/// Owns no GL objects itself; resources it creates may outlive it.
pub struct OglDevice {
	desc: GraphicsDeviceDesc,
	version: GlVersion,
	extensions: GlExtensions,
	features: GlFeatures,
	_not_send: PhantomData<*const ()>,
}

impl OglDevice {
	/// Create a device for the context current on this thread.
	pub fn create(desc: GraphicsDeviceDesc) -> Result<Rc<Self>, DeviceError> {
		desc.required_version()?;

		if !gl::GetIntegerv::is_loaded() {
			return Err(DeviceError::NotLoaded)
		}

		let version = GlVersion::current();
		let extensions = check_gl_extensions();
		let features = GlFeatures::new(version, &extensions);
		desc.check_context(version, &features)?;

		if desc.debug() {
			if features.debug_output {
				unsafe { debug::setup_gl_debug() };
			} else {
				log::warn!("debug output requested, but OpenGL {version} has no KHR_debug");
			}
		}

		log::info!("created {:?} device on OpenGL {version}", desc.device_type());
		log::debug!("{features:?}");

		Ok(Rc::new(Self {
			desc,
			version,
			extensions,
			features,
			_not_send: PhantomData,
		}))
	}

	pub fn graphics_device_desc(&self) -> &GraphicsDeviceDesc {
		&self.desc
	}

	pub fn version(&self) -> GlVersion {
		self.version
	}

	pub fn extensions(&self) -> &GlExtensions {
		&self.extensions
	}

	pub fn features(&self) -> &GlFeatures {
		&self.features
	}
}

impl GraphicsDevice for OglDevice {
	fn desc(&self) -> &GraphicsDeviceDesc {
		&self.desc
	}

	fn create_graphics_data(
		&self,
		desc: GraphicsDataDesc,
	) -> Result<Rc<dyn GraphicsData>, GraphicsDataError> {
		Ok(match self.desc.device_type() {
			GraphicsDeviceType::OpenGLCore => Rc::new(OglCoreGraphicsData::create(desc)?),
			_ => Rc::new(OglGraphicsData::create(desc)?),
		})
	}

	fn create_texture(&self, desc: TextureDesc) -> Result<Rc<BaseTexture>, TextureError> {
		Ok(Rc::new(BaseTexture::allocate(desc, self.features.texture_storage)?))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn desc_builder() {
		let mut desc = GraphicsDeviceDesc::default();
		assert_eq!(desc.device_type(), GraphicsDeviceType::OpenGLCore);
		assert!(!desc.debug());

		desc.set_device_type(GraphicsDeviceType::OpenGL).set_debug(true);
		assert_eq!(desc.device_type(), GraphicsDeviceType::OpenGL);
		assert!(desc.debug());
	}

	fn check(
		device_type: GraphicsDeviceType,
		version: GlVersion,
		extensions: &[&str],
	) -> Result<(), DeviceError> {
		let features = GlFeatures::new(version, &GlExtensions::from_names(extensions.iter().copied()));
		GraphicsDeviceDesc::new(device_type).check_context(version, &features)
	}

	#[test]
	fn version_requirements() {
		use GraphicsDeviceType::{OpenGL, OpenGLCore};

		assert!(check(OpenGLCore, GlVersion::new(4, 6), &[]).is_ok());
		assert!(matches!(
			check(OpenGLCore, GlVersion::new(4, 3), &[]),
			Err(DeviceError::Version { required: GlVersion { major: 4, minor: 5 }, .. })
		));

		assert!(check(OpenGL, GlVersion::new(3, 3), &[]).is_ok());
		assert!(check(OpenGL, GlVersion::new(3, 0), &[]).is_err());
	}

	#[test]
	fn core_device_on_extensions() {
		use GraphicsDeviceType::OpenGLCore;

		let dsa = ["GL_ARB_direct_state_access", "GL_ARB_buffer_storage"];
		assert!(check(OpenGLCore, GlVersion::new(4, 3), &dsa).is_ok());
		assert!(check(OpenGLCore, GlVersion::new(3, 3), &dsa).is_ok());
		assert!(check(OpenGLCore, GlVersion::new(3, 3), &dsa[..1]).is_err());
		assert!(check(OpenGLCore, GlVersion::new(3, 0), &dsa).is_err());
	}

	#[test]
	fn non_gl_device_types_are_rejected() {
		for device_type in [GraphicsDeviceType::Vulkan, GraphicsDeviceType::D3D11, GraphicsDeviceType::OpenGLES3]
		{
			assert!(matches!(
				OglDevice::create(GraphicsDeviceDesc::new(device_type)),
				Err(DeviceError::Unsupported(t)) if t == device_type
			));
		}
	}

	#[test]
	fn unloaded_gl_is_reported() {
		// nothing in the test binary loads GL function pointers
		assert!(matches!(
			OglDevice::create(GraphicsDeviceDesc::default()),
			Err(DeviceError::NotLoaded)
		));
	}
}
