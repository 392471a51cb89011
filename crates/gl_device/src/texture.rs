// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{ffi::c_void, marker::PhantomData};

use gl::types::{GLenum, GLint, GLsizei, GLuint};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureError {
	#[error("texture dimensions must be non-zero, got {0}x{1}")]
	ZeroSize(u32, u32),
	#[error("{levels} mip levels requested, a {width}x{height} texture has at most {max}")]
	TooManyLevels { levels: u32, max: u32, width: u32, height: u32 },
	#[error("could not create texture (glGenTextures returned 0)")]
	CouldNotCreate,
	#[error("mip level {level} does not exist, the texture has {levels}")]
	InvalidLevel { level: u32, levels: u32 },
}

/// Description of a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
	pub width: u32,
	pub height: u32,
	pub levels: u32,
	/// sized internal format, e.g. `gl::RGBA8`
	pub format: GLenum,
}

impl TextureDesc {
	pub fn new(width: u32, height: u32, format: GLenum) -> Self {
		Self {
			width,
			height,
			levels: 1,
			format,
		}
	}

	pub fn with_levels(mut self, levels: u32) -> Self {
		self.levels = levels;
		self
	}

	/// Length of the full mip chain for this size.
	pub fn max_levels(&self) -> u32 {
		u32::max(self.width, self.height).checked_ilog2().map_or(0, |l| l + 1)
	}

	/// Size of mip `level`.
	pub fn level_size(&self, level: u32) -> (u32, u32) {
		let shrink = |size: u32| size.checked_shr(level).unwrap_or(0).max(1);
		(shrink(self.width), shrink(self.height))
	}

	pub fn validate(&self) -> Result<(), TextureError> {
		if self.width == 0 || self.height == 0 {
			return Err(TextureError::ZeroSize(self.width, self.height))
		}

		let max = self.max_levels();
		if self.levels == 0 || self.levels > max {
			return Err(TextureError::TooManyLevels {
				levels: self.levels,
				max,
				width: self.width,
				height: self.height,
			})
		}

		Ok(())
	}
}

/// Owned `TEXTURE_2D` with a fixed size and level count.
///
/// Storage is immutable (`glTexStorage2D`) where the context supports it,
/// otherwise every level is allocated once with `glTexImage2D`.
///
/// !Send to ensure the texture is deleted on the GL thread.
pub struct BaseTexture {
	texture_id: GLuint,
	target: GLenum,
	desc: TextureDesc,
	_not_send: PhantomData<*const ()>,
}

impl BaseTexture {
	/// Create with immutable storage if `glTexStorage2D` is loaded.
	///
	/// # SIDE EFFECTS
	/// * leaves `TEXTURE_2D` of the active unit unbound
	pub fn create(desc: TextureDesc) -> Result<Self, TextureError> {
		Self::allocate(desc, gl::TexStorage2D::is_loaded())
	}

	/// # SIDE EFFECTS
	/// * leaves `TEXTURE_2D` of the active unit unbound
	pub(crate) fn allocate(desc: TextureDesc, immutable: bool) -> Result<Self, TextureError> {
		desc.validate()?;

		let target = gl::TEXTURE_2D;
		let mut texture_id = 0;

		unsafe {
			gl::GenTextures(1, &mut texture_id);
			if texture_id == 0 {
				return Err(TextureError::CouldNotCreate)
			}

			gl::BindTexture(target, texture_id);
			if immutable {
				gl::TexStorage2D(
					target,
					desc.levels as GLsizei,
					desc.format,
					desc.width as GLsizei,
					desc.height as GLsizei,
				);
			} else {
				let (pixel_format, pixel_type) = transfer_format(desc.format);
				for level in 0..desc.levels {
					let (width, height) = desc.level_size(level);
					gl::TexImage2D(
						target,
						level as GLint,
						desc.format as GLint,
						width as GLsizei,
						height as GLsizei,
						0,
						pixel_format,
						pixel_type,
						std::ptr::null(),
					);
				}
				gl::TexParameteri(target, gl::TEXTURE_MAX_LEVEL, desc.levels as GLint - 1);
			}

			let min_filter = match desc.levels {
				1 => gl::LINEAR,
				_ => gl::LINEAR_MIPMAP_LINEAR,
			};
			gl::TexParameteri(target, gl::TEXTURE_MIN_FILTER, min_filter as GLint);
			gl::TexParameteri(target, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
			gl::TexParameteri(target, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);
			gl::TexParameteri(target, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint);

			gl::BindTexture(target, 0);
		}

		Ok(Self {
			texture_id,
			target,
			desc,
			_not_send: PhantomData,
		})
	}

	pub fn texture_id(&self) -> GLuint {
		self.texture_id
	}

	pub fn target(&self) -> GLenum {
		self.target
	}

	/// Internal format, as required by image unit bindings.
	pub fn format(&self) -> GLenum {
		self.desc.format
	}

	pub fn desc(&self) -> &TextureDesc {
		&self.desc
	}

	/// Replace the contents of mip `level`.
	///
	/// `pixels` must hold a full level in `pixel_format`/`pixel_type`
	/// with the current unpack alignment.
	///
	/// # SIDE EFFECTS
	/// * leaves this texture bound to the active unit
	pub fn upload(
		&self,
		level: u32,
		pixel_format: GLenum,
		pixel_type: GLenum,
		pixels: &[u8],
	) -> Result<(), TextureError> {
		if level >= self.desc.levels {
			return Err(TextureError::InvalidLevel {
				level,
				levels: self.desc.levels,
			})
		}

		let (width, height) = self.desc.level_size(level);

		unsafe {
			gl::BindTexture(self.target, self.texture_id);
			gl::TexSubImage2D(
				self.target,
				level as GLint,
				0,
				0,
				width as GLsizei,
				height as GLsizei,
				pixel_format,
				pixel_type,
				pixels.as_ptr() as *const c_void,
			);
		}

		Ok(())
	}

	/// Bind to texture unit `unit` (`GL_TEXTURE0 + unit`).
	pub fn bind(&self, unit: u32) {
		unsafe {
			gl::ActiveTexture(gl::TEXTURE0 + unit);
			gl::BindTexture(self.target, self.texture_id);
		}
	}
}

/// Pixel format and type accepted alongside a sized internal format
/// when allocating mutable storage.
fn transfer_format(internal_format: GLenum) -> (GLenum, GLenum) {
	match internal_format {
		gl::R8 => (gl::RED, gl::UNSIGNED_BYTE),
		gl::RG8 => (gl::RG, gl::UNSIGNED_BYTE),
		gl::RGB8 | gl::SRGB8 => (gl::RGB, gl::UNSIGNED_BYTE),
		gl::R16F | gl::R32F => (gl::RED, gl::FLOAT),
		gl::RG16F | gl::RG32F => (gl::RG, gl::FLOAT),
		gl::RGB16F | gl::RGB32F => (gl::RGB, gl::FLOAT),
		gl::RGBA16F | gl::RGBA32F => (gl::RGBA, gl::FLOAT),
		gl::R32I => (gl::RED_INTEGER, gl::INT),
		gl::R32UI => (gl::RED_INTEGER, gl::UNSIGNED_INT),
		gl::RGBA32I => (gl::RGBA_INTEGER, gl::INT),
		gl::RGBA32UI => (gl::RGBA_INTEGER, gl::UNSIGNED_INT),
		gl::DEPTH_COMPONENT16 | gl::DEPTH_COMPONENT24 | gl::DEPTH_COMPONENT32F =>
			(gl::DEPTH_COMPONENT, gl::FLOAT),
		gl::DEPTH24_STENCIL8 => (gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8),
		// RGBA8, SRGB8_ALPHA8 and anything unlisted
		_ => (gl::RGBA, gl::UNSIGNED_BYTE),
	}
}

impl Drop for BaseTexture {
	fn drop(&mut self) {
		unsafe { gl::DeleteTextures(1, &self.texture_id) };
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn mip_chain_length() {
		assert_eq!(TextureDesc::new(1, 1, gl::RGBA8).max_levels(), 1);
		assert_eq!(TextureDesc::new(256, 256, gl::RGBA8).max_levels(), 9);
		assert_eq!(TextureDesc::new(1000, 3, gl::RGBA8).max_levels(), 10);
	}

	#[test]
	fn level_sizes() {
		let desc = TextureDesc::new(256, 64, gl::RGBA8);
		assert_eq!(desc.level_size(0), (256, 64));
		assert_eq!(desc.level_size(3), (32, 8));
		assert_eq!(desc.level_size(7), (2, 1));
		assert_eq!(desc.level_size(40), (1, 1));
	}

	#[test]
	fn mutable_storage_formats() {
		assert_eq!(transfer_format(gl::R8), (gl::RED, gl::UNSIGNED_BYTE));
		assert_eq!(transfer_format(gl::RGBA8), (gl::RGBA, gl::UNSIGNED_BYTE));
		assert_eq!(transfer_format(gl::R32UI), (gl::RED_INTEGER, gl::UNSIGNED_INT));
		assert_eq!(transfer_format(gl::DEPTH24_STENCIL8), (gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8));
	}

	#[test]
	fn desc_validation() {
		assert!(TextureDesc::new(64, 64, gl::RGBA8).with_levels(7).validate().is_ok());
		assert!(matches!(
			TextureDesc::new(0, 64, gl::RGBA8).validate(),
			Err(TextureError::ZeroSize(0, 64))
		));
		assert!(matches!(
			TextureDesc::new(64, 64, gl::RGBA8).with_levels(8).validate(),
			Err(TextureError::TooManyLevels { levels: 8, max: 7, .. })
		));
		assert!(TextureDesc::new(64, 64, gl::RGBA8).with_levels(0).validate().is_err());
	}
}
