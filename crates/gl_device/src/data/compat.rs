// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{any::Any, cell::Cell, ffi::c_void, marker::PhantomData, ptr};

use gl::types::{GLenum, GLintptr, GLsizeiptr, GLuint};

use super::{GraphicsData, GraphicsDataDesc, GraphicsDataError, MapGuard};

/// Buffer for legacy contexts, edited through its binding point.
///
/// Every operation binds the buffer to its target and leaves it bound.
///
/// !Send to ensure the backing GL buffer is deleted
/// on the same thread
pub struct OglGraphicsData {
	desc: GraphicsDataDesc,
	target: GLenum,
	gl_buffer: GLuint,
	mapped: Cell<bool>,
	_not_send: PhantomData<*const ()>,
}

impl OglGraphicsData {
	/// # SIDE EFFECTS
	/// * binds the new buffer to its target
	pub fn create(desc: GraphicsDataDesc) -> Result<Self, GraphicsDataError> {
		let target = desc.validate()?;

		let mut gl_buffer = 0;
		unsafe {
			gl::GenBuffers(1, &mut gl_buffer);
			if gl_buffer == 0 {
				return Err(GraphicsDataError::CouldNotCreate)
			}

			gl::BindBuffer(target, gl_buffer);
			gl::BufferData(
				target,
				desc.stream_size() as GLsizeiptr,
				desc.stream().map_or(ptr::null(), |s| s.as_ptr() as *const c_void),
				desc.usage().gl_usage_hint(),
			);
		}

		Ok(Self {
			desc,
			target,
			gl_buffer,
			mapped: Cell::new(false),
			_not_send: PhantomData,
		})
	}

	/// The GL buffer name.
	pub fn instance_id(&self) -> GLuint {
		self.gl_buffer
	}

	pub fn target(&self) -> GLenum {
		self.target
	}

	pub fn bind(&self) {
		unsafe { gl::BindBuffer(self.target, self.gl_buffer) };
	}

	/// Map `len` bytes at `offset` for the duration of `f`.
	///
	/// Access follows the READ/WRITE usage flags; a buffer with neither
	/// is mapped for both, since mutable storage allows it.
	pub fn map_range<R>(
		&self,
		offset: usize,
		len: usize,
		f: impl FnOnce(&mut [u8]) -> R,
	) -> Result<R, GraphicsDataError> {
		self.desc.check_range(offset, len)?;
		if self.mapped.get() {
			return Err(GraphicsDataError::AlreadyMapped)
		}
		if len == 0 {
			return Ok(f(&mut []))
		}

		let access = match self.desc.usage().gl_map_flags() & (gl::MAP_READ_BIT | gl::MAP_WRITE_BIT) {
			0 => gl::MAP_READ_BIT | gl::MAP_WRITE_BIT,
			access => access,
		};

		unsafe {
			self.bind();
			let region =
				gl::MapBufferRange(self.target, offset as GLintptr, len as GLsizeiptr, access) as *mut u8;
			if region.is_null() {
				return Err(GraphicsDataError::MapFailed)
			}

			let _guard = MapGuard::new(&self.mapped, || {
				// `f` may have bound something else to the target
				self.bind();
				gl::UnmapBuffer(self.target);
			});
			Ok(f(std::slice::from_raw_parts_mut(region, len)))
		}
	}
}

impl GraphicsData for OglGraphicsData {
	fn desc(&self) -> &GraphicsDataDesc {
		&self.desc
	}

	fn update(&self, offset: usize, bytes: &[u8]) -> Result<(), GraphicsDataError> {
		self.desc.check_range(offset, bytes.len())?;
		if bytes.is_empty() {
			return Ok(())
		}
		if self.mapped.get() {
			return Err(GraphicsDataError::AlreadyMapped)
		}

		unsafe {
			self.bind();
			gl::BufferSubData(
				self.target,
				offset as GLintptr,
				bytes.len() as GLsizeiptr,
				bytes.as_ptr() as *const c_void,
			);
		}

		Ok(())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl Drop for OglGraphicsData {
	fn drop(&mut self) {
		unsafe { gl::DeleteBuffers(1, &self.gl_buffer) };
	}
}

#[cfg(test)]
mod test {
	use std::mem::ManuallyDrop;

	use super::*;
	use crate::types::{GraphicsDataType, GraphicsUsageFlags};

	// never handed to GL, and never dropped so no GL call is made
	fn unbacked(mapped: bool) -> ManuallyDrop<OglGraphicsData> {
		ManuallyDrop::new(OglGraphicsData {
			desc: GraphicsDataDesc::new(GraphicsDataType::UniformBuffer, GraphicsUsageFlags::WRITE, 16),
			target: gl::UNIFORM_BUFFER,
			gl_buffer: 0,
			mapped: Cell::new(mapped),
			_not_send: PhantomData,
		})
	}

	#[test]
	fn empty_map_skips_gl() {
		let data = unbacked(false);
		assert_eq!(data.map_range(16, 0, |region| region.len()).unwrap(), 0);
		assert!(matches!(data.map_range(8, 16, |_| ()), Err(GraphicsDataError::OutOfRange { .. })));
	}

	#[test]
	fn mapped_buffer_rejects_access() {
		let data = unbacked(true);
		assert!(matches!(data.map_range(0, 0, |_| ()), Err(GraphicsDataError::AlreadyMapped)));
		assert!(matches!(data.update(0, &[1, 2]), Err(GraphicsDataError::AlreadyMapped)));
	}
}
