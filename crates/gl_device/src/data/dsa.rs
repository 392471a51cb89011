// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{any::Any, cell::Cell, ffi::c_void, ptr};

use gl::types::{GLenum, GLintptr, GLsizeiptr, GLuint};

use super::{GraphicsData, GraphicsDataDesc, GraphicsDataError, MapGuard};
use crate::types::GraphicsUsageFlags;

/// Immutable-storage buffer for core (4.5) contexts, edited with direct state access.
///
/// Buffers created with `PERSISTENT` and `READ` or `WRITE` usage stay mapped
/// for their whole lifetime; `map_range` and non-dynamic `update`s then go
/// through the persistent mapping.
///
/// The raw mapping pointer keeps this type !Send, so the
/// backing buffer is deleted on the GL thread.
pub struct OglCoreGraphicsData {
	desc: GraphicsDataDesc,
	target: GLenum,
	gl_buffer: GLuint,
	persistent_region: *mut u8,
	mapped: Cell<bool>,
}

impl OglCoreGraphicsData {
	pub fn create(desc: GraphicsDataDesc) -> Result<Self, GraphicsDataError> {
		let target = desc.validate_storage()?;
		let usage = desc.usage();
		let size = desc.stream_size() as GLsizeiptr;

		let mut gl_buffer = 0;
		let persistent_region = unsafe {
			gl::CreateBuffers(1, &mut gl_buffer);
			if gl_buffer == 0 {
				return Err(GraphicsDataError::CouldNotCreate)
			}

			gl::NamedBufferStorage(
				gl_buffer,
				size,
				desc.stream().map_or(ptr::null(), |s| s.as_ptr() as *const c_void),
				usage.gl_storage_flags(),
			);

			if Self::is_persistent(usage) {
				let region = gl::MapNamedBufferRange(gl_buffer, 0, size, usage.gl_map_flags()) as *mut u8;
				if region.is_null() {
					gl::DeleteBuffers(1, &gl_buffer);
					return Err(GraphicsDataError::MapFailed)
				}
				region
			} else {
				ptr::null_mut()
			}
		};

		Ok(Self {
			desc,
			target,
			gl_buffer,
			persistent_region,
			mapped: Cell::new(false),
		})
	}

	fn is_persistent(usage: GraphicsUsageFlags) -> bool {
		usage.contains(GraphicsUsageFlags::PERSISTENT)
			&& (usage.contains(GraphicsUsageFlags::READ) || usage.contains(GraphicsUsageFlags::WRITE))
	}

	/// The GL buffer name.
	pub fn instance_id(&self) -> GLuint {
		self.gl_buffer
	}

	pub fn target(&self) -> GLenum {
		self.target
	}

	pub fn is_persistently_mapped(&self) -> bool {
		!self.persistent_region.is_null()
	}

	/// Map `len` bytes at `offset` for the duration of `f`.
	///
	/// Writes to a `FLUSH_EXPLICIT` persistent mapping are flushed after `f` returns.
	/// Synchronizing with GPU reads of the same range is up to the caller.
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

		unsafe {
			if !self.persistent_region.is_null() {
				let result = {
					let _guard = MapGuard::new(&self.mapped, || {});
					f(std::slice::from_raw_parts_mut(self.persistent_region.add(offset), len))
				};

				self.flush(offset, len);
				return Ok(result)
			}

			let access = self.desc.usage().gl_map_flags() & (gl::MAP_READ_BIT | gl::MAP_WRITE_BIT);
			if access == 0 {
				return Err(GraphicsDataError::NotMappable)
			}

			let region =
				gl::MapNamedBufferRange(self.gl_buffer, offset as GLintptr, len as GLsizeiptr, access)
					as *mut u8;
			if region.is_null() {
				return Err(GraphicsDataError::MapFailed)
			}

			let _guard = MapGuard::new(&self.mapped, || {
				gl::UnmapNamedBuffer(self.gl_buffer);
			});
			Ok(f(std::slice::from_raw_parts_mut(region, len)))
		}
	}

	/// # SAFETY
	/// * must be called from GL thread
	unsafe fn flush(&self, offset: usize, len: usize) {
		let usage = self.desc.usage();
		if usage.contains(GraphicsUsageFlags::FLUSH_EXPLICIT) && usage.contains(GraphicsUsageFlags::WRITE) {
			gl::FlushMappedNamedBufferRange(self.gl_buffer, offset as GLintptr, len as GLsizeiptr);
		}
	}
}

impl GraphicsData for OglCoreGraphicsData {
	fn desc(&self) -> &GraphicsDataDesc {
		&self.desc
	}

	fn update(&self, offset: usize, bytes: &[u8]) -> Result<(), GraphicsDataError> {
		self.desc.check_range(offset, bytes.len())?;
		if bytes.is_empty() {
			return Ok(())
		}

		let usage = self.desc.usage();

		// a persistent mapping does not block buffer updates, a temporary one does
		if self.mapped.get() && self.persistent_region.is_null() {
			return Err(GraphicsDataError::AlreadyMapped)
		}

		if usage.contains(GraphicsUsageFlags::DYNAMIC_STORAGE) {
			unsafe {
				gl::NamedBufferSubData(
					self.gl_buffer,
					offset as GLintptr,
					bytes.len() as GLsizeiptr,
					bytes.as_ptr() as *const c_void,
				);
			}
			Ok(())
		} else if !self.persistent_region.is_null() && usage.contains(GraphicsUsageFlags::WRITE) {
			self.map_range(offset, bytes.len(), |region| region.copy_from_slice(bytes))
		} else {
			Err(GraphicsDataError::NotDynamic)
		}
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl Drop for OglCoreGraphicsData {
	fn drop(&mut self) {
		unsafe {
			if !self.persistent_region.is_null() {
				gl::UnmapNamedBuffer(self.gl_buffer);
			}
			gl::DeleteBuffers(1, &self.gl_buffer);
		}
	}
}
