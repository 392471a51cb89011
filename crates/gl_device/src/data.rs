// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::{any::Any, cell::Cell};

use gl::types::GLenum;
use thiserror::Error;

use crate::types::{GraphicsDataType, GraphicsUsageFlags};

mod compat;
mod dsa;

pub use self::{compat::OglGraphicsData, dsa::OglCoreGraphicsData};

#[derive(Debug, Error)]
pub enum GraphicsDataError {
	#[error("graphics data of type `None` has no buffer target")]
	NoTarget,
	#[error("graphics data must have a non-zero size")]
	Empty,
	#[error("initial stream is {stream} bytes, but the stream size is {expected}")]
	SizeMismatch { stream: usize, expected: usize },
	#[error("could not create buffer (glGenBuffers/glCreateBuffers returned 0)")]
	CouldNotCreate,
	#[error("range {offset}+{len} is outside the {size} byte buffer")]
	OutOfRange { offset: usize, len: usize, size: usize },
	#[error("buffer storage is immutable, create it with DYNAMIC_STORAGE to update it")]
	NotDynamic,
	#[error("buffer was created without READ or WRITE usage and cannot be mapped")]
	NotMappable,
	#[error("buffer is already mapped")]
	AlreadyMapped,
	#[error("could not map buffer (glMapBufferRange returned null)")]
	MapFailed,
	#[error("invalid usage for immutable storage: {0}")]
	InvalidUsage(&'static str),
}

/// Description of a buffer to create with `GraphicsDevice::create_graphics_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphicsDataDesc {
	ty: GraphicsDataType,
	usage: GraphicsUsageFlags,
	stream_size: usize,
	stream: Option<Vec<u8>>,
}

impl GraphicsDataDesc {
	/// An uninitialized buffer of `stream_size` bytes.
	pub fn new(ty: GraphicsDataType, usage: GraphicsUsageFlags, stream_size: usize) -> Self {
		Self {
			ty,
			usage,
			stream_size,
			stream: None,
		}
	}

	/// A buffer initialized with the bytes of `data`.
	pub fn from_slice<T: bytemuck::Pod>(
		ty: GraphicsDataType,
		usage: GraphicsUsageFlags,
		data: &[T],
	) -> Self {
		let stream = bytemuck::cast_slice::<T, u8>(data).to_vec();
		Self {
			ty,
			usage,
			stream_size: stream.len(),
			stream: Some(stream),
		}
	}

	/// Set the initial contents. The length must match `stream_size`.
	pub fn with_stream(mut self, stream: Vec<u8>) -> Self {
		self.stream = Some(stream);
		self
	}

	pub fn ty(&self) -> GraphicsDataType {
		self.ty
	}

	pub fn usage(&self) -> GraphicsUsageFlags {
		self.usage
	}

	pub fn stream_size(&self) -> usize {
		self.stream_size
	}

	pub fn stream(&self) -> Option<&[u8]> {
		self.stream.as_deref()
	}

	/// Check the description and return its buffer target.
	pub fn validate(&self) -> Result<GLenum, GraphicsDataError> {
		let target = self.ty.gl_target().ok_or(GraphicsDataError::NoTarget)?;

		if self.stream_size == 0 {
			return Err(GraphicsDataError::Empty)
		}

		match &self.stream {
			Some(stream) if stream.len() != self.stream_size => Err(GraphicsDataError::SizeMismatch {
				stream: stream.len(),
				expected: self.stream_size,
			}),
			_ => Ok(target),
		}
	}

	/// `validate`, plus the flag rules of `glBufferStorage` and `glMapBufferRange`.
	pub fn validate_storage(&self) -> Result<GLenum, GraphicsDataError> {
		let target = self.validate()?;

		let has = |flag| self.usage.contains(flag);
		let mappable = has(GraphicsUsageFlags::READ) || has(GraphicsUsageFlags::WRITE);

		if has(GraphicsUsageFlags::PERSISTENT) && !mappable {
			return Err(GraphicsDataError::InvalidUsage("PERSISTENT needs READ or WRITE"))
		}
		if has(GraphicsUsageFlags::COHERENT) && !has(GraphicsUsageFlags::PERSISTENT) {
			return Err(GraphicsDataError::InvalidUsage("COHERENT needs PERSISTENT"))
		}
		if has(GraphicsUsageFlags::FLUSH_EXPLICIT) && !has(GraphicsUsageFlags::WRITE) {
			return Err(GraphicsDataError::InvalidUsage("FLUSH_EXPLICIT needs WRITE"))
		}

		Ok(target)
	}

	pub fn check_range(&self, offset: usize, len: usize) -> Result<(), GraphicsDataError> {
		match offset.checked_add(len) {
			Some(end) if end <= self.stream_size => Ok(()),
			_ => Err(GraphicsDataError::OutOfRange {
				offset,
				len,
				size: self.stream_size,
			}),
		}
	}
}

/// Marks a buffer mapped until dropped, then clears the mark and runs `unmap`.
///
/// Also runs when the closure given to `map_range` unwinds.
pub(crate) struct MapGuard<'m, F: FnMut()> {
	mapped: &'m Cell<bool>,
	unmap: F,
}

impl<'m, F: FnMut()> MapGuard<'m, F> {
	pub(crate) fn new(mapped: &'m Cell<bool>, unmap: F) -> Self {
		mapped.set(true);
		Self { mapped, unmap }
	}
}

impl<F: FnMut()> Drop for MapGuard<'_, F> {
	fn drop(&mut self) {
		self.mapped.set(false);
		(self.unmap)();
	}
}

/// Type-erased GPU buffer.
///
/// The concrete type depends on the device that created it, use
/// `downcast_ref` to reach backend specifics such as the buffer name.
pub trait GraphicsData: Any {
	fn desc(&self) -> &GraphicsDataDesc;
	/// Overwrite `bytes.len()` bytes starting at `offset`.
	fn update(&self, offset: usize, bytes: &[u8]) -> Result<(), GraphicsDataError>;
	fn as_any(&self) -> &dyn Any;
}

impl dyn GraphicsData {
	pub fn downcast_ref<T: GraphicsData>(&self) -> Option<&T> {
		self.as_any().downcast_ref::<T>()
	}

	pub fn is<T: GraphicsData>(&self) -> bool {
		self.as_any().is::<T>()
	}

	/// `update` with the bytes of `data`.
	pub fn write<T: bytemuck::Pod>(&self, offset: usize, data: &[T]) -> Result<(), GraphicsDataError> {
		self.update(offset, bytemuck::cast_slice(data))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
	#[repr(C)]
	struct Light {
		position: [f32; 4],
		color: [f32; 4],
	}

	#[test]
	fn desc_from_slice() {
		let lights = [Light {
			position: [0.0, 1.0, 0.0, 1.0],
			color: [1.0; 4],
		}; 2];
		let desc = GraphicsDataDesc::from_slice(
			GraphicsDataType::UniformBuffer,
			GraphicsUsageFlags::DYNAMIC_STORAGE,
			&lights,
		);

		assert_eq!(desc.stream_size(), 64);
		assert_eq!(desc.stream().map(|s| s.len()), Some(64));
		assert_eq!(desc.validate().unwrap(), gl::UNIFORM_BUFFER);
	}

	#[test]
	fn desc_validation() {
		let usage = GraphicsUsageFlags::WRITE;

		assert!(matches!(
			GraphicsDataDesc::new(GraphicsDataType::None, usage, 16).validate(),
			Err(GraphicsDataError::NoTarget)
		));
		assert!(matches!(
			GraphicsDataDesc::new(GraphicsDataType::StorageBuffer, usage, 0).validate(),
			Err(GraphicsDataError::Empty)
		));
		assert!(matches!(
			GraphicsDataDesc::new(GraphicsDataType::StorageBuffer, usage, 16)
				.with_stream(vec![0; 8])
				.validate(),
			Err(GraphicsDataError::SizeMismatch { stream: 8, expected: 16 })
		));
		assert_eq!(
			GraphicsDataDesc::new(GraphicsDataType::StorageBuffer, usage, 16).validate().unwrap(),
			gl::SHADER_STORAGE_BUFFER
		);
	}

	#[test]
	fn storage_flag_rules() {
		use GraphicsUsageFlags as U;
		let desc = |usage| GraphicsDataDesc::new(GraphicsDataType::UniformBuffer, usage, 64);

		for usage in [U::PERSISTENT, U::COHERENT, U::WRITE | U::COHERENT, U::READ | U::FLUSH_EXPLICIT] {
			assert!(matches!(desc(usage).validate_storage(), Err(GraphicsDataError::InvalidUsage(_))));
			// the legacy path has no storage flags to get wrong
			assert!(desc(usage).validate().is_ok());
		}

		for usage in [
			U::empty(),
			U::DYNAMIC_STORAGE,
			U::READ | U::PERSISTENT,
			U::WRITE | U::PERSISTENT | U::COHERENT,
			U::WRITE | U::PERSISTENT | U::FLUSH_EXPLICIT,
		] {
			assert_eq!(desc(usage).validate_storage().unwrap(), gl::UNIFORM_BUFFER);
		}
	}

	#[test]
	fn map_guard_unmaps_on_unwind() {
		let mapped = Cell::new(false);
		let unmapped = Cell::new(0);

		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			let _guard = MapGuard::new(&mapped, || unmapped.set(unmapped.get() + 1));
			assert!(mapped.get());
			panic!("writer failed");
		}));

		assert!(result.is_err());
		assert!(!mapped.get());
		assert_eq!(unmapped.get(), 1);
	}

	#[test]
	fn range_checks() {
		let desc = GraphicsDataDesc::new(GraphicsDataType::UniformBuffer, GraphicsUsageFlags::WRITE, 64);

		assert!(desc.check_range(0, 64).is_ok());
		assert!(desc.check_range(48, 16).is_ok());
		assert!(desc.check_range(64, 0).is_ok());
		assert!(matches!(
			desc.check_range(60, 8),
			Err(GraphicsDataError::OutOfRange { offset: 60, len: 8, size: 64 })
		));
		assert!(desc.check_range(usize::MAX, 2).is_err());
	}
}
