// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::ops::{BitOr, BitOrAssign};

use gl::types::{GLbitfield, GLenum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GraphicsDeviceType {
	D3D9 = 0,
	D3D11 = 1,
	D3D12 = 2,
	OpenGL = 3,
	OpenGLCore = 4,
	OpenGLES2 = 5,
	OpenGLES3 = 6,
	OpenGLES31 = 7,
	OpenGLES32 = 8,
	Vulkan = 9,
}

impl GraphicsDeviceType {
	/// Whether this crate has a backend for the device type.
	pub fn is_opengl(self) -> bool {
		matches!(self, Self::OpenGL | Self::OpenGLCore)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum GraphicsDataType {
	#[default]
	None = 0,
	TransferSrc = 1,
	TransferDst = 2,
	UniformTexelBuffer = 3,
	UniformBuffer = 4,
	StorageTexelBuffer = 5,
	StorageBuffer = 6,
	StorageVertexBuffer = 7,
	StorageIndexBuffer = 8,
}

impl GraphicsDataType {
	/// Buffer binding target, `None` for `GraphicsDataType::None`.
	pub fn gl_target(self) -> Option<GLenum> {
		Some(match self {
			Self::None => return None,
			Self::TransferSrc => gl::COPY_READ_BUFFER,
			Self::TransferDst => gl::COPY_WRITE_BUFFER,
			Self::UniformTexelBuffer | Self::StorageTexelBuffer => gl::TEXTURE_BUFFER,
			Self::UniformBuffer => gl::UNIFORM_BUFFER,
			Self::StorageBuffer => gl::SHADER_STORAGE_BUFFER,
			Self::StorageVertexBuffer => gl::ARRAY_BUFFER,
			Self::StorageIndexBuffer => gl::ELEMENT_ARRAY_BUFFER,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GraphicsUsageFlags(u32);

impl GraphicsUsageFlags {
	pub const READ: Self = Self(0x0000_0001);
	pub const WRITE: Self = Self(0x0000_0002);
	pub const PERSISTENT: Self = Self(0x0000_0004);
	pub const COHERENT: Self = Self(0x0000_0008);
	pub const FLUSH_EXPLICIT: Self = Self(0x0000_0010);
	pub const DYNAMIC_STORAGE: Self = Self(0x0000_0020);
	pub const CLIENT_STORAGE: Self = Self(0x0000_0040);

	const ALL: u32 = 0x7f;

	pub const fn empty() -> Self {
		Self(0)
	}

	/// Unknown bits are dropped.
	pub const fn from_bits_truncate(bits: u32) -> Self {
		Self(bits & Self::ALL)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Flags for `glBufferStorage`/`glNamedBufferStorage`.
	///
	/// `FLUSH_EXPLICIT` is a mapping flag and is not part of the storage flags.
	pub fn gl_storage_flags(self) -> GLbitfield {
		[
			(Self::READ, gl::MAP_READ_BIT),
			(Self::WRITE, gl::MAP_WRITE_BIT),
			(Self::PERSISTENT, gl::MAP_PERSISTENT_BIT),
			(Self::COHERENT, gl::MAP_COHERENT_BIT),
			(Self::DYNAMIC_STORAGE, gl::DYNAMIC_STORAGE_BIT),
			(Self::CLIENT_STORAGE, gl::CLIENT_STORAGE_BIT),
		]
		.into_iter()
		.filter(|(flag, _)| self.contains(*flag))
		.fold(0, |acc, (_, bit)| acc | bit)
	}

	/// Access flags for `glMapBufferRange`, restricted to what the storage allows.
	pub fn gl_map_flags(self) -> GLbitfield {
		[
			(Self::READ, gl::MAP_READ_BIT),
			(Self::WRITE, gl::MAP_WRITE_BIT),
			(Self::PERSISTENT, gl::MAP_PERSISTENT_BIT),
			(Self::COHERENT, gl::MAP_COHERENT_BIT),
			(Self::FLUSH_EXPLICIT, gl::MAP_FLUSH_EXPLICIT_BIT),
		]
		.into_iter()
		.filter(|(flag, _)| self.contains(*flag))
		.fold(0, |acc, (_, bit)| acc | bit)
	}

	/// Usage hint for `glBufferData` on contexts without immutable storage.
	pub fn gl_usage_hint(self) -> GLenum {
		if self.contains(Self::WRITE) || self.contains(Self::DYNAMIC_STORAGE) {
			gl::DYNAMIC_DRAW
		} else if self.contains(Self::READ) {
			gl::STREAM_READ
		} else {
			gl::STATIC_DRAW
		}
	}
}

impl BitOr for GraphicsUsageFlags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		Self(self.0 | rhs.0)
	}
}

impl BitOrAssign for GraphicsUsageFlags {
	fn bitor_assign(&mut self, rhs: Self) {
		self.0 |= rhs.0;
	}
}
