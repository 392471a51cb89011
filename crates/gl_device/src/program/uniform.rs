// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use gl::types::{GLint, GLsizei};
use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

/// A value that can be written to a uniform location.
pub trait Uniform {
	/// # SAFETY
	/// * must be called from GL thread
	/// * the program owning `location` must be bound
	unsafe fn set_uniform(&self, location: GLint);
}

macro_rules! scalar_uniforms {
	($($type:ty => $func:ident;)*) => {
		$(
			impl Uniform for $type {
				#[inline]
				unsafe fn set_uniform(&self, location: GLint) {
					gl::$func(location, *self);
				}
			}
		)*
	}
}

macro_rules! vector_uniforms {
	($($type:ty => $func:ident;)*) => {
		$(
			impl Uniform for $type {
				#[inline]
				unsafe fn set_uniform(&self, location: GLint) {
					gl::$func(location, 1, self.to_array().as_ptr());
				}
			}
		)*
	}
}

macro_rules! matrix_uniforms {
	($($type:ty => $func:ident;)*) => {
		$(
			impl Uniform for $type {
				#[inline]
				unsafe fn set_uniform(&self, location: GLint) {
					// glam matrices are column major, no transpose needed
					gl::$func(location, 1, gl::FALSE, self.to_cols_array().as_ptr());
				}
			}
		)*
	}
}

macro_rules! array_uniforms {
	($($type:ty => $func:ident;)*) => {
		$(
			impl<const N: usize> Uniform for [$type; N] {
				#[inline]
				unsafe fn set_uniform(&self, location: GLint) {
					gl::$func(location, N as GLsizei, self.as_ptr());
				}
			}
		)*
	}
}

scalar_uniforms! {
	i32 => Uniform1i;
	u32 => Uniform1ui;
	f32 => Uniform1f;
}

vector_uniforms! {
	Vec2 => Uniform2fv;
	Vec3 => Uniform3fv;
	Vec4 => Uniform4fv;
	IVec2 => Uniform2iv;
	IVec3 => Uniform3iv;
	IVec4 => Uniform4iv;
	UVec2 => Uniform2uiv;
	UVec3 => Uniform3uiv;
	UVec4 => Uniform4uiv;
}

matrix_uniforms! {
	Mat2 => UniformMatrix2fv;
	Mat3 => UniformMatrix3fv;
	Mat4 => UniformMatrix4fv;
}

array_uniforms! {
	i32 => Uniform1iv;
	u32 => Uniform1uiv;
	f32 => Uniform1fv;
}

impl Uniform for bool {
	#[inline]
	unsafe fn set_uniform(&self, location: GLint) {
		gl::Uniform1i(location, *self as GLint);
	}
}
