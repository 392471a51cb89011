// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

//! Checkerboard driven by a uniform block, a texture and plain uniforms.
//!
//! ```text
//! uniform_block [--legacy]
//! ```
//!
//! `--legacy` runs on an `OpenGL` device with a 3.3 context instead of `OpenGLCore`.
//! Set `CHECKER_QUALITY=low` to select the static variant of the shader.
//! The checker texture is drawn by a compute pass when the context supports it.

use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use gl_device::{
	BaseTexture,
	GraphicsData,
	GraphicsDataDesc,
	GraphicsDataError,
	GraphicsDataType,
	GraphicsDevice,
	GraphicsDeviceType,
	GraphicsUsageFlags,
	ImageAccess,
	OglCoreGraphicsData,
	OglDevice,
	OglGraphicsData,
	ProgramError,
	ProgramShader,
	ShaderLibrary,
	ShaderType,
	TextureDesc,
	Uniform,
};
use gl_device_demos::SHADER_DIR;
use glam::{Vec2, Vec4};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Palette {
	dark: Vec4,
	light: Vec4,
}

const CHECKER_SIZE: u32 = 8;

fn checker_pixels() -> Vec<u8> {
	(0..CHECKER_SIZE * CHECKER_SIZE)
		.map(|i| match (i % CHECKER_SIZE + i / CHECKER_SIZE) % 2 {
			0 => 0,
			_ => 255,
		})
		.collect()
}

/// Write `palette` through a mapping of the whole buffer.
fn write_palette(buffer: &dyn GraphicsData, palette: &Palette) -> Result<(), GraphicsDataError> {
	let bytes = bytemuck::bytes_of(palette);
	let write = |region: &mut [u8]| region.copy_from_slice(bytes);

	if let Some(core) = buffer.downcast_ref::<OglCoreGraphicsData>() {
		core.map_range(0, bytes.len(), write)
	} else if let Some(legacy) = buffer.downcast_ref::<OglGraphicsData>() {
		legacy.map_range(0, bytes.len(), write)
	} else {
		Err(GraphicsDataError::NotMappable)
	}
}

/// Fill `checker` with the `Checker.Compute` shader.
fn draw_checker(
	device: &Rc<dyn GraphicsDevice>,
	library: &Rc<ShaderLibrary>,
	checker: &BaseTexture,
) -> Result<(), ProgramError> {
	let mut compute = ProgramShader::new(Rc::clone(library));
	compute.set_device(device);
	compute.initialize()?;
	compute.add_shader(ShaderType::Compute, "Checker.Compute")?;
	compute.link()?;
	compute.bind()?;
	compute.bind_image("target", checker, 0, 0, false, 0, ImageAccess::WriteOnly)?;

	unsafe {
		gl::DispatchCompute(CHECKER_SIZE / 8, CHECKER_SIZE / 8, 1);
		gl::MemoryBarrier(gl::TEXTURE_FETCH_BARRIER_BIT);
	}

	Ok(())
}

fn main() {
	let device_type = match std::env::args().any(|arg| arg == "--legacy") {
		true => GraphicsDeviceType::OpenGL,
		false => GraphicsDeviceType::OpenGLCore,
	};

	gl_device_demos::view_window(device_type, true, |device, _| {
		let quality = std::env::var("CHECKER_QUALITY").unwrap_or_else(|_| "high".to_owned());
		let features = device
			.downcast_ref::<OglDevice>()
			.map(|d| *d.features())
			.unwrap_or_default();

		let mut library = ShaderLibrary::new(SHADER_DIR, ".glsl");
		library.add_directive("*", match device_type {
			GraphicsDeviceType::OpenGL => "#version 330 core",
			_ => "#version 450 core",
		});
		let library = Rc::new(library);

		let mut program = ProgramShader::new(Rc::clone(&library));
		program.set_device(&device);
		program.define("quality", quality);
		program.define("PULSE_SPEED", "2.0");

		program.initialize().unwrap();
		program
			.set_include_from_file("palette.glsl", format!("{SHADER_DIR}palette.glsl"))
			.unwrap();
		program.add_shader(ShaderType::Vertex, "Checker.Vertex").unwrap();
		program.add_shader(ShaderType::Fragment, "Checker.Fragment").unwrap();
		program.link().unwrap();
		program.init_block_binding("Palette").unwrap();

		// the low quality variant compiles `time` out
		let time_location = program.uniform_location("time").ok();

		let mut palette = Palette {
			dark: Vec4::new(0.1, 0.1, 0.15, 1.0),
			light: Vec4::new(0.9, 0.6, 0.2, 1.0),
		};
		let palette_buffer = device
			.create_graphics_data(GraphicsDataDesc::from_slice(
				GraphicsDataType::UniformBuffer,
				GraphicsUsageFlags::WRITE | GraphicsUsageFlags::PERSISTENT | GraphicsUsageFlags::FLUSH_EXPLICIT,
				&[palette],
			))
			.unwrap();

		let checker = device.create_texture(TextureDesc::new(CHECKER_SIZE, CHECKER_SIZE, gl::R8)).unwrap();
		if features.compute_shader && features.image_load_store {
			draw_checker(&device, &library, &checker).unwrap();
			log::info!("checker texture drawn by a compute pass");
		} else {
			unsafe { gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1) };
			checker.upload(0, gl::RED, gl::UNSIGNED_BYTE, &checker_pixels()).unwrap();
		}

		let mut vao = 0;
		unsafe { gl::GenVertexArrays(1, &mut vao) };

		let mut time = 0.0f32;

		// loop
		move |(width, height)| {
			time += 1.0 / 60.0;
			palette.light.z = 0.2 + 0.2 * time.sin().abs();
			write_palette(&*palette_buffer, &palette).unwrap();

			unsafe {
				gl::ClearColor(0.2, 0.2, 0.2, 1.0);
				gl::Clear(gl::COLOR_BUFFER_BIT);
			}

			program.bind().unwrap();
			program.bind_buffer("Palette", &*palette_buffer).unwrap();
			program.bind_texture("checker", &checker, 0).unwrap();
			program.set_uniform("resolution", Vec2::new(width as f32, height as f32)).unwrap();
			if let Some(location) = time_location {
				unsafe { time.set_uniform(location) };
			}

			unsafe {
				gl::BindVertexArray(vao);
				gl::DrawArrays(gl::TRIANGLES, 0, 3);
			}
		}
	});
}
