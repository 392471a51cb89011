// Copyright (C) 2022 the ITK authors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/./

use std::rc::Rc;

use gl_device::{GraphicsDevice, GraphicsDeviceDesc, GraphicsDeviceType, OglDevice};
use glfw::{Context, OpenGlProfileHint, WindowHint};

/// Directory holding the demo effect files.
pub const SHADER_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/");

/// Open a window with a debug context for `device_type` and run `test` in it.
///
/// `OpenGLCore` gets a 4.5 core context, `OpenGL` a 3.3 core one.
/// `test` gets the device and the framebuffer size and returns the per-frame
/// loop, which receives the current framebuffer size.
pub fn view_window<I, L>(device_type: GraphicsDeviceType, vsync: bool, test: I)
where
	I: FnOnce(Rc<dyn GraphicsDevice>, (i32, i32)) -> L,
	L: FnMut((i32, i32)),
{
	env_logger::init();

	let mut glfw = glfw::init(glfw::FAIL_ON_ERRORS).unwrap();
	let (major, minor) = match device_type {
		GraphicsDeviceType::OpenGL => (3, 3),
		_ => (4, 5),
	};
	glfw.window_hint(WindowHint::ContextVersion(major, minor));
	glfw.window_hint(WindowHint::OpenGlProfile(OpenGlProfileHint::Core));
	glfw.window_hint(WindowHint::OpenGlDebugContext(true));

	let (mut window, events) =
		glfw.create_window(1000, 1000, "gl_device", glfw::WindowMode::Windowed).unwrap();

	window.make_current();

	if !vsync {
		glfw.set_swap_interval(glfw::SwapInterval::None);
	}

	window.set_framebuffer_size_polling(true);

	gl::load_with(|p| window.get_proc_address(p));

	let mut desc = GraphicsDeviceDesc::new(device_type);
	desc.set_debug(true);
	let device: Rc<dyn GraphicsDevice> = OglDevice::create(desc).unwrap();

	let mut size = window.get_framebuffer_size();
	let mut test_loop = test(device, size);
	while !window.should_close() {
		test_loop(size);

		window.swap_buffers();
		glfw.poll_events();
		for (_, event) in glfw::flush_messages(&events) {
			if let glfw::WindowEvent::FramebufferSize(width, height) = event {
				size = (width, height);
				unsafe { gl::Viewport(0, 0, width, height) };
			}
		}
	}
}

#[cfg(test)]
mod test {
	use gl_device::ShaderLibrary;

	use super::SHADER_DIR;

	#[test]
	fn checker_effect_sections() {
		let library = ShaderLibrary::new(SHADER_DIR, ".glsl");
		for key in ["Checker.Vertex", "Checker.Fragment", "Checker.Compute"] {
			assert!(library.get_shader(key).is_ok(), "{key}");
		}

		let compute = library.get_shader("Checker.Compute").unwrap();
		assert!(compute.text.contains("uniform writeonly image2D target"));
	}
}
