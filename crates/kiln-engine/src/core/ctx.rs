use winit::window::{Window, WindowId};

use crate::device::Gpu;
use crate::render::RenderTarget;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Width over height of the drawable area; 1.0 while minimized.
    pub fn aspect_ratio(&self) -> f32 {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return 1.0;
        }
        size.width as f32 / size.height as f32
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires a frame, calls `draw` with its [`RenderTarget`] and presents it.
    ///
    /// Skipped frames return `Continue` without calling `draw`.
    pub fn render<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&mut RenderTarget<'_>) -> AppControl,
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return AppControl::Continue,
            Err(e) => {
                log::error!("cannot acquire a frame: {e}");
                return AppControl::Exit;
            }
        };

        let control = draw(&mut frame.target());

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);
        control
    }
}
