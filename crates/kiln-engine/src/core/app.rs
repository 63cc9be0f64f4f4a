use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::device::Gpu;
use crate::render::RenderError;

use super::ctx::FrameCtx;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// What the runtime drives: load-time setup, window events, one call per frame.
pub trait App {
    /// Runs once per window after its GPU context exists.
    ///
    /// Compile programs and build pipelines here. An error closes the
    /// runtime before the first frame.
    fn setup(&mut self, gpu: &Gpu<'_>) -> Result<(), RenderError>;

    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
