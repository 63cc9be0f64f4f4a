//! Application contract.
//!
//! The interface between the runtime loop and the application: window
//! event callbacks and a per-frame context that owns frame acquisition.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
