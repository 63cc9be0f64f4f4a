//! Kiln engine crate.
//!
//! A small real-time rendering front-end: transform uniforms, a shader
//! program cache, pipeline state objects and a per-frame draw dispatcher,
//! plus the window and GPU plumbing to drive them through wgpu.

pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
