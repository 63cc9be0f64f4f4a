//! Window surface and GPU device.
//!
//! [`Gpu`] owns the wgpu device and the window's surface. It hands out
//! [`WgpuBackend`](crate::render::backend::gpu::WgpuBackend)s that share its
//! device and acquires the [`Frame`]s the dispatcher draws into.

mod context;
mod init;

pub use context::{Frame, Gpu};
pub use init::GpuInit;
