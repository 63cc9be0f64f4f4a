//! Transform Buffer Manager.
//!
//! Owns the GPU copy of the model/view/projection block. Matrix updates only
//! touch host memory and mark the block dirty; `flush` uploads the whole
//! 192-byte block in one write.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::render::backend::Backend;
use crate::render::pipeline::UniformSlot;
use crate::render::RenderError;

/// Host copy of the transform uniform block. Column-major, std140-compatible.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformBlock {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for TransformBlock {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Outcome of [`TransformBuffer::flush`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Flush {
    Uploaded,
    Clean,
}

pub struct TransformBuffer<B: Backend> {
    slot: UniformSlot,
    block: TransformBlock,
    dirty: bool,
    buffer: Option<B::Buffer>,
}

impl<B: Backend> TransformBuffer<B> {
    /// Allocates GPU memory for one block bound at `slot`.
    ///
    /// `slot` must describe the transform layout (see [`UniformSlot::transform`]).
    /// The new buffer holds identity matrices and is dirty until first flushed.
    pub fn new(backend: &mut B, slot: UniformSlot) -> Result<Self, RenderError> {
        let expected = UniformSlot::transform(slot.group, slot.binding);
        let same_layout = slot.size() == expected.size()
            && slot.members().len() == expected.members().len()
            && slot
                .members()
                .iter()
                .zip(expected.members())
                .all(|(a, b)| a.ty == b.ty && a.offset == b.offset);
        if !same_layout {
            return Err(RenderError::LayoutMismatch(format!(
                "slot at group {}, binding {} does not describe a transform block",
                slot.group, slot.binding
            )));
        }

        let buffer = backend.create_uniform_buffer("kiln transform ubo", u64::from(slot.size()))?;
        Ok(Self {
            slot,
            block: TransformBlock::default(),
            dirty: true,
            buffer: Some(buffer),
        })
    }

    pub fn update(&mut self, model: Mat4, view: Mat4, projection: Mat4) {
        self.block = TransformBlock {
            model,
            view,
            projection,
        };
        self.dirty = true;
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.block.model = model;
        self.dirty = true;
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.block.view = view;
        self.dirty = true;
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.block.projection = projection;
        self.dirty = true;
    }

    pub fn block(&self) -> &TransformBlock {
        &self.block
    }

    pub fn slot(&self) -> &UniformSlot {
        &self.slot
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_live(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&B::Buffer> {
        self.buffer.as_ref()
    }

    /// Uploads the block if it changed since the last flush.
    ///
    /// Flushing a destroyed buffer is a no-op that reports `Clean`.
    pub fn flush(&mut self, backend: &mut B) -> Flush {
        let Some(buffer) = self.buffer.as_ref() else {
            return Flush::Clean;
        };
        if !self.dirty {
            return Flush::Clean;
        }
        backend.write_buffer(buffer, bytemuck::bytes_of(&self.block));
        self.dirty = false;
        Flush::Uploaded
    }

    /// Releases GPU memory. The buffer can no longer be drawn with.
    pub fn destroy(&mut self, backend: &mut B) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
    }
}
