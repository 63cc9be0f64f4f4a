//! CPU reference backend.
//!
//! Buffers live in host memory and every draw is recorded into a
//! [`SoftwareTarget`]. Draws also run the transform contract on the CPU
//! (`projection * view * model * position`) so callers can inspect the
//! clip-space positions a conforming vertex stage would produce.

use std::collections::HashMap;

use glam::{Mat4, Vec4};

use crate::render::pipeline::{IndexFormat, UniformSlot, VertexAttribute};
use crate::render::shader::ShaderType;
use crate::render::RenderError;

use super::{Backend, CompileRequest, DrawCall, PipelineDesc};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SoftwareLimits {
    pub max_uniform_buffer_size: u64,
    /// Total bytes of live buffers.
    pub memory_budget: u64,
}

impl Default for SoftwareLimits {
    fn default() -> Self {
        Self {
            max_uniform_buffer_size: 64 * 1024,
            memory_budget: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug)]
pub struct SoftwareProgram {
    id: u64,
}

impl SoftwareProgram {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
pub struct SoftwareBuffer {
    id: u64,
    size: u64,
}

impl SoftwareBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug)]
pub struct SoftwarePipeline {
    id: u64,
    label: String,
    program: u64,
    position: Option<VertexAttribute>,
}

impl SoftwarePipeline {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> u64 {
        self.program
    }
}

/// A recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear([f64; 4]),
    BindPipeline { pipeline: u64 },
    BindUniform { group: u32, binding: u32, buffer: u64 },
    Draw { vertex_count: u32, clip_positions: Vec<Vec4> },
    /// Positions are listed per index, in index order.
    DrawIndexed {
        index_count: u32,
        format: IndexFormat,
        clip_positions: Vec<Vec4>,
    },
}

/// Command recorder standing in for a frame's encoder.
#[derive(Debug, Default)]
pub struct SoftwareTarget {
    commands: Vec<Command>,
}

impl SoftwareTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Clip positions of the most recent draw.
    pub fn last_draw(&self) -> Option<&[Vec4]> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::Draw { clip_positions, .. } | Command::DrawIndexed { clip_positions, .. } => {
                Some(clip_positions.as_slice())
            }
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[derive(Debug, Default)]
pub struct SoftwareBackend {
    limits: SoftwareLimits,
    memory: HashMap<u64, Vec<u8>>,
    next_id: u64,
    compiles: u64,
    uploads: u64,
    pipelines: u64,
}

impl SoftwareBackend {
    pub fn new(limits: SoftwareLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> SoftwareLimits {
        self.limits
    }

    /// Number of programs handed to the backend compiler.
    pub fn compile_count(&self) -> u64 {
        self.compiles
    }

    /// Number of `write_buffer` calls.
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    pub fn pipeline_count(&self) -> u64 {
        self.pipelines
    }

    /// Current bytes of a live buffer.
    pub fn buffer_contents(&self, buffer: &SoftwareBuffer) -> Option<&[u8]> {
        self.memory.get(&buffer.id).map(Vec::as_slice)
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.memory.values().map(|m| m.len() as u64).sum()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Backend for SoftwareBackend {
    type Program = SoftwareProgram;
    type Buffer = SoftwareBuffer;
    type Pipeline = SoftwarePipeline;
    type Target<'a> = SoftwareTarget;

    fn compile_program(
        &mut self,
        _vertex: &CompileRequest<'_>,
        _fragment: &CompileRequest<'_>,
    ) -> Result<SoftwareProgram, RenderError> {
        self.compiles += 1;
        Ok(SoftwareProgram { id: self.next_id() })
    }

    fn create_uniform_buffer(
        &mut self,
        label: &str,
        size: u64,
    ) -> Result<SoftwareBuffer, RenderError> {
        if size > self.limits.max_uniform_buffer_size {
            return Err(RenderError::ResourceExhausted(format!(
                "`{label}` needs {size} bytes, uniform buffers are limited to {}",
                self.limits.max_uniform_buffer_size
            )));
        }
        let used = self.allocated_bytes();
        if used + size > self.limits.memory_budget {
            return Err(RenderError::ResourceExhausted(format!(
                "`{label}` needs {size} bytes, {} of {} already in use",
                used, self.limits.memory_budget
            )));
        }

        let id = self.next_id();
        self.memory.insert(id, vec![0; size as usize]);
        Ok(SoftwareBuffer { id, size })
    }

    fn write_buffer(&mut self, buffer: &SoftwareBuffer, bytes: &[u8]) {
        let Some(mem) = self.memory.get_mut(&buffer.id) else {
            log::warn!("write to destroyed buffer {}", buffer.id);
            return;
        };
        let n = bytes.len().min(mem.len());
        mem[..n].copy_from_slice(&bytes[..n]);
        self.uploads += 1;
        log::trace!("uploaded {n} bytes to buffer {}", buffer.id);
    }

    fn destroy_buffer(&mut self, buffer: SoftwareBuffer) {
        self.memory.remove(&buffer.id);
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc<'_, SoftwareProgram>,
    ) -> Result<SoftwarePipeline, RenderError> {
        self.pipelines += 1;
        Ok(SoftwarePipeline {
            id: self.next_id(),
            label: desc.label.to_string(),
            program: desc.program.raw().id,
            position: desc.layout.position().copied(),
        })
    }

    fn draw(
        &mut self,
        target: &mut SoftwareTarget,
        call: &DrawCall<'_, Self>,
    ) -> Result<(), RenderError> {
        let vertex_count = call.vertices.vertex_count();
        if let Some(max) = call.indices.and_then(|i| i.max_index()) {
            if max >= vertex_count {
                return Err(RenderError::LayoutMismatch(format!(
                    "index {max} is out of range for {vertex_count} vertices"
                )));
            }
        }

        let transform = match call.uniform {
            Some((slot, buffer)) => {
                let mem = self.memory.get(&buffer.id).ok_or_else(|| {
                    RenderError::NotReady(format!("uniform buffer {} was destroyed", buffer.id))
                })?;
                Some((slot, buffer.id, clip_transform(slot, mem)))
            }
            None => None,
        };

        if let Some(color) = call.clear_color {
            target.commands.push(Command::Clear(color));
        }
        target.commands.push(Command::BindPipeline {
            pipeline: call.pipeline.id,
        });

        let mvp = match transform {
            Some((slot, buffer, mvp)) => {
                target.commands.push(Command::BindUniform {
                    group: slot.group,
                    binding: slot.binding,
                    buffer,
                });
                mvp
            }
            None => Mat4::IDENTITY,
        };

        let position = |i: u32| {
            call.pipeline.position.map(|attr| {
                let base = i as usize * call.vertices.stride() as usize + attr.offset as usize;
                mvp * read_position(call.vertices.bytes(), base, attr.format.components())
            })
        };

        let command = match call.indices {
            Some(indices) => Command::DrawIndexed {
                index_count: indices.index_count(),
                format: indices.format(),
                clip_positions: (0..indices.index_count() as usize)
                    .filter_map(|n| indices.get(n).and_then(&position))
                    .collect(),
            },
            None => Command::Draw {
                vertex_count,
                clip_positions: (0..vertex_count).filter_map(&position).collect(),
            },
        };
        target.commands.push(command);
        Ok(())
    }
}

/// `projection * view * model` from uniform memory; missing members are identity.
fn clip_transform(slot: &UniformSlot, mem: &[u8]) -> Mat4 {
    let read = |name: &str| {
        slot.member(name)
            .filter(|m| m.ty == ShaderType::MAT4)
            .and_then(|m| mem.get(m.offset as usize..m.offset as usize + 64))
            .map(|bytes| Mat4::from_cols_array(&bytemuck::pod_read_unaligned::<[f32; 16]>(bytes)))
            .unwrap_or(Mat4::IDENTITY)
    };
    read("projection") * read("view") * read("model")
}

/// Expands a 1-4 component position to homogeneous coordinates.
fn read_position(bytes: &[u8], base: usize, components: u8) -> Vec4 {
    let mut p = Vec4::new(0.0, 0.0, 0.0, 1.0);
    for c in 0..components as usize {
        let at = base + c * 4;
        if let Some(raw) = bytes.get(at..at + 4) {
            p[c] = bytemuck::pod_read_unaligned::<f32>(raw);
        }
    }
    p
}
