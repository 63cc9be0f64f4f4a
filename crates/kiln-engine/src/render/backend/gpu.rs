use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::render::pipeline::{IndexFormat, VertexAttributeLayout, VertexFormat};
use crate::render::{RenderError, RenderTarget};

use super::{Backend, CompileRequest, DrawCall, PipelineDesc};

pub struct WgpuProgram {
    vertex: wgpu::ShaderModule,
    vertex_entry: String,
    fragment: wgpu::ShaderModule,
    fragment_entry: String,
}

pub struct WgpuBuffer {
    id: u64,
    buffer: wgpu::Buffer,
}

impl WgpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

pub struct WgpuPipeline {
    id: u64,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: Option<wgpu::BindGroupLayout>,
    /// Bound to every group below the uniform slot's group.
    empty_group: Option<wgpu::BindGroup>,
}

impl WgpuPipeline {
    pub fn raw(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}

/// Uniform bytes written since the buffer was last drawn with.
///
/// `queue.write_buffer` lands before any encoder of the frame runs, so a
/// buffer rewritten between two draws of one frame would show its last
/// contents to both. Each draw copies its pending bytes in encoder order.
#[derive(Debug, Default)]
struct PendingWrites {
    writes: HashMap<u64, Vec<u8>>,
}

impl PendingWrites {
    fn record(&mut self, buffer: u64, bytes: &[u8]) {
        self.writes.insert(buffer, bytes.to_vec());
    }

    fn take(&mut self, buffer: u64) -> Option<Vec<u8>> {
        self.writes.remove(&buffer)
    }

    fn forget(&mut self, buffer: u64) {
        self.writes.remove(&buffer);
    }
}

/// wgpu implementation of the GPU seam.
///
/// Modules are created from naga IR the front-end already validated.
/// Vertex and index bytes get a fresh buffer per draw.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,

    pending: PendingWrites,
    bind_groups: HashMap<(u64, u64), wgpu::BindGroup>,
    next_id: u64,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            queue,
            color_format,
            pending: PendingWrites::default(),
            bind_groups: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn create_module(&self, req: &CompileRequest<'_>) -> wgpu::ShaderModule {
        let label = format!("kiln {} `{}`", req.stage, req.source.entry_point);
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Naga(Cow::Owned(req.module.clone())),
        })
    }
}

impl Backend for WgpuBackend {
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type Pipeline = WgpuPipeline;
    type Target<'a> = RenderTarget<'a>;

    fn compile_program(
        &mut self,
        vertex: &CompileRequest<'_>,
        fragment: &CompileRequest<'_>,
    ) -> Result<WgpuProgram, RenderError> {
        Ok(WgpuProgram {
            vertex: self.create_module(vertex),
            vertex_entry: vertex.source.entry_point.clone(),
            fragment: self.create_module(fragment),
            fragment_entry: fragment.source.entry_point.clone(),
        })
    }

    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<WgpuBuffer, RenderError> {
        let max = self.device.limits().max_uniform_buffer_binding_size as u64;
        if size > max {
            return Err(RenderError::ResourceExhausted(format!(
                "`{label}` needs {size} bytes, device binds at most {max}"
            )));
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuBuffer {
            id: self.next_id(),
            buffer,
        })
    }

    fn write_buffer(&mut self, buffer: &WgpuBuffer, bytes: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, 0, bytes);
        self.pending.record(buffer.id, bytes);
        log::trace!("uploaded {} bytes to buffer {}", bytes.len(), buffer.id);
    }

    fn destroy_buffer(&mut self, buffer: WgpuBuffer) {
        self.bind_groups.retain(|&(_, b), _| b != buffer.id);
        self.pending.forget(buffer.id);
        buffer.buffer.destroy();
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc<'_, WgpuProgram>,
    ) -> Result<WgpuPipeline, RenderError> {
        let program = desc.program.raw();
        let attributes = vertex_attributes(desc.layout);

        let uniform_layout = desc.uniform.map(|slot| {
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("kiln uniform bgl"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: slot.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: NonZeroU64::new(u64::from(slot.size())),
                        },
                        count: None,
                    }],
                })
        });

        let group = desc.uniform.map_or(0, |slot| slot.group);
        let empty_layout = (group > 0).then(|| {
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("kiln empty bgl"),
                    entries: &[],
                })
        });

        let mut bind_group_layouts: Vec<&wgpu::BindGroupLayout> = Vec::new();
        if let Some(empty) = empty_layout.as_ref() {
            bind_group_layouts.extend(std::iter::repeat_n(empty, group as usize));
        }
        if let Some(layout) = uniform_layout.as_ref() {
            bind_group_layouts.push(layout);
        }

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("kiln pipeline layout"),
                bind_group_layouts: &bind_group_layouts,
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some(&program.vertex_entry),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.layout.stride(),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some(&program.fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        let empty_group = empty_layout.as_ref().map(|layout| {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kiln empty bind group"),
                layout,
                entries: &[],
            })
        });

        Ok(WgpuPipeline {
            id: self.next_id(),
            pipeline,
            uniform_layout,
            empty_group,
        })
    }

    fn draw(
        &mut self,
        target: &mut RenderTarget<'_>,
        call: &DrawCall<'_, Self>,
    ) -> Result<(), RenderError> {
        let bytes = call.vertices.bytes();
        let vertices = (!bytes.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kiln vertices"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let indices = call.indices.filter(|i| i.index_count() > 0).map(|i| {
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kiln indices"),
                contents: i.bytes(),
                usage: wgpu::BufferUsages::INDEX,
            });
            (buffer, i.format(), i.index_count())
        });

        let bind_key = match call.uniform {
            Some((slot, buffer)) => {
                let Some(layout) = call.pipeline.uniform_layout.as_ref() else {
                    return Err(RenderError::LayoutMismatch(
                        "pipeline was built without a uniform slot".to_string(),
                    ));
                };
                let key = (call.pipeline.id, buffer.id);
                let device = &self.device;
                self.bind_groups.entry(key).or_insert_with(|| {
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("kiln uniform bind group"),
                        layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: slot.binding,
                            resource: buffer.buffer.as_entire_binding(),
                        }],
                    })
                });
                if let Some(pending) = self.pending.take(buffer.id) {
                    copy_into(&self.device, target, &pending, &buffer.buffer);
                }
                Some((slot.group, key))
            }
            None => None,
        };

        let load = match call.clear_color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("kiln draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&call.pipeline.pipeline);
        if let Some((group, key)) = bind_key {
            if let Some(empty) = call.pipeline.empty_group.as_ref() {
                for g in 0..group {
                    rpass.set_bind_group(g, empty, &[]);
                }
            }
            if let Some(bind_group) = self.bind_groups.get(&key) {
                rpass.set_bind_group(group, bind_group, &[]);
            }
        }

        if let Some(vbo) = vertices.as_ref() {
            rpass.set_vertex_buffer(0, vbo.slice(..));
            match indices.as_ref() {
                Some((ibo, format, count)) => {
                    rpass.set_index_buffer(ibo.slice(..), index_format(*format));
                    rpass.draw_indexed(0..*count, 0, 0..1);
                }
                None => rpass.draw(0..call.vertices.vertex_count(), 0..1),
            }
        }
        Ok(())
    }
}

/// Records a staging copy into `dst` ahead of the next pass.
fn copy_into(device: &wgpu::Device, target: &mut RenderTarget<'_>, bytes: &[u8], dst: &wgpu::Buffer) {
    if bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return;
    }
    let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("kiln uniform staging"),
        contents: bytes,
        usage: wgpu::BufferUsages::COPY_SRC,
    });
    target
        .encoder
        .copy_buffer_to_buffer(&staging, 0, dst, 0, bytes.len() as u64);
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

fn vertex_attributes(layout: &VertexAttributeLayout) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes()
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: match a.format {
                VertexFormat::Float32 => wgpu::VertexFormat::Float32,
                VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
                VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
                VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            },
            offset: a.offset,
            shader_location: a.location,
        })
        .collect()
}
