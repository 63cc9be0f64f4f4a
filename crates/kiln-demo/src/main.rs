use glam::{Mat4, Vec3};

use kiln_engine::core::{App, AppControl, FrameCtx};
use kiln_engine::device::{Gpu, GpuInit};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::render::backend::gpu::WgpuBackend;
use kiln_engine::render::shader::passthrough;
use kiln_engine::render::{
    FrameDispatcher, IndexData, PipelineBuilder, PipelineStateObject, ProgramCache, RenderError,
    TransformBuffer, UniformSlot, Vertex2, VertexData,
};
use kiln_engine::window::{Runtime, RuntimeConfig};

const QUAD: [Vertex2; 4] = [
    Vertex2::new([-0.5, -0.5], [0.0, 1.0]),
    Vertex2::new([0.5, -0.5], [1.0, 1.0]),
    Vertex2::new([0.5, 0.5], [1.0, 0.0]),
    Vertex2::new([-0.5, 0.5], [0.0, 0.0]),
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Seconds each shader dialect stays on screen.
const DIALECT_PERIOD: f32 = 2.0;

struct Renderer {
    backend: WgpuBackend,
    // Owns the programs the pipelines reference.
    _cache: ProgramCache<WgpuBackend>,
    pipelines: [PipelineStateObject<WgpuBackend>; 2],
    transforms: TransformBuffer<WgpuBackend>,
    dispatcher: FrameDispatcher,
}

impl Renderer {
    fn new(gpu: &Gpu<'_>) -> Result<Self, RenderError> {
        let mut backend = gpu.create_backend();
        let mut cache = ProgramCache::new();
        let slot = UniformSlot::transform(0, 0);
        let layout = Vertex2::layout();

        let (vs, fs) = passthrough::wgsl();
        let wgsl = cache.get_or_compile(&mut backend, &vs, &fs)?;
        let (vs, fs) = passthrough::glsl();
        let glsl = cache.get_or_compile(&mut backend, &vs, &fs)?;

        let pipelines = [
            PipelineBuilder::new("wgsl quad").build(&mut backend, &wgsl, &layout, &slot)?,
            PipelineBuilder::new("glsl quad").build(&mut backend, &glsl, &layout, &slot)?,
        ];
        let transforms = TransformBuffer::new(&mut backend, slot)?;

        let stats = cache.stats();
        log::info!(
            "loaded {} programs ({} compiled) for {:?}",
            stats.entries,
            stats.misses,
            backend.color_format()
        );

        Ok(Self {
            backend,
            _cache: cache,
            pipelines,
            transforms,
            dispatcher: FrameDispatcher::default(),
        })
    }
}

#[derive(Default)]
struct QuadDemo {
    renderer: Option<Renderer>,
}

impl App for QuadDemo {
    fn setup(&mut self, gpu: &Gpu<'_>) -> Result<(), RenderError> {
        self.renderer = Some(Renderer::new(gpu)?);
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(r) = self.renderer.as_mut() else {
            return AppControl::Exit;
        };

        let t = ctx.time.elapsed;
        r.transforms.update(
            Mat4::from_rotation_z(t),
            Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y),
            Mat4::perspective_rh(
                45f32.to_radians(),
                ctx.window.aspect_ratio(),
                0.1,
                100.0,
            ),
        );

        let pso = &r.pipelines[(t / DIALECT_PERIOD) as usize % r.pipelines.len()];
        let vertices = VertexData::from_vertices(&QUAD);
        let indices = IndexData::from(&QUAD_INDICES[..]);

        ctx.render(|target| {
            match r.dispatcher.draw_indexed_frame(
                &mut r.backend,
                target,
                pso,
                &mut r.transforms,
                &vertices,
                &indices,
            ) {
                Ok(stats) => {
                    if stats.frame_index % 600 == 0 {
                        log::debug!("frame {} with `{}`", stats.frame_index, pso.label());
                    }
                    AppControl::Continue
                }
                Err(e) if e.is_retryable() => {
                    log::warn!("draw skipped: {e}");
                    AppControl::Continue
                }
                Err(e) => {
                    log::error!("draw failed: {e}");
                    AppControl::Exit
                }
            }
        })
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig {
            title: "kiln quad".to_string(),
            ..RuntimeConfig::default()
        },
        GpuInit::default(),
        QuadDemo::default(),
    )
}
