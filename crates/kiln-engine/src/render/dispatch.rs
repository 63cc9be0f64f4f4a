//! Frame Draw Dispatcher.
//!
//! One frame = readiness check, transform flush, bind, one draw (plain or
//! indexed). Nothing is sent to the backend unless every referenced object
//! is ready.

use crate::render::backend::{Backend, DrawCall};
use crate::render::pipeline::{IndexData, PipelineStateObject, VertexData};
use crate::render::transform::{Flush, TransformBuffer};
use crate::render::RenderError;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Linear RGBA the target is cleared to before drawing; `None` keeps its contents.
    pub clear_color: Option<[f64; 4]>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub vertex_count: u32,
    /// Set for indexed draws.
    pub index_count: Option<u32>,
    pub uploaded: bool,
}

#[derive(Debug, Default)]
pub struct FrameDispatcher {
    config: DispatchConfig,
    frame_index: u64,
}

impl FrameDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn set_clear_color(&mut self, clear_color: Option<[f64; 4]>) {
        self.config.clear_color = clear_color;
    }

    /// Frames successfully drawn so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Draws `vertices` with `pso`, binding `transforms` at the pipeline's slot.
    ///
    /// Pipelines built without a slot ignore `transforms`.
    pub fn draw_frame<B: Backend>(
        &mut self,
        backend: &mut B,
        target: &mut B::Target<'_>,
        pso: &PipelineStateObject<B>,
        transforms: &mut TransformBuffer<B>,
        vertices: &VertexData<'_>,
    ) -> Result<FrameStats, RenderError> {
        self.dispatch(backend, target, pso, transforms, vertices, None)
    }

    /// Like [`draw_frame`](Self::draw_frame), reading `vertices` through `indices`.
    ///
    /// Every index must address one of `vertices`.
    pub fn draw_indexed_frame<B: Backend>(
        &mut self,
        backend: &mut B,
        target: &mut B::Target<'_>,
        pso: &PipelineStateObject<B>,
        transforms: &mut TransformBuffer<B>,
        vertices: &VertexData<'_>,
        indices: &IndexData<'_>,
    ) -> Result<FrameStats, RenderError> {
        self.dispatch(backend, target, pso, transforms, vertices, Some(indices))
    }

    fn dispatch<B: Backend>(
        &mut self,
        backend: &mut B,
        target: &mut B::Target<'_>,
        pso: &PipelineStateObject<B>,
        transforms: &mut TransformBuffer<B>,
        vertices: &VertexData<'_>,
        indices: Option<&IndexData<'_>>,
    ) -> Result<FrameStats, RenderError> {
        let built = pso.ready()?;

        let uniform_slot = match built.uniform.as_ref() {
            Some(slot) => {
                if !transforms.is_live() {
                    return Err(RenderError::NotReady(
                        "transform buffer was destroyed".to_string(),
                    ));
                }
                if !slot.same_binding(transforms.slot()) {
                    return Err(RenderError::LayoutMismatch(format!(
                        "pipeline `{}` binds its uniform at group {}, binding {}; transform buffer is at group {}, binding {}",
                        pso.label(),
                        slot.group,
                        slot.binding,
                        transforms.slot().group,
                        transforms.slot().binding
                    )));
                }
                Some(slot)
            }
            None => None,
        };

        if vertices.stride() != built.layout.stride() {
            return Err(RenderError::LayoutMismatch(format!(
                "vertex stride {} does not match pipeline `{}` stride {}",
                vertices.stride(),
                pso.label(),
                built.layout.stride()
            )));
        }
        if let Some(max) = indices.and_then(|i| i.max_index()) {
            if max >= vertices.vertex_count() {
                return Err(RenderError::LayoutMismatch(format!(
                    "index {max} is out of range for {} vertices",
                    vertices.vertex_count()
                )));
            }
        }

        let uploaded = match uniform_slot {
            Some(_) => transforms.flush(backend) == Flush::Uploaded,
            None => false,
        };

        let uniform = match (uniform_slot, transforms.buffer()) {
            (Some(slot), Some(buffer)) => Some((slot, buffer)),
            _ => None,
        };

        backend.draw(
            target,
            &DrawCall {
                pipeline: &built.raw,
                layout: &built.layout,
                uniform,
                vertices,
                indices,
                clear_color: self.config.clear_color,
            },
        )?;

        let stats = FrameStats {
            frame_index: self.frame_index,
            vertex_count: vertices.vertex_count(),
            index_count: indices.map(|i| i.index_count()),
            uploaded,
        };
        self.frame_index += 1;
        log::trace!(
            "frame {} drew {} vertices with `{}`",
            stats.frame_index,
            stats.vertex_count,
            pso.label()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::software::{Command, SoftwareBackend, SoftwareTarget};
    use crate::render::pipeline::{IndexData, PipelineBuilder, UniformSlot, Vertex2, Vertex4};
    use crate::render::shader::{passthrough, ProgramCache};
    use glam::{Mat4, Vec3, Vec4};

    const TRIANGLE: [Vertex2; 3] = [
        Vertex2::new([0.0, 0.0], [0.0, 0.0]),
        Vertex2::new([1.0, 0.0], [1.0, 0.0]),
        Vertex2::new([0.0, 1.0], [0.0, 1.0]),
    ];

    struct Scene {
        backend: SoftwareBackend,
        cache: ProgramCache<SoftwareBackend>,
        pso: PipelineStateObject<SoftwareBackend>,
        transforms: TransformBuffer<SoftwareBackend>,
    }

    fn scene() -> Scene {
        let mut backend = SoftwareBackend::default();
        let mut cache = ProgramCache::new();
        let (vs, fs) = passthrough::wgsl();
        let program = cache.get_or_compile(&mut backend, &vs, &fs).unwrap();
        let slot = UniformSlot::transform(0, 0);
        let pso = PipelineBuilder::new("triangle")
            .build(&mut backend, &program, &Vertex2::layout(), &slot)
            .unwrap();
        let transforms = TransformBuffer::new(&mut backend, slot).unwrap();
        Scene {
            backend,
            cache,
            pso,
            transforms,
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    #[test]
    fn identity_transforms_keep_positions() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::default();

        let stats = dispatcher
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap();

        assert_eq!(
            stats,
            FrameStats {
                frame_index: 0,
                vertex_count: 3,
                index_count: None,
                uploaded: true
            }
        );
        assert_eq!(
            target.last_draw().unwrap(),
            &[
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 1.0, 0.0, 1.0),
            ]
        );
    }

    #[test]
    fn commands_follow_clear_bind_draw_order() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::default();
        dispatcher
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap();

        let cmds = target.commands();
        assert_eq!(cmds.len(), 4);
        assert_eq!(cmds[0], Command::Clear([0.0, 0.0, 0.0, 1.0]));
        assert!(matches!(cmds[1], Command::BindPipeline { .. }));
        assert!(matches!(cmds[2], Command::BindUniform { group: 0, binding: 0, .. }));
        assert!(matches!(cmds[3], Command::Draw { vertex_count: 3, .. }));
    }

    #[test]
    fn transforms_apply_in_mvp_order() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::new(DispatchConfig { clear_color: None });

        s.transforms.update(
            Mat4::from_scale(Vec3::splat(2.0)),
            Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            Mat4::IDENTITY,
        );
        dispatcher
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap();

        // view * model: scale first, then translate.
        assert_eq!(target.last_draw().unwrap()[1], Vec4::new(3.0, 0.0, 0.0, 1.0));
        assert!(!matches!(target.commands()[0], Command::Clear(_)));
    }

    #[test]
    fn unchanged_transforms_upload_once() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::default();
        let vertices = VertexData::from_vertices(&TRIANGLE);

        let first = dispatcher
            .draw_frame(&mut s.backend, &mut target, &s.pso, &mut s.transforms, &vertices)
            .unwrap();
        let second = dispatcher
            .draw_frame(&mut s.backend, &mut target, &s.pso, &mut s.transforms, &vertices)
            .unwrap();

        assert!(first.uploaded);
        assert!(!second.uploaded);
        assert_eq!(second.frame_index, 1);
        assert_eq!(s.backend.upload_count(), 1);
    }

    const QUAD: [Vertex2; 4] = [
        Vertex2::new([0.0, 0.0], [0.0, 0.0]),
        Vertex2::new([1.0, 0.0], [1.0, 0.0]),
        Vertex2::new([1.0, 1.0], [1.0, 1.0]),
        Vertex2::new([0.0, 1.0], [0.0, 1.0]),
    ];

    #[test]
    fn indexed_quad_draws_two_triangles() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::default();
        let indices = IndexData::from(&[0u16, 1, 2, 2, 3, 0][..]);

        s.transforms
            .update(Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)), Mat4::IDENTITY, Mat4::IDENTITY);
        let stats = dispatcher
            .draw_indexed_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&QUAD),
                &indices,
            )
            .unwrap();

        assert_eq!(stats.vertex_count, 4);
        assert_eq!(stats.index_count, Some(6));
        let positions = target.last_draw().unwrap();
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[4], Vec4::new(0.0, 1.0, -1.0, 1.0));
        assert!(matches!(
            target.commands().last(),
            Some(Command::DrawIndexed { index_count: 6, .. })
        ));
    }

    #[test]
    fn out_of_range_index_issues_no_commands() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::default();
        let indices = IndexData::from(&[0u32, 1, 3][..]);

        let err = dispatcher
            .draw_indexed_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
                &indices,
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert!(target.is_empty());
        assert!(s.transforms.is_dirty());
        assert_eq!(dispatcher.frame_index(), 0);
    }

    #[test]
    fn each_frame_on_one_target_sees_its_own_transforms() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::new(DispatchConfig { clear_color: None });
        let vertices = VertexData::from_vertices(&TRIANGLE);

        for dx in [1.0, 5.0] {
            s.transforms
                .update(Mat4::from_translation(Vec3::new(dx, 0.0, 0.0)), Mat4::IDENTITY, Mat4::IDENTITY);
            dispatcher
                .draw_frame(&mut s.backend, &mut target, &s.pso, &mut s.transforms, &vertices)
                .unwrap();
        }

        let firsts: Vec<Vec4> = target
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Draw { clip_positions, .. } => clip_positions.first().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(firsts, [Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(5.0, 0.0, 0.0, 1.0)]);
    }

    // ── readiness ─────────────────────────────────────────────────────────

    #[test]
    fn placeholder_pipeline_issues_no_commands() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut dispatcher = FrameDispatcher::default();
        let placeholder = PipelineStateObject::uninitialized("pending");

        let err = dispatcher
            .draw_frame(
                &mut s.backend,
                &mut target,
                &placeholder,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap_err();

        assert!(matches!(err, RenderError::NotReady(_)));
        assert!(target.is_empty());
        assert_eq!(s.backend.upload_count(), 0);
        assert!(s.transforms.is_dirty());
        assert_eq!(dispatcher.frame_index(), 0);
    }

    #[test]
    fn evicted_program_is_not_ready() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        s.cache.clear();

        let err = FrameDispatcher::default()
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::NotReady(_)));
        assert!(target.is_empty());
    }

    #[test]
    fn destroyed_transforms_are_not_ready() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        s.transforms.destroy(&mut s.backend);

        let err = FrameDispatcher::default()
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::NotReady(_)));
        assert!(target.is_empty());
    }

    // ── layout checks ─────────────────────────────────────────────────────

    #[test]
    fn vertex_stride_must_match_pipeline() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let wide = [Vertex4::new([0.0, 0.0, 0.0, 1.0], [0.0, 0.0]); 3];

        let err = FrameDispatcher::default()
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut s.transforms,
                &VertexData::from_vertices(&wide),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
        assert!(target.is_empty());
    }

    #[test]
    fn transform_slot_must_match_pipeline_slot() {
        let mut s = scene();
        let mut target = SoftwareTarget::new();
        let mut elsewhere =
            TransformBuffer::new(&mut s.backend, UniformSlot::transform(1, 0)).unwrap();

        let err = FrameDispatcher::default()
            .draw_frame(
                &mut s.backend,
                &mut target,
                &s.pso,
                &mut elsewhere,
                &VertexData::from_vertices(&TRIANGLE),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch(_)));
    }
}
