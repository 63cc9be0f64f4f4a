/// Adapter and surface preferences for [`Gpu::new`](super::Gpu::new).
#[derive(Debug, Clone)]
pub struct GpuInit {
    pub power_preference: wgpu::PowerPreference,

    /// Pick an sRGB surface format when the surface offers one.
    pub prefer_srgb: bool,

    /// Wait for vertical blank on present.
    pub vsync: bool,

    /// Frames the presentation engine may queue ahead. A hint.
    pub frame_latency: u32,
}

impl GpuInit {
    pub(crate) fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            prefer_srgb: true,
            vsync: true,
            frame_latency: 2,
        }
    }
}
