//! Built-in pass-through programs.
//!
//! Both dialects implement the same contract: position at location 0,
//! texcoord at location 1, `tex_coord` varying at location 0, color at
//! location 0, and the transform block at group 0, binding 0.

use super::source::ShaderSource;

pub const WGSL: &str = include_str!("shaders/passthrough.wgsl");
pub const GLSL_VERTEX: &str = include_str!("shaders/passthrough.vert");
pub const GLSL_FRAGMENT: &str = include_str!("shaders/passthrough.frag");

/// `(vertex, fragment)` sources for the WGSL program.
pub fn wgsl() -> (ShaderSource, ShaderSource) {
    (
        ShaderSource::wgsl(WGSL, "vs_main"),
        ShaderSource::wgsl(WGSL, "fs_main"),
    )
}

/// `(vertex, fragment)` sources for the GLSL program.
pub fn glsl() -> (ShaderSource, ShaderSource) {
    (ShaderSource::glsl(GLSL_VERTEX), ShaderSource::glsl(GLSL_FRAGMENT))
}
