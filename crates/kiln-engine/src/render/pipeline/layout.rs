use bytemuck::{Pod, Zeroable};

use crate::render::RenderError;

// ── attributes ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn components(self) -> u8 {
        match self {
            VertexFormat::Float32 => 1,
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
            VertexFormat::Float32x4 => 4,
        }
    }

    /// Size in bytes.
    pub fn size(self) -> u64 {
        u64::from(self.components()) * 4
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexSemantic {
    Position,
    TexCoord,
    Color,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub semantic: VertexSemantic,
    pub format: VertexFormat,
    /// Byte offset inside one vertex.
    pub offset: u64,
}

/// Ordered, tightly packed attributes of a single interleaved vertex buffer.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttributeLayout {
    attributes: Vec<VertexAttribute>,
    stride: u64,
}

impl VertexAttributeLayout {
    /// Builds a layout from `(location, semantic, format)` triples in buffer order.
    ///
    /// Locations must be unique and at most one attribute may carry `Position`.
    pub fn new(
        attributes: impl IntoIterator<Item = (u32, VertexSemantic, VertexFormat)>,
    ) -> Result<Self, RenderError> {
        let mut out: Vec<VertexAttribute> = Vec::new();
        let mut offset = 0u64;
        for (location, semantic, format) in attributes {
            if out.iter().any(|a| a.location == location) {
                return Err(RenderError::LayoutMismatch(format!(
                    "location {location} appears twice in the vertex layout"
                )));
            }
            if semantic == VertexSemantic::Position
                && out.iter().any(|a| a.semantic == VertexSemantic::Position)
            {
                return Err(RenderError::LayoutMismatch(
                    "vertex layout has more than one position attribute".to_string(),
                ));
            }
            out.push(VertexAttribute {
                location,
                semantic,
                format,
                offset,
            });
            offset += format.size();
        }
        if out.is_empty() {
            return Err(RenderError::LayoutMismatch("vertex layout is empty".to_string()));
        }
        Ok(Self {
            attributes: out,
            stride: offset,
        })
    }

    /// Location 0 = position (`Float32x2` or `Float32x4`), location 1 = texcoord.
    pub fn position_texcoord(position: VertexFormat) -> Result<Self, RenderError> {
        match position {
            VertexFormat::Float32x2 | VertexFormat::Float32x4 => Self::new([
                (0, VertexSemantic::Position, position),
                (1, VertexSemantic::TexCoord, VertexFormat::Float32x2),
            ]),
            other => Err(RenderError::LayoutMismatch(format!(
                "position must have 2 or 4 components, got {other:?}"
            ))),
        }
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    pub fn position(&self) -> Option<&VertexAttribute> {
        self.attributes
            .iter()
            .find(|a| a.semantic == VertexSemantic::Position)
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> u64 {
        self.stride
    }
}

// ── vertex types ──────────────────────────────────────────────────────────

/// 2D position + texcoord.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex2 {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

impl Vertex2 {
    pub const fn new(position: [f32; 2], tex_coord: [f32; 2]) -> Self {
        Self { position, tex_coord }
    }

    pub fn layout() -> VertexAttributeLayout {
        standard_layout(VertexFormat::Float32x2)
    }
}

/// Homogeneous position + texcoord.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex4 {
    pub position: [f32; 4],
    pub tex_coord: [f32; 2],
}

impl Vertex4 {
    pub const fn new(position: [f32; 4], tex_coord: [f32; 2]) -> Self {
        Self { position, tex_coord }
    }

    pub fn layout() -> VertexAttributeLayout {
        standard_layout(VertexFormat::Float32x4)
    }
}

fn standard_layout(position: VertexFormat) -> VertexAttributeLayout {
    VertexAttributeLayout {
        attributes: vec![
            VertexAttribute {
                location: 0,
                semantic: VertexSemantic::Position,
                format: position,
                offset: 0,
            },
            VertexAttribute {
                location: 1,
                semantic: VertexSemantic::TexCoord,
                format: VertexFormat::Float32x2,
                offset: position.size(),
            },
        ],
        stride: position.size() + VertexFormat::Float32x2.size(),
    }
}

// ── vertex data ───────────────────────────────────────────────────────────

/// Borrowed interleaved vertex bytes supplied by the mesh collaborator.
#[derive(Debug, Copy, Clone)]
pub struct VertexData<'a> {
    bytes: &'a [u8],
    stride: u64,
    vertex_count: u32,
}

impl<'a> VertexData<'a> {
    pub fn from_vertices<V: Pod>(vertices: &'a [V]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(vertices),
            stride: std::mem::size_of::<V>() as u64,
            vertex_count: vertices.len() as u32,
        }
    }

    /// Wraps raw bytes; `bytes.len()` must be a whole number of `stride`-sized vertices.
    pub fn from_bytes(bytes: &'a [u8], stride: u64) -> Result<Self, RenderError> {
        if stride == 0 || bytes.len() as u64 % stride != 0 {
            return Err(RenderError::LayoutMismatch(format!(
                "{} vertex bytes are not a multiple of stride {stride}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            stride,
            vertex_count: (bytes.len() as u64 / stride) as u32,
        })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

// ── index data ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Borrowed triangle-list indices into a [`VertexData`].
#[derive(Debug, Copy, Clone)]
pub enum IndexData<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl<'a> IndexData<'a> {
    pub fn format(&self) -> IndexFormat {
        match self {
            IndexData::U16(_) => IndexFormat::Uint16,
            IndexData::U32(_) => IndexFormat::Uint32,
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        match *self {
            IndexData::U16(i) => bytemuck::cast_slice(i),
            IndexData::U32(i) => bytemuck::cast_slice(i),
        }
    }

    pub fn index_count(&self) -> u32 {
        match self {
            IndexData::U16(i) => i.len() as u32,
            IndexData::U32(i) => i.len() as u32,
        }
    }

    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            IndexData::U16(idx) => idx.get(i).map(|&v| u32::from(v)),
            IndexData::U32(idx) => idx.get(i).copied(),
        }
    }

    pub fn max_index(&self) -> Option<u32> {
        (0..self.index_count() as usize).filter_map(|i| self.get(i)).max()
    }
}

impl<'a> From<&'a [u16]> for IndexData<'a> {
    fn from(indices: &'a [u16]) -> Self {
        IndexData::U16(indices)
    }
}

impl<'a> From<&'a [u32]> for IndexData<'a> {
    fn from(indices: &'a [u32]) -> Self {
        IndexData::U32(indices)
    }
}
