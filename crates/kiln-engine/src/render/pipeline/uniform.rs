use crate::render::shader::{ShaderType, UniformBlock, UniformMember};
use crate::render::RenderError;

/// Explicit uniform binding configuration handed to the pipeline builder.
///
/// Describes where a uniform buffer is bound and the byte layout the host
/// writes into it.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
    members: Vec<UniformMember>,
    size: u32,
}

impl UniformSlot {
    pub fn new(group: u32, binding: u32, members: Vec<UniformMember>, size: u32) -> Self {
        Self {
            group,
            binding,
            members,
            size,
        }
    }

    /// The transform block: model, view and projection matrices, in that order.
    pub fn transform(group: u32, binding: u32) -> Self {
        let members = ["model", "view", "projection"]
            .iter()
            .zip([0u32, 64, 128])
            .map(|(name, offset)| UniformMember {
                name: (*name).to_string(),
                ty: ShaderType::MAT4,
                offset,
            })
            .collect();
        Self::new(group, binding, members, 192)
    }

    pub fn members(&self) -> &[UniformMember] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Buffer size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// True if both slots bind the same location with the same layout.
    pub fn same_binding(&self, other: &UniformSlot) -> bool {
        self.group == other.group && self.binding == other.binding && self.size == other.size
    }

    /// Verifies the slot describes the block a shader declares.
    ///
    /// Member types and offsets must match exactly. Member names are only
    /// compared for diagnostics.
    pub(crate) fn check_against(&self, block: &UniformBlock) -> Result<(), RenderError> {
        if block.members.len() != self.members.len() {
            return Err(RenderError::LayoutMismatch(format!(
                "uniform block `{}` has {} members, slot at group {}, binding {} has {}",
                block.name,
                block.members.len(),
                self.group,
                self.binding,
                self.members.len()
            )));
        }

        for (declared, expected) in block.members.iter().zip(&self.members) {
            if declared.ty != expected.ty || declared.offset != expected.offset {
                return Err(RenderError::LayoutMismatch(format!(
                    "uniform member `{}` is {} at offset {}, slot expects `{}` as {} at offset {}",
                    declared.name,
                    declared.ty,
                    declared.offset,
                    expected.name,
                    expected.ty,
                    expected.offset
                )));
            }
            if !declared.name.eq_ignore_ascii_case(&expected.name) {
                log::warn!(
                    "uniform member `{}` of `{}` is bound as `{}`",
                    declared.name,
                    block.name,
                    expected.name
                );
            }
        }

        if block.size != self.size {
            return Err(RenderError::LayoutMismatch(format!(
                "uniform block `{}` is {} bytes, slot is {} bytes",
                block.name, block.size, self.size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(members: &[(&str, ShaderType, u32)], size: u32) -> UniformBlock {
        UniformBlock {
            group: 0,
            binding: 0,
            name: "Transforms".into(),
            members: members
                .iter()
                .map(|(n, ty, offset)| UniformMember {
                    name: (*n).into(),
                    ty: ty.clone(),
                    offset: *offset,
                })
                .collect(),
            size,
        }
    }

    #[test]
    fn transform_slot_matches_declared_block() {
        let declared = block(
            &[
                ("model", ShaderType::MAT4, 0),
                ("view", ShaderType::MAT4, 64),
                ("projection", ShaderType::MAT4, 128),
            ],
            192,
        );
        assert_eq!(UniformSlot::transform(0, 0).check_against(&declared), Ok(()));
    }

    #[test]
    fn renamed_members_still_match() {
        let declared = block(
            &[
                ("u_model", ShaderType::MAT4, 0),
                ("u_view", ShaderType::MAT4, 64),
                ("u_proj", ShaderType::MAT4, 128),
            ],
            192,
        );
        assert!(UniformSlot::transform(0, 0).check_against(&declared).is_ok());
    }

    #[test]
    fn single_mvp_matrix_is_a_mismatch() {
        let declared = block(&[("mvp", ShaderType::MAT4, 0)], 64);
        assert!(matches!(
            UniformSlot::transform(0, 0).check_against(&declared),
            Err(RenderError::LayoutMismatch(_))
        ));
    }

    #[test]
    fn shifted_offset_is_a_mismatch() {
        let declared = block(
            &[
                ("model", ShaderType::MAT4, 0),
                ("view", ShaderType::MAT4, 80),
                ("projection", ShaderType::MAT4, 144),
            ],
            208,
        );
        let err = UniformSlot::transform(0, 0).check_against(&declared).unwrap_err();
        assert!(err.to_string().contains("offset 80"));
    }
}
