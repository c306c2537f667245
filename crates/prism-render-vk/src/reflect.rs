// SPDX-License-Identifier: CEPL-1.0
//! Vertex input layout derived from the vertex shader's declared inputs.
use crate::error::{RenderError, Result};
use ash::vk;
use spirq::ty::{ScalarType, Type, VectorType};
use spirq::var::Variable;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct VertexLayout {
    pub binding: vk::VertexInputBindingDescription,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
    pub stride: u32,
}

impl VertexLayout {
    /// Lays attributes out back to back in the order given; `inputs` is
    /// `(location, component_count)`.
    pub fn packed(inputs: &[(u32, u32)]) -> Result<Self> {
        let mut attributes = Vec::with_capacity(inputs.len());
        let mut stride = 0u32;
        for &(location, components) in inputs {
            let format = float_format(components).ok_or_else(|| {
                RenderError::UnsupportedShaderInput { location, ty: format!("float{components}") }
            })?;
            attributes.push(vk::VertexInputAttributeDescription {
                location,
                binding: 0,
                format,
                offset: stride,
            });
            stride += components * 4;
        }
        Ok(Self {
            binding: vk::VertexInputBindingDescription {
                binding: 0,
                stride,
                input_rate: vk::VertexInputRate::VERTEX,
            },
            attributes,
            stride,
        })
    }

    pub fn in_location_order(&self) -> bool {
        self.attributes.windows(2).all(|w| w[0].location < w[1].location)
    }
}

fn float_format(components: u32) -> Option<vk::Format> {
    match components {
        1 => Some(vk::Format::R32_SFLOAT),
        2 => Some(vk::Format::R32G32_SFLOAT),
        3 => Some(vk::Format::R32G32B32_SFLOAT),
        4 => Some(vk::Format::R32G32B32A32_SFLOAT),
        _ => None,
    }
}

/// Anything that can turn vertex shader bytecode into a vertex input layout.
pub trait VertexReflector {
    fn vertex_layout(&self, spirv: &[u8]) -> Result<VertexLayout>;
}

/// Reflection over SPIR-V stage inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpirvReflector;

impl SpirvReflector {
    /// 32-bit float scalars and vectors only.
    fn component_count(location: u32, ty: &Type) -> Result<u32> {
        match ty {
            Type::Scalar(ScalarType::Float { bits: 32 }) => Ok(1),
            Type::Vector(VectorType { scalar_ty: ScalarType::Float { bits: 32 }, nscalar, .. })
                if (2..=4).contains(nscalar) =>
            {
                Ok(*nscalar)
            }
            other => Err(RenderError::UnsupportedShaderInput { location, ty: format!("{other:?}") }),
        }
    }
}

impl VertexReflector for SpirvReflector {
    fn vertex_layout(&self, spirv: &[u8]) -> Result<VertexLayout> {
        let words = ash::util::read_spv(&mut std::io::Cursor::new(spirv))
            .map_err(|e| RenderError::Reflection(format!("not SPIR-V: {e}")))?;
        let entry_points = spirq::ReflectConfig::new()
            .spv(words.as_slice())
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| RenderError::Reflection(format!("{e:?}")))?;
        let entry = entry_points
            .first()
            .ok_or_else(|| RenderError::Reflection("no entry point".into()))?;

        // Iteration order is kept as-is; see VertexLayout::packed.
        let mut inputs = Vec::new();
        for var in &entry.vars {
            if let Variable::Input { location, ty, .. } = var {
                let loc = location.loc();
                inputs.push((loc, Self::component_count(loc, ty)?));
            }
        }
        let layout = VertexLayout::packed(&inputs)?;
        if !layout.in_location_order() {
            warn!("reflect: inputs not in location order {inputs:?}; offsets follow that order");
        }
        debug!(
            "reflect: {} vertex inputs, stride {}",
            layout.attributes.len(),
            layout.stride
        );
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXTURED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/textured.vert.spv"));
    const COLORED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/colored.vert.spv"));
    const INT_INPUT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/int_input.vert.spv"));
    const SHUFFLED: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/shuffled.vert.spv"));

    fn by_location(layout: &VertexLayout) -> Vec<(u32, vk::Format)> {
        let mut v: Vec<_> = layout.attributes.iter().map(|a| (a.location, a.format)).collect();
        v.sort_by_key(|&(loc, _)| loc);
        v
    }

    /// Offsets are the running sum of the sizes before them, in emission order.
    fn assert_packed(layout: &VertexLayout) {
        let mut running = 0;
        for a in &layout.attributes {
            assert_eq!(a.offset, running, "location {}", a.location);
            assert_eq!(a.binding, 0);
            running += match a.format {
                vk::Format::R32_SFLOAT => 4,
                vk::Format::R32G32_SFLOAT => 8,
                vk::Format::R32G32B32_SFLOAT => 12,
                vk::Format::R32G32B32A32_SFLOAT => 16,
                f => panic!("unexpected format {f:?}"),
            };
        }
        assert_eq!(layout.stride, running);
        assert_eq!(layout.binding.stride, running);
    }

    #[test]
    fn textured_shader_yields_36_byte_vertices() {
        let layout = SpirvReflector.vertex_layout(TEXTURED).unwrap();
        assert_eq!(layout.stride, 36);
        assert_eq!(emitted(&layout), vec![(0, 0), (1, 12), (2, 24), (3, 32)]);
        assert!(layout.in_location_order());
        assert_eq!(
            by_location(&layout),
            vec![
                (0, vk::Format::R32G32B32_SFLOAT),
                (1, vk::Format::R32G32B32_SFLOAT),
                (2, vk::Format::R32G32_SFLOAT),
                (3, vk::Format::R32_SFLOAT),
            ]
        );
        assert_packed(&layout);
    }

    #[test]
    fn colored_shader_yields_24_byte_vertices() {
        let layout = SpirvReflector.vertex_layout(COLORED).unwrap();
        assert_eq!(layout.stride, 24);
        assert_eq!(layout.attributes.len(), 2);
        assert_packed(&layout);
    }

    fn emitted(layout: &VertexLayout) -> Vec<(u32, u32)> {
        layout.attributes.iter().map(|a| (a.location, a.offset)).collect()
    }

    #[test]
    fn out_of_order_declarations_pack_in_emission_order() {
        let layout = SpirvReflector.vertex_layout(SHUFFLED).unwrap();
        assert_eq!(layout.stride, 8 + 4 + 16);
        // location 0 is not at offset 0: offsets follow reflection order
        assert_eq!(emitted(&layout), vec![(1, 0), (2, 8), (0, 12)]);
        assert_eq!(
            by_location(&layout),
            vec![
                (0, vk::Format::R32G32B32A32_SFLOAT),
                (1, vk::Format::R32G32_SFLOAT),
                (2, vk::Format::R32_SFLOAT),
            ]
        );
        assert!(!layout.in_location_order());
        assert_packed(&layout);
    }

    #[test]
    fn location_order_check() {
        assert!(VertexLayout::packed(&[(0, 3), (1, 3), (2, 2)]).unwrap().in_location_order());
        assert!(VertexLayout::packed(&[]).unwrap().in_location_order());
        assert!(!VertexLayout::packed(&[(1, 2), (0, 4)]).unwrap().in_location_order());
    }

    #[test]
    fn integer_input_is_rejected() {
        let err = SpirvReflector.vertex_layout(INT_INPUT).unwrap_err();
        assert!(
            matches!(err, RenderError::UnsupportedShaderInput { location: 1, .. }),
            "{err}"
        );
    }

    #[test]
    fn garbage_is_a_reflection_error() {
        let err = SpirvReflector.vertex_layout(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, RenderError::Reflection(_)), "{err}");
    }

    #[test]
    fn packed_rejects_wide_vectors() {
        assert!(VertexLayout::packed(&[(0, 3), (1, 5)]).is_err());
        let l = VertexLayout::packed(&[(0, 3), (1, 3)]).unwrap();
        assert_eq!(l.attributes[1].offset, 12);
        assert_eq!(l.stride, 24);
    }
}
