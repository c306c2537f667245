// SPDX-License-Identifier: CEPL-1.0
//! Render pass and the single graphics pipeline.
use crate::error::{RenderError, Result, VkResultExt};
use crate::reflect::{VertexLayout, VertexReflector};
use crate::swapchain::DEPTH_FORMAT;
use ash::vk;
use prism_render::VertexFormat;
use std::path::Path;
use tracing::info;

/// Compiled vertex + fragment bytecode, as read from disk.
#[derive(Clone, Debug)]
pub struct ShaderSource {
    pub vert: Vec<u8>,
    pub frag: Vec<u8>,
}

impl ShaderSource {
    pub fn load(vert: &Path, frag: &Path) -> Result<Self> {
        Ok(Self { vert: load_shader(vert)?, frag: load_shader(frag)? })
    }
}

pub(crate) fn load_shader(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| RenderError::ShaderLoad { path: path.to_path_buf(), source })
}

// STRICT: attachment 0 is the swapchain color image, attachment 1 the depth buffer;
// framebuffers are built in the same order.
pub unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: DEPTH_FORMAT,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };
    // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT; the implicit
    // layout transition must not run ahead of it.
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };

    let ci = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    device.create_render_pass(&ci, None).init("create_render_pass")
}

unsafe fn create_module(device: &ash::Device, code: &[u8]) -> Result<vk::ShaderModule> {
    let words = ash::util::read_spv(&mut std::io::Cursor::new(code))
        .map_err(|e| RenderError::Reflection(format!("not SPIR-V: {e}")))?;
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: words.len() * 4,
        p_code: words.as_ptr(),
        ..Default::default()
    };
    device.create_shader_module(&ci, None).init("create_shader_module")
}

/// Blending is only needed when glyph coverage feeds alpha.
pub(crate) fn blend_attachment(format: VertexFormat) -> vk::PipelineColorBlendAttachmentState {
    let color_write_mask = vk::ColorComponentFlags::RGBA;
    if format.supports_textures() {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask,
        }
    } else {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            color_write_mask,
            ..Default::default()
        }
    }
}

pub struct GraphicsPipeline {
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub vertex_layout: VertexLayout,
    pub vertex_format: VertexFormat,
}

impl GraphicsPipeline {
    pub unsafe fn create(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        shaders: &ShaderSource,
        reflector: &dyn VertexReflector,
    ) -> Result<Self> {
        let vertex_layout = reflector.vertex_layout(&shaders.vert)?;
        let vertex_format = VertexFormat::from_stride(vertex_layout.stride).ok_or_else(|| {
            RenderError::Reflection(format!(
                "vertex stride {} matches no known vertex format",
                vertex_layout.stride
            ))
        })?;

        let layout_ci = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &set_layout,
            ..Default::default()
        };
        let layout = device
            .create_pipeline_layout(&layout_ci, None)
            .init("create_pipeline_layout")?;

        let pipeline = match Self::create_pipeline(
            device,
            render_pass,
            layout,
            shaders,
            &vertex_layout,
            vertex_format,
        ) {
            Ok(p) => p,
            Err(e) => {
                device.destroy_pipeline_layout(layout, None);
                return Err(e);
            }
        };

        info!(
            "vk: pipeline ready ({:?}, stride {}, blend={})",
            vertex_format,
            vertex_layout.stride,
            vertex_format.supports_textures()
        );
        Ok(Self { layout, pipeline, vertex_layout, vertex_format })
    }

    unsafe fn create_pipeline(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        layout: vk::PipelineLayout,
        shaders: &ShaderSource,
        vertex_layout: &VertexLayout,
        vertex_format: VertexFormat,
    ) -> Result<vk::Pipeline> {
        let vert = create_module(device, &shaders.vert)?;
        let frag = match create_module(device, &shaders.frag) {
            Ok(m) => m,
            Err(e) => {
                device.destroy_shader_module(vert, None);
                return Err(e);
            }
        };

        let entry = c"main";
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vert,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: frag,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &vertex_layout.binding,
            vertex_attribute_description_count: vertex_layout.attributes.len() as u32,
            p_vertex_attribute_descriptions: vertex_layout.attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        // viewport/scissor are dynamic; only the counts matter here
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            line_width: 1.0,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let depth = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: vk::TRUE,
            depth_write_enable: vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            ..Default::default()
        };
        let blend_attachment = blend_attachment(vertex_format);
        let blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_attachment,
            ..Default::default()
        };
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dynamic_states.len() as u32,
            p_dynamic_states: dynamic_states.as_ptr(),
            ..Default::default()
        };

        let ci = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth,
            p_color_blend_state: &blend,
            p_dynamic_state: &dynamic,
            layout,
            render_pass,
            subpass: 0,
            ..Default::default()
        };

        let result = device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&ci),
            None,
        );
        // modules are only needed for creation
        device.destroy_shader_module(vert, None);
        device.destroy_shader_module(frag, None);

        match result {
            Ok(pipelines) => Ok(pipelines[0]),
            Err((_, result)) => Err(RenderError::Init { stage: "create_graphics_pipelines", result }),
        }
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.pipeline != vk::Pipeline::null() {
            device.destroy_pipeline(self.pipeline, None);
            self.pipeline = vk::Pipeline::null();
        }
        if self.layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(self.layout, None);
            self.layout = vk::PipelineLayout::null();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_capable_pipeline_blends_by_source_alpha() {
        let b = blend_attachment(VertexFormat::Textured);
        assert_eq!(b.blend_enable, vk::TRUE);
        assert_eq!(b.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(b.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(b.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn color_only_pipeline_does_not_blend() {
        let b = blend_attachment(VertexFormat::Colored);
        assert_eq!(b.blend_enable, vk::FALSE);
        assert_eq!(b.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn missing_shader_file_is_a_load_error() {
        let err = load_shader(Path::new("/definitely/not/here/vert.spv")).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLoad { .. }), "{err}");
    }
}
