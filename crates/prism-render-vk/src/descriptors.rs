// SPDX-License-Identifier: CEPL-1.0
//! The one descriptor set: transforms at binding 0, the glyph sampler at binding 1.
use crate::context::Context;
use crate::error::{Result, VkResultExt};
use crate::resources::{upload_r8, GpuBuffer, GpuImage};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::debug;

pub const UBO_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;

/// Column-major matrices, std140-compatible as laid out.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct Ubo {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl Ubo {
    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
        }
    }
}

pub(crate) fn layout_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        vk::DescriptorSetLayoutBinding {
            binding: UBO_BINDING,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            ..Default::default()
        },
        vk::DescriptorSetLayoutBinding {
            binding: TEXTURE_BINDING,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            ..Default::default()
        },
    ]
}

pub struct Descriptors {
    pub layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
    ubo: GpuBuffer,
    sampler: vk::Sampler,
    dummy: GpuImage,
    bound_view: vk::ImageView,
}

impl Descriptors {
    /// Layout, pool, set, uniform buffer, sampler and a 1x1 white dummy texture,
    /// with both bindings written before returning.
    pub unsafe fn create(ctx: &Context, cmd_pool: vk::CommandPool) -> Result<Self> {
        let d = &ctx.device;
        let mut ubo = GpuBuffer::host_visible(
            ctx,
            std::mem::size_of::<Ubo>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;
        let dummy = match GpuImage::sampled_r8(ctx, 1, 1) {
            Ok(img) => img,
            Err(e) => {
                ubo.destroy(ctx);
                return Err(e);
            }
        };
        let mut this = Descriptors {
            layout: vk::DescriptorSetLayout::null(),
            pool: vk::DescriptorPool::null(),
            set: vk::DescriptorSet::null(),
            ubo,
            sampler: vk::Sampler::null(),
            dummy,
            bound_view: vk::ImageView::null(),
        };

        let build = |this: &mut Descriptors| -> Result<()> {
            upload_r8(ctx, cmd_pool, &this.dummy, &[0xff])?;

            let bindings = layout_bindings();
            let layout_ci = vk::DescriptorSetLayoutCreateInfo {
                s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
                binding_count: bindings.len() as u32,
                p_bindings: bindings.as_ptr(),
                ..Default::default()
            };
            this.layout = d
                .create_descriptor_set_layout(&layout_ci, None)
                .init("create_descriptor_set_layout")?;

            let sizes = [
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: 1,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: 1,
                },
            ];
            let pool_ci = vk::DescriptorPoolCreateInfo {
                s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
                max_sets: 1,
                pool_size_count: sizes.len() as u32,
                p_pool_sizes: sizes.as_ptr(),
                ..Default::default()
            };
            this.pool = d
                .create_descriptor_pool(&pool_ci, None)
                .init("create_descriptor_pool")?;

            let alloc = vk::DescriptorSetAllocateInfo {
                s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
                descriptor_pool: this.pool,
                descriptor_set_count: 1,
                p_set_layouts: &this.layout,
                ..Default::default()
            };
            this.set = d.allocate_descriptor_sets(&alloc).init("allocate_descriptor_sets")?[0];

            let sampler_ci = vk::SamplerCreateInfo {
                s_type: vk::StructureType::SAMPLER_CREATE_INFO,
                mag_filter: vk::Filter::LINEAR,
                min_filter: vk::Filter::LINEAR,
                mipmap_mode: vk::SamplerMipmapMode::NEAREST,
                address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                anisotropy_enable: vk::FALSE,
                max_anisotropy: 1.0,
                compare_enable: vk::FALSE,
                min_lod: 0.0,
                max_lod: 0.0,
                border_color: vk::BorderColor::INT_OPAQUE_BLACK,
                unnormalized_coordinates: vk::FALSE,
                ..Default::default()
            };
            this.sampler = d.create_sampler(&sampler_ci, None).init("create_sampler")?;

            let buffer_info = vk::DescriptorBufferInfo {
                buffer: this.ubo.buffer,
                offset: 0,
                range: std::mem::size_of::<Ubo>() as vk::DeviceSize,
            };
            let write = vk::WriteDescriptorSet {
                s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                dst_set: this.set,
                dst_binding: UBO_BINDING,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                p_buffer_info: &buffer_info,
                ..Default::default()
            };
            d.update_descriptor_sets(std::slice::from_ref(&write), &[]);
            this.bind_dummy(d);
            Ok(())
        };

        if let Err(e) = build(&mut this) {
            this.destroy(ctx);
            return Err(e);
        }
        debug!("vk: descriptor set ready (ubo + dummy texture)");
        Ok(this)
    }

    /// Points binding 1 at `view`. Callers wait for the device first.
    pub unsafe fn bind_texture(&mut self, device: &ash::Device, view: vk::ImageView) {
        let image_info = vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        let write = vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: self.set,
            dst_binding: TEXTURE_BINDING,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            p_image_info: &image_info,
            ..Default::default()
        };
        device.update_descriptor_sets(std::slice::from_ref(&write), &[]);
        self.bound_view = view;
    }

    pub unsafe fn bind_dummy(&mut self, device: &ash::Device) {
        let view = self.dummy.view;
        self.bind_texture(device, view);
    }

    pub fn bound_view(&self) -> vk::ImageView {
        self.bound_view
    }

    pub unsafe fn write_ubo(&mut self, ctx: &Context, ubo: &Ubo) -> Result<()> {
        self.ubo.write(ctx, bytemuck::bytes_of(ubo))
    }

    // STRICT ORDER: pool (frees the set) -> layout -> sampler -> dummy -> ubo
    pub unsafe fn destroy(&mut self, ctx: &Context) {
        let d = &ctx.device;
        if self.pool != vk::DescriptorPool::null() {
            d.destroy_descriptor_pool(self.pool, None);
            self.pool = vk::DescriptorPool::null();
            self.set = vk::DescriptorSet::null();
        }
        if self.layout != vk::DescriptorSetLayout::null() {
            d.destroy_descriptor_set_layout(self.layout, None);
            self.layout = vk::DescriptorSetLayout::null();
        }
        if self.sampler != vk::Sampler::null() {
            d.destroy_sampler(self.sampler, None);
            self.sampler = vk::Sampler::null();
        }
        self.dummy.destroy(ctx);
        self.ubo.destroy(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ubo_is_three_column_major_mat4s() {
        assert_eq!(std::mem::size_of::<Ubo>(), 3 * 64);
        let t = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let ubo = Ubo::new(t, Mat4::IDENTITY, Mat4::IDENTITY);
        // translation lives in the fourth column
        assert_eq!(ubo.model[3], [1.0, 2.0, 3.0, 1.0]);
        let bytes = bytemuck::bytes_of(&ubo);
        assert_eq!(&bytes[48..52], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn layout_has_vertex_ubo_and_fragment_sampler() {
        let [ubo, tex] = layout_bindings();
        assert_eq!(ubo.binding, 0);
        assert_eq!(ubo.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(ubo.stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(tex.binding, 1);
        assert_eq!(tex.descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(tex.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }
}
