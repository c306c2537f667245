// SPDX-License-Identifier: CEPL-1.0
//! Allocator-backed buffers and images, plus the blocking staged upload path.
use crate::context::Context;
use crate::error::{RenderError, Result, VkResultExt};
use crate::swapchain::create_view;
use ash::vk;
use vk_mem::Alloc;

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    pub size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Host-visible, host-coherent buffer the CPU writes sequentially.
    pub unsafe fn host_visible(
        ctx: &Context,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let aci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        };
        let (buffer, allocation) = ctx
            .allocator()
            .create_buffer(&bci, &aci)
            .resource("create_buffer")?;
        Ok(Self { buffer, allocation, size })
    }

    /// Host-visible buffer filled with `bytes` in one go.
    pub unsafe fn with_data(
        ctx: &Context,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> Result<Self> {
        let mut buf = Self::host_visible(ctx, bytes.len().max(1) as vk::DeviceSize, usage)?;
        if let Err(e) = buf.write(ctx, bytes) {
            buf.destroy(ctx);
            return Err(e);
        }
        Ok(buf)
    }

    /// Map, copy, unmap. `bytes` must fit in the buffer.
    pub unsafe fn write(&mut self, ctx: &Context, bytes: &[u8]) -> Result<()> {
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);
        let ptr = ctx
            .allocator()
            .map_memory(&mut self.allocation)
            .resource("map_memory")?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        ctx.allocator().unmap_memory(&mut self.allocation);
        Ok(())
    }

    pub unsafe fn destroy(&mut self, ctx: &Context) {
        if self.buffer != vk::Buffer::null() {
            ctx.allocator().destroy_buffer(self.buffer, &mut self.allocation);
            self.buffer = vk::Buffer::null();
        }
    }
}

/// Device-local 2D image with a single mip level and a full view.
pub struct GpuImage {
    pub image: vk::Image,
    allocation: vk_mem::Allocation,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
}

impl GpuImage {
    pub unsafe fn new(
        ctx: &Context,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let ici = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D { width: extent.width, height: extent.height, depth: 1 },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let aci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (image, mut allocation) = ctx
            .allocator()
            .create_image(&ici, &aci)
            .resource("create_image")?;
        let view = match create_view(&ctx.device, image, format, aspect) {
            Ok(v) => v,
            Err(result) => {
                ctx.allocator().destroy_image(image, &mut allocation);
                return Err(RenderError::Resource { stage: "create_image_view", result });
            }
        };
        Ok(Self { image, allocation, view, extent, format })
    }

    /// Single-channel sampled image, ready to receive a staged upload.
    pub unsafe fn sampled_r8(ctx: &Context, width: u32, height: u32) -> Result<Self> {
        Self::new(
            ctx,
            vk::Extent2D { width, height },
            vk::Format::R8_UNORM,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )
    }

    // STRICT ORDER: view before image
    pub unsafe fn destroy(&mut self, ctx: &Context) {
        if self.view != vk::ImageView::null() {
            ctx.device.destroy_image_view(self.view, None);
            self.view = vk::ImageView::null();
        }
        if self.image != vk::Image::null() {
            ctx.allocator().destroy_image(self.image, &mut self.allocation);
            self.image = vk::Image::null();
        }
    }
}

/// Access masks and stages for the two layout transitions the upload path uses.
pub(crate) fn barrier_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Option<(vk::AccessFlags, vk::AccessFlags, vk::PipelineStageFlags, vk::PipelineStageFlags)> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Some((
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Some((
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ))
        }
        _ => None,
    }
}

unsafe fn cmd_transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) {
    let Some((src_access, dst_access, src_stage, dst_stage)) = barrier_masks(old, new) else {
        tracing::warn!("vk: no barrier recipe for {old:?} -> {new:?}");
        return;
    };
    let barrier = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: src_access,
        dst_access_mask: dst_access,
        old_layout: old,
        new_layout: new,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        cmd,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        std::slice::from_ref(&barrier),
    );
}

/// Records `record` into a throwaway command buffer, submits it on the graphics
/// queue and blocks until the queue is idle.
pub unsafe fn one_shot(
    ctx: &Context,
    pool: vk::CommandPool,
    record: impl FnOnce(vk::CommandBuffer),
) -> Result<()> {
    let d = &ctx.device;
    let ai = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: 1,
        ..Default::default()
    };
    let cmd = d.allocate_command_buffers(&ai).resource("allocate_command_buffers")?[0];

    let run = || -> Result<()> {
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        d.begin_command_buffer(cmd, &bi).resource("begin_command_buffer")?;
        record(cmd);
        d.end_command_buffer(cmd).resource("end_command_buffer")?;

        let si = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            ..Default::default()
        };
        d.queue_submit(ctx.graphics_queue, std::slice::from_ref(&si), vk::Fence::null())
            .resource("queue_submit")?;
        d.queue_wait_idle(ctx.graphics_queue).resource("queue_wait_idle")
    };
    let result = run();
    d.free_command_buffers(pool, std::slice::from_ref(&cmd));
    result
}

/// Staged upload of tightly packed 8-bit texels:
/// UNDEFINED -> TRANSFER_DST, buffer copy, TRANSFER_DST -> SHADER_READ_ONLY.
pub unsafe fn upload_r8(
    ctx: &Context,
    pool: vk::CommandPool,
    dst: &GpuImage,
    texels: &[u8],
) -> Result<()> {
    let mut staging = GpuBuffer::with_data(ctx, vk::BufferUsageFlags::TRANSFER_SRC, texels)?;

    let result = one_shot(ctx, pool, |cmd| {
        let d = &ctx.device;
        cmd_transition(
            d,
            cmd,
            dst.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D {
                width: dst.extent.width,
                height: dst.extent.height,
                depth: 1,
            },
        };
        d.cmd_copy_buffer_to_image(
            cmd,
            staging.buffer,
            dst.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            std::slice::from_ref(&region),
        );
        cmd_transition(
            d,
            cmd,
            dst.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    });

    staging.destroy(ctx);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_barriers_order_transfer_before_sampling() {
        let (src, dst, src_stage, dst_stage) = barrier_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert!(src.is_empty());
        assert_eq!(dst, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);

        let (src, dst, src_stage, dst_stage) = barrier_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(src, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(dst, vk::AccessFlags::SHADER_READ);
        assert_eq!(src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_transition_has_no_recipe() {
        assert!(barrier_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        )
        .is_none());
    }
}
