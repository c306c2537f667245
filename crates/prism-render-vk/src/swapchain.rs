// SPDX-License-Identifier: CEPL-1.0
//! Swapchain, its image views, the depth buffer and the framebuffers.
use crate::context::Context;
use crate::error::{RenderError, Result, VkResultExt};
use crate::resources::GpuImage;
use ash::vk;
use prism_render::RenderSize;
use tracing::info;

pub(crate) const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

// Info only
fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        _ => "OTHER",
    }
}
fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

/// B8G8R8A8_SRGB + SRGB_NONLINEAR when offered, else whatever comes first.
pub(crate) fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// FIFO is always available, so it is the fallback.
pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    prefer_mailbox: bool,
) -> vk::PresentModeKHR {
    if prefer_mailbox && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// `current_extent` wins unless the surface leaves it to us (u32::MAX).
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 = unbounded).
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count != 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub depth: Option<GpuImage>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl Swapchain {
    /// Creates the swapchain, one view per image and a matching depth buffer.
    /// Framebuffers come later, once a render pass for `format` exists.
    pub unsafe fn create(
        ctx: &Context,
        want: RenderSize,
        prefer_mailbox: bool,
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        let caps = ctx.surface_capabilities()?;
        let formats = ctx
            .surface_loader
            .get_physical_device_surface_formats(ctx.phys, ctx.surface)
            .surface("get_surface_formats")?;
        let modes = ctx
            .surface_loader
            .get_physical_device_surface_present_modes(ctx.phys, ctx.surface)
            .surface("get_surface_present_modes")?;

        let format = choose_surface_format(&formats).ok_or(RenderError::Surface {
            stage: "get_surface_formats",
            reason: "surface reports no formats".into(),
        })?;
        let present_mode = choose_present_mode(&modes, prefer_mailbox);
        let extent = choose_extent(&caps, want);
        if extent.width == 0 || extent.height == 0 {
            // minimized between the size check and here; try again later
            return Err(RenderError::OutOfDate);
        }
        let min_image_count = choose_image_count(&caps);

        let families = ctx.families.unique();
        let (sharing_mode, family_count, family_ptr) = if families.len() > 1 {
            (vk::SharingMode::CONCURRENT, families.len() as u32, families.as_ptr())
        } else {
            (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
        };

        let ci = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.surface,
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: family_ptr,
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };
        let handle = ctx
            .swapchain_loader
            .create_swapchain(&ci, None)
            .swapchain("create_swapchain")?;

        let mut sc = Swapchain {
            handle,
            format,
            present_mode,
            extent,
            images: Vec::new(),
            views: Vec::new(),
            depth: None,
            framebuffers: Vec::new(),
        };
        // On failure the partially built swapchain is torn down before returning.
        if let Err(e) = sc.create_images(ctx) {
            sc.destroy(ctx);
            return Err(e);
        }

        info!(
            "vk: swapchain {}x{} format={} present={} images={}",
            extent.width,
            extent.height,
            fmt_name(format.format),
            pm_name(present_mode),
            sc.images.len()
        );
        Ok(sc)
    }

    unsafe fn create_images(&mut self, ctx: &Context) -> Result<()> {
        self.images = ctx
            .swapchain_loader
            .get_swapchain_images(self.handle)
            .swapchain("get_swapchain_images")?;
        for &image in &self.images {
            let view = create_view(&ctx.device, image, self.format.format, vk::ImageAspectFlags::COLOR)
                .swapchain("create_image_view")?;
            self.views.push(view);
        }
        self.depth = Some(GpuImage::new(
            ctx,
            self.extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?);
        Ok(())
    }

    /// One framebuffer per image view, each sharing the depth view.
    pub unsafe fn create_framebuffers(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        let depth_view = self.depth.as_ref().map(|d| d.view).unwrap_or_default();
        for &view in &self.views {
            let attachments = [view, depth_view];
            let ci = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = device
                .create_framebuffer(&ci, None)
                .swapchain("create_framebuffer")?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    // STRICT ORDER: framebuffers -> depth -> views; the swapchain handle is left alone
    // so it can still serve as `old_swapchain` for its replacement.
    pub unsafe fn destroy_dependents(&mut self, ctx: &Context) {
        for fb in self.framebuffers.drain(..) {
            ctx.device.destroy_framebuffer(fb, None);
        }
        if let Some(mut depth) = self.depth.take() {
            depth.destroy(ctx);
        }
        for view in self.views.drain(..) {
            ctx.device.destroy_image_view(view, None);
        }
        self.images.clear();
    }

    pub unsafe fn destroy(&mut self, ctx: &Context) {
        self.destroy_dependents(ctx);
        if self.handle != vk::SwapchainKHR::null() {
            ctx.swapchain_loader.destroy_swapchain(self.handle, None);
            self.handle = vk::SwapchainKHR::null();
        }
    }
}

pub(crate) unsafe fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> ash::prelude::VkResult<vk::ImageView> {
    let ci = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        components: vk::ComponentMapping::default(),
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    device.create_image_view(&ci, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32, current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 2160 },
            ..Default::default()
        }
    }

    #[test]
    fn srgb_bgra_preferred_else_first() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb]).unwrap().format, srgb.format);
        assert_eq!(choose_surface_format(&[unorm]).unwrap().format, unorm.format);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn mailbox_only_when_offered_and_wanted() {
        let both = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&both, true), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&both, false), vk::PresentModeKHR::FIFO);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_follows_surface_unless_undefined() {
        let want = RenderSize { width: 800, height: 600 };
        let e = choose_extent(&caps(2, 3, (1024, 768)), want);
        assert_eq!((e.width, e.height), (1024, 768));

        let e = choose_extent(&caps(2, 3, (u32::MAX, u32::MAX)), want);
        assert_eq!((e.width, e.height), (800, 600));

        let huge = RenderSize { width: 10_000, height: 0 };
        let e = choose_extent(&caps(2, 3, (u32::MAX, u32::MAX)), huge);
        assert_eq!((e.width, e.height), (4096, 1));
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        assert_eq!(choose_image_count(&caps(2, 0, (1, 1))), 3);
        assert_eq!(choose_image_count(&caps(2, 8, (1, 1))), 3);
        assert_eq!(choose_image_count(&caps(3, 3, (1, 1))), 3);
    }
}
