// SPDX-License-Identifier: CEPL-1.0
use crate::context::Context;
use crate::descriptors::{Descriptors, Ubo};
use crate::error::{RenderError, Result, VkResultExt};
use crate::frame::{FrameScheduler, FrameStatus, FrameTarget};
use crate::meshes::{GpuMesh, MeshSet};
use crate::pipeline::{create_render_pass, GraphicsPipeline, ShaderSource};
use crate::reflect::SpirvReflector;
use crate::swapchain::Swapchain;
use ash::prelude::VkResult;
use ash::vk;
use glam::Mat4;
use prism_math::perspective_vk;
use prism_render::{Host, MeshKind, RenderSize, TextAtlas, VertexFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub prefer_mailbox: bool,
    pub validation: bool,
    pub fov_deg: f32,
    pub font_path: PathBuf,
    pub text: String,
    pub font_px: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.5, 0.5, 0.5, 1.0],
            prefer_mailbox: true,
            validation: cfg!(debug_assertions),
            fov_deg: 45.0,
            font_path: PathBuf::from("FiraSans-Bold.ttf"),
            text: "Hello World".into(),
            font_px: 48.0,
        }
    }
}

fn load_font(path: &Path) -> Result<fontdue::Font> {
    let bytes = std::fs::read(path)
        .map_err(|e| RenderError::FontLoad { path: path.to_path_buf(), reason: e.to_string() })?;
    fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|e| RenderError::FontLoad { path: path.to_path_buf(), reason: e.to_string() })
}

#[derive(Default)]
struct SyncObjects {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

/// Everything created on top of the [`Context`]. Handles start null and are
/// filled in by `init`, so a half-built value still tears down cleanly.
struct Gpu {
    cfg: RenderConfig,
    shaders: ShaderSource,
    want: RenderSize,
    view: Mat4,
    model: Mat4,
    cmd_pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    swapchain: Option<Swapchain>,
    render_pass: vk::RenderPass,
    descriptors: Option<Descriptors>,
    pipeline: Option<GraphicsPipeline>,
    sync: SyncObjects,
    meshes: MeshSet<GpuMesh>,
    font: Option<fontdue::Font>,
    // dropped last, after Gpu::drop released every child object
    ctx: Context,
}

impl Gpu {
    // STRICT ORDER:
    // command pool -> swapchain (+ views, depth) -> render pass -> framebuffers
    // -> descriptor layout/pool/set -> pipeline layout + pipeline -> sync objects
    unsafe fn init(&mut self) -> Result<()> {
        let d = &self.ctx.device;

        let pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: self.ctx.families.graphics,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        self.cmd_pool = d.create_command_pool(&pool_ci, None).init("create_command_pool")?;
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        self.cmd = d.allocate_command_buffers(&alloc_info).init("allocate_command_buffers")?[0];

        let swapchain = self.swapchain.insert(Swapchain::create(
            &self.ctx,
            self.want,
            self.cfg.prefer_mailbox,
            vk::SwapchainKHR::null(),
        )?);
        self.render_pass = create_render_pass(d, swapchain.format.format)?;
        swapchain.create_framebuffers(d, self.render_pass)?;

        let descriptors = self.descriptors.insert(Descriptors::create(&self.ctx, self.cmd_pool)?);
        self.pipeline = Some(GraphicsPipeline::create(
            d,
            self.render_pass,
            descriptors.layout,
            &self.shaders,
            &SpirvReflector,
        )?);

        let sem_ci = vk::SemaphoreCreateInfo::default();
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        self.sync.image_available = d.create_semaphore(&sem_ci, None).init("create_semaphore")?;
        self.sync.render_finished = d.create_semaphore(&sem_ci, None).init("create_semaphore")?;
        self.sync.in_flight = d.create_fence(&fence_ci, None).init("create_fence")?;
        Ok(())
    }

    fn vertex_format(&self) -> VertexFormat {
        self.pipeline
            .as_ref()
            .map(|p| p.vertex_format)
            .unwrap_or(VertexFormat::Textured)
    }

    unsafe fn create_mesh(&mut self, kind: MeshKind) -> Result<bool> {
        if self.meshes.contains(kind) {
            return Ok(false);
        }
        let format = self.vertex_format();
        if kind == MeshKind::Text && !format.supports_textures() {
            warn!("vk: {kind} needs a textured pipeline, current one is {format:?}; ignoring");
            return Ok(false);
        }
        let Some(descriptors) = self.descriptors.as_mut() else {
            return Ok(false);
        };

        // binding 1 may be rewritten below; nothing in flight may still use it
        self.ctx.device.device_wait_idle().resource("device_wait_idle")?;
        let mesh = match kind {
            MeshKind::Triangle => GpuMesh::triangle(&self.ctx, format)?,
            MeshKind::Cube => GpuMesh::cube(&self.ctx, format)?,
            MeshKind::Text => {
                let font = match self.font.take() {
                    Some(f) => f,
                    None => load_font(&self.cfg.font_path)?,
                };
                let atlas = TextAtlas::build(&font, &self.cfg.text, self.cfg.font_px);
                self.font = Some(font);
                GpuMesh::text(&self.ctx, self.cmd_pool, descriptors, &atlas)?
            }
        };
        if let Err(mesh) = self.meshes.insert(kind, mesh) {
            mesh.destroy(&self.ctx, descriptors);
            return Ok(false);
        }
        info!("vk: {kind} created");
        Ok(true)
    }

    unsafe fn destroy_mesh(&mut self, kind: MeshKind) -> Result<bool> {
        let (Some(mesh), Some(descriptors)) = (self.meshes.remove(kind), self.descriptors.as_mut())
        else {
            return Ok(false);
        };
        // STRICT: the device must be idle before any buffer/image goes away
        self.ctx.device.device_wait_idle().resource("device_wait_idle")?;
        debug!("vk: destroying {}", mesh.kind());
        mesh.destroy(&self.ctx, descriptors);
        info!("vk: {kind} destroyed");
        Ok(true)
    }

    unsafe fn record_commands(&self, image_index: u32) -> Result<()> {
        let d = &self.ctx.device;
        let (Some(sc), Some(pipeline), Some(descriptors)) =
            (self.swapchain.as_ref(), self.pipeline.as_ref(), self.descriptors.as_ref())
        else {
            return Err(RenderError::OutOfDate);
        };
        let framebuffer = *sc
            .framebuffers
            .get(image_index as usize)
            .ok_or(RenderError::OutOfDate)?;

        d.reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
            .frame("reset_command_buffer")?;
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        d.begin_command_buffer(self.cmd, &bi).frame("begin_command_buffer")?;

        let clear = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: self.cfg.clear_color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let area = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: sc.extent };
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.render_pass,
            framebuffer,
            render_area: area,
            clear_value_count: clear.len() as u32,
            p_clear_values: clear.as_ptr(),
            ..Default::default()
        };
        d.cmd_begin_render_pass(self.cmd, &rp_begin, vk::SubpassContents::INLINE);
        d.cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        d.cmd_bind_descriptor_sets(
            self.cmd,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline.layout,
            0,
            &[descriptors.set],
            &[],
        );

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: sc.extent.width as f32,
            height: sc.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        d.cmd_set_viewport(self.cmd, 0, &[viewport]);
        d.cmd_set_scissor(self.cmd, 0, &[area]);

        for mesh in self.meshes.iter() {
            let v = mesh.vertices();
            d.cmd_bind_vertex_buffers(self.cmd, 0, &[v.buffer.buffer], &[0]);
            d.cmd_draw(self.cmd, v.vertex_count, 1, 0, 0);
        }

        d.cmd_end_render_pass(self.cmd);
        d.end_command_buffer(self.cmd).frame("end_command_buffer")
    }

    // STRICT ORDER (recreate):
    // idle once -> drop framebuffers/depth/views -> new swapchain with old_swapchain
    // -> retire old handle -> render pass + pipeline only if the format changed
    // -> framebuffers
    unsafe fn rebuild_swapchain(&mut self) -> Result<()> {
        let Some(old) = self.swapchain.as_mut() else {
            return Err(RenderError::OutOfDate);
        };
        self.ctx.device.device_wait_idle().swapchain("device_wait_idle")?;
        old.destroy_dependents(&self.ctx);

        let mut fresh =
            Swapchain::create(&self.ctx, self.want, self.cfg.prefer_mailbox, old.handle)?;
        let old_format = old.format.format;
        old.destroy(&self.ctx);

        if fresh.format.format != old_format {
            info!("vk: surface format changed, rebuilding render pass and pipeline");
            if let Some(mut p) = self.pipeline.take() {
                p.destroy(&self.ctx.device);
            }
            self.ctx.device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();

            let layout = self
                .descriptors
                .as_ref()
                .map(|d| d.layout)
                .unwrap_or_default();
            let rebuilt = create_render_pass(&self.ctx.device, fresh.format.format).and_then(|rp| {
                self.render_pass = rp;
                GraphicsPipeline::create(&self.ctx.device, rp, layout, &self.shaders, &SpirvReflector)
            });
            match rebuilt {
                Ok(p) => self.pipeline = Some(p),
                Err(e) => {
                    fresh.destroy(&self.ctx);
                    self.swapchain = None;
                    return Err(e);
                }
            }
        }

        if let Err(e) = fresh.create_framebuffers(&self.ctx.device, self.render_pass) {
            fresh.destroy(&self.ctx);
            self.swapchain = None;
            return Err(e);
        }
        self.swapchain = Some(fresh);
        Ok(())
    }
}

impl FrameTarget for Gpu {
    fn wait_in_flight(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.sync.in_flight], true, u64::MAX)
                .frame("wait_for_fences")
        }
    }

    fn reset_in_flight(&mut self) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[self.sync.in_flight]).frame("reset_fences") }
    }

    fn acquire(&mut self) -> VkResult<(u32, bool)> {
        let Some(sc) = self.swapchain.as_ref() else {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        };
        unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                sc.handle,
                u64::MAX,
                self.sync.image_available,
                vk::Fence::null(),
            )
        }
    }

    fn update_uniforms(&mut self) -> Result<()> {
        let extent = self.swapchain.as_ref().map(|s| s.extent).unwrap_or_default();
        let aspect = RenderSize { width: extent.width, height: extent.height }.aspect();
        let proj = perspective_vk(self.cfg.fov_deg, aspect, Z_NEAR, Z_FAR);
        let ubo = Ubo::new(self.model, self.view, proj);
        match self.descriptors.as_mut() {
            Some(d) => unsafe { d.write_ubo(&self.ctx, &ubo) },
            None => Ok(()),
        }
    }

    fn record(&mut self, image_index: u32) -> Result<()> {
        unsafe { self.record_commands(image_index) }
    }

    fn submit(&mut self) -> Result<()> {
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.sync.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &self.cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &self.sync.render_finished,
            ..Default::default()
        };
        unsafe {
            self.ctx
                .device
                .queue_submit(
                    self.ctx.graphics_queue,
                    std::slice::from_ref(&submit),
                    self.sync.in_flight,
                )
                .frame("queue_submit")
        }
    }

    fn present(&mut self, image_index: u32) -> VkResult<bool> {
        let Some(sc) = self.swapchain.as_ref() else {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        };
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.sync.render_finished,
            swapchain_count: 1,
            p_swapchains: &sc.handle,
            p_image_indices: &image_index,
            ..Default::default()
        };
        unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.present_queue, &present) }
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        unsafe { self.rebuild_swapchain() }
    }
}

// STRICT TEARDOWN ORDER:
// idle -> meshes -> sync -> pipeline + layout -> descriptors -> framebuffers
// -> render pass -> depth/views/swapchain -> command pool
// then Context::drop: allocator -> device -> surface -> instance
impl Drop for Gpu {
    fn drop(&mut self) {
        self.ctx.wait_idle();
        unsafe {
            if let Some(descriptors) = self.descriptors.as_mut() {
                for (_, mesh) in self.meshes.drain() {
                    mesh.destroy(&self.ctx, descriptors);
                }
            }

            let d = &self.ctx.device;
            d.destroy_fence(self.sync.in_flight, None);
            d.destroy_semaphore(self.sync.render_finished, None);
            d.destroy_semaphore(self.sync.image_available, None);

            if let Some(mut p) = self.pipeline.take() {
                p.destroy(d);
            }
            if let Some(mut desc) = self.descriptors.take() {
                desc.destroy(&self.ctx);
            }
            if let Some(sc) = self.swapchain.as_mut() {
                for fb in sc.framebuffers.drain(..) {
                    d.destroy_framebuffer(fb, None);
                }
            }
            d.destroy_render_pass(self.render_pass, None);
            if let Some(mut sc) = self.swapchain.take() {
                sc.destroy(&self.ctx);
            }
            // frees the frame command buffer with it
            d.destroy_command_pool(self.cmd_pool, None);
        }
        debug!("vk: renderer resources released");
    }
}

/// Vulkan renderer: owns the device, the scene's meshes and the frame loop.
pub struct VkRenderer {
    scheduler: FrameScheduler,
    gpu: Gpu,
}

impl VkRenderer {
    pub fn new<H: Host + ?Sized>(
        host: &H,
        cfg: RenderConfig,
        shaders: ShaderSource,
    ) -> Result<Self> {
        let ctx = unsafe { Context::new(host, cfg.validation)? };
        let mut gpu = Gpu {
            cfg,
            shaders,
            want: host.pixel_size(),
            view: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            cmd_pool: vk::CommandPool::null(),
            cmd: vk::CommandBuffer::null(),
            swapchain: None,
            render_pass: vk::RenderPass::null(),
            descriptors: None,
            pipeline: None,
            sync: SyncObjects::default(),
            meshes: MeshSet::default(),
            font: None,
            ctx,
        };
        unsafe { gpu.init()? };
        info!("vk: renderer ready ({:?} vertices)", gpu.vertex_format());
        Ok(Self { scheduler: FrameScheduler::default(), gpu })
    }

    pub fn has_mesh(&self, kind: MeshKind) -> bool {
        self.gpu.meshes.contains(kind)
    }

    /// No-op when the mesh already exists or the pipeline cannot draw it.
    pub fn create_mesh(&mut self, kind: MeshKind) -> Result<bool> {
        unsafe { self.gpu.create_mesh(kind) }
    }

    pub fn destroy_mesh(&mut self, kind: MeshKind) -> Result<bool> {
        unsafe { self.gpu.destroy_mesh(kind) }
    }

    /// Flips presence of `kind`; returns whether it is present afterwards.
    pub fn toggle_mesh(&mut self, kind: MeshKind) -> Result<bool> {
        if self.has_mesh(kind) {
            self.destroy_mesh(kind)?;
        } else {
            self.create_mesh(kind)?;
        }
        Ok(self.has_mesh(kind))
    }

    /// The surface changed size or state; rebuild before the next acquire.
    pub fn request_recreate(&mut self) {
        self.scheduler.request_recreate();
    }

    pub fn draw_frame(&mut self, size: RenderSize, view: Mat4, model: Mat4) -> Result<FrameStatus> {
        self.gpu.want = size;
        self.gpu.view = view;
        self.gpu.model = model;
        self.scheduler.run(&mut self.gpu, size)
    }

    /// Queue idle, then device idle. Call before tearing down the window.
    pub fn wait_idle(&self) {
        self.gpu.ctx.wait_idle();
    }
}
