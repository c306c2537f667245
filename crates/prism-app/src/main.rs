// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod controls;

use anyhow::{Context as _, Result};
use clap::Parser;
use config::{load_cfg, AppCfg};
use controls::{Command, Controls};
use prism_core::{init_tracing, FpsCounter, FrameClock};
use prism_platform::WinitHost;
use prism_render::Host;
use prism_render_vk::{FrameStatus, ShaderSource, VkRenderer};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use prism_platform::winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

const MINIMIZED_SLEEP: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to read instead of ./prism.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

struct App {
    cfg: AppCfg,
    base_dir: PathBuf,
    // STRICT ORDER: the renderer goes before the window it presents to
    renderer: Option<VkRenderer>,
    host: Option<WinitHost>,
    controls: Controls,
    clock: FrameClock,
    fps: FpsCounter,
    failed: bool,
    exiting: bool,
}

impl App {
    fn new(cfg: AppCfg, base_dir: PathBuf) -> Self {
        let controls = Controls::new(
            cfg.camera.move_speed,
            cfg.camera.mouse_sensitivity,
            cfg.scene.rotation_deg_per_sec,
        );
        Self {
            cfg,
            base_dir,
            renderer: None,
            host: None,
            controls,
            clock: FrameClock::new(0),
            fps: FpsCounter::new(0),
            failed: false,
            exiting: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(LogicalSize::new(self.cfg.window.width, self.cfg.window.height));
        let window = event_loop.create_window(attrs).context("create window")?;
        let host = WinitHost::new(window);

        let (vert, frag) = self.cfg.shader_paths(&self.base_dir);
        let shaders = ShaderSource::load(&vert, &frag)?;
        let mut renderer = VkRenderer::new(&host, self.cfg.render_config(&self.base_dir), shaders)
            .context("vulkan init")?;

        for kind in self.cfg.scene.initial_kinds() {
            renderer
                .create_mesh(kind)
                .with_context(|| format!("initial mesh {kind}"))?;
        }

        let now = host.ticks_ms();
        self.clock = FrameClock::new(now);
        self.fps = FpsCounter::new(now);
        self.host = Some(host);
        self.renderer = Some(renderer);
        Ok(())
    }

    /// Drains input, then draws one frame. Returns false once a quit was seen.
    fn step(&mut self) -> Result<bool> {
        let (Some(host), Some(renderer)) = (self.host.as_mut(), self.renderer.as_mut()) else {
            return Ok(true);
        };
        let now = host.ticks_ms();
        let dt = self.clock.tick(now);

        while let Some(event) = host.poll_event() {
            let captured = host.relative_mouse();
            match self.controls.handle(event, captured, dt) {
                Some(Command::Quit) => return Ok(false),
                Some(Command::ToggleMesh(kind)) => {
                    let present = renderer.toggle_mesh(kind)?;
                    info!("{kind} mesh {}", if present { "on" } else { "off" });
                }
                Some(Command::RelativeMouse(on)) => {
                    if let Err(e) = host.set_relative_mouse(on) {
                        warn!("relative mouse: {e:#}");
                    }
                }
                Some(Command::SurfaceChanged) => renderer.request_recreate(),
                None => {}
            }
        }

        self.controls.spinner.advance(dt);
        let status = renderer.draw_frame(
            host.pixel_size(),
            self.controls.camera.view(),
            self.controls.spinner.model(),
        )?;
        match status {
            FrameStatus::Presented { .. } => self.fps.frame(),
            FrameStatus::Recreated => {}
            FrameStatus::Skipped => std::thread::sleep(MINIMIZED_SLEEP),
        }
        if let Some(n) = self.fps.poll(now) {
            info!("fps ~ {n}");
        }
        Ok(true)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failed = true;
        self.exiting = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.host.is_none() && !self.exiting {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
            info!("resumed");
        }
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(host) = self.host.as_mut() {
            if window_id == host.window().id() {
                host.push_window_event(&event);
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let Some(host) = self.host.as_mut() {
            host.push_device_event(&event);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        match self.step() {
            Ok(true) => {}
            Ok(false) => {
                info!("quit requested");
                self.exiting = true;
                event_loop.exit();
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // STRICT ORDER: GPU idle, renderer teardown, then the window
        if let Some(renderer) = self.renderer.take() {
            renderer.wait_idle();
            drop(renderer);
        }
        self.host = None;
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn run(args: Args) -> Result<bool> {
    let cfg_path = args.config.unwrap_or_else(|| PathBuf::from("prism.toml"));
    let cfg = load_cfg(&cfg_path);
    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, exe_dir());
    event_loop.run_app(&mut app)?;
    Ok(!app.failed)
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
