// SPDX-License-Identifier: CEPL-1.0
//! `Host` implementation on top of winit.
//!
//! winit pushes events into the application handler; the handler forwards them
//! here and the frame loop later drains them with [`Host::poll_event`].
pub use winit;

use anyhow::{anyhow, Result};
use prism_render::{Host, HostEvent, Key, MouseButton, RenderSize};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, warn};
use winit::{
    event::{DeviceEvent, ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{CursorGrabMode, Window},
};

pub struct WinitHost {
    window: Window,
    events: VecDeque<HostEvent>,
    start: Instant,
    relative_mouse: bool,
    maximized: bool,
}

impl WinitHost {
    pub fn new(window: Window) -> Self {
        let maximized = window.is_maximized();
        Self {
            window,
            events: VecDeque::new(),
            start: Instant::now(),
            relative_mouse: false,
            maximized,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Translates a window event and queues it. Unmapped events are dropped.
    pub fn push_window_event(&mut self, event: &WindowEvent) {
        let mapped = match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => Some(HostEvent::Quit),
            WindowEvent::Resized(_) => Some(self.classify_resize()),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(code) => Some(HostEvent::KeyDown(map_key(code))),
                    PhysicalKey::Unidentified(_) => None,
                }
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button, .. } => {
                Some(HostEvent::MouseButtonDown(map_button(*button)))
            }
            _ => None,
        };
        if let Some(ev) = mapped {
            self.events.push_back(ev);
        }
    }

    /// Raw mouse deltas only matter while the cursor is captured.
    pub fn push_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.relative_mouse {
                self.events.push_back(HostEvent::MouseMotion {
                    xrel: *dx as f32,
                    yrel: *dy as f32,
                });
            }
        }
    }

    fn classify_resize(&mut self) -> HostEvent {
        let now_maximized = self.window.is_maximized();
        let ev = match (self.maximized, now_maximized) {
            (false, true) => HostEvent::WindowMaximized,
            (true, false) => HostEvent::WindowRestored,
            _ => HostEvent::WindowResized,
        };
        self.maximized = now_maximized;
        ev
    }
}

fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::Escape => Key::Escape,
        KeyCode::Tab => Key::Tab,
        KeyCode::Digit1 | KeyCode::Numpad1 => Key::Num1,
        KeyCode::Digit2 | KeyCode::Numpad2 => Key::Num2,
        KeyCode::Digit4 | KeyCode::Numpad4 => Key::Num4,
        KeyCode::Digit5 | KeyCode::Numpad5 => Key::Num5,
        KeyCode::Digit6 | KeyCode::Numpad6 => Key::Num6,
        _ => Key::Other,
    }
}

fn map_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        _ => MouseButton::Other,
    }
}

impl HasWindowHandle for WinitHost {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for WinitHost {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl Host for WinitHost {
    fn pixel_size(&self) -> RenderSize {
        if self.window.is_minimized().unwrap_or(false) {
            return RenderSize { width: 0, height: 0 };
        }
        let size = self.window.inner_size();
        RenderSize { width: size.width, height: size.height }
    }

    fn set_relative_mouse(&mut self, on: bool) -> Result<()> {
        if on == self.relative_mouse {
            return Ok(());
        }
        if on {
            // Locked is not available everywhere (X11); fall back to confining.
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
                .map_err(|e| anyhow!("cursor grab: {e}"))?;
        } else if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            warn!("cursor release failed: {e}");
        }
        self.window.set_cursor_visible(!on);
        self.relative_mouse = on;
        debug!("relative mouse = {on}");
        Ok(())
    }

    fn relative_mouse(&self) -> bool {
        self.relative_mouse
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    fn ticks_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_keys_map_from_both_digit_rows() {
        assert_eq!(map_key(KeyCode::Digit4), Key::Num4);
        assert_eq!(map_key(KeyCode::Numpad4), Key::Num4);
        assert_eq!(map_key(KeyCode::Tab), Key::Tab);
        assert_eq!(map_key(KeyCode::KeyW), Key::W);
        assert_eq!(map_key(KeyCode::Digit3), Key::Other);
    }

    #[test]
    fn buttons_map() {
        assert_eq!(map_button(winit::event::MouseButton::Left), MouseButton::Left);
        assert_eq!(map_button(winit::event::MouseButton::Back), MouseButton::Other);
    }
}
