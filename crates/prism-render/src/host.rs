// SPDX-License-Identifier: CEPL-1.0
//! The window/input host contract consumed by the renderer and the app.
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::RenderSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Escape,
    Tab,
    Num1,
    Num2,
    Num4,
    Num5,
    Num6,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostEvent {
    Quit,
    KeyDown(Key),
    MouseButtonDown(MouseButton),
    MouseMotion { xrel: f32, yrel: f32 },
    WindowResized,
    WindowMaximized,
    WindowRestored,
}

impl HostEvent {
    /// Events after which the surface extent may have changed.
    pub fn changes_surface(&self) -> bool {
        matches!(
            self,
            HostEvent::WindowResized | HostEvent::WindowMaximized | HostEvent::WindowRestored
        )
    }
}

/// A window plus its event source.
///
/// The raw handles are what the Vulkan side needs to derive the required
/// instance extensions and to create a surface.
pub trait Host: HasWindowHandle + HasDisplayHandle {
    /// Drawable size in physical pixels; zero in either dimension when minimised.
    fn pixel_size(&self) -> RenderSize;
    fn set_relative_mouse(&mut self, on: bool) -> Result<()>;
    fn relative_mouse(&self) -> bool;
    fn poll_event(&mut self) -> Option<HostEvent>;
    fn ticks_ms(&self) -> u64;
}
