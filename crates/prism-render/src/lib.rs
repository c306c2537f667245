// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic pieces shared by the platform layer, the Vulkan core and the app.
pub mod host;
pub mod mesh;
pub mod text;

pub use host::{Host, HostEvent, Key, MouseButton};
pub use mesh::{ColorVertex, MeshKind, TexturedVertex, VertexFormat};
pub use text::{GlyphBitmap, GlyphRasterizer, TextAtlas};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    /// A minimised window reports a zero dimension; nothing can be presented then.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
