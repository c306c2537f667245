// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device bootstrap, swapchain lifecycle, reflection-driven
//! pipeline, mesh resources and the per-frame protocol.
mod context;
mod descriptors;
mod error;
mod frame;
mod meshes;
mod pipeline;
mod reflect;
mod renderer;
mod resources;
mod swapchain;

pub use error::{RenderError, Result};
pub use frame::{FrameScheduler, FrameStatus, FrameTarget};
pub use pipeline::ShaderSource;
pub use reflect::{SpirvReflector, VertexLayout, VertexReflector};
pub use renderer::{RenderConfig, VkRenderer};
