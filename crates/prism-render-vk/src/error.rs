// SPDX-License-Identifier: CEPL-1.0
use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("vulkan loader unavailable: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("{stage} failed: {result}")]
    Init { stage: &'static str, result: vk::Result },

    #[error("no physical device offers graphics + present for this surface")]
    NoSuitableDevice,

    #[error("surface {stage} failed: {reason}")]
    Surface { stage: &'static str, reason: String },

    #[error("swapchain {stage} failed: {result}")]
    Swapchain { stage: &'static str, result: vk::Result },

    #[error("cannot load shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader reflection failed: {0}")]
    Reflection(String),

    #[error("vertex input at location {location} has unsupported type {ty}")]
    UnsupportedShaderInput { location: u32, ty: String },

    #[error("cannot load font {path}: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    #[error("{stage} failed: {result}")]
    Resource { stage: &'static str, result: vk::Result },

    #[error("frame {stage} failed: {result}")]
    Frame { stage: &'static str, result: vk::Result },

    #[error("swapchain is out of date")]
    OutOfDate,

    #[error("swapchain is suboptimal")]
    Suboptimal,
}

impl RenderError {
    /// Only swapchain staleness is recoverable; it routes to recreation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::OutOfDate | RenderError::Suboptimal)
    }
}

/// Tags a raw Vulkan failure with the error kind of the call site.
pub(crate) trait VkResultExt<T> {
    fn init(self, stage: &'static str) -> Result<T>;
    fn surface(self, stage: &'static str) -> Result<T>;
    fn swapchain(self, stage: &'static str) -> Result<T>;
    fn resource(self, stage: &'static str) -> Result<T>;
    fn frame(self, stage: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn init(self, stage: &'static str) -> Result<T> {
        self.map_err(|result| RenderError::Init { stage, result })
    }

    fn surface(self, stage: &'static str) -> Result<T> {
        self.map_err(|result| RenderError::Surface { stage, reason: result.to_string() })
    }

    fn swapchain(self, stage: &'static str) -> Result<T> {
        self.map_err(|result| match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => RenderError::OutOfDate,
            result => RenderError::Swapchain { stage, result },
        })
    }

    fn resource(self, stage: &'static str) -> Result<T> {
        self.map_err(|result| RenderError::Resource { stage, result })
    }

    fn frame(self, stage: &'static str) -> Result<T> {
        self.map_err(|result| RenderError::Frame { stage, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_staleness_is_recoverable() {
        assert!(!RenderError::OutOfDate.is_fatal());
        assert!(!RenderError::Suboptimal.is_fatal());
        assert!(RenderError::NoSuitableDevice.is_fatal());
        assert!(RenderError::Frame { stage: "queue_submit", result: vk::Result::ERROR_DEVICE_LOST }
            .is_fatal());
    }

    #[test]
    fn swapchain_tag_keeps_out_of_date_recoverable() {
        let r: VkResult<()> = Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert!(matches!(r.swapchain("create_swapchain"), Err(RenderError::OutOfDate)));
        let r: VkResult<()> = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(matches!(
            r.swapchain("create_swapchain"),
            Err(RenderError::Swapchain { stage: "create_swapchain", .. })
        ));
    }

    #[test]
    fn messages_name_the_stage() {
        let r: VkResult<()> = Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        let msg = r.init("create_instance").unwrap_err().to_string();
        assert!(msg.starts_with("create_instance failed"), "{msg}");
    }
}
