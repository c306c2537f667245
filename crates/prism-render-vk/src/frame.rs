// SPDX-License-Identifier: CEPL-1.0
//! Per-frame protocol: wait, acquire, record, submit, present, and when to
//! rebuild the swapchain.
use crate::error::{RenderError, Result};
use ash::prelude::VkResult;
use ash::vk;
use prism_render::RenderSize;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Acquired {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Presented {
    Fine,
    Stale,
}

pub(crate) fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<Acquired> {
    match result {
        Ok((index, suboptimal)) => Ok(Acquired::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
        Err(result) => Err(RenderError::Frame { stage: "acquire_next_image", result }),
    }
}

/// ash reports SUBOPTIMAL as `Ok(true)`; the raw code is accepted too.
pub(crate) fn classify_present(result: VkResult<bool>) -> Result<Presented> {
    match result {
        Ok(false) => Ok(Presented::Fine),
        Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            Ok(Presented::Stale)
        }
        Err(result) => Err(RenderError::Frame { stage: "queue_present", result }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// Zero-sized surface, or a rebuild that has to wait for a usable size.
    Skipped,
    /// Acquire said the swapchain is stale; it was rebuilt and nothing was drawn.
    Recreated,
    Presented { image_index: u32 },
}

/// The GPU-side steps of one frame, in the order the scheduler calls them.
pub trait FrameTarget {
    fn wait_in_flight(&mut self) -> Result<()>;
    fn reset_in_flight(&mut self) -> Result<()>;
    fn acquire(&mut self) -> VkResult<(u32, bool)>;
    fn update_uniforms(&mut self) -> Result<()>;
    fn record(&mut self, image_index: u32) -> Result<()>;
    fn submit(&mut self) -> Result<()>;
    fn present(&mut self, image_index: u32) -> VkResult<bool>;
    /// Idle the device once, then rebuild everything sized by the swapchain.
    fn recreate_swapchain(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    recreate_pending: bool,
}

impl FrameScheduler {
    pub fn request_recreate(&mut self) {
        self.recreate_pending = true;
    }

    pub fn recreate_pending(&self) -> bool {
        self.recreate_pending
    }

    // STRICT PER-FRAME ORDER:
    // 1) pending rebuild (resize, suboptimal, stale present) happens before anything else
    // 2) wait the in-flight fence
    // 3) acquire; OUT_OF_DATE rebuilds and ends the frame with the fence still signaled
    // 4) reset the fence only now that a submit is guaranteed to follow
    // 5) uniforms, record, submit (signals the fence), present
    pub fn run<T: FrameTarget>(&mut self, target: &mut T, size: RenderSize) -> Result<FrameStatus> {
        if size.is_empty() {
            return Ok(FrameStatus::Skipped);
        }

        if self.recreate_pending {
            match target.recreate_swapchain() {
                Ok(()) => self.recreate_pending = false,
                Err(e) if !e.is_fatal() => {
                    debug!("frame: rebuild deferred: {e}");
                    return Ok(FrameStatus::Skipped);
                }
                Err(e) => return Err(e),
            }
        }

        target.wait_in_flight()?;

        let image_index = match classify_acquire(target.acquire())? {
            Acquired::OutOfDate => {
                debug!("frame: acquire out of date, rebuilding");
                return match target.recreate_swapchain() {
                    Ok(()) => Ok(FrameStatus::Recreated),
                    Err(e) if !e.is_fatal() => {
                        self.recreate_pending = true;
                        Ok(FrameStatus::Skipped)
                    }
                    Err(e) => Err(e),
                };
            }
            Acquired::Image { index, suboptimal } => {
                if suboptimal {
                    // the acquired image is still valid; draw it, rebuild next frame
                    self.recreate_pending = true;
                }
                index
            }
        };

        target.reset_in_flight()?;
        target.update_uniforms()?;
        target.record(image_index)?;
        target.submit()?;

        if classify_present(target.present(image_index))? == Presented::Stale {
            warn!("frame: present reported a stale swapchain, rebuilding next frame");
            self.recreate_pending = true;
        }
        Ok(FrameStatus::Presented { image_index })
    }
}
