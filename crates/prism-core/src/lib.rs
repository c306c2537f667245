// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Turns the host's millisecond tick counter into per-frame deltas.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last_ms: u64,
}

impl FrameClock {
    pub fn new(now_ms: u64) -> Self {
        Self { last_ms: now_ms }
    }

    /// Seconds elapsed since the previous call. A counter that went backwards yields 0.
    pub fn tick(&mut self, now_ms: u64) -> f32 {
        let dt_ms = now_ms.saturating_sub(self.last_ms);
        self.last_ms = now_ms;
        dt_ms as f32 / 1000.0
    }
}

/// Counts presented frames and reports roughly once a second.
#[derive(Debug, Clone, Copy)]
pub struct FpsCounter {
    window_start_ms: u64,
    frames: u32,
}

impl FpsCounter {
    pub fn new(now_ms: u64) -> Self {
        Self { window_start_ms: now_ms, frames: 0 }
    }

    pub fn frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Returns the frame count of the finished window once at least a second has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<u32> {
        if now_ms.saturating_sub(self.window_start_ms) < 1000 {
            return None;
        }
        let n = self.frames;
        self.frames = 0;
        self.window_start_ms = now_ms;
        tracing::debug!("fps window closed at {now_ms}ms with {n} frames");
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_reports_seconds_between_ticks() {
        let mut c = FrameClock::new(1_000);
        assert_eq!(c.tick(1_500), 0.5);
        assert_eq!(c.tick(2_500), 1.0);
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut c = FrameClock::new(5_000);
        assert_eq!(c.tick(4_000), 0.0);
        assert_eq!(c.tick(4_250), 0.25);
    }

    #[test]
    fn fps_counter_reports_once_per_second() {
        let mut f = FpsCounter::new(0);
        for _ in 0..30 {
            f.frame();
        }
        assert_eq!(f.poll(999), None);
        assert_eq!(f.poll(1_000), Some(30));
        assert_eq!(f.poll(1_500), None);
    }
}
