// SPDX-License-Identifier: CEPL-1.0
use glam::Mat4;

/// Yaw rotation applied to every mesh's model matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spinner {
    pub enabled: bool,
    angle_deg: f32,
    deg_per_sec: f32,
}

impl Spinner {
    pub fn new(deg_per_sec: f32) -> Self {
        Self { enabled: false, angle_deg: 0.0, deg_per_sec }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn reset(&mut self) {
        self.angle_deg = 0.0;
    }

    pub fn angle_deg(&self) -> f32 {
        self.angle_deg
    }

    /// Advances the angle when enabled, wrapping into [0, 360).
    pub fn advance(&mut self, dt_seconds: f32) {
        if self.enabled {
            self.angle_deg = (self.angle_deg + self.deg_per_sec * dt_seconds).rem_euclid(360.0);
        }
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_rotation_y(self.angle_deg.to_radians())
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new(90.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_spinner_holds_still() {
        let mut s = Spinner::default();
        s.advance(3.0);
        assert_eq!(s.angle_deg(), 0.0);
    }

    #[test]
    fn quarter_turn_per_second_and_wraps() {
        let mut s = Spinner::default();
        s.toggle();
        s.advance(1.0);
        assert_eq!(s.angle_deg(), 90.0);

        let mut s = Spinner::default();
        s.toggle();
        s.advance(4.0);
        assert_eq!(s.angle_deg(), 0.0);
    }

    #[test]
    fn reset_zeroes_angle_but_keeps_toggle() {
        let mut s = Spinner::default();
        s.toggle();
        s.advance(0.5);
        s.reset();
        assert_eq!(s.angle_deg(), 0.0);
        assert!(s.enabled);
    }

    #[test]
    fn model_rotates_about_y() {
        let mut s = Spinner::default();
        s.toggle();
        s.advance(1.0);
        let x = s.model().transform_vector3(glam::Vec3::X);
        assert!(x.abs_diff_eq(glam::Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }
}
