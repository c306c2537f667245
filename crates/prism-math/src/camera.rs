// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use glam::{Mat4, Vec3};

bitflags! {
    /// Translation directions relative to the camera's facing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Movement: u8 {
        const FORWARD = 1 << 0;
        const BACK    = 1 << 1;
        const LEFT    = 1 << 2;
        const RIGHT   = 1 << 3;
    }
}

const START_POS: Vec3 = Vec3::new(0.0, 0.0, 3.0);
const START_FRONT: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const START_YAW: f32 = -90.0;
const PITCH_LIMIT: f32 = 89.0;

/// First-person fly camera. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pos: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pos: START_POS,
            front: START_FRONT,
            up: Vec3::Y,
            yaw: START_YAW,
            pitch: 0.0,
        }
    }
}

impl Camera {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves by `distance` along each requested direction.
    pub fn translate(&mut self, dir: Movement, distance: f32) {
        let right = self.front.cross(self.up).normalize_or_zero();
        if dir.contains(Movement::FORWARD) {
            self.pos += self.front * distance;
        }
        if dir.contains(Movement::BACK) {
            self.pos -= self.front * distance;
        }
        if dir.contains(Movement::LEFT) {
            self.pos -= right * distance;
        }
        if dir.contains(Movement::RIGHT) {
            self.pos += right * distance;
        }
    }

    /// Applies relative mouse motion. Moving the cursor down lowers the pitch.
    pub fn look(&mut self, xrel: f32, yrel: f32, sensitivity: f32) {
        self.yaw += xrel * sensitivity;
        self.pitch = (self.pitch - yrel * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.pos, self.pos + self.front, self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_pose() {
        let c = Camera::default();
        assert_eq!(c.pos, Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(c.front, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(c.up, Vec3::Y);
        assert_eq!(c.yaw, -90.0);
        assert_eq!(c.pitch, 0.0);
    }

    #[test]
    fn wasd_moves_along_front_and_right() {
        let mut c = Camera::default();
        c.translate(Movement::FORWARD, 1.0);
        assert!(c.pos.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6));
        c.translate(Movement::RIGHT, 0.5);
        assert!(c.pos.abs_diff_eq(Vec3::new(0.5, 0.0, 2.0), 1e-6));
        c.translate(Movement::LEFT | Movement::BACK, 0.5);
        assert!(c.pos.abs_diff_eq(Vec3::new(0.0, 0.0, 2.5), 1e-6));
    }

    #[test]
    fn cursor_down_lowers_pitch() {
        let mut c = Camera::default();
        c.look(0.0, 100.0, 0.1);
        assert_eq!(c.pitch, -10.0);
        assert!(c.front.y < 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut c = Camera::default();
        c.look(0.0, -10_000.0, 0.1);
        assert_eq!(c.pitch, 89.0);
        c.look(0.0, 10_000.0, 0.1);
        assert_eq!(c.pitch, -89.0);
    }

    #[test]
    fn yaw_turns_front() {
        let mut c = Camera::default();
        c.look(900.0, 0.0, 0.1);
        assert_eq!(c.yaw, 0.0);
        assert!(c.front.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut c = Camera::default();
        c.translate(Movement::FORWARD, 2.0);
        c.look(10.0, 10.0, 0.1);
        c.reset();
        let once = c;
        c.reset();
        assert_eq!(c, once);
        assert_eq!(c, Camera::default());
    }

    #[test]
    fn view_looks_down_negative_z_initially() {
        let c = Camera::default();
        let origin_in_view = c.view().transform_point3(Vec3::ZERO);
        assert!(origin_in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -3.0), 1e-6));
    }
}
