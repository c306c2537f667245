// SPDX-License-Identifier: CEPL-1.0
mod camera;
mod spin;

pub use camera::{Camera, Movement};
pub use glam::{Mat4, Vec2, Vec3};
pub use spin::Spinner;

/// Right-handed perspective with 0..1 depth and the Y axis flipped for Vulkan's
/// downward-Y clip space.
pub fn perspective_vk(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(fov_y_deg.to_radians(), aspect, near, far);
    proj.y_axis.y *= -1.0;
    proj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_flips_only_y() {
        let gl = Mat4::perspective_rh(45f32.to_radians(), 4.0 / 3.0, 0.1, 10.0);
        let vk = perspective_vk(45.0, 4.0 / 3.0, 0.1, 10.0);
        assert_eq!(vk.y_axis.y, -gl.y_axis.y);
        assert_eq!(vk.x_axis, gl.x_axis);
        assert_eq!(vk.z_axis, gl.z_axis);
        assert_eq!(vk.w_axis, gl.w_axis);
    }

    #[test]
    fn point_above_camera_lands_in_upper_half_of_vulkan_clip_space() {
        let proj = perspective_vk(45.0, 1.0, 0.1, 10.0);
        let clip = proj * glam::Vec4::new(0.0, 1.0, -3.0, 1.0);
        assert!(clip.y / clip.w < 0.0, "Vulkan clip space grows downwards");
    }
}
