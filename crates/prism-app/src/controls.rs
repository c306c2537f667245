// SPDX-License-Identifier: CEPL-1.0
//! Key and mouse bindings. Camera and rotation changes happen here; anything
//! that needs the renderer or the host comes back as a [`Command`].
use prism_math::{Camera, Movement, Spinner};
use prism_render::{HostEvent, Key, MeshKind, MouseButton};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleMesh(MeshKind),
    RelativeMouse(bool),
    SurfaceChanged,
}

#[derive(Debug, Clone, Copy)]
pub struct Controls {
    pub camera: Camera,
    pub spinner: Spinner,
    move_speed: f32,
    sensitivity: f32,
}

impl Controls {
    pub fn new(move_speed: f32, sensitivity: f32, deg_per_sec: f32) -> Self {
        Self {
            camera: Camera::default(),
            spinner: Spinner::new(deg_per_sec),
            move_speed,
            sensitivity,
        }
    }

    /// `captured` is whether relative-mouse mode is active; `dt` is the
    /// current frame delta in seconds.
    pub fn handle(&mut self, event: HostEvent, captured: bool, dt: f32) -> Option<Command> {
        match event {
            HostEvent::Quit => Some(Command::Quit),
            ev if ev.changes_surface() => Some(Command::SurfaceChanged),
            HostEvent::KeyDown(key) => self.key(key, dt),
            HostEvent::MouseButtonDown(MouseButton::Left) => Some(Command::RelativeMouse(true)),
            HostEvent::MouseMotion { xrel, yrel } if captured => {
                self.camera.look(xrel, yrel, self.sensitivity);
                None
            }
            _ => None,
        }
    }

    fn key(&mut self, key: Key, dt: f32) -> Option<Command> {
        let step = self.move_speed * dt;
        match key {
            Key::W => self.camera.translate(Movement::FORWARD, step),
            Key::S => self.camera.translate(Movement::BACK, step),
            Key::A => self.camera.translate(Movement::LEFT, step),
            Key::D => self.camera.translate(Movement::RIGHT, step),
            Key::Escape => return Some(Command::RelativeMouse(false)),
            Key::Tab => self.spinner.toggle(),
            Key::Num1 => self.spinner.reset(),
            Key::Num2 => self.camera.reset(),
            Key::Num4 => return Some(Command::ToggleMesh(MeshKind::Triangle)),
            Key::Num5 => return Some(Command::ToggleMesh(MeshKind::Cube)),
            Key::Num6 => return Some(Command::ToggleMesh(MeshKind::Text)),
            Key::Other => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_math::Vec3;

    fn controls() -> Controls {
        Controls::new(2.5, 0.1, 90.0)
    }

    #[test]
    fn w_moves_along_front_scaled_by_dt() {
        let mut c = controls();
        assert_eq!(c.handle(HostEvent::KeyDown(Key::W), false, 0.4), None);
        assert!(c.camera.pos.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
        c.handle(HostEvent::KeyDown(Key::S), false, 0.4);
        assert!(c.camera.pos.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-5));
    }

    #[test]
    fn a_and_d_strafe() {
        let mut c = controls();
        c.handle(HostEvent::KeyDown(Key::D), false, 1.0);
        assert!(c.camera.pos.abs_diff_eq(Vec3::new(2.5, 0.0, 3.0), 1e-5));
        c.handle(HostEvent::KeyDown(Key::A), false, 2.0);
        assert!(c.camera.pos.abs_diff_eq(Vec3::new(-2.5, 0.0, 3.0), 1e-5));
    }

    #[test]
    fn mesh_keys_toggle() {
        let mut c = controls();
        assert_eq!(
            c.handle(HostEvent::KeyDown(Key::Num4), false, 0.0),
            Some(Command::ToggleMesh(MeshKind::Triangle))
        );
        assert_eq!(
            c.handle(HostEvent::KeyDown(Key::Num5), false, 0.0),
            Some(Command::ToggleMesh(MeshKind::Cube))
        );
        assert_eq!(
            c.handle(HostEvent::KeyDown(Key::Num6), false, 0.0),
            Some(Command::ToggleMesh(MeshKind::Text))
        );
    }

    #[test]
    fn mouse_capture() {
        let mut c = controls();
        assert_eq!(
            c.handle(HostEvent::MouseButtonDown(MouseButton::Left), false, 0.0),
            Some(Command::RelativeMouse(true))
        );
        assert_eq!(c.handle(HostEvent::MouseButtonDown(MouseButton::Right), false, 0.0), None);
        assert_eq!(
            c.handle(HostEvent::KeyDown(Key::Escape), true, 0.0),
            Some(Command::RelativeMouse(false))
        );
    }

    #[test]
    fn motion_only_looks_while_captured() {
        let mut c = controls();
        c.handle(HostEvent::MouseMotion { xrel: 100.0, yrel: 50.0 }, false, 0.0);
        assert_eq!(c.camera, Camera::default());

        c.handle(HostEvent::MouseMotion { xrel: 100.0, yrel: 50.0 }, true, 0.0);
        assert!((c.camera.yaw - -80.0).abs() < 1e-4);
        assert!((c.camera.pitch - -5.0).abs() < 1e-4);
    }

    #[test]
    fn tab_spins_and_one_resets() {
        let mut c = controls();
        c.handle(HostEvent::KeyDown(Key::Tab), false, 0.0);
        c.spinner.advance(1.0);
        assert!((c.spinner.angle_deg() - 90.0).abs() < 1e-4);
        c.handle(HostEvent::KeyDown(Key::Num1), false, 0.0);
        assert_eq!(c.spinner.angle_deg(), 0.0);
    }

    #[test]
    fn two_resets_camera() {
        let mut c = controls();
        c.handle(HostEvent::KeyDown(Key::W), false, 1.0);
        c.handle(HostEvent::MouseMotion { xrel: 10.0, yrel: 10.0 }, true, 0.0);
        c.handle(HostEvent::KeyDown(Key::Num2), false, 0.0);
        assert_eq!(c.camera, Camera::default());
    }

    #[test]
    fn window_changes_and_quit() {
        let mut c = controls();
        for ev in [HostEvent::WindowResized, HostEvent::WindowMaximized, HostEvent::WindowRestored] {
            assert_eq!(c.handle(ev, false, 0.0), Some(Command::SurfaceChanged));
        }
        assert_eq!(c.handle(HostEvent::Quit, false, 0.0), Some(Command::Quit));
    }
}
