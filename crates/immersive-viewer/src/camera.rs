use crate::pose::PoseSample;
use glam::Mat4;
use winit::event::{ElementState, MouseButton, WindowEvent};

/// Pitch stays just short of the poles so the view never flips.
const PITCH_LIMIT_RAD: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Head orientation at the centre of the projection sphere.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadCamera {
    /// Rotation about +Y (radians). Zero looks down -Z.
    pub yaw_rad: f32,
    /// Rotation about the camera's X axis (radians), positive looks up.
    pub pitch_rad: f32,
}

impl HeadCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation-only view matrix; the viewer never leaves the origin.
    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_x(-self.pitch_rad) * Mat4::from_rotation_y(-self.yaw_rad)
    }

    /// Current orientation as a pose sample in degrees.
    pub fn pose(&self) -> PoseSample {
        PoseSample::new(self.yaw_rad.to_degrees(), self.pitch_rad.to_degrees())
    }

    fn look(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw_rad = (self.yaw_rad + d_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch_rad = (self.pitch_rad + d_pitch).clamp(-PITCH_LIMIT_RAD, PITCH_LIMIT_RAD);
    }
}

pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
    sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController {
    /// Creates a new controller with default state.
    pub fn new() -> Self {
        Self {
            mouse_down: false,
            last_mouse: None,
            sensitivity: 0.005,
        }
    }

    /// Handles window events and updates the camera. Returns `true` when the
    /// orientation changed.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut HeadCamera) -> bool {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_drag((position.x, position.y), camera)
            }
            _ => false,
        }
    }

    /// Drags the scene with the cursor while the left mouse button is held.
    fn handle_cursor_drag(&mut self, xy: (f64, f64), camera: &mut HeadCamera) -> bool {
        let moved = match self.last_mouse {
            Some(last) if self.mouse_down => {
                let dx = (xy.0 - last.0) as f32 * self.sensitivity;
                let dy = (xy.1 - last.1) as f32 * self.sensitivity;
                camera.look(dx, dy);
                dx != 0.0 || dy != 0.0
            }
            _ => false,
        };
        self.last_mouse = Some(xy);
        moved
    }
}
