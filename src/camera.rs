//! Camera, projection and damped orbit controls.
//!
//! Input handlers only accumulate orbit and zoom deltas in [`OrbitControls`].
//! The camera itself is moved in [`CameraState::update`], which the render
//! loop calls once per tick.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, Vector4, perspective};

use crate::{config::CameraSettings, data_structures::bounds::Ray};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Keeps the polar angle away from the poles where `look_at` degenerates.
const POLAR_EPSILON: f32 = 1e-3;
/// Radians per pixel of pointer travel at `rotate_speed == 1`, relative to the viewport height.
const ROTATE_PER_VIEWPORT: f32 = 2.0 * PI;
/// Deltas below this are considered settled.
const SETTLED: f32 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Orbit around the camera target with exponentially damped motion.
///
/// Every `update` applies `damping_factor` of the pending delta and keeps the
/// rest for the following frames, so a single drag keeps easing out.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitControls {
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Largest angle from straight up; keeps the camera above the floor.
    pub max_polar_angle: f32,
    theta_delta: f32,
    phi_delta: f32,
    /// Pending zoom as a log-scale factor on the orbit radius.
    zoom_delta: f32,
}

impl OrbitControls {
    pub fn new(settings: &CameraSettings) -> Self {
        let damping_factor = if settings.damping_factor > 0.0 && settings.damping_factor <= 1.0 {
            settings.damping_factor
        } else {
            log::warn!(
                "damping factor {} is outside (0, 1], disabling damping",
                settings.damping_factor
            );
            1.0
        };
        Self {
            damping_factor,
            rotate_speed: settings.rotate_speed,
            zoom_speed: settings.zoom_speed,
            min_distance: settings.min_distance,
            max_distance: settings.max_distance.max(settings.min_distance),
            max_polar_angle: PI / 2.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            zoom_delta: 0.0,
        }
    }

    /// Queue an orbit from a pointer drag of `(dx, dy)` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        self.theta_delta -= ROTATE_PER_VIEWPORT * dx / height * self.rotate_speed;
        self.phi_delta -= ROTATE_PER_VIEWPORT * dy / height * self.rotate_speed;
    }

    /// Queue a zoom; positive `steps` move the camera towards the target.
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_delta -= steps * 0.05 * self.zoom_speed;
    }

    pub fn is_settled(&self) -> bool {
        self.theta_delta.abs() < SETTLED
            && self.phi_delta.abs() < SETTLED
            && self.zoom_delta.abs() < SETTLED
    }

    /// Advance the damped motion by one frame.
    pub fn update(&mut self, camera: &mut Camera) {
        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        if radius <= f32::EPSILON {
            return;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let k = self.damping_factor;
        theta += self.theta_delta * k;
        phi += self.phi_delta * k;
        phi = phi.clamp(POLAR_EPSILON, self.max_polar_angle.min(PI - POLAR_EPSILON));
        let radius = (radius * (self.zoom_delta * k).exp()).clamp(self.min_distance, self.max_distance);

        camera.position = camera.target
            + Vector3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );

        let keep = 1.0 - k;
        self.theta_delta *= keep;
        self.phi_delta *= keep;
        self.zoom_delta *= keep;
        if self.is_settled() {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.zoom_delta = 0.0;
        }
    }
}

/// Everything the render loop needs to place the viewer.
#[derive(Clone, Debug)]
pub struct CameraState {
    pub camera: Camera,
    pub projection: Projection,
    pub controls: OrbitControls,
}

impl CameraState {
    pub fn new(settings: &CameraSettings, width: u32, height: u32) -> Self {
        Self {
            camera: Camera::new(settings.position, settings.target),
            projection: Projection::new(
                width,
                height,
                cgmath::Deg(settings.fovy_degrees),
                settings.znear,
                settings.zfar,
            ),
            controls: OrbitControls::new(settings),
        }
    }

    /// The per-frame control step; the only place the camera moves.
    pub fn update(&mut self) {
        self.controls.update(&mut self.camera);
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.calc_matrix()
    }

    /// World-space ray through a normalized device coordinate.
    pub fn ray_from_ndc(&self, ndc_x: f32, ndc_y: f32) -> Option<Ray> {
        let inv = self.view_proj().invert()?;
        let near = inv * Vector4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = inv * Vector4::new(ndc_x, ndc_y, 1.0, 1.0);
        if near.w.abs() <= f32::EPSILON || far.w.abs() <= f32::EPSILON {
            return None;
        }
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        let direction = far - near;
        if direction.magnitude2() <= f32::EPSILON {
            return None;
        }
        Some(Ray::new(near, direction))
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, state: &CameraState) {
        self.view_position = state.camera.position.to_homogeneous().into();
        self.view_proj = state.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}
