// orbit.rs — 拖拽轨道控制器
//
// 相机固定在球心，只改变朝向。内部保存的是 offset 向量（相机"背后"方向，
// 即 −forward）的球坐标，与 three.js OrbitControls 的约定一致。

use crate::camera::{Camera, Viewport};
use crate::math::{clamp_polar, offset_rotation, wrap_angle, Look, Spherical, SphericalDelta};
use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSettings {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    /// 弧度
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.2,
            rotate_speed: 1.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrbitController {
    settings: OrbitSettings,
    spherical: Spherical,
    default_spherical: Spherical,
    // 拖拽产生、尚未消化的增量
    pending: SphericalDelta,
    last_pointer: Option<Vec2>,
}

impl OrbitController {
    pub fn new(settings: OrbitSettings, default_look: Look) -> Self {
        let default_spherical = offset_spherical(default_look);
        let mut control = Self {
            settings,
            spherical: default_spherical,
            default_spherical,
            pending: SphericalDelta::ZERO,
            last_pointer: None,
        };
        control.constrain();
        control.default_spherical = control.spherical;
        control
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn set_rotate_speed(&mut self, speed: f32) {
        self.settings.rotate_speed = speed;
    }

    /// 推进一帧：先叠加外部增量（陀螺仪），再按阻尼消化拖拽增量，最后写回相机朝向
    pub fn update(&mut self, camera: &mut Camera, external: Option<SphericalDelta>) {
        if let Some(delta) = external {
            self.spherical.theta += delta.theta;
            self.spherical.phi += delta.phi;
        }

        let factor = if self.settings.enable_damping {
            self.settings.damping_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };

        self.spherical.theta += self.pending.theta * factor;
        self.spherical.phi += self.pending.phi * factor;
        self.constrain();

        if self.settings.enable_damping {
            self.pending = self.pending.scaled(1.0 - factor);
        } else {
            self.pending = SphericalDelta::ZERO;
        }

        camera.set_orientation(offset_rotation(self.spherical));
    }

    /// 视线向左转 angle（弧度），立即生效
    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical.theta += angle;
        self.constrain();
    }

    /// 视线向上抬 angle（弧度），立即生效
    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical.phi += angle;
        self.constrain();
    }

    pub fn reset(&mut self) {
        self.spherical = self.default_spherical;
        self.pending = SphericalDelta::ZERO;
        self.last_pointer = None;
    }

    /// reset 后转到给定经纬度
    pub fn set_look(&mut self, look: Look) {
        self.reset();
        let target = offset_spherical(look);
        self.rotate_left(wrap_angle(target.theta - self.spherical.theta));
        self.rotate_up(target.phi - self.spherical.phi);
    }

    pub fn look(&self) -> Look {
        Look::from_direction(self.forward())
    }

    pub fn azimuthal_angle(&self) -> f32 {
        self.spherical.theta
    }

    pub fn polar_angle(&self) -> f32 {
        self.spherical.phi
    }

    pub fn forward(&self) -> Vec3 {
        -self.spherical.to_vector()
    }

    pub fn begin_drag(&mut self, position: Vec2) {
        self.last_pointer = Some(position);
    }

    /// 拖动一像素，画面跟随移动一像素
    pub fn drag_to(&mut self, position: Vec2, camera: &Camera, viewport: Viewport) {
        let Some(last) = self.last_pointer.replace(position) else {
            return;
        };
        if viewport.is_empty() {
            return;
        }

        let delta = position - last;
        let v_fov = camera.fov().to_radians();
        let h_fov = 2.0 * ((v_fov / 2.0).tan() * camera.aspect()).atan();

        let speed = self.settings.rotate_speed;
        self.pending.theta += delta.x * (h_fov / viewport.width as f32) * speed;
        self.pending.phi += delta.y * (v_fov / viewport.height as f32) * speed;
    }

    pub fn end_drag(&mut self) {
        self.last_pointer = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last_pointer.is_some()
    }

    fn constrain(&mut self) {
        let min = self.settings.min_polar_angle.max(0.0);
        let max = self.settings.max_polar_angle.min(PI).max(min);
        self.spherical.phi = clamp_polar(self.spherical.phi.clamp(min, max));
        self.spherical.theta = wrap_angle(self.spherical.theta);
    }
}

// 视线方向 look 对应的 offset 球坐标
fn offset_spherical(look: Look) -> Spherical {
    Spherical::new(
        1.0,
        FRAC_PI_2 + look.lat.to_radians(),
        wrap_angle(look.lng.to_radians() + PI),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    fn camera() -> Camera {
        Camera::new(80.0, 1.5, 0.1, 10_000.0)
    }

    fn undamped() -> OrbitSettings {
        OrbitSettings {
            enable_damping: true,
            damping_factor: 1.0,
            ..OrbitSettings::default()
        }
    }

    #[test]
    fn default_look_faces_positive_z() {
        let mut cam = camera();
        let mut orbit = OrbitController::new(OrbitSettings::default(), Look::default());
        orbit.update(&mut cam, None);
        assert!((cam.forward() - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn external_delta_equals_direct_target_without_smoothing() {
        let mut cam_a = camera();
        let mut a = OrbitController::new(undamped(), Look::new(20.0, 10.0));
        let delta = SphericalDelta::new(0.35, -0.2);
        let expected_theta = wrap_angle(a.azimuthal_angle() + delta.theta);
        let expected_phi = a.polar_angle() + delta.phi;

        a.update(&mut cam_a, Some(delta));
        assert!(approx_eq(a.azimuthal_angle(), expected_theta, 1e-6));
        assert!(approx_eq(a.polar_angle(), expected_phi, 1e-6));

        let mut cam_b = camera();
        let mut b = OrbitController::new(undamped(), Look::new(20.0, 10.0));
        b.rotate_left(delta.theta);
        b.rotate_up(delta.phi);
        b.update(&mut cam_b, None);
        assert!((cam_a.forward() - cam_b.forward()).length() < 1e-5);
    }

    #[test]
    fn polar_angle_never_reaches_the_poles() {
        let mut cam = camera();
        let mut orbit = OrbitController::new(OrbitSettings::default(), Look::default());
        for i in 0..200 {
            let step = if i % 2 == 0 { 10.0 } else { -25.0 };
            orbit.update(&mut cam, Some(SphericalDelta::new(0.1, step)));
            let phi = orbit.polar_angle();
            assert!(phi > 0.0 && phi < PI, "phi = {phi}");
            orbit.rotate_up(-step * 3.0);
            let phi = orbit.polar_angle();
            assert!(phi > 0.0 && phi < PI, "phi = {phi}");
        }
    }

    #[test]
    fn azimuth_wraps() {
        let mut cam = camera();
        let mut orbit = OrbitController::new(undamped(), Look::default());
        for _ in 0..40 {
            orbit.update(&mut cam, Some(SphericalDelta::new(1.3, 0.0)));
            let theta = orbit.azimuthal_angle();
            assert!(theta > -PI && theta <= PI);
        }
    }

    #[test]
    fn damping_converges_on_the_full_drag() {
        let mut cam = camera();
        let viewport = Viewport::new(800, 600);
        let mut orbit = OrbitController::new(OrbitSettings::default(), Look::default());
        let start = orbit.azimuthal_angle();

        orbit.begin_drag(Vec2::new(100.0, 300.0));
        orbit.drag_to(Vec2::new(140.0, 300.0), &cam, viewport);
        orbit.end_drag();

        orbit.update(&mut cam, None);
        let first = wrap_angle(orbit.azimuthal_angle() - start);
        for _ in 0..200 {
            orbit.update(&mut cam, None);
        }
        let total = wrap_angle(orbit.azimuthal_angle() - start);

        let v_fov = cam.fov().to_radians();
        let h_fov = 2.0 * ((v_fov / 2.0).tan() * cam.aspect()).atan();
        let expected = 40.0 * h_fov / 800.0;
        assert!(first > 0.0 && first < total);
        assert!(approx_eq(total, expected, 1e-4));
    }

    #[test]
    fn set_look_and_reset() {
        let mut cam = camera();
        let mut orbit = OrbitController::new(undamped(), Look::new(0.0, 0.0));
        orbit.set_look(Look::new(90.0, 45.0));
        orbit.update(&mut cam, None);

        let look = orbit.look();
        assert!(approx_eq(look.lng, 90.0, 1e-3));
        assert!(approx_eq(look.lat, 45.0, 1e-3));
        assert!((cam.forward() - Look::new(90.0, 45.0).to_direction()).length() < 1e-4);

        orbit.reset();
        orbit.update(&mut cam, None);
        assert!(approx_eq(orbit.look().lng, 0.0, 1e-3));
    }

    #[test]
    fn roll_follows_azimuth_at_the_zenith() {
        let mut cam = camera();
        let mut orbit = OrbitController::new(undamped(), Look::default());
        for lng in [0.0f32, 90.0, 180.0] {
            let expected = Look::new(lng - 90.0, 0.0).to_direction();
            for lat in [89.9, 90.0] {
                orbit.set_look(Look::new(lng, lat));
                orbit.update(&mut cam, None);
                assert!(cam.forward().y > 0.999);
                assert!(
                    (cam.right() - expected).length() < 1e-2,
                    "lng {lng} lat {lat}: right {}",
                    cam.right()
                );
            }
        }
    }
}
