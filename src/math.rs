// math.rs — 球坐标 / 四元数工具
//
// 约定：右手系，+Y 向上。
// Spherical: phi 为与 +Y 的夹角 [0, π]，theta = atan2(x, z) ∈ (−π, π]

use glam::{EulerRot, Mat3, Quat, Vec3};
use serde::Deserialize;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// 极角与两极之间保留的最小间距
pub const POLE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Default for Spherical {
    fn default() -> Self {
        Self {
            radius: 1.0,
            phi: 0.0,
            theta: 0.0,
        }
    }
}

impl Spherical {
    pub fn new(radius: f32, phi: f32, theta: f32) -> Self {
        Self { radius, phi, theta }
    }

    pub fn from_vector(v: Vec3) -> Self {
        let radius = v.length();
        if radius == 0.0 {
            return Self::new(0.0, 0.0, 0.0);
        }

        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_vector(&self) -> Vec3 {
        let sin_phi_r = self.radius * self.phi.sin();
        Vec3::new(
            sin_phi_r * self.theta.sin(),
            self.radius * self.phi.cos(),
            sin_phi_r * self.theta.cos(),
        )
    }

    /// 极角夹到 (ε, π−ε)，方位角回绕到 (−π, π]
    pub fn make_safe(mut self) -> Self {
        self.phi = clamp_polar(self.phi);
        self.theta = wrap_angle(self.theta);
        self
    }
}

/// 两次采样之间的球坐标增量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SphericalDelta {
    pub theta: f32,
    pub phi: f32,
}

impl SphericalDelta {
    pub const ZERO: Self = Self {
        theta: 0.0,
        phi: 0.0,
    };

    pub fn new(theta: f32, phi: f32) -> Self {
        Self { theta, phi }
    }

    pub fn is_zero(&self) -> bool {
        self.theta == 0.0 && self.phi == 0.0
    }

    pub fn scaled(self, k: f32) -> Self {
        Self::new(self.theta * k, self.phi * k)
    }
}

impl std::ops::AddAssign for SphericalDelta {
    fn add_assign(&mut self, rhs: Self) {
        self.theta += rhs.theta;
        self.phi += rhs.phi;
    }
}

pub fn clamp_polar(phi: f32) -> f32 {
    phi.clamp(POLE_EPSILON, PI - POLE_EPSILON)
}

/// 回绕到 (−π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let a = (angle + PI).rem_euclid(TAU) - PI;
    if a <= -PI {
        a + TAU
    } else {
        a
    }
}

/// 经纬度（度）。lng 为视线方位角，lat 为地平线以上仰角 [−90, 90]
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Look {
    pub lng: f32,
    pub lat: f32,
}

impl Look {
    pub fn new(lng: f32, lat: f32) -> Self {
        Self { lng, lat }
    }

    pub fn to_direction(self) -> Vec3 {
        Spherical::new(1.0, FRAC_PI_2 - self.lat.to_radians(), self.lng.to_radians()).to_vector()
    }

    pub fn from_direction(direction: Vec3) -> Self {
        let s = Spherical::from_vector(direction);
        Self {
            lng: s.theta.to_degrees(),
            lat: 90.0 - s.phi.to_degrees(),
        }
    }
}

/// 内旋 Y-X'-Z''（three.js 的 'YXZ' 顺序），参数按 x, y, z 轴给出
pub fn quat_from_euler_yxz(x: f32, y: f32, z: f32) -> Quat {
    Quat::from_euler(EulerRot::YXZ, y, x, z)
}

pub fn quat_from_axis_angle(axis: Vec3, angle: f32) -> Quat {
    Quat::from_axis_angle(axis.normalize_or_zero(), angle)
}

/// 让局部 −Z 指向 forward 的旋转，up 用来确定滚转
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let z = -forward.normalize_or_zero();
    if z == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let x = up.cross(z);
    let x = if x.length_squared() < 1e-12 {
        z.any_orthonormal_vector()
    } else {
        x.normalize()
    };
    let y = z.cross(x);

    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}

/// offset 球坐标对应的相机朝向：先绕 X 抬头，再绕 Y 转向。
/// 直接由角度构造，极点附近滚转随方位角连续变化
pub fn offset_rotation(offset: Spherical) -> Quat {
    Quat::from_rotation_y(offset.theta) * Quat::from_rotation_x(offset.phi - FRAC_PI_2)
}

#[cfg(test)]
pub(crate) fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spherical_round_trip_within_valid_range() {
        for i in 1..20 {
            let phi = 0.05 + (PI - 0.1) * (i as f32 / 20.0);
            for j in 0..24 {
                let theta = -PI + TAU * (j as f32 + 0.5) / 24.0;
                let back = Spherical::from_vector(Spherical::new(1.0, phi, theta).to_vector());
                assert!(approx_eq(back.phi, phi, 1e-4), "phi {phi} -> {}", back.phi);
                assert!(
                    approx_eq(wrap_angle(back.theta - theta), 0.0, 1e-4),
                    "theta {theta} -> {}",
                    back.theta
                );
            }
        }
    }

    #[test]
    fn wrap_angle_stays_in_half_open_range() {
        assert!(approx_eq(wrap_angle(2.0 * TAU + 1.0), 1.0, 1e-5));
        assert!(approx_eq(wrap_angle(3.0 * PI + 0.5), -PI + 0.5, 1e-5));
        assert!(approx_eq(wrap_angle(-PI), PI, 1e-6));
        assert!(approx_eq(wrap_angle(TAU + 0.25), 0.25, 1e-5));
        assert!(approx_eq(wrap_angle(-0.25), -0.25, 1e-6));
        for k in -50..50 {
            let a = wrap_angle(k as f32 * 0.7);
            assert!(a > -PI && a <= PI);
        }
    }

    #[test]
    fn look_zero_faces_positive_z() {
        let d = Look::new(0.0, 0.0).to_direction();
        assert!(approx_eq(d.z, 1.0, 1e-6));

        let up = Look::new(30.0, 90.0).to_direction();
        assert!(approx_eq(up.y, 1.0, 1e-6));

        let back = Look::from_direction(Look::new(90.0, 45.0).to_direction());
        assert!(approx_eq(back.lng, 90.0, 1e-3));
        assert!(approx_eq(back.lat, 45.0, 1e-3));
    }

    #[test]
    fn look_rotation_points_negative_z_at_forward() {
        let forward = Vec3::new(1.0, 0.5, -2.0).normalize();
        let q = look_rotation(forward, Vec3::Y);
        let f = q * Vec3::NEG_Z;
        assert!((f - forward).length() < 1e-5);
        // 无滚转：右轴保持水平
        assert!(approx_eq((q * Vec3::X).y, 0.0, 1e-5));

        let straight_up = look_rotation(Vec3::Y, Vec3::Y) * Vec3::NEG_Z;
        assert!((straight_up - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn euler_yxz_matches_axis_composition() {
        let (x, y, z) = (0.3, -1.1, 0.7);
        let expected = Quat::from_rotation_y(y) * Quat::from_rotation_x(x) * Quat::from_rotation_z(z);
        let q = quat_from_euler_yxz(x, y, z);
        assert!(q.dot(expected).abs() > 1.0 - 1e-6);
    }
}
