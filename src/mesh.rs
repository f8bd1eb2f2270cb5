// mesh.rs — 覆盖物面片几何（billboard quad）与射线求交

use crate::camera::Ray;
use crate::math::look_rotation;
use glam::{EulerRot, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub center: Vec3,
    /// 逆时针：左下、右下、右上、左上
    pub corners: [Vec3; 4],
}

/// 局部 XY 平面内的面片，法线为局部 +Z
pub fn build_quad(center: Vec3, rotation: Quat, width: f32, height: f32) -> Quad {
    let hw = width * 0.5;
    let hh = height * 0.5;
    let local = [
        Vec3::new(-hw, -hh, 0.0),
        Vec3::new(hw, -hh, 0.0),
        Vec3::new(hw, hh, 0.0),
        Vec3::new(-hw, hh, 0.0),
    ];

    Quad {
        center,
        corners: local.map(|p| center + rotation * p),
    }
}

/// 面片朝向 target（通常是相机位置）
pub fn facing(center: Vec3, target: Vec3) -> Quat {
    look_rotation(center - target, Vec3::Y)
}

/// three.js 默认的 'XYZ' 欧拉顺序
pub fn rotation_from_euler(x: f32, y: f32, z: f32) -> Quat {
    Quat::from_euler(EulerRot::XYZ, x, y, z)
}

impl Quad {
    pub fn normal(&self) -> Vec3 {
        let [a, b, _, d] = self.corners;
        (b - a).cross(d - a).normalize_or_zero()
    }

    /// 射线参数 t（前方最近交点），双面
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let [a, b, c, d] = self.corners;
        let t0 = ray_triangle(ray, a, b, c);
        let t1 = ray_triangle(ray, a, c, d);
        match (t0, t1) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, y) => x.or(y),
        }
    }
}

// Möller–Trumbore
fn ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPS: f32 = 1e-7;

    let e1 = b - a;
    let e2 = c - a;
    let p = ray.direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }

    let inv = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(e1);
    let v = ray.direction.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(q) * inv;
    (t > EPS).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billboard_faces_target() {
        let center = Vec3::new(0.0, 100.0, -400.0);
        let quad = build_quad(center, facing(center, Vec3::ZERO), 60.0, 40.0);
        let to_camera = (Vec3::ZERO - center).normalize();
        assert!(quad.normal().dot(to_camera) > 0.999);
    }

    #[test]
    fn ray_hits_center_and_misses_outside() {
        let center = Vec3::new(0.0, 0.0, -300.0);
        let quad = build_quad(center, facing(center, Vec3::ZERO), 50.0, 50.0);

        let hit = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        };
        let t = quad.intersect(&hit).expect("centre hit");
        assert!((t - 300.0).abs() < 1e-2);

        let miss = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::new(0.2, 0.0, -1.0).normalize(),
        };
        assert!(quad.intersect(&miss).is_none());

        let behind = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::Z,
        };
        assert!(quad.intersect(&behind).is_none());
    }
}
