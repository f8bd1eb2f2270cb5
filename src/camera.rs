// camera.rs — 透视相机、视口与拾取射线

use glam::{IVec2, Mat4, Quat, Vec2, Vec3};

pub const MIN_FOV: f32 = 1.0;
pub const MAX_FOV: f32 = 179.0;

/// 位于球心的透视相机，局部 −Z 为视线方向
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    orientation: Quat,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Camera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            fov: fov.clamp(MIN_FOV, MAX_FOV),
            aspect: if aspect > 0.0 { aspect } else { 1.0 },
            near,
            far,
        }
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
    }

    /// 垂直视角（度）
    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(MIN_FOV, MAX_FOV);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// 世界坐标 → NDC。z > 1 表示点在相机背面
    pub fn project(&self, world: Vec3) -> Vec3 {
        self.view_projection().project_point3(world)
    }

    /// NDC → 世界坐标
    pub fn unproject(&self, ndc: Vec3) -> Vec3 {
        self.view_projection().inverse().project_point3(ndc)
    }

    /// 从相机出发、穿过 NDC 点的射线
    pub fn ray_through(&self, ndc: Vec2) -> Option<Ray> {
        let target = self.unproject(ndc.extend(0.5));
        let direction = (target - self.position).normalize_or_zero();
        if direction == Vec3::ZERO || !direction.is_finite() {
            return None;
        }

        Some(Ray {
            origin: self.position,
            direction,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// 以像素为单位的渲染区域，原点在左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn to_ndc(&self, screen: Vec2) -> Vec2 {
        Vec2::new(
            (screen.x / self.width as f32) * 2.0 - 1.0,
            -(screen.y / self.height as f32) * 2.0 + 1.0,
        )
    }

    pub fn to_pixels(&self, ndc: Vec3) -> IVec2 {
        let half_w = self.width as f32 / 2.0;
        let half_h = self.height as f32 / 2.0;
        IVec2::new(
            (ndc.x * half_w + half_w).round() as i32,
            (-ndc.y * half_h + half_h).round() as i32,
        )
    }
}
