// vr.rs — VR 头显姿态控制器与双目相机

use crate::camera::Camera;
use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Default for HeadPose {
    fn default() -> Self {
        Self {
            orientation: Quat::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

/// 头显姿态来源（WebVR display / OpenXR session / 模拟器）
pub trait PoseSource {
    fn is_available(&self) -> bool;

    fn request_present(&mut self) -> bool {
        self.is_available()
    }

    fn exit_present(&mut self) {}

    /// 本帧的绝对姿态；None 表示本帧无数据
    fn pose(&mut self) -> Option<HeadPose>;

    /// 头显给出的垂直视角（度）
    fn fov(&self) -> Option<f32> {
        None
    }
}

pub struct VrPoseController {
    source: Option<Box<dyn PoseSource>>,
    presenting: bool,
}

impl VrPoseController {
    pub fn new(source: Option<Box<dyn PoseSource>>) -> Self {
        Self {
            source,
            presenting: false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_available())
    }

    pub fn is_presenting(&self) -> bool {
        self.presenting
    }

    /// 不支持时返回 false，不报错
    pub fn enter(&mut self) -> bool {
        if self.presenting {
            return true;
        }
        let Some(source) = self.source.as_mut() else {
            return false;
        };
        if !source.is_available() || !source.request_present() {
            return false;
        }
        self.presenting = true;
        true
    }

    pub fn exit(&mut self) -> bool {
        if !self.presenting {
            return false;
        }
        if let Some(source) = self.source.as_mut() {
            source.exit_present();
        }
        self.presenting = false;
        true
    }

    /// 头显姿态是绝对值，直接写相机，不经过阻尼
    pub fn update(&mut self, camera: &mut Camera) {
        if !self.presenting {
            return;
        }
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if let Some(pose) = source.pose() {
            camera.set_orientation(pose.orientation);
        }
        if let Some(fov) = source.fov() {
            camera.set_fov(fov);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoRig {
    /// 瞳距（世界单位）
    pub eye_separation: f32,
}

impl StereoRig {
    pub fn new(eye_separation: f32) -> Self {
        Self { eye_separation }
    }

    /// [左眼, 右眼]，各占一半视口宽度
    pub fn eyes(&self, camera: &Camera) -> [Camera; 2] {
        let offset = camera.right() * (self.eye_separation * 0.5);
        let mut left = camera.clone();
        let mut right = camera.clone();
        left.position -= offset;
        right.position += offset;
        left.set_aspect(camera.aspect() * 0.5);
        right.set_aspect(camera.aspect() * 0.5);
        [left, right]
    }
}
