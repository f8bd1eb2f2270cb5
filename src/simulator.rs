// simulator.rs — 桌面上用键盘模拟陀螺仪与 VR 头显
//
// I/K：beta  J/L：alpha  Y/H：gamma  R：屏幕旋转 90°
// 头显：W/S 俯仰  A/D 偏航

use glam::{EulerRot, Quat, Vec3};
use panorama_tour::{DeviceSample, HeadPose, PoseSource, SensorHub, SensorReading};
use std::cell::RefCell;
use std::rc::Rc;
use winit::event::VirtualKeyCode;

const SENSOR_STEP_DEG: f32 = 5.0;
const HEAD_STEP_RAD: f32 = 0.05;
const HEADSET_FOV: f32 = 100.0;

pub struct SensorSimulator {
    hub: SensorHub,
    // 手机竖直握持
    sample: DeviceSample,
    screen_rotation: f32,
}

impl SensorSimulator {
    pub fn new(hub: SensorHub) -> Self {
        Self {
            hub,
            sample: DeviceSample::new(0.0, 90.0, 0.0),
            screen_rotation: 0.0,
        }
    }

    /// 处理了返回 true
    pub fn process_key(&mut self, key: VirtualKeyCode) -> bool {
        match key {
            VirtualKeyCode::J => self.sample.alpha += SENSOR_STEP_DEG,
            VirtualKeyCode::L => self.sample.alpha -= SENSOR_STEP_DEG,
            VirtualKeyCode::I => self.sample.beta = (self.sample.beta + SENSOR_STEP_DEG).min(180.0),
            VirtualKeyCode::K => self.sample.beta = (self.sample.beta - SENSOR_STEP_DEG).max(-180.0),
            VirtualKeyCode::Y => self.sample.gamma = (self.sample.gamma - SENSOR_STEP_DEG).max(-90.0),
            VirtualKeyCode::H => self.sample.gamma = (self.sample.gamma + SENSOR_STEP_DEG).min(90.0),
            VirtualKeyCode::R => {
                self.screen_rotation = (self.screen_rotation + 90.0) % 360.0;
                self.hub.publish(SensorReading::ScreenRotation(self.screen_rotation));
                return true;
            }
            _ => return false,
        }
        self.sample.alpha = self.sample.alpha.rem_euclid(360.0);
        self.hub.publish(SensorReading::Orientation(self.sample));
        true
    }

    /// 连接后补发一次当前读数作为基准
    pub fn publish_current(&self) {
        self.hub.publish(SensorReading::Orientation(self.sample));
    }
}

#[derive(Debug, Default)]
struct HeadState {
    yaw: f32,
    pitch: f32,
    presenting: bool,
}

/// 键盘驱动的模拟头显，按键端与查看器共享状态
#[derive(Clone, Default)]
pub struct SimulatedHeadset {
    state: Rc<RefCell<HeadState>>,
}

impl SimulatedHeadset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_key(&self, key: VirtualKeyCode) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.presenting {
            return false;
        }
        match key {
            VirtualKeyCode::W => state.pitch = (state.pitch + HEAD_STEP_RAD).min(1.5),
            VirtualKeyCode::S => state.pitch = (state.pitch - HEAD_STEP_RAD).max(-1.5),
            VirtualKeyCode::A => state.yaw += HEAD_STEP_RAD,
            VirtualKeyCode::D => state.yaw -= HEAD_STEP_RAD,
            _ => return false,
        }
        true
    }
}

impl PoseSource for SimulatedHeadset {
    fn is_available(&self) -> bool {
        true
    }

    fn request_present(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        state.presenting = true;
        // 与进入前的默认视线一致，面向 +Z
        state.yaw = std::f32::consts::PI;
        state.pitch = 0.0;
        true
    }

    fn exit_present(&mut self) {
        self.state.borrow_mut().presenting = false;
    }

    fn pose(&mut self) -> Option<HeadPose> {
        let state = self.state.borrow();
        state.presenting.then(|| HeadPose {
            orientation: Quat::from_euler(EulerRot::YXZ, state.yaw, state.pitch, 0.0),
            position: Vec3::ZERO,
        })
    }

    fn fov(&self) -> Option<f32> {
        Some(HEADSET_FOV)
    }
}
