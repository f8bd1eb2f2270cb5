// device.rs — 陀螺仪（设备方向）控制器
//
// 不直接设置相机：每帧把设备朝向换算成视线球坐标，与上一帧比较，
// 把增量交给 OrbitController，使其仍是相机朝向的唯一写入者。

use crate::camera::Camera;
use crate::math::{quat_from_axis_angle, quat_from_euler_yxz, wrap_angle, Spherical, SphericalDelta};
use crate::orbit::OrbitController;
use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// deviceorientation 原始读数（度），Z-X'-Y'' 内旋 Tait-Bryan 角
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceSample {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl DeviceSample {
    pub fn new(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self { alpha, beta, gamma }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    Orientation(DeviceSample),
    /// 屏幕旋转角（度）
    ScreenRotation(f32),
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: Vec<(u64, Sender<SensorReading>)>,
}

/// 传感器事件源。可跨线程发布，订阅端在渲染线程用 try_recv 取数据
#[derive(Clone, Default)]
pub struct SensorHub {
    inner: Arc<Mutex<HubState>>,
}

pub struct SensorSubscription {
    id: u64,
    rx: Receiver<SensorReading>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> SensorSubscription {
        let (tx, rx) = channel();
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, tx));
        SensorSubscription { id, rx }
    }

    pub fn unsubscribe(&self, subscription: SensorSubscription) {
        self.state().subscribers.retain(|(id, _)| *id != subscription.id);
    }

    pub fn publish(&self, reading: SensorReading) {
        self.state()
            .subscribers
            .retain(|(_, tx)| tx.send(reading).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }
}

/// 设备朝向 → 相机四元数。
/// 顺序固定：设备 Z-X'-Y'' 姿态 → 绕 X 轴 −90°（相机从设备背面看出去，而不是顶部）
/// → 绕设备 Z 轴补偿屏幕旋转
pub fn device_quaternion(sample: DeviceSample, screen_rotation: f32) -> Quat {
    let alpha = sample.alpha.to_radians();
    let beta = sample.beta.to_radians();
    let gamma = sample.gamma.to_radians();
    let orient = screen_rotation.to_radians();

    // 设备是 'ZXY'，换到我们的 'YXZ'
    let device = quat_from_euler_yxz(beta, alpha, -gamma);
    let back_camera = Quat::from_rotation_x(-FRAC_PI_2);
    let screen = quat_from_axis_angle(Vec3::Z, -orient);

    (device * back_camera * screen).normalize()
}

/// 纯函数：本次视线球坐标，以及相对上一次读数的增量（φ 取反以匹配 orbit 的 offset 约定）
pub fn compute_orientation_delta(
    previous: Option<Spherical>,
    sample: DeviceSample,
    screen_rotation: f32,
) -> (Spherical, Option<SphericalDelta>) {
    let forward = device_quaternion(sample, screen_rotation) * Vec3::NEG_Z;
    let current = Spherical::from_vector(forward);
    let delta = previous.map(|last| SphericalDelta {
        theta: wrap_angle(current.theta - last.theta),
        phi: last.phi - current.phi,
    });
    (current, delta)
}

pub struct DeviceOrientationController {
    hub: SensorHub,
    subscription: Option<SensorSubscription>,
    sample: Option<DeviceSample>,
    screen_rotation: f32,
    alpha_offset: f32,
    last: Option<Spherical>,
}

impl DeviceOrientationController {
    pub fn new(hub: SensorHub) -> Self {
        Self {
            hub,
            subscription: None,
            sample: None,
            screen_rotation: 0.0,
            alpha_offset: 0.0,
            last: None,
        }
    }

    /// 重复调用无副作用
    pub fn connect(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        self.subscription = Some(self.hub.subscribe());
        log::debug!("device orientation connected");
    }

    pub fn disconnect(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.hub.unsubscribe(subscription);
            log::debug!("device orientation disconnected");
        }
        self.sample = None;
        self.screen_rotation = 0.0;
        self.last = None;
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    /// 初始 z 轴旋转偏移（度）
    pub fn update_alpha_offset(&mut self, degrees: f32) {
        self.alpha_offset = degrees;
    }

    pub fn last_reading(&self) -> Option<Spherical> {
        self.last
    }

    fn drain(&mut self) {
        let Some(subscription) = &self.subscription else {
            return;
        };
        while let Ok(reading) = subscription.rx.try_recv() {
            match reading {
                SensorReading::Orientation(sample) => self.sample = Some(sample),
                SensorReading::ScreenRotation(angle) => self.screen_rotation = angle,
            }
        }
    }

    /// 已有基准，本控制器负责写相机
    pub fn has_baseline(&self) -> bool {
        self.is_connected() && self.last.is_some()
    }

    /// 返回本帧是否写了相机；false 时由调用方让 orbit 写
    pub fn update(&mut self, orbit: &mut OrbitController, camera: &mut Camera) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.drain();

        let sample = self.sample.unwrap_or_default();
        // 传感器尚未上报
        if sample == DeviceSample::default() && self.screen_rotation == 0.0 {
            return false;
        }

        let sample = DeviceSample {
            alpha: sample.alpha + self.alpha_offset,
            ..sample
        };
        let (current, delta) = compute_orientation_delta(self.last, sample, self.screen_rotation);
        self.last = Some(current);

        match delta {
            Some(delta) => {
                orbit.update(camera, Some(delta));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, Look};
    use crate::orbit::OrbitSettings;

    fn fixtures() -> (OrbitController, Camera) {
        let settings = OrbitSettings {
            damping_factor: 1.0,
            ..OrbitSettings::default()
        };
        (
            OrbitController::new(settings, Look::default()),
            Camera::new(80.0, 1.0, 0.1, 10_000.0),
        )
    }

    #[test]
    fn flat_device_looks_down() {
        let forward = device_quaternion(DeviceSample::default(), 0.0) * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Y).length() < 1e-5);

        let upright = device_quaternion(DeviceSample::new(0.0, 90.0, 0.0), 0.0) * Vec3::NEG_Z;
        assert!((upright - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn screen_rotation_only_rolls_the_view() {
        let sample = DeviceSample::new(30.0, 80.0, 5.0);
        let a = device_quaternion(sample, 0.0) * Vec3::NEG_Z;
        let b = device_quaternion(sample, 90.0) * Vec3::NEG_Z;
        assert!((a - b).length() < 1e-5);
    }

    #[test]
    fn delta_follows_alpha_and_beta() {
        let (first, none) = compute_orientation_delta(None, DeviceSample::new(0.0, 90.0, 0.0), 0.0);
        assert!(none.is_none());

        let (second, delta) =
            compute_orientation_delta(Some(first), DeviceSample::new(10.0, 90.0, 0.0), 0.0);
        let delta = delta.expect("delta");
        assert!(approx_eq(delta.theta, 10f32.to_radians(), 1e-4));
        assert!(approx_eq(delta.phi, 0.0, 1e-4));

        let (_, delta) =
            compute_orientation_delta(Some(second), DeviceSample::new(10.0, 100.0, 0.0), 0.0);
        let delta = delta.expect("delta");
        // 设备抬起 → 视线上移 → offset 极角增大
        assert!(approx_eq(delta.phi, 10f32.to_radians(), 1e-4));
    }

    #[test]
    fn azimuth_delta_wraps_across_the_seam() {
        // alpha −5° → 视线 θ ≈ 175°，alpha 5° → θ ≈ −175°
        let (first, _) = compute_orientation_delta(None, DeviceSample::new(-5.0, 90.0, 0.0), 0.0);
        let (second, delta) =
            compute_orientation_delta(Some(first), DeviceSample::new(5.0, 90.0, 0.0), 0.0);
        assert!(approx_eq(first.theta, 175f32.to_radians(), 1e-3), "θ {}", first.theta);
        assert!(approx_eq(second.theta, -175f32.to_radians(), 1e-3), "θ {}", second.theta);

        let delta = delta.expect("delta");
        assert!(approx_eq(delta.theta, 10f32.to_radians(), 1e-4));
        assert!(approx_eq(delta.phi, 0.0, 1e-4));
    }

    #[test]
    fn baseline_frame_leaves_the_camera_to_orbit() {
        let hub = SensorHub::new();
        let (mut orbit, mut camera) = fixtures();
        let mut device = DeviceOrientationController::new(hub.clone());
        device.connect();
        assert!(!device.update(&mut orbit, &mut camera));
        assert!(!device.has_baseline());

        hub.publish(SensorReading::Orientation(DeviceSample::new(0.0, 90.0, 0.0)));
        assert!(!device.update(&mut orbit, &mut camera));
        assert!(device.has_baseline());

        hub.publish(SensorReading::Orientation(DeviceSample::new(5.0, 90.0, 0.0)));
        assert!(device.update(&mut orbit, &mut camera));
    }

    #[test]
    fn zero_reading_is_a_no_op() {
        let hub = SensorHub::new();
        let (mut orbit, mut camera) = fixtures();
        let before = camera.clone();
        let mut device = DeviceOrientationController::new(hub.clone());
        device.connect();

        hub.publish(SensorReading::Orientation(DeviceSample::default()));
        device.update(&mut orbit, &mut camera);
        device.update(&mut orbit, &mut camera);
        assert_eq!(camera, before);
        assert!(device.last_reading().is_none());
    }

    #[test]
    fn delta_is_forwarded_to_orbit() {
        let hub = SensorHub::new();
        let (mut orbit, mut camera) = fixtures();
        let mut device = DeviceOrientationController::new(hub.clone());
        device.connect();

        hub.publish(SensorReading::Orientation(DeviceSample::new(0.0, 90.0, 0.0)));
        device.update(&mut orbit, &mut camera);
        let start = orbit.azimuthal_angle();

        hub.publish(SensorReading::Orientation(DeviceSample::new(15.0, 90.0, 0.0)));
        device.update(&mut orbit, &mut camera);
        let turned = wrap_angle(orbit.azimuthal_angle() - start);
        assert!(approx_eq(turned, 15f32.to_radians(), 1e-4));
    }

    #[test]
    fn connect_twice_subscribes_once() {
        let hub = SensorHub::new();
        let (mut orbit, mut camera) = fixtures();
        let mut device = DeviceOrientationController::new(hub.clone());
        device.connect();
        device.connect();
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(SensorReading::Orientation(DeviceSample::new(0.0, 90.0, 0.0)));
        device.update(&mut orbit, &mut camera);
        assert!(device.last_reading().is_some());

        device.disconnect();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(device.last_reading().is_none());

        let before = orbit.azimuthal_angle();
        hub.publish(SensorReading::Orientation(DeviceSample::new(40.0, 90.0, 0.0)));
        device.update(&mut orbit, &mut camera);
        assert_eq!(orbit.azimuthal_angle(), before);
    }

    #[test]
    fn reconnect_starts_from_a_fresh_baseline() {
        let hub = SensorHub::new();
        let (mut orbit, mut camera) = fixtures();
        let mut device = DeviceOrientationController::new(hub.clone());

        device.connect();
        hub.publish(SensorReading::Orientation(DeviceSample::new(0.0, 90.0, 0.0)));
        device.update(&mut orbit, &mut camera);
        device.disconnect();

        device.connect();
        hub.publish(SensorReading::Orientation(DeviceSample::new(60.0, 90.0, 0.0)));
        let before = orbit.azimuthal_angle();
        device.update(&mut orbit, &mut camera);
        // 第一帧只建立基准，不回放断开期间的变化
        assert_eq!(orbit.azimuthal_angle(), before);
    }
}
