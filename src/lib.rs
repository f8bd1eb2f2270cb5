// lib.rs — 全景导览查看器核心：相机控制、覆盖物投影、点击拾取与场景缓存

pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod i18n;
pub mod math;
pub mod mesh;
pub mod orbit;
pub mod overlay;
pub mod projector;
pub mod registry;
pub mod runtime;
pub mod scene;
pub mod switcher;
pub mod viewer;
pub mod vr;

pub use camera::{Camera, Ray, Viewport};
pub use config::{AppArgs, TourInfo, TourSource, ViewerOptions};
pub use device::{DeviceOrientationController, DeviceSample, SensorHub, SensorReading};
pub use error::{Result, ViewerError};
pub use event::{SubscriptionId, Topic, ViewerEvent};
pub use hit_test::PickResult;
pub use math::{Look, Spherical, SphericalDelta};
pub use orbit::{OrbitController, OrbitSettings};
pub use overlay::{ActionType, Location, Overlay, OverlayData, OverlayId, OverlayType, OverlayVisual};
pub use registry::{OverlayRegistry, SceneCacheEntry};
pub use runtime::{InstanceId, ResizeDispatcher, ViewerRuntime};
pub use scene::{SceneData, SceneDirectory};
pub use switcher::{MultipleSwitcher, SwitcherItem};
pub use viewer::{ControlMode, FrameView, HostRequest, Viewer};
pub use vr::{HeadPose, PoseSource, StereoRig, VrPoseController};
