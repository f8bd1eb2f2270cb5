// viewer.rs — 全景查看器：控制器调度、场景切换、点击分派
//
// 每帧顺序固定：控制器更新 → 渲染 → render-process → DOM 重投影 → 动画推进。
// 纹理加载由宿主完成：查看器通过 take_requests() 交出请求，宿主加载后回调 complete_transition()。

use crate::camera::{Camera, Viewport};
use crate::config::{TourInfo, TourSource, ViewerOptions};
use crate::device::{DeviceOrientationController, SensorHub};
use crate::error::{Result, ViewerError};
use crate::event::{EventBus, SubscriptionId, Topic, ViewerEvent};
use crate::hit_test::{self, PickResult};
use crate::math::Look;
use crate::orbit::OrbitController;
use crate::overlay::{ActionType, OverlayData, OverlayId};
use crate::projector;
use crate::registry::{OverlayRegistry, SceneCacheEntry, SceneGraph};
use crate::scene::{SceneData, SceneDirectory};
use crate::switcher::MultipleSwitcher;
use crate::vr::{PoseSource, StereoRig, VrPoseController};
use glam::Vec2;

/// 本帧写相机的控制器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Orbit,
    Device,
    Vr,
}

/// 需要宿主完成的工作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    LoadTexture { scene_id: String, path: String },
    OpenLink(String),
}

/// 交给渲染回调的一帧视图
pub struct FrameView<'a> {
    pub camera: &'a Camera,
    /// VR 模式下的左右眼
    pub eyes: Option<[Camera; 2]>,
    pub scene: Option<&'a SceneData>,
    pub viewport: Viewport,
}

#[derive(Debug, Clone)]
struct PendingTransition {
    scene_id: String,
    silent: bool,
    first: bool,
}

pub struct Viewer {
    options: ViewerOptions,
    camera: Camera,
    viewport: Viewport,
    orbit: OrbitController,
    device: DeviceOrientationController,
    vr: VrPoseController,
    vr_enabled: bool,
    stereo: StereoRig,
    fov_before_vr: Option<f32>,
    registry: OverlayRegistry,
    graph: SceneGraph,
    bus: EventBus,
    scenes: SceneDirectory,
    switcher: Option<MultipleSwitcher>,
    info: Option<TourInfo>,
    current: Option<SceneData>,
    pending: Option<PendingTransition>,
    requests: Vec<HostRequest>,
    press: Option<Vec2>,
    running: bool,
    frozen: bool,
}

impl Viewer {
    pub fn new(source: TourSource) -> Result<Self> {
        if source.scene_group.is_empty() {
            return Err(ViewerError::EmptyTour);
        }
        let options = source.options;
        let camera = Camera::new(options.fov, 1.0, options.near, options.far);
        let orbit = OrbitController::new(options.orbit_settings(), options.default_look);
        let switcher = (!source.multiple.is_empty()).then(|| MultipleSwitcher::new(source.multiple));

        Ok(Self {
            camera,
            viewport: Viewport::default(),
            orbit,
            device: DeviceOrientationController::new(SensorHub::new()),
            vr: VrPoseController::new(None),
            vr_enabled: source.vr,
            stereo: StereoRig::new(options.eye_separation),
            fov_before_vr: None,
            registry: OverlayRegistry::new(),
            graph: SceneGraph::default(),
            bus: EventBus::new(),
            scenes: SceneDirectory::new(source.scene_group),
            switcher,
            info: source.info,
            current: None,
            pending: None,
            requests: Vec::new(),
            press: None,
            running: false,
            frozen: false,
            options,
        })
    }

    /// 陀螺仪读数来源
    pub fn with_sensors(mut self, hub: SensorHub) -> Self {
        self.device.disconnect();
        self.device = DeviceOrientationController::new(hub);
        self
    }

    pub fn with_headset(mut self, source: Box<dyn PoseSource>) -> Self {
        self.vr = VrPoseController::new(Some(source));
        self
    }

    /// 开始渲染循环并请求第一个场景
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.running = true;
        if self.options.gyro {
            self.start_gyro();
        }
        if self.current.is_none() && self.pending.is_none() {
            let first = self.scenes.first().map(|s| s.id.clone()).ok_or(ViewerError::EmptyTour)?;
            self.transition(&first, false)?;
        }
        log::info!("viewer started with {} scenes", self.scenes.len());
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_control(&self) -> ControlMode {
        if self.vr.is_presenting() {
            ControlMode::Vr
        } else if self.device.has_baseline() {
            ControlMode::Device
        } else {
            ControlMode::Orbit
        }
    }

    /// 推进一帧。停止后返回 None，渲染回调不会被调用
    pub fn tick<R>(&mut self, dt: f32, render: impl FnOnce(&FrameView<'_>) -> R) -> Option<R> {
        if !self.running {
            return None;
        }

        match self.active_control() {
            ControlMode::Vr => self.vr.update(&mut self.camera),
            ControlMode::Device | ControlMode::Orbit if !self.frozen => {
                // 陀螺仪没有给出增量的帧仍由 orbit 写相机
                if !self.device.update(&mut self.orbit, &mut self.camera) {
                    self.orbit.update(&mut self.camera, None);
                }
            }
            ControlMode::Device | ControlMode::Orbit => {}
        }

        let eyes = self.vr.is_presenting().then(|| self.stereo.eyes(&self.camera));
        let view = FrameView {
            camera: &self.camera,
            eyes,
            scene: self.current.as_ref(),
            viewport: self.viewport,
        };
        let output = render(&view);

        if let Some(scene) = &self.current {
            let event = ViewerEvent::RenderProcess {
                scene_id: scene.id.clone(),
            };
            self.bus.dispatch(&event);
        }

        if let Some(entry) = self.registry.current_mut() {
            projector::refresh(entry, &self.camera, self.viewport);
            projector::advance(entry, dt);
        }
        Some(output)
    }

    // ---------- 场景切换 ----------

    pub fn enter_next(&mut self, scene_id: &str) -> Result<()> {
        self.transition(scene_id, false)
    }

    /// 保留当前视角与 fov
    pub fn enter_next_silent(&mut self, scene_id: &str) -> Result<()> {
        self.transition(scene_id, true)
    }

    fn transition(&mut self, scene_id: &str, silent: bool) -> Result<()> {
        let Some(scene) = self.scenes.find(scene_id) else {
            log::warn!("cannot enter unknown scene {scene_id}");
            return Err(ViewerError::SceneNotFound(scene_id.to_string()));
        };
        let path = scene.tex_path.clone();
        let first = self.current.is_none() && self.pending.is_none();

        if !first {
            self.registry.dispose_current(&mut self.graph);
            if let Some(switcher) = &mut self.switcher {
                switcher.disable();
            }
            self.bus.dispatch(&ViewerEvent::SceneAttachStart);
        }

        log::debug!("requesting texture for scene {scene_id}");
        self.pending = Some(PendingTransition {
            scene_id: scene_id.to_string(),
            silent,
            first,
        });
        self.requests.push(HostRequest::LoadTexture {
            scene_id: scene_id.to_string(),
            path,
        });
        Ok(())
    }

    /// 宿主加载完（或加载失败）后调用。覆盖物安装不依赖纹理是否就绪
    pub fn complete_transition(&mut self, scene_id: &str, loaded: bool) {
        let pending = match self.pending.take() {
            Some(p) if p.scene_id == scene_id => p,
            other => {
                log::debug!("ignoring stale texture result for {scene_id}");
                self.pending = other;
                return;
            }
        };
        if !loaded {
            log::warn!("texture for scene {scene_id} failed to load, attaching overlays anyway");
        }
        self.attach(pending);
    }

    fn attach(&mut self, pending: PendingTransition) {
        let Some(scene) = self.scenes.find(&pending.scene_id).cloned() else {
            log::warn!("scene {} disappeared before attach", pending.scene_id);
            return;
        };

        if !pending.silent {
            let fov = scene.fov.unwrap_or(self.options.fov);
            // VR 中切换场景：退出时恢复新场景的 fov
            if self.fov_before_vr.is_some() {
                self.fov_before_vr = Some(fov);
            }
            self.camera.set_fov(fov);
            let default = self.options.default_look;
            self.orbit.set_look(Look::new(
                scene.lng.unwrap_or(default.lng),
                scene.lat.unwrap_or(default.lat),
            ));
        }

        self.registry.install(&scene, self.camera.position, &mut self.graph);
        if let Some(switcher) = &mut self.switcher {
            switcher.enable();
            switcher.sync_active(&scene.id);
        }
        self.current = Some(scene.clone());
        log::info!("attached scene {}", scene.id);

        let event = if pending.first {
            ViewerEvent::SceneReady(scene)
        } else {
            ViewerEvent::SceneAttach(scene)
        };
        self.bus.dispatch(&event);
    }

    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn pending_scene(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.scene_id.as_str())
    }

    pub fn add_scenes(&mut self, scenes: Vec<SceneData>) {
        self.scenes.add_scenes(scenes);
    }

    pub fn find_scene(&self, scene_id: &str) -> Option<&SceneData> {
        self.scenes.find(scene_id)
    }

    pub fn scenes(&self) -> &[SceneData] {
        self.scenes.scenes()
    }

    pub fn current_scene(&self) -> Option<&SceneData> {
        self.current.as_ref()
    }

    // ---------- 点击 ----------

    /// 解析失败只记日志，点击被丢弃
    pub fn on_click(&mut self, screen: Vec2) {
        match hit_test::pick(screen, self.viewport, &self.camera, self.registry.current()) {
            Ok(PickResult::Overlay(id)) => self.activate_overlay(id),
            Ok(PickResult::Background(direction)) => {
                self.bus.dispatch(&ViewerEvent::PanoClick(direction));
            }
            Err(e) => log::warn!("click at ({}, {}) dropped: {e}", screen.x, screen.y),
        }
    }

    pub fn activate_overlay(&mut self, id: OverlayId) {
        let Some(data) = self.registry.find(id).map(|o| o.data.clone()) else {
            log::warn!("overlay {} is no longer attached", id.0);
            return;
        };
        self.bus.dispatch(&ViewerEvent::OverlayClick {
            id,
            data: data.clone(),
        });

        match data.action_type {
            ActionType::Scene => match data.scene_id.as_deref() {
                Some(target) => {
                    if let Err(e) = self.enter_next(target) {
                        log::warn!("scene hotspot failed: {e}");
                    }
                }
                None => log::warn!("scene hotspot {} has no sceneId", id.0),
            },
            ActionType::Link => match &data.link_url {
                Some(url) => self.requests.push(HostRequest::OpenLink(url.clone())),
                None => log::warn!("link hotspot {} has no linkUrl", id.0),
            },
            ActionType::Multiple => self.on_multiple_active(data),
            ActionType::Video => {
                if let Some(playing) = self.registry.find_mut(id).and_then(|o| o.toggle_video()) {
                    log::debug!("video overlay {} playing: {playing}", id.0);
                }
            }
            ActionType::Custom => {}
        }
    }

    fn on_multiple_active(&mut self, data: OverlayData) {
        let target = match (&self.switcher, data.scene_id.as_deref()) {
            (Some(switcher), Some(scene_id)) => switcher.activate(scene_id),
            _ => None,
        };
        self.bus.dispatch(&ViewerEvent::MultipleActive(data));
        if let Some(scene_id) = target {
            self.enter_from_switcher(&scene_id);
        }
    }

    pub fn select_switcher_entry(&mut self, index: usize) -> bool {
        let Some(scene_id) = self.switcher.as_ref().and_then(|s| s.select(index)) else {
            return false;
        };
        self.enter_from_switcher(&scene_id)
    }

    // 切换成功才移动高亮
    fn enter_from_switcher(&mut self, scene_id: &str) -> bool {
        if let Err(e) = self.enter_next(scene_id) {
            log::warn!("switcher entry failed: {e}");
            return false;
        }
        if let Some(switcher) = &mut self.switcher {
            switcher.sync_active(scene_id);
        }
        true
    }

    pub fn switcher(&self) -> Option<&MultipleSwitcher> {
        self.switcher.as_ref()
    }

    pub fn info(&self) -> Option<&TourInfo> {
        self.info.as_ref()
    }

    // ---------- 指针 ----------

    pub fn pointer_down(&mut self, position: Vec2) {
        self.press = Some(position);
        self.orbit.begin_drag(position);
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        if self.press.is_none() || self.frozen || self.active_control() == ControlMode::Vr {
            return;
        }
        self.orbit.drag_to(position, &self.camera, self.viewport);
    }

    /// 按下与抬起距离不超过 clickSlop 视为点击
    pub fn pointer_up(&mut self, position: Vec2) {
        self.orbit.end_drag();
        if let Some(start) = self.press.take() {
            if start.distance(position) <= self.options.click_slop {
                self.on_click(position);
            }
        }
    }

    /// 抬起被其他界面截走：结束拖拽，不算点击
    pub fn pointer_cancel(&mut self) {
        self.orbit.end_drag();
        self.press = None;
    }

    // ---------- 视角 ----------

    pub fn set_look(&mut self, lng: f32, lat: f32) {
        self.orbit.set_look(Look::new(lng, lat));
    }

    pub fn get_look(&self) -> Look {
        self.orbit.look()
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.camera.set_fov(fov);
    }

    pub fn get_fov(&self) -> f32 {
        self.camera.fov()
    }

    pub fn reset_fov(&mut self) {
        let fov = self
            .current
            .as_ref()
            .and_then(|s| s.fov)
            .unwrap_or(self.options.fov);
        self.camera.set_fov(fov);
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
        if frozen {
            self.orbit.end_drag();
            self.press = None;
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_rotate_speed(&mut self, speed: f32) {
        self.orbit.set_rotate_speed(speed);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        if !self.viewport.is_empty() {
            self.camera.set_aspect(self.viewport.aspect());
        }
    }

    // ---------- 陀螺仪 / VR ----------

    pub fn start_gyro(&mut self) {
        self.device.connect();
    }

    pub fn stop_gyro(&mut self) {
        self.device.disconnect();
    }

    pub fn is_gyro_active(&self) -> bool {
        self.device.is_connected()
    }

    pub fn update_alpha_offset(&mut self, degrees: f32) {
        self.device.update_alpha_offset(degrees);
    }

    pub fn is_vr_supported(&self) -> bool {
        self.vr_enabled && self.vr.is_supported()
    }

    pub fn is_vr_presenting(&self) -> bool {
        self.vr.is_presenting()
    }

    /// 不支持时返回 false，保持 orbit 控制
    pub fn enter_vr(&mut self) -> bool {
        if self.vr.is_presenting() {
            return true;
        }
        if !self.vr_enabled || !self.vr.enter() {
            log::warn!("VR requested but no headset is available");
            return false;
        }
        self.fov_before_vr = Some(self.camera.fov());
        self.orbit.end_drag();
        self.bus.dispatch(&ViewerEvent::VrEnter);
        true
    }

    pub fn exit_vr(&mut self) -> bool {
        if !self.vr.exit() {
            return false;
        }
        if let Some(fov) = self.fov_before_vr.take() {
            self.camera.set_fov(fov);
        }
        self.bus.dispatch(&ViewerEvent::VrExit);
        true
    }

    // ---------- 覆盖物 ----------

    pub fn add_overlay(&mut self, data: OverlayData) -> Result<OverlayId> {
        self.registry
            .add(data, self.camera.position, &mut self.graph)
            .ok_or(ViewerError::NoActiveScene)
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        self.registry.remove_overlay(id)
    }

    pub fn overlays(&self) -> Option<&SceneCacheEntry> {
        self.registry.current()
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.graph
    }

    // ---------- 事件 ----------

    pub fn subscribe(&mut self, topic: Topic, handler: impl FnMut(&ViewerEvent) + 'static) -> SubscriptionId {
        self.bus.subscribe(topic, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ---------- 其他 ----------

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn orbit(&self) -> &OrbitController {
        &self.orbit
    }

    /// 停止循环、断开传感器、释放当前场景并清空订阅
    pub fn dispose(&mut self) {
        self.running = false;
        self.device.disconnect();
        self.vr.exit();
        self.registry.dispose_current(&mut self.graph);
        self.bus.clear();
        self.current = None;
        self.pending = None;
        self.requests.clear();
        log::debug!("viewer disposed");
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("scene", &self.current.as_ref().map(|s| &s.id))
            .field("control", &self.active_control())
            .field("running", &self.running)
            .finish()
    }
}
