// overlay.rs — 热点覆盖物：描述数据与各类实例
//
// 变体固定为 dom / mesh / sprite / frame / video，
// 调用处用 match 分派，不做继承。

use crate::math::Look;
use crate::mesh::{build_quad, facing, rotation_from_euler, Quad};
use glam::{IVec2, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// 覆盖物锚点所在球面半径
pub const OVERLAY_RADIUS: f32 = 500.0;

const DEFAULT_DOM_SIZE: f32 = 48.0;
const DEFAULT_MESH_SIZE: f32 = 60.0;
const DEFAULT_VIDEO_SIZE: (f32, f32) = (160.0, 90.0);
const DEFAULT_FRAME_INTERVAL_MS: f32 = 80.0;
// 粒子场半边长
const PARTICLE_FIELD: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Geo { lng: f32, lat: f32 },
    Vector { x: f32, y: f32, z: f32 },
}

impl Location {
    pub fn anchor(&self) -> Vec3 {
        match *self {
            Location::Geo { lng, lat } => Look::new(lng, lat).to_direction() * OVERLAY_RADIUS,
            Location::Vector { x, y, z } => Vec3::new(x, y, z),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayType {
    Dom,
    Mesh,
    Animation,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Scene,
    Link,
    Multiple,
    Video,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationCategory {
    Rain,
    Snow,
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 场景数据里的一条覆盖物描述
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayData {
    #[serde(rename = "type")]
    pub kind: OverlayType,
    pub location: Location,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<AnimationCategory>,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub rotation: Option<Rotation>,
    #[serde(default)]
    pub frames: Option<u32>,
    /// 帧间隔（毫秒）
    #[serde(default)]
    pub interval: Option<f32>,
    #[serde(default)]
    pub src: Option<String>,
}

impl OverlayData {
    pub fn dom(location: Location, content: impl Into<String>) -> Self {
        Self {
            kind: OverlayType::Dom,
            location,
            action_type: ActionType::Custom,
            scene_id: None,
            link_url: None,
            content: Some(content.into()),
            category: None,
            size: None,
            rotation: None,
            frames: None,
            interval: None,
            src: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

/// 屏幕上的 DOM 标签：只接收像素坐标与显隐，不关心内部标记
#[derive(Debug, Clone, PartialEq)]
pub struct DomOverlay {
    position: Option<IVec2>,
    visible: bool,
    size: Vec2,
    disposed: bool,
}

impl DomOverlay {
    pub fn new(size: Vec2) -> Self {
        Self {
            position: None,
            visible: false,
            size,
            disposed: false,
        }
    }

    pub fn update(&mut self, x: i32, y: i32) {
        if self.disposed {
            return;
        }
        self.position = Some(IVec2::new(x, y));
        self.visible = true;
    }

    pub fn show(&mut self) {
        if !self.disposed && self.position.is_some() {
            self.visible = true;
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn dispose(&mut self) {
        self.visible = false;
        self.disposed = true;
    }

    pub fn position(&self) -> Option<IVec2> {
        self.position
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// 以锚点为中心的矩形是否包含 point（像素）
    pub fn contains(&self, point: Vec2) -> bool {
        match self.position {
            Some(p) if self.visible => {
                let offset = (point - p.as_vec2()).abs();
                offset.x <= self.size.x * 0.5 && offset.y <= self.size.y * 0.5
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteSettings {
    pub count: usize,
    pub speed: f32,
    pub size: f32,
    pub color: [f32; 3],
}

impl SpriteSettings {
    pub fn for_category(category: AnimationCategory) -> Self {
        match category {
            AnimationCategory::Rain => Self {
                count: 1000,
                speed: 9.0,
                size: 15.0,
                color: [0.25, 0.25, 0.25],
            },
            // frame 不走粒子，这里给 snow 的参数
            AnimationCategory::Snow | AnimationCategory::Frame => Self {
                count: 500,
                speed: 2.0,
                size: 6.0,
                color: [1.0, 1.0, 1.0],
            },
        }
    }
}

/// 雨雪粒子
#[derive(Debug, Clone)]
pub struct SpriteOverlay {
    pub settings: SpriteSettings,
    particles: Vec<Vec3>,
    rng: StdRng,
}

impl SpriteOverlay {
    pub fn new(settings: SpriteSettings, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let particles = (0..settings.count)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-PARTICLE_FIELD..PARTICLE_FIELD),
                    rng.gen_range(-PARTICLE_FIELD..PARTICLE_FIELD),
                    rng.gen_range(-PARTICLE_FIELD..PARTICLE_FIELD),
                )
            })
            .collect();
        Self {
            settings,
            particles,
            rng,
        }
    }

    pub fn particles(&self) -> &[Vec3] {
        &self.particles
    }

    /// speed 以"每 1/60 秒"计
    pub fn advance(&mut self, dt: f32) {
        let fall = self.settings.speed * dt * 60.0;
        for p in &mut self.particles {
            p.y -= fall;
            if p.y < -PARTICLE_FIELD {
                p.y += 2.0 * PARTICLE_FIELD;
                p.x = self.rng.gen_range(-PARTICLE_FIELD..PARTICLE_FIELD);
                p.z = self.rng.gen_range(-PARTICLE_FIELD..PARTICLE_FIELD);
            }
        }
    }

    fn dispose(&mut self) {
        self.particles.clear();
    }
}

/// 序列帧动画面片
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOverlay {
    pub quad: Quad,
    pub frames: u32,
    pub interval_ms: f32,
    frame: u32,
    elapsed_ms: f32,
}

impl FrameOverlay {
    pub fn new(quad: Quad, frames: u32, interval_ms: f32) -> Self {
        Self {
            quad,
            frames: frames.max(1),
            interval_ms: if interval_ms > 0.0 {
                interval_ms
            } else {
                DEFAULT_FRAME_INTERVAL_MS
            },
            frame: 0,
            elapsed_ms: 0.0,
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed_ms += dt * 1000.0;
        while self.elapsed_ms >= self.interval_ms {
            self.elapsed_ms -= self.interval_ms;
            self.frame = (self.frame + 1) % self.frames;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoOverlay {
    pub quad: Quad,
    playing: bool,
}

impl VideoOverlay {
    pub fn new(quad: Quad) -> Self {
        Self {
            quad,
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    fn stop(&mut self) {
        self.playing = false;
    }
}

#[derive(Debug, Clone)]
pub enum OverlayVisual {
    Dom(DomOverlay),
    Mesh(Quad),
    Sprite(SpriteOverlay),
    Frame(FrameOverlay),
    Video(VideoOverlay),
}

/// 场景缓存中的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Dom,
    Detectable,
    Generic,
}

#[derive(Debug, Clone)]
pub struct Overlay {
    pub id: OverlayId,
    pub scene_id: String,
    pub data: OverlayData,
    pub anchor: Vec3,
    pub visual: OverlayVisual,
    visible: bool,
}

impl Overlay {
    /// 3D 覆盖物在创建时一次性摆放到世界坐标中
    pub fn create(id: OverlayId, scene_id: &str, data: OverlayData, camera_position: Vec3) -> Self {
        let anchor = data.location.anchor();
        let rotation = match data.rotation {
            Some(r) => rotation_from_euler(r.x, r.y, r.z),
            None => facing(anchor, camera_position),
        };
        let size = |w: f32, h: f32| data.size.map_or(Vec2::new(w, h), |s| Vec2::new(s.width, s.height));

        let visual = match data.kind {
            OverlayType::Dom => OverlayVisual::Dom(DomOverlay::new(size(DEFAULT_DOM_SIZE, DEFAULT_DOM_SIZE))),
            OverlayType::Mesh => {
                let s = size(DEFAULT_MESH_SIZE, DEFAULT_MESH_SIZE);
                OverlayVisual::Mesh(build_quad(anchor, rotation, s.x, s.y))
            }
            OverlayType::Video => {
                let s = size(DEFAULT_VIDEO_SIZE.0, DEFAULT_VIDEO_SIZE.1);
                OverlayVisual::Video(VideoOverlay::new(build_quad(anchor, rotation, s.x, s.y)))
            }
            OverlayType::Animation => match data.category {
                Some(AnimationCategory::Frame) => {
                    let s = size(DEFAULT_MESH_SIZE, DEFAULT_MESH_SIZE);
                    OverlayVisual::Frame(FrameOverlay::new(
                        build_quad(anchor, facing(anchor, camera_position), s.x, s.y),
                        data.frames.unwrap_or(1),
                        data.interval.unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
                    ))
                }
                category => {
                    let category = category.unwrap_or_else(|| {
                        log::warn!("animation overlay without category, using rain");
                        AnimationCategory::Rain
                    });
                    OverlayVisual::Sprite(SpriteOverlay::new(
                        SpriteSettings::for_category(category),
                        id.0,
                    ))
                }
            },
        };

        Self {
            id,
            scene_id: scene_id.to_string(),
            data,
            anchor,
            visual,
            visible: true,
        }
    }

    pub fn bucket(&self) -> Bucket {
        match self.visual {
            OverlayVisual::Dom(_) => Bucket::Dom,
            OverlayVisual::Mesh(_) | OverlayVisual::Video(_) => Bucket::Detectable,
            OverlayVisual::Sprite(_) | OverlayVisual::Frame(_) => Bucket::Generic,
        }
    }

    pub fn is_visible(&self) -> bool {
        match &self.visual {
            OverlayVisual::Dom(dom) => dom.is_visible(),
            _ => self.visible,
        }
    }

    pub fn show(&mut self) {
        self.visible = true;
        if let OverlayVisual::Dom(dom) = &mut self.visual {
            dom.show();
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
        if let OverlayVisual::Dom(dom) = &mut self.visual {
            dom.hide();
        }
    }

    /// 释放自身资源（DOM 节点、粒子、播放状态）
    pub fn dispose(&mut self) {
        self.hide();
        match &mut self.visual {
            OverlayVisual::Dom(dom) => dom.dispose(),
            OverlayVisual::Sprite(sprite) => sprite.dispose(),
            OverlayVisual::Video(video) => video.stop(),
            OverlayVisual::Mesh(_) | OverlayVisual::Frame(_) => {}
        }
    }

    pub fn dom(&self) -> Option<&DomOverlay> {
        match &self.visual {
            OverlayVisual::Dom(dom) => Some(dom),
            _ => None,
        }
    }

    pub fn dom_mut(&mut self) -> Option<&mut DomOverlay> {
        match &mut self.visual {
            OverlayVisual::Dom(dom) => Some(dom),
            _ => None,
        }
    }

    /// 可参与射线检测的面片
    pub fn pick_quad(&self) -> Option<&Quad> {
        match &self.visual {
            OverlayVisual::Mesh(quad) => Some(quad),
            OverlayVisual::Video(video) => Some(&video.quad),
            _ => None,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if !self.visible {
            return;
        }
        match &mut self.visual {
            OverlayVisual::Sprite(sprite) => sprite.advance(dt),
            OverlayVisual::Frame(frame) => frame.advance(dt),
            OverlayVisual::Dom(_) | OverlayVisual::Mesh(_) | OverlayVisual::Video(_) => {}
        }
    }

    pub fn toggle_video(&mut self) -> Option<bool> {
        match &mut self.visual {
            OverlayVisual::Video(video) => Some(video.toggle()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OverlayData {
        serde_json::from_str(json).expect("overlay json")
    }

    #[test]
    fn descriptor_parses_geo_and_vector_locations() {
        let geo = parse(
            r#"{"type":"dom","location":{"lng":90,"lat":45},"actionType":"scene","sceneId":"B"}"#,
        );
        assert_eq!(geo.kind, OverlayType::Dom);
        assert_eq!(geo.action_type, ActionType::Scene);
        assert_eq!(geo.scene_id.as_deref(), Some("B"));
        assert!((geo.location.anchor().length() - OVERLAY_RADIUS).abs() < 1e-2);

        let vector = parse(r#"{"type":"mesh","location":{"x":1,"y":2,"z":-300}}"#);
        assert_eq!(vector.location, Location::Vector { x: 1.0, y: 2.0, z: -300.0 });
        assert_eq!(vector.action_type, ActionType::Custom);
    }

    #[test]
    fn variants_land_in_their_buckets() {
        let cases = [
            (r#"{"type":"dom","location":{"lng":0,"lat":0}}"#, Bucket::Dom),
            (r#"{"type":"mesh","location":{"lng":0,"lat":0}}"#, Bucket::Detectable),
            (r#"{"type":"video","location":{"lng":0,"lat":0}}"#, Bucket::Detectable),
            (r#"{"type":"animation","category":"snow","location":{"lng":0,"lat":0}}"#, Bucket::Generic),
            (r#"{"type":"animation","category":"frame","frames":4,"location":{"lng":0,"lat":0}}"#, Bucket::Generic),
        ];
        for (i, (json, bucket)) in cases.iter().enumerate() {
            let overlay = Overlay::create(OverlayId(i as u64), "A", parse(json), Vec3::ZERO);
            assert_eq!(overlay.bucket(), *bucket, "{json}");
        }
    }

    #[test]
    fn dom_update_shows_and_hide_keeps_position() {
        let mut dom = DomOverlay::new(Vec2::splat(40.0));
        assert!(!dom.contains(Vec2::ZERO));

        dom.update(100, 80);
        assert!(dom.is_visible());
        assert!(dom.contains(Vec2::new(115.0, 95.0)));
        assert!(!dom.contains(Vec2::new(130.0, 80.0)));

        dom.hide();
        assert_eq!(dom.position(), Some(IVec2::new(100, 80)));
        assert!(!dom.contains(Vec2::new(100.0, 80.0)));

        dom.dispose();
        dom.update(1, 1);
        assert!(!dom.is_visible());
    }

    #[test]
    fn frame_animation_wraps() {
        let quad = build_quad(Vec3::NEG_Z, facing(Vec3::NEG_Z, Vec3::ZERO), 1.0, 1.0);
        let mut frame = FrameOverlay::new(quad, 3, 100.0);
        frame.advance(0.25);
        assert_eq!(frame.frame(), 2);
        frame.advance(0.1);
        assert_eq!(frame.frame(), 0);
    }

    #[test]
    fn rain_falls_and_stays_in_the_field() {
        let mut rain = SpriteOverlay::new(SpriteSettings::for_category(AnimationCategory::Rain), 7);
        assert_eq!(rain.particles().len(), 1000);
        let before = rain.particles()[0];
        rain.advance(1.0 / 60.0);
        let after = rain.particles()[0];
        assert!(after.y < before.y || after.y > PARTICLE_FIELD - 10.0);
        for _ in 0..500 {
            rain.advance(1.0 / 30.0);
        }
        assert!(rain.particles().iter().all(|p| p.y >= -PARTICLE_FIELD && p.y <= PARTICLE_FIELD));
    }

    #[test]
    fn video_toggle_and_dispose() {
        let data = parse(r#"{"type":"video","actionType":"video","location":{"lng":10,"lat":0}}"#);
        let mut overlay = Overlay::create(OverlayId(1), "A", data, Vec3::ZERO);
        assert_eq!(overlay.toggle_video(), Some(true));
        overlay.dispose();
        assert!(!overlay.is_visible());
        assert_eq!(overlay.toggle_video(), Some(true));
    }
}
