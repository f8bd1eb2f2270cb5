// projector.rs — 3D 锚点 → 屏幕像素

use crate::camera::{Camera, Viewport};
use crate::registry::SceneCacheEntry;
use glam::{IVec2, Vec3};

/// 世界坐标 → NDC
pub fn project(world: Vec3, camera: &Camera) -> Vec3 {
    camera.project(world)
}

/// z > 1 说明在相机背后，不给坐标
pub fn screen_position(ndc: Vec3, viewport: Viewport) -> Option<IVec2> {
    if ndc.z > 1.0 || !ndc.is_finite() {
        return None;
    }
    Some(viewport.to_pixels(ndc))
}

/// 每帧重新摆放当前场景的 DOM 覆盖物。背面的只隐藏，保留上一次的坐标
pub fn refresh(entry: &mut SceneCacheEntry, camera: &Camera, viewport: Viewport) {
    if entry.is_hidden() || viewport.is_empty() {
        return;
    }
    for overlay in entry.dom_overlays_mut() {
        let anchor = overlay.anchor;
        let Some(dom) = overlay.dom_mut() else {
            continue;
        };
        match screen_position(project(anchor, camera), viewport) {
            Some(p) => dom.update(p.x, p.y),
            None => dom.hide(),
        }
    }
}

/// 推进动画类覆盖物
pub fn advance(entry: &mut SceneCacheEntry, dt: f32) {
    if entry.is_hidden() {
        return;
    }
    entry.overlays_mut().for_each(|o| o.advance(dt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{OverlayRegistry, SceneGraph};
    use crate::scene::SceneData;

    fn camera() -> Camera {
        // 默认朝向 −Z
        Camera::new(80.0, 800.0 / 600.0, 0.1, 10_000.0)
    }

    #[test]
    fn point_ahead_lands_in_the_centre() {
        let viewport = Viewport::new(800, 600);
        let ndc = project(Vec3::new(0.0, 0.0, -500.0), &camera());
        assert!(ndc.z < 1.0);
        assert_eq!(screen_position(ndc, viewport), Some(IVec2::new(400, 300)));
    }

    #[test]
    fn point_behind_has_no_position() {
        let ndc = project(Vec3::new(0.0, 0.0, 500.0), &camera());
        assert!(ndc.z > 1.0);
        assert_eq!(screen_position(ndc, Viewport::new(800, 600)), None);
    }

    #[test]
    fn refresh_hides_backside_overlays_and_keeps_position() {
        let scene: SceneData = serde_json::from_str(
            r#"{"id":"A","overlays":[{"type":"dom","location":{"x":0,"y":0,"z":-500}}]}"#,
        )
        .expect("scene");
        let mut graph = SceneGraph::default();
        let mut registry = OverlayRegistry::new();
        registry.install(&scene, Vec3::ZERO, &mut graph);
        let viewport = Viewport::new(800, 600);

        let mut cam = camera();
        let entry = registry.current_mut().expect("entry");
        refresh(entry, &cam, viewport);
        let dom = entry.dom_overlays()[0].dom().expect("dom").clone();
        assert!(dom.is_visible());
        assert_eq!(dom.position(), Some(IVec2::new(400, 300)));

        // 转身
        cam.set_orientation(glam::Quat::from_rotation_y(std::f32::consts::PI));
        refresh(entry, &cam, viewport);
        let dom = entry.dom_overlays()[0].dom().expect("dom");
        assert!(!dom.is_visible());
        assert_eq!(dom.position(), Some(IVec2::new(400, 300)));
    }
}
