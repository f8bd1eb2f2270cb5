// registry.rs — 每个场景一份覆盖物缓存
//
// 同一时刻最多只有一个场景的缓存存活：进入新场景前先彻底释放旧场景，
// 不留下可点击的过期目标。

use crate::overlay::{Bucket, Overlay, OverlayData, OverlayId};
use crate::scene::SceneData;
use glam::Vec3;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(u64);

/// 场景图里挂载的 3D 分组
#[derive(Debug, Default)]
pub struct SceneGraph {
    groups: Vec<GroupHandle>,
}

impl SceneGraph {
    pub fn attach(&mut self, group: GroupHandle) {
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
    }

    pub fn detach(&mut self, group: GroupHandle) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| *g != group);
        self.groups.len() != before
    }

    pub fn contains(&self, group: GroupHandle) -> bool {
        self.groups.contains(&group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug)]
pub struct SceneCacheEntry {
    scene_id: String,
    dom: Vec<Overlay>,
    detectable: Vec<Overlay>,
    generic: Vec<Overlay>,
    // 可检测分组：射线只与这里的成员求交
    detects: GroupHandle,
    hidden: bool,
}

impl SceneCacheEntry {
    fn new(scene_id: &str, detects: GroupHandle) -> Self {
        Self {
            scene_id: scene_id.to_string(),
            dom: Vec::new(),
            detectable: Vec::new(),
            generic: Vec::new(),
            detects,
            hidden: false,
        }
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn detects_group(&self) -> GroupHandle {
        self.detects
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn push(&mut self, overlay: Overlay) {
        match overlay.bucket() {
            Bucket::Dom => self.dom.push(overlay),
            Bucket::Detectable => self.detectable.push(overlay),
            Bucket::Generic => self.generic.push(overlay),
        }
    }

    pub fn dom_overlays(&self) -> &[Overlay] {
        &self.dom
    }

    pub fn dom_overlays_mut(&mut self) -> impl Iterator<Item = &mut Overlay> {
        self.dom.iter_mut()
    }

    pub fn detectable_overlays(&self) -> &[Overlay] {
        &self.detectable
    }

    pub fn generic_overlays(&self) -> &[Overlay] {
        &self.generic
    }

    pub fn overlays(&self) -> impl Iterator<Item = &Overlay> {
        self.dom.iter().chain(&self.detectable).chain(&self.generic)
    }

    pub fn overlays_mut(&mut self) -> impl Iterator<Item = &mut Overlay> {
        self.dom
            .iter_mut()
            .chain(self.detectable.iter_mut())
            .chain(self.generic.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.dom.len() + self.detectable.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays().find(|o| o.id == id)
    }

    pub fn find_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays_mut().find(|o| o.id == id)
    }

    fn remove(&mut self, id: OverlayId) -> Option<Overlay> {
        for bucket in [&mut self.dom, &mut self.detectable, &mut self.generic] {
            if let Some(index) = bucket.iter().position(|o| o.id == id) {
                return Some(bucket.remove(index));
            }
        }
        None
    }

    pub fn show_all(&mut self) {
        self.hidden = false;
        self.overlays_mut().for_each(Overlay::show);
    }

    pub fn hide_all(&mut self) {
        self.hidden = true;
        self.overlays_mut().for_each(Overlay::hide);
    }
}

#[derive(Debug, Default)]
pub struct OverlayRegistry {
    entries: HashMap<String, SceneCacheEntry>,
    current: Option<String>,
    next_overlay: u64,
    next_group: u64,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已有则返回，否则创建并把可检测分组挂到场景图
    pub fn get_or_create(&mut self, scene_id: &str, graph: &mut SceneGraph) -> &mut SceneCacheEntry {
        let next_group = &mut self.next_group;
        self.entries.entry(scene_id.to_string()).or_insert_with(|| {
            let handle = GroupHandle(*next_group);
            *next_group += 1;
            graph.attach(handle);
            SceneCacheEntry::new(scene_id, handle)
        })
    }

    /// 安装场景的覆盖物列表，并设为当前场景。之前的场景先被彻底释放
    pub fn install(&mut self, scene: &SceneData, camera_position: Vec3, graph: &mut SceneGraph) -> usize {
        if let Some(previous) = self.current.clone() {
            if previous != scene.id {
                self.dispose(&previous, true, graph);
            }
        }

        self.current = Some(scene.id.clone());
        // 空列表也要建缓存并挂上分组
        self.get_or_create(&scene.id, graph);
        let mut count = 0;
        for data in &scene.overlays {
            if self.insert(&scene.id, data.clone(), camera_position, graph).is_some() {
                count += 1;
            }
        }
        log::debug!("installed {count} overlays for scene {}", scene.id);
        count
    }

    fn insert(
        &mut self,
        scene_id: &str,
        data: OverlayData,
        camera_position: Vec3,
        graph: &mut SceneGraph,
    ) -> Option<OverlayId> {
        let id = OverlayId(self.next_overlay);
        self.next_overlay += 1;
        let overlay = Overlay::create(id, scene_id, data, camera_position);
        self.get_or_create(scene_id, graph).push(overlay);
        Some(id)
    }

    /// 往当前场景追加一个覆盖物
    pub fn add(&mut self, data: OverlayData, camera_position: Vec3, graph: &mut SceneGraph) -> Option<OverlayId> {
        let scene_id = self.current.clone()?;
        self.insert(&scene_id, data, camera_position, graph)
    }

    /// 删除当前场景中的单个覆盖物
    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        let Some(entry) = self.current_mut() else {
            return false;
        };
        match entry.remove(id) {
            Some(mut overlay) => {
                overlay.dispose();
                true
            }
            None => false,
        }
    }

    /// 隐藏场景的所有覆盖物；clean 时同时释放资源、从场景图卸下并丢弃缓存
    pub fn dispose(&mut self, scene_id: &str, clean: bool, graph: &mut SceneGraph) {
        if !clean {
            if let Some(entry) = self.entries.get_mut(scene_id) {
                entry.hide_all();
            }
            return;
        }

        let Some(mut entry) = self.entries.remove(scene_id) else {
            return;
        };
        entry.hide_all();
        entry.overlays_mut().for_each(Overlay::dispose);
        graph.detach(entry.detects);

        if self.current.as_deref() == Some(scene_id) {
            self.current = None;
        }
        log::debug!("disposed overlays of scene {scene_id}");
    }

    pub fn dispose_current(&mut self, graph: &mut SceneGraph) {
        if let Some(scene_id) = self.current.clone() {
            self.dispose(&scene_id, true, graph);
        }
    }

    pub fn show(&mut self, scene_id: &str) {
        if let Some(entry) = self.entries.get_mut(scene_id) {
            entry.show_all();
        }
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&SceneCacheEntry> {
        self.current.as_ref().and_then(|id| self.entries.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut SceneCacheEntry> {
        let id = self.current.as_ref()?;
        self.entries.get_mut(id)
    }

    pub fn get(&self, scene_id: &str) -> Option<&SceneCacheEntry> {
        self.entries.get(scene_id)
    }

    pub fn live_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn find(&self, id: OverlayId) -> Option<&Overlay> {
        self.current()?.find(id)
    }

    pub fn find_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.current_mut()?.find_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, overlays: &str) -> SceneData {
        serde_json::from_str(&format!(r#"{{"id":"{id}","overlays":{overlays}}}"#)).expect("scene json")
    }

    const MIXED: &str = r#"[
        {"type":"dom","location":{"lng":0,"lat":0}},
        {"type":"mesh","location":{"lng":30,"lat":0}},
        {"type":"video","location":{"lng":60,"lat":0}},
        {"type":"animation","category":"snow","location":{"lng":0,"lat":0}}
    ]"#;

    #[test]
    fn install_buckets_overlays_and_attaches_group() {
        let mut graph = SceneGraph::default();
        let mut registry = OverlayRegistry::new();
        let count = registry.install(&scene("A", MIXED), Vec3::ZERO, &mut graph);
        assert_eq!(count, 4);

        let entry = registry.current().expect("entry");
        assert_eq!(entry.dom_overlays().len(), 1);
        assert_eq!(entry.detectable_overlays().len(), 2);
        assert_eq!(entry.generic_overlays().len(), 1);
        assert!(graph.contains(entry.detects_group()));
    }

    #[test]
    fn get_or_create_is_stable() {
        let mut graph = SceneGraph::default();
        let mut registry = OverlayRegistry::new();
        let a = registry.get_or_create("A", &mut graph).detects_group();
        let again = registry.get_or_create("A", &mut graph).detects_group();
        assert_eq!(a, again);
        assert_eq!(graph.len(), 1);
        assert_eq!(registry.live_entries(), 1);
    }

    #[test]
    fn next_scene_disposes_previous_first() {
        let mut graph = SceneGraph::default();
        let mut registry = OverlayRegistry::new();
        registry.install(&scene("A", MIXED), Vec3::ZERO, &mut graph);
        let group_a = registry.current().expect("A").detects_group();

        registry.install(&scene("B", "[]"), Vec3::ZERO, &mut graph);
        assert_eq!(registry.live_entries(), 1);
        assert_eq!(registry.current_id(), Some("B"));
        assert!(!graph.contains(group_a));
        assert_eq!(graph.len(), 1);
        assert!(registry.get("A").is_none());
    }

    #[test]
    fn soft_dispose_hides_without_dropping() {
        let mut graph = SceneGraph::default();
        let mut registry = OverlayRegistry::new();
        registry.install(&scene("A", MIXED), Vec3::ZERO, &mut graph);

        registry.dispose("A", false, &mut graph);
        let entry = registry.current().expect("still cached");
        assert!(entry.is_hidden());
        assert!(entry.overlays().all(|o| !o.is_visible()));

        registry.show("A");
        assert!(!registry.current().expect("A").is_hidden());
    }

    #[test]
    fn add_and_remove_single_overlay() {
        let mut graph = SceneGraph::default();
        let mut registry = OverlayRegistry::new();
        let data = OverlayData::dom(crate::overlay::Location::Geo { lng: 10.0, lat: 5.0 }, "hi");
        assert!(registry.add(data.clone(), Vec3::ZERO, &mut graph).is_none());

        registry.install(&scene("A", "[]"), Vec3::ZERO, &mut graph);
        let id = registry.add(data, Vec3::ZERO, &mut graph).expect("added");
        assert!(registry.find(id).is_some());
        assert!(registry.remove_overlay(id));
        assert!(registry.find(id).is_none());
        assert!(!registry.remove_overlay(id));
    }
}
