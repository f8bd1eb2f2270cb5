// scene.rs — 场景数据与场景目录

use crate::overlay::OverlayData;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tex_path: String,
    #[serde(default)]
    pub thumb_path: Option<String>,
    /// 进入时的视角；缺省用全局配置
    #[serde(default)]
    pub fov: Option<f32>,
    #[serde(default)]
    pub lng: Option<f32>,
    #[serde(default)]
    pub lat: Option<f32>,
    #[serde(default)]
    pub overlays: Vec<OverlayData>,
}

impl SceneData {
    pub fn new(id: impl Into<String>, tex_path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            tex_path: tex_path.into(),
            thumb_path: None,
            fov: None,
            lng: None,
            lat: None,
            overlays: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneDirectory {
    scenes: Vec<SceneData>,
    // 为缺少 id 的场景编号
    generated: usize,
}

impl SceneDirectory {
    pub fn new(scenes: Vec<SceneData>) -> Self {
        let mut dir = Self::default();
        dir.add_scenes(scenes);
        dir
    }

    fn normalize(&mut self, mut scene: SceneData) -> SceneData {
        if scene.id.is_empty() {
            scene.id = format!("pano{}", self.generated);
            self.generated += 1;
        }
        if scene.name.is_empty() {
            scene.name = scene.id.clone();
        }
        scene
    }

    pub fn find(&self, id: &str) -> Option<&SceneData> {
        self.scenes.iter().find(|s| s.id == id)
    }

    /// 新场景插到前面，同 id 的查找命中新数据
    pub fn add_scenes(&mut self, scenes: Vec<SceneData>) {
        let mut fresh: Vec<SceneData> = scenes.into_iter().map(|s| self.normalize(s)).collect();
        fresh.append(&mut self.scenes);
        self.scenes = fresh;
    }

    pub fn scenes(&self) -> &[SceneData] {
        &self.scenes
    }

    pub fn first(&self) -> Option<&SceneData> {
        self.scenes.first()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
