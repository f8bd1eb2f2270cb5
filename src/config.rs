// config.rs — 查看器选项、导览数据源与启动参数
//
// 导览 JSON：
//   { "options": {...}, "sceneGroup": [...], "multiple": [...], "vr": false }
// 启动参数：--source <path> / --lang <code> / --gyro，环境变量 PANORAMA_SOURCE / PANORAMA_LANG

use crate::error::{Result, ViewerError};
use crate::math::Look;
use crate::orbit::OrbitSettings;
use crate::scene::SceneData;
use crate::switcher::SwitcherItem;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 内置示例导览
pub const DEMO_TOUR: &str = include_str!("../assets/demo_tour.json");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerOptions {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub gyro: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    /// 度
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub default_look: Look,
    /// 按下到抬起的位移不超过此像素数视为点击
    pub click_slop: f32,
    pub eye_separation: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            fov: 80.0,
            near: 0.1,
            far: 10_000.0,
            gyro: false,
            enable_damping: true,
            damping_factor: 0.2,
            rotate_speed: 1.0,
            min_polar_angle: 0.0,
            max_polar_angle: 180.0,
            default_look: Look::default(),
            click_slop: 4.0,
            eye_separation: 0.064,
        }
    }
}

impl ViewerOptions {
    pub fn orbit_settings(&self) -> OrbitSettings {
        OrbitSettings {
            enable_damping: self.enable_damping,
            damping_factor: self.damping_factor,
            rotate_speed: self.rotate_speed,
            min_polar_angle: self.min_polar_angle.to_radians(),
            max_polar_angle: self.max_polar_angle.to_radians(),
        }
    }
}

/// 左下角的作者署名与可选 logo
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TourInfo {
    pub author: String,
    /// 相对于导览文件所在目录
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourSource {
    #[serde(default)]
    pub options: ViewerOptions,
    pub scene_group: Vec<SceneData>,
    #[serde(default)]
    pub multiple: Vec<SwitcherItem>,
    #[serde(default)]
    pub vr: bool,
    #[serde(default)]
    pub info: Option<TourInfo>,
}

impl TourSource {
    pub fn from_json(text: &str) -> Result<Self> {
        let source: TourSource = serde_json::from_str(text)?;
        if source.scene_group.is_empty() {
            return Err(ViewerError::EmptyTour);
        }
        Ok(source)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let source = Self::from_json(&text)?;
        log::info!(
            "loaded tour {} with {} scenes",
            path.display(),
            source.scene_group.len()
        );
        Ok(source)
    }

    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_TOUR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppArgs {
    /// None 表示使用内置示例
    pub source: Option<PathBuf>,
    pub lang: String,
    pub gyro: bool,
}

impl AppArgs {
    pub fn from_env() -> Self {
        Self::parse(
            std::env::args().skip(1),
            std::env::var("PANORAMA_SOURCE").ok(),
            std::env::var("PANORAMA_LANG").ok(),
        )
    }

    /// 命令行优先，其次环境变量，最后默认值
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        env_source: Option<String>,
        env_lang: Option<String>,
    ) -> Self {
        let mut source = None;
        let mut lang = None;
        let mut gyro = false;

        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--source" => source = it.next().map(PathBuf::from),
                "--lang" => lang = it.next(),
                "--gyro" => gyro = true,
                _ => log::debug!("ignoring argument {a}"),
            }
        }

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            source: source.or_else(|| non_empty(env_source).map(PathBuf::from)),
            lang: lang
                .or_else(|| non_empty(env_lang))
                .unwrap_or_else(|| "en".to_string()),
            gyro,
        }
    }

    pub fn load_tour(&self) -> Result<TourSource> {
        let mut tour = match &self.source {
            Some(path) => TourSource::from_path(path)?,
            None => TourSource::demo()?,
        };
        tour.options.gyro |= self.gyro;
        Ok(tour)
    }
}
