// panorama.rs — 宿主界面状态与菜单动作

use std::path::PathBuf;
use std::time::Instant;

/// 菜单/按键产生、在帧末统一执行的动作
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    OpenTour(PathBuf),
    OpenImage(PathBuf),
    ToggleFullscreen,
    ResetView,
    SetFrozen(bool),
    SetRotateSpeed(f32),
    SetVsync(bool),
    ToggleGyro,
    EnterVr,
    ExitVr,
    SelectScene(usize),
    SetLang(String),
    Exit,
}

pub struct UiState {
    pub lang: String,
    pub show_fps: bool,
    pub vsync: bool,
    pub is_fullscreen: bool,
    pub is_loading: bool,
    pub frozen: bool,
    pub rotate_speed: f32,
    /// 最近一次热点链接，显示在状态栏
    pub last_link: Option<String>,
    fps: f32,
    frame_count: u32,
    last_fps_time: Instant,
    last_frame: Instant,
}

impl UiState {
    pub fn new(lang: String) -> Self {
        let now = Instant::now();
        Self {
            lang,
            show_fps: false,
            vsync: true,
            is_fullscreen: false,
            is_loading: false,
            frozen: false,
            rotate_speed: 1.0,
            last_link: None,
            fps: 0.0,
            frame_count: 0,
            last_fps_time: now,
            last_frame: now,
        }
    }

    /// 返回距上一帧的秒数，并每秒刷新一次 FPS
    pub fn begin_frame(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.frame_count += 1;
        let elapsed = now.duration_since(self.last_fps_time).as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.last_fps_time = now;
        }
        // 窗口拖动等造成的长停顿不让动画跳变
        dt.min(0.1)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}
