// main.rs — 桌面宿主：窗口、菜单、状态栏与导览交互

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod hud;
mod loader;
mod panorama;
mod renderer;
mod simulator;

use glam::Vec2;
use image::{Rgba, RgbaImage};
use loader::TextureLoader;
use panorama::{UiAction, UiState};
use panorama_tour::i18n::I18n;
use panorama_tour::{
    AppArgs, ControlMode, HostRequest, InstanceId, ResizeDispatcher, SceneData, SensorHub, TourSource,
    Viewer, ViewerRuntime,
};
use renderer::Renderer;
use simulator::{SensorSimulator, SimulatedHeadset};

use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
const WHEEL_FOV_STEP: f32 = 2.5;

const LANGS: [(&str, &str); 8] = [
    ("zh-Hans", "简体中文"),
    ("zh-Hant", "繁體中文"),
    ("en", "English"),
    ("ja", "日本語"),
    ("ko", "한국어"),
    ("fr", "Français"),
    ("ru", "Русский"),
    ("ar", "العربية"),
];

struct App {
    window: Arc<Window>,
    renderer: Renderer,
    runtime: ViewerRuntime,
    active: InstanceId,
    resize: ResizeDispatcher,
    loader: TextureLoader,
    hub: SensorHub,
    sensors: SensorSimulator,
    headset: SimulatedHeadset,
    i18n: I18n,
    ui: UiState,
    cursor: Vec2,
    logo: Option<egui::TextureHandle>,
}

fn main() {
    env_logger::init();

    let args = AppArgs::from_env();
    let i18n = I18n::load(args.lang.clone());

    let (tour, base_dir) = match args.load_tour() {
        Ok(tour) => (tour, tour_base_dir(args.source.as_deref())),
        Err(e) => {
            log::error!("{}", i18n.tr_with("error.load_tour", &[("err", e.to_string())]));
            match TourSource::demo() {
                Ok(tour) => (tour, PathBuf::from("assets")),
                Err(e) => {
                    log::error!("{}", i18n.tr_with("error.load_tour", &[("err", e.to_string())]));
                    return;
                }
            }
        }
    };

    let event_loop = EventLoop::new();
    let window = match WindowBuilder::new()
        .with_title(i18n.tr("app.title"))
        .with_inner_size(LogicalSize::new(1280, 720))
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(e) => {
            log::error!("failed to create window: {e}");
            return;
        }
    };

    let renderer = match pollster::block_on(Renderer::new(window.clone())) {
        Ok(renderer) => renderer,
        Err(e) => {
            log::error!("failed to initialise renderer: {e}");
            return;
        }
    };

    let hub = SensorHub::new();
    let headset = SimulatedHeadset::new();
    let mut runtime = ViewerRuntime::new();
    let active = match build_viewer(tour, &hub, &headset, renderer.size) {
        Ok(viewer) => runtime.insert(viewer),
        Err(e) => {
            log::error!("{}", i18n.tr_with("error.load_tour", &[("err", e.to_string())]));
            return;
        }
    };

    let mut app = App {
        window,
        renderer,
        runtime,
        active,
        resize: ResizeDispatcher::new(),
        loader: TextureLoader::new(base_dir),
        sensors: SensorSimulator::new(hub.clone()),
        hub,
        headset,
        ui: UiState::new(args.lang.clone()),
        i18n,
        cursor: Vec2::ZERO,
        logo: None,
    };
    app.refresh_logo();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        let mut actions = Vec::new();

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = app.renderer.egui_state.on_event(&app.renderer.egui_ctx, &event);
                if response.consumed {
                    // 抬起落在 UI 上也要结束拖拽
                    if let WindowEvent::MouseInput {
                        state: ElementState::Released,
                        button: MouseButton::Left,
                        ..
                    } = &event
                    {
                        if let Some(viewer) = app.viewer() {
                            viewer.pointer_cancel();
                        }
                    }
                    return;
                }
                app.handle_window_event(event, &mut actions);
            }
            Event::RedrawRequested(_) => app.redraw(&mut actions),
            Event::MainEventsCleared => app.window.request_redraw(),
            _ => {}
        }

        for action in actions {
            if app.apply(action) {
                *control_flow = ControlFlow::Exit;
            }
        }
    });
}

fn build_viewer(
    tour: TourSource,
    hub: &SensorHub,
    headset: &SimulatedHeadset,
    size: PhysicalSize<u32>,
) -> panorama_tour::Result<Viewer> {
    let mut viewer = Viewer::new(tour)?
        .with_sensors(hub.clone())
        .with_headset(Box::new(headset.clone()));
    viewer.resize(size.width, size.height);
    viewer.start()?;
    Ok(viewer)
}

fn tour_base_dir(source: Option<&Path>) -> PathBuf {
    source
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("assets"))
}

fn is_tour_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

// 贴图加载失败时显示的中性灰
fn placeholder_image() -> RgbaImage {
    RgbaImage::from_pixel(2, 1, Rgba([64, 64, 64, 255]))
}

fn pick_image(i18n: &I18n) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(&i18n.tr("file.filter.images"), &IMAGE_EXTENSIONS)
        .pick_file()
}

fn pick_tour(i18n: &I18n) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(&i18n.tr("file.filter.tours"), &["json"])
        .pick_file()
}

impl App {
    fn viewer(&mut self) -> Option<&mut Viewer> {
        self.runtime.get_mut(self.active)
    }

    fn handle_window_event(&mut self, event: WindowEvent<'_>, actions: &mut Vec<UiAction>) {
        match event {
            WindowEvent::CloseRequested => actions.push(UiAction::Exit),

            WindowEvent::Resized(size) => {
                self.renderer.resize(size);
                self.resize.request(size.width, size.height, Instant::now());
            }
            WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                self.renderer.resize(*new_inner_size);
                self.resize.request(new_inner_size.width, new_inner_size.height, Instant::now());
            }

            WindowEvent::KeyboardInput { input, .. } if input.state == ElementState::Pressed => {
                if let Some(key) = input.virtual_keycode {
                    self.handle_key(key, actions);
                }
            }

            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                let cursor = self.cursor;
                if let Some(viewer) = self.viewer() {
                    match state {
                        ElementState::Pressed => viewer.pointer_down(cursor),
                        ElementState::Released => viewer.pointer_up(cursor),
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                let cursor = self.cursor;
                if let Some(viewer) = self.viewer() {
                    viewer.pointer_move(cursor);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                if let Some(viewer) = self.viewer() {
                    let fov = viewer.get_fov() - scroll * WHEEL_FOV_STEP;
                    viewer.set_fov(fov);
                }
            }

            WindowEvent::DroppedFile(path) => {
                if is_tour_file(&path) {
                    actions.push(UiAction::OpenTour(path));
                } else {
                    actions.push(UiAction::OpenImage(path));
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: VirtualKeyCode, actions: &mut Vec<UiAction>) {
        let Some(viewer) = self.runtime.get(self.active) else {
            return;
        };
        let presenting = viewer.is_vr_presenting();
        let gyro = viewer.is_gyro_active();

        match key {
            VirtualKeyCode::O => {
                if let Some(path) = pick_image(&self.i18n) {
                    actions.push(UiAction::OpenImage(path));
                }
            }
            VirtualKeyCode::T => {
                if let Some(path) = pick_tour(&self.i18n) {
                    actions.push(UiAction::OpenTour(path));
                }
            }
            VirtualKeyCode::F11 => actions.push(UiAction::ToggleFullscreen),
            VirtualKeyCode::F => actions.push(UiAction::SetFrozen(!self.ui.frozen)),
            VirtualKeyCode::G => actions.push(UiAction::ToggleGyro),
            VirtualKeyCode::V if presenting => actions.push(UiAction::ExitVr),
            VirtualKeyCode::V => actions.push(UiAction::EnterVr),
            VirtualKeyCode::Escape if presenting => actions.push(UiAction::ExitVr),
            VirtualKeyCode::Home => actions.push(UiAction::ResetView),
            _ if presenting => {
                self.headset.process_key(key);
            }
            _ if gyro => {
                self.sensors.process_key(key);
            }
            _ => {}
        }
    }

    /// 导览的 info.logo 解码成 egui 纹理，失败只记日志
    fn refresh_logo(&mut self) {
        self.logo = None;
        let Some(logo) = self
            .runtime
            .get(self.active)
            .and_then(Viewer::info)
            .and_then(|info| info.logo.clone())
        else {
            return;
        };
        let path = self.loader.resolve(&logo);
        match image::open(&path) {
            Ok(img) => {
                let img = img.to_rgba8();
                let size = [img.width() as usize, img.height() as usize];
                let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                let texture = self
                    .renderer
                    .egui_ctx
                    .load_texture("tour-logo", color, egui::TextureOptions::LINEAR);
                self.logo = Some(texture);
            }
            Err(e) => log::warn!("failed to load logo {}: {e}", path.display()),
        }
    }

    fn redraw(&mut self, actions: &mut Vec<UiAction>) {
        let dt = self.ui.begin_frame();

        // 后台解码完成的贴图
        while let Some(loaded) = self.loader.try_recv() {
            let Some(viewer) = self.runtime.get_mut(self.active) else {
                break;
            };
            if viewer.pending_scene() != Some(loaded.scene_id.as_str()) {
                log::debug!("dropping stale texture for {}", loaded.scene_id);
                continue;
            }
            let ok = match loaded.image {
                Ok(img) => {
                    self.renderer.load_panorama(img);
                    true
                }
                Err(e) => {
                    log::warn!(
                        "{}",
                        self.i18n.tr_with("error.decode_image", &[("err", e.to_string())])
                    );
                    self.renderer.load_panorama(placeholder_image());
                    false
                }
            };
            self.ui.is_loading = false;
            viewer.complete_transition(&loaded.scene_id, ok);
        }

        self.resize.poll(Instant::now(), self.runtime.viewers_mut());

        let Some(viewer) = self.runtime.get_mut(self.active) else {
            return;
        };

        for request in viewer.take_requests() {
            match request {
                HostRequest::LoadTexture { scene_id, path } => {
                    self.ui.is_loading = true;
                    self.loader.load(scene_id, self.loader.resolve(&path));
                }
                HostRequest::OpenLink(url) => {
                    log::info!("hotspot link: {url}");
                    self.ui.last_link = Some(url);
                }
            }
        }

        let renderer = &mut self.renderer;
        let frame = viewer.tick(dt, |view| renderer.render_scene(view));

        match frame {
            Some(Ok(pending)) => {
                let viewer: &Viewer = viewer;
                let ui = &mut self.ui;
                let i18n = &self.i18n;
                let logo = self.logo.as_ref();
                let switcher_title = i18n.tr("switcher.title");
                renderer.present_with_ui(pending, &self.window, |ctx| {
                    draw_ui(ctx, viewer, ui, i18n, actions);
                    hud::draw_overlays(ctx, viewer);
                    hud::draw_switcher(ctx, viewer, &switcher_title, actions);
                    if let Some(info) = viewer.info() {
                        hud::draw_info(ctx, info, logo);
                    }
                });
            }
            Some(Err(wgpu::SurfaceError::Lost)) => {
                let size = renderer.size;
                renderer.resize(size);
            }
            Some(Err(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("surface out of memory");
                actions.push(UiAction::Exit);
            }
            Some(Err(e)) => log::warn!("render error: {e:?}"),
            None => {}
        }
    }

    fn replace_tour(&mut self, tour: TourSource, base_dir: PathBuf) {
        match build_viewer(tour, &self.hub, &self.headset, self.renderer.size) {
            Ok(viewer) => {
                self.runtime.dispose(self.active);
                self.active = self.runtime.insert(viewer);
                self.loader.set_base_dir(base_dir);
                self.refresh_logo();
                self.ui.frozen = false;
                self.ui.rotate_speed = 1.0;
                self.ui.last_link = None;
            }
            Err(e) => log::error!("{}", self.i18n.tr_with("error.load_tour", &[("err", e.to_string())])),
        }
    }

    /// 返回 true 表示退出
    fn apply(&mut self, action: UiAction) -> bool {
        match action {
            UiAction::OpenTour(path) => match TourSource::from_path(&path) {
                Ok(tour) => self.replace_tour(tour, tour_base_dir(Some(&path))),
                Err(e) => log::error!("{}", self.i18n.tr_with("error.load_tour", &[("err", e.to_string())])),
            },
            UiAction::OpenImage(path) => {
                // 单张图片作为只有一个场景的导览
                let id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string());
                let options = self
                    .runtime
                    .get(self.active)
                    .map(|v| v.options().clone())
                    .unwrap_or_default();
                let tour = TourSource {
                    options,
                    scene_group: vec![SceneData::new(id, path.to_string_lossy())],
                    multiple: Vec::new(),
                    vr: true,
                    info: None,
                };
                let base_dir = tour_base_dir(Some(&path));
                self.replace_tour(tour, base_dir);
            }
            UiAction::ToggleFullscreen => {
                self.ui.is_fullscreen = !self.ui.is_fullscreen;
                if self.ui.is_fullscreen {
                    self.window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                } else {
                    self.window.set_fullscreen(None);
                }
            }
            UiAction::ResetView => {
                if let Some(viewer) = self.viewer() {
                    let default = viewer.options().default_look;
                    let (lng, lat) = viewer
                        .current_scene()
                        .map(|s| (s.lng.unwrap_or(default.lng), s.lat.unwrap_or(default.lat)))
                        .unwrap_or((default.lng, default.lat));
                    viewer.set_look(lng, lat);
                    viewer.reset_fov();
                }
            }
            UiAction::SetFrozen(frozen) => {
                self.ui.frozen = frozen;
                if let Some(viewer) = self.viewer() {
                    viewer.set_frozen(frozen);
                }
            }
            UiAction::SetRotateSpeed(speed) => {
                self.ui.rotate_speed = speed;
                if let Some(viewer) = self.viewer() {
                    viewer.set_rotate_speed(speed);
                }
            }
            UiAction::SetVsync(enabled) => {
                self.ui.vsync = enabled;
                self.renderer.set_vsync(enabled);
            }
            UiAction::ToggleGyro => {
                let Some(viewer) = self.runtime.get_mut(self.active) else {
                    return false;
                };
                if viewer.is_gyro_active() {
                    viewer.stop_gyro();
                } else {
                    viewer.start_gyro();
                    self.sensors.publish_current();
                }
            }
            UiAction::EnterVr => {
                if let Some(viewer) = self.viewer() {
                    viewer.enter_vr();
                }
            }
            UiAction::ExitVr => {
                if let Some(viewer) = self.viewer() {
                    viewer.exit_vr();
                }
            }
            UiAction::SelectScene(index) => {
                if let Some(viewer) = self.viewer() {
                    viewer.select_switcher_entry(index);
                }
            }
            UiAction::SetLang(code) => {
                self.i18n = I18n::load(code.clone());
                self.ui.lang = code;
                self.window.set_title(&self.i18n.tr("app.title"));
            }
            UiAction::Exit => {
                self.runtime.dispose(self.active);
                return true;
            }
        }
        false
    }
}

fn control_label(i18n: &I18n, mode: ControlMode) -> String {
    match mode {
        ControlMode::Orbit => i18n.tr("control.orbit"),
        ControlMode::Device => i18n.tr("control.device"),
        ControlMode::Vr => i18n.tr("control.vr"),
    }
}

fn draw_ui(ctx: &egui::Context, viewer: &Viewer, ui_state: &mut UiState, i18n: &I18n, actions: &mut Vec<UiAction>) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(i18n.tr("menu.file"), |ui| {
                if ui.button(i18n.tr("menu.open_tour")).clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_tour(i18n) {
                        actions.push(UiAction::OpenTour(path));
                    }
                }
                if ui.button(i18n.tr("menu.open_image")).clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_image(i18n) {
                        actions.push(UiAction::OpenImage(path));
                    }
                }
                ui.separator();
                if ui.button(i18n.tr("menu.exit")).clicked() {
                    ui.close_menu();
                    actions.push(UiAction::Exit);
                }
            });

            ui.menu_button(i18n.tr("menu.view"), |ui| {
                if ui.button(i18n.tr("view.reset")).clicked() {
                    actions.push(UiAction::ResetView);
                    ui.close_menu();
                }
                let fullscreen_label = if ui_state.is_fullscreen {
                    i18n.tr("view.fullscreen.exit")
                } else {
                    i18n.tr("view.fullscreen.enter")
                };
                if ui.button(fullscreen_label).clicked() {
                    actions.push(UiAction::ToggleFullscreen);
                    ui.close_menu();
                }

                ui.separator();
                let mut frozen = ui_state.frozen;
                if ui.checkbox(&mut frozen, i18n.tr("view.freeze")).changed() {
                    actions.push(UiAction::SetFrozen(frozen));
                }
                ui.menu_button(i18n.tr("view.rotate_speed"), |ui| {
                    let mut speed = ui_state.rotate_speed;
                    let slider = ui.add(egui::Slider::new(&mut speed, 0.1..=5.0).text(i18n.tr("view.multiplier")));
                    if slider.changed() {
                        actions.push(UiAction::SetRotateSpeed(speed));
                    }
                    if ui.button(i18n.tr("view.reset_1_0")).clicked() {
                        actions.push(UiAction::SetRotateSpeed(1.0));
                    }
                });

                ui.separator();
                ui.checkbox(&mut ui_state.show_fps, i18n.tr("view.show_fps"));
                let mut vsync = ui_state.vsync;
                if ui.checkbox(&mut vsync, i18n.tr("view.enable_vsync")).changed() {
                    actions.push(UiAction::SetVsync(vsync));
                }
            });

            ui.menu_button(i18n.tr("menu.sensors"), |ui| {
                let mut gyro = viewer.is_gyro_active();
                if ui.checkbox(&mut gyro, i18n.tr("sensors.gyro")).changed() {
                    actions.push(UiAction::ToggleGyro);
                }
                ui.add_enabled_ui(viewer.is_vr_supported(), |ui| {
                    if viewer.is_vr_presenting() {
                        if ui.button(i18n.tr("sensors.vr.exit")).clicked() {
                            actions.push(UiAction::ExitVr);
                            ui.close_menu();
                        }
                    } else if ui.button(i18n.tr("sensors.vr.enter")).clicked() {
                        actions.push(UiAction::EnterVr);
                        ui.close_menu();
                    }
                });
                ui.separator();
                ui.label(egui::RichText::new(i18n.tr("sensors.help")).small());
            });

            ui.menu_button(i18n.tr("menu.language"), |ui| {
                for (code, name) in LANGS {
                    if ui.radio(ui_state.lang == code, name).clicked() {
                        actions.push(UiAction::SetLang(code.to_string()));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui_state.is_loading {
                ui.label(egui::RichText::new(i18n.tr("status.loading_image")).color(egui::Color32::YELLOW));
                ui.label("|");
            }

            if let Some(scene) = viewer.current_scene() {
                ui.label(i18n.tr_with("status.scene", &[("name", scene.name.clone())]));
                ui.label("|");
            }

            ui.label(format!(
                "{} {}",
                i18n.tr("status.mode_prefix"),
                control_label(i18n, viewer.active_control())
            ));
            ui.label("|");

            let fov = viewer.get_fov();
            ui.label(format!("FOV: {fov:.1}°"));
            ui.label("|");

            {
                let fov_rad = fov.clamp(0.01, 179.9).to_radians();
                let full_frame_diag = (36.0f32 * 36.0 + 24.0 * 24.0).sqrt();
                let equiv_focal = full_frame_diag / (2.0 * (fov_rad * 0.5).tan());
                ui.label(format!("{} {:.1}mm", i18n.tr("status.equiv_focal_prefix"), equiv_focal));
            }

            ui.label("|");
            let look = viewer.get_look();
            ui.label(format!("Lng: {:.1}°", look.lng));
            ui.label("|");
            ui.label(format!("Lat: {:.1}°", look.lat));

            if viewer.is_frozen() {
                ui.label("|");
                ui.label(egui::RichText::new(i18n.tr("status.frozen")).color(egui::Color32::LIGHT_BLUE));
            }

            if let Some(link) = &ui_state.last_link {
                ui.label("|");
                ui.label(i18n.tr_with("status.link", &[("url", link.clone())]));
            }

            if ui_state.show_fps {
                ui.label("|");
                ui.label(egui::RichText::new(format!("FPS: {:.1}", ui_state.fps())).color(egui::Color32::GREEN));
            }
        });
    });
}
