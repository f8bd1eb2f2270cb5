// hud.rs — 用 egui 画覆盖物与多场景切换条
//
// 视口坐标是物理像素，egui 使用逻辑点，统一除以 pixels_per_point。

use egui::{Align2, Color32, FontId, Pos2, Shape, Stroke};
use glam::Vec3;
use panorama_tour::overlay::OverlayVisual;
use panorama_tour::{Camera, Overlay, TourInfo, Viewer, Viewport};

use crate::panorama::UiAction;

const DOM_FILL: Color32 = Color32::from_rgba_premultiplied(20, 20, 20, 170);
const MESH_FILL: Color32 = Color32::from_rgba_premultiplied(40, 110, 200, 150);
const VIDEO_FILL: Color32 = Color32::from_rgba_premultiplied(10, 10, 10, 200);

struct Projection<'a> {
    camera: &'a Camera,
    viewport: Viewport,
    ppp: f32,
}

impl Projection<'_> {
    /// 背面返回 None
    fn to_screen(&self, world: Vec3) -> Option<Pos2> {
        let ndc = self.camera.project(world);
        if ndc.z > 1.0 || !ndc.is_finite() {
            return None;
        }
        let p = self.viewport.to_pixels(ndc);
        Some(Pos2::new(p.x as f32 / self.ppp, p.y as f32 / self.ppp))
    }

    fn polygon(&self, corners: &[Vec3; 4]) -> Option<Vec<Pos2>> {
        corners.iter().map(|c| self.to_screen(*c)).collect()
    }
}

pub fn draw_overlays(ctx: &egui::Context, viewer: &Viewer) {
    let Some(entry) = viewer.overlays() else {
        return;
    };
    let projection = Projection {
        camera: viewer.camera(),
        viewport: viewer.viewport(),
        ppp: ctx.pixels_per_point(),
    };
    let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Middle, egui::Id::new("overlays")));

    for overlay in entry.overlays().filter(|o| o.is_visible()) {
        draw_overlay(&painter, &projection, overlay);
    }
}

fn draw_overlay(painter: &egui::Painter, projection: &Projection<'_>, overlay: &Overlay) {
    let label = overlay.data.content.as_deref().unwrap_or_default();
    match &overlay.visual {
        OverlayVisual::Dom(dom) => {
            let Some(p) = dom.position() else {
                return;
            };
            let centre = Pos2::new(p.x as f32 / projection.ppp, p.y as f32 / projection.ppp);
            let size = egui::vec2(dom.size().x, dom.size().y) / projection.ppp;
            let rect = egui::Rect::from_center_size(centre, size);
            painter.rect_filled(rect, 6.0, DOM_FILL);
            painter.text(centre, Align2::CENTER_CENTER, label, FontId::proportional(13.0), Color32::WHITE);
        }
        OverlayVisual::Mesh(quad) => {
            if let Some(points) = projection.polygon(&quad.corners) {
                let centre = centroid(&points);
                painter.add(Shape::convex_polygon(points, MESH_FILL, Stroke::new(1.0, Color32::WHITE)));
                painter.text(centre, Align2::CENTER_CENTER, label, FontId::proportional(13.0), Color32::WHITE);
            }
        }
        OverlayVisual::Video(video) => {
            if let Some(points) = projection.polygon(&video.quad.corners) {
                let centre = centroid(&points);
                painter.add(Shape::convex_polygon(points, VIDEO_FILL, Stroke::new(1.0, Color32::GRAY)));
                let glyph = if video.is_playing() { "❚❚" } else { "▶" };
                painter.text(centre, Align2::CENTER_CENTER, glyph, FontId::proportional(22.0), Color32::WHITE);
            }
        }
        OverlayVisual::Frame(frame) => {
            if let Some(points) = projection.polygon(&frame.quad.corners) {
                let centre = centroid(&points);
                // 没有贴图时用色相表示当前帧
                let hue = frame.frame() as f32 / frame.frames as f32;
                let fill: Color32 = egui::ecolor::Hsva::new(hue, 0.6, 0.8, 0.6).into();
                painter.add(Shape::convex_polygon(points, fill, Stroke::NONE));
                painter.text(centre, Align2::CENTER_CENTER, label, FontId::proportional(12.0), Color32::WHITE);
            }
        }
        OverlayVisual::Sprite(sprite) => {
            let [r, g, b] = sprite.settings.color.map(|c| (c * 255.0) as u8);
            let color = Color32::from_rgba_unmultiplied(r, g, b, 180);
            let radius = (sprite.settings.size / 10.0).max(1.0);
            let bounds = painter.clip_rect();
            for p in sprite.particles() {
                if let Some(pos) = projection.to_screen(*p) {
                    if bounds.contains(pos) {
                        painter.circle_filled(pos, radius, color);
                    }
                }
            }
        }
    }
}

fn centroid(points: &[Pos2]) -> Pos2 {
    let sum = points.iter().fold(egui::Vec2::ZERO, |acc, p| acc + p.to_vec2());
    (sum / points.len().max(1) as f32).to_pos2()
}

/// 底部缩略图条，点击的条目作为动作返回
pub fn draw_switcher(ctx: &egui::Context, viewer: &Viewer, title: &str, actions: &mut Vec<UiAction>) {
    let Some(switcher) = viewer.switcher() else {
        return;
    };
    egui::Window::new(title)
        .anchor(Align2::CENTER_BOTTOM, egui::vec2(0.0, -36.0))
        .collapsible(true)
        .resizable(false)
        .show(ctx, |ui| {
            ui.add_enabled_ui(switcher.is_enabled(), |ui| {
                ui.horizontal(|ui| {
                    for (i, item) in switcher.items().iter().enumerate() {
                        let name = if item.name.is_empty() { &item.id } else { &item.name };
                        let active = switcher.active_index() == Some(i);
                        if ui.selectable_label(active, name.as_str()).clicked() && !active {
                            actions.push(UiAction::SelectScene(i));
                        }
                    }
                });
            });
        });
}

const LOGO_WIDTH: f32 = 70.0;

/// 左下角署名：logo 在上，作者名在下
pub fn draw_info(ctx: &egui::Context, info: &TourInfo, logo: Option<&egui::TextureHandle>) {
    egui::Area::new("tour-info")
        .anchor(Align2::LEFT_BOTTOM, egui::vec2(12.0, -36.0))
        .interactable(false)
        .show(ctx, |ui| {
            if let Some(texture) = logo {
                let [w, h] = texture.size();
                let height = LOGO_WIDTH * h as f32 / w.max(1) as f32;
                let (rect, _) = ui.allocate_exact_size(egui::vec2(LOGO_WIDTH, height), egui::Sense::hover());
                let uv = egui::Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                ui.painter().image(texture.id(), rect, uv, Color32::WHITE);
            }
            ui.label(egui::RichText::new(&info.author).color(Color32::WHITE).strong());
        });
}
