mod control_panel;

use std::time::Instant;

use control_panel::{ControlPanel, ControlPanelActions, PANEL_WIDTH, STATUS_HEIGHT};
use macroquad::prelude::*;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};

use crate::session::{Notice, Session};

pub const WINDOW_TITLE: &str = "Object Detection System";
pub const WINDOW_WIDTH: i32 = 1000;
pub const WINDOW_HEIGHT: i32 = 700;

/// 主窗口: 左侧控制面板, 右侧画布, 底部状态栏
pub struct Renderer {
    session: Session,
    control_panel: ControlPanel,

    texture: Option<Texture2D>,
    revision: u64,

    render_count: u64,
    render_last: Instant,
}

impl Renderer {
    pub fn new(session: Session) -> Self {
        log::info!("🎨 渲染器启动");
        Self {
            session,
            control_panel: ControlPanel::new(),
            texture: None,
            revision: 0,
            render_count: 0,
            render_last: Instant::now(),
        }
    }

    /// 取工作线程结果, 按需重新上传纹理, 弹出提示
    pub fn update(&mut self) {
        self.session.poll();

        let display = self.session.display();
        if display.revision() != self.revision {
            self.revision = display.revision();
            if let Some(img) = display.image() {
                let texture =
                    Texture2D::from_rgba8(img.width() as u16, img.height() as u16, img.as_raw());
                texture.set_filter(FilterMode::Linear);
                self.texture = Some(texture);
            }
        }

        while let Some(notice) = self.session.take_notice() {
            show_notice(&notice);
        }
    }

    pub fn draw(&mut self) {
        clear_background(Color::from_rgba(20, 20, 30, 255));

        // 画布区域: 控制面板右侧, 状态栏上方
        let area_x = PANEL_WIDTH;
        let area_w = screen_width() - PANEL_WIDTH;
        let area_h = screen_height() - STATUS_HEIGHT;

        if let Some(texture) = &self.texture {
            // 图像已在会话中缩放到画布内, 这里只在窗口更小时再缩小
            let scale = (area_w / texture.width())
                .min(area_h / texture.height())
                .min(1.0);
            let w = texture.width() * scale;
            let h = texture.height() * scale;
            draw_texture_ex(
                texture,
                area_x + (area_w - w) / 2.0,
                (area_h - h) / 2.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(w, h)),
                    ..Default::default()
                },
            );
        }

        // FPS统计
        self.render_count += 1;
        let now = Instant::now();
        if now.duration_since(self.render_last).as_secs() >= 1 {
            self.control_panel.render_fps =
                self.render_count as f64 / now.duration_since(self.render_last).as_secs_f64();
            self.render_count = 0;
            self.render_last = now;
        }
    }

    pub fn draw_egui(&mut self) {
        let mut actions = ControlPanelActions::default();
        egui_macroquad::ui(|egui_ctx| {
            actions = self.control_panel.show(egui_ctx, &self.session);
        });
        egui_macroquad::draw();

        self.apply(actions);
    }

    fn apply(&mut self, actions: ControlPanelActions) {
        if let Some(mode) = actions.select_mode {
            self.session.select_mode(mode);
        }
        if actions.select_file {
            let path = pick_file(&self.session);
            self.session.select_file(path);
        }
        if actions.start {
            self.session.start();
        }
        if actions.stop {
            self.session.stop();
        }
    }

    pub fn shutdown(&mut self) {
        self.session.stop();
    }
}

/// 文件对话框, 过滤器与扩展名白名单一致 (大小写都列出)
fn pick_file(session: &Session) -> Option<std::path::PathBuf> {
    let mut dialog = FileDialog::new();
    if let Some((name, exts)) = session.mode().dialog_filter() {
        let all: Vec<String> = exts
            .iter()
            .flat_map(|e| [e.to_string(), e.to_ascii_uppercase()])
            .collect();
        dialog = dialog.add_filter(name, &all);
    }
    dialog.pick_file()
}

fn show_notice(notice: &Notice) {
    let level = match notice {
        Notice::Info(_) => MessageLevel::Info,
        Notice::Error(_) => MessageLevel::Error,
    };
    MessageDialog::new()
        .set_level(level)
        .set_title(notice.title())
        .set_description(notice.message())
        .set_buttons(MessageButtons::Ok)
        .show();
}
