use egui_macroquad::egui;

use crate::input::InputMode;
use crate::session::Session;

pub const PANEL_WIDTH: f32 = 200.0;
pub const STATUS_HEIGHT: f32 = 24.0;

/// 控制面板一帧内产生的操作, 由渲染器在 egui 回调之外执行
#[derive(Debug, Default)]
pub struct ControlPanelActions {
    pub select_mode: Option<InputMode>,
    pub select_file: bool,
    pub start: bool,
    pub stop: bool,
}

pub struct ControlPanel {
    pub render_fps: f64,
    styled: bool,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            render_fps: 0.0,
            styled: false,
        }
    }

    fn set_style(&mut self, ctx: &egui::Context) {
        if self.styled {
            return;
        }
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = egui::Color32::from_rgb(28, 30, 38);
        visuals.override_text_color = Some(egui::Color32::from_rgb(230, 240, 250));
        ctx.set_visuals(visuals);
        self.styled = true;
    }

    pub fn show(&mut self, ctx: &egui::Context, session: &Session) -> ControlPanelActions {
        self.set_style(ctx);
        let mut actions = ControlPanelActions::default();
        let controls = session.controls();

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(STATUS_HEIGHT)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(session.status());
                });
            });

        egui::SidePanel::left("control_panel")
            .exact_width(PANEL_WIDTH)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Controls");
                ui.separator();

                ui.label("Detection Mode:");
                let mut mode = session.mode();
                for m in InputMode::ALL {
                    if ui.radio_value(&mut mode, m, m.label()).changed() {
                        actions.select_mode = Some(m);
                    }
                }

                ui.add_space(8.0);
                if ui
                    .add_enabled(controls.file_enabled, egui::Button::new("Select File"))
                    .clicked()
                {
                    actions.select_file = true;
                }
                if let Some(path) = session.input() {
                    if let Some(name) = path.file_name() {
                        ui.small(name.to_string_lossy().into_owned());
                    }
                }

                ui.add_space(8.0);
                if ui
                    .add_enabled(controls.start_enabled, egui::Button::new("Start Detection"))
                    .clicked()
                {
                    actions.start = true;
                }
                if ui
                    .add_enabled(controls.stop_enabled, egui::Button::new("Stop Detection"))
                    .clicked()
                {
                    actions.stop = true;
                }

                ui.separator();
                ui.label("Detected Objects:");
                ui.colored_label(
                    egui::Color32::from_rgb(100, 160, 255),
                    session.display().labels_text(),
                );

                ui.separator();
                ui.small(format!("Render FPS: {:.1}", self.render_fps));
            });

        actions
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}
