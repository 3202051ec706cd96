use std::time::Instant;

use eframe::egui;
use tracing::info;

use crate::controller::Controller;
use crate::ops::staging::Workspace;
use crate::ui::controls::Control;
use crate::ui::video_player::VideoSurface;

/// A request collected while drawing, applied once the frame is laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
enum UserAction {
    Open,
    Save,
    SaveAs,
    Quit,
    PlayPause,
    Stop,
    DismissError,
}

pub struct MidirollApp {
    controller: Controller,
    video: VideoSurface,
    show_about: bool,
    closing: bool,
    /// Owns the directory the controller stages videos in.
    _workspace: Workspace,
}

impl MidirollApp {
    pub fn new(controller: Controller, workspace: Workspace) -> Self {
        Self {
            controller,
            video: VideoSurface::new(),
            show_about: false,
            closing: false,
            _workspace: workspace,
        }
    }

    fn apply(&mut self, ctx: &egui::Context, action: UserAction) {
        match action {
            UserAction::Open => self.controller.open(),
            UserAction::Save => self.controller.save(false),
            UserAction::SaveAs => self.controller.save(true),
            UserAction::Quit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
            UserAction::PlayPause => self.controller.toggle_play_pause(),
            UserAction::Stop => self.controller.stop(),
            UserAction::DismissError => self.controller.panel.dismiss_error(),
        }
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UserAction>) {
        let panel = &self.controller.panel;
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                let items = [
                    ("Open…", Control::Open, UserAction::Open),
                    ("Save", Control::Save, UserAction::Save),
                    ("Save As…", Control::SaveAs, UserAction::SaveAs),
                ];
                for (label, control, action) in items {
                    if ui
                        .add_enabled(panel.is_enabled(control), egui::Button::new(label))
                        .clicked()
                    {
                        actions.push(action);
                        ui.close_menu();
                    }
                }
                ui.separator();
                if ui
                    .add_enabled(panel.is_enabled(Control::Quit), egui::Button::new("Quit"))
                    .clicked()
                {
                    actions.push(UserAction::Quit);
                    ui.close_menu();
                }
            });
            ui.menu_button("Help", |ui| {
                if ui.button("About").clicked() {
                    self.show_about = true;
                    ui.close_menu();
                }
            });
        });
    }

    fn control_bar(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UserAction>) {
        let converting = self.controller.is_converting();
        let duration = self.controller.session().duration.seconds();
        let panel = &mut self.controller.panel;

        if let Some(message) = panel.last_error.clone() {
            ui.horizontal(|ui| {
                let color = ui.visuals().error_fg_color;
                ui.colored_label(color, message);
                if ui.small_button("Dismiss").clicked() {
                    actions.push(UserAction::DismissError);
                }
            });
        }

        ui.horizontal(|ui| {
            let presentation = panel.play_presentation;
            let play = egui::Button::new(format!("{} {}", presentation.icon(), presentation.label()));
            if ui
                .add_enabled(panel.is_enabled(Control::PlayPause), play)
                .clicked()
            {
                actions.push(UserAction::PlayPause);
            }
            if ui
                .add_enabled(panel.is_enabled(Control::Stop), egui::Button::new("⏹ Stop"))
                .clicked()
            {
                actions.push(UserAction::Stop);
            }

            let enabled = panel.is_enabled(Control::Slider);
            let upper = panel.slider.upper();
            let mut value = panel.slider.value();
            ui.spacing_mut().slider_width = (ui.available_width() - 80.0).max(100.0);
            let response = ui.add_enabled(
                enabled,
                egui::Slider::new(&mut value, 0.0..=upper.max(f64::EPSILON))
                    .show_value(false)
                    .trailing_fill(true),
            );
            if response.changed() {
                panel.slider.set_value(value);
            }
            let position = format_time(panel.slider.value());
            match duration {
                Some(total) if total > 0.0 => {
                    ui.label(format!("{position} / {}", format_time(total)));
                }
                _ => {
                    ui.label(position);
                }
            }
        });

        if converting {
            ui.add(egui::ProgressBar::new(panel.progress as f32).show_percentage());
        }
    }
}

fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

impl eframe::App for MidirollApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.closing {
            info!("window closing");
            self.closing = true;
            self.controller.shutdown();
            self.video.clear();
            return;
        }

        self.controller.pump(Instant::now());
        if let Some(frame) = self.controller.latest_frame() {
            self.video.update_texture(ctx, &frame);
        }
        if !self.controller.panel.player_visible {
            self.video.clear();
        }

        let mut actions = Vec::new();
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ui, &mut actions);
        });
        egui::TopBottomPanel::bottom("control_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.control_bar(ui, &mut actions);
            ui.add_space(4.0);
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let hint = self.controller.panel.hint.as_deref();
                self.video.show(ui, hint);
            });

        egui::Window::new("About")
            .open(&mut self.show_about)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("MIDI Roll");
                ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                ui.label("Turns MIDI files into piano-roll videos.");
            });

        for action in actions {
            self.apply(ctx, action);
        }

        ctx.request_repaint_after(self.controller.refresh_period());
    }
}
