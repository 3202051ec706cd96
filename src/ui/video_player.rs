use eframe::egui;

use crate::types::media::VideoFrame;

/// Displays the latest frame pulled from the playback pipeline.
#[derive(Default)]
pub struct VideoSurface {
    texture: Option<egui::TextureHandle>,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the egui texture from a decoded frame.
    pub fn update_texture(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        let size = [frame.width as usize, frame.height as usize];
        if frame.data.len() != size[0] * size[1] * 4 {
            return;
        }
        let image = egui::ColorImage::from_rgba_unmultiplied(size, &frame.data);
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("video_frame", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    pub fn clear(&mut self) {
        self.texture = None;
    }

    pub fn show(&self, ui: &mut egui::Ui, hint: Option<&str>) {
        ui.vertical_centered(|ui| match &self.texture {
            Some(texture) => {
                ui.add(egui::Image::new(texture).shrink_to_fit());
            }
            None => {
                ui.add_space(ui.available_height() / 2.0 - 10.0);
                ui.label(hint.unwrap_or("No frame loaded"));
            }
        });
    }
}
