use std::fs;
use std::path::Path;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use crate::error::RenderError;
use crate::ops::conversion::{CancelToken, ProgressSink};
use crate::types::config::RenderSettings;
use crate::types::media::MidiScore;

/// Turns a parsed score into a playable video file.
pub trait VideoRenderer: Send + Sync {
    fn render(
        &self,
        score: &MidiScore,
        output: &Path,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), RenderError>;
}

const BACKGROUND: Rgba<u8> = Rgba([24, 24, 28, 255]);
const BLACK_KEY_LANE: Rgba<u8> = Rgba([18, 18, 21, 255]);
const PLAYHEAD: Rgba<u8> = Rgba([240, 240, 240, 255]);

const CHANNEL_COLORS: [[u8; 3]; 8] = [
    [82, 170, 255],
    [255, 140, 66],
    [120, 220, 120],
    [240, 90, 120],
    [190, 130, 255],
    [250, 220, 80],
    [80, 220, 210],
    [230, 160, 200],
];

/// Fraction of the frame width left of the playhead.
const PLAYHEAD_FRACTION: f64 = 0.25;

/// Number of frames needed to cover `duration_secs`, at least one.
pub fn frame_count(duration_secs: f64, fps: u32) -> u64 {
    ((duration_secs.max(0.0) * f64::from(fps)).ceil() as u64).max(1)
}

/// Draws single piano-roll frames: time runs left to right, pitch bottom to top.
#[derive(Debug, Clone)]
pub struct PianoRoll {
    settings: RenderSettings,
}

impl PianoRoll {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    fn key_range(&self) -> (u8, u8) {
        let low = self.settings.lowest_key.min(127);
        let high = self.settings.highest_key.clamp(low, 127);
        (low, high)
    }

    fn row_height(&self) -> f64 {
        let (low, high) = self.key_range();
        f64::from(self.settings.height) / f64::from(high - low + 1)
    }

    /// Top pixel row of `pitch`, or `None` when it is outside the drawn range.
    pub fn row_top(&self, pitch: u8) -> Option<u32> {
        let (low, high) = self.key_range();
        if pitch < low || pitch > high {
            return None;
        }
        Some((f64::from(high - pitch) * self.row_height()).floor() as u32)
    }

    pub fn playhead_x(&self) -> u32 {
        (f64::from(self.settings.width) * PLAYHEAD_FRACTION) as u32
    }

    pub fn draw(&self, score: &MidiScore, time: f64) -> RgbaImage {
        let RenderSettings { width, height, .. } = self.settings;
        let mut frame = RgbaImage::from_pixel(width, height, BACKGROUND);
        let (low, high) = self.key_range();
        let row_height = self.row_height();

        for pitch in low..=high {
            if is_black_key(pitch) {
                let top = (f64::from(high - pitch) * row_height).floor() as u32;
                let bottom = (f64::from(high - pitch + 1) * row_height).ceil() as u32;
                fill_rect(&mut frame, 0, top, width, bottom, BLACK_KEY_LANE);
            }
        }

        let window = self.settings.window_secs.max(0.1);
        let start = time - window * PLAYHEAD_FRACTION;
        let px_per_sec = f64::from(width) / window;
        for note in score.notes_between(start, start + window) {
            let Some(top) = self.row_top(note.pitch) else {
                continue;
            };
            let bottom = (f64::from(high - note.pitch + 1) * row_height).ceil() as u32;
            let x0 = ((note.start - start) * px_per_sec).max(0.0) as u32;
            let x1 = ((note.end - start) * px_per_sec).min(f64::from(width)).ceil() as u32;
            let color = note_color(note.channel, note.velocity, note.is_active_at(time));
            fill_rect(&mut frame, x0, top, x1.max(x0 + 1), bottom.max(top + 1), color);
        }

        let x = self.playhead_x();
        fill_rect(&mut frame, x, 0, x + 2, height, PLAYHEAD);
        frame
    }
}

fn is_black_key(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}

fn note_color(channel: u8, velocity: u8, sounding: bool) -> Rgba<u8> {
    let [r, g, b] = CHANNEL_COLORS[usize::from(channel) % CHANNEL_COLORS.len()];
    let mut scale = 0.45 + 0.55 * f64::from(velocity.min(127)) / 127.0;
    if !sounding {
        scale *= 0.7;
    }
    let shade = |c: u8| (f64::from(c) * scale).round().min(255.0) as u8;
    Rgba([shade(r), shade(g), shade(b), 255])
}

fn fill_rect(frame: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    let x1 = x1.min(frame.width());
    let y1 = y1.min(frame.height());
    for y in y0..y1 {
        for x in x0..x1 {
            frame.put_pixel(x, y, color);
        }
    }
}

/// Sets its pipeline to NULL however rendering ends.
struct PipelineGuard(gst::Pipeline);

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        let _ = self.0.set_state(gst::State::Null);
    }
}

/// Encodes piano-roll frames to H.264/MP4 through an `appsrc` pipeline.
#[derive(Debug, Clone)]
pub struct PianoRollRenderer {
    roll: PianoRoll,
    fps: u32,
}

impl PianoRollRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        let fps = settings.fps.max(1);
        Self {
            roll: PianoRoll::new(settings),
            fps,
        }
    }

    fn frame_time(&self, index: u64) -> gst::ClockTime {
        gst::ClockTime::from_nseconds(index * 1_000_000_000 / u64::from(self.fps))
    }

    fn build_pipeline(&self, output: &Path) -> Result<(PipelineGuard, gst_app::AppSrc), RenderError> {
        gst::init().map_err(|e| RenderError::Pipeline(e.to_string()))?;
        let location = output
            .to_str()
            .ok_or_else(|| RenderError::Pipeline(format!("non UTF-8 path {}", output.display())))?;

        let pipeline = gst::parse::launch(
            "appsrc name=src ! videoconvert ! x264enc speed-preset=ultrafast ! mp4mux ! filesink name=sink",
        )
        .map_err(|e| RenderError::Pipeline(e.to_string()))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| RenderError::Pipeline("launch did not produce a pipeline".to_string()))?;
        let pipeline = PipelineGuard(pipeline);

        let sink = pipeline
            .0
            .by_name("sink")
            .ok_or_else(|| RenderError::Pipeline("missing filesink".to_string()))?;
        sink.set_property("location", location);

        let appsrc = pipeline
            .0
            .by_name("src")
            .and_then(|e| e.downcast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| RenderError::Pipeline("missing appsrc".to_string()))?;
        let info = gst_video::VideoInfo::builder(
            gst_video::VideoFormat::Rgba,
            self.roll.settings.width,
            self.roll.settings.height,
        )
        .fps(gst::Fraction::new(self.fps as i32, 1))
        .build()
        .map_err(|e| RenderError::Pipeline(e.to_string()))?;
        let caps = info
            .to_caps()
            .map_err(|e| RenderError::Pipeline(e.to_string()))?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_block(true);

        Ok((pipeline, appsrc))
    }
}

fn check_bus(bus: &gst::Bus) -> Result<(), RenderError> {
    if let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error])
        && let gst::MessageView::Error(err) = msg.view()
    {
        return Err(RenderError::Pipeline(err.error().to_string()));
    }
    Ok(())
}

/// Size of the file the sink wrote; a missing output is an I/O failure.
fn encoded_size(output: &Path) -> Result<u64, RenderError> {
    Ok(fs::metadata(output)?.len())
}

impl VideoRenderer for PianoRollRenderer {
    fn render(
        &self,
        score: &MidiScore,
        output: &Path,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        let total = frame_count(score.duration_secs, self.fps);
        info!(frames = total, fps = self.fps, "rendering {}", output.display());

        let (pipeline, appsrc) = self.build_pipeline(output)?;
        let bus = pipeline
            .0
            .bus()
            .ok_or_else(|| RenderError::Pipeline("pipeline has no bus".to_string()))?;
        pipeline
            .0
            .set_state(gst::State::Playing)
            .map_err(|e| RenderError::Pipeline(e.to_string()))?;

        for index in 0..total {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            let time = index as f64 / f64::from(self.fps);
            let frame = self.roll.draw(score, time);
            let mut buffer = gst::Buffer::from_mut_slice(frame.into_raw());
            if let Some(buffer) = buffer.get_mut() {
                buffer.set_pts(self.frame_time(index));
                buffer.set_duration(self.frame_time(index + 1) - self.frame_time(index));
            }
            appsrc
                .push_buffer(buffer)
                .map_err(|e| RenderError::Pipeline(format!("frame {index} rejected: {e:?}")))?;
            check_bus(&bus)?;
            progress.report((index + 1) as f64 / total as f64);
        }

        appsrc
            .end_of_stream()
            .map_err(|e| RenderError::Pipeline(format!("end of stream rejected: {e:?}")))?;
        for msg in bus.iter_timed(gst::ClockTime::NONE) {
            match msg.view() {
                gst::MessageView::Eos(..) => break,
                gst::MessageView::Error(err) => {
                    return Err(RenderError::Pipeline(err.error().to_string()));
                }
                _ => {}
            }
        }
        let bytes = encoded_size(output)?;
        debug!(bytes, "render finished");
        Ok(())
    }
}
