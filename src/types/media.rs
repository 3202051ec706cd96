/// A single sounding note, in seconds from the start of the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub start: f64,
    pub end: f64,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
}

impl Note {
    pub fn is_active_at(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

/// Note model produced by the MIDI parser and consumed by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiScore {
    /// Sorted by start time, then pitch.
    pub notes: Vec<Note>,
    pub duration_secs: f64,
}

impl MidiScore {
    /// Notes overlapping the half-open window `[from, to)`.
    pub fn notes_between(&self, from: f64, to: f64) -> impl Iterator<Item = &Note> {
        self.notes
            .iter()
            .take_while(move |n| n.start < to)
            .filter(move |n| n.end > from)
    }
}

/// Raw RGBA frame pulled from the playback pipeline.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
