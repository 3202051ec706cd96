use std::collections::HashMap;
use std::fs;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

use crate::error::ParseError;
use crate::types::media::{MidiScore, Note};

/// Microseconds per quarter note when a file carries no tempo event (120 BPM).
const DEFAULT_TEMPO_US: u32 = 500_000;

/// Turns a MIDI file into the note model the renderer draws.
pub trait MidiParser: Send + Sync {
    fn parse(&self, source: &Path) -> Result<MidiScore, ParseError>;
}

/// Standard MIDI File parser backed by `midly`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmfParser;

impl MidiParser for SmfParser {
    fn parse(&self, source: &Path) -> Result<MidiScore, ParseError> {
        let bytes = fs::read(source).map_err(|e| ParseError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let score = score_from_bytes(source, &bytes)?;
        debug!(
            notes = score.notes.len(),
            duration = score.duration_secs,
            "parsed {}",
            source.display()
        );
        Ok(score)
    }
}

/// Tick to seconds conversion, piecewise over tempo changes.
struct TempoMap {
    ticks_per_quarter: Option<f64>,
    /// Fixed seconds per tick for SMPTE timecode files.
    secs_per_tick: f64,
    /// (tick, seconds at tick, microseconds per quarter from tick on)
    segments: Vec<(u64, f64, u32)>,
}

impl TempoMap {
    fn new(smf: &Smf) -> Self {
        match smf.header.timing {
            Timing::Metrical(ppq) => {
                let ppq = f64::from(ppq.as_int().max(1));
                let mut changes: Vec<(u64, u32)> = Vec::new();
                for track in &smf.tracks {
                    let mut tick = 0_u64;
                    for event in track {
                        tick = tick.saturating_add(u64::from(event.delta.as_int()));
                        if let TrackEventKind::Meta(MetaMessage::Tempo(us_per_q)) = event.kind {
                            changes.push((tick, us_per_q.as_int()));
                        }
                    }
                }
                changes.sort_by_key(|(tick, _)| *tick);

                let mut segments: Vec<(u64, f64, u32)> = vec![(0, 0.0, DEFAULT_TEMPO_US)];
                for (tick, tempo) in changes {
                    let Some(&(last_tick, last_secs, last_tempo)) = segments.last() else {
                        continue;
                    };
                    if last_tick == tick {
                        if let Some(last) = segments.last_mut() {
                            last.2 = tempo;
                        }
                        continue;
                    }
                    let secs = last_secs + span_secs(tick - last_tick, last_tempo, ppq);
                    segments.push((tick, secs, tempo));
                }
                Self {
                    ticks_per_quarter: Some(ppq),
                    secs_per_tick: 0.0,
                    segments,
                }
            }
            Timing::Timecode(fps, subframes) => Self {
                ticks_per_quarter: None,
                secs_per_tick: 1.0 / (f64::from(fps.as_f32()) * f64::from(subframes.max(1))),
                segments: Vec::new(),
            },
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let Some(ppq) = self.ticks_per_quarter else {
            return tick as f64 * self.secs_per_tick;
        };
        let index = self.segments.partition_point(|(t, _, _)| *t <= tick);
        match self.segments.get(index.saturating_sub(1)) {
            Some(&(seg_tick, seg_secs, tempo)) => seg_secs + span_secs(tick - seg_tick, tempo, ppq),
            None => span_secs(tick, DEFAULT_TEMPO_US, ppq),
        }
    }
}

fn span_secs(ticks: u64, tempo_us: u32, ppq: f64) -> f64 {
    ticks as f64 * f64::from(tempo_us) / ppq / 1_000_000.0
}

/// Build a score from raw SMF bytes; `path` is only used for error context.
pub fn score_from_bytes(path: &Path, bytes: &[u8]) -> Result<MidiScore, ParseError> {
    let smf = Smf::parse(bytes).map_err(|e| ParseError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let tempo = TempoMap::new(&smf);

    let mut notes = Vec::<Note>::new();
    let mut last_tick = 0_u64;

    for track in &smf.tracks {
        let mut tick = 0_u64;
        let mut active: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
        let mut close = |channel: u8, pitch: u8, start_tick: u64, end_tick: u64, velocity: u8| {
            notes.push(Note {
                start: tempo.seconds_at(start_tick),
                end: tempo.seconds_at(end_tick),
                pitch,
                velocity,
                channel,
            });
        };

        for event in track {
            tick = tick.saturating_add(u64::from(event.delta.as_int()));
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    active
                        .entry((channel, key.as_int()))
                        .or_default()
                        .push((tick, vel.as_int()));
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let pitch = key.as_int();
                    if let Some(starts) = active.get_mut(&(channel, pitch))
                        && let Some((start_tick, velocity)) = starts.pop()
                    {
                        close(channel, pitch, start_tick, tick, velocity);
                    }
                }
                _ => {}
            }
        }

        // Notes still held at the end of the track are closed there.
        for ((channel, pitch), starts) in active {
            for (start_tick, velocity) in starts {
                close(channel, pitch, start_tick, tick, velocity);
            }
        }
        last_tick = last_tick.max(tick);
    }

    if notes.is_empty() {
        return Err(ParseError::NoNotes {
            path: path.to_path_buf(),
        });
    }

    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));
    let duration_secs = notes
        .iter()
        .map(|n| n.end)
        .fold(tempo.seconds_at(last_tick), f64::max);

    Ok(MidiScore {
        notes,
        duration_secs,
    })
}
