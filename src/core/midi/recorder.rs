//! Capture of played notes as a Standard MIDI File.

use std::path::Path;
use std::time::Instant;
use log::info;
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use crate::error::Result;
use crate::messaging::NoteEvent;

pub const TICKS_PER_BEAT: u16 = 480;
/// 120 BPM.
pub const TEMPO_US_PER_BEAT: u32 = 500_000;

/// A completed note, timed in seconds from the start of recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_secs: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Copy)]
struct OpenNote {
    pitch: u8,
    velocity: u8,
    started: Instant,
}

/// Pairs note-ons with note-offs by wall clock.
#[derive(Debug, Clone)]
pub struct NoteLogRecorder {
    origin: Instant,
    open: Vec<OpenNote>,
    notes: Vec<RecordedNote>,
}

impl Default for NoteLogRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteLogRecorder {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(origin: Instant) -> Self {
        Self {
            origin,
            open: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn record(&mut self, event: NoteEvent) {
        self.record_at(event, Instant::now());
    }

    /// A note-off completes the first open note of the same pitch;
    /// unmatched note-offs are dropped.
    pub fn record_at(&mut self, event: NoteEvent, at: Instant) {
        match event {
            NoteEvent::NoteOn { pitch, velocity } => {
                self.open.push(OpenNote { pitch, velocity, started: at });
            }
            NoteEvent::NoteOff { pitch } => {
                if let Some(idx) = self.open.iter().position(|n| n.pitch == pitch) {
                    let note = self.open.remove(idx);
                    self.complete(note, at);
                }
            }
        }
    }

    fn complete(&mut self, note: OpenNote, at: Instant) {
        let start_secs = note.started.saturating_duration_since(self.origin).as_secs_f64();
        let duration_secs = at.saturating_duration_since(note.started).as_secs_f64();
        self.notes.push(RecordedNote {
            pitch: note.pitch,
            velocity: note.velocity,
            start_secs,
            duration_secs,
        });
    }

    /// Completed notes in completion order.
    pub fn notes(&self) -> &[RecordedNote] {
        &self.notes
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Close every still-held note at `at` and return all notes.
    pub fn finish_at(mut self, at: Instant) -> Vec<RecordedNote> {
        for note in std::mem::take(&mut self.open) {
            self.complete(note, at);
        }
        self.notes
    }

    pub fn finish(self) -> Vec<RecordedNote> {
        self.finish_at(Instant::now())
    }

    /// Close held notes now and write everything to `path`.
    pub fn save(self, path: impl AsRef<Path>) -> Result<Vec<RecordedNote>> {
        let path = path.as_ref();
        let notes = self.finish();
        std::fs::write(path, encode_smf(&notes)?)?;
        info!("Saved {} notes to {}", notes.len(), path.display());
        Ok(notes)
    }
}

fn secs_to_ticks(secs: f64) -> u64 {
    let ticks_per_sec = TICKS_PER_BEAT as f64 * 1_000_000.0 / TEMPO_US_PER_BEAT as f64;
    (secs * ticks_per_sec).round().max(0.0) as u64
}

/// Encode notes as a single-track SMF on channel 0.
pub fn encode_smf(notes: &[RecordedNote]) -> Result<Vec<u8>> {
    // (tick, is_on, pitch, velocity); offs sort before ons at equal ticks
    let mut timeline: Vec<(u64, bool, u8, u8)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let start = secs_to_ticks(note.start_secs);
        let end = secs_to_ticks(note.start_secs + note.duration_secs);
        timeline.push((start, true, note.pitch.min(127), note.velocity.min(127)));
        timeline.push((end, false, note.pitch.min(127), 0));
    }
    timeline.sort_by_key(|&(tick, is_on, _, _)| (tick, is_on));

    let max_delta: u64 = (1 << 28) - 1;
    let mut track = Vec::with_capacity(timeline.len() + 2);
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(TEMPO_US_PER_BEAT.into())),
    });

    let mut last_tick = 0u64;
    for (tick, is_on, pitch, velocity) in timeline {
        let delta = (tick - last_tick).min(max_delta) as u32;
        last_tick = tick;
        let key = pitch.into();
        let message = if is_on {
            MidiMessage::NoteOn { key, vel: velocity.into() }
        } else {
            MidiMessage::NoteOff { key, vel: 0u8.into() }
        };
        track.push(TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi { channel: 0u8.into(), message },
        });
    }
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(TICKS_PER_BEAT.into())),
        tracks: vec![track],
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pairs_on_and_off_by_first_open_pitch() {
        let t0 = Instant::now();
        let mut log = NoteLogRecorder::starting_at(t0);
        log.record_at(NoteEvent::NoteOn { pitch: 60, velocity: 100 }, t0);
        log.record_at(NoteEvent::NoteOn { pitch: 60, velocity: 50 }, t0 + Duration::from_millis(250));
        log.record_at(NoteEvent::NoteOff { pitch: 60 }, t0 + Duration::from_secs(1));

        assert_eq!(log.notes().len(), 1);
        let note = log.notes()[0];
        assert_eq!(note.velocity, 100);
        assert_eq!(note.start_secs, 0.0);
        assert!((note.duration_secs - 1.0).abs() < 1e-9);
        assert_eq!(log.open_count(), 1);
    }

    #[test]
    fn unmatched_off_is_ignored() {
        let t0 = Instant::now();
        let mut log = NoteLogRecorder::starting_at(t0);
        log.record_at(NoteEvent::NoteOff { pitch: 40 }, t0);
        assert!(log.notes().is_empty());
    }

    #[test]
    fn finish_closes_held_notes() {
        let t0 = Instant::now();
        let mut log = NoteLogRecorder::starting_at(t0);
        log.record_at(NoteEvent::NoteOn { pitch: 64, velocity: 90 }, t0 + Duration::from_millis(500));
        let notes = log.finish_at(t0 + Duration::from_secs(2));
        assert_eq!(notes.len(), 1);
        assert!((notes[0].start_secs - 0.5).abs() < 1e-9);
        assert!((notes[0].duration_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn smf_contains_timed_note_pairs() {
        let notes = [
            RecordedNote { pitch: 69, velocity: 127, start_secs: 0.0, duration_secs: 0.5 },
            RecordedNote { pitch: 72, velocity: 80, start_secs: 0.5, duration_secs: 1.0 },
        ];
        let bytes = encode_smf(&notes).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert!(matches!(smf.header.timing, Timing::Metrical(t) if t.as_int() == TICKS_PER_BEAT));
        assert_eq!(smf.tracks.len(), 1);

        let mut tick = 0u32;
        let mut events = Vec::new();
        for event in &smf.tracks[0] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = &event.kind {
                match *message {
                    MidiMessage::NoteOn { key, vel } => events.push((tick, true, key.as_int(), vel.as_int())),
                    MidiMessage::NoteOff { key, .. } => events.push((tick, false, key.as_int(), 0)),
                    _ => {}
                }
            }
        }
        // 960 ticks per second at 120 BPM
        assert_eq!(
            events,
            vec![
                (0, true, 69, 127),
                (480, false, 69, 0),
                (480, true, 72, 80),
                (1440, false, 72, 0),
            ]
        );
    }

    #[test]
    fn save_writes_a_parsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.mid");
        let mut log = NoteLogRecorder::new();
        log.record(NoteEvent::NoteOn { pitch: 60, velocity: 100 });
        log.record(NoteEvent::NoteOff { pitch: 60 });
        let notes = log.save(&path).unwrap();
        assert_eq!(notes.len(), 1);
        let data = std::fs::read(&path).unwrap();
        assert!(Smf::parse(&data).is_ok());
    }
}
