//! Offline playback of Standard MIDI Files through the engine.

use std::path::Path;
use log::debug;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use crate::core::audio::BlockRecorder;
use crate::core::engine::Engine;
use crate::error::{Error, Result};
use crate::messaging::NoteEvent;
use crate::settings::{EngineConfig, EngineSettings};

/// Used when the file carries no tempo event (120 BPM).
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// A note event with an absolute time in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedNoteEvent {
    pub time_secs: f64,
    pub event: NoteEvent,
}

/// Note events of a whole file, merged across tracks and sorted by time.
#[derive(Debug, Clone)]
pub struct MidiFilePlayer {
    events: Vec<TimedNoteEvent>,
    ticks_per_beat: u16,
    tempo_us: u32,
}

impl MidiFilePlayer {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Only the first tempo event is honoured.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(_, _) => return Err(Error::MidiUnsupportedTiming),
        };
        if ticks_per_beat == 0 {
            return Err(Error::MidiFile("zero ticks per beat".into()));
        }

        let tempo_us = smf
            .tracks
            .iter()
            .flat_map(|track| track.iter())
            .find_map(|event| match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
                _ => None,
            })
            .unwrap_or(DEFAULT_TEMPO_US);

        let secs_per_tick = tempo_us as f64 / 1_000_000.0 / ticks_per_beat as f64;
        let mut events = Vec::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Midi { message, .. } = event.kind {
                    let note = match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            Some(NoteEvent::NoteOn { pitch: key.as_int(), velocity: vel.as_int() })
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            Some(NoteEvent::NoteOff { pitch: key.as_int() })
                        }
                        _ => None,
                    };
                    if let Some(event) = note {
                        events.push(TimedNoteEvent { time_secs: tick as f64 * secs_per_tick, event });
                    }
                }
            }
        }
        // stable, so simultaneous events keep file order
        events.sort_by(|a, b| a.time_secs.total_cmp(&b.time_secs));

        debug!(
            "Parsed {} note events, {} ticks per beat, tempo {} us",
            events.len(),
            ticks_per_beat,
            tempo_us
        );
        Ok(Self { events, ticks_per_beat, tempo_us })
    }

    pub fn events(&self) -> &[TimedNoteEvent] {
        &self.events
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn tempo_us(&self) -> u32 {
        self.tempo_us
    }

    pub fn duration_secs(&self) -> f64 {
        self.events.last().map(|e| e.time_secs).unwrap_or(0.0)
    }

    /// Render the file block by block into `out`. Each event is applied
    /// before the block whose time span contains it. Rendering stops once
    /// every event was applied and the last note has faded out. Notes the
    /// file never turns off are released in the block after the last event.
    /// Returns the number of blocks rendered.
    pub fn render(
        &self,
        config: &EngineConfig,
        settings: &EngineSettings,
        out: &mut dyn BlockRecorder,
    ) -> Result<u64> {
        config.validate()?;
        settings.validate()?;

        let mut engine = Engine::new(config);
        let block_secs = engine.block_len() as f64 / config.sample_rate as f64;
        let mut next = 0;
        let mut block_index = 0u64;

        while next < self.events.len() || !engine.registry().is_empty() {
            let block_end = (block_index + 1) as f64 * block_secs;
            if next == self.events.len() {
                let dangling = engine.release_all();
                if dangling > 0 {
                    debug!("Releasing {} notes left on at end of file", dangling);
                }
            }
            while next < self.events.len() && self.events[next].time_secs < block_end {
                engine.apply(self.events[next].event);
                next += 1;
            }
            out.record(engine.render_block(settings))?;
            block_index += 1;
        }
        Ok(block_index)
    }
}
