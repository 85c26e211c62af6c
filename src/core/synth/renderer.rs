use std::f64::consts::PI;
use crate::core::oscillator::block_gain;
use crate::settings::{EngineConfig, EngineSettings};
use super::NoteRegistry;

/// Velocity divisor; keeps a handful of loud notes near full scale.
pub const VELOCITY_SCALE: f64 = 400.0;

/// Block counter driving the oscillator phase.
///
/// Reset whenever the registry runs empty so the absolute sample index
/// stays small over long sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderClock {
    block: u64,
}

impl RenderClock {
    pub fn value(&self) -> u64 {
        self.block
    }

    pub fn advance(&mut self) {
        self.block += 1;
    }

    pub fn reset(&mut self) {
        self.block = 0;
    }
}

/// Synthesizes one fixed-size mono block per call from the registry.
pub struct BlockRenderer {
    sample_rate: u32,
    buffer: Vec<f32>,
    clock: RenderClock,
}

impl BlockRenderer {
    pub fn new(sample_rate: u32, block_len: usize) -> Self {
        Self {
            sample_rate,
            buffer: vec![0.0; block_len],
            clock: RenderClock::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.sample_rate, config.block_len())
    }

    pub fn block_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn clock(&self) -> RenderClock {
        self.clock
    }

    /// The most recently rendered block.
    pub fn last_block(&self) -> &[f32] {
        &self.buffer
    }

    /// Render the next block.
    ///
    /// Afterwards every note's envelope has advanced, notes whose release
    /// block was just rendered are gone, and the clock has moved on (or
    /// been reset if the registry is now empty).
    pub fn render(&mut self, registry: &mut NoteRegistry, settings: &EngineSettings) -> &[f32] {
        self.buffer.fill(0.0);

        let len = self.buffer.len();
        let start = self.clock.value() * len as u64;
        let sample_rate = self.sample_rate as f64;
        let volume = settings.master_volume as f64 / 100.0;

        for note in registry.notes() {
            let freq = settings.tuning.frequency(note.pitch) + settings.detune_hz as f64;
            let amplitude = note.velocity as f64 / VELOCITY_SCALE * volume;
            let step = 2.0 * PI * freq / sample_rate;

            for (n, out) in self.buffer.iter_mut().enumerate() {
                let arg = (start + n as u64) as f64 * step;
                let mut value = settings.waveform.sample(arg) * amplitude;
                if settings.envelope_enabled {
                    value *= block_gain(note.phase, !note.sounded, n, len);
                }
                *out += value as f32;
            }
        }

        debug_assert!(
            self.buffer.iter().all(|s| s.is_finite()),
            "non-finite sample in rendered block"
        );

        registry.finish_block();
        self.clock.advance();
        registry.drain_released();
        if registry.is_empty() {
            self.clock.reset();
        }

        &self.buffer
    }
}
