//! Engine configuration, live synthesis settings and their persistence.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use arc_swap::ArcSwap;
use serde::{Serialize, Deserialize};
use crate::core::oscillator::{Tuning, Waveform};
use crate::error::{Error, Result};

pub const SAMPLE_RATE: u32 = 44100;
pub const BLOCK_DURATION_MS: u32 = 30;

/// Parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_duration_ms: u32,
    pub max_polyphony: usize,
    /// Depth of the block queue in front of the audio device.
    pub output_buffer_blocks: usize,
    /// Pause after an empty input poll.
    pub ingest_idle_sleep_us: u64,
    pub max_events_per_block: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            block_duration_ms: BLOCK_DURATION_MS,
            max_polyphony: crate::core::synth::DEFAULT_MAX_POLYPHONY,
            output_buffer_blocks: 2,
            ingest_idle_sleep_us: 500,
            max_events_per_block: 1024,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        if self.block_len() == 0 {
            return Err(Error::InvalidConfig(format!(
                "block of {} ms at {} Hz holds no samples",
                self.block_duration_ms, self.sample_rate
            )));
        }
        if self.max_polyphony == 0 {
            return Err(Error::InvalidConfig("max_polyphony must be at least 1".into()));
        }
        if self.output_buffer_blocks == 0 {
            return Err(Error::InvalidConfig("output_buffer_blocks must be at least 1".into()));
        }
        if self.max_events_per_block == 0 {
            return Err(Error::InvalidConfig("max_events_per_block must be at least 1".into()));
        }
        Ok(())
    }

    /// Samples per block.
    pub fn block_len(&self) -> usize {
        (self.sample_rate as u64 * self.block_duration_ms as u64 / 1000) as usize
    }
}

/// Settings a controller may change while synthesis runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Percent, 0 to 100.
    pub master_volume: f32,
    pub tuning: Tuning,
    /// Added to every computed frequency.
    pub detune_hz: f32,
    pub envelope_enabled: bool,
    pub waveform: Waveform,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            master_volume: 100.0,
            tuning: Tuning::default(),
            detune_hz: 0.0,
            envelope_enabled: true,
            waveform: Waveform::Sine,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        self.tuning.validate()?;
        if !(0.0..=100.0).contains(&self.master_volume) {
            return Err(Error::InvalidConfig(format!(
                "master_volume must be within 0..=100, got {}",
                self.master_volume
            )));
        }
        if !self.detune_hz.is_finite() {
            return Err(Error::InvalidConfig("detune_hz must be finite".into()));
        }
        Ok(())
    }
}

/// Copy-on-write handle to the live settings.
///
/// The renderer takes one snapshot per block; writers publish whole
/// settings values, so a compound change is never observed half applied.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<ArcSwap<EngineSettings>>,
}

impl SharedSettings {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        })
    }

    pub fn snapshot(&self) -> Arc<EngineSettings> {
        self.inner.load_full()
    }

    /// Apply `f` to the current settings and publish the result. Invalid
    /// results are rejected and the current settings stay in place.
    pub fn update<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut EngineSettings),
    {
        let mut outcome = Ok(());
        self.inner.rcu(|current| {
            let mut next = EngineSettings::clone(current);
            f(&mut next);
            match next.validate() {
                Ok(()) => {
                    outcome = Ok(());
                    Arc::new(next)
                }
                Err(e) => {
                    outcome = Err(e);
                    Arc::clone(current)
                }
            }
        });
        outcome
    }

    pub fn replace(&self, settings: EngineSettings) -> Result<()> {
        settings.validate()?;
        self.inner.store(Arc::new(settings));
        Ok(())
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.update(|s| s.master_volume = volume)
    }

    pub fn set_tuning(&self, tuning: Tuning) -> Result<()> {
        self.update(|s| s.tuning = tuning)
    }

    pub fn set_detune(&self, hz: f32) -> Result<()> {
        self.update(|s| s.detune_hz = hz)
    }

    pub fn set_waveform(&self, waveform: Waveform) -> Result<()> {
        self.update(|s| s.waveform = waveform)
    }

    pub fn set_envelope_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.envelope_enabled = enabled)
    }

    pub fn reset(&self) {
        self.inner.store(Arc::new(EngineSettings::default()));
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub engine: EngineConfig,
    pub synth: EngineSettings,
    pub midi_port: Option<String>,
}

impl AppSettings {
    pub fn settings_dir() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| Error::InvalidConfig("Could not find config directory".into()))?;
        path.push("polytone");
        Ok(path)
    }

    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::settings_dir()?.join("settings.json"))
    }

    /// Load from the user config directory, falling back to defaults when
    /// no file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::settings_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::settings_path()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path)?;
        let settings: AppSettings = serde_json::from_reader(file)?;
        settings.engine.validate()?;
        settings.synth.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_is_1323_samples() {
        let config = EngineConfig::default();
        assert_eq!(config.block_len(), 1323);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_empty_blocks() {
        let config = EngineConfig { block_duration_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn shared_settings_reject_invalid_division() {
        let shared = SharedSettings::new(EngineSettings::default()).unwrap();
        let result = shared.set_tuning(Tuning::EqualTemperament(0));
        assert!(matches!(result, Err(Error::InvalidDivision(0))));
        assert_eq!(shared.snapshot().tuning, Tuning::EqualTemperament(12));
    }

    #[test]
    fn compound_update_is_published_together() {
        let shared = SharedSettings::new(EngineSettings::default()).unwrap();
        let before = shared.snapshot();
        shared
            .update(|s| {
                s.tuning = Tuning::EqualTemperament(24);
                s.detune_hz = -3.0;
            })
            .unwrap();
        let after = shared.snapshot();
        assert_eq!(before.tuning, Tuning::EqualTemperament(12));
        assert_eq!(after.tuning, Tuning::EqualTemperament(24));
        assert_eq!(after.detune_hz, -3.0);
    }

    #[test]
    fn volume_outside_percent_range_is_rejected() {
        let shared = SharedSettings::new(EngineSettings::default()).unwrap();
        assert!(shared.set_volume(101.0).is_err());
        assert!(shared.set_volume(40.0).is_ok());
        assert_eq!(shared.snapshot().master_volume, 40.0);
    }

    #[test]
    fn app_settings_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = AppSettings::default();
        settings.synth.tuning = Tuning::Werckmeister;
        settings.synth.waveform = Waveform::Square;
        settings.midi_port = Some("Keystation".to_string());
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppSettings::load_from(dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, AppSettings::default());
    }
}
