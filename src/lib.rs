//! Real-time polyphonic synthesizer: MIDI note events in, blocks of mono
//! audio out, with selectable tuning systems.

pub mod core;
pub mod error;
pub mod messaging;
pub mod session;
pub mod settings;

pub use error::{Error, Result};
pub use session::{Session, SessionReport};
pub use settings::{AppSettings, EngineConfig, EngineSettings, SharedSettings};
