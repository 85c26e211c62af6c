mod envelope;
mod tuning;
mod waveform;

pub use self::envelope::block_gain;
pub use self::tuning::{note_name, Tuning, MAX_DIVISIONS, MIN_DIVISIONS};
pub use self::waveform::Waveform;
