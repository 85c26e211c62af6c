pub mod audio;
pub mod engine;
pub mod midi;
pub mod oscillator;
pub mod synth;
pub mod voice;

pub use engine::Engine;
