use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
}

impl Waveform {
    /// Evaluate the waveform at an oscillator argument in radians.
    pub fn sample(&self, arg: f64) -> f64 {
        let s = arg.sin();
        match self {
            Waveform::Sine => s,
            // sign(sin), with sign(0) == 0
            Waveform::Square => {
                if s > 0.0 {
                    1.0
                } else if s < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}
