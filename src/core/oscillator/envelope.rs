use crate::core::voice::EnvelopePhase;

/// Gain applied to sample `index` of a block of `len` samples.
///
/// Attack ramps linearly from 0 at the first sample to 1 at the last one,
/// release ramps from 1 down to 0. A note that is released before it ever
/// sounded gets both ramps multiplied together.
pub fn block_gain(phase: EnvelopePhase, first_block: bool, index: usize, len: usize) -> f64 {
    let rise = ramp_up(index, len);
    match phase {
        EnvelopePhase::Attack => rise,
        EnvelopePhase::Sustained => 1.0,
        EnvelopePhase::Releasing if first_block => rise * (1.0 - rise),
        EnvelopePhase::Releasing => 1.0 - rise,
    }
}

fn ramp_up(index: usize, len: usize) -> f64 {
    if len <= 1 {
        return 1.0;
    }
    index as f64 / (len - 1) as f64
}
