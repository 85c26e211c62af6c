//! Sample format conversions for the output and recording paths.

use std::f64::consts::SQRT_2;

/// Float sample to 32-bit integer PCM with a fixed 1/sqrt(2) headroom.
pub fn to_i32(sample: f32) -> i32 {
    // `as` saturates on overflow
    (sample as f64 * i32::MAX as f64 / SQRT_2) as i32
}

pub fn block_to_i32(block: &[f32], out: &mut Vec<i32>) {
    out.clear();
    out.extend(block.iter().map(|&s| to_i32(s)));
}

/// Float32 wire encoding: each sample as 4 little-endian bytes.
pub fn encode_f32(block: &[f32]) -> Vec<u8> {
    block.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
