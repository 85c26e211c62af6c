//! Consumers of rendered blocks: the playback device and recorders.

mod device;
mod wav;
mod writer;

pub use device::{DeviceOutput, DeviceSink};
pub use wav::WavRecorder;
pub use writer::{RecorderFeed, RecorderThread};

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};

/// Accepts mono float blocks at the engine sample rate.
///
/// `write` may block; that is the render loop's backpressure. An error ends
/// the session.
pub trait OutputSink: Send {
    fn write(&mut self, block: &[f32]) -> Result<()>;
}

/// Captures rendered blocks alongside playback.
pub trait BlockRecorder: Send {
    fn record(&mut self, block: &[f32]) -> Result<()>;

    /// Flush and close.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Collects blocks in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    blocks: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> Vec<Vec<f32>> {
        self.blocks.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// All blocks concatenated.
    pub fn samples(&self) -> Vec<f32> {
        self.blocks().concat()
    }

    fn push(&self, block: &[f32]) -> Result<()> {
        self.blocks
            .lock()
            .map_err(|_| Error::DeviceWrite("memory sink poisoned".into()))?
            .push(block.to_vec());
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, block: &[f32]) -> Result<()> {
        self.push(block)
    }
}

impl BlockRecorder for MemorySink {
    fn record(&mut self, block: &[f32]) -> Result<()> {
        self.push(block)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
