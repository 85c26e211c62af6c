use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use log::info;
use crate::core::synth::pcm;
use crate::error::Result;
use super::BlockRecorder;

/// Writes blocks as mono 32-bit integer PCM.
pub struct WavRecorder {
    writer: hound::WavWriter<BufWriter<File>>,
    scratch: Vec<i32>,
    path: PathBuf,
    samples_written: u64,
}

impl WavRecorder {
    pub fn spec(sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Int,
        }
    }

    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = hound::WavWriter::create(&path, Self::spec(sample_rate))?;
        info!("Recording audio to {}", path.display());
        Ok(Self {
            writer,
            scratch: Vec::new(),
            path,
            samples_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl BlockRecorder for WavRecorder {
    fn record(&mut self, block: &[f32]) -> Result<()> {
        pcm::block_to_i32(block, &mut self.scratch);
        for &sample in &self.scratch {
            self.writer.write_sample(sample)?;
        }
        self.samples_written += block.len() as u64;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let WavRecorder { writer, path, samples_written, .. } = *self;
        writer.finalize()?;
        info!("Finished recording {} samples to {}", samples_written, path.display());
        Ok(())
    }
}
