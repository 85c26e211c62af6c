use std::sync::{Arc, Mutex};
use std::time::Duration;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, Stream};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use log::{error, info};
use crate::error::{Error, Result};
use crate::settings::EngineConfig;
use super::OutputSink;

/// Minimum time a write may wait for queue space before the device is
/// considered stalled.
const MIN_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

type FailureSlot = Arc<Mutex<Option<String>>>;

/// An open playback stream. Dropping it releases the device, so keep it
/// alive until the session using its [`DeviceSink`] has been stopped.
pub struct DeviceOutput {
    _stream: Stream,
    device_name: String,
    channels: u16,
}

impl DeviceOutput {
    /// Open the default output device at the configured sample rate.
    pub fn open_default(config: &EngineConfig) -> Result<(Self, DeviceSink)> {
        config.validate()?;

        let host = cpal::default_host();
        info!("Using audio host: {}", host.id().name());

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioDevice("No output device available".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using output device: {}", device_name);

        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        let stream_config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded(config.output_buffer_blocks);
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let feed = BlockFeed::new(rx);

        let stream = match sample_format {
            SampleFormat::F32 => create_stream::<f32>(&device, &stream_config, feed, Arc::clone(&failure)),
            SampleFormat::I16 => create_stream::<i16>(&device, &stream_config, feed, Arc::clone(&failure)),
            SampleFormat::U16 => create_stream::<u16>(&device, &stream_config, feed, Arc::clone(&failure)),
            other => Err(Error::AudioDevice(format!("Unsupported sample format {other:?}"))),
        }?;
        stream.play()?;
        info!(
            "Audio stream started: {} Hz, {} channel(s), {:?}",
            config.sample_rate, stream_config.channels, sample_format
        );

        let block_ms = config.block_duration_ms as u64 * config.output_buffer_blocks as u64;
        let write_timeout = MIN_WRITE_TIMEOUT.max(Duration::from_millis(block_ms * 4));

        let output = DeviceOutput {
            _stream: stream,
            device_name,
            channels: stream_config.channels,
        };
        let sink = DeviceSink {
            blocks: tx,
            failure,
            write_timeout,
        };
        Ok((output, sink))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Render-loop side of a [`DeviceOutput`]: a bounded queue of blocks.
pub struct DeviceSink {
    blocks: Sender<Vec<f32>>,
    failure: FailureSlot,
    write_timeout: Duration,
}

impl OutputSink for DeviceSink {
    fn write(&mut self, block: &[f32]) -> Result<()> {
        if let Some(reason) = self.failure.lock().ok().and_then(|f| f.clone()) {
            return Err(Error::DeviceWrite(reason));
        }
        match self.blocks.send_timeout(block.to_vec(), self.write_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(Error::DeviceWrite("audio device stopped consuming blocks".into()))
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(Error::DeviceWrite("audio stream closed".into()))
            }
        }
    }
}

/// Callback side: plays queued blocks sample by sample, silence on underrun.
struct BlockFeed {
    blocks: Receiver<Vec<f32>>,
    current: Vec<f32>,
    pos: usize,
}

impl BlockFeed {
    fn new(blocks: Receiver<Vec<f32>>) -> Self {
        Self {
            blocks,
            current: Vec::new(),
            pos: 0,
        }
    }

    fn next_sample(&mut self) -> f32 {
        if self.pos >= self.current.len() {
            match self.blocks.try_recv() {
                Ok(block) => {
                    self.current = block;
                    self.pos = 0;
                }
                Err(_) => return 0.0,
            }
        }
        let value = self.current.get(self.pos).copied().unwrap_or(0.0);
        self.pos += 1;
        value
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut feed: BlockFeed,
    failure: FailureSlot,
) -> Result<Stream>
where
    T: Sample + Send + 'static + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = move |err: cpal::StreamError| {
        error!("an error occurred on the audio stream: {}", err);
        if let Ok(mut slot) = failure.lock() {
            slot.get_or_insert_with(|| err.to_string());
        }
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // mono into every channel
            for frame in data.chunks_mut(channels) {
                let value = T::from_sample(feed.next_sample());
                for sample in frame.iter_mut() {
                    *sample = value;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_plays_blocks_back_to_back_then_silence() {
        let (tx, rx) = bounded(4);
        let mut feed = BlockFeed::new(rx);
        tx.send(vec![0.1, 0.2]).unwrap();
        tx.send(vec![0.3]).unwrap();
        let played: Vec<f32> = (0..5).map(|_| feed.next_sample()).collect();
        assert_eq!(played, vec![0.1, 0.2, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn sink_reports_latched_stream_failure() {
        let (tx, _rx) = bounded(1);
        let failure: FailureSlot = Arc::new(Mutex::new(Some("device unplugged".into())));
        let mut sink = DeviceSink { blocks: tx, failure, write_timeout: MIN_WRITE_TIMEOUT };
        assert!(matches!(sink.write(&[0.0]), Err(Error::DeviceWrite(_))));
    }

    #[test]
    fn sink_fails_once_callback_is_gone() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut sink = DeviceSink {
            blocks: tx,
            failure: Arc::new(Mutex::new(None)),
            write_timeout: MIN_WRITE_TIMEOUT,
        };
        assert!(matches!(sink.write(&[0.0]), Err(Error::DeviceWrite(_))));
    }

    #[test]
    fn full_queue_times_out() {
        let (tx, _rx) = bounded(1);
        let mut sink = DeviceSink {
            blocks: tx,
            failure: Arc::new(Mutex::new(None)),
            write_timeout: Duration::from_millis(10),
        };
        assert!(sink.write(&[0.0]).is_ok());
        assert!(matches!(sink.write(&[0.0]), Err(Error::DeviceWrite(_))));
    }
}
