//! Runs a recorder on its own thread so file I/O stays off the render loop.

use std::thread::{self, JoinHandle};
use crossbeam_channel::{unbounded, Sender};
use log::error;
use crate::error::{Error, Result};
use super::BlockRecorder;

/// Render-side handle: queues blocks for the writer thread and never waits.
pub struct RecorderFeed {
    blocks: Sender<Vec<f32>>,
}

impl BlockRecorder for RecorderFeed {
    fn record(&mut self, block: &[f32]) -> Result<()> {
        self.blocks.send(block.to_vec()).map_err(|_| Error::RecorderClosed)
    }

    /// Closes the queue. The writer finalizes once it has drained it.
    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// The `polytone-wav` thread that owns a recorder.
pub struct RecorderThread {
    handle: JoinHandle<Result<u64>>,
}

impl RecorderThread {
    pub fn spawn(mut recorder: Box<dyn BlockRecorder>) -> Result<(Self, RecorderFeed)> {
        let (tx, rx) = unbounded::<Vec<f32>>();
        let handle = thread::Builder::new()
            .name("polytone-wav".into())
            .spawn(move || {
                let mut blocks = 0u64;
                for block in rx.iter() {
                    if let Err(e) = recorder.record(&block) {
                        error!("Recording failed after {} blocks: {}", blocks, e);
                        // keep what was written readable
                        recorder.finish().ok();
                        return Err(e);
                    }
                    blocks += 1;
                }
                recorder.finish()?;
                Ok(blocks)
            })?;
        Ok((Self { handle }, RecorderFeed { blocks: tx }))
    }

    /// Wait for the writer to drain and finalize. Returns the number of
    /// blocks written, or the first write or finalize error.
    pub fn join(self) -> Result<u64> {
        self.handle.join().map_err(|_| Error::ThreadPanicked("recorder"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::MemorySink;

    struct BrokenDisk;

    impl BlockRecorder for BrokenDisk {
        fn record(&mut self, _block: &[f32]) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }

        fn finish(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_drains_queue_before_finishing() {
        let capture = MemorySink::new();
        let (writer, mut feed) = RecorderThread::spawn(Box::new(capture.clone())).unwrap();
        for i in 0..3 {
            feed.record(&[i as f32; 4]).unwrap();
        }
        Box::new(feed).finish().unwrap();

        assert_eq!(writer.join().unwrap(), 3);
        assert_eq!(capture.block_count(), 3);
        assert_eq!(capture.blocks()[2], vec![2.0; 4]);
    }

    #[test]
    fn write_error_surfaces_on_join_and_closes_the_feed() {
        let (writer, mut feed) = RecorderThread::spawn(Box::new(BrokenDisk)).unwrap();
        feed.record(&[0.5; 4]).unwrap();

        assert!(matches!(writer.join(), Err(Error::Io(_))));
        assert!(matches!(feed.record(&[0.5; 4]), Err(Error::RecorderClosed)));
    }

    #[test]
    fn blocks_are_written_on_the_writer_thread() {
        struct ThreadNames(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

        impl BlockRecorder for ThreadNames {
            fn record(&mut self, _block: &[f32]) -> Result<()> {
                let name = thread::current().name().unwrap_or("").to_string();
                self.0.lock().unwrap().push(name);
                Ok(())
            }

            fn finish(self: Box<Self>) -> Result<()> {
                Ok(())
            }
        }

        let names = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let (writer, mut feed) = RecorderThread::spawn(Box::new(ThreadNames(names.clone()))).unwrap();
        feed.record(&[0.0; 2]).unwrap();
        drop(feed);
        writer.join().unwrap();
        assert_eq!(*names.lock().unwrap(), vec!["polytone-wav".to_string()]);
    }
}
