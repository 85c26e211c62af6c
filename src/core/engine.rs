use log::{error, info, warn};
use crate::core::audio::BlockRecorder;
use crate::core::synth::{BlockRenderer, NoteRegistry, RenderClock};
use crate::error::{Error, Result};
use crate::messaging::{EngineMessage, NoteEvent};
use crate::settings::{EngineConfig, EngineSettings};

/// The render side of a session: sole owner of the note registry.
///
/// Events reach it as [`EngineMessage`]s applied between blocks, so a block
/// always sees a consistent registry.
pub struct Engine {
    registry: NoteRegistry,
    renderer: BlockRenderer,
    recorder: Option<Box<dyn BlockRecorder>>,
    recorder_error: Option<Error>,
    blocks_rendered: u64,
    events_applied: u64,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            registry: NoteRegistry::with_capacity_limit(config.max_polyphony),
            renderer: BlockRenderer::from_config(config),
            recorder: None,
            recorder_error: None,
            blocks_rendered: 0,
            events_applied: 0,
        }
    }

    pub fn handle(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::Note(event) => self.apply(event),
            EngineMessage::AttachRecorder(recorder) => {
                if let Err(e) = self.attach_recorder(recorder) {
                    warn!("Previous recorder failed to finish: {}", e);
                }
            }
            EngineMessage::DetachRecorder(reply) => {
                reply.send(self.detach_recorder()).ok();
            }
        }
    }

    pub fn apply(&mut self, event: NoteEvent) {
        self.registry.apply(event);
        self.events_applied += 1;
    }

    /// Release every live note; they fade out over the next block.
    pub fn release_all(&mut self) -> usize {
        self.registry.release_all()
    }

    /// Attach a recorder, finishing any previous one.
    pub fn attach_recorder(&mut self, recorder: Box<dyn BlockRecorder>) -> Result<()> {
        let previous = self.recorder.replace(recorder);
        info!("Recorder attached");
        match previous {
            Some(previous) => previous.finish(),
            None => Ok(()),
        }
    }

    /// Finish and drop the attached recorder. Reports a write error that
    /// detached it earlier, if any. Returns whether a recorder was attached.
    pub fn detach_recorder(&mut self) -> Result<bool> {
        if let Some(e) = self.recorder_error.take() {
            return Err(e);
        }
        match self.recorder.take() {
            Some(recorder) => {
                recorder.finish()?;
                info!("Recorder detached");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Render the next block from the current registry.
    pub fn render_block(&mut self, settings: &EngineSettings) -> &[f32] {
        self.blocks_rendered += 1;
        self.renderer.render(&mut self.registry, settings)
    }

    /// Pass the block just rendered to the attached recorder. A failing
    /// recorder is dropped; playback carries on.
    pub fn record_block(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if let Err(e) = recorder.record(self.renderer.last_block()) {
            error!("Recording failed, detaching recorder: {}", e);
            self.recorder = None;
            self.recorder_error = Some(e);
        }
    }

    pub fn registry(&self) -> &NoteRegistry {
        &self.registry
    }

    pub fn clock(&self) -> RenderClock {
        self.renderer.clock()
    }

    pub fn block_len(&self) -> usize {
        self.renderer.block_len()
    }

    pub fn has_recorder(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }
}
