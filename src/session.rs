//! A running synthesis session: the render loop, the ingest loop and the
//! WAV writer.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam_channel::{bounded, Sender};
use log::{debug, error, info, warn};
use crate::core::audio::{OutputSink, RecorderThread, WavRecorder};
use crate::core::engine::Engine;
use crate::core::midi::{NoteLogRecorder, NoteSource};
use crate::core::oscillator::note_name;
use crate::error::{Error, Result};
use crate::messaging::{EngineMessage, EventBus, NoteEvent};
use crate::settings::{EngineConfig, SharedSettings};

/// How long `detach_wav` waits for the render loop to reply.
const DETACH_TIMEOUT: Duration = Duration::from_secs(2);

type SharedNoteLog = Arc<Mutex<Option<NoteLogRecorder>>>;

/// What a stopped session leaves behind.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub blocks_rendered: u64,
    pub events_received: u64,
    pub events_applied: u64,
    /// The note-event log, if one was still attached.
    pub note_log: Option<NoteLogRecorder>,
    /// Fatal output failure that ended the session early.
    pub device_error: Option<Error>,
    /// Failure finishing or writing the audio recording.
    pub recorder_error: Option<Error>,
}

struct RenderOutcome {
    blocks_rendered: u64,
    events_applied: u64,
    device_error: Option<Error>,
    recorder_error: Option<Error>,
}

/// Owns the two loops of an active session.
///
/// The render loop is the only writer of the note registry; the ingest loop
/// forwards input events to it through an [`EventBus`]. Devices handed to
/// the session must outlive it: stop the session before closing them.
pub struct Session {
    config: EngineConfig,
    settings: SharedSettings,
    stop: Arc<AtomicBool>,
    events: Sender<EngineMessage>,
    note_log: SharedNoteLog,
    wav_writer: Mutex<Option<RecorderThread>>,
    render: Option<JoinHandle<RenderOutcome>>,
    ingest: Option<JoinHandle<u64>>,
}

impl Session {
    pub fn start(
        config: EngineConfig,
        settings: SharedSettings,
        sink: Box<dyn OutputSink>,
        source: Box<dyn NoteSource>,
    ) -> Result<Self> {
        config.validate()?;
        settings.snapshot().validate()?;

        let stop = Arc::new(AtomicBool::new(false));
        let note_log: SharedNoteLog = Arc::new(Mutex::new(None));
        let bus = EventBus::new();
        let events = bus.sender();

        let render = {
            let engine = Engine::new(&config);
            let settings = settings.clone();
            let stop = Arc::clone(&stop);
            let max_events = config.max_events_per_block;
            thread::Builder::new()
                .name("polytone-render".into())
                .spawn(move || render_loop(engine, bus, sink, settings, stop, max_events))?
        };

        let ingest = {
            let events = events.clone();
            let stop_flag = Arc::clone(&stop);
            let note_log = Arc::clone(&note_log);
            let idle = Duration::from_micros(config.ingest_idle_sleep_us);
            thread::Builder::new()
                .name("polytone-ingest".into())
                .spawn(move || ingest_loop(source, events, note_log, stop_flag, idle))
        };
        let ingest = match ingest {
            Ok(handle) => handle,
            Err(e) => {
                stop.store(true, Ordering::Release);
                render.join().ok();
                return Err(e.into());
            }
        };

        info!(
            "Synth started: {} Hz, {} ms blocks ({} samples)",
            config.sample_rate,
            config.block_duration_ms,
            config.block_len()
        );

        Ok(Self {
            config,
            settings,
            stop,
            events,
            note_log,
            wav_writer: Mutex::new(None),
            render: Some(render),
            ingest: Some(ingest),
        })
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// False once a stop was requested or the render loop ended on its own.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
            && self.render.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Inject a note event as if it came from the input device. It is
    /// logged to an attached note log like device input.
    pub fn send(&self, event: NoteEvent) -> Result<()> {
        log_event(&self.note_log, event);
        self.events.send(event.into()).map_err(|_| Error::NotRunning)
    }

    /// Start capturing rendered audio to a WAV file. The file is written on
    /// its own thread; the render loop only queues blocks for it.
    pub fn attach_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let recorder = WavRecorder::create(path, self.config.sample_rate)?;
        let (writer, feed) = RecorderThread::spawn(Box::new(recorder))?;
        if self.events.send(EngineMessage::AttachRecorder(Box::new(feed))).is_err() {
            writer.join().ok();
            return Err(Error::NotRunning);
        }

        let previous = match self.wav_writer.lock() {
            Ok(mut slot) => slot.replace(writer),
            Err(_) => None,
        };
        // the render loop closes the old feed when it picks up the new one
        if let Some(previous) = previous {
            if let Err(e) = previous.join() {
                warn!("Previous WAV recording failed: {}", e);
            }
        }
        Ok(())
    }

    /// Finalize the WAV capture. Returns whether one was attached.
    pub fn detach_wav(&self) -> Result<bool> {
        let (reply, response) = bounded(1);
        self.events
            .send(EngineMessage::DetachRecorder(reply))
            .map_err(|_| Error::NotRunning)?;
        let detached = response.recv_timeout(DETACH_TIMEOUT).map_err(|_| Error::NotRunning)?;
        if let Some(writer) = self.take_wav_writer() {
            writer.join()?;
        }
        detached
    }

    fn take_wav_writer(&self) -> Option<RecorderThread> {
        self.wav_writer.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Start logging played notes. Replaces any log already attached.
    pub fn attach_note_log(&self) {
        if let Ok(mut slot) = self.note_log.lock() {
            *slot = Some(NoteLogRecorder::new());
            info!("Note log attached");
        }
    }

    pub fn detach_note_log(&self) -> Option<NoteLogRecorder> {
        self.note_log.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Signal both loops, wait for them, and collect the report. The
    /// current block completes first.
    pub fn stop(mut self) -> Result<SessionReport> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<SessionReport> {
        self.stop.store(true, Ordering::Release);

        let events_received = match self.ingest.take() {
            Some(handle) => handle.join().map_err(|_| Error::ThreadPanicked("ingest"))?,
            None => 0,
        };
        let outcome = match self.render.take() {
            Some(handle) => handle.join().map_err(|_| Error::ThreadPanicked("render"))?,
            None => return Ok(SessionReport::default()),
        };
        // the render loop closed the feed on exit, so this only waits for
        // the writer to drain
        let writer_error = self.take_wav_writer().and_then(|w| w.join().err());

        info!(
            "Synth stopped after {} blocks ({} events)",
            outcome.blocks_rendered, outcome.events_applied
        );
        Ok(SessionReport {
            blocks_rendered: outcome.blocks_rendered,
            events_received,
            events_applied: outcome.events_applied,
            note_log: self.detach_note_log(),
            device_error: outcome.device_error,
            recorder_error: writer_error.or(outcome.recorder_error),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.render.is_some() || self.ingest.is_some() {
            if let Err(e) = self.shutdown() {
                error!("Session shutdown failed: {}", e);
            }
        }
    }
}

fn render_loop(
    mut engine: Engine,
    bus: EventBus,
    mut sink: Box<dyn OutputSink>,
    settings: SharedSettings,
    stop: Arc<AtomicBool>,
    max_events: usize,
) -> RenderOutcome {
    let mut device_error = None;

    while !stop.load(Ordering::Acquire) {
        // every event queued so far lands before this block
        bus.drain(max_events, |msg| engine.handle(msg));

        let snapshot = settings.snapshot();
        let block = engine.render_block(&snapshot);
        if let Err(e) = sink.write(block) {
            error!("Audio output failed, stopping synth: {}", e);
            device_error = Some(e);
            stop.store(true, Ordering::Release);
            break;
        }
        engine.record_block();
    }

    let recorder_error = engine.detach_recorder().err();
    RenderOutcome {
        blocks_rendered: engine.blocks_rendered(),
        events_applied: engine.events_applied(),
        device_error,
        recorder_error,
    }
}

fn ingest_loop(
    mut source: Box<dyn NoteSource>,
    events: Sender<EngineMessage>,
    note_log: SharedNoteLog,
    stop: Arc<AtomicBool>,
    idle: Duration,
) -> u64 {
    let mut received = 0;

    while !stop.load(Ordering::Acquire) {
        let Some(event) = source.poll() else {
            if idle.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(idle);
            }
            continue;
        };

        received += 1;
        if let NoteEvent::NoteOn { pitch, velocity } = event {
            debug!("Note on {} ({}) velocity {}", pitch, note_name(pitch), velocity);
        }
        log_event(&note_log, event);
        if events.send(event.into()).is_err() {
            // render loop is gone
            break;
        }
    }
    received
}

fn log_event(note_log: &SharedNoteLog, event: NoteEvent) {
    if let Ok(mut slot) = note_log.lock() {
        if let Some(log) = slot.as_mut() {
            log.record(event);
        }
    }
}
