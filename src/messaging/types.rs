use crossbeam_channel::Sender;
use crate::core::audio::BlockRecorder;
use crate::error::Result;

/// A note message from the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
}

impl NoteEvent {
    pub fn pitch(&self) -> u8 {
        match *self {
            NoteEvent::NoteOn { pitch, .. } | NoteEvent::NoteOff { pitch } => pitch,
        }
    }
}

/// Messages consumed by the render loop at the start of each block.
pub enum EngineMessage {
    Note(NoteEvent),
    AttachRecorder(Box<dyn BlockRecorder>),
    /// Finalize the attached recorder; replies whether one was attached.
    DetachRecorder(Sender<Result<bool>>),
}

impl From<NoteEvent> for EngineMessage {
    fn from(event: NoteEvent) -> Self {
        EngineMessage::Note(event)
    }
}

impl std::fmt::Debug for EngineMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineMessage::Note(event) => f.debug_tuple("Note").field(event).finish(),
            EngineMessage::AttachRecorder(_) => f.write_str("AttachRecorder"),
            EngineMessage::DetachRecorder(_) => f.write_str("DetachRecorder"),
        }
    }
}
