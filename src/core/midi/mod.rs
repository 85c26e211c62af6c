pub mod file;
mod input;
pub mod recorder;
mod source;

pub use file::MidiFilePlayer;
pub use input::{decode_message, MidiInputHandler};
pub use recorder::{NoteLogRecorder, RecordedNote};
pub use source::{ChannelSource, NoteSource};
