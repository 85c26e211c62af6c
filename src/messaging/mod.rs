mod bus;
mod types;

pub use bus::EventBus;
pub use types::{EngineMessage, NoteEvent};
