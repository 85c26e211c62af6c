pub mod pcm;
mod registry;
mod renderer;

pub use registry::{NoteRegistry, DEFAULT_MAX_POLYPHONY};
pub use renderer::{BlockRenderer, RenderClock, VELOCITY_SCALE};
