use crossbeam_channel::{unbounded, Receiver, Sender};
use crate::messaging::NoteEvent;

/// A non-blocking provider of note events.
pub trait NoteSource: Send {
    /// Next available event, or `None` if nothing is pending right now.
    fn poll(&mut self) -> Option<NoteEvent>;
}

/// Source backed by a channel, filled by a device callback or by hand.
pub struct ChannelSource {
    events: Receiver<NoteEvent>,
}

impl ChannelSource {
    pub fn new(events: Receiver<NoteEvent>) -> Self {
        Self { events }
    }

    /// A source paired with the sender that feeds it.
    pub fn pair() -> (Sender<NoteEvent>, Self) {
        let (tx, rx) = unbounded();
        (tx, Self::new(rx))
    }
}

impl NoteSource for ChannelSource {
    fn poll(&mut self) -> Option<NoteEvent> {
        self.events.try_recv().ok()
    }
}
