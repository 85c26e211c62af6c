use crossbeam_channel::{unbounded, Receiver, Sender};
use super::EngineMessage;

/// Single-consumer queue between the ingest side and the render loop.
///
/// Any number of producers hold a [`Sender`]; only the render loop drains,
/// so it is the sole mutator of the note registry.
pub struct EventBus {
    sender: Sender<EngineMessage>,
    receiver: Receiver<EngineMessage>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        EventBus { sender, receiver }
    }

    /// Get a sender that can be cloned and handed to producers
    pub fn sender(&self) -> Sender<EngineMessage> {
        self.sender.clone()
    }

    /// Hand up to `max_messages` pending messages to `handle`, returning how
    /// many were processed. Never waits.
    pub fn drain<F>(&self, max_messages: usize, mut handle: F) -> usize
    where
        F: FnMut(EngineMessage),
    {
        let mut count = 0;
        while count < max_messages {
            match self.receiver.try_recv() {
                Ok(msg) => {
                    handle(msg);
                    count += 1;
                }
                Err(_) => break,
            }
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}
