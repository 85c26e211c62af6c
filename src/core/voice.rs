#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Sustained,
    Releasing,
}

/// A sounding note, owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub phase: EnvelopePhase,
    /// Has been rendered into at least one block.
    pub sounded: bool,
    /// Its release block has been rendered; drained at the end of the block.
    pub finished: bool,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8) -> Self {
        Self {
            pitch,
            velocity,
            phase: EnvelopePhase::Attack,
            sounded: false,
            finished: false,
        }
    }

    /// Attack or Sustained.
    pub fn is_live(&self) -> bool {
        self.phase != EnvelopePhase::Releasing
    }

    pub fn release(&mut self) {
        self.phase = EnvelopePhase::Releasing;
    }

    /// Advance the envelope after the note was rendered into a block.
    pub fn block_rendered(&mut self) {
        match self.phase {
            EnvelopePhase::Attack => self.phase = EnvelopePhase::Sustained,
            EnvelopePhase::Sustained => {}
            EnvelopePhase::Releasing => self.finished = true,
        }
        self.sounded = true;
    }
}
