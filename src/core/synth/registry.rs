use log::debug;
use crate::core::oscillator::note_name;
use crate::core::voice::Note;
use crate::messaging::NoteEvent;

pub const DEFAULT_MAX_POLYPHONY: usize = 64;

/// The set of currently sounding notes.
///
/// Order is insertion order. Duplicate live notes for one pitch are allowed;
/// a note-off resolves to the first of them.
#[derive(Debug, Clone)]
pub struct NoteRegistry {
    notes: Vec<Note>,
    max_polyphony: usize,
}

impl Default for NoteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteRegistry {
    pub fn new() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_POLYPHONY)
    }

    /// Registry that keeps at most `max_polyphony` live notes.
    pub fn with_capacity_limit(max_polyphony: usize) -> Self {
        Self {
            notes: Vec::with_capacity(max_polyphony),
            max_polyphony: max_polyphony.max(1),
        }
    }

    pub fn apply(&mut self, event: NoteEvent) {
        match event {
            NoteEvent::NoteOn { pitch, velocity } => self.note_on(pitch, velocity),
            NoteEvent::NoteOff { pitch } => {
                self.note_off(pitch);
            }
        }
    }

    /// Add a note in Attack. At the polyphony cap the oldest live note is
    /// released to make room.
    pub fn note_on(&mut self, pitch: u8, velocity: u8) {
        if self.live_count() >= self.max_polyphony {
            if let Some(oldest) = self.notes.iter_mut().find(|n| n.is_live()) {
                debug!(
                    "Polyphony cap {} reached, releasing {} ({})",
                    self.max_polyphony,
                    oldest.pitch,
                    note_name(oldest.pitch)
                );
                oldest.release();
            }
        }
        self.notes.push(Note::new(pitch, velocity));
    }

    /// Release the first live note with this pitch. Returns false, leaving
    /// the registry untouched, when there is none.
    pub fn note_off(&mut self, pitch: u8) -> bool {
        match self.notes.iter_mut().find(|n| n.pitch == pitch && n.is_live()) {
            Some(note) => {
                note.release();
                true
            }
            None => {
                debug!("Ignoring note off for {} ({}): no live note", pitch, note_name(pitch));
                false
            }
        }
    }

    /// Release every live note. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for note in self.notes.iter_mut().filter(|n| n.is_live()) {
            note.release();
            released += 1;
        }
        released
    }

    /// Advance every note's envelope after a block has been rendered.
    pub fn finish_block(&mut self) {
        for note in &mut self.notes {
            note.block_rendered();
        }
    }

    /// Remove notes whose release block has been rendered.
    pub fn drain_released(&mut self) -> usize {
        let before = self.notes.len();
        self.notes.retain(|n| !n.finished);
        before - self.notes.len()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_live()).count()
    }

    pub fn max_polyphony(&self) -> usize {
        self.max_polyphony
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::voice::EnvelopePhase;

    #[test]
    fn note_on_appends_in_attack() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60, 100);
        registry.note_on(64, 90);
        assert_eq!(registry.len(), 2);
        assert!(registry.notes().iter().all(|n| n.phase == EnvelopePhase::Attack));
        assert_eq!(registry.notes()[1].pitch, 64);
    }

    #[test]
    fn unmatched_note_off_is_noop() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60, 100);
        let before = registry.notes().to_vec();
        assert!(!registry.note_off(61));
        assert_eq!(registry.notes(), &before[..]);

        let mut empty = NoteRegistry::new();
        assert!(!empty.note_off(60));
        assert!(empty.is_empty());
    }

    #[test]
    fn note_off_skips_notes_already_releasing() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60, 100);
        registry.note_on(60, 80);
        assert!(registry.note_off(60));
        assert!(registry.note_off(60));
        assert!(!registry.note_off(60));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn duplicate_pitch_releases_first_inserted() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60, 100);
        registry.note_on(60, 50);
        registry.note_off(60);
        assert_eq!(registry.notes()[0].phase, EnvelopePhase::Releasing);
        assert_eq!(registry.notes()[1].phase, EnvelopePhase::Attack);
        assert_eq!(registry.notes()[1].velocity, 50);
    }

    #[test]
    fn release_drains_after_exactly_one_block() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60, 100);
        registry.finish_block();
        assert_eq!(registry.drain_released(), 0);
        registry.note_off(60);
        assert_eq!(registry.drain_released(), 0);
        assert_eq!(registry.len(), 1);
        registry.finish_block();
        assert_eq!(registry.drain_released(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn polyphony_cap_releases_oldest_live_note() {
        let mut registry = NoteRegistry::with_capacity_limit(2);
        registry.note_on(60, 100);
        registry.note_on(62, 100);
        registry.note_on(64, 100);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.notes()[0].phase, EnvelopePhase::Releasing);
        registry.finish_block();
        registry.drain_released();
        let pitches: Vec<u8> = registry.notes().iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![62, 64]);
    }

    #[test]
    fn release_all_releases_only_live_notes() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60, 100);
        registry.note_on(60, 90);
        registry.note_on(67, 80);
        registry.note_off(67);
        assert_eq!(registry.release_all(), 2);
        assert_eq!(registry.live_count(), 0);
        registry.finish_block();
        assert_eq!(registry.drain_released(), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn apply_routes_events() {
        let mut registry = NoteRegistry::new();
        registry.apply(NoteEvent::NoteOn { pitch: 69, velocity: 127 });
        registry.apply(NoteEvent::NoteOff { pitch: 69 });
        assert_eq!(registry.notes()[0].phase, EnvelopePhase::Releasing);
    }
}
