//! Tie resolution
//!
//! One `HeldNote` per sounding pitch. A tied group (start, any number of
//! continuations, stop) resolves to exactly one `ResolvedNote`.

use crate::models::TieFlag;
use crate::time::{Rational, RhythmPosition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do with a continuation or note-off that has no held note
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DanglingTiePolicy {
    /// Fail the pass with `SegmentError::DanglingTie`
    #[default]
    Reject,
    /// Log a warning, drop the tie relation and continue
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldNote {
    pub pitch: u8,
    pub intensity: Option<u8>,
    /// Dynamic captured when the note began sounding
    pub dynamic: String,
    pub start: RhythmPosition,
    /// Set by a tie-stop note-on; the next note-off closes the group
    closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNote {
    pub pitch: u8,
    pub start: RhythmPosition,
    pub duration: Rational,
    pub dynamic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieOutcome {
    /// Pitch went Idle -> Holding
    Opened,
    /// Continuation swallowed; still Holding
    Absorbed,
    /// Tied group ended
    Closed(ResolvedNote),
    /// Same pitch struck again while held: old note closed, new one opened
    Restruck(ResolvedNote),
    /// Continuation or note-off with nothing held
    Dangling,
}

#[derive(Debug, Default)]
pub struct TieResolver {
    held: HashMap<u8, HeldNote>,
}

impl TieResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.held.is_empty()
    }

    pub fn held(&self, pitch: u8) -> Option<&HeldNote> {
        self.held.get(&pitch)
    }

    pub fn note_on(
        &mut self,
        pitch: u8,
        intensity: Option<u8>,
        dynamic: String,
        tie: TieFlag,
        at: RhythmPosition,
    ) -> TieOutcome {
        match (tie, self.held.get_mut(&pitch)) {
            (TieFlag::None | TieFlag::Start, None) => {
                self.hold(pitch, intensity, dynamic, at);
                TieOutcome::Opened
            }
            (TieFlag::None | TieFlag::Start, Some(_)) => {
                let previous = self.release(pitch, at);
                self.hold(pitch, intensity, dynamic, at);
                match previous {
                    Some(note) => TieOutcome::Restruck(note),
                    None => TieOutcome::Opened,
                }
            }
            (TieFlag::Continue, Some(_)) => TieOutcome::Absorbed,
            (TieFlag::Stop, Some(held)) => {
                held.closing = true;
                TieOutcome::Absorbed
            }
            (TieFlag::Continue | TieFlag::Stop, None) => TieOutcome::Dangling,
        }
    }

    /// Start an untied hold on `pitch`, whatever its tie state.
    ///
    /// A note already held on that pitch is released at `at` and returned.
    pub fn open(
        &mut self,
        pitch: u8,
        intensity: Option<u8>,
        dynamic: String,
        at: RhythmPosition,
    ) -> Option<ResolvedNote> {
        let previous = self.release(pitch, at);
        self.hold(pitch, intensity, dynamic, at);
        previous
    }

    pub fn note_off(&mut self, pitch: u8, tie: TieFlag, at: RhythmPosition) -> TieOutcome {
        match self.held.get(&pitch) {
            None => TieOutcome::Dangling,
            Some(held) if tie == TieFlag::Continue && !held.closing => TieOutcome::Absorbed,
            Some(_) => match self.release(pitch, at) {
                Some(note) => TieOutcome::Closed(note),
                None => TieOutcome::Dangling,
            },
        }
    }

    /// Close everything still sounding at `at`, earliest first.
    pub fn drain(&mut self, at: RhythmPosition) -> Vec<ResolvedNote> {
        let pitches: Vec<u8> = self.held.keys().copied().collect();
        let mut notes: Vec<ResolvedNote> = pitches
            .into_iter()
            .filter_map(|pitch| self.release(pitch, at))
            .collect();
        notes.sort_by(|a, b| a.start.cmp(&b.start).then(a.pitch.cmp(&b.pitch)));
        notes
    }

    fn hold(&mut self, pitch: u8, intensity: Option<u8>, dynamic: String, at: RhythmPosition) {
        self.held.insert(
            pitch,
            HeldNote {
                pitch,
                intensity,
                dynamic,
                start: at,
                closing: false,
            },
        );
    }

    fn release(&mut self, pitch: u8, at: RhythmPosition) -> Option<ResolvedNote> {
        self.held.remove(&pitch).map(|held| ResolvedNote {
            pitch,
            start: held.start,
            duration: at.since(&held.start),
            dynamic: held.dynamic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(beats: i64) -> RhythmPosition {
        RhythmPosition {
            measure: 1 + (beats / 4) as u32,
            offset: Rational::from_integer(beats % 4),
            quarters_elapsed: Rational::from_integer(beats),
            beat_unit: 4,
        }
    }

    fn on(resolver: &mut TieResolver, pitch: u8, tie: TieFlag, beats: i64) -> TieOutcome {
        resolver.note_on(pitch, Some(64), "mf".to_string(), tie, at(beats))
    }

    #[test]
    fn test_plain_note_opens_and_closes() {
        let mut resolver = TieResolver::new();
        assert_eq!(on(&mut resolver, 60, TieFlag::None, 0), TieOutcome::Opened);
        assert!(!resolver.is_idle());

        match resolver.note_off(60, TieFlag::None, at(1)) {
            TieOutcome::Closed(note) => {
                assert_eq!(note.pitch, 60);
                assert_eq!(note.duration, Rational::from_integer(1));
                assert_eq!(note.dynamic, "mf");
            }
            other => panic!("expected Closed, got {:?}", other),
        }
        assert!(resolver.is_idle());
    }

    #[test]
    fn test_tied_group_resolves_once() {
        let mut resolver = TieResolver::new();
        on(&mut resolver, 62, TieFlag::Start, 0);
        for beat in 1..5 {
            assert_eq!(on(&mut resolver, 62, TieFlag::Continue, beat), TieOutcome::Absorbed);
            assert_eq!(
                resolver.note_off(62, TieFlag::Continue, at(beat)),
                TieOutcome::Absorbed
            );
        }
        match resolver.note_off(62, TieFlag::Stop, at(6)) {
            TieOutcome::Closed(note) => {
                assert_eq!(note.start, at(0));
                assert_eq!(note.duration, Rational::from_integer(6));
            }
            other => panic!("expected Closed, got {:?}", other),
        }
    }

    #[test]
    fn test_stop_on_note_on_waits_for_note_off() {
        let mut resolver = TieResolver::new();
        on(&mut resolver, 64, TieFlag::Start, 0);
        assert_eq!(on(&mut resolver, 64, TieFlag::Stop, 2), TieOutcome::Absorbed);
        // Even a continue-flagged note-off closes an armed group
        match resolver.note_off(64, TieFlag::Continue, at(3)) {
            TieOutcome::Closed(note) => assert_eq!(note.duration, Rational::from_integer(3)),
            other => panic!("expected Closed, got {:?}", other),
        }
    }

    #[test]
    fn test_restrike_closes_previous() {
        let mut resolver = TieResolver::new();
        on(&mut resolver, 60, TieFlag::None, 0);
        match on(&mut resolver, 60, TieFlag::None, 2) {
            TieOutcome::Restruck(note) => assert_eq!(note.duration, Rational::from_integer(2)),
            other => panic!("expected Restruck, got {:?}", other),
        }
        assert_eq!(resolver.held(60).unwrap().start, at(2));
    }

    #[test]
    fn test_dangling_events() {
        let mut resolver = TieResolver::new();
        assert_eq!(resolver.note_off(60, TieFlag::Stop, at(1)), TieOutcome::Dangling);
        assert_eq!(resolver.note_off(60, TieFlag::None, at(1)), TieOutcome::Dangling);
        assert_eq!(on(&mut resolver, 60, TieFlag::Continue, 1), TieOutcome::Dangling);
        assert_eq!(on(&mut resolver, 60, TieFlag::Stop, 1), TieOutcome::Dangling);
        assert!(resolver.is_idle());
    }

    #[test]
    fn test_open_ignores_tie_state() {
        let mut resolver = TieResolver::new();
        assert_eq!(resolver.open(60, None, "p".to_string(), at(1)), None);
        assert_eq!(resolver.held(60).unwrap().start, at(1));

        // an armed group on the same pitch is closed, not absorbed
        on(&mut resolver, 60, TieFlag::Stop, 2);
        let previous = resolver.open(60, Some(90), "ff".to_string(), at(3)).unwrap();
        assert_eq!(previous.start, at(1));
        assert_eq!(previous.duration, Rational::from_integer(2));
        assert_eq!(previous.dynamic, "p");

        let held = resolver.held(60).unwrap();
        assert_eq!(held.start, at(3));
        assert_eq!(held.intensity, Some(90));
        assert!(matches!(
            resolver.note_off(60, TieFlag::None, at(4)),
            TieOutcome::Closed(_)
        ));
    }

    #[test]
    fn test_pitches_are_independent() {
        let mut resolver = TieResolver::new();
        on(&mut resolver, 60, TieFlag::Start, 0);
        on(&mut resolver, 67, TieFlag::None, 1);
        assert!(matches!(
            resolver.note_off(67, TieFlag::None, at(2)),
            TieOutcome::Closed(_)
        ));
        assert!(resolver.held(60).is_some());
    }

    #[test]
    fn test_drain_orders_by_start() {
        let mut resolver = TieResolver::new();
        on(&mut resolver, 72, TieFlag::None, 1);
        on(&mut resolver, 60, TieFlag::None, 0);
        let notes = resolver.drain(at(4));
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].duration, Rational::from_integer(4));
        assert_eq!(notes[1].pitch, 72);
        assert_eq!(notes[1].duration, Rational::from_integer(3));
        assert!(resolver.is_idle());
    }
}
