//! Position tracking: measure number and offset within the measure
//!
//! The tracker is owned by a single segmentation pass. Time signature
//! changes that arrive mid-measure wait for the next barline.
//!
//! Absolute time is kept in quarter notes, independent of any signature.
//! A span between two positions is measured in the beats of the signature
//! in force at its start, so a note held through a change from 4/4 to 6/8
//! reports quarter beats and a note starting after it reports eighths.

use super::{
    checked_add, checked_sub, overflow, rescale_beats, ticks_to_beats, Rational, TimeSignature,
};
use crate::error::{Result, SegmentError};
use std::cmp::Ordering;

/// Longest stream a pass accepts, in ticks
pub const MAX_ELAPSED_TICKS: u64 = 1 << 40;

/// Snapshot of where the pass is on the bar grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RhythmPosition {
    /// 1-based measure number
    pub measure: u32,
    /// Beats into the measure, `0 <= offset < numerator`
    pub offset: Rational,
    /// Quarter notes consumed since the start of the pass
    pub quarters_elapsed: Rational,
    /// Denominator of the signature in force here
    pub beat_unit: u32,
}

impl RhythmPosition {
    pub fn origin() -> Self {
        Self {
            measure: 1,
            offset: Rational::from_integer(0),
            quarters_elapsed: Rational::from_integer(0),
            beat_unit: 4,
        }
    }

    /// 1-indexed beat within the measure
    pub fn start_beat(&self) -> Rational {
        self.offset + Rational::from_integer(1)
    }

    /// Quarter notes expressed in this position's beats
    pub fn beats_from_quarters(&self, quarters: Rational) -> Rational {
        quarters * Rational::new(self.beat_unit as i64, 4)
    }

    /// This position's beats expressed in quarter notes
    pub fn quarters_from_beats(&self, beats: Rational) -> Rational {
        beats * Rational::new(4, self.beat_unit as i64)
    }

    /// Beats from `earlier` to `self`, counted in `earlier`'s beats
    pub fn since(&self, earlier: &RhythmPosition) -> Rational {
        earlier.beats_from_quarters(self.quarters_elapsed - earlier.quarters_elapsed)
    }
}

impl PartialOrd for RhythmPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RhythmPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.quarters_elapsed
            .cmp(&other.quarters_elapsed)
            .then(self.measure.cmp(&other.measure))
            .then(self.offset.cmp(&other.offset))
            .then(self.beat_unit.cmp(&other.beat_unit))
    }
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    ticks_per_beat: u32,
    signature: Option<TimeSignature>,
    /// Signature announced mid-measure, applied at the next barline
    pending: Option<TimeSignature>,
    ticks_elapsed: u64,
    position: RhythmPosition,
}

impl PositionTracker {
    pub fn new(ticks_per_beat: u32, initial: Option<TimeSignature>) -> Result<Self> {
        if ticks_per_beat == 0 {
            return Err(SegmentError::Configuration(
                "ticks per beat must be non-zero".to_string(),
            ));
        }
        let mut position = RhythmPosition::origin();
        if let Some(sig) = &initial {
            sig.validate()?;
            position.beat_unit = sig.denominator;
        }
        Ok(Self {
            ticks_per_beat,
            signature: initial,
            pending: None,
            ticks_elapsed: 0,
            position,
        })
    }

    pub fn position(&self) -> RhythmPosition {
        self.position
    }

    pub fn signature(&self) -> Option<TimeSignature> {
        self.signature
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    /// Consume `ticks` and return the new position.
    pub fn advance(&mut self, ticks: u64) -> Result<RhythmPosition> {
        if ticks == 0 {
            return Ok(self.position);
        }
        let sig = self.signature.ok_or_else(|| {
            SegmentError::Configuration(
                "no time signature set before the first timed event".to_string(),
            )
        })?;
        let elapsed = self
            .ticks_elapsed
            .checked_add(ticks)
            .filter(|total| *total <= MAX_ELAPSED_TICKS)
            .ok_or_else(|| {
                SegmentError::Configuration(format!(
                    "stream runs past {} ticks",
                    MAX_ELAPSED_TICKS
                ))
            })?;

        let beats = ticks_to_beats(ticks as i64, sig.denominator, self.ticks_per_beat)?;
        let length = sig.measure_beats();
        let total = checked_add(self.position.offset, beats)?;
        let mut position = self.position;

        if total < length {
            position.offset = total;
        } else {
            // Cross the first barline under the current signature
            let mut leftover = checked_sub(total, length)?;
            position.measure = next_measure(position.measure, 1)?;

            if let Some(next) = self.pending.take() {
                log::debug!(
                    "time signature {} -> {} at measure {}",
                    sig,
                    next,
                    position.measure
                );
                leftover = rescale_beats(leftover, sig.denominator, next.denominator)?;
                self.signature = Some(next);
            }

            let numerator = self
                .signature
                .map(|s| s.numerator)
                .unwrap_or(sig.numerator) as i64;
            let whole = leftover.floor().to_integer() / numerator;
            let skipped = u32::try_from(whole).map_err(|_| overflow("measure number"))?;
            position.measure = next_measure(position.measure, skipped)?;
            position.offset = checked_sub(leftover, Rational::from_integer(whole * numerator))?;
        }

        self.ticks_elapsed = elapsed;
        position.quarters_elapsed = Rational::new(elapsed as i64, self.ticks_per_beat as i64);
        position.beat_unit = self.signature.map(|s| s.denominator).unwrap_or(sig.denominator);
        self.position = position;
        Ok(self.position)
    }

    /// Takes effect now when on a barline, otherwise at the next one.
    pub fn set_time_signature(&mut self, sig: TimeSignature) -> Result<()> {
        sig.validate()?;
        if self.position.offset == Rational::from_integer(0) {
            self.signature = Some(sig);
            self.pending = None;
            self.position.beat_unit = sig.denominator;
        } else {
            self.pending = Some(sig);
        }
        Ok(())
    }

    /// Explicit barline from the source.
    ///
    /// A barline that arrives mid-measure closes a short measure (pickup
    /// or cut bar); the next event starts the following measure.
    pub fn mark_measure_boundary(&mut self) -> Result<()> {
        if self.position.offset != Rational::from_integer(0) {
            log::debug!(
                "short measure {} closed at offset {}",
                self.position.measure,
                self.position.offset
            );
            self.position.measure = next_measure(self.position.measure, 1)?;
            self.position.offset = Rational::from_integer(0);
        }
        if let Some(next) = self.pending.take() {
            self.signature = Some(next);
            self.position.beat_unit = next.denominator;
        }
        Ok(())
    }

    /// Beats from the current position to the next barline.
    ///
    /// On a barline this is a full measure.
    pub fn remaining_in_measure(&self) -> Result<Rational> {
        let sig = self.signature.ok_or_else(|| {
            SegmentError::Configuration("no time signature to close the final measure".to_string())
        })?;
        checked_sub(sig.measure_beats(), self.position.offset)
    }
}

fn next_measure(measure: u32, count: u32) -> Result<u32> {
    measure
        .checked_add(count)
        .ok_or_else(|| overflow("measure number"))
}
