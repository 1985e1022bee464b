//! Record assembly
//!
//! Collects content records, orders them by start position and brackets
//! them with the `start`/`end` sentinels.

use super::rests::RestSpan;
use crate::error::Result;
use crate::models::record::NO_DYNAMIC;
use crate::models::{Label, Record};
use crate::time::{checked_add, checked_sub, PositionTracker, Rational, RhythmPosition};

#[derive(Debug, Default)]
pub struct RecordEmitter {
    records: Vec<(RhythmPosition, Record)>,
}

impl RecordEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Zero-length segments are dropped.
    pub fn push(&mut self, start: RhythmPosition, record: Record) {
        if record.duration <= Rational::from_integer(0) {
            log::debug!(
                "dropping zero-length {} at measure {}, beat {}",
                record.note_text(),
                record.measure,
                record.start_beat
            );
            return;
        }
        self.records.push((start, record));
    }

    pub fn push_rest(&mut self, span: &RestSpan) {
        let record = Record::segment(&span.start, span.duration(), Label::Rest, NO_DYNAMIC);
        self.push(span.start, record);
    }

    /// Final sequence. A rest still open at the end is not emitted; its
    /// time goes into the `end` sentinel instead.
    pub fn finish(
        mut self,
        tracker: &PositionTracker,
        dangling_rest: Option<RestSpan>,
    ) -> Result<Vec<Record>> {
        let last = tracker.position();
        let (anchor, duration) = match dangling_rest {
            Some(span) => {
                let on_barline = last.offset == Rational::from_integer(0) && last > span.start;
                let fill = if on_barline {
                    Rational::from_integer(0)
                } else {
                    last.quarters_from_beats(tracker.remaining_in_measure()?)
                };
                let quarters = checked_add(
                    checked_sub(last.quarters_elapsed, span.start.quarters_elapsed)?,
                    fill,
                )?;
                (span.start, span.start.beats_from_quarters(quarters))
            }
            None => (last, tracker.remaining_in_measure()?),
        };

        self.records.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::with_capacity(self.records.len() + 2);
        out.push(Record::start_sentinel());
        out.extend(self.records.into_iter().map(|(_, record)| record));
        out.push(Record::end_sentinel(&anchor, duration));
        Ok(out)
    }
}
