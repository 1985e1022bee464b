//! Rest collapsing
//!
//! Consecutive rest time folds into a single open span. Any note event
//! closes it.

use crate::time::{Rational, RhythmPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestSpan {
    pub start: RhythmPosition,
    pub end: RhythmPosition,
}

impl RestSpan {
    pub fn duration(&self) -> Rational {
        self.end.since(&self.start)
    }
}

#[derive(Debug, Default)]
pub struct RestCollapser {
    open: Option<RestSpan>,
}

impl RestCollapser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn still_resting(&self) -> bool {
        self.open.is_some()
    }

    /// Rest time from `from` to `to`; extends the open span if there is one.
    pub fn rest(&mut self, from: RhythmPosition, to: RhythmPosition) {
        match &mut self.open {
            Some(span) => span.end = to,
            None => self.open = Some(RestSpan { start: from, end: to }),
        }
    }

    /// A note event arrived: hand back the finished span, if any.
    pub fn interrupt(&mut self) -> Option<RestSpan> {
        self.open.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(beats: i64) -> RhythmPosition {
        RhythmPosition {
            measure: 1,
            offset: Rational::from_integer(beats),
            quarters_elapsed: Rational::from_integer(beats),
            beat_unit: 4,
        }
    }

    #[test]
    fn test_consecutive_rests_collapse() {
        let mut rests = RestCollapser::new();
        assert!(!rests.still_resting());
        rests.rest(at(0), at(1));
        rests.rest(at(1), at(2));
        rests.rest(at(2), at(3));
        assert!(rests.still_resting());

        let span = rests.interrupt().unwrap();
        assert_eq!(span.start, at(0));
        assert_eq!(span.duration(), Rational::from_integer(3));
        assert!(!rests.still_resting());
    }

    #[test]
    fn test_interrupt_without_rest() {
        let mut rests = RestCollapser::new();
        assert_eq!(rests.interrupt(), None);
    }

    #[test]
    fn test_new_span_after_interrupt() {
        let mut rests = RestCollapser::new();
        rests.rest(at(0), at(1));
        rests.interrupt();
        rests.rest(at(2), at(3));
        let span = rests.interrupt().unwrap();
        assert_eq!(span.start, at(2));
        assert_eq!(span.duration(), Rational::from_integer(1));
    }
}
