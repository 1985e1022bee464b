//! Error types for segmentation
//!
//! A pass either yields its full record sequence or one of these errors.
//! There is no partial result: later records depend on the rhythmic
//! position left by earlier events.

use crate::time::Rational;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    /// Missing or zero time signature / ticks-per-beat
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown pitch name: {0}")]
    UnknownPitchName(String),

    /// Tie continuation or note-off with no held note for that pitch
    #[error("dangling tie on pitch {pitch} at measure {measure}, beat {beat}")]
    DanglingTie {
        pitch: u8,
        measure: u32,
        beat: Rational,
    },

    /// Negative tick delta; the whole input is rejected
    #[error("malformed event order at event {index}: tick delta {tick_delta}")]
    MalformedEventOrder { index: usize, tick_delta: i64 },

    #[error("midi decode error: {0}")]
    Midi(String),

    #[error("xml parse error: {0}")]
    Xml(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SegmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_tie_message() {
        let err = SegmentError::DanglingTie {
            pitch: 60,
            measure: 3,
            beat: Rational::new(5, 2),
        };
        assert_eq!(err.to_string(), "dangling tie on pitch 60 at measure 3, beat 5/2");
    }

    #[test]
    fn test_malformed_order_message() {
        let err = SegmentError::MalformedEventOrder { index: 4, tick_delta: -10 };
        assert_eq!(
            err.to_string(),
            "malformed event order at event 4: tick delta -10"
        );
    }
}
