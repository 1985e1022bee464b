//! Exact rhythmic time
//!
//! Every duration and position is a `Rational` (`Ratio<i64>`). Ticks are
//! converted with `ticks × denominator / (ticks_per_beat × 4)`, so a beat is
//! whatever note value the active time signature counts, and no float ever
//! enters the bookkeeping. Arithmetic that could overflow is checked and
//! surfaces as `SegmentError::Configuration`.

pub mod position;

pub use position::{PositionTracker, RhythmPosition};

use crate::error::{Result, SegmentError};
use num_traits::{CheckedAdd, CheckedMul, CheckedSub};
use serde::{Deserialize, Serialize};

pub type Rational = num_rational::Ratio<i64>;

/// Largest accepted time-signature denominator
pub const MAX_DENOMINATOR: u32 = 256;

/// Time signature (e.g. 3/4, 6/8)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        let sig = Self { numerator, denominator };
        sig.validate()?;
        Ok(sig)
    }

    pub fn validate(&self) -> Result<()> {
        if self.numerator == 0 || self.denominator == 0 {
            return Err(SegmentError::Configuration(format!(
                "undefined time signature {}/{}",
                self.numerator, self.denominator
            )));
        }
        if self.denominator > MAX_DENOMINATOR {
            return Err(SegmentError::Configuration(format!(
                "time signature {}/{}: denominator above {}",
                self.numerator, self.denominator, MAX_DENOMINATOR
            )));
        }
        Ok(())
    }

    /// Measure length in beats
    pub fn measure_beats(&self) -> Rational {
        Rational::from_integer(self.numerator as i64)
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Convert a tick count to beats of `denominator` note value.
pub fn ticks_to_beats(ticks: i64, denominator: u32, ticks_per_beat: u32) -> Result<Rational> {
    if ticks_per_beat == 0 {
        return Err(SegmentError::Configuration(
            "ticks per beat must be non-zero".to_string(),
        ));
    }
    if denominator == 0 {
        return Err(SegmentError::Configuration(
            "time signature denominator must be non-zero".to_string(),
        ));
    }
    let numer = ticks
        .checked_mul(denominator as i64)
        .ok_or_else(|| overflow("tick count"))?;
    Ok(Rational::new(numer, ticks_per_beat as i64 * 4))
}

/// Re-express a beat count when the counted note value changes
/// (e.g. quarter beats of 4/4 into eighth beats of 6/8).
pub fn rescale_beats(beats: Rational, from_denominator: u32, to_denominator: u32) -> Result<Rational> {
    if from_denominator == 0 || to_denominator == 0 {
        return Err(SegmentError::Configuration(
            "time signature denominator must be non-zero".to_string(),
        ));
    }
    checked_mul(
        beats,
        Rational::new(to_denominator as i64, from_denominator as i64),
    )
}

pub(crate) fn checked_add(a: Rational, b: Rational) -> Result<Rational> {
    a.checked_add(&b).ok_or_else(|| overflow("beat sum"))
}

pub(crate) fn checked_sub(a: Rational, b: Rational) -> Result<Rational> {
    a.checked_sub(&b).ok_or_else(|| overflow("beat difference"))
}

pub(crate) fn checked_mul(a: Rational, b: Rational) -> Result<Rational> {
    a.checked_mul(&b).ok_or_else(|| overflow("beat product"))
}

pub(crate) fn overflow(what: &str) -> SegmentError {
    SegmentError::Configuration(format!("{} overflows exact time arithmetic", what))
}

/// Render a rational as a terminating-or-rounded decimal string.
pub fn format_decimal(value: Rational) -> String {
    if value.is_integer() {
        return value.to_integer().to_string();
    }
    let approx = *value.numer() as f64 / *value.denom() as f64;
    let text = format!("{:.6}", approx);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_note_is_one_beat_in_common_time() {
        assert_eq!(ticks_to_beats(480, 4, 480).unwrap(), Rational::from_integer(1));
    }

    #[test]
    fn test_eighth_note_beats_in_compound_time() {
        // 6/8 counts eighths: a quarter note is two beats
        assert_eq!(ticks_to_beats(480, 8, 480).unwrap(), Rational::from_integer(2));
        assert_eq!(ticks_to_beats(240, 8, 480).unwrap(), Rational::from_integer(1));
    }

    #[test]
    fn test_triplet_ticks_stay_exact() {
        let third = ticks_to_beats(160, 4, 480).unwrap();
        assert_eq!(third, Rational::new(1, 3));
        assert_eq!(third + third + third, Rational::from_integer(1));
    }

    #[test]
    fn test_zero_denominators_are_configuration_errors() {
        assert!(matches!(
            ticks_to_beats(480, 4, 0),
            Err(SegmentError::Configuration(_))
        ));
        assert!(matches!(
            ticks_to_beats(480, 0, 480),
            Err(SegmentError::Configuration(_))
        ));
        assert!(TimeSignature::new(0, 4).is_err());
        assert!(TimeSignature::new(3, 0).is_err());
        assert!(TimeSignature::new(3, 512).is_err());
        assert!(TimeSignature::new(3, 256).is_ok());
    }

    #[test]
    fn test_huge_tick_count_is_an_error_not_a_panic() {
        assert!(matches!(
            ticks_to_beats(i64::MAX / 2, 4, 480),
            Err(SegmentError::Configuration(_))
        ));
        assert!(checked_add(Rational::from_integer(i64::MAX), Rational::from_integer(1)).is_err());
    }

    #[test]
    fn test_rescale_quarters_to_eighths() {
        let beats = rescale_beats(Rational::new(3, 2), 4, 8).unwrap();
        assert_eq!(beats, Rational::from_integer(3));
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(Rational::from_integer(3)), "3");
        assert_eq!(format_decimal(Rational::new(3, 2)), "1.5");
        assert_eq!(format_decimal(Rational::new(1, 3)), "0.333333");
    }
}
