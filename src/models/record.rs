//! Output label records

use super::pitch::{pitch_number, REST_PITCH};
use crate::error::Result;
use crate::time::{Rational, RhythmPosition};

/// What sounded during a segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Label {
    Pitch { name: String, octave: i8 },
    Rest,
}

impl Label {
    pub fn pitch(name: impl Into<String>, octave: i8) -> Self {
        Label::Pitch {
            name: name.into(),
            octave,
        }
    }

    /// `<name><accidental?><octave>` or `rest`
    pub fn notation(&self) -> String {
        match self {
            Label::Pitch { name, octave } => format!("{}{}", name, octave),
            Label::Rest => "rest".to_string(),
        }
    }

    /// Numeric pitch for exports; rests are `0`
    pub fn pitch_number(&self) -> Result<u8> {
        match self {
            Label::Pitch { .. } => pitch_number(&self.notation()),
            Label::Rest => Ok(REST_PITCH),
        }
    }
}

/// Boundary tokens bracketing every record sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sentinel {
    Start,
    End,
}

impl Sentinel {
    pub fn token(&self) -> &'static str {
        match self {
            Sentinel::Start => "start",
            Sentinel::End => "end",
        }
    }
}

/// Dynamic text used when none applies
pub const NO_DYNAMIC: &str = "none";

/// One emitted label
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub measure: u32,
    /// 1-indexed beat within the measure
    pub start_beat: Rational,
    /// Length in beats
    pub duration: Rational,
    pub label: Label,
    pub dynamic: String,
    pub sentinel: Option<Sentinel>,
}

impl Record {
    pub fn segment(
        start: &RhythmPosition,
        duration: Rational,
        label: Label,
        dynamic: impl Into<String>,
    ) -> Self {
        Self {
            measure: start.measure,
            start_beat: start.start_beat(),
            duration,
            label,
            dynamic: dynamic.into(),
            sentinel: None,
        }
    }

    pub fn start_sentinel() -> Self {
        Self {
            measure: 1,
            start_beat: Rational::from_integer(1),
            duration: Rational::from_integer(0),
            label: Label::Rest,
            dynamic: NO_DYNAMIC.to_string(),
            sentinel: Some(Sentinel::Start),
        }
    }

    pub fn end_sentinel(at: &RhythmPosition, duration: Rational) -> Self {
        Self {
            measure: at.measure,
            start_beat: at.start_beat(),
            duration,
            label: Label::Rest,
            dynamic: NO_DYNAMIC.to_string(),
            sentinel: Some(Sentinel::End),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentinel.is_some()
    }

    pub fn is_rest(&self) -> bool {
        self.sentinel.is_none() && self.label == Label::Rest
    }

    /// Note column text: pitch, `rest`, `start` or `end`
    pub fn note_text(&self) -> String {
        match self.sentinel {
            Some(sentinel) => sentinel.token().to_string(),
            None => self.label.notation(),
        }
    }
}
