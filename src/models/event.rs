//! Source events
//!
//! A closed tagged union: every consumer matches `EventKind` exhaustively.

use serde::{Deserialize, Serialize};

/// Tie role of a note event
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TieFlag {
    #[default]
    None,
    Start,
    Continue,
    Stop,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum EventKind {
    NoteOn {
        pitch: u8,
        /// Velocity; score sources usually carry none
        #[serde(default)]
        intensity: Option<u8>,
        #[serde(default)]
        tie: TieFlag,
    },
    NoteOff {
        pitch: u8,
        #[serde(default)]
        tie: TieFlag,
    },
    /// Silence whose length is this event's tick delta
    Rest,
    MeasureBoundary,
    TimeSignatureChange {
        numerator: u32,
        denominator: u32,
    },
    KeySignatureChange {
        /// Sharps (positive) or flats (negative)
        fifths: i8,
        #[serde(default)]
        minor: bool,
    },
    DynamicChange {
        level: String,
    },
    TempoChange {
        micros_per_quarter: u32,
    },
}

/// One timed occurrence from the source
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Ticks since the previous event; must not be negative
    pub tick_delta: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(tick_delta: i64, kind: EventKind) -> Self {
        Self { tick_delta, kind }
    }

    pub fn note_on(tick_delta: i64, pitch: u8, intensity: Option<u8>, tie: TieFlag) -> Self {
        Self::new(tick_delta, EventKind::NoteOn { pitch, intensity, tie })
    }

    pub fn note_off(tick_delta: i64, pitch: u8, tie: TieFlag) -> Self {
        Self::new(tick_delta, EventKind::NoteOff { pitch, tie })
    }

    pub fn rest(tick_delta: i64) -> Self {
        Self::new(tick_delta, EventKind::Rest)
    }

    pub fn measure_boundary(tick_delta: i64) -> Self {
        Self::new(tick_delta, EventKind::MeasureBoundary)
    }

    pub fn time_signature(tick_delta: i64, numerator: u32, denominator: u32) -> Self {
        Self::new(tick_delta, EventKind::TimeSignatureChange { numerator, denominator })
    }

    pub fn key_signature(tick_delta: i64, fifths: i8, minor: bool) -> Self {
        Self::new(tick_delta, EventKind::KeySignatureChange { fifths, minor })
    }

    pub fn dynamic(tick_delta: i64, level: impl Into<String>) -> Self {
        Self::new(tick_delta, EventKind::DynamicChange { level: level.into() })
    }

    pub fn tempo(tick_delta: i64, micros_per_quarter: u32) -> Self {
        Self::new(tick_delta, EventKind::TempoChange { micros_per_quarter })
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { .. } | EventKind::NoteOff { .. })
    }
}

/// A fully materialized, ordered event list plus its tick resolution
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventStream {
    pub ticks_per_beat: u32,
    pub events: Vec<Event>,
}

impl EventStream {
    pub fn new(ticks_per_beat: u32, events: Vec<Event>) -> Self {
        Self { ticks_per_beat, events }
    }
}
