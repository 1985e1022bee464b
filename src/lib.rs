//! Etude Labels
//!
//! Turns a musical event stream (from MIDI or MusicXML) into position-stamped
//! label records: one record per note or rest, with its measure, starting
//! beat, exact rational duration, pitch name and dynamic, bracketed by
//! start/end sentinels. Time is tracked as exact fractions of a beat, so
//! long pieces never drift.

pub mod batch;
pub mod config;
pub mod converters;
pub mod error;
pub mod export;
pub mod models;
pub mod segment;
pub mod time;

// Re-export commonly used types
pub use batch::{segment_batch, write_batch, BatchEntry, BatchReport, SourceFile};
pub use config::SegmentationConfig;
pub use converters::{load_source, parse_midi, parse_musicxml};
pub use error::{Result, SegmentError};
pub use export::{write_table, BeatFormat, TableFormat, TableRow};
pub use models::{Event, EventKind, EventStream, Label, Record, Sentinel, TieFlag};
pub use segment::{segment, Segmenter};
pub use time::{Rational, RhythmPosition, TimeSignature};
