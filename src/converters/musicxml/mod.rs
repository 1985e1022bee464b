//! MusicXML front-end
//!
//! Reads the first part of a partwise score. Divisions become ticks: the
//! stream resolution is the least common multiple of every `<divisions>`
//! in the part, so durations are rescaled exactly.

mod parse;

pub use parse::parse_musicxml;
