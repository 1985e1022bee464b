//! Event segmentation
//!
//! A single sequential fold over an `EventStream`:
//!
//! ```text
//! Events → PositionTracker → TieResolver / RestCollapser → RecordEmitter → Records
//! ```
//!
//! Each pass owns its tracker, held notes and rest state. Nothing is shared
//! between passes, so separate sources can be segmented in parallel (see
//! `batch`).

pub mod dynamics;
pub mod emitter;
pub mod rests;
pub mod ties;

pub use dynamics::{DynamicLookup, DynamicsTable, IntensityFallback};
pub use emitter::RecordEmitter;
pub use rests::{RestCollapser, RestSpan};
pub use ties::{DanglingTiePolicy, HeldNote, ResolvedNote, TieOutcome, TieResolver};

use crate::batch::{self, BatchEntry, BatchReport};
use crate::config::SegmentationConfig;
use crate::error::{Result, SegmentError};
use crate::models::record::NO_DYNAMIC;
use crate::models::{pitch_label, Event, EventKind, EventStream, Label, Record};
use crate::export::{self, TableFormat};
use crate::time::{PositionTracker, RhythmPosition, TimeSignature};
use std::path::Path;

/// Runs segmentation passes with one configuration
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Turn an ordered event stream into labeled records.
    pub fn segment(&self, stream: &EventStream) -> Result<Vec<Record>> {
        validate_order(&stream.events)?;

        let ticks_per_beat = self.config.ticks_per_beat.unwrap_or(stream.ticks_per_beat);
        let mut pass = Pass::new(&self.config, ticks_per_beat)?;
        for (index, event) in stream.events.iter().enumerate() {
            pass.step(index, event)?;
        }
        let records = pass.finish()?;

        log::debug!(
            "segmented {} events into {} records",
            stream.events.len(),
            records.len()
        );
        Ok(records)
    }

    /// Write one table, with beats rendered per `beat_format`.
    pub fn write_table(&self, path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
        export::write_table(path, records, self.config.beat_format)
    }

    /// `batch::write_batch` with this configuration's `beat_format`.
    pub fn write_batch(
        &self,
        dir: impl AsRef<Path>,
        entries: &[BatchEntry],
        format: TableFormat,
    ) -> Result<BatchReport> {
        batch::write_batch(dir, entries, format, self.config.beat_format)
    }
}

/// Segment with an explicit configuration.
pub fn segment(stream: &EventStream, config: &SegmentationConfig) -> Result<Vec<Record>> {
    Segmenter::new(config.clone()).segment(stream)
}

/// Reject the whole input if any delta is negative.
pub fn validate_order(events: &[Event]) -> Result<()> {
    match events.iter().position(|event| event.tick_delta < 0) {
        Some(index) => Err(SegmentError::MalformedEventOrder {
            index,
            tick_delta: events[index].tick_delta,
        }),
        None => Ok(()),
    }
}

/// State of one segmentation pass
struct Pass<'a> {
    config: &'a SegmentationConfig,
    tracker: PositionTracker,
    ties: TieResolver,
    rests: RestCollapser,
    emitter: RecordEmitter,
    /// Last marking from a `DynamicChange`
    dynamic: Option<String>,
}

impl<'a> Pass<'a> {
    fn new(config: &'a SegmentationConfig, ticks_per_beat: u32) -> Result<Self> {
        Ok(Self {
            config,
            tracker: PositionTracker::new(ticks_per_beat, config.default_time_signature)?,
            ties: TieResolver::new(),
            rests: RestCollapser::new(),
            emitter: RecordEmitter::new(),
            dynamic: None,
        })
    }

    fn step(&mut self, index: usize, event: &Event) -> Result<()> {
        let from = self.tracker.position();
        let to = self.tracker.advance(event.tick_delta as u64)?;

        match &event.kind {
            EventKind::Rest => self.rests.rest(from, to),
            _ if to > from && self.ties.is_idle() && self.config.fill_gaps_with_rests => {
                self.rests.rest(from, to)
            }
            _ => {}
        }

        match &event.kind {
            EventKind::NoteOn {
                pitch,
                intensity,
                tie,
            } => {
                self.close_rest();
                let dynamic = self.dynamic_for(*intensity);
                match self.ties.note_on(*pitch, *intensity, dynamic.clone(), *tie, to) {
                    TieOutcome::Opened => {}
                    TieOutcome::Absorbed => {
                        log::debug!("tie {:?} absorbed on pitch {}", tie, pitch);
                    }
                    TieOutcome::Restruck(note) => {
                        log::debug!("pitch {} struck again while held", pitch);
                        self.emit_note(note);
                    }
                    TieOutcome::Closed(note) => self.emit_note(note),
                    TieOutcome::Dangling => {
                        self.dangling(index, *pitch, &to)?;
                        if let Some(note) = self.ties.open(*pitch, *intensity, dynamic, to) {
                            self.emit_note(note);
                        }
                    }
                }
            }
            EventKind::NoteOff { pitch, tie } => {
                self.close_rest();
                match self.ties.note_off(*pitch, *tie, to) {
                    TieOutcome::Closed(note) | TieOutcome::Restruck(note) => self.emit_note(note),
                    TieOutcome::Opened => {}
                    TieOutcome::Absorbed => {
                        log::debug!("tie {:?} absorbed on pitch {}", tie, pitch);
                    }
                    TieOutcome::Dangling => self.dangling(index, *pitch, &to)?,
                }
            }
            EventKind::Rest => {}
            EventKind::MeasureBoundary => self.tracker.mark_measure_boundary()?,
            EventKind::TimeSignatureChange {
                numerator,
                denominator,
            } => {
                let sig = TimeSignature::new(*numerator, *denominator)?;
                self.tracker.set_time_signature(sig)?;
            }
            EventKind::KeySignatureChange { fifths, minor } => {
                log::trace!(
                    "key signature {} {} at measure {}",
                    fifths,
                    if *minor { "minor" } else { "major" },
                    to.measure
                );
            }
            EventKind::DynamicChange { level } => {
                self.dynamic = Some(level.clone());
            }
            EventKind::TempoChange { micros_per_quarter } => {
                log::trace!(
                    "tempo {} us/quarter at measure {}",
                    micros_per_quarter,
                    to.measure
                );
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Record>> {
        let last = self.tracker.position();
        for note in self.ties.drain(last) {
            log::warn!(
                "pitch {} still sounding at end of stream, closed at measure {}",
                note.pitch,
                last.measure
            );
            self.emit_note(note);
        }
        let open_rest = self.rests.interrupt();
        self.emitter.finish(&self.tracker, open_rest)
    }

    fn close_rest(&mut self) {
        if let Some(span) = self.rests.interrupt() {
            self.emitter.push_rest(&span);
        }
    }

    fn emit_note(&mut self, note: ResolvedNote) {
        let (name, octave) = pitch_label(note.pitch, self.config.transpose);
        let record = Record::segment(
            &note.start,
            note.duration,
            Label::pitch(name, octave),
            note.dynamic,
        );
        self.emitter.push(note.start, record);
    }

    fn dynamic_for(&self, intensity: Option<u8>) -> String {
        match intensity {
            Some(value) => self
                .config
                .dynamics
                .resolve(value, self.config.unmatched_intensity),
            None => self
                .dynamic
                .clone()
                .unwrap_or_else(|| NO_DYNAMIC.to_string()),
        }
    }

    fn dangling(&self, index: usize, pitch: u8, at: &RhythmPosition) -> Result<()> {
        match self.config.dangling_ties {
            DanglingTiePolicy::Reject => Err(SegmentError::DanglingTie {
                pitch,
                measure: at.measure,
                beat: at.start_beat(),
            }),
            DanglingTiePolicy::Skip => {
                log::warn!(
                    "event {}: no held note for pitch {} at measure {}, beat {}; skipping tie",
                    index,
                    pitch,
                    at.measure,
                    at.start_beat()
                );
                Ok(())
            }
        }
    }
}
