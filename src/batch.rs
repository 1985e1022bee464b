//! Multi-source segmentation
//!
//! Sources are independent: each gets its own pass, so they are segmented
//! in parallel and a failure in one never reaches the others.

use crate::error::{Result, SegmentError};
use crate::export::{render, write_atomic, BeatFormat, TableFormat};
use crate::models::{EventStream, Record};
use crate::segment::Segmenter;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// One input of a batch, named by the id its table is written under
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: String,
    pub stream: EventStream,
}

impl SourceFile {
    pub fn new(id: impl Into<String>, stream: EventStream) -> Self {
        Self {
            id: id.into(),
            stream,
        }
    }
}

#[derive(Debug)]
pub struct BatchEntry {
    pub id: String,
    pub result: Result<Vec<Record>>,
}

/// What `write_batch` did with each entry
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    /// `(id, reason)` for every entry that produced no table
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Segment every source in parallel; results keep the input order.
pub fn segment_batch(sources: &[SourceFile], segmenter: &Segmenter) -> Vec<BatchEntry> {
    sources
        .par_iter()
        .map(|source| BatchEntry {
            id: source.id.clone(),
            result: segmenter.segment(&source.stream),
        })
        .collect()
}

/// Write `<id>.<ext>` under `dir` for every successful entry.
///
/// Failed entries, and entries whose table could not be written, are
/// listed in the report instead. Only a missing output directory aborts
/// the whole batch.
pub fn write_batch(
    dir: impl AsRef<Path>,
    entries: &[BatchEntry],
    format: TableFormat,
    beats: BeatFormat,
) -> Result<BatchReport> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(SegmentError::Config(format!(
            "output directory does not exist: {}",
            dir.display()
        )));
    }

    let mut report = BatchReport::default();
    for entry in entries {
        let records = match &entry.result {
            Ok(records) => records,
            Err(e) => {
                log::warn!("{}: not written: {}", entry.id, e);
                report.failed.push((entry.id.clone(), e.to_string()));
                continue;
            }
        };

        let path = dir.join(format!("{}.{}", entry.id, format.extension()));
        let written = render(records, format, beats)
            .and_then(|text| write_atomic(&path, text.as_bytes()));
        match written {
            Ok(()) => report.written.push(path),
            Err(e) => {
                log::warn!("{}: failed to write {}: {}", entry.id, path.display(), e);
                report.failed.push((entry.id.clone(), e.to_string()));
            }
        }
    }

    log::info!(
        "batch: {} tables written, {} failed",
        report.written.len(),
        report.failed.len()
    );
    Ok(report)
}
