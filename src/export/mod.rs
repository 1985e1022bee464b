//! Table export
//!
//! One table per source, one row per record, in emission order. Tables are
//! rendered fully in memory, written to a temporary file next to the target
//! and renamed over it, so readers never see a partial table.

use crate::error::{Result, SegmentError};
use crate::models::Record;
use crate::time::{format_decimal, Rational};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Text encoding of beat positions and durations
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BeatFormat {
    /// Exact: `3/2`, `4`
    #[default]
    Rational,
    /// Rounded to six places: `1.5`, `0.333333`
    Decimal,
}

impl BeatFormat {
    pub fn format(&self, value: Rational) -> String {
        match self {
            BeatFormat::Rational => value.to_string(),
            BeatFormat::Decimal => format_decimal(value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => Ok(TableFormat::Csv),
            Some("json") => Ok(TableFormat::Json),
            _ => Err(SegmentError::Config(format!(
                "unsupported table format: {}",
                path.display()
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Json => "json",
        }
    }
}

/// One table row; every field is text
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    pub measure: String,
    pub start_beat: String,
    pub duration: String,
    pub note: String,
    pub dynamic: String,
}

const COLUMNS: [&str; 5] = ["measure", "start_beat", "duration", "note", "dynamic"];

impl TableRow {
    pub fn from_record(record: &Record, beats: BeatFormat) -> Self {
        Self {
            measure: record.measure.to_string(),
            start_beat: beats.format(record.start_beat),
            duration: beats.format(record.duration),
            note: record.note_text(),
            dynamic: record.dynamic.clone(),
        }
    }

    fn fields(&self) -> [&str; 5] {
        [
            self.measure.as_str(),
            self.start_beat.as_str(),
            self.duration.as_str(),
            self.note.as_str(),
            self.dynamic.as_str(),
        ]
    }
}

pub fn rows(records: &[Record], beats: BeatFormat) -> Vec<TableRow> {
    records
        .iter()
        .map(|record| TableRow::from_record(record, beats))
        .collect()
}

pub fn to_csv(records: &[Record], beats: BeatFormat) -> String {
    let mut out = COLUMNS.join(",");
    out.push('\n');
    for row in rows(records, beats) {
        let line: Vec<String> = row.fields().iter().map(|field| csv_field(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

pub fn to_json(records: &[Record], beats: BeatFormat) -> Result<String> {
    serde_json::to_string_pretty(&rows(records, beats))
        .map_err(|e| SegmentError::Config(format!("failed to encode table: {}", e)))
}

pub fn render(records: &[Record], format: TableFormat, beats: BeatFormat) -> Result<String> {
    match format {
        TableFormat::Csv => Ok(to_csv(records, beats)),
        TableFormat::Json => to_json(records, beats),
    }
}

/// Write one source's table; the format follows the file extension.
pub fn write_table(path: impl AsRef<Path>, records: &[Record], beats: BeatFormat) -> Result<()> {
    let path = path.as_ref();
    let text = render(records, TableFormat::from_path(path)?, beats)?;
    write_atomic(path, text.as_bytes())?;
    log::debug!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Replace `path` with `contents` in one rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| SegmentError::Io(e.error))?;
    Ok(())
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
