//! Source front-ends
//!
//! Each front-end turns a file format into an [`EventStream`]; the engine
//! never sees the source format.

pub mod midi;
pub mod musicxml;

pub use midi::parse_midi;
pub use musicxml::parse_musicxml;

use crate::error::{Result, SegmentError};
use crate::models::EventStream;
use std::path::Path;

/// Read a source file, choosing the front-end by extension.
///
/// `.mid`/`.midi` are decoded as Standard MIDI Files, `.xml`/`.musicxml`
/// as MusicXML, and `.json` as a serialized event stream.
pub fn load_source(path: impl AsRef<Path>) -> Result<EventStream> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let stream = match extension.as_deref() {
        Some("mid") | Some("midi") => parse_midi(&std::fs::read(path)?)?,
        Some("xml") | Some("musicxml") => parse_musicxml(&std::fs::read(path)?)?,
        Some("json") => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)
                .map_err(|e| SegmentError::Config(format!("invalid event stream: {}", e)))?
        }
        _ => {
            return Err(SegmentError::Config(format!(
                "unsupported source format: {}",
                path.display()
            )))
        }
    };
    log::info!(
        "loaded {} events from {}",
        stream.events.len(),
        path.display()
    );
    Ok(stream)
}
