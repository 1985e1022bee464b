//! Models for segmentation
//!
//! Input events, output records and the pitch-name table shared by the
//! front-ends and the exporter.

pub mod event;
pub mod pitch;
pub mod record;

// Re-export commonly used types
pub use event::{Event, EventKind, EventStream, TieFlag};
pub use pitch::{pitch_class, pitch_label, pitch_number, pitch_number_from_step, REST_PITCH};
pub use record::{Label, Record, Sentinel};
