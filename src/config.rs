//! Segmentation settings
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. YAML and JSON are both accepted.

use crate::error::{Result, SegmentError};
use crate::export::BeatFormat;
use crate::segment::dynamics::{DynamicsTable, IntensityFallback};
use crate::segment::ties::DanglingTiePolicy;
use crate::time::TimeSignature;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Used until the stream sets its own time signature
    pub default_time_signature: Option<TimeSignature>,
    /// Overrides the resolution reported by the source
    pub ticks_per_beat: Option<u32>,
    /// Semitones added before naming pitches
    pub transpose: i8,
    pub dynamics: DynamicsTable,
    pub unmatched_intensity: IntensityFallback,
    pub dangling_ties: DanglingTiePolicy,
    /// Count time with no held note as rest time
    pub fill_gaps_with_rests: bool,
    pub beat_format: BeatFormat,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            default_time_signature: None,
            ticks_per_beat: None,
            transpose: 0,
            dynamics: DynamicsTable::default(),
            unmatched_intensity: IntensityFallback::default(),
            dangling_ties: DanglingTiePolicy::default(),
            fill_gaps_with_rests: true,
            beat_format: BeatFormat::default(),
        }
    }
}

impl SegmentationConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| SegmentError::Config(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SegmentError::Config(e.to_string()))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Err(SegmentError::Config(format!(
                "unsupported config format: {}",
                path.display()
            ))),
        }
    }
}
