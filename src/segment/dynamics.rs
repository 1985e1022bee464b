//! Intensity -> dynamic marking lookup
//!
//! Lookup is exact-match on the table thresholds. What happens to an
//! intensity with no exact entry is the caller's choice
//! (`IntensityFallback`); the default keeps the raw number as text.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DynamicLevel {
    pub threshold: u8,
    pub label: String,
}

/// Result of an exact lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynamicLookup<'a> {
    Found(&'a str),
    NotFound(u8),
}

/// Display policy for `DynamicLookup::NotFound`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntensityFallback {
    /// Raw intensity as text ("77")
    #[default]
    Raw,
    /// Label of the closest threshold; ties go to the softer level
    Nearest,
    /// `"none"`
    Omit,
}

/// Ordered (threshold, label) pairs, softest first
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct DynamicsTable {
    levels: Vec<DynamicLevel>,
}

impl Default for DynamicsTable {
    fn default() -> Self {
        Self::new(
            [
                (20, "ppp"),
                (31, "pp"),
                (42, "p"),
                (53, "mp"),
                (64, "mf"),
                (80, "f"),
                (96, "ff"),
                (112, "fff"),
                (127, "ffff"),
            ]
            .iter()
            .map(|(threshold, label)| DynamicLevel {
                threshold: *threshold,
                label: label.to_string(),
            })
            .collect(),
        )
    }
}

impl DynamicsTable {
    pub fn new(levels: Vec<DynamicLevel>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[DynamicLevel] {
        &self.levels
    }

    pub fn lookup(&self, intensity: u8) -> DynamicLookup<'_> {
        self.levels
            .iter()
            .find(|level| level.threshold == intensity)
            .map(|level| DynamicLookup::Found(level.label.as_str()))
            .unwrap_or(DynamicLookup::NotFound(intensity))
    }

    pub fn nearest(&self, intensity: u8) -> Option<&str> {
        self.levels
            .iter()
            .min_by_key(|level| ((level.threshold as i16 - intensity as i16).abs(), level.threshold))
            .map(|level| level.label.as_str())
    }

    /// Label text for a note's intensity under `fallback`
    pub fn resolve(&self, intensity: u8, fallback: IntensityFallback) -> String {
        match self.lookup(intensity) {
            DynamicLookup::Found(label) => label.to_string(),
            DynamicLookup::NotFound(raw) => match fallback {
                IntensityFallback::Raw => raw.to_string(),
                IntensityFallback::Nearest => self
                    .nearest(raw)
                    .map(str::to_string)
                    .unwrap_or_else(|| raw.to_string()),
                IntensityFallback::Omit => crate::models::record::NO_DYNAMIC.to_string(),
            },
        }
    }
}
