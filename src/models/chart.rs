//! Chart models used by the "what's hot" browser.

use serde::{Deserialize, Serialize};

/// A chart that can be requested by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chart {
    /// Opaque id passed back as `chart_id` when requesting the chart.
    pub id: String,

    /// Human-readable label.
    pub label: String,
}

impl Chart {
    /// Create a chart descriptor.
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, label: S2) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One row of a track chart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistTrackPair {
    pub artist: String,
    pub track: String,
}
