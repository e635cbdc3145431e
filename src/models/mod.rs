//! Data models.
//!
//! This module contains the data structures for artist metadata,
//! playlists with their revisions, and charts.

pub mod artist;
pub mod chart;
pub mod playlist;

// Re-exports for convenience
pub use artist::{Artist, Biography, License, Term};
pub use chart::{ArtistTrackPair, Chart};
pub use playlist::{Playlist, PlaylistEntry, PlaylistRevision, Query};
