//! Playlist-related models.
//!
//! A [`Playlist`] is an ordered list of [`PlaylistEntry`] values plus the
//! history of [`PlaylistRevision`]s that produced it. Entries share their
//! [`Query`] through an `Arc` so that identity survives a merge: a query that
//! was already in the playlist keeps the same allocation in the next revision.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CadenzaError, Result};

/// Description of a track to be resolved against the collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Query {
    /// Artist name.
    pub artist: String,

    /// Track title.
    pub track: String,

    /// Album title; empty when unknown.
    #[serde(default)]
    pub album: String,
}

impl Query {
    /// Create a new query.
    pub fn new<S1, S2, S3>(artist: S1, track: S2, album: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            artist: artist.into(),
            track: track.into(),
            album: album.into(),
        }
    }

    /// Shared handle, as stored in playlists.
    pub fn shared(self) -> Arc<Query> {
        Arc::new(self)
    }

    /// "Artist - Track" for log output.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.track)
    }
}

/// One row of a playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistEntry {
    /// Entry guid, unique within the playlist.
    pub guid: String,

    /// Track this entry points at.
    pub query: Arc<Query>,

    /// Duration in milliseconds, when known.
    #[serde(default)]
    pub duration_ms: u64,

    /// Where the track was found, as given by the playlist source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Free-form annotation.
    #[serde(default)]
    pub annotation: String,
}

impl PlaylistEntry {
    /// Create an entry with a fresh guid.
    pub fn new(query: Arc<Query>) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            query,
            duration_ms: 0,
            location: None,
            annotation: String::new(),
        }
    }
}

/// Immutable snapshot of a playlist's ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistRevision {
    /// Revision guid.
    pub guid: String,

    /// Revision this one was based on; `None` for the first revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Guids of the entries, in order.
    pub entry_guids: Vec<String>,

    /// Guid of whoever created the revision (e.g. an updater).
    #[serde(default)]
    pub author: String,
}

/// A playlist and its revision history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    /// Playlist guid.
    pub guid: String,

    /// Playlist title.
    pub title: String,

    /// Entries of the current revision.
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,

    /// Guid of the current revision.
    pub current_revision: String,

    /// All revisions, oldest first.
    #[serde(default)]
    pub revisions: Vec<PlaylistRevision>,
}

impl Playlist {
    /// Create an empty playlist with an initial, empty revision.
    pub fn new<S: Into<String>>(title: S) -> Self {
        let revision = PlaylistRevision {
            guid: Uuid::new_v4().to_string(),
            parent: None,
            entry_guids: Vec::new(),
            author: String::new(),
        };
        Self {
            guid: Uuid::new_v4().to_string(),
            title: title.into(),
            entries: Vec::new(),
            current_revision: revision.guid.clone(),
            revisions: vec![revision],
        }
    }

    /// Queries of the current entries, in order.
    pub fn queries(&self) -> Vec<Arc<Query>> {
        self.entries.iter().map(|e| Arc::clone(&e.query)).collect()
    }

    /// Get the number of entries.
    pub fn track_count(&self) -> usize {
        self.entries.len()
    }

    /// Get total duration of all entries in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.entries.iter().map(|e| e.duration_ms).sum()
    }

    /// Build entries for the given queries.
    ///
    /// A query that is the same allocation as one of the current entries'
    /// query reuses that entry, guid included. Everything else gets a new
    /// entry. With `clear_guids` set, reused entries are still given fresh
    /// guids so the new revision shares no entry ids with the old one.
    pub fn entries_from_queries(
        &self,
        queries: &[Arc<Query>],
        clear_guids: bool,
    ) -> Vec<PlaylistEntry> {
        let mut available: Vec<&PlaylistEntry> = self.entries.iter().collect();

        queries
            .iter()
            .map(|query| {
                let existing = available
                    .iter()
                    .position(|e| Arc::ptr_eq(&e.query, query))
                    .map(|idx| available.remove(idx));

                match existing {
                    Some(entry) => {
                        let mut entry = entry.clone();
                        if clear_guids {
                            entry.guid = Uuid::new_v4().to_string();
                        }
                        entry
                    }
                    None => PlaylistEntry::new(Arc::clone(query)),
                }
            })
            .collect()
    }

    /// Commit a new revision.
    ///
    /// `old_rev` must be the current revision; otherwise someone else committed
    /// in between and [`CadenzaError::RevisionConflict`] is returned without
    /// touching the playlist.
    pub fn create_new_revision(
        &mut self,
        new_rev: &str,
        old_rev: &str,
        entries: Vec<PlaylistEntry>,
        author: &str,
    ) -> Result<()> {
        if old_rev != self.current_revision {
            return Err(CadenzaError::RevisionConflict {
                expected: old_rev.to_string(),
                current: self.current_revision.clone(),
            });
        }

        let revision = PlaylistRevision {
            guid: new_rev.to_string(),
            parent: Some(old_rev.to_string()),
            entry_guids: entries.iter().map(|e| e.guid.clone()).collect(),
            author: author.to_string(),
        };

        debug!(
            "Playlist '{}': revision {} -> {} ({} entries)",
            self.title,
            old_rev,
            new_rev,
            entries.len()
        );

        self.entries = entries;
        self.current_revision = revision.guid.clone();
        self.revisions.push(revision);
        Ok(())
    }

    /// Number of revisions, the initial one included.
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_with(tracks: &[(&str, &str)]) -> Playlist {
        let mut playlist = Playlist::new("Test");
        let queries: Vec<_> = tracks
            .iter()
            .map(|(a, t)| Query::new(*a, *t, "").shared())
            .collect();
        let entries = playlist.entries_from_queries(&queries, false);
        let current = playlist.current_revision.clone();
        playlist
            .create_new_revision("rev-1", &current, entries, "test")
            .unwrap();
        playlist
    }

    #[test]
    fn test_new_playlist_has_initial_revision() {
        let playlist = Playlist::new("Empty");
        assert_eq!(playlist.revision_count(), 1);
        assert_eq!(playlist.revisions[0].guid, playlist.current_revision);
        assert!(playlist.entries.is_empty());
    }

    #[test]
    fn test_create_new_revision_moves_current() {
        let playlist = playlist_with(&[("A", "1"), ("B", "2")]);
        assert_eq!(playlist.current_revision, "rev-1");
        assert_eq!(playlist.revision_count(), 2);
        assert_eq!(playlist.revisions[1].entry_guids.len(), 2);
        assert_eq!(playlist.track_count(), 2);
    }

    #[test]
    fn test_stale_revision_is_rejected() {
        let mut playlist = playlist_with(&[("A", "1")]);
        let err = playlist
            .create_new_revision("rev-2", "not-current", Vec::new(), "test")
            .unwrap_err();
        assert!(matches!(err, CadenzaError::RevisionConflict { .. }));
        assert_eq!(playlist.current_revision, "rev-1");
        assert_eq!(playlist.track_count(), 1);
    }

    #[test]
    fn test_entries_from_queries_reuses_entries() {
        let playlist = playlist_with(&[("A", "1"), ("B", "2")]);
        let mut queries = playlist.queries();
        queries.reverse();
        queries.push(Query::new("C", "3", "").shared());

        let entries = playlist.entries_from_queries(&queries, false);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].guid, playlist.entries[1].guid);
        assert_eq!(entries[1].guid, playlist.entries[0].guid);
        assert!(playlist.entries.iter().all(|e| e.guid != entries[2].guid));
    }

    #[test]
    fn test_entries_from_queries_clear_guids() {
        let playlist = playlist_with(&[("A", "1")]);
        let entries = playlist.entries_from_queries(&playlist.queries(), true);
        assert_eq!(entries.len(), 1);
        assert!(Arc::ptr_eq(&entries[0].query, &playlist.entries[0].query));
        assert_ne!(entries[0].guid, playlist.entries[0].guid);
    }

    #[test]
    fn test_equal_but_distinct_query_gets_new_entry() {
        let playlist = playlist_with(&[("A", "1")]);
        let queries = vec![Query::new("A", "1", "").shared()];
        let entries = playlist.entries_from_queries(&queries, false);
        assert_ne!(entries[0].guid, playlist.entries[0].guid);
    }
}
