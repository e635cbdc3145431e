//! Playlist maintenance.
//!
//! - [`merge`]: reconcile a fetched track list with a playlist
//! - [`xspf`]: fetch and parse XSPF documents
//! - [`updater`]: keep a playlist in sync with a remote XSPF document

pub mod merge;
pub mod updater;
pub mod xspf;

pub use merge::merge_playlist_changes;
pub use updater::{SharedPlaylist, UpdaterHandle, XspfUpdater, XspfUpdaterFactory};
pub use xspf::{parse_xspf, TrackListSource, XspfLoader, XspfPlaylist, XspfTrack};
