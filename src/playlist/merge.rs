//! Reconciling a freshly fetched track list with a playlist.

use std::sync::Arc;

use crate::models::Query;

/// Merge `new_tracks` into `orig`.
///
/// The result has the order and length of `new_tracks`. Every new query that
/// matches (same artist, track and album) a query of `orig` is replaced by
/// that original query, so entries already in the playlist keep their
/// identity; each original query is reused at most once, so duplicates in the
/// new list only pick up as many originals as there are.
///
/// The returned flag is `false` exactly when the merged list is the original
/// list, element for element.
pub fn merge_playlist_changes(
    orig: &[Arc<Query>],
    new_tracks: &[Arc<Query>],
) -> (Vec<Arc<Query>>, bool) {
    let mut reusable: Vec<Option<&Arc<Query>>> = orig.iter().map(Some).collect();

    let merged: Vec<Arc<Query>> = new_tracks
        .iter()
        .map(|new_query| {
            let found = reusable
                .iter_mut()
                .find(|slot| slot.map_or(false, |old| **old == **new_query))
                .and_then(Option::take);

            match found {
                Some(old) => Arc::clone(old),
                None => Arc::clone(new_query),
            }
        })
        .collect();

    let unchanged = merged.len() == orig.len()
        && merged.iter().zip(orig).all(|(m, o)| Arc::ptr_eq(m, o));

    (merged, !unchanged)
}
