//! XSPF playlist loading.
//!
//! Fetches an XSPF document over HTTP and turns its track list into
//! [`Query`] values. Only the parts of XSPF 1 a player needs are read:
//! the playlist title and creator, and per track the creator, title, album,
//! duration and location.

use futures_util::future::BoxFuture;
use reqwest::Client;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CadenzaError, Result};
use crate::models::Query;

/// User agent sent when fetching playlists.
const USER_AGENT: &str = concat!("cadenza/", env!("CARGO_PKG_VERSION"));

/// A track of an XSPF document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct XspfTrack {
    pub creator: String,
    pub title: String,
    #[serde(default)]
    pub album: String,
    /// Duration in milliseconds, 0 when absent.
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl XspfTrack {
    /// Query describing this track.
    pub fn to_query(&self) -> Query {
        Query::new(&self.creator, &self.title, &self.album)
    }
}

/// A parsed XSPF document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct XspfPlaylist {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub tracks: Vec<XspfTrack>,
    /// Whether the host should resolve the tracks as soon as they arrive.
    #[serde(default)]
    pub auto_resolve: bool,
}

/// Text of the first child element called `name`, trimmed.
fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// Parse an XSPF document.
///
/// Tracks lacking a title or a creator cannot be resolved and are skipped. A
/// document without any usable track is rejected, so that a broken remote
/// file never empties a playlist.
pub fn parse_xspf(xml: &str) -> Result<XspfPlaylist> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    if root.tag_name().name() != "playlist" {
        return Err(CadenzaError::InvalidPlaylist(format!(
            "root element is <{}>, expected <playlist>",
            root.tag_name().name()
        )));
    }

    let mut playlist = XspfPlaylist {
        title: child_text(root, "title").unwrap_or_default(),
        creator: child_text(root, "creator").unwrap_or_default(),
        tracks: Vec::new(),
        auto_resolve: false,
    };

    let track_nodes = child_element(root, "trackList")
        .into_iter()
        .flat_map(|list| list.children())
        .filter(|n| n.is_element() && n.tag_name().name() == "track");

    for node in track_nodes {
        let title = child_text(node, "title");
        let creator = child_text(node, "creator");

        let (Some(title), Some(creator)) = (title, creator) else {
            warn!(
                "Skipping XSPF track without title or creator in '{}'",
                playlist.title
            );
            continue;
        };

        playlist.tracks.push(XspfTrack {
            creator,
            title,
            album: child_text(node, "album").unwrap_or_default(),
            duration_ms: child_text(node, "duration")
                .and_then(|d| d.parse().ok())
                .unwrap_or(0),
            location: child_text(node, "location"),
        });
    }

    if playlist.tracks.is_empty() {
        return Err(CadenzaError::InvalidPlaylist(format!(
            "'{}' has no usable tracks",
            playlist.title
        )));
    }

    Ok(playlist)
}

/// Something that can produce a track list from a URL.
///
/// The playlist updater is generic over this so that it can be driven by
/// sources other than HTTP.
pub trait TrackListSource: Send + Sync + 'static {
    /// Fetch the track list at `url`.
    ///
    /// `error_title` names the playlist being updated, for log messages.
    /// `auto_resolve` tells the source whether the host will resolve the
    /// tracks right away.
    fn load<'a>(
        &'a self,
        url: &'a str,
        error_title: &'a str,
        auto_resolve: bool,
    ) -> BoxFuture<'a, Result<Vec<XspfTrack>>>;
}

/// Loads XSPF playlists over HTTP.
#[derive(Debug, Clone)]
pub struct XspfLoader {
    client: Client,
}

impl XspfLoader {
    /// Create a loader.
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Fetch and parse the playlist at `url`.
    ///
    /// `auto_resolve` is recorded on the result: whether the host should
    /// resolve its tracks right away.
    pub async fn load_playlist(&self, url: &str, auto_resolve: bool) -> Result<XspfPlaylist> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let mut playlist = parse_xspf(&body)?;
        playlist.auto_resolve = auto_resolve;
        debug!(
            "Loaded XSPF '{}' with {} tracks (auto resolve: {})",
            playlist.title,
            playlist.tracks.len(),
            auto_resolve
        );
        Ok(playlist)
    }
}

impl TrackListSource for XspfLoader {
    fn load<'a>(
        &'a self,
        url: &'a str,
        error_title: &'a str,
        auto_resolve: bool,
    ) -> BoxFuture<'a, Result<Vec<XspfTrack>>> {
        Box::pin(async move {
            match self.load_playlist(url, auto_resolve).await {
                Ok(playlist) => Ok(playlist.tracks),
                Err(e) => {
                    warn!("Failed to load XSPF for '{}' from {}: {}", error_title, url, e);
                    Err(e)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<playlist version="1" xmlns="http://xspf.org/ns/0/">
  <title>Weekly Picks</title>
  <creator>radio</creator>
  <trackList>
    <track>
      <location>http://example.com/1.mp3</location>
      <creator>Boards of Canada</creator>
      <title>Roygbiv</title>
      <album>Music Has the Right to Children</album>
      <duration>151000</duration>
    </track>
    <track>
      <creator>Aphex Twin</creator>
      <title> Xtal </title>
    </track>
    <track>
      <title>Orphan without creator</title>
    </track>
  </trackList>
</playlist>"#;

    #[test]
    fn test_parse_xspf() {
        let playlist = parse_xspf(DOC).unwrap();
        assert_eq!(playlist.title, "Weekly Picks");
        assert_eq!(playlist.creator, "radio");
        assert_eq!(playlist.tracks.len(), 2);

        let first = &playlist.tracks[0];
        assert_eq!(first.creator, "Boards of Canada");
        assert_eq!(first.album, "Music Has the Right to Children");
        assert_eq!(first.duration_ms, 151000);
        assert_eq!(first.location.as_deref(), Some("http://example.com/1.mp3"));

        let second = &playlist.tracks[1];
        assert_eq!(second.title, "Xtal");
        assert_eq!(second.album, "");
        assert_eq!(second.duration_ms, 0);
    }

    #[test]
    fn test_track_queries() {
        let playlist = parse_xspf(DOC).unwrap();
        assert!(!playlist.auto_resolve);
        assert_eq!(
            playlist.tracks[1].to_query(),
            Query::new("Aphex Twin", "Xtal", "")
        );
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let err = parse_xspf("<rss><channel/></rss>").unwrap_err();
        assert!(matches!(err, CadenzaError::InvalidPlaylist(_)));
    }

    #[test]
    fn test_empty_track_list_is_rejected() {
        let xml = r#"<playlist version="1" xmlns="http://xspf.org/ns/0/"><trackList/></playlist>"#;
        assert!(matches!(
            parse_xspf(xml),
            Err(CadenzaError::InvalidPlaylist(_))
        ));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(matches!(
            parse_xspf("<playlist><trackList>"),
            Err(CadenzaError::XmlError(_))
        ));
    }
}
