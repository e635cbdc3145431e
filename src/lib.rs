//! # Cadenza
//!
//! Core pieces of a music player: metadata lookups, self-updating playlists
//! and a couple of animated view-models.
//!
//! ## Quick Start
//!
//! Metadata is requested over the info bus. Register the Echo Nest plugin and
//! listen for replies:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cadenza::infosystem::{InfoEvent, InfoPlugin, InfoRequestData, InfoSystem, InfoType};
//! use cadenza::{EchoNestApi, EchoNestPlugin};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plugin = EchoNestPlugin::new(EchoNestApi::new("your_api_key")?);
//!     let info = InfoSystem::new(vec![Arc::new(plugin) as Arc<dyn InfoPlugin>]);
//!     let mut events = info.subscribe();
//!
//!     info.get_info(InfoRequestData::new(
//!         "example",
//!         InfoType::ArtistFamiliarity,
//!         json!("Radiohead"),
//!     ));
//!
//!     if let InfoEvent::Info { output, .. } = events.recv().await? {
//!         println!("Familiarity: {}", output);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Artist metadata**: biographies, familiarity, hotttnesss, terms and
//!   track energy from the Echo Nest
//! - **XSPF playlists** that follow a remote document, with revisioned merges
//! - **View-models** for a cross-fading image and a charts browser
//!
//! ## Low-Level APIs
//!
//! - [`EchoNestApi`] - Echo Nest HTTP client
//! - [`converters`] - JSON reply parsing
//! - [`playlist::merge_playlist_changes`] - track list reconciliation

pub mod api;
pub mod converters;
pub mod error;
pub mod infosystem;
pub mod models;
pub mod playlist;
pub mod settings;
pub mod widgets;

pub use api::{EchoNestApi, ProxyConfig};
pub use error::CadenzaError;
pub use infosystem::{EchoNestPlugin, InfoSystem};
pub use models::{Artist, Playlist, Query};
pub use playlist::{XspfLoader, XspfUpdater, XspfUpdaterFactory};
pub use settings::Settings;
