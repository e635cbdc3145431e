//! Echo Nest info plugin.
//!
//! Answers artist biography, familiarity, hotttnesss and term requests, the
//! global top-terms request, and track energy requests by querying the Echo
//! Nest. Each request becomes one spawned HTTP call carrying the request
//! context; its completion is reported on the bus.
//!
//! Invalid input never reaches the network: it is answered with
//! [`InfoType::NoInfo`] straight away. Network and parse failures are logged
//! and answered with whatever could be read, which usually means an empty map
//! or a `0.0` score.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    emit, generic_map_to_value, InfoGenericMap, InfoPlugin, InfoReply, InfoReplySender,
    InfoRequestData, InfoType,
};
use crate::api::echonest::{EchoNestApi, ProxyConfig, DEFAULT_TOP_TERMS};
use crate::error::Result;
use crate::models::{Artist, Biography, Term};

const SUPPORTED_GET_TYPES: &[InfoType] = &[
    InfoType::ArtistBiography,
    InfoType::ArtistFamiliarity,
    InfoType::ArtistHotttness,
    InfoType::ArtistTerms,
    InfoType::MiscTopTerms,
    InfoType::TrackEnergy,
];

/// Info plugin backed by the Echo Nest API.
#[derive(Debug)]
pub struct EchoNestPlugin {
    api: RwLock<EchoNestApi>,
}

impl EchoNestPlugin {
    /// Create the plugin around an API client.
    pub fn new(api: EchoNestApi) -> Self {
        debug!("Echo Nest plugin created");
        Self {
            api: RwLock::new(api),
        }
    }

    /// Follow a change of the host's network proxy settings.
    ///
    /// Requests already in flight keep the old client.
    pub fn set_proxy(&self, proxy: &ProxyConfig) -> Result<()> {
        self.api
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .reconfigure_proxy(proxy)
    }

    fn api(&self) -> EchoNestApi {
        self.api
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn get_artist_info(&self, request: InfoRequestData, reply_tx: InfoReplySender) {
        let Some(name) = valid_artist_input(&request) else {
            emit(&reply_tx, InfoReply::no_info(&request));
            return;
        };

        debug!("Fetching {:?} for {}", request.info_type, name);
        let api = self.api();

        tokio::spawn(async move {
            let fetched = match request.info_type {
                InfoType::ArtistBiography => api.fetch_biographies(&name).await,
                InfoType::ArtistFamiliarity => api.fetch_familiarity(&name).await,
                InfoType::ArtistHotttness => api.fetch_hotttnesss(&name).await,
                _ => api.fetch_terms(&name).await,
            };
            let artist = fetched.unwrap_or_else(|e| {
                warn!("Caught Echo Nest error for {}: {}", name, e);
                Artist::new(name.as_str())
            });

            let output = match request.info_type {
                InfoType::ArtistBiography => {
                    generic_map_to_value(&biography_map(&artist.biographies))
                }
                InfoType::ArtistFamiliarity => json!(artist.familiarity.unwrap_or(0.0)),
                InfoType::ArtistHotttness => json!(artist.hotttnesss.unwrap_or(0.0)),
                _ => generic_map_to_value(&terms_map(&artist.terms, false)),
            };

            emit(&reply_tx, InfoReply::for_request(&request, output));
        });
    }

    fn get_misc_top_terms(&self, request: InfoRequestData, reply_tx: InfoReplySender) {
        let api = self.api();

        tokio::spawn(async move {
            let terms = api.top_terms(DEFAULT_TOP_TERMS).await.unwrap_or_else(|e| {
                warn!("Caught Echo Nest error fetching top terms: {}", e);
                Vec::new()
            });

            let mut reply =
                InfoReply::for_request(&request, generic_map_to_value(&terms_map(&terms, true)));
            reply.input = Value::Null;
            emit(&reply_tx, reply);
        });
    }

    fn get_track_energy(&self, request: InfoRequestData, reply_tx: InfoReplySender) {
        let Some((artist, track)) = valid_track_input(&request) else {
            emit(&reply_tx, InfoReply::no_info(&request));
            return;
        };

        let api = self.api();

        tokio::spawn(async move {
            let energy = api
                .fetch_song_energy(&artist, &track)
                .await
                .unwrap_or_else(|e| {
                    warn!("Caught Echo Nest error for {} - {}: {}", artist, track, e);
                    0.0
                });
            emit(&reply_tx, InfoReply::for_request(&request, json!(energy)));
        });
    }
}

impl InfoPlugin for EchoNestPlugin {
    fn name(&self) -> &str {
        "echonest"
    }

    fn supported_get_types(&self) -> &[InfoType] {
        SUPPORTED_GET_TYPES
    }

    fn get_info(&self, request: InfoRequestData, reply_tx: InfoReplySender) {
        match request.info_type {
            InfoType::ArtistBiography
            | InfoType::ArtistFamiliarity
            | InfoType::ArtistHotttness
            | InfoType::ArtistTerms => self.get_artist_info(request, reply_tx),
            InfoType::MiscTopTerms => self.get_misc_top_terms(request, reply_tx),
            InfoType::TrackEnergy => self.get_track_energy(request, reply_tx),
            _ => emit(&reply_tx, InfoReply::no_info(&request)),
        }
    }
}

/// Convert request input to a string the way a loosely typed variant would.
///
/// Strings, numbers and booleans convert; null, arrays and objects do not.
fn input_as_string(input: &Value) -> Option<String> {
    match input {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Artist name of an artist request, or `None` if it is missing or empty.
fn valid_artist_input(request: &InfoRequestData) -> Option<String> {
    input_as_string(&request.input).filter(|name| !name.is_empty())
}

/// `(artist, track)` of a track request.
///
/// The track name is the input; the artist comes from the `artistName`
/// custom data entry. Both must be non-empty.
fn valid_track_input(request: &InfoRequestData) -> Option<(String, String)> {
    let track = input_as_string(&request.input).filter(|t| !t.is_empty())?;
    let artist = request
        .custom_data
        .get("artistName")
        .and_then(input_as_string)
        .filter(|a| !a.is_empty())?;
    Some((artist, track))
}

/// Key biographies by site.
fn biography_map(biographies: &[Biography]) -> InfoGenericMap {
    let mut map = InfoGenericMap::new();
    for bio in biographies {
        let fields = map.entry(bio.site.clone()).or_default();
        fields.insert("site".to_string(), bio.site.clone());
        fields.insert("url".to_string(), bio.url.clone());
        fields.insert("text".to_string(), bio.text.clone());
        fields.insert("attribution".to_string(), bio.license.attribution.clone());
        fields.insert("licensetype".to_string(), bio.license.type_.clone());
        fields.insert("licenseurl".to_string(), bio.license.url.clone());
    }
    map
}

/// Key terms by name, optionally lower-cased.
fn terms_map(terms: &[Term], lowercase: bool) -> InfoGenericMap {
    terms
        .iter()
        .map(|term| {
            let name = if lowercase {
                term.name.to_lowercase()
            } else {
                term.name.clone()
            };
            let fields: BTreeMap<String, String> = [
                ("weight".to_string(), term.weight.to_string()),
                ("frequency".to_string(), term.frequency.to_string()),
            ]
            .into_iter()
            .collect();
            (name, fields)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infosystem::InfoCustomData;
    use crate::models::License;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn plugin() -> EchoNestPlugin {
        EchoNestPlugin::new(EchoNestApi::new("TEST_KEY").unwrap())
    }

    /// A plugin whose API root refuses connections.
    fn unreachable_plugin() -> EchoNestPlugin {
        let mut api = EchoNestApi::new("TEST_KEY").unwrap();
        api.set_base_url("http://127.0.0.1:9/api/v4");
        EchoNestPlugin::new(api)
    }

    async fn reply_for(plugin: &EchoNestPlugin, request: InfoRequestData) -> InfoReply {
        let (tx, mut rx) = mpsc::unbounded_channel();
        plugin.get_info(request, tx);
        timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("reply timed out")
            .expect("no reply")
    }

    #[tokio::test]
    async fn test_invalid_artist_input_yields_no_info() {
        let plugin = plugin();
        for input in [json!(""), Value::Null, json!(["Radiohead"]), json!({"name": "x"})] {
            for info_type in [
                InfoType::ArtistBiography,
                InfoType::ArtistFamiliarity,
                InfoType::ArtistHotttness,
                InfoType::ArtistTerms,
            ] {
                let mut custom = InfoCustomData::new();
                custom.insert("id".to_string(), json!(3));
                let request = InfoRequestData::new("test", info_type, input.clone())
                    .with_custom_data(custom.clone());

                let reply = reply_for(&plugin, request).await;
                assert!(reply.is_no_info(), "{:?} with {}", info_type, input);
                assert_eq!(reply.input, Value::Null);
                assert_eq!(reply.output, Value::Null);
                assert_eq!(reply.custom_data, custom);
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_track_input_yields_no_info() {
        let plugin = plugin();

        let no_artist = InfoRequestData::new("test", InfoType::TrackEnergy, json!("Airbag"));
        assert!(reply_for(&plugin, no_artist).await.is_no_info());

        let mut custom = InfoCustomData::new();
        custom.insert("artistName".to_string(), json!(""));
        let empty_artist = InfoRequestData::new("test", InfoType::TrackEnergy, json!("Airbag"))
            .with_custom_data(custom);
        assert!(reply_for(&plugin, empty_artist).await.is_no_info());

        let mut custom = InfoCustomData::new();
        custom.insert("artistName".to_string(), json!("Radiohead"));
        let empty_track = InfoRequestData::new("test", InfoType::TrackEnergy, json!(""))
            .with_custom_data(custom);
        assert!(reply_for(&plugin, empty_track).await.is_no_info());
    }

    #[tokio::test]
    async fn test_unsupported_type_yields_no_info() {
        let request = InfoRequestData::new("test", InfoType::Chart, json!({"chart_id": "x"}));
        let reply = reply_for(&plugin(), request).await;
        assert!(reply.is_no_info());
    }

    #[tokio::test]
    async fn test_network_failure_yields_empty_result() {
        let plugin = unreachable_plugin();

        let request = InfoRequestData::new("test", InfoType::ArtistTerms, json!("Radiohead"));
        let reply = reply_for(&plugin, request).await;
        assert_eq!(reply.info_type, InfoType::ArtistTerms);
        assert_eq!(reply.input, json!("Radiohead"));
        assert_eq!(reply.output, json!({}));

        let request = InfoRequestData::new("test", InfoType::ArtistFamiliarity, json!(42));
        let reply = reply_for(&plugin, request).await;
        assert_eq!(reply.info_type, InfoType::ArtistFamiliarity);
        assert_eq!(reply.output, json!(0.0));

        let request = InfoRequestData::new("test", InfoType::MiscTopTerms, json!("ignored"));
        let reply = reply_for(&plugin, request).await;
        assert_eq!(reply.info_type, InfoType::MiscTopTerms);
        assert_eq!(reply.input, Value::Null);
    }

    #[test]
    fn test_valid_artist_input_converts_scalars() {
        let request = InfoRequestData::new("t", InfoType::ArtistTerms, json!(1999));
        assert_eq!(valid_artist_input(&request).as_deref(), Some("1999"));
    }

    #[test]
    fn test_biography_map() {
        let bios = vec![Biography {
            site: "wikipedia".to_string(),
            url: "http://en.wikipedia.org/wiki/Portishead".to_string(),
            text: "Portishead are an English band".to_string(),
            license: License {
                type_: "cc-by-sa".to_string(),
                attribution: "Wikipedia".to_string(),
                url: "http://creativecommons.org/licenses/by-sa/3.0/".to_string(),
            },
        }];

        let map = biography_map(&bios);
        let wiki = &map["wikipedia"];
        assert_eq!(wiki["site"], "wikipedia");
        assert_eq!(wiki["attribution"], "Wikipedia");
        assert_eq!(wiki["licensetype"], "cc-by-sa");
        assert_eq!(wiki["licenseurl"], "http://creativecommons.org/licenses/by-sa/3.0/");
    }

    #[test]
    fn test_top_terms_are_lowercased() {
        let terms = vec![Term::new("Rock", 0.0, 1.0), Term::new("Hip Hop", 0.0, 0.5)];

        let map = terms_map(&terms, true);
        assert!(map.contains_key("rock"));
        assert_eq!(map["hip hop"]["frequency"], "0.5");

        let map = terms_map(&terms, false);
        assert!(map.contains_key("Rock"));
        assert_eq!(map["Rock"]["weight"], "0");
    }
}
