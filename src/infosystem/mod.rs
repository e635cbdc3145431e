//! The info-request bus.
//!
//! Components ask for metadata by sending an [`InfoRequestData`] to the
//! [`InfoSystem`]; it hands the request to the first registered
//! [`InfoPlugin`] that supports the request type. Plugins answer
//! asynchronously through an [`InfoReplySender`], and every answer is
//! broadcast to all subscribers as an [`InfoEvent`]. Subscribers filter on the
//! caller identifier they used.
//!
//! Requests nobody can answer, and requests with unusable input, are answered
//! with [`InfoType::NoInfo`]; the bus never reports failures any other way.

pub mod echonest;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

pub use echonest::EchoNestPlugin;

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Kind of information requested or delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfoType {
    /// Nothing could be found, or the request was unusable.
    NoInfo,
    ArtistBiography,
    ArtistFamiliarity,
    ArtistHotttness,
    ArtistTerms,
    MiscTopTerms,
    TrackEnergy,
    /// Tree of the charts a source can provide.
    ChartCapabilities,
    /// A single chart, selected by `chart_id`.
    Chart,
}

/// `label -> (field -> value)` result shape used by list-like replies.
pub type InfoGenericMap = BTreeMap<String, BTreeMap<String, String>>;

/// Opaque caller data echoed back with the reply.
pub type InfoCustomData = Map<String, Value>;

/// A request on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRequestData {
    /// Assigned by [`InfoSystem::get_info`].
    #[serde(default)]
    pub request_id: u64,

    /// Identifier of the requesting component.
    pub caller: String,

    /// What is being asked for.
    pub info_type: InfoType,

    /// Request input: an artist name, a criteria map, ...
    #[serde(default)]
    pub input: Value,

    #[serde(default)]
    pub custom_data: InfoCustomData,
}

impl InfoRequestData {
    /// Create a request with empty custom data.
    pub fn new<S: Into<String>>(caller: S, info_type: InfoType, input: Value) -> Self {
        Self {
            request_id: 0,
            caller: caller.into(),
            info_type,
            input,
            custom_data: InfoCustomData::new(),
        }
    }

    /// Attach custom data.
    pub fn with_custom_data(mut self, custom_data: InfoCustomData) -> Self {
        self.custom_data = custom_data;
        self
    }
}

/// A plugin's answer to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoReply {
    pub request_id: u64,
    pub caller: String,
    /// Type of the answer; [`InfoType::NoInfo`] when there is none.
    pub info_type: InfoType,
    /// Echo of the request input (may be cleared by the plugin).
    pub input: Value,
    pub output: Value,
    pub custom_data: InfoCustomData,
}

impl InfoReply {
    /// A successful reply of the request's own type.
    pub fn for_request(request: &InfoRequestData, output: Value) -> Self {
        Self {
            request_id: request.request_id,
            caller: request.caller.clone(),
            info_type: request.info_type,
            input: request.input.clone(),
            output,
            custom_data: request.custom_data.clone(),
        }
    }

    /// The "nothing here" reply: empty input and output, custom data kept.
    pub fn no_info(request: &InfoRequestData) -> Self {
        Self {
            request_id: request.request_id,
            caller: request.caller.clone(),
            info_type: InfoType::NoInfo,
            input: Value::Null,
            output: Value::Null,
            custom_data: request.custom_data.clone(),
        }
    }

    /// Whether this is a no-info reply.
    pub fn is_no_info(&self) -> bool {
        self.info_type == InfoType::NoInfo
    }
}

/// Channel plugins answer through.
pub type InfoReplySender = mpsc::UnboundedSender<InfoReply>;

/// Send a reply, logging when the bus is gone.
pub fn emit(reply_tx: &InfoReplySender, reply: InfoReply) {
    if let Err(e) = reply_tx.send(reply) {
        warn!("Info reply for request {} dropped: bus closed", e.0.request_id);
    }
}

/// A source of metadata.
pub trait InfoPlugin: Send + Sync {
    /// Plugin name, for logs.
    fn name(&self) -> &str;

    /// Request types this plugin answers.
    fn supported_get_types(&self) -> &[InfoType];

    /// Start answering a request.
    ///
    /// Must not block: network work is spawned, and exactly one reply is
    /// eventually sent on `reply_tx`.
    fn get_info(&self, request: InfoRequestData, reply_tx: InfoReplySender);
}

/// What subscribers of the bus receive.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoEvent {
    /// An answer. `request.info_type` is the type of the answer, so a
    /// no-info reply carries [`InfoType::NoInfo`].
    Info {
        request: InfoRequestData,
        output: Value,
    },
    /// The caller has no outstanding requests left.
    Finished(String),
}

/// The bus itself.
pub struct InfoSystem {
    plugins: Vec<Arc<dyn InfoPlugin>>,
    reply_tx: InfoReplySender,
    events: broadcast::Sender<InfoEvent>,
    next_request_id: AtomicU64,
    outstanding: Arc<Mutex<HashMap<String, usize>>>,
}

impl std::fmt::Debug for InfoSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoSystem")
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl InfoSystem {
    /// Create the bus and start routing replies.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(plugins: Vec<Arc<dyn InfoPlugin>>) -> Self {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let outstanding = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(route_replies(reply_rx, events.clone(), Arc::clone(&outstanding)));

        for plugin in &plugins {
            debug!(
                "Info plugin {} registered for {:?}",
                plugin.name(),
                plugin.supported_get_types()
            );
        }

        Self {
            plugins,
            reply_tx,
            events,
            next_request_id: AtomicU64::new(1),
            outstanding,
        }
    }

    /// Listen to replies.
    pub fn subscribe(&self) -> broadcast::Receiver<InfoEvent> {
        self.events.subscribe()
    }

    /// Dispatch a request. Returns the request id assigned to it.
    pub fn get_info(&self, mut request: InfoRequestData) -> u64 {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        request.request_id = request_id;

        *self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(request.caller.clone())
            .or_insert(0) += 1;

        match self
            .plugins
            .iter()
            .find(|p| p.supported_get_types().contains(&request.info_type))
        {
            Some(plugin) => {
                debug!(
                    "Request {} ({:?} from {}) -> {}",
                    request_id,
                    request.info_type,
                    request.caller,
                    plugin.name()
                );
                plugin.get_info(request, self.reply_tx.clone());
            }
            None => {
                debug!("No plugin answers {:?}", request.info_type);
                emit(&self.reply_tx, InfoReply::no_info(&request));
            }
        }

        request_id
    }
}

async fn route_replies(
    mut reply_rx: mpsc::UnboundedReceiver<InfoReply>,
    events: broadcast::Sender<InfoEvent>,
    outstanding: Arc<Mutex<HashMap<String, usize>>>,
) {
    while let Some(reply) = reply_rx.recv().await {
        let caller = reply.caller.clone();
        let request = InfoRequestData {
            request_id: reply.request_id,
            caller: reply.caller,
            info_type: reply.info_type,
            input: reply.input,
            custom_data: reply.custom_data,
        };

        // A send error only means nobody is listening right now.
        let _ = events.send(InfoEvent::Info {
            request,
            output: reply.output,
        });

        let finished = {
            let mut outstanding = outstanding.lock().unwrap_or_else(PoisonError::into_inner);
            match outstanding.get_mut(&caller) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    outstanding.remove(&caller);
                    true
                }
                None => false,
            }
        };

        if finished {
            let _ = events.send(InfoEvent::Finished(caller));
        }
    }
}

/// Turn a generic map into the JSON object carried on the bus.
pub fn generic_map_to_value(map: &InfoGenericMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(label, fields)| {
                let fields = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                (label.clone(), Value::Object(fields))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Answers charts requests with a fixed tree.
    struct StaticPlugin;

    impl InfoPlugin for StaticPlugin {
        fn name(&self) -> &str {
            "static"
        }

        fn supported_get_types(&self) -> &[InfoType] {
            &[InfoType::ChartCapabilities]
        }

        fn get_info(&self, request: InfoRequestData, reply_tx: InfoReplySender) {
            emit(&reply_tx, InfoReply::for_request(&request, json!({"Source": []})));
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<InfoEvent>) -> InfoEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event timed out")
            .expect("bus closed")
    }

    #[tokio::test]
    async fn test_unsupported_type_yields_no_info() {
        let bus = InfoSystem::new(vec![Arc::new(StaticPlugin)]);
        let mut rx = bus.subscribe();

        let mut custom = InfoCustomData::new();
        custom.insert("tag".to_string(), json!(7));
        let id = bus.get_info(
            InfoRequestData::new("tester", InfoType::ArtistBiography, json!("Radiohead"))
                .with_custom_data(custom.clone()),
        );

        match next_event(&mut rx).await {
            InfoEvent::Info { request, output } => {
                assert_eq!(request.request_id, id);
                assert_eq!(request.info_type, InfoType::NoInfo);
                assert_eq!(request.custom_data, custom);
                assert_eq!(output, Value::Null);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            next_event(&mut rx).await,
            InfoEvent::Finished("tester".to_string())
        );
    }

    #[tokio::test]
    async fn test_routes_to_plugin_and_finishes_after_last_reply() {
        let bus = InfoSystem::new(vec![Arc::new(StaticPlugin)]);
        let mut rx = bus.subscribe();

        let first = bus.get_info(InfoRequestData::new(
            "charts",
            InfoType::ChartCapabilities,
            json!({}),
        ));
        let second = bus.get_info(InfoRequestData::new(
            "charts",
            InfoType::ChartCapabilities,
            json!({}),
        ));
        assert_ne!(first, second);

        let mut infos = 0;
        loop {
            match next_event(&mut rx).await {
                InfoEvent::Info { request, output } => {
                    assert_eq!(request.info_type, InfoType::ChartCapabilities);
                    assert_eq!(output, json!({"Source": []}));
                    infos += 1;
                }
                InfoEvent::Finished(caller) => {
                    assert_eq!(caller, "charts");
                    break;
                }
            }
        }
        assert_eq!(infos, 2);
    }

    #[test]
    fn test_generic_map_to_value() {
        let mut map = InfoGenericMap::new();
        map.entry("rock".to_string())
            .or_default()
            .insert("weight".to_string(), "1".to_string());
        assert_eq!(generic_map_to_value(&map), json!({"rock": {"weight": "1"}}));
    }
}
