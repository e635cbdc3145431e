//! "What's hot" charts browser.
//!
//! On [`fetch_data`](WhatsHot::fetch_data) the browser asks the info bus which
//! charts exist and turns the answer into a breadcrumb tree. Selecting a crumb
//! that names a chart requests that chart; the answer fills either the artist
//! view or the track view.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::infosystem::{InfoCustomData, InfoEvent, InfoRequestData, InfoSystem, InfoType};
use crate::models::{Artist, ArtistTrackPair, Chart, Query};

/// Caller identifier of the browser on the info bus.
pub const WHATSHOT_IDENTIFIER: &str = "WhatsHotWidget";

/// A node of the breadcrumb tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrumbNode {
    pub label: String,
    /// Set on nodes that name a chart.
    pub chart_id: Option<String>,
    pub children: Vec<CrumbNode>,
}

impl CrumbNode {
    fn leaf<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// What the chart area currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChartView {
    #[default]
    Empty,
    Artists(Vec<Artist>),
    Tracks(Vec<Arc<Query>>),
}

/// Charts browser view-model.
pub struct WhatsHot {
    info: Arc<InfoSystem>,
    events: broadcast::Receiver<InfoEvent>,
    crumbs: Vec<CrumbNode>,
    selected: Vec<usize>,
    view: ChartView,
}

impl std::fmt::Debug for WhatsHot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsHot")
            .field("crumbs", &self.crumbs.len())
            .field("selected", &self.selected)
            .field("view", &self.view)
            .finish()
    }
}

impl WhatsHot {
    /// Create a browser listening on `info`.
    pub fn new(info: Arc<InfoSystem>) -> Self {
        let events = info.subscribe();
        Self {
            info,
            events,
            crumbs: Vec::new(),
            selected: Vec::new(),
            view: ChartView::Empty,
        }
    }

    /// Root crumbs, one per chart source.
    pub fn crumbs(&self) -> &[CrumbNode] {
        &self.crumbs
    }

    /// Path of the crumb selected last.
    pub fn selected_path(&self) -> &[usize] {
        &self.selected
    }

    pub fn view(&self) -> &ChartView {
        &self.view
    }

    /// Crumb at `path`, as child indices from the roots.
    pub fn crumb(&self, path: &[usize]) -> Option<&CrumbNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.crumbs.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    /// Ask for the chart capability tree.
    pub fn fetch_data(&self) -> u64 {
        let request = InfoRequestData::new(WHATSHOT_IDENTIFIER, InfoType::ChartCapabilities, json!({}));
        let id = self.info.get_info(request);
        debug!("WhatsHot: requested chart capabilities");
        id
    }

    /// Handle one event of the bus.
    pub fn handle_event(&mut self, event: InfoEvent) {
        match event {
            InfoEvent::Info { request, output } => self.info_system_info(&request, &output),
            InfoEvent::Finished(caller) => self.info_system_finished(&caller),
        }
    }

    /// Wait for the next bus event and handle it.
    ///
    /// Returns `false` once the bus is gone.
    pub async fn process_next(&mut self) -> bool {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.handle_event(event);
                    return true;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WhatsHot: skipped {} info events", skipped);
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }

    /// An answer arrived on the bus.
    pub fn info_system_info(&mut self, request: &InfoRequestData, output: &Value) {
        if request.caller != WHATSHOT_IDENTIFIER {
            return;
        }

        let Some(returned) = output.as_object() else {
            debug!("WhatsHot: ignoring non-map output for {:?}", request.info_type);
            return;
        };

        match request.info_type {
            InfoType::ChartCapabilities => {
                debug!("WhatsHot: chart capabilities {:?}", returned.keys().collect::<Vec<_>>());
                self.crumbs = returned
                    .iter()
                    .map(|(label, data)| parse_node(label, data))
                    .collect();

                // Open the first chart of the first source straight away.
                if self.crumb(&[0, 0]).is_some() {
                    self.crumb_selected(&[0, 0]);
                }
            }
            InfoType::Chart => {
                let Some(chart_type) = returned.get("type").and_then(Value::as_str) else {
                    return;
                };
                let Some(data) = returned.get(chart_type) else {
                    return;
                };
                let side = request
                    .custom_data
                    .get("whatshot_side")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                debug!("WhatsHot: got chart {} on {}", chart_type, side);

                match chart_type {
                    "artists" => {
                        let artists: Vec<Artist> = data
                            .as_array()
                            .into_iter()
                            .flatten()
                            .filter_map(Value::as_str)
                            .map(Artist::new)
                            .collect();
                        debug!("WhatsHot: got {} artists", artists.len());
                        self.view = ChartView::Artists(artists);
                    }
                    "tracks" => {
                        let tracks: Vec<Arc<Query>> = data
                            .as_array()
                            .into_iter()
                            .flatten()
                            .filter_map(|t| serde_json::from_value::<ArtistTrackPair>(t.clone()).ok())
                            .map(|pair| Query::new(pair.artist, pair.track, "").shared())
                            .collect();
                        debug!("WhatsHot: got {} tracks", tracks.len());
                        self.view = ChartView::Tracks(tracks);
                    }
                    other => debug!("WhatsHot: got unknown chart type {}", other),
                }
            }
            _ => {}
        }
    }

    /// All requests of a caller were answered. Nothing to do here.
    pub fn info_system_finished(&mut self, caller: &str) {
        let _ = caller;
    }

    /// A crumb was selected.
    ///
    /// Requests the chart named by the crumb. Returns the request id, or
    /// `None` when the crumb does not exist or names no chart.
    pub fn crumb_selected(&mut self, path: &[usize]) -> Option<u64> {
        let chart_id = self.crumb(path)?.chart_id.clone()?;
        self.selected = path.to_vec();
        debug!("WhatsHot: crumb {:?} selected, chart {}", path, chart_id);

        let mut custom_data = InfoCustomData::new();
        custom_data.insert("whatshot_side".to_string(), json!("left"));

        let request = InfoRequestData::new(
            WHATSHOT_IDENTIFIER,
            InfoType::Chart,
            json!({ "chart_id": chart_id }),
        )
        .with_custom_data(custom_data);

        Some(self.info.get_info(request))
    }
}

/// Build the crumb for `label` from its capability data.
///
/// A list of charts gives chart children, a map recurses, any other list
/// gives plain leaves and a scalar gives a single leaf.
pub fn parse_node(label: &str, data: &Value) -> CrumbNode {
    let mut node = CrumbNode::leaf(label);

    match data {
        Value::Array(items) => {
            match items
                .iter()
                .map(|i| serde_json::from_value::<Chart>(i.clone()))
                .collect::<Result<Vec<_>, _>>()
            {
                Ok(charts) => {
                    node.children = charts
                        .into_iter()
                        .map(|chart| CrumbNode {
                            label: chart.label,
                            chart_id: Some(chart.id),
                            children: Vec::new(),
                        })
                        .collect();
                }
                Err(_) => {
                    node.children = items.iter().map(|v| CrumbNode::leaf(value_text(v))).collect();
                }
            }
        }
        Value::Object(map) => {
            node.children = map.iter().map(|(k, v)| parse_node(k, v)).collect();
        }
        scalar => node.children.push(CrumbNode::leaf(value_text(scalar))),
    }

    node
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infosystem::{emit, InfoPlugin, InfoReply, InfoReplySender};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Serves a fixed capability tree and canned charts.
    #[derive(Default)]
    struct ChartsPlugin {
        chart_requests: Mutex<Vec<InfoRequestData>>,
    }

    impl InfoPlugin for ChartsPlugin {
        fn name(&self) -> &str {
            "charts"
        }

        fn supported_get_types(&self) -> &[InfoType] {
            &[InfoType::ChartCapabilities, InfoType::Chart]
        }

        fn get_info(&self, request: InfoRequestData, reply_tx: InfoReplySender) {
            let output = match request.info_type {
                InfoType::ChartCapabilities => json!({
                    "Billboard": [
                        {"id": "hot-100", "label": "Hot 100"},
                        {"id": "b200", "label": "Billboard 200"}
                    ],
                    "Last.fm": {
                        "Artists": [{"id": "lfm-artists", "label": "Top Artists"}],
                        "Regions": ["Europe", "Asia"]
                    }
                }),
                _ => {
                    self.chart_requests.lock().unwrap().push(request.clone());
                    match request.input["chart_id"].as_str() {
                        Some("hot-100") => json!({
                            "type": "tracks",
                            "tracks": [
                                {"artist": "Portishead", "track": "Roads"},
                                {"artist": "Massive Attack", "track": "Teardrop"}
                            ]
                        }),
                        Some("lfm-artists") => json!({
                            "type": "artists",
                            "artists": ["Björk", "Radiohead"]
                        }),
                        _ => json!({"type": "albums", "albums": []}),
                    }
                }
            };
            emit(&reply_tx, InfoReply::for_request(&request, output));
        }
    }

    async fn pump(widget: &mut WhatsHot, events: usize) {
        for _ in 0..events {
            timeout(Duration::from_secs(5), widget.process_next())
                .await
                .expect("event timed out");
        }
    }

    #[test]
    fn test_parse_node_shapes() {
        let node = parse_node(
            "Source",
            &json!({
                "Charts": [{"id": "c1", "label": "One"}],
                "Plain": ["a", 2],
                "Single": "only"
            }),
        );
        assert_eq!(node.label, "Source");
        assert_eq!(node.children.len(), 3);

        let charts = &node.children[0];
        assert_eq!(charts.label, "Charts");
        assert_eq!(charts.children[0].label, "One");
        assert_eq!(charts.children[0].chart_id.as_deref(), Some("c1"));

        let plain = &node.children[1];
        assert_eq!(plain.children[0], CrumbNode::leaf("a"));
        assert_eq!(plain.children[1], CrumbNode::leaf("2"));

        let single = &node.children[2];
        assert_eq!(single.children, vec![CrumbNode::leaf("only")]);
    }

    #[tokio::test]
    async fn test_capabilities_build_tree_and_open_first_chart() {
        let plugin = Arc::new(ChartsPlugin::default());
        let info = Arc::new(InfoSystem::new(vec![plugin.clone() as Arc<dyn InfoPlugin>]));
        let mut widget = WhatsHot::new(Arc::clone(&info));

        widget.fetch_data();
        // capabilities, finished, chart, finished
        pump(&mut widget, 4).await;

        let roots: Vec<_> = widget.crumbs().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(roots, vec!["Billboard", "Last.fm"]);
        assert_eq!(widget.selected_path(), &[0, 0]);

        let requests = plugin.chart_requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].input, json!({"chart_id": "hot-100"}));
        assert_eq!(requests[0].custom_data["whatshot_side"], json!("left"));

        match widget.view() {
            ChartView::Tracks(tracks) => {
                assert_eq!(tracks.len(), 2);
                assert_eq!(*tracks[1], Query::new("Massive Attack", "Teardrop", ""));
            }
            other => panic!("expected tracks, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_selecting_artist_chart() {
        let info = Arc::new(InfoSystem::new(vec![
            Arc::new(ChartsPlugin::default()) as Arc<dyn InfoPlugin>
        ]));
        let mut widget = WhatsHot::new(info);
        widget.fetch_data();
        pump(&mut widget, 4).await;

        assert!(widget.crumb_selected(&[1, 0, 0]).is_some());
        pump(&mut widget, 2).await;

        match widget.view() {
            ChartView::Artists(artists) => {
                let names: Vec<_> = artists.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["Björk", "Radiohead"]);
            }
            other => panic!("expected artists, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_crumbs_without_chart_are_ignored() {
        let info = Arc::new(InfoSystem::new(vec![
            Arc::new(ChartsPlugin::default()) as Arc<dyn InfoPlugin>
        ]));
        let mut widget = WhatsHot::new(info);
        widget.fetch_data();
        pump(&mut widget, 4).await;

        // "Last.fm" / "Regions" / "Europe"
        assert!(widget.crumb_selected(&[1, 1]).is_none());
        assert!(widget.crumb_selected(&[1, 1, 0]).is_none());
        assert!(widget.crumb_selected(&[7]).is_none());
        assert_eq!(widget.selected_path(), &[0, 0]);
    }

    #[tokio::test]
    async fn test_other_callers_and_unknown_types_are_ignored() {
        let info = Arc::new(InfoSystem::new(Vec::new()));
        let mut widget = WhatsHot::new(info);

        let foreign = InfoRequestData::new("someone-else", InfoType::ChartCapabilities, json!({}));
        widget.info_system_info(&foreign, &json!({"Source": [{"id": "x", "label": "X"}]}));
        assert!(widget.crumbs().is_empty());

        let chart = InfoRequestData::new(WHATSHOT_IDENTIFIER, InfoType::Chart, json!({}));
        widget.info_system_info(&chart, &json!({"type": "albums", "albums": ["a"]}));
        widget.info_system_info(&chart, &json!({"type": "artists"}));
        widget.info_system_info(&chart, &json!({"artists": ["a"]}));
        assert_eq!(widget.view(), &ChartView::Empty);

        widget.info_system_finished(WHATSHOT_IDENTIFIER);
    }
}
