//! Periodic XSPF playlist updates.
//!
//! An [`XspfUpdater`] watches one remote XSPF document for one local
//! playlist. On every timer tick (and on demand) it fetches the document,
//! merges the fetched tracks into the playlist and, when that changes
//! anything, commits a new revision.
//!
//! The updater's configuration lives in [`Settings`] under a caller-supplied
//! key:
//!
//! | key | value |
//! |---|---|
//! | `<key>/autoupdate` | bool |
//! | `<key>/interval` | interval in milliseconds |
//! | `<key>/xspfurl` | source URL |

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::merge::merge_playlist_changes;
use super::xspf::{TrackListSource, XspfTrack};
use crate::models::Playlist;
use crate::settings::Settings;

/// Playlist handle shared between the updater and the rest of the player.
pub type SharedPlaylist = Arc<tokio::sync::Mutex<Playlist>>;

/// Shortest timer interval; a stored interval of 0 means this.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Settings key of the auto-update flag.
pub fn autoupdate_key(group: &str) -> String {
    format!("{}/autoupdate", group)
}

/// Settings key of the update interval.
pub fn interval_key(group: &str) -> String {
    format!("{}/interval", group)
}

/// Settings key of the source URL.
pub fn url_key(group: &str) -> String {
    format!("{}/xspfurl", group)
}

#[derive(Debug, Clone)]
struct UpdaterState {
    auto_update: bool,
    interval_ms: u64,
    url: String,
}

#[derive(Debug)]
enum Command {
    UpdateNow,
    Retime,
    Shutdown,
}

struct Inner<S> {
    uuid: String,
    playlist: SharedPlaylist,
    settings: Arc<Settings>,
    settings_key: String,
    source: S,
    state: Mutex<UpdaterState>,
    commands: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

/// Keeps a playlist in sync with a remote XSPF document.
pub struct XspfUpdater<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for XspfUpdater<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for XspfUpdater<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XspfUpdater")
            .field("uuid", &self.inner.uuid)
            .field("settings_key", &self.inner.settings_key)
            .field("state", &*self.inner.state())
            .finish()
    }
}

/// Builds updaters from their persisted configuration.
pub struct XspfUpdaterFactory;

impl XspfUpdaterFactory {
    /// Create an updater configured from `settings_key` in `settings`.
    ///
    /// Missing keys fall back to: auto-update off, interval 0 (the minimum),
    /// empty URL.
    pub fn create<S: TrackListSource>(
        playlist: SharedPlaylist,
        settings: Arc<Settings>,
        settings_key: &str,
        source: S,
    ) -> XspfUpdater<S> {
        let auto_update = settings
            .bool_value(&autoupdate_key(settings_key))
            .unwrap_or(false);
        let interval_ms = settings
            .u64_value(&interval_key(settings_key))
            .unwrap_or(0);
        let url = settings
            .string_value(&url_key(settings_key))
            .unwrap_or_default();

        XspfUpdater::new(
            playlist,
            settings,
            settings_key,
            source,
            interval_ms,
            auto_update,
            url,
        )
    }
}

impl<S: TrackListSource> XspfUpdater<S> {
    /// Create an updater.
    ///
    /// Nothing runs until [`spawn`](Self::spawn) is called.
    pub fn new<U: Into<String>>(
        playlist: SharedPlaylist,
        settings: Arc<Settings>,
        settings_key: &str,
        source: S,
        interval_ms: u64,
        auto_update: bool,
        url: U,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                uuid: Uuid::new_v4().to_string(),
                playlist,
                settings,
                settings_key: settings_key.to_string(),
                source,
                state: Mutex::new(UpdaterState {
                    auto_update,
                    interval_ms,
                    url: url.into(),
                }),
                commands,
                command_rx: Mutex::new(Some(command_rx)),
            }),
        }
    }

    /// Id of this updater; recorded as the author of its revisions.
    pub fn uuid(&self) -> &str {
        &self.inner.uuid
    }

    /// The playlist being kept up to date.
    pub fn playlist(&self) -> &SharedPlaylist {
        &self.inner.playlist
    }

    /// Whether the timer is enabled.
    pub fn auto_update(&self) -> bool {
        self.inner.state().auto_update
    }

    /// Timer interval in milliseconds, as configured.
    pub fn interval_ms(&self) -> u64 {
        self.inner.state().interval_ms
    }

    /// Source URL.
    pub fn url(&self) -> String {
        self.inner.state().url.clone()
    }

    /// Enable or disable the timer.
    ///
    /// The flag is persisted. Enabling also schedules one immediate update.
    pub fn set_auto_update(&self, auto_update: bool) {
        self.inner.state().auto_update = auto_update;
        self.inner
            .settings
            .set_value(&autoupdate_key(&self.inner.settings_key), auto_update);

        self.inner.send(Command::Retime);
        if auto_update {
            self.inner.send(Command::UpdateNow);
        }
    }

    /// Change the timer interval. The interval is persisted.
    pub fn set_interval(&self, interval_ms: u64) {
        self.inner
            .settings
            .set_value(&interval_key(&self.inner.settings_key), interval_ms);
        self.inner.state().interval_ms = interval_ms;
        self.inner.send(Command::Retime);
    }

    /// Write the whole configuration under `group`.
    pub fn save_to_settings(&self, group: &str) {
        let state = self.inner.state().clone();
        let settings = &self.inner.settings;
        settings.set_value(&autoupdate_key(group), state.auto_update);
        settings.set_value(&interval_key(group), state.interval_ms);
        settings.set_value(&url_key(group), state.url);
    }

    /// Remove the configuration stored under `group`.
    pub fn remove_from_settings(&self, group: &str) {
        let settings = &self.inner.settings;
        settings.remove(&autoupdate_key(group));
        settings.remove(&interval_key(group));
        settings.remove(&url_key(group));
    }

    /// Fetch the remote playlist and merge it.
    ///
    /// Returns whether a new revision was committed. Fetch failures are
    /// logged and leave the playlist untouched.
    pub async fn update_now(&self) -> bool {
        self.inner.update_now().await
    }

    /// Merge a fetched track list into the playlist.
    ///
    /// Returns whether a new revision was committed.
    pub async fn playlist_loaded(&self, tracks: Vec<XspfTrack>) -> bool {
        self.inner.playlist_loaded(tracks).await
    }

    /// Start the timer driver on the current tokio runtime.
    ///
    /// Updates requested before this call (e.g. by enabling auto-update) run
    /// as soon as the driver starts. Returns `None` if the driver was already
    /// spawned.
    pub fn spawn(&self) -> Option<UpdaterHandle> {
        let command_rx = self
            .inner
            .command_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(drive(inner, command_rx));

        Some(UpdaterHandle {
            commands: self.inner.commands.clone(),
            join: Some(join),
        })
    }
}

impl<S> Inner<S> {
    fn state(&self) -> std::sync::MutexGuard<'_, UpdaterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, command: Command) {
        // The receiver lives as long as `self`, either in `command_rx` or in
        // the driver; it is only gone after shutdown.
        if self.commands.send(command).is_err() {
            debug!("Updater {} is shut down, command ignored", self.uuid);
        }
    }

    /// `None` when the timer is off.
    fn timer_interval(&self) -> Option<Duration> {
        let state = self.state();
        state
            .auto_update
            .then(|| Duration::from_millis(state.interval_ms).max(MIN_INTERVAL))
    }
}

impl<S: TrackListSource> Inner<S> {
    async fn update_now(&self) -> bool {
        let url = self.state().url.clone();
        if url.is_empty() {
            warn!("XSPF updater {} not updating because the url is empty", self.uuid);
            return false;
        }

        let title = self.playlist.lock().await.title.clone();

        // Resolution is left to the host once the revision lands.
        match self.source.load(&url, &title, false).await {
            Ok(tracks) => self.playlist_loaded(tracks).await,
            Err(e) => {
                warn!("Could not update '{}' from {}: {}", title, url, e);
                false
            }
        }
    }

    async fn playlist_loaded(&self, tracks: Vec<XspfTrack>) -> bool {
        let mut playlist = self.playlist.lock().await;

        let new_entries: Vec<_> = tracks.iter().map(|t| t.to_query().shared()).collect();
        let (merged, changed) = merge_playlist_changes(&playlist.queries(), &new_entries);
        if !changed {
            debug!("'{}' is up to date", playlist.title);
            return false;
        }

        // The merged list is in document order, one entry per fetched track.
        let mut entries = playlist.entries_from_queries(&merged, true);
        for (entry, track) in entries.iter_mut().zip(&tracks) {
            if track.duration_ms > 0 {
                entry.duration_ms = track.duration_ms;
            }
            if track.location.is_some() {
                entry.location = track.location.clone();
            }
        }
        let current = playlist.current_revision.clone();
        let new_rev = Uuid::new_v4().to_string();

        match playlist.create_new_revision(&new_rev, &current, entries, &self.uuid) {
            Ok(()) => {
                info!(
                    "Updated '{}' to revision {} ({} tracks)",
                    playlist.title,
                    new_rev,
                    playlist.track_count()
                );
                true
            }
            Err(e) => {
                warn!("Could not commit update of '{}': {}", playlist.title, e);
                false
            }
        }
    }
}

async fn drive<S: TrackListSource>(
    inner: Arc<Inner<S>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    debug!("Updater {} driver started", inner.uuid);

    loop {
        let interval = inner.timer_interval();
        let tick = async {
            match interval {
                Some(interval) => tokio::time::sleep(interval).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::UpdateNow) => {
                    inner.update_now().await;
                }
                Some(Command::Retime) => {}
                Some(Command::Shutdown) | None => break,
            },
            _ = tick => {
                inner.update_now().await;
            }
        }
    }

    debug!("Updater {} driver stopped", inner.uuid);
}

/// Handle to a running updater driver.
///
/// Dropping the handle aborts the driver.
#[derive(Debug)]
pub struct UpdaterHandle {
    commands: mpsc::UnboundedSender<Command>,
    join: Option<JoinHandle<()>>,
}

impl UpdaterHandle {
    /// Stop the driver and wait for it. An update in progress completes first.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!("Updater driver ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for UpdaterHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
