use cadenza::infosystem::{InfoCustomData, InfoEvent, InfoPlugin, InfoRequestData, InfoType};
use cadenza::playlist::updater::url_key;
use cadenza::{
    EchoNestApi, EchoNestPlugin, InfoSystem, Playlist, ProxyConfig, Settings, XspfLoader,
    XspfUpdaterFactory,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza-cli")]
#[command(about = "CLI for Cadenza - music metadata and self-updating playlists", long_about = None)]
struct Cli {
    /// Echo Nest API key (can also be set via ECHONEST_API_KEY env var)
    #[arg(long, env = "ECHONEST_API_KEY")]
    api_key: Option<String>,

    /// Settings file
    #[arg(long, env = "CADENZA_SETTINGS", default_value = "cadenza-settings.json")]
    settings: PathBuf,

    /// Proxy URL for Echo Nest requests
    #[arg(long)]
    proxy: Option<String>,

    /// Hosts that bypass the proxy, comma separated
    #[arg(long, value_delimiter = ',')]
    no_proxy: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query artist or track metadata
    Info {
        #[command(subcommand)]
        query: InfoQuery,
    },
    /// Keep a playlist in sync with a remote XSPF document
    Watch {
        /// Settings group of the updater
        key: String,

        /// XSPF URL (stored in the settings group)
        #[arg(short, long)]
        url: Option<String>,

        /// Refresh interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Playlist title
        #[arg(short, long, default_value = "Watched playlist")]
        title: String,
    },
}

#[derive(Subcommand)]
enum InfoQuery {
    /// Artist biographies
    Biography { artist: String },
    /// Artist familiarity score
    Familiarity { artist: String },
    /// Artist hotttnesss score
    Hotness { artist: String },
    /// Terms describing an artist
    Terms { artist: String },
    /// Most used terms overall
    TopTerms,
    /// Energy of a track
    Energy { artist: String, track: String },
}

impl InfoQuery {
    fn request(&self) -> InfoRequestData {
        const CALLER: &str = "cadenza-cli";
        match self {
            InfoQuery::Biography { artist } => {
                InfoRequestData::new(CALLER, InfoType::ArtistBiography, json!(artist))
            }
            InfoQuery::Familiarity { artist } => {
                InfoRequestData::new(CALLER, InfoType::ArtistFamiliarity, json!(artist))
            }
            InfoQuery::Hotness { artist } => {
                InfoRequestData::new(CALLER, InfoType::ArtistHotttness, json!(artist))
            }
            InfoQuery::Terms { artist } => {
                InfoRequestData::new(CALLER, InfoType::ArtistTerms, json!(artist))
            }
            InfoQuery::TopTerms => InfoRequestData::new(CALLER, InfoType::MiscTopTerms, Value::Null),
            InfoQuery::Energy { artist, track } => {
                let mut custom = InfoCustomData::new();
                custom.insert("artistName".to_string(), json!(artist));
                InfoRequestData::new(CALLER, InfoType::TrackEnergy, json!(track))
                    .with_custom_data(custom)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { query } => {
            let api_key = cli
                .api_key
                .ok_or("An Echo Nest API key is required (--api-key or ECHONEST_API_KEY)")?;
            let proxy = ProxyConfig {
                url: cli.proxy,
                no_proxy_hosts: cli.no_proxy,
            };
            let api = EchoNestApi::with_proxy(api_key, &proxy)?;
            let plugin: Arc<dyn InfoPlugin> = Arc::new(EchoNestPlugin::new(api));
            let info = InfoSystem::new(vec![plugin]);
            let mut events = info.subscribe();

            let request_id = info.get_info(query.request());

            loop {
                match events.recv().await? {
                    InfoEvent::Info { request, output } if request.request_id == request_id => {
                        if request.info_type == InfoType::NoInfo {
                            println!("No information found");
                        } else {
                            println!("{}", serde_json::to_string_pretty(&output)?);
                        }
                        break;
                    }
                    _ => {}
                }
            }
        }
        Commands::Watch {
            key,
            url,
            interval,
            title,
        } => {
            let settings = Arc::new(Settings::open(&cli.settings)?);
            if let Some(url) = url {
                settings.set_value(&url_key(&key), url);
            }

            let playlist = Arc::new(Mutex::new(Playlist::new(title)));
            let updater = XspfUpdaterFactory::create(
                Arc::clone(&playlist),
                Arc::clone(&settings),
                &key,
                XspfLoader::new()?,
            );
            if let Some(secs) = interval {
                updater.set_interval(secs.saturating_mul(1000));
            }
            updater.set_auto_update(true);

            let handle = updater.spawn().ok_or("Updater already running")?;
            println!(
                "Watching {} every {}s, Ctrl-C to stop",
                updater.url(),
                (updater.interval_ms() / 1000).max(1)
            );

            let mut shown_revision = String::new();
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let playlist = playlist.lock().await;
                        if playlist.current_revision != shown_revision {
                            shown_revision = playlist.current_revision.clone();
                            let total_secs = playlist.total_duration_ms() / 1000;
                            println!(
                                "✅ Revision {} ({} tracks, {}:{:02})",
                                shown_revision,
                                playlist.track_count(),
                                total_secs / 60,
                                total_secs % 60
                            );
                            for (i, entry) in playlist.entries.iter().enumerate() {
                                println!("{}. {}", i + 1, entry.query.display_name());
                            }
                        }
                    }
                }
            }

            handle.shutdown().await;
            settings.sync()?;
            if let Some(path) = settings.path() {
                println!("Settings saved to {}", path.display());
            }
        }
    }

    Ok(())
}
