//! Echo Nest API client.
//!
//! This module provides a client for the Echo Nest v4 API
//! (developer.echonest.com). Every call needs an API key, which is sent as
//! the `api_key` query parameter along with `format=json`.

use reqwest::{Client, NoProxy, Proxy};
use serde_json::Value;
use tracing::debug;

use crate::converters;
use crate::error::Result;
use crate::models::{Artist, Term};

/// Base URL for the Echo Nest API.
const API_BASE_URL: &str = "http://developer.echonest.com/api/v4/";

/// User agent sent with every request.
const USER_AGENT: &str = concat!("cadenza/", env!("CARGO_PKG_VERSION"));

/// Number of terms requested by [`EchoNestApi::top_terms`] callers by default.
pub const DEFAULT_TOP_TERMS: u32 = 20;

/// Proxy settings propagated from the host's network configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `socks5://127.0.0.1:1080`. `None` means direct.
    pub url: Option<String>,

    /// Hosts that bypass the proxy.
    pub no_proxy_hosts: Vec<String>,
}

/// Echo Nest API client.
///
/// # Example
///
/// ```rust,no_run
/// use cadenza::EchoNestApi;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let api = EchoNestApi::new("YOUR_API_KEY")?;
///     let artist = api.fetch_familiarity("Radiohead").await?;
///     println!("familiarity: {:?}", artist.familiarity);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EchoNestApi {
    client: Client,
    api_key: String,
    base_url: String,
}

impl EchoNestApi {
    /// Create a new client without a proxy.
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Self::with_proxy(api_key, &ProxyConfig::default())
    }

    /// Create a new client routed through the given proxy.
    pub fn with_proxy<S: Into<String>>(api_key: S, proxy: &ProxyConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(proxy)?,
            api_key: api_key.into(),
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Point the client at another API root (mirrors, local test servers).
    pub fn set_base_url<S: Into<String>>(&mut self, base_url: S) {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
    }

    /// Get the API root in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Rebuild the HTTP client for a new proxy configuration.
    ///
    /// Key and base URL are kept.
    pub fn reconfigure_proxy(&mut self, proxy: &ProxyConfig) -> Result<()> {
        self.client = build_client(proxy)?;
        Ok(())
    }

    /// Build the full URL of an endpoint.
    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Make a GET request to the Echo Nest API.
    ///
    /// The Echo Nest reports failures in the JSON body with a non-2xx status,
    /// so the body is parsed regardless and the status is checked by the
    /// converters.
    async fn get_api(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = self.endpoint_url(endpoint);
        debug!("GET {} with params: {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
            .query(params)
            .send()
            .await?;
        let data: Value = response.json().await?;

        Ok(data)
    }

    /// Fetch an artist profile endpoint and parse it into an [`Artist`].
    async fn fetch_profile(&self, endpoint: &str, name: &str, extra: &[(&str, &str)]) -> Result<Artist> {
        let mut params = vec![("name", name)];
        params.extend_from_slice(extra);

        let json = self.get_api(endpoint, &params).await?;
        let mut artist = Artist::new(name);
        converters::parse_artist_profile(&mut artist, &json)?;
        Ok(artist)
    }

    /// Get the biographies of an artist.
    pub async fn fetch_biographies(&self, name: &str) -> Result<Artist> {
        self.fetch_profile("artist/biographies", name, &[]).await
    }

    /// Get the familiarity score of an artist.
    pub async fn fetch_familiarity(&self, name: &str) -> Result<Artist> {
        self.fetch_profile("artist/familiarity", name, &[]).await
    }

    /// Get the hotttnesss score of an artist.
    pub async fn fetch_hotttnesss(&self, name: &str) -> Result<Artist> {
        self.fetch_profile("artist/hotttnesss", name, &[]).await
    }

    /// Get the terms of an artist, sorted by weight.
    pub async fn fetch_terms(&self, name: &str) -> Result<Artist> {
        self.fetch_profile("artist/terms", name, &[("sort", "weight")])
            .await
    }

    /// Get the most used terms across all artists.
    pub async fn top_terms(&self, results: u32) -> Result<Vec<Term>> {
        let results = results.to_string();
        let json = self
            .get_api("artist/top_terms", &[("results", results.as_str())])
            .await?;
        let body = converters::response_body(&json)?;
        Ok(converters::parse_terms(body))
    }

    /// Get the energy of a song from its audio summary.
    pub async fn fetch_song_energy(&self, artist: &str, title: &str) -> Result<f64> {
        let json = self
            .get_api(
                "song/search",
                &[
                    ("artist", artist),
                    ("title", title),
                    ("bucket", "audio_summary"),
                    ("results", "1"),
                ],
            )
            .await?;
        converters::parse_song_energy(&json)
    }
}

fn build_client(proxy: &ProxyConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);

    if let Some(url) = proxy.url.as_deref().filter(|u| !u.trim().is_empty()) {
        let no_proxy = NoProxy::from_string(&proxy.no_proxy_hosts.join(","));
        builder = builder.proxy(Proxy::all(url)?.no_proxy(no_proxy));
        debug!("Echo Nest client using proxy {}", url);
    }

    Ok(builder.build()?)
}
