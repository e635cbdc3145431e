//! JSON to model converters.
//!
//! This module turns raw Echo Nest API replies into typed models. Every reply
//! is wrapped in a `response` object carrying a `status`; a non-zero status
//! code is an error, but once the status is fine the parsers are lenient:
//! malformed items are skipped with a warning and whatever did parse is kept.

use serde_json::Value;
use tracing::warn;

use crate::error::{CadenzaError, Result};
use crate::models::{Artist, Biography, License, Term};

/// Get string from JSON, returning empty string if not found.
fn get_str(json: &Value, key: &str) -> String {
    json.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Get f64 from JSON, accepting numbers and numeric strings.
fn get_f64(json: &Value, key: &str) -> Option<f64> {
    json.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// Unwrap the `response` envelope and check its status.
pub fn response_body(json: &Value) -> Result<&Value> {
    let response = json
        .get("response")
        .ok_or_else(|| CadenzaError::NoDataApi("Missing response envelope".to_string()))?;

    if let Some(status) = response.get("status") {
        let code = status.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        if code != 0 {
            return Err(CadenzaError::EchoNestStatus {
                code,
                message: get_str(status, "message"),
            });
        }
    }

    Ok(response)
}

/// Parse a single biography.
///
/// A biography without a site cannot be keyed and is rejected.
pub fn parse_biography(json: &Value) -> Option<Biography> {
    let site = get_str(json, "site");
    if site.is_empty() {
        return None;
    }

    let license = json
        .get("license")
        .map(|l| License {
            type_: get_str(l, "type"),
            attribution: get_str(l, "attribution"),
            url: get_str(l, "url"),
        })
        .unwrap_or_default();

    Some(Biography {
        site,
        url: get_str(json, "url"),
        text: get_str(json, "text"),
        license,
    })
}

/// Parse a single term. Terms without a name are rejected.
pub fn parse_term(json: &Value) -> Option<Term> {
    let name = get_str(json, "name");
    if name.is_empty() {
        return None;
    }

    Some(Term {
        name,
        weight: get_f64(json, "weight").unwrap_or(0.0),
        frequency: get_f64(json, "frequency").unwrap_or(0.0),
    })
}

/// Parse every term of a `terms` array, skipping malformed ones.
pub fn parse_terms(body: &Value) -> Vec<Term> {
    let Some(items) = body.get("terms").and_then(|t| t.as_array()) else {
        warn!("Echo Nest reply has no terms array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|t| {
            let term = parse_term(t);
            if term.is_none() {
                warn!("Skipping malformed term: {}", t);
            }
            term
        })
        .collect()
}

/// Merge an artist profile reply into `artist`.
///
/// Fills whatever the reply carries: biographies, familiarity, hotttnesss,
/// terms. Fields the reply does not mention are left untouched, so a partly
/// broken reply still yields the parts that were readable.
pub fn parse_artist_profile(artist: &mut Artist, json: &Value) -> Result<()> {
    let body = response_body(json)?;

    if let Some(items) = body.get("biographies").and_then(|b| b.as_array()) {
        artist.biographies = items
            .iter()
            .filter_map(|b| {
                let bio = parse_biography(b);
                if bio.is_none() {
                    warn!("Skipping biography without site for {}", artist.name);
                }
                bio
            })
            .collect();
    }

    if body.get("terms").is_some() {
        artist.terms = parse_terms(body);
    }

    if let Some(profile) = body.get("artist") {
        if let Some(id) = profile.get("id").and_then(|v| v.as_str()) {
            artist.id = Some(id.to_string());
        }
        if let Some(familiarity) = get_f64(profile, "familiarity") {
            artist.familiarity = Some(familiarity);
        }
        if let Some(hotttnesss) = get_f64(profile, "hotttnesss") {
            artist.hotttnesss = Some(hotttnesss);
        }
    }

    Ok(())
}

/// Parse the energy of the first song of a `song/search` reply.
pub fn parse_song_energy(json: &Value) -> Result<f64> {
    let body = response_body(json)?;

    body.get("songs")
        .and_then(|s| s.as_array())
        .and_then(|songs| songs.first())
        .and_then(|song| song.get("audio_summary"))
        .and_then(|summary| get_f64(summary, "energy"))
        .ok_or_else(|| CadenzaError::NoDataApi("No audio summary in reply".to_string()))
}
