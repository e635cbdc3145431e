//! Artist metadata models.
//!
//! These mirror the pieces of an Echo Nest artist profile the info plugin
//! cares about: biographies, familiarity and hotttnesss scores, and terms.

use serde::{Deserialize, Serialize};

/// License attached to a biography.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct License {
    /// License type, e.g. "cc-by-sa".
    #[serde(rename = "type", default)]
    pub type_: String,

    /// Attribution line the license requires.
    #[serde(default)]
    pub attribution: String,

    /// URL of the license text.
    #[serde(default)]
    pub url: String,
}

/// One biography of an artist, as published by a single site.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Biography {
    /// Site the biography comes from ("wikipedia", "last.fm", ...).
    pub site: String,

    /// Link to the biography on that site.
    #[serde(default)]
    pub url: String,

    /// Biography body.
    #[serde(default)]
    pub text: String,

    /// License of the text.
    #[serde(default)]
    pub license: License,
}

/// A descriptive term (genre, mood, style) with its weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Term {
    /// Term name.
    pub name: String,

    /// How strongly the term describes the artist, in [0, 1].
    #[serde(default)]
    pub weight: f64,

    /// How often the term is used for the artist, in [0, 1].
    #[serde(default)]
    pub frequency: f64,
}

impl Term {
    /// Create a term.
    pub fn new<S: Into<String>>(name: S, weight: f64, frequency: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            frequency,
        }
    }
}

/// Artist profile assembled from one or more API replies.
///
/// Fields that were never fetched or failed to parse keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    /// Artist name as queried.
    pub name: String,

    /// Echo Nest artist id, when the reply carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub biographies: Vec<Biography>,

    /// Familiarity score in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub familiarity: Option<f64>,

    /// Hotttnesss score in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotttnesss: Option<f64>,

    #[serde(default)]
    pub terms: Vec<Term>,
}

impl Artist {
    /// Create an empty profile for the given name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
