//! Hymn domain models

use crate::types::{Timestamp, Validator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical identity of a hymn in the Remote Store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a remote id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How a caller refers to a hymn: by remote id or by its catalog number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HymnKey {
    Remote(RemoteId),
    Number(u32),
}

impl HymnKey {
    /// Interprets user input: all-digit strings are catalog numbers, anything
    /// else is a remote id.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.parse::<u32>() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Remote(RemoteId::new(trimmed)),
        }
    }
}

impl fmt::Display for HymnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "id {}", id),
            Self::Number(n) => write!(f, "number {}", n),
        }
    }
}

impl From<RemoteId> for HymnKey {
    fn from(id: RemoteId) -> Self {
        Self::Remote(id)
    }
}

impl From<u32> for HymnKey {
    fn from(number: u32) -> Self {
        Self::Number(number)
    }
}

/// A numbered verse of a hymn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stanza {
    pub stanza_number: u32,
    pub text: String,
}

impl Stanza {
    pub fn new(stanza_number: u32, text: impl Into<String>) -> Self {
        Self {
            stanza_number,
            text: text.into(),
        }
    }
}

/// A numbered refrain (chorus) of a hymn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refrain {
    pub refrain_number: u32,
    pub text: String,
}

impl Refrain {
    pub fn new(refrain_number: u32, text: impl Into<String>) -> Self {
        Self {
            refrain_number,
            text: text.into(),
        }
    }
}

/// A hymn as mirrored between the Remote Store and the Local Store
///
/// `local_id` and `local_audio_path` only exist on device; they are never
/// sent to or read from the Remote Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HymnRecord {
    #[serde(skip)]
    pub local_id: Option<i64>,
    #[serde(rename = "id")]
    pub remote_id: RemoteId,
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub stanzas: Vec<Stanza>,
    #[serde(default)]
    pub refrains: Vec<Refrain>,
    #[serde(default, rename = "audioUrl", skip_serializing_if = "Option::is_none")]
    pub audio_remote_url: Option<String>,
    #[serde(default, rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<String>,
    #[serde(skip)]
    pub local_audio_path: Option<PathBuf>,
    pub updated_at: Timestamp,
}

impl HymnRecord {
    /// Creates a hymn with the required fields
    pub fn new(remote_id: impl Into<RemoteId>, number: u32, title: impl Into<String>) -> Self {
        Self {
            local_id: None,
            remote_id: remote_id.into(),
            number,
            title: title.into(),
            origin: String::new(),
            key: String::new(),
            category: None,
            stanzas: Vec::new(),
            refrains: Vec::new(),
            audio_remote_url: None,
            video_reference: None,
            local_audio_path: None,
            updated_at: Timestamp::now(),
        }
    }

    /// Sorts stanzas and refrains by their numbers
    pub fn normalize(&mut self) {
        self.stanzas.sort_by_key(|s| s.stanza_number);
        self.refrains.sort_by_key(|r| r.refrain_number);
    }

    /// Returns true if the hymn has a tune that can be downloaded
    pub fn has_remote_audio(&self) -> bool {
        self.audio_remote_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Returns the downloaded tune path, but only if the file is still there
    ///
    /// A recorded path whose file has disappeared is treated as "not downloaded".
    pub fn playable_audio_path(&self) -> Option<&Path> {
        self.local_audio_path
            .as_deref()
            .filter(|path| path.is_file())
    }

    /// Returns true if a downloaded tune exists on disk
    pub fn is_audio_downloaded(&self) -> bool {
        self.playable_audio_path().is_some()
    }

    /// Returns true if this record matches the given key
    pub fn matches(&self, key: &HymnKey) -> bool {
        match key {
            HymnKey::Remote(id) => &self.remote_id == id,
            HymnKey::Number(n) => self.number == *n,
        }
    }

    /// Applies a content edit, leaving untouched fields as they were
    pub fn apply_patch(&mut self, patch: &HymnPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(origin) = &patch.origin {
            self.origin = origin.clone();
        }
        if let Some(key) = &patch.key {
            self.key = key.clone();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(stanzas) = &patch.stanzas {
            self.stanzas = stanzas.clone();
        }
        if let Some(refrains) = &patch.refrains {
            self.refrains = refrains.clone();
        }
        if let Some(audio) = &patch.audio_remote_url {
            self.audio_remote_url = audio.clone();
        }
        if let Some(video) = &patch.video_reference {
            self.video_reference = video.clone();
        }
        self.normalize();
    }
}

impl Validator for HymnRecord {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.remote_id.as_str().trim().is_empty() {
            errors.push("Remote id cannot be empty".to_string());
        }

        if self.number == 0 {
            errors.push("Hymn number must be greater than zero".to_string());
        }

        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }

        let mut seen = HashSet::new();
        for stanza in &self.stanzas {
            if !seen.insert(stanza.stanza_number) {
                errors.push(format!("Duplicate stanza number {}", stanza.stanza_number));
            }
        }

        let mut seen = HashSet::new();
        for refrain in &self.refrains {
            if !seen.insert(refrain.refrain_number) {
                errors.push(format!("Duplicate refrain number {}", refrain.refrain_number));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A partial edit of hymn content
///
/// `None` leaves a field unchanged. For optional fields the inner `Option`
/// distinguishes "set to a value" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HymnPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stanzas: Option<Vec<Stanza>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refrains: Option<Vec<Refrain>>,
    #[serde(rename = "audioUrl", skip_serializing_if = "Option::is_none")]
    pub audio_remote_url: Option<Option<String>>,
    #[serde(rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<Option<String>>,
}

impl HymnPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_stanzas(mut self, stanzas: Vec<Stanza>) -> Self {
        self.stanzas = Some(stanzas);
        self
    }

    pub fn with_audio_url(mut self, url: Option<String>) -> Self {
        self.audio_remote_url = Some(url);
        self
    }

    /// Returns true if the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
