//! Per-user identity and hymn lists

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of entries kept in a [`RecentList`]
pub const RECENT_LIMIT: usize = 20;

/// Stable user identifier supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    const ANONYMOUS: &'static str = "anonymous";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity used when nobody is signed in
    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS || self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A user's favorite hymns
///
/// Behaves as a set; entries keep the order in which they were added so the
/// display order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoritesList(Vec<String>);

impl FavoritesList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from raw ids, dropping duplicates and blanks
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for id in ids {
            let id = id.into();
            if !id.trim().is_empty() && !list.contains(&id) {
                list.0.push(id);
            }
        }
        list
    }

    pub fn contains(&self, hymn_id: &str) -> bool {
        self.0.iter().any(|id| id == hymn_id)
    }

    /// Flips membership and returns whether the hymn is now a favorite
    pub fn toggle(&mut self, hymn_id: &str) -> bool {
        if let Some(pos) = self.0.iter().position(|id| id == hymn_id) {
            self.0.remove(pos);
            false
        } else {
            self.0.push(hymn_id.to_string());
            true
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares as sets, ignoring order
    pub fn same_members(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.iter().all(|id| other.contains(id))
    }
}

/// Recently viewed hymns, most recent first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentList(Vec<String>);

impl RecentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from raw ids, keeping the first occurrence of each and
    /// applying the cap
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !id.trim().is_empty() && !list.contains(&id) {
                list.push(id);
            }
        }
        list.truncate(RECENT_LIMIT);
        Self(list)
    }

    /// Records a view: moves the hymn to the front, dropping the oldest entry
    /// when over the cap
    pub fn push(&mut self, hymn_id: &str) {
        self.0.retain(|id| id != hymn_id);
        self.0.insert(0, hymn_id.to_string());
        self.0.truncate(RECENT_LIMIT);
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
