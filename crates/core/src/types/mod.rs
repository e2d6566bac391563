//! Domain types for the hymnal
//!
//! - `hymn`: hymn records, identifiers and content edits
//! - `preferences`: per-user settings and their forward-compatible merge
//! - `user`: user identity, favorites and recently viewed lists
//! - `common`: timestamps and shared traits

mod common;
mod hymn;
mod preferences;
mod user;

pub use common::{Timestamp, Validator};
pub use hymn::{HymnKey, HymnPatch, HymnRecord, Refrain, RemoteId, Stanza};
pub use preferences::{
    DisplaySettings, FontSize, NotificationSettings, PreferenceSet, Theme, LINE_SPACING_RANGE,
    PREFERENCES_VERSION,
};
pub use user::{FavoritesList, RecentList, UserId, RECENT_LIMIT};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_are_exported() {
        let _key: HymnKey = HymnKey::Number(1);
        let _prefs: PreferenceSet = PreferenceSet::default();
        let _user: UserId = UserId::anonymous();
        let _recent: RecentList = RecentList::new();
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let t2 = Timestamp::now();
        assert!(t2 > t1);
    }
}
