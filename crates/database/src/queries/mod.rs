//! Database query operations organized by entity

pub mod hymns;
pub mod preferences;
pub mod secure_kv;
pub mod sync_meta;
pub mod user_data;

// Re-export commonly used query functions
pub use hymns::{
    clear_all_local_audio_paths, delete_all_hymns, find_hymn, get_all_hymns,
    get_downloaded_audio_count, get_hymn_by_identifier, get_hymn_count, max_updated_at,
    set_local_audio_path, upsert_hymn, upsert_hymn_with, upsert_hymns_batch,
};
pub use preferences::{delete_preferences, get_preferences, save_preferences};
pub use secure_kv::{delete_secure_value, get_secure_value, set_secure_value};
pub use sync_meta::{clear_last_sync_time, get_last_sync_time, set_last_sync_time};
pub use user_data::{
    delete_legacy_user_data, get_legacy_user_data, save_legacy_user_data, LegacyUserData,
};
