//! User preference models
//!
//! Preferences cross two boundaries where the shape is not under our control:
//! rows written by older builds and documents written by other devices. Both
//! enter through [`PreferenceSet::from_json`], which merges whatever it can
//! understand over the defaults and keeps unknown keys around untouched.

use crate::error::AppError;
use crate::types::Validator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Current preference schema version
pub const PREFERENCES_VERSION: u32 = 2;

/// Allowed range for `display.lineSpacing`
pub const LINE_SPACING_RANGE: (f64, f64) = (1.0, 3.0);

/// Hymn text size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::XLarge => "xlarge",
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Color scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Notification preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub daily_hymn: bool,
    /// Local time of day as `HH:MM`
    pub reminder_time: String,
    /// Keys this build does not know about, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            daily_hymn: false,
            reminder_time: "08:00".to_string(),
            extra: Map::new(),
        }
    }
}

const NOTIFICATION_KEYS: &[&str] = &["enabled", "dailyHymn", "reminderTime"];

impl NotificationSettings {
    fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            log::warn!("Ignoring malformed notifications preferences: {}", value);
            return defaults;
        };
        Self {
            enabled: field(obj, "enabled", defaults.enabled),
            daily_hymn: field(obj, "dailyHymn", defaults.daily_hymn),
            reminder_time: field(obj, "reminderTime", defaults.reminder_time),
            extra: unknown_keys(obj, NOTIFICATION_KEYS),
        }
    }
}

/// Hymn display preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub show_chords: bool,
    pub show_verse_numbers: bool,
    pub line_spacing: f64,
    /// Keys this build does not know about, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_chords: false,
            show_verse_numbers: true,
            line_spacing: 1.5,
            extra: Map::new(),
        }
    }
}

const DISPLAY_KEYS: &[&str] = &["showChords", "showVerseNumbers", "lineSpacing"];

impl DisplaySettings {
    fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            log::warn!("Ignoring malformed display preferences: {}", value);
            return defaults;
        };
        Self {
            show_chords: field(obj, "showChords", defaults.show_chords),
            show_verse_numbers: field(obj, "showVerseNumbers", defaults.show_verse_numbers),
            line_spacing: line_spacing_field(obj, defaults.line_spacing),
            extra: unknown_keys(obj, DISPLAY_KEYS),
        }
    }
}

/// Per-user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSet {
    pub version: u32,
    pub font_size: FontSize,
    pub theme: Theme,
    pub offline_download: bool,
    pub offline_tunes: bool,
    pub sync_favorites: bool,
    pub notifications: NotificationSettings,
    pub display: DisplaySettings,
    /// Keys this build does not know about, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            font_size: FontSize::default(),
            theme: Theme::default(),
            offline_download: false,
            offline_tunes: false,
            sync_favorites: true,
            notifications: NotificationSettings::default(),
            display: DisplaySettings::default(),
            extra: Map::new(),
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "version",
    "fontSize",
    "theme",
    "offlineDownload",
    "offlineTunes",
    "syncFavorites",
    "notifications",
    "display",
];

impl PreferenceSet {
    /// Merges a stored or remote document over the defaults
    ///
    /// Fields that are missing or carry a value of the wrong type fall back to
    /// their default; unknown keys are preserved in `extra`. Never fails.
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            log::warn!("Preference document is not an object, using defaults");
            return defaults;
        };

        Self {
            // Older documents are upgraded in place; the version always
            // reflects the schema this build writes.
            version: PREFERENCES_VERSION,
            font_size: field(obj, "fontSize", defaults.font_size),
            theme: field(obj, "theme", defaults.theme),
            offline_download: field(obj, "offlineDownload", defaults.offline_download),
            offline_tunes: field(obj, "offlineTunes", defaults.offline_tunes),
            sync_favorites: field(obj, "syncFavorites", defaults.sync_favorites),
            notifications: obj
                .get("notifications")
                .map(NotificationSettings::from_json)
                .unwrap_or_default(),
            display: obj
                .get("display")
                .map(DisplaySettings::from_json)
                .unwrap_or_default(),
            extra: unknown_keys(obj, KNOWN_KEYS),
        }
    }

    /// Parses a stored JSON string, falling back to defaults if it is unreadable
    pub fn from_json_str(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                log::warn!("Stored preferences are not valid JSON ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Serializes to the document shape shared with the Remote Store
    pub fn to_json(&self) -> Result<Value, AppError> {
        serde_json::to_value(self).map_err(|e| AppError::InternalError {
            message: format!("Failed to serialize preferences: {}", e),
        })
    }

    /// Sets a top-level preference from an untyped value
    pub fn apply_update(&mut self, key: &str, value: Value) -> Result<(), AppError> {
        match key {
            "fontSize" => self.font_size = parse_value(key, value)?,
            "theme" => self.theme = parse_value(key, value)?,
            "offlineDownload" => self.offline_download = parse_value(key, value)?,
            "offlineTunes" => self.offline_tunes = parse_value(key, value)?,
            "syncFavorites" => self.sync_favorites = parse_value(key, value)?,
            "notifications" => {
                let notifications: NotificationSettings = parse_value(key, value)?;
                self.notifications = notifications;
            }
            "display" => {
                let display: DisplaySettings = parse_value(key, value)?;
                check_line_spacing(display.line_spacing)?;
                self.display = display;
            }
            "version" => {
                return Err(invalid(key, "the schema version cannot be changed"));
            }
            _ => return Err(invalid(key, "unknown preference")),
        }
        Ok(())
    }

    /// Sets a field of a nested preference group from an untyped value
    pub fn apply_nested_update(
        &mut self,
        parent: &str,
        child: &str,
        value: Value,
    ) -> Result<(), AppError> {
        let path = format!("{}.{}", parent, child);
        match (parent, child) {
            ("notifications", "enabled") => {
                self.notifications.enabled = parse_value(&path, value)?
            }
            ("notifications", "dailyHymn") => {
                self.notifications.daily_hymn = parse_value(&path, value)?
            }
            ("notifications", "reminderTime") => {
                self.notifications.reminder_time = parse_value(&path, value)?
            }
            ("display", "showChords") => self.display.show_chords = parse_value(&path, value)?,
            ("display", "showVerseNumbers") => {
                self.display.show_verse_numbers = parse_value(&path, value)?
            }
            ("display", "lineSpacing") => {
                let spacing: f64 = parse_value(&path, value)?;
                check_line_spacing(spacing)?;
                self.display.line_spacing = spacing;
            }
            _ => return Err(invalid(&path, "unknown preference")),
        }
        Ok(())
    }
}

impl Validator for PreferenceSet {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = check_line_spacing(self.display.line_spacing) {
            errors.push(e.to_string());
        }

        let time = &self.notifications.reminder_time;
        let valid_time = time
            .split_once(':')
            .and_then(|(h, m)| Some((h.parse::<u8>().ok()?, m.parse::<u8>().ok()?)))
            .is_some_and(|(h, m)| h < 24 && m < 60);
        if !valid_time {
            errors.push(format!("Reminder time '{}' is not HH:MM", time));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str, default: T) -> T {
    match obj.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Ignoring invalid preference '{}': {}", key, e);
                default
            }
        },
    }
}

fn line_spacing_field(obj: &Map<String, Value>, default: f64) -> f64 {
    let spacing = field(obj, "lineSpacing", default);
    match check_line_spacing(spacing) {
        Ok(()) => spacing,
        Err(e) => {
            log::warn!("Ignoring stored line spacing {}: {}", spacing, e);
            default
        }
    }
}

fn unknown_keys(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn parse_value<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| invalid(key, &e.to_string()))
}

fn check_line_spacing(spacing: f64) -> Result<(), AppError> {
    let (min, max) = LINE_SPACING_RANGE;
    if spacing.is_finite() && (min..=max).contains(&spacing) {
        Ok(())
    } else {
        Err(invalid(
            "display.lineSpacing",
            &format!("must be between {} and {}", min, max),
        ))
    }
}

fn invalid(key: &str, reason: &str) -> AppError {
    AppError::InvalidPreference {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
