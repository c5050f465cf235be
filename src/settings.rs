//! User preferences and the migration of older persisted shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

pub const DEFAULT_PRIMARY_COLOR: &str = "#4f46e5";
pub const DEFAULT_FONT_SIZE: u32 = 16;
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 12..=20;
pub const EDITOR_FONT_SIZE_RANGE: RangeInclusive<u32> = 12..=32;

/// Accent presets offered by the settings dialog, as `(name, hex)`.
pub const PRESET_COLORS: [(&str, &str); 9] = [
    ("Indigo", "#4f46e5"),
    ("Blue", "#2563eb"),
    ("Purple", "#9333ea"),
    ("Pink", "#db2777"),
    ("Red", "#dc2626"),
    ("Orange", "#ea580c"),
    ("Green", "#16a34a"),
    ("Teal", "#0d9488"),
    ("Slate", "#475569"),
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
    Matrix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub primary_color: String,
    pub theme_mode: ThemeMode,
    /// Interface text size.
    pub font_size: u32,
    pub editor_font_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            theme_mode: ThemeMode::Light,
            font_size: DEFAULT_FONT_SIZE,
            editor_font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl ThemeMode {
    pub fn label(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::Matrix => "matrix",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Matrix,
            ThemeMode::Matrix => ThemeMode::Light,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Matrix,
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Matrix => ThemeMode::Dark,
        }
    }
}

impl Settings {
    /// Builds settings from whatever was persisted. Never fails: anything that
    /// is not an object yields the defaults, and fields that are missing or of
    /// the wrong type keep their default value.
    pub fn load_from(raw: Option<&Value>) -> Settings {
        let Some(Value::Object(map)) = raw else {
            return Settings::default();
        };
        let mut fields = map.clone();
        migrate_dark_mode(&mut fields);
        migrate_editor_font_size(&mut fields);

        let mut settings = Settings::default();
        if let Some(color) = fields.get("primaryColor").and_then(Value::as_str) {
            if !color.trim().is_empty() {
                settings.primary_color = color.trim().to_string();
            }
        }
        if let Some(mode) = fields
            .get("themeMode")
            .and_then(|v| ThemeMode::deserialize(v).ok())
        {
            settings.theme_mode = mode;
        }
        if let Some(size) = fields.get("fontSize").and_then(size_value) {
            settings.font_size = clamp_size(size, &FONT_SIZE_RANGE);
        }
        if let Some(size) = fields.get("editorFontSize").and_then(size_value) {
            settings.editor_font_size = clamp_size(size, &EDITOR_FONT_SIZE_RANGE);
        }
        settings
    }

    pub fn step_font_size(&mut self, delta: i64) {
        self.font_size = clamp_size(self.font_size as f64 + delta as f64, &FONT_SIZE_RANGE);
    }

    pub fn step_editor_font_size(&mut self, delta: i64) {
        self.editor_font_size = clamp_size(
            self.editor_font_size as f64 + delta as f64,
            &EDITOR_FONT_SIZE_RANGE,
        );
    }

    /// Moves the accent to the next (or previous) preset. A custom color
    /// starts the cycle from the first preset.
    pub fn cycle_accent(&mut self, forward: bool) {
        let count = PRESET_COLORS.len();
        let current = PRESET_COLORS
            .iter()
            .position(|(_, hex)| hex.eq_ignore_ascii_case(&self.primary_color));
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(idx), true) => (idx + 1) % count,
            (Some(idx), false) => (idx + count - 1) % count,
        };
        self.primary_color = PRESET_COLORS[next].1.to_string();
    }

    pub fn accent_name(&self) -> &str {
        PRESET_COLORS
            .iter()
            .find(|(_, hex)| hex.eq_ignore_ascii_case(&self.primary_color))
            .map(|(name, _)| *name)
            .unwrap_or(self.primary_color.as_str())
    }

    /// Accent as RGB when it is written as `#rrggbb` or `#rgb`.
    pub fn accent_rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.primary_color.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let expand = |c: &str| channel(c).map(|v| v * 17);
                Some((expand(&hex[0..1])?, expand(&hex[1..2])?, expand(&hex[2..3])?))
            }
            _ => None,
        }
    }
}

fn migrate_dark_mode(fields: &mut Map<String, Value>) {
    if let Some(Value::Bool(dark)) = fields.get("darkMode") {
        let mode = if *dark { ThemeMode::Dark } else { ThemeMode::Light };
        fields.insert("themeMode".into(), Value::from(mode.label()));
    }
    fields.remove("darkMode");
}

fn migrate_editor_font_size(fields: &mut Map<String, Value>) {
    if fields.get("editorFontSize").and_then(size_value).is_some() {
        return;
    }
    let fallback = fields
        .get("fontSize")
        .and_then(size_value)
        .unwrap_or(DEFAULT_FONT_SIZE as f64);
    fields.insert("editorFontSize".into(), Value::from(fallback));
}

/// A usable size is a finite, non-zero number.
fn size_value(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite() && *n != 0.0)
}

fn clamp_size(value: f64, range: &RangeInclusive<u32>) -> u32 {
    let lo = *range.start() as f64;
    let hi = *range.end() as f64;
    value.round().clamp(lo, hi) as u32
}
