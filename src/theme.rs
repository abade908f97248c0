// Theme cascade - pure, no side effects
//
// A theme is a flat map of style tokens. Users store a partial override on
// their account, posts capture a snapshot of the author's override at
// creation time, and the profile screen may add a viewer-scope override on
// top. Resolution is one explicit ordered merge over the system defaults so
// precedence is a documented contract instead of implicit call-site spreads.
use serde::{Deserialize, Serialize};

/// One partial style layer. Absent fields fall through to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_border_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

impl ThemeOverride {
    pub fn is_empty(&self) -> bool {
        *self == ThemeOverride::default()
    }
}

/// Fully-resolved style set; every field has a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub page_background: String,
    pub header_background: String,
    pub button_background: String,
    pub button_text_color: String,
    pub text_color: String,
    pub secondary_text_color: String,
    pub post_background: String,
    pub input_background: String,
    pub profile_border_color: String,
    pub profile_border_width: u32,
    pub border_color: String,
    pub accent_color: String,
    /// Optional even when resolved: no default background image exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            page_background: "#eef2f5".to_string(),
            header_background: "#38b6ff".to_string(),
            button_background: "#0571d3".to_string(),
            button_text_color: "#fff".to_string(),
            text_color: "#222".to_string(),
            secondary_text_color: "#555".to_string(),
            post_background: "#fff".to_string(),
            input_background: "#fff".to_string(),
            profile_border_color: "#0571d3".to_string(),
            profile_border_width: 2,
            border_color: "#ddd".to_string(),
            accent_color: "#38b6ff".to_string(),
            background_image: None,
        }
    }
}

impl Theme {
    /// Apply one override layer in place; present fields win.
    fn apply(&mut self, layer: &ThemeOverride) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut self.page_background, &layer.page_background);
        set(&mut self.header_background, &layer.header_background);
        set(&mut self.button_background, &layer.button_background);
        set(&mut self.button_text_color, &layer.button_text_color);
        set(&mut self.text_color, &layer.text_color);
        set(&mut self.secondary_text_color, &layer.secondary_text_color);
        set(&mut self.post_background, &layer.post_background);
        set(&mut self.input_background, &layer.input_background);
        set(&mut self.profile_border_color, &layer.profile_border_color);
        if let Some(width) = layer.profile_border_width {
            self.profile_border_width = width;
        }
        set(&mut self.border_color, &layer.border_color);
        set(&mut self.accent_color, &layer.accent_color);
        if layer.background_image.is_some() {
            self.background_image = layer.background_image.clone();
        }
    }
}

/// Merge override layers over the system defaults, ordered lowest to
/// highest precedence: a field present in a later layer always wins.
pub fn resolve_theme(layers: &[&ThemeOverride]) -> Theme {
    let mut theme = Theme::default();
    for layer in layers {
        theme.apply(layer);
    }
    theme
}
