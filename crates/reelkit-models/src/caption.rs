//! Caption models and subtitle styling.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::VideoId;

/// Unique identifier for a caption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CaptionId(pub String);

impl CaptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CaptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CaptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Subtitle file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionFormat {
    #[default]
    Srt,
    Vtt,
    Ass,
}

impl CaptionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionFormat::Srt => "srt",
            CaptionFormat::Vtt => "vtt",
            CaptionFormat::Ass => "ass",
        }
    }
}

impl fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaptionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "srt" => Ok(CaptionFormat::Srt),
            "vtt" => Ok(CaptionFormat::Vtt),
            "ass" => Ok(CaptionFormat::Ass),
            other => Err(format!("unknown caption format: {other}")),
        }
    }
}

/// Rendering style applied when burning captions into frames.
///
/// Wire format is a JSON object with camelCase keys; unknown keys are
/// ignored on input. Colors are `#RRGGBB`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionStyle {
    /// Font family used for rendering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    /// Nominal glyph height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    /// Fill color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    /// Stroke color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_color: Option<String>,
    /// Box fill when borderStyle is 3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// UI alignment: 2 = bottom-center, 10 = middle-center, 6 = top-center
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<u32>,
    /// 1 = outline + shadow, 3 = opaque box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_style: Option<u32>,
    /// Inter-glyph spacing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
    /// Blur radius for the shadow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_blur: Option<f64>,
}

/// A caption artifact belonging to a video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    pub id: CaptionId,
    pub video_id: VideoId,
    /// Bare filename within the captions directory
    pub filename: String,
    pub language: String,
    pub format: CaptionFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<CaptionStyle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_uses_camel_case_keys_and_ignores_unknown() {
        let json = r##"{
            "fontName": "Impact",
            "fontSize": 32,
            "primaryColor": "#ffffff",
            "alignment": 10,
            "someFutureKnob": true
        }"##;
        let style: CaptionStyle = serde_json::from_str(json).unwrap();
        assert_eq!(style.font_name.as_deref(), Some("Impact"));
        assert_eq!(style.font_size, Some(32));
        assert_eq!(style.alignment, Some(10));
        assert!(style.border_style.is_none());

        let out = serde_json::to_value(&style).unwrap();
        assert_eq!(out["fontName"], "Impact");
        assert_eq!(out["primaryColor"], "#ffffff");
    }
}
