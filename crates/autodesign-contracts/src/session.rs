use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::ConfigError;

pub const MIN_PROMPT_CHARS: usize = 10;

pub const GENERATING_MESSAGE: &str = "Generating AI concept...";
pub const REFINING_MESSAGE: &str = "Refining design with AI...";
pub const UPLOADING_MESSAGE: &str = "Processing uploaded image...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppMode {
    #[default]
    Generate,
    Refine,
}

impl AppMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Refine => "refine",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generate" | "gen" => Ok(Self::Generate),
            "refine" | "edit" => Ok(Self::Refine),
            _ => Err(ConfigError::InvalidSetting {
                key: "mode",
                value: raw.to_string(),
            }),
        }
    }
}

/// Whether the coordinator has a request in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Loading { message: String },
}

impl Activity {
    pub fn loading(message: impl Into<String>) -> Self {
        Self::Loading {
            message: message.into(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { message } => Some(message.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    /// Display order used by pickers.
    pub const ALL: [AspectRatio; 5] = [
        Self::Landscape,
        Self::Square,
        Self::Portrait,
        Self::Classic,
        Self::ClassicPortrait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Classic => "4:3",
            Self::ClassicPortrait => "3:4",
        }
    }

    /// Pixel dimensions with the long edge at `long_edge`.
    pub fn dimensions(self, long_edge: u32) -> (u32, u32) {
        let (w, h) = match self {
            Self::Square => (1, 1),
            Self::Landscape => (16, 9),
            Self::Portrait => (9, 16),
            Self::Classic => (4, 3),
            Self::ClassicPortrait => (3, 4),
        };
        let long = w.max(h);
        (long_edge * w / long, long_edge * h / long)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace('/', ":");
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidSetting {
                key: "aspect_ratio",
                value: raw.to_string(),
            })
    }
}

/// Minimum-length rule shared by the generate and refine guards.
pub fn prompt_meets_minimum(prompt: &str) -> bool {
    prompt.trim().chars().count() >= MIN_PROMPT_CHARS
}
