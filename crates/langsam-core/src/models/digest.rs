use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Schema version written by the digest builder.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// Difficulty tier of a story variant (1 = easiest, 3 = hardest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Level {
    #[default]
    One,
    Two,
    Three,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::One, Level::Two, Level::Three];

    pub fn number(&self) -> u8 {
        match self {
            Level::One => 1,
            Level::Two => 2,
            Level::Three => 3,
        }
    }

    /// Clamp any integer into the level range.
    pub fn clamped(n: i64) -> Self {
        match n {
            i64::MIN..=1 => Level::One,
            2 => Level::Two,
            _ => Level::Three,
        }
    }

    /// CEFR band the digest builder targets for this tier.
    pub fn cefr(&self) -> &'static str {
        match self {
            Level::One => "A1",
            Level::Two => "B1",
            Level::Three => "C1",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Text and narration for one story at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelContent {
    #[serde(default)]
    pub text_de: String,
    #[serde(default)]
    pub text_en: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub audio_duration_seconds: Option<f64>,
}

impl LevelContent {
    /// Relative path of the narration, if this level has any.
    pub fn audio_path(&self) -> Option<&str> {
        self.audio_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Narration length from the digest metadata. Zero counts as unknown.
    pub fn duration_hint(&self) -> Option<f64> {
        self.audio_duration_seconds
            .filter(|secs| secs.is_finite() && *secs > 0.0)
    }
}

/// Per-level content of a story. Unknown level keys in the document are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    #[serde(rename = "1", default, skip_serializing_if = "Option::is_none")]
    one: Option<LevelContent>,
    #[serde(rename = "2", default, skip_serializing_if = "Option::is_none")]
    two: Option<LevelContent>,
    #[serde(rename = "3", default, skip_serializing_if = "Option::is_none")]
    three: Option<LevelContent>,
}

impl Levels {
    pub fn get(&self, level: Level) -> Option<&LevelContent> {
        match level {
            Level::One => self.one.as_ref(),
            Level::Two => self.two.as_ref(),
            Level::Three => self.three.as_ref(),
        }
    }

    pub fn insert(&mut self, level: Level, content: LevelContent) {
        let slot = match level {
            Level::One => &mut self.one,
            Level::Two => &mut self.two,
            Level::Three => &mut self.three,
        };
        *slot = Some(content);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub headline_en: String,
    #[serde(default)]
    pub headline_de: String,
    #[serde(default)]
    pub summary_en: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub levels: Levels,
}

impl Story {
    pub fn level(&self, level: Level) -> Option<&LevelContent> {
        self.levels.get(level)
    }
}

/// The daily document. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub date: NaiveDate,
    #[serde(default)]
    pub generated_at: Option<String>,
    pub stories: Vec<Story>,
}

impl Digest {
    pub fn story(&self, index: usize) -> Option<&Story> {
        self.stories.get(index)
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
