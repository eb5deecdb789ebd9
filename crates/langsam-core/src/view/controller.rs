use crate::models::{Digest, Level, Story};
use crate::player::{PlayerEvent, PlayerState};
use crate::utils::{format_date_de, format_minutes, format_time};

/// Which screen is showing. List and detail are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewMode {
    Loading,
    Error(String),
    List,
    Detail(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub headline: String,
    pub summary: String,
    /// Narration length at the current level ("3 Min."), if known.
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub date: String,
    pub level: Level,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub story_index: usize,
    pub level: Level,
    pub headline: String,
    pub text_de: String,
    pub text_en: String,
    pub source_url: Option<String>,
    pub has_audio: bool,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: Option<f64>,
}

impl DetailView {
    pub fn current_time_label(&self) -> String {
        format_time(self.current_time)
    }

    pub fn total_time_label(&self) -> String {
        self.duration
            .map(format_time)
            .unwrap_or_else(|| "0:00".to_string())
    }

    /// Playback progress in [0, 1].
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.current_time / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

pub fn project_list(digest: &Digest, level: Level) -> ListView {
    let items = digest
        .stories
        .iter()
        .map(|story| ListItem {
            headline: story.headline_en.clone(),
            summary: story.summary_en.clone(),
            duration: story
                .level(level)
                .and_then(|content| content.duration_hint())
                .and_then(format_minutes),
        })
        .collect();

    ListView {
        date: format_date_de(digest.date),
        level,
        items,
    }
}

pub fn project_detail(story: &Story, index: usize, level: Level, player: &PlayerState) -> DetailView {
    let content = story.level(level);
    DetailView {
        story_index: index,
        level,
        // The German headline is authoritative, whatever the level text says.
        headline: story.headline_de.clone(),
        text_de: content.map(|c| c.text_de.clone()).unwrap_or_default(),
        text_en: content.map(|c| c.text_en.clone()).unwrap_or_default(),
        source_url: story.source_url.clone(),
        has_audio: player.has_source,
        is_playing: player.is_playing,
        current_time: player.current_time,
        duration: player
            .duration
            .or_else(|| content.and_then(|c| c.duration_hint())),
    }
}

/// Holds the current mode and its projection.
#[derive(Debug)]
pub struct ViewController {
    mode: ViewMode,
    list: Option<ListView>,
    detail: Option<DetailView>,
    show_german: bool,
    show_english: bool,
    list_renders: u64,
    detail_renders: u64,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            mode: ViewMode::Loading,
            list: None,
            detail: None,
            show_german: true,
            show_english: false,
            list_renders: 0,
            detail_renders: 0,
        }
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn list(&self) -> Option<&ListView> {
        self.list.as_ref()
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn show_german(&self) -> bool {
        self.show_german
    }

    pub fn show_english(&self) -> bool {
        self.show_english
    }

    pub fn toggle_german(&mut self) {
        self.show_german = !self.show_german;
    }

    pub fn toggle_english(&mut self) {
        self.show_english = !self.show_english;
    }

    /// Number of full list rebuilds so far.
    pub fn list_renders(&self) -> u64 {
        self.list_renders
    }

    /// Number of full detail rebuilds so far.
    pub fn detail_renders(&self) -> u64 {
        self.detail_renders
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.mode = ViewMode::Error(message.into());
        self.list = None;
        self.detail = None;
    }

    /// Rebuild the list. Called when the digest arrives or the level changes.
    pub fn render_list(&mut self, digest: &Digest, level: Level) {
        self.list = Some(project_list(digest, level));
        self.detail = None;
        self.mode = ViewMode::List;
        self.list_renders += 1;
    }

    /// Rebuild the detail. Called when the bound story or level changes.
    /// Returns false if the story does not exist.
    pub fn render_detail(
        &mut self,
        digest: &Digest,
        index: usize,
        level: Level,
        player: &PlayerState,
    ) -> bool {
        let Some(story) = digest.story(index) else {
            return false;
        };
        self.detail = Some(project_detail(story, index, level, player));
        self.mode = ViewMode::Detail(index);
        self.detail_renders += 1;
        true
    }

    /// Patch the detail from a player notification without rebuilding it.
    pub fn apply_player_event(&mut self, event: &PlayerEvent) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        match event {
            PlayerEvent::SourceLoaded { duration } => {
                if duration.is_some() {
                    detail.duration = *duration;
                }
            }
            PlayerEvent::TimeUpdated {
                current_time,
                duration,
            } => {
                detail.current_time = *current_time;
                detail.duration = Some(*duration);
            }
            PlayerEvent::PlayStateChanged { is_playing } => detail.is_playing = *is_playing,
            PlayerEvent::Ended => detail.is_playing = false,
        }
    }

    /// Patch the detail from a player snapshot (after missed notifications).
    pub fn sync_player_state(&mut self, player: &PlayerState) {
        if let Some(detail) = self.detail.as_mut() {
            detail.is_playing = player.is_playing;
            detail.current_time = player.current_time;
            if player.duration.is_some() {
                detail.duration = player.duration;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LevelContent, Levels};

    fn sample_digest() -> Digest {
        serde_json::from_str(
            r#"{"date":"2024-01-15","stories":[{"headline_en":"X","summary_en":"Y",
            "levels":{"1":{"text_de":"Hallo","text_en":"Hello","audio_url":"a.mp3","audio_duration_seconds":125}}}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_list_projection() {
        let digest = sample_digest();
        let list = project_list(&digest, Level::One);
        assert_eq!(list.date, "15. Januar 2024");
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].headline, "X");
        assert_eq!(list.items[0].summary, "Y");
        assert_eq!(list.items[0].duration.as_deref(), Some("3 Min."));

        let list = project_list(&digest, Level::Two);
        assert_eq!(list.items[0].duration, None);
    }

    #[test]
    fn test_detail_projection_uses_metadata_until_loaded() {
        let digest = sample_digest();
        let player = PlayerState {
            has_source: true,
            ..Default::default()
        };
        let detail = project_detail(&digest.stories[0], 0, Level::One, &player);
        assert_eq!(detail.total_time_label(), "2:05");
        assert_eq!(detail.current_time_label(), "0:00");
        assert_eq!(detail.text_de, "Hallo");
        assert_eq!(detail.text_en, "Hello");
        assert_eq!(detail.headline, "");
        assert_eq!(detail.progress(), 0.0);
    }

    #[test]
    fn test_detail_missing_level_is_empty() {
        let mut story = sample_digest().stories.remove(0);
        story.headline_de = "Kopf".to_string();
        story.levels = Levels::default();
        story.levels.insert(
            Level::Three,
            LevelContent {
                text_de: "Drei".to_string(),
                text_en: "Three".to_string(),
                audio_url: None,
                audio_duration_seconds: None,
            },
        );
        let detail = project_detail(&story, 0, Level::One, &PlayerState::default());
        assert_eq!(detail.headline, "Kopf");
        assert_eq!(detail.text_de, "");
        assert_eq!(detail.text_en, "");
        assert!(!detail.has_audio);
        assert_eq!(detail.total_time_label(), "0:00");
    }

    #[test]
    fn test_player_events_patch_detail_without_rerender() {
        let digest = sample_digest();
        let mut view = ViewController::new();
        assert_eq!(view.mode(), &ViewMode::Loading);

        assert!(view.render_detail(&digest, 0, Level::One, &PlayerState::default()));
        assert_eq!(view.mode(), &ViewMode::Detail(0));
        assert_eq!(view.detail_renders(), 1);

        view.apply_player_event(&PlayerEvent::SourceLoaded {
            duration: Some(126.0),
        });
        view.apply_player_event(&PlayerEvent::TimeUpdated {
            current_time: 63.0,
            duration: 126.0,
        });
        view.apply_player_event(&PlayerEvent::PlayStateChanged { is_playing: true });

        let detail = view.detail().unwrap();
        assert_eq!(detail.current_time_label(), "1:03");
        assert_eq!(detail.total_time_label(), "2:06");
        assert_eq!(detail.progress(), 0.5);
        assert!(detail.is_playing);
        assert_eq!(view.detail_renders(), 1);
    }

    #[test]
    fn test_modes_are_exclusive() {
        let digest = sample_digest();
        let mut view = ViewController::new();
        view.render_list(&digest, Level::One);
        assert!(view.list().is_some());
        assert!(view.detail().is_none());

        view.render_detail(&digest, 0, Level::One, &PlayerState::default());
        view.render_list(&digest, Level::One);
        assert!(view.detail().is_none());
        assert_eq!(view.list_renders(), 2);

        assert!(!view.render_detail(&digest, 3, Level::One, &PlayerState::default()));
        assert_eq!(view.mode(), &ViewMode::List);

        view.show_error("offline");
        assert_eq!(view.mode(), &ViewMode::Error("offline".to_string()));
        assert!(view.list().is_none());
    }

    #[test]
    fn test_text_toggles() {
        let mut view = ViewController::new();
        assert!(view.show_german());
        assert!(!view.show_english());
        view.toggle_english();
        view.toggle_german();
        assert!(view.show_english());
        assert!(!view.show_german());
    }
}
