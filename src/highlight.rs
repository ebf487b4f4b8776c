//! Highlight rendering — tracks the spoken word on the display surface.
//!
//! The renderer consumes word-index change notifications from the
//! controller and toggles a visual marker through the [`HighlightSurface`]
//! abstraction. It never recomputes the index→surface mapping — that is
//! produced once by the segmenter (the `data-word-index` spans in the
//! display markup) — and it does zero work when highlighting is disabled.

use serde::{Deserialize, Serialize};

// ── Settings ───────────────────────────────────────────────────────

/// Visual style of the highlight marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum HighlightStyle {
    #[default]
    Word,
    Sentence,
    Underline,
}

/// Animation applied when the marker moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum HighlightAnimation {
    #[default]
    Pulse,
    Fade,
    Underline,
    None,
}

/// Host-configurable highlight appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSettings {
    /// Master switch. When `false` the renderer is a complete no-op and the
    /// segmenter skips span wrapping entirely.
    pub enabled: bool,

    /// CSS color value for the marker.
    pub color: String,

    pub style: HighlightStyle,

    pub animation: HighlightAnimation,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            color: "#ffd54f".to_string(),
            style: HighlightStyle::default(),
            animation: HighlightAnimation::default(),
        }
    }
}

// ── Surface abstraction ────────────────────────────────────────────

/// The platform rendering surface the marker is drawn on.
///
/// Implementations address word display surfaces by token index (the
/// segmenter's `data-word-index` attribute). A web host toggles a CSS
/// class; a native host repaints a text range; tests record calls.
pub trait HighlightSurface: Send + Sync {
    /// Apply the highlight marker to the word at `index`.
    fn apply(&self, index: usize);

    /// Remove the highlight marker from the word at `index`.
    fn clear(&self, index: usize);

    /// Scroll the word at `index` into the visible area if needed.
    fn reveal(&self, index: usize);
}

// ── Renderer ───────────────────────────────────────────────────────

/// Applies and removes the word marker as playback advances.
pub struct HighlightRenderer {
    settings: HighlightSettings,
    surface: Box<dyn HighlightSurface>,
    active: Option<usize>,
}

impl HighlightRenderer {
    /// Create a renderer drawing on `surface`.
    #[must_use]
    pub fn new(settings: HighlightSettings, surface: Box<dyn HighlightSurface>) -> Self {
        Self {
            settings,
            surface,
            active: None,
        }
    }

    /// Current highlight appearance settings.
    #[must_use]
    pub const fn settings(&self) -> &HighlightSettings {
        &self.settings
    }

    /// Replace the appearance settings. Disabling highlighting clears any
    /// active marker immediately.
    pub fn set_settings(&mut self, settings: HighlightSettings) {
        if !settings.enabled {
            if let Some(index) = self.active.take() {
                self.surface.clear(index);
            }
        }
        self.settings = settings;
    }

    /// Handle a word-index change from the controller.
    ///
    /// Clears the marker on `previous`, applies it to `current`, and
    /// reveals the new word. `current = None` clears the highlight entirely
    /// (stop, completion, error). No-ops when highlighting is disabled.
    pub fn on_word_changed(&mut self, previous: Option<usize>, current: Option<usize>) {
        if !self.settings.enabled {
            return;
        }

        // Prefer our own bookkeeping over the caller's `previous` — they
        // agree in normal operation, but after a settings change the
        // renderer's record is the one that matches the surface.
        if let Some(index) = self.active.take().or(previous) {
            if Some(index) != current {
                self.surface.clear(index);
            }
        }

        if let Some(index) = current {
            self.surface.apply(index);
            self.surface.reveal(index);
        }
        self.active = current;
    }
}
