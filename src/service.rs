//! `ReadAloudService` — the host-facing adapter around the controller.
//!
//! This module is the single place where engine-native types are converted
//! to the transport-agnostic DTOs a host UI consumes. It also owns the two
//! concerns that sit above the state machine: the debounce guard (every
//! mutating command passes it first) and the event pump that feeds engine
//! callbacks into the controller.
//!
//! # Locking discipline
//!
//! All controller mutations use `controller.write().await`; read-only
//! queries use `controller.read().await`. The debounce guard and the
//! display-only settings use std (non-async) locks because they are only
//! accessed in sync context — never across an `.await` point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::backend::{SynthesisBackend, SynthesisEvent, VoiceInfo};
use crate::controller::{ControllerConfig, PlaybackController, PlaybackEvent};
use crate::debounce::{CommandKind, DebounceGuard};
use crate::error::ReadAloudError;
use crate::highlight::{HighlightRenderer, HighlightSettings};

// ── Display-only configuration ────────────────────────────────────

/// Which transport controls the host renders. Pure display toggles — no
/// playback-logic impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerControlsConfig {
    pub show_controls: bool,
    pub show_progress: bool,
    pub enable_skip: bool,
    pub show_speed_control: bool,
    pub show_voice_selector: bool,
}

impl Default for PlayerControlsConfig {
    fn default() -> Self {
        Self {
            show_controls: true,
            show_progress: true,
            enable_skip: true,
            show_speed_control: true,
            show_voice_selector: true,
        }
    }
}

/// Accessibility options surfaced by the host.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilitySettings {
    /// When set, the host additionally renders the raw content as a static
    /// transcript. No interaction with the playback state machine.
    pub enable_transcript: bool,
}

// ── Status DTO ─────────────────────────────────────────────────────

/// Snapshot of playback state for the host UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    /// Lifecycle state label (`"idle"`, `"playing"`, …).
    pub state: String,

    /// Current word index, `-1` when no word is active.
    pub current_word_index: i64,

    /// Progress through the token sequence, 0–100.
    pub progress_percent: f64,

    /// Number of word tokens in the loaded content.
    pub token_count: usize,

    /// Selected voice id, if any.
    pub voice_id: Option<String>,

    /// Speech rate multiplier.
    pub rate: f32,

    pub controls: PlayerControlsConfig,

    pub transcript_enabled: bool,
}

// ── Event sink ─────────────────────────────────────────────────────

/// Host-side consumer of playback notifications.
///
/// Implemented by whatever event surface the host offers (an SSE bus, a
/// window event emitter, a test collector).
pub trait PlaybackEventSink: Send + Sync {
    /// Deliver one playback event to the host.
    fn emit(&self, event: PlaybackEvent);
}

/// Bridge [`PlaybackEvent`]s from the controller's channel to `sink`.
///
/// The spawned task self-terminates when the controller's sender is
/// dropped: `recv()` returns `None` and the loop exits.
pub fn spawn_event_bridge(
    mut event_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    sink: Arc<dyn PlaybackEventSink>,
) {
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            sink.emit(event);
        }
        // event_rx returned None: controller dropped — task exits.
    });
}

/// A [`PlaybackEventSink`] that drives a [`HighlightRenderer`] from the
/// playback event stream.
///
/// Forwards `WordChanged` notifications into
/// [`HighlightRenderer::on_word_changed`] and ignores everything else.
/// Hand it to [`spawn_event_bridge`] (or call `emit` from the host's own
/// pump) and word-index changes reach the rendering surface with no
/// host-side wiring.
pub struct HighlightEventSink {
    renderer: std::sync::Mutex<HighlightRenderer>,
}

impl HighlightEventSink {
    /// Wrap `renderer` for use as an event sink.
    #[must_use]
    pub fn new(renderer: HighlightRenderer) -> Self {
        Self {
            renderer: std::sync::Mutex::new(renderer),
        }
    }
}

impl PlaybackEventSink for HighlightEventSink {
    fn emit(&self, event: PlaybackEvent) {
        if let PlaybackEvent::WordChanged { previous, current } = event {
            self.renderer
                .lock()
                .unwrap()
                .on_word_changed(previous, current);
        }
    }
}

// ── Service ────────────────────────────────────────────────────────

/// Host facade over the playback controller.
///
/// Owns the debounce guard, the engine event pump, the display-only
/// settings, and the raw content (for the transcript view).
pub struct ReadAloudService {
    controller: Arc<RwLock<PlaybackController>>,

    /// Sync-only lock — acquired and released before any `.await`.
    guard: std::sync::Mutex<DebounceGuard>,

    highlight: std::sync::RwLock<HighlightSettings>,
    controls: std::sync::RwLock<PlayerControlsConfig>,
    accessibility: std::sync::RwLock<AccessibilitySettings>,

    /// The raw markup of the current section, kept for the transcript view
    /// and for re-segmentation when highlight settings change.
    raw_content: std::sync::RwLock<String>,
}

impl ReadAloudService {
    /// Create a service around `engine`.
    ///
    /// `engine_tx`/`engine_rx` are the two ends of the channel the backend
    /// emits its events on; the service spawns the pump that drives those
    /// events into the controller. Returns the service and the receiver for
    /// host-facing [`PlaybackEvent`]s (bridge it with
    /// [`spawn_event_bridge`] or consume it directly).
    #[must_use]
    pub fn new(
        engine: Box<dyn SynthesisBackend>,
        engine_tx: mpsc::UnboundedSender<SynthesisEvent>,
        engine_rx: mpsc::UnboundedReceiver<SynthesisEvent>,
        config: ControllerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (controller, event_rx) = PlaybackController::new(engine, engine_tx, config);
        let controller = Arc::new(RwLock::new(controller));

        spawn_engine_pump(engine_rx, Arc::clone(&controller));

        let service = Self {
            controller,
            guard: std::sync::Mutex::new(DebounceGuard::new()),
            highlight: std::sync::RwLock::new(HighlightSettings::default()),
            controls: std::sync::RwLock::new(PlayerControlsConfig::default()),
            accessibility: std::sync::RwLock::new(AccessibilitySettings::default()),
            raw_content: std::sync::RwLock::new(String::new()),
        };

        (service, event_rx)
    }

    // ── Content ────────────────────────────────────────────────────

    /// Load the content document for the currently displayed section.
    ///
    /// Forces full teardown of any in-flight session before re-segmenting.
    /// Returns the segmenter's speakability verdict; the content is
    /// rendered either way.
    pub async fn set_content(&self, markup: &str) -> Result<(), ReadAloudError> {
        let highlight_enabled = self.highlight.read().unwrap().enabled;
        *self.raw_content.write().unwrap() = markup.to_string();

        let verdict = self
            .controller
            .write()
            .await
            .load_content(markup, highlight_enabled)
            .await;
        info!(speakable = verdict.is_ok(), "Section content loaded");
        verdict
    }

    /// Display markup for the current section (spans injected when
    /// highlighting is enabled).
    pub async fn display_markup(&self) -> Option<String> {
        let guard = self.controller.read().await;
        guard.content().map(|c| c.display_markup.clone())
    }

    /// The raw content for the static transcript view, if enabled.
    pub fn transcript(&self) -> Option<String> {
        if self.accessibility.read().unwrap().enable_transcript {
            Some(self.raw_content.read().unwrap().clone())
        } else {
            None
        }
    }

    // ── Transport commands (debounce-guarded) ──────────────────────

    /// Start playback from the beginning of the section.
    pub async fn play(&self) -> Result<(), ReadAloudError> {
        if !self.admit(CommandKind::Play) {
            return Ok(());
        }
        self.controller.write().await.play().await
    }

    /// Pause the in-flight utterance.
    pub async fn pause(&self) -> Result<(), ReadAloudError> {
        if !self.admit(CommandKind::Pause) {
            return Ok(());
        }
        self.controller.write().await.pause().await
    }

    /// Resume a paused utterance.
    pub async fn resume(&self) -> Result<(), ReadAloudError> {
        if !self.admit(CommandKind::Resume) {
            return Ok(());
        }
        self.controller.write().await.resume().await
    }

    /// Stop playback and return to idle.
    pub async fn stop(&self) -> Result<(), ReadAloudError> {
        if !self.admit(CommandKind::Stop) {
            return Ok(());
        }
        self.controller.write().await.stop().await;
        Ok(())
    }

    /// Skip forward by `n` words.
    pub async fn skip_forward(&self, n: usize) -> Result<(), ReadAloudError> {
        if !self.admit(CommandKind::Skip) {
            return Ok(());
        }
        self.controller.write().await.skip_forward(n).await
    }

    /// Skip backward by `n` words.
    pub async fn skip_backward(&self, n: usize) -> Result<(), ReadAloudError> {
        if !self.admit(CommandKind::Skip) {
            return Ok(());
        }
        self.controller.write().await.skip_backward(n).await
    }

    // ── Voice configuration ────────────────────────────────────────

    /// Select a voice (`None` for the engine default). Applies from the
    /// next session.
    pub async fn set_voice(&self, voice_id: Option<String>) {
        self.controller.write().await.voice_config_mut().voice_id = voice_id;
    }

    /// Set the speech rate (clamped to 0.5–2.0).
    pub async fn set_rate(&self, rate: f32) {
        self.controller.write().await.voice_config_mut().set_rate(rate);
    }

    /// Set the pitch (clamped to 0.0–2.0).
    pub async fn set_pitch(&self, pitch: f32) {
        self.controller.write().await.voice_config_mut().set_pitch(pitch);
    }

    /// Set the volume (clamped to 0.0–1.0).
    pub async fn set_volume(&self, volume: f32) {
        self.controller.write().await.voice_config_mut().set_volume(volume);
    }

    /// Set the language tag used when no voice is selected.
    pub async fn set_language(&self, language: impl Into<String>) {
        self.controller.write().await.voice_config_mut().language = language.into();
    }

    /// Voices currently advertised by the engine. Callers should re-query
    /// after a voice-list change notification.
    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ReadAloudError> {
        self.controller.read().await.list_voices().await
    }

    // ── Display settings ───────────────────────────────────────────

    /// Replace the highlight settings.
    ///
    /// Toggling `enabled` changes the display markup, so the current
    /// section is re-segmented (tearing down any in-flight session, same
    /// as a content change).
    pub async fn set_highlight_settings(
        &self,
        settings: HighlightSettings,
    ) -> Result<(), ReadAloudError> {
        let enabled_changed = {
            let mut guard = self.highlight.write().unwrap();
            let changed = guard.enabled != settings.enabled;
            *guard = settings;
            changed
        };

        if enabled_changed {
            let markup = self.raw_content.read().unwrap().clone();
            if !markup.is_empty() {
                return self.set_content(&markup).await;
            }
        }
        Ok(())
    }

    /// Current highlight settings.
    pub fn highlight_settings(&self) -> HighlightSettings {
        self.highlight.read().unwrap().clone()
    }

    /// Replace the player controls configuration.
    pub fn set_controls(&self, controls: PlayerControlsConfig) {
        *self.controls.write().unwrap() = controls;
    }

    /// Replace the accessibility settings.
    pub fn set_accessibility(&self, settings: AccessibilitySettings) {
        *self.accessibility.write().unwrap() = settings;
    }

    // ── Status ─────────────────────────────────────────────────────

    /// Snapshot of the current playback state for the host UI.
    pub async fn status(&self) -> PlaybackStatus {
        let guard = self.controller.read().await;
        let voice = guard.voice_config();

        PlaybackStatus {
            state: guard.state().label().to_owned(),
            current_word_index: guard
                .current_word_index()
                .and_then(|i| i64::try_from(i).ok())
                .unwrap_or(-1),
            progress_percent: guard.progress_percent(),
            token_count: guard.content().map_or(0, crate::segment::SegmentedContent::len),
            voice_id: voice.voice_id.clone(),
            rate: voice.rate,
            controls: self.controls.read().unwrap().clone(),
            transcript_enabled: self.accessibility.read().unwrap().enable_transcript,
        }
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Run a command through the debounce guard. Rejected commands are
    /// silently dropped — never queued, never retried.
    fn admit(&self, kind: CommandKind) -> bool {
        let admitted = self.guard.lock().unwrap().admit(kind);
        if !admitted {
            debug!(command = kind.label(), "Command dropped by debounce guard");
        }
        admitted
    }
}

/// Pump normalized engine events into the controller.
///
/// Self-terminates when the backend's sender side is dropped.
fn spawn_engine_pump(
    mut engine_rx: mpsc::UnboundedReceiver<SynthesisEvent>,
    controller: Arc<RwLock<PlaybackController>>,
) {
    tokio::spawn(async move {
        while let Some(event) = engine_rx.recv().await {
            controller.write().await.handle_engine_event(event);
        }
    });
}
