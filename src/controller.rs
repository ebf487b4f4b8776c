//! Playback controller — the read-aloud state machine.
//!
//! The controller owns the authoritative session state (current word index,
//! progress, lifecycle state) and is the sole consumer of normalized
//! [`SynthesisEvent`]s. It is single-threaded and cooperative: it never
//! polls, reacting only to host commands and to engine callbacks, both
//! delivered on the same event loop.
//!
//! ```text
//!   Idle → Requesting → Playing ⇄ Paused
//!            │             │
//!            │             ├──→ Completed ──→ (Play) → Requesting
//!            │             └──→ Error ──────→ (Play) → Requesting
//!            └── Stop from anywhere ──→ Idle
//! ```
//!
//! Every `speak` request carries a fresh monotonic [`SessionId`]; any
//! callback tagged with a non-current id is discarded without touching the
//! active session. Seeking is emulated: the engine cannot jump inside an
//! in-progress utterance, so `skip` stops the current session and
//! re-synthesizes from the target token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::backend::{SessionId, SynthesisBackend, SynthesisEvent, VoiceConfig, VoiceInfo};
use crate::error::{ErrorKind, ReadAloudError};
use crate::segment::{self, DEFAULT_MAX_TEXT_LEN, SegmentedContent};

// ── Playback state machine ─────────────────────────────────────────

/// Lifecycle state of the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    /// No session in flight — ready for Play.
    Idle,

    /// A `speak` request was issued; waiting for the first engine callback.
    Requesting,

    /// The engine is voicing content (boundary events arriving).
    Playing,

    /// Pause requested (optimistic — reconciled if boundaries keep coming).
    Paused,

    /// The utterance finished naturally.
    Completed,

    /// The engine reported a failure; the host must re-issue Play.
    Error,
}

impl PlaybackState {
    /// Lower-case label for logs and host DTOs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

// ── Events emitted to the host ─────────────────────────────────────

/// Notifications emitted by the controller to the host UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Lifecycle state changed.
    StateChanged(PlaybackState),

    /// Progress through the token sequence, 0–100.
    Progress { percent: f64 },

    /// The highlighted word moved. `current = None` clears the highlight.
    WordChanged {
        previous: Option<usize>,
        current: Option<usize>,
    },

    /// Playback finished naturally.
    Completed,

    /// A non-benign failure occurred; playback halted.
    Error { kind: ErrorKind, message: String },
}

// ── Controller configuration ───────────────────────────────────────

/// Tunables for the playback controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Ceiling on speakable text length, in characters.
    pub max_text_len: usize,

    /// Watchdog interval: if no callback at all arrives for a session
    /// within this window after `speak`, the controller surfaces
    /// `EngineUnavailable` instead of hanging. `None` disables it.
    pub watchdog: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            watchdog: Some(Duration::from_secs(10)),
        }
    }
}

// ── Session bookkeeping ────────────────────────────────────────────

/// One continuous attempt to voice the token sequence.
struct Session {
    id: SessionId,

    /// Token index the utterance started from; engine boundary indices are
    /// utterance-relative and get offset by this.
    start_index: usize,

    /// Set once any callback for this session arrives (watchdog evidence).
    saw_callback: Arc<AtomicBool>,
}

// ── Controller ─────────────────────────────────────────────────────

/// The read-aloud playback state machine.
///
/// Constructed with the synthesis backend it drives and a clone of the
/// backend's event sender (used by the watchdog to inject a failure event
/// through the same channel the engine uses). Emits [`PlaybackEvent`]s via
/// the receiver returned from [`new`](Self::new).
pub struct PlaybackController {
    engine: Box<dyn SynthesisBackend>,

    /// Sender side of the engine event channel — watchdog injection path.
    engine_tx: mpsc::UnboundedSender<SynthesisEvent>,

    event_tx: mpsc::UnboundedSender<PlaybackEvent>,

    config: ControllerConfig,

    /// Live voice settings; snapshotted per session.
    voice: VoiceConfig,

    /// Segmented content for the currently displayed section.
    content: Option<SegmentedContent>,

    state: PlaybackState,

    session: Option<Session>,

    /// Session whose engine request may still be outstanding after a
    /// failure (the watchdog fires on silence alone — the engine never
    /// reported anything). Cancelled before the next `speak`.
    pending_cancel: Option<SessionId>,

    next_session_id: u64,

    current_word: Option<usize>,

    progress_percent: f64,
}

impl PlaybackController {
    /// Create a controller driving `engine`.
    ///
    /// `engine_tx` must be the same sender the backend emits its events on.
    /// Returns the controller and the receiver for [`PlaybackEvent`]s.
    #[must_use]
    pub fn new(
        engine: Box<dyn SynthesisBackend>,
        engine_tx: mpsc::UnboundedSender<SynthesisEvent>,
        config: ControllerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = Self {
            engine,
            engine_tx,
            event_tx,
            config,
            voice: VoiceConfig::default(),
            content: None,
            state: PlaybackState::Idle,
            session: None,
            pending_cancel: None,
            next_session_id: 0,
            current_word: None,
            progress_percent: 0.0,
        };

        (controller, event_rx)
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Index of the word currently being spoken, if any.
    #[must_use]
    pub const fn current_word_index(&self) -> Option<usize> {
        self.current_word
    }

    /// Progress through the token sequence, 0–100.
    #[must_use]
    pub const fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    /// Live voice configuration (mutable — applies from the next session).
    pub const fn voice_config_mut(&mut self) -> &mut VoiceConfig {
        &mut self.voice
    }

    /// Live voice configuration.
    #[must_use]
    pub const fn voice_config(&self) -> &VoiceConfig {
        &self.voice
    }

    /// The segmented content currently loaded, if any.
    #[must_use]
    pub const fn content(&self) -> Option<&SegmentedContent> {
        self.content.as_ref()
    }

    /// Voices currently advertised by the engine.
    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ReadAloudError> {
        self.engine.list_voices().await
    }

    // ── Content lifecycle ──────────────────────────────────────────

    /// Load a new content document, replacing any previous one.
    ///
    /// Unconditionally cancels an in-flight session first — a content
    /// change invalidates everything downstream. Returns the segmenter's
    /// speakability verdict; the content is retained either way (the host
    /// still renders it), and `play` re-checks before synthesis.
    pub async fn load_content(
        &mut self,
        markup: &str,
        highlight_enabled: bool,
    ) -> Result<(), ReadAloudError> {
        if self.state != PlaybackState::Idle {
            self.teardown_session().await;
        }

        let segmented = segment::segment(markup, highlight_enabled);
        let verdict = segmented.check(self.config.max_text_len);

        tracing::debug!(
            tokens = segmented.len(),
            text_len = segmented.text_len,
            speakable = verdict.is_ok(),
            "Content loaded"
        );

        self.content = Some(segmented);
        verdict
    }

    // ── Transport commands ─────────────────────────────────────────

    /// Start voicing the loaded content from the beginning.
    ///
    /// Valid from `Idle`, `Completed`, and `Error`. Precondition failures
    /// (`NoContent`, `ContentTooLarge`, `VoiceUnavailable`) are returned
    /// synchronously without any state change or `speak` request. The
    /// controller moves to `Requesting` once `speak` is issued and to
    /// `Playing` on the first boundary event — deliberately not optimistic,
    /// so `Playing` always reflects engine evidence.
    pub async fn play(&mut self) -> Result<(), ReadAloudError> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Completed | PlaybackState::Error => {}
            from => {
                return Err(ReadAloudError::InvalidTransition {
                    from: from.label(),
                    command: "play",
                });
            }
        }
        self.start_session(0).await
    }

    /// Pause the in-flight utterance. Valid only from `Playing`.
    ///
    /// The transition is optimistic — many engines never acknowledge a
    /// pause. If boundary events keep arriving, the controller accepts the
    /// engine's evidence and reconciles back to `Playing`.
    pub async fn pause(&mut self) -> Result<(), ReadAloudError> {
        if self.state != PlaybackState::Playing {
            return Err(ReadAloudError::InvalidTransition {
                from: self.state.label(),
                command: "pause",
            });
        }
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return Err(ReadAloudError::InvalidTransition {
                from: self.state.label(),
                command: "pause",
            });
        };

        self.engine.pause(session_id).await;
        self.set_state(PlaybackState::Paused);
        Ok(())
    }

    /// Resume a paused utterance. Valid only from `Paused`.
    pub async fn resume(&mut self) -> Result<(), ReadAloudError> {
        if self.state != PlaybackState::Paused {
            return Err(ReadAloudError::InvalidTransition {
                from: self.state.label(),
                command: "resume",
            });
        }
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return Err(ReadAloudError::InvalidTransition {
                from: self.state.label(),
                command: "resume",
            });
        };

        self.engine.resume(session_id).await;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Stop playback and return to `Idle`.
    ///
    /// Valid from any state (a no-op from `Idle`). Cancels the engine
    /// session, resets the word index and progress, and clears the
    /// highlight. Late callbacks from the cancelled session are discarded
    /// by the session-id check.
    pub async fn stop(&mut self) {
        if self.state == PlaybackState::Idle {
            return;
        }
        self.teardown_session().await;
    }

    /// Skip forward by `n` words (seek emulation).
    pub async fn skip_forward(&mut self, n: usize) -> Result<(), ReadAloudError> {
        self.skip(i64::try_from(n).unwrap_or(i64::MAX)).await
    }

    /// Skip backward by `n` words (seek emulation).
    pub async fn skip_backward(&mut self, n: usize) -> Result<(), ReadAloudError> {
        self.skip(-i64::try_from(n).unwrap_or(i64::MAX)).await
    }

    /// Seek emulation: no engine can jump within an in-progress utterance,
    /// so the target index is computed, the session stopped, and synthesis
    /// restarted from the target token. Resume fidelity at phrase
    /// boundaries is best-effort — a documented approximation.
    async fn skip(&mut self, delta: i64) -> Result<(), ReadAloudError> {
        match self.state {
            PlaybackState::Requesting | PlaybackState::Playing | PlaybackState::Paused => {}
            from => {
                return Err(ReadAloudError::InvalidTransition {
                    from: from.label(),
                    command: "skip",
                });
            }
        }
        let token_count = self.content.as_ref().map_or(0, SegmentedContent::len);
        if token_count == 0 {
            return Err(ReadAloudError::NoContent);
        }

        let current = self
            .current_word
            .and_then(|i| i64::try_from(i).ok())
            .unwrap_or(-1);
        let max_index = i64::try_from(token_count - 1).unwrap_or(i64::MAX);
        let target = usize::try_from(current.saturating_add(delta).clamp(0, max_index)).unwrap_or(0);

        tracing::debug!(current, delta, target, "Skip — stop and restart at target");

        self.teardown_session().await;
        self.start_session(target).await
    }

    // ── Engine event handling ──────────────────────────────────────

    /// Consume one normalized engine event.
    ///
    /// This is the single entry point for all engine callbacks; the host's
    /// event pump feeds the backend's channel into it. Events whose session
    /// id does not match the active session are dropped silently with zero
    /// state mutation — they never reach the error-reporting path.
    pub fn handle_engine_event(&mut self, event: SynthesisEvent) {
        match event {
            SynthesisEvent::Boundary { session, word } => {
                if self.mark_callback(session) {
                    self.on_boundary(word);
                }
            }
            SynthesisEvent::Ended { session } => {
                if self.mark_callback(session) {
                    self.on_ended();
                }
            }
            SynthesisEvent::Failed { session, kind } => {
                if self.mark_callback(session) {
                    self.on_failed(kind);
                }
            }
            SynthesisEvent::PauseAcknowledged { session } => {
                if self.mark_callback(session) {
                    tracing::debug!(%session, "Pause acknowledged by engine");
                }
            }
            SynthesisEvent::ResumeAcknowledged { session } => {
                if self.mark_callback(session) {
                    tracing::debug!(%session, "Resume acknowledged by engine");
                }
            }
            SynthesisEvent::VoicesChanged => {
                tracing::info!("Engine voice list changed — cached lists are stale");
            }
        }
    }

    /// Validate an event's session id against the active session and record
    /// the callback for the watchdog. Returns `false` for stale events.
    fn mark_callback(&self, session: SessionId) -> bool {
        match self.session.as_ref() {
            Some(active) if active.id == session => {
                active.saw_callback.store(true, Ordering::SeqCst);
                true
            }
            _ => {
                tracing::trace!(%session, "Stale engine callback discarded");
                false
            }
        }
    }

    fn on_boundary(&mut self, word: usize) {
        let Some(active) = self.session.as_ref() else {
            return;
        };
        let absolute = active.start_index + word;

        match self.state {
            PlaybackState::Requesting => self.set_state(PlaybackState::Playing),
            PlaybackState::Paused => {
                // The engine kept speaking: the pause never took effect.
                // Its evidence outranks our optimistic flag.
                tracing::warn!("Boundary while nominally paused — reconciling to playing");
                self.set_state(PlaybackState::Playing);
            }
            PlaybackState::Playing => {}
            _ => {
                tracing::trace!(absolute, "Boundary in terminal state ignored");
                return;
            }
        }

        let token_count = self.content.as_ref().map_or(0, SegmentedContent::len);
        if absolute >= token_count {
            tracing::warn!(absolute, token_count, "Boundary beyond token range ignored");
            return;
        }

        // Within one session the index is strictly increasing; duplicates
        // and regressions are engine noise.
        if self.current_word.is_some_and(|current| absolute <= current) {
            tracing::trace!(absolute, "Non-advancing boundary ignored");
            return;
        }

        let previous = self.current_word;
        self.current_word = Some(absolute);
        self.progress_percent = progress_for(absolute, token_count);

        self.emit(PlaybackEvent::WordChanged {
            previous,
            current: Some(absolute),
        });
        self.emit(PlaybackEvent::Progress {
            percent: self.progress_percent,
        });
    }

    fn on_ended(&mut self) {
        self.session = None;
        self.progress_percent = 100.0;

        // Clear the highlight; the word index itself is retained until
        // Stop or a new session resets it.
        self.emit(PlaybackEvent::WordChanged {
            previous: self.current_word,
            current: None,
        });
        self.emit(PlaybackEvent::Progress { percent: 100.0 });
        self.set_state(PlaybackState::Completed);
        self.emit(PlaybackEvent::Completed);

        tracing::info!("Read-aloud playback completed");
    }

    fn on_failed(&mut self, kind: ErrorKind) {
        if kind == ErrorKind::Interrupted {
            // Expected consequence of stop/skip/content-change.
            tracing::debug!("Benign interruption reported by engine");
            return;
        }

        // The engine's speak request may still be outstanding (a
        // watchdog-injected failure means it never reported at all).
        // This handler is sync, so the cancel is deferred to the next
        // play/stop/teardown.
        self.pending_cancel = self.session.take().map(|s| s.id);
        self.emit(PlaybackEvent::WordChanged {
            previous: self.current_word,
            current: None,
        });
        self.set_state(PlaybackState::Error);
        self.emit(PlaybackEvent::Error {
            kind,
            message: kind.reason().to_string(),
        });

        tracing::warn!(?kind, "Playback halted on engine failure");
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Begin a new session voicing the token slice starting at `start`.
    async fn start_session(&mut self, start: usize) -> Result<(), ReadAloudError> {
        let Some(content) = self.content.as_ref() else {
            return Err(ReadAloudError::NoContent);
        };
        content.check(self.config.max_text_len)?;

        // Verify the selected voice still exists before committing.
        if let Some(voice_id) = self.voice.voice_id.clone() {
            let voices = self.engine.list_voices().await?;
            if !voices.iter().any(|v| v.id == voice_id) {
                return Err(ReadAloudError::VoiceUnavailable(voice_id));
            }
        }

        let start = start.min(content.len() - 1);
        let utterance = content.utterance_from(start);

        // A failed session's request can still be outstanding at the
        // engine; clear it before issuing a new speak.
        if let Some(stale) = self.pending_cancel.take() {
            self.engine.cancel(stale).await;
            tracing::debug!(session_id = %stale, "Stale failed session cancelled");
        }

        let session_id = SessionId(self.next_session_id);
        self.next_session_id += 1;

        let saw_callback = Arc::new(AtomicBool::new(false));
        self.session = Some(Session {
            id: session_id,
            start_index: start,
            saw_callback: Arc::clone(&saw_callback),
        });

        // A new session resets the word index and progress.
        if let Some(previous) = self.current_word.take() {
            self.emit(PlaybackEvent::WordChanged {
                previous: Some(previous),
                current: None,
            });
        }
        self.progress_percent = 0.0;

        tracing::info!(%session_id, start, "Requesting synthesis");
        self.set_state(PlaybackState::Requesting);

        let voice = self.voice.clone();
        if let Err(e) = self.engine.speak(session_id, &utterance, &voice).await {
            tracing::warn!(%session_id, error = %e, "Speak request refused by engine");
            self.session = None;
            let kind = e.kind();
            self.set_state(PlaybackState::Error);
            self.emit(PlaybackEvent::Error {
                kind,
                message: kind.reason().to_string(),
            });
            return Err(e);
        }

        self.spawn_watchdog(session_id, saw_callback);
        Ok(())
    }

    /// Arm the no-callback watchdog for a freshly issued `speak`.
    ///
    /// If the engine never calls back at all (no voices installed, dead
    /// host capability), an `EngineUnavailable` failure is injected through
    /// the normal event channel — stale-session filtering applies to it
    /// like to any engine event.
    fn spawn_watchdog(&self, session: SessionId, saw_callback: Arc<AtomicBool>) {
        let Some(timeout) = self.config.watchdog else {
            return;
        };
        let engine_tx = self.engine_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !saw_callback.load(Ordering::SeqCst) {
                tracing::warn!(%session, "No engine callback within watchdog window");
                let _ = engine_tx.send(SynthesisEvent::Failed {
                    session,
                    kind: ErrorKind::EngineUnavailable,
                });
            }
        });
    }

    /// Cancel the in-flight session (if any) and reset to `Idle`.
    async fn teardown_session(&mut self) {
        if let Some(stale) = self.pending_cancel.take() {
            self.engine.cancel(stale).await;
            tracing::debug!(session_id = %stale, "Stale failed session cancelled");
        }
        if let Some(session) = self.session.take() {
            self.engine.cancel(session.id).await;
            tracing::debug!(session_id = %session.id, "Session cancelled");
        }

        if let Some(previous) = self.current_word.take() {
            self.emit(PlaybackEvent::WordChanged {
                previous: Some(previous),
                current: None,
            });
        }
        self.progress_percent = 0.0;
        self.emit(PlaybackEvent::Progress { percent: 0.0 });
        self.set_state(PlaybackState::Idle);
    }

    /// Transition to a new state and emit a state-change event.
    fn set_state(&mut self, new_state: PlaybackState) {
        if self.state != new_state {
            tracing::debug!(old = ?self.state, new = ?new_state, "Playback state transition");
            self.state = new_state;
            self.emit(PlaybackEvent::StateChanged(new_state));
        }
    }

    /// Emit a playback event (best-effort — if the receiver is dropped, we
    /// log and move on).
    fn emit(&self, event: PlaybackEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::warn!("Playback event receiver dropped");
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Progress percentage after the word at `index` out of `token_count`.
#[allow(clippy::cast_precision_loss)] // progress % — sub-ulp precision not needed
fn progress_for(index: usize, token_count: usize) -> f64 {
    if token_count == 0 {
        return 0.0;
    }
    ((index + 1) as f64 / token_count as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::ScriptedBackend;

    fn controller() -> (
        PlaybackController,
        mpsc::UnboundedReceiver<PlaybackEvent>,
        mpsc::UnboundedReceiver<SynthesisEvent>,
    ) {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let backend = ScriptedBackend::new(engine_tx.clone());
        let (ctrl, event_rx) =
            PlaybackController::new(Box::new(backend), engine_tx, ControllerConfig::default());
        (ctrl, event_rx, engine_rx)
    }

    #[test]
    fn controller_creates_in_idle_state() {
        let (ctrl, _events, _engine) = controller();
        assert_eq!(ctrl.state(), PlaybackState::Idle);
        assert_eq!(ctrl.current_word_index(), None);
        assert!(ctrl.progress_percent().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn play_without_content_is_no_content() {
        let (mut ctrl, _events, _engine) = controller();
        let err = ctrl.play().await.unwrap_err();
        assert!(matches!(err, ReadAloudError::NoContent));
        assert_eq!(ctrl.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn pause_from_idle_is_invalid() {
        let (mut ctrl, _events, _engine) = controller();
        let err = ctrl.pause().await.unwrap_err();
        assert!(matches!(err, ReadAloudError::InvalidTransition { .. }));
    }

    #[test]
    fn progress_math() {
        assert!((progress_for(0, 2) - 50.0).abs() < f64::EPSILON);
        assert!((progress_for(1, 2) - 100.0).abs() < f64::EPSILON);
        assert!(progress_for(0, 0).abs() < f64::EPSILON);
    }
}
