//! Speech engine backend traits — engine-agnostic synthesis interface.
//!
//! This module defines the [`SynthesisBackend`] trait that abstracts over
//! concrete host speech capabilities (platform TTS services, browser speech
//! synthesis bridged over IPC, test doubles). The
//! [`PlaybackController`](crate::controller::PlaybackController) operates on
//! a trait object (`Box<dyn SynthesisBackend>`) so engines can be swapped
//! without touching the state machine.
//!
//! Backends never call into the controller directly. They normalize the
//! engine's asynchronous callbacks into [`SynthesisEvent`]s and push them
//! through the `mpsc` sender handed to them at construction; every event is
//! tagged with the [`SessionId`] of the originating `speak` request so the
//! controller can discard stale deliveries.

pub mod scripted;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ReadAloudError};

// ── Shared types ───────────────────────────────────────────────────

/// Identifier for one continuous playback session.
///
/// Allocated monotonically by the controller per `speak` request. Engine
/// callbacks carry the id of the request that produced them; anything
/// tagged with a non-current id is dropped without state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Information about an available voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Voice identifier (used in synthesis requests).
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// BCP-47 language tag (e.g. `"en-US"`).
    pub language: String,
}

/// Normalized events emitted by a synthesis backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// Synthesis reached a new word. `word` is relative to the utterance
    /// passed to `speak` — the controller offsets it by the session's start
    /// index.
    Boundary { session: SessionId, word: usize },

    /// The utterance finished naturally.
    Ended { session: SessionId },

    /// The engine reported a failure for this session.
    Failed { session: SessionId, kind: ErrorKind },

    /// The engine acknowledged a pause request (optional — many engines
    /// never send one).
    PauseAcknowledged { session: SessionId },

    /// The engine acknowledged a resume request (optional).
    ResumeAcknowledged { session: SessionId },

    /// The host's voice list changed; cached voice lists must be re-queried.
    VoicesChanged,
}

// ── Synthesis backend trait ────────────────────────────────────────

/// Backend-agnostic speech synthesis engine.
///
/// Implementations must be `Send + Sync` so the controller can hold them
/// across `.await` points behind a `tokio::sync::RwLock`.
///
/// # Contract
///
/// - At most one `speak` request may be outstanding at a time. Issuing a
///   second one before the first ends, fails, or is cancelled is an error
///   **at this layer** ([`ReadAloudError::SpeakInFlight`]) — the controller
///   is responsible for cancelling first.
/// - `pause` and `resume` are best-effort. Implementations must not block
///   waiting for an acknowledgement; engines that cannot pause mid-utterance
///   simply keep emitting boundaries.
/// - After `cancel`, any callbacks the engine still emits must remain tagged
///   with the cancelled [`SessionId`].
#[async_trait::async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// List the voices currently available on the host.
    ///
    /// May be lazy or asynchronous on the engine side; callers re-query
    /// after a [`SynthesisEvent::VoicesChanged`].
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ReadAloudError>;

    /// Start synthesizing `text`, emitting events tagged with `session`.
    async fn speak(
        &mut self,
        session: SessionId,
        text: &str,
        config: &VoiceConfig,
    ) -> Result<(), ReadAloudError>;

    /// Request a pause of the in-flight utterance. Best-effort.
    async fn pause(&mut self, session: SessionId);

    /// Request a resume of a paused utterance. Best-effort.
    async fn resume(&mut self, session: SessionId);

    /// Request immediate termination of the in-flight utterance.
    async fn cancel(&mut self, session: SessionId);
}

// ── Voice configuration ────────────────────────────────────────────

/// Engine-agnostic voice configuration.
///
/// A snapshot of this struct is taken per playback session so that setting
/// changes mid-utterance apply from the next session onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// Selected voice id, or `None` for the engine default.
    pub voice_id: Option<String>,

    /// Speech rate multiplier (0.5–2.0, default 1.0).
    pub rate: f32,

    /// Pitch (0.0–2.0, default 1.0).
    pub pitch: f32,

    /// Volume (0.0–1.0, default 1.0).
    pub volume: f32,

    /// BCP-47 language tag used when no voice is selected.
    pub language: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            language: "en-US".to_string(),
        }
    }
}

impl VoiceConfig {
    /// Set the speech rate, clamped to the supported 0.5–2.0 range.
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.5, 2.0);
    }

    /// Set the pitch, clamped to 0.0–2.0.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(0.0, 2.0);
    }

    /// Set the volume, clamped to 0.0–1.0.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Convenience constructor for [`VoiceInfo`].
pub(crate) fn voice_info(id: &str, name: &str, language: &str) -> VoiceInfo {
    VoiceInfo {
        id: id.to_string(),
        name: name.to_string(),
        language: language.to_string(),
    }
}
