//! Synchronized read-aloud playback engine.
//!
//! Drives an external, callback-driven text-to-speech capability to voice
//! rich-text content while tracking the word currently being spoken, and
//! exposes transport controls (play/pause/resume/stop/skip) to a host UI.
//!
//! The engine is entirely in-memory and session-scoped: one content
//! document at a time, one playback session in flight at a time. The
//! speech engine itself is an external collaborator behind the
//! [`SynthesisBackend`] trait — its asynchronous callbacks are normalized
//! into [`SynthesisEvent`]s, tagged with the session that issued them, and
//! consumed by the [`PlaybackController`] state machine. Stale callbacks
//! from cancelled sessions are discarded unconditionally.
//!
//! ```no_run
//! use readaloud::{ControllerConfig, ReadAloudService, ScriptedBackend};
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), readaloud::ReadAloudError> {
//! let (engine_tx, engine_rx) = mpsc::unbounded_channel();
//! let engine = ScriptedBackend::new(engine_tx.clone());
//! let (service, mut events) = ReadAloudService::new(
//!     Box::new(engine),
//!     engine_tx,
//!     engine_rx,
//!     ControllerConfig::default(),
//! );
//!
//! service.set_content("<p>Hello world</p>").await?;
//! service.play().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod highlight;
pub mod segment;
pub mod service;

// Re-export key types for convenience
pub use backend::scripted::ScriptedBackend;
pub use backend::{SessionId, SynthesisBackend, SynthesisEvent, VoiceConfig, VoiceInfo};
pub use controller::{ControllerConfig, PlaybackController, PlaybackEvent, PlaybackState};
pub use debounce::{Clock, CommandKind, Cooldowns, DebounceGuard, MonotonicClock};
pub use error::{ErrorKind, ReadAloudError};
pub use highlight::{HighlightRenderer, HighlightSettings, HighlightStyle, HighlightSurface};
pub use segment::{SegmentedContent, WordToken, segment};
pub use service::{
    AccessibilitySettings, HighlightEventSink, PlaybackEventSink, PlaybackStatus,
    PlayerControlsConfig, ReadAloudService, spawn_event_bridge,
};
