//! Debounce guard — absorbs duplicate and rapid-fire transport commands.
//!
//! Every mutating playback command passes through the guard before it
//! reaches the controller. A command arriving before its per-command-type
//! cooldown has elapsed is **dropped** — never queued, never retried. This
//! is the only backpressure mechanism in the engine.
//!
//! The guard is driven by an injectable [`Clock`] so tests can exercise the
//! cooldown windows without real wall-clock delays.

use std::time::{Duration, Instant};

// ── Clock abstraction ──────────────────────────────────────────────

/// Monotonic time source for the guard.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The production clock — `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ── Command classification ─────────────────────────────────────────

/// The mutating transport commands subject to debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Play,
    Pause,
    Resume,
    Stop,
    Skip,
}

impl CommandKind {
    const COUNT: usize = 5;

    const fn slot(self) -> usize {
        match self {
            Self::Play => 0,
            Self::Pause => 1,
            Self::Resume => 2,
            Self::Stop => 3,
            Self::Skip => 4,
        }
    }

    /// Lower-case label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Skip => "skip",
        }
    }
}

// ── Cooldown configuration ─────────────────────────────────────────

/// Per-command cooldown windows.
///
/// Stop and Skip get shorter windows than Play/Pause/Resume: stopping must
/// stay responsive, and skips are expected to arrive in bursts.
#[derive(Debug, Clone, Copy)]
pub struct Cooldowns {
    pub play: Duration,
    pub pause: Duration,
    pub resume: Duration,
    pub stop: Duration,
    pub skip: Duration,
}

impl Default for Cooldowns {
    fn default() -> Self {
        Self {
            play: Duration::from_millis(300),
            pause: Duration::from_millis(300),
            resume: Duration::from_millis(300),
            stop: Duration::from_millis(150),
            skip: Duration::from_millis(150),
        }
    }
}

impl Cooldowns {
    const fn for_kind(&self, kind: CommandKind) -> Duration {
        match kind {
            CommandKind::Play => self.play,
            CommandKind::Pause => self.pause,
            CommandKind::Resume => self.resume,
            CommandKind::Stop => self.stop,
            CommandKind::Skip => self.skip,
        }
    }
}

// ── Guard ──────────────────────────────────────────────────────────

/// Per-command-type cooldown tracker.
pub struct DebounceGuard {
    clock: Box<dyn Clock>,
    cooldowns: Cooldowns,
    last_admitted: [Option<Instant>; CommandKind::COUNT],
}

impl DebounceGuard {
    /// Create a guard with default cooldowns and the production clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Box::new(MonotonicClock), Cooldowns::default())
    }

    /// Create a guard with an injected clock and explicit cooldowns.
    #[must_use]
    pub fn with_clock(clock: Box<dyn Clock>, cooldowns: Cooldowns) -> Self {
        Self {
            clock,
            cooldowns,
            last_admitted: [None; CommandKind::COUNT],
        }
    }

    /// Decide whether a command may proceed.
    ///
    /// Returns `true` and records the admission time if the command's
    /// cooldown has elapsed (or it has never been admitted); returns `false`
    /// otherwise. Rejected commands leave the recorded admission time
    /// untouched, so a burst of rejections does not extend the window.
    pub fn admit(&mut self, kind: CommandKind) -> bool {
        let now = self.clock.now();
        let slot = kind.slot();
        let window = self.cooldowns.for_kind(kind);

        if let Some(last) = self.last_admitted[slot] {
            if now.duration_since(last) < window {
                tracing::debug!(command = kind.label(), "Command debounced — dropped");
                return false;
            }
        }

        self.last_admitted[slot] = Some(now);
        true
    }
}

impl Default for DebounceGuard {
    fn default() -> Self {
        Self::new()
    }
}
