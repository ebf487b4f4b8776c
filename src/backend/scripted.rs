//! Scripted synthesis backend — a deterministic, timer-paced engine.
//!
//! Emits one boundary event per word at a cadence derived from the
//! configured word interval and the session's rate multiplier. No audio is
//! produced; the backend exists for hosts without a platform speech engine
//! (rendering a silent "karaoke" pass over the content) and for exercising
//! the controller in tests and demos.
//!
//! Pause support is configurable: with it disabled, `pause()` is accepted
//! but boundaries keep flowing — exactly the behavior of engines that
//! silently no-op on pause, which the controller must reconcile against.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::backend::{
    SessionId, SynthesisBackend, SynthesisEvent, VoiceConfig, VoiceInfo, voice_info,
};
use crate::error::ReadAloudError;

/// Default cadence per word at rate 1.0 (~160 wpm).
const DEFAULT_WORD_INTERVAL: Duration = Duration::from_millis(375);

/// Poll interval while an utterance is paused.
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Flags shared between the backend and the utterance task it spawned.
#[derive(Debug, Default)]
struct UtteranceFlags {
    paused: AtomicBool,
    cancelled: AtomicBool,
    finished: AtomicBool,
}

/// Handle to the in-flight utterance, if any.
#[derive(Debug)]
struct ActiveUtterance {
    session: SessionId,
    flags: Arc<UtteranceFlags>,
}

/// Deterministic scripted speech engine.
pub struct ScriptedBackend {
    event_tx: mpsc::UnboundedSender<SynthesisEvent>,
    voices: Vec<VoiceInfo>,
    supports_pause: bool,
    word_interval: Duration,
    active: Option<ActiveUtterance>,
}

impl ScriptedBackend {
    /// Create a scripted backend emitting events into `event_tx`.
    #[must_use]
    pub fn new(event_tx: mpsc::UnboundedSender<SynthesisEvent>) -> Self {
        Self {
            event_tx,
            voices: default_voices(),
            supports_pause: true,
            word_interval: DEFAULT_WORD_INTERVAL,
            active: None,
        }
    }

    /// Configure whether `pause`/`resume` take effect.
    ///
    /// With pause support off, pause requests are accepted silently and
    /// boundary events continue — modeling engines that cannot pause
    /// mid-utterance.
    #[must_use]
    pub const fn with_pause_support(mut self, supported: bool) -> Self {
        self.supports_pause = supported;
        self
    }

    /// Override the per-word cadence (scaled by the session rate).
    #[must_use]
    pub const fn with_word_interval(mut self, interval: Duration) -> Self {
        self.word_interval = interval;
        self
    }

    /// Replace the advertised voice list.
    #[must_use]
    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }

    /// Whether an utterance is currently in flight.
    fn speak_in_flight(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.flags.finished.load(Ordering::SeqCst))
    }
}

#[async_trait::async_trait]
impl SynthesisBackend for ScriptedBackend {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ReadAloudError> {
        Ok(self.voices.clone())
    }

    async fn speak(
        &mut self,
        session: SessionId,
        text: &str,
        config: &VoiceConfig,
    ) -> Result<(), ReadAloudError> {
        if self.speak_in_flight() {
            return Err(ReadAloudError::SpeakInFlight);
        }

        let word_count = text.split_whitespace().count();
        let interval = self.word_interval.div_f32(config.rate.clamp(0.5, 2.0));

        tracing::debug!(%session, word_count, ?interval, "Scripted utterance starting");

        let flags = Arc::new(UtteranceFlags::default());
        self.active = Some(ActiveUtterance {
            session,
            flags: Arc::clone(&flags),
        });

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            for word in 0..word_count {
                // Honor pause before each boundary.
                while flags.paused.load(Ordering::SeqCst) {
                    if flags.cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                    tokio::time::sleep(PAUSE_POLL).await;
                }
                if flags.cancelled.load(Ordering::SeqCst) {
                    return;
                }

                if event_tx
                    .send(SynthesisEvent::Boundary { session, word })
                    .is_err()
                {
                    return; // receiver dropped — engine torn down
                }

                tokio::time::sleep(interval).await;
            }

            if !flags.cancelled.load(Ordering::SeqCst) {
                flags.finished.store(true, Ordering::SeqCst);
                let _ = event_tx.send(SynthesisEvent::Ended { session });
            }
        });

        Ok(())
    }

    async fn pause(&mut self, session: SessionId) {
        let Some(active) = self.active.as_ref().filter(|a| a.session == session) else {
            return;
        };
        if !self.supports_pause {
            tracing::debug!(%session, "Pause requested but unsupported — ignoring");
            return;
        }
        active.flags.paused.store(true, Ordering::SeqCst);
        let _ = self
            .event_tx
            .send(SynthesisEvent::PauseAcknowledged { session });
    }

    async fn resume(&mut self, session: SessionId) {
        let Some(active) = self.active.as_ref().filter(|a| a.session == session) else {
            return;
        };
        if !self.supports_pause {
            return;
        }
        active.flags.paused.store(false, Ordering::SeqCst);
        let _ = self
            .event_tx
            .send(SynthesisEvent::ResumeAcknowledged { session });
    }

    async fn cancel(&mut self, session: SessionId) {
        if let Some(active) = self.active.take() {
            if active.session == session {
                active.flags.cancelled.store(true, Ordering::SeqCst);
                active.flags.finished.store(true, Ordering::SeqCst);
                tracing::debug!(%session, "Scripted utterance cancelled");
            } else {
                // Cancel for a different session — keep the current one.
                self.active = Some(active);
            }
        }
    }
}

/// The voices the scripted engine advertises by default.
fn default_voices() -> Vec<VoiceInfo> {
    vec![
        voice_info("scripted_en_f", "Scripted English (female)", "en-US"),
        voice_info("scripted_en_m", "Scripted English (male)", "en-US"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn backend() -> (ScriptedBackend, mpsc::UnboundedReceiver<SynthesisEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = ScriptedBackend::new(tx).with_word_interval(Duration::from_millis(5));
        (backend, rx)
    }

    #[tokio::test]
    async fn emits_boundaries_in_order_then_ends() {
        let (mut backend, mut rx) = backend();
        let session = SessionId(1);
        backend
            .speak(session, "one two three", &VoiceConfig::default())
            .await
            .unwrap();

        let mut words = Vec::new();
        loop {
            match rx.recv().await.expect("event stream open") {
                SynthesisEvent::Boundary { session: s, word } => {
                    assert_eq!(s, session);
                    words.push(word);
                }
                SynthesisEvent::Ended { session: s } => {
                    assert_eq!(s, session);
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(words, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn second_speak_while_in_flight_is_rejected() {
        let (mut backend, _rx) = backend();
        backend
            .speak(SessionId(1), "a long enough utterance", &VoiceConfig::default())
            .await
            .unwrap();

        let err = backend
            .speak(SessionId(2), "another", &VoiceConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReadAloudError::SpeakInFlight));
    }

    #[tokio::test]
    async fn cancel_frees_the_engine_for_a_new_speak() {
        let (mut backend, _rx) = backend();
        let first = SessionId(1);
        backend
            .speak(first, "one two three four five", &VoiceConfig::default())
            .await
            .unwrap();
        backend.cancel(first).await;

        tokio_test::assert_ok!(
            backend
                .speak(SessionId(2), "fresh", &VoiceConfig::default())
                .await
        );
    }

    #[tokio::test]
    async fn unsupported_pause_keeps_boundaries_flowing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = ScriptedBackend::new(tx)
            .with_word_interval(Duration::from_millis(5))
            .with_pause_support(false);

        let session = SessionId(7);
        backend
            .speak(session, "alpha beta gamma", &VoiceConfig::default())
            .await
            .unwrap();
        backend.pause(session).await;

        // No ack, and the stream still runs to completion.
        let mut saw_end = false;
        while let Some(event) = rx.recv().await {
            match event {
                SynthesisEvent::PauseAcknowledged { .. } => {
                    panic!("no ack expected when pause is unsupported")
                }
                SynthesisEvent::Ended { .. } => {
                    saw_end = true;
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_end);
    }
}
