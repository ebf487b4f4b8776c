//! Read-aloud error types.

use serde::{Deserialize, Serialize};

/// Errors that can occur in the read-aloud engine.
#[derive(Debug, thiserror::Error)]
pub enum ReadAloudError {
    /// Content is empty or contains no speakable text.
    #[error("No speakable text in the loaded content")]
    NoContent,

    /// Extractable text exceeds the engine's utterance ceiling.
    #[error("Content text is too large for the speech engine ({len} chars, ceiling {max})")]
    ContentTooLarge { len: usize, max: usize },

    /// No speech synthesis capability is available on the host.
    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The selected voice is no longer present in the engine's voice list.
    #[error("Voice '{0}' is not available")]
    VoiceUnavailable(String),

    /// Synthesis was interrupted by an intentional stop, skip, or content
    /// change. Benign — swallowed internally, never surfaced to the host.
    #[error("Synthesis interrupted")]
    Interrupted,

    /// A command was issued from a state that does not permit it.
    #[error("Cannot {command} while {from}")]
    InvalidTransition {
        from: &'static str,
        command: &'static str,
    },

    /// A `speak` request was issued while another is still outstanding.
    ///
    /// This is an adapter-layer error: the controller is responsible for
    /// cancelling the prior session before starting a new one.
    #[error("A speak request is already in flight")]
    SpeakInFlight,

    /// Opaque engine-specific failure.
    #[error("Speech engine error: {0}")]
    Unknown(String),
}

impl ReadAloudError {
    /// Classify this error into the wire-level [`ErrorKind`] carried by
    /// events and surfaced to the host UI.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoContent => ErrorKind::NoContent,
            Self::ContentTooLarge { .. } => ErrorKind::ContentTooLarge,
            Self::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Self::VoiceUnavailable(_) => ErrorKind::VoiceUnavailable,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::InvalidTransition { .. } | Self::SpeakInFlight | Self::Unknown(_) => {
                ErrorKind::Unknown
            }
        }
    }
}

/// Compact error classification carried in synthesis events and
/// host-facing error notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Nothing speakable was loaded.
    NoContent,

    /// Text exceeds the engine's utterance ceiling.
    ContentTooLarge,

    /// No synthesis capability on the host (or the engine never called back).
    EngineUnavailable,

    /// Selected voice disappeared (voice list changed).
    VoiceUnavailable,

    /// Intentional stop/skip/content-change — never a user-facing failure.
    Interrupted,

    /// Opaque engine-specific failure.
    Unknown,
}

impl ErrorKind {
    /// Human-readable reason for host UI error surfaces.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NoContent => "there is no readable text in this section",
            Self::ContentTooLarge => "this section is too long for the speech engine",
            Self::EngineUnavailable => "speech synthesis is not available on this device",
            Self::VoiceUnavailable => "the selected voice is no longer available",
            Self::Interrupted => "playback was interrupted",
            Self::Unknown => "the speech engine reported an error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification_covers_taxonomy() {
        assert_eq!(ReadAloudError::NoContent.kind(), ErrorKind::NoContent);
        assert_eq!(
            ReadAloudError::ContentTooLarge { len: 40_000, max: 32_767 }.kind(),
            ErrorKind::ContentTooLarge
        );
        assert_eq!(
            ReadAloudError::VoiceUnavailable("af_sky".into()).kind(),
            ErrorKind::VoiceUnavailable
        );
        assert_eq!(ReadAloudError::Interrupted.kind(), ErrorKind::Interrupted);
        assert_eq!(ReadAloudError::SpeakInFlight.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn messages_are_human_readable() {
        let err = ReadAloudError::ContentTooLarge { len: 40_000, max: 32_767 };
        let msg = err.to_string();
        assert!(msg.contains("40000"));
        assert!(msg.contains("32767"));
    }
}
