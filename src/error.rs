use crate::voices::ComponentId;
use std::fmt;

/// A user action the synth refused, or input it could not read.
///
/// Every variant is recoverable: the session state is unchanged when one of
/// these is returned.
#[derive(Debug)]
pub enum SynthError {
    /// Song playback was requested with no saved patterns.
    NoPatterns,
    /// The action is not allowed while a song is playing.
    SongPlaying,
    /// A pattern index outside the saved list.
    PatternIndex { index: usize, len: usize },
    /// Offline export found no notes anywhere in the song.
    NothingToRender,
    /// Malformed JSON for a patch, song, or config.
    Json(serde_json::Error),
}

/// Failure reported by a [`SoundEngine`](crate::voices::SoundEngine) while
/// tearing a voice down. The voice registry swallows these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    UnknownComponent(ComponentId),
    AlreadyDisposed(ComponentId),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::NoPatterns => write!(f, "No patterns saved to play."),
            SynthError::SongPlaying => {
                write!(f, "Song playback is active. Stop the song first.")
            }
            SynthError::PatternIndex { index, len } => {
                write!(f, "Pattern {index} does not exist ({len} saved)")
            }
            SynthError::NothingToRender => write!(f, "No notes or patterns to record."),
            SynthError::Json(e) => write!(f, "Invalid JSON: {e}"),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownComponent(id) => write!(f, "Unknown component {}", id.0),
            EngineError::AlreadyDisposed(id) => write!(f, "Component {} already disposed", id.0),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<serde_json::Error> for SynthError {
    fn from(e: serde_json::Error) -> Self {
        SynthError::Json(e)
    }
}
