//! Session and render configuration.

use serde::{Deserialize, Serialize};

use crate::error::SynthError;
use crate::grid::Articulation;

/// What the clock does on the tick that swaps in the next song pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapTiming {
    /// Load the pattern and play its step 0 on the same tick. Patterns sit
    /// back to back, 16 steps each.
    #[default]
    Immediate,
    /// Load the pattern and return; its step 0 plays on the following tick,
    /// one step later.
    SkipSwapTick,
}

/// Controls how the engine determines the length of an offline render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndMode {
    /// Cut at the end of the last pattern.
    #[default]
    Gate,
    /// Wait for every release tail to finish.
    Release,
    /// Wait for release tails plus the delay line to ring out.
    Tail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub swap_timing: SwapTiming,
    pub articulation: Articulation,
    /// Drop queued arp sub-steps and gate-offs when playback stops.
    pub cancel_pending_on_stop: bool,
    /// Seed for random arp order and grid randomize; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            swap_timing: SwapTiming::Immediate,
            articulation: Articulation::Staccato,
            cancel_pending_on_stop: true,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, SynthError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub end_mode: EndMode,
    /// Seed for the replayed session and the noise generators, so the same
    /// song always renders the same way.
    pub seed: u64,
    pub max_voices: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            sample_rate: 44100,
            end_mode: EndMode::Gate,
            seed: 0x5EED,
            max_voices: 64,
        }
    }
}

impl RenderConfig {
    pub fn from_json(json: &str) -> Result<Self, SynthError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configuration an offline replay of `live` runs under: same clock
    /// and articulation, fixed seed.
    pub fn replay_config(&self, live: &SessionConfig) -> SessionConfig {
        SessionConfig {
            swap_timing: live.swap_timing,
            articulation: live.articulation,
            cancel_pending_on_stop: true,
            seed: Some(self.seed),
        }
    }
}
