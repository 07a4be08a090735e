//! Capture engine: a [`SoundEngine`] that turns voice lifecycle calls into
//! a command stream and an optional per-voice history.
//!
//! The browser host drains the commands and plays them on its own audio
//! graph. The offline planner reads the history to learn when every note
//! started and stopped, and with which parameters.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::EngineError;
use crate::params::SynthParams;
use crate::theory::Pitch;
use crate::voices::{ComponentId, SoundEngine, StopMode, VoiceHandle, VoiceLayout};

/// One instruction for the host's audio graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VoiceCommand {
    Start { voice: VoiceHandle, at: f64 },
    Stop { gate: ComponentId, pitch: Pitch, mode: StopMode, at: f64 },
    Dispose { component: ComponentId },
}

/// Lifetime of one captured voice.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedVoice {
    pub gate: ComponentId,
    pub pitch: Pitch,
    pub start: f64,
    pub stop: Option<(f64, StopMode)>,
    pub params: SynthParams,
}

impl CapturedVoice {
    /// Seconds between start and gate-off, if the voice was stopped.
    pub fn gate_time(&self) -> Option<f64> {
        self.stop.map(|(at, _)| at - self.start)
    }
}

#[derive(Debug, Default)]
pub struct CaptureEngine {
    next_id: u64,
    keep_history: bool,
    commands: Vec<VoiceCommand>,
    voices: Vec<CapturedVoice>,
    by_gate: HashMap<ComponentId, usize>,
    /// Components started and not yet disposed.
    live: HashSet<ComponentId>,
}

impl CaptureEngine {
    /// Records both the command stream and the voice history.
    pub fn new() -> Self {
        CaptureEngine {
            keep_history: true,
            ..Self::default()
        }
    }

    /// Records commands only; for long-running live sessions.
    pub fn streaming() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[VoiceCommand] {
        &self.commands
    }

    /// Take every command recorded since the last drain.
    pub fn drain_commands(&mut self) -> Vec<VoiceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Captured voices in start order.
    pub fn voices(&self) -> &[CapturedVoice] {
        &self.voices
    }

    pub fn into_voices(self) -> Vec<CapturedVoice> {
        self.voices
    }

    /// True once every component of `voice` has been disposed.
    pub fn is_disposed(&self, voice: &VoiceHandle) -> bool {
        voice.components().all(|c| !self.live.contains(&c))
    }

    /// Components started and not yet disposed.
    pub fn live_components(&self) -> usize {
        self.live.len()
    }
}

impl SoundEngine for CaptureEngine {
    fn start_voice(&mut self, pitch: Pitch, params: &SynthParams, at: f64) -> VoiceHandle {
        let voice = VoiceLayout::for_params(params).allocate(pitch, &mut self.next_id);
        self.live.extend(voice.components());
        if self.keep_history {
            self.by_gate.insert(voice.gate, self.voices.len());
            self.voices.push(CapturedVoice {
                gate: voice.gate,
                pitch,
                start: at,
                stop: None,
                params: params.clone(),
            });
        }
        self.commands.push(VoiceCommand::Start {
            voice: voice.clone(),
            at,
        });
        voice
    }

    fn stop_voice(&mut self, voice: &VoiceHandle, mode: StopMode, _params: &SynthParams, at: f64) {
        if let Some(&index) = self.by_gate.get(&voice.gate) {
            let captured = &mut self.voices[index];
            if captured.stop.is_none() {
                captured.stop = Some((at, mode));
            }
        }
        self.commands.push(VoiceCommand::Stop {
            gate: voice.gate,
            pitch: voice.pitch,
            mode,
            at,
        });
    }

    fn dispose(&mut self, component: ComponentId) -> Result<(), EngineError> {
        if component.0 == 0 || component.0 > self.next_id {
            return Err(EngineError::UnknownComponent(component));
        }
        if !self.live.remove(&component) {
            return Err(EngineError::AlreadyDisposed(component));
        }
        self.commands.push(VoiceCommand::Dispose { component });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_tracks_gate_time() {
        let mut engine = CaptureEngine::new();
        let params = SynthParams::default();
        let voice = engine.start_voice(60, &params, 1.0);
        engine.stop_voice(&voice, StopMode::Release, &params, 1.25);
        engine.stop_voice(&voice, StopMode::Immediate, &params, 2.0);

        let captured = &engine.voices()[0];
        assert_eq!(captured.pitch, 60);
        assert_eq!(captured.gate_time(), Some(0.25));
        assert_eq!(captured.stop, Some((1.25, StopMode::Release)));
    }

    #[test]
    fn dispose_reports_unknown_and_repeated_ids() {
        let mut engine = CaptureEngine::new();
        let voice = engine.start_voice(60, &SynthParams::default(), 0.0);
        assert_eq!(engine.dispose(voice.gate), Ok(()));
        assert_eq!(
            engine.dispose(voice.gate),
            Err(EngineError::AlreadyDisposed(voice.gate))
        );
        assert_eq!(
            engine.dispose(ComponentId(999)),
            Err(EngineError::UnknownComponent(ComponentId(999)))
        );
    }

    #[test]
    fn streaming_keeps_no_history() {
        let mut engine = CaptureEngine::streaming();
        engine.start_voice(60, &SynthParams::default(), 0.0);
        assert!(engine.voices().is_empty());
        assert_eq!(engine.drain_commands().len(), 1);
        assert!(engine.commands().is_empty());
    }

    #[test]
    fn long_streaming_session_stays_bounded() {
        use crate::config::SessionConfig;
        use crate::session::Session;

        let mut session = Session::new(CaptureEngine::streaming(), SessionConfig::default());
        for step in 0..crate::grid::NUM_STEPS {
            session.set_cell(7, step, true);
        }
        session.start_sequencer(0.0);

        let mut per_minute = Vec::new();
        for minute in 1..=10 {
            session.advance_to(minute as f64 * 60.0);
            assert!(!session.engine_mut().drain_commands().is_empty());
            per_minute.push(session.engine().live_components());
        }
        // Minute boundaries land on the same step phase, so the count of
        // undisposed components is identical each time.
        assert!(per_minute.iter().all(|&n| n == per_minute[0]), "{per_minute:?}");
        assert!(per_minute[0] < 100, "{per_minute:?}");
    }

    #[test]
    fn disposing_every_component_empties_the_live_set() {
        let mut engine = CaptureEngine::streaming();
        let voice = engine.start_voice(60, &SynthParams::default(), 0.0);
        assert!(engine.live_components() > 0);
        for component in voice.components() {
            engine.dispose(component).unwrap();
        }
        assert_eq!(engine.live_components(), 0);
        assert!(engine.is_disposed(&voice));
    }

    #[test]
    fn commands_serialize_with_a_type_tag() {
        let mut engine = CaptureEngine::streaming();
        engine.start_voice(60, &SynthParams::default(), 0.5);
        let json = serde_json::to_string(engine.commands()).unwrap();
        assert!(json.contains("\"type\":\"start\""), "{json}");
        assert!(json.contains("\"pitch\":60"), "{json}");
    }
}
