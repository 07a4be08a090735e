//! Voice lifecycle: which sound-producing instances are active per pitch,
//! and the rules for starting, releasing, and disposing them.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::params::SynthParams;
use crate::theory::Pitch;

/// Gate fade used for an immediate (force) stop.
pub const IMMEDIATE_FADE: f64 = 0.01;
/// Extra time allowed past the release setting before a released voice is
/// considered silent.
pub const RELEASE_MARGIN: f64 = 0.5;
/// Delay between the end of the fade and disposal of the components.
pub const DISPOSE_GRACE: f64 = 0.1;

/// Opaque id of one engine-side component (gate, oscillator, LFO, noise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

/// Everything started together for one note. The gate is always present;
/// the sources exist only when the patch turns them on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceHandle {
    pub pitch: Pitch,
    pub gate: ComponentId,
    pub osc_a: Option<ComponentId>,
    pub osc_b: Option<ComponentId>,
    pub lfo: Option<ComponentId>,
    pub noise: Option<ComponentId>,
}

impl VoiceHandle {
    /// Sources first, gate last.
    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        [self.osc_a, self.osc_b, self.lfo, self.noise]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.gate))
    }
}

/// Which optional components a patch needs per voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceLayout {
    pub osc_a: bool,
    pub osc_b: bool,
    pub lfo: bool,
    pub noise: bool,
}

impl VoiceLayout {
    pub fn for_params(params: &SynthParams) -> Self {
        let osc_a = params.vco1_level > 0.0;
        let osc_b = params.vco2_level > 0.0;
        VoiceLayout {
            osc_a,
            osc_b,
            lfo: (osc_a && params.lfo_vco1_depth > 0.0) || (osc_b && params.lfo_vco2_depth > 0.0),
            noise: params.noise_level > 0.0,
        }
    }

    /// Build a handle, drawing fresh ids from `next_id`.
    pub fn allocate(&self, pitch: Pitch, next_id: &mut u64) -> VoiceHandle {
        let mut take = |wanted: bool| {
            wanted.then(|| {
                *next_id += 1;
                ComponentId(*next_id)
            })
        };
        let osc_a = take(self.osc_a);
        let osc_b = take(self.osc_b);
        let lfo = take(self.lfo);
        let noise = take(self.noise);
        *next_id += 1;
        VoiceHandle {
            pitch,
            gate: ComponentId(*next_id),
            osc_a,
            osc_b,
            lfo,
            noise,
        }
    }
}

/// How a voice's gate closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Follow the patch's release curve.
    Release,
    /// Drop the gate to zero at once.
    Immediate,
}

impl StopMode {
    /// Seconds from the stop until the voice is silent.
    pub fn fade_time(&self, release: f64) -> f64 {
        match self {
            StopMode::Release => release + RELEASE_MARGIN,
            StopMode::Immediate => IMMEDIATE_FADE,
        }
    }
}

/// The synthesis back end the voice registry drives.
///
/// Implementations must support many concurrent voices. Times are absolute
/// seconds on the caller's clock.
pub trait SoundEngine {
    /// Begin a note using the timbre and envelope in `params`.
    fn start_voice(&mut self, pitch: Pitch, params: &SynthParams, at: f64) -> VoiceHandle;

    /// Close the voice's gate.
    fn stop_voice(&mut self, voice: &VoiceHandle, mode: StopMode, params: &SynthParams, at: f64);

    /// Free one component. Disposing twice is reported, never fatal.
    fn dispose(&mut self, component: ComponentId) -> Result<(), EngineError>;
}

/// A released voice whose components should be freed at `at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Disposal {
    pub at: f64,
    pub voice: VoiceHandle,
}

/// Free every component of `voice`, ignoring ones already gone.
pub fn dispose_voice<E: SoundEngine>(engine: &mut E, voice: &VoiceHandle) {
    for component in voice.components() {
        if let Err(e) = engine.dispose(component) {
            log::trace!("ignoring disposal failure: {e}");
        }
    }
}

/// Active voices keyed by pitch, oldest first.
///
/// A pitch may hold several voices while earlier ones are still in their
/// release tail; `stop` always consumes the oldest.
#[derive(Debug, Default)]
pub struct VoiceRegistry {
    active: BTreeMap<Pitch, VecDeque<VoiceHandle>>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a voice for `pitch`, force-stopping any already registered.
    ///
    /// Returns the disposals for the voices cut off.
    pub fn start<E: SoundEngine>(
        &mut self,
        engine: &mut E,
        pitch: Pitch,
        params: &SynthParams,
        at: f64,
    ) -> Vec<Disposal> {
        let mut disposals = Vec::new();
        while let Some(d) = self.stop(engine, pitch, StopMode::Immediate, params, at) {
            disposals.push(d);
        }

        let voice = engine.start_voice(pitch, params, at);
        log::trace!("voice on {pitch} at {at:.4}");
        self.active.entry(pitch).or_default().push_back(voice);
        disposals
    }

    /// Release the oldest voice for `pitch`. No-op when none is registered.
    pub fn stop<E: SoundEngine>(
        &mut self,
        engine: &mut E,
        pitch: Pitch,
        mode: StopMode,
        params: &SynthParams,
        at: f64,
    ) -> Option<Disposal> {
        let queue = self.active.get_mut(&pitch)?;
        let voice = queue.pop_front()?;
        if queue.is_empty() {
            self.active.remove(&pitch);
        }

        engine.stop_voice(&voice, mode, params, at);
        log::trace!("voice off {pitch} at {at:.4} ({mode:?})");
        Some(Disposal {
            at: at + mode.fade_time(params.release_time()) + DISPOSE_GRACE,
            voice,
        })
    }

    /// Release every registered voice, lowest pitch first.
    pub fn stop_all<E: SoundEngine>(
        &mut self,
        engine: &mut E,
        mode: StopMode,
        params: &SynthParams,
        at: f64,
    ) -> Vec<Disposal> {
        let pitches: Vec<Pitch> = self.active.keys().copied().collect();
        let mut disposals = Vec::new();
        for pitch in pitches {
            while let Some(d) = self.stop(engine, pitch, mode, params, at) {
                disposals.push(d);
            }
        }
        disposals
    }

    /// Registered voices for `pitch`.
    pub fn count(&self, pitch: Pitch) -> usize {
        self.active.get(&pitch).map_or(0, |q| q.len())
    }

    pub fn voices(&self, pitch: Pitch) -> impl Iterator<Item = &VoiceHandle> {
        self.active.get(&pitch).into_iter().flatten()
    }

    /// Pitches with at least one voice, ascending.
    pub fn pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.active.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureEngine, VoiceCommand};

    fn params() -> SynthParams {
        SynthParams::default()
    }

    #[test]
    fn layout_follows_levels() {
        let mut p = params();
        p.vco2_level = 0.0;
        p.noise_level = 0.2;
        p.lfo_vco1_depth = 0.5;
        let layout = VoiceLayout::for_params(&p);
        assert!(layout.osc_a && !layout.osc_b && layout.lfo && layout.noise);

        let mut next = 0;
        let voice = layout.allocate(60, &mut next);
        assert!(voice.osc_b.is_none());
        assert_eq!(voice.components().count(), 4);
        assert_eq!(voice.components().last(), Some(voice.gate));
    }

    #[test]
    fn start_stop_start_leaves_one_voice() {
        let mut engine = CaptureEngine::new();
        let mut reg = VoiceRegistry::new();
        let p = params();

        reg.start(&mut engine, 60, &p, 0.0);
        reg.stop(&mut engine, 60, StopMode::Release, &p, 0.1);
        reg.start(&mut engine, 60, &p, 0.2);
        assert_eq!(reg.count(60), 1);
        assert_eq!(engine.voices().len(), 2);
        assert_eq!(reg.voices(60).next().map(|v| v.gate), Some(engine.voices()[1].gate));
    }

    #[test]
    fn retrigger_force_stops_the_sounding_voice() {
        let mut engine = CaptureEngine::new();
        let mut reg = VoiceRegistry::new();
        let p = params();

        reg.start(&mut engine, 64, &p, 0.0);
        let cut = reg.start(&mut engine, 64, &p, 0.05);
        assert_eq!(cut.len(), 1);
        assert!((cut[0].at - (0.05 + IMMEDIATE_FADE + DISPOSE_GRACE)).abs() < 1e-12);
        assert_eq!(reg.count(64), 1);

        let stops: Vec<_> = engine
            .commands()
            .iter()
            .filter(|c| matches!(c, VoiceCommand::Stop { .. }))
            .collect();
        assert_eq!(stops.len(), 1);
        assert!(matches!(stops[0], VoiceCommand::Stop { mode: StopMode::Immediate, .. }));
    }

    #[test]
    fn stop_without_voice_is_a_no_op() {
        let mut engine = CaptureEngine::new();
        let mut reg = VoiceRegistry::new();
        assert!(reg.stop(&mut engine, 61, StopMode::Release, &params(), 0.0).is_none());
        assert!(engine.commands().is_empty());
    }

    #[test]
    fn release_disposal_waits_for_the_tail() {
        let mut engine = CaptureEngine::new();
        let mut reg = VoiceRegistry::new();
        let mut p = params();
        p.release = 1.5;
        reg.start(&mut engine, 60, &p, 0.0);
        let d = reg.stop(&mut engine, 60, StopMode::Release, &p, 1.0).unwrap();
        assert!((d.at - (1.0 + 1.5 + RELEASE_MARGIN + DISPOSE_GRACE)).abs() < 1e-12);
        assert!(reg.is_empty());
    }

    #[test]
    fn stop_consumes_the_oldest() {
        let mut engine = CaptureEngine::new();
        let mut reg = VoiceRegistry::new();
        let p = params();
        let first = engine.start_voice(62, &p, 0.0);
        let second = engine.start_voice(62, &p, 0.1);
        reg.active.entry(62).or_default().extend([first.clone(), second.clone()]);

        let d = reg.stop(&mut engine, 62, StopMode::Release, &p, 0.2).unwrap();
        assert_eq!(d.voice, first);
        assert_eq!(reg.voices(62).next(), Some(&second));
    }

    #[test]
    fn stop_all_empties_the_registry() {
        let mut engine = CaptureEngine::new();
        let mut reg = VoiceRegistry::new();
        let p = params();
        for pitch in [67, 60, 64] {
            reg.start(&mut engine, pitch, &p, 0.0);
        }
        let disposals = reg.stop_all(&mut engine, StopMode::Release, &p, 1.0);
        let pitches: Vec<_> = disposals.iter().map(|d| d.voice.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        assert!(reg.is_empty());
    }

    #[test]
    fn double_disposal_is_swallowed() {
        let mut engine = CaptureEngine::new();
        let voice = engine.start_voice(60, &params(), 0.0);
        dispose_voice(&mut engine, &voice);
        dispose_voice(&mut engine, &voice);
        assert!(engine.is_disposed(&voice));
    }
}
