//! Parameter store: the flat patch snapshot every tick reads and every
//! saved pattern copies.
//!
//! Keys match the patch JSON the browser front end produces
//! (`vco1_wave`, `attack`, `arp_mode`, `bpm`, `baseOctave`, ...).

use serde::{Deserialize, Serialize};

use crate::arp::ArpMode;
use crate::dsp::oscillator::Waveform;
use crate::error::SynthError;
use crate::grid::{self, DEFAULT_BPM};
use crate::theory::{ChordSet, Pitch, Scale};

/// Full synth parameter snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthParams {
    pub vco1_wave: Waveform,
    /// Coarse tuning in semitones.
    pub vco1_range: i32,
    /// Fine tuning in semitones.
    pub vco1_fine_tune: f64,
    pub vco1_level: f64,
    pub vco2_wave: Waveform,
    pub vco2_range: i32,
    pub vco2_fine_tune: f64,
    pub vco2_level: f64,

    /// Seconds.
    pub attack: f64,
    /// Seconds.
    pub decay: f64,
    /// Level [0, 1].
    pub sustain: f64,
    /// Seconds.
    pub release: f64,

    /// Low-pass cutoff in Hz.
    pub cutoff: f64,
    pub resonance: f64,

    /// LFO sweep of the cutoff, in Hz.
    pub lfo_vcf_depth: f64,
    pub lfo_rate: f64,
    pub lfo_wave: Waveform,
    /// Vibrato depth on VCO 1, in semitones.
    pub lfo_vco1_depth: f64,
    /// Vibrato depth on VCO 2, in semitones.
    pub lfo_vco2_depth: f64,

    pub noise_level: f64,

    /// Seconds.
    pub delay_time: f64,
    pub delay_feedback: f64,
    pub delay_mix: f64,

    pub master_volume: f64,

    pub arp_mode: ArpMode,
    /// Arp notes per sequencer step.
    pub arp_rate: u32,
    pub arp_chords: ChordSet,
    pub arp_octaves: u32,

    pub bpm: f64,
    pub scale_key: Scale,
    /// Pitch of the scale root (row 7).
    #[serde(rename = "baseOctave")]
    pub base_octave: Pitch,
}

impl Default for SynthParams {
    fn default() -> Self {
        SynthParams {
            vco1_wave: Waveform::Sawtooth,
            vco1_range: 0,
            vco1_fine_tune: 0.0,
            vco1_level: 0.7,
            vco2_wave: Waveform::Sawtooth,
            vco2_range: 0,
            vco2_fine_tune: 0.0,
            vco2_level: 0.7,
            attack: 0.05,
            decay: 0.2,
            sustain: 0.5,
            release: 0.5,
            cutoff: 10000.0,
            resonance: 1.0,
            lfo_vcf_depth: 0.0,
            lfo_rate: 5.0,
            lfo_wave: Waveform::Sine,
            lfo_vco1_depth: 0.0,
            lfo_vco2_depth: 0.0,
            noise_level: 0.0,
            delay_time: 0.5,
            delay_feedback: 0.3,
            delay_mix: 0.5,
            master_volume: 0.7,
            arp_mode: ArpMode::Off,
            arp_rate: 1,
            arp_chords: ChordSet::HeldNotes,
            arp_octaves: 1,
            bpm: DEFAULT_BPM,
            scale_key: Scale::Major,
            base_octave: 60,
        }
    }
}

impl SynthParams {
    pub fn from_json(json: &str) -> Result<Self, SynthError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SynthError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Tempo in BPM; non-positive or non-finite values fall back to 120.
    pub fn tempo(&self) -> f64 {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            self.bpm
        } else {
            DEFAULT_BPM
        }
    }

    /// Seconds per sequencer step at the current tempo.
    pub fn step_duration(&self) -> f64 {
        grid::step_duration(self.tempo())
    }

    /// Arp subdivisions per step, at least one.
    pub fn arp_subdivisions(&self) -> u32 {
        self.arp_rate.max(1)
    }

    /// Seconds between arp notes.
    pub fn arp_interval(&self) -> f64 {
        self.step_duration() / self.arp_subdivisions() as f64
    }

    /// Release time never goes negative.
    pub fn release_time(&self) -> f64 {
        self.release.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patch_round_trips_through_json() {
        let params = SynthParams::default();
        let json = params.to_json().unwrap();
        assert!(json.contains("\"baseOctave\":60"));
        assert!(json.contains("\"vco1_wave\":\"sawtooth\""));
        assert_eq!(SynthParams::from_json(&json).unwrap(), params);
    }

    #[test]
    fn partial_patch_keeps_defaults() {
        let params = SynthParams::from_json(
            r#"{"bpm": 90, "scale_key": "dorian", "arp_mode": "updown", "arp_rate": 4}"#,
        )
        .unwrap();
        assert_eq!(params.bpm, 90.0);
        assert_eq!(params.scale_key, Scale::Dorian);
        assert_eq!(params.arp_mode, ArpMode::UpDown);
        assert_eq!(params.arp_rate, 4);
        assert_eq!(params.attack, 0.05);
    }

    #[test]
    fn tempo_falls_back_to_default() {
        let mut params = SynthParams::default();
        params.bpm = 0.0;
        assert_eq!(params.tempo(), 120.0);
        params.bpm = f64::NAN;
        assert_eq!(params.tempo(), 120.0);
        params.bpm = 150.0;
        assert_eq!(params.tempo(), 150.0);
    }

    #[test]
    fn arp_interval_subdivides_the_step() {
        let mut params = SynthParams::default();
        params.arp_rate = 4;
        assert!((params.arp_interval() - 0.125 / 4.0).abs() < 1e-12);
        params.arp_rate = 0;
        assert_eq!(params.arp_subdivisions(), 1);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            SynthParams::from_json("{\"bpm\": \"fast\"}"),
            Err(SynthError::Json(_))
        ));
    }
}
