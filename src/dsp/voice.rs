//! Synth voice: one note of the patch. Two VCOs, a noise source and an
//! optional vibrato LFO, shaped by the gate envelope.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::params::SynthParams;
use crate::theory::{Pitch, midi_to_frequency};

use super::envelope::Envelope;
use super::oscillator::{Oscillator, semitone_ratio};

/// LFO vibrato depth is given in semitones; oscillators detune in cents.
const CENTS_PER_SEMITONE: f64 = 100.0;

#[derive(Debug, Clone)]
struct Vco {
    osc: Oscillator,
    level: f64,
    /// Vibrato depth in cents.
    vibrato: f64,
}

#[derive(Debug, Clone)]
pub struct SynthVoice {
    pub pitch: Pitch,
    vcos: Vec<Vco>,
    lfo: Option<Oscillator>,
    noise: Option<(StdRng, f64)>,
    pub envelope: Envelope,
    /// Sample index at which the gate closes.
    pub release_sample: usize,
}

impl SynthVoice {
    /// Build and trigger a voice for `pitch` with the timbre in `params`.
    /// `seed` drives the noise source.
    pub fn new(pitch: Pitch, params: &SynthParams, sample_rate: f64, seed: u64) -> Self {
        let base = midi_to_frequency(pitch);
        let mut vcos = Vec::with_capacity(2);
        let mut add_vco = |wave, range: i32, fine: f64, level: f64, depth: f64| {
            if level > 0.0 {
                let freq = base * semitone_ratio(range as f64 + fine);
                vcos.push(Vco {
                    osc: Oscillator::new(wave, freq, sample_rate),
                    level,
                    vibrato: depth * CENTS_PER_SEMITONE,
                });
            }
        };
        add_vco(
            params.vco1_wave,
            params.vco1_range,
            params.vco1_fine_tune,
            params.vco1_level,
            params.lfo_vco1_depth,
        );
        add_vco(
            params.vco2_wave,
            params.vco2_range,
            params.vco2_fine_tune,
            params.vco2_level,
            params.lfo_vco2_depth,
        );

        let lfo = vcos
            .iter()
            .any(|v| v.vibrato > 0.0)
            .then(|| Oscillator::new(params.lfo_wave, params.lfo_rate, sample_rate));
        let noise = (params.noise_level > 0.0).then(|| (StdRng::seed_from_u64(seed), params.noise_level));

        let mut envelope = Envelope::new(
            params.attack,
            params.decay,
            params.sustain,
            params.release_time(),
            sample_rate,
        );
        envelope.gate_on();

        SynthVoice {
            pitch,
            vcos,
            lfo,
            noise,
            envelope,
            release_sample: usize::MAX,
        }
    }

    pub fn note_off(&mut self) {
        self.envelope.gate_off();
    }

    pub fn next_sample(&mut self) -> f64 {
        if self.envelope.is_finished() {
            return 0.0;
        }

        let lfo = self.lfo.as_mut().map_or(0.0, |l| l.next_sample());
        let mut sum = 0.0;
        for vco in &mut self.vcos {
            vco.osc.detune = lfo * vco.vibrato;
            sum += vco.osc.next_sample() * vco.level;
        }
        if let Some((rng, level)) = &mut self.noise {
            sum += rng.gen_range(-1.0..1.0) * *level;
        }
        sum * self.envelope.next_sample()
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }
}
