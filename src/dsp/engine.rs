//! Offline renderer: turns a [`RenderPlan`] into mono samples.
//!
//! Voices are mixed, then run through the shared chain (VCF with LFO
//! cutoff sweep, delay, master volume). The chain follows the parameters
//! of whichever pattern's section is playing, switched at block
//! boundaries; each note keeps the parameters of the pattern it came from.

use crate::config::{EndMode, RenderConfig};
use crate::offline::RenderPlan;
use crate::params::SynthParams;
use crate::theory::Pitch;
use crate::voices::RELEASE_MARGIN;

use super::delay::Delay;
use super::filter::Vcf;
use super::mixer::{self, Mixer};
use super::oscillator::Oscillator;
use super::voice::SynthVoice;

const BLOCK_SIZE: usize = 128;
/// Echo level at which a delay tail counts as gone.
const TAIL_FLOOR: f64 = 1e-3;
/// Upper bound on the delay tail added in [`EndMode::Tail`].
const MAX_TAIL: f64 = 10.0;

/// A planned note converted to sample positions.
struct ScheduledNote {
    start_sample: usize,
    release_sample: usize,
    pitch: Pitch,
    patch: usize,
}

/// A playing voice and where it starts inside the render.
struct ActiveVoice {
    voice: SynthVoice,
    start_sample: usize,
}

/// The shared post-mix chain for one render.
struct Chain {
    vcf: Vcf,
    lfo: Oscillator,
    delay: Delay,
    patch: Option<usize>,
}

impl Chain {
    fn new(params: &SynthParams, sample_rate: f64) -> Self {
        Chain {
            vcf: Vcf::new(params.cutoff, params.resonance, sample_rate),
            lfo: Oscillator::new(params.lfo_wave, params.lfo_rate, sample_rate),
            delay: Delay::new(sample_rate, params.delay_time, params.delay_feedback, params.delay_mix),
            patch: None,
        }
    }

    /// Switch to a section's parameters. Filter and delay state carry over.
    fn apply(&mut self, patch: usize, params: &SynthParams) {
        if self.patch == Some(patch) {
            return;
        }
        self.patch = Some(patch);
        self.lfo.waveform = params.lfo_wave;
        self.lfo.frequency = params.lfo_rate;
        self.delay
            .set(params.delay_time, params.delay_feedback, params.delay_mix);
    }

    fn process(&mut self, input: f64, params: &SynthParams) -> f64 {
        let sweep = if params.lfo_vcf_depth > 0.0 {
            self.lfo.next_sample() * params.lfo_vcf_depth
        } else {
            0.0
        };
        self.vcf.set(params.cutoff + sweep, params.resonance);
        let filtered = self.vcf.process(input);
        mixer::master(self.delay.process(filtered), params.master_volume)
    }
}

/// Seconds for a delay's echoes to fall below [`TAIL_FLOOR`].
fn delay_tail(params: &SynthParams) -> f64 {
    if params.delay_mix <= 0.0 || params.delay_time <= 0.0 {
        return 0.0;
    }
    let feedback = params.delay_feedback.clamp(0.0, 0.99);
    let repeats = if feedback > 0.0 {
        (TAIL_FLOOR.ln() / feedback.ln()).ceil().max(1.0)
    } else {
        1.0
    };
    (params.delay_time * repeats).min(MAX_TAIL)
}

pub struct OfflineRenderer {
    pub sample_rate: f64,
    pub end_mode: EndMode,
    pub max_voices: usize,
    seed: u64,
}

impl OfflineRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        OfflineRenderer {
            sample_rate: config.sample_rate.max(1) as f64,
            end_mode: config.end_mode,
            max_voices: config.max_voices.max(1),
            seed: config.seed,
        }
    }

    fn to_samples(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate).round() as usize
    }

    /// Length of the render in seconds for the configured end mode.
    pub fn render_length(&self, plan: &RenderPlan) -> f64 {
        if self.end_mode == EndMode::Gate {
            return plan.duration;
        }
        plan.notes
            .iter()
            .filter_map(|n| {
                let params = plan.patches.get(n.patch)?;
                let mut end = n.start + n.duration + params.release_time() + RELEASE_MARGIN;
                if self.end_mode == EndMode::Tail {
                    end += delay_tail(params);
                }
                Some(end)
            })
            .fold(plan.duration, f64::max)
    }

    /// Render the plan to mono samples in (-1, 1).
    pub fn render(&self, plan: &RenderPlan) -> Vec<f64> {
        let Some(first) = plan.patches.first() else {
            return Vec::new();
        };
        let total_samples = self.to_samples(self.render_length(plan));

        let mut scheduled: Vec<ScheduledNote> = plan
            .notes
            .iter()
            .filter(|n| n.patch < plan.patches.len())
            .map(|n| {
                let start_sample = self.to_samples(n.start);
                ScheduledNote {
                    start_sample,
                    release_sample: start_sample + self.to_samples(n.duration),
                    pitch: n.pitch,
                    patch: n.patch,
                }
            })
            .collect();
        scheduled.sort_by_key(|n| n.start_sample);

        let mut chain = Chain::new(first, self.sample_rate);
        let mut mixer = Mixer::new();
        let mut voices: Vec<ActiveVoice> = Vec::new();
        let mut output = Vec::with_capacity(total_samples);
        let mut next_note = 0;
        let mut dropped = 0usize;

        let mut block_start = 0;
        while block_start < total_samples {
            let block_end = (block_start + BLOCK_SIZE).min(total_samples);
            let this_block = block_end - block_start;

            while next_note < scheduled.len() && scheduled[next_note].start_sample < block_end {
                let note = &scheduled[next_note];
                if voices.len() < self.max_voices {
                    let seed = self.seed.wrapping_add((next_note as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                    let mut voice = SynthVoice::new(note.pitch, &plan.patches[note.patch], self.sample_rate, seed);
                    voice.release_sample = note.release_sample;
                    voices.push(ActiveVoice {
                        voice,
                        start_sample: note.start_sample,
                    });
                } else {
                    dropped += 1;
                }
                next_note += 1;
            }

            mixer.clear(this_block);
            for active in voices.iter_mut() {
                let offset = active.start_sample.max(block_start) - block_start;
                for i in offset..this_block {
                    if block_start + i == active.voice.release_sample {
                        active.voice.note_off();
                    }
                    mixer.add(i, active.voice.next_sample());
                }
            }
            voices.retain(|v| !v.voice.is_finished());

            let time = block_start as f64 / self.sample_rate;
            let patch = plan.section_at(time).map_or(0, |s| s.patch);
            let params = plan.patches.get(patch).unwrap_or(first);
            chain.apply(patch, params);
            output.extend(mixer.block().iter().map(|&s| chain.process(s, params)));

            block_start = block_end;
        }

        if dropped > 0 {
            log::warn!("voice limit {} reached, dropped {dropped} notes", self.max_voices);
        }
        log::info!(
            "rendered {} notes into {:.3}s at {} Hz",
            plan.notes.len(),
            output.len() as f64 / self.sample_rate,
            self.sample_rate
        );
        output
    }

    /// Render to 16-bit PCM, scaled the way the WAV export always has:
    /// negative values by 0x8000, positive by 0x7FFF.
    pub fn render_pcm_i16(&self, plan: &RenderPlan) -> Vec<i16> {
        self.render(plan).into_iter().map(to_pcm16).collect()
    }
}

/// Convert one sample to 16-bit PCM, clamping to [-1, 1].
pub fn to_pcm16(sample: f64) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}
