//! VCF: the low-pass biquad that sits between the voice mix and the delay.
//!
//! Coefficients follow the Audio EQ Cookbook low-pass, with resonance read
//! in decibels as the browser's `BiquadFilterNode` reads its lowpass `Q`.

use std::f64::consts::PI;

/// Lowest cutoff the filter accepts, in Hz.
const MIN_CUTOFF: f64 = 10.0;

/// A resonant 2-pole low-pass filter (Direct Form II Transposed).
#[derive(Debug, Clone)]
pub struct Vcf {
    cutoff: f64,
    resonance_db: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl Vcf {
    pub fn new(cutoff: f64, resonance_db: f64, sample_rate: f64) -> Self {
        let mut f = Vcf {
            cutoff: 0.0,
            resonance_db: f64::NAN,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.set(cutoff, resonance_db);
        f
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Retune the filter. Coefficients are only recomputed on change, so
    /// this is cheap to call every sample.
    pub fn set(&mut self, cutoff: f64, resonance_db: f64) {
        let nyquist = self.sample_rate / 2.0;
        let cutoff = cutoff.clamp(MIN_CUTOFF, nyquist * 0.99);
        if cutoff == self.cutoff && resonance_db == self.resonance_db {
            return;
        }
        self.cutoff = cutoff;
        self.resonance_db = resonance_db;

        let w0 = 2.0 * PI * cutoff / self.sample_rate;
        let cos_w0 = w0.cos();
        let q = 10.0_f64.powf(resonance_db / 20.0).max(1e-4);
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        self.b1 = (1.0 - cos_w0) / a0;
        self.b0 = self.b1 / 2.0;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_dc() {
        let mut f = Vcf::new(5000.0, 0.0, 44100.0);
        let mut out = 0.0;
        for _ in 0..2000 {
            out = f.process(1.0);
        }
        assert!((out - 1.0).abs() < 0.001, "{out}");
    }

    #[test]
    fn attenuates_above_cutoff() {
        let mut f = Vcf::new(200.0, 0.0, 44100.0);
        let mut peak = 0.0_f64;
        for i in 0..4410 {
            let input = (2.0 * PI * 10000.0 * i as f64 / 44100.0).sin();
            let out = f.process(input);
            if i > 1000 {
                peak = peak.max(out.abs());
            }
        }
        assert!(peak < 0.01, "{peak}");
    }

    #[test]
    fn cutoff_is_clamped_below_nyquist() {
        let mut f = Vcf::new(100_000.0, 1.0, 22050.0);
        assert!(f.cutoff() < 11025.0);
        f.set(-5.0, 1.0);
        assert_eq!(f.cutoff(), MIN_CUTOFF);
        for i in 0..5000 {
            let out = f.process(if i % 50 == 0 { 1.0 } else { 0.0 });
            assert!(out.is_finite());
        }
    }

    #[test]
    fn resonance_boosts_the_cutoff_region() {
        let gain_at = |resonance: f64| {
            let mut f = Vcf::new(1000.0, resonance, 44100.0);
            let mut peak = 0.0_f64;
            for i in 0..44100 {
                let out = f.process((2.0 * PI * 1000.0 * i as f64 / 44100.0).sin());
                if i > 22050 {
                    peak = peak.max(out.abs());
                }
            }
            peak
        };
        assert!(gain_at(12.0) > 2.0 * gain_at(0.0));
    }
}
