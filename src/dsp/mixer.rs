//! Mixer: sums voice outputs per block; master stage with volume and
//! soft clipping.

/// Accumulates one block of voice output before the shared chain.
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    buffer: Vec<f64>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the block and size it to `num_samples`.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    /// Out-of-range indices are ignored.
    pub fn add(&mut self, index: usize, sample: f64) {
        if let Some(slot) = self.buffer.get_mut(index) {
            *slot += sample;
        }
    }

    pub fn block(&self) -> &[f64] {
        &self.buffer
    }

    pub fn block_mut(&mut self) -> &mut [f64] {
        &mut self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Apply master volume, then soft clip into (-1, 1).
pub fn master(sample: f64, volume: f64) -> f64 {
    soft_clip(sample * volume)
}

fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_block_is_silent() {
        let mut m = Mixer::new();
        m.clear(128);
        assert_eq!(m.len(), 128);
        assert!(m.block().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn accumulates_samples() {
        let mut m = Mixer::new();
        m.clear(4);
        m.add(0, 0.5);
        m.add(0, 0.3);
        m.add(1, 1.0);
        m.add(9, 1.0);
        assert!((m.block()[0] - 0.8).abs() < 1e-12);
        assert_eq!(m.block()[1], 1.0);
        assert_eq!(m.block()[2], 0.0);
    }

    #[test]
    fn master_stays_bounded() {
        assert!(master(100.0, 1.0) <= 1.0);
        assert_eq!(master(0.3, 0.0), 0.0);
        assert!((master(0.2, 0.5) - 0.1_f64.tanh()).abs() < 1e-12);
    }
}
