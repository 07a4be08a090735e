//! Gate envelope, shaped the way the live synth drives its note gain:
//! a linear attack to full level, held there until `attack + decay`, then
//! an exponential approach to the sustain level. Release is an exponential
//! approach to silence.

/// Exponential segments use a time constant of this fraction of the
/// stage's nominal time.
pub const TIME_CONSTANT_RATIO: f64 = 0.2;
/// Level below which a releasing envelope counts as finished.
const SILENCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Hold,
    Decay,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    /// Seconds.
    pub attack: f64,
    /// Seconds.
    pub decay: f64,
    /// Level [0, 1].
    pub sustain: f64,
    /// Seconds.
    pub release: f64,

    stage: Stage,
    level: f64,
    /// Samples since gate on.
    elapsed: usize,
    sample_rate: f64,
}

impl Envelope {
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64, sample_rate: f64) -> Self {
        Envelope {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
            stage: Stage::Idle,
            level: 0.0,
            elapsed: 0,
            sample_rate,
        }
    }

    /// Note on. The gate always starts from zero.
    pub fn gate_on(&mut self) {
        self.stage = Stage::Attack;
        self.level = 0.0;
        self.elapsed = 0;
    }

    /// Note off: release from wherever the level is.
    pub fn gate_off(&mut self) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
    }

    /// Immediate stop: the gate drops to zero.
    pub fn kill(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == Stage::Release
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// Per-sample decay factor for an exponential approach over `seconds`.
    fn coefficient(&self, seconds: f64) -> f64 {
        let tau = seconds * TIME_CONSTANT_RATIO * self.sample_rate;
        if tau <= 0.0 { 0.0 } else { (-1.0 / tau).exp() }
    }

    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                let length = self.attack * self.sample_rate;
                if self.elapsed as f64 >= length {
                    self.level = 1.0;
                    self.stage = Stage::Hold;
                } else {
                    self.level = self.elapsed as f64 / length;
                }
            }
            Stage::Hold => {
                self.level = 1.0;
                if self.elapsed as f64 >= (self.attack + self.decay) * self.sample_rate {
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                let k = self.coefficient(self.decay);
                self.level = self.sustain + (self.level - self.sustain) * k;
            }
            Stage::Release => {
                self.level *= self.coefficient(self.release);
                if self.level < SILENCE {
                    self.kill();
                }
            }
        }
        self.elapsed = self.elapsed.saturating_add(1);
        self.level
    }
}
