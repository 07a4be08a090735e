//! Delay pedal: mono feedback delay with a dry/wet crossfade.

/// Longest delay the line can hold, in seconds.
pub const MAX_DELAY: f64 = 2.0;

/// A mono delay line with feedback.
///
/// The wet path hears the line's output and the line is fed with
/// `input + output * feedback`; the dry and wet gains are `1 - mix` and `mix`.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<f64>,
    write_pos: usize,
    sample_rate: f64,

    /// Seconds.
    pub time: f64,
    /// 0.0 = single echo, clamped below 1.0.
    pub feedback: f64,
    /// 0.0 = fully dry, 1.0 = fully wet.
    pub mix: f64,
}

impl Delay {
    pub fn new(sample_rate: f64, time: f64, feedback: f64, mix: f64) -> Self {
        let mut d = Delay {
            buffer: vec![0.0; (sample_rate * MAX_DELAY) as usize + 1],
            write_pos: 0,
            sample_rate,
            time: 0.0,
            feedback: 0.0,
            mix: 0.0,
        };
        d.set(time, feedback, mix);
        d
    }

    /// Change settings without clearing the line.
    pub fn set(&mut self, time: f64, feedback: f64, mix: f64) {
        self.time = time.clamp(0.0, MAX_DELAY);
        self.feedback = feedback.clamp(0.0, 0.99);
        self.mix = mix.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let len = self.buffer.len();
        let delay = ((self.time * self.sample_rate) as usize).min(len - 1);
        let read_pos = (self.write_pos + len - delay) % len;

        let delayed = self.buffer[read_pos];
        self.buffer[self.write_pos] = input + delayed * self.feedback;
        self.write_pos = (self.write_pos + 1) % len;

        input * (1.0 - self.mix) + delayed * self.mix
    }
}
