//! DSP: pure Rust synthesis for offline export.
//!
//! The browser plays live notes on its own audio graph from the voice
//! commands the session emits; this module renders the same notes to
//! samples for WAV export, so exports do not depend on the host.

pub mod delay;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod renderer;
pub mod voice;
