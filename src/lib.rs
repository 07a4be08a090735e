pub mod arp;
pub mod capture;
pub mod config;
pub mod dsp;
pub mod error;
pub mod grid;
pub mod notify;
pub mod offline;
pub mod params;
pub mod scheduler;
pub mod session;
pub mod song;
pub mod theory;
pub mod voices;

use crate::capture::CaptureEngine;
use crate::config::{RenderConfig, SessionConfig};
use crate::error::SynthError;
use crate::grid::Articulation;
use crate::notify::RecordingNotifier;
use crate::params::SynthParams;
use crate::session::Session;
use crate::song::Song;
use crate::theory::Scale;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the stepsynth-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_error)
}

/// Render a song to WAV bytes with the given live and render settings.
pub fn render_song(
    song: &Song,
    live: &SessionConfig,
    config: &RenderConfig,
) -> Result<Vec<u8>, SynthError> {
    let plan = offline::plan_song(&song.patterns, live, config)?;
    Ok(dsp::renderer::render_wav(&plan, config))
}

/// WASM-exposed: plan a song JSON into its timed note list.
#[wasm_bindgen]
pub fn plan_song(song_json: &str) -> Result<JsValue, JsValue> {
    let song = Song::from_json(song_json).map_err(js_error)?;
    let plan = offline::plan_song(
        &song.patterns,
        &SessionConfig::default(),
        &RenderConfig::default(),
    )
    .map_err(js_error)?;
    to_js(&plan)
}

/// WASM-exposed: render a song JSON to a mono 16-bit WAV byte array.
#[wasm_bindgen]
pub fn render_song_wav(song_json: &str, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let song = Song::from_json(song_json).map_err(js_error)?;
    let config = RenderConfig {
        sample_rate,
        ..RenderConfig::default()
    };
    render_song(&song, &SessionConfig::default(), &config).map_err(js_error)
}

/// Scale selector entries: the JSON key and the display name.
pub fn scale_options() -> Vec<(Scale, &'static str)> {
    Scale::ALL.iter().map(|&scale| (scale, scale.name())).collect()
}

/// A live synth session driven by the page.
///
/// The host calls [`advance`](LiveSynth::advance) from its timer with the
/// audio clock, then drains voice commands into its Web Audio graph and UI
/// events into the DOM.
#[wasm_bindgen]
pub struct LiveSynth {
    session: Session<CaptureEngine, RecordingNotifier>,
}

#[wasm_bindgen]
impl LiveSynth {
    /// `config_json` is an optional `SessionConfig`; empty means defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<LiveSynth, JsValue> {
        let config = match config_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => SessionConfig::from_json(json).map_err(js_error)?,
            _ => SessionConfig::default(),
        };
        Ok(LiveSynth {
            session: Session::with_notifier(
                CaptureEngine::streaming(),
                RecordingNotifier::default(),
                config,
            ),
        })
    }

    pub fn advance(&mut self, now: f64) {
        self.session.advance_to(now);
    }

    /// Voice commands issued since the last drain.
    pub fn drain_commands(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.session.engine_mut().drain_commands())
    }

    /// Step markers, pattern list changes and notices since the last drain.
    pub fn drain_events(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.session.notifier_mut().take())
    }

    pub fn note_on(&mut self, pitch: i32, now: f64) {
        self.session.note_on(pitch, now);
    }

    pub fn note_off(&mut self, pitch: i32, now: f64) {
        self.session.note_off(pitch, now);
    }

    pub fn start_sequencer(&mut self, now: f64) {
        self.session.start_sequencer(now);
    }

    pub fn toggle_sequencer(&mut self, now: f64) -> Result<(), JsValue> {
        self.session.toggle_sequencer(now).map_err(js_error)
    }

    pub fn stop_sequencer(&mut self, now: f64) {
        self.session.stop_sequencer(now);
    }

    pub fn toggle_cell(&mut self, row: usize, step: usize) -> bool {
        self.session.toggle_cell(row, step)
    }

    pub fn clear_grid(&mut self) {
        self.session.clear_grid();
    }

    pub fn randomize_grid(&mut self, count: usize) {
        self.session.randomize_grid(count);
    }

    pub fn grid(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.grid())
    }

    pub fn params(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.params())
    }

    /// Replace the knob values; the arpeggiator restarts if its timing or
    /// mode changed.
    pub fn set_params_json(&mut self, json: &str, now: f64) -> Result<(), JsValue> {
        let params = SynthParams::from_json(json).map_err(js_error)?;
        self.session.update_params(now, |p| *p = params);
        Ok(())
    }

    /// Load a preset patch; the grid is cleared.
    pub fn load_patch_json(&mut self, json: &str) -> Result<(), JsValue> {
        let params = SynthParams::from_json(json).map_err(js_error)?;
        self.session.load_patch(params);
        Ok(())
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.session.set_articulation(if legato {
            Articulation::Legato
        } else {
            Articulation::Staccato
        });
    }

    pub fn save_pattern(&mut self) -> usize {
        self.session.save_pattern()
    }

    pub fn select_pattern(&mut self, index: usize, now: f64) -> Result<(), JsValue> {
        self.session.select_pattern(index, now).map_err(js_error)
    }

    pub fn delete_pattern(&mut self, index: usize) -> Result<(), JsValue> {
        self.session.delete_pattern(index).map(|_| ()).map_err(js_error)
    }

    pub fn start_song(&mut self, now: f64) -> Result<(), JsValue> {
        self.session.start_song(now).map_err(js_error)
    }

    pub fn stop_song(&mut self, now: f64) {
        self.session.stop_song(now);
    }

    pub fn toggle_song(&mut self, now: f64) -> Result<(), JsValue> {
        self.session.toggle_song(now).map_err(js_error)
    }

    pub fn load_song_json(&mut self, json: &str) -> Result<(), JsValue> {
        let song = Song::from_json(json).map_err(js_error)?;
        self.session.load_song(song.patterns).map_err(js_error)
    }

    pub fn song_json(&self) -> Result<String, JsValue> {
        Song {
            patterns: self.session.patterns().to_vec(),
        }
        .to_json()
        .map_err(js_error)
    }

    /// Stop playback and render the song (or the live pattern) to WAV.
    pub fn export_wav(&mut self, now: f64, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
        let config = RenderConfig {
            sample_rate,
            ..RenderConfig::default()
        };
        let plan = self.session.export_plan(now, &config).map_err(js_error)?;
        Ok(dsp::renderer::render_wav(&plan, &config))
    }

    pub fn current_step(&self) -> usize {
        self.session.current_step()
    }

    pub fn current_pattern(&self) -> usize {
        self.session.current_pattern()
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    pub fn is_song_playing(&self) -> bool {
        self.session.is_song_playing()
    }

    pub fn is_arpeggiating(&self) -> bool {
        self.session.is_arpeggiating()
    }

    /// Row pitches of the current scale, top row first.
    pub fn scale_pitches(&self) -> Vec<i32> {
        self.session.scale_pitches().to_vec()
    }

    /// Note names for the grid rows, top row first.
    pub fn row_labels(&self) -> Vec<String> {
        self.session.row_labels().to_vec()
    }

    pub fn sequencer_title(&self) -> String {
        self.session.sequencer_title()
    }

    /// Tile text for each saved pattern, e.g. `Pattern A (Dorian)`.
    pub fn pattern_labels(&self) -> Vec<String> {
        self.session.patterns().iter().map(|p| p.tile_label()).collect()
    }

    /// `[key, display name]` pairs for the scale selector.
    pub fn scale_options() -> Result<JsValue, JsValue> {
        to_js(&scale_options())
    }
}
