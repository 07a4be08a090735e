//! Session: the single context object that owns all mutable playback
//! state. The sequencer clock, keyboard arpeggiator, song chain, held notes
//! and voice registry all live here.
//!
//! All timers run on one virtual-clock [`Scheduler`]. The host calls
//! [`Session::advance_to`] with its current time (or the offline planner
//! jumps from event to event); every public operation that takes `now`
//! first catches the queue up to `now`, so actions always observe state in
//! time order.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::arp::next_arp_pitch;
use crate::config::{RenderConfig, SessionConfig, SwapTiming};
use crate::error::SynthError;
use crate::grid::{self, Articulation, GATE_FRACTION, NUM_ROWS, NUM_STEPS, RowAction, SequenceGrid};
use crate::notify::{Notifier, NullNotifier};
use crate::offline::{self, RenderPlan};
use crate::params::SynthParams;
use crate::scheduler::Scheduler;
use crate::song::{Pattern, SongState};
use crate::theory::{self, Pitch};
use crate::voices::{Disposal, SoundEngine, StopMode, VoiceHandle, VoiceRegistry, dispose_voice};

/// Something queued on the session's scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Periodic sequencer tick number `tick` since the clock was anchored.
    ClockTick { generation: u64, tick: u64 },
    /// One arpeggiated note inside a sequencer step.
    ArpSubStep {
        step: usize,
        sub: u32,
        subdivisions: u32,
        notes: Vec<Pitch>,
    },
    /// Periodic keyboard arpeggiator tick.
    ArpTick { generation: u64, tick: u64 },
    /// Gate-off for a triggered note.
    NoteOff { pitch: Pitch },
    /// Free a released voice's components.
    Dispose(VoiceHandle),
}

/// Repeating timer state. Tick `n` fires at `anchor + n * interval`, so
/// tick times never accumulate rounding drift.
#[derive(Debug, Clone, Default)]
struct Timer {
    running: bool,
    generation: u64,
    anchor: f64,
    interval: f64,
}

impl Timer {
    fn tick_time(&self, tick: u64) -> f64 {
        self.anchor + tick as f64 * self.interval
    }
}

pub struct Session<E: SoundEngine, N: Notifier = NullNotifier> {
    config: SessionConfig,
    engine: E,
    notifier: N,
    scheduler: Scheduler<Action>,
    voices: VoiceRegistry,
    params: SynthParams,
    grid: SequenceGrid,
    held: Vec<Pitch>,
    clock: Timer,
    current_step: usize,
    /// Pitch each row is sustaining under legato.
    tied: [Option<Pitch>; NUM_ROWS],
    arp: Timer,
    arp_index: u64,
    song: SongState,
    /// The last pattern finished; stop at the next step-0 boundary.
    song_ending: bool,
    rng: StdRng,
    now: f64,
}

impl<E: SoundEngine> Session<E> {
    pub fn new(engine: E, config: SessionConfig) -> Self {
        Session::with_notifier(engine, NullNotifier, config)
    }
}

impl<E: SoundEngine, N: Notifier> Session<E, N> {
    pub fn with_notifier(engine: E, notifier: N, config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Session {
            config,
            engine,
            notifier,
            scheduler: Scheduler::new(),
            voices: VoiceRegistry::new(),
            params: SynthParams::default(),
            grid: SequenceGrid::new(),
            held: Vec::new(),
            clock: Timer::default(),
            current_step: 0,
            tied: [None; NUM_ROWS],
            arp: Timer::default(),
            arp_index: 0,
            song: SongState::default(),
            song_ending: false,
            rng,
            now: 0.0,
        }
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    pub fn voices(&self) -> &VoiceRegistry {
        &self.voices
    }

    pub fn params(&self) -> &SynthParams {
        &self.params
    }

    pub fn grid(&self) -> &SequenceGrid {
        &self.grid
    }

    pub fn articulation(&self) -> Articulation {
        self.config.articulation
    }

    pub fn held_notes(&self) -> &[Pitch] {
        &self.held
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_playing(&self) -> bool {
        self.clock.running
    }

    pub fn is_arpeggiating(&self) -> bool {
        self.arp.running
    }

    pub fn is_song_playing(&self) -> bool {
        self.song.playing
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.song.patterns
    }

    pub fn current_pattern(&self) -> usize {
        self.song.current
    }

    /// Time of the latest processed event or catch-up.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Time of the next queued action.
    pub fn next_event_time(&self) -> Option<f64> {
        self.scheduler.next_time()
    }

    /// Grid row pitches for the current scale and base octave.
    pub fn scale_pitches(&self) -> [Pitch; NUM_ROWS] {
        theory::scale_pitches(self.params.scale_key, self.params.base_octave)
    }

    /// Note names for the grid rows, top row first.
    pub fn row_labels(&self) -> [String; NUM_ROWS] {
        self.scale_pitches().map(theory::note_name)
    }

    /// Heading for the sequencer panel.
    pub fn sequencer_title(&self) -> String {
        format!(
            "{NUM_STEPS}-Step Sequencer ({} Scale - C Root)",
            self.params.scale_key.name()
        )
    }

    // ── Event loop ──────────────────────────────────────────

    /// Run every queued action due at or before `until`, in time order.
    /// A non-finite `until` is ignored; the clock stays where it was.
    pub fn advance_to(&mut self, until: f64) {
        if !until.is_finite() {
            log::warn!("ignoring non-finite clock time {until}");
            return;
        }
        while let Some((at, action)) = self.scheduler.pop_due(until) {
            self.now = self.now.max(at);
            self.dispatch(at, action);
        }
        self.now = self.now.max(until);
    }

    /// Drain the remaining one-shot actions once nothing repeats.
    pub fn settle(&mut self) {
        while !self.clock.running && !self.arp.running {
            let Some(at) = self.scheduler.next_time() else {
                break;
            };
            self.advance_to(at);
        }
    }

    fn catch_up(&mut self, now: f64) -> f64 {
        self.advance_to(now);
        self.now
    }

    fn dispatch(&mut self, at: f64, action: Action) {
        match action {
            Action::ClockTick { generation, tick } => {
                if !self.clock.running || generation != self.clock.generation {
                    return;
                }
                self.scheduler.schedule(
                    self.clock.tick_time(tick + 1),
                    Action::ClockTick {
                        generation,
                        tick: tick + 1,
                    },
                );
                self.run_step(at);
            }
            Action::ArpSubStep {
                step,
                sub,
                subdivisions,
                notes,
            } => self.play_arp_substep(at, step, sub, subdivisions, &notes),
            Action::ArpTick { generation, tick } => {
                if !self.arp.running || generation != self.arp.generation {
                    return;
                }
                self.run_arp_tick(at);
                if self.arp.running && self.arp.generation == generation {
                    self.scheduler.schedule(
                        self.arp.tick_time(tick + 1),
                        Action::ArpTick {
                            generation,
                            tick: tick + 1,
                        },
                    );
                }
            }
            Action::NoteOff { pitch } => self.voice_off(pitch, StopMode::Release, at),
            Action::Dispose(voice) => dispose_voice(&mut self.engine, &voice),
        }
    }

    // ── Voice helpers ───────────────────────────────────────

    fn schedule_disposals(&mut self, disposals: Vec<Disposal>) {
        for d in disposals {
            self.scheduler.schedule(d.at, Action::Dispose(d.voice));
        }
    }

    fn voice_on(&mut self, pitch: Pitch, at: f64) {
        let cut = self.voices.start(&mut self.engine, pitch, &self.params, at);
        self.schedule_disposals(cut);
    }

    fn voice_off(&mut self, pitch: Pitch, mode: StopMode, at: f64) {
        if let Some(d) = self.voices.stop(&mut self.engine, pitch, mode, &self.params, at) {
            self.schedule_disposals(vec![d]);
        }
    }

    /// Start `pitch` and queue its gate-off `gate` seconds later.
    fn trigger(&mut self, pitch: Pitch, at: f64, gate: f64) {
        self.voice_on(pitch, at);
        self.scheduler.schedule(at + gate, Action::NoteOff { pitch });
    }

    fn release_all(&mut self, at: f64) {
        let released = self.voices.stop_all(&mut self.engine, StopMode::Release, &self.params, at);
        self.schedule_disposals(released);
    }

    fn release_tied(&mut self, at: f64) {
        for row in 0..NUM_ROWS {
            if let Some(pitch) = self.tied[row].take() {
                self.voice_off(pitch, StopMode::Release, at);
            }
        }
    }

    /// Release everything sounding and, when configured, drop queued
    /// sub-steps and gate-offs that belong to the playback being stopped.
    fn silence(&mut self, at: f64) {
        if self.config.cancel_pending_on_stop {
            let dropped = self
                .scheduler
                .cancel(|a| matches!(a, Action::ArpSubStep { .. } | Action::NoteOff { .. }));
            if dropped > 0 {
                log::trace!("cancelled {dropped} pending note actions");
            }
        }
        self.tied = [None; NUM_ROWS];
        self.release_all(at);
    }

    fn reject(&mut self, err: SynthError) -> SynthError {
        log::warn!("{err}");
        self.notifier.notice(&err.to_string());
        err
    }

    fn notify_patterns(&mut self) {
        self.notifier
            .patterns_changed(&self.song.patterns, self.song.current);
    }

    // ── Sequencer clock ─────────────────────────────────────

    /// (Re)anchor the clock at `now` with the current tempo. Any previously
    /// queued tick is dropped.
    fn restart_clock(&mut self, now: f64) {
        self.scheduler
            .cancel(|a| matches!(a, Action::ClockTick { .. }));
        self.clock.running = true;
        self.clock.generation += 1;
        self.clock.anchor = now;
        self.clock.interval = self.params.step_duration();
        self.scheduler.schedule(
            self.clock.tick_time(1),
            Action::ClockTick {
                generation: self.clock.generation,
                tick: 1,
            },
        );
    }

    fn halt_clock(&mut self) {
        self.scheduler
            .cancel(|a| matches!(a, Action::ClockTick { .. }));
        self.clock.running = false;
        self.clock.generation += 1;
    }

    /// One sequencer step.
    fn run_step(&mut self, now: f64) {
        if self.song.playing && self.current_step == 0 {
            if self.song_ending {
                log::debug!("song finished at {now:.3}");
                self.stop_song_at(now);
                return;
            }
            if let Some(index) = self.song.pending.take() {
                self.apply_pattern(index);
                self.restart_clock(now);
                self.notify_patterns();
                log::debug!(
                    "swapped to {} at {now:.3} ({} bpm)",
                    self.song.patterns[index].name,
                    self.params.tempo()
                );
                if self.config.swap_timing == SwapTiming::SkipSwapTick {
                    return;
                }
            }
        }

        let step = self.current_step;
        let prev = grid::previous_step(step);
        self.notifier.step_marker(Some(step));
        log::trace!("step {step} at {now:.4}");

        let rows = self.scale_pitches();
        let mut notes: Vec<Pitch> = self.grid.active_rows(step).map(|row| rows[row]).collect();
        notes.sort_unstable();

        if self.params.arp_mode.is_engaged() && !notes.is_empty() {
            self.release_tied(now);
            self.schedule_arp_substeps(now, step, notes);
        } else {
            match self.config.articulation {
                Articulation::Staccato => {
                    self.release_tied(now);
                    let gate = self.params.step_duration() * GATE_FRACTION;
                    for pitch in notes {
                        self.trigger(pitch, now, gate);
                    }
                }
                Articulation::Legato => self.tie_rows(now, prev, step, &rows),
            }
        }

        self.current_step = (step + 1) % NUM_STEPS;
        if self.current_step == 0 && self.song.playing {
            self.advance_song();
        }
    }

    /// Legato: a row only starts on an off→on edge and only stops on an
    /// on→off edge. `tied` tracks what each row is actually sustaining, so
    /// a fresh start, a pattern swap, or a scale change re-attacks cleanly.
    fn tie_rows(&mut self, now: f64, prev: usize, step: usize, rows: &[Pitch; NUM_ROWS]) {
        for (row, &pitch) in rows.iter().enumerate() {
            let action = self
                .config
                .articulation
                .row_action(self.grid.is_on(row, prev), self.grid.is_on(row, step));
            let sounding = self.tied[row];
            match action {
                RowAction::Start => {
                    if let Some(old) = sounding {
                        self.voice_off(old, StopMode::Release, now);
                    }
                    self.voice_on(pitch, now);
                    self.tied[row] = Some(pitch);
                }
                RowAction::Sustain if sounding == Some(pitch) => {}
                RowAction::Sustain => {
                    if let Some(old) = sounding {
                        self.voice_off(old, StopMode::Release, now);
                    }
                    self.voice_on(pitch, now);
                    self.tied[row] = Some(pitch);
                }
                RowAction::Stop | RowAction::Rest => {
                    if let Some(old) = self.tied[row].take() {
                        self.voice_off(old, StopMode::Release, now);
                    }
                }
            }
        }
    }

    fn schedule_arp_substeps(&mut self, now: f64, step: usize, notes: Vec<Pitch>) {
        let subdivisions = self.params.arp_subdivisions();
        let interval = self.params.arp_interval();
        for sub in 1..subdivisions {
            self.scheduler.schedule(
                now + sub as f64 * interval,
                Action::ArpSubStep {
                    step,
                    sub,
                    subdivisions,
                    notes: notes.clone(),
                },
            );
        }
        self.play_arp_substep(now, step, 0, subdivisions, &notes);
    }

    /// Monophonic: whatever sounds is released before the next arp note.
    fn play_arp_substep(&mut self, at: f64, step: usize, sub: u32, subdivisions: u32, notes: &[Pitch]) {
        if !self.params.arp_mode.is_engaged() {
            return;
        }
        self.release_all(at);

        let index = step as u64 * subdivisions as u64 + sub as u64;
        let pitch = next_arp_pitch(
            notes,
            index,
            self.params.arp_mode,
            self.params.arp_octaves,
            self.params.arp_chords,
            &mut self.rng,
        );
        if let Some(pitch) = pitch {
            let gate = self.params.step_duration() / subdivisions as f64 * GATE_FRACTION;
            self.trigger(pitch, at, gate);
        }
    }

    // ── Transport ───────────────────────────────────────────

    /// Start the sequencer from step 0, playing step 0 immediately.
    pub fn start_sequencer(&mut self, now: f64) {
        let now = self.catch_up(now);
        if self.clock.running {
            return;
        }
        self.stop_arpeggiator_at(now);
        self.current_step = 0;
        self.tied = [None; NUM_ROWS];
        self.restart_clock(now);
        log::debug!("sequencer started at {now:.3} ({} bpm)", self.params.tempo());
        self.run_step(now);
    }

    /// Play/pause. Refused while a song is playing.
    pub fn toggle_sequencer(&mut self, now: f64) -> Result<(), SynthError> {
        let now = self.catch_up(now);
        if self.song.playing {
            return Err(self.reject(SynthError::SongPlaying));
        }
        if self.clock.running {
            self.halt_clock();
            self.notifier.step_marker(None);
            self.silence(now);
            log::debug!("sequencer paused at {now:.3}");
            self.refresh_arpeggiator(now);
        } else {
            self.start_sequencer(now);
        }
        Ok(())
    }

    /// Stop the sequencer (and the song, if one is playing).
    pub fn stop_sequencer(&mut self, now: f64) {
        let now = self.catch_up(now);
        self.stop_sequencer_at(now);
    }

    fn stop_sequencer_at(&mut self, now: f64) {
        self.halt_clock();
        self.notifier.step_marker(None);
        self.silence(now);
        self.current_step = 0;
        log::debug!("sequencer stopped at {now:.3}");
        if self.song.playing {
            self.stop_song_at(now);
        }
        self.refresh_arpeggiator(now);
    }

    // ── Keyboard & arpeggiator ──────────────────────────────

    /// A key went down. Ignored while the sequencer plays.
    pub fn note_on(&mut self, pitch: Pitch, now: f64) {
        let now = self.catch_up(now);
        if self.clock.running {
            return;
        }
        if !self.params.arp_mode.is_engaged() {
            self.voice_on(pitch, now);
        }
        if let Err(index) = self.held.binary_search(&pitch) {
            self.held.insert(index, pitch);
        }
        self.refresh_arpeggiator(now);
    }

    /// A key came up.
    pub fn note_off(&mut self, pitch: Pitch, now: f64) {
        let now = self.catch_up(now);
        if !self.params.arp_mode.is_engaged() {
            self.voice_off(pitch, StopMode::Release, now);
        }
        if let Ok(index) = self.held.binary_search(&pitch) {
            self.held.remove(index);
        }
        self.refresh_arpeggiator(now);
    }

    fn refresh_arpeggiator(&mut self, now: f64) {
        if !self.params.arp_mode.is_engaged() || self.clock.running {
            return;
        }
        if self.held.is_empty() {
            self.stop_arpeggiator_at(now);
        } else {
            self.start_arpeggiator_at(now);
        }
    }

    /// (Re)start the keyboard arpeggiator over the held notes.
    pub fn start_arpeggiator(&mut self, now: f64) {
        let now = self.catch_up(now);
        self.start_arpeggiator_at(now);
    }

    fn start_arpeggiator_at(&mut self, now: f64) {
        self.stop_arpeggiator_at(now);
        if !self.params.arp_mode.is_engaged() || self.held.is_empty() || self.clock.running {
            return;
        }

        self.arp.running = true;
        self.arp.generation += 1;
        self.arp.anchor = now;
        self.arp.interval = self.params.arp_interval();
        self.arp_index = 0;
        self.scheduler.schedule(
            self.arp.tick_time(1),
            Action::ArpTick {
                generation: self.arp.generation,
                tick: 1,
            },
        );
        log::debug!("arpeggiator started over {:?}", self.held);
        self.run_arp_tick(now);
    }

    pub fn stop_arpeggiator(&mut self, now: f64) {
        let now = self.catch_up(now);
        self.stop_arpeggiator_at(now);
    }

    fn stop_arpeggiator_at(&mut self, now: f64) {
        self.scheduler.cancel(|a| matches!(a, Action::ArpTick { .. }));
        if self.arp.running {
            log::debug!("arpeggiator stopped at {now:.3}");
        }
        self.arp.running = false;
        self.arp.generation += 1;
        self.arp_index = 0;
        self.silence(now);
    }

    fn run_arp_tick(&mut self, now: f64) {
        if !self.params.arp_mode.is_engaged() || self.held.is_empty() || self.clock.running {
            self.stop_arpeggiator_at(now);
            return;
        }
        self.release_all(now);

        let pitch = next_arp_pitch(
            &self.held,
            self.arp_index,
            self.params.arp_mode,
            self.params.arp_octaves,
            self.params.arp_chords,
            &mut self.rng,
        );
        if let Some(pitch) = pitch {
            self.trigger(pitch, now, self.arp.interval * GATE_FRACTION);
        }
        self.arp_index += 1;
    }

    // ── Parameters & grid ───────────────────────────────────

    /// Edit the parameters. Arp changes restart the keyboard arpeggiator.
    pub fn update_params(&mut self, now: f64, edit: impl FnOnce(&mut SynthParams)) {
        let now = self.catch_up(now);
        let before = self.params.clone();
        edit(&mut self.params);

        let arp_changed = before.arp_mode != self.params.arp_mode
            || before.arp_rate != self.params.arp_rate
            || before.arp_chords != self.params.arp_chords
            || before.arp_octaves != self.params.arp_octaves;
        if arp_changed {
            self.start_arpeggiator_at(now);
        }
    }

    /// Replace the parameters wholesale and clear the grid.
    pub fn load_patch(&mut self, params: SynthParams) {
        self.params = params;
        self.grid.clear();
    }

    pub fn set_articulation(&mut self, articulation: Articulation) {
        self.config.articulation = articulation;
    }

    pub fn toggle_cell(&mut self, row: usize, step: usize) -> bool {
        self.grid.toggle(row, step)
    }

    pub fn set_cell(&mut self, row: usize, step: usize, on: bool) {
        self.grid.set(row, step, on);
    }

    pub fn set_grid(&mut self, grid: SequenceGrid) {
        self.grid = grid;
    }

    pub fn clear_grid(&mut self) {
        self.grid.clear();
    }

    /// Clear the grid and switch on `count` random cells.
    pub fn randomize_grid(&mut self, count: usize) {
        self.grid.randomize(count, &mut self.rng);
    }

    // ── Song chainer ────────────────────────────────────────

    /// Snapshot the live parameters and grid as a new pattern.
    pub fn save_pattern(&mut self) -> usize {
        let index = self.song.save(&self.params, &self.grid);
        log::debug!("saved {}", self.song.patterns[index].name);
        self.notify_patterns();
        index
    }

    /// Replace the saved patterns. Refused while a song plays.
    pub fn load_song(&mut self, patterns: Vec<Pattern>) -> Result<(), SynthError> {
        if self.song.playing {
            return Err(self.reject(SynthError::SongPlaying));
        }
        self.song.patterns = patterns;
        self.song.current = 0;
        self.song.pending = None;
        self.notify_patterns();
        Ok(())
    }

    fn apply_pattern(&mut self, index: usize) {
        if let Some(pattern) = self.song.patterns.get(index) {
            self.params = pattern.params.clone();
            self.grid = pattern.grid.clone();
            self.song.current = index;
        }
    }

    /// Load a saved pattern into the live state, stopping manual playback.
    pub fn select_pattern(&mut self, index: usize, now: f64) -> Result<(), SynthError> {
        let now = self.catch_up(now);
        if index >= self.song.patterns.len() {
            let len = self.song.patterns.len();
            return Err(self.reject(SynthError::PatternIndex { index, len }));
        }
        if self.clock.running {
            self.stop_sequencer_at(now);
        }
        self.apply_pattern(index);
        self.notify_patterns();
        Ok(())
    }

    /// Delete a saved pattern. Refused while a song plays.
    pub fn delete_pattern(&mut self, index: usize) -> Result<Pattern, SynthError> {
        let removed = match self.song.remove(index) {
            Ok(pattern) => pattern,
            Err(e) => return Err(self.reject(e)),
        };

        if self.song.patterns.is_empty() {
            self.song.reset();
        } else if index == self.song.current {
            self.apply_pattern(0);
        } else if index < self.song.current {
            self.song.current -= 1;
        }
        log::debug!("deleted {}", removed.name);
        self.notify_patterns();
        Ok(removed)
    }

    /// Play the saved patterns in order from the first.
    pub fn start_song(&mut self, now: f64) -> Result<(), SynthError> {
        let now = self.catch_up(now);
        if self.song.patterns.is_empty() {
            return Err(self.reject(SynthError::NoPatterns));
        }
        if self.clock.running {
            self.stop_sequencer_at(now);
        }

        self.song.playing = true;
        self.song.pending = None;
        self.song_ending = false;
        self.apply_pattern(0);
        self.notify_patterns();
        log::debug!("song started with {} patterns", self.song.patterns.len());
        self.start_sequencer(now);
        Ok(())
    }

    pub fn stop_song(&mut self, now: f64) {
        let now = self.catch_up(now);
        self.stop_song_at(now);
    }

    fn stop_song_at(&mut self, now: f64) {
        self.song.reset();
        self.song_ending = false;
        if self.clock.running {
            self.stop_sequencer_at(now);
        }
        self.notify_patterns();
    }

    pub fn toggle_song(&mut self, now: f64) -> Result<(), SynthError> {
        if self.song.playing {
            self.stop_song(now);
            Ok(())
        } else {
            self.start_song(now)
        }
    }

    /// Called on the wrap back to step 0. After the last pattern the song
    /// does not stop here: it is flagged as ending and stops on the next
    /// step-0 tick, so the final step plays its full gate and a live song
    /// ends exactly where the offline plan does.
    fn advance_song(&mut self) {
        if self.song.advance() {
            self.notify_patterns();
        } else {
            self.song_ending = true;
        }
    }

    // ── Export ──────────────────────────────────────────────

    /// Plan an offline render of the song, or of the live pattern when no
    /// song is saved. Live playback stops first.
    pub fn export_plan(&mut self, now: f64, render: &RenderConfig) -> Result<RenderPlan, SynthError> {
        let now = self.catch_up(now);
        let patterns = if self.song.patterns.is_empty() {
            vec![Pattern {
                name: "Current Pattern".to_string(),
                params: self.params.clone(),
                grid: self.grid.clone(),
            }]
        } else {
            self.song.patterns.clone()
        };

        if !offline::has_notes(&patterns) {
            return Err(self.reject(SynthError::NothingToRender));
        }
        if self.song.playing {
            self.stop_song_at(now);
        } else if self.clock.running {
            self.stop_sequencer_at(now);
        }
        offline::plan_song(&patterns, &self.config, render)
    }
}
