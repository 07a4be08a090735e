//! Offline planning: replays a song on the shared virtual clock and
//! collects every note it would play.
//!
//! The replay runs a private [`Session`] over a [`CaptureEngine`] with a
//! fixed seed, so the plan (and anything rendered from it) is exactly what
//! live playback of the same song schedules.

use serde::{Deserialize, Serialize};

use crate::capture::CaptureEngine;
use crate::config::{RenderConfig, SessionConfig, SwapTiming};
use crate::error::SynthError;
use crate::params::SynthParams;
use crate::session::Session;
use crate::song::Pattern;
use crate::theory::Pitch;

/// One note of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedNote {
    pub pitch: Pitch,
    /// Seconds from the start of the render.
    pub start: f64,
    /// Gate length in seconds.
    pub duration: f64,
    /// Index into [`RenderPlan::patches`].
    pub patch: usize,
}

/// The span during which one pattern's chain parameters apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSection {
    pub start: f64,
    pub duration: f64,
    pub patch: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub notes: Vec<PlannedNote>,
    pub sections: Vec<PlannedSection>,
    pub patches: Vec<SynthParams>,
    /// End of the last pattern.
    pub duration: f64,
}

impl RenderPlan {
    /// `(pitch, start, duration)` per note.
    pub fn note_tuples(&self) -> Vec<(Pitch, f64, f64)> {
        self.notes
            .iter()
            .map(|n| (n.pitch, n.start, n.duration))
            .collect()
    }

    /// Section in effect at `time`.
    pub fn section_at(&self, time: f64) -> Option<&PlannedSection> {
        self.sections.iter().rev().find(|s| s.start <= time)
    }
}

/// True when at least one pattern has an on-cell.
pub fn has_notes(patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| !p.grid.is_empty())
}

/// Where each pattern's step 0 lands and how long it plays.
pub fn section_layout(patterns: &[Pattern], swap_timing: SwapTiming) -> Vec<PlannedSection> {
    let mut start = 0.0;
    let mut sections = Vec::with_capacity(patterns.len());
    for (patch, pattern) in patterns.iter().enumerate() {
        if patch > 0 && swap_timing == SwapTiming::SkipSwapTick {
            start += pattern.params.step_duration();
        }
        let duration = pattern.duration();
        sections.push(PlannedSection {
            start,
            duration,
            patch,
        });
        start += duration;
    }
    sections
}

/// Replay `patterns` as a song, under the clock and articulation of
/// `live`, and return every note it plays.
pub fn plan_song(
    patterns: &[Pattern],
    live: &SessionConfig,
    config: &RenderConfig,
) -> Result<RenderPlan, SynthError> {
    if !has_notes(patterns) {
        return Err(SynthError::NothingToRender);
    }

    let mut session = Session::new(CaptureEngine::new(), config.replay_config(live));
    session.load_song(patterns.to_vec())?;
    session.start_song(0.0)?;
    while session.is_song_playing() {
        let Some(next) = session.next_event_time() else {
            break;
        };
        session.advance_to(next);
    }
    let end = session.now();
    session.settle();

    let sections = section_layout(patterns, live.swap_timing);
    let duration = sections.last().map_or(end, |s| s.start + s.duration);

    let mut notes: Vec<PlannedNote> = session
        .into_engine()
        .into_voices()
        .into_iter()
        .map(|voice| {
            let stop = voice.stop.map_or(end, |(at, _)| at);
            let patch = patterns
                .iter()
                .position(|p| p.params == voice.params)
                .or_else(|| sections.iter().rposition(|s| s.start <= voice.start).map(|i| sections[i].patch))
                .unwrap_or_default();
            PlannedNote {
                pitch: voice.pitch,
                start: voice.start,
                duration: (stop - voice.start).max(0.0),
                patch,
            }
        })
        .collect();
    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

    log::debug!(
        "planned {} notes over {:.3}s from {} patterns",
        notes.len(),
        duration,
        patterns.len()
    );

    Ok(RenderPlan {
        notes,
        sections,
        patches: patterns.iter().map(|p| p.params.clone()).collect(),
        duration,
    })
}
