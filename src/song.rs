//! Saved patterns and the song chain built from them.

use serde::{Deserialize, Serialize};

use crate::error::SynthError;
use crate::grid::{self, SequenceGrid};
use crate::params::SynthParams;

/// A saved (parameters, grid) snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    #[serde(alias = "state")]
    pub params: SynthParams,
    #[serde(alias = "sequence")]
    pub grid: SequenceGrid,
}

impl Pattern {
    /// Snapshot `params` and `grid` under the label for slot `index`.
    pub fn snapshot(index: usize, params: &SynthParams, grid: &SequenceGrid) -> Self {
        Pattern {
            name: pattern_label(index),
            params: params.clone(),
            grid: grid.clone(),
        }
    }

    /// Tile text for the pattern list, e.g. `Pattern A (Dorian)`.
    pub fn tile_label(&self) -> String {
        format!("{} ({})", self.name, self.params.scale_key.name())
    }

    /// Seconds this pattern plays for at its own tempo.
    pub fn duration(&self) -> f64 {
        grid::pattern_duration(self.params.tempo())
    }
}

/// `Pattern A`, `Pattern B`, ... for slot 0, 1, ...
///
/// Past `Z` the label continues through the following code points, as
/// the front end always has.
pub fn pattern_label(index: usize) -> String {
    let letter = char::from_u32(65 + index as u32).unwrap_or('?');
    format!("Pattern {letter}")
}

/// An ordered chain of patterns, as exported or imported as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub patterns: Vec<Pattern>,
}

impl Song {
    /// Accepts either `{"patterns": [...]}` or a bare pattern array.
    pub fn from_json(json: &str) -> Result<Self, SynthError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum SongJson {
            Song(Song),
            Patterns(Vec<Pattern>),
        }

        Ok(match serde_json::from_str(json)? {
            SongJson::Song(song) => song,
            SongJson::Patterns(patterns) => Song { patterns },
        })
    }

    pub fn to_json(&self) -> Result<String, SynthError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Song chainer state.
#[derive(Debug, Clone, Default)]
pub struct SongState {
    pub patterns: Vec<Pattern>,
    pub playing: bool,
    /// Pattern loaded or playing.
    pub current: usize,
    /// Pattern to swap in at the next step-0 boundary.
    pub pending: Option<usize>,
}

impl SongState {
    /// Append a snapshot, returning its index.
    pub fn save(&mut self, params: &SynthParams, grid: &SequenceGrid) -> usize {
        let index = self.patterns.len();
        self.patterns.push(Pattern::snapshot(index, params, grid));
        index
    }

    /// Label the next save will get.
    pub fn next_label(&self) -> String {
        pattern_label(self.patterns.len())
    }

    /// Remove a pattern and reletter the ones after it.
    pub fn remove(&mut self, index: usize) -> Result<Pattern, SynthError> {
        if self.playing {
            return Err(SynthError::SongPlaying);
        }
        if index >= self.patterns.len() {
            return Err(SynthError::PatternIndex {
                index,
                len: self.patterns.len(),
            });
        }

        let removed = self.patterns.remove(index);
        for (i, pattern) in self.patterns.iter_mut().enumerate().skip(index) {
            pattern.name = pattern_label(i);
        }
        Ok(removed)
    }

    /// Arm the next pattern. Returns `false` at the end of the chain.
    pub fn advance(&mut self) -> bool {
        if self.current + 1 >= self.patterns.len() {
            return false;
        }
        self.current += 1;
        self.pending = Some(self.current);
        true
    }

    /// Back to idle at the head of the chain.
    pub fn reset(&mut self) {
        self.playing = false;
        self.pending = None;
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(row: usize, step: usize) -> SequenceGrid {
        let mut grid = SequenceGrid::new();
        grid.set(row, step, true);
        grid
    }

    #[test]
    fn tile_label_names_the_scale() {
        let mut params = SynthParams::default();
        params.scale_key = crate::theory::Scale::Minor;
        let pattern = Pattern::snapshot(1, &params, &grid_with(0, 0));
        assert_eq!(pattern.tile_label(), "Pattern B (Aeolian (Minor))");
    }

    #[test]
    fn labels_are_lettered() {
        assert_eq!(pattern_label(0), "Pattern A");
        assert_eq!(pattern_label(2), "Pattern C");
        assert_eq!(pattern_label(25), "Pattern Z");
    }

    #[test]
    fn save_takes_a_deep_copy() {
        let mut song = SongState::default();
        let params = SynthParams::default();
        let mut live = grid_with(0, 0);
        song.save(&params, &live);

        live.set(5, 5, true);
        live.set(0, 0, false);
        assert_eq!(song.patterns[0].grid, grid_with(0, 0));
        assert_eq!(song.next_label(), "Pattern B");
    }

    #[test]
    fn delete_reletters_and_keeps_content() {
        let mut song = SongState::default();
        let params = SynthParams::default();
        for row in 0..3 {
            song.save(&params, &grid_with(row, row));
        }

        let removed = song.remove(1).unwrap();
        assert_eq!(removed.grid, grid_with(1, 1));
        let names: Vec<_> = song.patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Pattern A", "Pattern B"]);
        assert_eq!(song.patterns[0].grid, grid_with(0, 0));
        assert_eq!(song.patterns[1].grid, grid_with(2, 2));
    }

    #[test]
    fn delete_is_refused_while_playing_or_out_of_range() {
        let mut song = SongState::default();
        song.save(&SynthParams::default(), &SequenceGrid::new());
        assert!(matches!(
            song.remove(3),
            Err(SynthError::PatternIndex { index: 3, len: 1 })
        ));
        song.playing = true;
        assert!(matches!(song.remove(0), Err(SynthError::SongPlaying)));
        assert_eq!(song.patterns.len(), 1);
    }

    #[test]
    fn advance_arms_until_the_last_pattern() {
        let mut song = SongState::default();
        for _ in 0..2 {
            song.save(&SynthParams::default(), &SequenceGrid::new());
        }
        assert!(song.advance());
        assert_eq!((song.current, song.pending), (1, Some(1)));
        assert!(!song.advance());
        song.reset();
        assert_eq!((song.current, song.pending, song.playing), (0, None, false));
    }

    #[test]
    fn song_json_accepts_front_end_field_names() {
        let json = r#"[{"name": "Pattern A", "state": {"bpm": 100},
                       "sequence": [[1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
                                    [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1]]}]"#;
        let song = Song::from_json(json).unwrap();
        assert_eq!(song.patterns.len(), 1);
        assert_eq!(song.patterns[0].params.bpm, 100.0);
        assert!(song.patterns[0].grid.is_on(0, 0));
        assert!(song.patterns[0].grid.is_on(7, 15));
        assert!((song.patterns[0].duration() - 16.0 * 0.15).abs() < 1e-12);

        let round = Song::from_json(&song.to_json().unwrap()).unwrap();
        assert_eq!(round, song);
    }
}
