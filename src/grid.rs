//! The 8x16 step grid and the timing constants every playback path shares.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Scale degrees (rows). Row 0 is the highest pitch.
pub const NUM_ROWS: usize = 8;
/// Sixteenth-note steps (columns) per pattern.
pub const NUM_STEPS: usize = 16;
/// Fraction of a step (or arp sub-step) a triggered note sounds for.
pub const GATE_FRACTION: f64 = 0.9;
/// Tempo used when a patch carries no usable BPM.
pub const DEFAULT_BPM: f64 = 120.0;

/// Seconds per sixteenth-note step at `bpm`.
pub fn step_duration(bpm: f64) -> f64 {
    60.0 / bpm / 4.0
}

/// Seconds a full pattern lasts at `bpm`.
pub fn pattern_duration(bpm: f64) -> f64 {
    NUM_STEPS as f64 * step_duration(bpm)
}

/// On/off matrix of (row, step) cells, stored as 0/1 bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceGrid {
    cells: [[u8; NUM_STEPS]; NUM_ROWS],
}

impl SequenceGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from raw rows. Any non-zero byte counts as on.
    pub fn from_rows(rows: [[u8; NUM_STEPS]; NUM_ROWS]) -> Self {
        let mut grid = Self { cells: rows };
        for row in grid.cells.iter_mut() {
            for cell in row.iter_mut() {
                *cell = u8::from(*cell != 0);
            }
        }
        grid
    }

    /// Out-of-range coordinates read as off.
    pub fn is_on(&self, row: usize, step: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|r| r.get(step))
            .is_some_and(|&c| c != 0)
    }

    /// Out-of-range coordinates are ignored.
    pub fn set(&mut self, row: usize, step: usize, on: bool) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(step)) {
            *cell = u8::from(on);
        }
    }

    /// Flip a cell, returning its new state.
    pub fn toggle(&mut self, row: usize, step: usize) -> bool {
        let on = !self.is_on(row, step);
        self.set(row, step, on);
        on
    }

    pub fn clear(&mut self) {
        self.cells = [[0; NUM_STEPS]; NUM_ROWS];
    }

    /// Clear the grid, then switch on `count` distinct random cells.
    pub fn randomize<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) {
        let mut coords: Vec<(usize, usize)> = (0..NUM_ROWS)
            .flat_map(|row| (0..NUM_STEPS).map(move |step| (row, step)))
            .collect();
        coords.shuffle(rng);

        self.clear();
        for &(row, step) in coords.iter().take(count) {
            self.cells[row][step] = 1;
        }
    }

    /// Rows that are on at `step`, top to bottom.
    pub fn active_rows(&self, step: usize) -> impl Iterator<Item = usize> + '_ {
        (0..NUM_ROWS).filter(move |&row| self.is_on(row, step))
    }

    pub fn count(&self) -> usize {
        self.cells.iter().flatten().filter(|&&c| c != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// How consecutive on-cells in a row are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Articulation {
    /// Every on-cell retriggers and is gated to 90% of the step.
    #[default]
    Staccato,
    /// A run of on-cells is one tied note.
    Legato,
}

/// What a row does at a step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    /// Start the row's note.
    Start,
    /// Release the row's note.
    Stop,
    /// Leave the sounding note alone.
    Sustain,
    /// Nothing sounds.
    Rest,
}

impl Articulation {
    /// Decide a row's action from its cell at the previous and current step.
    pub fn row_action(&self, prev_on: bool, cur_on: bool) -> RowAction {
        match (self, prev_on, cur_on) {
            (Articulation::Staccato, _, true) => RowAction::Start,
            (Articulation::Staccato, _, false) => RowAction::Rest,
            (Articulation::Legato, false, true) => RowAction::Start,
            (Articulation::Legato, true, false) => RowAction::Stop,
            (Articulation::Legato, true, true) => RowAction::Sustain,
            (Articulation::Legato, false, false) => RowAction::Rest,
        }
    }
}

/// The step before `step`, wrapping at the pattern boundary.
pub fn previous_step(step: usize) -> usize {
    (step + NUM_STEPS - 1) % NUM_STEPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn step_timing() {
        assert!((step_duration(120.0) - 0.125).abs() < 1e-12);
        assert!((pattern_duration(120.0) - 2.0).abs() < 1e-12);
        assert!((step_duration(60.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn toggle_and_bounds() {
        let mut grid = SequenceGrid::new();
        assert!(grid.toggle(2, 5));
        assert!(grid.is_on(2, 5));
        assert!(!grid.toggle(2, 5));
        assert!(grid.is_empty());

        grid.set(NUM_ROWS, 0, true);
        grid.set(0, NUM_STEPS, true);
        assert!(grid.is_empty());
        assert!(!grid.is_on(99, 99));
    }

    #[test]
    fn randomize_sets_exactly_count_cells() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut grid = SequenceGrid::new();
        grid.set(0, 0, true);
        grid.randomize(20, &mut rng);
        assert_eq!(grid.count(), 20);

        grid.randomize(500, &mut rng);
        assert_eq!(grid.count(), NUM_ROWS * NUM_STEPS);

        grid.randomize(0, &mut rng);
        assert!(grid.is_empty());
    }

    #[test]
    fn active_rows_top_to_bottom() {
        let mut grid = SequenceGrid::new();
        grid.set(6, 3, true);
        grid.set(1, 3, true);
        grid.set(4, 4, true);
        assert_eq!(grid.active_rows(3).collect::<Vec<_>>(), vec![1, 6]);
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let mut grid = SequenceGrid::new();
        grid.set(0, 1, true);
        let json = serde_json::to_string(&grid).unwrap();
        assert!(json.starts_with("[[0,1,0"));
        let back: SequenceGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn from_rows_normalizes_to_bits() {
        let mut rows = [[0u8; NUM_STEPS]; NUM_ROWS];
        rows[3][7] = 5;
        let grid = SequenceGrid::from_rows(rows);
        assert!(grid.is_on(3, 7));
        assert_eq!(grid.count(), 1);
    }

    #[test]
    fn articulation_tables() {
        let s = Articulation::Staccato;
        assert_eq!(s.row_action(true, true), RowAction::Start);
        assert_eq!(s.row_action(false, true), RowAction::Start);
        assert_eq!(s.row_action(true, false), RowAction::Rest);

        let l = Articulation::Legato;
        assert_eq!(l.row_action(false, true), RowAction::Start);
        assert_eq!(l.row_action(true, false), RowAction::Stop);
        assert_eq!(l.row_action(true, true), RowAction::Sustain);
        assert_eq!(l.row_action(false, false), RowAction::Rest);
    }

    #[test]
    fn previous_step_wraps() {
        assert_eq!(previous_step(0), 15);
        assert_eq!(previous_step(7), 6);
    }
}
