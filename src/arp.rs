//! Arpeggiator: maps a pitch set and a running step index to the next
//! pitch to sound.
//!
//! Two cycles are supported. In held-notes mode the cycle walks the held
//! pitches themselves, repeated `octaves` times with each repetition a
//! further 12 semitones up. In chord mode the cycle walks a fixed interval
//! table stacked on the lowest held note. The playback order only decides
//! which slot of that cycle plays at a given step.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::theory::{ChordSet, Pitch};

/// Playback order for the arpeggiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArpMode {
    #[default]
    Off,
    Up,
    Down,
    #[serde(alias = "up-down", alias = "up_down")]
    UpDown,
    Random,
    /// A mode key this build does not know; always plays slot 0.
    #[serde(other)]
    Unknown,
}

impl ArpMode {
    /// True for every mode except `Off`.
    pub fn is_engaged(&self) -> bool {
        !matches!(self, ArpMode::Off)
    }
}

/// Pick a slot in `[0, total_slots)` for `step_index`.
///
/// `total_slots` must be non-zero.
pub fn arp_slot<R: Rng + ?Sized>(
    mode: ArpMode,
    total_slots: usize,
    step_index: u64,
    rng: &mut R,
) -> usize {
    let total = total_slots as u64;
    match mode {
        ArpMode::Up => (step_index % total) as usize,
        ArpMode::Down => (total - 1 - step_index % total) as usize,
        ArpMode::UpDown => {
            // A single slot has no return leg.
            if total <= 1 {
                return 0;
            }
            let cycle = total * 2 - 2;
            let pos = step_index % cycle;
            if pos < total { pos as usize } else { (cycle - pos) as usize }
        }
        ArpMode::Random => rng.gen_range(0..total_slots),
        ArpMode::Off | ArpMode::Unknown => 0,
    }
}

/// The pitch the arpeggiator plays at `step_index`.
///
/// `notes` must be sorted ascending; the lowest is the chord root. Returns
/// `None` when there is nothing to cycle through.
pub fn next_arp_pitch<R: Rng + ?Sized>(
    notes: &[Pitch],
    step_index: u64,
    mode: ArpMode,
    octaves: u32,
    chord: ChordSet,
    rng: &mut R,
) -> Option<Pitch> {
    let root = *notes.first()?;
    let (cycle, base): (&[Pitch], Pitch) = match chord.intervals() {
        Some(intervals) => (intervals, root),
        None => (notes, 0),
    };

    let total_slots = cycle.len() * octaves as usize;
    if total_slots == 0 {
        return None;
    }

    let slot = arp_slot(mode, total_slots, step_index, rng);
    let octave_offset = (slot / cycle.len()) as Pitch * 12;
    Some(base + cycle[slot % cycle.len()] + octave_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn sequence(notes: &[Pitch], mode: ArpMode, octaves: u32, chord: ChordSet, n: u64) -> Vec<Pitch> {
        let mut rng = rng();
        (0..n)
            .map(|i| next_arp_pitch(notes, i, mode, octaves, chord, &mut rng).unwrap())
            .collect()
    }

    #[test]
    fn up_walks_held_notes_and_repeats() {
        let seq = sequence(&[60, 64, 67], ArpMode::Up, 1, ChordSet::HeldNotes, 4);
        assert_eq!(seq, vec![60, 64, 67, 60]);
    }

    #[test]
    fn down_walks_held_notes_in_reverse() {
        let seq = sequence(&[60, 64, 67], ArpMode::Down, 1, ChordSet::HeldNotes, 3);
        assert_eq!(seq, vec![67, 64, 60]);
    }

    #[test]
    fn octave_span_stacks_repetitions() {
        let seq = sequence(&[60, 64], ArpMode::Up, 2, ChordSet::HeldNotes, 5);
        assert_eq!(seq, vec![60, 64, 72, 76, 60]);
    }

    #[test]
    fn chord_mode_spells_from_the_root() {
        let seq = sequence(&[62, 65], ArpMode::Up, 2, ChordSet::MinorTriad, 7);
        assert_eq!(seq, vec![62, 65, 69, 74, 77, 81, 62]);
    }

    #[test]
    fn up_down_ping_pongs_without_repeating_the_ends() {
        let seq = sequence(&[60, 64, 67, 71], ArpMode::UpDown, 1, ChordSet::HeldNotes, 8);
        assert_eq!(seq, vec![60, 64, 67, 71, 67, 64, 60, 64]);
    }

    #[test]
    fn up_down_with_one_slot_stays_put() {
        let seq = sequence(&[60], ArpMode::UpDown, 1, ChordSet::HeldNotes, 5);
        assert_eq!(seq, vec![60; 5]);
    }

    #[test]
    fn up_and_down_cover_every_slot_per_window() {
        let mut rng = rng();
        for total in 1..=12usize {
            for start in [0u64, 5, 97] {
                let mut seen_up = vec![false; total];
                let mut seen_down = vec![false; total];
                for i in start..start + total as u64 {
                    let up = arp_slot(ArpMode::Up, total, i, &mut rng);
                    let down = arp_slot(ArpMode::Down, total, i, &mut rng);
                    assert_eq!(down, total - 1 - up);
                    seen_up[up] = true;
                    seen_down[down] = true;
                }
                assert!(seen_up.iter().all(|&s| s), "up missed a slot for {total}");
                assert!(seen_down.iter().all(|&s| s), "down missed a slot for {total}");
            }
        }
    }

    #[test]
    fn up_down_cycle_is_a_palindrome() {
        let mut rng = rng();
        for total in 2..=10usize {
            let cycle = (2 * total - 2) as u64;
            for p in 1..total as u64 {
                assert_eq!(
                    arp_slot(ArpMode::UpDown, total, p, &mut rng),
                    arp_slot(ArpMode::UpDown, total, cycle - p, &mut rng),
                );
            }
        }
    }

    #[test]
    fn random_stays_in_range() {
        let mut rng = rng();
        for _ in 0..500 {
            let pitch =
                next_arp_pitch(&[60, 64, 67], 0, ArpMode::Random, 2, ChordSet::HeldNotes, &mut rng)
                    .unwrap();
            assert!([60, 64, 67, 72, 76, 79].contains(&pitch), "got {pitch}");
        }
    }

    #[test]
    fn unknown_mode_plays_the_first_slot() {
        let mode: ArpMode = serde_json::from_str("\"converge\"").unwrap();
        assert_eq!(mode, ArpMode::Unknown);
        let seq = sequence(&[60, 64, 67], mode, 2, ChordSet::HeldNotes, 4);
        assert_eq!(seq, vec![60; 4]);
    }

    #[test]
    fn nothing_to_play() {
        let mut rng = rng();
        assert_eq!(next_arp_pitch(&[], 0, ArpMode::Up, 1, ChordSet::HeldNotes, &mut rng), None);
        assert_eq!(next_arp_pitch(&[60], 0, ArpMode::Up, 0, ChordSet::MajorTriad, &mut rng), None);
    }

    #[test]
    fn mode_keys_match_patch_values() {
        let mode: ArpMode = serde_json::from_str("\"updown\"").unwrap();
        assert_eq!(mode, ArpMode::UpDown);
        assert_eq!(serde_json::to_string(&ArpMode::Off).unwrap(), "\"off\"");
    }
}
