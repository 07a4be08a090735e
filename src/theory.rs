//! Static music tables: scales, arpeggiator chord shapes, pitch helpers.

use serde::{Deserialize, Serialize};

use crate::grid::NUM_ROWS;

/// A semitone number, MIDI-like (C4 = 60). Unbounded; octave math may
/// push it outside 0..=127.
pub type Pitch = i32;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The modes the sequencer grid can be laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Major,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Minor,
    Locrian,
}

impl Scale {
    pub const ALL: [Scale; 7] = [
        Scale::Major,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Minor,
        Scale::Locrian,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scale::Major => "Ionian (Major)",
            Scale::Dorian => "Dorian",
            Scale::Phrygian => "Phrygian",
            Scale::Lydian => "Lydian",
            Scale::Mixolydian => "Mixolydian",
            Scale::Minor => "Aeolian (Minor)",
            Scale::Locrian => "Locrian",
        }
    }

    /// Semitone offsets from the root, eight degrees including the octave.
    pub fn offsets(&self) -> [Pitch; NUM_ROWS] {
        match self {
            Scale::Major => [0, 2, 4, 5, 7, 9, 11, 12],
            Scale::Dorian => [0, 2, 3, 5, 7, 9, 10, 12],
            Scale::Phrygian => [0, 1, 3, 5, 7, 8, 10, 12],
            Scale::Lydian => [0, 2, 4, 6, 7, 9, 11, 12],
            Scale::Mixolydian => [0, 2, 4, 5, 7, 9, 10, 12],
            Scale::Minor => [0, 2, 3, 5, 7, 8, 10, 12],
            Scale::Locrian => [0, 1, 3, 5, 6, 8, 10, 12],
        }
    }
}

/// Row pitches for the grid: row 0 is the highest degree.
pub fn scale_pitches(scale: Scale, base_octave: Pitch) -> [Pitch; NUM_ROWS] {
    let mut pitches = scale.offsets().map(|offset| base_octave + offset);
    pitches.reverse();
    pitches
}

/// Chord shapes the arpeggiator can spell from the lowest held note.
///
/// `HeldNotes` (and any key this build does not know) means "cycle the held
/// notes themselves".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordSet {
    #[default]
    HeldNotes,
    MajorTriad,
    MinorTriad,
    SeventhChord,
    FifthChord,
    #[serde(other)]
    Unknown,
}

impl ChordSet {
    /// Interval table for this chord, or `None` for held-notes mode.
    pub fn intervals(&self) -> Option<&'static [Pitch]> {
        match self {
            ChordSet::HeldNotes | ChordSet::Unknown => None,
            ChordSet::MajorTriad => Some(&[0, 4, 7]),
            ChordSet::MinorTriad => Some(&[0, 3, 7]),
            ChordSet::SeventhChord => Some(&[0, 4, 7, 10]),
            ChordSet::FifthChord => Some(&[0, 7]),
        }
    }
}

/// Equal-tempered frequency for a pitch, A4 (69) = 440 Hz.
pub fn midi_to_frequency(pitch: Pitch) -> f64 {
    440.0 * (2.0_f64).powf((pitch as f64 - 69.0) / 12.0)
}

/// Display name such as `C4` or `F#3`.
pub fn note_name(pitch: Pitch) -> String {
    let index = pitch.rem_euclid(12) as usize;
    let octave = pitch.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[index], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_rows_run_high_to_low() {
        let rows = scale_pitches(Scale::Major, 60);
        assert_eq!(rows[0], 72);
        assert_eq!(rows[7], 60);
        assert_eq!(rows, [72, 71, 69, 67, 65, 64, 62, 60]);
    }

    #[test]
    fn every_scale_spans_an_octave() {
        for scale in Scale::ALL {
            let offsets = scale.offsets();
            assert_eq!(offsets[0], 0, "{}", scale.name());
            assert_eq!(offsets[7], 12, "{}", scale.name());
            assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn unknown_chord_key_falls_back_to_held_notes() {
        let chord: ChordSet = serde_json::from_str("\"ninth_chord\"").unwrap();
        assert_eq!(chord, ChordSet::Unknown);
        assert!(chord.intervals().is_none());

        let seventh: ChordSet = serde_json::from_str("\"seventh_chord\"").unwrap();
        assert_eq!(seventh.intervals(), Some(&[0, 4, 7, 10][..]));
    }

    #[test]
    fn frequency_reference_points() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_frequency(60) - 261.626).abs() < 0.01);
        assert!((midi_to_frequency(81) - 880.0).abs() < 1e-9);
    }

    #[test]
    fn note_names() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(66), "F#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(-1), "B-2");
    }
}
