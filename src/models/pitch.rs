//! Pitch-name table
//!
//! Bidirectional lookup between spelled pitch names (`C#4`, `Bb3`, `Fx5`)
//! and MIDI note numbers (C4 = 60). Output always uses sharp spellings.

use crate::error::{Result, SegmentError};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Numeric pitch that stands for a rest in exported tables
pub const REST_PITCH: u8 = 0;

pub const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const LETTERS: [(char, i8); 7] = [
    ('C', 0),
    ('D', 2),
    ('E', 4),
    ('F', 5),
    ('G', 7),
    ('A', 9),
    ('B', 11),
];

const ACCIDENTALS: [(&str, i8); 7] = [
    ("", 0),
    ("n", 0),
    ("#", 1),
    ("##", 2),
    ("x", 2),
    ("b", -1),
    ("bb", -2),
];

lazy_static! {
    /// Spelled pitch class -> semitones above the letter's C, unreduced
    /// (`Cb` is -1, `B#` is 12) so octave arithmetic stays correct.
    static ref SPELLINGS: HashMap<String, i8> = {
        let mut map = HashMap::new();
        for (letter, base) in LETTERS {
            for (accidental, shift) in ACCIDENTALS {
                map.insert(format!("{}{}", letter, accidental), base + shift);
            }
        }
        map
    };
}

/// Sharp-spelled name and octave of a MIDI number, after transposing.
pub fn pitch_label(number: u8, transpose: i8) -> (&'static str, i8) {
    let value = number as i16 + transpose as i16;
    let name = SHARP_NAMES[value.rem_euclid(12) as usize];
    let octave = (value.div_euclid(12) - 1) as i8;
    (name, octave)
}

/// Pitch class 0-11 of a spelled name without octave (`"Db"` -> 1)
pub fn pitch_class(name: &str) -> Result<u8> {
    spelled_offset(name).map(|offset| offset.rem_euclid(12) as u8)
}

fn spelled_offset(name: &str) -> Result<i8> {
    let mut chars = name.chars();
    let normalized = match chars.next() {
        Some(letter) => format!("{}{}", letter.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    };
    SPELLINGS
        .get(&normalized)
        .copied()
        .ok_or_else(|| SegmentError::UnknownPitchName(name.to_string()))
}

/// MIDI number of a full pitch name (`"C#4"` -> 61, `"C-1"` -> 0).
pub fn pitch_number(text: &str) -> Result<u8> {
    let unknown = || SegmentError::UnknownPitchName(text.to_string());

    // Octave starts at the first digit, or a minus sign directly before one
    let bytes = text.as_bytes();
    let split = (1..bytes.len())
        .find(|&i| {
            bytes[i].is_ascii_digit()
                || (bytes[i] == b'-' && bytes.get(i + 1).map_or(false, |b| b.is_ascii_digit()))
        })
        .ok_or_else(unknown)?;

    let offset = spelled_offset(&text[..split]).map_err(|_| unknown())?;
    let octave: i16 = text[split..].parse().map_err(|_| unknown())?;
    let number = (octave + 1) * 12 + offset as i16;
    if !(0..=127).contains(&number) {
        return Err(unknown());
    }
    Ok(number as u8)
}

/// MIDI number from MusicXML `<step>`, `<alter>` and `<octave>`.
pub fn pitch_number_from_step(step: &str, alter: i8, octave: i8) -> Result<u8> {
    let accidental = match alter {
        0 => "",
        1 => "#",
        2 => "##",
        -1 => "b",
        -2 => "bb",
        _ => {
            return Err(SegmentError::UnknownPitchName(format!(
                "{} (alter {})",
                step, alter
            )))
        }
    };
    pitch_number(&format!("{}{}{}", step, accidental, octave))
}
