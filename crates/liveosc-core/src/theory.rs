//! Pitch, scale and chord arithmetic.
//!
//! Pitches are plain MIDI note numbers held in `i32` so that octave stacking
//! can be done without overflow checks; callers that place notes on the wire
//! are responsible for keeping them inside 0..=127.

use std::fmt;

/// Note names used when rendering MIDI numbers back to text.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scale types as ascending semitone offsets from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
}

impl Scale {
    pub const ALL: [Scale; 12] = [
        Scale::Major,
        Scale::Minor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::HarmonicMinor,
        Scale::MelodicMinor,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
    ];

    pub fn intervals(self) -> &'static [i32] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }

    /// Look up a scale by name. Accepts the common aliases.
    pub fn from_name(name: &str) -> Option<Scale> {
        let scale = match name.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "major" | "ionian" | "maj" => Scale::Major,
            "minor" | "natural_minor" | "aeolian" | "min" | "m" => Scale::Minor,
            "dorian" => Scale::Dorian,
            "phrygian" => Scale::Phrygian,
            "lydian" => Scale::Lydian,
            "mixolydian" => Scale::Mixolydian,
            "locrian" => Scale::Locrian,
            "harmonic_minor" => Scale::HarmonicMinor,
            "melodic_minor" => Scale::MelodicMinor,
            "pentatonic_major" | "major_pentatonic" => Scale::PentatonicMajor,
            "pentatonic" | "pentatonic_minor" | "minor_pentatonic" => Scale::PentatonicMinor,
            "blues" => Scale::Blues,
            _ => return None,
        };
        Some(scale)
    }

    /// Major-family scales take major diatonic triads on degrees I, IV and V.
    pub fn is_major_family(self) -> bool {
        matches!(self, Scale::Major | Scale::Lydian | Scale::Mixolydian)
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::HarmonicMinor => "harmonic_minor",
            Scale::MelodicMinor => "melodic_minor",
            Scale::PentatonicMajor => "pentatonic_major",
            Scale::PentatonicMinor => "pentatonic_minor",
            Scale::Blues => "blues",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Chord qualities as semitone offsets from the chord root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordType {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Major7,
    Minor7,
    Dominant7,
    Diminished7,
    Minor9,
    Major9,
}

impl ChordType {
    pub fn intervals(self) -> &'static [i32] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::Augmented => &[0, 4, 8],
            ChordType::Sus2 => &[0, 2, 7],
            ChordType::Sus4 => &[0, 5, 7],
            ChordType::Major7 => &[0, 4, 7, 11],
            ChordType::Minor7 => &[0, 3, 7, 10],
            ChordType::Dominant7 => &[0, 4, 7, 10],
            ChordType::Diminished7 => &[0, 3, 6, 9],
            ChordType::Minor9 => &[0, 3, 7, 10, 14],
            ChordType::Major9 => &[0, 4, 7, 11, 14],
        }
    }

    pub fn from_name(name: &str) -> Option<ChordType> {
        let chord = match name.trim().to_lowercase().as_str() {
            "maj" | "major" => ChordType::Major,
            "min" | "minor" | "m" => ChordType::Minor,
            "dim" | "diminished" => ChordType::Diminished,
            "aug" | "augmented" => ChordType::Augmented,
            "sus2" => ChordType::Sus2,
            "sus4" => ChordType::Sus4,
            "maj7" | "major7" => ChordType::Major7,
            "min7" | "m7" | "minor7" => ChordType::Minor7,
            "7" | "dom7" | "dominant7" => ChordType::Dominant7,
            "dim7" => ChordType::Diminished7,
            "min9" | "m9" => ChordType::Minor9,
            "maj9" => ChordType::Major9,
            _ => return None,
        };
        Some(chord)
    }
}

/// Convert a note name to a MIDI number, e.g. `("C", 4)` -> 60.
///
/// Accepts `#`/`♯` and `b`/`♭` accidentals. Accidentals wrap within the
/// octave, so `Cb` in octave 4 is B4 (71).
pub fn note_to_midi(name: &str, octave: i32) -> Option<i32> {
    let mut chars = name.trim().chars();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut accidental: i32 = 0;
    for c in chars {
        match c {
            '#' | '♯' => accidental += 1,
            'b' | '♭' => accidental -= 1,
            _ => return None,
        }
    }

    let pitch_class = (base + accidental).rem_euclid(12);
    Some(pitch_class + (octave + 1) * 12)
}

/// Convert a MIDI number to a note name with octave, e.g. 60 -> "C4".
pub fn midi_to_note(midi: i32) -> String {
    let octave = midi.div_euclid(12) - 1;
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    format!("{}{}", name, octave)
}

/// Tile a scale across `octaves` octaves starting at `root`, dropping
/// anything above 127.
pub fn scale_notes(root: i32, scale: Scale, octaves: u32) -> Vec<i32> {
    let mut notes = Vec::with_capacity(scale.intervals().len() * octaves as usize);
    for octave in 0..octaves as i32 {
        for interval in scale.intervals() {
            let note = root + interval + octave * 12;
            if note <= 127 {
                notes.push(note);
            }
        }
    }
    notes
}

/// Offset `root` by each chord interval. No range filtering.
pub fn chord_notes(root: i32, chord: ChordType) -> Vec<i32> {
    chord.intervals().iter().map(|i| root + i).collect()
}

/// A musical key such as "Am" or "C".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Root note name without octave
    pub root: String,
    pub scale: Scale,
}

impl Key {
    /// Parse "Am", "F#m", "C", "D minor", "Eb dorian". A bare root is major.
    pub fn parse(key: &str) -> Option<Key> {
        let key = key.trim();
        let split = key
            .char_indices()
            .skip(1)
            .find(|(_, c)| !matches!(c, '#' | '♯' | 'b' | '♭'))
            .map(|(i, _)| i)
            .unwrap_or(key.len());
        let (root, rest) = key.split_at(split);
        note_to_midi(root, 4)?;

        let rest = rest.trim();
        let scale = if rest.is_empty() {
            Scale::Major
        } else {
            Scale::from_name(rest)?
        };
        Some(Key {
            root: root.to_string(),
            scale,
        })
    }

    /// MIDI number of the key root in the given octave.
    pub fn root_midi(&self, octave: i32) -> i32 {
        note_to_midi(&self.root, octave).unwrap_or((octave + 1) * 12)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.root, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_midi() {
        assert_eq!(note_to_midi("C", 4), Some(60));
        assert_eq!(note_to_midi("A", 4), Some(69));
        assert_eq!(note_to_midi("c#", 4), Some(61));
        assert_eq!(note_to_midi("Db", 4), Some(61));
        assert_eq!(note_to_midi("F♯", 2), Some(42));
        assert_eq!(note_to_midi("B#", 4), Some(60));
        assert_eq!(note_to_midi("Cb", 4), Some(71));
        assert_eq!(note_to_midi("H", 4), None);
        assert_eq!(note_to_midi("", 4), None);
    }

    #[test]
    fn test_accidentals_stack() {
        assert_eq!(note_to_midi("Bb", 3), Some(58));
        assert_eq!(note_to_midi("G##", 4), Some(69));
        assert_eq!(note_to_midi("Ebb", 4), Some(62));
        assert_eq!(note_to_midi("E♭", 4), Some(63));
        assert_eq!(note_to_midi("C#x", 4), None);
    }

    #[test]
    fn test_midi_to_note() {
        assert_eq!(midi_to_note(60), "C4");
        assert_eq!(midi_to_note(61), "C#4");
        assert_eq!(midi_to_note(0), "C-1");
        assert_eq!(midi_to_note(127), "G9");
    }

    #[test]
    fn test_scale_notes_two_octaves() {
        let notes = scale_notes(60, Scale::Minor, 2);
        assert_eq!(notes.len(), 14);
        assert_eq!(&notes[..7], &[60, 62, 63, 65, 67, 68, 70]);
        assert_eq!(notes[7], 72);
    }

    #[test]
    fn test_scale_notes_filters_above_127() {
        let notes = scale_notes(120, Scale::Major, 2);
        assert!(notes.iter().all(|n| *n <= 127));
        assert_eq!(notes, vec![120, 122, 124, 125, 127]);
    }

    #[test]
    fn test_chord_notes_unfiltered() {
        assert_eq!(chord_notes(60, ChordType::Minor7), vec![60, 63, 67, 70]);
        assert_eq!(chord_notes(125, ChordType::Major), vec![125, 129, 132]);
    }

    #[test]
    fn test_scale_and_chord_names() {
        assert_eq!(Scale::from_name("Harmonic Minor"), Some(Scale::HarmonicMinor));
        assert_eq!(Scale::from_name("pentatonic"), Some(Scale::PentatonicMinor));
        assert_eq!(Scale::from_name("aeolian"), Some(Scale::Minor));
        assert_eq!(Scale::from_name("nope"), None);
        assert_eq!(ChordType::from_name("m7"), Some(ChordType::Minor7));
        assert_eq!(ChordType::from_name("dom7"), Some(ChordType::Dominant7));
        assert_eq!(ChordType::from_name("xyz"), None);
    }

    #[test]
    fn test_key_parse() {
        let key = Key::parse("Am").unwrap();
        assert_eq!(key.root, "A");
        assert_eq!(key.scale, Scale::Minor);

        let key = Key::parse("F#m").unwrap();
        assert_eq!(key.root, "F#");
        assert_eq!(key.scale, Scale::Minor);

        let key = Key::parse("C").unwrap();
        assert_eq!(key.scale, Scale::Major);

        let key = Key::parse("Eb dorian").unwrap();
        assert_eq!(key.root, "Eb");
        assert_eq!(key.scale, Scale::Dorian);
        assert_eq!(key.root_midi(3), 51);

        assert!(Key::parse("Xm").is_none());
    }

    #[test]
    fn test_major_family() {
        assert!(Scale::Major.is_major_family());
        assert!(Scale::Mixolydian.is_major_family());
        assert!(!Scale::Dorian.is_major_family());
    }
}
