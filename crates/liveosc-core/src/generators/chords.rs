//! Chord progressions built from scale degrees.

use super::{root_pitch, Note};
use crate::error::Result;
use crate::theory::{chord_notes, ChordType, Scale};

/// Named four-chord cycles as 1-based scale degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progression {
    /// I-V-vi-IV
    Pop,
    /// ii-V-I-I
    Jazz,
    /// vi-IV-I-V
    Sad,
    /// I-IV-V-V
    Epic,
    /// vi-IV-vi-V
    Dark,
    /// vi-IV-I-V
    Edm,
    /// ii-V-iii-vi
    Lofi,
    /// I-iii-IV-IV
    Cinematic,
}

impl Progression {
    /// Unknown names pick `Pop`.
    pub fn from_name(name: &str) -> Progression {
        match name.trim().to_lowercase().as_str() {
            "jazz" => Progression::Jazz,
            "sad" => Progression::Sad,
            "epic" => Progression::Epic,
            "dark" => Progression::Dark,
            "edm" => Progression::Edm,
            "lofi" => Progression::Lofi,
            "cinematic" => Progression::Cinematic,
            _ => Progression::Pop,
        }
    }

    pub fn degrees(self) -> [usize; 4] {
        match self {
            Progression::Pop => [1, 5, 6, 4],
            Progression::Jazz => [2, 5, 1, 1],
            Progression::Sad => [6, 4, 1, 5],
            Progression::Epic => [1, 4, 5, 5],
            Progression::Dark => [6, 4, 6, 5],
            Progression::Edm => [6, 4, 1, 5],
            Progression::Lofi => [2, 5, 3, 6],
            Progression::Cinematic => [1, 3, 4, 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voicing {
    Basic,
    /// Third and fifth up an octave
    Spread,
    /// Second voice from the top dropped an octave; four-note chords only
    Drop2,
}

impl Voicing {
    pub fn from_name(name: &str) -> Voicing {
        match name.trim().to_lowercase().as_str() {
            "spread" => Voicing::Spread,
            "drop2" => Voicing::Drop2,
            _ => Voicing::Basic,
        }
    }

    fn apply(self, notes: Vec<i32>) -> Vec<i32> {
        match self {
            Voicing::Spread if notes.len() >= 3 => vec![notes[0], notes[1] + 12, notes[2] + 12],
            Voicing::Drop2 if notes.len() >= 4 => vec![notes[0], notes[2], notes[3], notes[1] + 12],
            _ => notes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChordProgressionGenerator {
    root: i32,
    scale: Scale,
}

impl ChordProgressionGenerator {
    /// Chords rooted in octave 3.
    pub fn new(root: &str, scale: Scale) -> Result<Self> {
        Self::with_octave(root, scale, 3)
    }

    pub fn with_octave(root: &str, scale: Scale, octave: i32) -> Result<Self> {
        Ok(Self {
            root: root_pitch(root, octave)?,
            scale,
        })
    }

    /// One whole-bar chord per bar, cycling the progression.
    pub fn generate(&self, bars: u32, progression: Progression, voicing: Voicing) -> Vec<Vec<Note>> {
        let degrees = progression.degrees();
        (0..bars)
            .map(|bar| {
                let degree = degrees[bar as usize % degrees.len()];
                let pitches = voicing.apply(chord_notes(self.degree_root(degree), self.quality(degree)));
                pitches
                    .into_iter()
                    .map(|pitch| Note::new(pitch, bar as f64 * 4.0, 4.0, 80))
                    .collect()
            })
            .collect()
    }

    fn degree_root(&self, degree: usize) -> i32 {
        let intervals = self.scale.intervals();
        self.root + intervals[(degree.max(1) - 1) % intervals.len()]
    }

    /// Diatonic triad quality for a degree.
    pub fn quality(&self, degree: usize) -> ChordType {
        if self.scale.is_major_family() {
            match degree {
                2 | 3 | 6 => ChordType::Minor,
                7 => ChordType::Diminished,
                _ => ChordType::Major,
            }
        } else {
            match degree {
                2 => ChordType::Diminished,
                3 | 6 | 7 => ChordType::Major,
                _ => ChordType::Minor,
            }
        }
    }
}
