//! Melody generation: rhythm from density, pitch from a contour over a scale.

use super::{root_pitch, Note};
use crate::error::Result;
use crate::theory::{scale_notes, Scale};
use rand::Rng;

/// Shape that maps note index to scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contour {
    Ascending,
    Descending,
    Wave,
    Random,
}

impl Contour {
    /// Unknown names pick `Random`.
    pub fn from_name(name: &str) -> Contour {
        match name.trim().to_lowercase().as_str() {
            "ascending" | "up" => Contour::Ascending,
            "descending" | "down" => Contour::Descending,
            "wave" => Contour::Wave,
            _ => Contour::Random,
        }
    }

    fn degrees<R: Rng + ?Sized>(self, rng: &mut R, length: usize) -> Vec<usize> {
        match self {
            Contour::Ascending => (0..length).collect(),
            Contour::Descending => (0..length).rev().collect(),
            // 3, 4, 6, 7, 9, 10, 12, 13 repeating every 8 notes
            Contour::Wave => (0..length)
                .map(|i| (3.0 * (1.0 + 0.5 * (i % 8) as f64)) as usize)
                .collect(),
            Contour::Random => (0..length).map(|_| rng.random_range(0..=7)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteLength {
    Short,
    Long,
    Mixed,
}

impl NoteLength {
    pub fn from_name(name: &str) -> NoteLength {
        match name.trim().to_lowercase().as_str() {
            "short" => NoteLength::Short,
            "long" => NoteLength::Long,
            _ => NoteLength::Mixed,
        }
    }

    fn choices(self) -> &'static [f64] {
        match self {
            NoteLength::Short => &[0.25, 0.5],
            NoteLength::Long => &[1.0, 2.0],
            NoteLength::Mixed => &[0.25, 0.5, 0.75, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MelodyOptions {
    pub bars: u32,
    /// 0.0 = sparse, 1.0 = every step
    pub density: f64,
    pub note_length: NoteLength,
    pub contour: Contour,
    /// Explicit onset positions in beats; replaces the density rhythm
    pub rhythm: Option<Vec<f64>>,
}

impl Default for MelodyOptions {
    fn default() -> Self {
        Self {
            bars: 4,
            density: 0.5,
            note_length: NoteLength::Mixed,
            contour: Contour::Wave,
            rhythm: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MelodyGenerator {
    scale_notes: Vec<i32>,
}

impl MelodyGenerator {
    /// Melody rooted in octave 4, spanning two octaves of `scale`.
    pub fn new(root: &str, scale: Scale) -> Result<Self> {
        Self::with_octave(root, scale, 4)
    }

    pub fn with_octave(root: &str, scale: Scale, octave: i32) -> Result<Self> {
        let root = root_pitch(root, octave)?;
        Ok(Self {
            scale_notes: scale_notes(root, scale, 2),
        })
    }

    pub fn scale_notes(&self) -> &[i32] {
        &self.scale_notes
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, options: &MelodyOptions) -> Vec<Note> {
        let positions = match &options.rhythm {
            Some(rhythm) if !rhythm.is_empty() => rhythm.clone(),
            _ => density_rhythm(rng, options.bars as f64 * 4.0, options.density),
        };
        if self.scale_notes.is_empty() {
            return Vec::new();
        }

        let degrees = options.contour.degrees(rng, positions.len());
        let lengths = options.note_length.choices();

        positions
            .iter()
            .zip(degrees)
            .map(|(&pos, degree)| {
                let pitch = self.scale_notes[degree % self.scale_notes.len()];
                let duration = lengths[rng.random_range(0..lengths.len())];
                let velocity = if pos.fract() == 0.0 { 100 } else { 80 };
                Note::new(pitch, pos, duration, velocity)
            })
            .collect()
    }
}

/// Onsets on a grid chosen from density, each kept with probability
/// `density`. Never empty.
fn density_rhythm<R: Rng + ?Sized>(rng: &mut R, total_beats: f64, density: f64) -> Vec<f64> {
    let step = if density > 0.7 {
        0.25
    } else if density > 0.4 {
        0.5
    } else {
        1.0
    };

    let steps = (total_beats / step).ceil() as usize;
    let positions: Vec<f64> = (0..steps)
        .map(|i| i as f64 * step)
        .filter(|_| rng.random::<f64>() < density)
        .collect();

    if positions.is_empty() {
        vec![0.0]
    } else {
        positions
    }
}
