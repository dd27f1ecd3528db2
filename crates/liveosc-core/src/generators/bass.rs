//! Bassline templates. Each style is a fixed per-bar figure relative to the
//! bar's root.

use super::{root_pitch, Note};
use crate::error::Result;
use crate::theory::{scale_notes, Scale};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassStyle {
    /// Root on beats 1 and 3
    Basic,
    /// Quarter notes walking up the scale
    Walking,
    Syncopated,
    /// Eighth notes alternating root and octave
    Octave,
    /// Root, third, fifth, octave
    Arpeggiated,
}

impl BassStyle {
    /// Unknown names pick `Basic`.
    pub fn from_name(name: &str) -> BassStyle {
        match name.trim().to_lowercase().as_str() {
            "walking" => BassStyle::Walking,
            "syncopated" => BassStyle::Syncopated,
            "octave" => BassStyle::Octave,
            "arpeggiated" | "arp" => BassStyle::Arpeggiated,
            _ => BassStyle::Basic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BasslineGenerator {
    root: i32,
    scale: Scale,
    scale_notes: Vec<i32>,
}

impl BasslineGenerator {
    /// Bass rooted in octave 2.
    pub fn new(root: &str, scale: Scale) -> Result<Self> {
        Self::with_octave(root, scale, 2)
    }

    pub fn with_octave(root: &str, scale: Scale, octave: i32) -> Result<Self> {
        let root = root_pitch(root, octave)?;
        Ok(Self {
            root,
            scale,
            scale_notes: scale_notes(root, scale, 1),
        })
    }

    /// Generate `bars` bars. `chord_roots[bar]` overrides the root for that
    /// bar; bars past the end of the list use the generator root.
    pub fn generate(&self, bars: u32, style: BassStyle, chord_roots: Option<&[i32]>) -> Vec<Note> {
        let mut notes = Vec::new();
        for bar in 0..bars {
            let root = self.bar_root(bar as usize, chord_roots);
            let base = bar as f64 * 4.0;
            match style {
                BassStyle::Basic => {
                    notes.push(Note::new(root, base, 1.0, 100));
                    notes.push(Note::new(root, base + 2.0, 1.0, 90));
                }
                BassStyle::Walking => {
                    let intervals = self.scale.intervals();
                    for beat in 0..4 {
                        let idx = beat % self.scale_notes.len().max(1);
                        let pitch = intervals.get(idx).map_or(root, |i| root + i);
                        notes.push(Note::new(pitch, base + beat as f64, 0.9, 100 - beat as i32 * 5));
                    }
                }
                BassStyle::Syncopated => {
                    for pos in [0.0, 0.75, 1.5, 2.0, 2.75, 3.5] {
                        notes.push(Note::new(root, base + pos, 0.25, 100));
                    }
                }
                BassStyle::Octave => {
                    for i in 0..8 {
                        let pitch = if i % 2 == 0 { root } else { root + 12 };
                        notes.push(Note::new(pitch, base + i as f64 * 0.5, 0.4, 100));
                    }
                }
                BassStyle::Arpeggiated => {
                    for (i, interval) in [0, 4, 7, 12].iter().enumerate() {
                        notes.push(Note::new(root + interval, base + i as f64, 0.9, 100));
                    }
                }
            }
        }
        notes
    }

    fn bar_root(&self, bar: usize, chord_roots: Option<&[i32]>) -> i32 {
        chord_roots
            .and_then(|roots| roots.get(bar).copied())
            .unwrap_or(self.root)
    }
}
