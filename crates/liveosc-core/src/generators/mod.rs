//! Pattern generators producing timed note events.
//!
//! - **melody** - density-driven rhythm + contour over a scale
//! - **bass** - five per-bar bassline templates
//! - **chords** - roman-numeral progressions with voicings
//! - **arp** - arpeggiator over a chord across octaves
//! - **drums** - fixed General MIDI drum templates
//!
//! Every generator that uses randomness takes the random source explicitly.
//! The `create_*` functions below are the convenience entry points used by
//! the tool layer; the `*_with` variants accept a caller-owned RNG so that
//! output can be reproduced from a seed.

pub mod arp;
pub mod bass;
pub mod chords;
pub mod drums;
pub mod melody;

use crate::error::{Error, Result};
use crate::theory::{note_to_midi, ChordType, Scale};
use rand::Rng;

pub use arp::{ArpPattern, ArpRate, ArpeggiatorGenerator};
pub use bass::{BassStyle, BasslineGenerator};
pub use chords::{ChordProgressionGenerator, Progression, Voicing};
pub use drums::{drum_pattern, hihat_pattern, DrumKind};
pub use melody::{Contour, MelodyGenerator, MelodyOptions, NoteLength};

/// A single MIDI note placed in a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: i32,
    /// Offset from clip start in beats
    pub start: f64,
    /// Length in beats
    pub duration: f64,
    pub velocity: i32,
    pub mute: bool,
}

impl Note {
    pub fn new(pitch: i32, start: f64, duration: f64, velocity: i32) -> Self {
        Self {
            pitch,
            start,
            duration,
            velocity,
            mute: false,
        }
    }
}

/// Resolve a root note name in an octave or fail with a readable error.
pub(crate) fn root_pitch(root: &str, octave: i32) -> Result<i32> {
    note_to_midi(root, octave)
        .ok_or_else(|| Error::InvalidParameter(format!("unknown root note '{}'", root)))
}

fn scale_or_minor(name: &str) -> Scale {
    Scale::from_name(name).unwrap_or(Scale::Minor)
}

/// Melody in octave 4 with the given contour and density.
pub fn create_melody_with<R: Rng + ?Sized>(
    rng: &mut R,
    root: &str,
    scale: &str,
    bars: u32,
    contour: &str,
    density: f64,
) -> Result<Vec<Note>> {
    let generator = MelodyGenerator::new(root, scale_or_minor(scale))?;
    let options = MelodyOptions {
        bars,
        density,
        contour: Contour::from_name(contour),
        ..MelodyOptions::default()
    };
    Ok(generator.generate(rng, &options))
}

pub fn create_melody(
    root: &str,
    scale: &str,
    bars: u32,
    contour: &str,
    density: f64,
) -> Result<Vec<Note>> {
    create_melody_with(&mut rand::rng(), root, scale, bars, contour, density)
}

/// Bassline in octave 2. Fully deterministic.
pub fn create_bassline(root: &str, scale: &str, bars: u32, style: &str) -> Result<Vec<Note>> {
    let generator = BasslineGenerator::new(root, scale_or_minor(scale))?;
    Ok(generator.generate(bars, BassStyle::from_name(style), None))
}

/// One chord per bar in octave 3, grouped by bar.
pub fn create_chords(root: &str, scale: &str, bars: u32, style: &str) -> Result<Vec<Vec<Note>>> {
    let generator = ChordProgressionGenerator::new(root, scale_or_minor(scale))?;
    Ok(generator.generate(bars, Progression::from_name(style), Voicing::Basic))
}

pub fn create_arpeggio_with<R: Rng + ?Sized>(
    rng: &mut R,
    root: &str,
    chord: &str,
    bars: u32,
    pattern: &str,
    rate: &str,
) -> Result<Vec<Note>> {
    let chord = ChordType::from_name(chord).unwrap_or(ChordType::Minor);
    let generator = ArpeggiatorGenerator::new(root, chord)?;
    Ok(generator.generate(
        rng,
        bars,
        ArpPattern::from_name(pattern),
        ArpRate::from_name(rate),
        2,
    ))
}

pub fn create_arpeggio(
    root: &str,
    chord: &str,
    bars: u32,
    pattern: &str,
    rate: &str,
) -> Result<Vec<Note>> {
    create_arpeggio_with(&mut rand::rng(), root, chord, bars, pattern, rate)
}
