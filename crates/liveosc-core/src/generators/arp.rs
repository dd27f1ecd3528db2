//! Arpeggiator over a chord spread across octaves.

use super::{root_pitch, Note};
use crate::error::Result;
use crate::theory::{chord_notes, ChordType};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpPattern {
    Up,
    Down,
    /// Up then back down without repeating the end points
    UpDown,
    Random,
    /// Order the chord tones were given in
    Played,
}

impl ArpPattern {
    /// Unknown names pick `Up`.
    pub fn from_name(name: &str) -> ArpPattern {
        match name.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "down" => ArpPattern::Down,
            "updown" => ArpPattern::UpDown,
            "random" => ArpPattern::Random,
            "played" => ArpPattern::Played,
            _ => ArpPattern::Up,
        }
    }

    fn order<R: Rng + ?Sized>(self, rng: &mut R, n: usize) -> Vec<usize> {
        match self {
            ArpPattern::Up | ArpPattern::Played => (0..n).collect(),
            ArpPattern::Down => (0..n).rev().collect(),
            ArpPattern::UpDown => {
                let mut order: Vec<usize> = (0..n).collect();
                order.extend((1..n.saturating_sub(1)).rev());
                order
            }
            ArpPattern::Random => {
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(rng);
                order
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpRate {
    Eighth,
    Sixteenth,
    Triplet,
}

impl ArpRate {
    pub fn from_name(name: &str) -> ArpRate {
        match name.trim().to_lowercase().as_str() {
            "8th" | "eighth" => ArpRate::Eighth,
            "triplet" => ArpRate::Triplet,
            _ => ArpRate::Sixteenth,
        }
    }

    fn steps_per_beat(self) -> u32 {
        match self {
            ArpRate::Eighth => 2,
            ArpRate::Sixteenth => 4,
            ArpRate::Triplet => 3,
        }
    }

    /// Step length in beats.
    pub fn step(self) -> f64 {
        1.0 / self.steps_per_beat() as f64
    }
}

#[derive(Debug, Clone)]
pub struct ArpeggiatorGenerator {
    chord_notes: Vec<i32>,
}

impl ArpeggiatorGenerator {
    /// Chord rooted in octave 4.
    pub fn new(root: &str, chord: ChordType) -> Result<Self> {
        Self::with_octave(root, chord, 4)
    }

    pub fn with_octave(root: &str, chord: ChordType, octave: i32) -> Result<Self> {
        Ok(Self {
            chord_notes: chord_notes(root_pitch(root, octave)?, chord),
        })
    }

    /// Step through the note pool for `bars` bars, wrapping the pattern.
    /// Notes last 90% of a step; steps on the beat are accented.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bars: u32,
        pattern: ArpPattern,
        rate: ArpRate,
        octave_range: u32,
    ) -> Vec<Note> {
        let pool: Vec<i32> = (0..octave_range.max(1) as i32)
            .flat_map(|octave| self.chord_notes.iter().map(move |n| n + octave * 12))
            .collect();
        let order = pattern.order(rng, pool.len());
        if order.is_empty() {
            return Vec::new();
        }

        let per_beat = rate.steps_per_beat();
        let total_steps = bars.saturating_mul(4).saturating_mul(per_beat);
        let duration = rate.step() * 0.9;

        (0..total_steps)
            .map(|i| {
                let pitch = pool[order[i as usize % order.len()]];
                let velocity = if i % per_beat == 0 { 100 } else { 80 };
                Note::new(pitch, i as f64 / per_beat as f64, duration, velocity)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_up_sixteenths_one_bar() {
        let generator = ArpeggiatorGenerator::new("C", ChordType::Minor7).unwrap();
        let notes = generator.generate(&mut rng(), 1, ArpPattern::Up, ArpRate::Sixteenth, 2);
        assert_eq!(notes.len(), 16);
        let pitches: Vec<i32> = notes.iter().take(9).map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 63, 67, 70, 72, 75, 79, 82, 60]);
        assert!(notes.windows(2).all(|w| w[0].start < w[1].start));
        assert_eq!(notes[15].start, 3.75);
        assert_eq!(notes[0].velocity, 100);
        assert_eq!(notes[1].velocity, 80);
    }

    #[test]
    fn test_triplets_have_no_float_drift() {
        let generator = ArpeggiatorGenerator::new("A", ChordType::Minor).unwrap();
        let notes = generator.generate(&mut rng(), 2, ArpPattern::Up, ArpRate::Triplet, 1);
        assert_eq!(notes.len(), 24);
        assert_eq!(notes[3].start, 1.0);
        assert_eq!(notes[3].velocity, 100);
        assert!((notes[0].duration - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_updown_order() {
        let order = ArpPattern::UpDown.order(&mut rng(), 4);
        assert_eq!(order, vec![0, 1, 2, 3, 2, 1]);
        assert_eq!(ArpPattern::UpDown.order(&mut rng(), 1), vec![0]);
    }

    #[test]
    fn test_random_order_is_permutation() {
        let mut order = ArpPattern::Random.order(&mut rng(), 6);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_down_eighths() {
        let generator = ArpeggiatorGenerator::new("C", ChordType::Major).unwrap();
        let notes = generator.generate(&mut rng(), 1, ArpPattern::Down, ArpRate::Eighth, 1);
        assert_eq!(notes.len(), 8);
        assert_eq!(notes[0].pitch, 67);
        assert_eq!(notes[2].pitch, 60);
        assert_eq!(notes[3].pitch, 67);
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(ArpPattern::from_name("up-down"), ArpPattern::UpDown);
        assert_eq!(ArpPattern::from_name("updown"), ArpPattern::UpDown);
        assert_eq!(ArpRate::from_name("8th"), ArpRate::Eighth);
    }
}
