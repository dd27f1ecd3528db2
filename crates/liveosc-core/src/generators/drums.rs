//! Fixed drum templates on the General MIDI drum map.

use super::Note;

pub const KICK: i32 = 36;
pub const SNARE: i32 = 38;
pub const CLAP: i32 = 39;
pub const CLOSED_HAT: i32 = 42;
pub const TOM_LOW: i32 = 45;
pub const OPEN_HAT: i32 = 46;
pub const TOM_MID: i32 = 47;
pub const CRASH: i32 = 49;
pub const TOM_HIGH: i32 = 50;
pub const RIDE: i32 = 51;

/// Look up a drum role by name.
pub fn drum_pitch(role: &str) -> Option<i32> {
    let pitch = match role.trim().to_lowercase().as_str() {
        "kick" => KICK,
        "snare" => SNARE,
        "clap" => CLAP,
        "closed_hat" | "hihat" | "hat" => CLOSED_HAT,
        "open_hat" => OPEN_HAT,
        "tom_low" => TOM_LOW,
        "tom_mid" => TOM_MID,
        "tom_high" => TOM_HIGH,
        "crash" => CRASH,
        "ride" => RIDE,
        _ => return None,
    };
    Some(pitch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumKind {
    FourOnFloor,
    BasicBeat,
    Trap,
    Breakbeat,
}

impl DrumKind {
    /// Unknown names pick `BasicBeat`.
    pub fn from_name(name: &str) -> DrumKind {
        match name.trim().to_lowercase().as_str() {
            "four_on_floor" | "four_on_the_floor" | "house" => DrumKind::FourOnFloor,
            "trap" | "trap_pattern" => DrumKind::Trap,
            "breakbeat" | "break" => DrumKind::Breakbeat,
            _ => DrumKind::BasicBeat,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DrumKind::FourOnFloor => "four_on_floor",
            DrumKind::BasicBeat => "basic_beat",
            DrumKind::Trap => "trap",
            DrumKind::Breakbeat => "breakbeat",
        }
    }
}

/// One bar of `kind` starting at `base`.
fn bar(kind: DrumKind, base: f64, notes: &mut Vec<Note>) {
    match kind {
        DrumKind::FourOnFloor => {
            for beat in 0..4 {
                notes.push(Note::new(KICK, base + beat as f64, 0.25, 100));
            }
        }
        DrumKind::BasicBeat => {
            notes.push(Note::new(KICK, base, 0.25, 100));
            notes.push(Note::new(KICK, base + 2.0, 0.25, 100));
            notes.push(Note::new(SNARE, base + 1.0, 0.25, 100));
            notes.push(Note::new(SNARE, base + 3.0, 0.25, 100));
            for i in 0..8 {
                let velocity = if i % 2 == 0 { 100 } else { 70 };
                notes.push(Note::new(CLOSED_HAT, base + i as f64 * 0.5, 0.25, velocity));
            }
        }
        DrumKind::Trap => {
            notes.push(Note::new(KICK, base, 0.25, 110));
            notes.push(Note::new(KICK, base + 0.75, 0.25, 90));
            notes.push(Note::new(KICK, base + 2.5, 0.25, 100));
            for beat in [1.0, 3.0] {
                notes.push(Note::new(SNARE, base + beat, 0.25, 100));
                notes.push(Note::new(CLAP, base + beat, 0.25, 90));
            }
            // 32nd-note roll
            for i in 0..32 {
                notes.push(Note::new(CLOSED_HAT, base + i as f64 * 0.125, 0.1, 100 - (i % 4) * 15));
            }
        }
        DrumKind::Breakbeat => {
            for k in [0.0, 1.25, 2.0, 2.75, 3.5] {
                notes.push(Note::new(KICK, base + k, 0.25, 100));
            }
            for s in [1.0, 2.5, 3.0, 3.75] {
                notes.push(Note::new(SNARE, base + s, 0.25, 100));
            }
            for i in 0..8 {
                notes.push(Note::new(CLOSED_HAT, base + i as f64 * 0.5 + 0.25, 0.2, 80));
            }
        }
    }
}

/// Tile a drum template across `bars` bars.
pub fn drum_pattern(kind: DrumKind, bars: u32) -> Vec<Note> {
    let mut notes = Vec::new();
    for b in 0..bars {
        bar(kind, b as f64 * 4.0, &mut notes);
    }
    notes
}

/// Closed hats at `per_beat` hits per beat, accented on the beat.
pub fn hihat_pattern(per_beat: u32, bars: u32) -> Vec<Note> {
    let per_beat = per_beat.max(1);
    let step = 1.0 / per_beat as f64;
    (0..bars.saturating_mul(4).saturating_mul(per_beat))
        .map(|i| {
            let velocity = if i % per_beat == 0 { 100 } else { 75 };
            Note::new(CLOSED_HAT, i as f64 * step, step * 0.5, velocity)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(notes: &[Note], pitch: i32) -> usize {
        notes.iter().filter(|n| n.pitch == pitch).count()
    }

    #[test]
    fn test_four_on_floor() {
        let notes = drum_pattern(DrumKind::FourOnFloor, 2);
        assert_eq!(notes.len(), 8);
        assert_eq!(notes[4].start, 4.0);
        assert!(notes.iter().all(|n| n.pitch == KICK));
    }

    #[test]
    fn test_basic_beat() {
        let notes = drum_pattern(DrumKind::BasicBeat, 1);
        assert_eq!(count(&notes, KICK), 2);
        assert_eq!(count(&notes, SNARE), 2);
        assert_eq!(count(&notes, CLOSED_HAT), 8);
        let hats: Vec<i32> = notes
            .iter()
            .filter(|n| n.pitch == CLOSED_HAT)
            .map(|n| n.velocity)
            .take(2)
            .collect();
        assert_eq!(hats, vec![100, 70]);
    }

    #[test]
    fn test_trap_roll() {
        let notes = drum_pattern(DrumKind::Trap, 1);
        assert_eq!(count(&notes, CLOSED_HAT), 32);
        assert_eq!(count(&notes, CLAP), 2);
        let roll: Vec<i32> = notes
            .iter()
            .filter(|n| n.pitch == CLOSED_HAT)
            .map(|n| n.velocity)
            .take(5)
            .collect();
        assert_eq!(roll, vec![100, 85, 70, 55, 100]);
    }

    #[test]
    fn test_breakbeat_offbeat_hats() {
        let notes = drum_pattern(DrumKind::Breakbeat, 1);
        assert_eq!(count(&notes, KICK), 5);
        assert_eq!(count(&notes, SNARE), 4);
        assert!(notes
            .iter()
            .filter(|n| n.pitch == CLOSED_HAT)
            .all(|n| (n.start * 4.0) % 2.0 == 1.0));
    }

    #[test]
    fn test_hihat_pattern() {
        let notes = hihat_pattern(4, 1);
        assert_eq!(notes.len(), 16);
        assert_eq!(notes[4].start, 1.0);
        assert_eq!(notes[4].velocity, 100);
    }

    #[test]
    fn test_names() {
        assert_eq!(DrumKind::from_name("trap"), DrumKind::Trap);
        assert_eq!(DrumKind::from_name("whatever"), DrumKind::BasicBeat);
        assert_eq!(drum_pitch("Kick"), Some(36));
        assert_eq!(drum_pitch("cowbell"), None);
    }
}
