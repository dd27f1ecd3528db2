//! Song structure from genre templates, and the plan that places it in Live.
//!
//! A template is a list of `(section, bars, energy, elements)` rows plus a
//! tempo range and default key. Generation rescales the rows to a target
//! length in whole 4-bar units, then attaches per-section automation
//! directives. [`ArrangementExecutor`] flattens an arrangement into
//! [`ArrangementAction`]s and can apply them through a [`LiveApi`].

use crate::automation::{generate_points, CurveShape};
use crate::error::{Error, Result};
use crate::generators::{
    drum_pattern, hihat_pattern, BassStyle, BasslineGenerator, ChordProgressionGenerator, DrumKind,
    MelodyGenerator, MelodyOptions, Note, Progression, Voicing,
};
use crate::live::{AutomationTarget, LiveApi};
use crate::theory::{Key, Scale};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Bars per scheduling unit; sections are always a multiple of this.
pub const BAR_UNIT: u32 = 4;

/// Longest arrangement a template is scaled to.
pub const MAX_TEMPLATE_BARS: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Intro,
    Verse,
    Prechorus,
    Chorus,
    Drop,
    Breakdown,
    Buildup,
    Bridge,
    Outro,
}

impl SectionType {
    pub fn from_name(name: &str) -> Option<SectionType> {
        let kind = match name.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "intro" => SectionType::Intro,
            "verse" => SectionType::Verse,
            "prechorus" => SectionType::Prechorus,
            "chorus" => SectionType::Chorus,
            "drop" => SectionType::Drop,
            "breakdown" => SectionType::Breakdown,
            "buildup" => SectionType::Buildup,
            "bridge" => SectionType::Bridge,
            "outro" => SectionType::Outro,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionType::Intro => "intro",
            SectionType::Verse => "verse",
            SectionType::Prechorus => "prechorus",
            SectionType::Chorus => "chorus",
            SectionType::Drop => "drop",
            SectionType::Breakdown => "breakdown",
            SectionType::Buildup => "buildup",
            SectionType::Bridge => "bridge",
            SectionType::Outro => "outro",
        }
    }
}

/// A parameter ramp inside a section, bars relative to the section start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationDirective {
    pub parameter: String,
    pub start_value: f64,
    pub end_value: f64,
    pub start_bar: u32,
    pub end_bar: u32,
}

impl AutomationDirective {
    fn new(parameter: &str, start_value: f64, end_value: f64, end_bar: u32) -> Self {
        Self {
            parameter: parameter.to_string(),
            start_value,
            end_value,
            start_bar: 0,
            end_bar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionType,
    pub bars: u32,
    pub energy: f64,
    pub elements: Vec<String>,
    pub automation: Vec<AutomationDirective>,
}

impl Section {
    pub fn new(kind: SectionType, bars: u32, energy: f64, elements: Vec<String>) -> Self {
        Self {
            kind,
            bars,
            energy,
            elements,
            automation: section_automation(kind, bars, energy),
        }
    }
}

/// Fixed ramps keyed on section type.
fn section_automation(kind: SectionType, bars: u32, energy: f64) -> Vec<AutomationDirective> {
    match kind {
        SectionType::Buildup => vec![
            AutomationDirective::new("filter_cutoff", 0.2, 1.0, bars),
            AutomationDirective::new("reverb_dry_wet", 0.6, 0.2, bars),
        ],
        SectionType::Breakdown => vec![
            AutomationDirective::new("filter_cutoff", 1.0, 0.3, bars / 2),
            AutomationDirective::new("reverb_dry_wet", 0.2, 0.7, bars),
        ],
        SectionType::Drop | SectionType::Chorus => {
            vec![AutomationDirective::new("master_volume", energy, energy, bars)]
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrangement {
    pub title: String,
    pub tempo: f64,
    pub key: String,
    pub total_bars: u32,
    pub sections: Vec<Section>,
}

impl Arrangement {
    fn from_sections(title: String, tempo: f64, key: String, sections: Vec<Section>) -> Self {
        Self {
            title,
            tempo,
            key,
            total_bars: sections.iter().fold(0u32, |total, s| total.saturating_add(s.bars)),
            sections,
        }
    }

    /// Length in seconds at the arrangement tempo, 4/4.
    pub fn duration_secs(&self) -> f64 {
        self.total_bars as f64 * 4.0 * 60.0 / self.tempo
    }

    /// Start bar of each section.
    pub fn section_starts(&self) -> Vec<u32> {
        self.sections
            .iter()
            .scan(0u32, |bar, s| {
                let start = *bar;
                *bar = bar.saturating_add(s.bars);
                Some(start)
            })
            .collect()
    }

    /// Human readable summary with a 10-cell energy meter per section.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "   Tempo: {} BPM | Key: {}", self.tempo, self.key);
        let _ = writeln!(out, "   Total: {} bars", self.total_bars);
        let _ = writeln!(out);
        out.push_str("Structure:");
        for (section, start) in self.sections.iter().zip(self.section_starts()) {
            let filled = ((section.energy * 10.0) as usize).min(10);
            let meter = format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled));
            let _ = write!(
                out,
                "\n   [{:3}] {:12} | {:2} bars | Energy: {}",
                start,
                section.kind.name(),
                section.bars,
                meter
            );
        }
        out
    }
}

type TemplateRow = (SectionType, u32, f64, &'static [&'static str]);

#[derive(Debug)]
pub struct GenreTemplate {
    pub name: &'static str,
    pub sections: &'static [TemplateRow],
    pub tempo_range: (f64, f64),
    pub default_key: &'static str,
}

impl GenreTemplate {
    pub fn total_bars(&self) -> u32 {
        self.sections.iter().map(|row| row.1).sum()
    }

    pub fn default_tempo(&self) -> f64 {
        (self.tempo_range.0 + self.tempo_range.1) / 2.0
    }
}

use SectionType::*;

static TEMPLATES: &[GenreTemplate] = &[
    GenreTemplate {
        name: "edm",
        sections: &[
            (Intro, 8, 0.3, &["pad", "fx"]),
            (Buildup, 8, 0.5, &["kick", "hihat", "lead", "riser"]),
            (Drop, 16, 1.0, &["kick", "bass", "lead", "hihat", "clap"]),
            (Breakdown, 8, 0.4, &["pad", "lead", "fx"]),
            (Buildup, 8, 0.7, &["kick", "hihat", "lead", "riser"]),
            (Drop, 16, 1.0, &["kick", "bass", "lead", "hihat", "clap"]),
            (Outro, 8, 0.3, &["pad", "fx"]),
        ],
        tempo_range: (125.0, 132.0),
        default_key: "Am",
    },
    GenreTemplate {
        name: "house",
        sections: &[
            (Intro, 16, 0.3, &["kick", "hihat"]),
            (Verse, 16, 0.6, &["kick", "bass", "hihat", "clap"]),
            (Breakdown, 8, 0.4, &["pad", "vocal"]),
            (Buildup, 8, 0.7, &["kick", "hihat", "riser"]),
            (Chorus, 16, 0.9, &["kick", "bass", "hihat", "clap", "lead"]),
            (Verse, 16, 0.6, &["kick", "bass", "hihat", "clap"]),
            (Chorus, 16, 0.9, &["kick", "bass", "hihat", "clap", "lead"]),
            (Outro, 16, 0.3, &["kick", "hihat"]),
        ],
        tempo_range: (120.0, 128.0),
        default_key: "Gm",
    },
    GenreTemplate {
        name: "techno",
        sections: &[
            (Intro, 16, 0.4, &["kick"]),
            (Verse, 16, 0.6, &["kick", "hihat", "bass"]),
            (Buildup, 8, 0.7, &["kick", "hihat", "synth", "riser"]),
            (Drop, 32, 0.9, &["kick", "bass", "hihat", "synth", "perc"]),
            (Breakdown, 16, 0.5, &["pad", "fx"]),
            (Buildup, 8, 0.7, &["kick", "hihat", "riser"]),
            (Drop, 32, 1.0, &["kick", "bass", "hihat", "synth", "perc"]),
            (Outro, 16, 0.3, &["kick"]),
        ],
        tempo_range: (130.0, 145.0),
        default_key: "Dm",
    },
    GenreTemplate {
        name: "dnb",
        sections: &[
            (Intro, 8, 0.3, &["pad", "fx"]),
            (Verse, 16, 0.6, &["drums", "bass", "synth"]),
            (Drop, 16, 1.0, &["drums", "bass", "synth", "lead"]),
            (Breakdown, 8, 0.4, &["pad", "vocal"]),
            (Drop, 16, 1.0, &["drums", "bass", "synth", "lead"]),
            (Outro, 8, 0.3, &["drums"]),
        ],
        tempo_range: (170.0, 180.0),
        default_key: "Fm",
    },
    GenreTemplate {
        name: "hiphop",
        sections: &[
            (Intro, 4, 0.3, &["pad", "fx"]),
            (Verse, 16, 0.6, &["drums", "bass", "keys"]),
            (Chorus, 8, 0.8, &["drums", "bass", "lead", "vocal"]),
            (Verse, 16, 0.6, &["drums", "bass", "keys"]),
            (Chorus, 8, 0.8, &["drums", "bass", "lead", "vocal"]),
            (Bridge, 8, 0.5, &["pad", "bass"]),
            (Chorus, 8, 0.9, &["drums", "bass", "lead", "vocal"]),
            (Outro, 4, 0.3, &["pad"]),
        ],
        tempo_range: (85.0, 100.0),
        default_key: "Cm",
    },
    GenreTemplate {
        name: "trap",
        sections: &[
            (Intro, 4, 0.3, &["pad", "fx"]),
            (Verse, 16, 0.6, &["drums", "808", "hihat"]),
            (Prechorus, 8, 0.7, &["drums", "808", "hihat", "lead"]),
            (Drop, 16, 1.0, &["drums", "808", "hihat", "lead", "fx"]),
            (Verse, 16, 0.6, &["drums", "808", "hihat"]),
            (Drop, 16, 1.0, &["drums", "808", "hihat", "lead", "fx"]),
            (Outro, 8, 0.3, &["pad", "808"]),
        ],
        tempo_range: (130.0, 150.0),
        default_key: "Cm",
    },
    GenreTemplate {
        name: "lofi",
        sections: &[
            (Intro, 4, 0.3, &["pad", "vinyl"]),
            (Verse, 16, 0.5, &["drums", "bass", "keys", "vinyl"]),
            (Chorus, 8, 0.6, &["drums", "bass", "keys", "lead", "vinyl"]),
            (Verse, 16, 0.5, &["drums", "bass", "keys", "vinyl"]),
            (Chorus, 8, 0.6, &["drums", "bass", "keys", "lead", "vinyl"]),
            (Outro, 8, 0.3, &["pad", "vinyl"]),
        ],
        tempo_range: (70.0, 90.0),
        default_key: "Dm",
    },
    GenreTemplate {
        name: "ambient",
        sections: &[
            (Intro, 16, 0.2, &["pad"]),
            (Verse, 32, 0.4, &["pad", "texture", "melody"]),
            (Chorus, 16, 0.5, &["pad", "texture", "melody", "bass"]),
            (Breakdown, 16, 0.3, &["pad", "texture"]),
            (Chorus, 16, 0.6, &["pad", "texture", "melody", "bass"]),
            (Outro, 16, 0.2, &["pad"]),
        ],
        tempo_range: (60.0, 90.0),
        default_key: "Am",
    },
    GenreTemplate {
        name: "pop",
        sections: &[
            (Intro, 8, 0.4, &["keys", "pad"]),
            (Verse, 16, 0.5, &["drums", "bass", "keys"]),
            (Prechorus, 8, 0.6, &["drums", "bass", "keys", "strings"]),
            (Chorus, 16, 0.9, &["drums", "bass", "keys", "lead", "strings"]),
            (Verse, 16, 0.5, &["drums", "bass", "keys"]),
            (Prechorus, 8, 0.6, &["drums", "bass", "keys", "strings"]),
            (Chorus, 16, 0.9, &["drums", "bass", "keys", "lead", "strings"]),
            (Bridge, 8, 0.5, &["keys", "strings"]),
            (Chorus, 16, 1.0, &["drums", "bass", "keys", "lead", "strings"]),
            (Outro, 8, 0.4, &["keys", "pad"]),
        ],
        tempo_range: (100.0, 130.0),
        default_key: "C",
    },
];

pub fn template(genre: &str) -> Option<&'static GenreTemplate> {
    let genre = genre.trim().to_lowercase();
    TEMPLATES.iter().find(|t| t.name == genre)
}

pub fn list_genres() -> Vec<&'static str> {
    TEMPLATES.iter().map(|t| t.name).collect()
}

/// Split `target_units` across rows in proportion to `weights`.
///
/// Each row gets the floor of its share but at least one unit; units left
/// over go to the rows with the largest fractional parts, earlier rows first
/// on ties. The total equals `target_units` unless the one-unit floors force
/// it higher.
fn allocate_units(weights: &[u32], target_units: u32) -> Vec<u32> {
    let total: u32 = weights.iter().sum();
    if total == 0 {
        return vec![1; weights.len()];
    }
    let quotas: Vec<f64> = weights
        .iter()
        .map(|&w| target_units as f64 * w as f64 / total as f64)
        .collect();
    let mut units: Vec<u32> = quotas.iter().map(|q| (q.floor() as u32).max(1)).collect();

    let assigned: u32 = units.iter().sum();
    if assigned < target_units {
        let mut order: Vec<usize> = (0..quotas.len()).collect();
        order.sort_by(|&a, &b| {
            let fa = quotas[a] - quotas[a].floor();
            let fb = quotas[b] - quotas[b].floor();
            fb.total_cmp(&fa).then(a.cmp(&b))
        });
        for &i in order.iter().cycle().take((target_units - assigned) as usize) {
            units[i] += 1;
        }
    }
    units
}

/// Arrangement from a genre template. Unknown genres use `edm`.
///
/// Target length is `minutes × tempo` beats, i.e. `minutes × tempo / 4`
/// bars, rounded to whole [`BAR_UNIT`]s and capped at [`MAX_TEMPLATE_BARS`].
pub fn generate_from_template(
    genre: &str,
    minutes: f64,
    tempo: Option<f64>,
    key: Option<&str>,
) -> Arrangement {
    let template = template(genre).unwrap_or(&TEMPLATES[0]);
    let tempo = tempo.unwrap_or_else(|| template.default_tempo());
    let key = key.unwrap_or(template.default_key).to_string();

    let target_bars = (minutes.max(0.0) * tempo / 4.0).max(0.0);
    let max_units = (MAX_TEMPLATE_BARS / BAR_UNIT) as f64;
    let target_units = (target_bars / BAR_UNIT as f64).round().min(max_units) as u32;
    let weights: Vec<u32> = template.sections.iter().map(|row| row.1).collect();
    let units = allocate_units(&weights, target_units);

    let sections = template
        .sections
        .iter()
        .zip(units)
        .map(|(&(kind, _, energy, elements), units)| {
            let elements = elements.iter().map(|e| e.to_string()).collect();
            Section::new(kind, units * BAR_UNIT, energy, elements)
        })
        .collect();

    Arrangement::from_sections(format!("Untitled {}", title_case(genre.trim())), tempo, key, sections)
}

/// One section of a custom arrangement. Missing fields take the defaults:
/// verse, 8 bars, energy 0.5, drums and bass.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SectionSpec {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub bars: Option<u32>,
    pub energy: Option<f64>,
    pub elements: Option<Vec<String>>,
}

pub fn generate_custom(specs: &[SectionSpec], tempo: f64, key: &str) -> Result<Arrangement> {
    let sections = specs
        .iter()
        .map(|spec| -> Result<Section> {
            let kind = match &spec.kind {
                Some(name) => SectionType::from_name(name)
                    .ok_or_else(|| Error::InvalidParameter(format!("unknown section type '{}'", name)))?,
                None => SectionType::Verse,
            };
            let elements = spec
                .elements
                .clone()
                .unwrap_or_else(|| vec!["drums".to_string(), "bass".to_string()]);
            let bars = spec.bars.unwrap_or(8);
            if bars == 0 || bars > MAX_TEMPLATE_BARS {
                return Err(Error::InvalidParameter(format!(
                    "section bars must be between 1 and {}, got {}",
                    MAX_TEMPLATE_BARS, bars
                )));
            }
            Ok(Section::new(
                kind,
                bars,
                spec.energy.unwrap_or(0.5),
                elements,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arrangement::from_sections(
        "Custom Track".to_string(),
        tempo,
        key.to_string(),
        sections,
    ))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Midi,
    Audio,
}

impl TrackKind {
    pub fn for_element(element: &str) -> TrackKind {
        match element.to_lowercase().as_str() {
            "drums" | "bass" | "lead" | "pad" | "keys" | "synth" | "arp" | "melody" => TrackKind::Midi,
            _ => TrackKind::Audio,
        }
    }
}

/// One step of placing an arrangement in Live.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ArrangementAction {
    SetTempo {
        tempo: f64,
    },
    CreateTrack {
        index: i32,
        name: String,
        kind: TrackKind,
    },
    CreateClip {
        track: i32,
        /// Scene row, `start_bar / 4`
        slot: i32,
        start_bar: u32,
        length_bars: u32,
        element: String,
        pattern: String,
        name: String,
    },
    /// Ramp with absolute bar positions, written into the first clip of its
    /// section
    Automation {
        parameter: String,
        track: i32,
        slot: i32,
        /// Where that clip starts
        clip_start_bar: u32,
        start_bar: u32,
        end_bar: u32,
        start_value: f64,
        end_value: f64,
    },
}

/// What [`ArrangementExecutor::apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub actions: usize,
    pub tracks: usize,
    pub clips: usize,
    pub notes: usize,
    pub ramps: usize,
}

#[derive(Debug, Default)]
pub struct ArrangementExecutor {
    element_tracks: BTreeMap<String, i32>,
}

impl ArrangementExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track index assigned to an element by the last `plan`.
    pub fn track_for(&self, element: &str) -> Option<i32> {
        self.element_tracks.get(element).copied()
    }

    /// Flatten an arrangement into actions: tempo, tracks (one per distinct
    /// element, sorted), clips per section, then automation ramps.
    pub fn plan(&mut self, arrangement: &Arrangement, create_tracks: bool) -> Vec<ArrangementAction> {
        let mut actions = vec![ArrangementAction::SetTempo {
            tempo: arrangement.tempo,
        }];

        self.element_tracks.clear();
        if create_tracks {
            let elements: BTreeSet<&str> = arrangement
                .sections
                .iter()
                .flat_map(|s| s.elements.iter().map(String::as_str))
                .collect();
            for (index, element) in elements.into_iter().enumerate() {
                let index = index as i32;
                actions.push(ArrangementAction::CreateTrack {
                    index,
                    name: title_case(element),
                    kind: TrackKind::for_element(element),
                });
                self.element_tracks.insert(element.to_string(), index);
            }
        }

        let starts = arrangement.section_starts();
        for (section, &start_bar) in arrangement.sections.iter().zip(&starts) {
            for element in &section.elements {
                let Some(pattern) = clip_pattern(element, section) else {
                    continue;
                };
                actions.push(ArrangementAction::CreateClip {
                    track: self.track_for(element).unwrap_or(0),
                    slot: (start_bar / BAR_UNIT) as i32,
                    start_bar,
                    length_bars: section.bars,
                    element: element.clone(),
                    pattern: pattern.to_string(),
                    name: format!("{} - {}", section.kind.name(), element),
                });
            }
        }

        for (section, &start_bar) in arrangement.sections.iter().zip(&starts) {
            let first_clip = section
                .elements
                .iter()
                .find(|element| clip_pattern(element, section).is_some());
            let Some(element) = first_clip else {
                if !section.automation.is_empty() {
                    debug!(
                        "[Arrangement] No clip in {} at bar {}, skipping its automation",
                        section.kind.name(),
                        start_bar
                    );
                }
                continue;
            };
            let track = self.track_for(element).unwrap_or(0);
            for directive in &section.automation {
                actions.push(ArrangementAction::Automation {
                    parameter: directive.parameter.clone(),
                    track,
                    slot: (start_bar / BAR_UNIT) as i32,
                    clip_start_bar: start_bar,
                    start_bar: start_bar.saturating_add(directive.start_bar),
                    end_bar: start_bar.saturating_add(directive.end_bar),
                    start_value: directive.start_value,
                    end_value: directive.end_value,
                });
            }
        }

        actions
    }

    /// Perform planned actions through Live. Clips whose pattern has a
    /// generator get notes; the rest are created empty. Ramps are sampled one
    /// point per beat and written into their clip's envelope.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        live: &LiveApi,
        rng: &mut R,
        arrangement: &Arrangement,
        actions: &[ArrangementAction],
    ) -> Result<ApplyReport> {
        let key = Key::parse(&arrangement.key).unwrap_or(Key {
            root: "A".to_string(),
            scale: Scale::Minor,
        });
        let mut report = ApplyReport::default();

        for action in actions {
            match action {
                ArrangementAction::SetTempo { tempo } => live.set_tempo(*tempo as f32)?,
                ArrangementAction::CreateTrack { index, name, kind } => {
                    match kind {
                        TrackKind::Midi => live.create_midi_track(*index)?,
                        TrackKind::Audio => live.create_audio_track(*index)?,
                    }
                    live.set_track_name(*index, name)?;
                    report.tracks += 1;
                }
                ArrangementAction::CreateClip {
                    track,
                    slot,
                    length_bars,
                    pattern,
                    name,
                    ..
                } => {
                    live.create_clip(*track, *slot, *length_bars as f64 * 4.0)?;
                    live.set_clip_name(*track, *slot, name)?;
                    let notes = render_pattern(rng, pattern, &key, *length_bars)?;
                    live.add_notes(*track, *slot, &notes)?;
                    report.clips += 1;
                    report.notes += notes.len();
                }
                ArrangementAction::Automation {
                    parameter,
                    track,
                    slot,
                    clip_start_bar,
                    start_bar,
                    end_bar,
                    start_value,
                    end_value,
                } => {
                    match ramp_target(parameter) {
                        Some((device, param, shape)) if end_bar > start_bar => {
                            let beats = (end_bar - start_bar) as f64 * 4.0;
                            let offset = start_bar.saturating_sub(*clip_start_bar) as f64 * 4.0;
                            let points =
                                generate_points(shape, *start_value, *end_value, offset, beats, beats as usize);
                            let target = AutomationTarget {
                                track: *track,
                                clip: *slot,
                                device,
                                parameter: param,
                            };
                            live.write_automation(target, &points)?;
                            debug!(
                                "[Arrangement] {} {:.2} -> {:.2} over bars {}..{} ({} points)",
                                parameter,
                                start_value,
                                end_value,
                                start_bar,
                                end_bar,
                                points.len()
                            );
                            report.ramps += 1;
                        }
                        Some(_) => {}
                        None => debug!("[Arrangement] No target for automation '{}'", parameter),
                    }
                }
            }
            report.actions += 1;
        }

        info!(
            "[Arrangement] Applied {} actions: {} tracks, {} clips, {} notes, {} ramps",
            report.actions, report.tracks, report.clips, report.notes, report.ramps
        );
        Ok(report)
    }
}

/// Mixer volume in an automation target's device slot.
pub const MIXER_DEVICE: i32 = -1;

/// Device, parameter and curve a named ramp drives on its clip's track.
/// Device 0 is the instrument and parameter 0 of any device is its on
/// switch, so the first real control is parameter 1.
fn ramp_target(parameter: &str) -> Option<(i32, i32, CurveShape)> {
    match parameter {
        "filter_cutoff" => Some((0, 1, CurveShape::Exponential)),
        "reverb_dry_wet" => Some((1, 1, CurveShape::Linear)),
        "master_volume" => Some((MIXER_DEVICE, 0, CurveShape::Linear)),
        _ => None,
    }
}

/// Pattern name for an element in a section, or `None` for no clip.
fn clip_pattern(element: &str, section: &Section) -> Option<&'static str> {
    let kind = section.kind;
    let pattern = match element {
        "kick" | "drums" => match kind {
            Drop if section.energy > 0.8 => "four_on_floor",
            Drop => "basic_beat",
            Buildup => "buildup_fill",
            Breakdown => "minimal",
            _ => "basic_beat",
        },
        "bass" => match kind {
            Drop | Chorus => "octave",
            Breakdown => "sustained",
            _ => "basic",
        },
        "lead" | "synth" | "melody" => match kind {
            Drop | Chorus => "energetic",
            _ => "subtle",
        },
        "pad" => "sustained_chord",
        "hihat" => {
            if section.energy > 0.8 {
                "16th"
            } else if section.energy > 0.5 {
                "8th"
            } else {
                "4th"
            }
        }
        _ => return None,
    };
    Some(pattern)
}

/// Notes for a clip pattern. Patterns without a generator render empty.
fn render_pattern<R: Rng + ?Sized>(rng: &mut R, pattern: &str, key: &Key, bars: u32) -> Result<Vec<Note>> {
    let notes = match pattern {
        "four_on_floor" | "basic_beat" => drum_pattern(DrumKind::from_name(pattern), bars),
        "basic" | "octave" => {
            BasslineGenerator::new(&key.root, key.scale)?.generate(bars, BassStyle::from_name(pattern), None)
        }
        "sustained_chord" => ChordProgressionGenerator::new(&key.root, key.scale)?
            .generate(bars, Progression::Pop, Voicing::Basic)
            .into_iter()
            .flatten()
            .collect(),
        "energetic" | "subtle" => {
            let density = if pattern == "energetic" { 0.8 } else { 0.3 };
            let options = MelodyOptions {
                bars,
                density,
                ..MelodyOptions::default()
            };
            MelodyGenerator::new(&key.root, key.scale)?.generate(rng, &options)
        }
        "16th" => hihat_pattern(4, bars),
        "8th" => hihat_pattern(2, bars),
        "4th" => hihat_pattern(1, bars),
        _ => Vec::new(),
    };
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_edm_four_minutes_at_128() {
        let arrangement = generate_from_template("edm", 4.0, Some(128.0), None);
        assert_eq!(arrangement.total_bars, 128);
        let beats = arrangement.total_bars as f64 * 4.0;
        assert!((beats * 60.0 / 128.0 - 240.0).abs() <= 8.0 * 60.0 / 128.0);
        assert!(arrangement.sections.iter().all(|s| s.bars % 4 == 0 && s.bars >= 4));
        assert_eq!(arrangement.title, "Untitled Edm");
        assert_eq!(arrangement.key, "Am");
    }

    #[test]
    fn test_duration_within_one_unit_for_every_genre() {
        for genre in list_genres() {
            for minutes in [2.0, 3.0, 4.0, 6.0] {
                let arrangement = generate_from_template(genre, minutes, None, None);
                let target_bars = minutes * arrangement.tempo / 4.0;
                let diff = (arrangement.total_bars as f64 - target_bars).abs();
                assert!(diff <= 4.0, "{} {}min: {} bars vs {}", genre, minutes, arrangement.total_bars, target_bars);
                let secs = arrangement.duration_secs();
                assert!((secs - minutes * 60.0).abs() <= 4.0 * 4.0 * 60.0 / arrangement.tempo);
            }
        }
    }

    #[test]
    fn test_allocate_units_largest_remainder() {
        // edm weights at 32 units: quotas 3.56, 3.56, 7.11, 3.56, 3.56, 7.11, 3.56
        let units = allocate_units(&[8, 8, 16, 8, 8, 16, 8], 32);
        assert_eq!(units, vec![4, 4, 7, 4, 3, 7, 3]);
        assert_eq!(units.iter().sum::<u32>(), 32);
    }

    #[test]
    fn test_allocate_units_floor_of_one() {
        let units = allocate_units(&[1, 1, 30], 4);
        assert!(units.iter().all(|&u| u >= 1));
    }

    #[test]
    fn test_defaults_from_template() {
        let arrangement = generate_from_template("techno", 4.0, None, None);
        assert_eq!(arrangement.tempo, 137.5);
        assert_eq!(arrangement.key, "Dm");
    }

    #[test]
    fn test_unknown_genre_falls_back_to_edm() {
        let arrangement = generate_from_template("polka", 4.0, Some(128.0), Some("Em"));
        assert_eq!(arrangement.sections.len(), 7);
        assert_eq!(arrangement.sections[2].kind, SectionType::Drop);
        assert_eq!(arrangement.key, "Em");
    }

    #[test]
    fn test_section_automation_rules() {
        let buildup = Section::new(SectionType::Buildup, 8, 0.7, vec![]);
        assert_eq!(buildup.automation.len(), 2);
        assert_eq!(buildup.automation[0].parameter, "filter_cutoff");
        assert_eq!(buildup.automation[0].end_bar, 8);

        let breakdown = Section::new(SectionType::Breakdown, 8, 0.4, vec![]);
        assert_eq!(breakdown.automation[0].end_bar, 4);
        assert_eq!(breakdown.automation[1].end_value, 0.7);

        let drop = Section::new(SectionType::Drop, 16, 0.9, vec![]);
        assert_eq!(drop.automation[0].start_value, 0.9);
        assert_eq!(drop.automation[0].end_value, 0.9);

        assert!(Section::new(SectionType::Verse, 8, 0.5, vec![]).automation.is_empty());
    }

    #[test]
    fn test_generate_custom_defaults() {
        let specs = vec![
            SectionSpec::default(),
            SectionSpec {
                kind: Some("drop".into()),
                bars: Some(16),
                energy: Some(1.0),
                elements: Some(vec!["kick".into()]),
            },
        ];
        let arrangement = generate_custom(&specs, 128.0, "Am").unwrap();
        assert_eq!(arrangement.title, "Custom Track");
        assert_eq!(arrangement.total_bars, 24);
        assert_eq!(arrangement.sections[0].kind, SectionType::Verse);
        assert_eq!(arrangement.sections[0].elements, vec!["drums", "bass"]);
        assert!(generate_custom(&[SectionSpec { kind: Some("solo".into()), ..Default::default() }], 120.0, "C").is_err());
    }

    #[test]
    fn test_generate_custom_rejects_bar_counts() {
        for bars in [0, MAX_TEMPLATE_BARS + 1, u32::MAX] {
            let spec = SectionSpec { bars: Some(bars), ..Default::default() };
            assert!(generate_custom(&[spec], 120.0, "C").is_err(), "bars {}", bars);
        }
        let spec = SectionSpec { bars: Some(MAX_TEMPLATE_BARS), ..Default::default() };
        assert_eq!(generate_custom(&[spec], 120.0, "C").unwrap().total_bars, MAX_TEMPLATE_BARS);
    }

    #[test]
    fn test_section_spec_from_json() {
        let spec: SectionSpec = serde_json::from_str(r#"{"type": "chorus", "bars": 4}"#).unwrap();
        assert_eq!(spec.kind.as_deref(), Some("chorus"));
        assert_eq!(spec.energy, None);
    }

    #[test]
    fn test_describe() {
        let arrangement = generate_from_template("edm", 4.0, Some(128.0), None);
        let text = arrangement.describe();
        assert!(text.contains("Total: 128 bars"));
        assert!(text.contains("[  0] intro"));
        assert!(text.contains("██████████"));
        assert!(text.contains("███░░░░░░░"));
    }

    #[test]
    fn test_plan() {
        let arrangement = generate_custom(
            &[
                SectionSpec {
                    kind: Some("buildup".into()),
                    bars: Some(8),
                    energy: Some(0.7),
                    elements: Some(vec!["kick".into(), "hihat".into(), "riser".into()]),
                },
                SectionSpec {
                    kind: Some("drop".into()),
                    bars: Some(16),
                    energy: Some(1.0),
                    elements: Some(vec!["kick".into(), "bass".into(), "pad".into()]),
                },
            ],
            128.0,
            "Am",
        )
        .unwrap();
        let mut executor = ArrangementExecutor::new();
        let actions = executor.plan(&arrangement, true);

        assert_eq!(actions[0], ArrangementAction::SetTempo { tempo: 128.0 });
        let tracks: Vec<(&str, TrackKind)> = actions
            .iter()
            .filter_map(|a| match a {
                ArrangementAction::CreateTrack { name, kind, .. } => Some((name.as_str(), *kind)),
                _ => None,
            })
            .collect();
        assert_eq!(
            tracks,
            vec![
                ("Bass", TrackKind::Midi),
                ("Hihat", TrackKind::Audio),
                ("Kick", TrackKind::Audio),
                ("Pad", TrackKind::Midi),
                ("Riser", TrackKind::Audio),
            ]
        );

        let clips: Vec<(i32, i32, &str)> = actions
            .iter()
            .filter_map(|a| match a {
                ArrangementAction::CreateClip { track, slot, pattern, .. } => Some((*track, *slot, pattern.as_str())),
                _ => None,
            })
            .collect();
        // riser has no pattern, so no clip
        assert_eq!(
            clips,
            vec![
                (2, 0, "buildup_fill"),
                (1, 0, "8th"),
                (2, 2, "four_on_floor"),
                (0, 2, "octave"),
                (3, 2, "sustained_chord"),
            ]
        );

        // ramps land in the first clip of their section
        let ramps: Vec<(i32, i32, u32, u32)> = actions
            .iter()
            .filter_map(|a| match a {
                ArrangementAction::Automation {
                    track,
                    slot,
                    start_bar,
                    end_bar,
                    ..
                } => Some((*track, *slot, *start_bar, *end_bar)),
                _ => None,
            })
            .collect();
        assert_eq!(ramps, vec![(2, 0, 0, 8), (2, 0, 0, 8), (2, 2, 8, 24)]);
    }

    #[test]
    fn test_section_without_clips_has_no_ramps() {
        let arrangement = generate_custom(
            &[SectionSpec {
                kind: Some("buildup".to_string()),
                bars: Some(8),
                energy: None,
                elements: Some(vec!["riser".to_string()]),
            }],
            120.0,
            "Am",
        )
        .unwrap();
        let actions = ArrangementExecutor::new().plan(&arrangement, true);
        assert!(!actions.iter().any(|a| matches!(a, ArrangementAction::Automation { .. })));
    }

    #[test]
    fn test_ramp_targets() {
        assert_eq!(ramp_target("filter_cutoff"), Some((0, 1, CurveShape::Exponential)));
        assert_eq!(ramp_target("master_volume").map(|t| t.0), Some(MIXER_DEVICE));
        assert_eq!(ramp_target("wobble"), None);
    }

    #[test]
    fn test_render_patterns() {
        let key = Key::parse("Am").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(render_pattern(&mut rng, "four_on_floor", &key, 2).unwrap().len(), 8);
        assert_eq!(render_pattern(&mut rng, "16th", &key, 1).unwrap().len(), 16);
        assert_eq!(render_pattern(&mut rng, "sustained_chord", &key, 4).unwrap().len(), 12);
        assert!(!render_pattern(&mut rng, "subtle", &key, 2).unwrap().is_empty());
        assert!(render_pattern(&mut rng, "buildup_fill", &key, 2).unwrap().is_empty());
    }

    #[test]
    fn test_actions_serialize_with_tag() {
        let json = serde_json::to_value(ArrangementAction::SetTempo { tempo: 120.0 }).unwrap();
        assert_eq!(json["action"], "set_tempo");
    }
}
