//! Heuristic mix analysis, auto-mix actions, genre presets and moods.
//!
//! Analysis is a single pass of fixed checks over supplied measurements.
//! No audio is inspected; tracks without measurements use neutral defaults.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Level measurements for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackMeasurements {
    pub index: i32,
    pub name: String,
    pub peak_db: f64,
    pub rms_db: f64,
    pub dynamic_range: f64,
    /// 0.0 mono, 1.0 full width
    pub stereo_width: f64,
}

impl Default for TrackMeasurements {
    fn default() -> Self {
        Self {
            index: 0,
            name: "Unknown".to_string(),
            peak_db: -6.0,
            rms_db: -18.0,
            dynamic_range: 12.0,
            stereo_width: 0.5,
        }
    }
}

impl TrackMeasurements {
    pub fn named(index: i32, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn name_has(&self, needles: &[&str]) -> bool {
        let name = self.name.to_lowercase();
        needles.iter().any(|n| name.contains(n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FrequencyClash,
    EqSuggestion,
    LevelTooHigh,
    LevelTooLow,
    DynamicsTooWide,
    OverCompressed,
    BassNotCentered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BandKind {
    Highpass,
    Bell,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EqBand {
    #[serde(rename = "type")]
    pub kind: BandKind,
    pub freq: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
    pub q: f64,
}

impl EqBand {
    fn new(kind: BandKind, freq: f64, gain: Option<f64>, q: f64) -> Self {
        Self { kind, freq, gain, q }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEq {
    pub track: i32,
    pub bands: Vec<EqBand>,
}

/// Suggested fix attached to an issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Remedy {
    SidechainCompression {
        trigger_track: i32,
        target_track: i32,
        threshold: f64,
        ratio: f64,
        attack_ms: f64,
        release_ms: f64,
    },
    Eq {
        tracks: Vec<TrackEq>,
    },
    SetVolume {
        track: i32,
        adjustment_db: f64,
    },
    Compression {
        track: i32,
        threshold: f64,
        ratio: f64,
        attack_ms: f64,
        release_ms: f64,
        makeup_gain: f64,
    },
    ReduceCompression {
        track: i32,
    },
    SetPan {
        track: i32,
        pan: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixIssue {
    pub kind: IssueKind,
    pub description: String,
    pub affected_tracks: Vec<i32>,
    pub severity: Severity,
    pub remedy: Remedy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MixAnalyzer;

impl MixAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Clashes, then levels, then dynamics, then stereo placement.
    pub fn analyze(&self, tracks: &[TrackMeasurements]) -> Vec<MixIssue> {
        let mut issues = self.frequency_clashes(tracks);
        issues.extend(tracks.iter().flat_map(level_issues));
        issues.extend(tracks.iter().filter_map(dynamics_issue));
        issues.extend(tracks.iter().filter_map(stereo_issue));
        issues
    }

    fn frequency_clashes(&self, tracks: &[TrackMeasurements]) -> Vec<MixIssue> {
        let kick = tracks.iter().find(|t| t.name_has(&["kick", "drum"]));
        let bass = tracks.iter().find(|t| t.name_has(&["bass"]));
        let (Some(kick), Some(bass)) = (kick, bass) else {
            return Vec::new();
        };
        let affected = vec![kick.index, bass.index];

        vec![
            MixIssue {
                kind: IssueKind::FrequencyClash,
                description: "Kick and bass are likely clashing in the low end".to_string(),
                affected_tracks: affected.clone(),
                severity: Severity::Medium,
                remedy: Remedy::SidechainCompression {
                    trigger_track: kick.index,
                    target_track: bass.index,
                    threshold: -20.0,
                    ratio: 4.0,
                    attack_ms: 1.0,
                    release_ms: 100.0,
                },
            },
            MixIssue {
                kind: IssueKind::EqSuggestion,
                description: "Carve separate space for kick and bass with EQ".to_string(),
                affected_tracks: affected,
                severity: Severity::Low,
                remedy: Remedy::Eq {
                    tracks: vec![
                        TrackEq {
                            track: kick.index,
                            bands: vec![
                                EqBand::new(BandKind::Highpass, 30.0, None, 0.7),
                                EqBand::new(BandKind::Bell, 60.0, Some(2.0), 1.5),
                                EqBand::new(BandKind::Cut, 350.0, Some(-3.0), 1.0),
                            ],
                        },
                        TrackEq {
                            track: bass.index,
                            bands: vec![
                                EqBand::new(BandKind::Highpass, 40.0, None, 0.7),
                                EqBand::new(BandKind::Cut, 60.0, Some(-2.0), 2.0),
                                EqBand::new(BandKind::Bell, 120.0, Some(2.0), 1.2),
                            ],
                        },
                    ],
                },
            },
        ]
    }
}

fn level_issues(track: &TrackMeasurements) -> Vec<MixIssue> {
    let mut issues = Vec::new();
    if track.peak_db > -3.0 {
        issues.push(MixIssue {
            kind: IssueKind::LevelTooHigh,
            description: format!("{} is peaking too hot ({:.1} dB)", track.name, track.peak_db),
            affected_tracks: vec![track.index],
            severity: Severity::High,
            remedy: Remedy::SetVolume {
                track: track.index,
                adjustment_db: -6.0,
            },
        });
    }
    if track.rms_db < -24.0 {
        issues.push(MixIssue {
            kind: IssueKind::LevelTooLow,
            description: format!("{} is quiet and may be buried in the mix", track.name),
            affected_tracks: vec![track.index],
            severity: Severity::Low,
            remedy: Remedy::SetVolume {
                track: track.index,
                adjustment_db: 3.0,
            },
        });
    }
    issues
}

fn dynamics_issue(track: &TrackMeasurements) -> Option<MixIssue> {
    if track.dynamic_range > 20.0 {
        Some(MixIssue {
            kind: IssueKind::DynamicsTooWide,
            description: format!("{} has too much dynamic range; add a compressor", track.name),
            affected_tracks: vec![track.index],
            severity: Severity::Medium,
            remedy: Remedy::Compression {
                track: track.index,
                threshold: -18.0,
                ratio: 3.0,
                attack_ms: 10.0,
                release_ms: 100.0,
                makeup_gain: 3.0,
            },
        })
    } else if track.dynamic_range < 4.0 {
        Some(MixIssue {
            kind: IssueKind::OverCompressed,
            description: format!("{} is over-compressed", track.name),
            affected_tracks: vec![track.index],
            severity: Severity::Low,
            remedy: Remedy::ReduceCompression { track: track.index },
        })
    } else {
        None
    }
}

fn stereo_issue(track: &TrackMeasurements) -> Option<MixIssue> {
    (track.name_has(&["kick", "bass", "sub"]) && track.stereo_width > 0.2).then(|| MixIssue {
        kind: IssueKind::BassNotCentered,
        description: format!("Center {}; low end should stay mono", track.name),
        affected_tracks: vec![track.index],
        severity: Severity::Medium,
        remedy: Remedy::SetPan {
            track: track.index,
            pan: 0.0,
        },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MixActionKind {
    Sidechain,
    Eq,
    Volume,
    Compression,
    Pan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixAction {
    pub kind: MixActionKind,
    pub description: String,
    pub remedy: Remedy,
}

/// Actions for every resolvable issue plus the genre preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixPlan {
    pub preset: Value,
    pub actions: Vec<MixAction>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoMixer {
    analyzer: MixAnalyzer,
}

impl AutoMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyzer(&self) -> &MixAnalyzer {
        &self.analyzer
    }

    pub fn auto_mix(&self, tracks: &[TrackMeasurements], genre: &str) -> MixPlan {
        let actions = self
            .analyzer
            .analyze(tracks)
            .into_iter()
            .filter_map(resolve_issue)
            .collect();
        MixPlan {
            preset: mix_preset(genre),
            actions,
        }
    }
}

/// Map an issue to an action. Over-compression has no automatic fix.
fn resolve_issue(issue: MixIssue) -> Option<MixAction> {
    let kind = match issue.remedy {
        Remedy::SidechainCompression { .. } => MixActionKind::Sidechain,
        Remedy::Eq { .. } => MixActionKind::Eq,
        Remedy::SetVolume { .. } => MixActionKind::Volume,
        Remedy::Compression { .. } => MixActionKind::Compression,
        Remedy::SetPan { .. } => MixActionKind::Pan,
        Remedy::ReduceCompression { .. } => return None,
    };
    Some(MixAction {
        kind,
        description: issue.description,
        remedy: issue.remedy,
    })
}

/// Per-genre processing hints. Unknown genres get the edm preset.
pub fn mix_preset(genre: &str) -> Value {
    match genre.trim().to_lowercase().as_str() {
        "hiphop" => json!({
            "kick": {"boost_60hz": 4, "boost_2khz": 2},
            "bass": {"sidechain": true, "sidechain_amount": 0.5},
            "vocal": {"compression_ratio": 3, "de_esser": true},
            "master": {"target_lufs": -10},
        }),
        "lofi" => json!({
            "drums": {"saturation": 0.3, "low_pass": 8000},
            "bass": {"saturation": 0.2},
            "master": {"tape_saturation": 0.2, "target_lufs": -14},
        }),
        "techno" => json!({
            "kick": {"compression_ratio": 6, "boost_100hz": 2},
            "hihat": {"high_pass": 500},
            "master": {"limiter_ceiling": -0.1, "target_lufs": -7},
        }),
        "ambient" => json!({
            "synth": {"reverb": 0.7, "delay": 0.4},
            "master": {"target_lufs": -18, "dynamic_range": "wide"},
        }),
        _ => json!({
            "kick": {"high_pass": 30, "boost_60hz": 3, "compression_ratio": 4},
            "bass": {"sidechain": true, "sidechain_amount": 0.7},
            "synth": {"reverb": 0.3, "stereo_width": 0.8},
            "master": {"limiter_ceiling": -0.3, "target_lufs": -8},
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum SuggestedAction {
    Sidechain {
        trigger_track: i32,
        target_track: i32,
        amount: f64,
    },
    EqCarve {
        tracks: Vec<i32>,
    },
    Eq {
        band: String,
        gain: f64,
        freq: f64,
    },
    Volume {
        adjustment_db: f64,
    },
    Compression {
        threshold: f64,
        ratio: f64,
        attack_ms: f64,
        release_ms: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub title: &'static str,
    pub description: &'static str,
    #[serde(flatten)]
    pub action: SuggestedAction,
}

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Keyword-matched suggestions for a free-text complaint. English and
/// Japanese phrasings are recognised.
pub fn suggest_mix_improvements(tracks: &[TrackMeasurements], issue: &str) -> Vec<Suggestion> {
    let text = issue.to_lowercase();
    let mut suggestions = Vec::new();

    if mentions(&text, &["キック", "ベース", "被", "衝突", "clash", "kick", "bass"]) {
        let kick = tracks
            .iter()
            .find(|t| t.name_has(&["kick", "drum"]))
            .map_or(0, |t| t.index);
        let bass = tracks
            .iter()
            .find(|t| t.name_has(&["bass"]))
            .map_or(1, |t| t.index);
        suggestions.push(Suggestion {
            title: "Sidechain compression",
            description: "Duck the bass automatically whenever the kick hits",
            action: SuggestedAction::Sidechain {
                trigger_track: kick,
                target_track: bass,
                amount: 0.5,
            },
        });
        suggestions.push(Suggestion {
            title: "EQ carving",
            description: "Kick: boost 50-80 Hz, bass: boost 80-150 Hz",
            action: SuggestedAction::EqCarve {
                tracks: vec![kick, bass],
            },
        });
    }

    if mentions(&text, &["濁", "マッド", "muddy", "こもり", "篭"]) {
        suggestions.push(Suggestion {
            title: "Low-mid cut",
            description: "Cut around 200-500 Hz to clear up mud",
            action: SuggestedAction::Eq {
                band: "low_mid".to_string(),
                gain: -3.0,
                freq: 350.0,
            },
        });
    }

    if mentions(&text, &["小さい", "聞こえない", "埋もれ", "quiet", "low"]) {
        suggestions.push(Suggestion {
            title: "Volume",
            description: "Raise the level",
            action: SuggestedAction::Volume { adjustment_db: 3.0 },
        });
    }

    if mentions(&text, &["大きい", "うるさい", "loud", "clip"]) {
        suggestions.push(Suggestion {
            title: "Volume",
            description: "Lower the level",
            action: SuggestedAction::Volume { adjustment_db: -6.0 },
        });
    }

    if mentions(&text, &["ダイナミクス", "抑揚", "dynamics", "パンチ", "迫力"]) {
        suggestions.push(Suggestion {
            title: "Compression",
            description: "Bring the dynamics under control",
            action: SuggestedAction::Compression {
                threshold: -18.0,
                ratio: 4.0,
                attack_ms: 10.0,
                release_ms: 100.0,
            },
        });
    }

    suggestions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Dark,
    Bright,
    Aggressive,
    Chill,
    Epic,
    Minimal,
}

impl Mood {
    pub fn from_name(name: &str) -> Option<Mood> {
        let mood = match name.trim().to_lowercase().as_str() {
            "dark" => Mood::Dark,
            "bright" => Mood::Bright,
            "aggressive" => Mood::Aggressive,
            "chill" => Mood::Chill,
            "epic" => Mood::Epic,
            "minimal" => Mood::Minimal,
            _ => return None,
        };
        Some(mood)
    }

    /// BPM change at full intensity.
    pub fn tempo_delta(self) -> f64 {
        match self {
            Mood::Dark => -20.0,
            Mood::Bright => 15.0,
            Mood::Aggressive => 30.0,
            Mood::Chill => -30.0,
            Mood::Epic => 10.0,
            Mood::Minimal => 0.0,
        }
    }

    pub fn effects(self) -> &'static [&'static str] {
        match self {
            Mood::Dark => &["reverb", "filter"],
            Mood::Bright => &["chorus"],
            Mood::Aggressive => &["distortion", "compressor"],
            Mood::Chill => &["reverb", "delay"],
            Mood::Epic => &["reverb", "compressor"],
            Mood::Minimal => &["filter"],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mood::Dark => "slower, weight on the low end",
            Mood::Bright => "faster, weight on the highs",
            Mood::Aggressive => "fast with distortion",
            Mood::Chill => "slow with reverb",
            Mood::Epic => "big and wide",
            Mood::Minimal => "stripped back",
        }
    }
}

/// New tempo for a mood change, kept within 60..=200 BPM. Unknown moods
/// leave the tempo alone apart from the clamp.
pub fn mood_tempo(current: f64, mood: Option<Mood>, intensity: f64) -> f64 {
    let delta = mood.map_or(0.0, Mood::tempo_delta);
    (current + delta * intensity).clamp(60.0, 200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kick_and_bass() -> Vec<TrackMeasurements> {
        vec![
            TrackMeasurements::named(0, "Kick"),
            TrackMeasurements::named(1, "Bass"),
            TrackMeasurements::named(2, "Synth Lead"),
        ]
    }

    #[test]
    fn test_kick_bass_clash() {
        let mut tracks = kick_and_bass();
        for t in &mut tracks {
            t.stereo_width = 0.0;
        }
        let issues = MixAnalyzer::new().analyze(&tracks);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::FrequencyClash);
        assert_eq!(issues[0].affected_tracks, vec![0, 1]);
        assert!(matches!(
            issues[0].remedy,
            Remedy::SidechainCompression { trigger_track: 0, target_track: 1, .. }
        ));
        assert_eq!(issues[1].kind, IssueKind::EqSuggestion);
    }

    #[test]
    fn test_defaults_flag_only_wide_low_end() {
        // default width 0.5 is too wide for kick and bass
        let issues = MixAnalyzer::new().analyze(&kick_and_bass());
        let centered: Vec<i32> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::BassNotCentered)
            .map(|i| i.affected_tracks[0])
            .collect();
        assert_eq!(centered, vec![0, 1]);
    }

    #[test]
    fn test_level_and_dynamics_checks() {
        let track = TrackMeasurements {
            peak_db: -1.0,
            rms_db: -30.0,
            dynamic_range: 25.0,
            ..TrackMeasurements::named(4, "Vocal")
        };
        let issues = MixAnalyzer::new().analyze(&[track]);
        let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::LevelTooHigh, IssueKind::LevelTooLow, IssueKind::DynamicsTooWide]
        );
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn test_over_compressed_is_not_auto_fixed() {
        let track = TrackMeasurements {
            dynamic_range: 2.0,
            ..TrackMeasurements::named(0, "Pad")
        };
        let plan = AutoMixer::new().auto_mix(&[track.clone()], "edm");
        assert_eq!(MixAnalyzer::new().analyze(&[track]).len(), 1);
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn test_auto_mix_actions() {
        let plan = AutoMixer::new().auto_mix(&kick_and_bass(), "techno");
        let kinds: Vec<MixActionKind> = plan.actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![MixActionKind::Sidechain, MixActionKind::Eq, MixActionKind::Pan, MixActionKind::Pan]
        );
        assert_eq!(plan.preset["kick"]["compression_ratio"], 6);
    }

    #[test]
    fn test_unknown_preset_is_edm() {
        assert_eq!(mix_preset("polka"), mix_preset("edm"));
        assert_eq!(mix_preset("LoFi")["master"]["target_lufs"], -14);
    }

    #[test]
    fn test_suggestions_by_keyword() {
        let tracks = kick_and_bass();
        let clash = suggest_mix_improvements(&tracks, "キックとベースが被ってる");
        assert_eq!(clash.len(), 2);
        assert_eq!(
            clash[0].action,
            SuggestedAction::Sidechain { trigger_track: 0, target_track: 1, amount: 0.5 }
        );

        let muddy = suggest_mix_improvements(&tracks, "The mix sounds muddy");
        assert_eq!(muddy.len(), 1);
        assert_eq!(muddy[0].title, "Low-mid cut");

        assert!(suggest_mix_improvements(&tracks, "sparkle please").is_empty());
    }

    #[test]
    fn test_suggestion_defaults_without_tracks() {
        let suggestions = suggest_mix_improvements(&[], "kick clash");
        assert_eq!(
            suggestions[1].action,
            SuggestedAction::EqCarve { tracks: vec![0, 1] }
        );
    }

    #[test]
    fn test_suggestion_serializes_flat() {
        let s = &suggest_mix_improvements(&[], "too loud")[0];
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["action"], "volume");
        assert_eq!(json["params"]["adjustment_db"], -6.0);
    }

    #[test]
    fn test_mood_tempo() {
        assert_eq!(mood_tempo(120.0, Mood::from_name("dark"), 0.5), 110.0);
        assert_eq!(mood_tempo(190.0, Mood::from_name("aggressive"), 1.0), 200.0);
        assert_eq!(mood_tempo(70.0, Mood::from_name("chill"), 1.0), 60.0);
        assert_eq!(mood_tempo(120.0, Mood::from_name("weird"), 1.0), 120.0);
        assert_eq!(Mood::Chill.effects(), &["reverb", "delay"]);
    }
}
