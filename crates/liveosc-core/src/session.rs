//! Tool-calling session.
//!
//! A [`Session`] owns everything one conversation with Live needs: the
//! configuration, an optional [`LiveApi`], the local project model, the
//! random source used by the generators and the scene auto-player. Tools are
//! dispatched by name with JSON parameters and always answer with a line of
//! text; failures are rendered as `[ERR] ...` rather than returned.
//!
//! Without a connection the session runs offline: tools still update the
//! project model and report what they would have done, prefixed with
//! `[OFFLINE]`.

use anyhow::{anyhow, bail, Context};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::arrangement::{
    generate_custom, generate_from_template, list_genres, Arrangement, ArrangementAction,
    ArrangementExecutor, SectionSpec,
};
use crate::autoplay::{scene_duration, AutoPlayer};
use crate::config::Config;
use crate::error::Result;
use crate::generators::{
    create_arpeggio_with, create_bassline, create_chords, create_melody_with, drum_pattern,
    DrumKind, Note,
};
use crate::live::LiveApi;
use crate::mixing::{
    mix_preset, mood_tempo, suggest_mix_improvements, AutoMixer, MixAction, Mood, Remedy,
    Severity, TrackMeasurements,
};

/// Longest pattern a `create_*` tool will render.
pub const MAX_PATTERN_BARS: u32 = 1024;

/// Longest arrangement `generate_arrangement` accepts, in minutes.
pub const MAX_ARRANGEMENT_MINUTES: f64 = 60.0;

fn check_bars(bars: u32) -> anyhow::Result<()> {
    if bars == 0 || bars > MAX_PATTERN_BARS {
        bail!("bars must be between 1 and {}, got {}", MAX_PATTERN_BARS, bars);
    }
    Ok(())
}

fn check_tempo(tempo: f64) -> anyhow::Result<()> {
    if !(tempo.is_finite() && tempo > 0.0) {
        bail!("invalid tempo {}", tempo);
    }
    Ok(())
}

/// Browser path of the device loaded for each effect name.
pub fn effect_device(effect: &str) -> Option<&'static str> {
    let device = match effect.trim().to_lowercase().as_str() {
        "reverb" => "Audio Effects/Reverb",
        "delay" => "Audio Effects/Delay",
        "chorus" => "Audio Effects/Chorus",
        "distortion" | "saturator" => "Audio Effects/Saturator",
        "compressor" => "Audio Effects/Compressor",
        "eq" => "Audio Effects/EQ Eight",
        "filter" => "Audio Effects/Auto Filter",
        "limiter" => "Audio Effects/Limiter",
        _ => return None,
    };
    Some(device)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectTrack {
    pub index: i32,
    pub name: String,
    pub kind: &'static str,
    pub detail: String,
}

/// Local model of the project, kept whether or not Live is connected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectState {
    pub tempo: f64,
    pub key: String,
    pub tracks: Vec<ProjectTrack>,
    pub is_playing: bool,
    pub arrangement: Option<Arrangement>,
    /// Index the next created track goes to
    pub track_counter: i32,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            key: "Am".to_string(),
            tracks: Vec::new(),
            is_playing: false,
            arrangement: None,
            track_counter: 0,
        }
    }
}

impl ProjectState {
    /// Tracks as mix measurements with neutral levels.
    pub fn measurements(&self) -> Vec<TrackMeasurements> {
        self.tracks
            .iter()
            .map(|t| TrackMeasurements::named(t.index, &t.name))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    Connected { tempo: Option<f32> },
    AlreadyConnected { tempo: f64 },
    Offline { reason: String },
}

#[derive(Debug)]
pub struct Session {
    config: Config,
    live: Option<LiveApi>,
    project: ProjectState,
    rng: StdRng,
    autoplay: AutoPlayer,
    force_offline: bool,
}

impl Session {
    /// A session that connects on `connect()` or `ableton_connect`.
    pub fn new(config: Config) -> Self {
        let rng = match config.generation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            config,
            live: None,
            project: ProjectState::default(),
            rng,
            autoplay: AutoPlayer::new(),
            force_offline: false,
        }
    }

    /// A session that never opens a socket.
    pub fn offline(config: Config) -> Self {
        let mut session = Self::new(config);
        session.force_offline = true;
        session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn project(&self) -> &ProjectState {
        &self.project
    }

    pub fn live(&self) -> Option<&LiveApi> {
        self.live.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_auto_playing(&self) -> bool {
        self.autoplay.is_running()
    }

    /// Start a transport and check that Live answers. Any failure leaves the session
    /// offline.
    pub fn connect(&mut self) -> ConnectOutcome {
        if self.live.is_some() {
            return ConnectOutcome::AlreadyConnected {
                tempo: self.project.tempo,
            };
        }
        if self.force_offline {
            return ConnectOutcome::Offline {
                reason: "offline mode".to_string(),
            };
        }

        let endpoint = self.config.endpoint();
        let live = match LiveApi::start(endpoint.clone(), self.config.timeouts.clone()) {
            Ok(live) => live,
            Err(e) => {
                warn!("[Session] Could not start transport: {}", e);
                return ConnectOutcome::Offline {
                    reason: e.to_string(),
                };
            }
        };
        if !live.test_connection() {
            live.transport().stop();
            warn!("[Session] No reply from Live at {}", endpoint.remote_addr());
            return ConnectOutcome::Offline {
                reason: format!("no reply from Live at {}", endpoint.remote_addr()),
            };
        }

        let tempo = live.state().tempo();
        if let Some(tempo) = tempo {
            self.project.tempo = tempo as f64;
        }
        info!("[Session] Connected to Live at {}", endpoint.remote_addr());
        self.live = Some(live);
        ConnectOutcome::Connected { tempo }
    }

    /// Stop auto-play and the transport. The project model is kept.
    pub fn disconnect(&mut self) {
        self.autoplay.stop();
        if let Some(live) = self.live.take() {
            live.transport().stop();
            info!("[Session] Disconnected");
        }
    }

    /// Run a tool and render its result as text.
    pub fn call_tool(&mut self, name: &str, params: &Value) -> String {
        debug!("[Session] {} {}", name, params);
        match self.dispatch(name, params) {
            Ok(text) => text,
            Err(e) => format!("[ERR] {:#}", e),
        }
    }

    fn dispatch(&mut self, name: &str, params: &Value) -> anyhow::Result<String> {
        match name {
            "ableton_connect" => Ok(self.connect_tool()),
            "set_tempo" => self.set_tempo(parse(name, params)?),
            "play" => self.set_playing(true),
            "stop" => self.set_playing(false),
            "create_drum_track" => self.create_drum_track(parse(name, params)?),
            "create_melody" => self.create_melody(parse(name, params)?),
            "create_bassline" => self.create_bassline(parse(name, params)?),
            "create_chords" => self.create_chords(parse(name, params)?),
            "create_arpeggio" => self.create_arpeggio(parse(name, params)?),
            "analyze_mix" => Ok(self.analyze_mix(parse(name, params)?)),
            "fix_mixing_issue" => self.fix_mixing_issue(parse(name, params)?),
            "add_sidechain" => self.add_sidechain(parse(name, params)?),
            "add_effect" => self.add_effect(parse(name, params)?),
            "set_track_volume" => self.set_track_volume(parse(name, params)?),
            "set_track_pan" => self.set_track_pan(parse(name, params)?),
            "generate_arrangement" => self.generate_arrangement(parse(name, params)?),
            "execute_arrangement" => self.execute_arrangement(parse(name, params)?),
            "modify_mood" => self.modify_mood(parse(name, params)?),
            "get_project_info" => Ok(self.project_info()),
            "list_genres" | "list_available_genres" => {
                Ok(format!("Available genres: {}", list_genres().join(", ")))
            }
            "fire_scene" => self.fire_scene(parse(name, params)?),
            "auto_play_scenes" => self.auto_play_scenes(parse(name, params)?),
            "stop_auto_play" => Ok(self.stop_auto_play()),
            "get_track_info" => self.get_track_info(parse(name, params)?),
            "get_device_parameters" => self.get_device_parameters(parse(name, params)?),
            _ => Ok(format!("[ERR] unknown tool: {}", name)),
        }
    }

    fn offline_tag(&self, text: String) -> String {
        if self.live.is_some() {
            text
        } else {
            format!("[OFFLINE] {}", text)
        }
    }

    fn connect_tool(&mut self) -> String {
        match self.connect() {
            ConnectOutcome::Connected { tempo } => match tempo {
                Some(tempo) => format!("[OK] Connected to Live (tempo: {} BPM)", tempo),
                None => "[OK] Connected to Live".to_string(),
            },
            ConnectOutcome::AlreadyConnected { tempo } => {
                format!("[OK] Already connected to Live (tempo: {} BPM)", tempo)
            }
            ConnectOutcome::Offline { reason } => {
                format!("[WARN] Could not connect ({}); working offline", reason)
            }
        }
    }

    fn set_tempo(&mut self, p: TempoParams) -> anyhow::Result<String> {
        check_tempo(p.bpm)?;
        if let Some(live) = &self.live {
            live.set_tempo(p.bpm as f32)?;
        }
        self.project.tempo = p.bpm;
        Ok(self.offline_tag(format!("Tempo set to {} BPM", p.bpm)))
    }

    fn set_playing(&mut self, playing: bool) -> anyhow::Result<String> {
        if let Some(live) = &self.live {
            if playing {
                live.play()?;
            } else {
                live.stop()?;
            }
        }
        self.project.is_playing = playing;
        let text = if playing { "Playback started" } else { "Playback stopped" };
        Ok(self.offline_tag(text.to_string()))
    }

    /// Create a MIDI track at the next index with one clip of `notes`.
    fn add_track(
        &mut self,
        name: &str,
        kind: &'static str,
        detail: String,
        bars: u32,
        notes: &[Note],
    ) -> Result<i32> {
        let index = self.project.track_counter;
        if let Some(live) = &self.live {
            live.create_midi_track(index)?;
        }
        // The track exists in Live from here on, even if filling it fails.
        self.project.tracks.push(ProjectTrack {
            index,
            name: name.to_string(),
            kind,
            detail,
        });
        self.project.track_counter += 1;
        if let Some(live) = &self.live {
            live.set_track_name(index, name)?;
            live.create_clip(index, 0, bars as f64 * 4.0)?;
            live.add_notes(index, 0, notes)?;
        }
        Ok(index)
    }

    fn create_drum_track(&mut self, p: DrumParams) -> anyhow::Result<String> {
        check_bars(p.bars)?;
        let kind = DrumKind::from_name(&p.pattern_type);
        let notes = drum_pattern(kind, p.bars);
        let index = self.add_track(&p.name, "drum", kind.name().to_string(), p.bars, &notes)?;
        Ok(self.offline_tag(format!(
            "Created drum track '{}' on track {} ({}, {} bars, {} notes)",
            p.name,
            index,
            kind.name(),
            p.bars,
            notes.len()
        )))
    }

    fn create_melody(&mut self, p: MelodyParams) -> anyhow::Result<String> {
        check_bars(p.bars)?;
        let notes = create_melody_with(&mut self.rng, &p.root, &p.scale, p.bars, &p.contour, p.density)?;
        let detail = format!("{} {}", p.root, p.scale);
        let index = self.add_track("Melody", "melody", detail, p.bars, &notes)?;
        Ok(self.offline_tag(format!(
            "Created melody on track {} ({} {}, {} bars, density {}, {} notes)",
            index,
            p.root,
            p.scale,
            p.bars,
            p.density,
            notes.len()
        )))
    }

    fn create_bassline(&mut self, p: BassParams) -> anyhow::Result<String> {
        check_bars(p.bars)?;
        let notes = create_bassline(&p.root, &p.scale, p.bars, &p.style)?;
        let index = self.add_track("Bass", "bass", p.style.clone(), p.bars, &notes)?;
        Ok(self.offline_tag(format!(
            "Created bassline on track {} ({} style, {} bars, {} notes)",
            index,
            p.style,
            p.bars,
            notes.len()
        )))
    }

    fn create_chords(&mut self, p: ChordParams) -> anyhow::Result<String> {
        check_bars(p.bars)?;
        let chords = create_chords(&p.root, &p.scale, p.bars, &p.style)?;
        let notes: Vec<Note> = chords.into_iter().flatten().collect();
        let index = self.add_track("Chords", "chords", p.style.clone(), p.bars, &notes)?;
        Ok(self.offline_tag(format!(
            "Created chords on track {} ({} progression, {} bars)",
            index, p.style, p.bars
        )))
    }

    fn create_arpeggio(&mut self, p: ArpParams) -> anyhow::Result<String> {
        check_bars(p.bars)?;
        let notes = create_arpeggio_with(&mut self.rng, &p.root, &p.chord, p.bars, &p.pattern, &p.rate)?;
        let index = self.add_track("Arp", "arpeggio", p.pattern.clone(), p.bars, &notes)?;
        Ok(self.offline_tag(format!(
            "Created arpeggio on track {} ({} {}, {} pattern, {})",
            index, p.root, p.chord, p.pattern, p.rate
        )))
    }

    fn analyze_mix(&self, p: AnalyzeParams) -> String {
        let tracks = p.tracks.unwrap_or_else(|| self.project.measurements());
        let mixer = AutoMixer::new();
        let issues = mixer.analyzer().analyze(&tracks);
        if issues.is_empty() {
            return "No major mix problems found".to_string();
        }

        let mut lines = vec![format!("Mix analysis ({} issues):", issues.len())];
        for issue in issues.iter().take(5) {
            let tag = match issue.severity {
                Severity::High => "HIGH",
                Severity::Medium => "MED",
                Severity::Low => "LOW",
            };
            lines.push(format!("  [{}] {}", tag, issue.description));
        }
        if let Some(genre) = p.genre {
            let preset = mix_preset(&genre);
            if let Some(lufs) = preset["master"]["target_lufs"].as_f64() {
                lines.push(format!("  Target loudness for {}: {} LUFS", genre, lufs));
            }
        }
        lines.join("\n")
    }

    fn fix_mixing_issue(&mut self, p: FixParams) -> anyhow::Result<String> {
        let tracks = self.project.measurements();
        let suggestions = suggest_mix_improvements(&tracks, &p.issue);
        if suggestions.is_empty() {
            return Ok(format!("No specific suggestions for '{}'", p.issue));
        }

        let mut lines = vec![format!("Suggestions for '{}':", p.issue)];
        for s in &suggestions {
            lines.push(format!("  - {}: {}", s.title, s.description));
        }
        if p.auto_fix {
            let plan = AutoMixer::new().auto_mix(&tracks, "edm");
            match &self.live {
                Some(live) => {
                    for action in &plan.actions {
                        if let Some(done) = apply_mix_action(live, action)? {
                            lines.push(format!("  applied: {}", done));
                        }
                    }
                }
                None => lines.push(format!(
                    "  [OFFLINE] {} automatic fixes need a connection to Live",
                    plan.actions.len()
                )),
            }
        }
        Ok(lines.join("\n"))
    }

    fn add_sidechain(&mut self, p: SidechainParams) -> anyhow::Result<String> {
        if let Some(live) = &self.live {
            live.load_device(p.target_track, COMPRESSOR)?;
        }
        Ok(self.offline_tag(format!(
            "Sidechain: track {} -> track {} (amount {})",
            p.trigger_track, p.target_track, p.amount
        )))
    }

    fn add_effect(&mut self, p: EffectParams) -> anyhow::Result<String> {
        let device = effect_device(&p.effect_type)
            .ok_or_else(|| anyhow!("unknown effect '{}'", p.effect_type))?;
        if let Some(live) = &self.live {
            live.load_device(p.track_index, device)?;
        }
        Ok(self.offline_tag(format!("Added {} to track {}", p.effect_type, p.track_index)))
    }

    fn set_track_volume(&mut self, p: VolumeParams) -> anyhow::Result<String> {
        if let Some(live) = &self.live {
            live.set_track_volume(p.track_index, p.volume)?;
        }
        Ok(self.offline_tag(format!("Track {} volume set to {}", p.track_index, p.volume)))
    }

    fn set_track_pan(&mut self, p: PanParams) -> anyhow::Result<String> {
        if let Some(live) = &self.live {
            live.set_track_pan(p.track_index, p.pan)?;
        }
        Ok(self.offline_tag(format!("Track {} pan set to {}", p.track_index, p.pan)))
    }

    fn generate_arrangement(&mut self, p: ArrangementParams) -> anyhow::Result<String> {
        if let Some(tempo) = p.tempo {
            check_tempo(tempo)?;
        }
        let arrangement = match &p.sections {
            Some(sections) => {
                let tempo = p.tempo.unwrap_or(self.project.tempo);
                let key = p.key.as_deref().unwrap_or(&self.project.key).to_string();
                generate_custom(sections, tempo, &key)?
            }
            None => {
                let minutes = p.duration_minutes;
                if !(minutes.is_finite() && minutes > 0.0 && minutes <= MAX_ARRANGEMENT_MINUTES) {
                    bail!(
                        "duration_minutes must be above 0 and at most {}, got {}",
                        MAX_ARRANGEMENT_MINUTES,
                        minutes
                    );
                }
                let genre = p.genre.as_deref().unwrap_or("edm");
                generate_from_template(genre, p.duration_minutes, p.tempo, p.key.as_deref())
            }
        };
        self.project.tempo = arrangement.tempo;
        self.project.key = arrangement.key.clone();
        let text = format!("Generated arrangement:\n\n{}", arrangement.describe());
        self.project.arrangement = Some(arrangement);
        Ok(text)
    }

    fn execute_arrangement(&mut self, p: ExecuteParams) -> anyhow::Result<String> {
        let arrangement = self
            .project
            .arrangement
            .as_ref()
            .context("no arrangement yet; call generate_arrangement first")?;
        let mut executor = ArrangementExecutor::new();
        let actions = executor.plan(arrangement, p.create_tracks);

        match &self.live {
            Some(live) => {
                let report = executor.apply(live, &mut self.rng, arrangement, &actions)?;
                Ok(format!(
                    "Placed arrangement: {} actions ({} tracks, {} clips, {} notes, {} ramps)",
                    report.actions, report.tracks, report.clips, report.notes, report.ramps
                ))
            }
            None => {
                let tracks = count_actions(&actions, |a| matches!(a, ArrangementAction::CreateTrack { .. }));
                let clips = count_actions(&actions, |a| matches!(a, ArrangementAction::CreateClip { .. }));
                Ok(format!(
                    "[OFFLINE] Planned arrangement: {} actions ({} tracks, {} clips)",
                    actions.len(),
                    tracks,
                    clips
                ))
            }
        }
    }

    fn modify_mood(&mut self, p: MoodParams) -> anyhow::Result<String> {
        let name = p.mood.trim().to_lowercase();
        let mood = Mood::from_name(&name);
        let tempo = mood_tempo(self.project.tempo, mood, p.intensity);
        if let Some(live) = &self.live {
            live.set_tempo(tempo as f32)?;
        }
        self.project.tempo = tempo;

        let mut lines = vec![
            format!("Mood set to '{}'", name),
            format!("  Tempo: {:.0} BPM", tempo),
        ];
        if let Some(mood) = mood {
            lines.push(format!("  {}", mood.description()));
            lines.push(format!("  Suggested effects: {}", mood.effects().join(", ")));
        }
        Ok(self.offline_tag(lines.join("\n")))
    }

    fn project_info(&self) -> String {
        let p = &self.project;
        let mut lines = vec![
            "Project:".to_string(),
            format!("  Tempo: {} BPM", p.tempo),
            format!("  Key: {}", p.key),
            format!("  Tracks: {}", p.tracks.len()),
            format!("  Playing: {}", if p.is_playing { "yes" } else { "no" }),
            format!("  Mode: {}", if self.is_online() { "live" } else { "offline" }),
        ];
        if let Some(arrangement) = &p.arrangement {
            lines.push(format!(
                "  Arrangement: {} ({} bars)",
                arrangement.title, arrangement.total_bars
            ));
        }
        if self.autoplay.is_running() {
            lines.push("  Auto-play: running".to_string());
        }
        for track in &p.tracks {
            lines.push(format!("    - [{}] {} ({}, {})", track.index, track.name, track.kind, track.detail));
        }
        lines.join("\n")
    }

    fn fire_scene(&mut self, p: SceneParams) -> anyhow::Result<String> {
        if let Some(live) = &self.live {
            live.fire_scene(p.scene)?;
        }
        Ok(self.offline_tag(format!("Fired scene {}", p.scene)))
    }

    fn auto_play_scenes(&mut self, p: AutoPlayParams) -> anyhow::Result<String> {
        let bars = p
            .bars_per_scene
            .unwrap_or(self.config.autoplay.default_bars_per_scene);
        let tempo = p.tempo.unwrap_or(self.project.tempo);
        let count = p.scenes.len();

        let step = match &self.live {
            Some(live) => self.autoplay.start(live.clone(), p.scenes, bars, tempo)?,
            None => {
                if count == 0 || bars == 0 {
                    bail!("auto-play needs scenes and bars_per_scene >= 1");
                }
                scene_duration(bars, tempo)?
            }
        };
        Ok(self.offline_tag(format!(
            "Auto-playing {} scenes, {} bars each ({:.1}s per scene at {} BPM)",
            count,
            bars,
            step.as_secs_f64(),
            tempo
        )))
    }

    fn stop_auto_play(&mut self) -> String {
        if self.autoplay.stop() {
            "Auto-play stopped".to_string()
        } else {
            "Auto-play was not running".to_string()
        }
    }

    fn get_track_info(&mut self, p: TrackParams) -> anyhow::Result<String> {
        match &self.live {
            Some(live) => {
                let info = live.get_track_info(p.track_index)?;
                Ok(format!(
                    "Track {}: name={}, volume={}, pan={}",
                    info.index,
                    info.name.as_deref().unwrap_or("-"),
                    show(info.volume),
                    show(info.pan)
                ))
            }
            None => {
                let name = self
                    .project
                    .tracks
                    .iter()
                    .find(|t| t.index == p.track_index)
                    .map_or("unknown", |t| t.name.as_str());
                Ok(format!("[OFFLINE] Track {}: name={}", p.track_index, name))
            }
        }
    }

    fn get_device_parameters(&mut self, p: DeviceParams) -> anyhow::Result<String> {
        let Some(live) = &self.live else {
            return Ok("[OFFLINE] Device parameters need a connection to Live".to_string());
        };
        let values = live.get_device_parameter_values(p.track_index, p.device_index)?;
        if values.is_empty() {
            return Ok(format!(
                "No parameters reported for track {} device {}",
                p.track_index, p.device_index
            ));
        }
        let mut lines = vec![format!("Track {} device {}:", p.track_index, p.device_index)];
        for (i, (name, value)) in values.iter().enumerate() {
            lines.push(format!("  {}. {} = {}", i, name, show(*value)));
        }
        Ok(lines.join("\n"))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

const COMPRESSOR: &str = "Audio Effects/Compressor";
const EQ_EIGHT: &str = "Audio Effects/EQ Eight";

/// Apply one auto-mix action. Level changes need the current fader value,
/// which the action does not carry, so they are skipped.
fn apply_mix_action(live: &LiveApi, action: &MixAction) -> Result<Option<String>> {
    let done = match &action.remedy {
        Remedy::SetPan { track, pan } => {
            live.set_track_pan(*track, *pan as f32)?;
            format!("centred track {}", track)
        }
        Remedy::SidechainCompression { target_track, .. } => {
            live.load_device(*target_track, COMPRESSOR)?;
            format!("compressor on track {} for sidechain", target_track)
        }
        Remedy::Compression { track, .. } => {
            live.load_device(*track, COMPRESSOR)?;
            format!("compressor on track {}", track)
        }
        Remedy::Eq { tracks } => {
            for eq in tracks {
                live.load_device(eq.track, EQ_EIGHT)?;
            }
            format!("EQ on {} tracks", tracks.len())
        }
        Remedy::SetVolume { .. } | Remedy::ReduceCompression { .. } => return Ok(None),
    };
    Ok(Some(done))
}

fn count_actions(actions: &[ArrangementAction], pred: impl Fn(&ArrangementAction) -> bool) -> usize {
    actions.iter().filter(|a| pred(a)).count()
}

fn show(value: Option<f32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

/// Deserialize tool parameters; `null` counts as an empty object.
fn parse<T: DeserializeOwned>(tool: &str, params: &Value) -> anyhow::Result<T> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params).with_context(|| format!("invalid parameters for {}", tool))
}

fn default_root() -> String {
    "C".to_string()
}

fn default_scale() -> String {
    "minor".to_string()
}

fn two() -> u32 {
    2
}

fn four() -> u32 {
    4
}

fn half() -> f64 {
    0.5
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TempoParams {
    bpm: f64,
}

#[derive(Debug, Deserialize)]
struct DrumParams {
    pattern_type: String,
    #[serde(default = "two")]
    bars: u32,
    #[serde(default = "DrumParams::default_name")]
    name: String,
}

impl DrumParams {
    fn default_name() -> String {
        "Drums".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct MelodyParams {
    #[serde(default = "default_root")]
    root: String,
    #[serde(default = "default_scale")]
    scale: String,
    #[serde(default = "four")]
    bars: u32,
    #[serde(default = "half")]
    density: f64,
    #[serde(default = "MelodyParams::default_contour")]
    contour: String,
}

impl MelodyParams {
    fn default_contour() -> String {
        "wave".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct BassParams {
    #[serde(default = "default_root")]
    root: String,
    #[serde(default = "default_scale")]
    scale: String,
    #[serde(default = "BassParams::default_style")]
    style: String,
    #[serde(default = "four")]
    bars: u32,
}

impl BassParams {
    fn default_style() -> String {
        "basic".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ChordParams {
    #[serde(default = "default_root")]
    root: String,
    #[serde(default = "default_scale")]
    scale: String,
    #[serde(default = "ChordParams::default_style")]
    style: String,
    #[serde(default = "four")]
    bars: u32,
}

impl ChordParams {
    fn default_style() -> String {
        "pop".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ArpParams {
    #[serde(default = "default_root")]
    root: String,
    #[serde(default = "default_scale")]
    chord: String,
    #[serde(default = "ArpParams::default_pattern")]
    pattern: String,
    #[serde(default = "ArpParams::default_rate")]
    rate: String,
    #[serde(default = "two")]
    bars: u32,
}

impl ArpParams {
    fn default_pattern() -> String {
        "up".to_string()
    }

    fn default_rate() -> String {
        "16th".to_string()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzeParams {
    tracks: Option<Vec<TrackMeasurements>>,
    genre: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FixParams {
    issue: String,
    #[serde(default)]
    auto_fix: bool,
}

#[derive(Debug, Deserialize)]
struct SidechainParams {
    trigger_track: i32,
    target_track: i32,
    #[serde(default = "half")]
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct EffectParams {
    track_index: i32,
    effect_type: String,
}

#[derive(Debug, Deserialize)]
struct VolumeParams {
    track_index: i32,
    volume: f32,
}

#[derive(Debug, Deserialize)]
struct PanParams {
    track_index: i32,
    pan: f32,
}

#[derive(Debug, Deserialize)]
struct ArrangementParams {
    genre: Option<String>,
    #[serde(default = "ArrangementParams::default_minutes")]
    duration_minutes: f64,
    tempo: Option<f64>,
    key: Option<String>,
    sections: Option<Vec<SectionSpec>>,
}

impl ArrangementParams {
    fn default_minutes() -> f64 {
        4.0
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteParams {
    #[serde(default = "yes")]
    create_tracks: bool,
}

#[derive(Debug, Deserialize)]
struct MoodParams {
    mood: String,
    #[serde(default = "half")]
    intensity: f64,
}

#[derive(Debug, Deserialize)]
struct SceneParams {
    scene: i32,
}

#[derive(Debug, Deserialize)]
struct AutoPlayParams {
    scenes: Vec<i32>,
    bars_per_scene: Option<u32>,
    tempo: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrackParams {
    track_index: i32,
}

#[derive(Debug, Deserialize)]
struct DeviceParams {
    track_index: i32,
    #[serde(default)]
    device_index: i32,
}

/// Names, descriptions and JSON parameter schemas of every tool.
pub fn tool_catalogue() -> Value {
    let tools = vec![
        tool("ableton_connect", "Connect to Ableton Live", json!({})),
        tool(
            "set_tempo",
            "Set the song tempo",
            json!({"bpm": {"type": "number", "description": "Tempo in BPM"}}),
        )
        .required(&["bpm"]),
        tool("play", "Start playback", json!({})),
        tool("stop", "Stop playback", json!({})),
        tool(
            "create_drum_track",
            "Create a drum track from a pattern",
            json!({
                "pattern_type": {"type": "string", "enum": ["basic_beat", "four_on_floor", "trap", "breakbeat"]},
                "bars": {"type": "integer", "default": 2},
                "name": {"type": "string", "default": "Drums"},
            }),
        )
        .required(&["pattern_type"]),
        tool(
            "create_melody",
            "Generate a melody over a scale",
            json!({
                "root": {"type": "string", "default": "C"},
                "scale": {"type": "string", "default": "minor"},
                "bars": {"type": "integer", "default": 4},
                "density": {"type": "number", "default": 0.5},
                "contour": {"type": "string", "enum": ["ascending", "descending", "wave", "random"], "default": "wave"},
            }),
        ),
        tool(
            "create_bassline",
            "Generate a bassline",
            json!({
                "root": {"type": "string", "default": "C"},
                "scale": {"type": "string", "default": "minor"},
                "style": {"type": "string", "enum": ["basic", "walking", "syncopated", "octave", "arpeggiated"], "default": "basic"},
                "bars": {"type": "integer", "default": 4},
            }),
        ),
        tool(
            "create_chords",
            "Generate a chord progression",
            json!({
                "root": {"type": "string", "default": "C"},
                "scale": {"type": "string", "default": "minor"},
                "style": {"type": "string", "enum": ["pop", "jazz", "sad", "epic", "dark", "edm", "lofi", "cinematic"], "default": "pop"},
                "bars": {"type": "integer", "default": 4},
            }),
        ),
        tool(
            "create_arpeggio",
            "Generate an arpeggio over a chord",
            json!({
                "root": {"type": "string", "default": "C"},
                "chord": {"type": "string", "default": "minor"},
                "pattern": {"type": "string", "enum": ["up", "down", "up_down", "random", "played"], "default": "up"},
                "rate": {"type": "string", "enum": ["8th", "16th", "triplet"], "default": "16th"},
                "bars": {"type": "integer", "default": 2},
            }),
        ),
        tool(
            "analyze_mix",
            "Check the mix for common problems",
            json!({
                "tracks": {"type": "array", "items": {"type": "object"}, "description": "Measured levels; defaults to project tracks"},
                "genre": {"type": "string"},
            }),
        ),
        tool(
            "fix_mixing_issue",
            "Suggest fixes for a described mix problem",
            json!({
                "issue": {"type": "string", "description": "e.g. 'kick and bass clash'"},
                "auto_fix": {"type": "boolean", "default": false},
            }),
        )
        .required(&["issue"]),
        tool(
            "add_sidechain",
            "Duck one track from another",
            json!({
                "trigger_track": {"type": "integer"},
                "target_track": {"type": "integer"},
                "amount": {"type": "number", "default": 0.5},
            }),
        )
        .required(&["trigger_track", "target_track"]),
        tool(
            "add_effect",
            "Load an audio effect onto a track",
            json!({
                "track_index": {"type": "integer"},
                "effect_type": {"type": "string", "enum": ["reverb", "delay", "chorus", "distortion", "compressor", "eq", "filter", "limiter", "saturator"]},
            }),
        )
        .required(&["track_index", "effect_type"]),
        tool(
            "set_track_volume",
            "Set a track fader (0.0-1.0)",
            json!({"track_index": {"type": "integer"}, "volume": {"type": "number"}}),
        )
        .required(&["track_index", "volume"]),
        tool(
            "set_track_pan",
            "Set a track pan (-1.0-1.0)",
            json!({"track_index": {"type": "integer"}, "pan": {"type": "number"}}),
        )
        .required(&["track_index", "pan"]),
        tool(
            "generate_arrangement",
            "Plan a song structure from a genre template or custom sections",
            json!({
                "genre": {"type": "string"},
                "duration_minutes": {"type": "number", "default": 4.0},
                "tempo": {"type": "number"},
                "key": {"type": "string"},
                "sections": {"type": "array", "items": {"type": "object"}},
            }),
        ),
        tool(
            "execute_arrangement",
            "Place the current arrangement in Live",
            json!({"create_tracks": {"type": "boolean", "default": true}}),
        ),
        tool(
            "modify_mood",
            "Shift tempo towards a mood",
            json!({
                "mood": {"type": "string", "enum": ["dark", "bright", "aggressive", "chill", "epic", "minimal"]},
                "intensity": {"type": "number", "default": 0.5},
            }),
        )
        .required(&["mood"]),
        tool("get_project_info", "Summarise the project", json!({})),
        tool("list_genres", "List arrangement genres", json!({})),
        tool(
            "fire_scene",
            "Launch a scene",
            json!({"scene": {"type": "integer"}}),
        )
        .required(&["scene"]),
        tool(
            "auto_play_scenes",
            "Launch scenes one after another",
            json!({
                "scenes": {"type": "array", "items": {"type": "integer"}},
                "bars_per_scene": {"type": "integer"},
                "tempo": {"type": "number"},
            }),
        )
        .required(&["scenes"]),
        tool("stop_auto_play", "Stop scene auto-play", json!({})),
        tool(
            "get_track_info",
            "Read a track's name, volume and pan",
            json!({"track_index": {"type": "integer"}}),
        )
        .required(&["track_index"]),
        tool(
            "get_device_parameters",
            "Read a device's parameter names and values",
            json!({"track_index": {"type": "integer"}, "device_index": {"type": "integer", "default": 0}}),
        )
        .required(&["track_index"]),
    ];
    Value::Array(tools.into_iter().map(|t| t.0).collect())
}

struct ToolEntry(Value);

fn tool(name: &str, description: &str, properties: Value) -> ToolEntry {
    ToolEntry(json!({
        "name": name,
        "description": description,
        "input_schema": {"type": "object", "properties": properties},
    }))
}

impl ToolEntry {
    fn required(mut self, fields: &[&str]) -> Self {
        self.0["input_schema"]["required"] = json!(fields);
        self
    }
}
