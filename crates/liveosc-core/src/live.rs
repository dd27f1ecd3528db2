//! Remote Live API over AbletonOSC.
//!
//! Each operation is either fire-and-forget (a single `send`) or a correlated
//! query. Indexed getters use [`ReplyMatch::EchoArgs`]: AbletonOSC echoes the
//! track/device/parameter indices at the head of its reply, which is what lets
//! several reads of the same path run at once without stealing each other's
//! answers.
//!
//! Batches (notes, automation steps) are loops of one-way sends with no
//! rollback. A failure part way through reports how many messages went out.

use crate::automation::AutomationPoint;
use crate::config::TimeoutSettings;
use crate::error::{Error, Result};
use crate::generators::Note;
use crate::osc::{arg_f32, arg_string};
use crate::transport::{ClipSlotInfo, Endpoint, Query, ReplyMatch, StateHandle, Transport};
use log::debug;
use rosc::OscType;
use std::sync::Arc;

/// Track, name, volume and pan read in one go. Each field is `None` when
/// Live did not answer in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    pub index: i32,
    pub name: Option<String>,
    pub volume: Option<f32>,
    pub pan: Option<f32>,
}

/// A device parameter whose envelope is written into a session clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationTarget {
    pub track: i32,
    pub clip: i32,
    pub device: i32,
    pub parameter: i32,
}

pub const ADD_NOTES: &str = "/live/clip/add/notes";
pub const AUTOMATION_STEP: &str = "/live/clip/set/automation_step";

#[derive(Clone)]
pub struct LiveApi {
    transport: Arc<Transport>,
    timeouts: TimeoutSettings,
}

impl LiveApi {
    pub fn new(transport: Arc<Transport>, timeouts: TimeoutSettings) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    /// Build and start a transport for `endpoint`.
    pub fn start(endpoint: Endpoint, timeouts: TimeoutSettings) -> Result<Self> {
        let transport = Transport::with_stale_grace(endpoint, timeouts.stale_grace());
        transport.start()?;
        Ok(Self::new(Arc::new(transport), timeouts))
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn state(&self) -> &StateHandle {
        self.transport.state()
    }

    pub fn test_connection(&self) -> bool {
        self.transport.test_connection(self.timeouts.connect())
    }

    fn send(&self, path: &str, args: Vec<OscType>) -> Result<()> {
        self.transport.send(path, args)
    }

    /// Query keyed by leading index arguments; returns the reply minus the echo.
    fn query_indexed(&self, path: &str, key: Vec<OscType>) -> Result<Option<Vec<OscType>>> {
        let query = Query::new(path, key, self.timeouts.query()).matching(ReplyMatch::EchoArgs);
        self.transport.query_with(query)
    }

    fn query_song<T>(&self, path: &str, read: fn(&OscType) -> Option<T>) -> Result<Option<T>> {
        let reply = self.transport.query(path, vec![], self.timeouts.query())?;
        Ok(reply.and_then(|args| args.first().and_then(read)))
    }

    // Transport

    pub fn play(&self) -> Result<()> {
        self.send("/live/song/start_playing", vec![])
    }

    pub fn stop(&self) -> Result<()> {
        self.send("/live/song/stop_playing", vec![])
    }

    pub fn set_tempo(&self, bpm: f32) -> Result<()> {
        self.send("/live/song/set/tempo", vec![OscType::Float(bpm)])
    }

    pub fn get_tempo(&self) -> Result<Option<f32>> {
        self.query_song("/live/song/get/tempo", arg_f32)
    }

    pub fn get_is_playing(&self) -> Result<Option<bool>> {
        self.query_song("/live/song/get/is_playing", crate::osc::arg_bool)
    }

    pub fn get_num_tracks(&self) -> Result<Option<i32>> {
        self.query_song("/live/song/get/num_tracks", crate::osc::arg_i32)
    }

    // Tracks

    /// Insert a MIDI track at `index`; -1 appends.
    pub fn create_midi_track(&self, index: i32) -> Result<()> {
        self.send("/live/song/create_midi_track", vec![OscType::Int(index)])
    }

    pub fn create_audio_track(&self, index: i32) -> Result<()> {
        self.send("/live/song/create_audio_track", vec![OscType::Int(index)])
    }

    pub fn set_track_name(&self, track: i32, name: &str) -> Result<()> {
        self.send(
            "/live/track/set/name",
            vec![OscType::Int(track), OscType::String(name.to_string())],
        )
    }

    /// Volume in 0.0..=1.0 (Live's fader scale).
    pub fn set_track_volume(&self, track: i32, volume: f32) -> Result<()> {
        self.send(
            "/live/track/set/volume",
            vec![OscType::Int(track), OscType::Float(volume)],
        )
    }

    /// Pan in -1.0..=1.0.
    pub fn set_track_pan(&self, track: i32, pan: f32) -> Result<()> {
        self.send(
            "/live/track/set/panning",
            vec![OscType::Int(track), OscType::Float(pan)],
        )
    }

    pub fn set_track_mute(&self, track: i32, mute: bool) -> Result<()> {
        self.send(
            "/live/track/set/mute",
            vec![OscType::Int(track), OscType::Int(mute as i32)],
        )
    }

    pub fn get_track_name(&self, track: i32) -> Result<Option<String>> {
        let reply = self.query_indexed("/live/track/get/name", vec![OscType::Int(track)])?;
        Ok(reply.and_then(|args| args.first().and_then(arg_string)))
    }

    pub fn get_track_volume(&self, track: i32) -> Result<Option<f32>> {
        let reply = self.query_indexed("/live/track/get/volume", vec![OscType::Int(track)])?;
        Ok(reply.and_then(|args| args.first().and_then(arg_f32)))
    }

    pub fn get_track_pan(&self, track: i32) -> Result<Option<f32>> {
        let reply = self.query_indexed("/live/track/get/panning", vec![OscType::Int(track)])?;
        Ok(reply.and_then(|args| args.first().and_then(arg_f32)))
    }

    /// Name, volume and pan. A field that timed out stays `None`; a real
    /// zero volume comes back as `Some(0.0)`.
    pub fn get_track_info(&self, track: i32) -> Result<TrackInfo> {
        Ok(TrackInfo {
            index: track,
            name: self.get_track_name(track)?,
            volume: self.get_track_volume(track)?,
            pan: self.get_track_pan(track)?,
        })
    }

    // Clips

    /// Create an empty MIDI clip of `length` beats and remember it.
    pub fn create_clip(&self, track: i32, slot: i32, length: f64) -> Result<()> {
        self.send(
            "/live/clip_slot/create_clip",
            vec![
                OscType::Int(track),
                OscType::Int(slot),
                OscType::Float(length as f32),
            ],
        )?;
        self.state().with_write(|s| {
            s.clip_slots
                .insert((track, slot), ClipSlotInfo { length, name: None });
        });
        Ok(())
    }

    /// One message per note. Notes already sent stay in the clip if a later
    /// send fails.
    pub fn add_notes(&self, track: i32, slot: i32, notes: &[Note]) -> Result<()> {
        let total = notes.len();
        for (sent, note) in notes.iter().enumerate() {
            let args = vec![
                OscType::Int(track),
                OscType::Int(slot),
                OscType::Int(note.pitch),
                OscType::Float(note.start as f32),
                OscType::Float(note.duration as f32),
                OscType::Int(note.velocity),
                OscType::Int(note.mute as i32),
            ];
            if let Err(e) = self.send(ADD_NOTES, args) {
                return Err(Error::Batch {
                    path: ADD_NOTES.to_string(),
                    sent,
                    total,
                    source: Box::new(e),
                });
            }
        }
        debug!("[Live] Added {} notes to track {} slot {}", total, track, slot);
        Ok(())
    }

    /// Remove every note: pitches 0..128 over the first 9999 beats.
    pub fn remove_notes(&self, track: i32, slot: i32) -> Result<()> {
        self.send(
            "/live/clip/remove/notes",
            vec![
                OscType::Int(track),
                OscType::Int(slot),
                OscType::Int(0),
                OscType::Int(0),
                OscType::Int(128),
                OscType::Int(9999),
            ],
        )
    }

    pub fn fire_clip(&self, track: i32, slot: i32) -> Result<()> {
        self.send("/live/clip/fire", vec![OscType::Int(track), OscType::Int(slot)])
    }

    pub fn stop_clip(&self, track: i32, slot: i32) -> Result<()> {
        self.send("/live/clip/stop", vec![OscType::Int(track), OscType::Int(slot)])
    }

    pub fn set_clip_name(&self, track: i32, slot: i32, name: &str) -> Result<()> {
        self.send(
            "/live/clip/set/name",
            vec![
                OscType::Int(track),
                OscType::Int(slot),
                OscType::String(name.to_string()),
            ],
        )?;
        self.state().with_write(|s| {
            if let Some(info) = s.clip_slots.get_mut(&(track, slot)) {
                info.name = Some(name.to_string());
            }
        });
        Ok(())
    }

    pub fn fire_scene(&self, scene: i32) -> Result<()> {
        self.send("/live/scene/fire", vec![OscType::Int(scene)])
    }

    // Devices

    /// Load a browser item such as `Audio Effects/Reverb` onto a track.
    pub fn load_device(&self, track: i32, uri: &str) -> Result<()> {
        self.send(
            "/live/track/load/device",
            vec![OscType::Int(track), OscType::String(uri.to_string())],
        )
    }

    /// Normalised parameter value in 0.0..=1.0.
    pub fn set_device_parameter(&self, track: i32, device: i32, param: i32, value: f32) -> Result<()> {
        self.send(
            "/live/device/set/parameter/value",
            vec![
                OscType::Int(track),
                OscType::Int(device),
                OscType::Int(param),
                OscType::Float(value),
            ],
        )
    }

    pub fn get_track_devices(&self, track: i32) -> Result<Vec<String>> {
        let reply = self.query_indexed("/live/track/get/devices/name", vec![OscType::Int(track)])?;
        Ok(strings(reply))
    }

    pub fn get_device_parameters(&self, track: i32, device: i32) -> Result<Vec<String>> {
        let reply = self.query_indexed(
            "/live/device/get/parameters/name",
            vec![OscType::Int(track), OscType::Int(device)],
        )?;
        Ok(strings(reply))
    }

    /// Value of one parameter; the reply is `[track, device, param, value]`.
    pub fn get_device_parameter_value(&self, track: i32, device: i32, param: i32) -> Result<Option<f32>> {
        let reply = self.query_indexed(
            "/live/device/get/parameter/value",
            vec![OscType::Int(track), OscType::Int(device), OscType::Int(param)],
        )?;
        Ok(reply.and_then(|args| args.first().and_then(arg_f32)))
    }

    /// Names, then one value query per name. Not transactional: the device
    /// can change between the two steps.
    pub fn get_device_parameter_values(&self, track: i32, device: i32) -> Result<Vec<(String, Option<f32>)>> {
        let names = self.get_device_parameters(track, device)?;
        let mut values = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let value = self.get_device_parameter_value(track, device, index as i32)?;
            values.push((name, value));
        }
        Ok(values)
    }

    /// One automation step per point, in point order.
    pub fn write_automation(&self, target: AutomationTarget, points: &[AutomationPoint]) -> Result<()> {
        let total = points.len();
        for (sent, point) in points.iter().enumerate() {
            let args = vec![
                OscType::Int(target.track),
                OscType::Int(target.clip),
                OscType::Int(target.device),
                OscType::Int(target.parameter),
                OscType::Float(point.time as f32),
                OscType::Float(point.value as f32),
                OscType::Float(point.step_duration as f32),
            ];
            if let Err(e) = self.send(AUTOMATION_STEP, args) {
                return Err(Error::Batch {
                    path: AUTOMATION_STEP.to_string(),
                    sent,
                    total,
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }
}

fn strings(reply: Option<Vec<OscType>>) -> Vec<String> {
    reply
        .unwrap_or_default()
        .iter()
        .filter_map(arg_string)
        .collect()
}

impl std::fmt::Debug for LiveApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveApi")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
