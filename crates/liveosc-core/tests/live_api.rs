mod common;

use common::{FakeLive, Reply};
use liveosc_core::arrangement::{generate_custom, ArrangementExecutor, SectionSpec};
use liveosc_core::automation::{generate_points, CurveShape};
use liveosc_core::config::TimeoutSettings;
use liveosc_core::generators::Note;
use liveosc_core::live::{AutomationTarget, LiveApi, ADD_NOTES, AUTOMATION_STEP};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rosc::OscType;
use std::time::Duration;

fn live(fake: &FakeLive) -> LiveApi {
    let timeouts = TimeoutSettings {
        query_ms: 1000,
        ..TimeoutSettings::default()
    };
    LiveApi::start(fake.endpoint(), timeouts).unwrap()
}

/// Answers indexed track getters the way AbletonOSC does: echo the index,
/// then the value.
fn track_getters(path: &str, args: &[OscType]) -> Vec<Reply> {
    let value = match path {
        "/live/track/get/name" => OscType::String("Bass".to_string()),
        "/live/track/get/volume" => OscType::Float(0.85),
        "/live/track/get/panning" => OscType::Float(-0.25),
        "/live/track/get/devices/name" => {
            let mut reply = args.to_vec();
            reply.push(OscType::String("Operator".to_string()));
            reply.push(OscType::String("Reverb".to_string()));
            return vec![Reply::now(path, reply)];
        }
        _ => return Vec::new(),
    };
    let mut reply = args.to_vec();
    reply.push(value);
    vec![Reply::now(path, reply)]
}

#[test]
fn test_clip_and_notes_wire_format() {
    let fake = FakeLive::silent();
    let live = live(&fake);

    live.create_clip(1, 0, 16.0).unwrap();
    live.add_notes(1, 0, &[Note::new(60, 0.5, 1.0, 100), Note::new(64, 1.5, 0.5, 90)])
        .unwrap();
    assert!(fake.wait_for(3, Duration::from_secs(2)));

    assert_eq!(
        fake.received_on("/live/clip_slot/create_clip"),
        vec![vec![OscType::Int(1), OscType::Int(0), OscType::Float(16.0)]]
    );
    let notes = fake.received_on(ADD_NOTES);
    assert_eq!(notes.len(), 2);
    assert_eq!(
        notes[0],
        vec![
            OscType::Int(1),
            OscType::Int(0),
            OscType::Int(60),
            OscType::Float(0.5),
            OscType::Float(1.0),
            OscType::Int(100),
            OscType::Int(0),
        ]
    );

    let slot = live.state().with_read(|s| s.clip_slots.get(&(1, 0)).cloned());
    assert_eq!(slot.map(|s| s.length), Some(16.0));
}

#[test]
fn test_automation_steps() {
    let fake = FakeLive::silent();
    let live = live(&fake);
    let points = generate_points(CurveShape::Linear, 0.0, 1.0, 0.0, 4.0, 4);
    let target = AutomationTarget {
        track: 2,
        clip: 0,
        device: 1,
        parameter: 3,
    };

    live.write_automation(target, &points).unwrap();
    assert!(fake.wait_for(4, Duration::from_secs(2)));

    let steps = fake.received_on(AUTOMATION_STEP);
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0][..4], [OscType::Int(2), OscType::Int(0), OscType::Int(1), OscType::Int(3)]);
    assert_eq!(steps[1][4], OscType::Float(1.0));
    assert_eq!(steps[1][6], OscType::Float(1.0));
}

#[test]
fn test_indexed_getters_strip_echo() {
    let fake = FakeLive::spawn(track_getters);
    let live = live(&fake);

    let info = live.get_track_info(3).unwrap();
    assert_eq!(info.index, 3);
    assert_eq!(info.name.as_deref(), Some("Bass"));
    assert_eq!(info.volume, Some(0.85));
    assert_eq!(info.pan, Some(-0.25));

    assert_eq!(live.get_track_devices(3).unwrap(), vec!["Operator", "Reverb"]);
    assert_eq!(
        fake.received_on("/live/track/get/volume"),
        vec![vec![OscType::Int(3)]]
    );
}

#[test]
fn test_unanswered_getter_is_none() {
    let fake = FakeLive::silent();
    let timeouts = TimeoutSettings {
        query_ms: 100,
        ..TimeoutSettings::default()
    };
    let live = LiveApi::start(fake.endpoint(), timeouts).unwrap();

    assert_eq!(live.get_tempo().unwrap(), None);
    let info = live.get_track_info(0).unwrap();
    assert_eq!(info.name, None);
    assert_eq!(info.volume, None);
}

#[test]
fn test_device_parameter_values_two_step() {
    let fake = FakeLive::spawn(|path, args| match path {
        "/live/device/get/parameters/name" => {
            let mut reply = args.to_vec();
            reply.push(OscType::String("Device On".to_string()));
            reply.push(OscType::String("Dry/Wet".to_string()));
            vec![Reply::now(path, reply)]
        }
        "/live/device/get/parameter/value" => {
            let mut reply = args.to_vec();
            let value = match args[2] {
                OscType::Int(0) => 1.0,
                _ => 0.4,
            };
            reply.push(OscType::Float(value));
            vec![Reply::now(path, reply)]
        }
        _ => Vec::new(),
    });
    let live = live(&fake);

    let values = live.get_device_parameter_values(0, 1).unwrap();
    assert_eq!(
        values,
        vec![
            ("Device On".to_string(), Some(1.0)),
            ("Dry/Wet".to_string(), Some(0.4)),
        ]
    );
}

#[test]
fn test_arrangement_ramps_reach_clip_envelopes() {
    let fake = FakeLive::silent();
    let live = live(&fake);

    let buildup = SectionSpec {
        kind: Some("buildup".to_string()),
        bars: Some(8),
        energy: Some(0.7),
        elements: Some(vec!["drums".to_string()]),
    };
    let arrangement = generate_custom(&[buildup], 120.0, "Am").unwrap();
    let mut executor = ArrangementExecutor::new();
    let actions = executor.plan(&arrangement, true);
    let report = executor
        .apply(&live, &mut StdRng::seed_from_u64(1), &arrangement, &actions)
        .unwrap();
    assert_eq!(report.ramps, 2);

    // filter then reverb, 32 beats each, written into the drums clip
    assert!(fake.wait_for_on(AUTOMATION_STEP, 64, Duration::from_secs(2)));
    let steps = fake.received_on(AUTOMATION_STEP);
    assert_eq!(steps.len(), 64);
    assert_eq!(
        steps[0],
        vec![
            OscType::Int(0),
            OscType::Int(0),
            OscType::Int(0),
            OscType::Int(1),
            OscType::Float(0.0),
            OscType::Float(0.2),
            OscType::Float(1.0),
        ]
    );
    assert_eq!(
        steps[32][..6],
        [
            OscType::Int(0),
            OscType::Int(0),
            OscType::Int(1),
            OscType::Int(1),
            OscType::Float(0.0),
            OscType::Float(0.6),
        ]
    );
    match &steps[31][4..6] {
        [OscType::Float(time), OscType::Float(value)] => {
            assert_eq!(*time, 31.0);
            assert!((value - 1.0).abs() < 1e-6, "{}", value);
        }
        other => panic!("unexpected {:?}", other),
    }
}
