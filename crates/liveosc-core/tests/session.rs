mod common;

use common::{FakeLive, Reply};
use liveosc_core::live::AUTOMATION_STEP;
use liveosc_core::session::{ConnectOutcome, Session};
use rosc::OscType;
use serde_json::json;
use std::time::Duration;

fn answers_tempo(tempo: f32) -> FakeLive {
    FakeLive::spawn(move |path, _| match path {
        "/live/song/get/tempo" => vec![Reply::now(path, vec![OscType::Float(tempo)])],
        _ => Vec::new(),
    })
}

#[test]
fn test_connects_and_adopts_live_tempo() {
    let fake = answers_tempo(126.0);
    let mut session = Session::new(fake.config());

    assert_eq!(session.connect(), ConnectOutcome::Connected { tempo: Some(126.0) });
    assert!(session.is_online());
    assert_eq!(session.project().tempo, 126.0);
    assert!(session
        .call_tool("ableton_connect", &json!({}))
        .starts_with("[OK] Already connected"));

    session.disconnect();
    assert!(!session.is_online());
}

#[test]
fn test_no_reply_means_offline() {
    let fake = FakeLive::silent();
    let mut config = fake.config();
    config.timeouts.connect_ms = 200;
    let mut session = Session::new(config);

    match session.connect() {
        ConnectOutcome::Offline { reason } => assert!(reason.contains("no reply"), "{}", reason),
        other => panic!("unexpected {:?}", other),
    }
    assert!(session
        .call_tool("play", &json!({}))
        .starts_with("[OFFLINE]"));
}

#[test]
fn test_drum_track_reaches_live() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    let result = session.call_tool("create_drum_track", &json!({"pattern_type": "four_on_floor"}));
    assert!(result.starts_with("Created drum track 'Drums' on track 0"), "{}", result);
    // tempo query + track + name + clip + 8 kicks
    assert!(fake.wait_for(12, Duration::from_secs(2)));

    assert_eq!(fake.received_on("/live/song/create_midi_track"), vec![vec![OscType::Int(0)]]);
    assert_eq!(
        fake.received_on("/live/track/set/name"),
        vec![vec![OscType::Int(0), OscType::String("Drums".to_string())]]
    );
    assert_eq!(
        fake.received_on("/live/clip_slot/create_clip"),
        vec![vec![OscType::Int(0), OscType::Int(0), OscType::Float(8.0)]]
    );
    assert_eq!(fake.received_on("/live/clip/add/notes").len(), 8);
}

#[test]
fn test_tempo_and_mood_are_sent() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    assert_eq!(session.call_tool("set_tempo", &json!({"bpm": 100})), "Tempo set to 100 BPM");
    session.call_tool("modify_mood", &json!({"mood": "aggressive", "intensity": 1.0}));
    assert!(fake.wait_for(3, Duration::from_secs(2)));

    assert_eq!(
        fake.received_on("/live/song/set/tempo"),
        vec![vec![OscType::Float(100.0)], vec![OscType::Float(130.0)]]
    );
}

#[test]
fn test_auto_play_fires_scenes_in_order() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    // one bar at 4800 BPM lasts 50 ms
    let result = session.call_tool(
        "auto_play_scenes",
        &json!({"scenes": [3, 1, 2], "bars_per_scene": 1, "tempo": 4800}),
    );
    assert!(result.starts_with("Auto-playing 3 scenes"), "{}", result);
    assert!(fake.wait_for(4, Duration::from_secs(3)));

    assert_eq!(
        fake.received_on("/live/scene/fire"),
        vec![vec![OscType::Int(3)], vec![OscType::Int(1)], vec![OscType::Int(2)]]
    );
}

#[test]
fn test_stop_auto_play() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    session.call_tool("auto_play_scenes", &json!({"scenes": [0, 1], "bars_per_scene": 16}));
    assert!(session.is_auto_playing());
    assert_eq!(session.call_tool("stop_auto_play", &json!({})), "Auto-play stopped");
    assert!(!session.is_auto_playing());
}

#[test]
fn test_execute_arrangement_online() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    session.call_tool(
        "generate_arrangement",
        &json!({"sections": [{"type": "drop", "bars": 4, "energy": 1.0, "elements": ["drums", "bass"]}], "tempo": 128}),
    );
    let result = session.call_tool("execute_arrangement", &json!({}));
    assert!(result.starts_with("Placed arrangement: 6 actions (2 tracks, 2 clips"), "{}", result);
    assert!(result.ends_with("1 ramps)"), "{}", result);
    assert!(fake.wait_for(10, Duration::from_secs(2)));
    assert_eq!(
        fake.received_on("/live/clip/set/name")[0],
        vec![OscType::Int(1), OscType::Int(0), OscType::String("drop - drums".to_string())]
    );

    // master volume held at the drop's energy across its 16 beats, on the drums clip
    assert!(fake.wait_for_on(AUTOMATION_STEP, 16, Duration::from_secs(2)));
    let steps = fake.received_on(AUTOMATION_STEP);
    assert_eq!(steps.len(), 16);
    assert_eq!(
        steps[0],
        vec![
            OscType::Int(1),
            OscType::Int(0),
            OscType::Int(-1),
            OscType::Int(0),
            OscType::Float(0.0),
            OscType::Float(1.0),
            OscType::Float(1.0),
        ]
    );
    assert_eq!(steps[15][4], OscType::Float(15.0));
}

#[test]
fn test_out_of_range_params_never_reach_live() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    let cases = [
        ("create_arpeggio", json!({"bars": 300_000_000})),
        ("generate_arrangement", json!({"duration_minutes": 1e9})),
        ("auto_play_scenes", json!({"scenes": [0], "tempo": 1e-300})),
        ("auto_play_scenes", json!({"scenes": [0], "bars_per_scene": u32::MAX, "tempo": 1e-9})),
    ];
    for (tool, params) in cases {
        let result = session.call_tool(tool, &params);
        assert!(result.starts_with("[ERR]"), "{} {}: {}", tool, params, result);
    }
    assert!(!session.is_auto_playing());
    assert_eq!(session.project().track_counter, 0);

    let result = session.call_tool("create_arpeggio", &json!({"bars": 2}));
    assert!(result.starts_with("Created arpeggio on track 0"), "{}", result);
    assert!(fake.wait_for_on("/live/song/create_midi_track", 1, Duration::from_secs(2)));
    assert!(fake.received_on("/live/scene/fire").is_empty());
}

#[test]
fn test_track_kept_when_filling_it_fails() {
    let fake = answers_tempo(120.0);
    let mut session = Session::new(fake.config());
    session.connect();

    // the name alone exceeds the largest UDP datagram
    let name = "x".repeat(70_000);
    let result = session.call_tool("create_drum_track", &json!({"pattern_type": "basic_beat", "name": name}));
    assert!(result.starts_with("[ERR]"), "{}", result);
    assert_eq!(session.project().tracks.len(), 1);
    assert_eq!(session.project().tracks[0].index, 0);
    assert_eq!(session.project().track_counter, 1);

    let result = session.call_tool("create_bassline", &json!({}));
    assert!(result.starts_with("Created bassline on track 1"), "{}", result);
    assert!(fake.wait_for_on("/live/song/create_midi_track", 2, Duration::from_secs(2)));
    assert_eq!(
        fake.received_on("/live/song/create_midi_track"),
        vec![vec![OscType::Int(0)], vec![OscType::Int(1)]]
    );
}
