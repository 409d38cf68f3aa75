// End-to-end tests for the reward pipeline.
//
// These drive `generate_reward` the way the game does: an action trace, a
// config and a caller-owned safety envelope in, a sequence and debug
// payload out. Module-level behavior is covered by the unit tests next to
// each module; this file checks the properties that only hold for the
// assembled pipeline.

use musibubble_reward::config::{HarmonyType, InstrumentChoice, RewardConfig};
use musibubble_reward::params::{DerivationMethod, derive_raw_params};
use musibubble_reward::pattern::PatternType;
use musibubble_reward::pipeline::{ParamSource, generate_comparison, generate_reward};
use musibubble_reward::safety::{EnvelopeEvent, Param, SafetyEnvelope};
use musibubble_reward::structure::build_sections;
use musibubble_reward::style::{GUITAR, PIANO, VIOLIN};
use musibubble_reward::trace::{ActionEvent, ActionTrace, Lane, Session};
use std::cell::RefCell;
use std::rc::Rc;

fn lane(id: u8) -> Lane {
    Lane::new(id).unwrap()
}

/// Lanes 1→5 over and over, one event every `gap` seconds.
fn cycling_trace(n: usize, gap: f64) -> ActionTrace {
    let events = (0..n)
        .map(|i| ActionEvent::on_lane(i as f64 * gap, lane((i % 5) as u8 + 1)))
        .collect();
    ActionTrace::new(events)
}

/// Every event on lane 1.
fn hammering_trace(n: usize, gap: f64) -> ActionTrace {
    let events = (0..n)
        .map(|i| ActionEvent::on_lane(i as f64 * gap, lane(1)))
        .collect();
    ActionTrace::new(events)
}

fn seeded(seed: u32) -> RewardConfig {
    RewardConfig {
        seed: Some(seed),
        ..RewardConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn same_seed_same_sequence() {
    let trace = cycling_trace(20, 0.5);
    let config = seeded(4242);
    let a = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    let b = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    assert!(!a.sequence.notes.is_empty());
    assert_eq!(
        serde_json::to_string(&a.sequence).unwrap(),
        serde_json::to_string(&b.sequence).unwrap()
    );
}

#[test]
fn derived_seed_is_deterministic() {
    let trace = hammering_trace(12, 0.4);
    let config = RewardConfig::default();
    let a = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    let b = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    assert_eq!(a.sequence, b.sequence);
    assert_eq!(a.sequence.metadata.seed, b.sequence.metadata.seed);
}

#[test]
fn envelope_history_does_not_change_the_music() {
    let trace = cycling_trace(20, 0.5);
    let config = seeded(7);
    let mut used = SafetyEnvelope::new();
    used.set_param(Param::Tempo, 500.0);
    used.set_param(Param::Volume, 0.0);
    let a = generate_reward(&trace, &config, &mut used);
    let b = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    assert_eq!(a.sequence.notes, b.sequence.notes);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn cycling_lanes_reward_the_run() {
    let trace = cycling_trace(20, 0.5);
    let output = generate_reward(&trace, &seeded(1), &mut SafetyEnvelope::new());
    let summary = &output.debug.pattern_summary;
    assert_eq!(summary.pattern_type, PatternType::Sequential);
    assert_eq!(summary.lane_diversity, 5);
    assert!(summary.scores.seq > summary.scores.rep);

    let spec = output.debug.melody_spec.as_ref().unwrap();
    assert_eq!(spec.style, PatternType::Sequential);
    assert_eq!(spec.special_motif, Some("CDEGA"));
    assert_eq!(output.sequence.metadata.pattern_type, PatternType::Sequential);
}

#[test]
fn hammering_one_lane_is_repetitive() {
    let trace = hammering_trace(30, 0.25);
    let output = generate_reward(&trace, &seeded(1), &mut SafetyEnvelope::new());
    let summary = &output.debug.pattern_summary;
    assert_eq!(summary.pattern_type, PatternType::Repetitive);
    assert!(summary.dominant_lane_ratio >= 0.6);
    assert!(summary.max_run_len >= 4);
    assert_eq!(output.debug.melody_spec.as_ref().unwrap().style, PatternType::Repetitive);
}

#[test]
fn tempo_200_is_clamped_to_130() {
    let mut envelope = SafetyEnvelope::new();
    assert_eq!(envelope.set_param(Param::Tempo, 200.0), 130.0);
    let clamps = envelope.audit().clamps();
    assert_eq!(clamps.len(), 1);
    assert_eq!(clamps[0].param, Param::Tempo);
    assert_eq!(clamps[0].original, 200.0);
    assert_eq!(clamps[0].clamped, 130.0);
}

#[test]
fn empty_trace_uses_defaults() {
    let raw = derive_raw_params(&[]);
    assert_eq!(raw.raw_bpm, 125);
    assert_eq!(raw.raw_contrast, 0.1);
    assert_eq!(raw.raw_volume, 0.7);
    assert_eq!(raw.derivation_method, DerivationMethod::Default);

    let output = generate_reward(
        &ActionTrace::default(),
        &RewardConfig::default(),
        &mut SafetyEnvelope::new(),
    );
    assert_eq!(output.debug.raw_params, raw);
    assert_eq!(output.debug.pattern_summary.pattern_type, PatternType::Sparse);
    assert_eq!(output.sequence.metadata.tempo_bpm, 125);
    assert!(output.debug.clamp_log.is_empty());
}

// ---------------------------------------------------------------------------
// Safety
// ---------------------------------------------------------------------------

#[test]
fn clamp_invariant_holds_for_every_param() {
    let probes = [-1e6, -1.0, 0.0, 0.05, 0.5, 1.0, 3.0, 60.0, 100.0, 125.0, 200.0, 1e6];
    for unsafe_mode in [false, true] {
        let mut envelope = SafetyEnvelope::new();
        if unsafe_mode {
            envelope.set_unsafe_mode(true, true).unwrap();
        }
        for param in Param::ALL {
            let range = envelope.param_range(param);
            for &value in &probes {
                let before = envelope.audit().clamps().len();
                let stored = envelope.set_param(param, value);
                assert!(
                    (range.min..=range.max).contains(&stored),
                    "{param} stored {stored} outside [{}, {}]",
                    range.min,
                    range.max
                );
                let outside = value < range.min || value > range.max;
                let clamped = envelope.audit().clamps().len() > before;
                assert_eq!(outside, clamped, "{param} = {value}");
            }
        }
    }
}

#[test]
fn constrained_notes_respect_the_envelope() {
    let trace = hammering_trace(30, 0.25);
    let mut envelope = SafetyEnvelope::new();
    let output = generate_reward(&trace, &seeded(99), &mut envelope);
    assert_eq!(output.debug.resolved_params.source, ParamSource::Envelope);
    assert!((120.0..=130.0).contains(&output.sequence.tempo_qpm));
    assert!(!output.debug.clamp_log.is_empty());
    for n in &output.sequence.notes {
        assert!((48..=84).contains(&n.pitch_midi), "pitch {}", n.pitch_midi);
        assert!((38..=102).contains(&n.velocity), "velocity {}", n.velocity);
    }
    assert!(output.sequence.metadata.muted);
}

#[test]
fn listeners_see_pipeline_clamps() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut envelope = SafetyEnvelope::new();
    let sink = Rc::clone(&seen);
    envelope.subscribe(move |e| sink.borrow_mut().push(e.clone()));

    let output = generate_reward(&hammering_trace(30, 0.25), &seeded(3), &mut envelope);
    let intercepted = seen
        .borrow()
        .iter()
        .filter(|e| matches!(e, EnvelopeEvent::Intercepted(_)))
        .count();
    assert_eq!(intercepted, output.debug.clamp_log.len());
    assert!(intercepted >= 1);
}

#[test]
fn comparison_shares_style_but_not_limits() {
    let trace = hammering_trace(30, 0.25);
    let pair = generate_comparison(&trace, &RewardConfig::default(), &mut SafetyEnvelope::new());
    let constrained = &pair.constrained.sequence;
    let unconstrained = &pair.unconstrained.sequence;
    assert_eq!(constrained.metadata.seed, unconstrained.metadata.seed);
    assert_eq!(constrained.metadata.style, unconstrained.metadata.style);
    assert_eq!(unconstrained.tempo_qpm, 140.0);
    assert_eq!(constrained.tempo_qpm, 130.0);
    assert_eq!(pair.unconstrained.debug.resolved_params.source, ParamSource::Raw);
    assert!(pair.unconstrained.debug.clamp_log.is_empty());
}

#[test]
fn expert_tempo_bypasses_envelope() {
    let config = RewardConfig {
        expert_mode: true,
        reward_bpm: Some(90),
        ..seeded(5)
    };
    let mut envelope = SafetyEnvelope::new();
    let output = generate_reward(&cycling_trace(20, 0.5), &config, &mut envelope);
    assert_eq!(output.sequence.tempo_qpm, 90.0);
    assert_eq!(output.debug.resolved_params.source, ParamSource::Expert);
    assert!(envelope.audit().clamps().is_empty());
}

#[test]
fn huge_expert_tempo_keeps_note_count_bounded() {
    let trace = cycling_trace(20, 0.5);
    let baseline = generate_reward(&trace, &seeded(1), &mut SafetyEnvelope::new());
    let config = RewardConfig {
        expert_mode: true,
        reward_bpm: Some(100_000),
        dynamic_contrast: Some(5.0),
        ..seeded(1)
    };
    let output = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    assert_eq!(output.sequence.tempo_qpm, 140.0);
    assert_eq!(output.debug.resolved_params.contrast, 0.5);
    assert!(output.sequence.notes.len() < 10 * baseline.sequence.notes.len());
}

// ---------------------------------------------------------------------------
// Structure and cropping
// ---------------------------------------------------------------------------

#[test]
fn section_timeline_fits_every_duration() {
    let mut d = 8.0;
    while d <= 45.0 {
        let sections = build_sections(d, &[&PIANO, &VIOLIN]);
        let total: f64 = sections.iter().map(|s| s.duration_sec).sum();
        assert!(total <= d + 1e-9, "d={d} total={total}");
        for pair in sections.windows(2) {
            assert!(pair[0].start_sec < pair[1].start_sec);
            assert!(pair[0].end_sec() <= pair[1].start_sec + 1e-9);
        }
        d += 0.5;
    }
}

#[test]
fn sequence_fits_target_duration() {
    for seconds in [8.0, 20.0, 33.0, 45.0] {
        let config = RewardConfig {
            reward_duration_sec: seconds,
            ..seeded(17)
        };
        let output = generate_reward(&cycling_trace(20, 0.5), &config, &mut SafetyEnvelope::new());
        assert!(output.sequence.total_time_sec <= seconds + 0.1 + 1e-9);
        let notes = &output.sequence.notes;
        assert!(notes.windows(2).all(|p| p[0].start_sec <= p[1].start_sec));
    }
}

#[test]
fn crop_to_own_span_is_identity() {
    let output = generate_reward(&cycling_trace(20, 0.5), &seeded(8), &mut SafetyEnvelope::new());
    let sequence = output.sequence;
    let cropped = sequence.crop(0.0, sequence.total_time_sec);
    assert_eq!(
        serde_json::to_string(&cropped).unwrap(),
        serde_json::to_string(&sequence).unwrap()
    );
}

#[test]
fn segment_window_bounds_notes() {
    let config = RewardConfig {
        segment_start_sec: Some(2.0),
        segment_end_sec: Some(6.0),
        ..seeded(8)
    };
    let output = generate_reward(&cycling_trace(20, 0.5), &config, &mut SafetyEnvelope::new());
    let sequence = &output.sequence;
    assert_eq!(sequence.total_time_sec, 4.0);
    assert!(!sequence.notes.is_empty());
    for n in &sequence.notes {
        assert!(n.start_sec >= 0.0);
        assert!(n.start_sec < n.end_sec);
        assert!(n.end_sec <= 4.0 + 1e-9);
    }
}

// ---------------------------------------------------------------------------
// Config-driven behavior
// ---------------------------------------------------------------------------

#[test]
fn disabled_reward_is_silent() {
    let config = RewardConfig {
        reward_enabled: false,
        ..seeded(1)
    };
    let output = generate_reward(&cycling_trace(20, 0.5), &config, &mut SafetyEnvelope::new());
    assert!(output.sequence.notes.is_empty());
    assert_eq!(output.sequence.metadata.style, "disabled");
    assert_eq!(output.sequence.tempo_qpm, 120.0);
    assert!(output.debug.melody_spec.is_none());
}

#[test]
fn overrides_replace_progression_and_instruments() {
    let config = RewardConfig {
        harmony_type: Some(HarmonyType::OneFour),
        instrument: Some(InstrumentChoice::Guitar),
        ..seeded(12)
    };
    let output = generate_reward(&cycling_trace(20, 0.5), &config, &mut SafetyEnvelope::new());
    assert_eq!(output.sequence.metadata.chord_progression, [0, 3]);
    let channels: Vec<u8> = output
        .sequence
        .instrument_infos
        .iter()
        .map(|i| i.channel)
        .collect();
    assert_eq!(channels, [GUITAR.channel]);
    assert!(output.sequence.notes.iter().all(|n| n.program == GUITAR.program));
}

#[test]
fn json_config_and_session_drive_the_pipeline() {
    let session: Session = serde_json::from_str(
        r#"{
            "notes": [
                {"dt": 0, "name": "C4"},
                {"dt": 500, "name": "D4"},
                {"dt": 1000, "name": "E4"},
                {"dt": 1500, "name": "G4"},
                {"dt": 2000, "name": "A4"},
                {"dt": 2500, "midi": 65},
                {"dt": 3000, "name": "B4"}
            ],
            "durationSec": 4
        }"#,
    )
    .unwrap();
    let trace = ActionTrace::from_session(&session);
    assert_eq!(trace.len(), 7);
    assert_eq!(trace.duration_sec(), 4.0);

    let config = RewardConfig::from_json(
        r#"{"seed": 31, "rewardDurationSec": 12, "timbre": "bright", "rhythmDensity": "sparse"}"#,
    )
    .unwrap();
    let output = generate_reward(&trace, &config, &mut SafetyEnvelope::new());
    assert_eq!(output.debug.session_config, config);
    assert_eq!(output.debug.pattern_summary.strict_hit_count, 1);
    assert!(output.sequence.total_time_sec <= 12.1);
    assert_eq!(output.debug.quantized_intervals.len(), 6);
}
