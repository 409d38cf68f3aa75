// The reward pipeline: one action trace in, one sequence out.
//
//   trace ──> analyze ──> derive raw params ──> resolve params ──┐
//     │                                                           │
//     └──> session profile ──> select template ──> choose style ──┤
//                                                                 v
//                 build structure ──> generate notes per section ──> assemble
//
// Parameter resolution has three modes:
//   - envelope (default): tempo, volume and contrast pass through the
//     caller's `SafetyEnvelope`; every assembled note is then validated by
//     it too,
//   - expert override: explicit `reward_bpm` / `dynamic_contrast` values
//     bypass the safe ranges but stay inside the expert bounds (tempo
//     40 BPM up to the envelope's unsafe maximum, contrast within the
//     envelope's unsafe contrast range),
//   - skip envelope: the raw behavior-derived values are used as given.
//
// All randomness comes from one `Lcg32` seeded from the config, or from the
// trace itself when the config carries no seed, so the same trace and
// config always give the same sequence. The envelope is the only state
// that outlives a call.

use crate::audit::ClampEvent;
use crate::config::{RewardConfig, RhythmDensity, Timbre, VolumeLevel};
use crate::harmony;
use crate::melody::{self, MelodyPlan, PhraseLabel};
use crate::params::{QuantizedInterval, RawParams, derive_raw_params, quantize_intervals};
use crate::pattern::{PatternSummary, PatternType, analyze};
use crate::profile::SessionProfile;
use crate::safety::{Param, SafetyEnvelope};
use crate::sequence::{AssemblyOptions, NoteEvent, Sequence, SequenceMetadata, assemble};
use crate::structure::{MusicStructure, build_structure};
use crate::style::{choose_style, instrument_by_key, select_template};
use crate::trace::ActionTrace;
use musibubble_prng::Lcg32;
use serde::Serialize;

/// Motif name reported when the player played the full pentatonic run.
const STRICT_MOTIF: &str = "CDEGA";

/// Slowest tempo an expert override may request.
const EXPERT_MIN_BPM: f64 = 40.0;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Where the played parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    Envelope,
    Expert,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedParams {
    pub bpm: f64,
    pub volume: f64,
    pub contrast: f64,
    pub volume_level: VolumeLevel,
    pub source: ParamSource,
}

/// Human-readable summary of what the melody generator was asked to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodySpec {
    pub style: PatternType,
    pub label: PhraseLabel,
    pub template: &'static str,
    pub scale: &'static str,
    pub key: u8,
    pub bpm: f64,
    pub duration_sec: f64,
    pub chord_progression: Vec<usize>,
    pub rhythm_density: RhythmDensity,
    pub timbre: Timbre,
    pub volume_level: VolumeLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_motif: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugPayload {
    pub session_config: RewardConfig,
    pub action_trace: ActionTrace,
    pub pattern_summary: PatternSummary,
    /// `None` when the reward is disabled.
    pub melody_spec: Option<MelodySpec>,
    pub raw_params: RawParams,
    pub resolved_params: ResolvedParams,
    /// Clamps applied during this call.
    pub clamp_log: Vec<ClampEvent>,
    pub quantized_intervals: Vec<QuantizedInterval>,
    pub profile: SessionProfile,
    pub skip_envelope: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardOutput {
    pub sequence: Sequence,
    pub debug: DebugPayload,
}

/// The same trace rendered with and without the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub constrained: RewardOutput,
    pub unconstrained: RewardOutput,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Seed used when the config does not fix one: a mix of the event count,
/// the session length and the event timings.
pub fn trace_seed(trace: &ActionTrace) -> u32 {
    let offsets = trace.events().iter().fold(0u32, |acc, e| {
        acc.wrapping_add((e.time_offset_sec * 1000.0) as u32)
    });
    (trace.len() as u32)
        .wrapping_mul(1000)
        .wrapping_add((trace.duration_sec() * 100.0) as u32)
        .wrapping_add(offsets)
}

/// Build a reward for `trace`.
pub fn generate_reward(
    trace: &ActionTrace,
    config: &RewardConfig,
    envelope: &mut SafetyEnvelope,
) -> RewardOutput {
    let duration = config.target_duration_sec();
    let seed = config.seed.unwrap_or_else(|| trace_seed(trace));
    let summary = analyze(trace.events());
    let raw = derive_raw_params(trace.events());
    let profile = SessionProfile::from_trace(trace);
    log::debug!(
        target: "reward",
        "{} events, pattern {}, raw bpm {}, seed {seed}",
        trace.len(),
        summary.pattern_type.as_str(),
        raw.raw_bpm
    );

    let clamp_mark = envelope.audit().clamps().len();
    let resolved = resolve_params(&raw, config, envelope);
    let clamp_log = envelope.audit().clamps_since(clamp_mark).to_vec();
    let quantized_intervals = quantize_intervals(&raw.raw_intervals_ms, resolved.bpm);

    let mut debug = DebugPayload {
        session_config: config.clone(),
        action_trace: trace.clone(),
        pattern_summary: summary,
        melody_spec: None,
        raw_params: raw,
        resolved_params: resolved,
        clamp_log,
        quantized_intervals,
        profile,
        skip_envelope: config.skip_envelope,
    };

    if !config.reward_enabled {
        log::debug!(target: "reward", "reward disabled");
        let mut sequence = Sequence::empty(resolved.bpm);
        sequence.metadata = SequenceMetadata {
            style: "disabled".to_string(),
            pattern_type: debug.pattern_summary.pattern_type,
            tempo_bpm: resolved.bpm.round() as u32,
            seed,
            muted: envelope.is_muted(),
            ..SequenceMetadata::default()
        };
        return RewardOutput { sequence, debug };
    }

    let mut rng = Lcg32::new(seed);
    let template = select_template(profile.performance, &mut rng);
    let mut choice = choose_style(template, &mut rng);
    if let Some(harmony) = config.harmony_type {
        choice.progression = harmony.degrees();
    }
    if let Some(instrument) = config.instrument {
        match instrument_by_key(instrument.catalog_name()) {
            Some(inst) => choice.instruments = vec![inst],
            None => log::warn!(
                target: "reward",
                "instrument {} is not in the catalog",
                instrument.catalog_name()
            ),
        }
    }
    let structure = build_structure(&choice, duration);

    let plan = MelodyPlan::new(
        &debug.pattern_summary,
        trace,
        config.rhythm_density,
        resolved.bpm,
        profile.complexity,
    );
    let notes = compose(&structure, &plan, &mut rng);
    log::debug!(
        target: "reward",
        "style {} in {} on {}, {} sections, {} notes",
        choice.template,
        choice.scale.name,
        choice.key,
        structure.sections.len(),
        notes.len()
    );

    let options = AssemblyOptions {
        tempo_qpm: resolved.bpm,
        level_velocity: resolved.volume_level.velocity(),
        contrast: resolved.contrast,
        timbre: config.timbre,
        crop: crop_window(config, duration),
    };
    let mut sequence = assemble(notes, &options);

    let mut intercepted_notes = 0;
    if resolved.source == ParamSource::Envelope {
        let before = envelope.audit().intercepted_notes();
        for note in &mut sequence.notes {
            let check = envelope.validate_note(note.pitch_midi, note.velocity);
            note.pitch_midi = check.midi;
            note.velocity = check.velocity;
        }
        intercepted_notes = envelope.audit().intercepted_notes() - before;
    }

    sequence.metadata = SequenceMetadata {
        style: choice.template.to_string(),
        pattern_type: debug.pattern_summary.pattern_type,
        key: choice.key,
        scale: choice.scale.name.to_string(),
        progression_family: choice.progression_family.to_string(),
        chord_progression: structure.chord_progression.clone(),
        rhythm: choice.rhythm.name.to_string(),
        tempo_bpm: resolved.bpm.round() as u32,
        template_tempo: Some(choice.template_tempo),
        complexity_tier: Some(choice.complexity_tier),
        sections: structure.sections.iter().map(|s| s.name).collect(),
        seed,
        muted: envelope.is_muted(),
        intercepted_notes,
    };

    debug.melody_spec = Some(MelodySpec {
        style: plan.style,
        label: plan.label,
        template: choice.template,
        scale: choice.scale.name,
        key: choice.key,
        bpm: resolved.bpm,
        duration_sec: duration,
        chord_progression: structure.chord_progression.clone(),
        rhythm_density: config.rhythm_density,
        timbre: config.timbre,
        volume_level: resolved.volume_level,
        special_motif: (debug.pattern_summary.strict_hit_count > 0).then_some(STRICT_MOTIF),
    });

    RewardOutput { sequence, debug }
}

/// Render `trace` twice from one seed: through the envelope and with the
/// raw parameters.
pub fn generate_comparison(
    trace: &ActionTrace,
    config: &RewardConfig,
    envelope: &mut SafetyEnvelope,
) -> Comparison {
    let seed = config.seed.unwrap_or_else(|| trace_seed(trace));
    let constrained_config = RewardConfig {
        seed: Some(seed),
        skip_envelope: false,
        ..config.clone()
    };
    let unconstrained_config = RewardConfig {
        seed: Some(seed),
        skip_envelope: true,
        ..config.clone()
    };
    Comparison {
        constrained: generate_reward(trace, &constrained_config, envelope),
        unconstrained: generate_reward(trace, &unconstrained_config, envelope),
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn resolve_params(
    raw: &RawParams,
    config: &RewardConfig,
    envelope: &mut SafetyEnvelope,
) -> ResolvedParams {
    let (bpm, volume, contrast, source) = if config.skip_envelope {
        (
            raw.raw_bpm as f64,
            raw.raw_volume,
            raw.raw_contrast,
            ParamSource::Raw,
        )
    } else if config.expert_override() {
        let tempo = envelope.param_range(Param::Tempo);
        let contrast = envelope.param_range(Param::Contrast);
        (
            expert_value(
                "reward_bpm",
                config.reward_bpm.map_or(raw.raw_bpm as f64, f64::from),
                EXPERT_MIN_BPM,
                tempo.unsafe_max,
            ),
            config.volume_level.map_or(raw.raw_volume, VolumeLevel::volume),
            expert_value(
                "dynamic_contrast",
                config.dynamic_contrast.unwrap_or(raw.raw_contrast),
                contrast.unsafe_min,
                contrast.unsafe_max,
            ),
            ParamSource::Expert,
        )
    } else {
        (
            envelope.set_param(Param::Tempo, raw.raw_bpm as f64),
            envelope.set_param(Param::Volume, raw.raw_volume),
            envelope.set_param(Param::Contrast, raw.raw_contrast),
            ParamSource::Envelope,
        )
    };
    let bpm = if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        raw.raw_bpm as f64
    };
    ResolvedParams {
        bpm,
        volume,
        contrast,
        volume_level: config
            .volume_level
            .unwrap_or_else(|| VolumeLevel::from_volume(volume)),
        source,
    }
}

/// Bound an expert value to `[min, max]`. Non-finite values fall to `min`.
fn expert_value(name: &str, value: f64, min: f64, max: f64) -> f64 {
    let bounded = if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    };
    if bounded != value {
        log::warn!(target: "reward", "expert {name} {value} bounded to {bounded}");
    }
    bounded
}

/// An explicit end crops `[start or 0, end]`; a lone start crops one
/// target duration from it.
fn crop_window(config: &RewardConfig, duration: f64) -> Option<(f64, f64)> {
    match (config.segment_start_sec, config.segment_end_sec) {
        (start, Some(end)) => Some((start.unwrap_or(0.0), end)),
        (Some(start), None) => Some((start, start + duration)),
        (None, None) => None,
    }
}

/// Every layer of every section, in section order.
fn compose(structure: &MusicStructure, plan: &MelodyPlan, rng: &mut Lcg32) -> Vec<NoteEvent> {
    let mut notes = Vec::new();
    for section in &structure.sections {
        notes.extend(harmony::chords(section, structure));
        notes.extend(melody::lead_line(section, structure, plan, rng));
        notes.extend(harmony::bass_line(section, structure));
        notes.extend(melody::counter_melody(section, structure, plan, rng));
        notes.extend(harmony::pads(section, structure));
    }
    notes
}
