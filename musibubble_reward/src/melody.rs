// Melodic layers: the lead line, the development counter-melody.
//
// The lead line mirrors how the player played:
//   - sequential players hear the run they made, up and back down
//     (degrees 0 1 2 3 4 4 3 2 1 0),
//   - repetitive players hear a loop on their favorite pitch with one
//     neighbor for relief,
//   - exploratory players hear a 16-step wandering line with a mixed
//     duration pattern,
//   - everything else gets a seeded random walk gated by the style's
//     rhythm pattern.
//
// Degrees index the first five degrees of the active scale, one octave
// above the key. Fixed-template notes last 90% of their slot and never
// run past the end of their section.
//
// The counter-melody only appears in the development section; each beat
// plays with a probability set by the session's complexity and the
// style's complexity tier.

use crate::config::RhythmDensity;
use crate::pattern::{PatternSummary, PatternType};
use crate::sequence::NoteEvent;
use crate::structure::{MusicStructure, Section, SectionKind};
use crate::style::{Instrument, Role};
use crate::trace::ActionTrace;
use musibubble_prng::Lcg32;
use serde::{Deserialize, Serialize};

/// Up-and-back pentatonic run.
const SEQUENTIAL_DEGREES: [usize; 10] = [0, 1, 2, 3, 4, 4, 3, 2, 1, 0];

/// Loop shape; `B` is the favorite degree, `A` its relief neighbor.
const LOOP_SHAPE: [bool; 8] = [false, false, false, true, false, false, false, false];

const WANDER_DEGREES: [usize; 16] = [0, 2, 4, 1, 3, 1, 4, 2, 0, 3, 2, 4, 1, 0, 3, 2];
const WANDER_BEATS: [f64; 16] = [
    1.0, 0.5, 0.5, 1.0, 1.0, 0.5, 0.5, 1.0, 1.0, 1.0, 0.5, 0.5, 1.0, 0.5, 0.5, 1.0,
];
const WANDER_BEATS_SPARSE: [f64; 6] = [2.0; 6];

/// Slot length of the random walk and its rhythm gate.
const WALK_SLOT_SEC: f64 = 0.5;

/// Share of a slot a note sounds for.
const SUSTAIN: f64 = 0.9;

/// Ceiling of the counter-melody probability.
const COUNTER_MAX_PROBABILITY: f64 = 0.9;

/// Degrees the lead line draws from.
const DEGREE_COUNT: usize = 5;

/// Lead line labels as they appear in the debug payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhraseLabel {
    Cdega,
    Loop,
    Wander,
    Mix,
}

/// Behavior-derived inputs of the melodic layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyPlan {
    pub style: PatternType,
    pub label: PhraseLabel,
    /// Favorite degree (0..5).
    pub dominant_degree: usize,
    /// Relief degree of the repetitive loop; differs from the favorite.
    pub alternate_degree: usize,
    pub density: RhythmDensity,
    /// Seconds per beat at the resolved tempo.
    pub beat_sec: f64,
    /// Session complexity, 0..=1.
    pub complexity: f64,
}

impl MelodyPlan {
    pub fn new(
        summary: &PatternSummary,
        trace: &ActionTrace,
        density: RhythmDensity,
        bpm: f64,
        complexity: f64,
    ) -> Self {
        let dominant_degree = summary.dominant_pitch.map_or(0, |p| p.degree());
        let pool = pitch_pool(trace, dominant_degree);
        let alternate_degree = pool
            .iter()
            .copied()
            .find(|&d| d != dominant_degree)
            .unwrap_or((dominant_degree + 1) % DEGREE_COUNT);
        let label = match summary.pattern_type {
            PatternType::Sequential => PhraseLabel::Cdega,
            PatternType::Repetitive => PhraseLabel::Loop,
            PatternType::Exploratory => PhraseLabel::Wander,
            PatternType::Mixed | PatternType::Sparse => PhraseLabel::Mix,
        };
        MelodyPlan {
            style: summary.pattern_type,
            label,
            dominant_degree,
            alternate_degree,
            density,
            beat_sec: 60.0 / bpm.max(1.0),
            complexity: complexity.clamp(0.0, 1.0),
        }
    }

    fn step_beats(&self) -> f64 {
        match self.density {
            RhythmDensity::Sparse => 2.0,
            RhythmDensity::Normal => 1.0,
        }
    }
}

/// Distinct degrees the player touched, favorite first. Padded with the
/// whole pentatonic set when fewer than three were played.
fn pitch_pool(trace: &ActionTrace, dominant: usize) -> Vec<usize> {
    let mut pool = vec![dominant];
    for e in trace.events() {
        let d = e.pitch_letter.degree();
        if !pool.contains(&d) {
            pool.push(d);
        }
    }
    if pool.len() < 3 {
        for d in 0..DEGREE_COUNT {
            if !pool.contains(&d) {
                pool.push(d);
            }
        }
    }
    pool
}

/// MIDI pitch of a lead degree: one octave above the key.
pub fn degree_pitch(structure: &MusicStructure, degree: usize) -> i32 {
    let len = structure.scale.intervals.len();
    structure.key as i32
        + 12 * (degree / len) as i32
        + structure.scale.interval(degree) as i32
        + 12
}

/// First melodic instrument of the section, else its second, else its first.
fn melody_voice(section: &Section) -> Option<&'static Instrument> {
    section
        .instrument_subset
        .iter()
        .copied()
        .find(|i| i.has_role(Role::Melody))
        .or_else(|| section.instrument_subset.get(1).copied())
        .or_else(|| section.instrument_subset.first().copied())
}

/// Lead line of one section.
pub fn lead_line(
    section: &Section,
    structure: &MusicStructure,
    plan: &MelodyPlan,
    rng: &mut Lcg32,
) -> Vec<NoteEvent> {
    let Some(voice) = melody_voice(section) else {
        return Vec::new();
    };
    let velocity = 60.0 + 40.0 * section.intensity;
    let mut notes = Vec::new();
    let end = section.end_sec();

    match plan.style {
        PatternType::Sequential => {
            let step = plan.beat_sec * plan.step_beats();
            fill_fixed(section.start_sec, end, |i| (SEQUENTIAL_DEGREES[i % 10], step), |d, s, e| {
                notes.push(NoteEvent::new(degree_pitch(structure, d), s, e, velocity, voice));
            });
        }
        PatternType::Repetitive => {
            let step = plan.beat_sec * plan.step_beats();
            let degree_at = |i: usize| {
                if LOOP_SHAPE[i % LOOP_SHAPE.len()] {
                    plan.alternate_degree
                } else {
                    plan.dominant_degree
                }
            };
            fill_fixed(section.start_sec, end, |i| (degree_at(i), step), |d, s, e| {
                notes.push(NoteEvent::new(degree_pitch(structure, d), s, e, velocity, voice));
            });
        }
        PatternType::Exploratory => {
            let beats: &[f64] = match plan.density {
                RhythmDensity::Sparse => &WANDER_BEATS_SPARSE,
                RhythmDensity::Normal => &WANDER_BEATS,
            };
            let slot = |i: usize| {
                (
                    WANDER_DEGREES[i % WANDER_DEGREES.len()],
                    beats[i % beats.len()] * plan.beat_sec,
                )
            };
            fill_fixed(section.start_sec, end, slot, |d, s, e| {
                notes.push(NoteEvent::new(degree_pitch(structure, d), s, e, velocity, voice));
            });
        }
        PatternType::Mixed | PatternType::Sparse => {
            let mut degree = plan.dominant_degree as i32;
            let mut t = section.start_sec;
            let mut slot = 0usize;
            while t < end {
                if structure.rhythm.hits(slot) {
                    degree = (degree + rng.range_i32_inclusive(-2, 2)).clamp(0, DEGREE_COUNT as i32 - 1);
                    let note_end = (t + WALK_SLOT_SEC * SUSTAIN).min(end);
                    notes.push(NoteEvent::new(
                        degree_pitch(structure, degree as usize),
                        t,
                        note_end,
                        velocity,
                        voice,
                    ));
                }
                slot += 1;
                t = section.start_sec + slot as f64 * WALK_SLOT_SEC;
            }
        }
    }
    notes
}

/// Walk slots from `start` until `end`. `slot(i)` gives the degree and slot
/// length of step `i`; `emit` receives the degree and sounding span.
fn fill_fixed(
    start: f64,
    end: f64,
    slot: impl Fn(usize) -> (usize, f64),
    mut emit: impl FnMut(usize, f64, f64),
) {
    let mut t = start;
    let mut i = 0;
    while t < end {
        let (degree, length) = slot(i);
        if length <= 0.0 {
            break;
        }
        emit(degree, t, (t + length * SUSTAIN).min(end));
        t += length;
        i += 1;
    }
}

/// Counter-melody of a development section; empty elsewhere.
pub fn counter_melody(
    section: &Section,
    structure: &MusicStructure,
    plan: &MelodyPlan,
    rng: &mut Lcg32,
) -> Vec<NoteEvent> {
    if section.name != SectionKind::Development {
        return Vec::new();
    }
    let Some(lead) = melody_voice(section) else {
        return Vec::new();
    };
    let voice = section
        .instrument_subset
        .iter()
        .rev()
        .copied()
        .find(|i| i.key != lead.key)
        .unwrap_or(lead);

    let probability = (plan.complexity * structure.complexity_tier.factor())
        .clamp(0.0, COUNTER_MAX_PROBABILITY);
    let velocity = 45.0 + 30.0 * section.intensity;
    let end = section.end_sec();
    let mut notes = Vec::new();
    let mut beat = 0usize;
    let mut t = section.start_sec;
    while t < end {
        if rng.random_bool(probability) {
            let degree = rng.range_usize_inclusive(0, DEGREE_COUNT - 1);
            // One octave below the lead.
            let pitch = degree_pitch(structure, degree) - 12;
            let note_end = (t + plan.beat_sec * SUSTAIN).min(end);
            notes.push(NoteEvent::new(pitch, t, note_end, velocity, voice));
        }
        beat += 1;
        t = section.start_sec + beat as f64 * plan.beat_sec;
    }
    notes
}
