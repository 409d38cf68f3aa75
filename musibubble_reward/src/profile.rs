// Session profile: coarse performance descriptors for style selection.
//
// Where pattern.rs looks at lane order, the profile looks at pace and
// spread: how many bubbles per minute, how even the tapping was, how wide
// the pitch span was, and whether the player sped up or slowed down. The
// performance figure picks the style bucket (style.rs); complexity drives
// the development section's counter-melody density (melody.rs).

use crate::trace::ActionTrace;
use serde::{Deserialize, Serialize};

/// Number of equal time slots used for the timing consistency measure.
const TIMING_SLOTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Excited,
    Confident,
    Relaxed,
    Chaotic,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProfile {
    /// Events per minute over the session duration.
    pub performance: f64,
    /// 1 minus the coefficient of variation of the gaps, floored at 0.
    pub regularity: f64,
    /// Semitone span between the lowest and highest played pitch.
    pub pitch_range: u8,
    /// How evenly events spread over ten equal time slots, 0..=1.
    pub consistency: f64,
    /// Second-half minus first-half event share, -1..=1.
    pub acceleration: f64,
    pub energy: f64,
    pub complexity: f64,
    pub mood: Mood,
}

impl SessionProfile {
    pub fn from_trace(trace: &ActionTrace) -> Self {
        let duration = trace.duration_sec().max(1.0);
        let performance = performance_metric(trace);
        let regularity = regularity(trace);
        let pitch_range = pitch_range(trace);
        let (consistency, acceleration) = timing(trace, duration);

        let energy = ((1.0 - regularity) + (performance / 30.0).min(1.0)) / 2.0;
        let complexity = ((pitch_range as f64 / 24.0).min(1.0) + (1.0 - regularity)) / 2.0;

        SessionProfile {
            performance,
            regularity,
            pitch_range,
            consistency,
            acceleration,
            energy,
            complexity,
            mood: mood(performance, consistency, acceleration),
        }
    }
}

/// Events per minute over the session duration. Durations under a second
/// count as one second.
pub fn performance_metric(trace: &ActionTrace) -> f64 {
    trace.len() as f64 / (trace.duration_sec().max(1.0) / 60.0)
}

fn regularity(trace: &ActionTrace) -> f64 {
    let events = trace.events();
    if events.len() < 2 {
        return 0.5;
    }
    let gaps: Vec<f64> = events
        .windows(2)
        .map(|w| w[1].time_offset_sec - w[0].time_offset_sec)
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 0.5;
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (1.0 - variance.sqrt() / mean).max(0.0)
}

fn pitch_range(trace: &ActionTrace) -> u8 {
    let pitches = trace.events().iter().map(|e| e.pitch_letter.midi());
    match (pitches.clone().min(), pitches.max()) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 12,
    }
}

/// `(consistency, acceleration)`.
fn timing(trace: &ActionTrace, duration: f64) -> (f64, f64) {
    let events = trace.events();
    if events.is_empty() {
        return (0.5, 0.0);
    }
    let n = events.len() as f64;
    let half = duration / 2.0;
    let first_half = events.iter().filter(|e| e.time_offset_sec < half).count() as f64;
    let acceleration = (n - 2.0 * first_half) / n;

    let slot_len = duration / TIMING_SLOTS as f64;
    let mut slots = [0usize; TIMING_SLOTS];
    for e in events {
        let idx = ((e.time_offset_sec / slot_len).floor() as usize).min(TIMING_SLOTS - 1);
        slots[idx] += 1;
    }
    let per_slot = n / TIMING_SLOTS as f64;
    let variance = slots
        .iter()
        .map(|&c| (c as f64 - per_slot).powi(2))
        .sum::<f64>()
        / TIMING_SLOTS as f64;
    let consistency = (1.0 - variance.sqrt() / per_slot).max(0.0);
    (consistency, acceleration)
}

fn mood(performance: f64, consistency: f64, acceleration: f64) -> Mood {
    if performance > 25.0 && acceleration > 0.2 {
        Mood::Excited
    } else if performance > 15.0 && consistency > 0.7 {
        Mood::Confident
    } else if performance < 5.0 && acceleration < -0.2 {
        Mood::Relaxed
    } else if consistency < 0.3 {
        Mood::Chaotic
    } else {
        Mood::Balanced
    }
}
