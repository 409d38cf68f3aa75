// Raw parameter derivation from interaction timing.
//
// The gaps between successive events are the only tempo signal the player
// gives us. From them we derive:
//   - `raw_bpm`: one beat per median gap, kept within the absolute tempo
//     bounds,
//   - `raw_contrast`: the robust coefficient of variation (MAD / median),
//     scaled and capped,
//   - `raw_volume`: a gentle function of the overall hit rate.
//
// "Median" is the upper median `sorted[n / 2]` throughout. Gaps of 10 s or
// more count as the player looking away and are dropped, as are zero gaps.
//
// These values are raw: the pipeline passes them through the safety
// envelope (safety.rs) before anything audible is built from them.
//
// `quantize_intervals` maps the same gaps onto a small beat grid for the
// debug payload.

use crate::trace::ActionEvent;
use serde::{Deserialize, Serialize};

/// Tempo used when the trace carries no timing information.
pub const DEFAULT_BPM: u32 = 125;
pub const DEFAULT_CONTRAST: f64 = 0.1;
pub const DEFAULT_VOLUME: f64 = 0.7;

/// Absolute tempo bounds for derived tempos.
pub const MIN_RAW_BPM: u32 = 100;
pub const MAX_RAW_BPM: u32 = 140;

/// Gaps at or above this are discarded.
const DISTRACTION_GAP_MS: f64 = 10_000.0;

/// Below this many usable gaps the contrast estimate is not trusted.
const MIN_GAPS_FOR_CONTRAST: usize = 5;

/// Beat lengths a gap can snap to.
pub const BEAT_GRID: [f64; 7] = [0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationMethod {
    #[default]
    Default,
    Behavior,
}

/// Unconstrained musical parameters derived from behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParams {
    pub raw_bpm: u32,
    /// 0.0..=0.4
    pub raw_contrast: f64,
    /// 0.5..=1.0
    pub raw_volume: f64,
    pub raw_intervals_ms: Vec<f64>,
    pub derivation_method: DerivationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_interval_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robust_cv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits_per_sec: Option<f64>,
}

impl Default for RawParams {
    fn default() -> Self {
        RawParams {
            raw_bpm: DEFAULT_BPM,
            raw_contrast: DEFAULT_CONTRAST,
            raw_volume: DEFAULT_VOLUME,
            raw_intervals_ms: Vec::new(),
            derivation_method: DerivationMethod::Default,
            median_interval_ms: None,
            robust_cv: None,
            hits_per_sec: None,
        }
    }
}

/// Derive raw parameters from a time-sorted trace.
pub fn derive_raw_params(actions: &[ActionEvent]) -> RawParams {
    if actions.len() < 2 {
        return RawParams::default();
    }

    let gaps: Vec<f64> = actions
        .windows(2)
        .map(|w| (w[1].time_offset_sec - w[0].time_offset_sec) * 1000.0)
        .filter(|&dt| dt > 0.0 && dt < DISTRACTION_GAP_MS)
        .collect();
    let Some(median) = upper_median(&gaps) else {
        return RawParams::default();
    };

    let raw_bpm = (60_000.0 / median)
        .round()
        .clamp(MIN_RAW_BPM as f64, MAX_RAW_BPM as f64) as u32;

    let deviations: Vec<f64> = gaps.iter().map(|g| (g - median).abs()).collect();
    let mad = upper_median(&deviations).unwrap_or(0.0);
    let robust_cv = if median > 0.0 { mad / median } else { 0.0 };
    let raw_contrast = if gaps.len() < MIN_GAPS_FOR_CONTRAST {
        DEFAULT_CONTRAST
    } else {
        (robust_cv * 0.8).clamp(0.0, 0.4)
    };

    let first = actions[0].time_offset_sec;
    let last = actions[actions.len() - 1].time_offset_sec;
    let span = last - first;
    let hits_per_sec = if span > 0.0 {
        actions.len() as f64 / span
    } else {
        1.0
    };
    let raw_volume = (0.5 + hits_per_sec * 0.1).clamp(0.5, 1.0);

    RawParams {
        raw_bpm,
        raw_contrast,
        raw_volume,
        raw_intervals_ms: gaps,
        derivation_method: DerivationMethod::Behavior,
        median_interval_ms: Some(median),
        robust_cv: Some(robust_cv),
        hits_per_sec: Some(hits_per_sec),
    }
}

/// `sorted[n / 2]`, or `None` for an empty slice.
pub fn upper_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}

/// A gap snapped to the nearest beat-grid length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizedInterval {
    pub original_ms: f64,
    pub quantized_beats: f64,
    pub quantized_ms: f64,
}

/// Snap each gap to the closest entry of `BEAT_GRID` at `bpm`.
/// Equidistant gaps take the shorter grid length.
pub fn quantize_intervals(intervals_ms: &[f64], bpm: f64) -> Vec<QuantizedInterval> {
    if bpm <= 0.0 {
        return Vec::new();
    }
    let beat_ms = 60_000.0 / bpm;
    intervals_ms
        .iter()
        .map(|&ms| {
            let beats = ms / beat_ms;
            let mut closest = BEAT_GRID[0];
            for &option in &BEAT_GRID[1..] {
                if (beats - option).abs() < (beats - closest).abs() {
                    closest = option;
                }
            }
            QuantizedInterval {
                original_ms: ms,
                quantized_beats: closest,
                quantized_ms: closest * beat_ms,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::PitchLetter;

    fn at(times: &[f64]) -> Vec<ActionEvent> {
        times
            .iter()
            .map(|&t| ActionEvent::new(t, PitchLetter::C))
            .collect()
    }

    #[test]
    fn empty_and_single_traces_use_defaults() {
        let d = derive_raw_params(&[]);
        assert_eq!(d.raw_bpm, 125);
        assert_eq!(d.raw_contrast, 0.1);
        assert_eq!(d.raw_volume, 0.7);
        assert_eq!(d.derivation_method, DerivationMethod::Default);
        assert!(d.raw_intervals_ms.is_empty());
        assert_eq!(derive_raw_params(&at(&[1.0])), RawParams::default());
    }

    #[test]
    fn only_distraction_gaps_use_defaults() {
        let d = derive_raw_params(&at(&[0.0, 12.0, 30.0]));
        assert_eq!(d, RawParams::default());
    }

    #[test]
    fn simultaneous_events_use_defaults() {
        let d = derive_raw_params(&at(&[2.0, 2.0, 2.0]));
        assert_eq!(d.derivation_method, DerivationMethod::Default);
    }

    #[test]
    fn steady_half_second_taps() {
        let times: Vec<f64> = (0..11).map(|i| i as f64 * 0.5).collect();
        let d = derive_raw_params(&at(&times));
        assert_eq!(d.derivation_method, DerivationMethod::Behavior);
        assert_eq!(d.raw_bpm, 120);
        assert_eq!(d.raw_intervals_ms.len(), 10);
        assert!(d.raw_contrast.abs() < 1e-9, "steady taps have no contrast");
        // 11 events over 5 s.
        assert!((d.hits_per_sec.unwrap() - 2.2).abs() < 1e-9);
        assert!((d.raw_volume - 0.72).abs() < 1e-9);
    }

    #[test]
    fn fast_taps_clamp_to_absolute_max() {
        let times: Vec<f64> = (0..8).map(|i| i as f64 * 0.2).collect();
        let d = derive_raw_params(&at(&times));
        assert_eq!(d.raw_bpm, MAX_RAW_BPM);
        assert_eq!(d.raw_volume, 1.0);
    }

    #[test]
    fn few_gaps_force_default_contrast() {
        let d = derive_raw_params(&at(&[0.0, 0.3, 1.5, 1.6]));
        assert_eq!(d.raw_intervals_ms.len(), 3);
        assert_eq!(d.raw_contrast, DEFAULT_CONTRAST);
    }

    #[test]
    fn contrast_tracks_irregularity() {
        let d = derive_raw_params(&at(&[0.0, 0.2, 1.0, 1.3, 2.5, 2.6, 3.9]));
        assert!(d.raw_contrast > 0.1);
        assert!(d.raw_contrast <= 0.4);
    }

    #[test]
    fn upper_median_picks_upper_middle() {
        assert_eq!(upper_median(&[4.0, 1.0, 3.0, 2.0]), Some(3.0));
        assert_eq!(upper_median(&[5.0]), Some(5.0));
        assert_eq!(upper_median(&[]), None);
    }

    #[test]
    fn quantize_snaps_to_grid() {
        // 120 bpm: one beat is 500 ms.
        let q = quantize_intervals(&[480.0, 260.0, 1400.0, 5000.0], 120.0);
        let beats: Vec<f64> = q.iter().map(|i| i.quantized_beats).collect();
        assert_eq!(beats, [1.0, 0.5, 3.0, 4.0]);
        assert_eq!(q[0].quantized_ms, 500.0);
        assert!(quantize_intervals(&[], 120.0).is_empty());
    }
}
