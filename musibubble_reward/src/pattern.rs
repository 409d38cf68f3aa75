// Pattern analysis: classifies how a player moved through the lanes.
//
// Four statistics families feed the classifier:
//   - lane dominance and run lengths (repetitive play),
//   - lane diversity and transition entropy (exploratory play),
//   - a strict C-D-E-G-A detector with a short window and a time gap limit
//     (sequential play),
//   - trigram motifs, kept for the debug payload only.
//
// Each family yields a score in [0, 1]. A score only competes if its gate
// passes; the ranked gated scores are then resolved with a two-threshold
// rule (see `classify`). Anything that does not stand out is `Mixed`.
//
// Input must already be time-sorted (`ActionTrace` guarantees this). The
// analyzer never fails: traces shorter than `MIN_EVENTS` produce the
// neutral `PatternSummary::default()` with type `Sparse`.

use crate::trace::{ActionEvent, Lane, PitchLetter};
use serde::{Deserialize, Serialize};

/// Traces shorter than this are too thin to classify.
pub const MIN_EVENTS: usize = 5;

/// Strict detector window, in events, including the anchor.
pub const STRICT_MAX_WINDOW: usize = 7;

/// Strict detector gap limit between consecutive matched events.
pub const STRICT_MAX_GAP_SEC: f64 = 1.2;

/// Number of possible lane-to-lane transitions (5 × 5).
const TRANSITION_KINDS: f64 = 25.0;

/// The ascending pentatonic run the strict detector looks for.
const STRICT_TARGET: [PitchLetter; 5] = PitchLetter::ALL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Sequential,
    Repetitive,
    Exploratory,
    Mixed,
    #[default]
    Sparse,
}

impl PatternType {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::Sequential => "sequential",
            PatternType::Repetitive => "repetitive",
            PatternType::Exploratory => "exploratory",
            PatternType::Mixed => "mixed",
            PatternType::Sparse => "sparse",
        }
    }
}

/// Per-category scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternScores {
    pub seq: f64,
    pub rep: f64,
    pub exp: f64,
}

/// Everything the analyzer learned about a trace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub pattern_type: PatternType,
    pub dominant_lane_ratio: f64,
    /// Distinct lanes touched, 0..=5.
    pub lane_diversity: usize,
    /// Shannon entropy of lane transitions normalized by ln 25.
    pub transition_entropy: f64,
    pub strict_hit_count: usize,
    /// Fraction of events that belong to some strict hit.
    pub coverage: f64,
    pub scores: PatternScores,

    /// Most played lane (lowest id on ties). `None` for sparse traces.
    pub dominant_lane: Option<Lane>,
    /// Most played pitch (lowest degree on ties). `None` for sparse traces.
    pub dominant_pitch: Option<PitchLetter>,
    pub avg_run_len: f64,
    pub max_run_len: usize,
    /// Share of events inside same-lane streaks of length >= 3.
    pub repetition_ratio: f64,
    pub hits_per_sec: f64,
    pub total_events: usize,
    /// Up to two most frequent pitch trigrams, plus the full pentatonic run
    /// when the strict detector fired.
    pub detected_motifs: Vec<Vec<PitchLetter>>,
}

/// Result of the strict sequence detector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrictHits {
    pub hit_count: usize,
    pub coverage: f64,
}

/// Analyze a time-sorted list of events.
pub fn analyze(actions: &[ActionEvent]) -> PatternSummary {
    if actions.len() < MIN_EVENTS {
        return PatternSummary::default();
    }
    let total = actions.len();

    // ---- dominance ----

    let mut lane_counts = [0usize; Lane::COUNT];
    let mut pitch_counts = [0usize; 5];
    for a in actions {
        lane_counts[a.lane_id.index()] += 1;
        pitch_counts[a.pitch_letter.degree()] += 1;
    }
    let dominant_lane_idx = argmax_first(&lane_counts);
    let dominant_pitch_idx = argmax_first(&pitch_counts);
    let dominant_lane_ratio = lane_counts[dominant_lane_idx] as f64 / total as f64;
    let lane_diversity = lane_counts.iter().filter(|&&c| c > 0).count();

    // ---- runs ----

    let runs = lane_runs(actions);
    let avg_run_len = runs.iter().sum::<usize>() as f64 / runs.len() as f64;
    let max_run_len = runs.iter().copied().max().unwrap_or(0);
    let repeated: usize = runs.iter().filter(|&&r| r >= 3).sum();
    let repetition_ratio = (repeated as f64 / total as f64).clamp(0.0, 1.0);

    // ---- transitions ----

    let transition_entropy = transition_entropy(actions);

    // ---- strict detector ----

    let strict = detect_strict_sequence(actions, STRICT_MAX_WINDOW, STRICT_MAX_GAP_SEC);

    // ---- scores and gates ----

    let diversity_share = lane_diversity as f64 / Lane::COUNT as f64;
    let seq = (strict.hit_count as f64 / 3.0)
        .min(strict.coverage / 0.3)
        .min(diversity_share)
        .clamp(0.0, 1.0);
    let run_score = (max_run_len as f64 / 4.0)
        .max(avg_run_len / 2.2)
        .clamp(0.0, 1.0);
    let rep = (0.4 * dominant_lane_ratio + 0.3 * run_score + 0.3 * (1.0 - transition_entropy))
        .clamp(0.0, 1.0);
    let exp = (0.4 * diversity_share + 0.3 * transition_entropy + 0.3 * (1.0 - dominant_lane_ratio))
        .clamp(0.0, 1.0);

    let sequential_pass = strict.hit_count >= 2 && strict.coverage >= 0.25 && lane_diversity >= 4;
    let repetitive_pass = dominant_lane_ratio >= 0.6
        && (max_run_len >= 4 || avg_run_len >= 2.2)
        && transition_entropy <= 0.4;
    let exploratory_pass = lane_diversity >= 5
        && transition_entropy >= 0.6
        && dominant_lane_ratio <= 0.45
        && !sequential_pass
        && !repetitive_pass;

    let pattern_type = classify([
        (PatternType::Sequential, if sequential_pass { seq } else { 0.0 }),
        (PatternType::Repetitive, if repetitive_pass { rep } else { 0.0 }),
        (PatternType::Exploratory, if exploratory_pass { exp } else { 0.0 }),
    ]);

    let mut detected_motifs = top_trigrams(actions, 2);
    if strict.hit_count > 0 {
        detected_motifs.push(STRICT_TARGET.to_vec());
    }

    let span = actions.last().map_or(0.0, |a| a.time_offset_sec).max(1.0);

    PatternSummary {
        pattern_type,
        dominant_lane_ratio,
        lane_diversity,
        transition_entropy,
        strict_hit_count: strict.hit_count,
        coverage: strict.coverage,
        scores: PatternScores { seq, rep, exp },
        dominant_lane: Lane::new(dominant_lane_idx as u8 + 1),
        dominant_pitch: Some(PitchLetter::ALL[dominant_pitch_idx]),
        avg_run_len,
        max_run_len,
        repetition_ratio,
        hits_per_sec: total as f64 / span,
        total_events: total,
        detected_motifs,
    }
}

/// Resolve ranked gated scores into a pattern type.
///
/// The top category wins if it reaches 0.4 and leads the runner-up by at
/// least 0.1; failing that it still wins if it reaches 0.3. Otherwise the
/// trace is `Mixed`. Ties keep the input order.
fn classify(mut ranked: [(PatternType, f64); 3]) -> PatternType {
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let (top_type, top) = ranked[0];
    let runner_up = ranked[1].1;
    let clear_lead = top >= 0.4 && top - runner_up >= 0.1;
    if clear_lead || top >= 0.3 {
        top_type
    } else {
        PatternType::Mixed
    }
}

/// Count complete C-D-E-G-A chains.
///
/// Every `C` is an anchor. For each following target letter, the first
/// event carrying it inside the window is the only candidate; if that
/// candidate is more than `max_gap_sec` after the previous match the chain
/// fails. Matched indices of complete chains form the covered set.
pub fn detect_strict_sequence(
    actions: &[ActionEvent],
    max_window: usize,
    max_gap_sec: f64,
) -> StrictHits {
    if actions.len() < MIN_EVENTS {
        return StrictHits::default();
    }
    let mut hit_count = 0;
    let mut covered = vec![false; actions.len()];

    for (anchor, a) in actions.iter().enumerate() {
        if a.pitch_letter != STRICT_TARGET[0] {
            continue;
        }
        let window_end = (anchor + max_window.saturating_sub(1)).min(actions.len() - 1);
        let mut chain = vec![anchor];
        let mut last_idx = anchor;
        let mut last_time = a.time_offset_sec;
        let mut complete = true;

        for target in &STRICT_TARGET[1..] {
            let candidate =
                (last_idx + 1..=window_end).find(|&j| actions[j].pitch_letter == *target);
            match candidate {
                Some(j) if actions[j].time_offset_sec - last_time <= max_gap_sec => {
                    chain.push(j);
                    last_idx = j;
                    last_time = actions[j].time_offset_sec;
                }
                _ => {
                    complete = false;
                    break;
                }
            }
        }

        if complete {
            hit_count += 1;
            for idx in chain {
                covered[idx] = true;
            }
        }
    }

    let covered_count = covered.iter().filter(|&&c| c).count();
    StrictHits {
        hit_count,
        coverage: (covered_count as f64 / actions.len() as f64).clamp(0.0, 1.0),
    }
}

/// Lengths of consecutive same-lane streaks, in order.
fn lane_runs(actions: &[ActionEvent]) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut run = 1;
    for pair in actions.windows(2) {
        if pair[0].lane_id == pair[1].lane_id {
            run += 1;
        } else {
            runs.push(run);
            run = 1;
        }
    }
    if !actions.is_empty() {
        runs.push(run);
    }
    runs
}

fn transition_entropy(actions: &[ActionEvent]) -> f64 {
    if actions.len() < 2 {
        return 0.0;
    }
    let mut counts = [[0usize; Lane::COUNT]; Lane::COUNT];
    for pair in actions.windows(2) {
        counts[pair[0].lane_id.index()][pair[1].lane_id.index()] += 1;
    }
    let total = (actions.len() - 1) as f64;
    let entropy: f64 = counts
        .iter()
        .flatten()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * (1.0 / p).ln()
        })
        .sum();
    (entropy / TRANSITION_KINDS.ln()).clamp(0.0, 1.0)
}

/// The `limit` most frequent pitch trigrams. Equal counts keep the order of
/// first appearance.
fn top_trigrams(actions: &[ActionEvent], limit: usize) -> Vec<Vec<PitchLetter>> {
    let mut counts: Vec<([PitchLetter; 3], usize)> = Vec::new();
    for w in actions.windows(3) {
        let key = [w[0].pitch_letter, w[1].pitch_letter, w[2].pitch_letter];
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(k, _)| k.to_vec())
        .collect()
}

/// Index of the largest count; the first one wins ties.
fn argmax_first(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::ActionTrace;

    fn lane_trace(lanes: &[u8], step_sec: f64) -> Vec<ActionEvent> {
        let events = lanes
            .iter()
            .enumerate()
            .map(|(i, &l)| ActionEvent::on_lane(i as f64 * step_sec, Lane::new(l).unwrap()))
            .collect();
        ActionTrace::new(events).events().to_vec()
    }

    #[test]
    fn short_traces_are_sparse() {
        let actions = lane_trace(&[1, 2, 3, 4], 0.5);
        let summary = analyze(&actions);
        assert_eq!(summary, PatternSummary::default());
        assert_eq!(summary.pattern_type, PatternType::Sparse);
        assert_eq!(analyze(&[]).pattern_type, PatternType::Sparse);
    }

    #[test]
    fn cycling_lanes_is_sequential() {
        let lanes: Vec<u8> = (0..20).map(|i| (i % 5) as u8 + 1).collect();
        let actions = lane_trace(&lanes, 0.5);
        let summary = analyze(&actions);
        assert_eq!(summary.pattern_type, PatternType::Sequential);
        assert_eq!(summary.lane_diversity, 5);
        assert_eq!(summary.strict_hit_count, 4);
        assert_eq!(summary.coverage, 1.0);
        assert!(summary.scores.seq >= 0.99);
        assert_eq!(summary.detected_motifs.last().unwrap(), &STRICT_TARGET.to_vec());
    }

    #[test]
    fn single_lane_hammering_is_repetitive() {
        let actions = lane_trace(&[1; 30], 8.0 / 30.0);
        let summary = analyze(&actions);
        assert_eq!(summary.pattern_type, PatternType::Repetitive);
        assert_eq!(summary.dominant_lane_ratio, 1.0);
        assert_eq!(summary.max_run_len, 30);
        assert_eq!(summary.transition_entropy, 0.0);
        assert_eq!(summary.repetition_ratio, 1.0);
        assert_eq!(summary.dominant_lane, Lane::new(1));
    }

    #[test]
    fn varied_transitions_are_exploratory() {
        // Every lane used, no strict chains (never C followed by D in order),
        // many distinct transitions.
        let lanes = [
            1, 3, 5, 2, 4, 1, 4, 2, 5, 3, 1, 5, 4, 3, 2, 1, 3, 5, 2, 4, 5, 1, 2, 3, 4,
        ];
        let actions = lane_trace(&lanes, 0.4);
        let summary = analyze(&actions);
        assert_eq!(summary.lane_diversity, 5);
        assert!(summary.transition_entropy >= 0.6, "{}", summary.transition_entropy);
        assert!(summary.dominant_lane_ratio <= 0.45);
        assert_eq!(summary.pattern_type, PatternType::Exploratory);
    }

    #[test]
    fn strict_detector_respects_gap() {
        let slow = lane_trace(&[1, 2, 3, 4, 5], 1.5);
        let hits = detect_strict_sequence(&slow, STRICT_MAX_WINDOW, STRICT_MAX_GAP_SEC);
        assert_eq!(hits.hit_count, 0);
        assert_eq!(hits.coverage, 0.0);

        let fast = lane_trace(&[1, 2, 3, 4, 5], 1.0);
        let hits = detect_strict_sequence(&fast, STRICT_MAX_WINDOW, STRICT_MAX_GAP_SEC);
        assert_eq!(hits.hit_count, 1);
        assert_eq!(hits.coverage, 1.0);
    }

    #[test]
    fn strict_detector_respects_window() {
        // C, three fillers, then D E G A: A sits 7 events after the anchor.
        let actions = lane_trace(&[1, 5, 5, 5, 2, 3, 4, 5], 0.1);
        let hits = detect_strict_sequence(&actions, STRICT_MAX_WINDOW, STRICT_MAX_GAP_SEC);
        assert_eq!(hits.hit_count, 0);
        let hits = detect_strict_sequence(&actions, 8, STRICT_MAX_GAP_SEC);
        assert_eq!(hits.hit_count, 1);
    }

    #[test]
    fn coverage_is_bounded() {
        let lanes: Vec<u8> = (0..40).map(|i| [1, 2, 3, 4, 5, 1, 1][i % 7]).collect();
        let actions = lane_trace(&lanes, 0.2);
        let summary = analyze(&actions);
        assert!((0.0..=1.0).contains(&summary.coverage));
        assert!(summary.strict_hit_count > 0);
    }

    #[test]
    fn each_hit_covers_at_most_five_events() {
        // (lanes, expected hits, expected covered events)
        let cases: [(&[u8], usize, usize); 3] = [
            // Two anchors share the same D E G A tail.
            (&[1, 1, 2, 3, 4, 5], 2, 6),
            (&[1, 2, 3, 4, 5, 1, 2, 3, 4, 5], 2, 10),
            // Second C never finds a D.
            (&[1, 2, 3, 1, 4, 5], 1, 5),
        ];
        for (lanes, hits, covered) in cases {
            let actions = lane_trace(lanes, 0.3);
            let strict = detect_strict_sequence(&actions, STRICT_MAX_WINDOW, STRICT_MAX_GAP_SEC);
            let covered_count = (strict.coverage * actions.len() as f64).round() as usize;
            assert_eq!(strict.hit_count, hits, "{lanes:?}");
            assert_eq!(covered_count, covered, "{lanes:?}");
            assert!(strict.hit_count * 5 >= covered_count, "{lanes:?}");
        }
    }

    #[test]
    fn classify_thresholds() {
        use PatternType::*;
        assert_eq!(classify([(Sequential, 0.5), (Repetitive, 0.35), (Exploratory, 0.0)]), Sequential);
        // Not a clear lead, but still above the fallback threshold.
        assert_eq!(classify([(Sequential, 0.35), (Repetitive, 0.32), (Exploratory, 0.0)]), Sequential);
        assert_eq!(classify([(Sequential, 0.0), (Repetitive, 0.29), (Exploratory, 0.0)]), Mixed);
        assert_eq!(classify([(Sequential, 0.0), (Repetitive, 0.0), (Exploratory, 0.0)]), Mixed);
    }

    #[test]
    fn trigram_ties_keep_first_appearance() {
        let actions = lane_trace(&[1, 2, 3, 1, 2, 3, 4, 5], 0.5);
        let motifs = top_trigrams(&actions, 2);
        assert_eq!(motifs[0], vec![PitchLetter::C, PitchLetter::D, PitchLetter::E]);
        assert_eq!(motifs[1], vec![PitchLetter::D, PitchLetter::E, PitchLetter::C]);
    }
}
