// Structure planning: the section timeline of a reward piece.
//
// Before any note is generated the piece is laid out as a short form:
//
//   intro (4 s, only when d > 20) -> theme A -> development (6 s, only
//   when d > 25) -> theme B -> outro
//
// Theme A takes 40% of the piece up to 8 s. Theme B takes up to 8 s but
// always leaves 4 s for the outro. The outro gets whatever remains. Every
// section length is clamped to the time left, so sections are contiguous,
// never overlap, and never run past `d`.
//
// Each section carries an intensity (used for velocity and chord voicing)
// and the subset of the ensemble that plays in it. The generators in
// melody.rs and harmony.rs consume one section at a time.

use crate::style::{ComplexityTier, Instrument, RhythmPattern, Scale, StyleChoice};
use serde::Serialize;

/// Intro length when the piece is long enough for one.
const INTRO_SEC: f64 = 4.0;
/// Development length when the piece is long enough for one.
const DEVELOPMENT_SEC: f64 = 6.0;
/// Longest theme section.
const THEME_MAX_SEC: f64 = 8.0;
/// Time reserved for the outro when sizing theme B.
const OUTRO_RESERVE_SEC: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Intro,
    ThemeA,
    Development,
    ThemeB,
    Outro,
}

impl SectionKind {
    pub fn intensity(self) -> f64 {
        match self {
            SectionKind::Intro => 0.3,
            SectionKind::ThemeA => 0.7,
            SectionKind::Development => 0.9,
            SectionKind::ThemeB => 0.8,
            SectionKind::Outro => 0.4,
        }
    }

    /// Intro and outro carry sustained pad layers.
    pub fn has_pads(self) -> bool {
        matches!(self, SectionKind::Intro | SectionKind::Outro)
    }

    /// The part of the ensemble that plays in this section.
    fn subset(self, instruments: &[&'static Instrument]) -> Vec<&'static Instrument> {
        match self {
            SectionKind::Intro | SectionKind::Outro => instruments.iter().take(1).copied().collect(),
            SectionKind::ThemeA => instruments.iter().take(2).copied().collect(),
            SectionKind::Development => instruments.to_vec(),
            SectionKind::ThemeB if instruments.len() > 1 => instruments[1..].to_vec(),
            SectionKind::ThemeB => instruments.to_vec(),
        }
    }
}

/// One planned section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub name: SectionKind,
    pub start_sec: f64,
    pub duration_sec: f64,
    pub intensity: f64,
    pub instrument_subset: Vec<&'static Instrument>,
}

impl Section {
    pub fn end_sec(&self) -> f64 {
        self.start_sec + self.duration_sec
    }
}

/// Everything the note generators need about the piece.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicStructure {
    pub duration_sec: f64,
    pub sections: Vec<Section>,
    pub scale: &'static Scale,
    pub chord_progression: Vec<usize>,
    pub rhythm: &'static RhythmPattern,
    pub instruments: Vec<&'static Instrument>,
    /// MIDI pitch of the tonic.
    pub key: u8,
    pub complexity_tier: ComplexityTier,
}

/// Lay out the section timeline for a piece of `duration` seconds.
pub fn build_sections(duration: f64, instruments: &[&'static Instrument]) -> Vec<Section> {
    let duration = duration.max(0.0);
    let mut sections = Vec::new();
    let mut cursor = 0.0;

    let mut push = |kind: SectionKind, wanted: f64, cursor: &mut f64| {
        let length = wanted.min(duration - *cursor);
        if length <= 0.0 {
            return;
        }
        sections.push(Section {
            name: kind,
            start_sec: *cursor,
            duration_sec: length,
            intensity: kind.intensity(),
            instrument_subset: kind.subset(instruments),
        });
        *cursor += length;
    };

    if duration > 20.0 {
        push(SectionKind::Intro, INTRO_SEC, &mut cursor);
    }
    push(SectionKind::ThemeA, THEME_MAX_SEC.min(duration * 0.4), &mut cursor);
    if duration > 25.0 {
        push(SectionKind::Development, DEVELOPMENT_SEC, &mut cursor);
    }
    let theme_b = THEME_MAX_SEC.min(duration - cursor - OUTRO_RESERVE_SEC);
    push(SectionKind::ThemeB, theme_b, &mut cursor);
    let outro = duration - cursor;
    push(SectionKind::Outro, outro, &mut cursor);

    sections
}

/// Combine a style choice with a timeline.
pub fn build_structure(choice: &StyleChoice, duration: f64) -> MusicStructure {
    MusicStructure {
        duration_sec: duration,
        sections: build_sections(duration, &choice.instruments),
        scale: choice.scale,
        chord_progression: choice.progression.to_vec(),
        rhythm: choice.rhythm,
        instruments: choice.instruments.clone(),
        key: choice.key,
        complexity_tier: choice.complexity_tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{FLUTE, HARP, PIANO, VIOLIN};

    fn kinds(sections: &[Section]) -> Vec<SectionKind> {
        sections.iter().map(|s| s.name).collect()
    }

    #[test]
    fn twenty_seconds_has_no_intro() {
        let sections = build_sections(20.0, &[&PIANO, &VIOLIN]);
        assert_eq!(
            kinds(&sections),
            [SectionKind::ThemeA, SectionKind::ThemeB, SectionKind::Outro]
        );
        assert_eq!(sections[0].duration_sec, 8.0);
        assert_eq!(sections[1].duration_sec, 8.0);
        assert_eq!(sections[2].duration_sec, 4.0);
    }

    #[test]
    fn long_piece_has_all_sections() {
        let sections = build_sections(30.0, &[&PIANO, &VIOLIN, &FLUTE]);
        assert_eq!(
            kinds(&sections),
            [
                SectionKind::Intro,
                SectionKind::ThemeA,
                SectionKind::Development,
                SectionKind::ThemeB,
                SectionKind::Outro
            ]
        );
        let intensities: Vec<f64> = sections.iter().map(|s| s.intensity).collect();
        assert_eq!(intensities, [0.3, 0.7, 0.9, 0.8, 0.4]);
    }

    #[test]
    fn timeline_is_contiguous_and_bounded() {
        let mut d = 0.5;
        while d <= 60.0 {
            let sections = build_sections(d, &[&PIANO]);
            let mut cursor = 0.0;
            for s in &sections {
                assert!((s.start_sec - cursor).abs() < 1e-9, "gap at {} for d={d}", s.start_sec);
                assert!(s.duration_sec > 0.0);
                cursor = s.end_sec();
            }
            assert!(cursor <= d + 1e-9, "sections overrun {d}: {cursor}");
            assert!((cursor - d).abs() < 1e-9, "sections should cover {d}, got {cursor}");
            d += 0.75;
        }
    }

    #[test]
    fn instrument_subsets() {
        let ensemble = [&PIANO, &VIOLIN, &FLUTE, &HARP];
        let sections = build_sections(30.0, &ensemble);
        let keys = |s: &Section| s.instrument_subset.iter().map(|i| i.key).collect::<Vec<_>>();
        assert_eq!(keys(&sections[0]), ["piano"]);
        assert_eq!(keys(&sections[1]), ["piano", "violin"]);
        assert_eq!(keys(&sections[2]).len(), 4);
        assert_eq!(keys(&sections[3]), ["violin", "flute", "harp"]);
        assert_eq!(keys(&sections[4]), ["piano"]);

        // A solo ensemble still plays theme B.
        let solo = build_sections(20.0, &[&PIANO]);
        assert_eq!(keys(&solo[1]), ["piano"]);
    }

    #[test]
    fn zero_duration_has_no_sections() {
        assert!(build_sections(0.0, &[&PIANO]).is_empty());
    }
}
