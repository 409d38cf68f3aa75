// Style tables and seeded style selection.
//
// A style template is a named bundle of options: which scales, progression
// families, and rhythm patterns suit it, a tempo span, and groups of
// instruments to draw an ensemble from. Templates are bucketed by the
// player's pace (events per minute, see profile.rs); a fast player gets
// the driving templates, a slow one the meditative ones. Paces outside
// every bucket use `UNIVERSAL`.
//
// Selection is two-stage. `select_template` draws one template among the
// bucket's candidates, then `choose_style` draws concrete values from the
// template's option lists. Both draw from the caller's `Lcg32` in a fixed
// order, so one seed always yields the same style.
//
// Tables are plain consts referenced by `&'static`; nothing is looked up
// by name except the single-instrument override (`instrument`).

use musibubble_prng::Lcg32;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Scales
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scale {
    pub name: &'static str,
    /// Semitones above the key, ascending, starting at 0.
    pub intervals: &'static [u8],
}

impl Scale {
    /// Semitone offset of `degree`, wrapping within one octave.
    pub fn interval(&self, degree: usize) -> u8 {
        self.intervals[degree % self.intervals.len()]
    }
}

const fn scale(name: &'static str, intervals: &'static [u8]) -> Scale {
    Scale { name, intervals }
}

pub const MAJOR: Scale = scale("major", &[0, 2, 4, 5, 7, 9, 11]);
pub const HARMONIC_MINOR: Scale = scale("harmonic_minor", &[0, 2, 3, 5, 7, 8, 11]);
pub const DORIAN: Scale = scale("dorian", &[0, 2, 3, 5, 7, 9, 10]);
pub const PHRYGIAN: Scale = scale("phrygian", &[0, 1, 3, 5, 7, 8, 10]);
pub const LYDIAN: Scale = scale("lydian", &[0, 2, 4, 6, 7, 9, 11]);
pub const MIXOLYDIAN: Scale = scale("mixolydian", &[0, 2, 4, 5, 7, 9, 10]);
pub const LOCRIAN: Scale = scale("locrian", &[0, 1, 3, 5, 6, 8, 10]);
pub const PENTATONIC: Scale = scale("pentatonic", &[0, 2, 4, 7, 9]);
pub const PENTATONIC_MINOR: Scale = scale("pentatonic_minor", &[0, 3, 5, 7, 10]);
pub const HIRAJOSHI: Scale = scale("hirajoshi", &[0, 2, 3, 7, 8]);
pub const CHINESE: Scale = scale("chinese", &[0, 2, 4, 7, 9]);
pub const BALINESE: Scale = scale("balinese", &[0, 1, 3, 7, 8]);
pub const BEBOP_MAJOR: Scale = scale("bebop_major", &[0, 2, 4, 5, 7, 8, 9, 11]);
pub const ARABIC: Scale = scale("arabic", &[0, 1, 4, 5, 7, 8, 11]);
pub const HUNGARIAN: Scale = scale("hungarian", &[0, 2, 3, 6, 7, 8, 11]);
pub const GYPSY: Scale = scale("gypsy", &[0, 1, 4, 5, 7, 8, 10]);
pub const SPANISH: Scale = scale("spanish", &[0, 1, 4, 5, 7, 8, 10]);
pub const FLAMENCO: Scale = scale("flamenco", &[0, 1, 4, 5, 7, 8, 11]);
pub const RAGA_BHAIRAV: Scale = scale("raga_bhairav", &[0, 1, 4, 5, 7, 8, 11]);
pub const WHOLE_TONE: Scale = scale("whole_tone", &[0, 2, 4, 6, 8, 10]);
pub const DIMINISHED: Scale = scale("diminished", &[0, 2, 3, 5, 6, 8, 9, 11]);
pub const PROMETHEUS: Scale = scale("prometheus", &[0, 2, 4, 6, 9, 10]);
pub const CHROMATIC: Scale = scale("chromatic", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);

// ---------------------------------------------------------------------------
// Chord progressions (scale-degree indices, wrapped by the scale length)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressionFamily {
    pub name: &'static str,
    pub progressions: &'static [&'static [usize]],
}

pub const POP: ProgressionFamily = ProgressionFamily {
    name: "pop",
    progressions: &[&[0, 5, 6, 4], &[0, 4, 5, 0], &[6, 4, 0, 5], &[0, 6, 4, 5], &[4, 5, 6, 4]],
};
pub const JAZZ: ProgressionFamily = ProgressionFamily {
    name: "jazz",
    progressions: &[&[0, 6, 2, 5], &[0, 3, 6, 2, 5], &[6, 2, 5, 0], &[0, 1, 2, 5], &[2, 5, 0, 6]],
};
pub const CLASSICAL: ProgressionFamily = ProgressionFamily {
    name: "classical",
    progressions: &[
        &[0, 4, 0, 5, 0],
        &[0, 2, 5, 0],
        &[0, 6, 4, 5],
        &[0, 3, 4, 5, 0],
        &[0, 5, 6, 3, 4, 0],
    ],
};
pub const AMBIENT: ProgressionFamily = ProgressionFamily {
    name: "ambient",
    progressions: &[&[0, 2, 4, 6], &[0, 7, 4, 2], &[6, 0, 4, 2], &[4, 0, 5, 2], &[0, 3, 6, 2]],
};
pub const ROCK: ProgressionFamily = ProgressionFamily {
    name: "rock",
    progressions: &[&[0, 6, 3, 4], &[0, 2, 3, 0], &[5, 3, 0, 4], &[0, 4, 5, 3], &[6, 3, 0, 4]],
};
pub const FOLK: ProgressionFamily = ProgressionFamily {
    name: "folk",
    progressions: &[&[0, 3, 4, 0], &[0, 5, 3, 4], &[6, 3, 0, 4], &[0, 2, 3, 0], &[0, 6, 3, 0]],
};
pub const LATIN: ProgressionFamily = ProgressionFamily {
    name: "latin",
    progressions: &[&[0, 4, 5, 0], &[6, 2, 5, 0], &[0, 3, 6, 4], &[2, 5, 0, 6], &[0, 1, 4, 5]],
};
pub const WORLD: ProgressionFamily = ProgressionFamily {
    name: "world",
    progressions: &[&[0, 2, 4, 5], &[0, 6, 2, 4], &[5, 0, 3, 4], &[0, 3, 5, 2], &[4, 0, 6, 2]],
};
pub const MODERN: ProgressionFamily = ProgressionFamily {
    name: "modern",
    progressions: &[&[0, 1, 2, 3], &[0, 4, 8, 0], &[0, 3, 6, 9], &[0, 2, 5, 7], &[6, 10, 2, 5]],
};
pub const ELECTRONIC: ProgressionFamily = ProgressionFamily {
    name: "electronic",
    progressions: &[&[0, 4, 6, 2], &[6, 0, 4, 2], &[0, 2, 4, 6], &[4, 6, 0, 2], &[0, 5, 3, 6]],
};

// ---------------------------------------------------------------------------
// Rhythm patterns (1 = play on this half-second slot)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RhythmPattern {
    pub name: &'static str,
    pub pattern: &'static [u8],
}

impl RhythmPattern {
    /// Whether slot `i` (wrapping) plays.
    pub fn hits(&self, i: usize) -> bool {
        self.pattern[i % self.pattern.len()] != 0
    }
}

const fn rhythm(name: &'static str, pattern: &'static [u8]) -> RhythmPattern {
    RhythmPattern { name, pattern }
}

pub const STEADY: RhythmPattern = rhythm("steady", &[1, 0, 1, 0, 1, 0, 1, 0]);
pub const SIMPLE: RhythmPattern = rhythm("simple", &[1, 0, 0, 0, 1, 0, 0, 0]);
pub const SYNCOPATED: RhythmPattern = rhythm("syncopated", &[1, 0, 0, 1, 0, 1, 0, 0]);
pub const OFFBEAT: RhythmPattern = rhythm("offbeat", &[0, 1, 0, 1, 0, 1, 0, 1]);
pub const POLYRHYTHM: RhythmPattern = rhythm("polyrhythm", &[1, 0, 1, 1, 0, 1, 0, 1]);
pub const WALTZ: RhythmPattern = rhythm("waltz", &[1, 0, 0, 1, 0, 0]);
pub const MINUET: RhythmPattern = rhythm("minuet", &[1, 0, 1, 1, 0, 1]);
pub const SALSA: RhythmPattern = rhythm("salsa", &[1, 0, 1, 0, 1, 1, 0, 1]);
pub const TANGO: RhythmPattern = rhythm("tango", &[1, 0, 1, 1, 0, 1, 0, 0]);
pub const METAL: RhythmPattern = rhythm("metal", &[1, 0, 1, 1, 0, 1, 1, 0]);
pub const PROGRESSIVE: RhythmPattern = rhythm("progressive", &[1, 0, 1, 0, 0, 1, 0, 1, 1, 0]);
pub const DUBSTEP: RhythmPattern = rhythm("dubstep", &[1, 0, 0, 0, 1, 1, 0, 1]);
pub const AFRICAN: RhythmPattern = rhythm("african", &[1, 0, 1, 1, 0, 1, 0, 1]);
pub const INDIAN_TALA: RhythmPattern = rhythm("indian_tala", &[1, 0, 0, 1, 0, 1, 0, 0, 1, 0]);
pub const MIDDLE_EASTERN: RhythmPattern = rhythm("middle_eastern", &[1, 0, 1, 0, 0, 1, 1, 0]);
pub const FLAMENCO_RHYTHM: RhythmPattern =
    rhythm("flamenco", &[1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1]);
pub const COMPLEX: RhythmPattern = rhythm("complex", &[1, 0, 1, 0, 0, 1, 0, 1, 0, 0]);
pub const AMBIENT_RHYTHM: RhythmPattern = rhythm("ambient", &[1, 0, 0, 0, 1, 0, 0, 0]);
pub const DRONE: RhythmPattern = rhythm("drone", &[1, 0, 0, 0, 0, 0, 0, 0]);
pub const MINIMAL: RhythmPattern = rhythm("minimal", &[1, 0, 0, 0, 0, 1, 0, 0]);
pub const MEDITATIVE: RhythmPattern = rhythm("meditative", &[1, 0, 0, 0, 0, 0, 1, 0]);
pub const FRANTIC: RhythmPattern = rhythm("frantic", &[1, 1, 1, 0, 1, 1, 0, 1]);
pub const DRIVING: RhythmPattern = rhythm("driving", &[1, 0, 1, 1, 1, 0, 1, 1]);
pub const EXPLOSIVE: RhythmPattern = rhythm("explosive", &[1, 1, 1, 1, 0, 1, 1, 1]);

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

/// Broad instrument family; drives velocity and pitch-range shaping in
/// sequence.rs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    Keyboard,
    Organ,
    PluckedString,
    Bass,
    BowedString,
    Wind,
    Synth,
    MalletPercussion,
}

/// Which generated layers an instrument may voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Chord,
    Melody,
    Bass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instrument {
    /// Catalog key.
    pub key: &'static str,
    pub name: &'static str,
    /// General MIDI program.
    pub program: u8,
    /// Stable instrument id; mapped onto real MIDI channels at export.
    pub channel: u8,
    pub family: InstrumentFamily,
    pub roles: &'static [Role],
}

impl Instrument {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

const fn instrument(
    key: &'static str,
    name: &'static str,
    program: u8,
    channel: u8,
    family: InstrumentFamily,
    roles: &'static [Role],
) -> Instrument {
    Instrument {
        key,
        name,
        program,
        channel,
        family,
        roles,
    }
}

use InstrumentFamily as F;

pub const PIANO: Instrument =
    instrument("piano", "Acoustic Grand Piano", 0, 0, F::Keyboard, &[Role::Chord]);
pub const EPIANO: Instrument =
    instrument("epiano", "Electric Piano", 4, 1, F::Keyboard, &[Role::Chord]);
pub const HARPSICHORD: Instrument =
    instrument("harpsichord", "Harpsichord", 6, 2, F::Keyboard, &[]);
pub const ORGAN: Instrument = instrument("organ", "Hammond Organ", 16, 3, F::Organ, &[Role::Chord]);
pub const GUITAR: Instrument =
    instrument("guitar", "Acoustic Guitar", 24, 5, F::PluckedString, &[Role::Chord]);
pub const EGUITAR_CLEAN: Instrument = instrument(
    "eguitar_clean",
    "Electric Guitar Clean",
    27,
    6,
    F::PluckedString,
    &[Role::Chord],
);
pub const EGUITAR_DISTORTION: Instrument = instrument(
    "eguitar_distortion",
    "Electric Guitar Distortion",
    29,
    7,
    F::PluckedString,
    &[Role::Chord],
);
pub const EBASS: Instrument = instrument("ebass", "Electric Bass", 33, 9, F::Bass, &[Role::Bass]);
pub const SYNTH_BASS: Instrument = instrument(
    "synth_bass",
    "Synth Bass",
    38,
    10,
    F::Bass,
    &[Role::Melody, Role::Bass],
);
pub const VIOLIN: Instrument = instrument("violin", "Violin", 40, 11, F::BowedString, &[Role::Melody]);
pub const CELLO: Instrument = instrument("cello", "Cello", 42, 13, F::BowedString, &[Role::Bass]);
pub const STRINGS: Instrument =
    instrument("strings", "String Ensemble", 48, 14, F::BowedString, &[]);
pub const FLUTE: Instrument = instrument("flute", "Flute", 73, 15, F::Wind, &[Role::Melody]);
pub const OBOE: Instrument = instrument("oboe", "Oboe", 68, 16, F::Wind, &[]);
pub const SAXOPHONE: Instrument =
    instrument("saxophone", "Soprano Sax", 64, 18, F::Wind, &[Role::Melody]);
pub const TRUMPET: Instrument = instrument("trumpet", "Trumpet", 56, 19, F::Wind, &[]);
pub const TROMBONE: Instrument = instrument("trombone", "Trombone", 57, 20, F::Wind, &[]);
pub const SYNTH_LEAD: Instrument =
    instrument("synth_lead", "Synth Lead Square", 80, 21, F::Synth, &[Role::Melody]);
pub const SYNTH_SAW: Instrument =
    instrument("synth_saw", "Synth Lead Sawtooth", 81, 22, F::Synth, &[Role::Melody]);
pub const SYNTH_PAD: Instrument =
    instrument("synth_pad", "Synth Pad New Age", 88, 23, F::Synth, &[Role::Melody]);
pub const SYNTH_CHOIR: Instrument =
    instrument("synth_choir", "Synth Choir", 91, 24, F::Synth, &[Role::Melody]);
pub const HARP: Instrument = instrument("harp", "Harp", 46, 25, F::PluckedString, &[]);
pub const MARIMBA: Instrument = instrument("marimba", "Marimba", 12, 27, F::MalletPercussion, &[]);
pub const MUSIC_BOX: Instrument =
    instrument("music_box", "Music Box", 10, 28, F::MalletPercussion, &[]);
pub const SITAR: Instrument = instrument("sitar", "Sitar", 104, 29, F::PluckedString, &[]);
pub const SHAMISEN: Instrument = instrument("shamisen", "Shamisen", 106, 31, F::PluckedString, &[]);

pub const CATALOG: &[&Instrument] = &[
    &PIANO,
    &EPIANO,
    &HARPSICHORD,
    &ORGAN,
    &GUITAR,
    &EGUITAR_CLEAN,
    &EGUITAR_DISTORTION,
    &EBASS,
    &SYNTH_BASS,
    &VIOLIN,
    &CELLO,
    &STRINGS,
    &FLUTE,
    &OBOE,
    &SAXOPHONE,
    &TRUMPET,
    &TROMBONE,
    &SYNTH_LEAD,
    &SYNTH_SAW,
    &SYNTH_PAD,
    &SYNTH_CHOIR,
    &HARP,
    &MARIMBA,
    &MUSIC_BOX,
    &SITAR,
    &SHAMISEN,
];

/// Catalog lookup by key.
pub fn instrument_by_key(key: &str) -> Option<&'static Instrument> {
    CATALOG.iter().copied().find(|i| i.key == key)
}

/// Catalog lookup by stable instrument id.
pub fn instrument_by_channel(channel: u8) -> Option<&'static Instrument> {
    CATALOG.iter().copied().find(|i| i.channel == channel)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Minimal,
    Low,
    Medium,
    High,
    Extreme,
}

impl ComplexityTier {
    /// Scales the counter-melody note probability.
    pub fn factor(self) -> f64 {
        match self {
            ComplexityTier::Minimal => 0.2,
            ComplexityTier::Low => 0.4,
            ComplexityTier::Medium => 0.6,
            ComplexityTier::High => 0.8,
            ComplexityTier::Extreme => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleTemplate {
    pub name: &'static str,
    pub scale_options: &'static [&'static Scale],
    pub progression_families: &'static [&'static ProgressionFamily],
    pub rhythm_families: &'static [&'static RhythmPattern],
    /// Inclusive tempo span in BPM.
    pub tempo_range: (u32, u32),
    pub instrument_groups: &'static [&'static [&'static Instrument]],
    pub complexity_tier: ComplexityTier,
    /// Half-open pace bucket `[min, max)` in events per minute.
    pub performance: (f64, f64),
}

impl StyleTemplate {
    pub fn matches(&self, metric: f64) -> bool {
        metric >= self.performance.0 && metric < self.performance.1
    }
}

pub const TEMPLATES: &[StyleTemplate] = &[
    StyleTemplate {
        name: "cyber_punk_2077",
        scale_options: &[&HUNGARIAN, &DIMINISHED, &CHROMATIC],
        progression_families: &[&ELECTRONIC, &MODERN],
        rhythm_families: &[&DUBSTEP, &FRANTIC, &EXPLOSIVE],
        tempo_range: (150, 180),
        instrument_groups: &[
            &[&SYNTH_SAW, &SYNTH_BASS, &EGUITAR_DISTORTION],
            &[&SYNTH_LEAD, &SYNTH_PAD],
        ],
        complexity_tier: ComplexityTier::Extreme,
        performance: (30.0, 100.0),
    },
    StyleTemplate {
        name: "speed_metal_fury",
        scale_options: &[&PHRYGIAN, &LOCRIAN, &HARMONIC_MINOR],
        progression_families: &[&ROCK, &MODERN],
        rhythm_families: &[&METAL, &PROGRESSIVE, &DRIVING],
        tempo_range: (160, 200),
        instrument_groups: &[&[&EGUITAR_DISTORTION, &EBASS, &SYNTH_LEAD], &[&ORGAN, &TROMBONE]],
        complexity_tier: ComplexityTier::Extreme,
        performance: (30.0, 100.0),
    },
    StyleTemplate {
        name: "progressive_odyssey",
        scale_options: &[&LYDIAN, &BEBOP_MAJOR, &WHOLE_TONE],
        progression_families: &[&JAZZ, &CLASSICAL, &MODERN],
        rhythm_families: &[&PROGRESSIVE, &POLYRHYTHM, &COMPLEX],
        tempo_range: (120, 150),
        instrument_groups: &[&[&EPIANO, &SAXOPHONE, &SYNTH_BASS], &[&STRINGS, &TRUMPET]],
        complexity_tier: ComplexityTier::High,
        performance: (20.0, 30.0),
    },
    StyleTemplate {
        name: "latin_fire_dance",
        scale_options: &[&SPANISH, &FLAMENCO, &GYPSY],
        progression_families: &[&LATIN, &WORLD],
        rhythm_families: &[&SALSA, &FLAMENCO_RHYTHM, &TANGO],
        tempo_range: (130, 160),
        instrument_groups: &[&[&TRUMPET, &GUITAR, &MARIMBA], &[&VIOLIN, &EBASS]],
        complexity_tier: ComplexityTier::High,
        performance: (20.0, 30.0),
    },
    StyleTemplate {
        name: "indie_dreamscape",
        scale_options: &[&DORIAN, &MIXOLYDIAN, &PENTATONIC],
        progression_families: &[&POP, &FOLK, &AMBIENT],
        rhythm_families: &[&SYNCOPATED, &OFFBEAT, &WALTZ],
        tempo_range: (100, 130),
        instrument_groups: &[&[&EGUITAR_CLEAN, &PIANO, &VIOLIN], &[&HARP, &FLUTE]],
        complexity_tier: ComplexityTier::Medium,
        performance: (10.0, 20.0),
    },
    StyleTemplate {
        name: "world_fusion_journey",
        scale_options: &[&ARABIC, &RAGA_BHAIRAV, &BALINESE],
        progression_families: &[&WORLD, &AMBIENT],
        rhythm_families: &[&MIDDLE_EASTERN, &INDIAN_TALA, &AFRICAN],
        tempo_range: (90, 120),
        instrument_groups: &[&[&SITAR, &FLUTE, &MARIMBA], &[&STRINGS, &HARP]],
        complexity_tier: ComplexityTier::Medium,
        performance: (10.0, 20.0),
    },
    StyleTemplate {
        name: "zen_garden",
        scale_options: &[&PENTATONIC, &HIRAJOSHI, &CHINESE],
        progression_families: &[&AMBIENT, &WORLD],
        rhythm_families: &[&MEDITATIVE, &MINIMAL, &DRONE],
        tempo_range: (60, 90),
        instrument_groups: &[&[&SHAMISEN, &HARP, &SYNTH_PAD], &[&FLUTE, &MUSIC_BOX]],
        complexity_tier: ComplexityTier::Low,
        performance: (5.0, 10.0),
    },
    StyleTemplate {
        name: "classical_elegance",
        scale_options: &[&MAJOR, &HARMONIC_MINOR, &DORIAN],
        progression_families: &[&CLASSICAL, &FOLK],
        rhythm_families: &[&WALTZ, &MINUET, &SIMPLE],
        tempo_range: (70, 100),
        instrument_groups: &[&[&PIANO, &VIOLIN, &CELLO], &[&HARPSICHORD, &OBOE]],
        complexity_tier: ComplexityTier::Low,
        performance: (5.0, 10.0),
    },
    StyleTemplate {
        name: "cosmic_meditation",
        scale_options: &[&WHOLE_TONE, &PENTATONIC_MINOR, &PROMETHEUS],
        progression_families: &[&AMBIENT, &MODERN],
        rhythm_families: &[&DRONE, &AMBIENT_RHYTHM, &MINIMAL],
        tempo_range: (40, 70),
        instrument_groups: &[&[&SYNTH_PAD, &SYNTH_CHOIR], &[&HARP, &MUSIC_BOX]],
        complexity_tier: ComplexityTier::Minimal,
        performance: (0.0, 5.0),
    },
];

/// Used when no template's bucket contains the pace.
pub const UNIVERSAL: StyleTemplate = StyleTemplate {
    name: "universal_harmony",
    scale_options: &[&MAJOR, &PENTATONIC],
    progression_families: &[&POP, &FOLK],
    rhythm_families: &[&STEADY, &SIMPLE],
    tempo_range: (90, 110),
    instrument_groups: &[&[&PIANO, &VIOLIN, &FLUTE], &[&HARP]],
    complexity_tier: ComplexityTier::Medium,
    performance: (0.0, f64::INFINITY),
};

/// Keys a style may be set in (C4..B4 white keys).
pub const KEYS: [u8; 7] = [60, 62, 64, 65, 67, 69, 71];

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Concrete choices drawn from one template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleChoice {
    pub template: &'static str,
    pub scale: &'static Scale,
    pub progression_family: &'static str,
    pub progression: &'static [usize],
    pub rhythm: &'static RhythmPattern,
    /// Drawn from the template's span; the played tempo comes from the
    /// resolved parameters instead.
    pub template_tempo: u32,
    pub instruments: Vec<&'static Instrument>,
    pub complexity_tier: ComplexityTier,
    pub key: u8,
}

/// Pick a template whose pace bucket contains `metric`.
pub fn select_template(metric: f64, rng: &mut Lcg32) -> &'static StyleTemplate {
    let candidates: Vec<&'static StyleTemplate> =
        TEMPLATES.iter().filter(|t| t.matches(metric)).collect();
    match rng.choose(&candidates) {
        Some(&t) => t,
        None => {
            log::debug!(target: "reward", "no template for pace {metric:.1}, using {}", UNIVERSAL.name);
            &UNIVERSAL
        }
    }
}

/// Draw concrete style values from `template`.
pub fn choose_style(template: &StyleTemplate, rng: &mut Lcg32) -> StyleChoice {
    let scale = rng.choose(template.scale_options).copied().unwrap_or(&MAJOR);
    let family = rng
        .choose(template.progression_families)
        .copied()
        .unwrap_or(&POP);
    let rhythm = rng.choose(template.rhythm_families).copied().unwrap_or(&STEADY);
    let (lo, hi) = template.tempo_range;
    let template_tempo = rng.range_i32_inclusive(lo as i32, hi as i32) as u32;
    let instruments = choose_instruments(template.instrument_groups, rng);
    let key = rng.choose(&KEYS).copied().unwrap_or(KEYS[0]);
    let progression = rng
        .choose(family.progressions)
        .copied()
        .unwrap_or(&[0, 4]);

    StyleChoice {
        template: template.name,
        scale,
        progression_family: family.name,
        progression,
        rhythm,
        template_tempo,
        instruments,
        complexity_tier: template.complexity_tier,
        key,
    }
}

/// One or two instruments from each group, in a seeded shuffle order.
/// Never empty: falls back to the piano.
fn choose_instruments(
    groups: &[&'static [&'static Instrument]],
    rng: &mut Lcg32,
) -> Vec<&'static Instrument> {
    let mut chosen: Vec<&'static Instrument> = Vec::new();
    for group in groups {
        if group.is_empty() {
            continue;
        }
        let count = rng.range_usize_inclusive(1, group.len().min(2));
        let mut shuffled: Vec<&'static Instrument> = group.to_vec();
        rng.shuffle(&mut shuffled);
        for inst in shuffled.into_iter().take(count) {
            if !chosen.iter().any(|c| c.key == inst.key) {
                chosen.push(inst);
            }
        }
    }
    if chosen.is_empty() {
        chosen.push(&PIANO);
    }
    chosen
}
