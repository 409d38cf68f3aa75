// Sequence assembly: the final, fully-timed note list for playback.
//
// The generators emit raw `NoteEvent`s section by section. `assemble`
// turns them into a `Sequence`:
//
//   1. stable sort by start time,
//   2. give every note a minimum length of 0.1 s,
//   3. shape velocities (loudness tier gain, a slow sine swell scaled by
//      the dynamic contrast, exponential smoothing, timbre, a softer touch
//      for string families), clamped to [30, 110],
//   4. pull string pitches into the range the instrument can play,
//   5. crop to the requested segment window, if any.
//
// A `Sequence` is the only object handed to the audio collaborator. It
// serializes to camelCase JSON; tests compare sequences through that
// serialization.

use crate::config::Timbre;
use crate::pattern::PatternType;
use crate::structure::SectionKind;
use crate::style::{ComplexityTier, Instrument, InstrumentFamily, instrument_by_channel};
use serde::Serialize;

/// Shortest note the assembler emits.
const MIN_NOTE_SEC: f64 = 0.1;

const MIN_VELOCITY: f64 = 30.0;
const MAX_VELOCITY: f64 = 110.0;

/// Velocity of the medium loudness tier; gains are relative to it.
const REFERENCE_VELOCITY: f64 = 75.0;

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub pitch_midi: u8,
    pub start_sec: f64,
    pub end_sec: f64,
    pub velocity: u8,
    /// Stable instrument id (see `Instrument::channel`).
    pub instrument_channel: u8,
    pub program: u8,
}

impl NoteEvent {
    /// Build a note for `instrument`, clamping pitch and velocity into the
    /// MIDI range.
    pub fn new(
        pitch: i32,
        start_sec: f64,
        end_sec: f64,
        velocity: f64,
        instrument: &Instrument,
    ) -> Self {
        NoteEvent {
            pitch_midi: pitch.clamp(0, 127) as u8,
            start_sec,
            end_sec,
            velocity: velocity.round().clamp(1.0, 127.0) as u8,
            instrument_channel: instrument.channel,
            program: instrument.program,
        }
    }

    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub channel: u8,
    pub program: u8,
    pub name: &'static str,
    pub family: InstrumentFamily,
}

impl From<&Instrument> for InstrumentInfo {
    fn from(i: &Instrument) -> Self {
        InstrumentInfo {
            channel: i.channel,
            program: i.program,
            name: i.name,
            family: i.family,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

/// What the piece was built from. Filled in by the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceMetadata {
    /// Style template name, or `disabled`.
    pub style: String,
    pub pattern_type: PatternType,
    pub key: u8,
    pub scale: String,
    pub progression_family: String,
    pub chord_progression: Vec<usize>,
    pub rhythm: String,
    pub tempo_bpm: u32,
    /// Tempo the template proposed; informational.
    pub template_tempo: Option<u32>,
    pub complexity_tier: Option<ComplexityTier>,
    pub sections: Vec<SectionKind>,
    pub seed: u32,
    /// Envelope mute state at generation time.
    pub muted: bool,
    /// Notes the envelope pulled into range.
    pub intercepted_notes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub notes: Vec<NoteEvent>,
    pub total_time_sec: f64,
    pub tempo_qpm: f64,
    pub time_signature: TimeSignature,
    pub instrument_infos: Vec<InstrumentInfo>,
    pub metadata: SequenceMetadata,
}

impl Sequence {
    /// A silent sequence at `tempo_qpm`.
    pub fn empty(tempo_qpm: f64) -> Self {
        Sequence {
            notes: Vec::new(),
            total_time_sec: 0.0,
            tempo_qpm,
            time_signature: TimeSignature::default(),
            instrument_infos: Vec::new(),
            metadata: SequenceMetadata::default(),
        }
    }

    /// Keep the `[start, end]` window, shifted to begin at 0.
    ///
    /// Notes outside the window are dropped; notes straddling an edge are
    /// truncated. Cropping a sequence to `[0, total_time_sec]` returns it
    /// unchanged.
    pub fn crop(&self, start: f64, end: f64) -> Sequence {
        let start = start.max(0.0);
        if end.is_nan() || end <= start {
            log::warn!(target: "reward", "empty crop window [{start}, {end}]");
            return Sequence {
                notes: Vec::new(),
                total_time_sec: 0.0,
                instrument_infos: Vec::new(),
                ..self.clone()
            };
        }
        let notes: Vec<NoteEvent> = self
            .notes
            .iter()
            .filter_map(|n| {
                let s = n.start_sec.max(start) - start;
                let e = n.end_sec.min(end) - start;
                (e > s).then_some(NoteEvent {
                    start_sec: s,
                    end_sec: e,
                    ..*n
                })
            })
            .collect();
        Sequence {
            instrument_infos: instrument_infos(&notes),
            notes,
            total_time_sec: end - start,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    pub tempo_qpm: f64,
    /// Base velocity of the loudness tier.
    pub level_velocity: f64,
    /// Resolved dynamic contrast.
    pub contrast: f64,
    pub timbre: Timbre,
    /// Crop window in seconds.
    pub crop: Option<(f64, f64)>,
}

pub fn assemble(mut notes: Vec<NoteEvent>, options: &AssemblyOptions) -> Sequence {
    notes.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));

    let gain = options.level_velocity / REFERENCE_VELOCITY;
    let contrast = if options.contrast.is_finite() {
        options.contrast
    } else {
        0.0
    };
    let alpha = (1.0 - contrast).clamp(0.1, 0.9);
    let mut prev: Option<f64> = None;

    for (i, note) in notes.iter_mut().enumerate() {
        note.end_sec = note.end_sec.max(note.start_sec + MIN_NOTE_SEC);

        let base = note.velocity as f64 * gain;
        let target = base + (i as f64 * 0.5).sin() * base * contrast;
        let smoothed = match prev {
            Some(p) => p + (target - p) * alpha,
            None => base,
        };
        prev = Some(smoothed);

        let family = instrument_by_channel(note.instrument_channel).map(|i| i.family);
        let family_factor = match family {
            Some(InstrumentFamily::PluckedString | InstrumentFamily::BowedString) => 0.9,
            _ => 1.0,
        };
        let velocity = (smoothed * options.timbre.velocity_scale() * family_factor)
            .clamp(MIN_VELOCITY, MAX_VELOCITY);
        note.velocity = velocity.round() as u8;

        note.pitch_midi = match family {
            Some(InstrumentFamily::PluckedString) => note.pitch_midi.clamp(40, 83),
            Some(InstrumentFamily::BowedString) => note.pitch_midi.clamp(36, 84),
            _ => note.pitch_midi,
        };
    }

    let total_time_sec = notes.iter().map(|n| n.end_sec).fold(0.0, f64::max);
    let sequence = Sequence {
        instrument_infos: instrument_infos(&notes),
        notes,
        total_time_sec,
        ..Sequence::empty(options.tempo_qpm)
    };
    match options.crop {
        Some((start, end)) => sequence.crop(start, end),
        None => sequence,
    }
}

/// Distinct instruments in order of first appearance.
fn instrument_infos(notes: &[NoteEvent]) -> Vec<InstrumentInfo> {
    let mut infos: Vec<InstrumentInfo> = Vec::new();
    for n in notes {
        if infos.iter().any(|i| i.channel == n.instrument_channel) {
            continue;
        }
        match instrument_by_channel(n.instrument_channel) {
            Some(inst) => infos.push(inst.into()),
            None => infos.push(InstrumentInfo {
                channel: n.instrument_channel,
                program: n.program,
                name: "unknown",
                family: InstrumentFamily::Keyboard,
            }),
        }
    }
    infos
}
