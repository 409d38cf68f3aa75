// Action trace model: the normalized input of the reward pipeline.
//
// The game records one event per popped bubble. Each bubble lane carries a
// fixed pentatonic pitch (lane 1..5 = C4 D4 E4 G4 A4), so an event reduces
// to `(time offset, lane, pitch letter)`. `ActionTrace` owns those events in
// ascending time order together with the session length.
//
// Sorting is stable: events recorded at the same instant keep their input
// order, which matters for run-length and transition statistics in
// pattern.rs.
//
// `Session` / `SessionNote` mirror the collaborator's raw round payload
// (`{notes: [{dt, name, midi}], durationSec}`) and are deserialized with
// camelCase keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five lane pitch classes (C major pentatonic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchLetter {
    C,
    D,
    E,
    G,
    A,
}

impl PitchLetter {
    pub const ALL: [PitchLetter; 5] = [
        PitchLetter::C,
        PitchLetter::D,
        PitchLetter::E,
        PitchLetter::G,
        PitchLetter::A,
    ];

    /// Position in the pentatonic scale (0 = C .. 4 = A).
    pub fn degree(self) -> usize {
        match self {
            PitchLetter::C => 0,
            PitchLetter::D => 1,
            PitchLetter::E => 2,
            PitchLetter::G => 3,
            PitchLetter::A => 4,
        }
    }

    /// Semitones above C.
    pub fn semitone(self) -> u8 {
        match self {
            PitchLetter::C => 0,
            PitchLetter::D => 2,
            PitchLetter::E => 4,
            PitchLetter::G => 7,
            PitchLetter::A => 9,
        }
    }

    /// MIDI pitch of this letter in octave 4 (C4 = 60).
    pub fn midi(self) -> u8 {
        60 + self.semitone()
    }

    /// The lane that carries this pitch.
    pub fn lane(self) -> Lane {
        Lane(self.degree() as u8 + 1)
    }

    /// Parse an exact pentatonic letter. `F` and `B` are not lane pitches.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(PitchLetter::C),
            'D' => Some(PitchLetter::D),
            'E' => Some(PitchLetter::E),
            'G' => Some(PitchLetter::G),
            'A' => Some(PitchLetter::A),
            _ => None,
        }
    }
}

impl fmt::Display for PitchLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            PitchLetter::C => 'C',
            PitchLetter::D => 'D',
            PitchLetter::E => 'E',
            PitchLetter::G => 'G',
            PitchLetter::A => 'A',
        };
        write!(f, "{c}")
    }
}

/// A bubble lane, 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Lane(u8);

impl Lane {
    pub const COUNT: usize = 5;

    pub fn new(id: u8) -> Option<Self> {
        (1..=Self::COUNT as u8).contains(&id).then_some(Lane(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Zero-based index for per-lane arrays.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    /// The pitch this lane plays.
    pub fn pitch(self) -> PitchLetter {
        PitchLetter::ALL[self.index()]
    }
}

impl TryFrom<u8> for Lane {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Lane::new(id).ok_or_else(|| format!("lane id {id} outside 1..=5"))
    }
}

impl From<Lane> for u8 {
    fn from(lane: Lane) -> u8 {
        lane.0
    }
}

/// A single recorded interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    /// Seconds since the round started, never negative.
    pub time_offset_sec: f64,
    pub lane_id: Lane,
    pub pitch_letter: PitchLetter,
}

impl ActionEvent {
    /// Event on the lane that carries `pitch`.
    pub fn new(time_offset_sec: f64, pitch: PitchLetter) -> Self {
        ActionEvent {
            time_offset_sec: sanitize_offset(time_offset_sec),
            lane_id: pitch.lane(),
            pitch_letter: pitch,
        }
    }

    /// Event on `lane`, with the lane's own pitch.
    pub fn on_lane(time_offset_sec: f64, lane: Lane) -> Self {
        Self::new(time_offset_sec, lane.pitch())
    }
}

/// One note of the raw round payload as the game reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNote {
    /// Milliseconds since the round started.
    #[serde(default)]
    pub dt: Option<f64>,
    /// Note name such as `"E4"`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub midi: Option<u8>,
}

/// The raw round payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub notes: Vec<SessionNote>,
    #[serde(default)]
    pub duration_sec: Option<f64>,
}

/// Time-ordered action events plus the length of the round they came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTrace {
    events: Vec<ActionEvent>,
    duration_sec: f64,
}

impl ActionTrace {
    /// Build a trace whose duration is the offset of its last event.
    pub fn new(events: Vec<ActionEvent>) -> Self {
        Self::with_duration(events, None)
    }

    /// Build a trace with an explicit round duration. A missing, non-finite
    /// or non-positive duration falls back to the last event offset.
    pub fn with_duration(mut events: Vec<ActionEvent>, duration_sec: Option<f64>) -> Self {
        for e in &mut events {
            e.time_offset_sec = sanitize_offset(e.time_offset_sec);
        }
        sort_by_time(&mut events);
        let last = events.last().map_or(0.0, |e| e.time_offset_sec);
        let duration_sec = match duration_sec {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => last,
        };
        ActionTrace {
            events,
            duration_sec,
        }
    }

    /// Normalize a raw session payload.
    ///
    /// Lane comes from the note name's letter (`C→1 .. A→5`); names whose
    /// letter has no lane go to lane 1. A note with no name uses its MIDI
    /// pitch projected onto the pentatonic set. `dt` is converted from ms.
    pub fn from_session(session: &Session) -> Self {
        let events = session
            .notes
            .iter()
            .map(|n| {
                let pitch = match (&n.name, n.midi) {
                    (Some(name), _) => name
                        .chars()
                        .next()
                        .and_then(PitchLetter::from_char)
                        .unwrap_or(PitchLetter::C),
                    (None, Some(midi)) => project_to_pentatonic(pitch_class_letter(midi)),
                    (None, None) => PitchLetter::C,
                };
                let offset = n.dt.map_or(0.0, |dt| dt / 1000.0);
                ActionEvent::new(offset, pitch)
            })
            .collect();
        Self::with_duration(events, session.duration_sec)
    }

    pub fn events(&self) -> &[ActionEvent] {
        &self.events
    }

    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Stable ascending sort by time offset.
pub fn sort_by_time(events: &mut [ActionEvent]) {
    events.sort_by(|a, b| a.time_offset_sec.total_cmp(&b.time_offset_sec));
}

fn sanitize_offset(t: f64) -> f64 {
    if t.is_finite() && t > 0.0 { t } else { 0.0 }
}

/// Project any note letter onto the lane pitches: F falls to E, B to A,
/// anything unrecognized to C.
pub fn project_to_pentatonic(letter: char) -> PitchLetter {
    match letter.to_ascii_uppercase() {
        'D' => PitchLetter::D,
        'E' | 'F' => PitchLetter::E,
        'G' => PitchLetter::G,
        'A' | 'B' => PitchLetter::A,
        _ => PitchLetter::C,
    }
}

/// Natural letter of a MIDI pitch class; sharps read as the letter below.
fn pitch_class_letter(midi: u8) -> char {
    match midi % 12 {
        0 | 1 => 'C',
        2 | 3 => 'D',
        4 => 'E',
        5 | 6 => 'F',
        7 | 8 => 'G',
        9 | 10 => 'A',
        _ => 'B',
    }
}

/// MIDI number of a note name like `"C4"`, `"F#3"` or `"Bb2"`.
/// Anything that does not parse is middle C (60).
pub fn midi_from_note_name(name: &str) -> u8 {
    parse_note_name(name).unwrap_or(60)
}

fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let base: i16 = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest: Vec<char> = chars.collect();
    let (shift, octave_char) = match rest.as_slice() {
        [o] => (0, *o),
        ['#', o] => (1, *o),
        ['b', o] => (-1, *o),
        _ => return None,
    };
    let octave = octave_char.to_digit(10)? as i16;
    u8::try_from(base + shift + (octave + 1) * 12).ok()
}
