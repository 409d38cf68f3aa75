// Harmonic layers: chords, bass line, and intro/outro pads.
//
// Chords change every 2 seconds, walking the progression from the start
// of each section. A chord is the scale triad on the progression degree
// (root, third, fifth of the scale, not of the chromatic grid), held for
// 1.8 s or until the section ends. Calm sections (intensity below 0.8)
// roll the triad with a 50 ms stagger; intense ones strike it as a block.
//
// The bass line only plays when the section has a bass-role instrument.
// It restates the chord root two octaves down on a 1-second grid.
//
// Pads sustain root and fifth an octave below the key under the intro and
// outro, in segments of at most 4 seconds.

use crate::sequence::NoteEvent;
use crate::structure::{MusicStructure, Section};
use crate::style::{Instrument, Role};

const CHORD_STEP_SEC: f64 = 2.0;
const CHORD_HOLD_SEC: f64 = 1.8;
const ARPEGGIO_STAGGER_SEC: f64 = 0.05;
/// Sections at or above this intensity strike block chords.
const BLOCK_CHORD_INTENSITY: f64 = 0.8;

const BASS_STEP_SEC: f64 = 1.0;
const BASS_HOLD_SEC: f64 = 0.8;
/// Lowest bass pitch (C1).
const BASS_FLOOR: i32 = 24;

const PAD_SEGMENT_SEC: f64 = 4.0;

/// Chord root of progression step `step`, as a MIDI pitch.
fn chord_root(structure: &MusicStructure, step: usize) -> i32 {
    let progression = &structure.chord_progression;
    let degree = if progression.is_empty() {
        0
    } else {
        progression[step % progression.len()]
    };
    structure.key as i32 + structure.scale.interval(degree) as i32
}

fn voice_for(section: &Section, role: Role) -> Option<&'static Instrument> {
    section
        .instrument_subset
        .iter()
        .copied()
        .find(|i| i.has_role(role))
}

/// Chord layer of one section.
pub fn chords(section: &Section, structure: &MusicStructure) -> Vec<NoteEvent> {
    let Some(voice) =
        voice_for(section, Role::Chord).or_else(|| section.instrument_subset.first().copied())
    else {
        return Vec::new();
    };
    let velocity = 50.0 + 30.0 * section.intensity;
    let arpeggiate = section.intensity < BLOCK_CHORD_INTENSITY;
    let end = section.end_sec();
    let third = structure.scale.interval(2) as i32;
    let fifth = structure.scale.interval(4) as i32;

    let mut notes = Vec::new();
    let mut step = 0;
    let mut t = section.start_sec;
    while t < end {
        let chord_end = (t + CHORD_HOLD_SEC).min(end);
        let root = chord_root(structure, step);
        for (k, pitch) in [root, root + third, root + fifth].into_iter().enumerate() {
            let start = if arpeggiate {
                t + k as f64 * ARPEGGIO_STAGGER_SEC
            } else {
                t
            };
            if start < chord_end {
                notes.push(NoteEvent::new(pitch, start, chord_end, velocity, voice));
            }
        }
        step += 1;
        t = section.start_sec + step as f64 * CHORD_STEP_SEC;
    }
    notes
}

/// Bass layer of one section; empty without a bass-role instrument.
pub fn bass_line(section: &Section, structure: &MusicStructure) -> Vec<NoteEvent> {
    let Some(voice) = voice_for(section, Role::Bass) else {
        return Vec::new();
    };
    let velocity = 60.0 + 20.0 * section.intensity;
    let end = section.end_sec();
    let mut notes = Vec::new();
    let mut step = 0;
    let mut t = section.start_sec;
    while t < end {
        // Two bass notes per chord.
        let pitch = (chord_root(structure, step / 2) - 24).max(BASS_FLOOR);
        notes.push(NoteEvent::new(
            pitch,
            t,
            (t + BASS_HOLD_SEC).min(end),
            velocity,
            voice,
        ));
        step += 1;
        t = section.start_sec + step as f64 * BASS_STEP_SEC;
    }
    notes
}

/// Pad layer of an intro or outro; empty for other sections.
pub fn pads(section: &Section, structure: &MusicStructure) -> Vec<NoteEvent> {
    if !section.name.has_pads() {
        return Vec::new();
    }
    let Some(voice) = section.instrument_subset.first().copied() else {
        return Vec::new();
    };
    let velocity = 40.0 + 20.0 * section.intensity;
    let root = structure.key as i32 - 12;
    let end = section.end_sec();
    let mut notes = Vec::new();
    let mut t = section.start_sec;
    while t < end {
        let seg_end = (t + PAD_SEGMENT_SEC).min(end);
        notes.push(NoteEvent::new(root, t, seg_end, velocity, voice));
        notes.push(NoteEvent::new(root + 7, t, seg_end, velocity, voice));
        t = seg_end;
    }
    notes
}
