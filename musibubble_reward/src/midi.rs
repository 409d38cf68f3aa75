// MIDI output from reward sequences.
//
// Converts a `Sequence` into a Standard MIDI File (SMF Format 1) for
// offline listening. Track 0 carries tempo and time signature; every
// instrument in `instrument_infos` gets its own track with a program
// change and its notes. Instruments are assigned MIDI channels 0..15 in
// order, skipping the General MIDI percussion channel.
//
// Seconds map to ticks at the sequence tempo, 480 ticks per quarter note.
// This adapter sits outside the pure core; the game hands sequences to its
// own synthesizer instead.

use crate::sequence::Sequence;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// General MIDI percussion channel.
const PERCUSSION_CHANNEL: u8 = 9;

/// Largest tempo value a tempo meta event can carry, in microseconds per
/// quarter.
const MAX_TEMPO_MICROS: u32 = (1 << 24) - 1;

#[derive(Debug)]
pub enum MidiError {
    Io(std::io::Error),
    Midi(midly::Error),
    /// The sequence tempo cannot be encoded.
    InvalidTempo(f64),
}

impl From<std::io::Error> for MidiError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<midly::Error> for MidiError {
    fn from(e: midly::Error) -> Self {
        Self::Midi(e)
    }
}

impl std::fmt::Display for MidiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Midi(e) => write!(f, "MIDI error: {e}"),
            Self::InvalidTempo(bpm) => write!(f, "tempo {bpm} cannot be written"),
        }
    }
}

impl std::error::Error for MidiError {}

/// Convert a sequence to MIDI and write it to a file.
pub fn write_midi(sequence: &Sequence, path: &Path) -> Result<(), MidiError> {
    let smf = sequence_to_smf(sequence)?;
    smf.save(path)?;
    Ok(())
}

/// Track and note counts of a MIDI file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiSummary {
    pub tracks: usize,
    pub note_ons: usize,
}

/// Read back a written file.
pub fn inspect_midi(path: &Path) -> Result<MidiSummary, MidiError> {
    let bytes = std::fs::read(path)?;
    let smf = Smf::parse(&bytes)?;
    let note_ons = smf
        .tracks
        .iter()
        .flatten()
        .filter(|e| {
            matches!(
                e.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { vel, .. },
                    ..
                } if vel.as_int() > 0
            )
        })
        .count();
    Ok(MidiSummary {
        tracks: smf.tracks.len(),
        note_ons,
    })
}

/// MIDI channel of the `index`-th instrument track.
fn channel_for(index: usize) -> u8 {
    let c = (index % 15) as u8;
    if c >= PERCUSSION_CHANNEL { c + 1 } else { c }
}

fn sequence_to_smf(sequence: &Sequence) -> Result<Smf<'_>, MidiError> {
    let bpm = sequence.tempo_qpm;
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(MidiError::InvalidTempo(bpm));
    }
    let tempo_micros = (60_000_000.0 / bpm).round();
    if tempo_micros > MAX_TEMPO_MICROS as f64 {
        return Err(MidiError::InvalidTempo(bpm));
    }
    let ticks_per_sec = TICKS_PER_QUARTER as f64 * bpm / 60.0;
    let to_tick = |sec: f64| (sec.max(0.0) * ticks_per_sec).round() as u32;

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo and meter
    let ts = sequence.time_signature;
    let mut tempo_track: Track<'_> = Vec::new();
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_micros as u32))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
            ts.numerator,
            ts.denominator.max(1).trailing_zeros() as u8,
            24,
            8,
        )),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    // One track per instrument
    for (index, info) in sequence.instrument_infos.iter().enumerate() {
        let channel = u4::new(channel_for(index));
        let mut track: Track<'_> = Vec::new();

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(info.name.as_bytes())),
        });
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(info.program.min(127)),
                },
            },
        });

        // (tick, is_note_on, message); note-offs sort first at equal ticks
        // so a repeated pitch is released before it is struck again.
        let mut events: Vec<(u32, bool, MidiMessage)> = Vec::new();
        for note in sequence
            .notes
            .iter()
            .filter(|n| n.instrument_channel == info.channel)
        {
            let key = u7::new(note.pitch_midi.min(127));
            let start = to_tick(note.start_sec);
            let end = to_tick(note.end_sec).max(start + 1);
            events.push((
                start,
                true,
                MidiMessage::NoteOn {
                    key,
                    vel: u7::new(note.velocity.clamp(1, 127)),
                },
            ));
            events.push((
                end,
                false,
                MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            ));
        }
        events.sort_by_key(|&(tick, on, _)| (tick, on));

        let mut last_tick: u32 = 0;
        for (tick, _, message) in events {
            track.push(TrackEvent {
                delta: u28::new(tick - last_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    Ok(smf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timbre;
    use crate::sequence::{AssemblyOptions, NoteEvent, assemble};
    use crate::style::{FLUTE, PIANO};

    fn sample() -> Sequence {
        let notes = vec![
            NoteEvent::new(60, 0.0, 0.5, 80.0, &PIANO),
            NoteEvent::new(60, 0.5, 1.0, 80.0, &PIANO),
            NoteEvent::new(72, 0.25, 1.5, 70.0, &FLUTE),
        ];
        assemble(
            notes,
            &AssemblyOptions {
                tempo_qpm: 120.0,
                level_velocity: 75.0,
                contrast: 0.0,
                timbre: Timbre::Soft,
                crop: None,
            },
        )
    }

    #[test]
    fn one_track_per_instrument() {
        let seq = sample();
        let smf = sequence_to_smf(&seq).unwrap();
        // tempo track + piano + flute
        assert_eq!(smf.tracks.len(), 3);
    }

    #[test]
    fn repeated_pitch_releases_before_restrike() {
        let seq = sample();
        let smf = sequence_to_smf(&seq).unwrap();
        let piano: Vec<&TrackEventKind> = smf.tracks[1].iter().map(|e| &e.kind).collect();
        // name, program, on, off, on, off, end
        assert_eq!(piano.len(), 7);
        assert!(matches!(
            piano[3],
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { .. },
                ..
            }
        ));
        assert!(matches!(
            piano[4],
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { .. },
                ..
            }
        ));
    }

    #[test]
    fn channels_skip_percussion() {
        let channels: Vec<u8> = (0..17).map(channel_for).collect();
        assert!(!channels.contains(&PERCUSSION_CHANNEL));
        assert_eq!(channels[8], 8);
        assert_eq!(channels[9], 10);
        assert_eq!(channels[14], 15);
        assert_eq!(channels[15], 0);
    }

    #[test]
    fn zero_tempo_is_rejected() {
        let mut seq = sample();
        seq.tempo_qpm = 0.0;
        assert!(matches!(sequence_to_smf(&seq), Err(MidiError::InvalidTempo(_))));
    }

    #[test]
    fn written_file_reads_back() {
        let path = std::env::temp_dir().join(format!("musibubble_midi_{}.mid", std::process::id()));
        write_midi(&sample(), &path).unwrap();
        let summary = inspect_midi(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(summary, MidiSummary { tracks: 3, note_ons: 3 });
    }
}
