// Musibubble Reward Composer
//
// Turns a short bubble-popping session into a short musical reward. Each
// popped bubble sits on one of five pentatonic lanes (C D E G A); how the
// player moved across those lanes, and how evenly they tapped, decides what
// the reward sounds like. Every tempo, loudness and dynamic value passes
// through a safety envelope before anything audible is built, so a frantic
// session can never produce a frantic reward.
//
// Architecture:
// - trace.rs: Action events, session conversion, pentatonic lanes
// - pattern.rs: Run-length, dominance, transition-entropy and strict-run
//   analysis; pattern classification
// - params.rs: Raw tempo/contrast/volume from inter-event timing; beat-grid
//   quantization
// - profile.rs: Pace, regularity, complexity and mood of a session
// - safety.rs: Safety envelope (two-tier ranges, clamping, note validation,
//   listener fan-out)
// - audit.rs: Append-only log of clamps, parameter changes, intercepted notes
// - config.rs: Typed reward configuration loaded from JSON
// - style.rs: Scale/progression/rhythm/instrument tables and seeded style
//   selection
// - structure.rs: Section timeline (intro, themes, development, outro)
// - melody.rs: Lead line and development counter-melody
// - harmony.rs: Chords, bass line and pads
// - sequence.rs: Sorting, velocity shaping, pitch limits, cropping
// - pipeline.rs: `generate_reward`, the end-to-end entry point
// - midi.rs: MIDI file output from finished sequences
//
// The composer is deterministic given a seed; with no seed configured the
// seed is derived from the trace itself.

pub mod audit;
pub mod config;
pub mod harmony;
pub mod melody;
pub mod midi;
pub mod params;
pub mod pattern;
pub mod pipeline;
pub mod profile;
pub mod safety;
pub mod sequence;
pub mod structure;
pub mod style;
pub mod trace;
