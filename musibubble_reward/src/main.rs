// Musibubble Reward Composer: CLI entry point.
//
// Reads a recorded session (the game's round payload as JSON), composes the
// reward for it and writes the result to MIDI. Optionally dumps the debug
// payload (pattern summary, raw and clamped parameters, melody spec) as
// JSON next to it.
//
// Usage:
//   cargo run -p musibubble_reward --bin reward -- session.json [--config reward.json]
//     [--out reward.mid] [--debug debug.json] [--seed N] [--unconstrained]
//
// `--unconstrained` renders the raw behavior-derived parameters without the
// safety envelope, for side-by-side listening. Set RUST_LOG=debug for the
// pipeline's stage logs.

use musibubble_reward::config::RewardConfig;
use musibubble_reward::midi::{inspect_midi, write_midi};
use musibubble_reward::pipeline::generate_reward;
use musibubble_reward::safety::SafetyEnvelope;
use musibubble_reward::trace::{ActionTrace, Session};
use std::path::Path;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    // Parse arguments
    let Some(session_path) = args.get(1).filter(|s| !s.starts_with("--")) else {
        eprintln!("usage: reward <session.json> [--config FILE] [--out FILE] [--debug FILE] [--seed N] [--unconstrained]");
        std::process::exit(2);
    };
    let config_path: Option<String> = parse_flag(&args, "--config");
    let output_path: String = parse_flag(&args, "--out").unwrap_or_else(|| "reward.mid".to_string());
    let debug_path: Option<String> = parse_flag(&args, "--debug");
    let seed: Option<u32> = parse_flag(&args, "--seed");
    let unconstrained = args.iter().any(|a| a == "--unconstrained");

    println!("=== Musibubble Reward Composer ===");
    println!("Session: {}", session_path);
    println!("Output: {}", output_path);

    // Load inputs
    println!("[1/5] Loading session...");
    let session: Session = match std::fs::read_to_string(session_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("  Failed to read session: {}", e);
            std::process::exit(1);
        }
    };
    let trace = ActionTrace::from_session(&session);
    println!("  {} events over {:.1}s", trace.len(), trace.duration_sec());

    println!("[2/5] Loading config...");
    let mut config = match &config_path {
        Some(path) => match RewardConfig::load(Path::new(path)) {
            Ok(c) => {
                println!("  Loaded {}.", path);
                c
            }
            Err(e) => {
                eprintln!("  Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => {
            println!("  Using default config.");
            RewardConfig::default()
        }
    };
    if seed.is_some() {
        config.seed = seed;
    }
    if unconstrained {
        config.skip_envelope = true;
    }

    // Compose
    println!("[3/5] Composing{}...", if unconstrained { " (unconstrained)" } else { "" });
    let mut envelope = SafetyEnvelope::new();
    envelope.set_preview_mode(true);
    let output = generate_reward(&trace, &config, &mut envelope);
    let meta = &output.sequence.metadata;
    println!("  Pattern: {}", meta.pattern_type.as_str());
    println!("  Style: {} ({} on {}, {})", meta.style, meta.scale, meta.key, meta.rhythm);
    println!("  Tempo: {} BPM (raw {})", meta.tempo_bpm, output.debug.raw_params.raw_bpm);
    println!("  Seed: {}", meta.seed);
    println!(
        "  {} notes, {:.1}s",
        output.sequence.notes.len(),
        output.sequence.total_time_sec
    );

    println!("[4/5] Safety report...");
    if output.debug.clamp_log.is_empty() {
        println!("  No parameters clamped.");
    }
    for clamp in &output.debug.clamp_log {
        println!(
            "  {}: {} -> {} ({})",
            clamp.param, clamp.original, clamp.clamped, clamp.rule
        );
    }
    println!("  Notes pulled into range: {}", meta.intercepted_notes);

    if let Some(path) = &debug_path {
        match serde_json::to_string_pretty(&output.debug)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()))
        {
            Ok(()) => println!("  Debug payload written to {}.", path),
            Err(e) => eprintln!("  Failed to write debug payload: {}", e),
        }
    }

    // Write MIDI
    println!("[5/5] Writing MIDI to {}...", output_path);
    if output.sequence.notes.is_empty() {
        println!("  Reward is silent; nothing to write.");
        return;
    }
    let path = Path::new(&output_path);
    match write_midi(&output.sequence, path).and_then(|()| inspect_midi(path)) {
        Ok(summary) => println!(
            "  Done! {} tracks, {} notes.",
            summary.tracks, summary.note_ons
        ),
        Err(e) => {
            eprintln!("  Error writing MIDI: {}", e);
            std::process::exit(1);
        }
    }

    println!();
    println!("Play with: timidity {} (or any MIDI player)", output_path);
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
