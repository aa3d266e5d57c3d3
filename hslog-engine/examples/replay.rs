//! Standalone log replay tool
//!
//! Replays a client log through the lifecycle engine and prints every event.
//!
//! Usage:
//!   replay <Power.log> [--limit <count>]
//!
//! Example:
//!   RUST_LOG=debug replay Power.log --limit 50

use hslog_engine::{LifecycleEngine, LifecycleEvent};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <log_file> [--limit <count>]", args[0]);
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let mut limit: Option<usize> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" if i + 1 < args.len() => {
                limit = args[i + 1].parse().ok();
                i += 2;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open {:?}: {}", path, e);
            std::process::exit(1);
        }
    };

    let mut engine = match LifecycleEngine::new() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to build engine: {}", e);
            std::process::exit(1);
        }
    };

    println!("Replaying {:?}\n", path);

    let mut printed = 0;
    for event in engine.replay(BufReader::new(file)) {
        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }

        match event {
            Ok(LifecycleEvent::App(event)) => {
                println!(
                    "[{}] line {:>6}  app    {}",
                    event.timestamp, event.line_number, event.state
                );
            }
            Ok(LifecycleEvent::Match(event)) => {
                let values: Vec<&str> = event.values().collect();
                println!(
                    "[{}] line {:>6}  match  {} {}",
                    event.timestamp,
                    event.line_number,
                    event.state,
                    values.join(", ")
                );
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
        printed += 1;
    }

    let stats = engine.stats();
    println!("\n=== REPLAY SUMMARY ===");
    println!("Lines read: {}", stats.lines);
    println!("Parse failures: {}", stats.parse_failures);
    println!("Orphan lines: {}", stats.orphans);
    println!("App events: {}", stats.app_events);
    println!("Match events: {}", stats.match_events);
}
