//! Wavdrift - WAV playback clock-drift tester
//!
//! Entry point for the command-line front-end. Builds a test plan from the
//! arguments (or loads one from JSON), runs it on the worker thread, and
//! prints one line per round as results arrive.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::error;
use wavdrift::audio::engine::{self, CpalFactory};
use wavdrift::audio::output::PlaybackMode;
use wavdrift::config::RunConfig;
use wavdrift::runner::log::ResultLog;
use wavdrift::runner::plan::{PlanEntry, TestPlan};
use wavdrift::runner::{RoundOutcome, Runner};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wavdrift=info".parse().unwrap()),
        )
        .init();

    println!("wavdrift v{} - playback clock drift tester", wavdrift::VERSION);
    println!();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let mut config = RunConfig::default();
    let mut plan_path: Option<PathBuf> = None;
    let mut mode = PlaybackMode::Streaming;
    let mut rounds = wavdrift::DEFAULT_ROUNDS;
    let mut files: Vec<PathBuf> = Vec::new();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--list" | "-l" => {
                list_devices()?;
                return Ok(());
            }
            "--version" | "-v" => {
                println!("wavdrift {}", wavdrift::VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--device" | "-d" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --device requires a device name");
                    return Ok(());
                }
                config.device = Some(args[i + 1].clone());
                i += 2;
                continue;
            }
            "--plan" | "-p" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --plan requires a file path");
                    return Ok(());
                }
                plan_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            }
            "--mode" | "-m" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --mode requires 'stream' or 'static'");
                    return Ok(());
                }
                mode = match args[i + 1].as_str() {
                    "stream" | "streaming" => PlaybackMode::Streaming,
                    "static" => PlaybackMode::Static,
                    other => {
                        eprintln!("Error: unknown mode '{}'", other);
                        return Ok(());
                    }
                };
                i += 2;
                continue;
            }
            "--rounds" | "-r" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --rounds requires a value");
                    return Ok(());
                }
                rounds = match args[i + 1].parse() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        eprintln!("Error: invalid round count: {}", args[i + 1]);
                        return Ok(());
                    }
                };
                i += 2;
                continue;
            }
            "--pad-odd-chunks" => {
                config.pad_odd_chunks = true;
            }
            "--config" | "-c" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    return Ok(());
                }
                config = RunConfig::load(Path::new(&args[i + 1]));
                i += 2;
                continue;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(());
            }
            _ => {
                files.push(PathBuf::from(&args[i]));
            }
        }
        i += 1;
    }

    let plan = match plan_path {
        Some(path) => TestPlan::load(&path)?,
        None => TestPlan {
            entries: files
                .into_iter()
                .map(|path| PlanEntry { path, rounds, mode })
                .collect(),
        },
    };

    if plan.entries.is_empty() {
        eprintln!("No WAV files given. Pass file paths or --plan FILE.");
        println!();
        print_help();
        return Ok(());
    }

    run_plan(plan, config)
}

fn print_help() {
    println!("Usage: wavdrift [OPTIONS] [FILES...]");
    println!();
    println!("Options:");
    println!("  -l, --list            List available output devices");
    println!("  -d, --device NAME     Play through the named output device");
    println!("  -p, --plan FILE       Load a JSON test plan instead of FILES");
    println!("  -m, --mode MODE       Delivery mode: stream (default) or static");
    println!("  -r, --rounds N        Rounds per file (default: 5)");
    println!("  -c, --config FILE     Load run configuration from JSON");
    println!("      --pad-odd-chunks  Honor RIFF odd-chunk padding");
    println!("  -v, --version         Show version");
    println!("  -h, --help            Show this help");
    println!();
    println!("Examples:");
    println!("  wavdrift test_60s.wav test_5min.wav");
    println!("  wavdrift -m static -r 3 test_60s.wav");
    println!("  wavdrift --plan plan.json -d \"USB DAC\"");
}

fn list_devices() -> Result<()> {
    println!("Scanning for output devices...");
    println!();

    match engine::list_devices() {
        Ok(devices) => {
            if devices.is_empty() {
                println!("No output devices found.");
            } else {
                println!("Found {} device(s):", devices.len());
                println!();
                for (i, device) in devices.iter().enumerate() {
                    let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                    println!("  {}. {}{}", i + 1, device.name, default_marker);
                    println!("     Channels: {} out", device.output_channels);
                    if !device.sample_rates.is_empty() {
                        println!("     Sample rates: {:?}", device.sample_rates);
                    }
                    println!();
                }
            }
        }
        Err(e) => {
            error!("Failed to list devices: {}", e);
            println!("Error: {}", e);
        }
    }

    Ok(())
}

fn run_plan(plan: TestPlan, config: RunConfig) -> Result<()> {
    let total = plan.total_rounds();
    println!("Running {} round(s) across {} file(s)...", total, plan.entries.len());
    println!("────────────────────────────────────────");

    let factory = CpalFactory::new(config.device.clone());
    let runner = Runner::new(config);
    let (handle, rx) = runner.spawn(plan, factory);

    let mut log = ResultLog::new();
    for entry in rx.iter() {
        let status = match &entry.outcome {
            RoundOutcome::Timing(_) => "  ",
            RoundOutcome::Failed(_) => "!!",
        };
        println!(
            "{} {} round {}: {}",
            status,
            entry.file_name,
            entry.round_index + 1,
            entry.summary
        );
        log.append(entry);
    }
    handle.join();

    println!("────────────────────────────────────────");
    println!("Summary:");
    for stats in log.stats() {
        if stats.timed_rounds > 0 {
            println!(
                "  {}: {} round(s), drift min {:.2} / mean {:.2} / max {:.2} ppm{}",
                stats.file_name,
                stats.timed_rounds,
                stats.min_ppm,
                stats.mean_ppm,
                stats.max_ppm,
                if stats.failed_rounds > 0 {
                    format!(", {} failed", stats.failed_rounds)
                } else {
                    String::new()
                }
            );
        } else {
            println!(
                "  {}: all {} round(s) failed",
                stats.file_name, stats.failed_rounds
            );
        }
    }

    Ok(())
}
