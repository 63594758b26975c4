// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};

use rfctl_config::{EngineConfig, SessionScript};
use rfctl_core::boot::image::{inspect, ImageReport};
use rfctl_core::system::bench::build_bench;
use rfctl_core::Engine;

mod session;

use session::{Session, SessionReport};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "RF bench register engine", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted host session against a simulated bench.
    Run(RunArgs),

    /// Check an EEPROM LUT image offline.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the bench config (YAML)
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the session script (YAML)
    #[arg(short, long)]
    script: PathBuf,

    /// Write an engine snapshot (JSON) when the session ends
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the session report as JSON instead of one line per step
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Path to the raw EEPROM image
    image: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so step lines and JSON stay parseable.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_session(args),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn load_inputs(args: &RunArgs) -> anyhow::Result<(EngineConfig, SessionScript)> {
    let config = EngineConfig::from_file(&args.config)?;
    let script = SessionScript::from_file(&args.script)?;
    debug!(
        "Effective bench config:\n{}",
        serde_yaml::to_string(&config).unwrap_or_default()
    );
    Ok((config, script))
}

fn run_session(args: RunArgs) -> ExitCode {
    let (config, script) = match load_inputs(&args) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let (mut engine, port) = match build_bench(&config) {
        Ok(bench) => bench,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let result = Session::new(&mut engine, &port, &script).run_script(&script);

    if let Some(path) = &args.snapshot {
        write_snapshot(path, &engine);
    }

    match result {
        Ok(report) => {
            print_report(&report, args.json);
            if report.passed() {
                info!("Session passed in {} ticks", report.ticks);
                ExitCode::from(EXIT_PASS)
            } else {
                error!("Session failed");
                ExitCode::from(EXIT_ASSERT_FAIL)
            }
        }
        Err(e) => {
            error!("{:#}", e);
            if args.json {
                let value = serde_json::json!({
                    "result_schema_version": "1.0",
                    "status": "error",
                    "ticks": engine.timestamp(),
                    "message": format!("{:#}", e),
                });
                println!("{}", value);
            }
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn print_report(report: &SessionReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
        return;
    }
    for step in &report.steps {
        println!("{}", step);
    }
    println!(
        "{}: {} step(s), {} ticks, {} bytes in, {} bytes out",
        report.status.to_uppercase(),
        report.steps.len(),
        report.ticks,
        report.bytes_received,
        report.bytes_sent
    );
}

fn write_snapshot(path: &Path, engine: &Engine) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create snapshot parent dir {:?}: {}", parent, e);
            return;
        }
    }
    match engine.snapshot().to_json_pretty() {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                error!("Failed to write snapshot {:?}: {}", path, e);
            } else {
                info!("Snapshot written to {:?}", path);
            }
        }
        Err(e) => error!("Failed to serialize snapshot: {}", e),
    }
}

fn run_inspect(args: InspectArgs) -> ExitCode {
    let bytes = match std::fs::read(&args.image) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read image {:?}: {}", args.image, e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let report = match inspect(&bytes) {
        Ok(r) => r,
        Err(e) => {
            error!("Image rejected: {}", e);
            if args.json {
                println!("{}", serde_json::json!({ "valid": false, "error": e.to_string() }));
            }
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if args.json {
        let mut value = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("valid".to_string(), serde_json::Value::Bool(report.is_valid()));
        }
        println!("{}", value);
    } else {
        print_image(&report, bytes.len());
    }

    if report.is_valid() {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_ASSERT_FAIL)
    }
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "MISMATCH"
    }
}

fn print_image(report: &ImageReport, len: usize) {
    let h = &report.header;
    println!(
        "header: magic {} version {} luts {} size {} bytes ({} in file)",
        String::from_utf8_lossy(&h.magic),
        h.version,
        h.lut_count,
        h.total_size,
        len
    );
    println!("header crc: {:#010x} {}", h.crc32, verdict(report.header_crc_ok));
    for lut in &report.luts {
        let d = &lut.descriptor;
        println!(
            "lut {}: type {} entries {} width {} crc {:#010x} computed {:#010x} {}",
            lut.index,
            d.lut_type,
            d.entry_count,
            d.entry_width,
            d.crc32,
            lut.computed_crc,
            verdict(lut.crc_ok)
        );
    }
    println!("{}", if report.is_valid() { "VALID" } else { "INVALID" });
}
