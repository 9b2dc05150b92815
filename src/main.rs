use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use freezewatch_sdk::{format_report, format_report_utc, EventLogger, LongEventReport, Output};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use freezewatch::data::duration::{format_duration, parse_duration};
use freezewatch::{FileSource, FreezeSummary, ReportSource, Settings, StreamSource, Thresholds};

#[derive(Parser, Debug)]
#[command(name = "freezewatch")]
#[command(about = "Inspect, export and simulate UI event loop freeze reports")]
struct Args {
    /// Configuration file (TOML, YAML or JSON); FREEZEWATCH_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Freeze threshold (e.g., "2s", "1500ms")
    #[arg(long, global = true)]
    freeze: Option<String>,

    /// Deadlock threshold (e.g., "10s")
    #[arg(long, global = true)]
    deadlock: Option<String>,

    /// Print wall-clock times in UTC instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a JSON lines report log
    Inspect {
        /// Path to the report log written by Output::File
        file: PathBuf,

        /// Print every report in full, not just the summary
        #[arg(short, long)]
        verbose: bool,

        /// Keep watching the file and print reports as they are appended
        #[arg(short, long)]
        follow: bool,

        /// Refresh interval while following (e.g., "1s")
        #[arg(short, long, default_value = "1s")]
        refresh: String,
    },

    /// Write a JSON summary of a report log and exit
    Export {
        /// Path to the report log
        file: PathBuf,

        /// Where to write the summary
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Accept reports sent by Output::Tcp and print them
    Listen {
        /// Address to bind (host:port)
        #[arg(default_value = "127.0.0.1:7878")]
        addr: String,

        /// Also append received reports to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Play a scripted event loop against a live monitor
    Simulate {
        /// Append reports to this file (overrides [outputs] file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Play the scenario this many times (overrides scenario.repeat)
        #[arg(long)]
        repeat: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    apply_threshold_overrides(&mut settings.thresholds, &args)?;

    let render: fn(&LongEventReport) -> String = if args.utc {
        format_report_utc
    } else {
        format_report
    };

    match args.command {
        Command::Inspect {
            file,
            verbose,
            follow,
            refresh,
        } => {
            if follow {
                let refresh = parse_duration(&refresh).context("invalid --refresh")?;
                follow_file(&file, refresh, render)
            } else {
                inspect(&file, &settings.thresholds, verbose, render)
            }
        }
        Command::Export { file, output } => export_to_file(&file, &output, &settings.thresholds),
        Command::Listen { addr, output } => listen(&addr, output, render),
        Command::Simulate { output, repeat } => {
            if let Some(output) = output {
                settings.outputs.file = Some(output);
            }
            if let Some(repeat) = repeat {
                settings.scenario.repeat = repeat;
            }
            simulate(settings, render)
        }
    }
}

fn apply_threshold_overrides(thresholds: &mut Thresholds, args: &Args) -> Result<()> {
    if let Some(freeze) = &args.freeze {
        thresholds.freeze = parse_duration(freeze).context("invalid --freeze")?;
    }
    if let Some(deadlock) = &args.deadlock {
        thresholds.deadlock = parse_duration(deadlock).context("invalid --deadlock")?;
    }
    Ok(())
}

/// Print a summary of every report in `path`
fn inspect(
    path: &Path,
    thresholds: &Thresholds,
    verbose: bool,
    render: fn(&LongEventReport) -> String,
) -> Result<()> {
    let summary = FreezeSummary::load(path, thresholds)?;
    print_summary(&summary);

    if verbose {
        for entry in &summary.entries {
            println!();
            println!("[{}]", entry.severity.symbol());
            println!("{}", render(&entry.report));
        }
    }
    Ok(())
}

fn print_summary(summary: &FreezeSummary) {
    use freezewatch::Severity;

    println!(
        "{} reports: {} deadlocks, {} freezes, {} delays",
        summary.len(),
        summary.count(Severity::Deadlock),
        summary.count(Severity::Freeze),
        summary.count(Severity::Delay),
    );
    println!("UI blocked for {} in total", format_duration(summary.total_blocked()));
    if let Some(longest) = summary.longest() {
        println!(
            "Longest: {} ({})",
            format_duration(longest.report.duration.to_duration()),
            longest.top_frame.as_deref().unwrap_or("no samples"),
        );
    }

    let hotspots = summary.hotspots();
    if !hotspots.is_empty() {
        println!();
        println!("Hotspots:");
        for (frame, count) in hotspots.iter().take(10) {
            println!("  {:>4}  {}", count, frame);
        }
    }
}

/// Tail a report log, printing new reports until interrupted
fn follow_file(
    path: &Path,
    refresh: Duration,
    render: fn(&LongEventReport) -> String,
) -> Result<()> {
    let mut source = FileSource::new(path);
    info!(source = source.description(), "following report log");

    let mut last_error = None;
    loop {
        for report in source.poll() {
            println!("{}\n", render(&report));
        }

        let error = source.error();
        if error.is_some() && error != last_error {
            warn!(error = error.as_deref().unwrap_or_default(), "report log problem");
        }
        last_error = error;

        std::thread::sleep(refresh);
    }
}

/// Receive reports over TCP, printing (and optionally storing) each one
fn listen(
    addr: &str,
    output: Option<PathBuf>,
    render: fn(&LongEventReport) -> String,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let mut source = StreamSource::listen(addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        info!(source = source.description(), "waiting for reports");

        let sink = output.map(Output::file);
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for report in source.poll() {
                        println!("{}\n", render(&report));
                        if let Some(sink) = &sink {
                            sink.log(&report).context("writing report")?;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    return Ok(());
                }
            }
        }
    })
}

/// Play the configured scenario and print what the monitor reported
fn simulate(settings: Settings, render: fn(&LongEventReport) -> String) -> Result<()> {
    let mut outputs: Vec<Arc<dyn EventLogger>> = Vec::new();
    if let Some(path) = &settings.outputs.file {
        outputs.push(Arc::new(Output::file(path)));
    }
    if let Some(addr) = &settings.outputs.tcp {
        outputs.push(Arc::new(Output::tcp(addr)));
    }

    let reports = settings.scenario.run(settings.monitor.clone(), outputs)?;

    // The monitor already logged each report through tracing when log_locally is set
    if !settings.monitor.log_locally {
        for report in &reports {
            println!("{}\n", render(report));
        }
    }

    let summary = FreezeSummary::from_reports(reports, &settings.thresholds);
    print_summary(&summary);
    Ok(())
}

/// Export a JSON summary of a report log
fn export_to_file(report_path: &Path, export_path: &Path, thresholds: &Thresholds) -> Result<()> {
    let summary = FreezeSummary::load(report_path, thresholds)?;

    let json = serde_json::to_string_pretty(&summary.to_export_json())?;
    std::fs::write(export_path, json)
        .with_context(|| format!("writing {}", export_path.display()))?;

    println!("Exported {} reports to: {}", summary.len(), export_path.display());
    Ok(())
}
