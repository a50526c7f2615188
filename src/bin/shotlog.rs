use anyhow::{Context, Result};
use clap::Parser;
use hooptrack::{Analysis, Config, Frame, ShotAnalyzer, ShotEvent};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reads detector output as JSON lines (one frame per line) and prints
/// every resolved shot as a JSON line.
#[derive(Parser, Debug)]
#[command(name = "shotlog", version)]
struct Args {
    /// Frames file, `-` for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// JSON file overriding pipeline thresholds
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source label used in logs
    #[arg(short, long, default_value = "default")]
    source: String,
}

fn emit(out: &mut impl Write, events: &[ShotEvent]) -> Result<()> {
    for event in events {
        serde_json::to_writer(&mut *out, event)?;
        writeln!(out)?;
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Config::from_json(&text).context("parsing config")?
        }
        None => Config::default(),
    };

    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(&args.input)
            .with_context(|| format!("opening {}", args.input))?;
        Box::new(BufReader::new(file))
    };

    let mut analyzer = ShotAnalyzer::new(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut frames = 0usize;
    let mut shots = 0usize;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: Frame = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed frame", lineno + 1))?;

        let reports = analyzer
            .update(std::slice::from_ref(&frame), &args.source)
            .with_context(|| format!("line {}: analysis aborted", lineno + 1))?;

        for report in &reports {
            shots += report.new_shot_events.len();
            emit(&mut out, &report.resolved_shot_events)?;
        }

        frames += 1;
    }

    emit(&mut out, &analyzer.finish(&args.source))?;

    info!(source = %args.source, frames, shots, "analysis complete");

    Ok(())
}
