//! AEGIS CLI - Command-line interface for the feed integrity engine

use aegis_core::{AegisConfig, FrameSample, IntegrityCoordinator, Verdict};
use aegis_token::{ManualClock, Observation, TokenValidator, WatermarkIssuer};
use anyhow::{bail, Context};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the shared secret.
const SECRET_ENV: &str = "AEGIS_SECRET_KEY";

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Parser)]
#[command(name = "aegis")]
#[command(about = "AEGIS - Feed integrity checks for unattended cameras")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Check configuration validity
    Check {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the watermark for a second
    Token {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Unix second (defaults to now)
        #[arg(long, allow_negative_numbers = true)]
        at: Option<i64>,
    },
    /// Validate a `timestamp,token` observation log
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CSV log of observed tokens
        #[arg(short, long)]
        log: PathBuf,
    },
    /// Assess directories of frames, one directory per stream
    Analyze {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Stream directories
        #[arg(required = true)]
        streams: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Some(Commands::Check { config }) => check(config.as_deref()),
        Some(Commands::Token { config, at }) => token(config.as_deref(), at),
        Some(Commands::Validate { config, log }) => validate(config.as_deref(), &log),
        Some(Commands::Analyze { config, streams }) => analyze(config.as_deref(), streams).await,
        None => {
            println!("AEGIS v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads the config file (or defaults), then applies the secret from the
/// environment.
fn load_config(path: Option<&Path>) -> anyhow::Result<AegisConfig> {
    let mut config = match path {
        Some(path) => AegisConfig::from_json_file(path)?,
        None => AegisConfig::default(),
    };
    if let Ok(secret) = std::env::var(SECRET_ENV) {
        config.token.secret = secret;
    }
    config.validate().context("configuration rejected")?;
    Ok(config)
}

fn check(path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = load_config(path)?;
    let key = if config.token.secret.is_empty() {
        "not set (token validation disabled)".to_string()
    } else {
        format!("fingerprint {}", config.token.secret_key()?.fingerprint())
    };

    println!("Configuration OK");
    println!("  blur threshold:      {}", config.signals.blur_threshold);
    println!("  shake threshold:     {}", config.signals.shake_threshold);
    println!("  low-light threshold: {}", config.signals.low_light_threshold);
    println!("  reposition shift:    {}", config.tracker.threshold_shift);
    println!("  history capacity:    {}", config.tracker.capacity);
    println!("  skew tolerance:      ±{}s", config.token.skew_tolerance_secs);
    println!("  secret:              {key}");
    Ok(ExitCode::SUCCESS)
}

fn token(path: Option<&Path>, at: Option<i64>) -> anyhow::Result<ExitCode> {
    let config = load_config(path)?;
    let mark = match at {
        Some(second) => WatermarkIssuer::with_clock(&config.token, ManualClock::new(second))?.issue(),
        None => WatermarkIssuer::new(&config.token)?.issue(),
    };
    println!("second:  {}", mark.unix_second);
    println!("token:   {}", mark.token);
    println!("opacity: {}", mark.opacity);
    println!("text:    {}", mark.text);
    Ok(ExitCode::SUCCESS)
}

fn validate(path: Option<&Path>, log: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config(path)?;
    let validator = TokenValidator::new(&config.token)
        .with_context(|| format!("token validation needs a secret (set {SECRET_ENV})"))?;

    let text = std::fs::read_to_string(log)
        .with_context(|| format!("cannot read {}", log.display()))?;
    let observations = parse_log(&text);
    if observations.is_empty() {
        bail!("{} holds no observations", log.display());
    }

    let report = validator.validate_sequence(&observations);
    println!(
        "checked {} / matched {} / inconclusive {}",
        report.checked, report.matched, report.inconclusive
    );
    match report.first_mismatch() {
        Some(mismatch) => {
            println!("TAMPERED: {mismatch}");
            Ok(ExitCode::from(2))
        }
        None => {
            println!("AUTHENTIC");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Parses `timestamp,token` rows. A header row and malformed rows are
/// skipped.
fn parse_log(text: &str) -> Vec<Observation> {
    let mut observations = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((second, token)) = line.split_once(',') else {
            warn!(line = line_no + 1, "row has no comma, skipped");
            continue;
        };
        let Ok(second) = second.trim().parse::<i64>() else {
            if line_no > 0 {
                warn!(line = line_no + 1, "row has no valid timestamp, skipped");
            }
            continue;
        };
        match Observation::parse(second, token) {
            Ok(observation) => observations.push(observation),
            Err(err) => warn!(line = line_no + 1, error = %err, "row skipped"),
        }
    }
    observations
}

async fn analyze(path: Option<&Path>, streams: Vec<PathBuf>) -> anyhow::Result<ExitCode> {
    let config = load_config(path)?;

    let handles: Vec<_> = streams
        .into_iter()
        .map(|dir| {
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                let summary = analyze_stream(&config, &dir);
                (dir, summary)
            })
        })
        .collect();

    let mut failed = false;
    for handle in handles {
        let (dir, summary) = handle.await.context("stream task panicked")?;
        match summary {
            Ok(summary) => {
                println!("{}", dir.display());
                println!("  frames: {} ({} unreadable)", summary.frames, summary.skipped);
                for (label, count) in &summary.verdicts {
                    println!("  {label:<13} {count}");
                }
                failed |= summary.tampered();
            }
            Err(err) => {
                println!("{}: {err:#}", dir.display());
                failed = true;
            }
        }
    }
    Ok(if failed { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

#[derive(Debug, Default)]
struct StreamSummary {
    frames: usize,
    skipped: usize,
    verdicts: BTreeMap<&'static str, usize>,
}

impl StreamSummary {
    fn tampered(&self) -> bool {
        self.verdicts.contains_key("tampered")
    }
}

fn analyze_stream(config: &AegisConfig, dir: &Path) -> anyhow::Result<StreamSummary> {
    let mut coordinator = IntegrityCoordinator::new(config)?;
    let files = frame_files(dir)?;
    info!(
        session = %coordinator.session_id(),
        stream = %dir.display(),
        frames = files.len(),
        "analyzing stream"
    );

    let mut summary = StreamSummary::default();
    for file in files {
        let frame = match image::open(&file) {
            Ok(decoded) => FrameSample::from_dynamic(decoded).map_err(anyhow::Error::from),
            Err(err) => Err(anyhow::Error::from(err)),
        };
        let assessment =
            frame.and_then(|f| coordinator.process_frame(&f).map_err(anyhow::Error::from));
        match assessment {
            Ok(assessment) => {
                summary.frames += 1;
                *summary.verdicts.entry(assessment.verdict.label()).or_default() += 1;
                if let Verdict::Tampered { reason } = &assessment.verdict {
                    warn!(file = %file.display(), %reason, "tampered frame");
                }
            }
            Err(err) => {
                warn!(file = %file.display(), error = %err, "frame skipped");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

/// Image files in `dir`, sorted by file name.
fn frame_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_skips_header_and_bad_rows() {
        let log = "timestamp,token\n100,4556\n\n101,65\nbogus\n102, 9001\n";
        let observations = parse_log(log);
        let seconds: Vec<i64> = observations.iter().map(|o| o.unix_second).collect();
        assert_eq!(seconds, vec![100, 102]);
        assert_eq!(observations[1].token.to_string(), "9001");
    }

    #[test]
    fn test_frame_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = frame_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.jpeg"]);
    }

    #[test]
    fn test_analyze_stream_counts_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let board = image::GrayImage::from_fn(64, 64, |x, y| {
            image::Luma([if (x / 8 + y / 8) % 2 == 0 { 30 } else { 220 }])
        });
        for i in 0..3 {
            board.save(dir.path().join(format!("frame-{i:03}.png"))).unwrap();
        }
        std::fs::write(dir.path().join("frame-999.png"), b"not a png").unwrap();

        let summary = analyze_stream(&AegisConfig::default(), dir.path()).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.verdicts.get("nominal"), Some(&3));
        assert!(!summary.tampered());
    }
}
