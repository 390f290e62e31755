use clap::Parser;
use log::LevelFilter;
use longedge::config::{self, ConfigError, FailurePolicy, RunConfig, TargetSize, TraversalPolicy};
use longedge::imaging::Algorithm;
use longedge::output;
use longedge::process::{self, RunReport};
use longedge::scan::Scanner;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "longedge")]
#[command(version)]
#[command(about = "Resize images in place so their longer edge matches a target size")]
#[command(long_about = "\
Resize images in place so their longer edge matches a target size

Walks ROOT recursively and rewrites every eligible image (by default files
ending in .jpg, any case) so that its longer side is SIZE pixels. Aspect
ratio is kept, and each file's access and modification times are restored
after it is rewritten.

Files are replaced atomically: an interrupted run leaves every image either
untouched or fully resized, never truncated.

Settings are read from ROOT/longedge.toml when present (or from --config):

  [resize]
  algorithm = \"lanczos3\"      # nearest-neighbor, bilinear, bicubic, gaussian, lanczos3
  quality = 75                # JPEG quality, 1-100

  [scan]
  suffixes = [\".jpg\"]
  follow_links = false
  on_error = \"skip\"           # skip | abort

  [processing]
  max_processes = 4           # default: all cores
  on_failure = \"isolate\"      # isolate | fail-fast

Command-line flags override the file.

Exit status: 0 when every file was resized, 1 when any file failed or the
walk stopped early, 2 for invalid arguments or settings.")]
struct Cli {
    /// Target length of the longer edge, in pixels
    #[arg(value_name = "SIZE")]
    size: TargetSize,

    /// Directory to walk
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Resampling filter
    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,

    /// File name suffix to process (repeatable, case-insensitive)
    #[arg(long = "ext", value_name = "SUFFIX")]
    extensions: Vec<String>,

    /// Upper bound on concurrent workers
    #[arg(long, value_name = "N")]
    max_processes: Option<usize>,

    /// JPEG encoding quality (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Stop dispatching on the first failed file
    #[arg(long)]
    fail_fast: bool,

    /// Stop the walk on the first unreadable directory entry
    #[arg(long)]
    abort_on_walk_error: bool,

    /// Follow symbolic links while walking
    #[arg(long)]
    follow_links: bool,

    /// Settings file (default: ROOT/longedge.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a JSON run report to FILE
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// List eligible files without touching them
    #[arg(long)]
    dry_run: bool,

    /// Log every step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_target(false)
        .init();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if cli.dry_run {
        dry_run(&config);
        return ExitCode::SUCCESS;
    }

    match run(&config, cli.report.as_deref()) {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Settings file first, then command-line overrides, then validation.
fn resolve_config(cli: &Cli) -> Result<RunConfig, ConfigError> {
    let mut settings = config::load_settings(&cli.root, cli.config.as_deref())?;

    if let Some(algorithm) = cli.algorithm {
        settings.resize.algorithm = algorithm;
    }
    if let Some(quality) = cli.quality {
        settings.resize.quality = quality;
    }
    if !cli.extensions.is_empty() {
        settings.scan.suffixes = cli.extensions.clone();
    }
    if cli.follow_links {
        settings.scan.follow_links = true;
    }
    if cli.abort_on_walk_error {
        settings.scan.on_error = TraversalPolicy::Abort;
    }
    if let Some(n) = cli.max_processes {
        settings.processing.max_processes = Some(n);
    }
    if cli.fail_fast {
        settings.processing.on_failure = FailurePolicy::FailFast;
    }

    let config = RunConfig {
        root: cli.root.clone(),
        target_size: cli.size,
        settings,
    };
    config.validate()?;
    Ok(config)
}

fn dry_run(config: &RunConfig) {
    let (files, errors) = Scanner::from_config(config).collect();
    for err in &errors {
        log::warn!("Skipped {err}");
    }
    for line in output::format_dry_run(&files, config.target_size.get()) {
        log::info!("{line}");
    }
}

fn run(
    config: &RunConfig,
    report_path: Option<&Path>,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    log::info!(
        "Resizing images under {} to {} using {}",
        config.root.display(),
        config.target_size,
        config.settings.resize.algorithm
    );

    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || {
        for event in rx {
            output::log_process_event(&event);
        }
    });
    let result = process::run(config, Some(tx));
    if printer.join().is_err() {
        log::error!("event printer panicked");
    }
    let report = result?;

    let summary_level = if report.is_success() {
        log::Level::Info
    } else {
        log::Level::Warn
    };
    for line in output::format_summary(&report) {
        log::log!(summary_level, "{line}");
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        log::debug!("report written to {}", path.display());
    }
    Ok(report)
}
