//! CLI entry point for `sbr`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use sbr::batch::{self, BatchSummary, DocumentFilter};
use sbr::config::Config;
use sbr::export::document::ExtractOptions;
use sbr::export::filename::DateZone;
use sbr::report::TracingReporter;

/// Extract MMS attachments from SMS Backup & Restore XML files.
///
/// INPUT is a backup file, or a directory searched recursively for
/// `sms-*.xml` files. Attachments are written to OUTPUT_DIR, named after the
/// message date and stamped with the message time. Existing files are never
/// overwritten, so re-running over the same input is safe.
#[derive(Parser)]
#[command(name = "sbr", version)]
struct Cli {
    /// Backup file or directory to scan
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory to write attachments to (created if missing)
    #[arg(value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Name files in UTC instead of local time
    #[arg(long)]
    utc: bool,

    /// Worker threads (default: one per CPU)
    #[arg(short = 'j', long, value_name = "N")]
    threads: Option<usize>,

    /// Configuration file
    #[arg(long, value_name = "PATH", env = "SBR_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging depends on the config, so its own warnings go to a plain stderr
    // subscriber.
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || {
        sbr::config::load_config(cli.config.as_deref())
    });
    if cli.utc {
        config.extract.timezone = DateZone::Utc;
    }
    if let Some(threads) = cli.threads {
        config.extract.threads = threads;
    }

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);
    init_thread_pool(config.extract.threads);

    cmd_extract(&cli.input, &cli.output, &config)
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = sbr::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "sbr.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Size rayon's global pool. `0` keeps the default of one thread per CPU.
fn init_thread_pool(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }
}

/// Extract every attachment under `input` into `output`.
fn cmd_extract(input: &Path, output: &Path, config: &Config) -> anyhow::Result<()> {
    let options = ExtractOptions::from_config(config);
    let filter = DocumentFilter::from_config(config);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Extracting [{bar:40.cyan/blue}] {pos}/{len} files ({elapsed})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let summary = batch::run(
        input,
        output,
        &options,
        &filter,
        &TracingReporter,
        Some(&|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }),
    )?;
    pb.finish_and_clear();

    print_summary(output, &summary, start.elapsed());
    Ok(())
}

/// Print run totals in a human-readable table.
fn print_summary(output: &Path, summary: &BatchSummary, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    let totals = &summary.totals;
    println!();
    println!("  {:<25} {}", "Files processed", summary.documents);
    if summary.documents_rejected > 0 {
        println!("  {:<25} {}", "Not SMS backups", summary.documents_rejected);
    }
    if summary.documents_failed > 0 {
        println!("  {:<25} {}", "Files with errors", summary.documents_failed);
    }
    println!("  {:<25} {}", "SMS messages", totals.sms);
    println!("  {:<25} {}", "MMS messages", totals.mms);
    println!(
        "  {:<25} {} ({})",
        "Attachments written",
        totals.attachments_written,
        format_size(totals.bytes_written, BINARY)
    );
    println!(
        "  {:<25} {}",
        "Already present", totals.attachments_existing
    );
    if totals.unknown_parts > 0 {
        println!("  {:<25} {}", "Unknown content types", totals.unknown_parts);
    }
    if totals.attachments_failed > 0 {
        println!("  {:<25} {}", "Failed attachments", totals.attachments_failed);
    }
    if totals.records_skipped > 0 {
        println!("  {:<25} {}", "Undecodable records", totals.records_skipped);
    }
    println!("  {:<25} {}", "Output directory", output.display());
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!();
}
