use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use podmirror::{
    MirrorOptions, ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter,
    default_dest_dir, mirror_feed,
};

// Emoji with fallback for terminals without Unicode support
static SATELLITE: Emoji<'_, '_> = Emoji("📡 ", "");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Mirror the media enclosures of a feed into a local directory
#[derive(Parser, Debug)]
#[command(name = "podmirror")]
#[command(about = "Mirror the media enclosures of an RSS/Atom feed, downloading each only once")]
#[command(version)]
struct Args {
    /// URL of the feed to mirror (or path to a local feed file)
    #[arg(long)]
    feed: String,

    /// Directory where files should be saved [default: $HOME/temp/podcasts]
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Prefix to prepend to filenames
    #[arg(long, default_value = "")]
    prefix: String,

    /// Suppress informational logging
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    quiet: bool,

    /// Mark files as downloaded without downloading
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    skip: bool,

    /// Maximum number of files to mirror (negative = all)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    num: i64,
}

impl Args {
    fn mirror_options(&self) -> MirrorOptions {
        MirrorOptions {
            prefix: self.prefix.clone(),
            skip_download: self.skip,
            limit: usize::try_from(self.num).ok(),
            ..MirrorOptions::new(self.dest.clone().unwrap_or_else(default_dest_dir))
        }
    }
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Progress reporter writing log records, plus a byte bar per download
struct LogReporter {
    show_bars: bool,
    multi: MultiProgress,
    bar: Mutex<Option<ProgressBar>>,
}

impl LogReporter {
    fn new(show_bars: bool) -> Self {
        Self {
            show_bars,
            multi: MultiProgress::new(),
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, length: Option<u64>, message: String) {
        if !self.show_bars {
            return;
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);
        bar.set_message(message);
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn finish_bar(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }

    /// Log without tearing an active progress bar
    fn log(&self, f: impl FnOnce()) {
        self.multi.suspend(f);
    }
}

impl ProgressReporter for LogReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.log(|| info!("Fetching feed {url}"));
            }

            ProgressEvent::ReadingFeed { path } => {
                self.log(|| info!("Reading feed file {path}"));
            }

            ProgressEvent::FeedScanned {
                total_items,
                to_process,
            } => {
                self.log(|| info!("Found {total_items} items, processing {to_process}"));
            }

            ProgressEvent::ItemSeen { url } => {
                self.log(|| info!("Skipping {url}"));
            }

            ProgressEvent::MarkerMigrated { url, rule } => {
                self.log(|| info!("Skipping {url} (migrated {rule} marker)"));
            }

            ProgressEvent::DownloadStarting {
                url,
                path,
                item_index,
                total_items,
                content_length,
            } => {
                self.log(|| info!("Downloading {url} to {}", path.display()));
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.start_bar(
                    content_length,
                    format!("[{}/{}] {}", item_index + 1, total_items, name),
                );
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                if let Some(bar) = self.bar.lock().unwrap().as_ref() {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::DownloadCompleted { .. } => self.finish_bar(),

            ProgressEvent::DownloadSkipped { url, path } => {
                self.log(|| info!("Skipping download of {url} to {}", path.display()));
            }

            ProgressEvent::Marked { url } => {
                tracing::debug!("Marked {url} as seen");
            }

            ProgressEvent::ItemFailed { url, error } => {
                self.finish_bar();
                self.log(|| warn!("Failed to download {url}: {error}"));
            }

            ProgressEvent::SyncCompleted { .. } => self.finish_bar(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet);

    let options = args.mirror_options();
    let client = ReqwestClient::new();
    let reporter: SharedProgressReporter = Arc::new(LogReporter::new(
        !args.quiet && console::Term::stderr().is_term(),
    ));

    if !args.quiet {
        println!("\n{SATELLITE}{} {}\n", "podmirror".bold().magenta(), args.feed.cyan());
    }

    let result = mirror_feed(&client, &args.feed, &options, reporter)
        .await
        .with_context(|| format!("Failed to extract items from {}", args.feed))?;

    if args.quiet {
        return Ok(());
    }

    println!(
        "\n{PARTY}{} {} downloaded, {} marked, {} already done, {} failed",
        "Mirror complete:".bold().green(),
        result.downloaded.to_string().green().bold(),
        result.marked.to_string().yellow(),
        result.already_done.to_string().yellow(),
        if result.failed > 0 {
            result.failed.to_string().red().bold()
        } else {
            result.failed.to_string().green()
        }
    );

    if !result.failed_items.is_empty() {
        println!("\n{}", "Failed items:".red().bold());
        for (url, error) in &result.failed_items {
            println!("  {CROSS}{} - {}", url.yellow(), error.dimmed());
        }
    }

    println!(
        "\n{FOLDER}Output: {}\n",
        options.dest_dir.display().to_string().cyan()
    );

    // Per-item failures are logged, not reflected in the exit code
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_flag_is_required() {
        assert!(Args::try_parse_from(["podmirror"]).is_err());
    }

    #[test]
    fn defaults_process_everything() {
        let args = Args::try_parse_from(["podmirror", "--feed", "https://example.com/feed.xml"])
            .unwrap();
        let options = args.mirror_options();

        assert_eq!(options.limit, None);
        assert!(!options.skip_download);
        assert!(options.prefix.is_empty());
        assert_eq!(options.dest_dir, default_dest_dir());
    }

    #[test]
    fn flags_map_onto_options() {
        let args = Args::try_parse_from([
            "podmirror",
            "--feed",
            "https://example.com/feed.xml",
            "--dest",
            "/tmp/mirror",
            "--prefix",
            "show-",
            "--skip",
            "--quiet",
            "--num",
            "2",
        ])
        .unwrap();
        let options = args.mirror_options();

        assert!(args.quiet);
        assert_eq!(options.limit, Some(2));
        assert!(options.skip_download);
        assert_eq!(options.prefix, "show-");
        assert_eq!(options.dest_dir, PathBuf::from("/tmp/mirror"));
    }

    #[test]
    fn negative_num_means_unbounded() {
        let args = Args::try_parse_from(["podmirror", "--feed", "f.xml", "--num", "-1"]).unwrap();
        assert_eq!(args.mirror_options().limit, None);
    }

    #[test]
    fn boolean_flags_accept_explicit_values() {
        let args = Args::try_parse_from([
            "podmirror",
            "--feed",
            "f.xml",
            "--skip=true",
            "--quiet=false",
        ])
        .unwrap();

        assert!(args.skip);
        assert!(!args.quiet);
        assert!(args.mirror_options().skip_download);
    }

    #[test]
    fn bare_boolean_flag_before_another_flag() {
        let args = Args::try_parse_from(["podmirror", "--skip", "--feed", "f.xml"]).unwrap();

        assert!(args.skip);
        assert_eq!(args.feed, "f.xml");
    }

    #[test]
    fn boolean_flag_rejects_garbage_value() {
        assert!(Args::try_parse_from(["podmirror", "--feed", "f.xml", "--skip=maybe"]).is_err());
    }
}
