//! Detector command.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use colorwatch_camera::SourceSpec;
use colorwatch_core::color::Hsv;
use colorwatch_core::config::{DetectorConfig, NotifyMode};
use colorwatch_core::detector::{Detector, FrameSource, RunSummary};
use colorwatch_core::notifier::{HttpNotifier, InlineNotifier, Notifier, QueuedNotifier};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// How long the detector loop gets to wind down after a quit request.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Exit status when a second Ctrl+C forces the process down.
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Args)]
pub struct DetectArgs {
    /// TOML file with a [detector] table
    #[arg(long, env = "COLORWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Frame source: camera, camera:N or dir:<path>
    #[arg(long, default_value = "camera", env = "COLORWATCH_SOURCE")]
    pub source: SourceSpec,

    /// Loop a dir: source instead of stopping at its last image
    #[arg(long)]
    pub repeat: bool,

    /// Relay notification endpoint
    #[arg(long, env = "COLORWATCH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Matching pixels a frame must exceed for the color to be present
    #[arg(long)]
    pub threshold: Option<u32>,

    /// Lower HSV bound as h,s,v (hue 0-179)
    #[arg(long)]
    pub lower: Option<Hsv>,

    /// Upper HSV bound as h,s,v (hue 0-179)
    #[arg(long)]
    pub upper: Option<Hsv>,

    /// inline blocks the loop on each request; queued hands off to a sender task
    #[arg(long)]
    pub notify_mode: Option<NotifyMode>,

    /// Capacity of the queued notifier
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Request timeout in milliseconds (none by default)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,
}

impl DetectArgs {
    /// Defaults, then the config file, then flags.
    fn resolve_config(&self) -> Result<DetectorConfig> {
        let mut config = DetectorConfig::load(self.config.as_deref())
            .context("Failed to load detector configuration")?;

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(lower) = self.lower {
            config.lower = lower;
        }
        if let Some(upper) = self.upper {
            config.upper = upper;
        }
        if let Some(mode) = self.notify_mode {
            config.notify_mode = mode;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn execute(args: DetectArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let range = config.range()?;
    debug!(?config, "Detector configuration resolved");

    let source = colorwatch_camera::open(&args.source, args.repeat)
        .with_context(|| format!("Failed to open frame source {:?}", args.source))?;

    let (quit_tx, quit_rx) = watch::channel(false);
    listen_for_quit(quit_tx);

    let http = HttpNotifier::new(&config.endpoint, config.timeout())?;
    info!(endpoint = %config.endpoint, mode = ?config.notify_mode, "Notifying relay");

    let summary = match config.notify_mode {
        NotifyMode::Inline => {
            let notifier = InlineNotifier::new(http, tokio::runtime::Handle::current(), quit_rx.clone());
            let detector = Detector::new(source, notifier, range, config.threshold)
                .with_max_frames(args.max_frames);
            run_detector(detector, quit_rx).await?
        }
        NotifyMode::Queued => {
            let (notifier, queue) = QueuedNotifier::new(config.queue_capacity);
            let sender = tokio::spawn(queue.run(http, quit_rx.clone()));
            let detector = Detector::new(source, notifier, range, config.threshold)
                .with_max_frames(args.max_frames);
            let summary = run_detector(detector, quit_rx).await;
            // the notifier is gone now, so the sender finishes once drained
            if let Err(e) = sender.await {
                warn!(error = %e, "Notification sender task failed");
            }
            summary?
        }
    };

    print_summary(&summary);
    Ok(())
}

/// Run the blocking loop on its own thread and wait for it, or for quit.
///
/// Once quit is signalled the loop has [`QUIT_GRACE`] to return. If it is
/// still blocked after that, the thread is left behind and an error is
/// returned so the process can exit.
async fn run_detector<S, N>(
    detector: Detector<S, N>,
    mut quit_rx: watch::Receiver<bool>,
) -> Result<RunSummary>
where
    S: FrameSource + Send + 'static,
    N: Notifier + Send + 'static,
{
    let (done_tx, mut done_rx) = oneshot::channel();
    let loop_quit = quit_rx.clone();
    // not spawn_blocking: runtime shutdown would wait on a stuck loop
    std::thread::Builder::new()
        .name("detector".to_string())
        .spawn(move || {
            let _ = done_tx.send(detector.run(&loop_quit));
        })
        .context("Failed to start detector thread")?;

    let finished = tokio::select! {
        finished = &mut done_rx => finished,
        true = quit_signalled(&mut quit_rx) => {
            match tokio::time::timeout(QUIT_GRACE, &mut done_rx).await {
                Ok(finished) => finished,
                Err(_) => {
                    error!(grace = ?QUIT_GRACE, "Detector loop did not stop after quit");
                    bail!("Detector did not stop within {:?} of the quit request", QUIT_GRACE);
                }
            }
        }
    };

    let summary = finished
        .context("Detector thread panicked")?
        .context("Detector stopped with an error")?;
    Ok(summary)
}

/// True once quit is requested; false if every quit sender is gone.
async fn quit_signalled(quit_rx: &mut watch::Receiver<bool>) -> bool {
    quit_rx.wait_for(|quit| *quit).await.is_ok()
}

/// Flip `quit` on Ctrl+C or when a `q` line is read from stdin. A second
/// Ctrl+C exits immediately.
fn listen_for_quit(quit: watch::Sender<bool>) {
    let on_signal = quit.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, press again to force exit");
            let _ = on_signal.send(true);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second Ctrl+C, exiting without cleanup");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    // stdin blocks, so it gets its own thread rather than a runtime worker
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                info!("Quit key received");
                let _ = quit.send(true);
                break;
            }
        }
    });
}

fn print_summary(summary: &RunSummary) {
    let state = if summary.detected {
        "present".green()
    } else {
        "absent".dimmed()
    };
    println!();
    println!("  {}", "Detector stopped".bold());
    println!("  {}          {}", "Frames".cyan(), summary.frames);
    println!("  {}   {}", "Notifications".cyan(), summary.delivered);
    println!("  {}    {}", "Failed sends".cyan(), summary.failed);
    println!("  {}      {}", "Last state".cyan(), state);
    println!();
}
