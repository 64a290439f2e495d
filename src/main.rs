//! capture-agent: record a meeting window's frames and microphone audio into
//! a session directory, then hand the files off for processing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use capture_agent::audio::synthetic::SyntheticAudioBackend;
use capture_agent::capture::detector::sort_by_title;
use capture_agent::capture::synthetic::SyntheticWindowBackend;
use capture_agent::platform::{self, PlatformAdapter};
use capture_agent::{
    AgentConfig, CaptureRegion, CaptureSession, ProcessingStatus, SessionFileStore, WindowDetector,
    WindowInfo,
};

#[derive(Parser, Debug)]
#[command(name = "capture-agent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output root, overriding the configured one
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show platform and capability information
    Info,

    /// List capturable windows
    Windows {
        /// Include windows of non-browser processes
        #[arg(long)]
        all: bool,
    },

    /// Record a window until the duration elapses or Ctrl-C
    Record {
        /// Index from `windows` output
        #[arg(long)]
        window: Option<usize>,

        /// Pick the first window whose title contains this text
        #[arg(long)]
        title: Option<String>,

        /// Capture region as x,y,width,height (detected when omitted)
        #[arg(long, value_parser = parse_region, allow_hyphen_values = true)]
        region: Option<CaptureRegion>,

        /// Frames per second (1-60)
        #[arg(long)]
        fps: Option<u32>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,

        /// Use the built-in test pattern and tone instead of real devices
        #[arg(long)]
        synthetic: bool,
    },

    /// Re-run the hand-off for a recorded session
    Process {
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::load_or_default(cli.config.as_deref())?;
    if let Some(output) = cli.output {
        config.output_dir = Some(output);
    }

    match cli.command {
        Commands::Info => show_info(),
        Commands::Windows { all } => list_windows(&config, all),
        Commands::Record {
            window,
            title,
            region,
            fps,
            seconds,
            synthetic,
        } => {
            let opts = RecordOptions {
                window,
                title,
                region,
                fps: fps.unwrap_or(config.capture.fps),
                duration: seconds.map(Duration::from_secs),
                synthetic,
            };
            record(config, opts).await
        }
        Commands::Process { session_id } => process(&config, &session_id),
    }
}

fn show_info() -> Result<()> {
    let adapter = PlatformAdapter::detect();
    let info = platform::get_system_info()?;
    let output = serde_json::json!({
        "system": info,
        "capabilities": adapter.capabilities(),
        "backends": format!("{:?}", adapter),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn discover(adapter: &PlatformAdapter, config: &AgentConfig, all: bool) -> Vec<WindowInfo> {
    let detector = WindowDetector::new(adapter.window_backend(), &config.detection);
    let mut windows = if all {
        detector.find_all_windows()
    } else {
        detector.find_target_windows()
    };
    sort_by_title(&mut windows);
    windows
}

fn list_windows(config: &AgentConfig, all: bool) -> Result<()> {
    let adapter = PlatformAdapter::detect();
    let windows = discover(&adapter, config, all);
    if windows.is_empty() {
        println!("No capturable windows found");
        return Ok(());
    }
    for (i, w) in windows.iter().enumerate() {
        println!(
            "{:>3}  {}{}  [{}] {}x{} at ({}, {})",
            i,
            if w.is_target_app { "* " } else { "  " },
            w.title,
            w.app_name,
            w.width,
            w.height,
            w.x,
            w.y
        );
    }
    Ok(())
}

struct RecordOptions {
    window: Option<usize>,
    title: Option<String>,
    region: Option<CaptureRegion>,
    fps: u32,
    duration: Option<Duration>,
    synthetic: bool,
}

async fn record(config: AgentConfig, opts: RecordOptions) -> Result<()> {
    let adapter = if opts.synthetic {
        PlatformAdapter::new(
            Arc::new(SyntheticWindowBackend::single(1280, 720)),
            Arc::new(SyntheticAudioBackend::new()),
        )
    } else {
        PlatformAdapter::detect()
    };

    // Synthetic windows belong to no real host process
    let windows = discover(&adapter, &config, opts.synthetic);
    let window = choose_window(windows, opts.window, opts.title.as_deref())?;

    let store = Arc::new(SessionFileStore::new(config.output_root())?);
    let mut session = CaptureSession::new(adapter, store, &config);
    session.select_window(window)?;

    match opts.region {
        Some(region) => session.set_region(region)?,
        None => {
            let region = session
                .suggest_region()
                .context("no --region given and content-area detection failed")?;
            info!("Using detected region {:?}", region);
            session.set_region(region)?;
        }
    }

    session
        .try_start(opts.fps)
        .context("failed to start capture")?;
    let status = session.status_handle();

    let deadline = async {
        match opts.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Recording duration reached");
                break;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Ctrl-C handler failed: {}", e);
                }
                info!("Interrupted, stopping capture");
                break;
            }
            _ = ticker.tick() => {
                let s = status.get();
                info!(
                    "Recording: {} frames, {} dropped, audio {}",
                    s.frame_count,
                    s.frames_dropped,
                    if s.audio_available { "on" } else { "off" }
                );
            }
        }
    }

    // Stopping joins the worker threads
    let report = tokio::task::spawn_blocking(move || {
        session.stop_capture();
        session.last_report().cloned()
    })
    .await?
    .ok_or_else(|| anyhow!("capture stopped without a hand-off report"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.status == ProcessingStatus::Error {
        bail!("hand-off for {} reported errors", report.session_id);
    }
    Ok(())
}

fn choose_window(windows: Vec<WindowInfo>, index: Option<usize>, title: Option<&str>) -> Result<WindowInfo> {
    if let Some(i) = index {
        let count = windows.len();
        return windows
            .into_iter()
            .nth(i)
            .ok_or_else(|| anyhow!("window index {} out of range ({} windows)", i, count));
    }
    if let Some(needle) = title {
        let needle = needle.to_lowercase();
        return windows
            .into_iter()
            .find(|w| w.title.to_lowercase().contains(&needle))
            .ok_or_else(|| anyhow!("no window title contains {:?}", needle));
    }
    let fallback = windows.first().cloned();
    windows
        .into_iter()
        .find(|w| w.is_target_app)
        .or(fallback)
        .ok_or_else(|| anyhow!("no capturable windows found"))
}

fn process(config: &AgentConfig, session_id: &str) -> Result<()> {
    let store = SessionFileStore::new(config.output_root())?;
    let report = store.trigger_processing(session_id);
    println!("{}", serde_json::to_string_pretty(&report)?);
    match report.status {
        ProcessingStatus::Error => bail!("processing {} failed", session_id),
        _ => Ok(()),
    }
}

fn parse_region(s: &str) -> std::result::Result<CaptureRegion, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{:?}: {}", p, e)))
        .collect::<std::result::Result<_, _>>()?;
    match parts.as_slice() {
        &[x, y, w, h] => CaptureRegion::new(x, y, w, h)
            .ok_or_else(|| format!("region {}x{} has no area", w, h)),
        _ => Err(format!("expected x,y,width,height, got {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_argument() {
        let region = parse_region("10, 20,300,200").unwrap();
        assert_eq!((region.x(), region.y(), region.width(), region.height()), (10, 20, 300, 200));
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("0,0,0,5").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn prefers_target_window_by_default() {
        let mut other = WindowInfo::primary_display(100, 100);
        other.title = "Editor".to_string();
        let mut meet = WindowInfo::primary_display(100, 100);
        meet.title = "Meet".to_string();
        meet.is_target_app = true;

        let chosen = choose_window(vec![other.clone(), meet.clone()], None, None).unwrap();
        assert_eq!(chosen.title, "Meet");
        assert_eq!(choose_window(vec![other.clone(), meet.clone()], Some(0), None).unwrap().title, "Editor");
        assert_eq!(choose_window(vec![other, meet], None, Some("edit")).unwrap().title, "Editor");
        assert!(choose_window(Vec::new(), None, None).is_err());
    }

    #[test]
    fn cli_parses_record_flags() {
        let cli = Cli::try_parse_from([
            "capture-agent",
            "record",
            "--fps",
            "10",
            "--region",
            "0,0,64,48",
            "--synthetic",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { fps, region, synthetic, .. } => {
                assert_eq!(fps, Some(10));
                assert!(region.is_some());
                assert!(synthetic);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
