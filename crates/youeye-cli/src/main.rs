use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use youeye_core::PointOfView;
use youeye_tracker::{EyeTracker, StartOutcome, TrackerConfig, TrackerSettings, TrackingBackend};

mod replay;
mod subscriber;
mod synthetic;

use replay::ReplayBackend;
use subscriber::LoggingSubscriber;
use synthetic::SyntheticBackend;

#[derive(Parser)]
#[command(name = "youeye", about = "YouEye eye tracking driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded JSON-lines anchor stream
    Replay {
        /// Recording file
        path: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Drive the tracker with a generated face orbit
    Synthetic {
        /// Number of frames to generate
        #[arg(long, default_value_t = 120)]
        frames: usize,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the effective tracker configuration as TOML
    Config {
        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML file with tracker configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Point of view: left_eye, right_eye or eye_average
    #[arg(long)]
    pov: Option<PointOfView>,
    /// Attach debug markers to the face model
    #[arg(long)]
    markers: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => TrackerConfig::default(),
        };
        if let Some(pov) = self.pov {
            config.point_of_view = Some(pov);
        }
        config.show_tracking_visualization |= self.markers;
        Ok(config)
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    overrides: ConfigArgs,
    /// Delay between frames in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_interval_ms: u64,
    /// Number of recent depth samples to smooth over
    #[arg(long, default_value_t = 10)]
    window: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { path, run } => {
            let events = replay::load_recording(&path)?;
            tracing::info!(path = %path.display(), events = events.len(), "recording loaded");
            let backend = ReplayBackend::new(events, Duration::from_millis(run.frame_interval_ms));
            drive(backend, &run).await?;
        }
        Commands::Synthetic { frames, run } => {
            let backend = SyntheticBackend::new(frames, Duration::from_millis(run.frame_interval_ms));
            drive(backend, &run).await?;
        }
        Commands::Config { overrides } => {
            let config = overrides.resolve()?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

async fn drive(backend: impl TrackingBackend + 'static, run: &RunArgs) -> Result<()> {
    let config = run.overrides.resolve()?;
    let mut tracker = EyeTracker::with_settings(backend, TrackerSettings::from_env());
    tracker.configure(config);

    let subscriber = Arc::new(LoggingSubscriber::new(run.window));
    tracker.subscribe(&subscriber);

    run_to_completion(&mut tracker).await?;

    println!(
        "done: {} positions, {} interruptions, smoothed depth {:+.4}",
        subscriber.moved_count(),
        subscriber.interrupted_count(),
        subscriber.smoothed_depth()
    );
    if let Some(pov) = config.point_of_view {
        let p = tracker.model().eye_projection_position(pov);
        println!("last {pov} projection: ({:+.4}, {:+.4}, {:+.4})", p.x, p.y, p.z);
    }
    Ok(())
}

/// Start `tracker`, pump its events until the session runs dry, then stop.
async fn run_to_completion(tracker: &mut EyeTracker) -> Result<()> {
    if tracker.start() == StartOutcome::Unsupported {
        bail!("face tracking is not supported by this backend");
    }
    let mut handled = 0usize;
    while let Some(event) = tracker.next_event().await {
        tracker.handle_event(event);
        handled += 1;
    }
    tracing::info!(handled, "session finished");
    tracker.stop();
    Ok(())
}
