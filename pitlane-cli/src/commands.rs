use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use pitlane_capture::{PacketSource, SourceError, SyntheticSource};
use pitlane_config::PitlaneConfig;
use pitlane_core::buffers::PlaybackCursor;
use pitlane_core::events::{Category, DriverSelection};
use pitlane_engine::{LiveView, Recorder, RecorderSettings, SourceFactory, StopReport, UdpJsonFactory};
use pitlane_storage::cleanup_malformed;
use pitlane_telemetry::LogFormat;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "pitlane", version, about = "Race telemetry recorder")]
pub struct Cli {
    /// Configuration file. Without it, config/pitlane.yaml and PITLANE_* variables are used.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Log output: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record live telemetry, one JSON encoded event per UDP datagram
    Record(RecordArgs),
    /// Record a generated session and print the live rolling window
    Simulate(SimulateArgs),
    /// Remove malformed driver folders from an existing session directory
    Cleanup(CleanupArgs),
}

/// Overrides on top of the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Recorded categories, comma separated (e.g. lap,carTelemetry)
    #[arg(long, value_delimiter = ',')]
    pub categories: Option<Vec<Category>>,
    /// Driver slots to record, comma separated. Player car only when omitted.
    #[arg(long, value_delimiter = ',')]
    pub drivers: Option<Vec<u8>>,
    /// Root directory for session folders
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Sample rate in Hz
    #[arg(long)]
    pub rate: Option<u32>,
    /// Print prometheus metrics after stopping
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    #[arg(long, default_value_t = 10)]
    pub track: i8,
    #[arg(long, default_value_t = 0)]
    pub player: u8,
    /// Stop after this many ticks (unbounded when omitted)
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Generate as fast as possible instead of at the sample rate
    #[arg(long)]
    pub fast: bool,
    /// Live channel to print: carTelemetry or motion
    #[arg(long, default_value = "carTelemetry")]
    pub channel: Category,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Session directory (Track_<id>_<timestamp>)
    pub dir: PathBuf,
}

impl PipelineArgs {
    fn apply(&self, mut settings: RecorderSettings) -> RecorderSettings {
        if self.categories.is_some() || self.drivers.is_some() {
            let selection = match &self.drivers {
                Some(drivers) => DriverSelection::from_indexes(Some(drivers.iter().copied())),
                None => settings
                    .subscriptions
                    .values()
                    .next()
                    .cloned()
                    .unwrap_or(DriverSelection::PlayerOnly),
            };
            let categories: Vec<Category> = match &self.categories {
                Some(categories) => categories.clone(),
                None => settings.categories().collect(),
            };
            settings.subscriptions = categories
                .into_iter()
                .map(|c| (c, selection.clone()))
                .collect();
        }
        if let Some(rate) = self.rate {
            settings.sample_rate_hz = rate;
        }
        if let Some(output) = &self.output {
            settings = settings.with_output_dir(output);
        }
        settings
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PitlaneConfig> {
    match path {
        Some(path) => PitlaneConfig::load_from_path(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => PitlaneConfig::load().context("failed to load configuration"),
    }
}

/// Rolling-window printer for the simulate command.
struct LiveTicker {
    channel: Category,
    cursor: PlaybackCursor,
}

impl LiveTicker {
    fn print(&mut self, recorder: &Recorder) -> anyhow::Result<()> {
        let Some((window, rows)) = recorder.rolling_window(self.channel, &mut self.cursor)? else {
            return Ok(());
        };
        let columns = LiveView::columns(self.channel).unwrap_or(&[]);
        let latest = rows
            .last()
            .map(|row| {
                columns
                    .iter()
                    .zip(&row.values)
                    .map(|(name, value)| format!("{name}={value:.1}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        println!(
            "[{:>8.2}s .. {:>8.2}s] {:>4} rows  {latest}",
            window.start,
            window.end,
            rows.len()
        );
        Ok(())
    }
}

enum Ended {
    Interrupted,
    SourceFailed(SourceError),
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Cleanup(args) => cleanup(&args.dir),
        Commands::Record(args) => {
            let config = load_config(cli.config.as_deref())?;
            let mut settings = args.pipeline.apply(RecorderSettings::from_config(&config)?);
            if let Some(address) = args.address {
                settings.address = address;
            }
            if let Some(port) = args.port {
                settings.port = port;
            }
            let refresh = Duration::from_millis(config.live.refresh_ms);
            let recorder = build_recorder(UdpJsonFactory, settings)?;
            let (report, ended) = run_until_stopped(recorder, None, refresh).await?;
            finish(report, ended, args.pipeline.metrics, false)
        }
        Commands::Simulate(args) => {
            let config = load_config(cli.config.as_deref())?;
            let settings = args.pipeline.apply(RecorderSettings::from_config(&config)?);
            if LiveView::columns(args.channel).is_none() {
                return Err(anyhow!("{} has no live channel", args.channel));
            }

            let SimulateArgs {
                seed,
                track,
                player,
                ticks,
                fast,
                ..
            } = args;
            let factory = move |s: &RecorderSettings| -> Result<Box<dyn PacketSource>, SourceError> {
                let mut source = SyntheticSource::new(seed, s.sample_rate_hz, track).with_player(player);
                if let Some(ticks) = ticks {
                    source = source.with_tick_limit(ticks);
                }
                if fast {
                    source = source.unpaced();
                }
                Ok(Box::new(source))
            };

            let ticker = LiveTicker {
                channel: args.channel,
                cursor: PlaybackCursor::new(config.live.playback_step_secs, config.live.window_secs),
            };
            let refresh = Duration::from_millis(config.live.refresh_ms);
            let recorder = build_recorder(factory, settings)?;
            let (report, ended) = run_until_stopped(recorder, Some(ticker), refresh).await?;
            finish(report, ended, args.pipeline.metrics, true)
        }
    }
}

fn build_recorder(
    factory: impl SourceFactory + 'static,
    settings: RecorderSettings,
) -> anyhow::Result<Recorder> {
    let mut recorder = Recorder::new(factory)?;
    recorder.configure(settings)?;
    Ok(recorder)
}

/// Runs until Ctrl-C or a fatal source error, then stops the recorder.
async fn run_until_stopped(
    mut recorder: Recorder,
    mut ticker: Option<LiveTicker>,
    refresh: Duration,
) -> anyhow::Result<((StopReport, String), Ended)> {
    recorder.start()?;
    let fatal = recorder.fatal_signal();
    info!("Recording, press Ctrl-C to stop");

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut refresh = tokio::time::interval(refresh);

    let ended = loop {
        tokio::select! {
            result = &mut interrupt => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Interrupt received, stopping");
                break Ended::Interrupted;
            }
            _ = refresh.tick() => {
                if let Ok(err) = fatal.try_recv() {
                    break Ended::SourceFailed(err);
                }
                if let Some(ticker) = ticker.as_mut() {
                    ticker.print(&recorder)?;
                }
            }
        }
    };

    let (report, metrics) = tokio::task::spawn_blocking(move || {
        let report = recorder.stop();
        let metrics = recorder.metrics().gather_metrics().unwrap_or_else(|e| {
            warn!("Failed to gather metrics: {e}");
            String::new()
        });
        (report, metrics)
    })
    .await
    .context("stop task failed")?;
    Ok(((report, metrics), ended))
}

fn finish(
    (report, metrics): (StopReport, String),
    ended: Ended,
    print_metrics: bool,
    source_end_is_expected: bool,
) -> anyhow::Result<()> {
    println!("Stopped: {report}");
    for path in &report.removed {
        println!("  removed {}", path.display());
    }
    if print_metrics {
        print!("{metrics}");
    }

    match ended {
        Ended::Interrupted => Ok(()),
        Ended::SourceFailed(err) if source_end_is_expected => {
            info!("Source finished: {err}");
            Ok(())
        }
        Ended::SourceFailed(err) => {
            error!("Recording ended by source failure: {err}");
            Err(anyhow!(err).context("upstream source failed"))
        }
    }
}

fn cleanup(dir: &Path) -> anyhow::Result<()> {
    let removed = cleanup_malformed(dir).with_context(|| format!("failed to clean {}", dir.display()))?;
    if removed.is_empty() {
        println!("No malformed driver folders in {}", dir.display());
    }
    for path in removed {
        println!("removed {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_overrides() {
        let cli = Cli::try_parse_from([
            "pitlane",
            "--log-format",
            "json",
            "record",
            "--categories",
            "lap,carTelemetry",
            "--drivers",
            "0,3",
            "--port",
            "20778",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Record(args) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.port, Some(20778));

        let settings = args.pipeline.apply(RecorderSettings::default());
        assert_eq!(
            settings.categories().collect::<Vec<_>>(),
            vec![Category::Lap, Category::CarTelemetry]
        );
        assert_eq!(
            settings.subscriptions[&Category::Lap],
            DriverSelection::from_indexes(Some([0u8, 3]))
        );
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(Cli::try_parse_from(["pitlane", "record", "--categories", "tyres"]).is_err());
    }

    #[test]
    fn empty_overrides_keep_settings() {
        let settings = PipelineArgs::default().apply(RecorderSettings::default());
        assert_eq!(settings, RecorderSettings::default());
    }
}
