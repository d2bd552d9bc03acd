//! Activity Sensor Agent CLI
//!
//! Continuous activity recognition from a 3-axis accelerometer.

use activity_sensor_agent::{
    collector::{replay::parse_csv, ReplaySource, SampleSource, SimulatedSource},
    config::{Config, OutputFormat},
    core::{extract, load_classifier, Label, ModelKind, Window, FEATURE_NAMES},
    pipeline::{Pipeline, Shutdown, StdoutReporter},
    VERSION,
};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "activity-sensor")]
#[command(version = VERSION)]
#[command(about = "Continuous activity recognition from a 3-axis accelerometer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start sampling and classifying
    Start(StartArgs),

    /// Compute the feature vector of a recorded window
    Features {
        /// Window file: CSV rows of x,y,z or JSON {"x":[..],"y":[..],"z":[..]}
        path: PathBuf,

        /// Print as JSON instead of a table
        #[arg(long, conflicts_with = "feature")]
        json: bool,

        /// Print only this feature's value
        #[arg(long)]
        feature: Option<String>,
    },

    /// Show the label id mapping
    Labels,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args)]
struct StartArgs {
    /// Model type (mlp, svm, knn or rf)
    #[arg(long)]
    model: Option<ModelKind>,

    /// Directory holding scaler.json and the model artifacts
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Sampling rate in Hz
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Samples per window
    #[arg(long)]
    window_length: Option<usize>,

    /// Inference poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Maximum concurrently running inference tasks
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Prediction output format (text or json)
    #[arg(long)]
    output: Option<OutputFormat>,

    /// Generate synthetic motion for an activity instead of reading hardware
    #[arg(long, conflicts_with = "replay")]
    simulate: Option<Label>,

    /// Replay a CSV recording of x,y,z rows
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the recording when it ends
    #[arg(long, requires = "replay")]
    loop_replay: bool,
}

impl StartArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(model) = self.model {
            config.model_kind = model;
        }
        if let Some(ref dir) = self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate_hz = rate;
        }
        if let Some(length) = self.window_length {
            config.window_length = length;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_in_flight {
            config.max_in_flight = max;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        config
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start(args) => cmd_start(args),
        Commands::Features {
            path,
            json,
            feature,
        } => cmd_features(&path, json, feature.as_deref()),
        Commands::Labels => {
            cmd_labels();
            Ok(())
        }
        Commands::Config { save } => cmd_config(save),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only predictions.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(args: StartArgs) -> anyhow::Result<()> {
    let file_config = Config::load()
        .with_context(|| format!("Failed to load {}", Config::config_path().display()))?;
    let config = args.apply(file_config);
    config.validate()?;

    eprintln!("Activity Sensor Agent v{VERSION}");
    eprintln!("  Model: {} ({})", config.model_kind, config.models_dir.display());
    eprintln!(
        "  Sampling: {} Hz, {} samples per window ({:.2}s)",
        config.sample_rate_hz,
        config.window_length,
        config.window_span().as_secs_f64()
    );
    eprintln!(
        "  Inference: every {}ms, up to {} in flight",
        config.poll_interval.as_millis(),
        config.max_in_flight
    );
    eprintln!();

    // Artifacts must load before any loop starts.
    let classifier = load_classifier(&config.models_dir, config.model_kind)
        .context("Failed to load model artifacts")?;

    let source: Box<dyn SampleSource> = match (args.simulate, &args.replay) {
        (Some(activity), _) => {
            let source = SimulatedSource::new(activity, config.sample_rate_hz);
            tracing::info!(activity = %source.activity(), "Using simulated accelerometer");
            Box::new(source)
        }
        (None, Some(path)) => {
            let source = ReplaySource::open(path, args.loop_replay)
                .with_context(|| format!("Failed to open recording {}", path.display()))?;
            if source.is_empty() {
                bail!("Recording {} holds no samples", path.display());
            }
            tracing::info!(
                samples = source.len(),
                looped = args.loop_replay,
                "Replaying {}",
                path.display()
            );
            Box::new(source)
        }
        (None, None) => bail!(
            "No sample source selected. Use --simulate <activity> or --replay <file>; \
             hardware drivers plug in through the SampleSource trait."
        ),
    };

    eprintln!("Press Ctrl+C to stop");
    eprintln!();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let shutdown = Shutdown::new();
    ctrlc_handler(shutdown.clone())?;

    let reporter = Arc::new(StdoutReporter::new(config.output));
    let pipeline = Pipeline::new(config, source, classifier, reporter);
    let stats = pipeline.stats();

    let result = runtime.block_on(pipeline.run(shutdown));

    eprintln!();
    eprintln!("{}", stats.summary());

    result?;
    Ok(())
}

fn cmd_features(path: &Path, json: bool, feature: Option<&str>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let window = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str::<Window>(&content).context("Invalid window JSON")?
    } else {
        Window::from_samples(&parse_csv(&content)?)
    };

    let features = extract(&window);
    if let Some(name) = feature {
        let value = features.get(name).with_context(|| {
            format!("Unknown feature {name:?}; known: {}", FEATURE_NAMES.join(", "))
        })?;
        println!("{value}");
    } else if json {
        println!("{}", serde_json::to_string_pretty(&features)?);
    } else {
        println!("{} samples per axis", window.len());
        let width = FEATURE_NAMES.iter().map(|n| n.len()).max().unwrap_or(0);
        for (name, value) in features.iter() {
            println!("  {name:<width$}  {value:.6}");
        }
    }
    Ok(())
}

fn cmd_labels() {
    println!("Label ids");
    println!("=========");
    for label in Label::ALL {
        println!("  {} -> {}", label.id(), label);
    }
}

fn cmd_config(save: bool) -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save()?;
        println!();
        println!("Saved.");
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(shutdown: Shutdown) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, stopping");
        shutdown.trigger();
    })
    .context("Error setting Ctrl+C handler")
}
