//! Mouth - Piper text-to-speech from the command line
//!
//! Speaks the positional arguments, or stdin when there are none.

use anyhow::Result;
use clap::Parser;
use mouth::audio::CpalSink;
use mouth::config::{self, Config};
use mouth::error::MouthError;
use mouth::speaker::SpeakOutcome;
use mouth::tts::{PiperEngine, TtsEngine};
use mouth::{input, models, platform, provision::Provisioner};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text to speak (reads stdin when omitted)
    text: Vec<String>,

    /// Keep the synthesized WAV at this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only write the WAV, do not play it
    #[arg(long)]
    no_play: bool,

    /// Speak each line of stdin as it arrives
    #[arg(short, long)]
    interactive: bool,

    /// Voice model (.onnx)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Voice config (.json)
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Directory searched for voice files
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Output device to try after the default (repeatable)
    #[arg(long = "device")]
    devices: Vec<String>,

    /// Fallback sample rate (repeatable, replaces the configured list)
    #[arg(long = "rate")]
    rates: Vec<u32>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Fail instead of downloading a missing Piper binary
    #[arg(long)]
    skip_download: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        log_level.parse().unwrap_or(Level::INFO)
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Fold command-line overrides into the loaded config
fn apply_args(config: &mut Config, args: &Args) {
    if let Some(output) = &args.output {
        config.output_file = Some(output.to_string_lossy().to_string());
    }
    if args.no_play {
        config.play_audio = false;
        if config.output_file.is_none() {
            config.output_file = Some(config::DEFAULT_OUTPUT_FILE.to_string());
        }
    }
    if let Some(model) = &args.model {
        config.model = Some(model.to_string_lossy().to_string());
    }
    if let Some(cfg) = &args.config_file {
        config.model_config = Some(cfg.to_string_lossy().to_string());
    }
    if let Some(dir) = &args.models_dir {
        config.models_dir = dir.to_string_lossy().to_string();
    }
    config.playback.devices.extend(args.devices.iter().cloned());
    if !args.rates.is_empty() {
        config.playback.fallback_rates = args.rates.clone();
    }
}

fn list_devices(config: &Config) -> Result<()> {
    let devices = CpalSink::new(&config.playback).list_devices()?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for (i, device) in devices.iter().enumerate() {
        let marker = if device.is_default { "*" } else { " " };
        println!(
            "{} [{}] {} ({} ch, {} Hz)",
            marker, i, device.name, device.channels, device.default_sample_rate
        );
    }
    Ok(())
}

async fn build_engine(config: &Config, skip_download: bool) -> Result<PiperEngine, MouthError> {
    let provisioner = Provisioner::new(config);
    let binary = if skip_download {
        provisioner.locate()?
    } else {
        provisioner.ensure_binary().await?
    };

    let voice = models::resolve(
        config.model.as_deref().map(Path::new),
        config.model_config.as_deref().map(Path::new),
        Path::new(&config.models_dir),
    )?;

    Ok(PiperEngine::from_config(config, binary, voice))
}

fn report(outcome: &SpeakOutcome) {
    match outcome {
        SpeakOutcome::Skipped => info!("Input text is empty. Nothing to synthesize."),
        SpeakOutcome::Played(report) => info!(
            "✅ Done: played on {} after {} attempt(s)",
            report.target, report.attempts
        ),
        SpeakOutcome::Saved(path) => info!("✅ Success! Speech saved to {}", path.display()),
        SpeakOutcome::PlaybackFailed(_) => {
            warn!("🔇 Speech was synthesized but could not be played")
        }
    }
}

/// Speak stdin line by line; synthesis errors do not end the loop
async fn run_interactive(engine: &PiperEngine) -> Result<(), MouthError> {
    let stdin = std::io::stdin();
    let prompt = stdin.is_terminal();
    if prompt {
        eprintln!("Enter text to speak, one line at a time. Press Ctrl+D to finish.");
    }

    let mut lines = input::utterances(stdin.lock());
    loop {
        if prompt {
            eprint!("> ");
            let _ = std::io::stderr().flush();
        }
        let Some(line) = lines.next() else {
            break;
        };
        match engine.speak(&line?).await {
            Ok(outcome) => report(&outcome),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => error!("❌ {}", e),
        }
    }
    Ok(())
}

async fn run(args: Args, mut config: Config) -> Result<(), MouthError> {
    apply_args(&mut config, &args);
    let host = platform::detect_host();
    config.playback.tune_for(&host);
    config.validate()?;

    if args.list_devices {
        return list_devices(&config).map_err(MouthError::Other);
    }

    // Collect text before provisioning so blank input costs nothing
    let text = if args.interactive {
        None
    } else {
        let text = if args.text.is_empty() {
            if std::io::stdin().is_terminal() {
                eprintln!("Enter the text to convert to speech. Press Ctrl+D to finish.");
            }
            input::read_all(std::io::stdin().lock())?
        } else {
            input::from_args(&args.text)
        };
        match text {
            Some(text) => Some(text),
            None => {
                info!("Input was empty after stripping whitespace. Nothing to do.");
                return Ok(());
            }
        }
    };

    let engine = build_engine(&config, args.skip_download).await?;

    match text {
        Some(text) => {
            let outcome = engine.speak(&text).await?;
            report(&outcome);
            Ok(())
        }
        None => run_interactive(&engine).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", config::config_path().display(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(args.verbose, &config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("👄 Mouth v{} starting...", env!("CARGO_PKG_VERSION"));

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
