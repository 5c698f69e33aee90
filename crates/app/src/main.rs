use anyhow::Context;
use clap::Parser;
use smartcalc_core::{AppConfig, InputMode};
use smartcalc_ocr::{CalculatorPipeline, CaptureFolder, FilePicker, ImageSource};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Calculator;

fn project_dirs() -> anyhow::Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "smartcalc", "SmartCalc")
        .context("Failed to get app directory")
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => project_dirs()?.config_dir().join("config.toml"),
    };
    tracing::debug!("Loading config from {}", path.display());
    Ok(AppConfig::load(&path)?.apply_env()?)
}

fn capture_dir(config: &AppConfig, overridden: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match overridden.or_else(|| config.capture_dir.clone()) {
        Some(dir) => Ok(dir),
        None => Ok(project_dirs()?.data_dir().join("captures")),
    }
}

/// How a dispatched command ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Done { errors: usize },
    Interrupted,
}

async fn dispatch<W: Write>(cli: Cli, out: W) -> anyhow::Result<Outcome> {
    // `eval` never touches the OCR engine, so it must not depend on its config.
    if let Commands::Eval { text } = &cli.command {
        let mut calculator = Calculator::new(out, cli.json);
        calculator.eval_text(text)?;
        return Ok(Outcome::Done { errors: calculator.errors() });
    }

    let config = load_config(cli.config.as_deref())?;

    let mut source = match cli.command {
        Commands::Eval { .. } => unreachable!("handled above"),
        Commands::Pick { image } => ImageSource::Picker(FilePicker::new([image])),
        Commands::Watch { capture_dir: dir } => {
            ImageSource::Camera(CaptureFolder::open(&capture_dir(&config, dir)?)?)
        }
        Commands::Run { image } => match (config.input_mode, image) {
            (InputMode::Filesystem, Some(image)) => ImageSource::Picker(FilePicker::new([image])),
            (InputMode::Filesystem, None) => {
                anyhow::bail!("input mode is 'filesystem': pass an image to `run`")
            }
            (InputMode::Camera, image) => {
                if image.is_some() {
                    tracing::warn!("Ignoring image argument in camera mode");
                }
                ImageSource::Camera(CaptureFolder::open(&capture_dir(&config, None)?)?)
            }
        },
    };

    let recognizer = smartcalc_ocr::from_config(&config.ocr)?;
    let pipeline = CalculatorPipeline::new(recognizer).with_preprocess(config.preprocess.clone());

    tracing::info!("Input mode: {}", source.mode());
    let mut calculator =
        Calculator::new(out, cli.json).skip_repeats(source.mode() == InputMode::Camera);

    // No cancellation token: an interrupted recognition is simply dropped.
    tokio::select! {
        res = calculator.run_source(&pipeline, &mut source) => res?,
        _ = tokio::signal::ctrl_c() => return Ok(Outcome::Interrupted),
    }

    Ok(Outcome::Done { errors: calculator.errors() })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli, std::io::stdout()).await? {
        Outcome::Done { errors: 0 } => Ok(()),
        Outcome::Done { .. } => std::process::exit(1),
        // Exit now rather than let the runtime wait on an in-flight OCR call.
        Outcome::Interrupted => {
            tracing::info!("Interrupted");
            std::process::exit(130)
        }
    }
}
