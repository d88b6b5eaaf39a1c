//! FocusCrush CLI Application

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use focuscrush_app::render::{render_file, DEFAULT_BLOCK_SIZE};
use focuscrush_core::domain::{ChainConfig, ChainOptions, ConfigManager, ParamId, PARAMETERS};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "focuscrush")]
#[command(about = "Filter, lo-fi and saturation chain for offline rendering", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List parameters with their ranges and defaults
    Params {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process a WAV file through the chain
    Render {
        /// Input WAV file (mono or stereo)
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (32-bit float)
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration file (defaults to the user config)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override a parameter, e.g. `--set bitDepth=8`
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        overrides: Vec<(ParamId, f32)>,

        /// Samples per processing block
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,

        /// Legacy behaviour: shared lo-fi state, saturation not applied
        #[arg(long)]
        reference: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (defaults to the user config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_assignment(s: &str) -> Result<(ParamId, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let id = ParamId::from_name(name.trim()).ok_or_else(|| {
        let known: Vec<_> = ParamId::ALL.iter().map(|id| id.name()).collect();
        format!("unknown parameter '{}', expected one of {}", name, known.join(", "))
    })?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {}: {}", id.name(), e))?;
    Ok((id, value))
}

fn print_parameters(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&PARAMETERS)?);
        return Ok(());
    }

    println!("{:<20} {:>8} {:>8} {:>8}  unit", "name", "min", "max", "default");
    for descriptor in PARAMETERS.iter() {
        println!(
            "{:<20} {:>8} {:>8} {:>8}  {}",
            descriptor.name,
            descriptor.min,
            descriptor.max,
            descriptor.default,
            descriptor.unit.symbol()
        );
    }
    Ok(())
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<ChainConfig> {
    if let Some(path) = path {
        return ChainConfig::load_from_file(&path)
            .await
            .with_context(|| format!("loading config {}", path.display()));
    }

    match ConfigManager::default_config_dir() {
        Ok(dir) => Ok(ConfigManager::new(dir).load().await),
        Err(e) => {
            tracing::warn!(error = %e, "No config directory, using defaults");
            Ok(ChainConfig::default())
        }
    }
}

async fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => ConfigManager::new(ConfigManager::default_config_dir()?)
            .config_path()
            .to_path_buf(),
    };

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    ChainConfig::default()
        .save_to_file(&path)
        .await
        .with_context(|| format!("writing config {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Params { json } => print_parameters(json),

        Command::Render {
            input,
            output,
            config,
            overrides,
            block_size,
            reference,
        } => {
            let mut config = load_config(config).await?;
            if reference {
                config.options = ChainOptions::reference();
            }
            for (id, value) in overrides {
                config.parameters.set(id, value);
            }

            tracing::info!("🎛️ FocusCrush rendering {}", input.display());

            let stats = tokio::task::spawn_blocking(move || {
                render_file(&input, &output, config, block_size)
                    .with_context(|| format!("rendering {}", input.display()))
            })
            .await??;

            println!(
                "Rendered {} frames ({} -> {} channels) at {} Hz, peak {:.3}",
                stats.frames,
                stats.input_channels,
                stats.output_channels,
                stats.sample_rate,
                stats.peak
            );
            Ok(())
        }

        Command::InitConfig { path, force } => init_config(path, force).await,
    }
}
