use anyhow::Result;
use clap::{Parser, Subcommand};
use minesweep_core::{MAX_SCALE, SkinManager};
use std::path::PathBuf;

mod config;
mod play;

use config::{FileConfig, Settings};
use play::Console;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// TOML file with skins, output and custom levels
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the `.bmp` skin sheets
    #[arg(long)]
    skins_dir: Option<PathBuf>,

    /// Skin name, or its index in the `skins` listing
    #[arg(long)]
    skin: Option<String>,

    /// Preset or configured level for new games
    #[arg(short, long, conflicts_with_all = ["rows", "cols", "mines"])]
    level: Option<String>,

    #[arg(long)]
    rows: Option<usize>,

    #[arg(long)]
    cols: Option<usize>,

    #[arg(long)]
    mines: Option<usize>,

    /// Pixel multiplier for the board image
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SCALE)))]
    scale: Option<u32>,

    /// Force a seed instead of random
    #[arg(short, long)]
    seed: Option<u64>,

    /// Where board images are written
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// List the skins found in the skin directory
    Skins,
    /// Play interactively from standard input
    #[default]
    Play,
}

fn settings(args: &Args) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let mut settings = Settings::from(file);

    if let Some(dir) = &args.skins_dir {
        settings.skins_dir = dir.clone();
    }
    if let Some(skin) = &args.skin {
        settings.skin = Some(skin.clone());
    }
    if let Some(scale) = args.scale {
        settings.scale = scale;
    }
    if let Some(dir) = &args.output_dir {
        settings.output_dir = dir.clone();
    }
    settings.seed = args.seed;

    if let Some(name) = &args.level {
        settings.spec = settings
            .level(name)
            .ok_or_else(|| anyhow::anyhow!("unknown level {name:?}"))?;
    } else if let Some(spec) = play::custom_spec(args.rows, args.cols, args.mines)? {
        settings.spec = spec;
    }
    Ok(settings)
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .init();

    let settings = settings(&args)?;
    log::debug!("settings: {:?}", settings);

    let mut skins = SkinManager::new(&settings.skins_dir);
    skins.scan();

    match args.command.unwrap_or_default() {
        Command::Skins => {
            if skins.names().is_empty() {
                println!("no skins in {}", skins.skins_dir().display());
            }
            for (index, name) in skins.names().iter().enumerate() {
                println!("{index:>3}  {name}");
            }
        }
        Command::Play => {
            let stdin = std::io::stdin();
            Console::new(settings, skins, std::io::stdout()).run(stdin.lock())?;
        }
    }
    Ok(())
}
