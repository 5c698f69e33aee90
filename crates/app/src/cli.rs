use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smartcalc")]
#[command(about = "Read a simple arithmetic expression from a photo and compute it", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir / config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the final screen as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recognize one picked image file
    Pick {
        #[arg(required = true)]
        image: PathBuf,
    },

    /// Watch the capture folder and compute every new frame until Ctrl-C
    Watch {
        /// Overrides `capture_dir` from the config
        #[arg(long)]
        capture_dir: Option<PathBuf>,
    },

    /// Normalize and evaluate text directly, without OCR
    Eval {
        #[arg(required = true)]
        text: String,
    },

    /// Use the configured input mode (an image is required in filesystem mode)
    Run { image: Option<PathBuf> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["smartcalc", "pick", "shot.png", "--json", "-v"]).unwrap();
        assert!(cli.json && cli.verbose);
        assert!(matches!(cli.command, Commands::Pick { image } if image == PathBuf::from("shot.png")));
    }

    #[test]
    fn pick_requires_image() {
        assert!(Cli::try_parse_from(["smartcalc", "pick"]).is_err());
    }

    #[test]
    fn run_image_is_optional() {
        let cli = Cli::try_parse_from(["smartcalc", "--config", "c.toml", "run"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Commands::Run { image: None }));
    }
}
