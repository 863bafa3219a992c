use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "subkeeper")]
#[command(author, version, about = "Subtitle acquisition and track normalization")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, extract, strip and normalize subtitles for every video under a directory
    Run {
        /// Directory (or single video) to process
        #[arg(required = true)]
        root: PathBuf,

        /// Show what would be done without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Do not contact OpenSubtitles
        #[arg(long)]
        no_download: bool,

        /// Leave embedded subtitle tracks alone
        #[arg(long)]
        no_extract: bool,

        /// Ask this configured arr to import the directory afterwards
        #[arg(long, value_name = "ARR")]
        import: Option<String>,
    },

    /// List the subtitle tracks of a container and what would happen to them
    Tracks {
        /// Container to inspect
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Print the OpenSubtitles fingerprint of a video
    Hash {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Rename 3-letter language codes of subtitle files to 2-letter codes
    Normalize {
        /// Directory containing the .srt files
        #[arg(required = true)]
        dir: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
