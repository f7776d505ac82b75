use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubewatch")]
#[command(about = "Resolve the video, title and duration shown on a watch page", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write a daily rolling log file into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one detection pass against a watch page
    Detect {
        /// Page URL
        url: String,
        /// Read the page HTML from this file instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,
        /// Print the extraction request body instead of the detected message
        #[arg(long)]
        extraction: bool,
    },
    /// Follow navigation read from stdin, one URL per line
    ///
    /// A line holding a JSON message such as {"type":"GET_CURRENT_VIDEO"} is
    /// answered instead. Every change is printed as a JSON line.
    Watch,
    /// Show the config path and effective settings
    Config {
        /// Write the effective settings to the config path
        #[arg(long)]
        init: bool,
    },
}
