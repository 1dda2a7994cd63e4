//! Command-line interface for sepscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Speech transcription with vocal separation
#[derive(Parser, Debug)]
#[command(
    name = "sepscribe",
    version,
    about = "Speech transcription with vocal separation and long-form chunking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: sepscribe debug logs, -vv: debug logs everywhere)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout into a `Duration`.
///
/// Bare numbers are seconds; anything else goes through `humantime`
/// (`90s`, `10m`, `1h30m`).
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP transcription service
    Serve {
        /// Bind address (default: server.host from config)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port (default: server.port from config)
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Transcribe a local file in-process and print the JSON result
    Transcribe {
        /// Audio file (any format ffmpeg can read)
        file: PathBuf,

        /// Language hint (e.g., en, de). Default: auto-detect
        #[arg(long, short = 'l', value_name = "LANG")]
        language: Option<String>,

        /// Whisper model size (e.g., tiny, base, small)
        #[arg(long, short = 'm', value_name = "MODEL")]
        model: Option<String>,

        /// Skip vocal separation
        #[arg(long)]
        no_separation: bool,

        /// Request diarization (placeholder output)
        #[arg(long)]
        diarize: bool,

        /// Target sample rate for normalization
        #[arg(long, value_name = "HZ")]
        sample_rate: Option<u32>,

        /// Print single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Upload a file to a running service
    Submit {
        /// Audio file to upload
        file: PathBuf,

        /// JSON file with job options (language_hint, enable_separation, ...)
        #[arg(long, value_name = "PATH")]
        config_json: Option<PathBuf>,

        /// Service endpoint
        #[arg(long, value_name = "URL", default_value = crate::client::DEFAULT_URL)]
        url: String,

        /// Request timeout (e.g., 600, 90s, 10m) [default: 10m]
        #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
        timeout: Option<Duration>,
    },

    /// Manage Whisper models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Model management actions
#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List catalog models and whether they are installed
    List,
    /// Download and install a model
    Install {
        /// Model name (e.g., tiny, base.en, large)
        name: String,

        /// Expected SHA-1 of the model file
        #[arg(long, value_name = "HEX")]
        sha1: Option<String>,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment) as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
