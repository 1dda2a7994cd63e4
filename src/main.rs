use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use sepscribe::app::{TranscribeOptions, run_serve, run_transcribe};
use sepscribe::cli::{Cli, Commands, ConfigAction, ModelsAction};
use sepscribe::client::{read_config_json, submit};
use sepscribe::config::Config;
use sepscribe::logging::init_tracing;
use sepscribe::models::catalog::{get_model, list_models, model_names};
use sepscribe::models::download::{download_model, format_model_info};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(config.logging.json, cli.verbose, cli.quiet);

    match cli.command {
        Commands::Serve { host, port } => {
            run_serve(config, host, port).await?;
        }
        Commands::Transcribe {
            file,
            language,
            model,
            no_separation,
            diarize,
            sample_rate,
            compact,
        } => {
            let options = TranscribeOptions {
                language,
                model,
                no_separation,
                diarize,
                sample_rate,
            };
            let result = run_transcribe(config, file, options).await?;
            let json = if compact {
                serde_json::to_string(&result)?
            } else {
                serde_json::to_string_pretty(&result)?
            };
            println!("{}", json);
        }
        Commands::Submit {
            file,
            config_json,
            url,
            timeout,
        } => {
            handle_submit(&file, config_json.as_deref(), &url, timeout, cli.quiet).await?;
        }
        Commands::Models { action } => {
            handle_models_command(action, &config, cli.quiet).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, &config, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "sepscribe",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/sepscribe/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied last.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .map_err(|e| e.context(format!("Failed to load config from {}", path.display())))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

async fn handle_submit(
    file: &Path,
    config_json: Option<&Path>,
    url: &str,
    timeout: Option<std::time::Duration>,
    quiet: bool,
) -> Result<()> {
    let config = config_json.map(read_config_json).transpose()?;

    if !quiet {
        eprintln!("Uploading {}...", file.display());
    }
    let response = submit(url, file, config, timeout).await?;

    let status = format!("Status: {}", response.status);
    if response.is_success() {
        eprintln!("{}", status.green());
    } else {
        eprintln!("{}", status.red());
    }
    println!("{}", response.pretty_body());

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Handle model management commands.
async fn handle_models_command(action: ModelsAction, config: &Config, quiet: bool) -> Result<()> {
    let dir = config.stt.models_dir();
    match action {
        ModelsAction::List => {
            println!("Models ({}):", dir.display());
            for model in list_models() {
                println!("  {}", format_model_info(&dir, model));
            }
        }
        ModelsAction::Install { name, sha1 } => {
            if get_model(&name).is_none() {
                eprintln!("{}", format!("Unknown model: '{name}'").red());
                eprintln!("Available: {}", model_names());
                std::process::exit(1);
            }
            let path = download_model(&dir, &name, sha1.as_deref(), !quiet).await?;
            println!("Model '{}' installed", name.green());
            println!("Location: {}", path.display());
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    config: &Config,
    custom_path: Option<&Path>,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
