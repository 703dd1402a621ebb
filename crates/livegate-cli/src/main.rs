use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod check;
mod config;
mod setup;
mod status;
mod trust;

use config::Config;

/// Livegate: face liveness and device trust checks.
#[derive(Parser)]
#[command(name = "livegate", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download and verify the anti-spoofing model
    Setup {
        /// Target directory (default: LIVEGATE_MODEL_DIR or the per-user data dir)
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Model download URL (default: LIVEGATE_MODEL_URL)
        #[arg(long)]
        url: Option<String>,
        /// Expected SHA-256 of the model (default: LIVEGATE_MODEL_SHA256)
        #[arg(long)]
        sha256: Option<String>,
    },
    /// Score an image for liveness
    Check {
        /// Image file containing the face
        image: PathBuf,
        /// Landmark JSON used to crop the face before scoring
        #[arg(long)]
        landmarks: Option<PathBuf>,
        /// Margin around the landmark box, as a fraction of its size
        #[arg(long, default_value_t = 0.2)]
        margin: f32,
        /// Model file (default: LIVEGATE_MODEL_PATH or the model directory)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate device trust from a JSON signals snapshot
    Trust {
        /// Signals file; reads stdin when omitted or `-`
        signals: Option<PathBuf>,
        /// TOML penalty table (default: LIVEGATE_TRUST_POLICY)
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Show configuration and model readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Setup {
            model_dir,
            url,
            sha256,
        } => {
            let dir = model_dir.unwrap_or_else(|| config.model_dir.clone());
            let Some(url) = url.or_else(|| config.model_url.clone()) else {
                bail!("no model URL: pass --url or set LIVEGATE_MODEL_URL");
            };
            let source = setup::ModelSource {
                url,
                sha256: sha256.or_else(|| config.model_sha256.clone()),
            };
            tokio::task::spawn_blocking(move || setup::run(&dir, &source)).await??;
        }
        Command::Check {
            image,
            landmarks,
            margin,
            model,
            json,
        } => {
            let args = check::CheckArgs {
                image,
                landmarks,
                margin,
                model,
                json,
            };
            check::run(&config, args).await?;
        }
        Command::Trust { signals, policy } => trust::run(&config, signals, policy)?,
        Command::Status => status::run(&config).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_defaults() {
        let cli = Cli::try_parse_from(["livegate", "check", "face.png"]).unwrap();
        match cli.command {
            Command::Check {
                image,
                landmarks,
                margin,
                json,
                ..
            } => {
                assert_eq!(image, PathBuf::from("face.png"));
                assert!(landmarks.is_none());
                assert!((margin - 0.2).abs() < f32::EPSILON);
                assert!(!json);
            }
            _ => panic!("expected check"),
        }
    }
}
