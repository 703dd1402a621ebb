//! `livegate trust` — evaluate device trust signals captured from a client.

use anyhow::{Context, Result};
use livegate_core::{DeviceTrustEvaluator, EnvironmentSignals, TrustMetrics, TrustPolicy};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Read signals JSON from `source`, or from stdin when it is absent or `-`.
fn read_signals(source: Option<&Path>) -> Result<EnvironmentSignals> {
    let contents = match source {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read signals from stdin")?;
            buf
        }
    };
    parse_signals(&contents)
}

fn parse_signals(contents: &str) -> Result<EnvironmentSignals> {
    serde_json::from_str(contents).context("invalid environment signals JSON")
}

fn evaluate(signals: &EnvironmentSignals, policy: TrustPolicy) -> TrustMetrics {
    DeviceTrustEvaluator::new(policy).evaluate(signals)
}

pub fn run(config: &Config, signals: Option<PathBuf>, policy: Option<PathBuf>) -> Result<()> {
    let policy = config.trust_policy(policy.as_ref())?;
    let signals = read_signals(signals.as_deref())?;
    let metrics = evaluate(&signals, policy);

    if !metrics.risk_factors.is_empty() {
        tracing::info!(
            trust_score = metrics.trust_score,
            risk_factors = ?metrics.risk_factors,
            "device trust risk factors present"
        );
    }

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_client_signals() {
        let signals = parse_signals(
            r#"{
                "userAgent": "Mozilla/5.0 (X11; Linux x86_64) HeadlessChrome/120.0.0.0",
                "platform": "Linux x86_64",
                "webdriver": true,
                "languages": [],
                "screen": {"width": 800, "height": 600},
                "viewport": {"width": 800, "height": 600}
            }"#,
        )
        .unwrap();
        let metrics = evaluate(&signals, TrustPolicy::default());
        assert_eq!(metrics.trust_score, 0);
        assert!(metrics.is_bot && metrics.is_headless);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(parse_signals("{\"userAgent\": 5}").is_err());
    }

    #[test]
    fn test_reads_signals_file() {
        let path = std::env::temp_dir().join(format!(
            "livegate-trust-test-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, r#"{"screen": {"width": 1920, "height": 1080}}"#).unwrap();

        let signals = read_signals(Some(path.as_path())).unwrap();
        assert_eq!(signals.screen.width, 1920);
        // Viewport missing: zero-sized, so the screen check fails.
        assert_eq!(evaluate(&signals, TrustPolicy::default()).trust_score, 70);

        let _ = std::fs::remove_file(&path);
    }
}
