use anyhow::{Context, Result};
use livegate_core::{OutputLayout, TrustPolicy};
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Directory holding the anti-spoofing model.
    pub model_dir: PathBuf,
    /// Explicit model path; overrides `model_dir`.
    pub model_path: Option<PathBuf>,
    /// Where `setup` downloads the model from.
    pub model_url: Option<String>,
    /// Expected SHA-256 of the model file.
    pub model_sha256: Option<String>,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
    /// Output index of the spoof logit.
    pub spoof_index: usize,
    /// Output index of the real logit.
    pub real_index: usize,
    /// Minimum P(real) for `check` to report a live face.
    pub liveness_threshold: f32,
    /// Timeout in seconds for a single prediction.
    pub predict_timeout_secs: u64,
    /// TOML file overriding the device trust penalty table.
    pub trust_policy_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `LIVEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("LIVEGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::setup::default_model_dir());

        Self {
            model_dir,
            model_path: env_path("LIVEGATE_MODEL_PATH"),
            model_url: env_string("LIVEGATE_MODEL_URL"),
            model_sha256: env_string("LIVEGATE_MODEL_SHA256"),
            intra_threads: env_usize("LIVEGATE_INTRA_THREADS", 1),
            spoof_index: env_usize("LIVEGATE_SPOOF_INDEX", 0),
            real_index: env_usize("LIVEGATE_REAL_INDEX", 1),
            liveness_threshold: env_f32("LIVEGATE_LIVENESS_THRESHOLD", 0.5),
            predict_timeout_secs: env_u64("LIVEGATE_PREDICT_TIMEOUT_SECS", 10),
            trust_policy_path: env_path("LIVEGATE_TRUST_POLICY"),
        }
    }

    /// Path to the anti-spoofing model.
    pub fn spoof_model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join(livegate_models::SPOOF_MODEL_NAME))
    }

    /// Logit ordering of the deployed model.
    pub fn output_layout(&self) -> Result<OutputLayout> {
        OutputLayout::new(self.spoof_index, self.real_index)
            .context("LIVEGATE_SPOOF_INDEX / LIVEGATE_REAL_INDEX")
    }

    /// Trust policy from `override_path`, else `LIVEGATE_TRUST_POLICY`, else defaults.
    pub fn trust_policy(&self, override_path: Option<&PathBuf>) -> Result<TrustPolicy> {
        let Some(path) = override_path.or(self.trust_policy_path.as_ref()) else {
            return Ok(TrustPolicy::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trust policy {}", path.display()))?;
        TrustPolicy::from_toml_str(&contents)
            .with_context(|| format!("failed to parse trust policy {}", path.display()))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            model_dir: PathBuf::from("/models"),
            model_path: None,
            model_url: None,
            model_sha256: None,
            intra_threads: 1,
            spoof_index: 0,
            real_index: 1,
            liveness_threshold: 0.5,
            predict_timeout_secs: 10,
            trust_policy_path: None,
        }
    }

    #[test]
    fn test_model_path_defaults_to_model_dir() {
        let config = base_config();
        assert_eq!(
            config.spoof_model_path(),
            PathBuf::from("/models").join(livegate_models::SPOOF_MODEL_NAME)
        );
    }

    #[test]
    fn test_explicit_model_path_wins() {
        let config = Config {
            model_path: Some(PathBuf::from("/opt/antispoof.onnx")),
            ..base_config()
        };
        assert_eq!(config.spoof_model_path(), PathBuf::from("/opt/antispoof.onnx"));
    }

    #[test]
    fn test_invalid_layout_is_rejected() {
        let config = Config {
            real_index: 0,
            ..base_config()
        };
        assert!(config.output_layout().is_err());
    }

    #[test]
    fn test_missing_env_uses_default() {
        assert_eq!(env_usize("LIVEGATE_TEST_UNSET_USIZE", 7), 7);
        assert_eq!(env_f32("LIVEGATE_TEST_UNSET_F32", 0.25), 0.25);
        assert!(env_string("LIVEGATE_TEST_UNSET_STRING").is_none());
    }

    #[test]
    fn test_default_trust_policy_without_file() {
        let policy = base_config().trust_policy(None).unwrap();
        assert_eq!(policy, TrustPolicy::default());
    }

    #[test]
    fn test_trust_policy_from_file() {
        let path = std::env::temp_dir().join(format!(
            "livegate-cli-test-policy-{}.toml",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, "headless_penalty = 50\n").unwrap();

        let policy = base_config().trust_policy(Some(&path)).unwrap();
        assert_eq!(policy.headless_penalty, 50);
        assert_eq!(policy.bot_penalty, 90);

        let _ = std::fs::remove_file(&path);
    }
}
