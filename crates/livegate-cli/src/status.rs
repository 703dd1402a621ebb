//! `livegate status` — report configuration and model readiness.

use anyhow::Result;
use livegate_core::{OrtSessionLoader, SpoofClassifier};
use std::sync::Arc;

use crate::config::Config;

pub async fn run(config: &Config) -> Result<()> {
    let model_path = config.spoof_model_path();

    println!("Model path:        {}", model_path.display());
    println!(
        "Model URL:         {}",
        config.model_url.as_deref().unwrap_or("(not configured)")
    );
    println!("Intra-op threads:  {}", config.intra_threads);
    println!(
        "Output layout:     spoof={} real={}",
        config.spoof_index, config.real_index
    );
    println!("Liveness threshold: {:.2}", config.liveness_threshold);
    println!("Predict timeout:   {}s", config.predict_timeout_secs);
    println!(
        "Trust policy:      {}",
        config
            .trust_policy_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    );
    println!();

    match livegate_models::verify_model(&model_path, config.model_sha256.as_deref()) {
        Ok(digest) => {
            let verified = if config.model_sha256.is_some() {
                "verified"
            } else {
                "unverified"
            };
            println!("Model file:        ok (sha256 {digest}, {verified})");
        }
        Err(e) => {
            println!("Model file:        {e}");
            return Ok(());
        }
    }

    let layout = match config.output_layout() {
        Ok(layout) => layout,
        Err(e) => {
            println!("Model load:        skipped ({e:#})");
            return Ok(());
        }
    };

    let engine = SpoofClassifier::new(Arc::new(OrtSessionLoader::new(config.intra_threads)), layout);
    let loaded = engine.load_model(&model_path.to_string_lossy()).await;
    println!(
        "Model load:        {}",
        if loaded { "ok" } else { "FAILED" }
    );

    Ok(())
}
