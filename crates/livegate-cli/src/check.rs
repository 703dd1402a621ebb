//! `livegate check` — score a single image for liveness.

use anyhow::{anyhow, bail, Context, Result};
use livegate_core::{FaceLandmarks, LivenessScore, OrtSessionLoader, PixelBuffer, SpoofClassifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

pub struct CheckArgs {
    pub image: PathBuf,
    pub landmarks: Option<PathBuf>,
    pub margin: f32,
    pub model: Option<PathBuf>,
    pub json: bool,
}

/// Decode an image file and optionally crop it to the face described by a
/// landmark JSON file.
pub fn load_frame(image: &Path, landmarks: Option<&Path>, margin: f32) -> Result<PixelBuffer> {
    let rgba = image::open(image)
        .with_context(|| format!("failed to decode {}", image.display()))?
        .to_rgba8();
    let frame = PixelBuffer::try_from(rgba)?;

    let Some(path) = landmarks else {
        return Ok(frame);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read landmarks {}", path.display()))?;
    let landmarks: FaceLandmarks = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse landmarks {}", path.display()))?;

    let region = landmarks
        .face_region(frame.width(), frame.height(), margin)
        .ok_or_else(|| anyhow!("landmarks do not cover any part of the frame"))?;
    tracing::debug!(?region, confidence = landmarks.confidence, "cropping to face region");

    Ok(frame.crop(&region)?)
}

pub async fn run(config: &Config, args: CheckArgs) -> Result<()> {
    let frame = load_frame(&args.image, args.landmarks.as_deref(), args.margin)?;

    let model_path = args.model.unwrap_or_else(|| config.spoof_model_path());
    livegate_models::verify_model(&model_path, config.model_sha256.as_deref())
        .context("model check failed (run `livegate setup`)")?;

    let engine = SpoofClassifier::new(
        Arc::new(OrtSessionLoader::new(config.intra_threads)),
        config.output_layout()?,
    );
    if !engine.load_model(&model_path.to_string_lossy()).await {
        bail!(
            "failed to load model {} (set RUST_LOG=livegate_core=debug for details)",
            model_path.display()
        );
    }

    let timeout = Duration::from_secs(config.predict_timeout_secs);
    let score = tokio::time::timeout(timeout, engine.predict_frame(&frame))
        .await
        .map_err(|_| anyhow!("prediction timed out after {}s", timeout.as_secs()))??;

    report(&score, config.liveness_threshold, args.json)
}

fn report(score: &LivenessScore, threshold: f32, json: bool) -> Result<()> {
    let live = score.probability >= threshold;
    if json {
        let out = serde_json::json!({
            "probability": score.probability,
            "latency_ms": score.latency_ms,
            "threshold": threshold,
            "live": live,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("P(real):   {:.4}", score.probability);
        println!("Latency:   {:.1} ms", score.latency_ms);
        println!(
            "Verdict:   {} (threshold {threshold:.2})",
            if live { "live" } else { "spoof" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "livegate-check-test-{}-{name}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn test_load_frame_crops_to_landmarks() {
        let image_path = temp_path("frame.png");
        image::RgbaImage::from_pixel(200, 100, image::Rgba([10, 20, 30, 255]))
            .save(&image_path)
            .unwrap();

        let landmarks_path = temp_path("landmarks.json");
        std::fs::write(
            &landmarks_path,
            r#"{"points":[{"x":0.25,"y":0.2},{"x":0.75,"y":0.8}],"confidence":1.0}"#,
        )
        .unwrap();

        let full = load_frame(&image_path, None, 0.0).unwrap();
        assert_eq!((full.width(), full.height()), (200, 100));

        let face = load_frame(&image_path, Some(landmarks_path.as_path()), 0.0).unwrap();
        assert_eq!((face.width(), face.height()), (100, 60));

        let _ = std::fs::remove_file(&image_path);
        let _ = std::fs::remove_file(&landmarks_path);
    }

    #[test]
    fn test_load_frame_rejects_missing_image() {
        assert!(load_frame(&temp_path("absent.png"), None, 0.0).is_err());
    }

    #[test]
    fn test_report_json() {
        let score = LivenessScore {
            probability: 0.9,
            latency_ms: 4.2,
        };
        report(&score, 0.5, true).unwrap();
        report(&score, 0.95, false).unwrap();
    }
}
