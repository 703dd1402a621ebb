//! Livegate liveness engine.
//!
//! Three independent pieces sit behind this crate:
//!
//! - [`preprocess`] turns a camera frame of any resolution into the fixed
//!   80×80 classifier input.
//! - [`classifier`] owns the anti-spoofing inference session and turns its
//!   two logits into P(real), with [`onnx`] as the ONNX Runtime backend.
//! - [`trust`] scores the client environment for automation and spoofing
//!   signals.
//!
//! Combining a liveness score and a trust score into an accept/reject
//! decision is left to the caller.

pub mod classifier;
pub mod frame;
pub mod onnx;
pub mod preprocess;
pub mod trust;

pub use classifier::{
    real_probability, ClassifierError, LivenessScore, ModelState, OutputLayout, SessionLoader,
    SpoofClassifier, SpoofSession,
};
pub use frame::{FaceLandmarks, FaceRegion, FrameError, PixelBuffer, Point3};
pub use onnx::OrtSessionLoader;
pub use preprocess::{preprocess, FrameTensor, INPUT_SIZE};
pub use trust::{
    evaluate_device_trust, DeviceTrustEvaluator, Dimensions, EnvironmentSignals, RiskFactor,
    TrustMetrics, TrustPolicy,
};
