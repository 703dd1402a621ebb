//! Spoof classifier engine: model lifecycle and real-vs-spoof scoring.
//!
//! The engine moves through `Unloaded → Loading → Loaded`. Loading happens
//! once per engine; every frame afterwards goes straight to the session.
//! A load request that arrives while another is in flight is rejected
//! immediately rather than queued, so the hot path never waits on a lock;
//! callers poll [`SpoofClassifier::is_loaded`] before relying on
//! [`SpoofClassifier::predict`].
//!
//! Session construction and inference both run on Tokio's blocking pool.

use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use thiserror::Error;

use crate::frame::PixelBuffer;
use crate::preprocess::{preprocess, FrameTensor};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Number of output values the classifier must produce.
pub const OUTPUT_CLASSES: usize = 2;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model not ready")]
    NotReady,
    #[error(transparent)]
    Inference(BoxError),
    #[error("unexpected classifier output: {len} values (expected 2)")]
    UnexpectedOutput { len: usize },
    #[error("classifier produced a non-finite logit")]
    NonFiniteLogit,
    #[error("invalid output layout: spoof index {spoof_index}, real index {real_index}")]
    InvalidLayout {
        spoof_index: usize,
        real_index: usize,
    },
    #[error("inference session lock poisoned")]
    SessionPoisoned,
    #[error("inference worker exited")]
    WorkerExited,
}

/// A loaded inference graph that maps one input tensor to raw output values.
pub trait SpoofSession: Send {
    fn run(&mut self, input: &FrameTensor) -> Result<Vec<f32>, BoxError>;
}

/// Builds a [`SpoofSession`] from a model location.
pub trait SessionLoader: Send + Sync {
    fn load(&self, location: &str) -> Result<Box<dyn SpoofSession>, BoxError>;
}

/// Lifecycle state of a [`SpoofClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
}

const UNLOADED: u8 = 0;
const LOADING: u8 = 1;
const LOADED: u8 = 2;

impl ModelState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            LOADING => ModelState::Loading,
            LOADED => ModelState::Loaded,
            _ => ModelState::Unloaded,
        }
    }
}

/// Which output index holds which class logit.
///
/// The ordering is a property of the deployed model export, not of the
/// engine. MiniFASNet exports usually put spoof at 0 and real at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    spoof_index: usize,
    real_index: usize,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            spoof_index: 0,
            real_index: 1,
        }
    }
}

impl OutputLayout {
    pub fn new(spoof_index: usize, real_index: usize) -> Result<Self, ClassifierError> {
        if spoof_index == real_index || spoof_index >= OUTPUT_CLASSES || real_index >= OUTPUT_CLASSES {
            return Err(ClassifierError::InvalidLayout {
                spoof_index,
                real_index,
            });
        }
        Ok(Self {
            spoof_index,
            real_index,
        })
    }

    pub fn spoof_index(&self) -> usize {
        self.spoof_index
    }

    pub fn real_index(&self) -> usize {
        self.real_index
    }

    /// Validate raw classifier output and convert it to P(real).
    pub fn decode(&self, output: &[f32]) -> Result<f32, ClassifierError> {
        if output.len() != OUTPUT_CLASSES {
            return Err(ClassifierError::UnexpectedOutput { len: output.len() });
        }
        let spoof = output[self.spoof_index];
        let real = output[self.real_index];
        if !spoof.is_finite() || !real.is_finite() {
            return Err(ClassifierError::NonFiniteLogit);
        }
        Ok(real_probability(spoof, real))
    }
}

/// Two-class softmax `exp(real) / (exp(real) + exp(spoof))`, evaluated as a
/// logistic of the logit difference so large logits cannot overflow.
pub fn real_probability(spoof_logit: f32, real_logit: f32) -> f32 {
    let diff = f64::from(real_logit) - f64::from(spoof_logit);
    let p = if diff >= 0.0 {
        1.0 / (1.0 + (-diff).exp())
    } else {
        let e = diff.exp();
        e / (1.0 + e)
    };
    p as f32
}

/// Result of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LivenessScore {
    /// P(real) in [0, 1].
    pub probability: f32,
    /// Wall-clock time spent producing the score, in milliseconds.
    pub latency_ms: f64,
}

type SharedSession = Arc<Mutex<Box<dyn SpoofSession>>>;

/// Lifecycle state and session, shared between the engine and the blocking
/// task that performs a load.
struct ModelSlot {
    state: AtomicU8,
    session: OnceLock<SharedSession>,
}

impl ModelSlot {
    /// Leave `Loading` with the loader's outcome. Runs on the blocking task,
    /// so the transition happens even if the caller stopped waiting.
    fn complete(&self, location: &str, outcome: Result<Box<dyn SpoofSession>, BoxError>) -> bool {
        match outcome {
            Ok(session) => {
                // Only the task that won the Unloaded → Loading exchange gets here.
                let _ = self.session.set(Arc::new(Mutex::new(session)));
                self.state.store(LOADED, Ordering::Release);
                tracing::info!(location, "spoof model loaded");
                true
            }
            Err(e) => {
                self.state.store(UNLOADED, Ordering::Release);
                tracing::warn!(location, error = %e, "failed to load spoof model");
                false
            }
        }
    }
}

/// Liveness classifier owning at most one inference session.
pub struct SpoofClassifier {
    loader: Arc<dyn SessionLoader>,
    layout: OutputLayout,
    slot: Arc<ModelSlot>,
}

impl SpoofClassifier {
    pub fn new(loader: Arc<dyn SessionLoader>, layout: OutputLayout) -> Self {
        Self {
            loader,
            layout,
            slot: Arc::new(ModelSlot {
                state: AtomicU8::new(UNLOADED),
                session: OnceLock::new(),
            }),
        }
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    pub fn state(&self) -> ModelState {
        ModelState::from_raw(self.slot.state.load(Ordering::Acquire))
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ModelState::Loaded
    }

    /// Load the model from `location`.
    ///
    /// Returns `true` once a session exists (immediately if one already
    /// does). Returns `false` if another load is in flight or if loading
    /// fails; failures are logged and leave the engine `Unloaded`.
    ///
    /// Dropping the returned future does not cancel the load: the blocking
    /// task still finishes and moves the engine to `Loaded` or `Unloaded`.
    pub async fn load_model(&self, location: &str) -> bool {
        if let Err(current) = self.slot.state.compare_exchange(
            UNLOADED,
            LOADING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match ModelState::from_raw(current) {
                ModelState::Loaded => true,
                _ => {
                    tracing::debug!(location, "model load already in progress");
                    false
                }
            };
        }

        tracing::info!(location, "loading spoof model");

        let loader = Arc::clone(&self.loader);
        let slot = Arc::clone(&self.slot);
        let owned_location = location.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| loader.load(&owned_location)))
                .unwrap_or_else(|_| Err("model loader panicked".into()));
            slot.complete(&owned_location, outcome)
        })
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(location, error = %e, "spoof model loader did not complete");
            false
        })
    }

    /// Score a preprocessed tensor. Latency covers inference and decoding.
    pub async fn predict(&self, tensor: FrameTensor) -> Result<LivenessScore, ClassifierError> {
        let session = self.ready_session()?;
        self.score(session, tensor, Instant::now()).await
    }

    /// Preprocess and score a frame. Latency also covers preprocessing.
    pub async fn predict_frame(&self, frame: &PixelBuffer) -> Result<LivenessScore, ClassifierError> {
        let session = self.ready_session()?;
        let start = Instant::now();
        let tensor = preprocess(frame);
        self.score(session, tensor, start).await
    }

    fn ready_session(&self) -> Result<SharedSession, ClassifierError> {
        if !self.is_loaded() {
            return Err(ClassifierError::NotReady);
        }
        self.slot
            .session
            .get()
            .cloned()
            .ok_or(ClassifierError::NotReady)
    }

    async fn score(
        &self,
        session: SharedSession,
        tensor: FrameTensor,
        start: Instant,
    ) -> Result<LivenessScore, ClassifierError> {
        let output = tokio::task::spawn_blocking(move || {
            let mut session = session.lock().map_err(|_| ClassifierError::SessionPoisoned)?;
            session.run(&tensor).map_err(ClassifierError::Inference)
        })
        .await
        .map_err(|_| ClassifierError::WorkerExited)??;

        let probability = self.layout.decode(&output)?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        tracing::debug!(probability, latency_ms, "liveness scored");

        Ok(LivenessScore {
            probability,
            latency_ms,
        })
    }
}
