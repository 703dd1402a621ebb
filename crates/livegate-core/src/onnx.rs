//! ONNX Runtime backend for the spoof classifier.

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use crate::classifier::{BoxError, SessionLoader, SpoofSession};
use crate::preprocess::FrameTensor;

/// Builds ONNX Runtime sessions from model files on disk.
///
/// Sessions are committed with full graph optimization; the intra-op thread
/// count defaults to one so inference does not compete with frame capture.
#[derive(Debug, Clone)]
pub struct OrtSessionLoader {
    intra_threads: usize,
}

impl Default for OrtSessionLoader {
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

impl OrtSessionLoader {
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }
}

impl SessionLoader for OrtSessionLoader {
    fn load(&self, location: &str) -> Result<Box<dyn SpoofSession>, BoxError> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?
            .commit_from_file(location)?;

        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or("model defines no outputs")?;

        tracing::debug!(
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            output = %output_name,
            threads = self.intra_threads,
            "ONNX session created"
        );

        Ok(Box::new(OrtSpoofSession {
            session,
            output_name,
        }))
    }
}

/// A committed ONNX Runtime session for a two-logit anti-spoofing model.
pub struct OrtSpoofSession {
    session: Session,
    output_name: String,
}

impl SpoofSession for OrtSpoofSession {
    fn run(&mut self, input: &FrameTensor) -> Result<Vec<f32>, BoxError> {
        let value = Tensor::from_array(input.view().to_owned())?;
        let outputs = self.session.run(ort::inputs![value])?;
        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| format!("output '{}' missing from results", self.output_name))?;
        let (_, data) = output.try_extract_tensor::<f32>()?;
        Ok(data.to_vec())
    }
}
