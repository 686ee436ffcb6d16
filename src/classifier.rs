use tract_onnx::prelude::*;

use crate::encode::FeatureMatrix;
use crate::error::{ArtifactKind, PipelineError};

/// Returns one buffer per model output, in graph order.
pub trait Classifier: Send + Sync {
    fn run(&self, features: &FeatureMatrix) -> Result<Vec<Vec<f32>>, PipelineError>;
}

pub fn flatten_heads(buffers: Vec<Vec<f32>>, expected: usize) -> Result<Vec<f32>, PipelineError> {
    let flat: Vec<f32> = buffers.into_iter().flatten().collect();
    if flat.len() != expected {
        return Err(PipelineError::UnexpectedOutputShape {
            expected,
            actual: flat.len(),
        });
    }
    Ok(flat)
}

type Plan = TypedRunnableModel<TypedModel>;

pub struct OnnxClassifier {
    plan: Plan,
    width: usize,
}

impl OnnxClassifier {
    pub fn from_bytes(bytes: &[u8], width: usize, location: &str) -> Result<Self, PipelineError> {
        let plan = Self::build_plan(bytes, width)
            .map_err(|err| PipelineError::load_failure(ArtifactKind::Model, location, format!("{err:#}")))?;
        tracing::info!(location, width, "model plan ready");
        Ok(Self { plan, width })
    }

    fn build_plan(bytes: &[u8], width: usize) -> TractResult<Plan> {
        let mut reader = std::io::Cursor::new(bytes);
        tract_onnx::onnx()
            .model_for_read(&mut reader)?
            .with_input_fact(0, f32::fact([1, width]).into())?
            .into_optimized()?
            .into_runnable()
    }
}

impl Classifier for OnnxClassifier {
    fn run(&self, features: &FeatureMatrix) -> Result<Vec<Vec<f32>>, PipelineError> {
        if features.width() != self.width {
            return Err(PipelineError::invalid_feature(
                "feature vector",
                format!("model expects {} columns, got {}", self.width, features.width()),
            ));
        }

        let input: Tensor = features.array().clone().into();
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(PipelineError::model_execution)?;

        outputs
            .iter()
            .map(|value| {
                value
                    .to_array_view::<f32>()
                    .map(|view| view.iter().copied().collect())
                    .map_err(PipelineError::model_execution)
            })
            .collect()
    }
}
