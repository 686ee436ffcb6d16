use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::classifier::{flatten_heads, Classifier};
use crate::decode;
use crate::encode;
use crate::error::{ArtifactKind, PipelineError};
use crate::loader::{self, ArtifactConfig};
use crate::models::{AssessmentInput, PredictionResult, ScalerParameters};
use crate::schema::FeatureSchema;

pub struct InferenceContext {
    schema: FeatureSchema,
    scaler: OnceCell<ScalerParameters>,
    classifier: OnceCell<Arc<dyn Classifier>>,
}

impl InferenceContext {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            scaler: OnceCell::new(),
            classifier: OnceCell::new(),
        }
    }

    pub fn from_parts(
        schema: FeatureSchema,
        scaler: ScalerParameters,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            schema,
            scaler: OnceCell::new_with(Some(scaler)),
            classifier: OnceCell::new_with(Some(classifier)),
        }
    }

    // a failed load leaves its cell empty, so calling again retries
    pub async fn load(&self, config: &ArtifactConfig) -> Result<(), PipelineError> {
        if self.is_ready() {
            tracing::debug!("artifacts already loaded");
            return Ok(());
        }

        let schema = self.schema;
        let scaler = self.scaler.get_or_try_init(move || async move {
            loader::load_scaler(&config.scaler, &schema, config.timeout).await
        });
        let classifier = self.classifier.get_or_try_init(move || async move {
            let model = loader::load_model(&config.model, &schema, config.timeout).await?;
            Ok::<Arc<dyn Classifier>, PipelineError>(Arc::new(model))
        });

        let result = tokio::try_join!(scaler, classifier);
        if let Err(err) = &result {
            tracing::error!(error = %err, "artifact load failed");
        }
        result.map(|_| ())
    }

    pub fn is_ready(&self) -> bool {
        self.scaler.initialized() && self.classifier.initialized()
    }

    pub fn scaler(&self) -> Result<&ScalerParameters, PipelineError> {
        self.scaler.get().ok_or(PipelineError::ConfigNotReady {
            artifact: ArtifactKind::Scaler,
        })
    }

    pub fn classifier(&self) -> Result<&dyn Classifier, PipelineError> {
        self.classifier
            .get()
            .map(|classifier| classifier.as_ref())
            .ok_or(PipelineError::ConfigNotReady {
                artifact: ArtifactKind::Model,
            })
    }

    pub fn predict(&self, input: &AssessmentInput) -> Result<PredictionResult, PipelineError> {
        let classifier = self.classifier()?;
        let scaler = self.scaler()?;

        let features = encode::assemble(&self.schema, &input.demographics, &input.answers, scaler)?;
        let buffers = classifier.run(&features)?;
        let output = flatten_heads(buffers, self.schema.output_len())?;
        let result = decode::decode(&self.schema, &output)?;

        tracing::debug!(
            depression = %result.depression.label,
            anxiety = %result.anxiety.label,
            stress = %result.stress.label,
            "assessment scored"
        );
        Ok(result)
    }
}
