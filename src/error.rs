#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{artifact} is not loaded yet")]
    ConfigNotReady { artifact: ArtifactKind },

    #[error("failed to load {artifact} from {location}: {reason}")]
    LoadFailure {
        artifact: ArtifactKind,
        location: String,
        reason: String,
    },

    #[error("missing or invalid numerical feature {feature}: {reason}")]
    InvalidFeatureInput { feature: String, reason: String },

    #[error("unexpected output length: expected {expected} values, got {actual}")]
    UnexpectedOutputShape { expected: usize, actual: usize },

    #[error("model execution failed: {reason}")]
    ModelExecution { reason: String },
}

impl PipelineError {
    pub(crate) fn invalid_feature(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFeatureInput {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model_execution(err: impl std::fmt::Display) -> Self {
        Self::ModelExecution {
            reason: err.to_string(),
        }
    }

    pub(crate) fn load_failure(
        artifact: ArtifactKind,
        location: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::LoadFailure {
            artifact,
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Scaler,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Scaler => write!(f, "scaler parameters"),
        }
    }
}
