use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::classifier::OnnxClassifier;
use crate::error::{ArtifactKind, PipelineError};
use crate::models::ScalerParameters;
use crate::schema::FeatureSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    Path(PathBuf),
    Url(String),
}

impl FromStr for ArtifactSource {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.starts_with("http://") || value.starts_with("https://") {
            Ok(ArtifactSource::Url(value.to_string()))
        } else {
            Ok(ArtifactSource::Path(PathBuf::from(value)))
        }
    }
}

impl std::fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactSource::Path(path) => write!(f, "{}", path.display()),
            ArtifactSource::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub model: ArtifactSource,
    pub scaler: ArtifactSource,
    pub timeout: Duration,
}

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

async fn read_source(source: &ArtifactSource) -> Result<Vec<u8>, String> {
    match source {
        ArtifactSource::Path(path) => tokio::fs::read(path).await.map_err(|err| err.to_string()),
        ArtifactSource::Url(url) => {
            let response = reqwest::get(url).await.map_err(|err| err.to_string())?;
            let response = response.error_for_status().map_err(|err| err.to_string())?;
            let body = response.bytes().await.map_err(|err| err.to_string())?;
            Ok(body.to_vec())
        }
    }
}

pub async fn fetch(
    kind: ArtifactKind,
    source: &ArtifactSource,
    timeout: Duration,
) -> Result<Vec<u8>, PipelineError> {
    let location = source.to_string();
    tracing::debug!(%kind, %location, "fetching artifact");

    match tokio::time::timeout(timeout, read_source(source)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(reason)) => Err(PipelineError::load_failure(kind, location, reason)),
        Err(_) => Err(PipelineError::load_failure(
            kind,
            location,
            format!("timed out after {timeout:?}"),
        )),
    }
}

pub fn parse_scaler(
    bytes: &[u8],
    schema: &FeatureSchema,
    location: &str,
) -> Result<ScalerParameters, PipelineError> {
    let fail = |reason: String| PipelineError::load_failure(ArtifactKind::Scaler, location, reason);

    let scaler: ScalerParameters =
        serde_json::from_slice(bytes).map_err(|err| fail(format!("invalid JSON: {err}")))?;

    let expected = schema.numerical_len();
    if scaler.mean.len() != expected || scaler.std.len() != expected {
        return Err(fail(format!(
            "expected {expected} means and stds, got {} and {}",
            scaler.mean.len(),
            scaler.std.len()
        )));
    }

    if let Some(index) = scaler
        .mean
        .iter()
        .chain(&scaler.std)
        .position(|value| !value.is_finite())
    {
        return Err(fail(format!("non-finite value at position {index}")));
    }

    if let Some(index) = scaler.std.iter().position(|value| *value < 0.0) {
        return Err(fail(format!("negative std at position {index}")));
    }

    if let Some(names) = &scaler.feature_names {
        let canonical = schema.numerical_names();
        if *names != canonical {
            return Err(fail(format!(
                "feature order {names:?} does not match {canonical:?}"
            )));
        }
    }

    Ok(scaler)
}

pub async fn load_scaler(
    source: &ArtifactSource,
    schema: &FeatureSchema,
    timeout: Duration,
) -> Result<ScalerParameters, PipelineError> {
    let bytes = fetch(ArtifactKind::Scaler, source, timeout).await?;
    let scaler = parse_scaler(&bytes, schema, &source.to_string())?;
    tracing::info!(
        location = %source,
        version = scaler.version.as_deref().unwrap_or("unversioned"),
        "scaler parameters loaded"
    );
    Ok(scaler)
}

pub async fn load_model(
    source: &ArtifactSource,
    schema: &FeatureSchema,
    timeout: Duration,
) -> Result<OnnxClassifier, PipelineError> {
    let bytes = fetch(ArtifactKind::Model, source, timeout).await?;
    let width = schema.width();
    let location = source.to_string();

    // graph optimisation is CPU-bound
    tokio::task::spawn_blocking(move || OnnxClassifier::from_bytes(&bytes, width, &location))
        .await
        .map_err(|err| PipelineError::load_failure(ArtifactKind::Model, source.to_string(), err))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CANONICAL;
    use std::io::Write;

    fn scaler_json(len: usize, names: Option<Vec<String>>) -> Vec<u8> {
        serde_json::to_vec(&ScalerParameters {
            mean: vec![1.5; len],
            std: vec![0.8; len],
            feature_names: names,
            version: Some("2024-11".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn sources_are_parsed_by_scheme() {
        assert_eq!(
            "https://cdn.example.org/scaler.json".parse::<ArtifactSource>().unwrap(),
            ArtifactSource::Url("https://cdn.example.org/scaler.json".to_string())
        );
        assert_eq!(
            "models/scaler.json".parse::<ArtifactSource>().unwrap(),
            ArtifactSource::Path(PathBuf::from("models/scaler.json"))
        );
    }

    #[test]
    fn scaler_with_matching_names_parses() {
        let bytes = scaler_json(26, Some(CANONICAL.numerical_names()));
        let scaler = parse_scaler(&bytes, &CANONICAL, "scaler.json").unwrap();
        assert_eq!(scaler.mean.len(), 26);
    }

    #[test]
    fn scaler_with_wrong_length_fails() {
        let err = parse_scaler(&scaler_json(25, None), &CANONICAL, "scaler.json").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::LoadFailure {
                artifact: ArtifactKind::Scaler,
                ..
            }
        ));
    }

    #[test]
    fn scaler_trained_in_other_order_fails() {
        let mut names = CANONICAL.numerical_names();
        names.rotate_left(9);
        let err = parse_scaler(&scaler_json(26, Some(names)), &CANONICAL, "scaler.json").unwrap_err();
        assert!(err.to_string().contains("feature order"));
    }

    #[test]
    fn negative_std_fails() {
        let mut scaler: ScalerParameters = serde_json::from_slice(&scaler_json(26, None)).unwrap();
        scaler.std[4] = -1e-8;
        let bytes = serde_json::to_vec(&scaler).unwrap();

        let err = parse_scaler(&bytes, &CANONICAL, "scaler.json").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::LoadFailure {
                artifact: ArtifactKind::Scaler,
                ..
            }
        ));
        assert!(err.to_string().contains("negative std at position 4"));
    }

    #[test]
    fn zero_std_is_accepted() {
        let mut scaler: ScalerParameters = serde_json::from_slice(&scaler_json(26, None)).unwrap();
        scaler.std[0] = 0.0;
        let bytes = serde_json::to_vec(&scaler).unwrap();
        assert!(parse_scaler(&bytes, &CANONICAL, "scaler.json").is_ok());
    }

    #[test]
    fn malformed_json_fails() {
        let err = parse_scaler(b"{\"mean\": [1, 2", &CANONICAL, "scaler.json").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn loads_scaler_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&scaler_json(26, None)).unwrap();
        let source = ArtifactSource::Path(file.path().to_path_buf());

        let scaler = load_scaler(&source, &CANONICAL, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(scaler.version.as_deref(), Some("2024-11"));
    }

    #[tokio::test]
    async fn missing_file_is_load_failure() {
        let source = ArtifactSource::Path(PathBuf::from("/nonexistent/scaler.json"));
        let err = load_scaler(&source, &CANONICAL, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::LoadFailure { .. }));
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        // accepts the connection in the kernel backlog but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let source = ArtifactSource::Url(format!("http://127.0.0.1:{port}/scaler.json"));

        let err = load_scaler(&source, &CANONICAL, Duration::from_millis(100))
            .await
            .unwrap_err();
        match err {
            PipelineError::LoadFailure {
                artifact, reason, ..
            } => {
                assert_eq!(artifact, ArtifactKind::Scaler);
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        drop(listener);
    }

    #[tokio::test]
    async fn garbage_model_is_load_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an onnx graph").unwrap();
        let source = ArtifactSource::Path(file.path().to_path_buf());

        let err = load_model(&source, &CANONICAL, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::LoadFailure {
                artifact: ArtifactKind::Model,
                ..
            }
        ));
    }
}
