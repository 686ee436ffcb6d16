use crate::error::PipelineError;
use crate::models::{HeadPrediction, LabelProbability, PredictionResult};
use crate::schema::{Condition, FeatureSchema};

/// Divides a head by its sum. Negative logits are first shifted up so the smallest
/// is zero, which keeps their order. A zero or non-finite sum puts all mass on the
/// first label.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return fallback(values);
    }

    let floor = values.iter().copied().fold(0.0, f64::min);
    if floor == 0.0 {
        return values.iter().map(|v| v / sum).collect();
    }

    let shifted_sum: f64 = values.iter().map(|v| v - floor).sum();
    if shifted_sum == 0.0 || !shifted_sum.is_finite() {
        return fallback(values);
    }
    values.iter().map(|v| (v - floor) / shifted_sum).collect()
}

fn fallback(values: &[f64]) -> Vec<f64> {
    tracing::debug!(?values, "degenerate output head, falling back to first label");
    let mut fallback = vec![0.0; values.len()];
    if let Some(first) = fallback.first_mut() {
        *first = 1.0;
    }
    fallback
}

/// Index of the largest value; ties go to the leftmost.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

pub fn decode_head(labels: &[&str], values: &[f64]) -> HeadPrediction {
    let normalized = normalize(values);
    let best = argmax(&normalized);

    let probabilities: Vec<LabelProbability> = labels
        .iter()
        .zip(&normalized)
        .map(|(label, probability)| LabelProbability {
            label: (*label).to_string(),
            probability: *probability,
        })
        .collect();

    HeadPrediction {
        label: labels[best].to_string(),
        probability: normalized[best],
        probabilities,
    }
}

pub fn decode(schema: &FeatureSchema, output: &[f32]) -> Result<PredictionResult, PipelineError> {
    let expected = schema.output_len();
    if output.len() != expected {
        return Err(PipelineError::UnexpectedOutputShape {
            expected,
            actual: output.len(),
        });
    }

    let mut offset = 0;
    let mut stress = None;
    let mut anxiety = None;
    let mut depression = None;

    for head in schema.heads {
        let end = offset + head.labels.len();
        let values: Vec<f64> = output[offset..end].iter().map(|v| f64::from(*v)).collect();
        let prediction = decode_head(head.labels, &values);
        offset = end;

        match head.condition {
            Condition::Stress => stress = Some(prediction),
            Condition::Anxiety => anxiety = Some(prediction),
            Condition::Depression => depression = Some(prediction),
        }
    }

    match (stress, anxiety, depression) {
        (Some(stress), Some(anxiety), Some(depression)) => Ok(PredictionResult {
            depression,
            anxiety,
            stress,
        }),
        // a schema without all three heads cannot produce a full result
        _ => Err(PipelineError::UnexpectedOutputShape {
            expected,
            actual: output.len(),
        }),
    }
}
