use tract_onnx::prelude::tract_ndarray::{Array1, Array2, Axis};

use crate::error::PipelineError;
use crate::models::{AssessmentAnswers, CategoryValue, DemographicRecord, ScalerParameters};
use crate::schema::{FeatureSchema, Screener};

pub const EPSILON: f64 = 1e-8;

static UNSET: CategoryValue = CategoryValue::Unset;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix(Array2<f32>);

impl FeatureMatrix {
    pub fn from_row(row: Vec<f32>) -> Self {
        Self(Array1::from(row).insert_axis(Axis(0)))
    }

    pub fn width(&self) -> usize {
        self.0.ncols()
    }

    pub fn array(&self) -> &Array2<f32> {
        &self.0
    }

    #[cfg(test)]
    pub fn to_vec(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }
}

/// Unknown or unset values give an all-zero block.
pub fn one_hot(value: &CategoryValue, vocabulary: &[&str]) -> Vec<f32> {
    let mut block = vec![0.0; vocabulary.len()];
    let position = match value {
        CategoryValue::Text(text) => vocabulary.iter().position(|entry| *entry == text),
        CategoryValue::Flag(_) | CategoryValue::Unset => None,
    };

    match position {
        Some(index) => block[index] = 1.0,
        None => tracing::warn!(%value, ?vocabulary, "category not in vocabulary, encoding as all zeros"),
    }

    block
}

pub fn standardize(raw: &[f64], scaler: &ScalerParameters) -> Result<Vec<f64>, PipelineError> {
    if raw.len() != scaler.mean.len() || raw.len() != scaler.std.len() {
        return Err(PipelineError::invalid_feature(
            "numerical block",
            format!(
                "{} values but scaler has {} means and {} stds",
                raw.len(),
                scaler.mean.len(),
                scaler.std.len()
            ),
        ));
    }

    raw.iter()
        .zip(scaler.mean.iter().zip(&scaler.std))
        .enumerate()
        .map(|(index, (value, (mean, std)))| {
            if !value.is_finite() {
                return Err(PipelineError::invalid_feature(
                    format!("position {index}"),
                    "value is not a number",
                ));
            }
            Ok((value - mean) / (std + EPSILON))
        })
        .collect()
}

pub fn screener_answers(screener: Screener, answers: &[Option<f64>]) -> Result<Vec<f64>, PipelineError> {
    let expected = screener.question_count();
    if answers.len() > expected {
        return Err(PipelineError::invalid_feature(
            screener.prefix(),
            format!("expected {expected} answers, got {}", answers.len()),
        ));
    }

    let max = f64::from(screener.max_answer());
    (0..expected)
        .map(|index| {
            let slot = format!("{}_{}", screener.prefix(), index + 1);
            match answers.get(index).copied().flatten() {
                None => Err(PipelineError::invalid_feature(slot, "answer is missing")),
                Some(value) if !value.is_finite() || value.fract() != 0.0 => {
                    Err(PipelineError::invalid_feature(slot, format!("{value} is not a whole number")))
                }
                Some(value) if !(0.0..=max).contains(&value) => Err(PipelineError::invalid_feature(
                    slot,
                    format!("{value} is outside 0..={max}"),
                )),
                Some(value) => Ok(value),
            }
        })
        .collect()
}

pub fn answers_for(answers: &AssessmentAnswers, screener: Screener) -> &[Option<f64>] {
    match screener {
        Screener::Gad7 => &answers.anxiety,
        Screener::Pss10 => &answers.stress,
        Screener::Phq9 => &answers.depression,
    }
}

pub fn numerical_features(
    schema: &FeatureSchema,
    answers: &AssessmentAnswers,
) -> Result<Vec<f64>, PipelineError> {
    let mut raw = Vec::with_capacity(schema.numerical_len());
    for screener in schema.screeners {
        raw.extend(screener_answers(*screener, answers_for(answers, *screener))?);
    }
    Ok(raw)
}

pub fn categorical_features(schema: &FeatureSchema, demographics: &DemographicRecord) -> Vec<f32> {
    let mut encoded = Vec::with_capacity(schema.categorical_width());
    for block in schema.categorical {
        let value = match block.attribute {
            "age" => &demographics.age,
            "gender" => &demographics.gender,
            "academic_year" => &demographics.academic_year,
            "cgpa" => &demographics.cgpa,
            "scholarship" => &demographics.scholarship,
            _ => &UNSET,
        };
        encoded.extend(one_hot(value, block.vocabulary));
    }
    encoded
}

pub fn assemble(
    schema: &FeatureSchema,
    demographics: &DemographicRecord,
    answers: &AssessmentAnswers,
    scaler: &ScalerParameters,
) -> Result<FeatureMatrix, PipelineError> {
    let raw = numerical_features(schema, answers)?;
    let standardized = standardize(&raw, scaler)?;

    let mut row: Vec<f32> = standardized.into_iter().map(|v| v as f32).collect();
    row.extend(categorical_features(schema, demographics));

    Ok(FeatureMatrix::from_row(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CANONICAL, GENDERS};

    fn identity_scaler(len: usize) -> ScalerParameters {
        ScalerParameters {
            mean: vec![0.0; len],
            std: vec![1.0; len],
            feature_names: None,
            version: None,
        }
    }

    fn scenario_b() -> (DemographicRecord, AssessmentAnswers) {
        let demographics = DemographicRecord {
            age: CategoryValue::text("23-26"),
            gender: CategoryValue::text("Female"),
            academic_year: CategoryValue::text("Fourth Year or Equivalent"),
            cgpa: CategoryValue::text("3.40 - 3.79"),
            scholarship: CategoryValue::text("Yes"),
        };
        let answers = AssessmentAnswers {
            depression: vec![Some(1.0); 9],
            anxiety: vec![Some(1.0); 7],
            stress: [1.0, 2.0, 2.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0, 1.0]
                .into_iter()
                .map(Some)
                .collect(),
        };
        (demographics, answers)
    }

    #[test]
    fn one_hot_marks_matching_position() {
        let block = one_hot(&CategoryValue::text("Male"), GENDERS);
        assert_eq!(block, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn one_hot_unknown_is_all_zero() {
        assert_eq!(one_hot(&CategoryValue::text("Other"), GENDERS), vec![0.0; 3]);
        assert_eq!(one_hot(&CategoryValue::text("male"), GENDERS), vec![0.0; 3]);
        assert_eq!(one_hot(&CategoryValue::Unset, GENDERS), vec![0.0; 3]);
    }

    #[test]
    fn one_hot_is_type_sensitive() {
        assert_eq!(one_hot(&CategoryValue::Flag(true), &["Yes", "No"]), vec![0.0, 0.0]);
    }

    #[test]
    fn standardize_applies_mean_and_std() {
        let scaler = ScalerParameters {
            mean: vec![1.0, 2.0, 3.0],
            std: vec![2.0, 0.5, 0.0],
            feature_names: None,
            version: None,
        };
        let out = standardize(&[3.0, 2.0, 3.0], &scaler).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
        // zero variance stays finite
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn standardize_rejects_length_mismatch() {
        let err = standardize(&[1.0, 2.0], &identity_scaler(3)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFeatureInput { .. }));
    }

    #[test]
    fn standardize_rejects_nan() {
        let err = standardize(&[1.0, f64::NAN], &identity_scaler(2)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFeatureInput { .. }));
    }

    #[test]
    fn missing_answer_is_invalid_input() {
        let (demographics, mut answers) = scenario_b();
        answers.depression.pop();
        let err = assemble(&CANONICAL, &demographics, &answers, &identity_scaler(26)).unwrap_err();
        match err {
            PipelineError::InvalidFeatureInput { feature, .. } => assert_eq!(feature, "PHQ9_9"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_answer_is_invalid_input() {
        let (demographics, mut answers) = scenario_b();
        answers.anxiety[2] = None;
        let err = assemble(&CANONICAL, &demographics, &answers, &identity_scaler(26)).unwrap_err();
        assert!(err.to_string().contains("GAD7_3"));
    }

    #[test]
    fn out_of_scale_answer_is_invalid_input() {
        assert!(screener_answers(Screener::Phq9, &[Some(4.0); 9]).is_err());
        assert!(screener_answers(Screener::Pss10, &[Some(4.0); 10]).is_ok());
        assert!(screener_answers(Screener::Gad7, &[Some(1.5); 7]).is_err());
        assert!(screener_answers(Screener::Gad7, &[Some(1.0); 8]).is_err());
    }

    #[test]
    fn assembled_row_puts_numbers_first() {
        let (demographics, answers) = scenario_b();
        let matrix = assemble(&CANONICAL, &demographics, &answers, &identity_scaler(26)).unwrap();
        assert_eq!(matrix.width(), 47);

        let row = matrix.to_vec();
        // GAD-7 leads, then PSS-10
        assert_eq!(&row[..7], &[1.0f32; 7]);
        assert_eq!(&row[7..17], &[1.0f32, 2.0, 2.0, 1.0, 3.0, 3.0, 3.0, 3.0, 1.0, 1.0]);

        let categorical = &row[26..];
        assert_eq!(categorical.iter().sum::<f32>(), 5.0);
        assert_eq!(categorical[1], 1.0); // age 23-26
        assert_eq!(categorical[5], 1.0); // Female
        assert_eq!(categorical[9], 1.0); // Fourth Year
        assert_eq!(categorical[15], 1.0); // 3.40 - 3.79
        assert_eq!(categorical[20], 1.0); // scholarship Yes
    }

    #[test]
    fn unknown_gender_zeroes_its_block_only() {
        let (mut demographics, answers) = scenario_b();
        demographics.gender = CategoryValue::text("Nonbinary");
        let matrix = assemble(&CANONICAL, &demographics, &answers, &identity_scaler(26)).unwrap();
        let row = matrix.to_vec();
        assert_eq!(row.len(), CANONICAL.width());
        assert_eq!(&row[31..34], &[0.0f32; 3]);
        assert_eq!(row[26..].iter().sum::<f32>(), 4.0);
    }
}
