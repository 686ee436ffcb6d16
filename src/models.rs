use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryValue {
    Flag(bool),
    Text(String),
    #[default]
    Unset,
}

impl CategoryValue {
    pub fn text(value: impl Into<String>) -> Self {
        CategoryValue::Text(value.into())
    }
}

impl std::fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryValue::Flag(flag) => write!(f, "{flag}"),
            CategoryValue::Text(text) => write!(f, "{text:?}"),
            CategoryValue::Unset => write!(f, "unset"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicRecord {
    #[serde(default)]
    pub age: CategoryValue,
    #[serde(default)]
    pub gender: CategoryValue,
    #[serde(default)]
    pub academic_year: CategoryValue,
    #[serde(default)]
    pub cgpa: CategoryValue,
    #[serde(default, deserialize_with = "scholarship_value")]
    pub scholarship: CategoryValue,
}

/// Forms send scholarship either as a checkbox or as the Yes/No label.
fn scholarship_value<'de, D>(deserializer: D) -> Result<CategoryValue, D::Error>
where
    D: Deserializer<'de>,
{
    let value = CategoryValue::deserialize(deserializer)?;
    Ok(match value {
        CategoryValue::Flag(true) => CategoryValue::text("Yes"),
        CategoryValue::Flag(false) => CategoryValue::text("No"),
        other => other,
    })
}

// `None` marks an unanswered question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentAnswers {
    #[serde(default, alias = "phq9")]
    pub depression: Vec<Option<f64>>,
    #[serde(default, alias = "gad7")]
    pub anxiety: Vec<Option<f64>>,
    #[serde(default, alias = "pss", alias = "pss10")]
    pub stress: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub demographics: DemographicRecord,
    pub answers: AssessmentAnswers,
}

/// Training-time normalisation statistics, paired 1:1 with a model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProbability {
    pub label: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadPrediction {
    pub label: String,
    pub probability: f64,
    pub probabilities: Vec<LabelProbability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub depression: HeadPrediction,
    pub anxiety: HeadPrediction,
    pub stress: HeadPrediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenerScores {
    pub phq9_total: u32,
    pub gad7_total: u32,
    pub pss10_total: u32,
}

#[derive(Debug, Clone)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub student_ref: String,
    pub taken_at: DateTime<Utc>,
    pub depression_label: String,
    pub depression_probability: f64,
    pub anxiety_label: String,
    pub anxiety_probability: f64,
    pub stress_label: String,
    pub stress_probability: f64,
    pub scores: ScreenerScores,
}

#[derive(Debug, Clone)]
pub struct LabelCount {
    pub condition: String,
    pub label: String,
    pub count: i64,
}
