//! Column order the model was trained on: standardized answers first (GAD-7, PSS-10,
//! PHQ-9), then one one-hot block per demographic attribute.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screener {
    Gad7,
    Pss10,
    Phq9,
}

impl Screener {
    pub fn prefix(self) -> &'static str {
        match self {
            Screener::Gad7 => "GAD7",
            Screener::Pss10 => "PSS",
            Screener::Phq9 => "PHQ9",
        }
    }

    pub fn question_count(self) -> usize {
        match self {
            Screener::Gad7 => 7,
            Screener::Pss10 => 10,
            Screener::Phq9 => 9,
        }
    }

    /// Highest answer on the screener's scale; the lowest is always 0.
    pub fn max_answer(self) -> u8 {
        match self {
            Screener::Gad7 | Screener::Phq9 => 3,
            Screener::Pss10 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Stress,
    Anxiety,
    Depression,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Stress => "stress",
            Condition::Anxiety => "anxiety",
            Condition::Depression => "depression",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CategoricalBlock {
    pub attribute: &'static str,
    pub vocabulary: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct OutputHead {
    pub condition: Condition,
    pub labels: &'static [&'static str],
}

pub const AGE_BUCKETS: &[&str] = &["18-22", "23-26", "27-30", "Above 30", "Below 18"];
pub const GENDERS: &[&str] = &["Female", "Male", "Prefer not to say"];
pub const ACADEMIC_YEARS: &[&str] = &[
    "First Year or Equivalent",
    "Fourth Year or Equivalent",
    "Other",
    "Second Year or Equivalent",
    "Third Year or Equivalent",
];
pub const CGPA_BRACKETS: &[&str] = &[
    "2.50 - 2.99",
    "3.00 - 3.39",
    "3.40 - 3.79",
    "3.80 - 4.00",
    "Below 2.50",
    "Other",
];
pub const SCHOLARSHIP: &[&str] = &["No", "Yes"];

pub const STRESS_LABELS: &[&str] = &["High Perceived Stress", "Low Stress", "Moderate Stress"];
pub const ANXIETY_LABELS: &[&str] = &[
    "Mild Anxiety",
    "Minimal Anxiety",
    "Moderate Anxiety",
    "Severe Anxiety",
];
pub const DEPRESSION_LABELS: &[&str] = &[
    "Mild Depression",
    "Minimal Depression",
    "Moderate Depression",
    "Moderately Severe Depression",
    "No Depression",
    "Severe Depression",
];

#[derive(Debug, Clone, Copy)]
pub struct FeatureSchema {
    pub screeners: &'static [Screener],
    pub categorical: &'static [CategoricalBlock],
    pub heads: &'static [OutputHead],
}

/// The layout the bundled model and scaler were fit on.
pub const CANONICAL: FeatureSchema = FeatureSchema {
    screeners: &[Screener::Gad7, Screener::Pss10, Screener::Phq9],
    categorical: &[
        CategoricalBlock {
            attribute: "age",
            vocabulary: AGE_BUCKETS,
        },
        CategoricalBlock {
            attribute: "gender",
            vocabulary: GENDERS,
        },
        CategoricalBlock {
            attribute: "academic_year",
            vocabulary: ACADEMIC_YEARS,
        },
        CategoricalBlock {
            attribute: "cgpa",
            vocabulary: CGPA_BRACKETS,
        },
        CategoricalBlock {
            attribute: "scholarship",
            vocabulary: SCHOLARSHIP,
        },
    ],
    heads: &[
        OutputHead {
            condition: Condition::Stress,
            labels: STRESS_LABELS,
        },
        OutputHead {
            condition: Condition::Anxiety,
            labels: ANXIETY_LABELS,
        },
        OutputHead {
            condition: Condition::Depression,
            labels: DEPRESSION_LABELS,
        },
    ],
};

impl Default for FeatureSchema {
    fn default() -> Self {
        CANONICAL
    }
}

impl FeatureSchema {
    pub fn numerical_len(&self) -> usize {
        self.screeners.iter().map(|s| s.question_count()).sum()
    }

    pub fn categorical_width(&self) -> usize {
        self.categorical.iter().map(|b| b.vocabulary.len()).sum()
    }

    pub fn width(&self) -> usize {
        self.numerical_len() + self.categorical_width()
    }

    pub fn output_len(&self) -> usize {
        self.heads.iter().map(|h| h.labels.len()).sum()
    }

    /// Slot names of the numerical block, e.g. `GAD7_1` .. `PHQ9_9`.
    pub fn numerical_names(&self) -> Vec<String> {
        self.screeners
            .iter()
            .flat_map(|s| (1..=s.question_count()).map(move |i| format!("{}_{}", s.prefix(), i)))
            .collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numerical_names();
        for block in self.categorical {
            names.extend(
                block
                    .vocabulary
                    .iter()
                    .map(|category| format!("{}={}", block.attribute, category)),
            );
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_widths_match_model_contract() {
        assert_eq!(CANONICAL.numerical_len(), 26);
        assert_eq!(CANONICAL.categorical_width(), 21);
        assert_eq!(CANONICAL.width(), 47);
        assert_eq!(CANONICAL.output_len(), 13);
    }

    #[test]
    fn feature_names_put_answers_before_categories() {
        let names = CANONICAL.feature_names();
        assert_eq!(names.len(), CANONICAL.width());
        assert_eq!(names[0], "GAD7_1");
        assert_eq!(names[7], "PSS_1");
        assert_eq!(names[17], "PHQ9_1");
        assert_eq!(names[25], "PHQ9_9");
        assert_eq!(names[26], "age=18-22");
        assert_eq!(names[46], "scholarship=Yes");
    }

    #[test]
    fn heads_are_sliced_stress_anxiety_depression() {
        let order: Vec<Condition> = CANONICAL.heads.iter().map(|h| h.condition).collect();
        assert_eq!(
            order,
            vec![Condition::Stress, Condition::Anxiety, Condition::Depression]
        );
        assert_eq!(CANONICAL.heads[1].labels, ANXIETY_LABELS);
    }
}
