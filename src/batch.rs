use std::path::Path;

use anyhow::Context;
use csv::StringRecord;

use crate::context::InferenceContext;
use crate::error::PipelineError;
use crate::models::{
    AssessmentAnswers, AssessmentInput, CategoryValue, DemographicRecord, PredictionResult,
    ScreenerScores,
};
use crate::schema::Screener;
use crate::screener;

#[derive(Debug, Clone)]
pub struct ScoredAssessment {
    pub input: AssessmentInput,
    pub prediction: PredictionResult,
    pub scores: ScreenerScores,
}

#[derive(Debug)]
pub struct BatchRow {
    /// 1-based line in the file, counting the header.
    pub line: u64,
    pub student_ref: String,
    pub outcome: Result<ScoredAssessment, PipelineError>,
}

struct Columns {
    student_ref: Option<usize>,
    age: Option<usize>,
    gender: Option<usize>,
    academic_year: Option<usize>,
    cgpa: Option<usize>,
    scholarship: Option<usize>,
    gad7: Vec<Option<usize>>,
    pss: Vec<Option<usize>>,
    phq9: Vec<Option<usize>>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let questions = |prefix: &str, screener: Screener| {
            (1..=screener.question_count())
                .map(|question| find(&format!("{prefix}_{question}")))
                .collect::<Vec<_>>()
        };

        Self {
            student_ref: find("student_ref"),
            age: find("age"),
            gender: find("gender"),
            academic_year: find("academic_year"),
            cgpa: find("cgpa"),
            scholarship: find("scholarship"),
            gad7: questions("gad7", Screener::Gad7),
            pss: questions("pss", Screener::Pss10),
            phq9: questions("phq9", Screener::Phq9),
        }
    }

    fn cell<'r>(record: &'r StringRecord, column: Option<usize>) -> Option<&'r str> {
        column
            .and_then(|index| record.get(index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn category(record: &StringRecord, column: Option<usize>) -> CategoryValue {
        Self::cell(record, column)
            .map(CategoryValue::text)
            .unwrap_or_default()
    }

    fn scholarship(&self, record: &StringRecord) -> CategoryValue {
        match Self::cell(record, self.scholarship) {
            Some(value) if value.eq_ignore_ascii_case("true") => CategoryValue::text("Yes"),
            Some(value) if value.eq_ignore_ascii_case("false") => CategoryValue::text("No"),
            Some(value) => CategoryValue::text(value),
            None => CategoryValue::Unset,
        }
    }

    fn answers(&self, record: &StringRecord, screener: Screener) -> Result<Vec<Option<f64>>, PipelineError> {
        let columns = match screener {
            Screener::Gad7 => &self.gad7,
            Screener::Pss10 => &self.pss,
            Screener::Phq9 => &self.phq9,
        };

        columns
            .iter()
            .enumerate()
            .map(|(index, column)| match Self::cell(record, *column) {
                None => Ok(None),
                Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
                    PipelineError::invalid_feature(
                        format!("{}_{}", screener.prefix(), index + 1),
                        format!("{raw:?} is not a number"),
                    )
                }),
            })
            .collect()
    }

    fn input(&self, record: &StringRecord) -> Result<AssessmentInput, PipelineError> {
        Ok(AssessmentInput {
            demographics: DemographicRecord {
                age: Self::category(record, self.age),
                gender: Self::category(record, self.gender),
                academic_year: Self::category(record, self.academic_year),
                cgpa: Self::category(record, self.cgpa),
                scholarship: self.scholarship(record),
            },
            answers: AssessmentAnswers {
                depression: self.answers(record, Screener::Phq9)?,
                anxiety: self.answers(record, Screener::Gad7)?,
                stress: self.answers(record, Screener::Pss10)?,
            },
        })
    }
}

fn score_row(context: &InferenceContext, columns: &Columns, record: &StringRecord) -> Result<ScoredAssessment, PipelineError> {
    let input = columns.input(record)?;
    let prediction = context.predict(&input)?;
    let scores = screener::score(&input.answers)?;
    Ok(ScoredAssessment {
        input,
        prediction,
        scores,
    })
}

pub fn score_reader<R: std::io::Read>(
    context: &InferenceContext,
    reader: R,
) -> anyhow::Result<Vec<BatchRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let columns = Columns::resolve(reader.headers().context("failed to read CSV header")?);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.context("failed to read CSV row")?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);
        let student_ref = Columns::cell(&record, columns.student_ref)
            .map(str::to_string)
            .unwrap_or_else(|| format!("row-{line}"));

        let outcome = score_row(context, &columns, &record);
        if let Err(err) = &outcome {
            tracing::warn!(line, %student_ref, error = %err, "row skipped");
        }

        rows.push(BatchRow {
            line,
            student_ref,
            outcome,
        });
    }

    Ok(rows)
}

pub fn score_csv(context: &InferenceContext, path: &Path) -> anyhow::Result<Vec<BatchRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    score_reader(context, file)
}
