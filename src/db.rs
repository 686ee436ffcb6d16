use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AssessmentInput, AssessmentRecord, LabelCount, PredictionResult, ScreenerScores,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn save_assessment(
    pool: &PgPool,
    student_ref: &str,
    input: &AssessmentInput,
    prediction: &PredictionResult,
    scores: &ScreenerScores,
    scaler_version: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let input_json = serde_json::to_value(input).context("failed to serialise assessment input")?;

    sqlx::query(
        r#"
        INSERT INTO wellness_screen.assessments
        (id, student_ref, input,
         depression_label, depression_probability,
         anxiety_label, anxiety_probability,
         stress_label, stress_probability,
         phq9_total, gad7_total, pss10_total, scaler_version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(id)
    .bind(student_ref)
    .bind(input_json)
    .bind(&prediction.depression.label)
    .bind(prediction.depression.probability)
    .bind(&prediction.anxiety.label)
    .bind(prediction.anxiety.probability)
    .bind(&prediction.stress.label)
    .bind(prediction.stress.probability)
    .bind(scores.phq9_total as i32)
    .bind(scores.gad7_total as i32)
    .bind(scores.pss10_total as i32)
    .bind(scaler_version)
    .execute(pool)
    .await
    .context("failed to store assessment")?;

    Ok(id)
}

pub async fn fetch_history(
    pool: &PgPool,
    student_ref: Option<&str>,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<AssessmentRecord>> {
    let mut query = String::from(
        "SELECT id, student_ref, taken_at, \
         depression_label, depression_probability, \
         anxiety_label, anxiety_probability, \
         stress_label, stress_probability, \
         phq9_total, gad7_total, pss10_total \
         FROM wellness_screen.assessments \
         WHERE taken_at >= $1",
    );

    if student_ref.is_some() {
        query.push_str(" AND student_ref = $2");
    }
    query.push_str(" ORDER BY taken_at DESC");

    let mut rows = sqlx::query(&query).bind(since);
    if let Some(value) = student_ref {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut history = Vec::with_capacity(records.len());

    for row in records {
        history.push(AssessmentRecord {
            id: row.get("id"),
            student_ref: row.get("student_ref"),
            taken_at: row.get("taken_at"),
            depression_label: row.get("depression_label"),
            depression_probability: row.get("depression_probability"),
            anxiety_label: row.get("anxiety_label"),
            anxiety_probability: row.get("anxiety_probability"),
            stress_label: row.get("stress_label"),
            stress_probability: row.get("stress_probability"),
            scores: ScreenerScores {
                phq9_total: row.get::<i32, _>("phq9_total") as u32,
                gad7_total: row.get::<i32, _>("gad7_total") as u32,
                pss10_total: row.get::<i32, _>("pss10_total") as u32,
            },
        });
    }

    Ok(history)
}

pub async fn fetch_label_counts(
    pool: &PgPool,
    student_ref: Option<&str>,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<LabelCount>> {
    let rows = sqlx::query(
        r#"
        WITH scoped AS (
            SELECT depression_label, anxiety_label, stress_label
            FROM wellness_screen.assessments
            WHERE taken_at >= $1 AND ($2::text IS NULL OR student_ref = $2)
        )
        SELECT condition, label, COUNT(*) AS count FROM (
            SELECT 'depression' AS condition, depression_label AS label FROM scoped
            UNION ALL
            SELECT 'anxiety', anxiety_label FROM scoped
            UNION ALL
            SELECT 'stress', stress_label FROM scoped
        ) labels
        GROUP BY condition, label
        ORDER BY condition, count DESC, label
        "#,
    )
    .bind(since)
    .bind(student_ref)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| LabelCount {
            condition: row.get("condition"),
            label: row.get("label"),
            count: row.get("count"),
        })
        .collect())
}
