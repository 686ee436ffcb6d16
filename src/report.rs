use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AssessmentRecord, HeadPrediction, LabelCount, PredictionResult, ScreenerScores};
use crate::screener;

fn write_head(output: &mut String, title: &str, head: &HeadPrediction) {
    let _ = writeln!(
        output,
        "### {}: {} ({:.1}%)",
        title,
        head.label,
        head.probability * 100.0
    );

    let mut ranked = head.probabilities.clone();
    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for entry in ranked.iter() {
        let _ = writeln!(output, "- {}: {:.1}%", entry.label, entry.probability * 100.0);
    }
}

pub fn render_prediction(prediction: &PredictionResult, scores: &ScreenerScores) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "## Screening Result");
    let _ = writeln!(output);
    write_head(&mut output, "Depression", &prediction.depression);
    let _ = writeln!(output);
    write_head(&mut output, "Anxiety", &prediction.anxiety);
    let _ = writeln!(output);
    write_head(&mut output, "Stress", &prediction.stress);
    let _ = writeln!(output);

    let _ = writeln!(output, "### Questionnaire Totals");
    let _ = writeln!(
        output,
        "- PHQ-9: {} ({})",
        scores.phq9_total,
        screener::phq9_band(scores.phq9_total)
    );
    let _ = writeln!(
        output,
        "- GAD-7: {} ({})",
        scores.gad7_total,
        screener::gad7_band(scores.gad7_total)
    );
    let _ = writeln!(
        output,
        "- PSS-10: {} ({})",
        scores.pss10_total,
        screener::pss10_band(scores.pss10_total)
    );

    output
}

pub fn build_history_report(
    student_ref: Option<&str>,
    since: DateTime<Utc>,
    history: &[AssessmentRecord],
    label_counts: &[LabelCount],
) -> String {
    let mut output = String::new();
    let scope = student_ref.unwrap_or("all students");

    let _ = writeln!(output, "# Wellness Screening Report");
    let _ = writeln!(
        output,
        "Generated for {} (assessments since {})",
        scope,
        since.date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Label Mix");

    if label_counts.is_empty() {
        let _ = writeln!(output, "No assessments recorded for this window.");
    } else {
        for count in label_counts.iter() {
            let _ = writeln!(output, "- {} / {}: {}", count.condition, count.label, count.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Assessments");

    if history.is_empty() {
        let _ = writeln!(output, "No assessments recorded for this window.");
    } else {
        for record in history.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} on {}: {} ({:.0}%), {} ({:.0}%), {} ({:.0}%); PHQ-9 {}, GAD-7 {}, PSS-10 {}",
                record.student_ref,
                record.taken_at.format("%Y-%m-%d %H:%M"),
                record.depression_label,
                record.depression_probability * 100.0,
                record.anxiety_label,
                record.anxiety_probability * 100.0,
                record.stress_label,
                record.stress_probability * 100.0,
                record.scores.phq9_total,
                record.scores.gad7_total,
                record.scores.pss10_total
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{ready_context, scenario_a};
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn prediction_lists_every_label_once() {
        let input = scenario_a();
        let prediction = ready_context().predict(&input).unwrap();
        let scores = screener::score(&input.answers).unwrap();
        let text = render_prediction(&prediction, &scores);

        assert!(text.contains(&format!("### Depression: {}", prediction.depression.label)));
        assert!(text.contains("- PHQ-9: 25 (Severe)"));
        assert!(text.contains("- PSS-10: 31 (High)"));
        for label in crate::schema::DEPRESSION_LABELS {
            assert_eq!(text.matches(&format!("- {label}:")).count(), 1);
        }
    }

    #[test]
    fn empty_history_says_so() {
        let since = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        let text = build_history_report(Some("s-1"), since, &[], &[]);
        assert!(text.contains("Generated for s-1 (assessments since 2026-09-01)"));
        assert_eq!(text.matches("No assessments recorded").count(), 2);
    }

    #[test]
    fn history_rows_are_rendered() {
        let since = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        let record = AssessmentRecord {
            id: Uuid::new_v4(),
            student_ref: "s-7".to_string(),
            taken_at: Utc.with_ymd_and_hms(2026, 10, 2, 9, 30, 0).unwrap(),
            depression_label: "Mild Depression".to_string(),
            depression_probability: 0.61,
            anxiety_label: "Minimal Anxiety".to_string(),
            anxiety_probability: 0.72,
            stress_label: "Moderate Stress".to_string(),
            stress_probability: 0.55,
            scores: ScreenerScores {
                phq9_total: 7,
                gad7_total: 3,
                pss10_total: 18,
            },
        };
        let counts = vec![LabelCount {
            condition: "depression".to_string(),
            label: "Mild Depression".to_string(),
            count: 1,
        }];

        let text = build_history_report(None, since, &[record], &counts);
        assert!(text.contains("Generated for all students"));
        assert!(text.contains("- depression / Mild Depression: 1"));
        assert!(text.contains("- s-7 on 2026-10-02 09:30: Mild Depression (61%)"));
    }
}
