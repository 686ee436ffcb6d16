use crate::encode::{answers_for, screener_answers};
use crate::error::PipelineError;
use crate::models::{AssessmentAnswers, ScreenerScores};
use crate::schema::Screener;

/// 1-based PSS-10 items that are positively worded.
const PSS_REVERSED_ITEMS: [usize; 4] = [4, 5, 7, 8];

pub fn total(screener: Screener, answers: &AssessmentAnswers) -> Result<u32, PipelineError> {
    let values = screener_answers(screener, answers_for(answers, screener))?;
    let max = f64::from(screener.max_answer());

    let sum: f64 = values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            if screener == Screener::Pss10 && PSS_REVERSED_ITEMS.contains(&(index + 1)) {
                max - value
            } else {
                *value
            }
        })
        .sum();

    Ok(sum as u32)
}

pub fn score(answers: &AssessmentAnswers) -> Result<ScreenerScores, PipelineError> {
    Ok(ScreenerScores {
        phq9_total: total(Screener::Phq9, answers)?,
        gad7_total: total(Screener::Gad7, answers)?,
        pss10_total: total(Screener::Pss10, answers)?,
    })
}

pub fn phq9_band(total: u32) -> &'static str {
    match total {
        0..=4 => "Minimal",
        5..=9 => "Mild",
        10..=14 => "Moderate",
        15..=19 => "Moderately Severe",
        _ => "Severe",
    }
}

pub fn gad7_band(total: u32) -> &'static str {
    match total {
        0..=4 => "Minimal",
        5..=9 => "Mild",
        10..=14 => "Moderate",
        _ => "Severe",
    }
}

pub fn pss10_band(total: u32) -> &'static str {
    match total {
        0..=13 => "Low",
        14..=26 => "Moderate",
        _ => "High",
    }
}
