use std::io::Write;

use anyhow::{Context, Result};

use super::labels::EvalItem;
use super::normalize::normalize;
use super::predictor::{Predictions, image_basename};
use crate::model::{EvalReport, Mismatch};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScoreSummary {
    pub total: usize,
    pub correct: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ScoreSummary {
    pub fn accuracy_percent(&self) -> f64 {
        accuracy_percent(self.correct, self.total)
    }
}

pub fn accuracy_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    }
}

/// A missing prediction scores as the empty string.
pub fn score(items: &[EvalItem], predictions: &Predictions) -> ScoreSummary {
    let mut summary = ScoreSummary::default();

    for item in items {
        let raw_prediction = predictions
            .get(image_basename(&item.filename))
            .map(String::as_str)
            .unwrap_or_default();
        let prediction = normalize(raw_prediction);

        summary.total += 1;
        if prediction == item.label {
            summary.correct += 1;
            continue;
        }

        summary.mismatches.push(Mismatch {
            filename: item.filename.clone(),
            raw_label_lower: item.raw_label.to_lowercase(),
            label: item.label.clone(),
            prediction,
            raw_prediction: raw_prediction.to_string(),
        });
    }

    summary
}

pub fn write_mismatch_line<W: Write>(output: &mut W, mismatch: &Mismatch) -> Result<()> {
    writeln!(
        output,
        "ERR -> {} | raw_gt='{}' -> gt='{}' | pred='{}' (raw_pred='{}')",
        mismatch.filename,
        mismatch.raw_label_lower,
        mismatch.label,
        mismatch.prediction,
        mismatch.raw_prediction
    )?;
    Ok(())
}

pub fn write_text_report<W: Write>(
    output: &mut W,
    report: &EvalReport,
    print_mismatches: bool,
) -> Result<()> {
    let counts = &report.counts;
    writeln!(output, "[Info] labels in gt file: {}", counts.labels_total)?;
    writeln!(
        output,
        "[Info] valid samples (after filter & exists): {}",
        counts.valid_items
    )?;
    writeln!(output, "[Info] skipped (empty after filter): {}", counts.skipped_empty)?;
    writeln!(output, "[Info] skipped (missing image): {}", counts.skipped_missing_img)?;

    if print_mismatches {
        for mismatch in &report.mismatches {
            write_mismatch_line(output, mismatch)?;
        }
    }

    writeln!(output, "{}", "-".repeat(40))?;
    writeln!(output, "Total: {}", report.total)?;
    writeln!(output, "Correct: {}", report.correct)?;
    writeln!(output, "Word Accuracy: {:.2}%", report.accuracy_percent)?;
    Ok(())
}

pub fn write_json_report<W: Write>(output: &mut W, report: &EvalReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *output, report)
        .context("failed to serialize evaluation report")?;
    writeln!(output)?;
    Ok(())
}
