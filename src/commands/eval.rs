use std::io::{self, Write};
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::EvalArgs;
use crate::model::EvalReport;
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

mod labels;
mod normalize;
mod predictor;
mod scoring;


use labels::{Selection, load_labels, select_items};
use predictor::{BatchPredictor, ScriptPredictor};
use scoring::{ScoreSummary, score, write_json_report, write_text_report};

const REPORT_VERSION: u32 = 1;

pub fn run(args: EvalArgs) -> Result<()> {
    if args.batch == 0 {
        bail!("--batch must be greater than zero");
    }

    let started_ts = Utc::now();
    let run_id = format!("eval-{}", utc_compact_string(started_ts));
    info!(
        run_id = %run_id,
        gt = %args.gt.display(),
        images_dir = %args.images_dir.display(),
        pretrained = %args.pretrained,
        "starting evaluation"
    );

    let predictor = ScriptPredictor {
        interpreter: args.python.clone(),
        script: args.model_dir.join(&args.read_script),
        pretrained: args.pretrained.clone(),
        batch_size: args.batch,
    };

    let (selection, summary) = evaluate(&args.gt, &args.images_dir, &predictor)?;

    let report = EvalReport {
        report_version: REPORT_VERSION,
        run_id,
        generated_at: now_utc_string(),
        gt_path: args.gt.display().to_string(),
        gt_sha256: sha256_file(&args.gt)?,
        images_dir: args.images_dir.display().to_string(),
        pretrained: args.pretrained.clone(),
        batch_size: args.batch,
        ext: args.ext.clone(),
        counts: selection.counts,
        total: summary.total,
        correct: summary.correct,
        accuracy_percent: summary.accuracy_percent(),
        mismatches: summary.mismatches,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        write_json_report(&mut output, &report)?;
    } else {
        write_text_report(&mut output, &report, args.print_mis)?;
    }
    output.flush()?;

    if let Some(path) = &args.report_path {
        write_json_pretty(path, &report)?;
        info!(path = %path.display(), "wrote evaluation report");
    }

    Ok(())
}

/// Load labels, select items, predict and score. Predictor failures abort
/// before any item is scored.
fn evaluate<P: BatchPredictor>(
    gt_path: &Path,
    images_dir: &Path,
    predictor: &P,
) -> Result<(Selection, ScoreSummary)> {
    let ground_truth = load_labels(gt_path)?;
    if ground_truth.is_empty() {
        warn!(path = %gt_path.display(), "ground-truth file has no labels");
    }

    let selection = select_items(&ground_truth, images_dir);
    info!(
        labels_total = selection.counts.labels_total,
        valid_items = selection.counts.valid_items,
        skipped_empty = selection.counts.skipped_empty,
        skipped_missing_img = selection.counts.skipped_missing_img,
        "selected evaluation items"
    );

    let image_paths = selection
        .items
        .iter()
        .map(|item| item.image_path.clone())
        .collect::<Vec<_>>();
    let predictions = predictor.predict(&image_paths)?;
    info!(predictions = predictions.len(), "collected predictions");

    let summary = score(&selection.items, &predictions);
    info!(
        total = summary.total,
        correct = summary.correct,
        accuracy_percent = summary.accuracy_percent(),
        "scoring complete"
    );

    Ok((selection, summary))
}
