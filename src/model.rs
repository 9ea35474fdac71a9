use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvalCounts {
    pub labels_total: usize,
    pub valid_items: usize,
    pub skipped_empty: usize,
    pub skipped_missing_img: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub filename: String,
    pub raw_label_lower: String,
    pub label: String,
    pub prediction: String,
    pub raw_prediction: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub report_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub gt_path: String,
    pub gt_sha256: String,
    pub images_dir: String,
    pub pretrained: String,
    pub batch_size: usize,
    pub ext: String,
    pub counts: EvalCounts,
    pub total: usize,
    pub correct: usize,
    pub accuracy_percent: f64,
    pub mismatches: Vec<Mismatch>,
}
