use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::normalize::normalize;
use crate::model::EvalCounts;

/// Filename -> raw label, in first-seen order. A repeated filename replaces the
/// label but keeps its original position.
#[derive(Debug, Default, Clone)]
pub struct GroundTruth {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl GroundTruth {
    pub fn insert(&mut self, filename: String, raw_label: String) {
        if let Some(&position) = self.positions.get(&filename) {
            self.entries[position].1 = raw_label;
            return;
        }
        self.positions.insert(filename.clone(), self.entries.len());
        self.entries.push((filename, raw_label));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(filename, raw_label)| (filename.as_str(), raw_label.as_str()))
    }
}

pub fn load_labels(path: &Path) -> Result<GroundTruth> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read ground-truth file: {}", path.display()))?;
    Ok(parse_labels(&text))
}

pub fn parse_labels(text: &str) -> GroundTruth {
    let mut ground_truth = GroundTruth::default();

    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(filename) = tokens.next() else {
            continue;
        };
        let raw_label = tokens.collect::<String>();
        ground_truth.insert(filename.to_string(), raw_label);
    }

    ground_truth
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalItem {
    pub filename: String,
    pub image_path: PathBuf,
    pub raw_label: String,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct Selection {
    pub items: Vec<EvalItem>,
    pub counts: EvalCounts,
}

pub fn select_items(ground_truth: &GroundTruth, images_dir: &Path) -> Selection {
    let mut selection = Selection {
        items: Vec::with_capacity(ground_truth.len()),
        counts: EvalCounts {
            labels_total: ground_truth.len(),
            ..EvalCounts::default()
        },
    };

    for (filename, raw_label) in ground_truth.iter() {
        let label = normalize(raw_label);
        if label.is_empty() {
            selection.counts.skipped_empty += 1;
            continue;
        }

        let image_path = images_dir.join(filename);
        if !image_path.exists() {
            selection.counts.skipped_missing_img += 1;
            continue;
        }

        selection.items.push(EvalItem {
            filename: filename.to_string(),
            image_path,
            raw_label: raw_label.to_string(),
            label,
        });
    }

    selection.counts.valid_items = selection.items.len();
    selection
}
