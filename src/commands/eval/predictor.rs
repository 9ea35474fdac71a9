use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::debug;

/// Image basename -> raw predicted text.
pub type Predictions = HashMap<String, String>;

pub trait BatchPredictor {
    fn predict(&self, image_paths: &[PathBuf]) -> Result<Predictions>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionLine<'a> {
    Matched { path: &'a str, prediction: &'a str },
    Unmatched,
}

/// Grammar for one line of recognizer output: `<path>: <prediction>`, split on
/// the first colon. The prediction may be empty or contain more colons.
pub struct PredictionLineParser {
    pattern: Regex,
}

impl PredictionLineParser {
    pub fn new() -> Result<Self> {
        let pattern =
            Regex::new(r"^(.+?):\s*(.*)$").context("failed to compile prediction line regex")?;
        Ok(Self { pattern })
    }

    pub fn parse<'a>(&self, line: &'a str) -> PredictionLine<'a> {
        let Some(captures) = self.pattern.captures(line.trim()) else {
            return PredictionLine::Unmatched;
        };

        match (captures.get(1), captures.get(2)) {
            (Some(path), Some(prediction)) => PredictionLine::Matched {
                path: path.as_str().trim(),
                prediction: prediction.as_str().trim(),
            },
            _ => PredictionLine::Unmatched,
        }
    }
}

pub fn image_basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Splits `image_paths` into contiguous chunks of at most `batch_size`, runs
/// `run_chunk` on each in order and folds the parsed output into one map.
/// The first failing chunk aborts the whole collection.
pub fn collect_predictions<F>(
    image_paths: &[PathBuf],
    batch_size: usize,
    mut run_chunk: F,
) -> Result<Predictions>
where
    F: FnMut(&[PathBuf]) -> Result<String>,
{
    if batch_size == 0 {
        bail!("batch size must be greater than zero");
    }

    let parser = PredictionLineParser::new()?;
    let mut predictions = Predictions::new();
    let chunk_count = image_paths.len().div_ceil(batch_size);

    for (chunk_index, chunk) in image_paths.chunks(batch_size).enumerate() {
        debug!(
            chunk = chunk_index + 1,
            chunks = chunk_count,
            images = chunk.len(),
            "dispatching recognition chunk"
        );

        let stdout = run_chunk(chunk)?;

        let mut unmatched = 0_usize;
        for line in stdout.lines() {
            match parser.parse(line) {
                PredictionLine::Matched { path, prediction } => {
                    predictions.insert(image_basename(path).to_string(), prediction.to_string());
                }
                PredictionLine::Unmatched => unmatched += 1,
            }
        }
        if unmatched > 0 {
            debug!(chunk = chunk_index + 1, unmatched, "ignored unmatched output lines");
        }
    }

    Ok(predictions)
}

/// Runs `<interpreter> <script> pretrained=<name> --images <paths...>` once per chunk.
#[derive(Debug, Clone)]
pub struct ScriptPredictor {
    pub interpreter: String,
    pub script: PathBuf,
    pub pretrained: String,
    pub batch_size: usize,
}

impl ScriptPredictor {
    fn build_command(&self, chunk: &[PathBuf]) -> Command {
        let mut command = Command::new(&self.interpreter);
        command
            .arg(&self.script)
            .arg(format!("pretrained={}", self.pretrained))
            .arg("--images")
            .args(chunk);
        command
    }

    fn render_command(&self, chunk: &[PathBuf]) -> String {
        let mut parts = vec![
            self.interpreter.clone(),
            self.script.display().to_string(),
            format!("pretrained={}", self.pretrained),
            "--images".to_string(),
        ];
        parts.extend(chunk.iter().map(|path| path.display().to_string()));
        parts.join(" ")
    }

    fn run_chunk(&self, chunk: &[PathBuf]) -> Result<String> {
        let output = self
            .build_command(chunk)
            .output()
            .with_context(|| format!("failed to execute {}", self.render_command(chunk)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed with {}.\nCMD: {}\nSTDERR:\n{}\nSTDOUT:\n{}",
                self.script.display(),
                output.status,
                self.render_command(chunk),
                stderr,
                stdout
            );
        }

        Ok(stdout)
    }
}

impl BatchPredictor for ScriptPredictor {
    fn predict(&self, image_paths: &[PathBuf]) -> Result<Predictions> {
        collect_predictions(image_paths, self.batch_size, |chunk| self.run_chunk(chunk))
    }
}
