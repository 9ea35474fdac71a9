use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_pickle::{DeOptions, HashableValue, SerOptions};
use tracing::info;

use crate::cli::{CheckpointFormat, FixCkptArgs};
use crate::util::sha256_bytes;

pub const VERSION_KEY: &str = "pytorch-lightning_version";
pub const STATE_KEY: &str = "state_dict";

type JsonMap = serde_json::Map<String, serde_json::Value>;
type PickleDict = BTreeMap<HashableValue, serde_pickle::Value>;

/// Top-level mapping of a decoded checkpoint. Values are never inspected, so
/// whatever the codec decoded is written back as is.
pub trait CheckpointMap: Sized {
    fn contains_key(&self, key: &str) -> bool;
    fn insert_string(&mut self, key: &str, value: &str);
    fn nest_under(self, key: &str) -> Self;
}

impl CheckpointMap for JsonMap {
    fn contains_key(&self, key: &str) -> bool {
        serde_json::Map::contains_key(self, key)
    }

    fn insert_string(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    fn nest_under(self, key: &str) -> Self {
        let mut outer = JsonMap::new();
        outer.insert(key.to_string(), serde_json::Value::Object(self));
        outer
    }
}

impl CheckpointMap for PickleDict {
    fn contains_key(&self, key: &str) -> bool {
        BTreeMap::contains_key(self, &HashableValue::String(key.to_string()))
    }

    fn insert_string(&mut self, key: &str, value: &str) {
        self.insert(
            HashableValue::String(key.to_string()),
            serde_pickle::Value::String(value.to_string()),
        );
    }

    fn nest_under(self, key: &str) -> Self {
        let mut outer = PickleDict::new();
        outer.insert(
            HashableValue::String(key.to_string()),
            serde_pickle::Value::Dict(self),
        );
        outer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Unchanged,
    VersionInserted,
    Wrapped,
}

impl PatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::VersionInserted => "version_inserted",
            Self::Wrapped => "wrapped",
        }
    }
}

pub fn run(args: FixCkptArgs) -> Result<()> {
    let path = args.ckpt_path.as_path();
    let format = resolve_format(path, args.format);

    info!(path = %path.display(), format = format.as_str(), "patching checkpoint");

    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (encoded, outcome) = patch_bytes(&bytes, format, &args.legacy_version)
        .with_context(|| format!("failed to patch {}", path.display()))?;

    info!(
        outcome = outcome.as_str(),
        legacy_version = %args.legacy_version,
        sha256_before = %sha256_bytes(&bytes),
        sha256_after = %sha256_bytes(&encoded),
        "checkpoint patch computed"
    );

    if args.dry_run {
        info!(path = %path.display(), "dry-run, checkpoint left untouched");
        return Ok(());
    }

    fs::write(path, &encoded).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "checkpoint rewritten");

    Ok(())
}

/// Adds the version marker to a checkpoint that lacks one. A bare weight
/// mapping (no `state_dict` either) is moved under `state_dict`.
pub fn patch_checkpoint<M: CheckpointMap>(
    mut checkpoint: M,
    legacy_version: &str,
) -> (M, PatchOutcome) {
    if checkpoint.contains_key(VERSION_KEY) {
        return (checkpoint, PatchOutcome::Unchanged);
    }

    if checkpoint.contains_key(STATE_KEY) {
        checkpoint.insert_string(VERSION_KEY, legacy_version);
        return (checkpoint, PatchOutcome::VersionInserted);
    }

    // Nest the untouched blob; the version marker lives only on the outer
    // mapping, never inside `state_dict`.
    let mut wrapped = checkpoint.nest_under(STATE_KEY);
    wrapped.insert_string(VERSION_KEY, legacy_version);
    (wrapped, PatchOutcome::Wrapped)
}

pub fn resolve_format(path: &Path, format: CheckpointFormat) -> CheckpointFormat {
    if format != CheckpointFormat::Auto {
        return format;
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        CheckpointFormat::Json
    } else {
        CheckpointFormat::Pickle
    }
}

fn patch_bytes(
    bytes: &[u8],
    format: CheckpointFormat,
    legacy_version: &str,
) -> Result<(Vec<u8>, PatchOutcome)> {
    match format {
        CheckpointFormat::Json => {
            let (patched, outcome) = patch_checkpoint(decode_json(bytes)?, legacy_version);
            Ok((encode_json(&patched)?, outcome))
        }
        CheckpointFormat::Pickle | CheckpointFormat::Auto => {
            let (patched, outcome) = patch_checkpoint(decode_pickle(bytes)?, legacy_version);
            Ok((encode_pickle(patched)?, outcome))
        }
    }
}

fn decode_json(bytes: &[u8]) -> Result<JsonMap> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).context("invalid json checkpoint")?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => bail!(
            "checkpoint must be a mapping at the top level, found {}",
            json_kind(&other)
        ),
    }
}

fn encode_json(checkpoint: &JsonMap) -> Result<Vec<u8>> {
    let mut data =
        serde_json::to_vec_pretty(checkpoint).context("failed to serialize json checkpoint")?;
    data.push(b'\n');
    Ok(data)
}

fn decode_pickle(bytes: &[u8]) -> Result<PickleDict> {
    let value = serde_pickle::value_from_slice(bytes, DeOptions::new())
        .context("invalid pickle checkpoint")?;
    match value {
        serde_pickle::Value::Dict(dict) => Ok(dict),
        other => bail!(
            "checkpoint must be a mapping at the top level, found {}",
            pickle_kind(&other)
        ),
    }
}

fn encode_pickle(checkpoint: PickleDict) -> Result<Vec<u8>> {
    serde_pickle::value_to_vec(&serde_pickle::Value::Dict(checkpoint), SerOptions::new())
        .context("failed to serialize pickle checkpoint")
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}

fn pickle_kind(value: &serde_pickle::Value) -> &'static str {
    match value {
        serde_pickle::Value::None => "None",
        serde_pickle::Value::String(_) => "a string",
        serde_pickle::Value::Bytes(_) => "bytes",
        serde_pickle::Value::List(_) | serde_pickle::Value::Tuple(_) => "a sequence",
        serde_pickle::Value::Dict(_) => "a mapping",
        _ => "a scalar or set",
    }
}
