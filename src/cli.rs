use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "recog-eval",
    version,
    about = "Word-accuracy evaluation and checkpoint repair for text-recognition models"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Eval(EvalArgs),
    FixCkpt(FixCkptArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    #[arg(long = "images_dir", visible_alias = "images-dir")]
    pub images_dir: PathBuf,

    #[arg(long)]
    pub gt: PathBuf,

    #[arg(long, default_value = "parseq")]
    pub pretrained: String,

    #[arg(long, default_value_t = 64)]
    pub batch: usize,

    // TODO: decide whether --ext should restrict evaluated images by extension; accepted as a no-op for now.
    #[arg(long, default_value = ".jpg")]
    pub ext: String,

    #[arg(long = "print_mis", visible_alias = "print-mis", default_value_t = false)]
    pub print_mis: bool,

    #[arg(long, default_value = ".")]
    pub model_dir: PathBuf,

    #[arg(long, default_value = "read.py")]
    pub read_script: String,

    #[arg(long, default_value = "python")]
    pub python: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CheckpointFormat {
    Auto,
    Pickle,
    Json,
}

impl CheckpointFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Pickle => "pickle",
            Self::Json => "json",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FixCkptArgs {
    #[arg(long, default_value = "./weights/parseq.ckpt")]
    pub ckpt_path: PathBuf,

    #[arg(long, default_value = "1.6.0")]
    pub legacy_version: String,

    #[arg(long, value_enum, default_value_t = CheckpointFormat::Auto)]
    pub format: CheckpointFormat,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
