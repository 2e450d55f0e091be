//! yoloprep: prepare object-detection datasets for YOLO-style training.
//!
//! Two independent steps, coupled only through files on disk:
//!
//! 1. [`convert`] turns Pascal VOC XML annotations into YOLO label files
//!    (`class x_center y_center width height`, normalized, 6 decimals).
//! 2. [`split`] distributes image/label pairs into `images/<split>` and
//!    `labels/<split>` without ever separating an image from its label.
//!
//! # Modules
//!
//! - [`geom`]: pixel and normalized box types and label-line encoding
//! - [`convert`]: the annotation converter and its report
//! - [`split`]: the dataset partitioner and its report
//! - [`data_yaml`]: the dataset descriptor consumed by trainers
//! - [`trainer`]: the boundary to an external training process
//! - [`error`]: error types

pub mod convert;
pub mod data_yaml;
pub mod error;
pub mod geom;
pub mod split;
pub mod trainer;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

pub use error::YoloprepError;

use convert::ClassList;
use split::{LabelRule, PartitionOptions, RootMapping, SplitSpec, TransferMode};
use trainer::{CommandTrainer, TrainerJob};

/// The yoloprep CLI application.
#[derive(Parser)]
#[command(name = "yoloprep")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a directory of VOC XML files into YOLO label files.
    Convert(ConvertArgs),
    /// Partition image/label pairs into train/val(/test) directories.
    Split(SplitArgs),
    /// Copy every labeled image into a single split (e.g. a test set).
    Subset(SubsetArgs),
    /// Write data.yaml for an already partitioned dataset.
    DataYaml(DataYamlArgs),
    /// Hand a dataset to an external trainer and wait for it.
    Train(TrainArgs),
}

/// Ordered class names, given inline or as a file.
#[derive(clap::Args)]
struct ClassArgs {
    /// Comma-separated class names; position is the class index.
    #[arg(long, value_delimiter = ',', conflicts_with = "classes_file")]
    classes: Vec<String>,

    /// File with one class name per line.
    #[arg(long)]
    classes_file: Option<PathBuf>,
}

impl ClassArgs {
    fn load(&self) -> Result<Option<ClassList>, YoloprepError> {
        if let Some(path) = &self.classes_file {
            return ClassList::from_file(path).map(Some);
        }
        if self.classes.is_empty() {
            return Ok(None);
        }
        ClassList::new(self.classes.iter().map(|name| name.trim().to_string())).map(Some)
    }

    fn require(&self) -> Result<ClassList, YoloprepError> {
        self.load()?.ok_or_else(|| YoloprepError::InvalidClassList {
            message: "pass --classes or --classes-file".to_string(),
        })
    }
}

/// Where labels live relative to images.
#[derive(clap::Args)]
struct LabelArgs {
    /// Directory holding `<stem>.txt` for every image.
    #[arg(long, conflicts_with = "label_map")]
    labels: Option<PathBuf>,

    /// IMAGE_ROOT=LABEL_ROOT; repeatable. Longest matching root wins.
    #[arg(long)]
    label_map: Vec<RootMapping>,
}

impl LabelArgs {
    fn rule(&self) -> Result<LabelRule, YoloprepError> {
        if let Some(dir) = &self.labels {
            return Ok(LabelRule::directory(dir));
        }
        if !self.label_map.is_empty() {
            return LabelRule::root_map(self.label_map.clone());
        }
        Err(YoloprepError::InvalidLabelRule {
            message: "pass --labels or --label-map".to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Copy,
    Move,
}

impl From<ModeArg> for TransferMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Copy => TransferMode::Copy,
            ModeArg::Move => TransferMode::Move,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Directory of VOC XML files (scanned flat).
    #[arg(long)]
    input_dir: PathBuf,

    /// Directory for the `<stem>.txt` label files.
    #[arg(long)]
    output_dir: PathBuf,

    #[command(flatten)]
    classes: ClassArgs,

    /// Exit non-zero if any file failed to convert.
    #[arg(long)]
    strict: bool,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

/// Arguments for the split subcommand.
#[derive(clap::Args)]
struct SplitArgs {
    /// Directory of source images (scanned flat).
    #[arg(long)]
    images: PathBuf,

    #[command(flatten)]
    labels: LabelArgs,

    /// Dataset root receiving images/<split> and labels/<split>.
    #[arg(long)]
    output_root: PathBuf,

    /// Fraction of pairs for `train`; the rest go to `val`.
    #[arg(long, conflicts_with = "splits")]
    ratio: Option<f64>,

    /// Named ratios, e.g. `train=0.7,val=0.2,test=0.1`.
    #[arg(long)]
    splits: Option<SplitSpec>,

    /// Copy sources or move them.
    #[arg(long, value_enum, env = "YOLOPREP_MODE", default_value = "copy")]
    mode: ModeArg,

    /// Seed for the shuffle; omit for a random split.
    #[arg(long, env = "YOLOPREP_SEED")]
    seed: Option<u64>,

    /// Exit non-zero if any image had no label.
    #[arg(long)]
    fail_on_missing_labels: bool,

    /// Add to split directories that already hold files.
    #[arg(long)]
    allow_existing: bool,

    // Given classes, data.yaml is written too.
    #[command(flatten)]
    classes: ClassArgs,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

/// Arguments for the subset subcommand.
#[derive(clap::Args)]
struct SubsetArgs {
    /// Directory of source images (scanned flat).
    #[arg(long)]
    images: PathBuf,

    #[command(flatten)]
    labels: LabelArgs,

    /// Dataset root receiving images/<split> and labels/<split>.
    #[arg(long)]
    output_root: PathBuf,

    /// Name of the single split.
    #[arg(long, default_value = "test")]
    split: String,

    /// Add to split directories that already hold files.
    #[arg(long)]
    allow_existing: bool,

    // Given classes, data.yaml is written too.
    #[command(flatten)]
    classes: ClassArgs,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

/// Arguments for the data-yaml subcommand.
#[derive(clap::Args)]
struct DataYamlArgs {
    /// Dataset root containing images/<split>.
    #[arg(long)]
    root: PathBuf,

    /// Split names to list.
    #[arg(long, value_delimiter = ',', default_value = "train,val")]
    splits: Vec<String>,

    #[command(flatten)]
    classes: ClassArgs,
}

/// Arguments for the train subcommand.
#[derive(clap::Args)]
struct TrainArgs {
    /// Dataset descriptor.
    #[arg(long)]
    data: PathBuf,

    /// Executable to run.
    #[arg(long, default_value = "python")]
    program: String,

    /// Training script passed to the program.
    #[arg(long)]
    script: Option<PathBuf>,

    #[arg(long, default_value = "yolov5s.pt")]
    weights: String,

    #[arg(long, default_value_t = 640)]
    img: u32,

    #[arg(long, default_value_t = 100)]
    epochs: u32,

    #[arg(long, default_value_t = 16)]
    batch_size: u32,

    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    project: Option<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    /// Extra arguments passed through to the trainer after `--`.
    #[arg(last = true)]
    extra: Vec<String>,
}

/// Run the yoloprep CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), YoloprepError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Split(args)) => run_split(args),
        Some(Commands::Subset(args)) => run_subset(args),
        Some(Commands::DataYaml(args)) => run_data_yaml(args),
        Some(Commands::Train(args)) => run_train(args),
        None => {
            println!("yoloprep {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("VOC-to-YOLO conversion and dataset splitting.");
            println!();
            println!("Run 'yoloprep --help' for usage information.");
            Ok(())
        }
    }
}

fn run_convert(args: ConvertArgs) -> Result<(), YoloprepError> {
    let classes = args.classes.require()?;
    let report = convert::convert_dir(&args.input_dir, &args.output_dir, &classes)?;
    print_report(&report, args.output)?;

    if args.strict && !report.is_complete() {
        return Err(YoloprepError::ConversionFailed {
            failed: report.files.failed,
        });
    }
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<(), YoloprepError> {
    let spec = match (args.splits, args.ratio) {
        (Some(spec), _) => spec,
        (None, Some(ratio)) => SplitSpec::binary(ratio)?,
        (None, None) => SplitSpec::binary(0.8)?,
    };
    let classes = args.classes.load()?;

    let opts = PartitionOptions {
        image_dir: args.images,
        labels: args.labels.rule()?,
        output_root: args.output_root,
        spec,
        mode: args.mode.into(),
        seed: args.seed,
        allow_existing: args.allow_existing,
    };
    let report = split::partition_dataset(&opts)?;

    if let Some(classes) = classes {
        data_yaml::write_data_yaml(&opts.output_root, opts.spec.names(), &classes)?;
    }
    print_report(&report, args.output)?;

    if args.fail_on_missing_labels && report.missing_label_count() > 0 {
        return Err(YoloprepError::MissingLabels {
            count: report.missing_label_count(),
        });
    }
    Ok(())
}

fn run_subset(args: SubsetArgs) -> Result<(), YoloprepError> {
    let classes = args.classes.load()?;
    let report = split::build_subset(
        &args.images,
        args.labels.rule()?,
        &args.output_root,
        &args.split,
        args.allow_existing,
    )?;

    if let Some(classes) = classes {
        data_yaml::write_data_yaml(&args.output_root, [args.split.as_str()], &classes)?;
    }
    print_report(&report, args.output)
}

fn run_data_yaml(args: DataYamlArgs) -> Result<(), YoloprepError> {
    let classes = args.classes.require()?;
    let path = data_yaml::write_data_yaml(
        &args.root,
        args.splits.iter().map(String::as_str),
        &classes,
    )?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<(), YoloprepError> {
    let job = TrainerJob {
        program: args.program,
        script: args.script,
        data: args.data,
        weights: args.weights,
        img_size: args.img,
        epochs: args.epochs,
        batch_size: args.batch_size,
        device: args.device,
        project: args.project,
        name: args.name,
        extra_args: args.extra,
    };
    trainer::run_job(&CommandTrainer, &job)
}

fn print_report<R>(report: &R, format: OutputFormat) -> Result<(), YoloprepError>
where
    R: Serialize + std::fmt::Display,
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{}", report),
    }
    Ok(())
}
