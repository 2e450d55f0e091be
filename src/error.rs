use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// The main error type for yoloprep operations.
#[derive(Debug, Error)]
pub enum YoloprepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse VOC XML {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Failed to parse YOLO label {path} line {line}: {message}")]
    YoloLabelParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid annotation record {path}: {message}")]
    InvalidRecord { path: PathBuf, message: String },

    #[error("Invalid class list: {message}")]
    InvalidClassList { message: String },

    #[error("Invalid split specification: {message}")]
    InvalidSplitSpec { message: String },

    #[error("Invalid label rule: {message}")]
    InvalidLabelRule { message: String },

    #[error("Source directory does not exist: {path}")]
    SourceDirMissing { path: PathBuf },

    #[error("Destination {path} is not writable: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {path} already holds files; refusing to mix them with a new partition")]
    DestinationNotEmpty { path: PathBuf },

    #[error("{path} is both a source and a destination")]
    SourceIsDestination { path: PathBuf },

    #[error(
        "Aborted after {failures} consecutive transfer failures \
         ({transferred} pair(s) already transferred); last error: {message}"
    )]
    TransferAborted {
        failures: usize,
        transferred: usize,
        message: String,
    },

    #[error("Output under {root} is inconsistent after the run ({problems} problem(s))")]
    InconsistentLayout { root: PathBuf, problems: usize },

    #[error("Failed to write data.yaml to {path}: {source}")]
    DataYamlWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportJson(#[from] serde_json::Error),

    #[error("Failed to launch trainer '{program}': {source}")]
    TrainerLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trainer exited with {status}")]
    TrainerFailed { status: ExitStatus },

    #[error("Conversion finished with {failed} failed file(s)")]
    ConversionFailed { failed: usize },

    #[error("Partition finished with {count} image(s) missing a label")]
    MissingLabels { count: usize },
}
