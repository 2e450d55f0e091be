//! Boundary to an external training framework.
//!
//! Training itself happens in another process. This module only turns a
//! [`TrainerJob`] into a command line, runs it, and hands back the exit
//! status.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use log::info;

use crate::error::YoloprepError;

/// One training submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainerJob {
    /// Interpreter or executable, e.g. `python`.
    pub program: String,
    /// Entry script handed to `program`, e.g. `yolov5/train.py`.
    pub script: Option<PathBuf>,
    /// The dataset's `data.yaml`.
    pub data: PathBuf,
    pub weights: String,
    pub img_size: u32,
    pub epochs: u32,
    pub batch_size: u32,
    pub device: Option<String>,
    pub project: Option<PathBuf>,
    pub name: Option<String>,
    /// Passed through verbatim after the generated flags.
    pub extra_args: Vec<String>,
}

impl TrainerJob {
    pub fn new(program: impl Into<String>, data: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: None,
            data: data.into(),
            weights: "yolov5s.pt".to_string(),
            img_size: 640,
            epochs: 100,
            batch_size: 16,
            device: None,
            project: None,
            name: None,
            extra_args: Vec::new(),
        }
    }

    /// Arguments after the program name.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(script) = &self.script {
            args.push(script.into());
        }
        args.push("--data".into());
        args.push(self.data.clone().into());
        args.push("--weights".into());
        args.push(self.weights.clone().into());
        args.push("--img".into());
        args.push(self.img_size.to_string().into());
        args.push("--epochs".into());
        args.push(self.epochs.to_string().into());
        args.push("--batch-size".into());
        args.push(self.batch_size.to_string().into());
        if let Some(device) = &self.device {
            args.push("--device".into());
            args.push(device.into());
        }
        if let Some(project) = &self.project {
            args.push("--project".into());
            args.push(project.into());
        }
        if let Some(name) = &self.name {
            args.push("--name".into());
            args.push(name.into());
            args.push("--exist-ok".into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }
}

/// Something that can run a training job to completion.
pub trait Trainer {
    fn submit(&self, job: &TrainerJob) -> Result<ExitStatus, YoloprepError>;
}

/// Runs the job as a child process and waits for it.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandTrainer;

impl Trainer for CommandTrainer {
    fn submit(&self, job: &TrainerJob) -> Result<ExitStatus, YoloprepError> {
        let args = job.to_args();
        info!(
            "Running: {} {}",
            job.program,
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        Command::new(&job.program)
            .args(&args)
            .status()
            .map_err(|source| YoloprepError::TrainerLaunch {
                program: job.program.clone(),
                source,
            })
    }
}

/// Submit and treat a non-zero exit as an error.
pub fn run_job(trainer: &dyn Trainer, job: &TrainerJob) -> Result<(), YoloprepError> {
    let status = trainer.submit(job)?;
    if status.success() {
        Ok(())
    } else {
        Err(YoloprepError::TrainerFailed { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_flags_in_order() {
        let mut job = TrainerJob::new("python", "/data/data.yaml");
        job.script = Some(PathBuf::from("train.py"));
        job.device = Some("0,1".to_string());
        job.name = Some("car".to_string());
        job.extra_args = vec!["--hyp".to_string(), "hyp.yaml".to_string()];

        let args: Vec<String> = job
            .to_args()
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "train.py",
                "--data",
                "/data/data.yaml",
                "--weights",
                "yolov5s.pt",
                "--img",
                "640",
                "--epochs",
                "100",
                "--batch-size",
                "16",
                "--device",
                "0,1",
                "--name",
                "car",
                "--exist-ok",
                "--hyp",
                "hyp.yaml",
            ]
        );
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let job = TrainerJob::new("yoloprep-no-such-trainer-binary", "data.yaml");
        let err = CommandTrainer.submit(&job).expect_err("launch fails");
        assert!(matches!(err, YoloprepError::TrainerLaunch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported() {
        let mut job = TrainerJob::new("false", "data.yaml");
        job.extra_args.clear();
        let err = run_job(&CommandTrainer, &job).expect_err("false exits 1");
        assert!(matches!(err, YoloprepError::TrainerFailed { .. }));
    }
}
