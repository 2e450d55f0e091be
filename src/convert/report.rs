//! Conversion report types.
//!
//! A batch conversion never aborts on a single bad file. Everything that was
//! skipped or failed lands here so the caller can print it, serialize it, or
//! decide that the run should count as failed.

use serde::Serialize;
use std::fmt;

/// Outcome of converting a directory of annotation files.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Directory the annotation files were read from.
    pub input_dir: String,
    /// Directory the label files were written to.
    pub output_dir: String,
    /// Ordered class names used for class indices.
    pub classes: Vec<String>,
    pub files: FileCounts,
    pub boxes: BoxCounts,
    /// Issues in the order they were encountered.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    pub fn new(
        input_dir: impl Into<String>,
        output_dir: impl Into<String>,
        classes: &[String],
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            classes: classes.to_vec(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// True when every annotation file produced a label file.
    pub fn is_complete(&self) -> bool {
        self.files.failed == 0
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conversion completed: {} -> {}", self.input_dir, self.output_dir)?;
        writeln!(
            f,
            "  files: {} total, {} converted, {} failed",
            self.files.total, self.files.converted, self.files.failed
        )?;
        writeln!(
            f,
            "  boxes: {} written, {} difficult, {} unknown class, {} malformed",
            self.boxes.written,
            self.boxes.skipped_difficult,
            self.boxes.skipped_unknown_class,
            self.boxes.skipped_malformed
        )?;
        if self.files.empty_labels > 0 {
            writeln!(
                f,
                "  {} label file(s) contain no objects",
                self.files.empty_labels
            )?;
        }

        if !self.issues.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "Issues ({} error(s), {} warning(s)):",
                self.error_count(),
                self.warning_count()
            )?;
            for issue in &self.issues {
                writeln!(f, "  {}", issue)?;
            }
        }

        Ok(())
    }
}

/// Per-file counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    /// Converted files whose label file has zero lines.
    pub empty_labels: usize,
}

/// Per-box counters across all converted files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoxCounts {
    pub written: usize,
    pub skipped_difficult: usize,
    pub skipped_unknown_class: usize,
    pub skipped_malformed: usize,
}

/// A single issue, tied to the annotation file it came from.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub file: String,
    pub message: String,
}

impl ConversionIssue {
    /// A per-file failure: no label file was written.
    pub fn error(
        code: ConversionIssueCode,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: ConversionSeverity::Error,
            code,
            file: file.into(),
            message: message.into(),
        }
    }

    /// A per-box skip: the label file was still written.
    pub fn warning(
        code: ConversionIssueCode,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            file: file.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConversionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            ConversionSeverity::Error => "ERROR",
            ConversionSeverity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.file, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    Warning,
    Error,
}

/// Stable issue codes; part of the JSON output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// The annotation file could not be read or parsed.
    ParseFailed,
    /// The record parsed but is unusable (e.g. zero image size).
    InvalidRecord,
    /// The label file could not be written.
    WriteFailed,
    /// A box names a class outside the class list.
    UnknownClass,
    /// A box has inverted or non-finite corners.
    MalformedBox,
}
