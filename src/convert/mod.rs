//! Annotation Converter: VOC-style absolute boxes to YOLO label files.
//!
//! Each annotation file is converted independently. A record produces one
//! label file named after the annotation file's stem, with one line per
//! retained box. Difficult boxes are dropped silently, boxes whose class is
//! not in the [`ClassList`] are dropped with a warning, and a record with no
//! surviving boxes still gets an (empty) label file.

pub mod report;
pub mod voc;

pub use report::{
    BoxCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
    FileCounts,
};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::YoloprepError;
use crate::geom::{encode_label_file, BBoxXYXY, NormalizedBox, Pixel};

/// Extension of the label files the converter writes.
pub const LABEL_EXTENSION: &str = "txt";

/// One source image's annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationRecord {
    /// `<filename>` from the annotation, if any. Informational only.
    pub filename: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    pub boxes: Vec<BoxRecord>,
}

/// One labeled box in absolute pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxRecord {
    pub class_name: String,
    pub bbox: BBoxXYXY<Pixel>,
    pub is_difficult: bool,
}

/// The ordered class names that define class indices.
///
/// Must be identical between conversion and whatever trains on the labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassList {
    names: Vec<String>,
}

impl ClassList {
    /// Builds a class list, rejecting empty lists, blank names and duplicates.
    pub fn new<I, S>(names: I) -> Result<Self, YoloprepError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(YoloprepError::InvalidClassList {
                message: "at least one class name is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (index, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(YoloprepError::InvalidClassList {
                    message: format!("class {} has an empty name", index),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(YoloprepError::InvalidClassList {
                    message: format!("class name '{}' appears more than once", name),
                });
            }
        }

        Ok(Self { names })
    }

    /// Reads a `classes.txt`-style file: one name per line, no blank lines.
    pub fn from_file(path: &Path) -> Result<Self, YoloprepError> {
        let data = fs::read_to_string(path).map_err(YoloprepError::Io)?;
        let mut names = Vec::new();
        for (line_idx, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Err(YoloprepError::InvalidClassList {
                    message: format!("{} line {} is empty", path.display(), line_idx + 1),
                });
            }
            names.push(trimmed.to_string());
        }
        Self::new(names)
    }

    /// Exact-match lookup of a class name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Why a single box did not make it into the label file.
#[derive(Clone, Debug, PartialEq)]
pub enum SkippedBox {
    Difficult,
    UnknownClass(String),
    Malformed(BBoxXYXY<Pixel>),
}

/// The converted form of one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordConversion {
    pub boxes: Vec<NormalizedBox>,
    pub skipped: Vec<SkippedBox>,
}

impl RecordConversion {
    pub fn label_body(&self) -> String {
        encode_label_file(&self.boxes)
    }

    fn count_skipped(&self, pred: impl Fn(&SkippedBox) -> bool) -> usize {
        self.skipped.iter().filter(|skip| pred(skip)).count()
    }
}

/// Convert one record against the class list.
///
/// `source` only identifies the record in errors and log events.
pub fn convert_record(
    record: &AnnotationRecord,
    classes: &ClassList,
    source: &Path,
) -> Result<RecordConversion, YoloprepError> {
    if record.image_width == 0 || record.image_height == 0 {
        return Err(YoloprepError::InvalidRecord {
            path: source.to_path_buf(),
            message: format!(
                "image size must be positive, got {}x{}",
                record.image_width, record.image_height
            ),
        });
    }

    let mut conversion = RecordConversion::default();
    for object in &record.boxes {
        if object.is_difficult {
            conversion.skipped.push(SkippedBox::Difficult);
            continue;
        }

        let Some(class_index) = classes.index_of(&object.class_name) else {
            warn!(
                "Unknown class '{}' found in {}",
                object.class_name,
                source.display()
            );
            conversion
                .skipped
                .push(SkippedBox::UnknownClass(object.class_name.clone()));
            continue;
        };

        if !object.bbox.is_finite() || !object.bbox.is_ordered() {
            warn!(
                "Malformed box {:?} for class '{}' in {}",
                object.bbox,
                object.class_name,
                source.display()
            );
            conversion.skipped.push(SkippedBox::Malformed(object.bbox));
            continue;
        }

        conversion.boxes.push(NormalizedBox::from_pixel(
            class_index,
            &object.bbox,
            record.image_width,
            record.image_height,
        ));
    }

    Ok(conversion)
}

/// Convert one VOC XML file and write `<output_dir>/<stem>.txt`.
pub fn convert_file(
    xml_path: &Path,
    output_dir: &Path,
    classes: &ClassList,
) -> Result<(PathBuf, RecordConversion), YoloprepError> {
    let record = voc::read_voc_xml(xml_path)?;
    let conversion = convert_record(&record, classes, xml_path)?;
    let label_path = label_path_for(xml_path, output_dir)?;
    fs::write(&label_path, conversion.label_body()).map_err(YoloprepError::Io)?;
    Ok((label_path, conversion))
}

/// Convert every `*.xml` directly inside `input_dir` into `output_dir`.
///
/// Configuration problems (missing input directory, unwritable output
/// directory) are returned as errors before any label is written. Per-file
/// failures are logged and recorded in the report and the batch continues.
pub fn convert_dir(
    input_dir: &Path,
    output_dir: &Path,
    classes: &ClassList,
) -> Result<ConversionReport, YoloprepError> {
    if !input_dir.is_dir() {
        return Err(YoloprepError::SourceDirMissing {
            path: input_dir.to_path_buf(),
        });
    }
    fs::create_dir_all(output_dir).map_err(|source| YoloprepError::DestinationUnwritable {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let xml_files = collect_xml_files(input_dir)?;
    let mut report = ConversionReport::new(
        input_dir.display().to_string(),
        output_dir.display().to_string(),
        classes.names(),
    );

    if xml_files.is_empty() {
        warn!("No XML files found in {}", input_dir.display());
        return Ok(report);
    }
    info!("Found {} XML files", xml_files.len());

    for xml_path in xml_files {
        report.files.total += 1;
        let file_name = file_name_string(&xml_path);

        match convert_file(&xml_path, output_dir, classes) {
            Ok((label_path, conversion)) => {
                debug!("converted: {} -> {}", file_name, label_path.display());
                record_success(&mut report, &file_name, &conversion);
            }
            Err(err) => {
                error!("conversion failed: {}, error: {}", file_name, err);
                report.files.failed += 1;
                report.add(ConversionIssue::error(
                    issue_code_for(&err),
                    file_name,
                    err.to_string(),
                ));
            }
        }
    }

    info!(
        "Conversion completed: {} succeeded, {} failed, {} total",
        report.files.converted, report.files.failed, report.files.total
    );
    Ok(report)
}

fn record_success(report: &mut ConversionReport, file_name: &str, conversion: &RecordConversion) {
    report.files.converted += 1;
    if conversion.boxes.is_empty() {
        report.files.empty_labels += 1;
    }

    report.boxes.written += conversion.boxes.len();
    report.boxes.skipped_difficult +=
        conversion.count_skipped(|skip| matches!(skip, SkippedBox::Difficult));
    report.boxes.skipped_unknown_class +=
        conversion.count_skipped(|skip| matches!(skip, SkippedBox::UnknownClass(_)));
    report.boxes.skipped_malformed +=
        conversion.count_skipped(|skip| matches!(skip, SkippedBox::Malformed(_)));

    for skip in &conversion.skipped {
        match skip {
            SkippedBox::Difficult => {}
            SkippedBox::UnknownClass(name) => report.add(ConversionIssue::warning(
                ConversionIssueCode::UnknownClass,
                file_name,
                format!("unknown class '{}'", name),
            )),
            SkippedBox::Malformed(bbox) => report.add(ConversionIssue::warning(
                ConversionIssueCode::MalformedBox,
                file_name,
                format!("malformed box {:?}", bbox),
            )),
        }
    }
}

fn issue_code_for(err: &YoloprepError) -> ConversionIssueCode {
    match err {
        YoloprepError::InvalidRecord { .. } => ConversionIssueCode::InvalidRecord,
        YoloprepError::VocXmlParse { .. } => ConversionIssueCode::ParseFailed,
        _ => ConversionIssueCode::WriteFailed,
    }
}

fn label_path_for(xml_path: &Path, output_dir: &Path) -> Result<PathBuf, YoloprepError> {
    let stem = xml_path
        .file_stem()
        .ok_or_else(|| YoloprepError::InvalidRecord {
            path: xml_path.to_path_buf(),
            message: "annotation file has no stem".to_string(),
        })?;
    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(LABEL_EXTENSION);
    Ok(output_dir.join(file_name))
}

/// Flat scan; nested XML files are reported and skipped.
fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, YoloprepError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(YoloprepError::Io)? {
        let entry = entry.map_err(YoloprepError::Io)?;
        let path = entry.path();
        if path.is_file() && voc::has_xml_extension(&path) {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| file_name_string(path));

    let nested = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && voc::has_xml_extension(entry.path()))
        .count();
    if nested > 0 {
        warn!(
            "Annotation directory is scanned flat; skipping {} nested .xml file(s) under {}",
            nested,
            dir.display()
        );
    }

    Ok(files)
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
