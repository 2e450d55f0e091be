//! Dataset Partitioner: image/label pairs into named split directories.
//!
//! The pool is every image in a source directory whose label resolves
//! through a [`LabelRule`]. Images without a label are left out of the pool
//! before splitting; they are never transferred and are listed in the
//! report. The pool is sorted, shuffled (seedable), and cut at the
//! boundaries of a [`SplitSpec`]. Each pair then lands in
//!
//! ```text
//! <root>/images/<split>/<stem>.<ext>
//! <root>/labels/<split>/<stem>.txt
//! ```
//!
//! An image and its label move as one step: if the label cannot be
//! transferred the image transfer is undone. Split directories that already
//! hold files are refused unless the caller opts in, and the run fails if
//! the finished tree has a stem in two splits or a half pair.

pub mod labels;
pub mod report;
pub mod spec;

pub use labels::{canonical_dir, label_file_name, LabelRule, RootMapping};
pub use report::{LayoutCheck, SplitCount, SplitReport, TransferFailure};
pub use spec::{SplitSpec, RATIO_TOLERANCE};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use walkdir::WalkDir;

use crate::convert::LABEL_EXTENSION;
use crate::error::YoloprepError;

/// Image file extensions considered part of the pool (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// This many failed pairs in a row means the destination itself is broken.
const MAX_CONSECUTIVE_FAILURES: usize = 8;

/// Whether source files stay in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Sources remain; used to build a derived subset.
    Copy,
    /// Sources are relocated; used to reorganize a dataset in place.
    Move,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Copy => write!(f, "copy"),
            TransferMode::Move => write!(f, "move"),
        }
    }
}

/// An image and, if one was found, its label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetItem {
    pub stem: String,
    pub image: PathBuf,
    pub label: Option<PathBuf>,
}

/// The candidate set for one run.
#[derive(Clone, Debug, Default)]
pub struct Pool {
    /// Items with an existing label and a unique stem, sorted by image name.
    pub paired: Vec<DatasetItem>,
    /// Items whose label does not exist.
    pub missing_labels: Vec<DatasetItem>,
    /// Stems claimed by more than one image.
    pub duplicate_stems: Vec<String>,
    pub images_found: usize,
}

/// The items that went to one split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitAssignment {
    pub name: String,
    pub items: Vec<DatasetItem>,
}

/// Everything one partitioning run needs.
#[derive(Clone, Debug)]
pub struct PartitionOptions {
    pub image_dir: PathBuf,
    pub labels: LabelRule,
    pub output_root: PathBuf,
    pub spec: SplitSpec,
    pub mode: TransferMode,
    /// `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
    /// Accept split directories that already hold files. The layout check
    /// at the end of the run still has to pass.
    pub allow_existing: bool,
}

/// Scan `image_dir` (flat) and pair every image with its label.
pub fn collect_pool(image_dir: &Path, labels: &LabelRule) -> Result<Pool, YoloprepError> {
    let images = collect_images(image_dir)?;
    let mut pool = Pool {
        images_found: images.len(),
        ..Default::default()
    };

    let mut by_stem: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for image in images {
        let Some(stem) = image.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        by_stem.entry(stem).or_default().push(image);
    }

    for (stem, mut images) in by_stem {
        if images.len() > 1 {
            warn!(
                "Stem '{}' is shared by {} images; excluding all of them",
                stem,
                images.len()
            );
            pool.duplicate_stems.push(stem);
            continue;
        }

        let image = images.remove(0);
        let label = labels.resolve(&image).filter(|path| path.is_file());
        let item = DatasetItem {
            stem,
            image,
            label,
        };

        if item.label.is_some() {
            pool.paired.push(item);
        } else {
            warn!("No label for {}; image skipped", item.image.display());
            pool.missing_labels.push(item);
        }
    }

    pool.paired.sort_by_cached_key(|item| file_name_string(&item.image));
    pool.missing_labels
        .sort_by_cached_key(|item| file_name_string(&item.image));
    Ok(pool)
}

/// Shuffle `items` and cut them into the splits of `spec`.
///
/// Items are sorted by image file name first, so the result depends only on
/// the seed and the set of names, not on directory enumeration order.
pub fn assign_splits(
    mut items: Vec<DatasetItem>,
    spec: &SplitSpec,
    seed: Option<u64>,
) -> Vec<SplitAssignment> {
    items.sort_by_cached_key(|item| file_name_string(&item.image));

    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        items.shuffle(&mut rng);
    }

    let boundaries = spec.boundaries(items.len());
    let mut remaining = items.into_iter();
    let mut start = 0;
    spec.names()
        .zip(boundaries)
        .map(|(name, end)| {
            let taken: Vec<DatasetItem> = remaining.by_ref().take(end - start).collect();
            start = end;
            SplitAssignment {
                name: name.to_string(),
                items: taken,
            }
        })
        .collect()
}

/// Run a full partition: preflight, pool, assignment, transfer, layout check.
///
/// Returns an error rather than a report when the output tree does not hold
/// every transferred pair together in exactly one split.
pub fn partition_dataset(opts: &PartitionOptions) -> Result<SplitReport, YoloprepError> {
    if !opts.image_dir.is_dir() {
        return Err(YoloprepError::SourceDirMissing {
            path: opts.image_dir.clone(),
        });
    }
    opts.labels.validate()?;

    let image_dir = canonical_dir(&opts.image_dir)?;
    let labels = opts.labels.canonicalize()?;
    let Some(label_dir) = labels.label_dir(&image_dir) else {
        return Err(YoloprepError::InvalidLabelRule {
            message: format!(
                "no image root of the label map contains {}",
                opts.image_dir.display()
            ),
        });
    };

    check_targets(opts, &image_dir, &label_dir)?;
    let split_dirs = prepare_output_dirs(&opts.output_root, &opts.spec)?;

    let pool = collect_pool(&image_dir, &labels)?;
    info!(
        "Found {} image(s), {} paired, {} missing a label",
        pool.images_found,
        pool.paired.len(),
        pool.missing_labels.len()
    );

    let mut report = SplitReport {
        image_dir: opts.image_dir.display().to_string(),
        output_root: opts.output_root.display().to_string(),
        mode: opts.mode,
        seed: opts.seed,
        images_found: pool.images_found,
        paired: pool.paired.len(),
        splits: Vec::new(),
        missing_labels: pool
            .missing_labels
            .iter()
            .map(|item| file_name_string(&item.image))
            .collect(),
        duplicate_stems: pool.duplicate_stems.clone(),
        failures: Vec::new(),
        layout: LayoutCheck::default(),
    };

    let assignments = assign_splits(pool.paired, &opts.spec, opts.seed);
    let mut consecutive_failures = 0;

    for (assignment, (images_dir, labels_dir)) in assignments.iter().zip(&split_dirs) {
        let mut count = SplitCount {
            name: assignment.name.clone(),
            assigned: assignment.items.len(),
            ..Default::default()
        };
        info!(
            "{} {} pair(s) into '{}'",
            if opts.mode == TransferMode::Move {
                "Moving"
            } else {
                "Copying"
            },
            assignment.items.len(),
            assignment.name
        );

        for item in &assignment.items {
            match transfer_pair(item, images_dir, labels_dir, opts.mode) {
                Ok(()) => {
                    count.transferred += 1;
                    consecutive_failures = 0;
                }
                Err(err) => {
                    error!("Failed to transfer '{}': {}", item.stem, err);
                    count.failed += 1;
                    consecutive_failures += 1;
                    report.failures.push(TransferFailure {
                        split: assignment.name.clone(),
                        stem: item.stem.clone(),
                        message: err.to_string(),
                    });
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        report.splits.push(count);
                        error!("Aborting; transferred so far: {}", split_summary(&report));
                        return Err(YoloprepError::TransferAborted {
                            failures: consecutive_failures,
                            transferred: report.transferred(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        report.splits.push(count);
    }

    let split_names: Vec<&str> = opts.spec.names().collect();
    report.layout = verify_layout(&opts.output_root, &split_names)?;
    if !report.layout.is_consistent() {
        error!("{}", report.layout);
        return Err(YoloprepError::InconsistentLayout {
            root: opts.output_root.clone(),
            problems: report.layout.problem_count(),
        });
    }

    info!("Done! {}", split_summary(&report));
    if !report.missing_labels.is_empty() {
        warn!(
            "{} image(s) had no label and were not transferred",
            report.missing_labels.len()
        );
    }

    Ok(report)
}

/// Copy every labeled image into a single split, e.g. a held-out test set.
pub fn build_subset(
    image_dir: &Path,
    labels: LabelRule,
    output_root: &Path,
    split_name: &str,
    allow_existing: bool,
) -> Result<SplitReport, YoloprepError> {
    partition_dataset(&PartitionOptions {
        image_dir: image_dir.to_path_buf(),
        labels,
        output_root: output_root.to_path_buf(),
        spec: SplitSpec::single(split_name)?,
        mode: TransferMode::Copy,
        seed: Some(0),
        allow_existing,
    })
}

/// Compare image and label stems under every split of `root`.
pub fn verify_layout(root: &Path, split_names: &[&str]) -> Result<LayoutCheck, YoloprepError> {
    let mut check = LayoutCheck::default();
    let mut seen_in: BTreeMap<String, usize> = BTreeMap::new();

    for split in split_names {
        let image_stems = stems_in(&root.join("images").join(split), &IMAGE_EXTENSIONS)?;
        let label_stems = stems_in(&root.join("labels").join(split), &[LABEL_EXTENSION])?;

        for stem in label_stems.difference(&image_stems) {
            check
                .orphan_labels
                .push((split.to_string(), stem.clone()));
        }
        for stem in image_stems.difference(&label_stems) {
            check
                .unlabeled_images
                .push((split.to_string(), stem.clone()));
        }
        for stem in image_stems {
            *seen_in.entry(stem).or_insert(0) += 1;
        }
    }

    check.cross_split_stems = seen_in
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(stem, _)| stem)
        .collect();
    Ok(check)
}

/// Rejects target directories that are also sources, or that already hold
/// files when `allow_existing` is off. Nothing has been written yet.
fn check_targets(
    opts: &PartitionOptions,
    image_dir: &Path,
    label_dir: &Path,
) -> Result<(), YoloprepError> {
    for name in opts.spec.names() {
        for dir in [
            opts.output_root.join("images").join(name),
            opts.output_root.join("labels").join(name),
        ] {
            if !dir.is_dir() {
                continue;
            }
            let canonical = canonical_dir(&dir)?;
            if canonical == image_dir || canonical == label_dir {
                return Err(YoloprepError::SourceIsDestination { path: dir });
            }
            if !opts.allow_existing && fs::read_dir(&dir)?.next().is_some() {
                return Err(YoloprepError::DestinationNotEmpty { path: dir });
            }
        }
    }
    Ok(())
}

/// Creates `images/<split>` and `labels/<split>` for every split. Failure
/// here means nothing can be written, so it is fatal.
fn prepare_output_dirs(
    root: &Path,
    spec: &SplitSpec,
) -> Result<Vec<(PathBuf, PathBuf)>, YoloprepError> {
    spec.names()
        .map(|name| {
            let images_dir = root.join("images").join(name);
            let labels_dir = root.join("labels").join(name);
            for dir in [&images_dir, &labels_dir] {
                fs::create_dir_all(dir).map_err(|source| {
                    YoloprepError::DestinationUnwritable {
                        path: dir.clone(),
                        source,
                    }
                })?;
            }
            Ok((images_dir, labels_dir))
        })
        .collect()
}

fn transfer_pair(
    item: &DatasetItem,
    images_dir: &Path,
    labels_dir: &Path,
    mode: TransferMode,
) -> Result<(), YoloprepError> {
    let label = item
        .label
        .as_deref()
        .ok_or_else(|| YoloprepError::InvalidLabelRule {
            message: format!("'{}' has no label", item.stem),
        })?;
    let image_name = item
        .image
        .file_name()
        .ok_or_else(|| YoloprepError::InvalidLabelRule {
            message: format!("'{}' has no file name", item.image.display()),
        })?;
    let label_name = label_file_name(&item.image).ok_or_else(|| {
        YoloprepError::InvalidLabelRule {
            message: format!("'{}' has no file stem", item.image.display()),
        }
    })?;

    let image_dest = images_dir.join(image_name);
    let label_dest = labels_dir.join(label_name);
    // A copy over an earlier file has nothing to undo.
    let replaced = mode == TransferMode::Copy && image_dest.exists();

    transfer_file(&item.image, &image_dest, mode)?;
    if let Err(err) = transfer_file(label, &label_dest, mode) {
        if replaced {
            return Err(err);
        }
        if let Err(undo_err) = undo_transfer(&item.image, &image_dest, mode) {
            error!(
                "Could not undo image transfer {} -> {}: {}",
                item.image.display(),
                image_dest.display(),
                undo_err
            );
        }
        return Err(err);
    }

    debug!("{} {} -> {}", mode, item.stem, images_dir.display());
    Ok(())
}

fn transfer_file(src: &Path, dest: &Path, mode: TransferMode) -> Result<(), YoloprepError> {
    match mode {
        TransferMode::Copy => {
            fs::copy(src, dest).map_err(YoloprepError::Io)?;
        }
        TransferMode::Move => move_file(src, dest)?,
    }
    Ok(())
}

fn undo_transfer(src: &Path, dest: &Path, mode: TransferMode) -> Result<(), YoloprepError> {
    match mode {
        TransferMode::Copy => fs::remove_file(dest).map_err(YoloprepError::Io),
        TransferMode::Move => move_file(dest, src),
    }
}

/// `rename`, falling back to copy + remove across filesystems.
fn move_file(src: &Path, dest: &Path) -> Result<(), YoloprepError> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest).map_err(YoloprepError::Io)?;
    fs::remove_file(src).map_err(YoloprepError::Io)
}

/// Flat scan; nested images are reported and skipped.
fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, YoloprepError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(YoloprepError::Io)? {
        let entry = entry.map_err(YoloprepError::Io)?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, &IMAGE_EXTENSIONS) {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| file_name_string(path));

    let nested = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file() && has_extension(entry.path(), &IMAGE_EXTENSIONS)
        })
        .count();
    if nested > 0 {
        warn!(
            "Image directory is scanned flat; skipping {} nested image(s) under {}",
            nested,
            dir.display()
        );
    }

    Ok(files)
}

fn stems_in(dir: &Path, extensions: &[&str]) -> Result<BTreeSet<String>, YoloprepError> {
    let mut stems = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(stems);
    }
    for entry in fs::read_dir(dir).map_err(YoloprepError::Io)? {
        let path = entry.map_err(YoloprepError::Io)?.path();
        if path.is_file() && has_extension(&path, extensions) {
            if let Some(stem) = path.file_stem() {
                stems.insert(stem.to_string_lossy().to_string());
            }
        }
    }
    Ok(stems)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

fn split_summary(report: &SplitReport) -> String {
    report
        .splits
        .iter()
        .map(|split| format!("{}: {}", split.name, split.transferred))
        .collect::<Vec<_>>()
        .join("  |  ")
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<DatasetItem> {
        (0..n)
            .map(|i| DatasetItem {
                stem: format!("img_{i:03}"),
                image: PathBuf::from(format!("img_{i:03}.jpg")),
                label: Some(PathBuf::from(format!("img_{i:03}.txt"))),
            })
            .collect()
    }

    #[test]
    fn assignment_sizes_follow_floor_rule() {
        let spec = SplitSpec::binary(0.8).expect("spec");
        let splits = assign_splits(items(8), &spec, Some(1));
        assert_eq!(splits[0].name, "train");
        assert_eq!(splits[0].items.len(), 6);
        assert_eq!(splits[1].name, "val");
        assert_eq!(splits[1].items.len(), 2);
    }

    #[test]
    fn assignment_is_deterministic_with_seed() {
        let spec: SplitSpec = "train=0.6,val=0.2,test=0.2".parse().expect("spec");
        let a = assign_splits(items(25), &spec, Some(42));
        let mut reversed = items(25);
        reversed.reverse();
        let b = assign_splits(reversed, &spec, Some(42));
        assert_eq!(a, b);
    }

    #[test]
    fn assignment_is_disjoint_and_exhaustive() {
        let spec: SplitSpec = "train=0.5,val=0.3,test=0.2".parse().expect("spec");
        let splits = assign_splits(items(17), &spec, None);
        let mut all: Vec<String> = splits
            .iter()
            .flat_map(|split| split.items.iter().map(|item| item.stem.clone()))
            .collect();
        assert_eq!(all.len(), 17);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 17);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_extension(Path::new("a.JPG"), &IMAGE_EXTENSIONS));
        assert!(has_extension(Path::new("a.webp"), &IMAGE_EXTENSIONS));
        assert!(!has_extension(Path::new("a.gif"), &IMAGE_EXTENSIONS));
        assert!(!has_extension(Path::new("jpg"), &IMAGE_EXTENSIONS));
    }

    #[test]
    fn failed_label_copy_removes_copied_image() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        let images_dir = temp.path().join("out/images/train");
        let labels_dir = temp.path().join("out/labels/train");
        fs::create_dir_all(&src).expect("create src");
        fs::create_dir_all(&images_dir).expect("create images dir");
        fs::create_dir_all(&labels_dir).expect("create labels dir");
        fs::write(src.join("a.jpg"), b"jpg").expect("write image");

        let item = DatasetItem {
            stem: "a".to_string(),
            image: src.join("a.jpg"),
            label: Some(src.join("gone.txt")),
        };
        assert!(transfer_pair(&item, &images_dir, &labels_dir, TransferMode::Copy).is_err());
        assert!(!images_dir.join("a.jpg").exists());
        assert!(src.join("a.jpg").exists());
    }

    #[test]
    fn failed_label_move_restores_image() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let src = temp.path().join("src");
        let images_dir = temp.path().join("out/images/train");
        let labels_dir = temp.path().join("out/labels/train");
        fs::create_dir_all(&src).expect("create src");
        fs::create_dir_all(&images_dir).expect("create images dir");
        fs::create_dir_all(&labels_dir).expect("create labels dir");
        fs::write(src.join("a.jpg"), b"jpg").expect("write image");

        let item = DatasetItem {
            stem: "a".to_string(),
            image: src.join("a.jpg"),
            label: Some(src.join("gone.txt")),
        };
        assert!(transfer_pair(&item, &images_dir, &labels_dir, TransferMode::Move).is_err());
        assert!(!images_dir.join("a.jpg").exists());
        assert_eq!(fs::read(src.join("a.jpg")).expect("read image"), b"jpg");
    }
}
