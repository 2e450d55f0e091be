//! Partition report types.

use serde::Serialize;
use std::fmt;

use super::TransferMode;

/// Outcome of one partitioning run.
#[derive(Clone, Debug, Serialize)]
pub struct SplitReport {
    pub image_dir: String,
    pub output_root: String,
    pub mode: TransferMode,
    pub seed: Option<u64>,
    /// Image files found in the source directory.
    pub images_found: usize,
    /// Images that had a label and a unique stem; the pool that was split.
    pub paired: usize,
    /// Per-split results, in specification order.
    pub splits: Vec<SplitCount>,
    /// Image file names excluded because no label file was found.
    pub missing_labels: Vec<String>,
    /// Stems shared by more than one image; all such images are excluded.
    pub duplicate_stems: Vec<String>,
    /// Pairs that could not be transferred. Neither half was left behind.
    pub failures: Vec<TransferFailure>,
    /// Consistency of the output tree after the run.
    pub layout: LayoutCheck,
}

impl SplitReport {
    pub fn missing_label_count(&self) -> usize {
        self.missing_labels.len()
    }

    pub fn transferred(&self) -> usize {
        self.splits.iter().map(|split| split.transferred).sum()
    }

    /// Number of pairs that landed in `name`, if such a split exists.
    pub fn split_count(&self, name: &str) -> Option<usize> {
        self.splits
            .iter()
            .find(|split| split.name == name)
            .map(|split| split.transferred)
    }
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Partition completed ({}): {} -> {}",
            self.mode, self.image_dir, self.output_root
        )?;
        writeln!(
            f,
            "  {} image(s) found, {} paired with a label",
            self.images_found, self.paired
        )?;
        for split in &self.splits {
            writeln!(
                f,
                "  {}: {} pair(s){}",
                split.name,
                split.transferred,
                if split.failed > 0 {
                    format!(" ({} failed)", split.failed)
                } else {
                    String::new()
                }
            )?;
        }

        if !self.missing_labels.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "Skipped {} image(s) with no label:",
                self.missing_labels.len()
            )?;
            for name in self.missing_labels.iter().take(10) {
                writeln!(f, "  - {}", name)?;
            }
            if self.missing_labels.len() > 10 {
                writeln!(f, "  ... and {} more", self.missing_labels.len() - 10)?;
            }
        }

        if !self.duplicate_stems.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "Skipped {} ambiguous stem(s) shared by several images:",
                self.duplicate_stems.len()
            )?;
            for stem in &self.duplicate_stems {
                writeln!(f, "  - {}", stem)?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed transfers ({}):", self.failures.len())?;
            for failure in &self.failures {
                writeln!(f, "  - {} [{}]: {}", failure.stem, failure.split, failure.message)?;
            }
        }

        if !self.layout.is_consistent() {
            writeln!(f)?;
            write!(f, "{}", self.layout)?;
        }

        Ok(())
    }
}

/// Pairs per split.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SplitCount {
    pub name: String,
    /// Pairs assigned to this split.
    pub assigned: usize,
    /// Pairs whose image and label both arrived.
    pub transferred: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    pub split: String,
    pub stem: String,
    pub message: String,
}

/// Result of checking `images/<split>` against `labels/<split>`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LayoutCheck {
    /// `(split, stem)` of labels with no same-stem image in that split.
    pub orphan_labels: Vec<(String, String)>,
    /// `(split, stem)` of images with no same-stem label in that split.
    pub unlabeled_images: Vec<(String, String)>,
    /// Image stems present under more than one split.
    pub cross_split_stems: Vec<String>,
}

impl LayoutCheck {
    pub fn is_consistent(&self) -> bool {
        self.orphan_labels.is_empty()
            && self.unlabeled_images.is_empty()
            && self.cross_split_stems.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.orphan_labels.len() + self.unlabeled_images.len() + self.cross_split_stems.len()
    }
}

impl fmt::Display for LayoutCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_consistent() {
            return writeln!(f, "Layout check passed: every image has its label in the same split");
        }
        writeln!(f, "Layout check found problems:")?;
        for (split, stem) in &self.orphan_labels {
            writeln!(f, "  [{}] label '{}' has no image", split, stem)?;
        }
        for (split, stem) in &self.unlabeled_images {
            writeln!(f, "  [{}] image '{}' has no label", split, stem)?;
        }
        for stem in &self.cross_split_stems {
            writeln!(f, "  '{}' appears in more than one split", stem)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SplitReport {
        SplitReport {
            image_dir: "images".to_string(),
            output_root: "out".to_string(),
            mode: TransferMode::Copy,
            seed: Some(7),
            images_found: 10,
            paired: 8,
            splits: vec![
                SplitCount {
                    name: "train".to_string(),
                    assigned: 6,
                    transferred: 6,
                    failed: 0,
                },
                SplitCount {
                    name: "val".to_string(),
                    assigned: 2,
                    transferred: 2,
                    failed: 0,
                },
            ],
            missing_labels: vec!["a.jpg".to_string(), "b.jpg".to_string()],
            duplicate_stems: Vec::new(),
            failures: Vec::new(),
            layout: LayoutCheck::default(),
        }
    }

    #[test]
    fn counts_and_lookup() {
        let report = report();
        assert_eq!(report.transferred(), 8);
        assert_eq!(report.split_count("val"), Some(2));
        assert_eq!(report.split_count("test"), None);
        assert_eq!(report.missing_label_count(), 2);
    }

    #[test]
    fn display_lists_missing_labels() {
        let text = report().to_string();
        assert!(text.contains("train: 6 pair(s)"));
        assert!(text.contains("Skipped 2 image(s) with no label"));
        assert!(text.contains("- a.jpg"));
    }

    #[test]
    fn serializes_mode_in_lowercase() {
        let json = serde_json::to_string(&report()).expect("serialize");
        assert!(json.contains("\"mode\":\"copy\""));
        assert!(json.contains("\"missing_labels\":[\"a.jpg\",\"b.jpg\"]"));
    }

    #[test]
    fn layout_problems_make_it_inconsistent() {
        let mut check = LayoutCheck::default();
        assert!(check.is_consistent());
        check.orphan_labels.push(("val".to_string(), "x".to_string()));
        assert!(!check.is_consistent());
        assert_eq!(check.problem_count(), 1);
        assert!(check.to_string().contains("label 'x' has no image"));
    }
}
