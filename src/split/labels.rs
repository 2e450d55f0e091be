//! Locating the label file that belongs to an image.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::convert::LABEL_EXTENSION;
use crate::error::YoloprepError;

/// One `image root -> label root` entry of a [`LabelRule::RootMap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootMapping {
    pub image_root: PathBuf,
    pub label_root: PathBuf,
}

impl FromStr for RootMapping {
    type Err = YoloprepError;

    /// Parses `IMAGE_ROOT=LABEL_ROOT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (image_root, label_root) =
            s.split_once('=')
                .ok_or_else(|| YoloprepError::InvalidLabelRule {
                    message: format!("expected IMAGE_ROOT=LABEL_ROOT, got '{}'", s),
                })?;
        let (image_root, label_root) = (image_root.trim(), label_root.trim());
        if image_root.is_empty() || label_root.is_empty() {
            return Err(YoloprepError::InvalidLabelRule {
                message: format!("both roots are required in '{}'", s),
            });
        }
        Ok(Self {
            image_root: PathBuf::from(image_root),
            label_root: PathBuf::from(label_root),
        })
    }
}

impl fmt::Display for RootMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}",
            self.image_root.display(),
            self.label_root.display()
        )
    }
}

/// How an image path maps to its label path.
///
/// Both forms key on the image stem: `photo.jpg` pairs with `photo.txt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelRule {
    /// Every label lives directly in one directory.
    Directory(PathBuf),
    /// Labels mirror the image tree under a different root. The longest
    /// matching image root wins; an image under no root has no label.
    RootMap(Vec<RootMapping>),
}

impl LabelRule {
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self::Directory(dir.into())
    }

    pub fn root_map(mappings: Vec<RootMapping>) -> Result<Self, YoloprepError> {
        if mappings.is_empty() {
            return Err(YoloprepError::InvalidLabelRule {
                message: "at least one IMAGE_ROOT=LABEL_ROOT mapping is required".to_string(),
            });
        }
        for (index, mapping) in mappings.iter().enumerate() {
            if mappings[..index]
                .iter()
                .any(|earlier| earlier.image_root == mapping.image_root)
            {
                return Err(YoloprepError::InvalidLabelRule {
                    message: format!(
                        "image root {} is mapped more than once",
                        mapping.image_root.display()
                    ),
                });
            }
        }
        Ok(Self::RootMap(mappings))
    }

    /// Every directory the rule refers to must exist.
    pub fn validate(&self) -> Result<(), YoloprepError> {
        match self {
            LabelRule::Directory(dir) => require_dir(dir),
            LabelRule::RootMap(mappings) => {
                for mapping in mappings {
                    require_dir(&mapping.image_root)?;
                    require_dir(&mapping.label_root)?;
                }
                Ok(())
            }
        }
    }

    /// The same rule with every root resolved to an absolute canonical path,
    /// so `./data`, `data` and `/abs/data` all match one another.
    pub fn canonicalize(&self) -> Result<Self, YoloprepError> {
        match self {
            LabelRule::Directory(dir) => Ok(LabelRule::Directory(canonical_dir(dir)?)),
            LabelRule::RootMap(mappings) => mappings
                .iter()
                .map(|mapping| {
                    Ok(RootMapping {
                        image_root: canonical_dir(&mapping.image_root)?,
                        label_root: canonical_dir(&mapping.label_root)?,
                    })
                })
                .collect::<Result<Vec<_>, YoloprepError>>()
                .map(LabelRule::RootMap),
        }
    }

    /// The directory holding labels for images directly inside `image_dir`,
    /// or `None` when no image root covers it.
    pub fn label_dir(&self, image_dir: &Path) -> Option<PathBuf> {
        match self {
            LabelRule::Directory(dir) => Some(dir.clone()),
            LabelRule::RootMap(mappings) => {
                let mapping = mappings
                    .iter()
                    .filter(|mapping| image_dir.starts_with(&mapping.image_root))
                    .max_by_key(|mapping| mapping.image_root.components().count())?;
                let rel = image_dir.strip_prefix(&mapping.image_root).ok()?;
                Some(mapping.label_root.join(rel))
            }
        }
    }

    /// The path where `image`'s label should be. The file may not exist.
    pub fn resolve(&self, image: &Path) -> Option<PathBuf> {
        let file_name = label_file_name(image)?;
        let parent = image.parent().unwrap_or_else(|| Path::new(""));
        Some(self.label_dir(parent)?.join(file_name))
    }
}

/// `<stem>.txt` for an image path.
pub fn label_file_name(image: &Path) -> Option<OsString> {
    let stem = image.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(LABEL_EXTENSION);
    Some(name)
}

/// Absolute path of an existing directory, symlinks resolved.
pub fn canonical_dir(path: &Path) -> Result<PathBuf, YoloprepError> {
    fs::canonicalize(path).map_err(|_| YoloprepError::SourceDirMissing {
        path: path.to_path_buf(),
    })
}

fn require_dir(path: &Path) -> Result<(), YoloprepError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(YoloprepError::SourceDirMissing {
            path: path.to_path_buf(),
        })
    }
}
