//! The `data.yaml` descriptor that training frameworks read.
//!
//! ```yaml
//! path: /abs/dataset/root
//! train: images/train
//! val: images/val
//! names:
//!   0: Car
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::convert::ClassList;
use crate::error::YoloprepError;

pub const DATA_YAML_FILE: &str = "data.yaml";

/// Split names the descriptor has a key for.
const KNOWN_SPLITS: [&str; 3] = ["train", "val", "test"];

#[derive(Debug, Serialize)]
struct DataYaml {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    train: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    val: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test: Option<String>,
    names: BTreeMap<usize, String>,
}

/// Render the descriptor for `root` without touching the file system
/// beyond resolving `root` to an absolute path.
pub fn render_data_yaml<'a>(
    root: &Path,
    splits: impl IntoIterator<Item = &'a str>,
    classes: &ClassList,
) -> Result<String, YoloprepError> {
    let absolute = absolute_root(root)?;
    let mut descriptor = DataYaml {
        path: absolute.to_string_lossy().replace('\\', "/"),
        train: None,
        val: None,
        test: None,
        names: classes.names().iter().cloned().enumerate().collect(),
    };

    for split in splits {
        let entry = Some(format!("images/{}", split));
        match split {
            "train" => descriptor.train = entry,
            "val" => descriptor.val = entry,
            "test" => descriptor.test = entry,
            other => debug!(
                "Split '{}' has no data.yaml key (known: {})",
                other,
                KNOWN_SPLITS.join(", ")
            ),
        }
    }

    serde_yaml::to_string(&descriptor).map_err(|source| YoloprepError::DataYamlWrite {
        path: root.join(DATA_YAML_FILE),
        source,
    })
}

/// Write `<root>/data.yaml` and return its path.
pub fn write_data_yaml<'a>(
    root: &Path,
    splits: impl IntoIterator<Item = &'a str>,
    classes: &ClassList,
) -> Result<PathBuf, YoloprepError> {
    let yaml = render_data_yaml(root, splits, classes)?;
    let path = root.join(DATA_YAML_FILE);
    fs::write(&path, yaml).map_err(YoloprepError::Io)?;
    info!("Wrote {}", path.display());
    Ok(path)
}

fn absolute_root(root: &Path) -> Result<PathBuf, YoloprepError> {
    if root.is_dir() {
        fs::canonicalize(root).map_err(YoloprepError::Io)
    } else {
        Err(YoloprepError::SourceDirMissing {
            path: root.to_path_buf(),
        })
    }
}
