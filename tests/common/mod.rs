#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// A VOC annotation with one `<object>` per `(name, difficult, xyxy)` entry.
pub fn voc_xml(
    filename: &str,
    width: u32,
    height: u32,
    objects: &[(&str, bool, (f64, f64, f64, f64))],
) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>images</folder>
  <filename>{filename}</filename>
  <size>
    <width>{width}</width>
    <height>{height}</height>
    <depth>3</depth>
  </size>
"#
    );
    for (name, difficult, (xmin, ymin, xmax, ymax)) in objects {
        xml.push_str(&format!(
            r#"  <object>
    <name>{name}</name>
    <difficult>{}</difficult>
    <bndbox>
      <xmin>{xmin}</xmin>
      <ymin>{ymin}</ymin>
      <xmax>{xmax}</xmax>
      <ymax>{ymax}</ymax>
    </bndbox>
  </object>
"#,
            if *difficult { 1 } else { 0 }
        ));
    }
    xml.push_str("</annotation>\n");
    xml
}

pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, contents).expect("write file");
}

/// `count` images `img_000.jpg..` in `images`, with labels in `labels` for
/// the first `labeled` of them. Image bytes are the stem, and the label's
/// class index is the image number, so pairs can be checked after transfer.
pub fn write_dataset(images: &Path, labels: &Path, count: usize, labeled: usize) {
    fs::create_dir_all(images).expect("create images dir");
    fs::create_dir_all(labels).expect("create labels dir");
    for i in 0..count {
        let stem = format!("img_{i:03}");
        write_file(&images.join(format!("{stem}.jpg")), stem.as_bytes());
        if i < labeled {
            write_file(
                &labels.join(format!("{stem}.txt")),
                format!("{i} 0.500000 0.500000 0.100000 0.100000\n"),
            );
        }
    }
}

/// Sorted file names directly inside `dir`; empty if it does not exist.
pub fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| {
            entry
                .expect("read dir entry")
                .file_name()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    names.sort();
    names
}

/// Sorted stems of the files directly inside `dir`.
pub fn stems(dir: &Path) -> Vec<String> {
    let mut stems: Vec<String> = file_names(dir)
        .into_iter()
        .map(|name| match name.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => name,
        })
        .collect();
    stems.sort();
    stems
}
