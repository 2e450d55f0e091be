//! Pascal VOC XML reader.
//!
//! One XML file describes one image: `<size>` carries the pixel dimensions
//! and every `<object>` carries a class name, a `difficult` flag and an
//! absolute `<bndbox>`.

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;

use super::{AnnotationRecord, BoxRecord};
use crate::error::YoloprepError;
use crate::geom::{BBoxXYXY, Pixel};

pub(crate) const VOC_XML_EXTENSION: &str = "xml";

/// Read and parse one VOC XML file.
pub fn read_voc_xml(path: &Path) -> Result<AnnotationRecord, YoloprepError> {
    let xml = fs::read_to_string(path).map_err(YoloprepError::Io)?;
    parse_voc_xml_str(&xml, path)
}

/// Parse VOC XML from a UTF-8 string.
pub fn from_voc_xml_str(xml: &str) -> Result<AnnotationRecord, YoloprepError> {
    parse_voc_xml_str(xml, Path::new("<memory>"))
}

/// Parse VOC XML from bytes. The input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<AnnotationRecord, YoloprepError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| YoloprepError::VocXmlParse {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_voc_xml_str(xml)
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<AnnotationRecord, YoloprepError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| YoloprepError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(YoloprepError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let filename = optional_child_text(annotation, "filename");

    let size = required_child_element(annotation, "size", path, "<annotation>")?;
    let image_width = parse_required_dimension(size, "width", path)?;
    let image_height = parse_required_dimension(size, "height", path)?;

    let mut boxes = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let class_name = required_child_text(object, "name", path, "<object>")?;
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        let xmin = parse_required_f64(bndbox, "xmin", path, "<bndbox>")?;
        let ymin = parse_required_f64(bndbox, "ymin", path, "<bndbox>")?;
        let xmax = parse_required_f64(bndbox, "xmax", path, "<bndbox>")?;
        let ymax = parse_required_f64(bndbox, "ymax", path, "<bndbox>")?;

        let is_difficult = optional_child_text(object, "difficult")
            .and_then(|raw| parse_bool_flag(&raw))
            .unwrap_or(false);

        boxes.push(BoxRecord {
            class_name,
            bbox: BBoxXYXY::<Pixel>::from_xyxy(xmin, ymin, xmax, ymax),
            is_difficult,
        });
    }

    Ok(AnnotationRecord {
        filename,
        image_width,
        image_height,
        boxes,
    })
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, YoloprepError> {
    child_element(node, tag).ok_or_else(|| YoloprepError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, YoloprepError> {
    optional_child_text(node, tag).ok_or_else(|| YoloprepError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

/// Image dimensions are integers, but some annotation tools write `640.0`.
/// Zero parses fine here; positivity is checked when the record is converted.
fn parse_required_dimension(
    size: Node<'_, '_>,
    tag: &str,
    path: &Path,
) -> Result<u32, YoloprepError> {
    let raw = required_child_text(size, tag, path, "<size>")?;
    if let Ok(value) = raw.parse::<u32>() {
        return Ok(value);
    }

    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) => {
            Ok(value as u32)
        }
        _ => Err(YoloprepError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!("invalid <{tag}> value '{raw}' in <size>; expected non-negative integer"),
        }),
    }
}

fn parse_required_f64(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<f64, YoloprepError> {
    let raw = required_child_text(node, tag, path, context)?;
    raw.parse::<f64>().map_err(|_| YoloprepError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!(
            "invalid <{tag}> value '{raw}' in {context}; expected floating-point number"
        ),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <filename>img1.jpg</filename>
  <size>
    <width>640</width>
    <height>480</height>
    <depth>3</depth>
  </size>
  <object>
    <name>Car</name>
    <difficult>0</difficult>
    <bndbox>
      <xmin>100</xmin>
      <ymin>50</ymin>
      <xmax>300</xmax>
      <ymax>250</ymax>
    </bndbox>
  </object>
  <object>
    <name>Car</name>
    <difficult>1</difficult>
    <bndbox>
      <xmin>1</xmin>
      <ymin>2</ymin>
      <xmax>3</xmax>
      <ymax>4</ymax>
    </bndbox>
  </object>
</annotation>"#;

    #[test]
    fn parses_size_and_objects_in_order() {
        let record = from_voc_xml_str(SAMPLE).expect("parse xml");
        assert_eq!(record.filename.as_deref(), Some("img1.jpg"));
        assert_eq!(record.image_width, 640);
        assert_eq!(record.image_height, 480);
        assert_eq!(record.boxes.len(), 2);
        assert_eq!(record.boxes[0].class_name, "Car");
        assert!(!record.boxes[0].is_difficult);
        assert_eq!(record.boxes[0].bbox.xmax(), 300.0);
        assert!(record.boxes[1].is_difficult);
    }

    #[test]
    fn missing_size_is_a_parse_error() {
        let xml = "<annotation><object><name>a</name></object></annotation>";
        let err = from_voc_xml_str(xml).expect_err("no size");
        assert!(err.to_string().contains("missing <size>"));
    }

    #[test]
    fn missing_bndbox_field_is_a_parse_error() {
        let xml = r#"<annotation><size><width>10</width><height>10</height></size>
<object><name>a</name><bndbox><xmin>1</xmin><ymin>1</ymin><xmax>2</xmax></bndbox></object>
</annotation>"#;
        let err = from_voc_xml_str(xml).expect_err("no ymax");
        assert!(err.to_string().contains("missing <ymax>"));
    }

    #[test]
    fn float_dimensions_are_accepted_when_integral() {
        let xml = "<annotation><size><width>640.0</width><height>480</height></size></annotation>";
        let record = from_voc_xml_str(xml).expect("parse");
        assert_eq!(record.image_width, 640);

        let xml = "<annotation><size><width>-5</width><height>480</height></size></annotation>";
        assert!(from_voc_xml_str(xml).is_err());
    }

    #[test]
    fn difficult_flag_accepts_words_and_defaults_to_false() {
        assert_eq!(parse_bool_flag("yes"), Some(true));
        assert_eq!(parse_bool_flag("TRUE"), Some(true));
        assert_eq!(parse_bool_flag("0"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);

        let xml = r#"<annotation><size><width>10</width><height>10</height></size>
<object><name>a</name><difficult>maybe</difficult>
<bndbox><xmin>1</xmin><ymin>1</ymin><xmax>2</xmax><ymax>2</ymax></bndbox></object>
</annotation>"#;
        let record = from_voc_xml_str(xml).expect("parse");
        assert!(!record.boxes[0].is_difficult);
    }

    #[test]
    fn rejects_non_utf8_and_wrong_root() {
        assert!(from_voc_xml_slice(&[0xff, 0xfe, 0x00]).is_err());
        let err = from_voc_xml_str("<root/>").expect_err("wrong root");
        assert!(err.to_string().contains("<annotation>"));
    }
}
