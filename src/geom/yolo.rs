//! YOLO-style center/size boxes and their label-file line encoding.

use std::path::Path;

use super::{BBoxXYXY, Normalized, Pixel};
use crate::error::YoloprepError;

/// Decimal places written for every normalized field.
pub const LABEL_PRECISION: usize = 6;

/// One row of a YOLO label file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub class_index: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    /// Normalizes a pixel box against the image it belongs to.
    pub fn from_pixel(
        class_index: usize,
        bbox: &BBoxXYXY<Pixel>,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let (x_center, y_center, width, height) =
            bbox.to_cxcywh_normalized(image_width as f64, image_height as f64);
        Self {
            class_index,
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Inverse of [`NormalizedBox::from_pixel`] for the same image dimensions.
    pub fn to_pixel(&self, image_width: u32, image_height: u32) -> BBoxXYXY<Pixel> {
        BBoxXYXY::<Normalized>::from_cxcywh(self.x_center, self.y_center, self.width, self.height)
            .to_pixel(image_width as f64, image_height as f64)
    }

    /// `class x_center y_center width height`, no trailing newline.
    pub fn to_label_line(&self) -> String {
        let mut line = self.class_index.to_string();
        for value in [self.x_center, self.y_center, self.width, self.height] {
            line.push_str(&format!(" {:.*}", LABEL_PRECISION, value));
        }
        line
    }

    /// Parses one label line. Blank lines yield `Ok(None)`.
    pub fn from_label_line(
        line: &str,
        file_path: &Path,
        line_num: usize,
    ) -> Result<Option<Self>, YoloprepError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        // At most 6 tokens, so a garbage line cannot allocate without bound.
        let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
        if tokens.len() != 5 {
            return Err(YoloprepError::YoloLabelParse {
                path: file_path.to_path_buf(),
                line: line_num,
                message: format!("expected 5 tokens, found {}", tokens.len()),
            });
        }

        let class_index =
            tokens[0]
                .parse::<usize>()
                .map_err(|_| YoloprepError::YoloLabelParse {
                    path: file_path.to_path_buf(),
                    line: line_num,
                    message: format!(
                        "invalid class index '{}'; expected non-negative integer",
                        tokens[0]
                    ),
                })?;

        Ok(Some(Self {
            class_index,
            x_center: parse_f64_token(tokens[1], "x_center", file_path, line_num)?,
            y_center: parse_f64_token(tokens[2], "y_center", file_path, line_num)?,
            width: parse_f64_token(tokens[3], "width", file_path, line_num)?,
            height: parse_f64_token(tokens[4], "height", file_path, line_num)?,
        }))
    }
}

/// Encodes rows as a label file body; every row is newline-terminated.
pub fn encode_label_file(boxes: &[NormalizedBox]) -> String {
    let mut body = String::new();
    for row in boxes {
        body.push_str(&row.to_label_line());
        body.push('\n');
    }
    body
}

/// Parses a whole label file body.
pub fn decode_label_file(content: &str, file_path: &Path) -> Result<Vec<NormalizedBox>, YoloprepError> {
    let mut rows = Vec::new();
    for (line_idx, line) in content.lines().enumerate() {
        if let Some(row) = NormalizedBox::from_label_line(line, file_path, line_idx + 1)? {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn parse_f64_token(
    raw: &str,
    field_name: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<f64, YoloprepError> {
    raw.parse::<f64>()
        .map_err(|_| YoloprepError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!("invalid {field_name} '{raw}'; expected floating-point number"),
        })
}
