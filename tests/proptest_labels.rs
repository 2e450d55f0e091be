use std::path::Path;

use proptest::prelude::*;
use yoloprep::geom::{decode_label_file, encode_label_file, NormalizedBox};

mod proptest_helpers;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn boxes_inside_the_image_normalize_into_unit_range(
        (w, h, boxes) in proptest_helpers::arb_image_with_boxes(8)
    ) {
        for bbox in &boxes {
            let row = NormalizedBox::from_pixel(0, bbox, w, h);
            for value in [row.x_center, row.y_center, row.width, row.height] {
                prop_assert!((0.0..=1.0).contains(&value), "{} out of range for {:?}", value, bbox);
            }
        }
    }

    #[test]
    fn normalize_then_denormalize_restores_corners(
        (w, h, boxes) in proptest_helpers::arb_image_with_boxes(8)
    ) {
        for bbox in &boxes {
            let restored = NormalizedBox::from_pixel(0, bbox, w, h).to_pixel(w, h);
            prop_assert!((bbox.xmin() - restored.xmin()).abs() < 1e-4);
            prop_assert!((bbox.ymin() - restored.ymin()).abs() < 1e-4);
            prop_assert!((bbox.xmax() - restored.xmax()).abs() < 1e-4);
            prop_assert!((bbox.ymax() - restored.ymax()).abs() < 1e-4);
        }
    }

    #[test]
    fn label_file_roundtrip_stays_within_pixel_tolerance(
        (w, h, boxes) in proptest_helpers::arb_image_with_boxes(8)
    ) {
        let rows: Vec<NormalizedBox> = boxes
            .iter()
            .enumerate()
            .map(|(i, bbox)| NormalizedBox::from_pixel(i % 3, bbox, w, h))
            .collect();

        let body = encode_label_file(&rows);
        prop_assert_eq!(body.lines().count(), rows.len());
        let decoded = decode_label_file(&body, Path::new("prop.txt")).expect("decode");
        prop_assert_eq!(decoded.len(), boxes.len());

        let eps = proptest_helpers::eps_yolo(w, h);
        for ((original, row), decoded) in boxes.iter().zip(&rows).zip(&decoded) {
            prop_assert_eq!(row.class_index, decoded.class_index);
            let restored = decoded.to_pixel(w, h);
            prop_assert!((original.xmin() - restored.xmin()).abs() <= eps);
            prop_assert!((original.ymin() - restored.ymin()).abs() <= eps);
            prop_assert!((original.xmax() - restored.xmax()).abs() <= eps);
            prop_assert!((original.ymax() - restored.ymax()).abs() <= eps);
        }
    }

    #[test]
    fn every_field_is_written_with_six_decimals(
        (w, h, boxes) in proptest_helpers::arb_image_with_boxes(4)
    ) {
        for bbox in &boxes {
            let line = NormalizedBox::from_pixel(7, bbox, w, h).to_label_line();
            let tokens: Vec<&str> = line.split(' ').collect();
            prop_assert_eq!(tokens.len(), 5);
            prop_assert_eq!(tokens[0], "7");
            for token in &tokens[1..] {
                let decimals = token.split_once('.').map(|(_, frac)| frac.len());
                prop_assert_eq!(decimals, Some(6), "token {}", token);
            }
        }
    }
}
