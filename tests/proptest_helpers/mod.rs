#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

use yoloprep::geom::{BBoxXYXY, Pixel};
use yoloprep::split::SplitSpec;

/// Pixel error allowed after a box goes through a 6-decimal label line.
pub fn eps_yolo(image_w: u32, image_h: u32) -> f64 {
    image_w.max(image_h) as f64 * 1e-6
}

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_dims() -> BoxedStrategy<(u32, u32)> {
    (1u32..=4096, 1u32..=4096).boxed()
}

/// A well-ordered box inside a `width x height` image.
pub fn arb_bbox_within(width: u32, height: u32) -> BoxedStrategy<BBoxXYXY<Pixel>> {
    let w = width as f64;
    let h = height as f64;
    (0.0..=w, 0.0..=w, 0.0..=h, 0.0..=h)
        .prop_map(|(x1, x2, y1, y2)| {
            BBoxXYXY::from_xyxy(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
        })
        .boxed()
}

/// Image dimensions plus up to `max_boxes` boxes inside them.
pub fn arb_image_with_boxes(max_boxes: usize) -> BoxedStrategy<(u32, u32, Vec<BBoxXYXY<Pixel>>)> {
    arb_image_dims()
        .prop_flat_map(move |(w, h)| {
            (
                Just(w),
                Just(h),
                prop::collection::vec(arb_bbox_within(w, h), 0..=max_boxes),
            )
        })
        .boxed()
}

/// Two to four named splits whose ratios are multiples of 0.05 summing to 1.
pub fn arb_split_spec() -> BoxedStrategy<SplitSpec> {
    prop::collection::vec(1u32..=10, 2..=4)
        .prop_map(|weights| {
            let total: u32 = weights.iter().sum();
            let names = ["train", "val", "test", "holdout"];
            let mut entries = Vec::with_capacity(weights.len());
            let mut assigned = 0.0;
            for (index, weight) in weights.iter().enumerate() {
                let ratio = if index + 1 == weights.len() {
                    1.0 - assigned
                } else {
                    (*weight as f64 / total as f64 * 20.0).floor() / 20.0
                };
                assigned += ratio;
                entries.push((names[index], ratio));
            }
            SplitSpec::new(entries).expect("generated spec is valid")
        })
        .boxed()
}
