//! Fuzz target for YOLO label-file parsing.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use yoloprep::geom::decode_label_file;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };

    let _ = decode_label_file(content, Path::new("fuzz.txt"));
});
