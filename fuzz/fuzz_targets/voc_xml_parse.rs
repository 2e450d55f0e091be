//! Fuzz target for VOC XML parsing followed by conversion.
//!
//! Any record the parser accepts is also run through the converter, so a
//! panic in normalization shows up here too.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use yoloprep::convert::voc::from_voc_xml_slice;
use yoloprep::convert::{convert_record, ClassList};

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(record) = from_voc_xml_slice(data) else {
        return;
    };
    if let Ok(classes) = ClassList::new(["a", "b", "c"]) {
        let _ = convert_record(&record, &classes, Path::new("fuzz.xml"));
    }
});
