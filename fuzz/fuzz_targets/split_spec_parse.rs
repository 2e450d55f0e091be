//! Fuzz target for split specifications: parsing must not panic, and an
//! accepted specification must produce boundaries for any pool size.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yoloprep::split::SplitSpec;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(spec) = text.parse::<SplitSpec>() {
        for pool_size in [0, 1, 7, 1000] {
            let ends = spec.boundaries(pool_size);
            assert_eq!(ends.last().copied(), Some(pool_size));
        }
    }
});
