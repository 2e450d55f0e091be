use std::collections::BTreeSet;
use std::path::PathBuf;

use proptest::prelude::*;
use yoloprep::split::{assign_splits, DatasetItem};

mod proptest_helpers;

fn items(n: usize) -> Vec<DatasetItem> {
    (0..n)
        .map(|i| DatasetItem {
            stem: format!("img_{i:04}"),
            image: PathBuf::from(format!("img_{i:04}.jpg")),
            label: Some(PathBuf::from(format!("img_{i:04}.txt"))),
        })
        .collect()
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn boundaries_are_monotone_and_cover_the_pool(
        spec in proptest_helpers::arb_split_spec(),
        n in 0usize..500
    ) {
        let ends = spec.boundaries(n);
        prop_assert_eq!(ends.len(), spec.len());
        prop_assert_eq!(*ends.last().expect("at least one split"), n);
        prop_assert!(ends.windows(2).all(|pair| pair[0] <= pair[1]));

        let mut cumulative = 0.0;
        for ((_, ratio), end) in spec.entries().iter().zip(&ends).take(spec.len() - 1) {
            cumulative += ratio;
            let exact = n as f64 * cumulative;
            prop_assert!(
                (*end as f64 - exact.floor()).abs() <= 1.0,
                "end {} vs floor({})",
                end,
                exact
            );
        }
    }

    #[test]
    fn assignment_is_a_partition_of_the_pool(
        spec in proptest_helpers::arb_split_spec(),
        n in 0usize..200,
        seed in any::<u64>()
    ) {
        let splits = assign_splits(items(n), &spec, Some(seed));
        let ends = spec.boundaries(n);

        let mut start = 0;
        for (split, end) in splits.iter().zip(&ends) {
            prop_assert_eq!(split.items.len(), end - start);
            start = *end;
        }

        let stems: BTreeSet<String> = splits
            .iter()
            .flat_map(|split| split.items.iter().map(|item| item.stem.clone()))
            .collect();
        prop_assert_eq!(stems.len(), n);
    }

    #[test]
    fn same_seed_same_assignment(
        spec in proptest_helpers::arb_split_spec(),
        n in 0usize..100,
        seed in any::<u64>()
    ) {
        let mut shuffled = items(n);
        shuffled.reverse();
        prop_assert_eq!(
            assign_splits(items(n), &spec, Some(seed)),
            assign_splits(shuffled, &spec, Some(seed))
        );
    }
}
