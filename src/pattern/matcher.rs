//! Pattern evaluation.

use super::Pattern;

/// True when `data` is at least as long as `pattern` and every position is accepted.
pub fn matches(pattern: &Pattern, data: &[u8]) -> bool {
    let atoms = pattern.atoms();
    data.len() >= atoms.len()
        && atoms
            .iter()
            .zip(data)
            .all(|(atom, &byte)| atom.accepts(byte))
}

/// Smallest offset at which `pattern` matches, or `data.len()` when it never does.
pub fn search(pattern: &Pattern, data: &[u8]) -> usize {
    let length = pattern.min_length();
    if data.len() < length {
        return data.len();
    }
    let last = data.len() - length;

    match pattern.atoms().first().and_then(|atom| atom.exact_value()) {
        Some(first) => {
            let mut offset = 0;
            while offset <= last {
                let Some(found) = memchr::memchr(first, &data[offset..=last]) else {
                    break;
                };
                let candidate = offset + found;
                if matches(pattern, &data[candidate..]) {
                    return candidate;
                }
                offset = candidate + 1;
            }
        }
        None => {
            if let Some(candidate) = (0..=last).find(|&idx| matches(pattern, &data[idx..])) {
                return candidate;
            }
        }
    }
    data.len()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::pattern::strategies::{plant, sample};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn instantiation_matches(sample in sample()) {
            let pattern = Pattern::compile(&sample.text).unwrap();
            prop_assert_eq!(pattern.min_length(), sample.instance.len());
            prop_assert!(matches(&pattern, &sample.instance));
            prop_assert_eq!(search(&pattern, &sample.instance), 0);
        }

        #[test]
        fn search_finds_planted_match(
            sample in sample(),
            noise in proptest::collection::vec(any::<u8>(), 0..64),
            at in any::<usize>()
        ) {
            let pattern = Pattern::compile(&sample.text).unwrap();
            let (data, at) = plant(&noise, &sample, at);
            let found = search(&pattern, &data);
            prop_assert!(found <= at);
            prop_assert!(matches(&pattern, &data[found..]));
            prop_assert_eq!(search(&pattern, &data[found..]), 0);
        }
    }
}
