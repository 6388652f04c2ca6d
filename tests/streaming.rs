use std::cell::Cell;

use stix_equiv::*;

const SEARCH: &str = "([a:b = 1] OR [c:d = 2]) AND [e:f = 3]";

fn candidates() -> Vec<String> {
    vec![
        "[e:f = 3] AND ([c:d = 2] OR [a:b = 1])".to_string(),
        "[a:b = 1]".to_string(),
        "([a:b = 1] AND [e:f = 3]) OR ([c:d = 2] AND [e:f = 3])".to_string(),
        "[a:b = 1] OR [c:d = 2] OR [e:f = 3]".to_string(),
        "([a:b = 1] AND [e:f = 3]) OR ([e:f = 3] AND [c:d = 2]) OR ([a:b = 1] AND [e:f = 3])".to_string(),
    ]
}

#[test]
fn test_matches_pairwise_filter_in_order() {
    let expected: Vec<String> = candidates()
        .into_iter()
        .filter(|c| equivalent_patterns(SEARCH, c, StixVersion::V2_1).unwrap())
        .collect();

    let found: Vec<String> = find_equivalent_patterns(SEARCH, candidates(), StixVersion::V2_1)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(found, expected);
    assert_eq!(found.len(), 3);
    assert_eq!(found[0], candidates()[0]);
}

#[test]
fn test_empty_candidates() {
    let mut found = find_equivalent_patterns(SEARCH, Vec::<&str>::new(), StixVersion::V2_1).unwrap();
    assert!(found.next().is_none());
    assert!(found.next().is_none());
}

#[test]
fn test_search_canonicalized_exactly_once() {
    struct Counting<'a> {
        inner: PatternEquivalence<'static>,
        calls: &'a Cell<usize>,
        search_calls: &'a Cell<usize>,
    }

    impl CanonicalForm for Counting<'_> {
        fn canonical_form(&self, pattern: &str) -> Result<ObservationExpr, EquivalenceError> {
            self.calls.set(self.calls.get() + 1);
            if pattern == SEARCH {
                self.search_calls.set(self.search_calls.get() + 1);
            }
            self.inner.canonical_form(pattern)
        }
    }

    for n in [0, 1, 10, 50] {
        let calls = Cell::new(0);
        let search_calls = Cell::new(0);
        let form = Counting {
            inner: PatternEquivalence::default(),
            calls: &calls,
            search_calls: &search_calls,
        };
        let pool: Vec<String> = candidates().into_iter().cycle().take(n).collect();

        let matched = EquivalentPatterns::new(form, SEARCH, pool.iter())
            .unwrap()
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(search_calls.get(), 1, "n = {}", n);
        assert_eq!(calls.get(), n + 1, "n = {}", n);
        assert!(matched <= n);
    }
}

#[test]
fn test_search_error_is_immediate() {
    let pulled = Cell::new(false);
    let result = find_equivalent_patterns(
        "[a:b = ]",
        std::iter::once("[a:b = 1]").inspect(|_| pulled.set(true)),
        StixVersion::V2_1,
    );
    assert!(matches!(result, Err(EquivalenceError::Parse(_))));
    assert!(!pulled.get());
}

#[test]
fn test_version_applies_to_candidates() {
    let found: Vec<_> = find_equivalent_patterns(
        "[a:b = 1] START '2016-01-01T00:00:00Z' STOP '2017-01-01T00:00:00Z'",
        ["[a:b = 1] START '2016-01-01T00:00:00Z' STOP '2017-01-01T00:00:00Z'"],
        StixVersion::V2_0,
    )
    .unwrap()
    .collect();
    assert_eq!(found.len(), 1);
    assert!(found[0].is_ok());
}
