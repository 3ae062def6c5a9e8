//! Property-based tests for path normalization.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::LayerPath;
    use proptest::prelude::*;

    fn raw_path() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("".to_string()),
                Just(".".to_string()),
                Just("..".to_string()),
                "[a-z0-9_-]{1,8}",
            ],
            0..8,
        )
        .prop_map(|parts| format!("/{}", parts.join("/")))
    }

    proptest! {
        /// Property: normalization is idempotent
        #[test]
        fn normalize_is_idempotent(raw in raw_path()) {
            let once = LayerPath::new(&raw).unwrap();
            let twice = LayerPath::new(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }

        /// Property: the canonical form is absolute, has no trailing slash
        /// (except `/`), and no empty, `.` or `..` components
        #[test]
        fn canonical_form_is_clean(raw in raw_path()) {
            let path = LayerPath::new(&raw).unwrap();
            let s = path.as_str();
            prop_assert!(s.starts_with('/'));
            prop_assert!(s == "/" || !s.ends_with('/'));
            prop_assert!(!s.contains("//"));
            for component in path.components() {
                prop_assert!(component != "." && component != "..");
            }
        }

        /// Property: every ancestor is a prefix of the path
        #[test]
        fn ancestors_are_prefixes(raw in raw_path()) {
            let path = LayerPath::new(&raw).unwrap();
            let ancestors = path.ancestors();
            prop_assert_eq!(ancestors.len(), path.depth() + 1);
            for ancestor in &ancestors {
                prop_assert!(path.starts_with(ancestor));
            }
            prop_assert!(ancestors.last().unwrap().is_root());
        }

        /// Property: joining the stripped remainder onto the base gives the path back
        #[test]
        fn strip_prefix_then_join_roundtrips(raw in raw_path()) {
            let path = LayerPath::new(&raw).unwrap();
            for ancestor in path.ancestors() {
                let rest = path.strip_prefix(&ancestor).unwrap();
                prop_assert_eq!(ancestor.join(rest), path.clone());
            }
        }

        /// Property: relative paths are always rejected
        #[test]
        fn relative_paths_rejected(raw in "[a-z.][a-z0-9/.]{0,20}") {
            prop_assert!(LayerPath::new(&raw).is_err());
        }
    }
}
