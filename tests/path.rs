use flue::path::{components, standardized};

#[test]
fn components_splits_and_drops_empties() {
    assert_eq!(
        components("//api/v1//users/").collect::<Vec<_>>(),
        vec!["api", "v1", "users"]
    );
    assert_eq!(components("").collect::<Vec<_>>(), Vec::<&str>::new());
}

#[test]
fn standardized_collapses_traversal_without_escaping_root() {
    assert_eq!(standardized("/static/../../../etc/passwd"), "etc/passwd");
    assert_eq!(standardized("a/b/c/../../d"), "a/d");
}

#[test]
fn standardized_preserves_percent_encoded_segments_verbatim() {
    // Percent-decoding happens upstream (or not at all); this layer only
    // resolves `.`/`..` against raw path segments.
    assert_eq!(standardized("/docs/%2e%2e/secret"), "docs/%2e%2e/secret");
}

#[test]
fn standardized_of_root_is_empty() {
    assert_eq!(standardized("/"), "");
    assert_eq!(standardized(""), "");
}
