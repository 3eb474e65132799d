use flue::accept_language::{AcceptLanguage, LanguageTag};

#[test]
fn ranks_items_by_weight_then_header_order() {
    let mut items: Vec<_> = AcceptLanguage::new("da, en-gb;q=0.8, en;q=0.7").collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    let ordered: Vec<_> = items.into_iter().map(|(tag, _)| tag).collect();
    assert_eq!(
        ordered,
        vec![
            LanguageTag::Tag("da".into()),
            LanguageTag::Tag("en-gb".into()),
            LanguageTag::Tag("en".into()),
        ]
    );
}

#[test]
fn wildcard_is_a_distinct_tag_from_any_language() {
    let items: Vec<_> = AcceptLanguage::new("fr;q=0.5,*;q=0.1")
        .map(|(tag, _)| tag)
        .collect();
    assert_eq!(
        items,
        vec![LanguageTag::Tag("fr".into()), LanguageTag::Wildcard]
    );
}

#[test]
fn malformed_weight_halts_the_iterator_without_panicking() {
    let items: Vec<_> = AcceptLanguage::new("en;q=abc,fr").collect();
    assert!(items.is_empty());
}

#[test]
fn tags_are_lowercased() {
    let items: Vec<_> = AcceptLanguage::new("EN-US").map(|(tag, _)| tag).collect();
    assert_eq!(items, vec![LanguageTag::Tag("en-us".into())]);
}
