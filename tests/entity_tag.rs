use flue::etag::{contains, validate, EntityTag, ParseError};

#[test]
fn strong_tags_built_from_distinct_values_round_trip_through_display() {
    let a = EntityTag::new("v1").unwrap();
    let b = EntityTag::weak("v1").unwrap();
    assert_eq!(a.to_string(), "\"v1\"");
    assert_eq!(b.to_string(), "W/\"v1\"");
    assert!(!a.is_weak());
    assert!(b.is_weak());
}

#[test]
fn contains_checks_membership_across_a_mixed_list() {
    let strong = EntityTag::new("abc").unwrap();
    let weak = EntityTag::weak("abc").unwrap();
    let list = "\"xyz\", W/\"abc\", \"def\"";
    assert_eq!(contains(&strong, list), Ok(false));
    assert_eq!(contains(&weak, list), Ok(true));
}

#[test]
fn validate_surfaces_the_specific_parse_error() {
    assert_eq!(validate("\"unterminated"), Err(ParseError::UnexpectedEnd));
    assert_eq!(validate("garbage"), Err(ParseError::UnexpectedLeadingChar));
}

#[test]
fn values_with_forbidden_bytes_are_rejected_at_construction() {
    assert!(EntityTag::new("has\"quote").is_err());
    assert!(EntityTag::new("has\0nul").is_err());
    assert!(EntityTag::new("plain-value").is_ok());
}
