use std::time::{Duration, SystemTime};

use flue::date::HttpDate;
use flue::etag::EntityTag;
use flue::method::Method;
use flue::precondition::{evaluate, EntityTagCondition, ModificationDateCondition, Preconditions};
use flue::response::Response;
use flue::status::StatusCode;

fn tagged(value: &str) -> Response {
    Response::ok().entity_tag(EntityTag::new(value).unwrap())
}

#[test]
fn if_none_match_wildcard_short_circuits_to_304_on_get() {
    let pre = Preconditions {
        entity_tag: Some(EntityTagCondition::IfNoneMatch("*")),
        modification_date: None,
    };
    let out = evaluate(tagged("anything"), &Method::Get, &pre);
    assert_eq!(*out.status_code(), StatusCode::NotModified);
}

#[test]
fn if_match_wildcard_matches_any_existing_representation() {
    let pre = Preconditions {
        entity_tag: Some(EntityTagCondition::IfMatch("*")),
        modification_date: None,
    };
    let out = evaluate(tagged("abc"), &Method::Put, &pre);
    assert_eq!(*out.status_code(), StatusCode::Ok);
}

#[test]
fn both_headers_present_entity_tag_branch_wins() {
    let now = HttpDate::now();
    let response = Response::ok()
        .entity_tag(EntityTag::new("abc").unwrap())
        .modification_date(now);
    let pre = Preconditions {
        entity_tag: Some(EntityTagCondition::IfMatch("\"zzz\"")),
        modification_date: Some(ModificationDateCondition::IfUnmodifiedSince(&now.to_string())),
    };
    // If-Match fails outright; If-Unmodified-Since is never consulted.
    let out = evaluate(response, &Method::Put, &pre);
    assert_eq!(*out.status_code(), StatusCode::PreconditionFailed);
}

#[test]
fn stale_if_modified_since_leaves_response_untouched() {
    let modified = HttpDate::from_system_time(SystemTime::now());
    let since = HttpDate::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    let response = Response::ok().modification_date(modified);
    let pre = Preconditions {
        entity_tag: None,
        modification_date: Some(ModificationDateCondition::IfModifiedSince(&since.to_string())),
    };
    let out = evaluate(response, &Method::Get, &pre);
    assert_eq!(*out.status_code(), StatusCode::Ok);
}

#[test]
fn no_preconditions_present_is_a_no_op() {
    let out = evaluate(Response::not_found(), &Method::Get, &Preconditions::default());
    assert_eq!(*out.status_code(), StatusCode::NotFound);
}
