//! Conditional-request evaluation (RFC 9110 §13): `If-Match`,
//! `If-None-Match`, `If-Modified-Since`, `If-Unmodified-Since`.

use crate::etag;
use crate::method::Method;
use crate::response::Response;
use crate::status::StatusCode;

/// The raw `If-Match`/`If-None-Match` header present on a request, if any.
#[derive(Debug, Clone, Copy)]
pub enum EntityTagCondition<'a> {
    /// The raw `If-Match` header value.
    IfMatch(&'a str),
    /// The raw `If-None-Match` header value.
    IfNoneMatch(&'a str),
}

/// The raw `If-Modified-Since`/`If-Unmodified-Since` header present on a
/// request, if any.
#[derive(Debug, Clone, Copy)]
pub enum ModificationDateCondition<'a> {
    /// The raw `If-Modified-Since` header value.
    IfModifiedSince(&'a str),
    /// The raw `If-Unmodified-Since` header value.
    IfUnmodifiedSince(&'a str),
}

/// The conditional-request headers extracted from one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preconditions<'a> {
    /// The raw `If-Match`/`If-None-Match` header, if either was present.
    pub entity_tag: Option<EntityTagCondition<'a>>,
    /// The raw `If-Modified-Since`/`If-Unmodified-Since` header, if either
    /// was present.
    pub modification_date: Option<ModificationDateCondition<'a>>,
}

/// Evaluate `pre` against `response`, returning either `response` unchanged
/// or a replacement with status `304`/`412` (keeping `response`'s
/// `ETag`/`Last-Modified`/other headers, and — per the body-producer
/// invariant — clearing the body only for the `304` outcome).
///
/// Evaluation order, per §4.4: the entity-tag branch runs first; the
/// modification-date branch runs only if the entity-tag branch reached no
/// verdict, and is skipped entirely whenever an `If-None-Match` header was
/// present (regardless of its own verdict) since entity tags take
/// precedence over dates for freshness purposes.
pub fn evaluate(response: Response, method: &Method, pre: &Preconditions<'_>) -> Response {
    if let Some(status) = evaluate_entity_tag(&response, method, pre) {
        return apply(response, status);
    }

    if matches!(pre.entity_tag, Some(EntityTagCondition::IfNoneMatch(_))) {
        return response;
    }

    if let Some(status) = evaluate_modification_date(&response, method, pre) {
        return apply(response, status);
    }

    response
}

fn apply(mut response: Response, status: StatusCode) -> Response {
    let is_not_modified = status == StatusCode::NotModified;
    response.set_status(status);
    if is_not_modified {
        response.clear_body();
    }
    response
}

fn evaluate_entity_tag(
    response: &Response,
    method: &Method,
    pre: &Preconditions<'_>,
) -> Option<StatusCode> {
    match pre.entity_tag {
        Some(EntityTagCondition::IfMatch(raw)) => evaluate_if_match(response, raw),
        Some(EntityTagCondition::IfNoneMatch(raw)) => evaluate_if_none_match(response, method, raw),
        None => None,
    }
}

fn evaluate_if_match(response: &Response, raw: &str) -> Option<StatusCode> {
    match response.entity_tag_ref() {
        Some(tag) if !tag.is_weak() => match etag::contains(tag, raw) {
            Ok(true) => None,
            Ok(false) => Some(StatusCode::PreconditionFailed),
            Err(_) => None,
        },
        // No entity tag, or only a weak one: `If-Match` requires a strong
        // comparison, which a weak tag (or no tag at all) can never satisfy.
        _ => match etag::validate(raw) {
            Ok(()) => Some(StatusCode::PreconditionFailed),
            Err(_) => None,
        },
    }
}

fn evaluate_if_none_match(response: &Response, method: &Method, raw: &str) -> Option<StatusCode> {
    let tag = response.entity_tag_ref()?;
    match etag::contains(tag, raw) {
        Ok(true) => {
            if matches!(method, Method::Get | Method::Head) {
                Some(StatusCode::NotModified)
            } else {
                Some(StatusCode::PreconditionFailed)
            }
        }
        Ok(false) => None,
        Err(_) => None,
    }
}

fn evaluate_modification_date(
    response: &Response,
    method: &Method,
    pre: &Preconditions<'_>,
) -> Option<StatusCode> {
    match pre.modification_date {
        Some(ModificationDateCondition::IfModifiedSince(raw)) => {
            evaluate_if_modified_since(response, method, raw)
        }
        Some(ModificationDateCondition::IfUnmodifiedSince(raw)) => {
            evaluate_if_unmodified_since(response, raw)
        }
        None => None,
    }
}

fn evaluate_if_modified_since(
    response: &Response,
    method: &Method,
    raw: &str,
) -> Option<StatusCode> {
    if !matches!(method, Method::Get | Method::Head) {
        return None;
    }
    let since = crate::date::HttpDate::parse(raw).ok()?;
    let modified = response.modification_date_ref()?;
    if modified <= since {
        Some(StatusCode::NotModified)
    } else {
        None
    }
}

fn evaluate_if_unmodified_since(response: &Response, raw: &str) -> Option<StatusCode> {
    let since = crate::date::HttpDate::parse(raw).ok()?;
    let modified = response.modification_date_ref()?;
    if modified > since {
        Some(StatusCode::PreconditionFailed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::HttpDate;
    use crate::etag::EntityTag;
    use std::time::{Duration, SystemTime};

    fn tagged_response() -> Response {
        Response::ok().entity_tag(EntityTag::new("abc").unwrap())
    }

    #[test]
    fn if_match_failing_returns_412() {
        let pre = Preconditions {
            entity_tag: Some(EntityTagCondition::IfMatch("\"xyz\"")),
            modification_date: None,
        };
        let out = evaluate(tagged_response(), &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::PreconditionFailed);
    }

    #[test]
    fn if_match_passing_keeps_original_status() {
        let pre = Preconditions {
            entity_tag: Some(EntityTagCondition::IfMatch("\"abc\"")),
            modification_date: None,
        };
        let out = evaluate(tagged_response(), &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::Ok);
    }

    #[test]
    fn if_match_with_no_entity_tag_fails_unless_parse_error() {
        let pre = Preconditions {
            entity_tag: Some(EntityTagCondition::IfMatch("\"anything\"")),
            modification_date: None,
        };
        let out = evaluate(Response::ok(), &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::PreconditionFailed);

        let pre_bad = Preconditions {
            entity_tag: Some(EntityTagCondition::IfMatch("not-a-valid-list")),
            modification_date: None,
        };
        let out = evaluate(Response::ok(), &Method::Get, &pre_bad);
        assert_eq!(*out.status_code(), StatusCode::Ok);
    }

    #[test]
    fn if_none_match_get_yields_304_without_body() {
        let pre = Preconditions {
            entity_tag: Some(EntityTagCondition::IfNoneMatch("\"abc\"")),
            modification_date: None,
        };
        let mut out = evaluate(tagged_response(), &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::NotModified);
        assert!(out.acquire_body(false).unwrap().is_none());
    }

    #[test]
    fn if_none_match_non_safe_method_yields_412() {
        let pre = Preconditions {
            entity_tag: Some(EntityTagCondition::IfNoneMatch("\"abc\"")),
            modification_date: None,
        };
        let out = evaluate(tagged_response(), &Method::Post, &pre);
        assert_eq!(*out.status_code(), StatusCode::PreconditionFailed);
    }

    #[test]
    fn if_none_match_suppresses_modification_date_branch() {
        let modified = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        let response = Response::ok()
            .entity_tag(EntityTag::new("abc").unwrap())
            .modification_date(modified);
        let pre = Preconditions {
            entity_tag: Some(EntityTagCondition::IfNoneMatch("\"zzz\"")),
            modification_date: Some(ModificationDateCondition::IfModifiedSince(
                "Thu, 01 Jan 1970 00:00:00 GMT",
            )),
        };
        // The tag does not match so the entity-tag branch reaches no
        // verdict, but If-None-Match's mere presence still suppresses the
        // date branch (which would otherwise have fired a 304).
        let out = evaluate(response, &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::Ok);
    }

    #[test]
    fn if_modified_since_not_yet_modified_returns_304() {
        let modified = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        let response = Response::ok().modification_date(modified);
        let pre = Preconditions {
            entity_tag: None,
            modification_date: Some(ModificationDateCondition::IfModifiedSince(
                &modified.to_string(),
            )),
        };
        let out = evaluate(response, &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::NotModified);
    }

    #[test]
    fn if_modified_since_ignored_for_non_safe_method() {
        let modified = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        let response = Response::ok().modification_date(modified);
        let pre = Preconditions {
            entity_tag: None,
            modification_date: Some(ModificationDateCondition::IfModifiedSince(
                &modified.to_string(),
            )),
        };
        let out = evaluate(response, &Method::Post, &pre);
        assert_eq!(*out.status_code(), StatusCode::Ok);
    }

    #[test]
    fn if_unmodified_since_stale_returns_412() {
        let modified = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(200));
        let response = Response::ok().modification_date(modified);
        let since = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        let pre = Preconditions {
            entity_tag: None,
            modification_date: Some(ModificationDateCondition::IfUnmodifiedSince(&since.to_string())),
        };
        let out = evaluate(response, &Method::Post, &pre);
        assert_eq!(*out.status_code(), StatusCode::PreconditionFailed);
    }

    #[test]
    fn unparseable_date_is_ignored() {
        let modified = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        let response = Response::ok().modification_date(modified);
        let pre = Preconditions {
            entity_tag: None,
            modification_date: Some(ModificationDateCondition::IfModifiedSince("garbage")),
        };
        let out = evaluate(response, &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::Ok);
    }

    #[test]
    fn response_with_no_modification_date_is_unaffected() {
        let pre = Preconditions {
            entity_tag: None,
            modification_date: Some(ModificationDateCondition::IfModifiedSince(
                "Thu, 01 Jan 1970 00:00:00 GMT",
            )),
        };
        let out = evaluate(Response::ok(), &Method::Get, &pre);
        assert_eq!(*out.status_code(), StatusCode::Ok);
    }
}
