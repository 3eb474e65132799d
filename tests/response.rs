use bytes::Bytes;

use flue::etag::EntityTag;
use flue::mime::Mime;
use flue::response::Response;
use flue::status::StatusCode;

#[test]
fn ok_and_not_found_factories_set_expected_status() {
    assert_eq!(*Response::ok().status_code(), StatusCode::Ok);
    assert_eq!(*Response::not_found().status_code(), StatusCode::NotFound);
}

#[test]
fn bytes_factory_sets_content_type_and_length() {
    let r = Response::bytes(Bytes::from_static(b"hello"));
    let headers = r.render_headers();
    assert!(headers
        .iter()
        .any(|(n, v)| n.as_ref() == "Content-Type" && v == "application/octet-stream"));
    assert!(headers
        .iter()
        .any(|(n, v)| n.as_ref() == "Content-Length" && v == "5"));
}

#[test]
fn modifiers_are_consuming_and_compose() {
    let r = Response::ok()
        .status(StatusCode::Created)
        .content_type(Mime::ApplicationJson)
        .entity_tag(EntityTag::new("v1").unwrap())
        .location("/widgets/1")
        .header("X-Request-Id", "abc123")
        .needs_disconnect(true);

    assert_eq!(*r.status_code(), StatusCode::Created);
    assert_eq!(r.entity_tag_ref().unwrap().value(), "v1");
    assert!(r.wants_disconnect());
    let headers = r.render_headers();
    let (name, value) = headers.last().unwrap();
    assert_eq!(name.as_ref(), "Location");
    assert_eq!(value, "/widgets/1");
}

#[test]
fn header_order_is_built_ins_then_custom_in_call_order() {
    let r = Response::ok()
        .content_type(Mime::TextPlain)
        .header("X-A", "1")
        .header("X-B", "2");
    let headers = r.render_headers();
    let names: Vec<&str> = headers.iter().map(|(n, _)| n.as_ref()).collect();
    assert_eq!(names, vec!["Content-Type", "X-A", "X-B"]);
}

#[test]
fn file_factory_rejects_a_missing_path() {
    let missing = std::env::temp_dir().join("flue-definitely-missing-file.bin");
    let err = Response::file(&missing, &["index.html"]).unwrap_err();
    assert!(matches!(
        err,
        flue::response::FileResponseError::FileDoesNotExist
    ));
}

#[test]
fn resource_factory_serves_a_known_bundled_asset() {
    const ASSETS: &[(&str, &[u8])] = &[("style.css", b"body { margin: 0 }")];
    let r = Response::resource("style.css", ASSETS).unwrap();
    let headers = r.render_headers();
    assert!(headers
        .iter()
        .any(|(n, v)| n.as_ref() == "Content-Length" && v == "18"));
}

#[test]
fn resource_factory_rejects_an_unknown_name() {
    const ASSETS: &[(&str, &[u8])] = &[("style.css", b"body { margin: 0 }")];
    let err = Response::resource("missing.css", ASSETS).unwrap_err();
    assert!(matches!(
        err,
        flue::response::FileResponseError::UnableToFindBundleResource
    ));
}

#[test]
fn redirect_factory_rejects_an_invalid_target() {
    let err = Response::redirect(StatusCode::Found, "\0bad").unwrap_err();
    assert!(matches!(
        err,
        flue::response::FileResponseError::InvalidRedirectionTarget
    ));
}
