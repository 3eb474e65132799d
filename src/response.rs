//! Response-content value (C5): an immutable description of a response,
//! built via factory functions and composable modifiers.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::date::HttpDate;
use crate::error::{Error, IncidentKind};
use crate::etag::EntityTag;
use crate::mime::Mime;

/// A function that writes response bytes into a caller-provided scratch
/// buffer, pull-style: each call returns the number of bytes written, with
/// `0` signaling end-of-body.
pub type BodyProducer = Box<dyn FnMut(&mut [u8]) -> io::Result<usize> + Send>;

/// A factory that, once invoked, yields a [`BodyProducer`]. Acquisition is
/// deferred to response-emission time so that e.g. opening a file happens
/// only when the body is actually about to be written (never for `HEAD` or
/// a `304` outcome).
pub type BodyProvider = Box<dyn FnOnce() -> crate::Result<BodyProducer> + Send>;

/// An immutable description of an HTTP response: status, headers,
/// conditional-request metadata, and a deferred body producer.
///
/// Every modifier consumes `self` and returns a new value — there is no
/// interior mutability and no partially-built state.
pub struct Response {
    pub(crate) status: crate::status::StatusCode,
    pub(crate) custom_headers: Vec<(String, String)>,
    pub(crate) content_type: Option<Mime>,
    pub(crate) content_length: Option<u64>,
    pub(crate) entity_tag: Option<EntityTag>,
    pub(crate) modification_date: Option<HttpDate>,
    pub(crate) location: Option<String>,
    pub(crate) needs_disconnect: bool,
    pub(crate) body: Option<BodyProvider>,
}

/// Errors specific to the [`Response::file`] factory.
#[derive(Debug)]
pub enum FileResponseError {
    /// The resolved path does not exist.
    FileDoesNotExist,
    /// The resolved path exists but is not a regular file.
    IsNotAFile,
    /// The path was a directory and none of the supplied index file names
    /// existed within it.
    UnableToFindIndexFile,
    /// The file's metadata or content could not be read.
    UnableToCreateInputStream(io::Error),
    /// [`Response::resource`]'s name was not present in the supplied
    /// compiled-in asset table.
    UnableToFindBundleResource,
    /// [`Response::redirect`]'s target did not parse as a valid URI
    /// reference.
    InvalidRedirectionTarget,
}

impl std::fmt::Display for FileResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileResponseError::FileDoesNotExist => f.write_str("file does not exist"),
            FileResponseError::IsNotAFile => f.write_str("path is not a regular file"),
            FileResponseError::UnableToFindIndexFile => {
                f.write_str("unable to find an index file in directory")
            }
            FileResponseError::UnableToCreateInputStream(e) => {
                write!(f, "unable to create input stream: {}", e)
            }
            FileResponseError::UnableToFindBundleResource => {
                f.write_str("no bundled resource with that name")
            }
            FileResponseError::InvalidRedirectionTarget => {
                f.write_str("redirection target is not a valid URI")
            }
        }
    }
}

impl std::error::Error for FileResponseError {}

fn body_provider_from_producer(
    mut producer: impl FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static,
) -> BodyProvider {
    Box::new(move || Ok(Box::new(move |buf: &mut [u8]| producer(buf)) as BodyProducer))
}

fn body_provider_from_bytes(bytes: Bytes) -> BodyProvider {
    Box::new(move || {
        let mut pos = 0usize;
        let producer = move |buf: &mut [u8]| -> io::Result<usize> {
            let remaining = &bytes[pos..];
            if remaining.is_empty() {
                return Ok(0);
            }
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            pos += n;
            Ok(n)
        };
        Ok(Box::new(producer) as BodyProducer)
    })
}

impl Response {
    fn bare(status: crate::status::StatusCode) -> Response {
        Response {
            status,
            custom_headers: Vec::new(),
            content_type: None,
            content_length: None,
            entity_tag: None,
            modification_date: None,
            location: None,
            needs_disconnect: false,
            body: None,
        }
    }

    /// `200 OK`, no body.
    pub fn ok() -> Response {
        Response::bare(crate::status::StatusCode::Ok)
    }

    /// `404 Not Found`, no body.
    pub fn not_found() -> Response {
        Response::bare(crate::status::StatusCode::NotFound)
    }

    /// `200 OK` with an `application/json` body produced by `producer`.
    pub fn json(producer: impl FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static) -> Response {
        Response::ok()
            .content_type(Mime::ApplicationJson)
            .body_from(body_provider_from_producer(producer))
    }

    /// `200 OK` with an `application/octet-stream` body produced by
    /// `producer`.
    pub fn binary(producer: impl FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static) -> Response {
        Response::ok()
            .content_type(Mime::ApplicationOctetStream)
            .body_from(body_provider_from_producer(producer))
    }

    /// `200 OK` with a `text/plain; charset=UTF-8` body produced by
    /// `producer`.
    pub fn string(producer: impl FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static) -> Response {
        Response::ok()
            .content_type(Mime::TextPlain)
            .body_from(body_provider_from_producer(producer))
    }

    /// `200 OK` with `bytes` as the entire body, `Content-Length` set.
    pub fn bytes(bytes: impl Into<Bytes>) -> Response {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Response::ok()
            .content_type(Mime::ApplicationOctetStream)
            .content_length(len)
            .body_from(body_provider_from_bytes(bytes))
    }

    /// Resolve `path` to a local regular file (descending into `path` via
    /// one level of index-file resolution if it names a directory), and
    /// build a `200 OK` response describing it.
    ///
    /// No body stream is opened eagerly: `Content-Length` is the file's
    /// size, `modification_date` is its mtime, and `entity_tag` is the hex
    /// encoding of the mtime's wire bytes. The body producer opens the file
    /// only once actually invoked (never for `HEAD`/`304`).
    pub fn file(path: impl AsRef<Path>, index_files: &[&str]) -> Result<Response, FileResponseError> {
        let mut path = path.as_ref().to_path_buf();
        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileResponseError::FileDoesNotExist,
            _ => FileResponseError::UnableToCreateInputStream(e),
        })?;

        if meta.is_dir() {
            path = resolve_index_file(&path, index_files)?;
        } else if !meta.is_file() {
            return Err(FileResponseError::IsNotAFile);
        }

        let meta = fs::metadata(&path)
            .map_err(FileResponseError::UnableToCreateInputStream)?;
        if !meta.is_file() {
            return Err(FileResponseError::IsNotAFile);
        }

        let len = meta.len();
        let modified = meta
            .modified()
            .map_err(FileResponseError::UnableToCreateInputStream)?;
        let mdate = HttpDate::from_system_time(modified);
        let secs = mdate
            .into_system_time()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let tag_value = hex_encode(&secs.to_be_bytes());

        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Mime::from_extension)
            .unwrap_or(Mime::ApplicationOctetStream);

        let body_path = path.clone();
        let body: BodyProvider = Box::new(move || open_file_producer(&body_path));

        Ok(Response::ok()
            .content_type(content_type)
            .content_length(len)
            .modification_date(mdate)
            .entity_tag(
                EntityTag::new(tag_value).expect("hex digest never contains '\"' or NUL"),
            )
            .body_from(body))
    }

    /// Look up `name` in `registry`, a caller-supplied table of compiled-in
    /// assets (typically built with `include_bytes!`), and build a `200 OK`
    /// response with the matching bytes as body and a `Content-Type` guessed
    /// from `name`'s extension.
    ///
    /// This is the bundle-resource form of the `.file(path|resource)`
    /// factory pair: unlike [`Response::file`] it never touches the
    /// filesystem, so it has no lazy-open step — the bytes are already
    /// resident in the binary.
    pub fn resource(
        name: &str,
        registry: &[(&'static str, &'static [u8])],
    ) -> Result<Response, FileResponseError> {
        let bytes = registry
            .iter()
            .find(|(entry_name, _)| *entry_name == name)
            .map(|(_, bytes)| *bytes)
            .ok_or(FileResponseError::UnableToFindBundleResource)?;

        let content_type = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Mime::from_extension)
            .unwrap_or(Mime::ApplicationOctetStream);

        Ok(Response::ok()
            .content_type(content_type)
            .content_length(bytes.len() as u64)
            .body_from(body_provider_from_bytes(Bytes::from_static(bytes))))
    }

    /// Build a redirection response with the given `status` and `Location`
    /// header, after validating that `target` parses as a URI reference.
    pub fn redirect(
        status: crate::status::StatusCode,
        target: impl Into<String>,
    ) -> Result<Response, FileResponseError> {
        let target = target.into();
        target
            .parse::<http::Uri>()
            .map_err(|_| FileResponseError::InvalidRedirectionTarget)?;
        Ok(Response::bare(status).location(target))
    }

    /// Attach a body provider directly (used internally by the factories
    /// above, and available to callers building custom producers).
    pub fn body_from(mut self, provider: BodyProvider) -> Response {
        self.body = Some(provider);
        self
    }

    /// Override the status code.
    pub fn status(mut self, status: crate::status::StatusCode) -> Response {
        self.status = status;
        self
    }

    /// Set `Content-Type`.
    pub fn content_type(mut self, mime: Mime) -> Response {
        self.content_type = Some(mime);
        self
    }

    /// Set `Content-Length` explicitly (independent of whether a body is
    /// attached).
    pub fn content_length(mut self, len: u64) -> Response {
        self.content_length = Some(len);
        self
    }

    /// Set the `ETag` validator.
    pub fn entity_tag(mut self, tag: EntityTag) -> Response {
        self.entity_tag = Some(tag);
        self
    }

    /// Set `Last-Modified`.
    pub fn modification_date(mut self, date: HttpDate) -> Response {
        self.modification_date = Some(date);
        self
    }

    /// Set `Location`.
    pub fn location(mut self, url: impl Into<String>) -> Response {
        self.location = Some(url.into());
        self
    }

    /// Append one custom header, after any already registered.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Response {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Append a batch of custom headers, preserving iteration order.
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Response {
        self.custom_headers.extend(headers);
        self
    }

    /// Force the connection to close after this response is written,
    /// regardless of keep-alive negotiation.
    pub fn needs_disconnect(mut self, flag: bool) -> Response {
        self.needs_disconnect = flag;
        self
    }

    /// Drop any attached body, without touching other fields
    /// (`Content-Length`, if set, is left as-is).
    pub fn bodiless(mut self) -> Response {
        self.body = None;
        self
    }

    /// The current status.
    pub fn status_code(&self) -> &crate::status::StatusCode {
        &self.status
    }

    /// The current entity tag, if any.
    pub fn entity_tag_ref(&self) -> Option<&EntityTag> {
        self.entity_tag.as_ref()
    }

    /// The current modification date, if any.
    pub fn modification_date_ref(&self) -> Option<HttpDate> {
        self.modification_date
    }

    /// Whether the connection must be dropped after this response.
    pub fn wants_disconnect(&self) -> bool {
        self.needs_disconnect
    }

    pub(crate) fn set_status(&mut self, status: crate::status::StatusCode) {
        self.status = status;
    }

    pub(crate) fn clear_body(&mut self) {
        self.body = None;
    }

    /// Render the built-in + custom headers in emission order, as
    /// `(name, value)` pairs. `Content-Length`/`Content-Type`/`ETag`/
    /// `Last-Modified`/`Location` appear iff the corresponding field is set,
    /// followed by `custom_headers` in registration order.
    pub fn render_headers(&self) -> Vec<(Cow<'static, str>, String)> {
        let mut out = Vec::new();
        if let Some(ref ct) = self.content_type {
            out.push((Cow::Borrowed("Content-Type"), ct.to_string()));
        }
        if let Some(len) = self.content_length {
            out.push((Cow::Borrowed("Content-Length"), len.to_string()));
        }
        if let Some(ref tag) = self.entity_tag {
            out.push((Cow::Borrowed("ETag"), tag.to_string()));
        }
        if let Some(date) = self.modification_date {
            out.push((Cow::Borrowed("Last-Modified"), date.to_string()));
        }
        if let Some(ref loc) = self.location {
            out.push((Cow::Borrowed("Location"), loc.clone()));
        }
        for (name, value) in &self.custom_headers {
            out.push((Cow::Owned(name.clone()), value.clone()));
        }
        out
    }

    /// Acquire the body producer for this response, unless `head_or_304` is
    /// true (per §4.5/invariant 2, the producer is never invoked for `HEAD`
    /// or a `304` outcome). Consumes `self`'s body provider.
    pub(crate) fn acquire_body(
        &mut self,
        head_or_304: bool,
    ) -> crate::Result<Option<BodyProducer>> {
        if head_or_304 {
            self.body = None;
            return Ok(None);
        }
        match self.body.take() {
            None => Ok(None),
            Some(provider) => match provider() {
                Ok(producer) => Ok(Some(producer)),
                Err(e) => {
                    // §4.5/§7: an acquisition error becomes a response_body_error
                    // incident, and the already-allocated Content-Length is
                    // cleared to avoid sending an inconsistent header.
                    self.content_length = None;
                    Err(Error::new_incident_with(IncidentKind::ResponseBodyError, e))
                }
            },
        }
    }
}

fn resolve_index_file(dir: &Path, index_files: &[&str]) -> Result<PathBuf, FileResponseError> {
    for name in index_files {
        let candidate = dir.join(name);
        if let Ok(meta) = fs::metadata(&candidate) {
            if meta.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(FileResponseError::UnableToFindIndexFile)
}

fn open_file_producer(path: &Path) -> crate::Result<BodyProducer> {
    let mut file = fs::File::open(path).map_err(Error::new_io)?;
    let producer = move |buf: &mut [u8]| -> io::Result<usize> { file.read(buf) };
    Ok(Box::new(producer))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_emission_matches_set_fields() {
        let r = Response::ok()
            .content_type(Mime::TextHtml)
            .content_length(5)
            .entity_tag(EntityTag::new("abc").unwrap())
            .header("X-Custom", "yes");
        let headers: Vec<(String, String)> = r
            .render_headers()
            .into_iter()
            .map(|(n, v)| (n.into_owned(), v))
            .collect();
        assert_eq!(
            headers,
            vec![
                ("Content-Type".to_string(), "text/html; charset=UTF-8".to_string()),
                ("Content-Length".to_string(), "5".to_string()),
                ("ETag".to_string(), "\"abc\"".to_string()),
                ("X-Custom".to_string(), "yes".to_string()),
            ]
        );
    }

    #[test]
    fn custom_headers_follow_registration_order_after_built_ins() {
        let r = Response::ok()
            .header("X-First", "1")
            .header("X-Second", "2")
            .location("/elsewhere");
        let headers: Vec<(String, String)> = r
            .render_headers()
            .into_iter()
            .map(|(n, v)| (n.into_owned(), v))
            .collect();
        assert_eq!(
            headers,
            vec![
                ("Location".to_string(), "/elsewhere".to_string()),
                ("X-First".to_string(), "1".to_string()),
                ("X-Second".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn bodiless_keeps_content_length() {
        let mut r = Response::bytes(Bytes::from_static(b"hello")).bodiless();
        assert_eq!(r.content_length, Some(5));
        assert!(r.acquire_body(false).unwrap().is_none());
    }

    #[test]
    fn head_or_304_never_acquires_producer() {
        let mut r = Response::bytes(Bytes::from_static(b"hello"));
        assert!(r.acquire_body(true).unwrap().is_none());
        assert!(r.body.is_none());
    }

    #[test]
    fn bytes_producer_yields_then_ends() {
        let mut r = Response::bytes(Bytes::from_static(b"hi"));
        let mut producer = r.acquire_body(false).unwrap().unwrap();
        let mut buf = [0u8; 16];
        let n = producer(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi");
        assert_eq!(producer(&mut buf).unwrap(), 0);
    }

    #[test]
    fn file_factory_sets_metadata_without_opening_eagerly() {
        let dir = std::env::temp_dir().join(format!("flue-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("hello.txt");
        std::fs::write(&file_path, b"hello world").unwrap();

        let mut r = Response::file(&file_path, &["index.html"]).unwrap();
        assert_eq!(r.content_length, Some(11));
        assert!(r.modification_date.is_some());
        assert!(r.entity_tag.is_some());

        let mut producer = r.acquire_body(false).unwrap().unwrap();
        let mut buf = [0u8; 32];
        let n = producer(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_factory_resolves_index() {
        let dir = std::env::temp_dir().join(format!("flue-test-idx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), b"<html/>").unwrap();

        let r = Response::file(&dir, &["index.html"]).unwrap();
        assert_eq!(r.content_length, Some(7));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_factory_missing_index_errors() {
        let dir = std::env::temp_dir().join(format!("flue-test-noidx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let err = Response::file(&dir, &["index.html"]).unwrap_err();
        assert!(matches!(err, FileResponseError::UnableToFindIndexFile));

        std::fs::remove_dir_all(&dir).ok();
    }

    const RESOURCES: &[(&str, &[u8])] = &[("logo.png", b"\x89PNG"), ("app.js", b"console.log(1)")];

    #[test]
    fn resource_factory_finds_known_name() {
        let mut r = Response::resource("app.js", RESOURCES).unwrap();
        assert_eq!(r.content_length, Some(15));
        let mut producer = r.acquire_body(false).unwrap().unwrap();
        let mut buf = [0u8; 32];
        let n = producer(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"console.log(1)");
    }

    #[test]
    fn resource_factory_missing_name_errors() {
        let err = Response::resource("missing.js", RESOURCES).unwrap_err();
        assert!(matches!(err, FileResponseError::UnableToFindBundleResource));
    }

    #[test]
    fn redirect_factory_sets_status_and_location() {
        let r = Response::redirect(crate::status::StatusCode::Found, "/elsewhere").unwrap();
        assert_eq!(*r.status_code(), crate::status::StatusCode::Found);
        let headers: Vec<(String, String)> = r
            .render_headers()
            .into_iter()
            .map(|(n, v)| (n.into_owned(), v))
            .collect();
        assert!(headers.contains(&("Location".to_string(), "/elsewhere".to_string())));
    }

    #[test]
    fn redirect_factory_rejects_invalid_target() {
        let err = Response::redirect(crate::status::StatusCode::Found, "\0not a uri").unwrap_err();
        assert!(matches!(err, FileResponseError::InvalidRedirectionTarget));
    }
}
