//! HTTP/1.1 (and 1.0) intake/emission loop for one connection.

use std::sync::Arc;

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::connection::{Connection, RequestAdmission};
use crate::error::Error;
use crate::handler::{ClientIncident, RequestHandler, RequestHead, RequestIncident};
use crate::method::Method;
use crate::precondition::{self, EntityTagCondition, ModificationDateCondition, Preconditions};
use crate::response::Response;
use crate::status::StatusCode;

const MAX_HEADERS: usize = 100;
const READ_CHUNK: usize = 8 * 1024;

struct ParsedHead {
    method: Method,
    uri: String,
    is_1_1: bool,
    headers: HeaderMap,
}

pub(crate) async fn serve<S>(mut stream: S, conn: Arc<Connection>) -> crate::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        if conn.is_stopped() {
            trace!(connection = %conn.id(), "already disconnected before next head; closing");
            return Ok(());
        }
        let head_bytes = tokio::select! {
            result = read_until_head(&mut stream, &mut buf) => match result {
                Ok(Some(n)) => n,
                Ok(None) => return Ok(()), // clean EOF between requests
                Err(e) => {
                    if e.is_peer_closed() {
                        trace!(connection = %conn.id(), "peer closed while awaiting next head");
                        return Ok(());
                    }
                    return Err(e);
                }
            },
            _ = conn.disconnected() => {
                trace!(connection = %conn.id(), "disconnect requested while idle; closing");
                return Ok(());
            }
        };

        let raw_head = buf.split_to(head_bytes);
        let parsed = match parse_head(&raw_head) {
            Ok(p) => p,
            Err(e) => return Err(e),
        };

        match conn.begin_request() {
            RequestAdmission::Stopped => return Ok(()),
            RequestAdmission::Busy => continue,
            RequestAdmission::QuotaExhausted => return Ok(()),
            RequestAdmission::Admitted => {}
        }

        let keepalive = Keepalive::compute(parsed.is_1_1, &parsed.headers);

        let outcome = serve_one_request(&mut stream, &conn, &parsed, &mut buf).await;
        match outcome {
            Ok(should_close) => {
                if should_close {
                    return Ok(());
                }
            }
            Err(e) => {
                conn.force_stop();
                if e.is_peer_closed() {
                    return Ok(());
                }
                return Err(e);
            }
        }
        let _ = keepalive;
    }
}

async fn serve_one_request<S>(
    stream: &mut S,
    conn: &Arc<Connection>,
    parsed: &ParsedHead,
    buf: &mut BytesMut,
) -> crate::Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let keepalive = Keepalive::compute(parsed.is_1_1, &parsed.headers);

    let delegate = match conn.delegate() {
        Some(d) => d,
        None => {
            warn!(connection = %conn.id(), "no client delegate installed; closing");
            conn.force_stop();
            return Ok(true);
        }
    };

    let head = RequestHead {
        method: parsed.method.clone(),
        uri: parsed.uri.clone(),
        headers: parsed.headers.clone(),
    };

    let mut handler = match delegate.request_handler_for(&head).await {
        Some(h) => h,
        None => {
            let incident = ClientIncident::NoRequestHandler;
            let response = delegate
                .on_client_incident(&incident)
                .await
                .unwrap_or_else(|| Response::ok().status(incident.kind().default_status()));
            write_response(stream, conn, parsed, response, true, None).await?;
            conn.force_stop();
            return Ok(true);
        }
    };

    let declared_len = match content_length(&parsed.headers) {
        Ok(v) => v,
        Err(msg) => {
            return finish_with_incident(
                stream,
                conn,
                parsed,
                handler.as_mut(),
                RequestIncident::InvalidHeader(msg),
            )
            .await;
        }
    };

    if let Some(len) = declared_len {
        if len > handler.body_length_limit() {
            return finish_with_incident(
                stream,
                conn,
                parsed,
                handler.as_mut(),
                RequestIncident::ByteLimitExceeded,
            )
            .await;
        }
    }

    let mut remaining_budget = handler.body_length_limit();
    if let Some(len) = declared_len {
        let mut to_read = len;
        while to_read > 0 {
            if buf.is_empty() {
                let mut chunk = vec![0u8; READ_CHUNK];
                let n = stream.read(&mut chunk).await.map_err(Error::new_io)?;
                if n == 0 {
                    return Err(Error::new_io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed mid-body",
                    )));
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let take = (to_read as usize).min(buf.len());
            let chunk = buf.split_to(take);
            if (chunk.len() as u64) > remaining_budget {
                return finish_with_incident(
                    stream,
                    conn,
                    parsed,
                    handler.as_mut(),
                    RequestIncident::ByteLimitExceeded,
                )
                .await;
            }
            remaining_budget -= chunk.len() as u64;
            to_read -= take as u64;
            if let Err(e) = handler.on_body_chunk(&chunk).await {
                return finish_with_incident(
                    stream,
                    conn,
                    parsed,
                    handler.as_mut(),
                    RequestIncident::RequestProcessingError(e),
                )
                .await;
            }
        }
    }

    let response = match handler.on_end().await {
        Ok(Some(resp)) => resp,
        Ok(None) => {
            return finish_with_incident(
                stream,
                conn,
                parsed,
                handler.as_mut(),
                RequestIncident::NoResponse,
            )
            .await;
        }
        Err(e) => {
            return finish_with_incident(
                stream,
                conn,
                parsed,
                handler.as_mut(),
                RequestIncident::RequestProcessingError(e),
            )
            .await;
        }
    };

    let _ = keepalive;
    write_response(stream, conn, parsed, response, false, Some(handler.as_mut())).await
}

async fn finish_with_incident<S>(
    stream: &mut S,
    conn: &Arc<Connection>,
    parsed: &ParsedHead,
    handler: &mut dyn RequestHandler,
    incident: RequestIncident,
) -> crate::Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let default_status = incident.kind().default_status();
    let override_response = handler.on_incident(&incident).await;
    let error = incident.into_error();
    handler.on_error(&error).await;
    let response = override_response.unwrap_or_else(|| Response::ok().status(default_status));
    write_response(stream, conn, parsed, response, true, Some(handler)).await?;
    conn.force_stop();
    Ok(true)
}

/// Turn a producer-acquisition failure into a `response_body_error`
/// incident: routes through the handler's override hook and `on_error`,
/// per §4.6 emission step 2 / §7, instead of silently keeping the
/// original (now bodiless) response.
async fn response_body_error_response(
    cause: Error,
    handler: Option<&mut dyn RequestHandler>,
) -> Response {
    let incident = RequestIncident::ResponseBodyError(cause);
    let default_status = incident.kind().default_status();
    match handler {
        Some(h) => {
            let override_response = h.on_incident(&incident).await;
            let error = incident.into_error();
            h.on_error(&error).await;
            override_response.unwrap_or_else(|| Response::ok().status(default_status))
        }
        None => Response::ok().status(default_status),
    }
}

async fn write_response<S>(
    stream: &mut S,
    conn: &Arc<Connection>,
    parsed: &ParsedHead,
    response: Response,
    force_disconnect: bool,
    handler: Option<&mut dyn RequestHandler>,
) -> crate::Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let preconditions = extract_preconditions(&parsed.headers);
    let mut response = precondition::evaluate(response, &parsed.method, &preconditions);

    let is_head = matches!(parsed.method, Method::Head);
    let is_304 = *response.status_code() == StatusCode::NotModified;
    let mut needs_disconnect = force_disconnect || response.wants_disconnect();

    let keepalive = Keepalive::compute(parsed.is_1_1, &parsed.headers);
    let head_not_keepalive = !keepalive.is_keepalive;

    let producer = match response.acquire_body(is_head || is_304) {
        Ok(p) => p,
        Err(e) => {
            warn!(connection = %conn.id(), error = %e, "response body producer acquisition failed");
            response = response_body_error_response(e, handler).await;
            needs_disconnect = true;
            conn.force_stop();
            match response.acquire_body(is_head) {
                Ok(p) => p,
                Err(e) => {
                    warn!(connection = %conn.id(), error = %e, "incident response body also failed to acquire; sending bodiless");
                    None
                }
            }
        }
    };

    let mut out = BytesMut::with_capacity(256);
    write_status_line(&mut out, parsed.is_1_1, response.status_code());
    for (name, value) in response.render_headers() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if let Some(token) = keepalive.connection_header(parsed.is_1_1) {
        out.extend_from_slice(b"Connection: ");
        out.extend_from_slice(token.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    stream.write_all(&out).await.map_err(Error::new_io)?;

    if let Some(mut producer) = producer {
        let mut scratch = vec![0u8; 16 * 1024];
        loop {
            let n = producer(&mut scratch).map_err(Error::new_io)?;
            if n == 0 {
                break;
            }
            stream.write_all(&scratch[..n]).await.map_err(Error::new_io)?;
        }
    }
    stream.flush().await.map_err(Error::new_io)?;

    let should_close = conn.end_request(needs_disconnect, head_not_keepalive);
    Ok(should_close)
}

fn write_status_line(out: &mut BytesMut, is_1_1: bool, status: &StatusCode) {
    let version = if is_1_1 { "HTTP/1.1" } else { "HTTP/1.0" };
    let (code, reason) = (status.code(), status.reason_phrase());
    out.extend_from_slice(version.as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(code.to_string().as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(reason.as_bytes());
    out.extend_from_slice(b"\r\n");
}

struct Keepalive {
    is_keepalive: bool,
    advertised_token: bool,
}

impl Keepalive {
    fn compute(is_1_1: bool, headers: &HeaderMap) -> Keepalive {
        let mut has_keepalive_token = false;
        let mut has_close_token = false;
        if let Some(v) = headers.get(http::header::CONNECTION) {
            if let Ok(s) = v.to_str() {
                for tok in s.split(',') {
                    match tok.trim().to_ascii_lowercase().as_str() {
                        "keep-alive" => has_keepalive_token = true,
                        "close" => has_close_token = true,
                        _ => {}
                    }
                }
            }
        }
        let is_keepalive = if is_1_1 {
            !has_close_token
        } else {
            has_keepalive_token
        };
        Keepalive {
            is_keepalive,
            advertised_token: has_keepalive_token || has_close_token,
        }
    }

    fn connection_header(&self, is_1_1: bool) -> Option<&'static str> {
        if !self.advertised_token {
            return None;
        }
        if !is_1_1 && self.is_keepalive {
            Some("keep-alive")
        } else if is_1_1 && !self.is_keepalive {
            Some("close")
        } else {
            None
        }
    }
}

fn extract_preconditions(headers: &HeaderMap) -> Preconditions<'_> {
    let entity_tag = if let Some(v) = headers.get(http::header::IF_MATCH) {
        v.to_str().ok().map(EntityTagCondition::IfMatch)
    } else if let Some(v) = headers.get(http::header::IF_NONE_MATCH) {
        v.to_str().ok().map(EntityTagCondition::IfNoneMatch)
    } else {
        None
    };

    let modification_date = if let Some(v) = headers.get(http::header::IF_MODIFIED_SINCE) {
        v.to_str().ok().map(ModificationDateCondition::IfModifiedSince)
    } else if let Some(v) = headers.get(http::header::IF_UNMODIFIED_SINCE) {
        v.to_str()
            .ok()
            .map(ModificationDateCondition::IfUnmodifiedSince)
    } else {
        None
    };

    Preconditions {
        entity_tag,
        modification_date,
    }
}

fn content_length(headers: &HeaderMap) -> Result<Option<u64>, String> {
    match headers.get(http::header::CONTENT_LENGTH) {
        None => Ok(None),
        Some(v) => {
            let s = v
                .to_str()
                .map_err(|_| "Content-Length is not valid UTF-8".to_string())?;
            let n: i64 = s
                .trim()
                .parse()
                .map_err(|_| "Content-Length is not an integer".to_string())?;
            if n < 0 {
                return Err("Content-Length must not be negative".to_string());
            }
            Ok(Some(n as u64))
        }
    }
}

fn parse_head(raw: &[u8]) -> crate::Result<ParsedHead> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut header_storage);
    match req.parse(raw) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(Error::new_parse(crate::error::Parse::Internal));
        }
        Err(_) => return Err(Error::new_parse(crate::error::Parse::Header)),
    }

    let method_str = req.method.ok_or_else(|| Error::new_parse(crate::error::Parse::Method))?;
    let method: Method = method_str.parse().unwrap_or_else(|_| Method::Raw(method_str.to_string()));
    let uri = req.path.ok_or_else(|| Error::new_parse(crate::error::Parse::Uri))?.to_string();
    let is_1_1 = req.version == Some(1);

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        if h.name.is_empty() {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(h.name.as_bytes()),
            HeaderValue::from_bytes(h.value),
        ) {
            headers.append(name, value);
        }
    }

    Ok(ParsedHead {
        method,
        uri,
        is_1_1,
        headers,
    })
}

/// Reads from `stream` into `buf` until a complete request head (terminated
/// by `\r\n\r\n`) is present, returning the byte length of the head
/// (headers only, body bytes if any remain in `buf`). Returns `Ok(None)` on
/// a clean EOF with no bytes read yet (the quiescent point between
/// requests).
async fn read_until_head<S>(stream: &mut S, buf: &mut BytesMut) -> crate::Result<Option<usize>>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(pos) = find_head_end(buf) {
            return Ok(Some(pos));
        }
        let mut chunk = vec![0u8; READ_CHUNK];
        let n = stream.read(&mut chunk).await.map_err(Error::new_io)?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(Error::new_io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-head",
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_head_end(buf: &BytesMut) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
