//! HTTP/2 intake/emission loop for one connection's streams.
//!
//! Per SPEC_FULL.md's resolution of the teacher's "one handler per stream
//! vs. one per connection" inconsistency (§9 Open Questions), every `h2`
//! stream is driven through the same per-request machinery HTTP/1 uses
//! (preconditions, body-budget enforcement, incident handling); only the
//! idle timer and request quota are shared across a connection's streams,
//! via the [`super::Connection`] supervisor passed in here.

use std::sync::Arc;

use bytes::Bytes;
use h2::server::SendResponse;
use h2::{RecvStream, SendStream};
use http::{HeaderMap, Request};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::connection::{Connection, RequestAdmission};
use crate::error::Error;
use crate::handler::{ClientIncident, RequestHandler, RequestHead, RequestIncident};
use crate::method::Method;
use crate::precondition::{self, EntityTagCondition, ModificationDateCondition, Preconditions};
use crate::response::Response;
use crate::status::StatusCode;

pub(crate) async fn serve<S>(stream: S, conn: Arc<Connection>) -> crate::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut h2_conn = h2::server::handshake(stream)
        .await
        .map_err(Error::new_accept)?;

    loop {
        if conn.is_stopped() {
            debug!(connection = %conn.id(), "already disconnected before next accept; closing");
            return Ok(());
        }
        let accepted = tokio::select! {
            accepted = h2_conn.accept() => accepted,
            _ = conn.disconnected() => {
                debug!(connection = %conn.id(), "disconnect requested while idle; closing");
                return Ok(());
            }
        };
        let next = match accepted {
            Some(Ok((req, respond))) => (req, respond),
            Some(Err(e)) => {
                if e.is_io() {
                    return Err(Error::new_io(
                        e.into_io().unwrap_or_else(|| {
                            std::io::Error::new(std::io::ErrorKind::Other, "h2 I/O error")
                        }),
                    ));
                }
                debug!(connection = %conn.id(), error = %e, "h2 stream error while accepting");
                continue;
            }
            None => return Ok(()),
        };

        match conn.begin_request() {
            RequestAdmission::Stopped | RequestAdmission::QuotaExhausted => {
                // Connection is draining; let the stream reset on drop
                // rather than writing a response for it.
                drop(next);
                continue;
            }
            RequestAdmission::Busy => unreachable!("h2 gives each stream its own handler"),
            RequestAdmission::Admitted => {}
        }

        let conn = conn.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_stream(next.0, next.1, &conn).await {
                warn!(connection = %conn.id(), error = %e, "h2 stream ended with error");
            }
        });
    }
}

async fn serve_stream(
    req: Request<RecvStream>,
    mut respond: SendResponse<Bytes>,
    conn: &Arc<Connection>,
) -> crate::Result<()> {
    let delegate = match conn.delegate() {
        Some(d) => d,
        None => {
            warn!(connection = %conn.id(), "no client delegate installed; resetting stream");
            conn.force_stop();
            return Ok(());
        }
    };

    let (parts, mut body) = req.into_parts();
    let method: Method = parts
        .method
        .as_str()
        .parse()
        .unwrap_or_else(|_| Method::Raw(parts.method.as_str().to_string()));
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let head = RequestHead {
        method: method.clone(),
        uri,
        headers: parts.headers.clone(),
    };

    let mut handler = match delegate.request_handler_for(&head).await {
        Some(h) => h,
        None => {
            let incident = ClientIncident::NoRequestHandler;
            let response = delegate
                .on_client_incident(&incident)
                .await
                .unwrap_or_else(|| Response::ok().status(incident.kind().default_status()));
            write_response(&mut respond, &method, &parts.headers, response, true, None).await?;
            conn.force_stop();
            return finish(conn, true);
        }
    };

    let declared_len = match content_length(&parts.headers) {
        Ok(v) => v,
        Err(msg) => {
            return finish_with_incident(
                &mut respond,
                conn,
                &method,
                &parts.headers,
                handler.as_mut(),
                RequestIncident::InvalidHeader(msg),
            )
            .await;
        }
    };
    if let Some(len) = declared_len {
        if len > handler.body_length_limit() {
            return finish_with_incident(
                &mut respond,
                conn,
                &method,
                &parts.headers,
                handler.as_mut(),
                RequestIncident::ByteLimitExceeded,
            )
            .await;
        }
    }

    let mut remaining_budget = handler.body_length_limit();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(Error::new_io_h2)?;
        let _ = body.flow_control().release_capacity(chunk.len());
        if (chunk.len() as u64) > remaining_budget {
            return finish_with_incident(
                &mut respond,
                conn,
                &method,
                &parts.headers,
                handler.as_mut(),
                RequestIncident::ByteLimitExceeded,
            )
            .await;
        }
        remaining_budget -= chunk.len() as u64;
        if let Err(e) = handler.on_body_chunk(&chunk).await {
            return finish_with_incident(
                &mut respond,
                conn,
                &method,
                &parts.headers,
                handler.as_mut(),
                RequestIncident::RequestProcessingError(e),
            )
            .await;
        }
    }

    let response = match handler.on_end().await {
        Ok(Some(resp)) => resp,
        Ok(None) => {
            return finish_with_incident(
                &mut respond,
                conn,
                &method,
                &parts.headers,
                handler.as_mut(),
                RequestIncident::NoResponse,
            )
            .await;
        }
        Err(e) => {
            return finish_with_incident(
                &mut respond,
                conn,
                &method,
                &parts.headers,
                handler.as_mut(),
                RequestIncident::RequestProcessingError(e),
            )
            .await;
        }
    };

    let needs_disconnect = write_response(
        &mut respond,
        &method,
        &parts.headers,
        response,
        false,
        Some(handler.as_mut()),
    )
    .await?;
    finish(conn, needs_disconnect)
}

async fn finish_with_incident(
    respond: &mut SendResponse<Bytes>,
    conn: &Arc<Connection>,
    method: &Method,
    headers: &HeaderMap,
    handler: &mut dyn RequestHandler,
    incident: RequestIncident,
) -> crate::Result<()> {
    let default_status = incident.kind().default_status();
    let override_response = handler.on_incident(&incident).await;
    let error = incident.into_error();
    handler.on_error(&error).await;
    let response = override_response.unwrap_or_else(|| Response::ok().status(default_status));
    write_response(respond, method, headers, response, true, Some(handler)).await?;
    conn.force_stop();
    finish(conn, true)
}

fn finish(conn: &Arc<Connection>, needs_disconnect: bool) -> crate::Result<()> {
    let should_close = conn.end_request(needs_disconnect, false);
    if should_close {
        conn.request_disconnect();
    }
    Ok(())
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

async fn write_response(
    respond: &mut SendResponse<Bytes>,
    method: &Method,
    _request_headers: &HeaderMap,
    response: Response,
    force_disconnect: bool,
    handler: Option<&mut dyn RequestHandler>,
) -> crate::Result<bool> {
    let preconditions = extract_preconditions(_request_headers);
    let mut response = precondition::evaluate(response, method, &preconditions);

    let is_head = matches!(method, Method::Head);
    let is_304 = *response.status_code() == StatusCode::NotModified;
    let mut needs_disconnect = force_disconnect || response.wants_disconnect();

    let producer = match response.acquire_body(is_head || is_304) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "response body producer acquisition failed");
            response = response_body_error_response(e, handler).await;
            needs_disconnect = true;
            match response.acquire_body(is_head) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "incident response body also failed to acquire; sending bodiless");
                    None
                }
            }
        }
    };

    let mut builder = http::Response::builder().status(response.status_code().code());
    for (name, value) in response.render_headers() {
        builder = builder.header(name.as_ref(), value);
    }
    let http_response = builder.body(()).map_err(Error::new_io_other)?;

    let no_body = producer.is_none();
    let mut send_stream: SendStream<Bytes> = respond
        .send_response(http_response, no_body)
        .map_err(Error::new_io_h2)?;

    if let Some(mut producer) = producer {
        let mut scratch = vec![0u8; 16 * 1024];
        loop {
            let n = producer(&mut scratch).map_err(Error::new_io)?;
            if n == 0 {
                send_stream
                    .send_data(Bytes::new(), true)
                    .map_err(Error::new_io_h2)?;
                break;
            }
            send_stream
                .send_data(Bytes::copy_from_slice(&scratch[..n]), false)
                .map_err(Error::new_io_h2)?;
        }
    }

    Ok(needs_disconnect)
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
