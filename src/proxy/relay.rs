// ────────────────────────────────
// src/proxy/relay.rs
// Copies a backend response to the caller and reports how the copy ended.
// ────────────────────────────────
use hyper::body::{Bytes, HttpBody};
use hyper::{Body, Response, StatusCode};
use tracing::Instrument;

use super::headers::strip_hop_by_hop;

/// Body sent to the caller when the response could not be relayed before the
/// status line went out.
pub const RELAY_ERROR_BODY: &str = "Error writing response";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("reading backend body failed: {0}")]
    Upstream(#[source] hyper::Error),

    #[error("caller went away after {0} bytes")]
    CallerClosed(u64),
}

/// How a relay ended.
#[derive(Debug)]
pub struct RelayReport {
    /// Status the caller was sent.
    pub status: StatusCode,
    pub bytes: u64,
    /// Whether the status line was already committed when `error` happened.
    pub committed: bool,
    pub error: Option<RelayError>,
}

/// Relays `upstream` to the caller.
///
/// The first body chunk is read before the response is handed back, so a
/// backend that fails right away still yields a clean 500. Anything after
/// that is pumped by a spawned task; a failure there truncates the response
/// instead. `on_complete` runs exactly once when the copy ends.
pub async fn relay<C>(upstream: Response<Body>, on_complete: C) -> Response<Body>
where
    C: FnOnce(RelayReport) + Send + 'static,
{
    let (mut parts, mut body) = upstream.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let status = parts.status;

    let first = match body.data().await {
        None => {
            on_complete(RelayReport {
                status,
                bytes: 0,
                committed: true,
                error: None,
            });
            return Response::from_parts(parts, Body::empty());
        }
        Some(Err(err)) => {
            on_complete(RelayReport {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                bytes: 0,
                committed: false,
                error: Some(RelayError::Upstream(err)),
            });
            return error_response();
        }
        Some(Ok(chunk)) => chunk,
    };

    let (sender, caller_body) = Body::channel();
    tokio::spawn(
        async move {
            let (bytes, error) = pump(first, body, sender).await;
            on_complete(RelayReport {
                status,
                bytes,
                committed: true,
                error,
            });
        }
        .in_current_span(),
    );

    Response::from_parts(parts, caller_body)
}

async fn pump(
    first: Bytes,
    mut body: Body,
    mut sender: hyper::body::Sender,
) -> (u64, Option<RelayError>) {
    let mut sent = 0u64;
    let mut next = Some(first);

    loop {
        if let Some(chunk) = next.take() {
            let len = chunk.len() as u64;
            if sender.send_data(chunk).await.is_err() {
                return (sent, Some(RelayError::CallerClosed(sent)));
            }
            sent += len;
        }

        match body.data().await {
            None => return (sent, None),
            Some(Ok(chunk)) => next = Some(chunk),
            Some(Err(err)) => {
                // Status is already out; cut the response short.
                sender.abort();
                return (sent, Some(RelayError::Upstream(err)));
            }
        }
    }
}

fn error_response() -> Response<Body> {
    let mut response = Response::new(Body::from(RELAY_ERROR_BODY));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
