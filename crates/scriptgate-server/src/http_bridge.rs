//! Conversions between hyper messages and connector messages.
//!
//! The connector does not listen on a socket itself. A host server built on
//! hyper converts each incoming request with [`into_request`], dispatches it,
//! and converts the result back with [`into_hyper_response`] or
//! [`fault_response`]. [`respond`] does all three.
//!
//! # Example
//!
//! ```no_run
//! use hyper::service::service_fn;
//! use scriptgate_server::{Dispatcher, GatewayConfig, http_bridge};
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(Dispatcher::from_config(GatewayConfig::new("/srv/handlers")).unwrap());
//! let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
//!     let dispatcher = dispatcher.clone();
//!     async move { Ok::<_, std::convert::Infallible>(http_bridge::respond(dispatcher, req).await) }
//! });
//! ```

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::StatusCode;
use scriptgate_common::{GatewayError, Headers, Request, Response, Result};
use std::fmt::Display;
use std::sync::Arc;

use crate::dispatcher::Dispatcher;

/// Type alias for hyper responses with a fully buffered body
pub type HyperResponse = hyper::Response<Full<Bytes>>;

/// Collects `req` into a connector [`Request`].
///
/// Repeated header fields are joined with `", "`.
pub async fn into_request<B>(req: hyper::Request<B>) -> Result<Request>
where
    B: Body,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();

    let body = body
        .collect()
        .await
        .map_err(|e| GatewayError::Handler(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        let joined = match headers.get(name.as_str()) {
            Some(previous) => format!("{}, {}", previous, value),
            None => value.into_owned(),
        };
        headers.insert(name.as_str(), joined);
    }

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Ok(Request {
        path: path.to_string(),
        method: parts.method.as_str().to_string(),
        headers,
        body: body.to_vec(),
        protocol_version: format!("{:?}", parts.version),
    })
}

/// Drains `response` into a hyper response.
///
/// # Errors
///
/// Returns `GatewayError::Handler` if the handler produced a status or header
/// that is not valid HTTP.
pub fn into_hyper_response(mut response: Response) -> Result<HyperResponse> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| GatewayError::Handler(format!("Invalid status {}: {}", response.status, e)))?;

    let mut builder = hyper::Response::builder().status(status);
    for (name, value) in response.headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GatewayError::Handler(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| GatewayError::Handler(format!("Invalid value for header {}: {}", name, e)))?;
        builder = builder.header(name, value);
    }

    builder
        .body(Full::new(Bytes::from(response.body.read_all())))
        .map_err(|e| GatewayError::Handler(format!("Failed to build response: {}", e)))
}

/// Plain-text 500 response for a handler fault.
pub fn fault_response(err: &GatewayError) -> HyperResponse {
    let mut response = hyper::Response::new(Full::new(Bytes::from(err.to_string())));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Converts, dispatches and converts back, mapping every fault to
/// [`fault_response`].
pub async fn respond<B>(dispatcher: Arc<Dispatcher>, req: hyper::Request<B>) -> HyperResponse
where
    B: Body,
    B::Error: Display,
{
    let result: Result<HyperResponse> = async {
        let request = into_request(req).await?;
        let response = dispatcher.handle_async(request).await?;
        into_hyper_response(response)
    }
    .await;

    result.unwrap_or_else(|e| {
        tracing::error!("Handler fault: {}", e);
        fault_response(&e)
    })
}
