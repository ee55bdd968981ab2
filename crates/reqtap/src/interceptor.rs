//! 🧅 The interceptor: a tower layer that stands between the world and your handler,
//! writes down who came in, and gets out of the way.
//!
//! Every request that makes it through the inner service produces exactly one
//! [`RequestRecord`]: metadata taken before the handler runs, duration measured after
//! it finishes, and one non-blocking [`TelemetryHandle::offer`]. The response goes back
//! to the caller untouched, whether or not the record found a seat in the queue.
//!
//! If the inner service errors, the error is passed along and nothing is recorded.
//! No response, no record.

use std::net::SocketAddr;
use std::task::{Context, Poll};

use axum::extract::ConnectInfo;
use chrono::Utc;
use futures::future::BoxFuture;
use http::header::{ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, HOST, REFERER, USER_AGENT};
use http::{HeaderMap, HeaderName, Request, Response, Version};
use tokio::time::Instant;
use tower::{Layer, Service};

use crate::record::{RequestRecord, UNKNOWN_CONTENT_LENGTH};
use crate::supervisors::TelemetryHandle;

/// 🧅 Wraps any service in a [`TelemetryService`].
#[derive(Debug, Clone)]
pub struct TelemetryLayer {
    handle: TelemetryHandle,
}

impl TelemetryLayer {
    pub fn new(handle: TelemetryHandle) -> Self {
        Self { handle }
    }
}

impl<S> Layer<S> for TelemetryLayer {
    type Service = TelemetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TelemetryService {
            inner,
            handle: self.handle.clone(),
        }
    }
}

/// 📝 The service that does the actual note-taking.
#[derive(Debug, Clone)]
pub struct TelemetryService<S> {
    inner: S,
    handle: TelemetryHandle,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TelemetryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let observed_at = Utc::now();
        let started = Instant::now();
        let meta = RequestMeta::from_request(&request);
        let handle = self.handle.clone();
        let response = self.inner.call(request);

        Box::pin(async move {
            let response = response.await?;
            handle.offer(meta.into_record(observed_at, started.elapsed()));
            Ok(response)
        })
    }
}

/// 📋 Everything we can learn about a request before the handler gets it.
#[derive(Debug)]
struct RequestMeta {
    source_addr: String,
    user_agent: String,
    path: String,
    method: String,
    protocol: String,
    host: String,
    accept_language: String,
    referer: String,
    content_type: String,
    content_length: i64,
}

impl RequestMeta {
    fn from_request<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        let extensions = request.extensions();

        // -- axum puts the peer address in ConnectInfo. bare tower stacks may use a plain SocketAddr.
        let source_addr = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr)
            .or_else(|| extensions.get::<SocketAddr>().copied())
            .map(|addr| addr.to_string())
            .unwrap_or_default();

        let path = match request.uri().path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        let host = match header_text(headers, HOST) {
            host if !host.is_empty() => host,
            _ => request
                .uri()
                .authority()
                .map(|authority| authority.to_string())
                .unwrap_or_default(),
        };

        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|length| *length >= 0)
            .unwrap_or(UNKNOWN_CONTENT_LENGTH);

        Self {
            source_addr,
            user_agent: header_text(headers, USER_AGENT),
            path,
            method: request.method().as_str().to_string(),
            protocol: protocol_name(request.version()).to_string(),
            host,
            accept_language: header_text(headers, ACCEPT_LANGUAGE),
            referer: header_text(headers, REFERER),
            content_type: header_text(headers, CONTENT_TYPE),
            content_length,
        }
    }

    fn into_record(self, observed_at: chrono::DateTime<Utc>, duration: std::time::Duration) -> RequestRecord {
        RequestRecord {
            source_addr: self.source_addr,
            user_agent: self.user_agent,
            path: self.path,
            observed_at,
            method: self.method,
            protocol: self.protocol,
            host: self.host,
            accept_language: self.accept_language,
            referer: self.referer,
            content_type: self.content_type,
            content_length: self.content_length,
            duration,
        }
    }
}

// -- absent header is "", non-UTF-8 bytes get the lossy treatment
fn header_text(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "",
    }
}
