//! Blocking transport over a [`ureq::Agent`].
//!
//! Status codes are never turned into errors here (`http_status_as_error`
//! is off), so 4xx/5xx responses reach the status-code policy as data.
//! `enqueue` runs the blocking request on its own thread. Cancellation is
//! checked before the request is sent and again once the response head
//! arrives; a request in flight is not interrupted.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use log::{debug, error};

use crate::http::{HttpRequest, RawResponse, ResponseBody, ResponseMeta};
use crate::transport::{canceled_error, Transport, TransportCall, TransportCallback};

#[derive(Clone)]
pub struct UreqTransport {
    agent: ::ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ::ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a preconfigured agent (timeouts, proxy, TLS). It must be built
    /// with `http_status_as_error(false)`.
    pub fn with_agent(agent: ::ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn new_call(&self, request: HttpRequest) -> Arc<dyn TransportCall> {
        Arc::new(UreqCall {
            agent: self.agent.clone(),
            request: Arc::new(request),
            canceled: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[derive(Clone)]
struct UreqCall {
    agent: ::ureq::Agent,
    request: Arc<HttpRequest>,
    canceled: Arc<AtomicBool>,
}

impl UreqCall {
    fn send(&self) -> io::Result<RawResponse> {
        if self.is_canceled() {
            return Err(canceled_error());
        }
        let method = self
            .request
            .method
            .to_http()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut builder = ::http::Request::builder()
            .method(method)
            .uri(self.request.url.as_str());
        for (name, value) in &self.request.headers {
            builder = builder.header(name, value);
        }
        debug!("ureq: {} {}", self.request.method, self.request.url);
        let response = match &self.request.body {
            None => {
                let request = builder.body(()).map_err(invalid_input)?;
                self.agent.run(request)
            }
            Some(body) => {
                if let Some(content_type) = &body.content_type {
                    builder = builder.header(CONTENT_TYPE, content_type.as_str());
                }
                let request = builder.body(body.bytes.to_vec()).map_err(invalid_input)?;
                self.agent.run(request)
            }
        }
        .map_err(|e| e.into_io())?;
        if self.is_canceled() {
            return Err(canceled_error());
        }

        let (parts, body) = response.into_parts();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = ResponseBody::from_reader(
            content_type.as_deref(),
            content_length,
            Box::new(body.into_reader()),
        );
        Ok(RawResponse {
            meta: ResponseMeta {
                status: parts.status,
                headers: parts.headers,
                url: self.request.url.clone(),
            },
            body,
        })
    }
}

fn invalid_input(e: ::http::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e)
}

impl TransportCall for UreqCall {
    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn execute(&self) -> io::Result<RawResponse> {
        self.send()
    }

    fn enqueue(&self, callback: TransportCallback) {
        let worker = self.clone();
        let pending = Arc::new(Mutex::new(Some(callback)));
        let handed_off = pending.clone();
        let spawned = thread::Builder::new()
            .name("courier-ureq".to_string())
            .spawn(move || {
                let callback = handed_off.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    callback(worker.send());
                }
            });
        if let Err(e) = spawned {
            error!("could not start transport thread: {e}");
            let callback = pending.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(callback) = callback {
                callback(Err(e));
            }
        }
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}
