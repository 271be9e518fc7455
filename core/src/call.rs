//! The single-use, cancelable unit of execution.
//!
//! # Design
//! [`HttpCall`] is the state machine behind every [`Call`]. Its `executed`
//! flag, the lazily created transport call and a captured creation failure
//! sit behind one mutex so they always change together. Cancellation is a
//! separate atomic flag: it may be set from any thread at any time, and a
//! transport call created after the flag was raised is canceled as soon as
//! it exists.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, trace, warn};

use crate::arg::Arg;
use crate::client::ErrorBodyPolicy;
use crate::error::Error;
use crate::http::{HttpRequest, IoErrorSlot, RawResponse};
use crate::response::Response;
use crate::service_method::ServiceMethod;
use crate::transport::TransportCall;

/// Receives the outcome of an enqueued call: exactly one of the two
/// methods is invoked.
///
/// Closures taking `Result<Response<T>, Error>` implement it directly.
pub trait Callback<T>: Send + 'static {
    fn on_response(self: Box<Self>, response: Response<T>);
    fn on_failure(self: Box<Self>, error: Error);
}

impl<T, F> Callback<T> for F
where
    F: FnOnce(Result<Response<T>, Error>) + Send + 'static,
{
    fn on_response(self: Box<Self>, response: Response<T>) {
        (*self)(Ok(response))
    }

    fn on_failure(self: Box<Self>, error: Error) {
        (*self)(Err(error))
    }
}

/// One invocation of an endpoint.
///
/// A call runs at most once, through either [`execute`](Call::execute) or
/// [`enqueue`](Call::enqueue). Use [`clone_call`](Call::clone_call) to run
/// the same request again.
pub trait Call<T>: Send + Sync {
    /// Run the request on the current thread and wait for the response.
    fn execute(&self) -> Result<Response<T>, Error>;

    /// Run the request asynchronously. Fails only when the call was already
    /// executed; every other outcome goes to `callback`.
    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), Error>;

    fn is_executed(&self) -> bool;

    /// Cancel the call. Idempotent, and a no-op once the call completed.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;

    /// The request this call sends, built on first access.
    fn request(&self) -> Result<HttpRequest, Error>;

    /// A fresh, unexecuted call for the same endpoint and arguments.
    fn clone_call(&self) -> Box<dyn Call<T>>;
}

#[derive(Default)]
struct State {
    executed: bool,
    raw_call: Option<Arc<dyn TransportCall>>,
    creation_failure: Option<Error>,
}

/// [`Call`] implementation backed by a [`Transport`](crate::transport::Transport).
pub struct HttpCall<T> {
    method: Arc<ServiceMethod<T>>,
    args: Arc<[Arg]>,
    canceled: AtomicBool,
    state: Mutex<State>,
}

impl<T: Send + 'static> HttpCall<T> {
    pub fn new(method: Arc<ServiceMethod<T>>, args: Arc<[Arg]>) -> Self {
        Self {
            method,
            args,
            canceled: AtomicBool::new(false),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached transport call, creating it on first use. A failed
    /// creation is remembered and replayed.
    fn raw_call(&self, state: &mut State) -> Result<Arc<dyn TransportCall>, Error> {
        if let Some(failure) = &state.creation_failure {
            warn!("{}: replaying request creation failure: {failure}", self.method.name());
            return Err(failure.clone());
        }
        if let Some(call) = &state.raw_call {
            return Ok(call.clone());
        }
        match self.method.to_request(&self.args) {
            Ok(request) => {
                trace!("{}: created {} {}", self.method.name(), request.method, request.url);
                let call = self.method.transport().new_call(request);
                if self.canceled.load(Ordering::SeqCst) {
                    call.cancel();
                }
                state.raw_call = Some(call.clone());
                Ok(call)
            }
            Err(e) => {
                state.creation_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Claim the single execution and obtain the transport call.
    fn start(&self) -> Result<Result<Arc<dyn TransportCall>, Error>, Error> {
        let mut state = self.lock();
        if state.executed {
            return Err(Error::AlreadyExecuted);
        }
        state.executed = true;
        Ok(self.raw_call(&mut state))
    }
}

impl<T: Send + 'static> Call<T> for HttpCall<T> {
    fn execute(&self) -> Result<Response<T>, Error> {
        let call = self.start()??;
        debug!("{}: executing", self.method.name());
        match call.execute() {
            Ok(raw) => parse_response(&self.method, raw),
            Err(_) if call.is_canceled() => Err(Error::Canceled),
            Err(e) => Err(e.into()),
        }
    }

    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), Error> {
        let call = match self.start()? {
            Ok(call) => call,
            Err(e) => {
                deliver(callback, Err(e));
                return Ok(());
            }
        };
        debug!("{}: enqueued", self.method.name());
        let method = self.method.clone();
        let handle = call.clone();
        call.enqueue(Box::new(move |result: io::Result<RawResponse>| {
            let outcome = match result {
                Ok(raw) => parse_response(&method, raw),
                Err(_) if handle.is_canceled() => Err(Error::Canceled),
                Err(e) => Err(e.into()),
            };
            deliver(callback, outcome);
        }));
        Ok(())
    }

    fn is_executed(&self) -> bool {
        self.lock().executed
    }

    fn cancel(&self) {
        if self.canceled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("{}: canceled", self.method.name());
        let call = self.lock().raw_call.clone();
        if let Some(call) = call {
            call.cancel();
        }
    }

    fn is_canceled(&self) -> bool {
        if self.canceled.load(Ordering::SeqCst) {
            return true;
        }
        self.lock()
            .raw_call
            .as_ref()
            .is_some_and(|call| call.is_canceled())
    }

    fn request(&self) -> Result<HttpRequest, Error> {
        let mut state = self.lock();
        let call = self.raw_call(&mut state)?;
        Ok(call.request().clone())
    }

    fn clone_call(&self) -> Box<dyn Call<T>> {
        Box::new(HttpCall::new(self.method.clone(), self.args.clone()))
    }
}

/// Apply the status-code policy and convert a successful body.
fn parse_response<T: Send + 'static>(
    method: &ServiceMethod<T>,
    raw: RawResponse,
) -> Result<Response<T>, Error> {
    let RawResponse { meta, body } = raw;
    let code = meta.status.as_u16();
    if !(200..300).contains(&code) {
        let body = match method.error_body_policy() {
            ErrorBodyPolicy::Buffer => body.buffer()?,
            ErrorBodyPolicy::Stream => body,
        };
        return Ok(Response::error(body, meta));
    }
    if code == 204 || code == 205 {
        return Ok(Response::success(None, meta));
    }
    let slot = IoErrorSlot::default();
    match method.to_response(body.catching(slot.clone())) {
        Ok(value) => Ok(Response::success(Some(value), meta)),
        // A read failure during conversion is the real cause.
        Err(e) => Err(slot.take().map_or(e, Error::from)),
    }
}

/// Hand an outcome to its callback. Panics stay on this side.
pub(crate) fn deliver<T: 'static>(callback: Box<dyn Callback<T>>, outcome: Result<Response<T>, Error>) {
    let result = panic::catch_unwind(AssertUnwindSafe(move || match outcome {
        Ok(response) => callback.on_response(response),
        Err(e) => callback.on_failure(e),
    }));
    if let Err(payload) = result {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("callback panicked: {message}");
    }
}
