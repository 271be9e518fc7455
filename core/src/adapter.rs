//! Call adapters: where a call's completion is delivered.

use std::fmt;
use std::sync::Arc;

use log::trace;

use crate::call::{deliver, Call, Callback};
use crate::error::Error;
use crate::executor::Executor;
use crate::http::HttpRequest;
use crate::response::Response;

/// Chosen once per client and stored on every compiled descriptor.
#[derive(Clone, Default)]
pub enum CallAdapter {
    /// Callbacks run on the thread that completed the transport call.
    #[default]
    Direct,
    /// Callbacks are handed to an executor.
    Executor(Arc<dyn Executor>),
}

impl CallAdapter {
    pub fn adapt<T: Send + 'static>(&self, call: Box<dyn Call<T>>) -> Box<dyn Call<T>> {
        match self {
            CallAdapter::Direct => call,
            CallAdapter::Executor(executor) => {
                Box::new(ExecutorCallbackCall::new(executor.clone(), call))
            }
        }
    }
}

impl fmt::Debug for CallAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallAdapter::Direct => f.write_str("Direct"),
            CallAdapter::Executor(_) => f.write_str("Executor"),
        }
    }
}

/// Delivers the delegate's callbacks through an [`Executor`].
///
/// A response arriving after the call was canceled is reported as
/// [`Error::Canceled`] instead.
pub struct ExecutorCallbackCall<T> {
    executor: Arc<dyn Executor>,
    delegate: Arc<dyn Call<T>>,
}

impl<T: Send + 'static> ExecutorCallbackCall<T> {
    pub fn new(executor: Arc<dyn Executor>, delegate: Box<dyn Call<T>>) -> Self {
        Self {
            executor,
            delegate: Arc::from(delegate),
        }
    }
}

impl<T: Send + 'static> Call<T> for ExecutorCallbackCall<T> {
    fn execute(&self) -> Result<Response<T>, Error> {
        self.delegate.execute()
    }

    fn enqueue(&self, callback: Box<dyn Callback<T>>) -> Result<(), Error> {
        let executor = self.executor.clone();
        let delegate = self.delegate.clone();
        self.delegate.enqueue(Box::new(move |outcome: Result<Response<T>, Error>| {
            trace!("handing call outcome to executor");
            executor.execute(Box::new(move || {
                let outcome = match outcome {
                    Ok(_) if delegate.is_canceled() => Err(Error::Canceled),
                    other => other,
                };
                deliver(callback, outcome);
            }));
        }))
    }

    fn is_executed(&self) -> bool {
        self.delegate.is_executed()
    }

    fn cancel(&self) {
        self.delegate.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.delegate.is_canceled()
    }

    fn request(&self) -> Result<HttpRequest, Error> {
        self.delegate.request()
    }

    fn clone_call(&self) -> Box<dyn Call<T>> {
        Box::new(ExecutorCallbackCall::new(
            self.executor.clone(),
            self.delegate.clone_call(),
        ))
    }
}
