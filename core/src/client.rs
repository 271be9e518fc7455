//! The configured client.
//!
//! # Design
//! [`Courier`] owns everything endpoints share: the base URL, the transport,
//! the converter factories and the call adapter. Endpoint descriptors are
//! compiled on first use (or on registration with `validate_eagerly`) and
//! memoized by endpoint name, so typed clients can declare their endpoints
//! as plain data and call through the cache.
//!
//! ```no_run
//! use courier_core::{Courier, Endpoint, Param};
//! # #[derive(serde::Deserialize)] struct Contributor { login: String }
//!
//! let courier = Courier::builder()
//!     .base_url("https://api.github.com/")
//!     .ureq()
//!     .build()?;
//! let contributors = Endpoint::named("GitHub.contributors")
//!     .get("repos/{owner}/{repo}/contributors")
//!     .param(Param::path("owner"))
//!     .param(Param::path("repo"))
//!     .returns::<Vec<Contributor>>();
//! let call = courier.call(&contributors, vec!["square".into(), "retrofit".into()])?;
//! let response = call.execute()?;
//! # Ok::<(), courier_core::Error>(())
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use url::Url;

use crate::adapter::CallAdapter;
use crate::arg::Arg;
use crate::call::{Call, HttpCall};
use crate::converter::{BuiltInConverters, ConverterFactory, Converters, JsonConverterFactory};
use crate::endpoint::{Endpoint, MethodAnnotation, Param};
use crate::error::{ConfigError, Error};
use crate::executor::{Executor, Platform, PlainPlatform};
use crate::service_method::ServiceMethod;
use crate::transport::Transport;

/// What happens to the body of a non-2xx response before it is handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorBodyPolicy {
    /// Read the whole error body into memory first.
    #[default]
    Buffer,
    /// Hand out the error body still streaming.
    Stream,
}

/// Client-wide inputs to the descriptor compiler.
pub(crate) struct Settings {
    pub(crate) base_url: Url,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) converters: Converters,
    pub(crate) adapter: CallAdapter,
    pub(crate) error_body: ErrorBodyPolicy,
}

/// A compiled descriptor together with the declaration it was compiled from.
struct Cached {
    annotations: Vec<MethodAnnotation>,
    params: Vec<Param>,
    method: Arc<dyn Any + Send + Sync>,
}

impl Cached {
    fn declares<T>(&self, endpoint: &Endpoint<T>) -> bool {
        self.annotations == endpoint.annotations() && self.params == endpoint.params()
    }
}

type Cache = HashMap<String, Cached>;

pub struct Courier {
    settings: Settings,
    callback_executor: Option<Arc<dyn Executor>>,
    validate_eagerly: bool,
    cache: RwLock<Cache>,
}

impl Courier {
    pub fn builder() -> CourierBuilder {
        CourierBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.settings.base_url
    }

    pub fn converters(&self) -> &Converters {
        &self.settings.converters
    }

    pub fn callback_executor(&self) -> Option<&Arc<dyn Executor>> {
        self.callback_executor.as_ref()
    }

    pub fn error_body_policy(&self) -> ErrorBodyPolicy {
        self.settings.error_body
    }

    /// The compiled descriptor for `endpoint`, compiling it on first use.
    ///
    /// Names identify descriptors: reusing a name for a different
    /// declaration is a configuration error.
    pub fn load<T: Send + 'static>(&self, endpoint: &Endpoint<T>) -> Result<Arc<ServiceMethod<T>>, ConfigError> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(endpoint.name()) {
                return downcast(endpoint, cached);
            }
        }

        let compiled = Cached {
            annotations: endpoint.annotations().to_vec(),
            params: endpoint.params().to_vec(),
            method: Arc::new(ServiceMethod::compile(endpoint, &self.settings)?),
        };
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(endpoint.name().to_string()).or_insert(compiled);
        debug!("cached descriptor for {}", endpoint.name());
        downcast(endpoint, entry)
    }

    /// Declare an endpoint to the client. With `validate_eagerly` the
    /// endpoint is compiled now, so declaration mistakes surface here.
    pub fn register<T: Send + 'static>(&self, endpoint: &Endpoint<T>) -> Result<(), ConfigError> {
        if self.validate_eagerly {
            self.load(endpoint)?;
        }
        Ok(())
    }

    /// Create a call for one invocation of `endpoint`.
    ///
    /// Only declaration problems fail here. Argument problems are captured
    /// by the call and reported when it runs.
    pub fn call<T: Send + 'static>(
        &self,
        endpoint: &Endpoint<T>,
        args: Vec<Arg>,
    ) -> Result<Box<dyn Call<T>>, Error> {
        let method = self.load(endpoint)?;
        let args: Arc<[Arg]> = args.into();
        let call: Box<dyn Call<T>> = Box::new(HttpCall::new(method.clone(), args));
        Ok(method.adapter().adapt(call))
    }
}

fn downcast<T: Send + 'static>(
    endpoint: &Endpoint<T>,
    cached: &Cached,
) -> Result<Arc<ServiceMethod<T>>, ConfigError> {
    if !cached.declares(endpoint) {
        return Err(ConfigError::method(
            endpoint.name(),
            "Endpoint name is already registered with a different declaration.",
        ));
    }
    cached.method.clone().downcast::<ServiceMethod<T>>().map_err(|_| {
        ConfigError::method(
            endpoint.name(),
            format!(
                "Endpoint name is already registered with a result type other than {}.",
                endpoint.response_type().name()
            ),
        )
    })
}

impl fmt::Debug for Courier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Courier")
            .field("base_url", &self.settings.base_url.as_str())
            .field("converters", &self.settings.converters.factory_names())
            .field("adapter", &self.settings.adapter)
            .field("validate_eagerly", &self.validate_eagerly)
            .field("error_body", &self.settings.error_body)
            .finish()
    }
}

/// Builder for [`Courier`]. `base_url` and `transport` are required.
pub struct CourierBuilder {
    base_url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    factories: Vec<Arc<dyn ConverterFactory>>,
    json: bool,
    callback_executor: Option<Arc<dyn Executor>>,
    platform: Arc<dyn Platform>,
    validate_eagerly: bool,
    error_body: ErrorBodyPolicy,
}

impl Default for CourierBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            transport: None,
            factories: Vec::new(),
            json: true,
            callback_executor: None,
            platform: Arc::new(PlainPlatform),
            validate_eagerly: false,
            error_body: ErrorBodyPolicy::default(),
        }
    }
}

impl CourierBuilder {
    /// Must end in `/`. Relative endpoint URLs resolve against it.
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a default [`UreqTransport`](crate::transport::ureq::UreqTransport).
    #[cfg(feature = "ureq")]
    pub fn ureq(self) -> Self {
        self.transport(Arc::new(crate::transport::ureq::UreqTransport::new()))
    }

    /// Factories are consulted after the built-in converters, in the order
    /// they were added, and before the JSON converter.
    pub fn add_converter_factory(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn without_json(mut self) -> Self {
        self.json = false;
        self
    }

    /// Where enqueued calls deliver their callbacks. Overrides the platform
    /// default.
    pub fn callback_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.callback_executor = Some(executor);
        self
    }

    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn validate_eagerly(mut self, validate: bool) -> Self {
        self.validate_eagerly = validate;
        self
    }

    pub fn error_body(mut self, policy: ErrorBodyPolicy) -> Self {
        self.error_body = policy;
        self
    }

    pub fn build(self) -> Result<Courier, Error> {
        let Some(base_url) = self.base_url else {
            return Err(Error::Argument("Base URL required.".to_string()));
        };
        let parsed = Url::parse(&base_url)?;
        if !parsed.path().ends_with('/') {
            return Err(Error::Argument(format!("baseUrl must end in /: {base_url}")));
        }
        let Some(transport) = self.transport else {
            return Err(Error::Argument("Transport required.".to_string()));
        };

        let mut factories: Vec<Arc<dyn ConverterFactory>> = vec![Arc::new(BuiltInConverters)];
        factories.extend(self.factories);
        if self.json {
            factories.push(Arc::new(JsonConverterFactory));
        }

        let callback_executor = self
            .callback_executor
            .or_else(|| self.platform.default_callback_executor());
        let adapter = match &callback_executor {
            Some(executor) => CallAdapter::Executor(executor.clone()),
            None => CallAdapter::Direct,
        };
        debug!("courier for {parsed} ({adapter:?})");

        Ok(Courier {
            settings: Settings {
                base_url: parsed,
                transport,
                converters: Converters::new(factories),
                adapter,
                error_body: self.error_body,
            },
            callback_executor,
            validate_eagerly: self.validate_eagerly,
            cache: RwLock::new(HashMap::new()),
        })
    }
}
