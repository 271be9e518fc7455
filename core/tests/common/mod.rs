//! Shared fixtures: an in-memory transport driven by scripted replies, and
//! a typed GitHub client declared on top of `Courier`.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use courier_core::transport::canceled_error;
use courier_core::{
    Arg, Call, Courier, Endpoint, Error, HttpRequest, Param, RawResponse, ResponseBody,
    ResponseMeta, Transport, TransportCall, TransportCallback,
};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;

/// What the scripted server answers for the next call.
#[derive(Debug, Clone)]
pub enum Reply {
    Body {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    /// The transport fails before any response arrives.
    Failure(io::ErrorKind),
    /// Headers arrive, then the body breaks after `prefix`.
    Broken { status: u16, prefix: Vec<u8> },
    /// Wait, then answer. Cancellation is checked after the wait.
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Body {
            status,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Reply::Body {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Shared {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: Mutex<Vec<ScriptedCall>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.shared.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Requests handed to the transport, in creation order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.shared.requests.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.shared.calls.lock().unwrap().len()
    }

    pub fn call(&self, index: usize) -> ScriptedCall {
        self.shared.calls.lock().unwrap()[index].clone()
    }

    /// Wait for every background delivery; panics if one of them panicked.
    pub fn join(&self) {
        let workers: Vec<_> = self.shared.workers.lock().unwrap().drain(..).collect();
        for worker in workers {
            worker.join().expect("transport thread panicked");
        }
    }
}

impl Transport for ScriptedTransport {
    fn new_call(&self, request: HttpRequest) -> Arc<dyn TransportCall> {
        let reply = self.shared.replies.lock().unwrap().pop_front();
        self.shared.requests.lock().unwrap().push(request.clone());
        let call = ScriptedCall {
            request: Arc::new(request),
            reply: Arc::new(Mutex::new(reply)),
            canceled: Arc::new(AtomicBool::new(false)),
            executions: Arc::new(AtomicUsize::new(0)),
            shared: self.shared.clone(),
        };
        self.shared.calls.lock().unwrap().push(call.clone());
        Arc::new(call)
    }
}

#[derive(Clone)]
pub struct ScriptedCall {
    request: Arc<HttpRequest>,
    reply: Arc<Mutex<Option<Reply>>>,
    canceled: Arc<AtomicBool>,
    executions: Arc<AtomicUsize>,
    shared: Arc<Shared>,
}

impl ScriptedCall {
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn run(&self) -> io::Result<RawResponse> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().take();
        self.answer(reply)
    }

    fn answer(&self, reply: Option<Reply>) -> io::Result<RawResponse> {
        if self.canceled() {
            return Err(canceled_error());
        }
        let meta = |status: u16| ResponseMeta {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            url: self.request.url.clone(),
        };
        match reply {
            None => Err(io::Error::new(io::ErrorKind::Other, "no scripted reply")),
            Some(Reply::Failure(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(Reply::Body {
                status,
                content_type,
                body,
            }) => Ok(RawResponse {
                meta: meta(status),
                body: ResponseBody::from_reader(
                    content_type.as_deref(),
                    Some(body.len() as u64),
                    Box::new(io::Cursor::new(body)),
                ),
            }),
            Some(Reply::Broken { status, prefix }) => Ok(RawResponse {
                meta: meta(status),
                body: ResponseBody::from_reader(
                    Some("application/json"),
                    None,
                    Box::new(BrokenReader { prefix, offset: 0 }),
                ),
            }),
            Some(Reply::Delayed(wait, reply)) => {
                thread::sleep(wait);
                self.answer(Some(*reply))
            }
        }
    }
}

impl TransportCall for ScriptedCall {
    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn execute(&self) -> io::Result<RawResponse> {
        self.run()
    }

    fn enqueue(&self, callback: TransportCallback) {
        let call = self.clone();
        let worker = thread::spawn(move || callback(call.run()));
        self.shared.workers.lock().unwrap().push(worker);
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.canceled()
    }
}

struct BrokenReader {
    prefix: Vec<u8>,
    offset: usize,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset < self.prefix.len() {
            let n = buf.len().min(self.prefix.len() - self.offset);
            buf[..n].copy_from_slice(&self.prefix[self.offset..self.offset + n]);
            self.offset += n;
            return Ok(n);
        }
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
    }
}

pub fn courier(transport: &ScriptedTransport) -> Courier {
    Courier::builder()
        .base_url("https://api.github.com/")
        .transport(Arc::new(transport.clone()))
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Typed client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub contributions: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    pub total_count: usize,
    pub items: Vec<Repository>,
    pub query: Vec<(String, String)>,
}

/// One method per endpoint, each building a call from its declaration.
pub struct GitHub {
    courier: Courier,
    contributors: Endpoint<Vec<Contributor>>,
    contributors_with_agent: Endpoint<Vec<Contributor>>,
    search: Endpoint<SearchResult>,
    search_map: Endpoint<SearchResult>,
}

impl GitHub {
    pub fn new(courier: Courier) -> Result<Self, Error> {
        let contributors = Endpoint::named("GitHub.contributors")
            .get("repos/{owner}/{repo}/contributors")
            .param(Param::path("owner"))
            .param(Param::path("repo"))
            .returns::<Vec<Contributor>>();
        let contributors_with_agent = Endpoint::named("GitHub.contributorsWithAgent")
            .get("repos/{owner}/{repo}/contributors")
            .headers(["Accept: application/vnd.github.v3.full+json", "User-Agent: Courier-Sample-App"])
            .param(Param::path("owner"))
            .param(Param::path("repo"))
            .param(Param::header("Accept"))
            .returns::<Vec<Contributor>>();
        let search = Endpoint::named("GitHub.search")
            .get("search/repositories")
            .param(Param::query("q"))
            .param(Param::query("since"))
            .param(Param::query("page").of_type::<u32>())
            .param(Param::query("per_page").of_type::<u32>())
            .returns::<SearchResult>();
        let search_map = Endpoint::named("GitHub.searchMap")
            .get("search/repositories")
            .param(Param::query_map())
            .returns::<SearchResult>();
        courier.register(&contributors)?;
        courier.register(&contributors_with_agent)?;
        courier.register(&search)?;
        courier.register(&search_map)?;
        Ok(Self {
            courier,
            contributors,
            contributors_with_agent,
            search,
            search_map,
        })
    }

    pub fn contributors(&self, owner: &str, repo: &str) -> Result<Box<dyn Call<Vec<Contributor>>>, Error> {
        self.courier.call(&self.contributors, vec![owner.into(), repo.into()])
    }

    pub fn contributors_with_agent(
        &self,
        owner: &str,
        repo: &str,
        accept: Option<&str>,
    ) -> Result<Box<dyn Call<Vec<Contributor>>>, Error> {
        self.courier.call(
            &self.contributors_with_agent,
            vec![owner.into(), repo.into(), accept.into()],
        )
    }

    pub fn search(
        &self,
        q: &str,
        since: Option<&str>,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Box<dyn Call<SearchResult>>, Error> {
        self.courier.call(
            &self.search,
            vec![q.into(), since.into(), page.into(), per_page.into()],
        )
    }

    pub fn search_map(&self, query: impl Into<Arg>) -> Result<Box<dyn Call<SearchResult>>, Error> {
        self.courier.call(&self.search_map, vec![query.into()])
    }
}
