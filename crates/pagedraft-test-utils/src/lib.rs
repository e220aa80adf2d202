//! Testing utilities for pagedraft workspace
//!
//! Shared test doubles and fixtures:
//! - [`ScriptedTransport`]: in-memory [`SectionTransport`] with scripted
//!   results and per-section gates for holding responses
//! - [`ScriptedBackend`]: in-memory [`HttpBackend`] with routed responses and
//!   an optional anti-forgery token check
//! - Page fixtures

#![allow(missing_docs)]

use async_trait::async_trait;
use pagedraft_core::{
    DocumentId, EditorSession, MemoryPreferenceStore, Section, SectionTransport, SessionConfig,
    TransportError,
};
use pagedraft_transport::{ApiMethod, ApiRequest, ApiResponse, HttpBackend};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

// ----------------------------------------------------------------------
// Section transport double
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PersistCall {
    pub document: DocumentId,
    pub section: Section,
    pub payload: Value,
}

#[derive(Debug, Default)]
struct TransportScript {
    persist_results: HashMap<Section, VecDeque<Result<(), TransportError>>>,
    loads: HashMap<Section, Result<Value, TransportError>>,
    persists: Vec<PersistCall>,
    load_calls: Vec<(DocumentId, Section)>,
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<TransportScript>,
    gates: Mutex<HashMap<Section, Arc<Semaphore>>>,
    load_gate: Mutex<Option<Arc<Semaphore>>>,
    activity: Notify,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` from `load`
    #[must_use]
    pub fn with_page(self, page: Vec<(Section, Value)>) -> Self {
        {
            let mut script = self.script.lock();
            for (section, value) in page {
                script.loads.insert(section, Ok(value));
            }
        }
        self
    }

    pub fn set_load(&self, section: Section, result: Result<Value, TransportError>) {
        self.script.lock().loads.insert(section, result);
    }

    /// Queue the result of the next persist of `section`; unqueued calls succeed
    pub fn push_persist_result(&self, section: Section, result: Result<(), TransportError>) {
        self.script
            .lock()
            .persist_results
            .entry(section)
            .or_default()
            .push_back(result);
    }

    /// Park persists of `section` until [`release`](Self::release)
    pub fn hold(&self, section: Section) {
        self.gates
            .lock()
            .insert(section, Arc::new(Semaphore::new(0)));
    }

    /// Let one parked persist of `section` respond
    pub fn release(&self, section: Section) {
        if let Some(gate) = self.gates.lock().get(&section) {
            gate.add_permits(1);
        }
    }

    /// Stop parking `section`; waiting calls respond
    pub fn open(&self, section: Section) {
        if let Some(gate) = self.gates.lock().remove(&section) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Park every load until [`release_loads`](Self::release_loads)
    pub fn hold_loads(&self) {
        *self.load_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_loads(&self) {
        if let Some(gate) = self.load_gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    #[must_use]
    pub fn persists(&self) -> Vec<PersistCall> {
        self.script.lock().persists.clone()
    }

    #[must_use]
    pub fn persists_of(&self, section: Section) -> Vec<Value> {
        self.script
            .lock()
            .persists
            .iter()
            .filter(|call| call.section == section)
            .map(|call| call.payload.clone())
            .collect()
    }

    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.script.lock().persists.len()
    }

    #[must_use]
    pub fn load_calls(&self) -> Vec<(DocumentId, Section)> {
        self.script.lock().load_calls.clone()
    }

    /// Wait until at least `count` persists have been issued
    pub async fn wait_for_persists(&self, count: usize) {
        loop {
            let notified = self.activity.notified();
            if self.persist_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Wait until at least `count` loads have been issued
    pub async fn wait_for_loads(&self, count: usize) {
        loop {
            let notified = self.activity.notified();
            if self.script.lock().load_calls.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl SectionTransport for ScriptedTransport {
    async fn persist(
        &self,
        document: &DocumentId,
        section: Section,
        payload: &Value,
    ) -> Result<(), TransportError> {
        let result = {
            let mut script = self.script.lock();
            script.persists.push(PersistCall {
                document: document.clone(),
                section,
                payload: payload.clone(),
            });
            script
                .persist_results
                .get_mut(&section)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(()))
        };
        self.activity.notify_waiters();

        let gate = self.gates.lock().get(&section).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        result
    }

    async fn load(&self, document: &DocumentId, section: Section) -> Result<Value, TransportError> {
        let result = {
            let mut script = self.script.lock();
            script.load_calls.push((document.clone(), section));
            script.loads.get(&section).cloned().unwrap_or_else(|| {
                Err(TransportError::Rejected {
                    status: 404,
                    message: format!("{section} not scripted"),
                })
            })
        };
        self.activity.notify_waiters();

        let gate = self.load_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        result
    }
}

// ----------------------------------------------------------------------
// HTTP backend double
// ----------------------------------------------------------------------

#[derive(Debug, Default)]
struct Routes {
    queued: HashMap<String, VecDeque<Result<ApiResponse, TransportError>>>,
    sticky: HashMap<String, ApiResponse>,
    requests: Vec<ApiRequest>,
    token_check: Option<(String, String)>,
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    routes: Mutex<Routes>,
    latency: Option<Duration>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before every response
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer PUTs whose `header` differs from `token` with 419
    #[must_use]
    pub fn with_token_check(self, header: &str, token: &str) -> Self {
        self.routes.lock().token_check = Some((header.to_string(), token.to_string()));
        self
    }

    /// Answer the next request to `path` with `response`
    pub fn respond(&self, path: &str, response: ApiResponse) {
        self.push(path, Ok(response));
    }

    /// Fail the next request to `path`
    pub fn fail(&self, path: &str, err: TransportError) {
        self.push(path, Err(err));
    }

    /// Answer every request to `path` with `response` once the queue is empty
    pub fn respond_always(&self, path: &str, response: ApiResponse) {
        self.routes.lock().sticky.insert(path.to_string(), response);
    }

    /// Serve `token` from the refresh endpoints of `config`
    pub fn issue_token(&self, session_path: &str, token_path: &str, token: &str) {
        self.respond_always(session_path, ApiResponse::new(204, Value::Null));
        self.respond_always(token_path, ApiResponse::new(200, json!({ "token": token })));
    }

    fn push(&self, path: &str, result: Result<ApiResponse, TransportError>) {
        self.routes
            .lock()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(result);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.routes.lock().requests.clone()
    }

    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.routes
            .lock()
            .requests
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let result = {
            let mut routes = self.routes.lock();
            routes.requests.push(request.clone());

            let stale = match (&routes.token_check, request.method) {
                (Some((header, token)), ApiMethod::Put) => {
                    request.header(header) != Some(token.as_str())
                }
                _ => false,
            };
            if stale {
                Ok(ApiResponse::new(419, json!({ "message": "CSRF token mismatch." })))
            } else if let Some(next) = routes
                .queued
                .get_mut(&request.path)
                .and_then(VecDeque::pop_front)
            {
                next
            } else if let Some(response) = routes.sticky.get(&request.path) {
                Ok(response.clone())
            } else {
                Ok(ApiResponse::new(404, json!({ "message": "Not Found" })))
            }
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

pub const DOCUMENT: &str = "page-1";

#[must_use]
pub fn block(id: u64, title: &str, url: &str) -> Value {
    json!({ "id": id, "title": title, "url": url })
}

#[must_use]
pub fn sample_blocks() -> Value {
    json!([
        block(1, "Portfolio", "https://example.com/work"),
        block(2, "Newsletter", "https://example.com/news"),
    ])
}

#[must_use]
pub fn sample_design() -> Value {
    json!({ "background": "white", "font": "Inter", "button_style": "rounded" })
}

#[must_use]
pub fn sample_page() -> Vec<(Section, Value)> {
    vec![
        (Section::ContentBlocks, sample_blocks()),
        (
            Section::SocialLinks,
            json!([{ "platform": "github", "url": "https://github.com/example" }]),
        ),
        (Section::Design, sample_design()),
        (Section::Settings, json!({ "title": "My page", "published": true })),
    ]
}

/// Session over a scripted transport with in-memory preferences
#[must_use]
pub fn session_with(
    config: SessionConfig,
    transport: &Arc<ScriptedTransport>,
) -> EditorSession {
    EditorSession::new(
        config,
        Arc::clone(transport) as Arc<dyn SectionTransport>,
        Arc::new(MemoryPreferenceStore::new()),
    )
}

/// Default-configured session over a transport serving [`sample_page`]
#[must_use]
pub fn sample_session() -> (EditorSession, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new().with_page(sample_page()));
    let session = session_with(SessionConfig::new(), &transport);
    (session, transport)
}
