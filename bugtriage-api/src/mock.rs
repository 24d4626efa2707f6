//! Mock bug triage backend (axum), for tests and local development.
//!
//! Serves the same paths as the real backend from in-memory state. Tokens are
//! fixed per user (see [`MOCK_USERS`]). Tests can inject failures and delays
//! into the records endpoint, and revoke tokens to simulate an expired session.

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::{
    analysis::Feedback,
    batches::Batch,
    bugs::NewBug,
    config::{
        ANALYZE_PATH, BATCHES_PATH, BUG_PATH, EXPORT_PATH, FEEDBACK_PATH, LOGIN_PATH,
        OVERVIEW_PATH, RECORDS_PATH, RESET_PASSWORD_PATH, USERS_PATH,
    },
    export::{CSV_CONTENT_TYPE, to_csv},
    fields::{BugRow, RecordId},
    projector,
    query::{QueryTuple, SortDirection, SortKey},
    severity::urgency_of,
};

/// Seeded users: (username, password, company_id, token)
pub const MOCK_USERS: &[(&str, &str, i64, &str)] = &[
    ("alice", "alice-pw", 1, "token-alice"),
    ("bob", "bob-pw", 2, "token-bob"),
];

/// Seeded records for company 1, in three shapes: flat, nested under `data`, and aliased.
const SEED: &[(i64, &str, &str, &str, &str)] = &[
    (1, "Crash in WebGL rendering context on startup", "Graphics", "S1", "Active"),
    (2, "Flexbox alignment breaks on mobile view", "Layout", "S3", "Fixed"),
    (3, "Slow query execution in History API", "Storage", "S2", "Active"),
    (4, "Memory leak in video decoder thread", "Media", "S1", "NEW"),
    (5, "Typos in preferences menu", "Frontend", "S4", "RESOLVED FIXED"),
    (6, "Tab crashes when printing \"large\" PDFs", "Printing", "S2", "Active"),
    (7, "Timeout contacting sync server", "Sync", "S2", "NEW"),
    (8, "Bookmark toolbar icons blurry on HiDPI", "Frontend", "S3", "Active"),
    (9, "Security: mixed content warning missing", "Security", "S1", "Fixed"),
    (10, "Devtools console drops messages", "DevTools", "S3", "NEW"),
    (11, "Scrollbar flickers, then disappears", "Layout", "S4", "Active"),
    (12, "Download panel shows wrong size", "Downloads", "S3", "Fixed"),
];

/// Handle to a running mock server.
pub struct MockTriageHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
    state: Arc<Mutex<MockState>>,
}

impl MockTriageHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base url for `ClientConfig::base_url`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }

    /// The next records request answers with this status.
    pub fn fail_next(&self, status: u16) {
        self.state.lock().failures.push_back(status);
    }

    /// The next records request waits this long before answering.
    pub fn delay_next(&self, delay: Duration) {
        self.state.lock().delays.push_back(delay);
    }

    /// Invalidates every issued token; authenticated calls get 401.
    pub fn revoke_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    /// Number of requests served for a path (query excluded).
    pub fn request_count(&self, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    /// Feedback received so far.
    pub fn feedback(&self) -> Vec<Feedback> {
        self.state.lock().feedback.clone()
    }

    /// Raw records stored for a company.
    pub fn records(&self, company_id: i64) -> Vec<Value> {
        self.state.lock().records_for(company_id)
    }
}

#[derive(Clone)]
pub struct MockTriageServer {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTriageServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTriageServer {
    /// Server seeded with [`MOCK_USERS`] and sample records for company 1.
    pub fn new() -> Self {
        let mut state = MockState::default();
        for (username, password, company_id, token) in MOCK_USERS {
            state.users.insert(
                (*username).to_string(),
                MockUser {
                    password: (*password).to_string(),
                    role: "admin".to_string(),
                    company_id: *company_id,
                },
            );
            state
                .tokens
                .insert((*token).to_string(), (*username).to_string());
        }
        for (n, (id, summary, component, severity, status)) in SEED.iter().enumerate() {
            let record = match n % 3 {
                0 => json!({"id": id, "summary": summary, "component": component,
                    "severity": severity, "status": status}),
                1 => json!({"bug_id": id, "data": {"summary": summary, "component": component,
                    "severity": severity, "status": status}}),
                _ => json!({"bug_id": id, "summary": summary, "product": component,
                    "priority": severity, "status": status}),
            };
            state.insert_record(1, record);
        }
        state.next_bug_id = 1000;
        state.batches.push((
            1,
            Batch {
                id: 1,
                filename: "bugzilla_jan.csv".into(),
                record_count: 2,
                accuracy: Some(0.87),
                upload_time: Some("2025-01-05T10:00:00".into()),
            },
        ));
        for (id, summary) in [(501, "Imported: startup hang"), (502, "Imported: font fallback")] {
            state.insert_record(
                1,
                json!({"bug_id": id, "summary": summary, "severity": "S3", "status": "NEW", "batch_id": 1}),
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Replaces a company's records.
    #[must_use]
    pub fn with_records(self, company_id: i64, records: Vec<Value>) -> Self {
        {
            let mut state = self.state.lock();
            state.bugs.retain(|(company, _)| *company != company_id);
            for record in records {
                state.insert_record(company_id, record);
            }
        }
        self
    }

    fn router(&self) -> Router {
        Router::new()
            .route(LOGIN_PATH, post(login))
            .route(USERS_PATH, post(register).delete(delete_user))
            .route(RESET_PASSWORD_PATH, post(reset_password))
            .route(RECORDS_PATH, get(records))
            .route(EXPORT_PATH, get(export))
            .route(OVERVIEW_PATH, get(overview))
            .route(BUG_PATH, post(create_bug))
            .route(&format!("{BUG_PATH}/{{id}}"), delete(delete_bug))
            .route(ANALYZE_PATH, post(analyze))
            .route(FEEDBACK_PATH, post(feedback))
            .route(BATCHES_PATH, get(list_batches))
            .route(&format!("{BATCHES_PATH}/{{id}}"), delete(undo_batch))
            .with_state(self.state.clone())
    }

    /// Binds `addr` (port 0 picks a free port) and serves until the handle shuts down.
    pub async fn start(self, addr: SocketAddr) -> std::io::Result<MockTriageHandle> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        info!(%addr, "mock triage server listening");
        Ok(MockTriageHandle {
            addr,
            shutdown: shutdown_tx,
            task,
            state: self.state,
        })
    }
}

#[derive(Clone)]
struct MockUser {
    password: String,
    role: String,
    company_id: i64,
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, MockUser>,
    /// token -> username
    tokens: HashMap<String, String>,
    bugs: Vec<(i64, Value)>,
    next_bug_id: i64,
    next_company_id: i64,
    batches: Vec<(i64, Batch)>,
    feedback: Vec<Feedback>,
    failures: VecDeque<u16>,
    delays: VecDeque<Duration>,
    requests: Vec<String>,
}

impl MockState {
    fn insert_record(&mut self, company_id: i64, record: Value) {
        self.bugs.push((company_id, record));
    }

    fn records_for(&self, company_id: i64) -> Vec<Value> {
        self.bugs
            .iter()
            .filter(|(company, _)| *company == company_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn rows_for(&self, company_id: i64) -> Vec<BugRow> {
        self.bugs
            .iter()
            .filter(|(company, _)| *company == company_id)
            .map(|(_, record)| BugRow::from_record(record))
            .collect()
    }

    /// Resolves the bearer token to a user, or answers 401.
    fn authorize(&self, headers: &HeaderMap) -> Result<MockUser, Response> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        token
            .and_then(|token| self.tokens.get(token))
            .and_then(|username| self.users.get(username))
            .cloned()
            .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Not authenticated"))
    }

    /// Like `authorize`, and the user must belong to `company_id` (if given).
    fn authorize_company(
        &self,
        headers: &HeaderMap,
        company_id: Option<i64>,
    ) -> Result<MockUser, Response> {
        let user = self.authorize(headers)?;
        match company_id {
            Some(company) if company != user.company_id => {
                Err(error(StatusCode::FORBIDDEN, "Wrong company"))
            }
            _ => Ok(user),
        }
    }
}

type Shared = Arc<Mutex<MockState>>;

fn error(code: StatusCode, detail: &str) -> Response {
    (code, Json(json!({ "detail": detail }))).into_response()
}

fn message(text: &str) -> Response {
    Json(json!({ "message": text })).into_response()
}

fn param<T: std::str::FromStr>(params: &HashMap<String, String>, name: &str) -> Option<T> {
    params.get(name).and_then(|value| value.parse().ok())
}

fn query_tuple(params: &HashMap<String, String>) -> QueryTuple {
    QueryTuple {
        filter: params.get("search").cloned().unwrap_or_default(),
        sort_key: param::<SortKey>(params, "sort_key").unwrap_or_default(),
        sort_dir: param::<SortDirection>(params, "sort_dir").unwrap_or_default(),
        page: param(params, "page").unwrap_or(1),
    }
}

// ----------------------------------------------------------------------------
// accounts
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    req: RegisterUser,
    company_name: String,
}

#[derive(Deserialize)]
struct RegisterUser {
    username: String,
    password: String,
    #[serde(default)]
    role: Option<String>,
}

async fn login(State(state): State<Shared>, Json(creds): Json<Credentials>) -> Response {
    let mut state = state.lock();
    let Some(user) = state
        .users
        .get(&creds.username)
        .filter(|user| user.password == creds.password)
        .cloned()
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    // a revoked token is reissued on the next login
    let token = format!("token-{}", creds.username);
    state.tokens.insert(token.clone(), creds.username.clone());
    Json(json!({
        "username": creds.username,
        "role": user.role,
        "company_id": user.company_id,
        "token": token,
    }))
    .into_response()
}

async fn register(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Response {
    let mut state = state.lock();
    if state.users.contains_key(&body.req.username) {
        return error(StatusCode::BAD_REQUEST, "Username taken");
    }
    state.next_company_id = state.next_company_id.max(100) + 1;
    let company_id = state.next_company_id;
    debug!(company=%body.company_name, company_id, "mock register");
    state.users.insert(
        body.req.username.clone(),
        MockUser {
            password: body.req.password,
            role: body.req.role.unwrap_or_else(|| "user".into()),
            company_id,
        },
    );
    state
        .tokens
        .insert(format!("token-{}", body.req.username), body.req.username);
    Json(json!({ "message": "Created", "company_id": company_id })).into_response()
}

async fn reset_password(State(state): State<Shared>, Json(creds): Json<Credentials>) -> Response {
    let mut state = state.lock();
    match state.users.get_mut(&creds.username) {
        Some(user) => {
            user.password = creds.password;
            message("Password updated")
        }
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn delete_user(State(state): State<Shared>, Json(creds): Json<Credentials>) -> Response {
    let mut state = state.lock();
    let valid = state
        .users
        .get(&creds.username)
        .is_some_and(|user| user.password == creds.password);
    if !valid {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    state.users.remove(&creds.username);
    state.tokens.retain(|_, name| *name != creds.username);
    message("Deleted")
}

// ----------------------------------------------------------------------------
// records
// ----------------------------------------------------------------------------

async fn records(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let (delay, failure) = {
        let mut state = shared.lock();
        state.requests.push(RECORDS_PATH.to_string());
        (state.delays.pop_front(), state.failures.pop_front())
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(code) = failure {
        let code = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return error(code, "injected failure");
    }

    let state = shared.lock();
    let user = match state.authorize_company(&headers, param(&params, "company_id")) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let limit: usize = param(&params, "limit").unwrap_or(50);

    if params.contains_key("page") {
        // server-side: filter, sort and page here
        let rows = state.rows_for(user.company_id);
        let page = projector::project(&rows, &query_tuple(&params), limit);
        return Json(json!({ "rows": page.rows, "total": page.total })).into_response();
    }

    // client-side: newest first, raw shapes
    let mut records = state.records_for(user.company_id);
    records.sort_by(|a, b| BugRow::from_record(b).id.cmp(&BugRow::from_record(a).id));
    records.truncate(limit);
    Json(records).into_response()
}

async fn export(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = shared.lock();
    let user = match state.authorize_company(&headers, param(&params, "company_id")) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let rows = projector::filter_and_sort(&state.rows_for(user.company_id), &query_tuple(&params));
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"bug_report_export.csv\"",
            ),
        ],
        to_csv(&rows),
    )
        .into_response()
}

async fn overview(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = shared.lock();
    let user = match state.authorize_company(&headers, param(&params, "company_id")) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let rows = state.rows_for(user.company_id);
    let mut components: HashMap<&str, u64> = HashMap::new();
    for row in &rows {
        if !row.component.is_empty() {
            *components.entry(row.component.as_str()).or_default() += 1;
        }
    }
    let critical = rows.iter().filter(|r| urgency_of(&r.severity) == 0).count();
    let mut recent = state.records_for(user.company_id);
    recent.reverse();
    recent.truncate(5);
    Json(json!({
        "stats": {
            "total_db": rows.len(),
            "analyzed": rows.iter().filter(|r| !r.severity.is_empty()).count(),
            "critical": critical,
            "components": components.len(),
        },
        "charts": {
            "components": components
                .iter()
                .map(|(name, count)| json!({"name": name, "count": count}))
                .collect::<Vec<_>>(),
        },
        "recent": recent,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct CreateBugBody {
    bug: NewBug,
    company_id: i64,
}

async fn create_bug(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CreateBugBody>,
) -> Response {
    let mut state = shared.lock();
    if let Err(response) = state.authorize_company(&headers, Some(body.company_id)) {
        return response;
    }
    if body.bug.summary.trim().is_empty() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "summary is required");
    }
    state.next_bug_id += 1;
    let id = state.next_bug_id;
    let bug = body.bug;
    state.insert_record(
        body.company_id,
        json!({"bug_id": id, "summary": bug.summary, "component": bug.component,
            "severity": bug.severity, "status": bug.status, "data": {"platform": bug.platform}}),
    );
    message("Bug saved successfully!")
}

async fn delete_bug(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = shared.lock();
    let user = match state.authorize(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let id = RecordId::from(id);
    let before = state.bugs.len();
    state.bugs.retain(|(company, record)| {
        *company != user.company_id || BugRow::from_record(record).id != id
    });
    if state.bugs.len() == before {
        return error(StatusCode::NOT_FOUND, "Bug not found");
    }
    message("Deleted")
}

// ----------------------------------------------------------------------------
// analysis and feedback
// ----------------------------------------------------------------------------

const CRITICAL_WORDS: &[&str] = &[
    "crash", "exception", "500", "freeze", "hang", "security", "leak", "panic", "broken", "down",
];
const MAJOR_WORDS: &[&str] = &["slow", "latency", "timeout", "glitch", "wrong", "fail"];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

async fn analyze(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = shared.lock();
    let user = match state.authorize(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let text = params.get("bug_text").cloned().unwrap_or_default();
    let lower = text.to_lowercase();
    let (label, confidence, action) = if CRITICAL_WORDS.iter().any(|w| lower.contains(w)) {
        ("S1", 95, "Escalate to Senior Dev immediately")
    } else if MAJOR_WORDS.iter().any(|w| lower.contains(w)) {
        ("S2", 85, "Schedule for upcoming sprint")
    } else {
        ("S3", 60, "Investigate")
    };

    let query_words = words(&text);
    let mut similar: Vec<(u8, BugRow)> = state
        .rows_for(user.company_id)
        .into_iter()
        .filter_map(|row| {
            let shared_words = words(&row.summary)
                .iter()
                .filter(|w| query_words.contains(w))
                .count();
            if shared_words == 0 || query_words.is_empty() {
                return None;
            }
            let score = (shared_words * 100 / query_words.len()).min(100) as u8;
            Some((score, row))
        })
        .collect();
    similar.sort_by(|a, b| b.0.cmp(&a.0));
    similar.truncate(3);

    Json(json!({
        "severity": {"label": label, "confidence": confidence, "action": action},
        "similar_bugs": similar
            .into_iter()
            .map(|(score, row)| json!({
                "id": row.id.to_string(), "summary": row.summary, "status": row.status, "match": score
            }))
            .collect::<Vec<_>>(),
    }))
    .into_response()
}

async fn feedback(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Feedback>,
) -> Response {
    let mut state = shared.lock();
    if let Err(response) = state.authorize_company(&headers, Some(body.company_id)) {
        return response;
    }
    state.feedback.push(body);
    message("Feedback recorded")
}

// ----------------------------------------------------------------------------
// batches
// ----------------------------------------------------------------------------

async fn list_batches(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = shared.lock();
    let user = match state.authorize_company(&headers, param(&params, "company_id")) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let batches: Vec<&Batch> = state
        .batches
        .iter()
        .filter(|(company, _)| *company == user.company_id)
        .map(|(_, batch)| batch)
        .collect();
    Json(batches).into_response()
}

async fn undo_batch(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Path(batch_id): Path<i64>,
) -> Response {
    let mut state = shared.lock();
    let user = match state.authorize(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let before = state.batches.len();
    state
        .batches
        .retain(|(company, batch)| *company != user.company_id || batch.id != batch_id);
    if state.batches.len() == before {
        return error(StatusCode::NOT_FOUND, "Batch not found");
    }
    state.bugs.retain(|(company, record)| {
        *company != user.company_id || record.get("batch_id").and_then(Value::as_i64) != Some(batch_id)
    });
    message("Batch undone")
}
