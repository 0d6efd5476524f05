//! In-memory service of record for the todo synchronization engine.
//!
//! `POST /todos` takes a batch and answers with the canonical version of
//! every record, with titles trimmed to simulate a server-side merge.
//! `PUT /admin/outage` makes every `/todos` route answer 503 until it is
//! switched off again.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    #[serde(alias = "userId")]
    pub owner_id: i64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl Todo {
    /// The form the server stores and returns.
    fn canonical(mut self) -> Self {
        let trimmed = self.title.trim();
        if trimmed.len() != self.title.len() {
            self.title = trimmed.to_string();
        }
        self
    }
}

#[derive(Deserialize)]
pub struct Outage {
    pub enabled: bool,
}

/// Shared server state. Cloning yields another handle to the same data, so
/// tests can inspect and steer a server they started.
#[derive(Clone, Default)]
pub struct MockState {
    todos: Arc<RwLock<BTreeMap<i64, Todo>>>,
    down: Arc<AtomicBool>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_todos(todos: impl IntoIterator<Item = Todo>) -> Self {
        let todos = todos.into_iter().map(|todo| (todo.id, todo)).collect();
        Self {
            todos: Arc::new(RwLock::new(todos)),
            down: Arc::default(),
        }
    }

    pub fn set_outage(&self, enabled: bool) {
        self.down.store(enabled, Ordering::SeqCst);
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    /// Every stored todo, by id.
    pub async fn todos(&self) -> Vec<Todo> {
        self.todos.read().await.values().cloned().collect()
    }

    pub async fn insert(&self, todo: Todo) {
        self.todos.write().await.insert(todo.id, todo);
    }

    pub async fn remove(&self, id: i64) -> Option<Todo> {
        self.todos.write().await.remove(&id)
    }
}

pub fn app() -> Router {
    app_with_state(MockState::new())
}

pub fn app_with_state(state: MockState) -> Router {
    let todos = Router::new()
        .route("/todos", get(list_todos).post(push_todos))
        .route("/todos/{id}", get(get_todo).delete(delete_todo))
        .route_layer(middleware::from_fn_with_state(state.clone(), outage_guard));
    Router::new()
        .merge(todos)
        .route("/admin/outage", put(set_outage))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::new()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn outage_guard(State(state): State<MockState>, request: Request, next: Next) -> Response {
    if state.is_down() {
        debug!(uri = %request.uri(), "rejected during outage");
        return (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response();
    }
    next.run(request).await
}

async fn list_todos(State(state): State<MockState>) -> Json<Vec<Todo>> {
    Json(state.todos().await)
}

async fn push_todos(State(state): State<MockState>, Json(batch): Json<Vec<Todo>>) -> Json<Vec<Todo>> {
    let mut todos = state.todos.write().await;
    let canonical: Vec<Todo> = batch
        .into_iter()
        .map(|todo| {
            let todo = todo.canonical();
            todos.insert(todo.id, todo.clone());
            todo
        })
        .collect();
    info!(records = canonical.len(), "batch stored");
    Json(canonical)
}

async fn get_todo(State(state): State<MockState>, Path(id): Path<i64>) -> Result<Json<Todo>, StatusCode> {
    let todos = state.todos.read().await;
    todos.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_todo(State(state): State<MockState>, Path(id): Path<i64>) -> Result<StatusCode, StatusCode> {
    let removed = state.remove(id).await;
    debug!(id, found = removed.is_some(), "delete");
    removed.map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

async fn set_outage(State(state): State<MockState>, Json(outage): Json<Outage>) -> StatusCode {
    state.set_outage(outage.enabled);
    info!(enabled = outage.enabled, "outage switched");
    StatusCode::NO_CONTENT
}
