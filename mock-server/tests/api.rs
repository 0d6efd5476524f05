use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_state, MockState, Todo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

fn todo(id: i64, title: &str) -> Todo {
    Todo {
        id,
        owner_id: 1,
        title: title.to_string(),
        completed: false,
    }
}

// --- list ---

#[tokio::test]
async fn list_todos_empty() {
    let resp = app().oneshot(empty_request("GET", "/todos")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let todos: Vec<Todo> = body_json(resp).await;
    assert!(todos.is_empty());
}

#[tokio::test]
async fn list_todos_returns_seeded_records_by_id() {
    let state = MockState::with_todos([todo(2, "b"), todo(1, "a")]);
    let resp = app_with_state(state)
        .oneshot(empty_request("GET", "/todos"))
        .await
        .unwrap();

    let todos: Vec<Todo> = body_json(resp).await;
    let ids: Vec<i64> = todos.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

// --- push ---

#[tokio::test]
async fn push_returns_canonical_batch() {
    let state = MockState::new();
    let resp = app_with_state(state.clone())
        .oneshot(json_request(
            "POST",
            "/todos",
            r#"[{"id":1,"ownerId":3,"title":"  Buy milk  ","completed":false},
                {"id":2,"ownerId":3,"title":"Walk dog","completed":true}]"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let canonical: Vec<Todo> = body_json(resp).await;
    assert_eq!(canonical.len(), 2);
    assert_eq!(canonical[0].title, "Buy milk");
    assert!(canonical[1].completed);
    assert_eq!(state.todos().await, canonical);
}

#[tokio::test]
async fn push_overwrites_existing_ids() {
    let state = MockState::with_todos([todo(1, "old")]);
    app_with_state(state.clone())
        .oneshot(json_request(
            "POST",
            "/todos",
            r#"[{"id":1,"ownerId":1,"title":"new","completed":true}]"#,
        ))
        .await
        .unwrap();

    let stored = state.todos().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "new");
}

#[tokio::test]
async fn push_single_object_returns_422() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/todos",
            r#"{"id":1,"ownerId":1,"title":"not a batch"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_todo_not_found() {
    let resp = app().oneshot(empty_request("GET", "/todos/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_todo_bad_id_returns_400() {
    let resp = app()
        .oneshot(empty_request("GET", "/todos/not-a-number"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delete ---

#[tokio::test]
async fn delete_todo_not_found() {
    let resp = app().oneshot(empty_request("DELETE", "/todos/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- outage ---

#[tokio::test]
async fn outage_answers_503_on_every_todo_route() {
    let state = MockState::with_todos([todo(1, "a")]);
    state.set_outage(true);

    for request in [
        empty_request("GET", "/todos"),
        empty_request("GET", "/todos/1"),
        empty_request("DELETE", "/todos/1"),
        json_request("POST", "/todos", "[]"),
    ] {
        let resp = app_with_state(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(state.todos().await.len(), 1);
}

#[tokio::test]
async fn outage_is_switched_over_http() {
    let state = MockState::new();
    let resp = app_with_state(state.clone())
        .oneshot(json_request("PUT", "/admin/outage", r#"{"enabled":true}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(state.is_down());

    app_with_state(state.clone())
        .oneshot(json_request("PUT", "/admin/outage", r#"{"enabled":false}"#))
        .await
        .unwrap();
    assert!(!state.is_down());
}

// --- full lifecycle ---

#[tokio::test]
async fn push_get_delete_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // push
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/todos",
            r#"[{"id":1234567890,"ownerId":1,"title":"Walk dog"}]"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let pushed: Vec<Todo> = body_json(resp).await;
    let id = pushed[0].id;
    assert!(!pushed[0].completed);

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/todos/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Todo = body_json(resp).await;
    assert_eq!(fetched.title, "Walk dog");

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/todos/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // delete again: already gone
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/todos/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // list after delete: empty
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/todos"))
        .await
        .unwrap();
    let todos: Vec<Todo> = body_json(resp).await;
    assert!(todos.is_empty());
}
