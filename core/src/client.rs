//! Stateless request builder and response parser for the todo service.
//!
//! # Design
//! `TodoClient` holds only a `base_url`. Each remote operation is split into
//! a `build_*` method producing an `HttpRequest` and a `parse_*` method
//! consuming an `HttpResponse`; a `Transport` performs the round-trip.
//!
//! The push endpoint answers with the canonical records either as a JSON
//! array or as an object keyed by position (`{"0": {..}, "1": {..}, "id":
//! 201}`, as placeholder APIs do). Both shapes are accepted. In a keyed
//! object only the numeric keys hold records, and each of those must decode.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{RemoteTodo, TodoId};

#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_list_todos(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/todos", self.base_url),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    /// Create-or-update a batch of todos in one request.
    pub fn build_push_batch(&self, todos: &[RemoteTodo]) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(todos).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/todos", self.base_url),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
        })
    }

    pub fn build_delete_todo(&self, id: TodoId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}/todos/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<RemoteTodo>, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    pub fn parse_push_batch(&self, response: HttpResponse) -> Result<Vec<RemoteTodo>, ApiError> {
        check_status(&response)?;
        let value: Value =
            serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        match value {
            Value::Array(_) => {
                serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
            }
            Value::Object(map) => {
                let mut entries: Vec<(u64, Value)> = map
                    .into_iter()
                    .filter_map(|(key, value)| Some((key.parse::<u64>().ok()?, value)))
                    .collect();
                entries.sort_by_key(|(position, _)| *position);
                entries
                    .into_iter()
                    .map(|(position, value)| {
                        serde_json::from_value::<RemoteTodo>(value)
                            .map_err(|e| ApiError::Deserialization(format!("entry {position}: {e}")))
                    })
                    .collect()
            }
            other => Err(ApiError::Deserialization(format!(
                "expected an array or object of todos, got {other}"
            ))),
        }
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

/// Map non-success status codes to the matching `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::from_status(response.status, response.body.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:3000")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn todo(id: i64, title: &str) -> RemoteTodo {
        RemoteTodo {
            id: TodoId::new(id),
            owner_id: 1,
            title: title.to_string(),
            completed: false,
        }
    }

    #[test]
    fn build_list_todos_produces_correct_request() {
        let req = client().build_list_todos();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/todos");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_push_batch_serializes_an_array() {
        let req = client()
            .build_push_batch(&[todo(1, "Buy milk"), todo(2, "Walk dog")])
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/todos");
        assert!(req
            .headers
            .contains(&("content-type".to_string(), "application/json".to_string())));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["title"], "Buy milk");
        assert_eq!(body[0]["ownerId"], 1);
        assert_eq!(body[1]["id"], 2);
    }

    #[test]
    fn build_delete_todo_targets_the_id() {
        let req = client().build_delete_todo(TodoId::new(1234567890));
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:3000/todos/1234567890");
        assert!(req.body.is_none());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TodoClient::new("http://localhost:3000/");
        assert_eq!(client.build_list_todos().path, "http://localhost:3000/todos");
    }

    #[test]
    fn parse_list_todos_success() {
        let todos = client()
            .parse_list_todos(response(200, r#"[{"id":1,"ownerId":2,"title":"Test","completed":false}]"#))
            .unwrap();
        assert_eq!(todos, vec![RemoteTodo {
            id: TodoId::new(1),
            owner_id: 2,
            title: "Test".into(),
            completed: false
        }]);
    }

    #[test]
    fn parse_list_todos_bad_json() {
        let err = client().parse_list_todos(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_push_batch_accepts_array() {
        let todos = client()
            .parse_push_batch(response(201, r#"[{"id":1,"ownerId":1,"title":"a","completed":true}]"#))
            .unwrap();
        assert_eq!(todos.len(), 1);
        assert!(todos[0].completed);
    }

    #[test]
    fn parse_push_batch_accepts_keyed_object_and_ignores_named_keys() {
        let body = r#"{
            "10": {"id":3,"ownerId":1,"title":"third","completed":false},
            "2": {"id":2,"ownerId":1,"title":"second","completed":false},
            "0": {"id":1,"userId":1,"title":"first","completed":false},
            "id": 201
        }"#;
        let todos = client().parse_push_batch(response(201, body)).unwrap();
        let titles: Vec<&str> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn parse_push_batch_rejects_keyed_entry_that_is_not_a_record() {
        let err = client()
            .parse_push_batch(response(201, r#"{"0":{"id":1,"title":"no owner"}}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(msg) if msg.starts_with("entry 0")));
    }

    #[test]
    fn parse_push_batch_error_object_has_no_records() {
        let todos = client()
            .parse_push_batch(response(200, r#"{"error":"quota exceeded"}"#))
            .unwrap();
        assert!(todos.is_empty());
    }

    #[test]
    fn parse_push_batch_rejects_scalars() {
        let err = client().parse_push_batch(response(200, "42")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_push_batch_server_error() {
        let err = client().parse_push_batch(response(500, "internal error")).unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 500, .. }));
    }

    #[test]
    fn parse_delete_todo_success() {
        assert!(client().parse_delete_todo(response(204, "")).is_ok());
        assert!(client().parse_delete_todo(response(200, "{}")).is_ok());
    }

    #[test]
    fn parse_delete_todo_not_found() {
        let err = client().parse_delete_todo(response(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_delete_todo_client_error() {
        let err = client().parse_delete_todo(response(409, "conflict")).unwrap_err();
        assert!(matches!(err, ApiError::Client { status: 409, .. }));
    }
}
