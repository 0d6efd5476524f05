//! The remote service of record, as seen by the engine.

use std::future::Future;

use crate::client::TodoClient;
use crate::config::RemoteConfig;
use crate::error::ApiError;
use crate::transport::{Transport, UreqTransport};
use crate::types::{RemoteTodo, TodoId};

/// Push, delete, and fetch against the service of record.
///
/// Every method surfaces the failure kinds of `ApiError` unchanged; deciding
/// what a failure means (rollback, retry, "already gone") is the engine's job.
pub trait RemoteClient: Send + Sync + 'static {
    /// Create-or-update a batch. Returns the server's canonical version of
    /// each accepted record, which may differ from what was sent.
    fn push_batch(
        &self,
        todos: Vec<RemoteTodo>,
    ) -> impl Future<Output = Result<Vec<RemoteTodo>, ApiError>> + Send;

    fn delete_remote(&self, id: TodoId) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn fetch_all(&self) -> impl Future<Output = Result<Vec<RemoteTodo>, ApiError>> + Send;
}

/// `RemoteClient` over HTTP: `TodoClient` codec plus a `Transport`.
#[derive(Debug, Clone)]
pub struct HttpRemote<T = UreqTransport> {
    client: TodoClient,
    transport: T,
}

impl HttpRemote<UreqTransport> {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(TodoClient::new(&config.base_url), UreqTransport::new(config.timeout))
    }
}

impl<T: Transport> HttpRemote<T> {
    pub fn new(client: TodoClient, transport: T) -> Self {
        Self { client, transport }
    }
}

impl<T: Transport> RemoteClient for HttpRemote<T> {
    async fn push_batch(&self, todos: Vec<RemoteTodo>) -> Result<Vec<RemoteTodo>, ApiError> {
        let request = self.client.build_push_batch(&todos)?;
        let response = self.transport.send(request).await?;
        self.client.parse_push_batch(response)
    }

    async fn delete_remote(&self, id: TodoId) -> Result<(), ApiError> {
        let request = self.client.build_delete_todo(id);
        let response = self.transport.send(request).await?;
        self.client.parse_delete_todo(response)
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteTodo>, ApiError> {
        let request = self.client.build_list_todos();
        let response = self.transport.send(request).await?;
        self.client.parse_list_todos(response)
    }
}
