//! Kubernetes API client handles and the round-robin pool they live in.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Response};
use stress_common::{
    BoxedBody, ClientHandle, ListParams, RequestError, ResponseBody, StressError, StressResult,
};
use tracing::debug;

use crate::kubeconfig::Kubeconfig;

/// Longest error body kept in a [`RequestError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// One connection pool to the API server.
///
/// Every handle owns its own `reqwest::Client`, so N handles behave like N
/// independent clients rather than N views of one shared pool.
#[derive(Debug, Clone)]
pub struct KubeClient {
    http: Client,
    server: String,
    token: Option<String>,
}

impl KubeClient {
    pub fn new(config: &Kubeconfig) -> StressResult<Self> {
        let mut builder = Client::builder()
            .tcp_nodelay(true)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);

        if let Some(pem) = &config.ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| StressError::ClientBuild(format!("invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| StressError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            server: config.server.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// URL of a list call. The `limit` query parameter is added separately.
    pub fn list_url(&self, params: &ListParams) -> String {
        if params.namespace.is_empty() {
            format!("{}/api/v1/{}", self.server, params.object_type)
        } else {
            format!(
                "{}/api/v1/namespaces/{}/{}",
                self.server, params.namespace, params.object_type
            )
        }
    }
}

#[async_trait]
impl ClientHandle for KubeClient {
    async fn issue_list_request(&self, params: &ListParams) -> Result<BoxedBody, RequestError> {
        let mut request = self
            .http
            .get(self.list_url(params))
            .header(header::ACCEPT, "application/json");
        if params.page_size > 0 {
            request = request.query(&[("limit", params.page_size)]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Read the body anyway so the connection goes back to the pool.
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "List call rejected by server");
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        Ok(Box::new(HttpBody(response)))
    }
}

struct HttpBody(Response);

#[async_trait]
impl ResponseBody for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RequestError> {
        self.0
            .chunk()
            .await
            .map_err(|e| RequestError::Body(e.to_string()))
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

/// Fixed, non-empty set of client handles, picked round-robin.
///
/// The pool only hands out shared references; handles are never mutated or
/// closed through it.
///
/// `C` may be a trait object, so one pool can mix different kinds of handle.
#[derive(Debug)]
pub struct ClientPool<C: ?Sized> {
    clients: Vec<Arc<C>>,
}

impl<C: ClientHandle> ClientPool<C> {
    pub fn new(clients: Vec<C>) -> StressResult<Self> {
        Self::from_shared(clients.into_iter().map(Arc::new).collect())
    }
}

impl<C: ClientHandle + ?Sized> ClientPool<C> {
    /// Build a pool from handles the caller keeps references to.
    pub fn from_shared(clients: Vec<Arc<C>>) -> StressResult<Self> {
        if clients.is_empty() {
            return Err(StressError::EmptyClientPool);
        }
        Ok(Self { clients })
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Handle for tick `i`, wrapping around the pool.
    pub fn get(&self, i: usize) -> Arc<C> {
        Arc::clone(&self.clients[i % self.clients.len()])
    }
}

impl ClientPool<KubeClient> {
    /// `count` independent clients for the same API server.
    pub fn from_kubeconfig(config: &Kubeconfig, count: usize) -> StressResult<Self> {
        let clients = (0..count)
            .map(|_| KubeClient::new(config))
            .collect::<StressResult<Vec<_>>>()?;
        Self::new(clients)
    }
}
