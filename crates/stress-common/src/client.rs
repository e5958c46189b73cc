//! The API client seam.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// Parameters of a list call, passed through the dispatcher untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Namespace to list from. Empty means all namespaces.
    pub namespace: String,
    /// Resource kind, e.g. `configmaps` or `pods`.
    pub object_type: String,
    /// Page size sent as the `limit` parameter. 0 disables pagination.
    pub page_size: u32,
}

/// A streamed response payload.
///
/// Dropping the body releases the underlying connection, so a body is released
/// on every exit path of its owner.
#[async_trait]
pub trait ResponseBody: Send {
    /// Next chunk of the payload, or `None` once it is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RequestError>;
}

pub type BoxedBody = Box<dyn ResponseBody>;

/// A reusable connection to the target API.
///
/// Handles are shared between every in-flight request launched on them and
/// must tolerate concurrent use. Cancellation is by dropping the returned
/// future.
#[async_trait]
pub trait ClientHandle: Send + Sync + 'static {
    async fn issue_list_request(&self, params: &ListParams) -> Result<BoxedBody, RequestError>;
}

/// Read a body to the end, returning the number of bytes consumed.
pub async fn drain(body: &mut dyn ResponseBody) -> Result<u64, RequestError> {
    let mut read = 0u64;
    while let Some(chunk) = body.next_chunk().await? {
        read += chunk.len() as u64;
    }
    Ok(read)
}
