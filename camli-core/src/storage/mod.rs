//! Storage collaborator interfaces.
//!
//! The blob server core never owns durable storage. It talks to a
//! [`BlobStorage`] handle that must accept and stat blobs, and that may
//! additionally expose a [`StreamingFetcher`]. Optional capabilities are
//! discovered through explicit query methods instead of downcasts.
//!
//! Every call takes a [`RequestContext`] so request-scoped identity travels
//! with the call rather than being baked into the handle.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

use crate::blobref::{BlobRef, SizedBlob};
use crate::error::StorageError;

/// Per-request context threaded through every storage call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }

    /// Context for work that is not tied to an inbound request (startup).
    pub fn background() -> Self {
        Self {
            request_id: Uuid::nil(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts blobs addressed by their content digest.
#[async_trait]
pub trait BlobReceiver: Send + Sync {
    /// Store `data` under `blob_ref`.
    ///
    /// Implementations must reject bytes whose digest does not match
    /// `blob_ref`. Receiving a blob that is already present is a successful
    /// no-op.
    async fn receive_blob(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
        data: &[u8],
    ) -> Result<SizedBlob, StorageError>;
}

/// Answers existence queries.
#[async_trait]
pub trait BlobStatter: Send + Sync {
    async fn stat_blob(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
    ) -> Result<Option<SizedBlob>, StorageError>;
}

/// A fetched blob: a reader over its bytes and the size the store reports.
pub struct FetchedBlob {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub size: u64,
}

/// Optional capability: stream a blob's bytes back out.
#[async_trait]
pub trait StreamingFetcher: Send + Sync {
    async fn fetch_streaming(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
    ) -> Result<FetchedBlob, StorageError>;
}

/// The storage handle the HTTP handlers are composed with.
pub trait BlobStorage: BlobReceiver + BlobStatter {
    /// Returns the streaming-fetch view of this storage if it supports one.
    fn streaming_fetcher(&self) -> Option<&dyn StreamingFetcher> {
        None
    }
}

/// Random access over blobs of a [`StreamingFetcher`].
///
/// Each blob is read fully into memory and then sliced, so seeking is only
/// as cheap as the blobs are small.
pub struct BlobSeeker<'a> {
    fetcher: &'a dyn StreamingFetcher,
}

impl<'a> BlobSeeker<'a> {
    pub fn new(fetcher: &'a dyn StreamingFetcher) -> Self {
        Self { fetcher }
    }

    /// Read the whole blob.
    pub async fn fetch_all(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
    ) -> Result<Vec<u8>, StorageError> {
        let mut fetched = self.fetcher.fetch_streaming(ctx, blob_ref).await?;
        let mut buf = Vec::with_capacity(fetched.size as usize);
        fetched.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Read up to `len` bytes starting at `offset`. Fewer bytes are returned
    /// when the blob is shorter than requested.
    pub async fn fetch_range(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let all = self.fetch_all(ctx, blob_ref).await?;
        let start = (offset as usize).min(all.len());
        let end = start.saturating_add(len as usize).min(all.len());
        Ok(all[start..end].to_vec())
    }
}
