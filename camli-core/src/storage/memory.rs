//! In-memory blob store.
//!
//! Used as the reference storage collaborator and as the in-process fetcher
//! that serves the signing key. Blobs are never evicted.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    BlobReceiver, BlobStatter, BlobStorage, FetchedBlob, RequestContext, StreamingFetcher,
};
use crate::blobref::{BlobRef, SizedBlob};
use crate::error::StorageError;

#[derive(Default)]
pub struct MemoryStore {
    blobs: DashMap<BlobRef, Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` under its default-algorithm ref and return the ref.
    pub fn add_blob(&self, data: impl AsRef<[u8]>) -> BlobRef {
        let data = data.as_ref();
        let blob_ref = BlobRef::for_content(data);
        self.blobs
            .entry(blob_ref.clone())
            .or_insert_with(|| Arc::from(data));
        blob_ref
    }

    pub fn get(&self, blob_ref: &BlobRef) -> Option<Arc<[u8]>> {
        self.blobs.get(blob_ref).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, blob_ref: &BlobRef) -> bool {
        self.blobs.contains_key(blob_ref)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// All stored refs, sorted.
    pub fn refs(&self) -> Vec<BlobRef> {
        let mut refs: Vec<_> = self.blobs.iter().map(|e| e.key().clone()).collect();
        refs.sort();
        refs
    }
}

#[async_trait]
impl BlobReceiver for MemoryStore {
    async fn receive_blob(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
        data: &[u8],
    ) -> Result<SizedBlob, StorageError> {
        let computed = BlobRef::from_bytes(blob_ref.algorithm(), data);
        if computed != *blob_ref {
            return Err(StorageError::DigestMismatch {
                declared: blob_ref.clone(),
                computed,
            });
        }
        self.blobs
            .entry(blob_ref.clone())
            .or_insert_with(|| Arc::from(data));
        tracing::trace!(request_id = %ctx.request_id, blob_ref = %blob_ref, size = data.len(), "memory store received blob");
        Ok(SizedBlob::new(blob_ref.clone(), data.len() as u64))
    }
}

#[async_trait]
impl BlobStatter for MemoryStore {
    async fn stat_blob(
        &self,
        _ctx: &RequestContext,
        blob_ref: &BlobRef,
    ) -> Result<Option<SizedBlob>, StorageError> {
        Ok(self
            .blobs
            .get(blob_ref)
            .map(|entry| SizedBlob::new(blob_ref.clone(), entry.value().len() as u64)))
    }
}

#[async_trait]
impl StreamingFetcher for MemoryStore {
    async fn fetch_streaming(
        &self,
        _ctx: &RequestContext,
        blob_ref: &BlobRef,
    ) -> Result<FetchedBlob, StorageError> {
        let data = self
            .get(blob_ref)
            .ok_or_else(|| StorageError::NotFound(blob_ref.clone()))?;
        let size = data.len() as u64;
        Ok(FetchedBlob {
            reader: Box::new(Cursor::new(data)),
            size,
        })
    }
}

impl BlobStorage for MemoryStore {
    fn streaming_fetcher(&self) -> Option<&dyn StreamingFetcher> {
        Some(self)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("blobs", &self.blobs.len())
            .finish()
    }
}
