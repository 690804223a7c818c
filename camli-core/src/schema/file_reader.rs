//! Reassembly of a file's bytes from its schema blob and chunk graph.

use crate::blobref::BlobRef;
use crate::error::{CamliError, Result};
use crate::storage::{BlobSeeker, RequestContext, StreamingFetcher};

use super::{BytesPart, FileSchema};

/// Nesting limit for `bytesRef` parts. Guards against reference cycles.
const MAX_BYTES_DEPTH: usize = 32;

const ZERO_CHUNK: usize = 64 * 1024;

pub struct FileReader<'a> {
    seeker: BlobSeeker<'a>,
    file_ref: BlobRef,
    schema: FileSchema,
}

impl<'a> FileReader<'a> {
    /// Fetch and parse the schema blob `file_ref`.
    pub async fn new(
        ctx: &RequestContext,
        fetcher: &'a dyn StreamingFetcher,
        file_ref: &BlobRef,
    ) -> Result<Self> {
        let seeker = BlobSeeker::new(fetcher);
        let schema = load_schema(ctx, &seeker, file_ref, &["file", "bytes"]).await?;
        Ok(Self {
            seeker,
            file_ref: file_ref.clone(),
            schema,
        })
    }

    pub fn file_ref(&self) -> &BlobRef {
        &self.file_ref
    }

    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    /// Size declared by the file's own description.
    pub fn size(&self) -> Result<u64> {
        self.schema.size()
    }

    /// Feed the reconstructed bytes to `sink` in order and return how many
    /// bytes were produced. A chunk shorter than its declared part size
    /// yields fewer bytes rather than an error; callers compare the count
    /// against [`FileReader::size`].
    ///
    /// Parts, including those of nested `bytes` blobs, may never produce
    /// more than the declared size.
    pub async fn copy_to<F>(&self, ctx: &RequestContext, mut sink: F) -> Result<u64>
    where
        F: FnMut(&[u8]) + Send,
    {
        let declared = self.size()?;
        let mut written = 0u64;
        let mut stack: Vec<std::vec::IntoIter<BytesPart>> =
            vec![self.schema.parts.clone().into_iter()];

        loop {
            let next = match stack.last_mut() {
                None => break,
                Some(frame) => frame.next(),
            };
            let Some(part) = next else {
                stack.pop();
                continue;
            };

            match (&part.blob_ref, &part.bytes_ref) {
                (Some(chunk), None) => {
                    check_within(&self.file_ref, written, part.size, declared)?;
                    let data = self
                        .seeker
                        .fetch_range(ctx, chunk, part.offset, part.size)
                        .await?;
                    sink(&data);
                    written += data.len() as u64;
                }
                (None, Some(nested)) => {
                    if part.offset != 0 {
                        return Err(CamliError::Schema(format!(
                            "offset on bytesRef part {nested} is not supported"
                        )));
                    }
                    if stack.len() >= MAX_BYTES_DEPTH {
                        return Err(CamliError::Schema(format!(
                            "bytesRef nesting deeper than {MAX_BYTES_DEPTH} at {nested}"
                        )));
                    }
                    let bytes = load_schema(ctx, &self.seeker, nested, &["bytes"]).await?;
                    stack.push(bytes.parts.into_iter());
                }
                (None, None) => {
                    check_within(&self.file_ref, written, part.size, declared)?;
                    let zeros = vec![0u8; ZERO_CHUNK];
                    let mut remaining = part.size;
                    while remaining > 0 {
                        let n = remaining.min(ZERO_CHUNK as u64) as usize;
                        sink(&zeros[..n]);
                        remaining -= n as u64;
                        tokio::task::yield_now().await;
                    }
                    written += part.size;
                }
                (Some(_), Some(_)) => {
                    return Err(CamliError::Schema(
                        "part has both blobRef and bytesRef".into(),
                    ));
                }
            }
        }

        Ok(written)
    }
}

/// Fails when `len` more bytes after `written` would pass `declared`.
fn check_within(file_ref: &BlobRef, written: u64, len: u64, declared: u64) -> Result<()> {
    match written.checked_add(len) {
        Some(end) if end <= declared => Ok(()),
        _ => Err(CamliError::Schema(format!(
            "parts of {file_ref} exceed its declared size of {declared} bytes"
        ))),
    }
}

async fn load_schema(
    ctx: &RequestContext,
    seeker: &BlobSeeker<'_>,
    blob_ref: &BlobRef,
    allowed_types: &[&str],
) -> Result<FileSchema> {
    let data = seeker.fetch_all(ctx, blob_ref).await?;
    let schema = FileSchema::from_json(&data)?;
    if !allowed_types.contains(&schema.camli_type.as_str()) {
        return Err(CamliError::Schema(format!(
            "blob {blob_ref} has camliType {:?}, expected one of {allowed_types:?}",
            schema.camli_type
        )));
    }
    Ok(schema)
}
