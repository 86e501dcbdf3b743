// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{ResourceHash, ResourceType};
use crate::error::ResourceError;
use std::fmt;
use std::sync::OnceLock;

/// The system-memory payload of a resource.
///
/// Payloads are shared as `Arc<dyn Resource>`: the registry holds the owning
/// reference while the resource waits for upload, and the asynchronous compiler
/// borrows a clone only until the next synchronization point.
pub trait Resource: Send + Sync + fmt::Debug {
    /// The content hash of this payload.
    fn hash(&self) -> ResourceHash;

    /// The category of this payload.
    fn resource_type(&self) -> ResourceType;

    /// Size of the stored bytes, in bytes.
    fn compressed_size(&self) -> u64;

    /// Size of the bytes handed to the device, in bytes.
    fn decompressed_size(&self) -> u64;

    /// Prepares the decompressed bytes ahead of the upload.
    ///
    /// Payloads that are stored uncompressed have nothing to do.
    fn decompress(&self) {}

    /// Returns the decompressed bytes, decompressing on first access if needed.
    ///
    /// ## Returns
    ///
    /// The bytes to upload, or [`ResourceError::Corrupted`] if the stored data
    /// cannot be decoded.
    fn data(&self) -> Result<&[u8], ResourceError>;
}

enum BlobStorage {
    Raw(Vec<u8>),
    Lz4 {
        compressed: Vec<u8>,
        decompressed: OnceLock<Result<Vec<u8>, String>>,
    },
}

/// A [`Resource`] backed by an in-memory byte buffer, optionally LZ4-compressed.
///
/// Compressed blobs decode lazily, the first time [`Resource::decompress`] or
/// [`Resource::data`] is called, and keep the decoded bytes afterwards.
pub struct BlobResource {
    hash: ResourceHash,
    resource_type: ResourceType,
    decompressed_size: u64,
    storage: BlobStorage,
}

impl BlobResource {
    /// Creates an uncompressed blob, hashed from its content.
    pub fn new(resource_type: ResourceType, bytes: Vec<u8>) -> Self {
        Self {
            hash: ResourceHash::from_content(&bytes),
            resource_type,
            decompressed_size: bytes.len() as u64,
            storage: BlobStorage::Raw(bytes),
        }
    }

    /// Creates a blob that stores `bytes` LZ4-compressed, hashed from the raw content.
    pub fn compressed(resource_type: ResourceType, bytes: &[u8]) -> Self {
        Self {
            hash: ResourceHash::from_content(bytes),
            resource_type,
            decompressed_size: bytes.len() as u64,
            storage: BlobStorage::Lz4 {
                compressed: lz4_flex::compress_prepend_size(bytes),
                decompressed: OnceLock::new(),
            },
        }
    }

    /// Overrides the content hash.
    ///
    /// Useful when the caller already knows the hash under which the resource was
    /// registered, for instance when it was computed by an offline pipeline.
    pub fn with_hash(mut self, hash: ResourceHash) -> Self {
        self.hash = hash;
        self
    }

    /// Whether the decompressed bytes are available without further work.
    pub fn is_decompressed(&self) -> bool {
        match &self.storage {
            BlobStorage::Raw(_) => true,
            BlobStorage::Lz4 { decompressed, .. } => decompressed.get().is_some(),
        }
    }
}

impl Resource for BlobResource {
    fn hash(&self) -> ResourceHash {
        self.hash
    }

    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn compressed_size(&self) -> u64 {
        match &self.storage {
            BlobStorage::Raw(bytes) => bytes.len() as u64,
            BlobStorage::Lz4 { compressed, .. } => compressed.len() as u64,
        }
    }

    fn decompressed_size(&self) -> u64 {
        self.decompressed_size
    }

    fn decompress(&self) {
        if let Err(e) = self.data() {
            log::warn!("BlobResource: {e}");
        }
    }

    fn data(&self) -> Result<&[u8], ResourceError> {
        match &self.storage {
            BlobStorage::Raw(bytes) => Ok(bytes),
            BlobStorage::Lz4 {
                compressed,
                decompressed,
            } => decompressed
                .get_or_init(|| {
                    lz4_flex::decompress_size_prepended(compressed).map_err(|e| e.to_string())
                })
                .as_deref()
                .map_err(|reason| ResourceError::Corrupted {
                    hash: self.hash,
                    reason: reason.to_string(),
                }),
        }
    }
}

impl fmt::Debug for BlobResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobResource")
            .field("hash", &self.hash)
            .field("resource_type", &self.resource_type)
            .field("compressed_size", &self.compressed_size())
            .field("decompressed_size", &self.decompressed_size)
            .finish()
    }
}
