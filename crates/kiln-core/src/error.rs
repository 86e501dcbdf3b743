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

//! Defines the error type surfaced to consumers of resources.
//!
//! Caller contract violations (illegal status transitions, unbalanced scene
//! references) are not represented here: they panic at the offending call.

use crate::resource::{ResourceHash, ResourceStatus};
use std::fmt;

/// An error observed when querying or reading a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// No resource is registered under this hash.
    NotFound(ResourceHash),
    /// The resource exists but is not resident on the device yet.
    NotUploaded {
        /// The hash of the resource.
        hash: ResourceHash,
        /// The status the resource is currently in.
        status: ResourceStatus,
    },
    /// The resource failed to upload or compile and will not be retried.
    Broken(ResourceHash),
    /// The stored payload bytes could not be decoded.
    Corrupted {
        /// The hash of the resource.
        hash: ResourceHash,
        /// What the decoder reported.
        reason: String,
    },
    /// An error originating from the device backend.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound(hash) => write!(f, "Resource {hash} is not registered"),
            ResourceError::NotUploaded { hash, status } => {
                write!(f, "Resource {hash} is not uploaded (status: {status})")
            }
            ResourceError::Broken(hash) => {
                write!(f, "Resource {hash} is broken and cannot be used")
            }
            ResourceError::Corrupted { hash, reason } => {
                write!(f, "Payload of resource {hash} is corrupted: {reason}")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}
