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

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    /// Per-vertex attribute data.
    VertexBuffer,
    /// Index data for indexed draws.
    IndexBuffer,
    /// Image data sampled by shaders.
    Texture,
    /// A shader program that must be compiled by the device before use.
    ShaderProgram,
}

impl ResourceType {
    /// Whether the device may defer this type to the asynchronous compile path.
    ///
    /// Only resources of such a type can answer an upload with
    /// [`UploadOutcome::NotReady`](crate::device::UploadOutcome::NotReady).
    pub fn requires_async_compile(&self) -> bool {
        matches!(self, ResourceType::ShaderProgram)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::VertexBuffer => "VertexBuffer",
            ResourceType::IndexBuffer => "IndexBuffer",
            ResourceType::Texture => "Texture",
            ResourceType::ShaderProgram => "ShaderProgram",
        };
        f.write_str(name)
    }
}

/// The lifecycle status of a registered resource.
///
/// ```text
/// Registered -> Provided -> ScheduledForUpload -> Uploaded | Broken
///                        -> Uploaded | Broken
/// ```
///
/// A resource that is not registered has no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Known by hash, no payload yet.
    Registered,
    /// Payload attached, waiting for upload.
    Provided,
    /// Handed to the asynchronous compiler, result pending.
    ScheduledForUpload,
    /// Resident on the device.
    Uploaded,
    /// Upload or compilation failed. Terminal.
    Broken,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceStatus::Registered => "Registered",
            ResourceStatus::Provided => "Provided",
            ResourceStatus::ScheduledForUpload => "ScheduledForUpload",
            ResourceStatus::Uploaded => "Uploaded",
            ResourceStatus::Broken => "Broken",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_shader_programs_compile_asynchronously() {
        assert!(ResourceType::ShaderProgram.requires_async_compile());
        assert!(!ResourceType::VertexBuffer.requires_async_compile());
        assert!(!ResourceType::IndexBuffer.requires_async_compile());
        assert!(!ResourceType::Texture.requires_async_compile());
    }
}
