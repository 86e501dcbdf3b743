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

use kiln_core::{DeviceHandle, Resource, ResourceHash, ResourceStatus, ResourceType, SceneId};
use std::sync::Arc;

/// The scenes currently referencing a resource, with a count per scene.
///
/// A scene may reference the same resource several times; each reference must be
/// released separately. Scenes are listed in the order they first referenced the
/// resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneUsage {
    entries: Vec<(SceneId, u32)>,
}

impl SceneUsage {
    /// Records one more reference from `scene`. Returns `true` if it is the
    /// scene's first reference.
    pub(crate) fn add(&mut self, scene: SceneId) -> bool {
        match self.entries.iter_mut().find(|(s, _)| *s == scene) {
            Some((_, count)) => {
                *count += 1;
                false
            }
            None => {
                self.entries.push((scene, 1));
                true
            }
        }
    }

    /// Drops one reference from `scene`.
    ///
    /// Returns `None` if the scene holds no reference, otherwise the number of
    /// references the scene still holds.
    pub(crate) fn remove(&mut self, scene: SceneId) -> Option<u32> {
        let index = self.entries.iter().position(|(s, _)| *s == scene)?;
        let count = &mut self.entries[index].1;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.entries.remove(index);
        }
        Some(remaining)
    }

    /// Whether no scene references the resource.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of references `scene` holds.
    pub fn count_for(&self, scene: SceneId) -> u32 {
        self.entries
            .iter()
            .find(|(s, _)| *s == scene)
            .map_or(0, |(_, count)| *count)
    }

    /// The referencing scenes, in first-reference order.
    pub fn scenes(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.entries.iter().map(|(scene, _)| *scene)
    }

    /// The scene that referenced the resource first, if any still does.
    pub fn first_scene(&self) -> Option<SceneId> {
        self.entries.first().map(|(scene, _)| *scene)
    }

    /// Number of distinct referencing scenes.
    pub fn scene_count(&self) -> usize {
        self.entries.len()
    }

    /// Sum of references over all scenes.
    pub fn total_refs(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }
}

/// Everything the registry knows about one resource.
///
/// Descriptors are only handed out by shared reference; every change goes
/// through a [`ResourceRegistry`](super::ResourceRegistry) transition.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Content hash, the registry key.
    pub hash: ResourceHash,
    /// Lifecycle status.
    pub status: ResourceStatus,
    /// Category, known once the payload is provided.
    pub resource_type: Option<ResourceType>,
    /// Referencing scenes.
    pub scene_usage: SceneUsage,
    /// Device identity. `Some` exactly when the status is `Uploaded`.
    pub device_handle: Option<DeviceHandle>,
    /// Stored payload size in bytes.
    pub compressed_size: u64,
    /// Size handed to the device in bytes. Used for cache accounting.
    pub decompressed_size: u64,
    /// Device memory reported by the upload, in bytes.
    pub vram_size: u64,
    /// The payload. `Some` exactly when the status is `Provided` or `ScheduledForUpload`.
    pub resource: Option<Arc<dyn Resource>>,
}

impl ResourceDescriptor {
    pub(crate) fn new(hash: ResourceHash) -> Self {
        Self {
            hash,
            status: ResourceStatus::Registered,
            resource_type: None,
            scene_usage: SceneUsage::default(),
            device_handle: None,
            compressed_size: 0,
            decompressed_size: 0,
            vram_size: 0,
            resource: None,
        }
    }

    /// Whether any scene references the resource.
    pub fn is_in_use(&self) -> bool {
        !self.scene_usage.is_empty()
    }

    /// Whether the resource is a shader program.
    pub fn is_shader(&self) -> bool {
        self.resource_type == Some(ResourceType::ShaderProgram)
    }
}
