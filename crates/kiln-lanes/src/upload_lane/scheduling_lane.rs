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

//! A lane ordering pending uploads and deciding where the time budget is checked.

use kiln_core::{ResourceHash, SceneId, UploadConfig};
use kiln_data::ResourceRegistry;
use std::collections::BTreeMap;

/// Orders a tick's uploads by scene priority and places budget checkpoints.
#[derive(Debug, Clone, Copy)]
pub struct UploadSchedulingLane {
    batch_size: usize,
    large_resource_threshold: u64,
}

impl UploadSchedulingLane {
    /// Creates a new `UploadSchedulingLane`.
    ///
    /// A `batch_size` of `0` behaves like `1`.
    pub fn new(batch_size: usize, large_resource_threshold: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            large_resource_threshold,
        }
    }

    /// Creates a lane from the upload configuration.
    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.upload_batch_size, config.large_resource_threshold)
    }

    /// The priority a resource is uploaded with: the most preferred (lowest)
    /// priority among the scenes referencing it. Unlisted scenes count as `0`,
    /// as does a resource no scene references.
    pub fn resource_priority(
        registry: &ResourceRegistry,
        hash: ResourceHash,
        priorities: &BTreeMap<SceneId, i32>,
    ) -> i32 {
        registry
            .resource_descriptor(hash)
            .and_then(|descriptor| {
                descriptor
                    .scene_usage
                    .scenes()
                    .map(|scene| priorities.get(&scene).copied().unwrap_or(0))
                    .min()
            })
            .unwrap_or(0)
    }

    /// Sorts `uploads` so preferred resources come first. Equal priorities keep
    /// their order.
    pub fn order(
        &self,
        registry: &ResourceRegistry,
        uploads: &mut [ResourceHash],
        priorities: &BTreeMap<SceneId, i32>,
    ) {
        if priorities.is_empty() {
            return;
        }
        uploads.sort_by_cached_key(|&hash| Self::resource_priority(registry, hash, priorities));
    }

    /// Whether the time budget is checked after the upload at `index` of a
    /// resource of `size` bytes.
    ///
    /// The check runs after the first upload of every batch and after any large
    /// resource, so each tick uploads at least one resource.
    pub fn is_checkpoint(&self, index: usize, size: u64) -> bool {
        index % self.batch_size == 0 || size > self.large_resource_threshold
    }
}

impl Default for UploadSchedulingLane {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{BlobResource, Resource, ResourceType};
    use std::sync::Arc;

    fn h(n: u64) -> ResourceHash {
        ResourceHash::from_parts(n, 0)
    }

    fn provide(registry: &mut ResourceRegistry, hash: ResourceHash, scenes: &[SceneId]) {
        registry.register_resource(hash);
        for &scene in scenes {
            registry.add_resource_ref(hash, scene);
        }
        let resource: Arc<dyn Resource> =
            Arc::new(BlobResource::new(ResourceType::Texture, vec![0u8; 4]).with_hash(hash));
        registry.set_resource_data(hash, resource);
    }

    #[test]
    fn test_preferred_scenes_first() {
        let preferred = SceneId(1);
        let deprived = SceneId(2);
        let neutral = SceneId(3);

        let mut registry = ResourceRegistry::new();
        provide(&mut registry, h(1), &[deprived]);
        provide(&mut registry, h(2), &[preferred, deprived]);
        provide(&mut registry, h(3), &[preferred]);
        provide(&mut registry, h(4), &[neutral]);

        let priorities = BTreeMap::from([(preferred, -1), (deprived, 12)]);
        let mut uploads = vec![h(1), h(2), h(3), h(4)];
        UploadSchedulingLane::default().order(&registry, &mut uploads, &priorities);

        // h(2) is shared with the preferred scene, so it ranks with it.
        assert_eq!(uploads, vec![h(2), h(3), h(4), h(1)]);
    }

    #[test]
    fn test_no_priorities_keeps_order() {
        let mut registry = ResourceRegistry::new();
        provide(&mut registry, h(2), &[SceneId(1)]);
        provide(&mut registry, h(1), &[]);

        let mut uploads = vec![h(2), h(1)];
        UploadSchedulingLane::default().order(&registry, &mut uploads, &BTreeMap::new());
        assert_eq!(uploads, vec![h(2), h(1)]);
    }

    #[test]
    fn test_checkpoints() {
        let lane = UploadSchedulingLane::new(10, 100);
        assert!(lane.is_checkpoint(0, 1));
        assert!(!lane.is_checkpoint(1, 1));
        assert!(!lane.is_checkpoint(9, 100));
        assert!(lane.is_checkpoint(9, 101));
        assert!(lane.is_checkpoint(10, 1));
    }

    #[test]
    fn test_zero_batch_checks_every_upload() {
        let lane = UploadSchedulingLane::new(0, u64::MAX);
        assert!((0..5).all(|i| lane.is_checkpoint(i, 0)));
    }
}
