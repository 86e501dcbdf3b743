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

//! A lane deciding which unused resources to evict so new uploads fit the cache.

use kiln_core::{ResourceHash, ResourceStatus};
use kiln_data::ResourceRegistry;

/// The evictions chosen for a single tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Bytes the tick asked to free. `u64::MAX` means "everything unused".
    pub amount_to_free: u64,
    /// Resources to unload, in eviction order.
    pub candidates: Vec<ResourceHash>,
    /// Bytes the candidates occupy.
    pub freed_bytes: u64,
}

/// Plans evictions from the registry's list of unused resources.
///
/// Candidates are taken in the order resources became unused, not by size or
/// age, and only as many as needed to free the requested amount.
#[derive(Debug, Clone, Copy)]
pub struct EvictionLane {
    keep_shaders_cached: bool,
}

impl EvictionLane {
    /// Creates a new `EvictionLane`.
    ///
    /// With `keep_shaders_cached`, unused shader programs are never chosen.
    pub fn new(keep_shaders_cached: bool) -> Self {
        Self {
            keep_shaders_cached,
        }
    }

    /// How many bytes must be freed before `size_to_upload` more bytes are uploaded.
    ///
    /// A capacity of `0` disables caching, so everything unused must go. Otherwise
    /// only the overflow above the capacity is freed, keeping the cache as full as
    /// the budget allows.
    pub fn amount_to_free(cache_capacity: u64, total_uploaded: u64, size_to_upload: u64) -> u64 {
        if cache_capacity == 0 {
            return u64::MAX;
        }
        total_uploaded
            .saturating_add(size_to_upload)
            .saturating_sub(cache_capacity)
    }

    /// Selects the unused resources to unload.
    pub fn plan(&self, registry: &ResourceRegistry, amount_to_free: u64) -> EvictionPlan {
        let mut plan = EvictionPlan {
            amount_to_free,
            ..Default::default()
        };

        for hash in registry.all_resources_not_in_use_by_scenes() {
            if plan.freed_bytes >= amount_to_free {
                break;
            }

            let descriptor = &registry[hash];
            // In-flight compiles cannot be cancelled; they become candidates once resident.
            if descriptor.status != ResourceStatus::Uploaded {
                continue;
            }
            if self.keep_shaders_cached && descriptor.is_shader() {
                continue;
            }

            plan.candidates.push(hash);
            plan.freed_bytes = plan.freed_bytes.saturating_add(descriptor.decompressed_size);
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{BlobResource, DeviceHandle, Resource, ResourceType, SceneId};
    use std::sync::Arc;

    const SCENE: SceneId = SceneId(1);

    fn h(n: u64) -> ResourceHash {
        ResourceHash::from_parts(n, 0)
    }

    fn uploaded_then_unused(
        registry: &mut ResourceRegistry,
        hash: ResourceHash,
        resource_type: ResourceType,
    ) {
        registry.register_resource(hash);
        registry.add_resource_ref(hash, SCENE);
        let resource: Arc<dyn Resource> =
            Arc::new(BlobResource::new(resource_type, vec![0u8; 10]).with_hash(hash));
        registry.set_resource_data(hash, resource);
        registry.set_resource_uploaded(hash, DeviceHandle(hash.low()), 10);
        registry.remove_resource_ref(hash, SCENE);
    }

    #[test]
    fn test_amount_to_free() {
        assert_eq!(EvictionLane::amount_to_free(0, 50, 0), u64::MAX);
        assert_eq!(EvictionLane::amount_to_free(30, 20, 10), 0);
        assert_eq!(EvictionLane::amount_to_free(30, 20, 20), 10);
        assert_eq!(EvictionLane::amount_to_free(30, 50, 0), 20);
        assert_eq!(EvictionLane::amount_to_free(30, 40, 10), 20);
    }

    #[test]
    fn test_frees_just_enough_in_unused_order() {
        let mut registry = ResourceRegistry::new();
        for n in 1..=5 {
            uploaded_then_unused(&mut registry, h(n), ResourceType::VertexBuffer);
        }

        let plan = EvictionLane::new(true).plan(&registry, 20);
        assert_eq!(plan.candidates, vec![h(1), h(2)]);
        assert_eq!(plan.freed_bytes, 20);
    }

    #[test]
    fn test_rounds_up_to_whole_resources() {
        let mut registry = ResourceRegistry::new();
        for n in 1..=3 {
            uploaded_then_unused(&mut registry, h(n), ResourceType::Texture);
        }

        let plan = EvictionLane::new(true).plan(&registry, 11);
        assert_eq!(plan.candidates.len(), 2);
    }

    #[test]
    fn test_skips_kept_shaders_and_in_flight_resources() {
        let mut registry = ResourceRegistry::new();
        uploaded_then_unused(&mut registry, h(1), ResourceType::ShaderProgram);
        uploaded_then_unused(&mut registry, h(2), ResourceType::Texture);

        registry.register_resource(h(3));
        registry.add_resource_ref(h(3), SCENE);
        let shader: Arc<dyn Resource> =
            Arc::new(BlobResource::new(ResourceType::ShaderProgram, vec![1u8; 10]).with_hash(h(3)));
        registry.set_resource_data(h(3), shader);
        registry.set_resource_scheduled_for_upload(h(3));
        registry.remove_resource_ref(h(3), SCENE);

        let keeping = EvictionLane::new(true).plan(&registry, u64::MAX);
        assert_eq!(keeping.candidates, vec![h(2)]);

        let not_keeping = EvictionLane::new(false).plan(&registry, u64::MAX);
        assert_eq!(not_keeping.candidates, vec![h(1), h(2)]);
    }

    #[test]
    fn test_nothing_requested_nothing_planned() {
        let mut registry = ResourceRegistry::new();
        uploaded_then_unused(&mut registry, h(1), ResourceType::VertexBuffer);
        assert!(EvictionLane::new(true).plan(&registry, 0).candidates.is_empty());
    }
}
