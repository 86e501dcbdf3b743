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

//! The resource registry and its lifecycle state machine.
//!
//! The registry exclusively owns every [`ResourceDescriptor`]. Callers change a
//! descriptor only through the transition methods of [`ResourceRegistry`], which
//! keep three derived indexes up to date incrementally:
//!
//! - the *provided* list: resources with a payload, waiting for upload;
//! - the *unused* list: uploaded (or in-flight) resources no scene references,
//!   i.e. eviction candidates;
//! - the per-scene index: which resources each scene references.
//!
//! A transition that is not an edge of the lifecycle graph is a caller bug and
//! panics.

mod descriptor;
mod hash_list;

pub use self::descriptor::{ResourceDescriptor, SceneUsage};
pub use self::hash_list::HashList;

use ahash::AHashMap;
use kiln_core::{DeviceHandle, Resource, ResourceHash, ResourceStatus, SceneId};
use std::ops::Index;
use std::sync::Arc;

/// Owns all resource descriptors and the lists derived from them.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    descriptors: AHashMap<ResourceHash, ResourceDescriptor>,
    provided: HashList,
    unused: HashList,
    scheduled_for_upload: usize,
    scene_resources: AHashMap<SceneId, HashList>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource in the `Registered` state with no references.
    ///
    /// # Panics
    ///
    /// Panics if the hash is already registered.
    pub fn register_resource(&mut self, hash: ResourceHash) {
        assert!(
            !self.descriptors.contains_key(&hash),
            "resource {hash} is already registered"
        );
        self.descriptors.insert(hash, ResourceDescriptor::new(hash));
    }

    /// Removes a resource and purges it from every derived list.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not registered, is still referenced by a scene,
    /// or is waiting for an asynchronous compile result.
    pub fn unregister_resource(&mut self, hash: ResourceHash) {
        let descriptor = self.get(hash);
        assert!(
            !descriptor.is_in_use(),
            "resource {hash} cannot be unregistered while referenced by a scene"
        );
        assert!(
            descriptor.status != ResourceStatus::ScheduledForUpload,
            "resource {hash} cannot be unregistered while scheduled for upload"
        );

        self.descriptors.remove(&hash);
        self.provided.remove(hash);
        self.unused.remove(hash);
    }

    /// Adds one reference from `scene`.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not registered.
    pub fn add_resource_ref(&mut self, hash: ResourceHash, scene: SceneId) {
        let descriptor = self.get_mut(hash);
        let first_for_scene = descriptor.scene_usage.add(scene);

        if first_for_scene {
            self.scene_resources.entry(scene).or_default().insert(hash);
        }
        self.unused.remove(hash);
    }

    /// Removes one reference from `scene`.
    ///
    /// When the last reference of any scene is gone, an uploaded or in-flight
    /// resource becomes an eviction candidate and any other resource is
    /// unregistered immediately.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not registered or `scene` holds no reference to it.
    pub fn remove_resource_ref(&mut self, hash: ResourceHash, scene: SceneId) {
        let descriptor = self.get_mut(hash);
        let Some(remaining_for_scene) = descriptor.scene_usage.remove(scene) else {
            panic!("scene {scene} holds no reference to resource {hash}");
        };
        let now_unused = descriptor.scene_usage.is_empty();
        let status = descriptor.status;

        if remaining_for_scene == 0 {
            self.remove_from_scene_index(scene, hash);
        }

        if now_unused {
            match status {
                ResourceStatus::Uploaded | ResourceStatus::ScheduledForUpload => {
                    self.unused.insert(hash);
                }
                _ => self.unregister_resource(hash),
            }
        }
    }

    /// Attaches the payload and moves the resource from `Registered` to `Provided`.
    ///
    /// Type and sizes are taken from the payload.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not registered or not in the `Registered` state.
    pub fn set_resource_data(&mut self, hash: ResourceHash, resource: Arc<dyn Resource>) {
        let descriptor = self.get_mut(hash);
        assert_eq!(
            descriptor.status,
            ResourceStatus::Registered,
            "resource {hash} must be Registered to receive data"
        );
        debug_assert_eq!(resource.hash(), hash, "payload hash mismatch");

        descriptor.resource_type = Some(resource.resource_type());
        descriptor.compressed_size = resource.compressed_size();
        descriptor.decompressed_size = resource.decompressed_size();
        descriptor.resource = Some(resource);
        descriptor.status = ResourceStatus::Provided;

        self.provided.insert(hash);
    }

    /// Moves a resource from `Provided` to `ScheduledForUpload`.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not `Provided` or already has a device handle.
    pub fn set_resource_scheduled_for_upload(&mut self, hash: ResourceHash) {
        let descriptor = self.get_mut(hash);
        assert_eq!(
            descriptor.status,
            ResourceStatus::Provided,
            "resource {hash} must be Provided to be scheduled for upload"
        );
        assert!(
            descriptor.device_handle.is_none(),
            "resource {hash} scheduled for upload already has a device handle"
        );
        descriptor.status = ResourceStatus::ScheduledForUpload;

        self.provided.remove(hash);
        self.scheduled_for_upload += 1;
    }

    /// Records a successful upload and releases the payload.
    ///
    /// Cache accounting is left to the caller.
    ///
    /// # Panics
    ///
    /// Panics if the resource is neither `Provided` nor `ScheduledForUpload`.
    pub fn set_resource_uploaded(
        &mut self,
        hash: ResourceHash,
        handle: DeviceHandle,
        vram_size: u64,
    ) {
        let previous = self.leave_upload_states(hash, ResourceStatus::Uploaded);
        let descriptor = self.get_mut(hash);
        descriptor.device_handle = Some(handle);
        descriptor.vram_size = vram_size;
        log::trace!(
            "ResourceRegistry: {hash} {previous} -> Uploaded ({vram_size} bytes of VRAM)"
        );
    }

    /// Records a failed upload or compile and releases the payload.
    ///
    /// A resource that no scene references any more is unregistered right away.
    ///
    /// # Panics
    ///
    /// Panics if the resource is neither `Provided` nor `ScheduledForUpload`.
    pub fn set_resource_broken(&mut self, hash: ResourceHash) {
        let previous = self.leave_upload_states(hash, ResourceStatus::Broken);
        log::trace!("ResourceRegistry: {hash} {previous} -> Broken");

        if !self.get(hash).is_in_use() {
            self.unregister_resource(hash);
        }
    }

    /// Whether the hash is registered.
    pub fn contains_resource(&self, hash: ResourceHash) -> bool {
        self.descriptors.contains_key(&hash)
    }

    /// Returns the descriptor of a resource, if registered.
    pub fn resource_descriptor(&self, hash: ResourceHash) -> Option<&ResourceDescriptor> {
        self.descriptors.get(&hash)
    }

    /// Returns the status of a registered resource.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not registered.
    pub fn resource_status(&self, hash: ResourceHash) -> ResourceStatus {
        self.get(hash).status
    }

    /// Resources with a payload waiting for upload, in the order they were provided.
    pub fn all_provided_resources(&self) -> &HashList {
        &self.provided
    }

    /// Uploaded or in-flight resources that no scene references, in the order
    /// they became unused.
    pub fn all_resources_not_in_use_by_scenes(&self) -> &HashList {
        &self.unused
    }

    /// Resources referenced by `scene`, in first-reference order.
    pub fn resources_in_use_by_scene(&self, scene: SceneId) -> Vec<ResourceHash> {
        self.scene_resources
            .get(&scene)
            .map(HashList::to_vec)
            .unwrap_or_default()
    }

    /// Number of resources `scene` references.
    pub fn scene_resource_count(&self, scene: SceneId) -> usize {
        self.scene_resources.get(&scene).map_or(0, HashList::len)
    }

    /// Scenes that currently reference at least one resource.
    pub fn scenes(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.scene_resources.keys().copied()
    }

    /// Whether any resource waits for an asynchronous compile result.
    pub fn has_any_resources_scheduled_for_upload(&self) -> bool {
        self.scheduled_for_upload > 0
    }

    /// Iterates over every descriptor, in no particular order.
    pub fn all_resource_descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.values()
    }

    /// Number of registered resources.
    pub fn resource_count(&self) -> usize {
        self.descriptors.len()
    }

    fn leave_upload_states(&mut self, hash: ResourceHash, to: ResourceStatus) -> ResourceStatus {
        let descriptor = self.get_mut(hash);
        let previous = descriptor.status;
        match previous {
            ResourceStatus::Provided => {
                self.provided.remove(hash);
            }
            ResourceStatus::ScheduledForUpload => {
                self.scheduled_for_upload -= 1;
            }
            other => panic!("resource {hash} cannot go from {other} to {to}"),
        }

        let descriptor = self.get_mut(hash);
        descriptor.status = to;
        descriptor.resource = None;
        previous
    }

    fn remove_from_scene_index(&mut self, scene: SceneId, hash: ResourceHash) {
        if let Some(resources) = self.scene_resources.get_mut(&scene) {
            resources.remove(hash);
            if resources.is_empty() {
                self.scene_resources.remove(&scene);
            }
        }
    }

    fn get(&self, hash: ResourceHash) -> &ResourceDescriptor {
        match self.descriptors.get(&hash) {
            Some(descriptor) => descriptor,
            None => panic!("resource {hash} is not registered"),
        }
    }

    fn get_mut(&mut self, hash: ResourceHash) -> &mut ResourceDescriptor {
        match self.descriptors.get_mut(&hash) {
            Some(descriptor) => descriptor,
            None => panic!("resource {hash} is not registered"),
        }
    }
}

impl Index<ResourceHash> for ResourceRegistry {
    type Output = ResourceDescriptor;

    /// Returns the descriptor of a registered resource.
    ///
    /// # Panics
    ///
    /// Panics if the resource is not registered.
    fn index(&self, hash: ResourceHash) -> &ResourceDescriptor {
        self.get(hash)
    }
}
