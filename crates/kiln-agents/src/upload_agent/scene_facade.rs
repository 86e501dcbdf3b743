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

//! Scene-facing operations on the upload agent.
//!
//! Scenes only deal in hashes: they reference what they need, provide payloads
//! when their content arrives, and ask for device handles when they render.

use std::sync::Arc;

use kiln_core::{
    DeviceHandle, Resource, ResourceError, ResourceHash, ResourceStatus, ResourceType,
    ResourceUploader, SceneId,
};

use super::ResourceUploadAgent;

impl<U: ResourceUploader> ResourceUploadAgent<U> {
    /// Adds one reference from `scene` to each resource, registering unknown hashes.
    pub fn reference_resources_for_scene(&mut self, scene: SceneId, hashes: &[ResourceHash]) {
        let registry = self.registry_mut();
        for &hash in hashes {
            if !registry.contains_resource(hash) {
                registry.register_resource(hash);
            }
            registry.add_resource_ref(hash, scene);
        }
    }

    /// Removes one reference from `scene` to each resource.
    ///
    /// # Panics
    ///
    /// Panics if `scene` holds no reference to one of the resources.
    pub fn unreference_resources_for_scene(&mut self, scene: SceneId, hashes: &[ResourceHash]) {
        let registry = self.registry_mut();
        for &hash in hashes {
            registry.remove_resource_ref(hash, scene);
        }
    }

    /// Removes every reference `scene` holds, duplicates included.
    pub fn unreference_all_resources_for_scene(&mut self, scene: SceneId) {
        let registry = self.registry_mut();
        let hashes = registry.resources_in_use_by_scene(scene);
        for hash in hashes {
            let count = registry[hash].scene_usage.count_for(scene);
            for _ in 0..count {
                registry.remove_resource_ref(hash, scene);
            }
        }
        log::debug!("ResourceUploadAgent: Released all resources of {scene}");
    }

    /// Attaches a payload to its registered resource.
    ///
    /// Payloads for unknown hashes, or for resources that already received one,
    /// are ignored.
    pub fn provide_resource_data(&mut self, resource: Arc<dyn Resource>) {
        let hash = resource.hash();
        let registry = self.registry_mut();
        match registry.resource_descriptor(hash).map(|d| d.status) {
            Some(ResourceStatus::Registered) => registry.set_resource_data(hash, resource),
            Some(status) => {
                log::trace!("ResourceUploadAgent: Ignoring payload for {hash}, already {status}")
            }
            None => log::trace!("ResourceUploadAgent: Ignoring payload for unreferenced {hash}"),
        }
    }

    /// The status of a resource, if registered.
    pub fn resource_status(&self, hash: ResourceHash) -> Option<ResourceStatus> {
        self.registry().resource_descriptor(hash).map(|d| d.status)
    }

    /// The type of a resource, once its payload was provided.
    pub fn resource_type(&self, hash: ResourceHash) -> Option<ResourceType> {
        self.registry()
            .resource_descriptor(hash)
            .and_then(|d| d.resource_type)
    }

    /// The device handle of an uploaded resource.
    ///
    /// ## Returns
    ///
    /// [`ResourceError::Broken`] for a resource that failed to upload, and
    /// [`ResourceError::NotUploaded`] for one that is not resident yet.
    pub fn resource_device_handle(&self, hash: ResourceHash) -> Result<DeviceHandle, ResourceError> {
        let descriptor = self
            .registry()
            .resource_descriptor(hash)
            .ok_or(ResourceError::NotFound(hash))?;

        match (descriptor.status, descriptor.device_handle) {
            (ResourceStatus::Uploaded, Some(handle)) => Ok(handle),
            (ResourceStatus::Broken, _) => Err(ResourceError::Broken(hash)),
            (status, _) => Err(ResourceError::NotUploaded { hash, status }),
        }
    }

    /// Resources referenced by `scene`, in first-reference order.
    pub fn resources_in_use_by_scene(&self, scene: SceneId) -> Vec<ResourceHash> {
        self.registry().resources_in_use_by_scene(scene)
    }

    /// Whether the next ticks still have uploads or compile results to process.
    pub fn has_resources_to_be_uploaded(&self) -> bool {
        self.has_anything_to_upload()
    }
}
