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

//! A point-in-time summary of the registry, for logs and debugging tools.

use crate::registry::ResourceRegistry;
use kiln_core::{ResourceHash, ResourceStatus, ResourceType, SceneId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Aggregated sizes of all resources of one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    /// Number of resources.
    pub count: usize,
    /// Sum of stored payload sizes, in bytes.
    pub compressed_bytes: u64,
    /// Sum of device-facing sizes, in bytes.
    pub decompressed_bytes: u64,
    /// Sum of reported device memory, in bytes.
    pub vram_bytes: u64,
}

/// Resources referenced by more than one scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SharingSummary {
    /// Number of resources referenced by at least two scenes.
    pub shared_resources: usize,
    /// Payload bytes that did not have to be provided again thanks to sharing.
    pub transfer_bytes_saved: u64,
}

/// What one scene references and what it is still waiting for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneSummary {
    /// Number of distinct resources the scene references.
    pub referenced: usize,
    /// Referenced resources that are not uploaded.
    pub missing: Vec<ResourceHash>,
}

/// A summary of every resource in a [`ResourceRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    /// Number of resources per status.
    pub status_counts: BTreeMap<ResourceStatus, usize>,
    /// Sizes per resource type. Resources without data yet are not counted.
    pub by_type: BTreeMap<ResourceType, TypeSummary>,
    /// Sharing between scenes.
    pub sharing: SharingSummary,
    /// Per-scene reference summary.
    pub scenes: BTreeMap<SceneId, SceneSummary>,
    /// Resources waiting for upload.
    pub pending_upload: usize,
    /// Unused resources still resident on the device or in flight.
    pub pending_unload: usize,
}

impl ResourceReport {
    /// Builds the report by walking the whole registry.
    pub fn from_registry(registry: &ResourceRegistry) -> Self {
        let mut report = ResourceReport {
            pending_upload: registry.all_provided_resources().len(),
            pending_unload: registry.all_resources_not_in_use_by_scenes().len(),
            ..Default::default()
        };

        for descriptor in registry.all_resource_descriptors() {
            *report.status_counts.entry(descriptor.status).or_default() += 1;

            if let Some(resource_type) = descriptor.resource_type {
                let summary = report.by_type.entry(resource_type).or_default();
                summary.count += 1;
                summary.compressed_bytes += descriptor.compressed_size;
                summary.decompressed_bytes += descriptor.decompressed_size;
                summary.vram_bytes += descriptor.vram_size;
            }

            let scene_count = descriptor.scene_usage.scene_count() as u64;
            if scene_count > 1 {
                report.sharing.shared_resources += 1;
                report.sharing.transfer_bytes_saved += descriptor.compressed_size * (scene_count - 1);
            }
        }

        for scene in registry.scenes() {
            let resources = registry.resources_in_use_by_scene(scene);
            let mut missing: Vec<ResourceHash> = resources
                .iter()
                .copied()
                .filter(|hash| registry.resource_status(*hash) != ResourceStatus::Uploaded)
                .collect();
            missing.sort();
            report.scenes.insert(
                scene,
                SceneSummary {
                    referenced: resources.len(),
                    missing,
                },
            );
        }

        report
    }

    /// Total number of registered resources.
    pub fn total(&self) -> usize {
        self.status_counts.values().sum()
    }

    /// Number of resources in `status`.
    pub fn count(&self, status: ResourceStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

impl fmt::Display for ResourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} resources registered:", self.total())?;
        for (status, count) in &self.status_counts {
            write!(f, " {status}={count}")?;
        }
        writeln!(f)?;

        for (resource_type, summary) in &self.by_type {
            writeln!(
                f,
                "  {resource_type}: {} resources, {} KB compressed, {} KB decompressed, {} KB VRAM",
                summary.count,
                summary.compressed_bytes / 1024,
                summary.decompressed_bytes / 1024,
                summary.vram_bytes / 1024,
            )?;
        }

        writeln!(
            f,
            "  {} resources shared between scenes, {} KB transfer saved",
            self.sharing.shared_resources,
            self.sharing.transfer_bytes_saved / 1024,
        )?;

        for (scene, summary) in &self.scenes {
            write!(
                f,
                "  {scene}: {} referenced, {} missing",
                summary.referenced,
                summary.missing.len()
            )?;
            if !summary.missing.is_empty() {
                let missing: Vec<String> = summary.missing.iter().map(|h| h.to_string()).collect();
                write!(f, " [{}]", missing.join(", "))?;
            }
            writeln!(f)?;
        }

        write!(
            f,
            "  {} to upload, {} unused on device",
            self.pending_upload, self.pending_unload
        )
    }
}
