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

//! Configuration of the upload and eviction policy.

use crate::resource::SceneId;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Number of resources uploaded between two time budget checks.
pub const DEFAULT_UPLOAD_BATCH_SIZE: usize = 10;

/// Resources larger than this (in bytes) are always followed by a time budget check.
pub const DEFAULT_LARGE_RESOURCE_THRESHOLD: u64 = 250_000;

/// Shader programs that may wait in, or come back from, the compile worker at once.
pub const DEFAULT_SHADER_QUEUE_CAPACITY: usize = 64;

/// Tuning knobs of the resource upload agent.
///
/// Every field has a default, so a RON document only needs to list what it changes:
///
/// ```ron
/// (
///     gpu_cache_size: 64000000,
///     scene_priorities: { 7: -1, 12: 4 },
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Soft ceiling on the total size of uploaded resources, in bytes.
    /// `0` disables caching: unused resources are unloaded on the next tick.
    pub gpu_cache_size: u64,
    /// Resources uploaded between two time budget checks.
    pub upload_batch_size: usize,
    /// Byte size above which a resource is followed by a time budget check.
    pub large_resource_threshold: u64,
    /// Keep unused shader programs resident until the agent is dropped.
    pub keep_shaders_cached: bool,
    /// Upload priority per scene. Lower is preferred; absent scenes are `0`.
    pub scene_priorities: BTreeMap<SceneId, i32>,
    /// Initial per-frame upload time budget in microseconds. `None` is unlimited.
    pub upload_time_budget_us: Option<u64>,
    /// Bound of the compile worker hand-off. Shaders that do not fit stay
    /// provided until a later tick.
    pub shader_queue_capacity: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            gpu_cache_size: 0,
            upload_batch_size: DEFAULT_UPLOAD_BATCH_SIZE,
            large_resource_threshold: DEFAULT_LARGE_RESOURCE_THRESHOLD,
            keep_shaders_cached: true,
            scene_priorities: BTreeMap::new(),
            upload_time_budget_us: None,
            shader_queue_capacity: DEFAULT_SHADER_QUEUE_CAPACITY,
        }
    }
}

impl UploadConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Reads and parses a RON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading upload config {}", path.display()))?;
        let config = Self::from_ron_str(&text)
            .with_context(|| format!("parsing upload config {}", path.display()))?;
        log::info!(
            "UploadConfig: Loaded {} (cache={} bytes, batch={}, scenes with priority={})",
            path.display(),
            config.gpu_cache_size,
            config.upload_batch_size,
            config.scene_priorities.len(),
        );
        Ok(config)
    }

    /// Serializes the configuration to pretty RON text.
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Returns the upload priority of a scene.
    pub fn scene_priority(&self, scene: SceneId) -> i32 {
        self.scene_priorities.get(&scene).copied().unwrap_or(0)
    }

    /// Sets the upload priority of a scene. Lower is preferred.
    pub fn set_scene_priority(&mut self, scene: SceneId, priority: i32) {
        self.scene_priorities.insert(scene, priority);
    }
}
