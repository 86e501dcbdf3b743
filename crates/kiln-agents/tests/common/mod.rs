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

//! Test doubles shared by the upload agent integration tests.

#![allow(dead_code)]

use kiln_agents::{ResourceUploadAgent, TickSummary};
use kiln_core::{
    BlobResource, CompiledShader, DeviceHandle, FrameSection, FrameTimer, Resource,
    ResourceError, ResourceHash, ResourceStatus, ResourceType, ResourceUploader, SceneId,
    ShaderCompiler, UploadOutcome,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const SCENE: SceneId = SceneId(1);

/// Every device call the agent made, in call order.
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub uploaded: Vec<ResourceHash>,
    pub unloaded: Vec<ResourceHash>,
    pub registered_shaders: Vec<ResourceHash>,
    pub cached_shaders: Vec<(ResourceHash, Option<SceneId>)>,
}

/// A device that records calls and can be scripted to fail or to exhaust the budget.
pub struct RecordingUploader {
    log: Arc<Mutex<DeviceLog>>,
    next_handle: u64,
    failing: HashSet<ResourceHash>,
    async_shaders: bool,
    exhaust_budget: Option<(Arc<FrameTimer>, usize)>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(DeviceLog::default())),
            next_handle: 1,
            failing: HashSet::new(),
            async_shaders: false,
            exhaust_budget: None,
        }
    }

    /// Shader programs are reported as not ready, sending them to the compiler.
    pub fn with_async_shaders(mut self) -> Self {
        self.async_shaders = true;
        self
    }

    pub fn failing(mut self, hash: ResourceHash) -> Self {
        self.failing.insert(hash);
        self
    }

    /// Drops the upload budget to zero once `uploads` resources are on the device,
    /// standing in for an upload that takes too long.
    pub fn exhausting_budget_after(mut self, timer: Arc<FrameTimer>, uploads: usize) -> Self {
        self.exhaust_budget = Some((timer, uploads));
        self
    }

    pub fn log(&self) -> Arc<Mutex<DeviceLog>> {
        Arc::clone(&self.log)
    }

    fn next_handle(&mut self) -> DeviceHandle {
        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl ResourceUploader for RecordingUploader {
    fn upload_resource(&mut self, resource: &dyn Resource) -> UploadOutcome {
        if self.failing.contains(&resource.hash()) {
            return UploadOutcome::Failed;
        }
        if self.async_shaders && resource.resource_type() == ResourceType::ShaderProgram {
            return UploadOutcome::NotReady;
        }

        let uploads = {
            let mut log = self.log.lock().unwrap();
            log.uploaded.push(resource.hash());
            log.uploaded.len()
        };
        if let Some((timer, after)) = &self.exhaust_budget {
            if uploads >= *after {
                timer.set_section_budget(FrameSection::ResourcesUpload, 0);
            }
        }

        UploadOutcome::Uploaded {
            handle: self.next_handle(),
            vram_size: resource.decompressed_size(),
        }
    }

    fn unload_resource(
        &mut self,
        _resource_type: ResourceType,
        hash: ResourceHash,
        _handle: DeviceHandle,
    ) {
        self.log.lock().unwrap().unloaded.push(hash);
    }

    fn register_shader(&mut self, shader: CompiledShader) -> Option<DeviceHandle> {
        if shader.binary.is_empty() {
            return None;
        }
        self.log.lock().unwrap().registered_shaders.push(shader.hash);
        Some(self.next_handle())
    }

    fn store_shader_in_binary_cache(
        &mut self,
        _handle: DeviceHandle,
        hash: ResourceHash,
        scene: Option<SceneId>,
    ) -> Result<(), ResourceError> {
        self.log.lock().unwrap().cached_shaders.push((hash, scene));
        Ok(())
    }
}

/// Compiles a shader by copying its source. Listed hashes fail to compile.
pub struct ScriptedCompiler {
    failing: HashSet<ResourceHash>,
}

impl ScriptedCompiler {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, hash: ResourceHash) -> Self {
        self.failing.insert(hash);
        self
    }
}

impl ShaderCompiler for ScriptedCompiler {
    fn compile_shader(&mut self, resource: &dyn Resource) -> Option<CompiledShader> {
        if self.failing.contains(&resource.hash()) {
            return None;
        }
        Some(CompiledShader {
            hash: resource.hash(),
            binary: resource.data().ok()?.to_vec(),
        })
    }
}

pub fn h(n: u64) -> ResourceHash {
    ResourceHash::from_parts(n, 0)
}

pub fn blob(hash: ResourceHash, resource_type: ResourceType, size: usize) -> Arc<dyn Resource> {
    Arc::new(BlobResource::new(resource_type, vec![0xAB; size]).with_hash(hash))
}

/// References `hash` from `scene` and provides a payload of `size` bytes.
pub fn reference_and_provide<U: ResourceUploader>(
    agent: &mut ResourceUploadAgent<U>,
    hash: ResourceHash,
    resource_type: ResourceType,
    size: usize,
    scene: SceneId,
) {
    agent.reference_resources_for_scene(scene, &[hash]);
    agent.provide_resource_data(blob(hash, resource_type, size));
}

/// Starts a frame and runs one tick.
pub fn tick<U: ResourceUploader>(agent: &mut ResourceUploadAgent<U>) -> TickSummary {
    agent.frame_timer().start_frame();
    agent.upload_and_unload_pending_resources()
}

/// Ticks until `hash` leaves the compile worker, or fails after a few seconds.
pub fn tick_until_compiled<U: ResourceUploader>(
    agent: &mut ResourceUploadAgent<U>,
    hash: ResourceHash,
) -> Option<ResourceStatus> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        tick(agent);
        let status = agent.resource_status(hash);
        if status != Some(ResourceStatus::ScheduledForUpload) {
            return status;
        }
        assert!(Instant::now() < deadline, "shader {hash} never finished compiling");
        std::thread::sleep(Duration::from_millis(1));
    }
}
