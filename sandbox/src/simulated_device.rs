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

//! An in-memory stand-in for a graphics device and its shader compiler.

use kiln_core::{
    CompiledShader, DeviceHandle, Resource, ResourceError, ResourceHash, ResourceType,
    ResourceUploader, SceneId, ShaderCompiler, UploadOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const VRAM_ALIGNMENT: u64 = 256;
const SHADER_BINARY_MAGIC: &[u8] = b"KSB1";
const SHADER_SOURCE_PREFIX: &str = "#version";

/// A shader binary as persisted in the binary cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedShaderBinary {
    hash: ResourceHash,
    scene: Option<SceneId>,
    binary: Vec<u8>,
}

/// Keeps "device memory" in a map and simulates transfer time.
///
/// Shader programs are uploaded synchronously only when the binary cache already
/// holds them; otherwise they are reported not ready and go to the compiler.
pub struct SimulatedDevice {
    next_handle: u64,
    resident: HashMap<DeviceHandle, u64>,
    registered_binaries: HashMap<DeviceHandle, Vec<u8>>,
    binary_cache: HashMap<ResourceHash, Vec<u8>>,
    transfer_rate_bytes_per_us: u64,
}

impl SimulatedDevice {
    pub fn new(transfer_rate_bytes_per_us: u64) -> Self {
        Self {
            next_handle: 1,
            resident: HashMap::new(),
            registered_binaries: HashMap::new(),
            binary_cache: HashMap::new(),
            transfer_rate_bytes_per_us: transfer_rate_bytes_per_us.max(1),
        }
    }

    /// Bytes currently allocated on the device.
    pub fn resident_bytes(&self) -> u64 {
        self.resident.values().sum()
    }

    /// Number of shader binaries in the binary cache.
    pub fn cached_binaries(&self) -> usize {
        self.binary_cache.len()
    }

    fn allocate(&mut self, bytes: u64) -> (DeviceHandle, u64) {
        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        let vram_size = bytes.div_ceil(VRAM_ALIGNMENT) * VRAM_ALIGNMENT;
        self.resident.insert(handle, vram_size);
        (handle, vram_size)
    }

    fn load_cached_binary(&self, hash: ResourceHash) -> Option<Vec<u8>> {
        let encoded = self.binary_cache.get(&hash)?;
        match bincode::serde::decode_from_slice::<CachedShaderBinary, _>(
            encoded,
            bincode::config::standard(),
        ) {
            Ok((entry, _)) if entry.hash == hash => Some(entry.binary),
            Ok(_) => {
                log::warn!("SimulatedDevice: Binary cache entry for {hash} has a different hash");
                None
            }
            Err(e) => {
                log::warn!("SimulatedDevice: Corrupted binary cache entry for {hash}: {e}");
                None
            }
        }
    }
}

impl ResourceUploader for SimulatedDevice {
    fn upload_resource(&mut self, resource: &dyn Resource) -> UploadOutcome {
        let hash = resource.hash();
        if resource.resource_type() == ResourceType::ShaderProgram {
            return match self.load_cached_binary(hash) {
                Some(binary) => {
                    log::debug!("SimulatedDevice: Shader {hash} loaded from the binary cache");
                    let (handle, vram_size) = self.allocate(binary.len() as u64);
                    UploadOutcome::Uploaded { handle, vram_size }
                }
                None => UploadOutcome::NotReady,
            };
        }

        let bytes = match resource.data() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("SimulatedDevice: {e}");
                return UploadOutcome::Failed;
            }
        };

        let transfer_us = bytes.len() as u64 / self.transfer_rate_bytes_per_us;
        std::thread::sleep(Duration::from_micros(transfer_us));

        let (handle, vram_size) = self.allocate(bytes.len() as u64);
        UploadOutcome::Uploaded { handle, vram_size }
    }

    fn unload_resource(
        &mut self,
        _resource_type: ResourceType,
        hash: ResourceHash,
        handle: DeviceHandle,
    ) {
        if self.resident.remove(&handle).is_none() {
            log::warn!("SimulatedDevice: Unload of {hash} with unknown {handle}");
        }
        self.registered_binaries.remove(&handle);
    }

    fn register_shader(&mut self, shader: CompiledShader) -> Option<DeviceHandle> {
        if !shader.binary.starts_with(SHADER_BINARY_MAGIC) {
            return None;
        }
        let (handle, _) = self.allocate(shader.binary.len() as u64);
        self.registered_binaries.insert(handle, shader.binary);
        Some(handle)
    }

    fn store_shader_in_binary_cache(
        &mut self,
        handle: DeviceHandle,
        hash: ResourceHash,
        scene: Option<SceneId>,
    ) -> Result<(), ResourceError> {
        let binary = self.registered_binaries.get(&handle).cloned().ok_or_else(|| {
            ResourceError::BackendError(format!("{handle} is not a registered shader"))
        })?;
        let entry = CachedShaderBinary {
            hash,
            scene,
            binary,
        };
        let encoded = bincode::serde::encode_to_vec(&entry, bincode::config::standard())
            .map_err(|e| ResourceError::BackendError(e.to_string()))?;
        self.binary_cache.insert(hash, encoded);
        Ok(())
    }
}

/// "Compiles" GLSL-looking sources into tagged binaries after a fixed delay.
///
/// Sources without a `#version` line fail.
pub struct SimulatedCompiler {
    compile_time: Duration,
}

impl SimulatedCompiler {
    pub fn new(compile_time: Duration) -> Self {
        Self { compile_time }
    }
}

impl ShaderCompiler for SimulatedCompiler {
    fn compile_shader(&mut self, resource: &dyn Resource) -> Option<CompiledShader> {
        let source = resource.data().ok()?;
        std::thread::sleep(self.compile_time);

        if !source.starts_with(SHADER_SOURCE_PREFIX.as_bytes()) {
            return None;
        }

        let mut binary = SHADER_BINARY_MAGIC.to_vec();
        binary.extend(source.iter().rev());
        Some(CompiledShader {
            hash: resource.hash(),
            binary,
        })
    }
}
