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

//! Contracts for the graphics device collaborators.
//!
//! The lifecycle manager never talks to a driver directly. It decides *what* to
//! upload or unload and *when*, and delegates the transfer itself to a
//! [`ResourceUploader`] on the main thread and, for shader programs, to a
//! [`ShaderCompiler`] running on a worker thread with its own shared context.

use crate::error::ResourceError;
use crate::resource::{DeviceHandle, Resource, ResourceHash, ResourceType, SceneId};

/// The result of a synchronous upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The resource is now resident on the device.
    Uploaded {
        /// The device-side identity of the resource.
        handle: DeviceHandle,
        /// The number of device bytes the resource occupies.
        vram_size: u64,
    },
    /// The device rejected the resource.
    Failed,
    /// The device cannot upload the resource synchronously.
    ///
    /// Only meaningful for types where
    /// [`ResourceType::requires_async_compile`] is true; for any other type it is
    /// treated as [`UploadOutcome::Failed`].
    NotReady,
}

/// A shader program compiled to a device binary by a [`ShaderCompiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledShader {
    /// The hash of the shader resource this binary was compiled from.
    pub hash: ResourceHash,
    /// The device-specific binary.
    pub binary: Vec<u8>,
}

/// The main-thread device backend used by the upload manager.
pub trait ResourceUploader {
    /// Attempts to upload a resource synchronously.
    ///
    /// ## Arguments
    ///
    /// * `resource` - The payload to transfer. Its bytes are available through
    ///   [`Resource::data`].
    ///
    /// ## Returns
    ///
    /// An [`UploadOutcome`] describing whether the resource became resident,
    /// failed, or must take the asynchronous compile path.
    fn upload_resource(&mut self, resource: &dyn Resource) -> UploadOutcome;

    /// Releases the device memory of a previously uploaded resource.
    fn unload_resource(
        &mut self,
        resource_type: ResourceType,
        hash: ResourceHash,
        handle: DeviceHandle,
    );

    /// Registers a shader binary produced by the asynchronous compiler.
    ///
    /// ## Returns
    ///
    /// The device handle of the shader program, or `None` if the device refused it.
    fn register_shader(&mut self, shader: CompiledShader) -> Option<DeviceHandle>;

    /// Persists a registered shader binary so later runs can skip compilation.
    ///
    /// This is best-effort. An error is logged by the caller and otherwise ignored.
    ///
    /// ## Arguments
    ///
    /// * `handle` - The handle returned by [`ResourceUploader::register_shader`].
    /// * `hash` - The hash of the shader resource.
    /// * `scene` - The first scene referencing the shader, if any.
    fn store_shader_in_binary_cache(
        &mut self,
        handle: DeviceHandle,
        hash: ResourceHash,
        scene: Option<SceneId>,
    ) -> Result<(), ResourceError>;
}

/// Compiles shader programs off the main thread.
///
/// An implementation is moved into the compile worker and owns whatever shared
/// device context the compilation needs.
pub trait ShaderCompiler: Send {
    /// Compiles a shader resource.
    ///
    /// ## Returns
    ///
    /// The compiled binary, or `None` if compilation failed.
    fn compile_shader(&mut self, resource: &dyn Resource) -> Option<CompiledShader>;
}
