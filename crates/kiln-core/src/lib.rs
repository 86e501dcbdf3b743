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

//! # Kiln Core
//!
//! Foundational crate containing the identity types, collaborator contracts and
//! configuration shared by every layer of the GPU resource lifecycle manager.

#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod resource;
pub mod telemetry;
pub mod utils;

pub use config::UploadConfig;
pub use device::{CompiledShader, ResourceUploader, ShaderCompiler, UploadOutcome};
pub use error::ResourceError;
pub use resource::{
    BlobResource, DeviceHandle, Resource, ResourceHash, ResourceStatus, ResourceType, SceneId,
};
pub use utils::timer::{FrameSection, FrameTimer, Stopwatch};
