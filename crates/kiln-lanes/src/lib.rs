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

//! # Kiln Lanes
//!
//! Hot-path execution pipelines used by the resource upload agent. Lanes hold no
//! resource state of their own: they read the registry and return a plan, or, for
//! the shader lane, move work to and from the compile worker.

#![warn(missing_docs)]

pub mod shader_lane;
pub mod upload_lane;

pub use shader_lane::{AsyncShaderLane, ShaderCompileResult, ShaderJob, ShaderLaneError};
pub use upload_lane::{EvictionLane, EvictionPlan, UploadSchedulingLane};
