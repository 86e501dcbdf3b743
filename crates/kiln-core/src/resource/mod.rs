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

//! Identity, classification and payload types for GPU-consumable resources.
//!
//! Every resource is keyed by its content-addressed [`ResourceHash`]. Its category
//! is a [`ResourceType`], its position in the lifecycle a [`ResourceStatus`], and
//! its system-memory bytes are carried by an implementation of [`Resource`].

mod id;
mod kind;
mod payload;

pub use self::id::{DeviceHandle, ResourceHash, SceneId};
pub use self::kind::{ResourceStatus, ResourceType};
pub use self::payload::{BlobResource, Resource};
