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

//! The agent responsible for GPU resource residency.
//!
//! Every frame, the agent turns the registry's provided resources into uploaded
//! ones and its unused resources into freed device memory, under a wall-clock
//! budget and a byte-size cache budget. Shader programs the device cannot
//! upload synchronously are compiled on a worker thread and finalized in a
//! later frame.

mod agent;
mod scene_facade;

pub use self::agent::{ResourceUploadAgent, TickSummary};
