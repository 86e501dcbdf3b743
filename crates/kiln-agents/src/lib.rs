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

//! # Kiln Agents
//!
//! Agents own a piece of engine state, negotiate a per-frame budget and drive
//! the lanes within it. This crate provides the [`ResourceUploadAgent`], which
//! keeps the resources scenes reference resident on the graphics device.

#![warn(missing_docs)]

pub mod upload_agent;

pub use upload_agent::{ResourceUploadAgent, TickSummary};
