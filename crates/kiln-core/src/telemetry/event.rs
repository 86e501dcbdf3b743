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

//! Events pushed from the hot path to whoever supervises the budgets.

/// A snapshot of device memory use by uploaded resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsageReport {
    /// Bytes currently uploaded.
    pub current_bytes: u64,
    /// Highest number of bytes uploaded at once, if tracked.
    pub peak_bytes: Option<u64>,
    /// Configured cache capacity. `None` when caching is disabled.
    pub total_capacity_bytes: Option<u64>,
}

/// A telemetry event produced by the upload agent.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Device memory use after a tick.
    ResourceReport(ResourceUsageReport),
}
