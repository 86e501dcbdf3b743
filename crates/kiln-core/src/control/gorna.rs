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

//! Types for the Goal-Oriented Resource Negotiation & Allocation (GORNA) protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Unique identifier for agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum AgentId {
    /// The agent uploading and evicting GPU resources.
    ResourceUpload,
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Generic strategy identifier for budget allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    /// Minimum resource usage.
    LowPower,
    /// Balanced resource usage.
    Balanced,
    /// Maximum throughput.
    HighPerformance,
}

/// Hard limits any proposed strategy must respect.
#[derive(Debug, Clone, Default)]
pub struct ResourceConstraints {
    /// Maximum VRAM usage allowed, in bytes. `None` means unconstrained.
    pub max_vram_bytes: Option<u64>,
}

/// A request sent to an Agent to negotiate resources.
#[derive(Debug, Clone)]
pub struct NegotiationRequest {
    /// The target latency for the frame (e.g. 16.6ms).
    pub target_latency: Duration,
    /// Priority weight (0.0 to 1.0).
    pub priority_weight: f32,
    /// Hard resource constraints.
    pub constraints: ResourceConstraints,
}

/// A response from an Agent offering various execution strategies.
#[derive(Debug, Clone)]
pub struct NegotiationResponse {
    /// List of available strategies and their estimated costs.
    pub strategies: Vec<StrategyOption>,
}

/// A specific execution strategy offered by an Agent.
#[derive(Debug, Clone)]
pub struct StrategyOption {
    /// Unique identifier for the strategy.
    pub id: StrategyId,
    /// Expected cost in time.
    pub estimated_time: Duration,
    /// Expected cost in VRAM.
    pub estimated_vram: u64,
}

/// A budget granted to an Agent.
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    /// The strategy to apply.
    pub strategy_id: StrategyId,
    /// Maximum time allowed per frame.
    pub time_limit: Duration,
    /// Maximum VRAM budget in bytes, if constrained.
    pub memory_limit: Option<u64>,
    /// Additional agent-specific parameters.
    pub extra_params: HashMap<String, String>,
}

/// A snapshot of an Agent's current health.
#[derive(Debug, Clone)]
pub struct AgentStatus {
    /// The ID of the reporting agent.
    pub agent_id: AgentId,
    /// The strategy currently being executed.
    pub current_strategy: StrategyId,
    /// Health score (0.0 to 1.0). 1.0 means keeping up with the workload.
    pub health_score: f32,
    /// True if the agent cannot make progress.
    pub is_stalled: bool,
    /// Human-readable status message for telemetry.
    pub message: String,
}
