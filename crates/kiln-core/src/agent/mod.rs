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

//! Traits for autonomous, budget-aware subsystems (Agents).

use crate::control::gorna::{
    AgentId, AgentStatus, NegotiationRequest, NegotiationResponse, ResourceBudget,
};
use std::any::Any;

/// A subsystem that negotiates its per-frame budget and then works within it.
///
/// The frame driver asks every agent for the strategies it can run
/// ([`Agent::negotiate`]), grants one of them ([`Agent::apply_budget`]) and then
/// calls [`Agent::update`] once per frame.
pub trait Agent: Send + Sync {
    /// Returns the unique identifier for this agent.
    fn id(&self) -> AgentId;

    /// Offers the strategies this agent can run and their estimated cost.
    fn negotiate(&mut self, request: NegotiationRequest) -> NegotiationResponse;

    /// Applies a budget granted by the frame driver.
    fn apply_budget(&mut self, budget: ResourceBudget);

    /// Performs this agent's work for the current frame.
    fn update(&mut self);

    /// Reports the current status and health of the agent.
    fn report_status(&self) -> AgentStatus;

    /// Allows downcasting to concrete agent types.
    fn as_any(&self) -> &dyn Any;

    /// Allows mutable downcasting to concrete agent types.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
