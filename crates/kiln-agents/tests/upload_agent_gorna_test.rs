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

//! Integration tests for the ResourceUploadAgent's GORNA protocol implementation.
//!
//! These tests exercise the negotiate → apply_budget → update → report_status
//! cycle a frame driver runs.

mod common;

use common::{h, reference_and_provide, RecordingUploader, SCENE};
use kiln_agents::ResourceUploadAgent;
use kiln_core::{
    agent::Agent,
    control::gorna::{
        AgentId, NegotiationRequest, ResourceBudget, ResourceConstraints, StrategyId,
    },
    FrameSection, ResourceStatus, ResourceType, UploadConfig,
};
use std::collections::HashMap;
use std::time::Duration;

/// Helper: creates a default NegotiationRequest with generous constraints.
fn default_request() -> NegotiationRequest {
    NegotiationRequest {
        target_latency: Duration::from_millis(16),
        priority_weight: 1.0,
        constraints: ResourceConstraints::default(),
    }
}

fn budget(strategy_id: StrategyId, time_limit: Duration, memory_limit: Option<u64>) -> ResourceBudget {
    ResourceBudget {
        strategy_id,
        time_limit,
        memory_limit,
        extra_params: HashMap::new(),
    }
}

fn agent() -> ResourceUploadAgent<RecordingUploader> {
    ResourceUploadAgent::new(RecordingUploader::new(), UploadConfig::default())
}

#[test]
fn test_agent_id() {
    assert_eq!(agent().id(), AgentId::ResourceUpload);
}

#[test]
fn test_negotiate_offers_all_three_default_strategies() {
    let mut agent = agent();
    let response = agent.negotiate(default_request());

    let ids: Vec<StrategyId> = response.strategies.iter().map(|s| s.id).collect();
    assert_eq!(
        ids,
        vec![StrategyId::LowPower, StrategyId::Balanced, StrategyId::HighPerformance]
    );
}

#[test]
fn test_negotiate_scales_with_backlog() {
    let mut agent = agent();
    let idle = agent.negotiate(default_request());

    for n in 1..=100 {
        reference_and_provide(&mut agent, h(n), ResourceType::Texture, 10, SCENE);
    }
    let busy = agent.negotiate(default_request());

    assert!(busy.strategies[1].estimated_time > idle.strategies[1].estimated_time);
    assert_eq!(busy.strategies[1].estimated_vram, 1_000);
}

#[test]
fn test_negotiate_respects_vram_constraint() {
    let mut agent = agent();
    for n in 1..=10 {
        reference_and_provide(&mut agent, h(n), ResourceType::Texture, 10, SCENE);
    }
    let request = NegotiationRequest {
        constraints: ResourceConstraints {
            max_vram_bytes: Some(40),
        },
        ..default_request()
    };

    let response = agent.negotiate(request);
    assert!(response.strategies.iter().all(|s| s.estimated_vram <= 40));
}

#[test]
fn test_apply_budget_sets_time_and_cache_limits() {
    let mut agent = agent();
    agent.apply_budget(budget(
        StrategyId::LowPower,
        Duration::from_micros(500),
        Some(4096),
    ));

    assert_eq!(agent.current_strategy(), StrategyId::LowPower);
    assert_eq!(
        agent.frame_timer().section_budget(FrameSection::ResourcesUpload),
        500
    );
    assert_eq!(agent.config().gpu_cache_size, 4096);

    // Without a memory limit the cache capacity is left alone.
    agent.apply_budget(budget(StrategyId::Balanced, Duration::from_millis(2), None));
    assert_eq!(agent.config().gpu_cache_size, 4096);
}

#[test]
fn test_update_runs_a_tick() {
    let mut agent = agent();
    reference_and_provide(&mut agent, h(1), ResourceType::Texture, 10, SCENE);

    agent.frame_timer().start_frame();
    agent.update();

    assert_eq!(agent.resource_status(h(1)), Some(ResourceStatus::Uploaded));
    assert_eq!(agent.last_tick().uploaded, 1);
}

#[test]
fn test_report_status_reflects_backlog() {
    let mut agent = agent();
    let idle = agent.report_status();
    assert_eq!(idle.agent_id, AgentId::ResourceUpload);
    assert_eq!(idle.health_score, 1.0);
    assert!(!idle.is_stalled);

    for n in 1..=60 {
        reference_and_provide(&mut agent, h(n), ResourceType::Texture, 10, SCENE);
    }
    let busy = agent.report_status();
    assert!(busy.health_score < idle.health_score);
    assert!(busy.message.contains("backlog=60"));
}

#[test]
fn test_report_status_flags_a_device_that_breaks_everything() {
    let uploader = RecordingUploader::new().failing(h(1)).failing(h(2));
    let config = UploadConfig {
        upload_time_budget_us: Some(0),
        ..Default::default()
    };
    let mut agent = ResourceUploadAgent::new(uploader, config);
    reference_and_provide(&mut agent, h(1), ResourceType::Texture, 10, SCENE);
    reference_and_provide(&mut agent, h(2), ResourceType::Texture, 10, SCENE);

    agent.frame_timer().start_frame();
    agent.update();

    assert!(agent.report_status().is_stalled);
}
