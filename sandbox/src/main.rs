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

// Kiln Sandbox
// Streams a few scenes through the resource upload agent, frame by frame.
//
// Usage: sandbox [config.ron]

mod simulated_device;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kiln_agents::ResourceUploadAgent;
use kiln_core::agent::Agent;
use kiln_core::control::gorna::{
    NegotiationRequest, ResourceBudget, ResourceConstraints, StrategyId,
};
use kiln_core::telemetry::TelemetryEvent;
use kiln_core::{BlobResource, Resource, ResourceHash, ResourceType, SceneId, UploadConfig};
use kiln_data::ResourceReport;
use kiln_telemetry::{MetricsRegistry, ResourceStatistics};

use simulated_device::{SimulatedCompiler, SimulatedDevice};

const FRAMES: u64 = 48;
const FRAME_TIME: Duration = Duration::from_millis(4);
const TRANSFER_RATE_BYTES_PER_US: u64 = 512;
const SHADER_COMPILE_TIME: Duration = Duration::from_millis(6);

const DEFAULT_CONFIG: &str = r#"(
    gpu_cache_size: 1048576,
    upload_batch_size: 4,
    large_resource_threshold: 131072,
    keep_shaders_cached: false,
    shader_queue_capacity: 4,
    scene_priorities: { 1: -1, 2: 5 },
    upload_time_budget_us: Some(1500),
)"#;

/// Everything one scene needs on the device.
struct SceneContent {
    id: SceneId,
    resources: Vec<Arc<dyn Resource>>,
}

impl SceneContent {
    fn hashes(&self) -> Vec<ResourceHash> {
        self.resources.iter().map(|r| r.hash()).collect()
    }
}

fn build_scene(id: u64, textures: usize, meshes: usize, materials: &[&str]) -> SceneContent {
    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();

    for t in 0..textures {
        // Flat-colored texels compress well, like most UI atlases.
        let side = 64 << (t % 3);
        let texels: Vec<u8> = (0..side * side * 4)
            .map(|i| ((i / 4096) as u8).wrapping_add(id as u8 * 16 + t as u8))
            .collect();
        resources.push(Arc::new(BlobResource::compressed(
            ResourceType::Texture,
            &texels,
        )));
    }

    for m in 0..meshes {
        let vertices: Vec<u8> = (0..(3_000 + m * 500) * 12)
            .map(|i| (i as u64 * 31 + id * 7 + m as u64) as u8)
            .collect();
        let indices: Vec<u8> = (0..(1_000 + m * 100) as u32)
            .flat_map(|i| i.to_le_bytes())
            .collect();
        resources.push(Arc::new(BlobResource::new(ResourceType::VertexBuffer, vertices)));
        resources.push(Arc::new(BlobResource::new(ResourceType::IndexBuffer, indices)));
    }

    for source in materials {
        resources.push(Arc::new(BlobResource::new(
            ResourceType::ShaderProgram,
            source.as_bytes().to_vec(),
        )));
    }

    SceneContent {
        id: SceneId(id),
        resources,
    }
}

fn map_scene(agent: &mut ResourceUploadAgent<SimulatedDevice>, scene: &SceneContent) {
    log::info!(
        "Sandbox: Mapping {} ({} resources)",
        scene.id,
        scene.resources.len()
    );
    agent.reference_resources_for_scene(scene.id, &scene.hashes());
    for resource in &scene.resources {
        agent.provide_resource_data(Arc::clone(resource));
    }
}

fn unmap_scene(agent: &mut ResourceUploadAgent<SimulatedDevice>, scene: &SceneContent) {
    log::info!("Sandbox: Unmapping {}", scene.id);
    agent.unreference_all_resources_for_scene(scene.id);
}

fn load_config() -> Result<UploadConfig> {
    match std::env::args().nth(1) {
        Some(path) => UploadConfig::load(path),
        None => UploadConfig::from_ron_str(DEFAULT_CONFIG).context("parsing built-in config"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Sandbox: Upload config\n{}", config.to_ron_string()?);

    let metrics = MetricsRegistry::new();
    let statistics =
        ResourceStatistics::with_registry(&metrics).context("registering resource metrics")?;
    let (dcc_sender, dcc_receiver) = crossbeam_channel::unbounded();

    let device = SimulatedDevice::new(TRANSFER_RATE_BYTES_PER_US);
    let mut agent = ResourceUploadAgent::new(device, config)
        .with_statistics(statistics)
        .with_dcc_sender(dcc_sender)
        .with_shader_compiler(SimulatedCompiler::new(SHADER_COMPILE_TIME))
        .context("starting the shader compile worker")?;

    let response = agent.negotiate(NegotiationRequest {
        target_latency: Duration::from_micros(16_600),
        priority_weight: 0.5,
        constraints: ResourceConstraints::default(),
    });
    if let Some(balanced) = response
        .strategies
        .iter()
        .find(|s| s.id == StrategyId::Balanced)
    {
        agent.apply_budget(ResourceBudget {
            strategy_id: balanced.id,
            time_limit: balanced.estimated_time,
            memory_limit: None,
            extra_params: HashMap::new(),
        });
    }

    let lit = "#version 450\nlayout(location = 0) out vec4 color;\n\
               void main() { color = vec4(1.0); }";
    let unlit = "#version 450\nvoid main() {}";
    let broken = "void main() { missing_version(); }";

    let menu = build_scene(1, 4, 2, &[unlit]);
    let level = build_scene(2, 8, 6, &[lit, unlit, broken]);
    let level_reload = build_scene(3, 2, 1, &[lit]);

    for frame in 0..FRAMES {
        match frame {
            0 => map_scene(&mut agent, &menu),
            2 => map_scene(&mut agent, &level),
            20 => {
                unmap_scene(&mut agent, &menu);
                unmap_scene(&mut agent, &level);
            }
            24 => map_scene(&mut agent, &level_reload),
            _ => {}
        }

        agent.frame_timer().start_frame();
        agent.update();

        for event in dcc_receiver.try_iter() {
            let TelemetryEvent::ResourceReport(report) = event;
            log::trace!(
                "Sandbox: frame {frame} vram={} peak={:?}",
                report.current_bytes,
                report.peak_bytes
            );
        }

        let status = agent.report_status();
        if frame % 8 == 0 || status.is_stalled {
            log::info!(
                "Sandbox: frame {frame} health={:.2} {}",
                status.health_score,
                status.message
            );
        }

        std::thread::sleep(FRAME_TIME);
    }

    agent.log_resource_report();
    let report = ResourceReport::from_registry(agent.registry());
    println!("{}", serde_json::to_string_pretty(&report)?);

    for metric in metrics.namespace_metrics("resources") {
        log::info!("Sandbox: {} = {:?}", metric.id, metric.value);
    }
    log::info!(
        "Sandbox: device holds {} bytes, {} shader binaries cached",
        agent.uploader().resident_bytes(),
        agent.uploader().cached_binaries()
    );

    Ok(())
}
