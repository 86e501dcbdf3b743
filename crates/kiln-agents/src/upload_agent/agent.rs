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

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use kiln_core::agent::Agent;
use kiln_core::control::gorna::{
    AgentId, AgentStatus, NegotiationRequest, NegotiationResponse, ResourceBudget, StrategyId,
    StrategyOption,
};
use kiln_core::telemetry::TelemetryEvent;
use kiln_core::{
    FrameSection, FrameTimer, ResourceHash, ResourceStatus, ResourceUploader, ShaderCompiler,
    UploadConfig, UploadOutcome,
};
use kiln_data::{ResourceRegistry, ResourceReport};
use kiln_lanes::{
    AsyncShaderLane, EvictionLane, ShaderCompileResult, ShaderJob, ShaderLaneError,
    UploadSchedulingLane,
};
use kiln_telemetry::{ResourceStatistics, ScopedMetricTimer};

const LOW_POWER_UPLOAD_TIME_US: u64 = 250;
const BALANCED_UPLOAD_TIME_US: u64 = 1_000;
const HIGH_PERFORMANCE_UPLOAD_TIME_US: u64 = 4_000;
const BACKLOG_URGENCY_DIVISOR: f32 = 50.0;
const MAX_URGENCY_FACTOR: f32 = 5.0;

/// What a single call to
/// [`ResourceUploadAgent::upload_and_unload_pending_resources`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Resources uploaded synchronously.
    pub uploaded: usize,
    /// Shader programs handed to the compile worker.
    pub scheduled: usize,
    /// Compiled shader programs finalized on the device.
    pub compiled: usize,
    /// Resources that failed to upload or compile.
    pub broken: usize,
    /// Resources evicted from the device.
    pub unloaded: usize,
    /// Bytes freed by the evictions.
    pub unloaded_bytes: u64,
    /// Provided resources left for a later tick, because the time budget ran
    /// out or the compile queue was full.
    pub deferred: usize,
}

impl TickSummary {
    fn did_work(&self) -> bool {
        self.uploaded + self.scheduled + self.compiled + self.broken + self.unloaded > 0
    }
}

enum UploadStep {
    Uploaded,
    Scheduled,
    Broken,
    Deferred,
}

/// Uploads and evicts GPU resources within a time budget and a cache budget.
///
/// The agent owns the [`ResourceRegistry`] and the main-thread device backend.
/// Scenes reference resources through the facade methods or through
/// [`ResourceUploadAgent::registry_mut`]; the frame driver calls
/// [`Agent::update`] (or
/// [`ResourceUploadAgent::upload_and_unload_pending_resources`]) once per frame
/// after [`FrameTimer::start_frame`].
///
/// Dropping the agent stops the compile worker, finalizes the shaders it
/// already compiled and unloads every unused resource still on the device.
pub struct ResourceUploadAgent<U: ResourceUploader> {
    registry: ResourceRegistry,
    uploader: U,
    shader_lane: Option<AsyncShaderLane>,
    eviction_lane: EvictionLane,
    scheduling_lane: UploadSchedulingLane,
    frame_timer: Arc<FrameTimer>,
    statistics: ResourceStatistics,
    config: UploadConfig,
    total_uploaded_size: u64,
    pending_shader_jobs: Vec<ShaderJob>,
    completed_shaders: Vec<ShaderCompileResult>,
    current_strategy: StrategyId,
    last_tick: TickSummary,
    frame_count: u64,
}

impl<U: ResourceUploader + Send + Sync + 'static> Agent for ResourceUploadAgent<U> {
    fn id(&self) -> AgentId {
        AgentId::ResourceUpload
    }

    fn negotiate(&mut self, request: NegotiationRequest) -> NegotiationResponse {
        let backlog = self.registry.all_provided_resources().len();
        let urgency_factor = (backlog as f32 / BACKLOG_URGENCY_DIVISOR).min(MAX_URGENCY_FACTOR);
        let scaled = |base_us: u64| {
            Duration::from_micros((base_us as f32 * (1.0 + urgency_factor)) as u64)
        };

        let pending_bytes: u64 = self
            .registry
            .all_provided_resources()
            .iter()
            .map(|hash| self.registry[hash].decompressed_size)
            .sum();
        let estimated_vram = match request.constraints.max_vram_bytes {
            Some(max) => (self.total_uploaded_size + pending_bytes).min(max),
            None => self.total_uploaded_size + pending_bytes,
        };

        NegotiationResponse {
            strategies: vec![
                StrategyOption {
                    id: StrategyId::LowPower,
                    estimated_time: Duration::from_micros(LOW_POWER_UPLOAD_TIME_US),
                    estimated_vram: self.total_uploaded_size,
                },
                StrategyOption {
                    id: StrategyId::Balanced,
                    estimated_time: scaled(BALANCED_UPLOAD_TIME_US),
                    estimated_vram,
                },
                StrategyOption {
                    id: StrategyId::HighPerformance,
                    estimated_time: scaled(HIGH_PERFORMANCE_UPLOAD_TIME_US),
                    estimated_vram,
                },
            ],
        }
    }

    fn apply_budget(&mut self, budget: ResourceBudget) {
        log::info!(
            "ResourceUploadAgent: Strategy update to {:?} (time_limit={:?}, memory_limit={:?})",
            budget.strategy_id,
            budget.time_limit,
            budget.memory_limit,
        );

        self.current_strategy = budget.strategy_id;
        let budget_us =
            u64::try_from(budget.time_limit.as_micros()).unwrap_or(FrameTimer::UNLIMITED);
        self.frame_timer
            .set_section_budget(FrameSection::ResourcesUpload, budget_us);

        if let Some(bytes) = budget.memory_limit {
            self.config.gpu_cache_size = bytes;
        }
    }

    fn update(&mut self) {
        self.upload_and_unload_pending_resources();
        self.frame_count += 1;
    }

    fn report_status(&self) -> AgentStatus {
        let backlog = self.registry.all_provided_resources().len();
        let health_score = if backlog == 0 {
            1.0
        } else if backlog < 50 {
            0.8
        } else if backlog < 500 {
            0.5
        } else {
            0.2
        };
        // Every tick uploads something when there is a backlog, unless it all breaks.
        let is_stalled = backlog > 0
            && self.frame_count > 0
            && self.last_tick.uploaded + self.last_tick.scheduled + self.last_tick.compiled == 0;

        AgentStatus {
            agent_id: self.id(),
            current_strategy: self.current_strategy,
            health_score,
            is_stalled,
            message: format!(
                "backlog={} compiling={} vram={}B cache={}B last_uploaded={} last_unloaded={}",
                backlog,
                self.registry.has_any_resources_scheduled_for_upload(),
                self.total_uploaded_size,
                self.config.gpu_cache_size,
                self.last_tick.uploaded,
                self.last_tick.unloaded,
            ),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl<U: ResourceUploader> ResourceUploadAgent<U> {
    /// Creates a new `ResourceUploadAgent` without a compile worker.
    ///
    /// Shader programs the device reports as not ready end up broken until a
    /// compiler is attached with [`ResourceUploadAgent::with_shader_compiler`].
    pub fn new(uploader: U, config: UploadConfig) -> Self {
        let frame_timer = Arc::new(FrameTimer::new());
        if let Some(budget_us) = config.upload_time_budget_us {
            frame_timer.set_section_budget(FrameSection::ResourcesUpload, budget_us);
        }

        Self {
            registry: ResourceRegistry::new(),
            uploader,
            shader_lane: None,
            eviction_lane: EvictionLane::new(config.keep_shaders_cached),
            scheduling_lane: UploadSchedulingLane::from_config(&config),
            frame_timer,
            statistics: ResourceStatistics::new(),
            config,
            total_uploaded_size: 0,
            pending_shader_jobs: Vec::new(),
            completed_shaders: Vec::new(),
            current_strategy: StrategyId::Balanced,
            last_tick: TickSummary::default(),
            frame_count: 0,
        }
    }

    /// Shares a frame timer with the frame driver.
    ///
    /// The configured upload budget, if any, is applied to it.
    pub fn with_frame_timer(mut self, frame_timer: Arc<FrameTimer>) -> Self {
        if let Some(budget_us) = self.config.upload_time_budget_us {
            frame_timer.set_section_budget(FrameSection::ResourcesUpload, budget_us);
        }
        self.frame_timer = frame_timer;
        self
    }

    /// Starts a compile worker owning `compiler`, bounded by
    /// [`UploadConfig::shader_queue_capacity`].
    pub fn with_shader_compiler(
        self,
        compiler: impl ShaderCompiler + 'static,
    ) -> Result<Self, ShaderLaneError> {
        let capacity = self.config.shader_queue_capacity;
        Ok(self.with_shader_lane(AsyncShaderLane::start(Box::new(compiler), capacity)?))
    }

    /// Uses an already running compile worker.
    pub fn with_shader_lane(mut self, lane: AsyncShaderLane) -> Self {
        self.shader_lane = Some(lane);
        self
    }

    /// Replaces the statistics collector, e.g. with one mirrored into a metrics registry.
    pub fn with_statistics(mut self, statistics: ResourceStatistics) -> Self {
        self.statistics = statistics;
        self
    }

    /// Attaches a DCC sender for telemetry events.
    pub fn with_dcc_sender(mut self, sender: Sender<TelemetryEvent>) -> Self {
        self.statistics.set_telemetry_sender(sender);
        self
    }

    /// The resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Mutable access to the registry, for scene bookkeeping.
    ///
    /// Status transitions past `Provided` belong to the agent; calling them
    /// directly desynchronizes the cache accounting.
    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    /// The device backend.
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Mutable access to the device backend.
    pub fn uploader_mut(&mut self) -> &mut U {
        &mut self.uploader
    }

    /// The frame timer the upload budget is checked against.
    pub fn frame_timer(&self) -> &Arc<FrameTimer> {
        &self.frame_timer
    }

    /// The statistics collector.
    pub fn statistics(&self) -> &ResourceStatistics {
        &self.statistics
    }

    /// The configuration in effect.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Bytes of resources currently uploaded, by decompressed size.
    pub fn total_uploaded_size(&self) -> u64 {
        self.total_uploaded_size
    }

    /// Returns the current strategy.
    pub fn current_strategy(&self) -> StrategyId {
        self.current_strategy
    }

    /// What the last tick did.
    pub fn last_tick(&self) -> TickSummary {
        self.last_tick
    }

    /// Whether any resource waits for upload or for its compile result.
    pub fn has_anything_to_upload(&self) -> bool {
        !self.registry.all_provided_resources().is_empty()
            || self.registry.has_any_resources_scheduled_for_upload()
    }

    /// Logs a [`ResourceReport`] of the registry at debug level.
    pub fn log_resource_report(&self) {
        if log::log_enabled!(log::Level::Debug) {
            let report = ResourceReport::from_registry(&self.registry);
            log::debug!("ResourceUploadAgent: {report}");
        }
    }

    /// Runs one tick: evicts what the cache budget requires, uploads provided
    /// resources until the time budget runs out, and finalizes compiled shaders.
    pub fn upload_and_unload_pending_resources(&mut self) -> TickSummary {
        let tick_histogram = self.statistics.tick_histogram();
        let _tick_timer = tick_histogram.as_ref().map(ScopedMetricTimer::new);

        let mut summary = TickSummary::default();

        let mut uploads = self.registry.all_provided_resources().to_vec();
        let mut size_to_upload = 0u64;
        for &hash in &uploads {
            let descriptor = &self.registry[hash];
            size_to_upload += descriptor.decompressed_size;
            if let Some(resource) = &descriptor.resource {
                resource.decompress();
            }
        }

        let amount_to_free = EvictionLane::amount_to_free(
            self.config.gpu_cache_size,
            self.total_uploaded_size,
            size_to_upload,
        );
        if amount_to_free > 0 {
            let plan = self.eviction_lane.plan(&self.registry, amount_to_free);
            for &hash in &plan.candidates {
                self.unload_resource(hash);
            }
            summary.unloaded = plan.candidates.len();
            summary.unloaded_bytes = plan.freed_bytes;
            if self.config.gpu_cache_size > 0 && plan.freed_bytes < amount_to_free {
                log::debug!(
                    "ResourceUploadAgent: Cache over budget, could free {} of {} bytes",
                    plan.freed_bytes,
                    amount_to_free,
                );
            }
        }

        self.scheduling_lane
            .order(&self.registry, &mut uploads, &self.config.scene_priorities);

        for (index, &hash) in uploads.iter().enumerate() {
            let size = self.registry[hash].decompressed_size;
            match self.upload_resource(hash) {
                UploadStep::Uploaded => summary.uploaded += 1,
                UploadStep::Scheduled => summary.scheduled += 1,
                UploadStep::Broken => summary.broken += 1,
                UploadStep::Deferred => summary.deferred += 1,
            }

            if self.scheduling_lane.is_checkpoint(index, size)
                && self
                    .frame_timer
                    .is_time_budget_exceeded(FrameSection::ResourcesUpload)
            {
                let skipped = uploads.len() - index - 1;
                summary.deferred += skipped;
                if skipped > 0 {
                    log::trace!(
                        "ResourceUploadAgent: Upload budget exceeded, {skipped} resource(s) deferred"
                    );
                }
                break;
            }
        }

        self.sync_shader_lane();
        let (compiled, broken) = self.finalize_compiled_shaders();
        summary.compiled = compiled;
        summary.broken += broken;

        self.statistics
            .report_usage(self.total_uploaded_size, self.config.gpu_cache_size);

        if summary.did_work() {
            log::debug!(
                "ResourceUploadAgent: uploaded={} scheduled={} compiled={} broken={} unloaded={} ({} bytes) deferred={} vram={}",
                summary.uploaded,
                summary.scheduled,
                summary.compiled,
                summary.broken,
                summary.unloaded,
                summary.unloaded_bytes,
                summary.deferred,
                self.total_uploaded_size,
            );
        }

        self.last_tick = summary;
        summary
    }

    fn upload_resource(&mut self, hash: ResourceHash) -> UploadStep {
        let descriptor = &self.registry[hash];
        let size = descriptor.decompressed_size;
        let Some(resource) = descriptor.resource.clone() else {
            log::error!("ResourceUploadAgent: Provided resource {hash} has no payload");
            self.mark_broken(hash);
            return UploadStep::Broken;
        };
        let resource_type = resource.resource_type();

        match self.uploader.upload_resource(resource.as_ref()) {
            UploadOutcome::Uploaded { handle, vram_size } => {
                self.registry.set_resource_uploaded(hash, handle, vram_size);
                self.total_uploaded_size += size;
                self.statistics.resource_uploaded(size);
                log::trace!("ResourceUploadAgent: Uploaded {resource_type} {hash} as {handle}");
                UploadStep::Uploaded
            }
            UploadOutcome::NotReady
                if resource_type.requires_async_compile() && self.shader_lane.is_some() =>
            {
                if !self.shader_lane_has_room() {
                    log::trace!(
                        "ResourceUploadAgent: Compile queue full, {hash} waits for a later tick"
                    );
                    return UploadStep::Deferred;
                }
                self.registry.set_resource_scheduled_for_upload(hash);
                self.pending_shader_jobs.push(ShaderJob { hash, resource });
                log::trace!("ResourceUploadAgent: Scheduled {resource_type} {hash} for compilation");
                UploadStep::Scheduled
            }
            UploadOutcome::NotReady => {
                log::warn!(
                    "ResourceUploadAgent: Device reported {resource_type} {hash} not ready, but it cannot be compiled asynchronously"
                );
                self.mark_broken(hash);
                UploadStep::Broken
            }
            UploadOutcome::Failed => {
                log::error!("ResourceUploadAgent: Failed to upload {resource_type} {hash}");
                self.mark_broken(hash);
                UploadStep::Broken
            }
        }
    }

    fn unload_resource(&mut self, hash: ResourceHash) {
        let descriptor = &self.registry[hash];
        let size = descriptor.decompressed_size;
        match (descriptor.resource_type, descriptor.device_handle) {
            (Some(resource_type), Some(handle)) => {
                self.uploader.unload_resource(resource_type, hash, handle);
                log::trace!("ResourceUploadAgent: Unloaded {resource_type} {hash} from {handle}");
            }
            _ => log::error!("ResourceUploadAgent: Uploaded resource {hash} has no device handle"),
        }

        self.total_uploaded_size = self.total_uploaded_size.saturating_sub(size);
        self.registry.unregister_resource(hash);
        self.statistics.resource_unloaded(size);
    }

    fn mark_broken(&mut self, hash: ResourceHash) {
        self.registry.set_resource_broken(hash);
        self.statistics.resource_broken();
    }

    fn shader_lane_has_room(&self) -> bool {
        self.shader_lane
            .as_ref()
            .is_some_and(|lane| lane.available_capacity() > self.pending_shader_jobs.len())
    }

    fn sync_shader_lane(&mut self) {
        if let Some(lane) = &self.shader_lane {
            lane.sync(&mut self.pending_shader_jobs, &mut self.completed_shaders);
        }
    }

    /// Registers the compiled shaders on the device. Returns how many became
    /// uploaded and how many broke.
    fn finalize_compiled_shaders(&mut self) -> (usize, usize) {
        let mut compiled = 0;
        let mut broken = 0;

        let mut results = std::mem::take(&mut self.completed_shaders);
        for result in results.drain(..) {
            let hash = result.hash;
            let Some(descriptor) = self.registry.resource_descriptor(hash) else {
                log::warn!("ResourceUploadAgent: Discarding compiled shader {hash}, resource is not registered");
                continue;
            };
            if descriptor.status != ResourceStatus::ScheduledForUpload {
                log::warn!(
                    "ResourceUploadAgent: Discarding compiled shader {hash}, resource is {}",
                    descriptor.status
                );
                continue;
            }
            let size = descriptor.decompressed_size;
            let first_scene = descriptor.scene_usage.first_scene();

            let Some(shader) = result.shader else {
                log::error!("ResourceUploadAgent: Failed to compile shader {hash}");
                self.mark_broken(hash);
                broken += 1;
                continue;
            };
            let binary_size = shader.binary.len() as u64;

            let Some(handle) = self.uploader.register_shader(shader) else {
                log::error!("ResourceUploadAgent: Device rejected compiled shader {hash}");
                self.mark_broken(hash);
                broken += 1;
                continue;
            };

            self.registry.set_resource_uploaded(hash, handle, binary_size);
            self.total_uploaded_size += size;
            self.statistics.shader_compiled(result.compile_time);
            self.statistics.resource_uploaded(size);
            compiled += 1;
            log::trace!(
                "ResourceUploadAgent: Compiled shader {hash} in {:?} as {handle}",
                result.compile_time
            );

            if let Err(e) = self
                .uploader
                .store_shader_in_binary_cache(handle, hash, first_scene)
            {
                log::warn!("ResourceUploadAgent: Could not cache shader binary {hash}: {e}");
            }
        }
        self.completed_shaders = results;

        (compiled, broken)
    }
}

impl<U: ResourceUploader> Drop for ResourceUploadAgent<U> {
    fn drop(&mut self) {
        if let Some(mut lane) = self.shader_lane.take() {
            if let Err(e) = lane.shutdown() {
                log::error!("ResourceUploadAgent: {e}");
            }
            lane.sync(&mut Vec::new(), &mut self.completed_shaders);
            self.finalize_compiled_shaders();
        }

        let unused = self.registry.all_resources_not_in_use_by_scenes().to_vec();
        let mut in_flight = 0usize;
        let mut unloaded = 0usize;
        for hash in unused {
            if self.registry.resource_status(hash) == ResourceStatus::Uploaded {
                self.unload_resource(hash);
                unloaded += 1;
            } else {
                in_flight += 1;
            }
        }

        if in_flight > 0 {
            log::warn!(
                "ResourceUploadAgent: Dropped with {in_flight} unused resource(s) still compiling"
            );
        }
        log::debug!(
            "ResourceUploadAgent: Unloaded {unloaded} cached resource(s) on shutdown, {} remain registered",
            self.registry.resource_count()
        );
    }
}
