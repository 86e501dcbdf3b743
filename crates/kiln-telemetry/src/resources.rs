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

//! The statistics collector fed by the resource upload agent.
//!
//! The collector always keeps plain running totals, available as a
//! [`StatisticsSnapshot`]. When built on a [`MetricsRegistry`] it also mirrors
//! them into metrics under the `resources` namespace, and when given a sender
//! it forwards a [`TelemetryEvent::ResourceReport`] after every tick.
//! A failing metric update is logged and otherwise ignored.

use crate::metrics::registry::{CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry};
use crossbeam_channel::Sender;
use kiln_core::telemetry::{MetricsResult, ResourceUsageReport, TelemetryEvent};
use std::time::Duration;

const NAMESPACE: &str = "resources";

/// Running totals collected since the collector was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    /// Resources that became resident, synchronously or through the compiler.
    pub resources_uploaded: u64,
    /// Bytes of the uploaded resources.
    pub bytes_uploaded: u64,
    /// Resources evicted from the device.
    pub resources_unloaded: u64,
    /// Bytes of the evicted resources.
    pub bytes_unloaded: u64,
    /// Shader programs compiled by the worker and registered on the device.
    pub shaders_compiled: u64,
    /// Total worker time spent on those compilations.
    pub shader_compile_time: Duration,
    /// Resources that ended up broken.
    pub resources_broken: u64,
    /// Bytes resident on the device after the last tick.
    pub vram_usage: u64,
    /// Highest `vram_usage` observed.
    pub peak_vram_usage: u64,
    /// Cache capacity in effect at the last tick.
    pub cache_capacity: u64,
}

struct ResourceMetrics {
    uploaded_total: CounterHandle,
    uploaded_bytes_total: CounterHandle,
    unloaded_total: CounterHandle,
    shaders_compiled_total: CounterHandle,
    broken_total: CounterHandle,
    shader_compile_time: HistogramHandle,
    tick_time: HistogramHandle,
    vram_usage: GaugeHandle,
    cache_capacity: GaugeHandle,
}

impl ResourceMetrics {
    fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            uploaded_total: registry.register_counter(
                NAMESPACE,
                "uploaded_total",
                "Resources made resident on the device",
            )?,
            uploaded_bytes_total: registry.register_counter(
                NAMESPACE,
                "uploaded_bytes_total",
                "Bytes of resources made resident on the device",
            )?,
            unloaded_total: registry.register_counter(
                NAMESPACE,
                "unloaded_total",
                "Resources evicted from the device",
            )?,
            shaders_compiled_total: registry.register_counter(
                NAMESPACE,
                "shaders_compiled_total",
                "Shader programs compiled off the main thread",
            )?,
            broken_total: registry.register_counter(
                NAMESPACE,
                "broken_total",
                "Resources that failed to upload or compile",
            )?,
            shader_compile_time: registry.register_histogram(
                NAMESPACE,
                "shader_compile_time",
                "Worker time per shader compilation",
                "ms",
                vec![1.0, 5.0, 16.0, 33.0, 100.0, 500.0],
            )?,
            tick_time: registry.register_histogram(
                NAMESPACE,
                "tick_time",
                "Time spent uploading and evicting per frame",
                "ms",
                vec![0.5, 1.0, 2.0, 4.0, 8.0, 16.0],
            )?,
            vram_usage: registry.register_gauge(
                NAMESPACE,
                "vram_usage",
                "Bytes of uploaded resources",
                "bytes",
            )?,
            cache_capacity: registry.register_gauge(
                NAMESPACE,
                "cache_capacity",
                "Configured resource cache capacity",
                "bytes",
            )?,
        })
    }
}

/// Collects upload, eviction and compile statistics.
#[derive(Default)]
pub struct ResourceStatistics {
    snapshot: StatisticsSnapshot,
    metrics: Option<ResourceMetrics>,
    telemetry_sender: Option<Sender<TelemetryEvent>>,
}

impl ResourceStatistics {
    /// Creates a collector that only keeps running totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector that also mirrors its totals into `registry`.
    pub fn with_registry(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            metrics: Some(ResourceMetrics::register(registry)?),
            ..Self::default()
        })
    }

    /// Forwards a usage report through `sender` after every tick.
    pub fn set_telemetry_sender(&mut self, sender: Sender<TelemetryEvent>) {
        self.telemetry_sender = Some(sender);
    }

    /// Records a resource that became resident.
    pub fn resource_uploaded(&mut self, bytes: u64) {
        self.snapshot.resources_uploaded += 1;
        self.snapshot.bytes_uploaded += bytes;
        if let Some(metrics) = &self.metrics {
            log_failure(metrics.uploaded_total.increment(), "uploaded_total");
            log_failure(
                metrics.uploaded_bytes_total.increment_by(bytes),
                "uploaded_bytes_total",
            );
        }
    }

    /// Records an evicted resource.
    pub fn resource_unloaded(&mut self, bytes: u64) {
        self.snapshot.resources_unloaded += 1;
        self.snapshot.bytes_unloaded += bytes;
        if let Some(metrics) = &self.metrics {
            log_failure(metrics.unloaded_total.increment(), "unloaded_total");
        }
    }

    /// Records a resource that failed to upload or compile.
    pub fn resource_broken(&mut self) {
        self.snapshot.resources_broken += 1;
        if let Some(metrics) = &self.metrics {
            log_failure(metrics.broken_total.increment(), "broken_total");
        }
    }

    /// Records a shader program compiled by the worker.
    pub fn shader_compiled(&mut self, compile_time: Duration) {
        self.snapshot.shaders_compiled += 1;
        self.snapshot.shader_compile_time += compile_time;
        if let Some(metrics) = &self.metrics {
            log_failure(
                metrics.shaders_compiled_total.increment(),
                "shaders_compiled_total",
            );
            log_failure(
                metrics
                    .shader_compile_time
                    .observe(compile_time.as_secs_f64() * 1000.0),
                "shader_compile_time",
            );
        }
    }

    /// Reports device memory use at the end of a tick.
    ///
    /// A `cache_capacity` of `0` means caching is disabled.
    pub fn report_usage(&mut self, vram_usage: u64, cache_capacity: u64) {
        self.snapshot.vram_usage = vram_usage;
        self.snapshot.peak_vram_usage = self.snapshot.peak_vram_usage.max(vram_usage);
        self.snapshot.cache_capacity = cache_capacity;

        if let Some(metrics) = &self.metrics {
            log_failure(metrics.vram_usage.set(vram_usage as f64), "vram_usage");
            log_failure(
                metrics.cache_capacity.set(cache_capacity as f64),
                "cache_capacity",
            );
        }

        if let Some(sender) = &self.telemetry_sender {
            let report = ResourceUsageReport {
                current_bytes: vram_usage,
                peak_bytes: Some(self.snapshot.peak_vram_usage),
                total_capacity_bytes: (cache_capacity > 0).then_some(cache_capacity),
            };
            let _ = sender.send(TelemetryEvent::ResourceReport(report));
        }
    }

    /// The histogram ticks are timed into, for use with a
    /// [`ScopedMetricTimer`](crate::ScopedMetricTimer).
    ///
    /// The handle is cloned so the timer does not borrow the collector while
    /// the tick keeps reporting into it.
    pub fn tick_histogram(&self) -> Option<HistogramHandle> {
        self.metrics.as_ref().map(|metrics| metrics.tick_time.clone())
    }

    /// The running totals.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.snapshot
    }
}

fn log_failure<T>(result: MetricsResult<T>, metric: &str) {
    if let Err(e) = result {
        log::warn!("ResourceStatistics: Failed to update {NAMESPACE}:{metric}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::telemetry::MetricId;

    #[test]
    fn test_totals_without_registry() {
        let mut stats = ResourceStatistics::new();
        stats.resource_uploaded(10);
        stats.resource_uploaded(20);
        stats.resource_unloaded(10);
        stats.resource_broken();
        stats.shader_compiled(Duration::from_millis(3));
        stats.report_usage(20, 30);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.resources_uploaded, 2);
        assert_eq!(snapshot.bytes_uploaded, 30);
        assert_eq!(snapshot.resources_unloaded, 1);
        assert_eq!(snapshot.resources_broken, 1);
        assert_eq!(snapshot.shaders_compiled, 1);
        assert_eq!(snapshot.shader_compile_time, Duration::from_millis(3));
        assert_eq!(snapshot.vram_usage, 20);
        assert_eq!(snapshot.cache_capacity, 30);
        assert!(stats.tick_histogram().is_none());
    }

    #[test]
    fn test_mirrors_into_registry() {
        let registry = MetricsRegistry::new();
        let mut stats = ResourceStatistics::with_registry(&registry).unwrap();
        stats.resource_uploaded(64);
        stats.report_usage(64, 0);

        let uploaded = registry
            .get_metric(&MetricId::new("resources", "uploaded_bytes_total"))
            .unwrap();
        assert_eq!(uploaded.value.as_counter(), Some(64));

        let vram = registry
            .get_metric(&MetricId::new("resources", "vram_usage"))
            .unwrap();
        assert_eq!(vram.value.as_gauge(), Some(64.0));
    }

    #[test]
    fn test_forwards_usage_reports() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut stats = ResourceStatistics::new();
        stats.set_telemetry_sender(sender);

        stats.report_usage(50, 0);
        stats.report_usage(30, 100);

        let reports: Vec<ResourceUsageReport> = receiver
            .try_iter()
            .map(|event| {
                let TelemetryEvent::ResourceReport(report) = event;
                report
            })
            .collect();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].total_capacity_bytes, None);
        assert_eq!(reports[1].current_bytes, 30);
        assert_eq!(reports[1].peak_bytes, Some(50));
        assert_eq!(reports[1].total_capacity_bytes, Some(100));
    }
}
