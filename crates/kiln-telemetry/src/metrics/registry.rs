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

//! A thread-safe registry of named metrics, handed out as typed handles
//! that update the shared value in place.

use kiln_core::telemetry::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared storage behind the registry and every handle it gave out.
#[derive(Debug, Default)]
struct MetricStore {
    metrics: RwLock<HashMap<MetricId, Metric>>,
}

impl MetricStore {
    fn poisoned() -> MetricsError {
        MetricsError::StorageError("metric store lock poisoned".to_string())
    }

    fn insert(&self, metric: Metric) -> MetricsResult<()> {
        let mut metrics = self.metrics.write().map_err(|_| Self::poisoned())?;
        metrics.insert(metric.id.clone(), metric);
        Ok(())
    }

    fn get(&self, id: &MetricId) -> MetricsResult<Metric> {
        let metrics = self.metrics.read().map_err(|_| Self::poisoned())?;
        metrics
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    /// Applies `apply` to the stored value in place. `apply` returns `None`
    /// when the value is not of the `expected` type.
    fn update<T>(
        &self,
        id: &MetricId,
        expected: MetricType,
        apply: impl FnOnce(&mut MetricValue) -> Option<T>,
    ) -> MetricsResult<T> {
        let mut metrics = self.metrics.write().map_err(|_| Self::poisoned())?;
        let metric = metrics
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        let found = metric.value.metric_type();
        apply(&mut metric.value).ok_or(MetricsError::TypeMismatch { expected, found })
    }

    fn snapshot(&self) -> Vec<Metric> {
        self.metrics
            .read()
            .map(|metrics| metrics.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Central registry for metrics.
///
/// Registration returns a typed handle that updates the metric in the shared
/// store, so hot paths never look metrics up by name. Registering an id twice
/// resets the metric.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    store: Arc<MetricStore>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter starting at zero.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> MetricsResult<CounterHandle> {
        let id = MetricId::new(namespace, name);
        self.store.insert(Metric::new_counter(id.clone(), description))?;
        Ok(CounterHandle {
            id,
            store: Arc::clone(&self.store),
        })
    }

    /// Registers a gauge starting at zero.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> MetricsResult<GaugeHandle> {
        let id = MetricId::new(namespace, name);
        self.store
            .insert(Metric::new_gauge(id.clone(), description, unit))?;
        Ok(GaugeHandle {
            id,
            store: Arc::clone(&self.store),
        })
    }

    /// Registers a histogram over ascending `buckets` bounds.
    pub fn register_histogram(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        buckets: Vec<f64>,
    ) -> MetricsResult<HistogramHandle> {
        let id = MetricId::new(namespace, name);
        self.store
            .insert(Metric::new_histogram(id.clone(), description, unit, buckets))?;
        Ok(HistogramHandle {
            id,
            store: Arc::clone(&self.store),
        })
    }

    /// A copy of the metric registered under `id`.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.store.get(id)
    }

    /// Whether a metric is registered under `id`.
    pub fn contains_metric(&self, id: &MetricId) -> bool {
        self.store.get(id).is_ok()
    }

    /// All metrics of a namespace, sorted by name.
    pub fn namespace_metrics(&self, namespace: &str) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|m| m.id.namespace == namespace)
            .collect();
        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Number of registered metrics.
    pub fn metric_count(&self) -> usize {
        self.store.metrics.read().map(|m| m.len()).unwrap_or(0)
    }
}

/// Handle to a registered counter.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    store: Arc<MetricStore>,
}

impl CounterHandle {
    /// Adds one, returning the new value.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.increment_by(1)
    }

    /// Adds `amount`, saturating, and returns the new value.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        self.store
            .update(&self.id, MetricType::Counter, |value| match value {
                MetricValue::Counter(count) => {
                    *count = count.saturating_add(amount);
                    Some(*count)
                }
                _ => None,
            })
    }

    /// The current count.
    pub fn get(&self) -> MetricsResult<u64> {
        let metric = self.store.get(&self.id)?;
        metric.value.as_counter().ok_or(MetricsError::TypeMismatch {
            expected: MetricType::Counter,
            found: metric.value.metric_type(),
        })
    }

    /// The metric this handle updates.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle to a registered gauge.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    store: Arc<MetricStore>,
}

impl GaugeHandle {
    /// Sets the gauge.
    pub fn set(&self, new_value: f64) -> MetricsResult<()> {
        self.store
            .update(&self.id, MetricType::Gauge, |value| match value {
                MetricValue::Gauge(gauge) => {
                    *gauge = new_value;
                    Some(())
                }
                _ => None,
            })
    }

    /// The current value.
    pub fn get(&self) -> MetricsResult<f64> {
        let metric = self.store.get(&self.id)?;
        metric.value.as_gauge().ok_or(MetricsError::TypeMismatch {
            expected: MetricType::Gauge,
            found: metric.value.metric_type(),
        })
    }

    /// The metric this handle updates.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle to a registered histogram.
#[derive(Debug, Clone)]
pub struct HistogramHandle {
    id: MetricId,
    store: Arc<MetricStore>,
}

impl HistogramHandle {
    /// Records a sample. Samples above the last bound land in the overflow bucket.
    pub fn observe(&self, sample: f64) -> MetricsResult<()> {
        self.store
            .update(&self.id, MetricType::Histogram, |value| match value {
                MetricValue::Histogram {
                    count,
                    sum,
                    bucket_bounds,
                    bucket_counts,
                } => {
                    *count += 1;
                    *sum += sample;
                    let bucket = bucket_bounds
                        .iter()
                        .position(|bound| sample <= *bound)
                        .unwrap_or(bucket_bounds.len());
                    bucket_counts[bucket] += 1;
                    Some(())
                }
                _ => None,
            })
    }

    /// A copy of the full histogram.
    pub fn get_metric(&self) -> MetricsResult<Metric> {
        self.store.get(&self.id)
    }

    /// The metric this handle updates.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.metric_count(), 0);
    }

    #[test]
    fn test_handles_share_the_store() {
        let registry = MetricsRegistry::new();
        let counter = registry
            .register_counter("resources", "uploaded_total", "Uploaded resources")
            .unwrap();
        let gauge = registry
            .register_gauge("resources", "vram_usage", "Uploaded bytes", "bytes")
            .unwrap();

        assert_eq!(counter.increment_by(2).unwrap(), 2);
        assert_eq!(counter.increment().unwrap(), 3);
        gauge.set(1024.0).unwrap();

        assert_eq!(counter.get().unwrap(), 3);
        assert_eq!(gauge.get().unwrap(), 1024.0);
        assert!(registry.contains_metric(counter.id()));
        assert_eq!(registry.metric_count(), 2);
    }

    #[test]
    fn test_histogram_buckets_samples() {
        let registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram("resources", "shader_compile_time", "Compile", "ms", vec![1.0, 10.0])
            .unwrap();

        for sample in [0.5, 5.0, 50.0, 70.0] {
            histogram.observe(sample).unwrap();
        }

        match histogram.get_metric().unwrap().value {
            MetricValue::Histogram {
                count,
                bucket_counts,
                ..
            } => {
                assert_eq!(count, 4);
                assert_eq!(bucket_counts, vec![1, 1, 2]);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_reregistering_with_another_type_is_a_mismatch() {
        let registry = MetricsRegistry::new();
        let counter = registry
            .register_counter("resources", "vram_usage", "Not a gauge")
            .unwrap();
        registry
            .register_gauge("resources", "vram_usage", "Uploaded bytes", "bytes")
            .unwrap();

        assert!(matches!(
            counter.increment(),
            Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: MetricType::Gauge,
            })
        ));
        assert!(matches!(
            registry.get_metric(&MetricId::new("resources", "missing")),
            Err(MetricsError::MetricNotFound(_))
        ));
    }

    #[test]
    fn test_namespace_metrics_are_sorted() {
        let registry = MetricsRegistry::new();
        registry.register_counter("resources", "b", "").unwrap();
        registry.register_counter("resources", "a", "").unwrap();
        registry.register_counter("other", "c", "").unwrap();

        let names: Vec<String> = registry
            .namespace_metrics("resources")
            .into_iter()
            .map(|m| m.id.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
