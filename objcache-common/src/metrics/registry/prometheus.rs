// Copyright 2026 foyer Project Authors
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

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use parking_lot::Mutex;
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry,
    Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Registry,
};

use super::noop::NoopMetricsRegistry;
use crate::metrics::{
    BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, BoxedHistogram, BoxedHistogramVec, Boxer, CounterOps,
    CounterVecOps, GaugeOps, GaugeVecOps, HistogramOps, HistogramVecOps, RegistryOps,
};

type MetricsTable = HashMap<PrometheusMetricsRegistry, HashMap<Metadata, MetricVec>>;

static METRICS: LazyLock<Mutex<MetricsTable>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Get the registered vector of `metadata`, or register it with `register`.
///
/// Returns `None` if the underlying registry rejects the metric, e.g. when the same [`Registry`] is wrapped by two
/// [`PrometheusMetricsRegistry`]s.
fn get_or_register<F>(registry: &PrometheusMetricsRegistry, metadata: Metadata, register: F) -> Option<MetricVec>
where
    F: FnOnce(&Metadata, &Registry) -> prometheus::Result<MetricVec>,
{
    let mut metrics = METRICS.lock();
    let vecs = metrics.entry(registry.clone()).or_default();
    if let Some(vec) = vecs.get(&metadata) {
        return Some(vec.clone());
    }
    let vec = register(&metadata, &registry.registry).ok()?;
    vecs.insert(metadata, vec.clone());
    Some(vec)
}

#[derive(Debug, Clone)]
enum MetricVec {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
    Histogram(HistogramVec),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Metadata {
    name: &'static str,
    desc: &'static str,
    label_names: &'static [&'static str],
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[&str]) -> BoxedCounter {
        self.with_label_values(labels).boxed()
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[&str]) -> BoxedGauge {
        self.with_label_values(labels).boxed()
    }
}

impl HistogramOps for Histogram {
    fn record(&self, val: f64) {
        self.observe(val);
    }
}

impl HistogramVecOps for HistogramVec {
    fn histogram(&self, labels: &[&str]) -> BoxedHistogram {
        self.with_label_values(labels).boxed()
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The [`PrometheusMetricsRegistry`] can be cloned and used by multiple coordinators, without worrying about
/// duplicately registering.
///
/// A metric the underlying registry refuses to register is replaced by a noop metric.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Arc<Registry>,
}

impl PartialEq for PrometheusMetricsRegistry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

impl Eq for PrometheusMetricsRegistry {}

impl Hash for PrometheusMetricsRegistry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.registry).hash(state);
    }
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        let registry = Arc::new(registry);
        let this = Self { registry };
        METRICS.lock().insert(this.clone(), HashMap::new());
        this
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        match get_or_register(self, metadata, |m, r| {
            register_int_counter_vec_with_registry!(m.name, m.desc, m.label_names, r).map(MetricVec::Counter)
        }) {
            Some(MetricVec::Counter(v)) => v.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }

    fn register_gauge_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        match get_or_register(self, metadata, |m, r| {
            register_int_gauge_vec_with_registry!(m.name, m.desc, m.label_names, r).map(MetricVec::Gauge)
        }) {
            Some(MetricVec::Gauge(v)) => v.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }

    fn register_histogram_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedHistogramVec {
        let metadata = Metadata {
            name,
            desc,
            label_names,
        };
        match get_or_register(self, metadata, |m, r| {
            register_histogram_vec_with_registry!(m.name, m.desc, m.label_names, r).map(MetricVec::Histogram)
        }) {
            Some(MetricVec::Histogram(v)) => v.boxed(),
            _ => NoopMetricsRegistry.boxed(),
        }
    }
}
