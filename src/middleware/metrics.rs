use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::core::{BoxHandler, Handler, Middleware};
use crate::context::RequestContext;

/// Label used for requests that did not match a route
const UNMATCHED: &str = "<unmatched>";

#[derive(Default)]
struct MetricsInner {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    status_classes: [AtomicUsize; 5],
    by_pattern: DashMap<String, AtomicUsize>,
    stack_size: AtomicUsize,
}

/// Middleware for collecting Prometheus-compatible metrics
///
/// Tracks request counts, latency, responses per status class, requests per
/// route pattern and the coroutine stack size. Counters are atomics; the
/// per-pattern map is a `DashMap` so concurrent requests never share a lock.
/// Cloning is cheap and every clone reports into the same counters.
#[derive(Clone, Default)]
pub struct MetricsMiddleware {
    inner: Arc<MetricsInner>,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.inner.request_count.load(Ordering::Relaxed)
    }

    /// Mean processing time, zero before the first request
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.inner.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.inner.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses whose status is in `class`xx (1 through 5)
    #[must_use]
    pub fn status_class_count(&self, class: u16) -> usize {
        match class {
            1..=5 => self.inner.status_classes[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// Requests served per matched pattern; unmatched requests are counted
    /// under `"<unmatched>"`
    #[must_use]
    pub fn pattern_count(&self, pattern: &str) -> usize {
        self.inner
            .by_pattern
            .get(pattern)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.inner.stack_size.load(Ordering::Relaxed)
    }

    fn record(&self, ctx: &RequestContext, latency: Duration) {
        let inner = &self.inner;
        inner.request_count.fetch_add(1, Ordering::Relaxed);
        inner
            .total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);

        let class = ctx.response().status().as_u16() / 100;
        if (1..=5).contains(&class) {
            inner.status_classes[usize::from(class - 1)].fetch_add(1, Ordering::Relaxed);
        }

        let pattern = ctx.matched_pattern().unwrap_or(UNMATCHED);
        if let Some(counter) = inner.by_pattern.get(pattern) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            inner
                .by_pattern
                .entry(pattern.to_string())
                .or_default()
                .fetch_add(1, Ordering::Relaxed);
        }

        let size = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        inner.stack_size.store(size, Ordering::Relaxed);
    }

    /// Prometheus text exposition of every counter
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = vec![
            "# HELP trellis_requests_total Total number of handled requests".to_string(),
            "# TYPE trellis_requests_total counter".to_string(),
            format!("trellis_requests_total {}", self.request_count()),
            "# HELP trellis_request_latency_seconds Average request latency in seconds".to_string(),
            "# TYPE trellis_request_latency_seconds gauge".to_string(),
            format!(
                "trellis_request_latency_seconds {}",
                self.average_latency().as_secs_f64()
            ),
            "# HELP trellis_responses_total Responses by status class".to_string(),
            "# TYPE trellis_responses_total counter".to_string(),
        ];
        lines.extend((1..=5u16).map(|class| {
            format!(
                "trellis_responses_total{{class=\"{class}xx\"}} {}",
                self.status_class_count(class)
            )
        }));

        lines.push(
            "# HELP trellis_route_requests_total Requests by matched route pattern".to_string(),
        );
        lines.push("# TYPE trellis_route_requests_total counter".to_string());
        let mut patterns: Vec<(String, usize)> = self
            .inner
            .by_pattern
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        patterns.sort();
        lines.extend(patterns.into_iter().map(|(pattern, count)| {
            format!(
                "trellis_route_requests_total{{pattern=\"{}\"}} {count}",
                escape_label(&pattern)
            )
        }));

        lines.push(
            "# HELP trellis_coroutine_stack_bytes Configured coroutine stack size".to_string(),
        );
        lines.push("# TYPE trellis_coroutine_stack_bytes gauge".to_string());
        lines.push(format!("trellis_coroutine_stack_bytes {}", self.stack_size()));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Handler serving [`MetricsMiddleware::render`]
    #[must_use]
    pub fn endpoint(&self) -> MetricsEndpoint {
        MetricsEndpoint {
            metrics: self.clone(),
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        let metrics = self.clone();
        Arc::new(move |ctx: &mut RequestContext| {
            let start = Instant::now();
            next.call(ctx);
            metrics.record(ctx, start.elapsed());
        })
    }

    fn name(&self) -> &str {
        "metrics"
    }
}

/// Handler rendering the metrics in Prometheus text format
#[derive(Clone)]
pub struct MetricsEndpoint {
    metrics: MetricsMiddleware,
}

impl Handler for MetricsEndpoint {
    fn call(&self, ctx: &mut RequestContext) {
        let body = self.metrics.render();
        ctx.set_header("content-type", "text/plain; version=0.0.4")
            .write_string(&body);
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
