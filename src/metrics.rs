//! Lazy-load metrics and tracing spans.
//!
//! Metrics go through the global OpenTelemetry meter; install a meter
//! provider (Prometheus exporter or otherwise) in the application to
//! collect them.

#[cfg(feature = "metrics")]
pub use otel::{LazyMetrics, METRICS};

#[cfg(feature = "metrics")]
mod otel {
    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
        KeyValue,
    };
    use std::time::Duration;

    pub static METRICS: Lazy<LazyMetrics> = Lazy::new(LazyMetrics::init);

    pub struct LazyMetrics {
        pub loads_total: Counter<u64>,
        pub rows_hydrated: Counter<u64>,
        pub tombstones: Counter<u64>,
        pub load_duration: Histogram<f64>,
        pub load_errors: Counter<u64>,
    }

    impl LazyMetrics {
        pub fn init() -> Self {
            let meter = global::meter("lifeguard_lazy");

            let loads_total = meter
                .u64_counter("lifeguard_lazy_loads_total")
                .with_description("Follow-up queries issued for lazy attributes")
                .build();

            let rows_hydrated = meter
                .u64_counter("lifeguard_lazy_rows_hydrated_total")
                .with_description("Records that received a lazily loaded value")
                .build();

            let tombstones = meter
                .u64_counter("lifeguard_lazy_tombstones_total")
                .with_description("Lazy loads whose row had vanished")
                .build();

            let load_duration = meter
                .f64_histogram("lifeguard_lazy_load_duration_seconds")
                .with_description("Duration of lazy-load follow-up queries")
                .build();

            let load_errors = meter
                .u64_counter("lifeguard_lazy_load_errors_total")
                .with_description("Follow-up queries that failed at the data source")
                .build();

            Self {
                loads_total,
                rows_hydrated,
                tombstones,
                load_duration,
                load_errors,
            }
        }

        pub fn record_load(&self, mode: &'static str, elapsed: Duration, hydrated: usize, vanished: usize) {
            let attrs = [KeyValue::new("mode", mode)];
            self.loads_total.add(1, &attrs);
            self.load_duration.record(elapsed.as_secs_f64(), &attrs);
            self.rows_hydrated.add(hydrated as u64, &attrs);
            if vanished > 0 {
                self.tombstones.add(vanished as u64, &attrs);
            }
        }

        pub fn record_error(&self, mode: &'static str) {
            self.load_errors.add(1, &[KeyValue::new("mode", mode)]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Span covering one follow-up fetch
    pub fn lazy_load_span(table: &str, column: &str, targets: usize) -> Span {
        tracing::debug_span!("lazy_load", table = %table, column = %column, targets = targets)
    }

    /// Span covering a retrieval that materializes records
    pub fn retrieve_span(table: &str) -> Span {
        tracing::debug_span!("lazy_retrieve", table = %table)
    }

    /// Span covering one statement sent to the database
    pub fn query_span(table: &str) -> Span {
        tracing::debug_span!("query", table = %table)
    }
}
